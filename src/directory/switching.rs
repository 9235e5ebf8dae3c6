use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::{PreloadExtensions, Route};
use crate::error::{Result, StoreError};
use crate::stats::StoreStats;
use crate::storage::fs::check_name;
use crate::storage::{
    BufferedDirectory, Directory, DirectoryLock, IndexInput, IndexOutput, MmapDirectory,
};

/// 按扩展名切换后端的统一目录。
///
/// ## 契约（重要）
/// - 每个操作先按 `extensions` 分类，再交给对应后端；分类只依赖
///   （文件名, 扩展名集合），因此 open/delete/rename/length 永远落到同一后端。
/// - 选中的后端报 NotFound 就原样返回，不会去另一个后端兜底。
/// - 文件名必须是单个路径段；`..`、绝对路径、带分隔符的名字一律 `InvalidName`。
/// - 同名文件同时存在于两个后端（例如两次启动之间改了 preload 配置）：
///   `list_all` 只报一次并打 warn；单文件操作以分类结果为准。
/// - `list_all` 的两次子列举不是原子的：与之并发的创建/删除可能只出现在其中一次。
/// - `close` 先关主后端再关副后端，两个都会关；调用方须保证 close 不与其他操作并发。
pub struct SwitchingDirectory {
    primary: MmapDirectory,
    secondary: BufferedDirectory,
    extensions: PreloadExtensions,
    closed: AtomicBool,
}

impl SwitchingDirectory {
    pub fn new(
        primary: MmapDirectory,
        secondary: BufferedDirectory,
        extensions: PreloadExtensions,
    ) -> Self {
        tracing::info!(
            "SwitchingDirectory: [{}] -> mmap {:?} (preload={}), rest -> buffered {:?}",
            extensions,
            primary.root(),
            primary.is_preload(),
            secondary.root()
        );
        Self {
            primary,
            secondary,
            extensions,
            closed: AtomicBool::new(false),
        }
    }

    pub fn primary(&self) -> &MmapDirectory {
        &self.primary
    }

    pub fn secondary(&self) -> &BufferedDirectory {
        &self.secondary
    }

    pub fn preload_extensions(&self) -> &PreloadExtensions {
        &self.extensions
    }

    pub fn route(&self, name: &str) -> Route {
        self.extensions.classify(name)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed(self.primary.root().to_path_buf()));
        }
        Ok(())
    }

    fn backend(&self, name: &str) -> Result<&dyn Directory> {
        self.ensure_open()?;
        let route = self.route(name);
        tracing::trace!("route {} -> {}", name, route);
        let dir: &dyn Directory = match route {
            Route::Mapped => &self.primary,
            Route::Buffered => &self.secondary,
        };
        Ok(dir)
    }

    /// 同时出现在两个后端的文件名
    pub fn conflicts(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        let primary: BTreeSet<String> = self.primary.list_all()?.into_iter().collect();
        let secondary = self.secondary.list_all()?;
        Ok(secondary
            .into_iter()
            .filter(|n| primary.contains(n))
            .collect())
    }

    pub fn stats(&self) -> Result<StoreStats> {
        self.ensure_open()?;
        Ok(StoreStats {
            primary: self.primary.stats()?,
            secondary: Some(self.secondary.stats()?),
            conflicts: self.conflicts()?,
        })
    }
}

impl Directory for SwitchingDirectory {
    fn root(&self) -> &Path {
        self.primary.root()
    }

    fn list_all(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        let mut names: BTreeSet<String> = self.primary.list_all()?.into_iter().collect();
        for name in self.secondary.list_all()? {
            if names.contains(&name) {
                tracing::warn!(
                    "{} exists in both {:?} and {:?}; {} backend owns it",
                    name,
                    self.primary.root(),
                    self.secondary.root(),
                    self.route(&name)
                );
                continue;
            }
            names.insert(name);
        }
        Ok(names.into_iter().collect())
    }

    fn file_length(&self, name: &str) -> Result<u64> {
        self.backend(name)?.file_length(name)
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        self.backend(name)?.delete_file(name)
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.ensure_open()?;
        check_name(from)?;
        check_name(to)?;
        if self.route(from) != self.route(to) {
            return Err(StoreError::CrossBackendRename {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        self.backend(from)?.rename(from, to)
    }

    fn open_input(&self, name: &str) -> Result<IndexInput> {
        self.backend(name)?.open_input(name)
    }

    fn create_output(&self, name: &str) -> Result<IndexOutput> {
        self.backend(name)?.create_output(name)
    }

    fn sync(&self, names: &[&str]) -> Result<()> {
        self.ensure_open()?;
        let (mapped, buffered): (Vec<&str>, Vec<&str>) = names
            .iter()
            .copied()
            .partition(|n| self.route(n) == Route::Mapped);
        if !mapped.is_empty() {
            self.primary.sync(&mapped)?;
        }
        if !buffered.is_empty() {
            self.secondary.sync(&buffered)?;
        }
        Ok(())
    }

    fn obtain_lock(&self, name: &str) -> Result<DirectoryLock> {
        self.backend(name)?.obtain_lock(name)
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let primary = self.primary.close();
        let secondary = self.secondary.close();
        match (primary, secondary) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(e), Ok(())) => {
                tracing::warn!("primary close failed: {}", e);
                Err(e)
            }
            (Ok(()), Err(e)) => {
                tracing::warn!("secondary close failed: {}", e);
                Err(e)
            }
            (Err(p), Err(s)) => {
                tracing::warn!("both backends failed to close: {}; {}", p, s);
                Err(StoreError::CloseFailed {
                    primary: Box::new(p),
                    secondary: Box::new(s),
                })
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
