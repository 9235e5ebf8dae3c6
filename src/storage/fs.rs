use std::fs::{File, OpenOptions};
use std::path::{Component, Path, PathBuf};

use crate::error::{Result, StoreError};
use crate::storage::input::IndexOutput;

/// 文件名必须恰好是一个普通路径段：拒绝空名、`.`、`..`、绝对路径和带分隔符的名字。
pub(crate) fn check_name(name: &str) -> Result<()> {
    let mut comps = Path::new(name).components();
    match (comps.next(), comps.next()) {
        (Some(Component::Normal(seg)), None) if seg == name => Ok(()),
        _ => Err(StoreError::InvalidName(name.to_string())),
    }
}

/// 两个后端共用的文件系统操作：都只作用于 `root` 之下的单层文件名。
#[derive(Clone, Debug)]
pub(crate) struct FsRoot {
    root: PathBuf,
}

impl FsRoot {
    pub(crate) fn create(root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;
        Ok(Self { root })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.root
    }

    pub(crate) fn resolve(&self, name: &str) -> Result<PathBuf> {
        check_name(name)?;
        Ok(self.root.join(name))
    }

    pub(crate) fn err(&self, name: &str, e: std::io::Error) -> StoreError {
        StoreError::from_io(&self.root, name, e)
    }

    /// 根目录下的普通文件名（排序）；子目录不计入。
    pub(crate) fn list(&self) -> Result<Vec<String>> {
        let rd = std::fs::read_dir(&self.root).map_err(|e| StoreError::io(&self.root, e))?;
        let mut out = Vec::new();
        for ent in rd {
            let ent = ent.map_err(|e| StoreError::io(&self.root, e))?;
            let ft = match ent.file_type() {
                Ok(ft) => ft,
                // 列举与删除并发：条目可能已经消失
                Err(_) => continue,
            };
            if !ft.is_file() {
                continue;
            }
            match ent.file_name().into_string() {
                Ok(name) => out.push(name),
                Err(raw) => tracing::warn!("skip non-UTF-8 file name {:?} in {:?}", raw, self.root),
            }
        }
        out.sort();
        Ok(out)
    }

    pub(crate) fn length(&self, name: &str) -> Result<u64> {
        let md = std::fs::metadata(self.resolve(name)?).map_err(|e| self.err(name, e))?;
        Ok(md.len())
    }

    pub(crate) fn delete(&self, name: &str) -> Result<()> {
        std::fs::remove_file(self.resolve(name)?).map_err(|e| self.err(name, e))
    }

    pub(crate) fn rename(&self, from: &str, to: &str) -> Result<()> {
        let (src, dst) = (self.resolve(from)?, self.resolve(to)?);
        std::fs::rename(src, dst).map_err(|e| self.err(from, e))
    }

    pub(crate) fn open_read(&self, name: &str) -> Result<(File, u64)> {
        let file = File::open(self.resolve(name)?).map_err(|e| self.err(name, e))?;
        let len = file.metadata().map_err(|e| self.err(name, e))?.len();
        Ok((file, len))
    }

    pub(crate) fn create_output(&self, name: &str) -> Result<IndexOutput> {
        let path = self.resolve(name)?;
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| self.err(name, e))?;
        Ok(IndexOutput::new(name, path, file))
    }

    pub(crate) fn sync(&self, names: &[&str]) -> Result<()> {
        for name in names {
            let f = File::open(self.resolve(name)?).map_err(|e| self.err(name, e))?;
            f.sync_all().map_err(|e| self.err(name, e))?;
        }
        Ok(())
    }

    /// fsync 目录项，让 create/rename/delete 落盘
    pub(crate) fn sync_dir(&self) -> Result<()> {
        let dir = File::open(&self.root).map_err(|e| StoreError::io(&self.root, e))?;
        #[cfg(unix)]
        dir.sync_all().map_err(|e| StoreError::io(&self.root, e))?;
        #[cfg(not(unix))]
        drop(dir);
        Ok(())
    }

    pub(crate) fn total_bytes(&self, names: &[String]) -> u64 {
        names
            .iter()
            .filter_map(|n| std::fs::metadata(self.root.join(n)).ok())
            .map(|m| m.len())
            .sum()
    }
}
