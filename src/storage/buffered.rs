use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::Route;
use crate::error::{Result, StoreError};
use crate::stats::DirectoryStats;
use crate::storage::fs::FsRoot;
use crate::storage::input::{BufferedInput, IndexInput, IndexOutput, OpenTable};
use crate::storage::lock::{DirectoryLock, LockPolicy};
use crate::storage::Directory;

/// 缓冲 I/O 后端：显式 read 到单个缓冲区，不做映射。
pub struct BufferedDirectory {
    fs: FsRoot,
    lock_policy: LockPolicy,
    open: Arc<OpenTable>,
    closed: AtomicBool,
}

impl BufferedDirectory {
    pub fn open(root: impl Into<PathBuf>, lock_policy: LockPolicy) -> Result<Self> {
        let fs = FsRoot::create(root.into())?;
        tracing::info!("BufferedDirectory opened at {:?} (lock: {})", fs.path(), lock_policy);
        Ok(Self {
            fs,
            lock_policy,
            open: Arc::new(OpenTable::default()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn lock_policy(&self) -> LockPolicy {
        self.lock_policy
    }

    /// 仍存活的读句柄数
    pub fn open_inputs(&self) -> usize {
        self.open.len()
    }

    pub fn stats(&self) -> Result<DirectoryStats> {
        self.ensure_open()?;
        let names = self.fs.list()?;
        Ok(DirectoryStats {
            route: Route::Buffered,
            root: self.fs.path().to_path_buf(),
            file_count: names.len(),
            total_bytes: self.fs.total_bytes(&names),
            preload: false,
            mapped_regions: 0,
            mapped_bytes: 0,
            open_inputs: self.open.len(),
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed(self.fs.path().to_path_buf()));
        }
        Ok(())
    }
}

impl Directory for BufferedDirectory {
    fn root(&self) -> &Path {
        self.fs.path()
    }

    fn list_all(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        self.fs.list()
    }

    fn file_length(&self, name: &str) -> Result<u64> {
        self.ensure_open()?;
        self.fs.length(name)
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        self.ensure_open()?;
        self.fs.delete(name)
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.ensure_open()?;
        self.fs.rename(from, to)
    }

    fn open_input(&self, name: &str) -> Result<IndexInput> {
        self.ensure_open()?;
        let (file, len) = self.fs.open_read(name)?;
        Ok(IndexInput::Buffered(BufferedInput::open(&self.open, name, file, len)))
    }

    fn create_output(&self, name: &str) -> Result<IndexOutput> {
        self.ensure_open()?;
        self.fs.create_output(name)
    }

    fn sync(&self, names: &[&str]) -> Result<()> {
        self.ensure_open()?;
        self.fs.sync(names)
    }

    fn obtain_lock(&self, name: &str) -> Result<DirectoryLock> {
        self.ensure_open()?;
        self.lock_policy.obtain(self.fs.path(), name)
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let live = self.open.names();
        if !live.is_empty() {
            // 句柄归调用方；这里只记录，不强关
            tracing::debug!(
                "BufferedDirectory {:?} closing with {} live inputs: {:?}",
                self.fs.path(),
                live.len(),
                live
            );
        }
        tracing::info!("BufferedDirectory closed at {:?}", self.fs.path());
        self.fs.sync_dir()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
