use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use memmap2::{Mmap, MmapOptions};

use crate::core::Route;
use crate::error::{Result, StoreError};
use crate::stats::DirectoryStats;
use crate::storage::fs::FsRoot;
use crate::storage::input::{IndexInput, IndexOutput, MmapInput, OpenTable};
use crate::storage::lock::{DirectoryLock, LockPolicy};
use crate::storage::Directory;

const PAGE_SIZE: usize = 4096;

/// mmap 后端：每次 `open_input` 针对当时打开的那个文件新建只读映射，
/// 映射随句柄一起释放。不按文件名缓存映射：删除后同名重建的文件
/// 总是读到新内容。
///
/// preload 打开时，映射建立即 populate 并逐页触碰，
/// 把缺页成本前移到 open。只影响性能，不影响读到的内容。
pub struct MmapDirectory {
    fs: FsRoot,
    lock_policy: LockPolicy,
    preload: bool,
    regions: Arc<OpenTable>,
    closed: AtomicBool,
}

impl MmapDirectory {
    pub fn open(root: impl Into<PathBuf>, lock_policy: LockPolicy) -> Result<Self> {
        let fs = FsRoot::create(root.into())?;
        tracing::info!("MmapDirectory opened at {:?} (lock: {})", fs.path(), lock_policy);
        Ok(Self {
            fs,
            lock_policy,
            preload: false,
            regions: Arc::new(OpenTable::default()),
            closed: AtomicBool::new(false),
        })
    }

    /// 仅在构造期调用；对之后新建的映射生效。
    pub fn set_preload(&mut self, enabled: bool) {
        if self.preload != enabled {
            tracing::debug!("MmapDirectory {:?}: preload={}", self.fs.path(), enabled);
        }
        self.preload = enabled;
    }

    pub fn is_preload(&self) -> bool {
        self.preload
    }

    pub fn lock_policy(&self) -> LockPolicy {
        self.lock_policy
    }

    /// 存活句柄持有的映射区数量
    pub fn mapped_regions(&self) -> usize {
        self.regions.len()
    }

    pub fn mapped_bytes(&self) -> u64 {
        self.regions.bytes()
    }

    pub fn stats(&self) -> Result<DirectoryStats> {
        self.ensure_open()?;
        let names = self.fs.list()?;
        Ok(DirectoryStats {
            route: Route::Mapped,
            root: self.fs.path().to_path_buf(),
            file_count: names.len(),
            total_bytes: self.fs.total_bytes(&names),
            preload: self.preload,
            mapped_regions: self.mapped_regions(),
            mapped_bytes: self.mapped_bytes(),
            open_inputs: 0,
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed(self.fs.path().to_path_buf()));
        }
        Ok(())
    }

    fn map_file(&self, name: &str) -> Result<Option<Mmap>> {
        let (file, len) = self.fs.open_read(name)?;
        if len == 0 {
            return Ok(None);
        }

        let mut opts = MmapOptions::new();
        if self.preload {
            opts.populate();
        }
        let map = unsafe { opts.map(&file) }.map_err(|e| self.fs.err(name, e))?;
        if self.preload {
            preload_pages(&map);
            tracing::debug!("preloaded {} ({} bytes)", name, len);
        }
        Ok(Some(map))
    }
}

/// 逐页读一个字节，强制缺页
fn preload_pages(map: &Mmap) {
    advise_will_need(map);
    let mut acc = 0u8;
    for off in (0..map.len()).step_by(PAGE_SIZE) {
        acc = acc.wrapping_add(map[off]);
    }
    std::hint::black_box(acc);
}

#[cfg(unix)]
fn advise_will_need(map: &Mmap) {
    if let Err(e) = map.advise(memmap2::Advice::WillNeed) {
        tracing::debug!("madvise(WILLNEED) failed: {}", e);
    }
}

#[cfg(not(unix))]
fn advise_will_need(_map: &Mmap) {}

impl Directory for MmapDirectory {
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
        let map = self.map_file(name)?;
        Ok(IndexInput::Mapped(MmapInput::open(&self.regions, name, map)))
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
        let detached = self.regions.detach_all();
        tracing::info!(
            "MmapDirectory closed at {:?} ({} live regions detached)",
            self.fs.path(),
            detached
        );
        self.fs.sync_dir()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
