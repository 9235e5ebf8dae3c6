pub mod buffered;
pub(crate) mod fs;
pub mod input;
pub mod lock;
pub mod mmap;

use std::path::Path;

use crate::error::Result;

/// 目录能力抽象：两种后端、SwitchingDirectory 与工厂返回值共用同一契约。
///
/// ## 契约
/// - 文件名都是相对 `root()` 的单层名字。
/// - 不存在的文件一律返回 `StoreError::NotFound`，不会去别处找。
/// - `close()` 幂等；close 之后除 `close()` 外的操作返回 `StoreError::Closed`。
/// - 已打开的 `IndexInput` 归调用方所有，drop 它不会关闭目录。
pub trait Directory: Send + Sync {
    fn root(&self) -> &Path;

    fn list_all(&self) -> Result<Vec<String>>;

    fn file_length(&self, name: &str) -> Result<u64>;

    fn delete_file(&self, name: &str) -> Result<()>;

    fn rename(&self, from: &str, to: &str) -> Result<()>;

    fn open_input(&self, name: &str) -> Result<IndexInput>;

    fn create_output(&self, name: &str) -> Result<IndexOutput>;

    fn sync(&self, names: &[&str]) -> Result<()>;

    fn obtain_lock(&self, name: &str) -> Result<DirectoryLock>;

    fn close(&self) -> Result<()>;

    fn is_closed(&self) -> bool;
}

pub use buffered::BufferedDirectory;
pub use input::{IndexInput, IndexOutput};
pub use lock::{DirectoryLock, LockPolicy};
pub use mmap::MmapDirectory;
