use std::path::{Path, PathBuf};

use crate::core::derive_secondary_path;
use crate::error::Result;
use crate::settings::Settings;
use crate::stats::StoreStats;
use crate::storage::{
    BufferedDirectory, Directory, DirectoryLock, IndexInput, IndexOutput, LockPolicy,
    MmapDirectory,
};

use super::SwitchingDirectory;

/// 工厂的产物：要么只有 mmap 后端，要么是切换目录。
pub enum StoreDirectory {
    Mapped(MmapDirectory),
    Switching(SwitchingDirectory),
}

impl StoreDirectory {
    pub fn is_switching(&self) -> bool {
        matches!(self, StoreDirectory::Switching(_))
    }

    /// 主（mmap）后端
    pub fn mapped(&self) -> &MmapDirectory {
        match self {
            StoreDirectory::Mapped(d) => d,
            StoreDirectory::Switching(s) => s.primary(),
        }
    }

    pub fn as_switching(&self) -> Option<&SwitchingDirectory> {
        match self {
            StoreDirectory::Switching(s) => Some(s),
            StoreDirectory::Mapped(_) => None,
        }
    }

    pub fn stats(&self) -> Result<StoreStats> {
        match self {
            StoreDirectory::Mapped(d) => Ok(StoreStats {
                primary: d.stats()?,
                secondary: None,
                conflicts: Vec::new(),
            }),
            StoreDirectory::Switching(s) => s.stats(),
        }
    }

    fn inner(&self) -> &dyn Directory {
        match self {
            StoreDirectory::Mapped(d) => d,
            StoreDirectory::Switching(s) => s,
        }
    }
}

impl Directory for StoreDirectory {
    fn root(&self) -> &Path {
        self.inner().root()
    }

    fn list_all(&self) -> Result<Vec<String>> {
        self.inner().list_all()
    }

    fn file_length(&self, name: &str) -> Result<u64> {
        self.inner().file_length(name)
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        self.inner().delete_file(name)
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.inner().rename(from, to)
    }

    fn open_input(&self, name: &str) -> Result<IndexInput> {
        self.inner().open_input(name)
    }

    fn create_output(&self, name: &str) -> Result<IndexOutput> {
        self.inner().create_output(name)
    }

    fn sync(&self, names: &[&str]) -> Result<()> {
        self.inner().sync(names)
    }

    fn obtain_lock(&self, name: &str) -> Result<DirectoryLock> {
        self.inner().obtain_lock(name)
    }

    fn close(&self) -> Result<()> {
        self.inner().close()
    }

    fn is_closed(&self) -> bool {
        self.inner().is_closed()
    }
}

/// 分片打开时构造存储目录
pub struct DirectoryFactory;

impl DirectoryFactory {
    /// 1. 在 `location` 建 mmap 后端
    /// 2. 读 `index.store.preload`
    /// 3. 为空：直接返回 mmap 后端（不推导副路径、不建目录、不 preload）
    /// 4. 否则开启 preload；含 `*`：仍只返回 mmap 后端
    /// 5. 否则推导副路径，建缓冲后端，返回切换目录
    pub fn new_directory(
        location: impl Into<PathBuf>,
        lock_policy: LockPolicy,
        settings: &Settings,
    ) -> Result<StoreDirectory> {
        let location = location.into();
        let mut mapped = MmapDirectory::open(&location, lock_policy)?;

        let extensions = settings.preload_extensions();
        if extensions.is_empty() {
            return Ok(StoreDirectory::Mapped(mapped));
        }

        mapped.set_preload(true);
        if extensions.contains_wildcard() {
            tracing::info!("preload all files under {:?}", location);
            return Ok(StoreDirectory::Mapped(mapped));
        }

        let secondary_path = derive_secondary_path(&location)?;
        let secondary = BufferedDirectory::open(secondary_path, lock_policy)?;
        Ok(StoreDirectory::Switching(SwitchingDirectory::new(
            mapped, secondary, extensions,
        )))
    }

    /// 锁策略也从 settings 读（`index.store.fs.fs_lock`）
    pub fn from_settings(location: impl Into<PathBuf>, settings: &Settings) -> Result<StoreDirectory> {
        let lock_policy = settings.lock_policy()?;
        Self::new_directory(location, lock_policy, settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Route, SECONDARY_DIR_NAME};
    use crate::settings::{FS_LOCK_SETTING, PRELOAD_SETTING};
    use std::io::Write;

    fn unique_tmp_dir(tag: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("switchfs-factory-{}-{}", tag, nanos))
    }

    fn shard_location(base: &Path) -> PathBuf {
        base.join("nodes/0/indices/Zq8uuid/0/index")
    }

    fn preload(exts: &[&str]) -> Settings {
        Settings::builder()
            .put_list(PRELOAD_SETTING, exts.iter().copied())
            .build()
    }

    fn write_file(dir: &dyn Directory, name: &str, data: &[u8]) {
        let mut out = dir.create_output(name).unwrap();
        out.write_all(data).unwrap();
        out.finish().unwrap();
    }

    #[test]
    fn empty_preload_returns_bare_mapped_without_secondary() {
        let base = unique_tmp_dir("a");
        let location = shard_location(&base);
        let dir = DirectoryFactory::new_directory(&location, LockPolicy::None, &Settings::default())
            .unwrap();

        assert!(!dir.is_switching());
        assert!(!dir.mapped().is_preload());
        assert!(!base.join("nodes/0").join(SECONDARY_DIR_NAME).exists());
        assert_eq!(dir.root(), location.as_path());

        write_file(&dir, "_0.doc", b"x");
        assert!(location.join("_0.doc").exists());
        assert!(dir.stats().unwrap().secondary.is_none());
        dir.close().unwrap();
        std::fs::remove_dir_all(&base).unwrap();
    }

    #[test]
    fn wildcard_returns_preloaded_mapped_only() {
        let base = unique_tmp_dir("b");
        let location = shard_location(&base);
        let dir = DirectoryFactory::new_directory(&location, LockPolicy::None, &preload(&["*"]))
            .unwrap();

        assert!(!dir.is_switching());
        assert!(dir.mapped().is_preload());
        assert!(!base.join("nodes/0").join(SECONDARY_DIR_NAME).exists());

        for name in ["_0.dvd", "_0.doc", "segments_1"] {
            write_file(&dir, name, name.as_bytes());
            let input = dir.open_input(name).unwrap();
            assert_eq!(input.route(), Route::Mapped);
        }
        dir.close().unwrap();
        std::fs::remove_dir_all(&base).unwrap();
    }

    #[test]
    fn wildcard_mixed_with_extensions_still_mapped_only() {
        let base = unique_tmp_dir("b2");
        let location = shard_location(&base);
        let dir =
            DirectoryFactory::new_directory(&location, LockPolicy::None, &preload(&["*", "dvd"]))
                .unwrap();
        assert!(!dir.is_switching());
        assert!(dir.mapped().is_preload());
        std::fs::remove_dir_all(&base).unwrap();
    }

    #[test]
    fn extension_set_builds_switching_directory() {
        let base = unique_tmp_dir("c");
        let location = shard_location(&base);
        let dir = DirectoryFactory::new_directory(&location, LockPolicy::None, &preload(&["dvd"]))
            .unwrap();

        assert!(dir.is_switching());
        assert!(dir.mapped().is_preload());
        let switching = dir.as_switching().unwrap();
        let secondary_root = base.join("nodes/0/indices.io/Zq8uuid/0/index");
        assert_eq!(switching.secondary().root(), secondary_root.as_path());
        assert!(secondary_root.is_dir());

        write_file(&dir, "segment.dvd", b"dv");
        write_file(&dir, "segment.doc", b"doc");

        let dvd = dir.open_input("segment.dvd").unwrap();
        assert_eq!(dvd.route(), Route::Mapped);
        assert!(location.join("segment.dvd").exists());
        let doc = dir.open_input("segment.doc").unwrap();
        assert_eq!(doc.route(), Route::Buffered);
        assert!(secondary_root.join("segment.doc").exists());
        drop((dvd, doc));

        assert_eq!(
            dir.list_all().unwrap(),
            vec!["segment.doc".to_string(), "segment.dvd".to_string()]
        );

        dir.delete_file("segment.doc").unwrap();
        assert!(!secondary_root.join("segment.doc").exists());
        assert!(location.join("segment.dvd").exists());
        assert_eq!(dir.list_all().unwrap(), vec!["segment.dvd".to_string()]);

        dir.close().unwrap();
        dir.close().unwrap();
        std::fs::remove_dir_all(&base).unwrap();
    }

    #[test]
    fn reopening_reuses_same_secondary_directory() {
        let base = unique_tmp_dir("reopen");
        let location = shard_location(&base);
        let settings = preload(&["tim"]);

        let first = DirectoryFactory::new_directory(&location, LockPolicy::None, &settings).unwrap();
        write_file(&first, "_0.doc", b"persisted");
        first.close().unwrap();

        let second =
            DirectoryFactory::new_directory(&location, LockPolicy::None, &settings).unwrap();
        assert_eq!(
            second.open_input("_0.doc").unwrap().read_all().unwrap(),
            b"persisted"
        );
        second.close().unwrap();
        std::fs::remove_dir_all(&base).unwrap();
    }

    #[test]
    fn shallow_location_fails_only_when_switching() {
        let base = unique_tmp_dir("shallow");
        // 临时目录本身可能足够深，改用单层相对路径
        let shallow = PathBuf::from(format!(
            "switchfs-shallow-{}",
            base.file_name().unwrap().to_string_lossy()
        ));
        let err = DirectoryFactory::new_directory(&shallow, LockPolicy::None, &preload(&["dvd"]));
        assert!(matches!(
            err,
            Err(crate::error::StoreError::InvalidLocation { .. })
        ));
        let ok = DirectoryFactory::new_directory(&shallow, LockPolicy::None, &Settings::default());
        assert!(ok.is_ok());
        std::fs::remove_dir_all(&shallow).unwrap();
    }

    #[test]
    fn from_settings_reads_lock_policy() {
        let base = unique_tmp_dir("lock");
        let location = shard_location(&base);
        let settings = Settings::builder()
            .put_list(PRELOAD_SETTING, ["dvd"])
            .put(FS_LOCK_SETTING, "simple")
            .build();
        let dir = DirectoryFactory::from_settings(&location, &settings).unwrap();
        assert_eq!(dir.mapped().lock_policy(), LockPolicy::Simple);
        let lock = dir.obtain_lock("write.lock").unwrap();
        assert_eq!(lock.policy(), LockPolicy::Simple);
        drop(lock);
        std::fs::remove_dir_all(&base).unwrap();
    }
}
