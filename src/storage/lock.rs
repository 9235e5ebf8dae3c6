use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Result, StoreError};
use crate::storage::fs::check_name;

/// 目录锁策略（两个后端共用同一策略）
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LockPolicy {
    /// flock(LOCK_EX | LOCK_NB)；进程退出由内核释放
    #[default]
    Native,
    /// create_new 锁文件；释放时删除
    Simple,
    /// 不加锁
    None,
}

impl FromStr for LockPolicy {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" => Ok(LockPolicy::Native),
            "simple" => Ok(LockPolicy::Simple),
            "none" => Ok(LockPolicy::None),
            other => Err(StoreError::InvalidSetting {
                key: crate::settings::FS_LOCK_SETTING.to_string(),
                reason: format!("unknown lock type {other:?}, expected native|simple|none"),
            }),
        }
    }
}

impl fmt::Display for LockPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LockPolicy::Native => "native",
            LockPolicy::Simple => "simple",
            LockPolicy::None => "none",
        })
    }
}

/// 已获取的锁；drop 即释放
#[derive(Debug)]
pub struct DirectoryLock {
    path: PathBuf,
    kind: LockPolicy,
    file: Option<File>,
}

impl DirectoryLock {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> LockPolicy {
        self.kind
    }
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        // Native：关闭 fd 即释放 flock
        drop(self.file.take());
        if self.kind == LockPolicy::Simple {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!("Failed to remove lock file {:?}: {}", self.path, e);
            }
        }
    }
}

impl LockPolicy {
    pub fn obtain(&self, dir: &Path, name: &str) -> Result<DirectoryLock> {
        check_name(name)?;
        let path = dir.join(name);
        let file = match self {
            LockPolicy::None => None,
            LockPolicy::Simple => {
                let f = OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&path)
                    .map_err(|e| match e.kind() {
                        std::io::ErrorKind::AlreadyExists => StoreError::LockHeld(path.clone()),
                        _ => StoreError::io(&path, e),
                    })?;
                Some(f)
            }
            LockPolicy::Native => Some(native_lock(&path)?),
        };
        tracing::debug!("lock obtained: {:?} ({})", path, self);
        Ok(DirectoryLock {
            path,
            kind: *self,
            file,
        })
    }
}

#[cfg(unix)]
fn native_lock(path: &Path) -> Result<File> {
    use std::os::unix::io::AsRawFd;

    let f = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| StoreError::io(path, e))?;
    let rc = unsafe { libc::flock(f.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        return Err(match err.raw_os_error() {
            Some(code) if code == libc::EWOULDBLOCK => StoreError::LockHeld(path.to_path_buf()),
            _ => StoreError::io(path, err),
        });
    }
    Ok(f)
}

#[cfg(not(unix))]
fn native_lock(path: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => StoreError::LockHeld(path.to_path_buf()),
            _ => StoreError::io(path, e),
        })
}
