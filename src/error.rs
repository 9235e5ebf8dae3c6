use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, StoreError>;

/// 目录层统一错误。
///
/// 后端错误原样向上传播，本层不做重试；扩展名配置不做校验
/// （写错的扩展名只是永远匹配不上任何文件，不会报错）。
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("file not found: {name} (in {})", root.display())]
    NotFound { name: String, root: PathBuf },

    #[error("file already exists: {name} (in {})", root.display())]
    AlreadyExists { name: String, root: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("directory already closed: {}", .0.display())]
    Closed(PathBuf),

    #[error("invalid storage location {}: {reason}", path.display())]
    InvalidLocation { path: PathBuf, reason: &'static str },

    #[error("invalid file name {0:?}: must be a single path segment")]
    InvalidName(String),

    #[error("cannot rename {from} -> {to}: names belong to different backends")]
    CrossBackendRename { from: String, to: String },

    #[error("lock already held: {}", .0.display())]
    LockHeld(PathBuf),

    #[error("invalid setting {key}: {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("failed to close both backends; primary: {primary}; secondary: {secondary}")]
    CloseFailed {
        primary: Box<StoreError>,
        secondary: Box<StoreError>,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, StoreError::Closed(_))
    }

    pub fn is_invalid_name(&self) -> bool {
        matches!(self, StoreError::InvalidName(_))
    }

    /// 把 io::Error 归类：NotFound / AlreadyExists 单独成类，其余一律 Io。
    pub(crate) fn from_io(root: &Path, name: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound {
                name: name.to_string(),
                root: root.to_path_buf(),
            },
            std::io::ErrorKind::AlreadyExists => StoreError::AlreadyExists {
                name: name.to_string(),
                root: root.to_path_buf(),
            },
            _ => StoreError::Io {
                path: root.join(name),
                source: err,
            },
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}
