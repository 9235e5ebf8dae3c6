pub mod core;
pub mod directory;
pub mod error;
pub mod settings;
pub mod stats;
pub mod storage;

pub use crate::core::{classify, PreloadExtensions, Route};
pub use crate::directory::{DirectoryFactory, StoreDirectory, SwitchingDirectory};
pub use crate::error::{Result, StoreError};
pub use crate::settings::Settings;
pub use crate::storage::{Directory, LockPolicy};
