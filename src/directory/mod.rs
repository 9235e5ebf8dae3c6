pub mod factory;
pub mod switching;

pub use factory::{DirectoryFactory, StoreDirectory};
pub use switching::SwitchingDirectory;
