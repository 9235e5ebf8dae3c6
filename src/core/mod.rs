pub mod classify;
pub mod layout;

pub use classify::*;
pub use layout::*;
