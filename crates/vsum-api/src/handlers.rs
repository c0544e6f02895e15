//! Request handlers.

pub mod health;
pub mod info;
pub mod status;
pub mod summary;
pub mod upload;

pub use health::*;
pub use info::*;
pub use status::*;
pub use summary::*;
pub use upload::*;
