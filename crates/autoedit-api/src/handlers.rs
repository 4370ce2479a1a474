//! Request handlers.

pub mod health;
pub mod jobs;
pub mod process;

pub use health::*;
pub use jobs::*;
pub use process::*;
