//! Error types for the Herbie protocol layer.

mod command;
mod page;
mod store;

pub use command::*;
pub use page::*;
pub use store::*;
