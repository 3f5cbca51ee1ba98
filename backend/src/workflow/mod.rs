//! Workflows behind the admin UI: job creation, list sorting and publishing.
//!
//! UI-visible state is kept in plain values with pure transition functions; the
//! async functions here only sequence calls to the two backends.

mod create;
mod publish;
mod sort;
mod status;

pub use create::*;
pub use publish::*;
pub use sort::*;
pub use status::*;
