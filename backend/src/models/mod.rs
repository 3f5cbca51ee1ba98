//! Data models shared by the API surface and the backend clients.
//!
//! Field names follow the wire formats of the Crosscut job service and the DHIS2 web API.

mod geo;
mod hierarchy;
mod job;
mod table;

pub use geo::*;
pub use hierarchy::*;
pub use job::*;
pub use table::*;
