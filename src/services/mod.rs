//! Service implementations for the ccloud MCP server

mod classify;
mod invoke;
mod loader;
mod registry;
mod routing;

pub use classify::*;
pub use invoke::*;
pub use loader::*;
pub use registry::*;
pub use routing::*;
