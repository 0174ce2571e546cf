//! Type definitions for the ccloud MCP server

mod config;
mod error;
mod mapping;
mod openapi;

pub use config::*;
pub use error::*;
pub use mapping::*;
pub use openapi::*;
