//! Tool plumbing for Codewright.
//!
//! - [`ToolRegistry`] tracks tool providers, aggregates their tools and
//!   resolves a tool name to the provider that executes it.
//! - [`BuiltinToolProvider`] bundles the in-process filesystem tools.
//! - [`McpToolProvider`] talks to an MCP server over a child process's stdio.

pub mod builtin;
pub mod file_read;
pub mod file_write;
pub mod list_directory;
pub mod mcp;
pub mod registry;
pub mod schema;

pub use builtin::BuiltinToolProvider;
pub use mcp::McpToolProvider;
pub use registry::{TeardownReport, ToolRegistry};
pub use schema::sanitize_schema;
