//! # sfmcp
//!
//! MCP server that answers Salesforce questions by shelling out to the `sf` CLI.
//!
//! ## Architecture
//!
//! ```text
//! MCP client  ←stdio→  McpServer  →  Tool  →  SalesforceApi (SfCli)  →  sf --json
//! ```
//!
//! - **McpServer**: JSON-RPC dispatch for tools, resources and prompts
//! - **Tool**: argument validation and reshaping of CLI records into typed output
//! - **SfCli**: subprocess execution, envelope unwrapping, flow retrieval
//! - **SfmcpConfig**: startup configuration (file, environment, flags)

pub mod config;
pub mod logging;
pub mod mcp;
pub mod sf;
pub mod tools;

pub use config::SfmcpConfig;
pub use mcp::McpServer;
pub use sf::{SalesforceApi, SfCli, SfError};
