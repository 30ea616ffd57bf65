//! MCP (Model Context Protocol) server surface.
//!
//! ## Usage
//!
//! ```ignore
//! let api: Arc<dyn SalesforceApi> = Arc::new(SfCli::new(&config));
//! Arc::new(McpServer::new(api)).run_stdio().await?;
//! ```

pub mod prompts;
pub mod protocol;
pub mod resources;
pub mod server;

pub use server::McpServer;
