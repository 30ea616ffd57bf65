use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use sfmcp::{logging, McpServer, SalesforceApi, SfCli, SfmcpConfig};

#[derive(Debug, Parser)]
#[command(name = "sfmcp", version)]
#[command(about = "MCP server exposing Salesforce CLI queries as tools (stdio transport)")]
#[command(
    after_help = "Environment:\n  SF_ORG_ALIAS        Org alias passed as --target-org\n  SFMCP_SF_BIN        Path to the sf executable\n  SFMCP_WORKDIR       Directory sf runs in\n  SFMCP_TIMEOUT_SECS  Per-command timeout\n  SFMCP_LOG_LEVEL     Log filter (stderr only)\n  RUST_LOG            Overrides the log filter"
)]
struct Cli {
    /// Config file (default: ~/.sfmcp/sfmcp.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log at debug level to stderr
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Org alias or username for every sf command
    #[arg(long)]
    target_org: Option<String>,

    /// sf executable to run
    #[arg(long)]
    sf_bin: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SfmcpConfig::load_from(path)?,
        None => SfmcpConfig::load()?,
    };
    config.apply_process_env();
    if let Some(org) = cli.target_org {
        config.target_org = Some(org);
    }
    if let Some(bin) = cli.sf_bin {
        config.sf_bin = bin;
    }

    logging::init(&config.log_level, cli.debug);
    tracing::info!(
        sf_bin = %config.sf_bin,
        target_org = config.target_org.as_deref().unwrap_or("(default)"),
        "starting sfmcp"
    );

    let working_dir = config.resolved_working_dir();
    anyhow::ensure!(
        working_dir.is_dir(),
        "working directory {} does not exist",
        working_dir.display()
    );

    let api: Arc<dyn SalesforceApi> = Arc::new(SfCli::new(&config));
    Arc::new(McpServer::new(api))
        .run_stdio()
        .await
        .context("MCP stdio transport failed")
}
