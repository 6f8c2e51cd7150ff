//! bsl-mcp -- standalone MCP server for BSL Language Server.
//!
//! Usage: bsl-mcp --jar <bsl-language-server.jar> [--java <path>]
//!        [--memory-mb <n>] [--config <path>] [--log-level <level>]

use anyhow::Context;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = bsl_mcp::BslConfig::from_sources(&args, |key| std::env::var(key).ok())
        .context("invalid startup configuration")?;

    bsl_mcp::logging::init(config.log_level).context("failed to initialize logging")?;

    bsl_mcp::run_mcp_server(config)
}
