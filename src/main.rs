//! http-relay: generic HTTP forwarding proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────────┐
//!                       │                    HTTP RELAY                    │
//!                       │                                                  │
//!   POST /proxy         │  ┌─────────┐    ┌──────────┐    ┌────────────┐   │
//!   {url, method, ...}  │  │  http   │───▶│  relay   │───▶│  upstream  │───┼──▶ Upstream
//!   ────────────────────┼─▶│ server  │    │  spec    │    │  client    │   │    Server
//!                       │  └─────────┘    └──────────┘    └─────┬──────┘   │
//!                       │                                       │          │
//!   status, headers,    │  ┌─────────┐    ┌──────────┐          │          │
//!   exact body bytes    │  │response │◀───│  decode  │◀─────────┘          │
//!   ◀───────────────────┼──│ writer  │    │          │                     │
//!                       │  └─────────┘    └──────────┘                     │
//!                       │                                                  │
//!                       │  config · observability (redacted logs,          │
//!                       │  metrics) · lifecycle (signals, shutdown)        │
//!                       └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use http_relay::config::load_config;
use http_relay::lifecycle;

#[derive(Parser)]
#[command(name = "http-relay", version, about = "Generic HTTP forwarding proxy")]
struct Args {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    lifecycle::start(config).await?;
    Ok(())
}
