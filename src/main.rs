mod config;
mod errors;
mod logging;
mod mcp;
mod security;
mod server;
mod stdio;
mod tools;
mod validation;


use crate::config::{Config, TransportKind};
use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    let mut config_path = PathBuf::from("devflow.toml");
    let mut transport: Option<TransportKind> = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                if i >= args.len() { eprintln!("--config requires a path"); std::process::exit(2); }
                config_path = PathBuf::from(&args[i]);
            }
            "--transport" => {
                i += 1;
                if i >= args.len() { eprintln!("--transport requires stdio or http"); std::process::exit(2); }
                transport = Some(args[i].parse()?);
            }
            other => {
                eprintln!("unknown argument: {other}");
                std::process::exit(2);
            }
        }
        i += 1;
    }

    let mut cfg = Config::load(&config_path).with_context(|| format!("loading config {}", config_path.display()))?;
    cfg.validate().context("validating config")?;
    if let Some(kind) = transport {
        cfg.transport.kind = kind;
    }
    let cfg = Arc::new(cfg);

    let host = mcp::host::Host::builder(cfg.server.info())
        .with(&tools::Configured::new(cfg.clone()))
        .context("registering capabilities")?
        .build(Arc::new(logging::TracingSink::new(cfg.server.name.clone())));

    info!(
        server = %cfg.server.name,
        version = %cfg.server.version,
        transport = ?cfg.transport.kind,
        tools = ?host.tool_names(),
        "devflow ready"
    );

    match cfg.transport.kind {
        TransportKind::Stdio => stdio::serve(host).await,
        TransportKind::Http => server::serve(cfg, host).await,
    }
}
