//! send-tokens: runs one send attempt described by a JSON request file.

use std::path::PathBuf;

use eyre::{eyre, Result};

use send_tokens_adapters::SendAdapterConfig;

mod request;
mod send_bridge;

use request::SendRequest;
use send_bridge::SendBridge;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .ok_or_else(|| eyre!("usage: send-tokens <request.json>"))?;
    let request = SendRequest::load(&path)?;
    let config = SendAdapterConfig::from_env();
    tracing::info!(profile = ?config.runtime_profile, request = %path.display(), "starting send-tokens");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    let mut bridge = SendBridge::new(&request, &config)?;
    let report = bridge.run(&runtime, &request)?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
