//! Electrumz probe - exercise an Electrum server over JSON-RPC.
//!
//! Connects once, then either issues a single method call or walks the
//! known Electrum method catalogue, printing each response as JSON.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use electrumz_client::config::ClientConfig;
use electrumz_client::models::{Response, ELECTRUM_METHODS};
use electrumz_client::rpc::{RpcClient, RpcError};

#[derive(Debug, Parser)]
#[command(name = "electrumz-probe", version, about)]
struct Cli {
    /// Server host (overrides config and ELECTRUMZ_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Server port (overrides config and ELECTRUMZ_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Call every known Electrum method in turn
    #[arg(long)]
    all: bool,

    /// Method to call
    #[arg(default_value = "server.ping")]
    method: String,

    /// JSON-encoded params, e.g. '[100, 0]'
    #[arg(long, default_value = "[]")]
    params: String,
}

impl Cli {
    fn apply(&self, config: &mut ClientConfig) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(secs) = self.timeout {
            config.request_timeout = Duration::from_secs(secs);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "electrumz=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::load().context("Failed to load client config")?;
    cli.apply(&mut config);

    tracing::info!(
        "Starting electrumz-probe v{} against {}",
        env!("CARGO_PKG_VERSION"),
        config.address()
    );

    let client = RpcClient::connect_with_config(&config)
        .await
        .with_context(|| format!("Could not connect to {}", config.address()))?;

    if cli.all {
        for method in ELECTRUM_METHODS {
            report(method, client.request(method, Vec::new()).await);
        }
    } else {
        let params = parse_params(&cli.params)?;
        report(&cli.method, client.request(&cli.method, params).await);
    }

    client.shutdown().await;
    Ok(())
}

/// Parse `--params` as a JSON array; a bare scalar becomes a one-element list.
fn parse_params(raw: &str) -> Result<Vec<Value>> {
    let value: Value =
        serde_json::from_str(raw).with_context(|| format!("Invalid --params JSON: {}", raw))?;
    Ok(match value {
        Value::Array(items) => items,
        other => vec![other],
    })
}

fn report(method: &str, outcome: std::result::Result<Response, RpcError>) {
    match outcome {
        Ok(response) => match response.into_result() {
            Ok(result) => println!("{} -> {}", method, result),
            Err(e) => println!("{} !! {}", method, e),
        },
        Err(e) => {
            tracing::error!("{} failed: {}", method, e);
            eprintln!("{} failed: {}", method, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_params_array() {
        assert_eq!(parse_params("[100, 0]").unwrap(), vec![json!(100), json!(0)]);
        assert!(parse_params("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_params_scalar() {
        assert_eq!(parse_params("\"abc\"").unwrap(), vec![json!("abc")]);
    }

    #[test]
    fn test_parse_params_invalid() {
        assert!(parse_params("[1,").is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from(["electrumz-probe", "--host", "h", "--port", "1", "--timeout", "2"]);
        let mut config = ClientConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.address(), "h:1");
        assert_eq!(config.request_timeout, Duration::from_secs(2));
        assert_eq!(cli.method, "server.ping");
    }
}
