use std::io;
use std::sync::Arc;

use golden_rule_mcp::logging::init_tracing;
use golden_rule_mcp::redact::sanitize_sensitive;
use golden_rule_mcp::{build_refiner_from_env, GoldenRuleServer, ServerConfig};

fn main() -> io::Result<()> {
    init_tracing();
    let config = ServerConfig::from_env();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(config))
}

async fn run(config: ServerConfig) -> io::Result<()> {
    let refiner = build_refiner_from_env(&config).await.map_err(|err| {
        let message = sanitize_sensitive(&err.to_string());
        tracing::error!(error = %message, "startup failed");
        io::Error::other(message)
    })?;
    let server = GoldenRuleServer::new(&config, Arc::new(refiner));
    tokio::select! {
        served = server.serve_http(&config.http_addr) => served,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("shutting down");
            Ok(())
        }
    }
}
