use std::io;

use golden_rule_llm::{build_completion_provider, CompletionProviderConfig};
use golden_rule_mcp::logging::init_tracing;
use golden_rule_mcp::mine::mine_patterns;
use golden_rule_mcp::redact::sanitize_sensitive;
use golden_rule_mcp::MineConfig;
use golden_rule_patterns::load_document_pairs;

fn main() -> io::Result<()> {
    init_tracing();
    let config = MineConfig::from_env();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(config))
}

async fn run(config: MineConfig) -> io::Result<()> {
    let pairs = load_document_pairs(&config.raw_dir, &config.refined_dir).map_err(failure)?;
    let provider = CompletionProviderConfig::from_env()
        .and_then(build_completion_provider)
        .map_err(failure)?;
    tracing::info!(
        pairs = pairs.len(),
        raw_dir = %config.raw_dir.display(),
        "mining editing patterns"
    );

    let (store, report) = mine_patterns(&pairs, provider.as_ref()).await;
    if let Some(parent) = config.output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    store.save(&config.output_path).map_err(failure)?;
    tracing::info!(
        processed = report.processed,
        classified = report.classified,
        failed = report.failed.len(),
        categories = store.len(),
        output = %config.output_path.display(),
        "pattern store written"
    );
    Ok(())
}

fn failure(err: impl std::fmt::Display) -> io::Error {
    let message = sanitize_sensitive(&err.to_string());
    tracing::error!(error = %message, "mining failed");
    io::Error::other(message)
}
