use std::io;
use std::sync::Arc;
use std::time::Duration;

use golden_rule_embed::{build_embedding_provider, EmbeddingProviderConfig};
use golden_rule_llm::{build_completion_provider, CompletionProviderConfig};
use golden_rule_patterns::{
    PatternError, PatternStore, PromptComposer, RetrievalEngine, RetrievalError,
};
use serde_json::json;
use thiserror::Error;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};

use crate::config::ServerConfig;
use crate::dispatcher::Dispatcher;
use crate::http::{read_http_request, write_http_response, HttpError, HttpRequest, HttpResponse};
use crate::protocol::PARSE_ERROR;
use crate::refine::Refiner;
use crate::registry::ConnectionRegistry;
use crate::sse::serve_stream;

const STREAM_PATHS: [&str; 2] = ["/sse", "/"];
const RPC_PATHS: [&str; 3] = ["/sse", "/", "/messages"];

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to load pattern store: {0}")]
    Patterns(#[from] PatternError),
    #[error("embedding provider: {0}")]
    Embedding(#[from] golden_rule_embed::ProviderError),
    #[error("completion provider: {0}")]
    Completion(#[from] golden_rule_llm::ProviderError),
    #[error("failed to build category fingerprints: {0}")]
    Fingerprints(#[from] RetrievalError),
}

/// Loads the pattern store, builds both providers from the environment and
/// computes the category fingerprints.
pub async fn build_refiner_from_env(config: &ServerConfig) -> Result<Refiner, StartupError> {
    let store = Arc::new(PatternStore::open(&config.patterns_path)?);
    let embedder = build_embedding_provider(EmbeddingProviderConfig::from_env()?)?;
    let completion = build_completion_provider(CompletionProviderConfig::from_env()?)?;
    tracing::info!(
        embedder = embedder.name(),
        completion = completion.name(),
        "providers ready"
    );
    let engine = RetrievalEngine::build(&store, embedder, config.top_n).await?;
    Ok(Refiner::new(
        engine,
        PromptComposer::new(store),
        completion,
        config.refine_timeout,
    ))
}

#[derive(Debug, Clone)]
pub struct GoldenRuleServer {
    dispatcher: Dispatcher,
    keepalive: Duration,
    max_body_bytes: usize,
}

impl GoldenRuleServer {
    pub fn new(config: &ServerConfig, refiner: Arc<Refiner>) -> Self {
        let registry = ConnectionRegistry::new(config.stream_queue);
        Self {
            dispatcher: Dispatcher::new(registry, refiner),
            keepalive: config.keepalive,
            max_body_bytes: config.max_body_bytes,
        }
    }

    pub const fn registry(&self) -> &ConnectionRegistry {
        self.dispatcher.registry()
    }

    pub async fn serve_http(self, addr: &str) -> io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Accepts connections until the listener fails; each connection runs on
    /// its own task.
    pub async fn serve(self, listener: TcpListener) -> io::Result<()> {
        tracing::info!(addr = %listener.local_addr()?, "golden-rule http listening");
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let server = self.clone();
                    tokio::spawn(async move {
                        if let Err(err) = server.handle_connection(stream).await {
                            tracing::debug!(%peer, error = %err, "http connection error");
                        }
                    });
                }
                Err(err) => tracing::warn!(error = %err, "http accept error"),
            }
        }
    }

    async fn handle_connection(&self, stream: TcpStream) -> Result<(), HttpError> {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let request = match read_http_request(&mut reader, self.max_body_bytes).await {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(()),
            Err(err @ HttpError::BodyTooLarge { .. }) => {
                let body = json!({"error": "payload_too_large", "message": err.to_string()});
                write_http_response(&mut write_half, &HttpResponse::json(413, &body)).await?;
                return Ok(());
            }
            Err(err @ HttpError::Malformed(_)) => {
                let body = json!({"error": "invalid_request", "message": err.to_string()});
                write_http_response(&mut write_half, &HttpResponse::json(400, &body)).await?;
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        if request.method == "GET" && STREAM_PATHS.contains(&request.path.as_str()) {
            serve_stream(self.registry(), reader, write_half, self.keepalive).await?;
            return Ok(());
        }
        let response = self.route(request).await;
        write_http_response(&mut write_half, &response).await?;
        Ok(())
    }

    async fn route(&self, request: HttpRequest) -> HttpResponse {
        let path = request.path.as_str();
        match request.method.as_str() {
            "GET" if path == "/health" => HttpResponse::json(
                200,
                &json!({
                    "status": "ok",
                    "connections": self.registry().len(),
                    "categories": self.dispatcher.refiner().category_count()
                }),
            ),
            "POST" if RPC_PATHS.contains(&path) => {
                let client_id = request
                    .header("x-client-id")
                    .or_else(|| request.query.get("clientId").map(String::as_str))
                    .map(str::trim)
                    .filter(|id| !id.is_empty());
                let reply = self.dispatcher.handle(&request.body, client_id).await;
                let status = if reply.error_code() == Some(PARSE_ERROR) {
                    400
                } else {
                    200
                };
                match serde_json::to_value(&reply) {
                    Ok(body) => HttpResponse::json(status, &body),
                    Err(err) => HttpResponse::text(500, err.to_string()),
                }
            }
            _ if path == "/health" || RPC_PATHS.contains(&path) => {
                HttpResponse::json(405, &json!({"error": "method_not_allowed"}))
            }
            _ => HttpResponse::json(404, &json!({"error": "not_found"})),
        }
    }
}
