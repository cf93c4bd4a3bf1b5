#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use golden_rule_embed::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse};
use golden_rule_llm::{CompletionProvider, CompletionRequest, CompletionResponse};
use golden_rule_mcp::{ConnectionRegistry, GoldenRuleServer, Refiner, ServerConfig};
use golden_rule_patterns::{
    EditCategory, PatternExample, PatternStore, PromptComposer, RetrievalEngine,
};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

pub const REFINED: &str = "この点は、とても重要です。";

/// Formatted log output collected by a thread-local subscriber.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Routes events on the current thread into the returned buffer until the
/// guard is dropped.
pub fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    (logs, tracing::subscriber::set_default(subscriber))
}

/// One dimension per category keyword; texts without a keyword get a flat
/// low-magnitude vector.
#[derive(Default)]
pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
}

impl KeywordEmbedder {
    fn vector(text: &str) -> Vec<f32> {
        ["順序", "簡潔", "口調", "明確", "冗長"]
            .iter()
            .map(|k| if text.contains(k) { 1.0 } else { 0.05 })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn embed(
        &self,
        request: EmbeddingRequest,
    ) -> Result<EmbeddingResponse, golden_rule_embed::ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(EmbeddingResponse {
            provider: "keyword".to_string(),
            model: "keyword".to_string(),
            vectors: request.inputs.iter().map(|t| Self::vector(t)).collect(),
            usage_tokens: None,
        })
    }
}

pub enum CompletionBehavior {
    Reply(String),
    Fail(String),
    Stall(Duration),
}

pub struct ScriptedCompletion {
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
    behavior: CompletionBehavior,
}

impl ScriptedCompletion {
    pub fn new(behavior: CompletionBehavior) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            behavior,
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(CompletionBehavior::Reply(text.to_string()))
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletion {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, golden_rule_llm::ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = request.messages.last() {
            self.prompts.lock().push(message.content.clone());
        }
        let text = match &self.behavior {
            CompletionBehavior::Reply(text) => text.clone(),
            CompletionBehavior::Fail(body) => {
                return Err(golden_rule_llm::ProviderError::Api {
                    status: 401,
                    body: body.clone(),
                });
            }
            CompletionBehavior::Stall(delay) => {
                tokio::time::sleep(*delay).await;
                String::new()
            }
        };
        Ok(CompletionResponse {
            provider: "scripted".to_string(),
            model: "scripted".to_string(),
            text: text.trim().to_string(),
            usage_tokens: None,
        })
    }
}

pub fn fixture_store() -> PatternStore {
    let mut store = PatternStore::default();
    for (category, description, before, after) in [
        (
            EditCategory::Reordering,
            "段落の順序を入れ替えた",
            "結論。背景。",
            "背景。結論。",
        ),
        (
            EditCategory::Simplification,
            "表現を簡潔にした",
            "することができます。",
            "できます。",
        ),
        (
            EditCategory::ToneAdjustment,
            "口調を揃えた",
            "だ。です。",
            "です。です。",
        ),
        (
            EditCategory::Clarity,
            "主語を明確にした",
            "重要です。",
            "この点は重要です。",
        ),
        (
            EditCategory::RedundancyRemoval,
            "冗長な言い回しを削った",
            "まず最初に",
            "最初に",
        ),
    ] {
        store.insert(
            category,
            PatternExample {
                filename: None,
                description: description.to_string(),
                steps: vec!["該当箇所を探す".to_string(), "書き換える".to_string()],
                example_before: before.to_string(),
                example_after: after.to_string(),
            },
        );
    }
    store
}

pub struct Fixture {
    pub embedder: Arc<KeywordEmbedder>,
    pub completion: Arc<ScriptedCompletion>,
    pub refiner: Arc<Refiner>,
}

impl Fixture {
    /// Embedder calls made while computing fingerprints are not counted.
    pub fn embed_calls(&self) -> usize {
        self.embedder.calls.load(Ordering::SeqCst)
    }

    pub fn completion_calls(&self) -> usize {
        self.completion.calls.load(Ordering::SeqCst)
    }
}

pub async fn fixture(completion: ScriptedCompletion, timeout: Option<Duration>) -> Fixture {
    let store = Arc::new(fixture_store());
    let embedder = Arc::new(KeywordEmbedder::default());
    let completion = Arc::new(completion);
    let engine = RetrievalEngine::build(&store, embedder.clone(), 3)
        .await
        .expect("build engine");
    embedder.calls.store(0, Ordering::SeqCst);
    let refiner = Refiner::new(
        engine,
        PromptComposer::new(store),
        completion.clone(),
        timeout,
    );
    Fixture {
        embedder,
        completion,
        refiner: Arc::new(refiner),
    }
}

pub async fn spawn_server(refiner: Arc<Refiner>) -> (SocketAddr, ConnectionRegistry) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let config = ServerConfig {
        keepalive: Duration::from_secs(60),
        ..ServerConfig::default()
    };
    let server = GoldenRuleServer::new(&config, refiner);
    let registry = server.registry().clone();
    tokio::spawn(server.serve(listener));
    (addr, registry)
}

pub struct HttpReply {
    pub status: u16,
    pub body: Value,
}

pub async fn send_http(
    addr: SocketAddr,
    method: &str,
    path: &str,
    headers: &[(&str, &str)],
    body: &str,
) -> HttpReply {
    let extra = headers
        .iter()
        .map(|(name, value)| format!("{name}: {value}\r\n"))
        .collect::<String>();
    let request = format!(
        "{method} {path} HTTP/1.1\r\nHost: {addr}\r\nContent-Type: application/json\r\n{extra}Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    send_raw(addr, &request).await
}

pub async fn send_raw(addr: SocketAddr, request: &str) -> HttpReply {
    send_bytes(addr, request.as_bytes()).await
}

pub async fn send_bytes(addr: SocketAddr, request: &[u8]) -> HttpReply {
    let mut stream = TcpStream::connect(addr).await.expect("connect http");
    stream.write_all(request).await.expect("write request");
    let mut raw = String::new();
    stream.read_to_string(&mut raw).await.expect("read response");
    let (head, body) = raw.split_once("\r\n\r\n").expect("response head");
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .expect("status code");
    HttpReply {
        status,
        body: serde_json::from_str(body).unwrap_or(Value::Null),
    }
}

pub async fn post_rpc(addr: SocketAddr, client_id: Option<&str>, body: &str) -> HttpReply {
    match client_id {
        Some(id) => send_http(addr, "POST", "/sse", &[("X-Client-Id", id)], body).await,
        None => send_http(addr, "POST", "/sse", &[], body).await,
    }
}

pub struct StreamClient {
    pub client_id: String,
    pub lines: BufReader<OwnedReadHalf>,
    pub writer: OwnedWriteHalf,
}

impl StreamClient {
    pub async fn open(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect stream");
        let (read_half, mut writer) = stream.into_split();
        writer
            .write_all(b"GET /sse HTTP/1.1\r\nAccept: text/event-stream\r\n\r\n")
            .await
            .expect("write stream request");
        let mut lines = BufReader::new(read_half);
        let mut status = String::new();
        lines.read_line(&mut status).await.expect("status line");
        assert_eq!(status.trim_end(), "HTTP/1.1 200 OK");
        let mut client = Self {
            client_id: String::new(),
            lines,
            writer,
        };
        let announcement = client.next_event().await;
        assert_eq!(announcement["method"], "initialize");
        client.client_id = announcement["params"]["clientId"]
            .as_str()
            .expect("client id")
            .to_string();
        client
    }

    /// Next `data:` payload, skipping headers and keepalive comments.
    pub async fn next_event(&mut self) -> Value {
        let read = async {
            loop {
                let mut line = String::new();
                let n = self.lines.read_line(&mut line).await.expect("read line");
                assert!(n > 0, "stream closed before the next event");
                if let Some(data) = line.strip_prefix("data: ") {
                    return serde_json::from_str::<Value>(data.trim_end()).expect("event json");
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(5), read)
            .await
            .expect("event within 5s")
    }
}

/// Polls until the registry holds `expected` connections.
pub async fn wait_for_connections(registry: &ConnectionRegistry, expected: usize) {
    for _ in 0..200 {
        if registry.len() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("registry never reached {expected} connections (has {})", registry.len());
}
