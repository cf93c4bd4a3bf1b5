use std::path::PathBuf;
use std::time::Duration;

/// Process configuration, read once from `GOLDEN_RULE_*` variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_addr: String,
    pub patterns_path: PathBuf,
    pub keepalive: Duration,
    pub top_n: usize,
    /// Upper bound on one refinement (retrieval, composition and rewrite).
    /// `None` waits for the collaborators indefinitely.
    pub refine_timeout: Option<Duration>,
    /// Events buffered per stream before pushes are dropped.
    pub stream_queue: usize,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: "127.0.0.1:8000".to_string(),
            patterns_path: PathBuf::from("data/editing_patterns.json"),
            keepalive: Duration::from_secs(15),
            top_n: golden_rule_patterns::DEFAULT_TOP_N,
            refine_timeout: Some(Duration::from_secs(120)),
            stream_queue: 64,
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let refine_timeout_ms = env_u64("GOLDEN_RULE_REFINE_TIMEOUT_MS", 120_000, 0, 3_600_000);
        Self {
            http_addr: env_string("GOLDEN_RULE_HTTP_ADDR").unwrap_or(defaults.http_addr),
            patterns_path: env_string("GOLDEN_RULE_PATTERNS")
                .map_or(defaults.patterns_path, PathBuf::from),
            keepalive: Duration::from_millis(env_u64(
                "GOLDEN_RULE_KEEPALIVE_MS",
                15_000,
                100,
                300_000,
            )),
            top_n: env_usize("GOLDEN_RULE_TOP_N", defaults.top_n, 1, 5),
            refine_timeout: (refine_timeout_ms > 0).then(|| Duration::from_millis(refine_timeout_ms)),
            stream_queue: env_usize("GOLDEN_RULE_STREAM_QUEUE", defaults.stream_queue, 1, 4096),
            max_body_bytes: env_usize(
                "GOLDEN_RULE_MAX_BODY_BYTES",
                defaults.max_body_bytes,
                1024,
                64 * 1024 * 1024,
            ),
        }
    }
}

/// Offline pattern mining locations.
#[derive(Debug, Clone)]
pub struct MineConfig {
    pub raw_dir: PathBuf,
    pub refined_dir: PathBuf,
    pub output_path: PathBuf,
}

impl MineConfig {
    pub fn from_env() -> Self {
        Self {
            raw_dir: env_string("GOLDEN_RULE_RAW_DIR")
                .map_or_else(|| PathBuf::from("data/raw_markdown"), PathBuf::from),
            refined_dir: env_string("GOLDEN_RULE_REFINED_DIR")
                .map_or_else(|| PathBuf::from("data/refined_markdown"), PathBuf::from),
            output_path: env_string("GOLDEN_RULE_PATTERNS")
                .map_or_else(|| PathBuf::from("data/editing_patterns.json"), PathBuf::from),
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_u64(name: &str, default: u64, min: u64, max: u64) -> u64 {
    env_string(name)
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
        .clamp(min, max)
}

fn env_usize(name: &str, default: usize, min: usize, max: usize) -> usize {
    env_string(name)
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
        .clamp(min, max)
}
