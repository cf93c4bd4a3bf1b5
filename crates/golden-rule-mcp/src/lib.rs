//! Streaming gateway for pattern-guided text refinement: clients hold an
//! SSE stream open and submit JSON-RPC calls whose replies are also pushed
//! onto that stream.

pub mod config;
pub mod dispatcher;
pub mod http;
pub mod logging;
pub mod mine;
pub mod protocol;
pub mod redact;
pub mod refine;
pub mod registry;
pub mod server;
pub mod sse;

pub use config::{MineConfig, ServerConfig};
pub use dispatcher::Dispatcher;
pub use refine::{RefineError, Refinement, Refiner};
pub use registry::{ConnectionHandle, ConnectionRegistry, Registration};
pub use server::{build_refiner_from_env, GoldenRuleServer, StartupError};
