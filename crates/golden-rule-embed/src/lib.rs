//! Text embedding collaborators used to fingerprint editing patterns and to
//! vectorize incoming text before ranking.

pub mod config;
pub mod error;
pub mod factory;
pub mod providers;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::ProviderError;
pub use factory::*;
pub use traits::*;
pub use types::*;
