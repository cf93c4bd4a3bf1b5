//! Editing patterns mined from raw/refined document pairs, and the machinery
//! that turns them into rewrite instructions: per-category fingerprints,
//! similarity ranking and prompt composition.

pub mod category;
pub mod compose;
pub mod fingerprint;
pub mod mining;
pub mod retrieval;
pub mod store;

pub use category::EditCategory;
pub use compose::{GOLDEN_RULES, PromptComposer};
pub use fingerprint::{CategoryFingerprint, cosine_similarity, mean_vector};
pub use mining::{Classification, DocumentPair, classification_prompt, load_document_pairs, parse_classification};
pub use retrieval::{DEFAULT_TOP_N, RetrievalEngine, RetrievalError};
pub use store::{PatternError, PatternExample, PatternStore};
