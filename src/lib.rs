//! BundleForge: product bundle recommendations from transaction logs
//!
//! Pairs of items that co-occur across transactions are scored with
//! association-rule statistics (support, confidence, lift, Jaccard) and ranked
//! by a predicted bundle-success probability, produced by a trained logistic
//! model when one has been persisted or by a fixed heuristic otherwise.

pub mod cli;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod features;
pub mod model;
pub mod ranker;
pub mod scoring;
pub mod stats;
pub mod viz;

// Re-export public items for easier access
pub use cli::Args;
pub use config::{ConfidencePolicy, EngineConfig};
pub use data::{build_baskets, load_csv, Baskets};
pub use engine::{extract_candidates, recommend_bundles, BundleRecommendation, BundleRequest};
pub use error::BundleError;
pub use model::{fit_bundle_model, train_bundle_model, BundleModel, ModelStore};
pub use scoring::{ScoredBundle, ScoringStrategy};
pub use viz::{create_bundle_score_chart, print_bundle_table};

/// Common result type used throughout the library
pub type Result<T> = std::result::Result<T, BundleError>;
