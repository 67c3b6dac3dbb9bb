//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::config::ConfidencePolicy;
use crate::engine::BundleRequest;
use crate::model::DEFAULT_MODEL_DIR;

/// Product bundle recommendations from transaction co-occurrence statistics
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// JSON file overriding engine defaults (heuristic weights, squash constants, ...)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    /// Log filter for this run: a parseable `RUST_LOG` value wins, otherwise
    /// the crate logs at info, or debug with `--verbose`.
    pub fn log_filter(&self, rust_log: Option<&str>) -> EnvFilter {
        if let Some(directives) = rust_log.filter(|d| !d.trim().is_empty()) {
            match EnvFilter::try_new(directives) {
                Ok(filter) => return filter,
                Err(e) => eprintln!("ignoring invalid RUST_LOG '{directives}': {e}"),
            }
        }
        let level = if self.verbose { "debug" } else { "info" };
        EnvFilter::new(format!("bundleforge={level}"))
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rank product pairs by predicted bundle success
    Recommend(RecommendArgs),
    /// Export the unscored pair feature table for labelling
    Features(FeaturesArgs),
    /// Fit the bundle-success model from labelled historical bundles
    Train(TrainArgs),
}

/// Where transactions come from and how their columns are named
#[derive(ClapArgs, Debug, Clone)]
pub struct TransactionArgs {
    /// Path to the transaction CSV file
    #[arg(short, long, default_value = "transactions.csv")]
    pub input: PathBuf,

    /// Column holding the transaction id
    #[arg(long, default_value = "InvoiceNo")]
    pub tx_column: String,

    /// Column holding the item id
    #[arg(long, default_value = "StockCode")]
    pub item_column: String,

    /// Optional column with unit prices
    #[arg(long)]
    pub price_column: Option<String>,

    /// Optional column with item categories
    #[arg(long)]
    pub category_column: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RecommendArgs {
    #[command(flatten)]
    pub transactions: TransactionArgs,

    /// Number of bundles to return
    #[arg(short = 'n', long, default_value = "20")]
    pub top_n: usize,

    /// Minimum pair support
    #[arg(long, default_value = "0.001")]
    pub min_support: f64,

    /// Minimum rule confidence
    #[arg(long, default_value = "0.1")]
    pub min_confidence: f64,

    /// Override how the confidence threshold treats the two rule directions
    #[arg(long, value_enum)]
    pub confidence_policy: Option<ConfidencePolicy>,

    /// Directory holding the trained bundle model
    #[arg(long, default_value = DEFAULT_MODEL_DIR)]
    pub model_dir: PathBuf,

    /// Ignore any trained model and score with the heuristic
    #[arg(long)]
    pub heuristic_only: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Optional PNG path for a score chart
    #[arg(long)]
    pub plot: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct FeaturesArgs {
    #[command(flatten)]
    pub transactions: TransactionArgs,

    /// Output CSV path
    #[arg(short, long, default_value = "bundle_features.csv")]
    pub output: PathBuf,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct TrainArgs {
    /// CSV of historical bundles with feature columns and an outcome label
    #[arg(short, long)]
    pub input: PathBuf,

    /// Column holding the 0/1 outcome
    #[arg(long, default_value = "was_successful")]
    pub outcome_column: String,

    /// Directory the model artifact is written to
    #[arg(long, default_value = DEFAULT_MODEL_DIR)]
    pub model_dir: PathBuf,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl TransactionArgs {
    fn request(&self) -> BundleRequest {
        let mut request = BundleRequest::new(&self.tx_column, &self.item_column);
        request.price_column = self.price_column.clone();
        request.category_column = self.category_column.clone();
        request
    }
}

impl RecommendArgs {
    /// Build the engine request, validating thresholds up front
    pub fn to_request(&self) -> crate::Result<BundleRequest> {
        let mut request = self.transactions.request();
        request.top_n = self.top_n;
        request.min_support = self.min_support;
        request.min_confidence = self.min_confidence;
        request.validate()?;
        Ok(request)
    }
}

impl FeaturesArgs {
    pub fn to_request(&self) -> BundleRequest {
        let mut request = self.transactions.request();
        request.min_support = 0.0;
        request.min_confidence = 0.0;
        request
    }
}
