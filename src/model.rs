//! Bundle-success classifier: offline training and the persisted artifact

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use linfa::prelude::*;
use linfa_logistic::LogisticRegression;
use ndarray::{Array1, Array2, Axis};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::config::TrainerConfig;
use crate::data::{float_column, has_column, string_column};
use crate::error::BundleError;
use crate::features::BundleCandidate;

/// Features the trainer uses, in order, when the historical table carries them
pub const TRAINING_FEATURES: &[&str] = &[
    "support",
    "lift",
    "min_confidence",
    "avg_confidence",
    "jaccard_similarity",
    "frequency_a",
    "frequency_b",
    "price_ratio",
    "is_cross_category",
];

pub const DEFAULT_MODEL_DIR: &str = "models";
const ARTIFACT_FILE: &str = "bundle_predictor.json";

/// A fitted logistic classifier together with the exact feature list it was fit on.
///
/// Inputs are standardized with the stored means and scales before the linear
/// term, so scoring replays the training transform without re-deriving it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleModel {
    pub feature_names: Vec<String>,
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub trained_at: DateTime<Utc>,
    pub n_samples: usize,
    /// Fraction of training rows labelled successful
    pub positive_rate: f64,
    /// Outcome value treated as success when fitting
    #[serde(default)]
    pub positive_class: String,
}

impl BundleModel {
    /// Reject artifacts whose vectors disagree in length or hold non-finite values
    pub fn validate(&self) -> crate::Result<()> {
        let n = self.feature_names.len();
        if n == 0 {
            return Err(BundleError::model_load("artifact declares no features"));
        }
        if self.means.len() != n || self.scales.len() != n || self.coefficients.len() != n {
            return Err(BundleError::model_load(format!(
                "artifact declares {} features but stores {} means, {} scales, {} coefficients",
                n,
                self.means.len(),
                self.scales.len(),
                self.coefficients.len()
            )));
        }
        let finite = self
            .means
            .iter()
            .chain(&self.scales)
            .chain(&self.coefficients)
            .chain(std::iter::once(&self.intercept))
            .all(|v| v.is_finite());
        if !finite || self.scales.iter().any(|s| *s == 0.0) {
            return Err(BundleError::model_load("artifact holds invalid parameters"));
        }
        Ok(())
    }

    /// Select the declared feature columns from each candidate; absent ones are 0
    pub fn feature_matrix(&self, candidates: &[BundleCandidate]) -> crate::Result<Array2<f64>> {
        let values: Vec<f64> = candidates
            .iter()
            .flat_map(|candidate| {
                self.feature_names
                    .iter()
                    .map(move |name| candidate.feature(name).unwrap_or(0.0))
            })
            .collect();
        Ok(Array2::from_shape_vec(
            (candidates.len(), self.feature_names.len()),
            values,
        )?)
    }

    /// Probability of the successful class for each row of `features`
    pub fn predict_proba(&self, features: &Array2<f64>) -> crate::Result<Array1<f64>> {
        if features.ncols() != self.coefficients.len() {
            return Err(BundleError::model_load(format!(
                "expected {} feature columns, got {}",
                self.coefficients.len(),
                features.ncols()
            )));
        }
        let means = Array1::from(self.means.clone());
        let scales = Array1::from(self.scales.clone());
        let coefficients = Array1::from(self.coefficients.clone());

        let standardized = (features - &means) / &scales;
        let logits = standardized.dot(&coefficients) + self.intercept;
        Ok(logits.mapv(|z| 1.0 / (1.0 + (-z).exp())))
    }
}

/// Fixed on-disk location of the model artifact
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl Default for ModelStore {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL_DIR)
    }
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.dir.join(ARTIFACT_FILE)
    }

    pub fn exists(&self) -> bool {
        self.artifact_path().is_file()
    }

    /// Replace the stored artifact wholesale.
    ///
    /// The artifact is written to a temporary file beside the target and then
    /// renamed over it, so readers never observe a partial blob.
    pub fn save(&self, model: &BundleModel) -> crate::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.artifact_path();

        let temp_file = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(temp_file.as_file());
            serde_json::to_writer_pretty(&mut writer, model)?;
            writer.flush()?;
        }
        temp_file
            .persist(&path)
            .map_err(|e| BundleError::Io(e.error))?;

        tracing::info!(path = %path.display(), "saved bundle model");
        Ok(path)
    }

    pub fn load(&self) -> crate::Result<BundleModel> {
        let path = self.artifact_path();
        let file = File::open(&path)
            .map_err(|e| BundleError::model_load(format!("cannot open '{}': {}", path.display(), e)))?;
        let model: BundleModel = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| BundleError::model_load(format!("corrupt artifact '{}': {}", path.display(), e)))?;
        model.validate()?;
        Ok(model)
    }
}

/// Fit a bundle-success classifier on historical outcomes and persist it.
///
/// Uses whichever of [`TRAINING_FEATURES`] the table carries, in that order;
/// null feature values count as 0 and rows with a null outcome are dropped.
/// Returns the path of the written artifact.
pub fn train_bundle_model(
    historical: &DataFrame,
    outcome_column: &str,
    store: &ModelStore,
    config: &TrainerConfig,
) -> crate::Result<PathBuf> {
    let model = fit_bundle_model(historical, outcome_column, config)?;
    store.save(&model)
}

/// Fit the classifier without persisting it
pub fn fit_bundle_model(
    historical: &DataFrame,
    outcome_column: &str,
    config: &TrainerConfig,
) -> crate::Result<BundleModel> {
    let outcomes = OutcomeLabels::resolve(historical, outcome_column)?;

    let feature_names: Vec<String> = TRAINING_FEATURES
        .iter()
        .filter(|name| has_column(historical, name))
        .map(|name| name.to_string())
        .collect();
    if feature_names.is_empty() {
        return Err(BundleError::missing_column(TRAINING_FEATURES[0]));
    }

    let columns = feature_names
        .iter()
        .map(|name| float_column(historical, name))
        .collect::<crate::Result<Vec<_>>>()?;

    let OutcomeLabels {
        rows: kept,
        labels,
        positive_class,
        dropped,
    } = outcomes;
    if dropped > 0 {
        tracing::warn!(dropped, outcome_column, "dropped rows with a null outcome");
    }
    let positives = labels.iter().filter(|&&label| label).count();

    let values: Vec<f64> = kept
        .iter()
        .flat_map(|&row| columns.iter().map(move |column| column[row].unwrap_or(0.0)))
        .collect();
    let raw = Array2::from_shape_vec((kept.len(), feature_names.len()), values)?;

    let (means, scales) = standardization(&raw);
    let standardized = (&raw - &means) / &scales;

    let dataset = Dataset::new(standardized, labels);
    let fitted = LogisticRegression::default()
        .alpha(config.alpha)
        .max_iterations(config.max_iterations)
        .fit(&dataset)
        .map_err(|e| BundleError::Training(e.to_string()))?;

    // The positive class of the fitted model may be either label; orient the
    // stored parameters so they always score `true`.
    let sign = if fitted.labels().pos.class { 1.0 } else { -1.0 };
    let coefficients: Vec<f64> = fitted.params().iter().map(|w| w * sign).collect();
    let intercept = fitted.intercept() * sign;

    let model = BundleModel {
        feature_names,
        means: means.to_vec(),
        scales: scales.to_vec(),
        coefficients,
        intercept,
        trained_at: Utc::now(),
        n_samples: kept.len(),
        positive_rate: positives as f64 / kept.len() as f64,
        positive_class,
    };
    model.validate()?;

    tracing::info!(
        samples = model.n_samples,
        features = model.feature_names.len(),
        positive_rate = model.positive_rate,
        positive_class = %model.positive_class,
        "fitted bundle model"
    );
    Ok(model)
}

/// Binary outcome labels for the rows that carry one
struct OutcomeLabels {
    rows: Vec<usize>,
    labels: Array1<bool>,
    positive_class: String,
    dropped: usize,
}

impl OutcomeLabels {
    /// Read the outcome column as a two-class label.
    ///
    /// Any dtype is accepted. When both classes parse as numbers the larger
    /// one is the success class (`1` over `0`, `2` over `1`); otherwise the
    /// lexicographically larger one is (`true` over `false`, `yes` over `no`).
    fn resolve(historical: &DataFrame, outcome_column: &str) -> crate::Result<Self> {
        let raw = string_column(historical, outcome_column)?;
        let dropped = raw.iter().filter(|value| value.is_none()).count();

        let classes: BTreeSet<&str> = raw.iter().flatten().map(|v| v.trim()).collect();
        if classes.len() < 2 {
            return Err(BundleError::InsufficientData {
                reason: format!(
                    "outcome column '{}' needs two classes, found {} among {} rows ({} null rows dropped)",
                    outcome_column,
                    classes.len(),
                    raw.len() - dropped,
                    dropped
                ),
            });
        }
        if classes.len() > 2 {
            let listed: Vec<&str> = classes.iter().take(5).copied().collect();
            return Err(BundleError::InvalidLabels {
                reason: format!(
                    "outcome column '{}' holds {} distinct values ({}), expected two",
                    outcome_column,
                    classes.len(),
                    listed.join(", ")
                ),
            });
        }

        let mut ordered: Vec<&str> = classes.into_iter().collect();
        let numeric: Option<Vec<f64>> = ordered.iter().map(|c| c.parse::<f64>().ok()).collect();
        if let Some(values) = numeric {
            if values[0] > values[1] {
                ordered.swap(0, 1);
            }
        }
        let positive_class = ordered[1].to_string();

        let mut rows = Vec::with_capacity(raw.len() - dropped);
        let mut labels = Vec::with_capacity(raw.len() - dropped);
        for (row, value) in raw.iter().enumerate() {
            if let Some(value) = value {
                rows.push(row);
                labels.push(value.trim() == positive_class);
            }
        }

        Ok(Self {
            rows,
            labels: Array1::from(labels),
            positive_class,
            dropped,
        })
    }
}

/// Column means and standard deviations; constant columns get a scale of 1
fn standardization(raw: &Array2<f64>) -> (Array1<f64>, Array1<f64>) {
    let means = raw
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(raw.ncols()));
    let scales = raw
        .std_axis(Axis(0), 0.0)
        .mapv(|s| if s > 0.0 && s.is_finite() { s } else { 1.0 });
    (means, scales)
}

/// Path where a trained model would be read from, for reporting
pub fn describe_store(store: &ModelStore) -> String {
    let path = store.artifact_path();
    if store.exists() {
        format!("{} (present)", path.display())
    } else {
        format!("{} (absent)", path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;
    use tempfile::tempdir;

    fn historical_frame() -> DataFrame {
        df!(
            "support" => &[0.30, 0.25, 0.28, 0.02, 0.01, 0.03, 0.27, 0.02],
            "lift" => &[2.5, 2.1, 2.8, 0.6, 0.4, 0.9, 2.2, 0.7],
            "min_confidence" => &[0.7, 0.6, 0.8, 0.1, 0.05, 0.2, 0.65, 0.1],
            "was_successful" => &[1i32, 1, 1, 0, 0, 0, 1, 0]
        )
        .unwrap()
    }

    #[test]
    fn test_fit_separates_outcomes() {
        let model = fit_bundle_model(&historical_frame(), "was_successful", &TrainerConfig::default()).unwrap();
        assert_eq!(model.feature_names, vec!["support", "lift", "min_confidence"]);
        assert_eq!(model.n_samples, 8);
        assert!((model.positive_rate - 0.5).abs() < 1e-12);
        assert_eq!(model.positive_class, "1");

        let strong = Array2::from_shape_vec((1, 3), vec![0.29, 2.6, 0.75]).unwrap();
        let weak = Array2::from_shape_vec((1, 3), vec![0.01, 0.5, 0.05]).unwrap();
        let p_strong = model.predict_proba(&strong).unwrap()[0];
        let p_weak = model.predict_proba(&weak).unwrap()[0];
        assert!(p_strong > 0.5, "strong bundle scored {p_strong}");
        assert!(p_weak < 0.5, "weak bundle scored {p_weak}");
    }

    #[test]
    fn test_single_class_is_insufficient() {
        let df = df!(
            "support" => &[0.1, 0.2, 0.3],
            "was_successful" => &[1i32, 1, 1]
        )
        .unwrap();
        let err = fit_bundle_model(&df, "was_successful", &TrainerConfig::default()).unwrap_err();
        assert!(matches!(err, BundleError::InsufficientData { .. }));
    }

    fn with_outcomes(outcomes: Series) -> DataFrame {
        let mut df = historical_frame().drop("was_successful").unwrap();
        df.with_column(outcomes).unwrap();
        df
    }

    fn assert_separates(model: &BundleModel) {
        let strong = Array2::from_shape_vec((1, 3), vec![0.29, 2.6, 0.75]).unwrap();
        let weak = Array2::from_shape_vec((1, 3), vec![0.01, 0.5, 0.05]).unwrap();
        assert!(model.predict_proba(&strong).unwrap()[0] > 0.5);
        assert!(model.predict_proba(&weak).unwrap()[0] < 0.5);
    }

    #[test]
    fn test_larger_numeric_label_is_success() {
        let df = with_outcomes(Series::new("outcome", &[2i32, 2, 2, 1, 1, 1, 2, 1]));
        let model = fit_bundle_model(&df, "outcome", &TrainerConfig::default()).unwrap();
        assert_eq!(model.positive_class, "2");
        assert_eq!(model.n_samples, 8);
        assert!((model.positive_rate - 0.5).abs() < 1e-12);
        assert_separates(&model);
    }

    #[test]
    fn test_text_labels() {
        let df = with_outcomes(Series::new(
            "outcome",
            &["yes", "yes", "yes", "no", "no", "no", "yes", "no"],
        ));
        let model = fit_bundle_model(&df, "outcome", &TrainerConfig::default()).unwrap();
        assert_eq!(model.positive_class, "yes");
        assert_eq!(model.n_samples, 8);
        assert_separates(&model);
    }

    #[test]
    fn test_boolean_labels_and_null_rows() {
        let df = with_outcomes(Series::new(
            "outcome",
            &[Some(true), Some(true), None, Some(false), Some(false), Some(false), Some(true), None],
        ));
        let model = fit_bundle_model(&df, "outcome", &TrainerConfig::default()).unwrap();
        assert_eq!(model.positive_class, "true");
        assert_eq!(model.n_samples, 6);
        assert!((model.positive_rate - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_more_than_two_classes_rejected() {
        let df = with_outcomes(Series::new(
            "outcome",
            &["won", "won", "lost", "lost", "pending", "lost", "won", "lost"],
        ));
        let err = fit_bundle_model(&df, "outcome", &TrainerConfig::default()).unwrap_err();
        assert!(matches!(err, BundleError::InvalidLabels { .. }));
    }

    #[test]
    fn test_all_null_outcomes_are_insufficient() {
        let outcomes: Vec<Option<&str>> = vec![None; 8];
        let df = with_outcomes(Series::new("outcome", outcomes));
        let err = fit_bundle_model(&df, "outcome", &TrainerConfig::default()).unwrap_err();
        match err {
            BundleError::InsufficientData { reason } => assert!(reason.contains("8 null rows dropped")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_outcome_column() {
        let err = fit_bundle_model(&historical_frame(), "converted", &TrainerConfig::default()).unwrap_err();
        assert!(matches!(err, BundleError::InputSchema { .. }));
    }

    #[test]
    fn test_store_round_trip_and_overwrite() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("models"));
        assert!(!store.exists());
        assert!(matches!(store.load(), Err(BundleError::ModelLoad { .. })));

        let fitted = fit_bundle_model(&historical_frame(), "was_successful", &TrainerConfig::default()).unwrap();
        let path = store.save(&fitted).unwrap();
        assert_eq!(path, store.artifact_path());
        let first = store.load().unwrap();
        // floats must survive the JSON text exactly
        assert_eq!(first, fitted);

        let mut second = first.clone();
        second.intercept += 1.0;
        store.save(&second).unwrap();
        assert_eq!(store.load().unwrap().intercept, second.intercept);
    }

    #[test]
    fn test_corrupt_artifact_is_load_error() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        std::fs::write(store.artifact_path(), "{ not json").unwrap();
        assert!(matches!(store.load(), Err(BundleError::ModelLoad { .. })));
    }
}
