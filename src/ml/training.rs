//! Training pipeline: corpus in, persisted artifact out.
//!
//! Steps: load corpus, split X/y, fit label encoder, stratified 80/20
//! train/test split (fixed seed), fit the boosted ensemble with validation
//! early stopping, evaluate on the held-out split, persist model + encoder +
//! schema fingerprint as one atomic bincode blob.

use crate::config::MlConfig;
use crate::error::{AppError, Result};
use crate::ml::boosting::{argmax, BoostingParams, GradientBoostedTrees};
use crate::ml::encoder::LabelEncoder;
use crate::models::{LabeledSample, FEATURE_COLUMNS};
use chrono::{DateTime, Utc};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// Per-class evaluation metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Evaluation report for a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub n_train: usize,
    pub n_test: usize,
    pub rounds_used: usize,
    pub accuracy: f64,
    /// Macro one-vs-rest AUC-ROC. None when the test split lacks full class
    /// coverage; the metric is then reported unavailable rather than failing
    /// the run.
    pub auc_roc_ovr: Option<f64>,
    pub macro_precision: f64,
    pub macro_recall: f64,
    pub macro_f1: f64,
    pub per_class: HashMap<String, ClassMetrics>,
}

/// The persisted bundle: trained classifier plus label encoding, stamped with
/// a fingerprint of the feature schema it was trained against.
#[derive(Debug, Serialize, Deserialize)]
pub struct TrainedArtifact {
    pub schema_fingerprint: String,
    pub trained_at: DateTime<Utc>,
    pub encoder: LabelEncoder,
    pub model: GradientBoostedTrees,
}

/// Fingerprint of the canonical feature column list. Embedded in every
/// artifact and checked at load so a schema or column-order change cannot
/// silently corrupt predictions after a reload.
pub fn schema_fingerprint() -> String {
    let joined = FEATURE_COLUMNS.join(",");
    let digest = Sha256::digest(joined.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

impl TrainedArtifact {
    /// Serialize to a single blob, written atomically (temp file + rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let blob = bincode::serialize(self)?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, &blob)?;
        std::fs::rename(&tmp, path)?;
        info!(path = %path.display(), bytes = blob.len(), "Artifact saved");
        Ok(())
    }

    /// Load and validate a persisted artifact
    pub fn load(path: &Path) -> Result<Self> {
        let blob = std::fs::read(path)?;
        let artifact: TrainedArtifact = bincode::deserialize(&blob)?;

        let expected = schema_fingerprint();
        if artifact.schema_fingerprint != expected {
            return Err(AppError::Data(format!(
                "artifact schema fingerprint mismatch: artifact {}, expected {}",
                artifact.schema_fingerprint, expected
            )));
        }
        Ok(artifact)
    }
}

/// Stratified index split preserving class proportions. Per class, indices
/// are shuffled with the seeded RNG and the test fraction is carved off;
/// singleton classes stay entirely in the training split.
fn stratified_split(
    labels: &[usize],
    n_classes: usize,
    test_fraction: f64,
    seed: u64,
) -> (Vec<usize>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train_idx = Vec::new();
    let mut test_idx = Vec::new();

    for class in 0..n_classes {
        let mut members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, &y)| y == class)
            .map(|(i, _)| i)
            .collect();
        members.shuffle(&mut rng);

        let n = members.len();
        let mut n_test = ((n as f64) * test_fraction).round() as usize;
        if n_test >= n {
            n_test = n.saturating_sub(1);
        }
        test_idx.extend_from_slice(&members[..n_test]);
        train_idx.extend_from_slice(&members[n_test..]);
    }
    (train_idx, test_idx)
}

fn select_rows(x: &Array2<f64>, indices: &[usize]) -> Array2<f64> {
    let cols = x.ncols();
    let mut data = Vec::with_capacity(indices.len() * cols);
    for &i in indices {
        data.extend(x.row(i).iter().copied());
    }
    Array2::from_shape_vec((indices.len(), cols), data).expect("row selection shape")
}

/// Binary AUC via the rank statistic, with average ranks on ties
fn binary_auc(scores: &[f64], positives: &[bool]) -> Option<f64> {
    let n_pos = positives.iter().filter(|&&p| p).count();
    let n_neg = positives.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].partial_cmp(&scores[b]).unwrap_or(std::cmp::Ordering::Equal));

    let mut ranks = vec![0.0f64; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg_rank = ((i + 1 + j + 1) as f64) / 2.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg_rank;
        }
        i = j + 1;
    }

    let rank_sum_pos: f64 = positives
        .iter()
        .enumerate()
        .filter(|(_, &p)| p)
        .map(|(i, _)| ranks[i])
        .sum();
    let auc = (rank_sum_pos - (n_pos * (n_pos + 1)) as f64 / 2.0) / (n_pos * n_neg) as f64;
    Some(auc)
}

/// Macro one-vs-rest AUC-ROC. None unless every class appears in the test
/// labels (matching the soft-failure contract for coverage gaps).
fn multiclass_auc_ovr(proba: &Array2<f64>, labels: &[usize], n_classes: usize) -> Option<f64> {
    let mut total = 0.0;
    for class in 0..n_classes {
        let scores: Vec<f64> = (0..labels.len()).map(|i| proba[[i, class]]).collect();
        let positives: Vec<bool> = labels.iter().map(|&y| y == class).collect();
        total += binary_auc(&scores, &positives)?;
    }
    Some(total / n_classes as f64)
}

fn evaluate(
    y_true: &[usize],
    y_pred: &[usize],
    proba: &Array2<f64>,
    encoder: &LabelEncoder,
    rounds_used: usize,
    n_train: usize,
) -> TrainingReport {
    let n = y_true.len();
    let n_classes = encoder.n_classes();
    let correct = y_true.iter().zip(y_pred.iter()).filter(|(t, p)| t == p).count();
    let accuracy = if n > 0 { correct as f64 / n as f64 } else { 0.0 };

    let mut per_class = HashMap::new();
    for class in 0..n_classes {
        let tp = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(&t, &p)| t == class && p == class)
            .count();
        let fp = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(&t, &p)| t != class && p == class)
            .count();
        let fn_count = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(&t, &p)| t == class && p != class)
            .count();

        let precision = if tp + fp > 0 {
            tp as f64 / (tp + fp) as f64
        } else {
            0.0
        };
        let recall = if tp + fn_count > 0 {
            tp as f64 / (tp + fn_count) as f64
        } else {
            0.0
        };
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        let support = y_true.iter().filter(|&&t| t == class).count();

        let label = encoder.decode(class).unwrap_or("?").to_string();
        per_class.insert(
            label,
            ClassMetrics {
                precision,
                recall,
                f1_score: f1,
                support,
            },
        );
    }

    let macro_precision =
        per_class.values().map(|m| m.precision).sum::<f64>() / n_classes as f64;
    let macro_recall = per_class.values().map(|m| m.recall).sum::<f64>() / n_classes as f64;
    let macro_f1 = per_class.values().map(|m| m.f1_score).sum::<f64>() / n_classes as f64;

    let auc_roc_ovr = multiclass_auc_ovr(proba, y_true, n_classes);
    if auc_roc_ovr.is_none() {
        warn!("AUC-ROC unavailable: test split lacks full class coverage");
    }

    TrainingReport {
        n_train,
        n_test: n,
        rounds_used,
        accuracy,
        auc_roc_ovr,
        macro_precision,
        macro_recall,
        macro_f1,
        per_class,
    }
}

/// Train a classifier on a labeled corpus and build the persistable artifact
pub fn train(samples: &[LabeledSample], cfg: &MlConfig) -> Result<(TrainedArtifact, TrainingReport)> {
    if samples.is_empty() {
        return Err(AppError::Data("training corpus is empty".to_string()));
    }

    let n = samples.len();
    let mut data = Vec::with_capacity(n * FEATURE_COLUMNS.len());
    for sample in samples {
        data.extend_from_slice(&sample.record.to_vector());
    }
    let x = Array2::from_shape_vec((n, FEATURE_COLUMNS.len()), data)
        .map_err(|e| AppError::Data(format!("bad feature matrix shape: {}", e)))?;

    let raw_labels: Vec<String> = samples.iter().map(|s| s.category.label()).collect();
    let encoder = LabelEncoder::fit(&raw_labels)?;
    let y: Vec<usize> = raw_labels
        .iter()
        .map(|l| encoder.encode(l))
        .collect::<Result<_>>()?;

    let (train_idx, test_idx) =
        stratified_split(&y, encoder.n_classes(), cfg.test_fraction, cfg.split_seed);
    if train_idx.is_empty() || test_idx.is_empty() {
        return Err(AppError::Data(format!(
            "corpus too small to split: {} train / {} test rows",
            train_idx.len(),
            test_idx.len()
        )));
    }

    let x_train = select_rows(&x, &train_idx);
    let x_test = select_rows(&x, &test_idx);
    let y_train: Vec<usize> = train_idx.iter().map(|&i| y[i]).collect();
    let y_test: Vec<usize> = test_idx.iter().map(|&i| y[i]).collect();

    info!(
        n_train = y_train.len(),
        n_test = y_test.len(),
        n_classes = encoder.n_classes(),
        "Training severity classifier"
    );

    let params = BoostingParams {
        learning_rate: cfg.learning_rate,
        max_depth: cfg.max_depth,
        max_rounds: cfg.max_rounds,
        early_stopping_rounds: cfg.early_stopping_rounds,
    };
    let (model, summary) = GradientBoostedTrees::fit(
        &x_train,
        &y_train,
        &x_test,
        &y_test,
        encoder.n_classes(),
        params,
    )?;

    let proba = model.predict_proba(&x_test)?;
    let y_pred: Vec<usize> = (0..proba.nrows())
        .map(|i| argmax(proba.row(i).as_slice().unwrap_or(&[])))
        .collect();
    let report = evaluate(
        &y_test,
        &y_pred,
        &proba,
        &encoder,
        summary.rounds_used,
        y_train.len(),
    );

    match report.auc_roc_ovr {
        Some(auc) => info!(
            accuracy = report.accuracy,
            auc_roc_ovr = auc,
            rounds = report.rounds_used,
            "Training complete"
        ),
        None => info!(
            accuracy = report.accuracy,
            rounds = report.rounds_used,
            "Training complete (AUC-ROC unavailable)"
        ),
    }

    let artifact = TrainedArtifact {
        schema_fingerprint: schema_fingerprint(),
        trained_at: Utc::now(),
        encoder,
        model,
    };
    Ok((artifact, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MlConfig;
    use crate::corpus::CorpusGenerator;

    fn small_config() -> MlConfig {
        MlConfig {
            learning_rate: 0.3,
            max_depth: 5,
            max_rounds: 15,
            early_stopping_rounds: 5,
            ..MlConfig::default()
        }
    }

    #[test]
    fn test_schema_fingerprint_is_stable() {
        assert_eq!(schema_fingerprint(), schema_fingerprint());
        assert_eq!(schema_fingerprint().len(), 64);
    }

    #[test]
    fn test_stratified_split_preserves_classes() {
        let labels: Vec<usize> = (0..100).map(|i| i % 5).collect();
        let (train, test) = stratified_split(&labels, 5, 0.2, 42);

        assert_eq!(train.len() + test.len(), 100);
        for class in 0..5 {
            let in_test = test.iter().filter(|&&i| labels[i] == class).count();
            assert_eq!(in_test, 4, "class {} test share", class);
        }
    }

    #[test]
    fn test_binary_auc_perfect_separation() {
        let scores = vec![0.1, 0.2, 0.8, 0.9];
        let positives = vec![false, false, true, true];
        assert!((binary_auc(&scores, &positives).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_binary_auc_missing_class() {
        assert!(binary_auc(&[0.1, 0.2], &[false, false]).is_none());
    }

    #[test]
    fn test_train_rejects_empty_corpus() {
        let err = train(&[], &small_config()).unwrap_err();
        assert!(matches!(err, AppError::Data(_)));
    }

    #[test]
    fn test_train_produces_artifact_and_report() {
        let samples = CorpusGenerator::new(5).generate(30);
        let (artifact, report) = train(&samples, &small_config()).unwrap();

        assert_eq!(artifact.encoder.n_classes(), 5);
        assert_eq!(artifact.schema_fingerprint, schema_fingerprint());
        assert!(report.rounds_used >= 1);
        assert!(report.accuracy > 0.0);
        // Balanced corpus with 6 test rows per class: full coverage, AUC defined
        assert!(report.auc_roc_ovr.is_some());
        assert_eq!(report.per_class.len(), 5);
    }

    #[test]
    fn test_artifact_save_load_round_trip() {
        let samples = CorpusGenerator::new(9).generate(20);
        let (artifact, _) = train(&samples, &small_config()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        artifact.save(&path).unwrap();

        let restored = TrainedArtifact::load(&path).unwrap();
        assert_eq!(restored.encoder, artifact.encoder);
        assert_eq!(restored.model.n_rounds(), artifact.model.n_rounds());
    }

    #[test]
    fn test_load_rejects_fingerprint_mismatch() {
        let samples = CorpusGenerator::new(13).generate(20);
        let (mut artifact, _) = train(&samples, &small_config()).unwrap();
        artifact.schema_fingerprint = "0".repeat(64);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        artifact.save(&path).unwrap();

        assert!(matches!(
            TrainedArtifact::load(&path),
            Err(AppError::Data(_))
        ));
    }
}
