//! Inference service: one explicitly constructed handle per process.
//!
//! [`ModelService::open`] either loads the persisted artifact or, when none
//! exists yet, runs the full offline pipeline (generate corpus if needed,
//! train, persist) before returning — construction is allowed to be slow
//! exactly once per deployment. The server constructs the service before the
//! listener starts accepting requests, so callers can never observe a
//! half-initialized service; once built, the artifact is immutable and is
//! shared read-only across concurrent predictions without locking. There is
//! no hot reload and no retraining during the process lifetime.

use crate::config::MlConfig;
use crate::error::Result;
use crate::ml::boosting::argmax;
use crate::ml::training::{train, TrainedArtifact, TrainingReport};
use crate::models::{FeatureRecord, SeverityCategory, FEATURE_COLUMNS};
use crate::corpus::{load_corpus, write_corpus, CorpusGenerator};
use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::info;

/// Metadata about the loaded artifact
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub trained_at: DateTime<Utc>,
    pub classes: Vec<String>,
    pub rounds: usize,
    pub schema_fingerprint: String,
}

/// Severity prediction service holding the trained artifact for the life of
/// the process.
pub struct ModelService {
    artifact: TrainedArtifact,
    report: Option<TrainingReport>,
}

impl ModelService {
    /// Load the artifact from the configured path, or train from scratch if
    /// it does not exist yet. Blocking; call before serving traffic.
    pub fn open(cfg: &MlConfig) -> Result<Self> {
        if cfg.model_path.exists() {
            info!(path = %cfg.model_path.display(), "Loading persisted model artifact");
            let artifact = TrainedArtifact::load(&cfg.model_path)?;
            return Ok(Self {
                artifact,
                report: None,
            });
        }

        info!("No model artifact found, training from scratch");
        let samples = if cfg.corpus_path.exists() {
            info!(path = %cfg.corpus_path.display(), "Loading existing corpus");
            load_corpus(&cfg.corpus_path)?
        } else {
            info!(
                per_category = cfg.samples_per_category,
                "Generating synthetic corpus"
            );
            let samples =
                CorpusGenerator::new(cfg.generator_seed).generate(cfg.samples_per_category);
            write_corpus(&cfg.corpus_path, &samples)?;
            samples
        };

        let (artifact, report) = train(&samples, cfg)?;
        artifact.save(&cfg.model_path)?;
        Ok(Self {
            artifact,
            report: Some(report),
        })
    }

    /// Wrap an already-built artifact (used by the offline trainer and tests)
    pub fn from_artifact(artifact: TrainedArtifact) -> Self {
        Self {
            artifact,
            report: None,
        }
    }

    /// Predict the severity category for a fully populated record.
    ///
    /// Equal class probabilities resolve to the lowest internal class index;
    /// that is a documented implementation artifact of the argmax, not a
    /// meaningful ordering.
    pub fn predict(&self, record: &FeatureRecord) -> Result<SeverityCategory> {
        let values = record.to_vector();
        let x = Array2::from_shape_vec((1, FEATURE_COLUMNS.len()), values.to_vec())
            .expect("single-row feature matrix");

        let proba = self.artifact.model.predict_proba(&x)?;
        let index = argmax(proba.row(0).as_slice().unwrap_or(&[]));
        let label = self.artifact.encoder.decode(index)?;
        SeverityCategory::from_str(label).map_err(|_| {
            crate::error::AppError::Internal(format!("artifact produced unknown label {:?}", label))
        })
    }

    /// Predict from a keyed feature map: the 18 required features are
    /// selected and ordered, extras ignored, and a missing key is rejected
    /// with a MissingFeature error.
    pub fn predict_from_map(&self, map: &HashMap<String, f64>) -> Result<SeverityCategory> {
        let record = FeatureRecord::from_map(map)?;
        self.predict(&record)
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            trained_at: self.artifact.trained_at,
            classes: self.artifact.encoder.classes().to_vec(),
            rounds: self.artifact.model.n_rounds(),
            schema_fingerprint: self.artifact.schema_fingerprint.clone(),
        }
    }

    /// Evaluation report, present only when this process trained the model
    pub fn training_report(&self) -> Option<&TrainingReport> {
        self.report.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::CorpusGenerator;

    fn trained_service() -> ModelService {
        let samples = CorpusGenerator::new(21).generate(30);
        let cfg = MlConfig {
            learning_rate: 0.3,
            max_depth: 5,
            max_rounds: 15,
            early_stopping_rounds: 5,
            ..MlConfig::default()
        };
        let (artifact, _) = train(&samples, &cfg).unwrap();
        ModelService::from_artifact(artifact)
    }

    #[test]
    fn test_predict_is_idempotent() {
        let service = trained_service();
        let record = CorpusGenerator::new(99).generate(1)[0].record.clone();

        let first = service.predict(&record).unwrap();
        let second = service.predict(&record).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_predict_from_map_rejects_missing_feature() {
        let service = trained_service();
        let record = CorpusGenerator::new(5).generate(1)[0].record.clone();
        let mut map: HashMap<String, f64> = FEATURE_COLUMNS
            .iter()
            .zip(record.to_vector())
            .map(|(k, v)| ((*k).to_string(), v))
            .collect();
        map.remove("elevation");

        let err = service.predict_from_map(&map).unwrap_err();
        assert_eq!(err.error_code(), "MISSING_FEATURE");
    }

    #[test]
    fn test_predict_from_map_ignores_extras() {
        let service = trained_service();
        let record = CorpusGenerator::new(5).generate(1)[0].record.clone();
        let mut map: HashMap<String, f64> = FEATURE_COLUMNS
            .iter()
            .zip(record.to_vector())
            .map(|(k, v)| ((*k).to_string(), v))
            .collect();
        map.insert("utc_offset_seconds".to_string(), -10800.0);

        assert!(service.predict_from_map(&map).is_ok());
    }

    #[test]
    fn test_info_exposes_classes_and_rounds() {
        let service = trained_service();
        let info = service.info();

        assert_eq!(info.classes.len(), 5);
        assert!(info.rounds >= 1);
        assert_eq!(info.schema_fingerprint.len(), 64);
    }

    #[test]
    fn test_open_trains_and_then_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = MlConfig {
            model_path: dir.path().join("model.bin"),
            corpus_path: dir.path().join("corpus.csv"),
            samples_per_category: 20,
            learning_rate: 0.3,
            max_depth: 4,
            max_rounds: 10,
            early_stopping_rounds: 4,
            ..MlConfig::default()
        };

        // First open: trains and persists
        let first = ModelService::open(&cfg).unwrap();
        assert!(cfg.model_path.exists());
        assert!(cfg.corpus_path.exists());
        assert!(first.training_report().is_some());

        // Second open: loads the persisted artifact
        let second = ModelService::open(&cfg).unwrap();
        assert!(second.training_report().is_none());
        assert_eq!(
            second.info().schema_fingerprint,
            first.info().schema_fingerprint
        );
    }
}
