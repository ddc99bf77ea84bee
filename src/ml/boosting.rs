//! Multiclass gradient boosting over decision-tree base learners.
//!
//! One regression tree per class per round, fit to the softmax probability
//! residuals (multiclass log-loss objective). A held-out validation split is
//! scored after every round; boosting halts once validation loss has not
//! improved for `early_stopping_rounds` consecutive rounds, capped at
//! `max_rounds`, and the ensemble is truncated to the best round.

use crate::error::{AppError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_regressor::{
    DecisionTreeRegressor, DecisionTreeRegressorParameters,
};
use tracing::debug;

type BaseTree = DecisionTreeRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

const LOGLOSS_EPS: f64 = 1e-15;
const IMPROVEMENT_EPS: f64 = 1e-7;

/// Boosting hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostingParams {
    pub learning_rate: f64,
    pub max_depth: u16,
    pub max_rounds: usize,
    pub early_stopping_rounds: usize,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            max_depth: 6,
            max_rounds: 100,
            early_stopping_rounds: 10,
        }
    }
}

/// Summary of a completed fit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitSummary {
    /// Rounds kept in the final ensemble
    pub rounds_used: usize,
    /// Best validation log-loss observed
    pub validation_logloss: f64,
}

/// Trained gradient-boosted ensemble
#[derive(Debug, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    params: BoostingParams,
    n_classes: usize,
    /// rounds[r][k] is the round-r tree for class k
    rounds: Vec<Vec<BaseTree>>,
}

/// Index of the row maximum. Ties break to the lowest class index: the strict
/// comparison keeps the first maximum encountered. This tie-break is an
/// implementation artifact, not a semantic ordering of the classes.
pub fn argmax(row: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in row.iter().enumerate() {
        if v > row[best] {
            best = i;
        }
    }
    best
}

fn to_dense(arr: &Array2<f64>) -> Result<DenseMatrix<f64>> {
    let shape = arr.shape();
    let data: Vec<f64> = arr.iter().copied().collect();
    DenseMatrix::new(shape[0], shape[1], data, false)
        .map_err(|e| AppError::Internal(format!("matrix construction failed: {}", e)))
}

/// Row-wise softmax, numerically stabilized
fn softmax_rows(scores: &Array2<f64>) -> Array2<f64> {
    let (n, k) = scores.dim();
    let mut proba = Array2::zeros((n, k));
    for i in 0..n {
        let row_max = (0..k).fold(f64::NEG_INFINITY, |m, j| m.max(scores[[i, j]]));
        let mut denom = 0.0;
        for j in 0..k {
            let e = (scores[[i, j]] - row_max).exp();
            proba[[i, j]] = e;
            denom += e;
        }
        for j in 0..k {
            proba[[i, j]] /= denom;
        }
    }
    proba
}

fn multiclass_logloss(proba: &Array2<f64>, labels: &[usize]) -> f64 {
    let n = labels.len();
    let mut total = 0.0;
    for (i, &y) in labels.iter().enumerate() {
        total -= proba[[i, y]].max(LOGLOSS_EPS).ln();
    }
    total / n as f64
}

impl GradientBoostedTrees {
    /// Fit the ensemble on the training split, early-stopping on the
    /// validation split.
    pub fn fit(
        x_train: &Array2<f64>,
        y_train: &[usize],
        x_val: &Array2<f64>,
        y_val: &[usize],
        n_classes: usize,
        params: BoostingParams,
    ) -> Result<(Self, FitSummary)> {
        let n_train = y_train.len();
        let n_val = y_val.len();
        if n_train == 0 || n_val == 0 {
            return Err(AppError::Training(
                "empty training or validation split".to_string(),
            ));
        }
        if n_classes < 2 {
            return Err(AppError::Training(format!(
                "need at least 2 classes, got {}",
                n_classes
            )));
        }

        let dense_train = to_dense(x_train)?;
        let dense_val = to_dense(x_val)?;

        let mut scores_train: Array2<f64> = Array2::zeros((n_train, n_classes));
        let mut scores_val: Array2<f64> = Array2::zeros((n_val, n_classes));

        let mut rounds: Vec<Vec<BaseTree>> = Vec::new();
        let mut best_loss = f64::INFINITY;
        let mut best_round: usize = 0;
        let mut stall = 0usize;

        for round in 0..params.max_rounds {
            let proba = softmax_rows(&scores_train);
            let mut round_trees = Vec::with_capacity(n_classes);

            for class in 0..n_classes {
                let residuals: Vec<f64> = (0..n_train)
                    .map(|i| {
                        let target = if y_train[i] == class { 1.0 } else { 0.0 };
                        target - proba[[i, class]]
                    })
                    .collect();

                let tree_params =
                    DecisionTreeRegressorParameters::default().with_max_depth(params.max_depth);
                let tree = DecisionTreeRegressor::fit(&dense_train, &residuals, tree_params)
                    .map_err(|e| AppError::Training(format!("tree fit failed: {}", e)))?;

                let pred_train = tree
                    .predict(&dense_train)
                    .map_err(|e| AppError::Training(format!("tree predict failed: {}", e)))?;
                let pred_val = tree
                    .predict(&dense_val)
                    .map_err(|e| AppError::Training(format!("tree predict failed: {}", e)))?;

                for i in 0..n_train {
                    scores_train[[i, class]] += params.learning_rate * pred_train[i];
                }
                for i in 0..n_val {
                    scores_val[[i, class]] += params.learning_rate * pred_val[i];
                }
                round_trees.push(tree);
            }
            rounds.push(round_trees);

            let val_loss = multiclass_logloss(&softmax_rows(&scores_val), y_val);
            debug!(round = round, val_logloss = val_loss, "Boosting round complete");

            if val_loss + IMPROVEMENT_EPS < best_loss {
                best_loss = val_loss;
                best_round = round;
                stall = 0;
            } else {
                stall += 1;
                if stall >= params.early_stopping_rounds {
                    break;
                }
            }
        }

        rounds.truncate(best_round + 1);
        let summary = FitSummary {
            rounds_used: rounds.len(),
            validation_logloss: best_loss,
        };
        Ok((
            Self {
                params,
                n_classes,
                rounds,
            },
            summary,
        ))
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_rounds(&self) -> usize {
        self.rounds.len()
    }

    /// Class probabilities, one row per input sample
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.rounds.is_empty() {
            return Err(AppError::NotReady(
                "classifier has no trained rounds".to_string(),
            ));
        }
        let n = x.nrows();
        let dense = to_dense(x)?;
        let mut scores: Array2<f64> = Array2::zeros((n, self.n_classes));

        for round_trees in &self.rounds {
            for (class, tree) in round_trees.iter().enumerate() {
                let preds = tree
                    .predict(&dense)
                    .map_err(|e| AppError::Internal(format!("prediction failed: {}", e)))?;
                for i in 0..n {
                    scores[[i, class]] += self.params.learning_rate * preds[i];
                }
            }
        }
        Ok(softmax_rows(&scores))
    }

    /// Predicted class indices (argmax of probabilities, lowest index on ties)
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let proba = self.predict_proba(x)?;
        Ok((0..proba.nrows())
            .map(|i| argmax(proba.row(i).as_slice().unwrap_or(&[])))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_ties_break_to_lowest_index() {
        assert_eq!(argmax(&[0.4, 0.4, 0.2]), 0);
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), 1);
        assert_eq!(argmax(&[0.1, 0.2, 0.7]), 2);
    }

    #[test]
    fn test_softmax_rows_are_distributions() {
        let scores = Array2::from_shape_vec((2, 3), vec![1.0, 2.0, 3.0, -1.0, 0.0, 1.0]).unwrap();
        let proba = softmax_rows(&scores);
        for i in 0..2 {
            let sum: f64 = (0..3).map(|j| proba[[i, j]]).sum();
            assert!((sum - 1.0).abs() < 1e-12);
        }
        assert!(proba[[0, 2]] > proba[[0, 0]]);
    }

    #[test]
    fn test_fit_separable_classes() {
        // Two well-separated blobs on the first feature
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..40 {
            let offset = (i % 4) as f64 * 0.1;
            if i < 20 {
                rows.extend_from_slice(&[0.0 + offset, 1.0]);
                labels.push(0usize);
            } else {
                rows.extend_from_slice(&[10.0 + offset, 1.0]);
                labels.push(1usize);
            }
        }
        let x = Array2::from_shape_vec((40, 2), rows).unwrap();
        let (x_train, y_train) = (x.clone(), labels.clone());

        let params = BoostingParams {
            learning_rate: 0.3,
            max_depth: 3,
            max_rounds: 20,
            early_stopping_rounds: 5,
        };
        let (model, summary) =
            GradientBoostedTrees::fit(&x_train, &y_train, &x, &labels, 2, params).unwrap();

        assert!(summary.rounds_used >= 1);
        let predictions = model.predict(&x).unwrap();
        let correct = predictions
            .iter()
            .zip(labels.iter())
            .filter(|(p, y)| p == y)
            .count();
        assert!(correct >= 38, "only {} of 40 correct", correct);
    }

    #[test]
    fn test_fit_rejects_empty_split() {
        let x = Array2::zeros((0, 2));
        let err = GradientBoostedTrees::fit(
            &x,
            &[],
            &x,
            &[],
            2,
            BoostingParams::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Training(_)));
    }
}
