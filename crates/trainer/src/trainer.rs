//! Class-balanced L2 logistic regression trainer
//!
//! Minimizes `C · Σ sᵢ · logloss(yᵢ, σ(w·xᵢ + b)) + ½‖w‖²` with damped
//! Newton steps (IRLS). The intercept is not penalized. Each step solves the
//! Hessian system by Cholesky and backtracks until the objective decreases
//! enough, so the fit is a pure function of the row order and the config.

use churn_core::model::dot;
use churn_core::{
    sigmoid, ChurnError, ClassWeight, LogisticModel, ModelMetadata, Result, TrainingConfig,
    VERSION,
};
use tracing::{debug, info, instrument, warn};

use crate::linalg::{cholesky_solve, Matrix};

const ARMIJO: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 60;
const MAX_JITTER_ATTEMPTS: usize = 8;

/// Logistic regression trainer
pub struct LogisticTrainer {
    config: TrainingConfig,
}

struct Derivatives {
    objective: f64,
    gradient: Vec<f64>,
    hessian: Matrix,
}

impl LogisticTrainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Fit on `rows` (schema-ordered) and binary `labels`.
    #[instrument(skip_all, fields(rows = rows.len()))]
    pub fn train(
        &self,
        rows: &[Vec<f64>],
        labels: &[u8],
        schema_fingerprint: &str,
    ) -> Result<LogisticModel> {
        let width = validate_inputs(rows, labels)?;
        let class_weights = self.class_weights(labels)?;
        let sample_weights: Vec<f64> = labels
            .iter()
            .map(|&y| class_weights[usize::from(y)])
            .collect();

        let c = self.config.inverse_regularization;
        // Coefficients followed by the intercept
        let mut theta = vec![0.0; width + 1];
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.config.max_iterations {
            let current = derivatives(&theta, rows, labels, &sample_weights, c);
            let gradient_norm = max_abs(&current.gradient);
            if gradient_norm <= self.config.tolerance {
                converged = true;
                break;
            }

            let Some(step) = newton_step(&current) else {
                warn!("Hessian is not positive definite; stopping at iteration {iterations}");
                break;
            };
            let slope = dot(&current.gradient, &step);
            iterations += 1;

            let Some(next) =
                backtrack(&theta, &step, current.objective, slope, rows, labels, &sample_weights, c)
            else {
                // No descent left at machine precision
                converged = -slope <= self.config.tolerance;
                break;
            };
            theta = next;

            debug!(
                iteration = iterations,
                objective = current.objective,
                gradient_norm,
                "Newton step"
            );

            if -slope / 2.0 <= self.config.tolerance * self.config.tolerance {
                converged = true;
                break;
            }
        }

        if !converged {
            warn!(
                "Logistic regression did not converge after {} iterations",
                iterations
            );
        }

        let intercept = theta.pop().unwrap_or_default();
        info!(iterations, converged, "Training complete");

        Ok(LogisticModel {
            coefficients: theta,
            intercept,
            metadata: ModelMetadata {
                version: VERSION.to_string(),
                schema_fingerprint: schema_fingerprint.to_string(),
                iterations,
                converged,
                class_weights,
                inverse_regularization: c,
                training_rows: rows.len(),
            },
        })
    }

    /// Per-class sample weights `[negative, positive]`.
    pub fn class_weights(&self, labels: &[u8]) -> Result<[f64; 2]> {
        let positives = labels.iter().filter(|&&y| y == 1).count();
        let negatives = labels.len() - positives;
        if positives == 0 || negatives == 0 {
            return Err(ChurnError::Training(format!(
                "training set holds a single class ({negatives} negative, {positives} positive)"
            )));
        }
        Ok(match self.config.class_weight {
            ClassWeight::Balanced => {
                let n = labels.len() as f64;
                [n / (2.0 * negatives as f64), n / (2.0 * positives as f64)]
            }
            ClassWeight::Uniform => [1.0, 1.0],
        })
    }
}

fn validate_inputs(rows: &[Vec<f64>], labels: &[u8]) -> Result<usize> {
    if rows.is_empty() {
        return Err(ChurnError::Training("no training rows".into()));
    }
    if rows.len() != labels.len() {
        return Err(ChurnError::Training(format!(
            "{} rows but {} labels",
            rows.len(),
            labels.len()
        )));
    }
    let width = rows[0].len();
    for (i, row) in rows.iter().enumerate() {
        if row.len() != width {
            return Err(ChurnError::Training(format!(
                "row {i} has {} features, expected {width}",
                row.len()
            )));
        }
        if let Some(j) = row.iter().position(|v| !v.is_finite()) {
            return Err(ChurnError::Training(format!(
                "non-finite feature at row {i}, column {j}"
            )));
        }
    }
    if let Some(bad) = labels.iter().find(|&&y| y > 1) {
        return Err(ChurnError::Training(format!("label {bad} is not 0 or 1")));
    }
    Ok(width)
}

fn linear_score(theta: &[f64], row: &[f64]) -> f64 {
    let width = row.len();
    dot(&theta[..width], row) + theta[width]
}

/// `log(1 + e^z)` without overflow.
fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

fn penalty(theta: &[f64]) -> f64 {
    let width = theta.len() - 1;
    0.5 * dot(&theta[..width], &theta[..width])
}

fn objective(theta: &[f64], rows: &[Vec<f64>], labels: &[u8], weights: &[f64], c: f64) -> f64 {
    let loss: f64 = rows
        .iter()
        .zip(labels)
        .zip(weights)
        .map(|((row, &y), s)| {
            let z = linear_score(theta, row);
            s * (softplus(z) - f64::from(y) * z)
        })
        .sum();
    c * loss + penalty(theta)
}

fn derivatives(
    theta: &[f64],
    rows: &[Vec<f64>],
    labels: &[u8],
    weights: &[f64],
    c: f64,
) -> Derivatives {
    let dim = theta.len();
    let width = dim - 1;
    let mut gradient = vec![0.0; dim];
    let mut hessian = Matrix::zeros(dim);
    let mut augmented = vec![1.0; dim];
    let mut loss = 0.0;

    for ((row, &y), s) in rows.iter().zip(labels).zip(weights) {
        let z = linear_score(theta, row);
        let y = f64::from(y);
        let p = sigmoid(z);
        loss += s * (softplus(z) - y * z);

        augmented[..width].copy_from_slice(row);
        let residual = c * s * (p - y);
        for (g, x) in gradient.iter_mut().zip(&augmented) {
            *g += residual * x;
        }
        hessian.add_outer_lower(&augmented, c * s * p * (1.0 - p));
    }

    for j in 0..width {
        gradient[j] += theta[j];
        hessian.add(j, j, 1.0);
    }

    Derivatives {
        objective: c * loss + penalty(theta),
        gradient,
        hessian,
    }
}

/// Solve `H Δ = −g`, adding diagonal jitter when `H` is near singular.
fn newton_step(current: &Derivatives) -> Option<Vec<f64>> {
    let rhs: Vec<f64> = current.gradient.iter().map(|g| -g).collect();
    if let Some(step) = cholesky_solve(&current.hessian, &rhs) {
        return Some(step);
    }

    let mut jitter = 1e-10 * current.hessian.max_diagonal().max(1.0);
    for _ in 0..MAX_JITTER_ATTEMPTS {
        let mut damped = current.hessian.clone();
        for i in 0..damped.dim() {
            damped.add(i, i, jitter);
        }
        if let Some(step) = cholesky_solve(&damped, &rhs) {
            debug!(jitter, "Hessian regularized");
            return Some(step);
        }
        jitter *= 100.0;
    }
    None
}

#[allow(clippy::too_many_arguments)]
fn backtrack(
    theta: &[f64],
    step: &[f64],
    current: f64,
    slope: f64,
    rows: &[Vec<f64>],
    labels: &[u8],
    weights: &[f64],
    c: f64,
) -> Option<Vec<f64>> {
    if slope >= 0.0 {
        return None;
    }
    let mut t = 1.0;
    for _ in 0..MAX_BACKTRACKS {
        let candidate: Vec<f64> = theta.iter().zip(step).map(|(w, d)| w + t * d).collect();
        let value = objective(&candidate, rows, labels, weights, c);
        if value.is_finite() && value <= current + ARMIJO * t * slope {
            return Some(candidate);
        }
        t *= 0.5;
    }
    None
}

fn max_abs(values: &[f64]) -> f64 {
    values.iter().fold(0.0, |acc, v| acc.max(v.abs()))
}
