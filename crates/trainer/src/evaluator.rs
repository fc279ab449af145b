//! Held-out evaluation: accuracy, ROC-AUC and a classification report

use churn_core::{ChurnError, Classifier, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Binary confusion matrix at the decision threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tn: usize,
    pub fp: usize,
    #[serde(rename = "fn")]
    pub fn_count: usize,
    pub tp: usize,
}

impl ConfusionMatrix {
    pub fn total(&self) -> usize {
        self.tn + self.fp + self.fn_count + self.tp
    }

    fn record(&mut self, truth: u8, predicted: u8) {
        match (truth, predicted) {
            (0, 0) => self.tn += 1,
            (0, _) => self.fp += 1,
            (_, 0) => self.fn_count += 1,
            _ => self.tp += 1,
        }
    }
}

/// Precision, recall and F1 of one class (or an average of classes).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

impl ClassMetrics {
    fn from_counts(true_positive: usize, predicted: usize, actual: usize) -> Self {
        let precision = ratio(true_positive, predicted);
        let recall = ratio(true_positive, actual);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            precision,
            recall,
            f1,
            support: actual,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub threshold: f64,
    pub accuracy: f64,
    pub roc_auc: f64,
    pub confusion: ConfusionMatrix,
    /// `[negative, positive]`
    pub per_class: [ClassMetrics; 2],
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

/// Score `rows` and compare hard predictions at `threshold` against `labels`.
pub fn evaluate(
    model: &dyn Classifier,
    rows: &[Vec<f64>],
    labels: &[u8],
    threshold: f64,
) -> Result<EvaluationReport> {
    if rows.len() != labels.len() {
        return Err(ChurnError::Evaluation(format!(
            "{} rows but {} labels",
            rows.len(),
            labels.len()
        )));
    }
    if rows.is_empty() {
        return Err(ChurnError::Evaluation("empty test set".into()));
    }

    let probabilities = rows
        .iter()
        .map(|row| model.predict_proba(row))
        .collect::<Result<Vec<f64>>>()?;

    let mut confusion = ConfusionMatrix::default();
    for (&truth, &p) in labels.iter().zip(&probabilities) {
        confusion.record(truth, u8::from(p >= threshold));
    }

    let roc_auc = roc_auc(labels, &probabilities)?;
    let negative = ClassMetrics::from_counts(
        confusion.tn,
        confusion.tn + confusion.fn_count,
        confusion.tn + confusion.fp,
    );
    let positive = ClassMetrics::from_counts(
        confusion.tp,
        confusion.tp + confusion.fp,
        confusion.tp + confusion.fn_count,
    );

    let report = EvaluationReport {
        threshold,
        accuracy: ratio(confusion.tn + confusion.tp, confusion.total()),
        roc_auc,
        confusion,
        per_class: [negative, positive],
        macro_avg: average(&[negative, positive], |_| 1.0),
        weighted_avg: average(&[negative, positive], |m| m.support as f64),
    };
    info!(
        accuracy = report.accuracy,
        roc_auc = report.roc_auc,
        "Evaluation complete"
    );
    Ok(report)
}

/// Area under the ROC curve via the rank-sum statistic, averaging tied ranks.
pub fn roc_auc(labels: &[u8], scores: &[f64]) -> Result<f64> {
    let positives = labels.iter().filter(|&&y| y == 1).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(ChurnError::Evaluation(
            "ROC-AUC is undefined when the test set holds a single class".into(),
        ));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut positive_rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // Ranks are 1-based; a tie group shares the mean of its ranks
        let rank = (start + end + 1) as f64 / 2.0;
        let tied_positives = order[start..end]
            .iter()
            .filter(|&&i| labels[i] == 1)
            .count();
        positive_rank_sum += rank * tied_positives as f64;
        start = end;
    }

    let p = positives as f64;
    Ok((positive_rank_sum - p * (p + 1.0) / 2.0) / (p * negatives as f64))
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn average(classes: &[ClassMetrics], weight: impl Fn(&ClassMetrics) -> f64) -> ClassMetrics {
    let total: f64 = classes.iter().map(&weight).sum();
    let mean = |field: fn(&ClassMetrics) -> f64| {
        if total == 0.0 {
            0.0
        } else {
            classes.iter().map(|m| weight(m) * field(m)).sum::<f64>() / total
        }
    };
    ClassMetrics {
        precision: mean(|m| m.precision),
        recall: mean(|m| m.recall),
        f1: mean(|m| m.f1),
        support: classes.iter().map(|m| m.support).sum(),
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>14} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        let rows = [
            ("0", &self.per_class[0]),
            ("1", &self.per_class[1]),
            ("macro avg", &self.macro_avg),
            ("weighted avg", &self.weighted_avg),
        ];
        for (label, m) in rows {
            writeln!(
                f,
                "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                label, m.precision, m.recall, m.f1, m.support
            )?;
        }
        writeln!(f)?;
        writeln!(f, "accuracy: {:.4}", self.accuracy)?;
        writeln!(f, "roc_auc:  {:.4}", self.roc_auc)?;
        write!(
            f,
            "confusion: tn={} fp={} fn={} tp={}",
            self.confusion.tn, self.confusion.fp, self.confusion.fn_count, self.confusion.tp
        )
    }
}
