//! Uncertainty decomposition and calibration metrics supplied to governance

use crate::types::{now, Timestamp};
use serde::{Deserialize, Serialize};

/// Total uncertainty split into reducible and irreducible parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyDecomposition {
    pub total: f64,
    /// Reducible with more evidence
    pub epistemic: f64,
    /// Inherent noise of the task
    pub aleatoric: f64,
    /// `epistemic / total`, 0 when total is 0, NaN when any part is non-finite
    pub epistemic_ratio: f64,
    pub method: String,
}

impl UncertaintyDecomposition {
    /// Build from components; total is their sum
    pub fn new(epistemic: f64, aleatoric: f64, method: impl Into<String>) -> Self {
        Self::from_parts(epistemic + aleatoric, epistemic, aleatoric, method)
    }

    /// Build from an externally measured total. The components need not sum
    /// exactly to it.
    pub fn from_parts(total: f64, epistemic: f64, aleatoric: f64, method: impl Into<String>) -> Self {
        let epistemic_ratio = if !(total.is_finite() && epistemic.is_finite() && aleatoric.is_finite()) {
            f64::NAN
        } else if total > 0.0 {
            (epistemic / total).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            total,
            epistemic,
            aleatoric,
            epistemic_ratio,
            method: method.into(),
        }
    }

    /// No uncertainty at all
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, "none")
    }

    /// Decompose from ensemble member probabilities for one binary outcome.
    ///
    /// Epistemic is the variance between members, aleatoric the mean
    /// Bernoulli variance within members. Both are scaled by 4 so the total
    /// lies in [0, 1].
    pub fn from_ensemble(member_probabilities: &[f64]) -> Self {
        if member_probabilities.is_empty() {
            return Self::new(0.0, 0.0, "ensemble_variance");
        }
        let n = member_probabilities.len() as f64;
        let probs: Vec<f64> = member_probabilities
            .iter()
            .map(|p| p.clamp(0.0, 1.0))
            .collect();
        let mean = probs.iter().sum::<f64>() / n;
        let epistemic = probs.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
        let aleatoric = probs.iter().map(|p| p * (1.0 - p)).sum::<f64>() / n;

        Self::from_parts(
            4.0 * mean * (1.0 - mean),
            4.0 * epistemic,
            4.0 * aleatoric,
            "ensemble_variance",
        )
    }

    /// Whether `epistemic + aleatoric` is within `tolerance` of `total`
    pub fn is_consistent(&self, tolerance: f64) -> bool {
        (self.epistemic + self.aleatoric - self.total).abs() <= tolerance
    }
}

/// One equal-width confidence bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBucket {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
    pub mean_confidence: f64,
    pub accuracy: f64,
}

/// Calibration of an agent over a recent prediction window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationMetrics {
    /// Expected calibration error
    pub ece: f64,
    /// Maximum calibration error
    pub mce: f64,
    pub brier_score: f64,
    pub window_size: usize,
    pub window_start: Timestamp,
    pub window_end: Timestamp,
    #[serde(default)]
    pub buckets: Vec<CalibrationBucket>,
}

impl CalibrationMetrics {
    /// Metrics carrying only an ECE value (MCE set equal to it)
    pub fn from_ece(ece: f64) -> Self {
        let t = now();
        Self {
            ece,
            mce: ece,
            brier_score: 0.0,
            window_size: 0,
            window_start: t,
            window_end: t,
            buckets: Vec::new(),
        }
    }

    /// Compute from `(confidence, correct)` pairs with equal-width buckets
    pub fn from_predictions(
        predictions: &[(f64, bool)],
        bucket_count: usize,
        window_start: Timestamp,
        window_end: Timestamp,
    ) -> Self {
        let bucket_count = bucket_count.max(1);
        let n = predictions.len();
        let width = 1.0 / bucket_count as f64;

        let mut sums = vec![(0usize, 0.0f64, 0usize); bucket_count];
        let mut brier = 0.0;
        for &(confidence, correct) in predictions {
            let c = if confidence.is_finite() {
                confidence.clamp(0.0, 1.0)
            } else {
                0.0
            };
            let index = ((c / width) as usize).min(bucket_count - 1);
            let slot = &mut sums[index];
            slot.0 += 1;
            slot.1 += c;
            if correct {
                slot.2 += 1;
            }
            let outcome = if correct { 1.0 } else { 0.0 };
            brier += (c - outcome).powi(2);
        }

        let mut ece = 0.0;
        let mut mce: f64 = 0.0;
        let buckets: Vec<CalibrationBucket> = sums
            .iter()
            .enumerate()
            .map(|(i, &(count, conf_sum, correct))| {
                let (mean_confidence, accuracy) = if count > 0 {
                    (conf_sum / count as f64, correct as f64 / count as f64)
                } else {
                    (0.0, 0.0)
                };
                if count > 0 {
                    let gap = (accuracy - mean_confidence).abs();
                    ece += gap * count as f64 / n as f64;
                    mce = mce.max(gap);
                }
                CalibrationBucket {
                    lower: i as f64 * width,
                    upper: (i + 1) as f64 * width,
                    count,
                    mean_confidence,
                    accuracy,
                }
            })
            .collect();

        Self {
            ece,
            mce,
            brier_score: if n > 0 { brier / n as f64 } else { 0.0 },
            window_size: n,
            window_start,
            window_end,
            buckets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio() {
        let d = UncertaintyDecomposition::new(0.5, 0.1, "manual");
        assert!((d.total - 0.6).abs() < 1e-12);
        assert!((d.epistemic_ratio - 0.5 / 0.6).abs() < 1e-12);
        assert!(d.is_consistent(1e-9));
    }

    #[test]
    fn test_zero_total_has_zero_ratio() {
        let d = UncertaintyDecomposition::zero();
        assert_eq!(d.epistemic_ratio, 0.0);
    }

    #[test]
    fn test_non_finite_parts_give_nan_ratio() {
        assert!(UncertaintyDecomposition::from_parts(f64::INFINITY, 0.5, 0.1, "x").epistemic_ratio.is_nan());
        assert!(UncertaintyDecomposition::new(0.1, f64::INFINITY, "x").epistemic_ratio.is_nan());
        assert!(UncertaintyDecomposition::from_parts(0.5, f64::NAN, 0.1, "x").epistemic_ratio.is_nan());
    }

    #[test]
    fn test_ensemble_agreement_is_aleatoric() {
        // members agree on a coin flip: no disagreement, all noise
        let d = UncertaintyDecomposition::from_ensemble(&[0.5, 0.5, 0.5]);
        assert!(d.epistemic.abs() < 1e-12);
        assert!((d.aleatoric - 1.0).abs() < 1e-12);
        assert!(d.is_consistent(1e-9));
    }

    #[test]
    fn test_ensemble_disagreement_is_epistemic() {
        // confident members that disagree
        let d = UncertaintyDecomposition::from_ensemble(&[0.0, 1.0, 0.0, 1.0]);
        assert!((d.epistemic - 1.0).abs() < 1e-12);
        assert!(d.aleatoric.abs() < 1e-12);
        assert!((d.epistemic_ratio - 1.0).abs() < 1e-12);
        assert!(d.is_consistent(1e-9));
    }

    #[test]
    fn test_perfect_calibration() {
        let t = now();
        let preds: Vec<(f64, bool)> = (0..10).map(|i| (0.95, i != 0)).collect();
        let m = CalibrationMetrics::from_predictions(&preds, 10, t, t);
        // accuracy 0.9 vs confidence 0.95
        assert!((m.ece - 0.05).abs() < 1e-9);
        assert!((m.mce - 0.05).abs() < 1e-9);
        assert_eq!(m.window_size, 10);
        assert_eq!(m.buckets.len(), 10);
        assert_eq!(m.buckets[9].count, 10);
    }

    #[test]
    fn test_overconfident_agent() {
        let t = now();
        let preds = vec![(1.0, false), (1.0, false), (0.0, true), (0.0, true)];
        let m = CalibrationMetrics::from_predictions(&preds, 5, t, t);
        assert!((m.ece - 1.0).abs() < 1e-9);
        assert!((m.brier_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_window() {
        let t = now();
        let m = CalibrationMetrics::from_predictions(&[], 10, t, t);
        assert_eq!(m.ece, 0.0);
        assert_eq!(m.brier_score, 0.0);
    }
}
