//! Accuracy and IoU statistics derived from a confusion histogram.

use crate::{confusion::ConfusionHistogram, reduce::nanmean};

/// Additive epsilon applied to every denominator in [`result_stats`].
pub const STATS_EPSILON: f64 = 1e-8;

/// Statistics for one confusion histogram. Rates are percentages.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationStats {
    /// Correctly classified pixels over all scored pixels.
    pub acc_overall: f64,
    /// Per-class recall: diagonal over ground-truth row sum.
    pub acc_per_class: Vec<f64>,
    /// Per-class intersection over union.
    pub iou: Vec<f64>,
    /// IoU weighted by ground-truth class frequency.
    pub fw_iou: f64,
    /// Ground-truth pixel count per class.
    pub pixels_per_class: Vec<u64>,
}

impl SegmentationStats {
    /// NaN-skipping mean of the per-class IoU.
    pub fn mean_iou(&self) -> f64 {
        nanmean(&self.iou)
    }

    /// NaN-skipping mean of the per-class accuracy.
    pub fn mean_class_accuracy(&self) -> f64 {
        nanmean(&self.acc_per_class)
    }
}

/// Derive accuracy, per-class accuracy, IoU, frequency-weighted IoU and
/// per-class pixel counts from `hist`.
///
/// With the epsilon guard a class that is absent from both ground truth and
/// prediction reports `0` IoU and `0` accuracy, and an empty histogram
/// reports `0` everywhere.
pub fn result_stats(hist: &ConfusionHistogram) -> SegmentationStats {
    let diag = hist.diagonal();
    let rows = hist.row_sums();
    let cols = hist.col_sums();
    let total = hist.total() as f64;

    let trace: u64 = diag.iter().sum();
    let acc_overall = trace as f64 / (total + STATS_EPSILON) * 100.0;

    let acc_per_class = diag
        .iter()
        .zip(&rows)
        .map(|(&d, &r)| d as f64 / (r as f64 + STATS_EPSILON) * 100.0)
        .collect::<Vec<_>>();

    let iou = diag
        .iter()
        .zip(rows.iter().zip(&cols))
        .map(|(&d, (&r, &c))| {
            let union = r as f64 + c as f64 - d as f64;
            d as f64 / (union + STATS_EPSILON) * 100.0
        })
        .collect::<Vec<_>>();

    let fw_iou = rows
        .iter()
        .zip(&iou)
        .map(|(&r, &iu)| (r as f64 / (total + STATS_EPSILON), iu))
        .filter(|&(freq, _)| freq > 0.0)
        .map(|(freq, iu)| freq * iu)
        .sum();

    SegmentationStats {
        acc_overall,
        acc_per_class,
        iou,
        fw_iou,
        pixels_per_class: rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn result_stats_two_class_scenario() {
        let hist = ConfusionHistogram::from_rows(&[[2, 1], [0, 3]]);
        let stats = result_stats(&hist);

        assert_close(stats.acc_overall, 5.0 / 6.0 * 100.0, 1e-4);
        assert_close(stats.acc_per_class[0], 2.0 / 3.0 * 100.0, 1e-4);
        assert_close(stats.acc_per_class[1], 100.0, 1e-4);
        assert_close(stats.iou[0], 2.0 / 3.0 * 100.0, 1e-4);
        assert_close(stats.iou[1], 75.0, 1e-4);
        assert_close(
            stats.fw_iou,
            0.5 * (2.0 / 3.0 * 100.0) + 0.5 * 75.0,
            1e-4,
        );
        assert_eq!(stats.pixels_per_class, vec![3, 3]);
    }

    #[test]
    fn result_stats_diagonal_histogram_is_perfect() {
        let hist = ConfusionHistogram::from_rows(&[[4, 0, 0], [0, 7, 0], [0, 0, 1]]);
        let stats = result_stats(&hist);

        for c in 0..3 {
            assert_close(stats.iou[c], 100.0, 1e-4);
            assert_close(stats.acc_per_class[c], 100.0, 1e-4);
        }
        assert_close(stats.fw_iou, 100.0, 1e-4);
        assert_close(stats.acc_overall, 100.0, 1e-4);
    }

    #[test]
    fn result_stats_absent_class_reports_zero_not_nan() {
        let hist = ConfusionHistogram::from_rows(&[[5, 0], [0, 0]]);
        let stats = result_stats(&hist);

        assert_eq!(stats.iou[1], 0.0);
        assert_eq!(stats.acc_per_class[1], 0.0);
        assert_close(stats.mean_iou(), 50.0, 1e-4);
        // Absent classes carry zero frequency and do not enter the weighted IoU.
        assert_close(stats.fw_iou, 100.0, 1e-4);
    }

    #[test]
    fn result_stats_empty_histogram_is_zero_everywhere() {
        let stats = result_stats(&ConfusionHistogram::zeros(3));

        assert_eq!(stats.acc_overall, 0.0);
        assert!(!stats.acc_overall.is_nan());
        assert!(stats.iou.iter().all(|&v| v == 0.0));
        assert!(stats.acc_per_class.iter().all(|&v| v == 0.0));
        assert_eq!(stats.fw_iou, 0.0);
        assert_eq!(stats.pixels_per_class, vec![0, 0, 0]);
    }
}
