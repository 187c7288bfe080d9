//! Per-image metric record persisted by the evaluation driver.

use serde::{Deserialize, Serialize};

use crate::stats::SegmentationStats;

/// Metrics for a single evaluated image.
///
/// Serialized as a positional JSON array:
/// `[iou, pixels_per_class, fw_iou, acc_overall, acc_per_class, confidence]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "MetricRecordRepr", from = "MetricRecordRepr")]
pub struct MetricRecord {
    pub iou: Vec<f64>,
    pub pixels_per_class: Vec<u64>,
    pub fw_iou: f64,
    pub acc_overall: f64,
    pub acc_per_class: Vec<f64>,
    /// One-vs-rest confidence per class for the first image of the batch.
    pub confidence: Vec<f32>,
}

#[derive(Serialize, Deserialize)]
struct MetricRecordRepr(Vec<f64>, Vec<u64>, f64, f64, Vec<f64>, Vec<f32>);

impl MetricRecord {
    pub fn new(stats: SegmentationStats, confidence: Vec<f32>) -> Self {
        Self {
            iou: stats.iou,
            pixels_per_class: stats.pixels_per_class,
            fw_iou: stats.fw_iou,
            acc_overall: stats.acc_overall,
            acc_per_class: stats.acc_per_class,
            confidence,
        }
    }
}

impl From<MetricRecord> for MetricRecordRepr {
    fn from(record: MetricRecord) -> Self {
        Self(
            record.iou,
            record.pixels_per_class,
            record.fw_iou,
            record.acc_overall,
            record.acc_per_class,
            record.confidence,
        )
    }
}

impl From<MetricRecordRepr> for MetricRecord {
    fn from(repr: MetricRecordRepr) -> Self {
        let MetricRecordRepr(iou, pixels_per_class, fw_iou, acc_overall, acc_per_class, confidence) =
            repr;
        Self {
            iou,
            pixels_per_class,
            fw_iou,
            acc_overall,
            acc_per_class,
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{result_stats, ConfusionHistogram};

    #[test]
    fn metric_record_serializes_as_positional_array() {
        let stats = result_stats(&ConfusionHistogram::from_rows(&[[1, 0], [0, 1]]));
        let record = MetricRecord::new(stats, vec![-0.5, -0.25]);

        let value = serde_json::to_value(&record).expect("record serializes");
        let items = value.as_array().expect("record is a JSON array");

        assert_eq!(items.len(), 6);
        assert_eq!(items[1], serde_json::json!([1, 1]));
        assert_eq!(items[5], serde_json::json!([-0.5, -0.25]));
        assert!(items[2].as_f64().is_some());
    }
}
