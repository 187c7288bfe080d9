//! Class-confusion histogram.

/// Square `C x C` count matrix, row = ground truth, column = prediction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionHistogram {
    num_classes: usize,
    counts: Vec<u64>,
}

impl ConfusionHistogram {
    /// Empty histogram over `num_classes` classes.
    pub fn zeros(num_classes: usize) -> Self {
        Self {
            num_classes,
            counts: vec![0; num_classes * num_classes],
        }
    }

    /// Build a histogram from explicit rows.
    ///
    /// # Panics
    ///
    /// Panics if the rows do not form a square matrix.
    pub fn from_rows<R: AsRef<[u64]>>(rows: &[R]) -> Self {
        let num_classes = rows.len();
        let mut counts = Vec::with_capacity(num_classes * num_classes);
        for row in rows {
            let row = row.as_ref();
            assert_eq!(
                row.len(),
                num_classes,
                "Confusion histogram must be square, got a row of {} for {num_classes} classes",
                row.len()
            );
            counts.extend_from_slice(row);
        }
        Self {
            num_classes,
            counts,
        }
    }

    pub const fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Row-major counts.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Count of pixels with ground truth `gt` predicted as `pred`.
    pub fn get(&self, gt: usize, pred: usize) -> u64 {
        self.counts[gt * self.num_classes + pred]
    }

    /// Total number of scored pixels.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn diagonal(&self) -> Vec<u64> {
        (0..self.num_classes).map(|c| self.get(c, c)).collect()
    }

    /// Ground-truth pixel count per class.
    pub fn row_sums(&self) -> Vec<u64> {
        self.counts
            .chunks(self.num_classes.max(1))
            .map(|row| row.iter().sum())
            .collect()
    }

    /// Predicted pixel count per class.
    pub fn col_sums(&self) -> Vec<u64> {
        let mut sums = vec![0; self.num_classes];
        for row in self.counts.chunks(self.num_classes.max(1)) {
            for (sum, count) in sums.iter_mut().zip(row) {
                *sum += count;
            }
        }
        sums
    }

    /// Add another histogram of the same class count into this one.
    ///
    /// # Panics
    ///
    /// Panics if the class counts differ.
    pub fn merge(&mut self, other: &Self) {
        assert_eq!(
            self.num_classes, other.num_classes,
            "Cannot merge histograms over {} and {} classes",
            self.num_classes, other.num_classes
        );
        for (acc, count) in self.counts.iter_mut().zip(&other.counts) {
            *acc += count;
        }
    }
}

/// Confusion histogram between a flattened ground-truth map and a prediction.
///
/// Entries whose ground truth lies outside `[0, num_classes)` are dropped,
/// which removes the ignore sentinel along with any other invalid id. A
/// prediction outside the same range cannot be binned and is dropped too.
/// Entries are paired positionally, so any flatten order works as long as
/// both inputs share it.
///
/// # Panics
///
/// In debug builds, panics if the two inputs differ in length.
pub fn fast_hist(ground_truth: &[i64], prediction: &[i64], num_classes: usize) -> ConfusionHistogram {
    debug_assert_eq!(
        ground_truth.len(),
        prediction.len(),
        "ground truth and prediction must have the same number of entries"
    );
    let mut hist = ConfusionHistogram::zeros(num_classes);
    let n = num_classes as i64;

    for (&gt, &pred) in ground_truth.iter().zip(prediction) {
        if !(0..n).contains(&gt) || !(0..n).contains(&pred) {
            continue;
        }
        hist.counts[(n * gt + pred) as usize] += 1;
    }

    hist
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IGNORE_LABEL;

    #[test]
    fn fast_hist_sum_matches_valid_ground_truth_count() {
        let gt = [0, 1, 2, 255, -1, 3, 1, 1];
        let pred = [0, 2, 2, 1, 0, 0, 1, 0];
        let hist = fast_hist(&gt, &pred, 3);

        let valid = gt.iter().filter(|&&v| (0..3).contains(&v)).count() as u64;
        assert_eq!(hist.total(), valid);
    }

    #[test]
    fn fast_hist_bins_ground_truth_rows_and_prediction_columns() {
        let gt = [0, 0, 0, 1, 1, 1];
        let pred = [0, 0, 1, 1, 1, 1];
        let hist = fast_hist(&gt, &pred, 2);

        assert_eq!(hist, ConfusionHistogram::from_rows(&[[2, 1], [0, 3]]));
        assert_eq!(hist.row_sums(), vec![3, 3]);
        assert_eq!(hist.col_sums(), vec![2, 4]);
        assert_eq!(hist.diagonal(), vec![2, 3]);
    }

    #[test]
    fn fast_hist_skips_ignore_label() {
        let ignore = i64::from(IGNORE_LABEL);
        let hist = fast_hist(&[ignore, ignore, 1], &[0, 1, 1], 2);
        assert_eq!(hist.total(), 1);
        assert_eq!(hist.get(1, 1), 1);
    }

    #[test]
    fn fast_hist_is_independent_of_flatten_order() {
        // 2x3 label maps flattened row-major and column-major.
        let gt = [[0, 1, 2], [2, 255, 1]];
        let pred = [[0, 2, 2], [1, 0, 1]];

        let row_major = |m: &[[i64; 3]; 2]| m.iter().flatten().copied().collect::<Vec<_>>();
        let col_major = |m: &[[i64; 3]; 2]| {
            (0..3)
                .flat_map(move |c| m.iter().map(move |row| row[c]))
                .collect::<Vec<_>>()
        };

        let a = fast_hist(&row_major(&gt), &row_major(&pred), 3);
        let b = fast_hist(&col_major(&gt), &col_major(&pred), 3);
        assert_eq!(a, b);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "same number of entries")]
    fn fast_hist_rejects_length_mismatch() {
        fast_hist(&[0, 1, 1], &[0, 1], 2);
    }

    #[test]
    fn merge_accumulates_counts() {
        let mut acc = ConfusionHistogram::zeros(2);
        acc.merge(&fast_hist(&[0, 1], &[0, 1], 2));
        acc.merge(&fast_hist(&[0, 1], &[1, 1], 2));
        assert_eq!(acc, ConfusionHistogram::from_rows(&[[1, 1], [0, 2]]));
    }
}
