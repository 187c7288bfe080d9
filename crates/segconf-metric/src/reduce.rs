/// Arithmetic mean over the non-`NaN` entries of `values`.
///
/// Returns `NaN` when no finite-or-infinite entry remains, matching the
/// usual NaN-aware mean.
pub fn nanmean(values: &[f64]) -> f64 {
    let (sum, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nanmean_skips_nan_entries() {
        assert_eq!(nanmean(&[1.0, f64::NAN, 3.0]), 2.0);
    }

    #[test]
    fn nanmean_of_all_nan_is_nan() {
        assert!(nanmean(&[f64::NAN, f64::NAN]).is_nan());
        assert!(nanmean(&[]).is_nan());
    }
}
