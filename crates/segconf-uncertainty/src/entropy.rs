use burn::prelude::*;

/// Added inside every logarithm so `p = 0` contributes `0` instead of `NaN`.
pub const LOG_EPSILON: f64 = 1e-9;

/// Per-pixel `Σ_c p_c · log(p_c + ε)`.
///
/// # Shapes
///
/// - probs: `[batch_size, num_classes, height, width]`
/// - output: `[batch_size, height, width]`
pub fn entropy_map<B: Backend>(probs: Tensor<B, 4>) -> Tensor<B, 3> {
    let [batch_size, _, height, width] = probs.dims();

    let log_probs = (probs.clone() + LOG_EPSILON).log();
    (probs * log_probs)
        .sum_dim(1)
        .reshape([batch_size, height, width])
}

/// Binary entropy of "class `j`" against "any other class", averaged over
/// the image.
///
/// For class `j` with probability `p_j` and `r_j = Σ_{c≠j} p_c`:
/// `p_j·log(p_j + ε) + r_j·log(r_j + ε)`. `r_j` is summed over the other
/// channels rather than taken as `1 - p_j`.
///
/// # Shapes
///
/// - probs: `[batch_size, num_classes, height, width]`
/// - output: `[batch_size, num_classes]`
pub fn one_vs_rest_confidence<B: Backend>(probs: Tensor<B, 4>) -> Tensor<B, 2> {
    let [batch_size, num_classes, _, _] = probs.dims();
    let device = probs.device();

    let per_class = (0..num_classes)
        .map(|j| {
            let p = probs.clone().narrow(1, j, 1);
            let rest = (probs.clone() * rest_mask::<B>(num_classes, j, &device)).sum_dim(1);

            binary_term(p) + binary_term(rest)
        })
        .collect();

    Tensor::cat(per_class, 1)
        .mean_dim(3)
        .mean_dim(2)
        .reshape([batch_size, num_classes])
}

fn binary_term<B: Backend>(p: Tensor<B, 4>) -> Tensor<B, 4> {
    p.clone() * (p + LOG_EPSILON).log()
}

/// `[1, C, 1, 1]` mask selecting every channel except `excluded`.
fn rest_mask<B: Backend>(num_classes: usize, excluded: usize, device: &B::Device) -> Tensor<B, 4> {
    let values = (0..num_classes)
        .map(|c| if c == excluded { 0.0f32 } else { 1.0 })
        .collect::<Vec<_>>();

    Tensor::from_data(TensorData::new(values, [1, num_classes, 1, 1]), device)
}

#[cfg(test)]
mod tests {
    use burn::tensor::{activation::softmax, Distribution, Tolerance};

    use super::*;
    use crate::tests::TestBackend;

    /// Builds `[1, C, 1, 1]` probabilities from a per-class vector.
    fn pixel(values: &[f32]) -> Tensor<TestBackend, 4> {
        Tensor::from_data(
            TensorData::new(values.to_vec(), [1, values.len(), 1, 1]),
            &Default::default(),
        )
    }

    #[test]
    fn entropy_map_is_non_positive() {
        let device = Default::default();
        let scores =
            Tensor::<TestBackend, 4>::random([2, 5, 6, 7], Distribution::Normal(0.0, 3.0), &device);
        let probs = softmax(scores, 1);

        let entropy = entropy_map(probs);

        assert_eq!(entropy.dims(), [2, 6, 7]);
        let values = entropy.into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|&v| v <= 1e-6));
    }

    #[test]
    fn entropy_map_uniform_distribution() {
        let entropy = entropy_map(pixel(&[0.25, 0.25, 0.25, 0.25]));

        let expected = TensorData::from([[[-(4.0f32).ln()]]]);
        entropy
            .into_data()
            .assert_approx_eq::<f32>(&expected, Tolerance::absolute(1e-5));
    }

    #[test]
    fn entropy_map_certain_pixel_is_zero() {
        let entropy = entropy_map(pixel(&[0.0, 1.0, 0.0]));

        let expected = TensorData::from([[[0.0f32]]]);
        entropy
            .into_data()
            .assert_approx_eq::<f32>(&expected, Tolerance::absolute(1e-6));
    }

    #[test]
    fn one_vs_rest_at_certain_and_even_probabilities() {
        // p_0 = 1: both binary terms vanish for every class.
        let certain = one_vs_rest_confidence(pixel(&[1.0, 0.0]));
        certain
            .into_data()
            .assert_approx_eq::<f32>(&TensorData::from([[0.0f32, 0.0]]), Tolerance::absolute(1e-6));

        // p = 0.5 on two classes: 2 · 0.5 · log 0.5 = -log 2.
        let even = one_vs_rest_confidence(pixel(&[0.5, 0.5]));
        let ln2 = (2.0f32).ln();
        even.into_data().assert_approx_eq::<f32>(
            &TensorData::from([[-ln2, -ln2]]),
            Tolerance::absolute(1e-5),
        );
    }

    #[test]
    fn one_vs_rest_sums_other_classes() {
        // Class 0 vs {1, 2}: 0.5 vs 0.5. Class 1 vs {0, 2}: 0.25 vs 0.75.
        let confidence = one_vs_rest_confidence(pixel(&[0.5, 0.25, 0.25]));

        let half = 0.5f32 * 0.5f32.ln() * 2.0;
        let quarter = 0.25f32 * 0.25f32.ln() + 0.75f32 * 0.75f32.ln();
        confidence.into_data().assert_approx_eq::<f32>(
            &TensorData::from([[half, quarter, quarter]]),
            Tolerance::absolute(1e-5),
        );
    }

    #[test]
    fn one_vs_rest_averages_over_pixels() {
        let device = Default::default();
        // Two pixels of class 0 certainty and two of an even split.
        let probs = Tensor::<TestBackend, 4>::from_data(
            TensorData::new(
                vec![1.0f32, 1.0, 0.5, 0.5, 0.0, 0.0, 0.5, 0.5],
                [1, 2, 2, 2],
            ),
            &device,
        );

        let confidence = one_vs_rest_confidence(probs);

        let expected = -(2.0f32).ln() / 2.0;
        confidence.into_data().assert_approx_eq::<f32>(
            &TensorData::from([[expected, expected]]),
            Tolerance::absolute(1e-5),
        );
    }
}
