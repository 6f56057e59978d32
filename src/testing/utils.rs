use num_traits::Float;

/// Arithmetic mean, `None` for an empty sample.
pub fn mean<T>(values: &[T]) -> Option<T>
where
    T: Float,
{
    if values.is_empty() {
        return None;
    }
    let sum = values.iter().fold(T::zero(), |acc, &v| acc + v);
    Some(sum / T::from(values.len())?)
}

/// Unbiased sample variance, `None` for fewer than two observations.
pub fn sample_variance<T>(values: &[T]) -> Option<T>
where
    T: Float,
{
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss = values.iter().fold(T::zero(), |acc, &v| acc + (v - m) * (v - m));
    Some(ss / T::from(values.len() - 1)?)
}

/// True when every value equals the first one (including the empty sample).
pub fn has_zero_range<T>(values: &[T]) -> bool
where
    T: Float,
{
    match values.first() {
        Some(&first) => values.iter().all(|&v| v == first),
        None => true,
    }
}

/// Sort `(value, tag)` pairs ascending by value; NaN sorts last.
pub fn sort_tagged(combined: &mut [(f64, usize)]) {
    combined.sort_by(|a, b| a.0.total_cmp(&b.0));
}

/// Average (1-based) ranks of sorted values; tied values share the mean of their ranks.
pub fn average_ranks(sorted: &[(f64, usize)]) -> Vec<f64> {
    let mut ranks = vec![0.0; sorted.len()];
    let mut i = 0;
    while i < sorted.len() {
        let val = sorted[i].0;
        let mut j = i + 1;

        while j < sorted.len() && sorted[j].0 == val {
            j += 1;
        }

        let rank = (i + j + 1) as f64 / 2.0;
        for r in ranks.iter_mut().take(j).skip(i) {
            *r = rank;
        }

        i = j;
    }
    ranks
}

/// Tie term Σ t(t² - 1) over all runs of tied values in a sorted sample.
pub fn tie_correction_term(sorted: &[(f64, usize)]) -> f64 {
    let mut term = 0.0;
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i + 1;
        while j < sorted.len() && sorted[j].0 == sorted[i].0 {
            j += 1;
        }
        let t = (j - i) as f64;
        term += t * (t * t - 1.0);
        i = j;
    }
    term
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_and_variance() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&values).unwrap(), 5.0);
        assert_relative_eq!(sample_variance(&values).unwrap(), 32.0 / 7.0, epsilon = 1e-12);
        assert!(sample_variance(&[1.0_f64]).is_none());
        assert!(mean::<f64>(&[]).is_none());
    }

    #[test]
    fn test_zero_range() {
        assert!(has_zero_range(&[5.0, 5.0, 5.0]));
        assert!(!has_zero_range(&[5.0, 5.0, 5.000001]));
        assert!(has_zero_range::<f32>(&[]));
    }

    #[test]
    fn test_average_ranks_with_ties() {
        let mut combined = vec![(3.0, 0), (1.0, 0), (3.0, 1), (2.0, 1)];
        sort_tagged(&mut combined);
        let ranks = average_ranks(&combined);
        assert_eq!(ranks, vec![1.0, 2.0, 3.5, 3.5]);
        assert_relative_eq!(tie_correction_term(&combined), 6.0);
    }

    #[test]
    fn test_sort_tagged_orders_nan_last() {
        let mut combined: Vec<(f64, usize)> = (0..40)
            .map(|i| (if i % 7 == 0 { f64::NAN } else { (i * 13 % 17) as f64 }, i))
            .collect();
        sort_tagged(&mut combined);
        let finite: Vec<f64> = combined.iter().map(|c| c.0).filter(|v| !v.is_nan()).collect();
        assert!(finite.windows(2).all(|w| w[0] <= w[1]));
        assert!(combined[finite.len()..].iter().all(|c| c.0.is_nan()));
    }
}
