use crate::testing::TestResult;
use crate::testing::utils::{average_ranks, sort_tagged, tie_correction_term};
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Kruskal-Wallis H-test across groups of one field.
///
/// Ranks are averaged over ties and H is divided by the tie correction factor. The
/// p-value comes from the chi-square distribution with `k - 1` degrees of freedom.
/// Fewer than two non-empty groups, or a sample in which every value is identical,
/// gives an undefined result (NaN, p = 1).
pub fn kruskal_wallis(groups: &[&[f64]]) -> TestResult<f64> {
    let k = groups.len();
    if k < 2 || groups.iter().any(|g| g.is_empty()) {
        return TestResult::undefined();
    }

    let total_n: usize = groups.iter().map(|g| g.len()).sum();
    let n = total_n as f64;

    let mut combined: Vec<(f64, usize)> = Vec::with_capacity(total_n);
    for (group_idx, group) in groups.iter().enumerate() {
        combined.extend(group.iter().map(|&v| (v, group_idx)));
    }
    sort_tagged(&mut combined);

    let ranks = average_ranks(&combined);

    let mut rank_sums = vec![0.0; k];
    for ((_, group_idx), &rank) in combined.iter().zip(ranks.iter()) {
        rank_sums[*group_idx] += rank;
    }

    let mut h = rank_sums
        .iter()
        .zip(groups.iter())
        .map(|(&sum, g)| sum * sum / g.len() as f64)
        .sum::<f64>();
    h = 12.0 / (n * (n + 1.0)) * h - 3.0 * (n + 1.0);

    let tie_factor = 1.0 - tie_correction_term(&combined) / (n * n * n - n);
    if tie_factor <= 0.0 {
        return TestResult::undefined();
    }
    h /= tie_factor;

    let df = (k - 1) as f64;
    let p_value = match ChiSquared::new(df) {
        Ok(dist) => dist.sf(h),
        Err(_) => 1.0,
    };

    TestResult::new(h, p_value)
        .with_degrees_of_freedom(df)
        .with_metadata("tie_factor", tie_factor)
}
