//! One-way ANOVA of a single feature against class labels

use ndarray::ArrayView1;

use super::pvalue::f_test_pvalue;

/// Fit of one feature
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnovaFit {
    pub f_statistic: f64,
    pub pvalue: f64,
    pub df_between: usize,
    pub df_within: usize,
}

/// Why a feature could not be tested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnovaFailure {
    /// Every sample has the same value
    ZeroVariance,
    /// N <= k leaves no residual degrees of freedom
    NoResidualDf,
    /// Fewer than two groups have samples
    SingleGroup,
}

impl std::fmt::Display for AnovaFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnovaFailure::ZeroVariance => write!(f, "zero variance across samples"),
            AnovaFailure::NoResidualDf => write!(f, "no residual degrees of freedom"),
            AnovaFailure::SingleGroup => write!(f, "fewer than two groups present"),
        }
    }
}

/// One-way ANOVA F test of `values` grouped by `groups` (ids in `0..n_groups`)
/// R equivalent: anova(lm(value ~ class))[["Pr(>F)"]][1]
pub fn one_way_anova(
    values: ArrayView1<'_, f64>,
    groups: &[usize],
    n_groups: usize,
) -> Result<AnovaFit, AnovaFailure> {
    assert_eq!(values.len(), groups.len());

    let first = values.first().copied().unwrap_or(0.0);
    if values.iter().all(|&v| v == first) {
        return Err(AnovaFailure::ZeroVariance);
    }

    let mut sums = vec![0.0; n_groups];
    let mut counts = vec![0usize; n_groups];
    for (&v, &g) in values.iter().zip(groups.iter()) {
        sums[g] += v;
        counts[g] += 1;
    }

    let k = counts.iter().filter(|&&c| c > 0).count();
    let n = values.len();
    if k < 2 {
        return Err(AnovaFailure::SingleGroup);
    }
    if n <= k {
        return Err(AnovaFailure::NoResidualDf);
    }

    let grand_mean = values.sum() / n as f64;
    let means: Vec<f64> = sums
        .iter()
        .zip(counts.iter())
        .map(|(&s, &c)| if c > 0 { s / c as f64 } else { 0.0 })
        .collect();

    let ss_between: f64 = means
        .iter()
        .zip(counts.iter())
        .filter(|(_, &c)| c > 0)
        .map(|(&m, &c)| c as f64 * (m - grand_mean).powi(2))
        .sum();
    let ss_within: f64 = values
        .iter()
        .zip(groups.iter())
        .map(|(&v, &g)| (v - means[g]).powi(2))
        .sum();

    let df_between = k - 1;
    let df_within = n - k;

    let f_statistic = if ss_within > 0.0 {
        (ss_between / df_between as f64) / (ss_within / df_within as f64)
    } else {
        f64::INFINITY
    };

    Ok(AnovaFit {
        f_statistic,
        pvalue: f_test_pvalue(f_statistic, df_between as f64, df_within as f64),
        df_between,
        df_within,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_anova_textbook() {
        // groups a = {1,2,3}, b = {4,5,6}: SSB = 13.5, SSW = 4, F = 13.5 / 1 = 13.5
        let values = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let groups = [0, 0, 0, 1, 1, 1];
        let fit = one_way_anova(values.view(), &groups, 2).unwrap();
        assert_eq!(fit.df_between, 1);
        assert_eq!(fit.df_within, 4);
        assert!((fit.f_statistic - 13.5).abs() < 1e-10);
        assert!(fit.pvalue > 0.0 && fit.pvalue < 0.05);
    }

    #[test]
    fn test_anova_no_difference() {
        let values = array![1.0, 2.0, 3.0, 1.0, 2.0, 3.0];
        let groups = [0, 0, 0, 1, 1, 1];
        let fit = one_way_anova(values.view(), &groups, 2).unwrap();
        assert!(fit.f_statistic.abs() < 1e-12);
        assert!((fit.pvalue - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_anova_zero_variance() {
        let values = array![2.0, 2.0, 2.0, 2.0];
        let groups = [0, 0, 1, 1];
        assert_eq!(
            one_way_anova(values.view(), &groups, 2),
            Err(AnovaFailure::ZeroVariance)
        );
    }

    #[test]
    fn test_anova_perfect_separation() {
        let values = array![1.0, 1.0, 5.0, 5.0];
        let groups = [0, 0, 1, 1];
        let fit = one_way_anova(values.view(), &groups, 2).unwrap();
        assert!(fit.f_statistic.is_infinite());
        assert_eq!(fit.pvalue, 0.0);
    }

    #[test]
    fn test_anova_empty_group_ignored() {
        let values = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let groups = [0, 0, 0, 2, 2, 2];
        let fit = one_way_anova(values.view(), &groups, 3).unwrap();
        assert_eq!(fit.df_between, 1);
        assert!((fit.f_statistic - 13.5).abs() < 1e-10);
    }
}
