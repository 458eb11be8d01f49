//! Statistical utility functions shared across modules

use ndarray::ArrayView1;

/// Pearson correlation of two equal-length vectors.
///
/// Returns NaN when either vector has zero variance.
pub fn pearson(x: ArrayView1<'_, f64>, y: ArrayView1<'_, f64>) -> f64 {
    assert_eq!(x.len(), y.len());
    let n = x.len();
    if n < 2 {
        return f64::NAN;
    }

    let mx = x.sum() / n as f64;
    let my = y.sum() / n as f64;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (&a, &b) in x.iter().zip(y.iter()) {
        let dx = a - mx;
        let dy = b - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx <= 0.0 || syy <= 0.0 {
        return f64::NAN;
    }
    (sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0)
}

/// Default split-candidate count: ceil(sqrt(n_features)), at least 1
pub fn default_split_candidates(n_features: usize) -> usize {
    ((n_features as f64).sqrt().ceil() as usize).max(1)
}

/// Ratio that is NaN instead of a division by zero
pub fn safe_ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        f64::NAN
    } else {
        num / den
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_pearson_perfect() {
        let x = array![1.0, 2.0, 3.0, 4.0];
        let y = array![2.0, 4.0, 6.0, 8.0];
        let z = array![4.0, 3.0, 2.0, 1.0];
        assert!((pearson(x.view(), y.view()) - 1.0).abs() < 1e-12);
        assert!((pearson(x.view(), z.view()) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_constant_is_nan() {
        let x = array![1.0, 1.0, 1.0];
        let y = array![1.0, 2.0, 3.0];
        assert!(pearson(x.view(), y.view()).is_nan());
    }

    #[test]
    fn test_default_split_candidates() {
        assert_eq!(default_split_candidates(200), 15);
        assert_eq!(default_split_candidates(100), 10);
        assert_eq!(default_split_candidates(10), 4);
        assert_eq!(default_split_candidates(0), 1);
    }
}
