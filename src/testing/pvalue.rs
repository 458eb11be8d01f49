//! P-value calculation from test statistics

use statrs::distribution::{ContinuousCDF, FisherSnedecor};

/// Upper-tail p-value of an F statistic
/// R equivalent: pf(f, df1, df2, lower.tail=FALSE) as reported by anova(lm(...))
pub fn f_test_pvalue(f: f64, df1: f64, df2: f64) -> f64 {
    if f.is_nan() || df1 <= 0.0 || df2 <= 0.0 {
        return f64::NAN;
    }
    if f == f64::INFINITY {
        return 0.0;
    }
    if f <= 0.0 {
        return 1.0;
    }

    match FisherSnedecor::new(df1, df2) {
        Ok(dist) => dist.sf(f).clamp(0.0, 1.0),
        Err(_) => f64::NAN,
    }
}
