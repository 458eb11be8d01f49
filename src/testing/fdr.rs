//! Benjamini-Hochberg false discovery rate adjustment

/// Indices that sort `pvalues` ascending; NaN last, ties by position
pub fn ascending_order(pvalues: &[f64]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..pvalues.len()).collect();
    indices.sort_by(|&a, &b| {
        let (pa, pb) = (pvalues[a], pvalues[b]);
        match (pa.is_nan(), pb.is_nan()) {
            (true, true) => a.cmp(&b),
            (true, false) => std::cmp::Ordering::Greater,
            (false, true) => std::cmp::Ordering::Less,
            (false, false) => pa.total_cmp(&pb).then(a.cmp(&b)),
        }
    });
    indices
}

/// Apply Benjamini-Hochberg FDR correction to p-values
/// R equivalent: p.adjust(method="BH")
///
/// NaN p-values stay NaN and do not count towards the number of tests.
/// Adjusted values are a running minimum from the largest p-value down, so
/// they never decrease along ascending raw p-values.
pub fn benjamini_hochberg(pvalues: &[f64]) -> Vec<f64> {
    let n = pvalues.len();
    let mut padj = vec![f64::NAN; n];
    let m = pvalues.iter().filter(|p| !p.is_nan()).count();
    if m == 0 {
        return padj;
    }

    let order = ascending_order(pvalues);
    let mut cummin = f64::INFINITY;
    for (rank0, &i) in order[..m].iter().enumerate().rev() {
        let rank = rank0 + 1;
        let adj = (pvalues[i] * m as f64 / rank as f64).min(1.0);
        cummin = cummin.min(adj);
        padj[i] = cummin;
    }

    padj
}
