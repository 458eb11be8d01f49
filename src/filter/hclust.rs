//! Agglomerative hierarchical clustering and tree cutting
//!
//! Works on a full symmetric distance matrix with Lance-Williams updates.
//! Group sizes in sample QC are small (tens to a few hundred samples), so the
//! straightforward O(n^3) merge loop is used.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Linkage criterion for merging clusters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Linkage {
    /// Maximum pairwise distance (hclust default)
    #[default]
    Complete,
    /// Size-weighted mean pairwise distance (UPGMA)
    Average,
    /// Minimum pairwise distance
    Single,
}

impl std::str::FromStr for Linkage {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "complete" => Ok(Linkage::Complete),
            "average" => Ok(Linkage::Average),
            "single" => Ok(Linkage::Single),
            other => Err(PipelineError::InvalidInput {
                reason: format!(
                    "Unknown linkage '{}'. Use 'complete', 'average' or 'single'.",
                    other
                ),
            }),
        }
    }
}

/// One agglomeration step.
/// Clusters are identified by their lowest member index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Merge {
    pub left: usize,
    pub right: usize,
    pub height: f64,
    pub size: usize,
}

/// Full merge history of n observations
#[derive(Debug, Clone)]
pub struct Dendrogram {
    n_leaves: usize,
    merges: Vec<Merge>,
}

/// Cluster id per observation after cutting a dendrogram
#[derive(Debug, Clone, PartialEq)]
pub struct CutTree {
    assignments: Vec<usize>,
    n_clusters: usize,
}

/// Cluster a symmetric distance matrix
pub fn hclust(distances: &Array2<f64>, linkage: Linkage) -> Result<Dendrogram> {
    let (n, m) = distances.dim();
    if n != m {
        return Err(PipelineError::DimensionMismatch {
            expected: format!("square distance matrix ({} x {})", n, n),
            got: format!("{} x {}", n, m),
        });
    }
    if distances.iter().any(|d| !d.is_finite()) {
        return Err(PipelineError::InvalidInput {
            reason: "distance matrix contains non-finite values".to_string(),
        });
    }

    let mut d = distances.clone();
    let mut active: Vec<bool> = vec![true; n];
    let mut sizes: Vec<usize> = vec![1; n];
    let mut merges = Vec::with_capacity(n.saturating_sub(1));

    for _ in 1..n {
        // Closest active pair; ties go to the first pair in row-major order
        let mut best: Option<(usize, usize, f64)> = None;
        for i in 0..n {
            if !active[i] {
                continue;
            }
            for j in (i + 1)..n {
                if !active[j] {
                    continue;
                }
                let dij = d[[i, j]];
                if best.map_or(true, |(_, _, b)| dij < b) {
                    best = Some((i, j, dij));
                }
            }
        }

        let Some((i, j, height)) = best else { break };
        let (ni, nj) = (sizes[i] as f64, sizes[j] as f64);

        for k in 0..n {
            if !active[k] || k == i || k == j {
                continue;
            }
            let dik = d[[i, k]];
            let djk = d[[j, k]];
            let updated = match linkage {
                Linkage::Complete => dik.max(djk),
                Linkage::Single => dik.min(djk),
                Linkage::Average => (ni * dik + nj * djk) / (ni + nj),
            };
            d[[i, k]] = updated;
            d[[k, i]] = updated;
        }

        active[j] = false;
        sizes[i] += sizes[j];
        merges.push(Merge {
            left: i,
            right: j,
            height,
            size: sizes[i],
        });
    }

    Ok(Dendrogram { n_leaves: n, merges })
}

impl Dendrogram {
    pub fn n_leaves(&self) -> usize {
        self.n_leaves
    }

    pub fn merges(&self) -> &[Merge] {
        &self.merges
    }

    /// Cut at `height`: every merge at or below the height is applied.
    ///
    /// Cluster ids follow the first appearance of their members in
    /// observation order, so cluster 0 always contains observation 0.
    pub fn cut(&self, height: f64) -> CutTree {
        let mut parent: Vec<usize> = (0..self.n_leaves).collect();

        fn find(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }

        for merge in self.merges.iter().filter(|m| m.height <= height) {
            let a = find(&mut parent, merge.left);
            let b = find(&mut parent, merge.right);
            if a != b {
                let (lo, hi) = if a < b { (a, b) } else { (b, a) };
                parent[hi] = lo;
            }
        }

        let mut root_to_cluster: Vec<Option<usize>> = vec![None; self.n_leaves];
        let mut assignments = Vec::with_capacity(self.n_leaves);
        let mut n_clusters = 0;
        for obs in 0..self.n_leaves {
            let root = find(&mut parent, obs);
            let id = *root_to_cluster[root].get_or_insert_with(|| {
                n_clusters += 1;
                n_clusters - 1
            });
            assignments.push(id);
        }

        CutTree {
            assignments,
            n_clusters,
        }
    }
}

impl CutTree {
    pub fn assignments(&self) -> &[usize] {
        &self.assignments
    }

    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    /// Member count per cluster id
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.n_clusters];
        for &c in &self.assignments {
            sizes[c] += 1;
        }
        sizes
    }

    /// Id of the largest cluster; equal sizes resolve to the lowest id,
    /// i.e. the cluster holding the lowest observation index
    pub fn largest(&self) -> Option<usize> {
        let sizes = self.sizes();
        let mut best: Option<(usize, usize)> = None;
        for (id, &size) in sizes.iter().enumerate() {
            if best.map_or(true, |(_, b)| size > b) {
                best = Some((id, size));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Observation indices in a cluster, ascending
    pub fn members(&self, cluster: usize) -> Vec<usize> {
        self.assignments
            .iter()
            .enumerate()
            .filter(|(_, &c)| c == cluster)
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_blobs() -> Array2<f64> {
        // {0, 1} close, {2, 3} close, blobs far apart
        array![
            [0.0, 0.1, 0.9, 1.0],
            [0.1, 0.0, 0.8, 0.9],
            [0.9, 0.8, 0.0, 0.2],
            [1.0, 0.9, 0.2, 0.0],
        ]
    }

    #[test]
    fn test_merge_heights_complete() {
        let tree = hclust(&two_blobs(), Linkage::Complete).unwrap();
        let heights: Vec<f64> = tree.merges().iter().map(|m| m.height).collect();
        assert_eq!(heights.len(), 3);
        assert!((heights[0] - 0.1).abs() < 1e-12);
        assert!((heights[1] - 0.2).abs() < 1e-12);
        assert!((heights[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_and_average_final_height() {
        let single = hclust(&two_blobs(), Linkage::Single).unwrap();
        assert!((single.merges()[2].height - 0.8).abs() < 1e-12);
        let average = hclust(&two_blobs(), Linkage::Average).unwrap();
        assert!((average.merges()[2].height - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_cut_numbering_and_sizes() {
        let tree = hclust(&two_blobs(), Linkage::Complete).unwrap();
        let cut = tree.cut(0.5);
        assert_eq!(cut.n_clusters(), 2);
        assert_eq!(cut.assignments(), &[0, 0, 1, 1]);

        let all = tree.cut(1.0);
        assert_eq!(all.n_clusters(), 1);

        let none = tree.cut(0.05);
        assert_eq!(none.n_clusters(), 4);
        assert_eq!(none.assignments(), &[0, 1, 2, 3]);
    }

    #[test]
    fn test_largest_tie_prefers_lowest_id() {
        let tree = hclust(&two_blobs(), Linkage::Complete).unwrap();
        let cut = tree.cut(0.5);
        assert_eq!(cut.sizes(), vec![2, 2]);
        assert_eq!(cut.largest(), Some(0));
        assert_eq!(cut.members(1), vec![2, 3]);
    }

    #[test]
    fn test_non_square_rejected() {
        let d = Array2::<f64>::zeros((2, 3));
        assert!(hclust(&d, Linkage::Complete).is_err());
    }

    #[test]
    fn test_linkage_parse() {
        assert_eq!("average".parse::<Linkage>().unwrap(), Linkage::Average);
        assert!("ward".parse::<Linkage>().is_err());
    }
}
