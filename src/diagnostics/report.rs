use super::TimingBreakdown;
use crate::lattice::LatticeStats;
use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceReport {
    pub points: usize,
    pub labels: usize,
    pub iterations: usize,
    pub relax: f32,
    /// One entry per pairwise model that is backed by a lattice.
    pub lattices: Vec<LatticeStats>,
    /// Number of points decoded to each label.
    pub label_histogram: Vec<usize>,
    pub timings: TimingBreakdown,
}

impl InferenceReport {
    pub(crate) fn label_histogram(labels: usize, decoded: &[usize]) -> Vec<usize> {
        let mut hist = vec![0usize; labels];
        for &l in decoded {
            hist[l] += 1;
        }
        hist
    }
}
