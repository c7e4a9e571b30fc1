use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Scores for every `(grain, voxel)` pair.
///
/// `evaluated[[g, v]]` is `false` when no reflection of grain `g` reached the
/// detector from voxel `v`; the matching score is then `0.0` but carries no
/// evidence either way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceMatrix {
    pub scores: Array2<f64>,
    pub evaluated: Array2<bool>,
}

impl ConfidenceMatrix {
    pub fn new(n_grains: usize, n_coords: usize) -> Self {
        Self {
            scores: Array2::zeros((n_grains, n_coords)),
            evaluated: Array2::from_elem((n_grains, n_coords), false),
        }
    }

    pub fn n_grains(&self) -> usize {
        self.scores.nrows()
    }

    pub fn n_coords(&self) -> usize {
        self.scores.ncols()
    }

    pub fn unevaluated_count(&self) -> usize {
        self.evaluated.iter().filter(|&&e| !e).count()
    }

    /// Index of the best scoring grain for every voxel, or `None` if no grain
    /// was evaluated there.
    pub fn best_grain_per_coord(&self) -> Vec<Option<(usize, f64)>> {
        (0..self.n_coords())
            .map(|v| {
                (0..self.n_grains())
                    .filter(|&g| self.evaluated[[g, v]])
                    .map(|g| (g, self.scores[[g, v]]))
                    .fold(None, |best: Option<(usize, f64)>, cur| match best {
                        Some(b) if b.1 >= cur.1 => Some(b),
                        _ => Some(cur),
                    })
            })
            .collect()
    }
}
