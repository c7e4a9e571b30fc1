use serde::{Deserialize, Serialize};

/// Integer address of one cell of an image volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoxelIndex {
    pub frame: usize,
    pub row: usize,
    pub col: usize,
}

/// Maps continuous detector coordinates and omega onto volume cells.
///
/// Axes are ordered `(x, y, omega)`. The x and y axes are clipped to the
/// half-open range `[0, clip)`; the omega axis wraps over `n_frames`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantizer {
    pub base: [f64; 3],
    pub inv_delta: [f64; 3],
    pub clip: [usize; 2],
    pub n_frames: usize,
}

impl Quantizer {
    pub fn new(base: [f64; 3], delta: [f64; 3], clip: [usize; 2], n_frames: usize) -> Self {
        Self {
            base,
            inv_delta: delta.map(|d| 1.0 / d),
            clip,
            n_frames,
        }
    }

    #[inline]
    fn axis_cell(&self, axis: usize, value: f64) -> f64 {
        ((value - self.base[axis]) * self.inv_delta[axis]).floor()
    }

    /// Quantizes a single point, or `None` if it falls outside the panel.
    #[inline]
    pub fn quantize_point(&self, xy: [f64; 2], omega: f64) -> Option<VoxelIndex> {
        let x = self.axis_cell(0, xy[0]);
        if !(x >= 0.0 && x < self.clip[0] as f64) {
            return None;
        }
        let y = self.axis_cell(1, xy[1]);
        if !(y >= 0.0 && y < self.clip[1] as f64) {
            return None;
        }
        let z = self.axis_cell(2, omega);
        if !z.is_finite() || self.n_frames == 0 {
            return None;
        }
        let frame = (z as i64).rem_euclid(self.n_frames as i64) as usize;
        Some(VoxelIndex {
            frame,
            row: y as usize,
            col: x as usize,
        })
    }

    /// Quantizes aligned `xy` and `omegas`, dropping points outside the panel.
    pub fn quantize(&self, xy: &[[f64; 2]], omegas: &[f64]) -> Vec<VoxelIndex> {
        xy.iter()
            .zip(omegas)
            .filter_map(|(&p, &omega)| self.quantize_point(p, omega))
            .collect()
    }
}
