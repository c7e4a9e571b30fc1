use crate::core::quantize::VoxelIndex;
use ndarray::{Array3, ArrayView2, ArrayViewMut2, Axis};
use serde::{Deserialize, Serialize};

/// Dense boolean detector signal indexed `[frame, row, col]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageVolume {
    data: Array3<bool>,
}

impl ImageVolume {
    pub fn new(n_frames: usize, n_rows: usize, n_cols: usize) -> Self {
        Self {
            data: Array3::from_elem((n_frames, n_rows, n_cols), false),
        }
    }

    pub fn from_array(data: Array3<bool>) -> Self {
        Self { data }
    }

    /// `(frames, rows, cols)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    #[inline]
    pub fn get(&self, idx: VoxelIndex) -> bool {
        self.data
            .get((idx.frame, idx.row, idx.col))
            .copied()
            .unwrap_or(false)
    }

    /// Marks a voxel as lit. Writes outside the volume are ignored.
    #[inline]
    pub fn set(&mut self, idx: VoxelIndex) {
        if let Some(cell) = self.data.get_mut((idx.frame, idx.row, idx.col)) {
            *cell = true;
        }
    }

    pub fn frame(&self, frame: usize) -> ArrayView2<'_, bool> {
        self.data.index_axis(Axis(0), frame)
    }

    pub fn frame_mut(&mut self, frame: usize) -> ArrayViewMut2<'_, bool> {
        self.data.index_axis_mut(Axis(0), frame)
    }

    pub fn count_lit(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    pub fn data(&self) -> &Array3<bool> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array3<bool> {
        &mut self.data
    }

    pub fn into_inner(self) -> Array3<bool> {
        self.data
    }
}
