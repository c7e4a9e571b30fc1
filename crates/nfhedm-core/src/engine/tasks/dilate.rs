use crate::core::models::volume::ImageVolume;
use crate::core::quantize::VoxelIndex;
use crate::engine::controller::Controller;
use ndarray::{ArrayView2, ArrayViewMut2, Axis};
use tracing::instrument;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Grows lit pixels of one frame by a `(2r+1) x (2c+1)` rectangle, clipped at
/// the panel border. Done as a row pass followed by a column pass.
fn dilate_frame(
    src: ArrayView2<'_, bool>,
    mut dst: ArrayViewMut2<'_, bool>,
    row_radius: usize,
    col_radius: usize,
) {
    let (n_rows, n_cols) = src.dim();
    let mut rows_done = vec![false; n_rows * n_cols];

    for r in 0..n_rows {
        let row = src.row(r);
        for c in 0..n_cols {
            let lo = c.saturating_sub(col_radius);
            let hi = (c + col_radius + 1).min(n_cols);
            rows_done[r * n_cols + c] = (lo..hi).any(|k| row[k]);
        }
    }

    for r in 0..n_rows {
        let lo = r.saturating_sub(row_radius);
        let hi = (r + row_radius + 1).min(n_rows);
        for c in 0..n_cols {
            dst[[r, c]] = (lo..hi).any(|k| rows_done[k * n_cols + c]);
        }
    }
}

/// Frames dilated between two progress updates.
fn frames_per_update() -> usize {
    #[cfg(feature = "parallel")]
    {
        rayon::current_num_threads().max(1)
    }
    #[cfg(not(feature = "parallel"))]
    {
        1
    }
}

/// Returns a dilated copy of `volume`; the input is left untouched.
#[instrument(skip_all, name = "dilate_image_stack")]
pub fn dilate(
    volume: &ImageVolume,
    row_radius: usize,
    col_radius: usize,
    controller: &dyn Controller,
) -> ImageVolume {
    const PHASE: &str = "dilate image_stack";
    let (n_frames, n_rows, n_cols) = volume.shape();
    controller.start(PHASE, n_frames);

    if row_radius == 0 && col_radius == 0 {
        controller.update(n_frames);
        controller.finish(PHASE);
        return volume.clone();
    }

    let mut dilated = ImageVolume::new(n_frames, n_rows, n_cols);
    let batch = frames_per_update();
    let batches_in = volume.data().axis_chunks_iter(Axis(0), batch);
    let batches_out = dilated.data_mut().axis_chunks_iter_mut(Axis(0), batch);

    let mut done = 0;
    for (src, mut dst) in batches_in.zip(batches_out) {
        #[cfg(not(feature = "parallel"))]
        for (s, d) in src.axis_iter(Axis(0)).zip(dst.axis_iter_mut(Axis(0))) {
            dilate_frame(s, d, row_radius, col_radius);
        }

        #[cfg(feature = "parallel")]
        {
            src.axis_iter(Axis(0))
                .into_par_iter()
                .zip(dst.axis_iter_mut(Axis(0)).into_par_iter())
                .for_each(|(s, d)| dilate_frame(s, d, row_radius, col_radius));
        }

        done += src.len_of(Axis(0));
        controller.update(done);
    }

    controller.finish(PHASE);
    dilated
}

/// Whether any voxel within the tolerance window around `idx` is lit.
#[inline]
pub fn has_lit_neighbour(
    volume: &ImageVolume,
    idx: VoxelIndex,
    row_radius: usize,
    col_radius: usize,
) -> bool {
    let (_, n_rows, n_cols) = volume.shape();
    let frame = volume.frame(idx.frame);
    let rows = idx.row.saturating_sub(row_radius)..(idx.row + row_radius + 1).min(n_rows);
    let cols = idx.col.saturating_sub(col_radius)..(idx.col + col_radius + 1).min(n_cols);
    rows.into_iter()
        .any(|r| cols.clone().any(|c| frame[[r, c]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::controller::{NullController, ProcessController};
    use crate::engine::progress::{Progress, ProgressReporter};
    use crate::engine::results::ForgetfulResultHandler;
    use std::sync::Mutex;

    fn lit_volume() -> ImageVolume {
        let mut volume = ImageVolume::new(2, 6, 7);
        volume.set(VoxelIndex { frame: 0, row: 2, col: 3 });
        volume.set(VoxelIndex { frame: 1, row: 0, col: 0 });
        volume
    }

    #[test]
    fn radius_zero_is_identity() {
        let volume = lit_volume();
        let dilated = dilate(&volume, 0, 0, &NullController);
        assert_eq!(dilated, volume);
    }

    #[test]
    fn dilation_grows_a_rectangle_per_frame() {
        let volume = lit_volume();
        let dilated = dilate(&volume, 1, 2, &NullController);

        // (2*1+1) x (2*2+1) around (2, 3) in frame 0
        assert_eq!(dilated.frame(0).iter().filter(|&&v| v).count(), 15);
        assert!(dilated.get(VoxelIndex { frame: 0, row: 1, col: 1 }));
        assert!(dilated.get(VoxelIndex { frame: 0, row: 3, col: 5 }));
        assert!(!dilated.get(VoxelIndex { frame: 0, row: 4, col: 3 }));
        assert!(!dilated.get(VoxelIndex { frame: 0, row: 2, col: 6 }));
    }

    #[test]
    fn dilation_is_clipped_at_the_border() {
        let dilated = dilate(&lit_volume(), 1, 1, &NullController);
        assert_eq!(dilated.frame(1).iter().filter(|&&v| v).count(), 4);
    }

    #[test]
    fn dilation_does_not_touch_the_source() {
        let volume = lit_volume();
        let before = volume.clone();
        let _ = dilate(&volume, 2, 2, &NullController);
        assert_eq!(volume, before);
    }

    #[test]
    fn progress_advances_in_frame_batches() {
        let n_frames = 37;
        let mut volume = ImageVolume::new(n_frames, 4, 4);
        volume.set(VoxelIndex { frame: 20, row: 1, col: 1 });

        let completed = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|e| {
            if let Progress::TaskProgress { completed: n } = e {
                completed.lock().unwrap().push(n);
            }
        }));
        let controller = ProcessController::new(reporter, Box::new(ForgetfulResultHandler));
        let dilated = dilate(&volume, 1, 1, &controller);
        drop(controller);

        let batch = frames_per_update();
        let completed = completed.into_inner().unwrap();
        assert_eq!(completed.len(), n_frames.div_ceil(batch));
        assert!(completed.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(completed.last().copied(), Some(n_frames as u64));
        assert_eq!(dilated.frame(20).iter().filter(|&&v| v).count(), 9);
    }

    #[test]
    fn neighbourhood_check_agrees_with_dilated_lookup() {
        let volume = lit_volume();
        let dilated = dilate(&volume, 1, 2, &NullController);
        let (frames, rows, cols) = volume.shape();
        for frame in 0..frames {
            for row in 0..rows {
                for col in 0..cols {
                    let idx = VoxelIndex { frame, row, col };
                    assert_eq!(has_lit_neighbour(&volume, idx, 1, 2), dilated.get(idx));
                }
            }
        }
    }
}
