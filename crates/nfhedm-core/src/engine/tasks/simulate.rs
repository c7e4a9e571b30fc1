use super::angle_table::reflection_angles;
use crate::core::geometry::projection::project;
use crate::core::io::archive::{read_compressed, write_compressed};
use crate::core::models::experiment::Experiment;
use crate::core::models::grain::GrainParams;
use crate::core::models::volume::ImageVolume;
use crate::core::quantize::VoxelIndex;
use crate::engine::controller::Controller;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// Lights every voxel in `voxels`. Repeated indices are harmless.
pub fn rasterize(volume: &mut ImageVolume, voxels: &[VoxelIndex]) {
    for &idx in voxels {
        volume.set(idx);
    }
}

/// Voxels lit by one grain.
pub fn grain_voxels(params: &GrainParams, experiment: &Experiment) -> Vec<VoxelIndex> {
    let rmat_c = params.rotation();
    let angles = reflection_angles(experiment, &rmat_c, &params.stretch());
    if angles.is_empty() {
        return Vec::new();
    }
    let projection = project(
        &angles,
        experiment.geometry(),
        &rmat_c,
        &params.centroid,
        experiment.distortion(),
    );
    experiment
        .quantizer()
        .quantize(&projection.xy, &projection.omega)
}

/// Forward-simulates the image stack produced by `grain_params`.
#[instrument(skip_all, name = "simulate_diffractions")]
pub fn simulate(
    grain_params: &[GrainParams],
    experiment: &Experiment,
    controller: &dyn Controller,
) -> ImageVolume {
    const PHASE: &str = "simulate diffractions";
    let mut volume = ImageVolume::new(experiment.n_frames(), experiment.n_rows(), experiment.n_cols());

    controller.start(PHASE, grain_params.len());
    let mut silent = 0usize;
    for (i, params) in grain_params.iter().enumerate() {
        let voxels = grain_voxels(params, experiment);
        if voxels.is_empty() {
            silent += 1;
        }
        rasterize(&mut volume, &voxels);
        controller.update(i + 1);
    }
    controller.finish(PHASE);

    if silent > 0 {
        debug!(grains = silent, "Grains without any reflection on the detector.");
    }
    info!(lit = volume.count_lit(), "Simulation complete.");
    volume
}

/// Reads the image stack from `cache` when it holds a volume of the right
/// shape; otherwise simulates and tries to refresh the cache.
///
/// Cache failures never fail the call.
pub fn load_or_simulate(
    cache: Option<&Path>,
    grain_params: &[GrainParams],
    experiment: &Experiment,
    controller: &dyn Controller,
) -> ImageVolume {
    let expected = (experiment.n_frames(), experiment.n_rows(), experiment.n_cols());

    let Some(path) = cache else {
        return simulate(grain_params, experiment, controller);
    };

    match read_compressed::<ImageVolume>(path) {
        Ok(volume) if volume.shape() == expected => {
            info!(path = %path.display(), "Loaded image stack from cache.");
            return volume;
        }
        Ok(volume) => warn!(
            path = %path.display(),
            found = ?volume.shape(),
            ?expected,
            "Cached image stack has the wrong shape; recomputing."
        ),
        Err(e) => debug!("Image stack cache unavailable ({}); recomputing.", e),
    }

    let volume = simulate(grain_params, experiment, controller);
    if let Err(e) = write_compressed(path, &volume) {
        warn!("Could not write image stack cache: {}", e);
    }
    volume
}
