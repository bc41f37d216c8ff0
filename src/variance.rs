use std::path::PathBuf;

use ndarray::{Array3, ArrayView3, Axis, stack};
use tracing::info;

use crate::enums::Outcome;
use crate::error::{PipelineError, Result};
use crate::oracle;
use crate::paths::{Artifact, Layout};
use crate::subject::Subject;
use crate::volume_loader::VolumeLoader;

/// Population variance of every voxel across the time axis.
///
/// All volumes must share one grid.
///
/// # Errors
///
/// [`PipelineError::EmptySeries`] without volumes and
/// [`PipelineError::VolumeShapeMismatch`] for differing grids, naming the
/// zero-based index of the offending volume.
pub fn variance_map(volumes: &[ArrayView3<'_, f32>]) -> Result<Array3<f32>> {
    let first = volumes.first().ok_or(PipelineError::EmptySeries)?;
    if let Some((index, volume)) = volumes
        .iter()
        .enumerate()
        .find(|(_, v)| v.shape() != first.shape())
    {
        return Err(PipelineError::VolumeShapeMismatch {
            index,
            expected: first.shape().to_vec(),
            found: volume.shape().to_vec(),
        });
    }

    Ok(stack(Axis(0), volumes)?.var_axis(Axis(0), 0.0))
}

/// Terminal stage: one variance map over the normalized time series.
pub struct VarianceAggregator<'a> {
    layout: &'a Layout,
}

impl<'a> VarianceAggregator<'a> {
    pub fn new(layout: &'a Layout) -> Self {
        Self { layout }
    }

    /// # Errors
    ///
    /// A grid mismatch between normalized volumes is fatal and nothing is
    /// written.
    pub fn compute_variance(&self, subject: &Subject) -> Result<Outcome> {
        if oracle::exists(&self.layout.path(subject, Artifact::VarianceMap)) {
            return Ok(Outcome::Skipped);
        }
        let inputs: Vec<PathBuf> = subject
            .time_points()
            .iter()
            .map(|&t| self.layout.path(subject, Artifact::Normalized(t)))
            .collect();
        if let Some(missing) = inputs.iter().find(|path| !oracle::exists(path)) {
            return Err(PipelineError::ArtifactNotFound(missing.clone()));
        }

        let volumes = VolumeLoader::load_series(&inputs)?;
        let views: Vec<_> = volumes.iter().map(|v| v.data().view()).collect();
        let variances = variance_map(&views)?;

        let out = self.layout.prepare(subject, Artifact::VarianceMap)?;
        volumes[0].with_data(variances).save(&out)?;
        info!(
            subject = subject.id(),
            path = %out.display(),
            "variance map written"
        );
        Ok(Outcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variance_of_constant_volumes() {
        let a = Array3::<f32>::from_elem((4, 3, 2), 10.0);
        let b = Array3::<f32>::from_elem((4, 3, 2), 20.0);
        let var = variance_map(&[a.view(), b.view()]).unwrap();
        assert_eq!(var.dim(), (4, 3, 2));
        assert!(var.iter().all(|&v| v == 25.0));
    }

    #[test]
    fn variance_is_per_voxel() {
        let a = Array3::from_shape_fn((2, 2, 2), |(x, _, _)| x as f32);
        let b = Array3::from_shape_fn((2, 2, 2), |(x, _, _)| 3.0 * x as f32);
        let c = Array3::from_shape_fn((2, 2, 2), |(x, _, _)| 5.0 * x as f32);
        let var = variance_map(&[a.view(), b.view(), c.view()]).unwrap();
        assert_eq!(var[[0, 1, 1]], 0.0);
        // {1, 3, 5}: mean 3, squared deviations 4 + 0 + 4
        assert!((var[[1, 0, 0]] - 8.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn mismatched_grids_are_rejected() {
        let a = Array3::<f32>::zeros((4, 4, 4));
        let b = Array3::<f32>::zeros((4, 4, 5));
        match variance_map(&[a.view(), a.view(), b.view()]).unwrap_err() {
            PipelineError::VolumeShapeMismatch { index, found, .. } => {
                assert_eq!(index, 2);
                assert_eq!(found, vec![4, 4, 5]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_series_has_no_variance() {
        let err = variance_map(&[]).unwrap_err();
        assert!(matches!(err, PipelineError::EmptySeries));
    }
}
