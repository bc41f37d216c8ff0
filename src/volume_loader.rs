use crate::error::{PipelineError, Result};
use crate::volume::Volume;

use ndarray::{Axis, Ix3};
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};
use rayon::prelude::*;
use std::path::Path;

pub struct VolumeLoader;

impl VolumeLoader {
    /// Load one NIfTI volume (`.nii` or `.nii.gz`) as float32.
    ///
    /// A trailing singleton fourth axis is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ArtifactNotFound`] if the file is absent and
    /// [`PipelineError::NotVolumetric`] if it is not a single 3D volume.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Volume> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(PipelineError::ArtifactNotFound(path.to_path_buf()));
        }
        let object = ReaderOptions::new().read_file(path)?;
        let header = object.header().clone();
        let mut data = object.into_volume().into_ndarray::<f32>()?;

        while data.ndim() > 3 && data.shape()[data.ndim() - 1] == 1 {
            let last = Axis(data.ndim() - 1);
            data = data.index_axis_move(last, 0);
        }
        let shape = data.shape().to_vec();
        let data = data
            .into_dimensionality::<Ix3>()
            .map_err(|_| PipelineError::NotVolumetric {
                path: path.to_path_buf(),
                shape,
            })?;

        Ok(Volume::new(data, header))
    }

    /// Load several volumes in parallel, preserving the order of `paths`.
    pub fn load_from_file_paths(paths: &[impl AsRef<Path> + Sync]) -> Result<Vec<Volume>> {
        paths
            .par_iter()
            .map(|path| Self::load_from_file(path))
            .collect()
    }

    /// Load a time series whose volumes must share one voxel grid.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ShapeMismatch`] naming the first volume whose
    /// grid differs from the first one.
    pub fn load_series(paths: &[impl AsRef<Path> + Sync]) -> Result<Vec<Volume>> {
        let volumes = Self::load_from_file_paths(paths)?;
        Self::validate_dimensions(paths, &volumes)?;
        Ok(volumes)
    }

    fn validate_dimensions(paths: &[impl AsRef<Path>], volumes: &[Volume]) -> Result<()> {
        let Some(first) = volumes.first() else {
            return Ok(());
        };
        let first_dim = first.shape();
        for (path, volume) in paths.iter().zip(volumes) {
            if volume.shape() != first_dim {
                return Err(PipelineError::ShapeMismatch {
                    path: path.as_ref().to_path_buf(),
                    expected: first_dim,
                    found: volume.shape(),
                });
            }
        }
        Ok(())
    }
}
