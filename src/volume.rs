use std::path::Path;

use ndarray::Array3;
use nifti::NiftiHeader;
use nifti::writer::WriterOptions;

use crate::error::Result;

/// A single 3D scan held in memory together with the header it was read
/// with, so that derived volumes keep the source geometry when written.
#[derive(Debug, Clone)]
pub struct Volume {
    pub data: Array3<f32>,
    pub header: NiftiHeader,
}

impl Volume {
    pub fn new(data: Array3<f32>, header: NiftiHeader) -> Self {
        Self { data, header }
    }

    /// Volume with a default header (unit voxels, identity orientation).
    pub fn from_array(data: Array3<f32>) -> Self {
        Self::new(data, NiftiHeader::default())
    }

    /// Get the dimensions of the volume (x, y, z)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn shape(&self) -> Vec<usize> {
        self.data.shape().to_vec()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// Get a mutable reference to the underlying data
    pub fn data_mut(&mut self) -> &mut Array3<f32> {
        &mut self.data
    }

    /// Replace the voxel data, keeping the geometry header.
    pub fn with_data(&self, data: Array3<f32>) -> Self {
        Self::new(data, self.header.clone())
    }

    /// Write as float32 NIfTI; gzip is chosen from a `.gz` extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut header = self.header.clone();
        // voxel values are stored unscaled
        header.scl_slope = 1.0;
        header.scl_inter = 0.0;
        WriterOptions::new(path.as_ref())
            .reference_header(&header)
            .write_nifti(&self.data)?;
        Ok(())
    }
}
