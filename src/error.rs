use std::path::PathBuf;

use thiserror::Error;

use crate::subject::TimePoint;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(
        "Missing affine transform for {subject} time point {time_point}: expected {}",
        .expected.display()
    )]
    MissingPrerequisite {
        subject: String,
        time_point: TimePoint,
        expected: PathBuf,
    },

    #[error("Artifact not found: {}", .0.display())]
    ArtifactNotFound(PathBuf),

    #[error("Shape mismatch in {}: expected {expected:?}, found {found:?}", .path.display())]
    ShapeMismatch {
        path: PathBuf,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("Volume {index} of the series: expected shape {expected:?}, found {found:?}")]
    VolumeShapeMismatch {
        index: usize,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("Variance needs at least one volume")]
    EmptySeries,

    #[error("{} is not a 3D volume (shape {shape:?})", .path.display())]
    NotVolumetric { path: PathBuf, shape: Vec<usize> },

    #[error("{tool} failed: {reason}")]
    ExternalToolFailure { tool: &'static str, reason: String },

    #[error("Intensity normalization failed: {0}")]
    Normalization(String),

    #[error("Time point {0} is the template and cannot be re-masked")]
    TemplateTarget(TimePoint),

    #[error("Invalid subject: {0}")]
    InvalidSubject(String),

    #[error("No folder with .dcm files under {}", .0.display())]
    DicomNotFound(PathBuf),

    #[error("Ambiguous DICOM series under {}: {candidates:?}", .root.display())]
    AmbiguousDicomSeries {
        root: PathBuf,
        candidates: Vec<String>,
    },

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("NIfTI error: {0}")]
    Nifti(#[from] nifti::NiftiError),

    #[error("NPY error: {0}")]
    Npy(#[from] ndarray_npy::WriteNpyError),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
