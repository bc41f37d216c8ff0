//! # ARIA-FLAIR library
//!
//! This crate orchestrates the preprocessing of longitudinal 3D-FLAIR MRI
//! series into a voxel-wise variance map used to spot Amyloid-Related
//! Imaging Abnormalities (ARIA).
//!
//! The image-processing kernels themselves are external tools (FSL and
//! `dcm2niix`). The crate decides what to run, in what order and on which
//! files, and detects work that is already done so that every stage can be
//! resumed:
//!  - DICOM to NIfTI conversion of the FLAIR and T1 series
//!  - Template brain extraction (external, BET or T1-guided), optionally
//!    for every time point on its own
//!  - Registration of every time point onto the template brain (rigid,
//!    affine or non-linear) and propagation of the template's brain mask
//!  - FAST bias-field correction
//!  - Joint Nyúl intensity standardization
//!  - Population variance of each voxel across time points
//!
//!  Artifacts live in a fixed per-subject directory tree and are addressed
//!  by typed keys, see [`paths::Layout`]. Products of a run are kept apart
//!  by template, registration method and time-point subset. The presence of
//!  a non-empty file is the only persisted state.
//!
//! # Roadmap
//!
//!  - Subtraction images between consecutive time points
//!
//! # Examples
//!
//! ## Running the pipeline for one subject
//!
//! Analyse time points 1 to 5 of a subject; time point 5 is the template
//! and must already have a brain volume and mask.
//!
//! ```no_run
//! # use aria_flair::{Layout, Pipeline, RegistrationMethod, Subject, FslToolkit};
//! # use std::{path::PathBuf, time::Duration};
//! # async fn run() -> aria_flair::error::Result<()> {
//! let toolkit = FslToolkit::new(None, PathBuf::from("dcm2niix"), Duration::from_secs(3600));
//! let pipeline = Pipeline::new(toolkit, Layout::new("/data/B-RAPIDD", "3D-FLAIR"));
//! let subject = Subject::new("B-RAP_0100", 5, &[1, 2, 3, 4, 5], RegistrationMethod::Nonlinear)?;
//! let report = pipeline.run(&subject).await?;
//! print!("{report}");
//! # Ok(())
//! # }
//! ```

pub mod bias;
pub mod cli;
pub mod config;
pub mod convert;
pub mod enums;
pub mod error;
pub mod extraction;
pub mod logging;
pub mod normalize;
pub mod nyul;
pub mod oracle;
pub mod paths;
pub mod pipeline;
pub mod propagation;
pub mod registration;
pub mod report;
pub mod roster;
pub mod subject;
pub mod toolkit;
pub mod variance;
pub mod volume;
pub mod volume_loader;

pub use enums::{Outcome, RegistrationMethod, TemplateExtraction};
pub use paths::{Artifact, Layout};
pub use pipeline::Pipeline;
pub use subject::{Subject, TimePoint};
pub use toolkit::{FslToolkit, ToolCommand, Toolkit};
