use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::subject::{Subject, TimePoint};

/// Sequence directory holding the same sessions' T1 scans.
pub const DEFAULT_T1_MODALITY: &str = "T1-MPRAGE";

/// A volumetric product of one pipeline stage.
///
/// Time-point scoped variants carry the scan they belong to; the standard
/// histogram and the variance map are one per subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    Raw(TimePoint),
    RawSidecar(TimePoint),
    /// Brain extracted from the time point's own scan (template source)
    ExtractedBrain(TimePoint),
    BrainMask(TimePoint),
    /// Brain consumed by this run: the extracted one for the template, the
    /// template-masked one for every other time point
    Brain(TimePoint),
    Registered(TimePoint),
    AffineTransform(TimePoint),
    WarpCoefficients(TimePoint),
    BiasCorrected(TimePoint),
    BiasField(TimePoint),
    Normalized(TimePoint),
    StandardHistogram,
    VarianceMap,
    T1Raw(TimePoint),
    /// T1 rigidly resampled into the FLAIR scan's space
    T1InFlair(TimePoint),
    T1Brain(TimePoint),
    T1BrainMask(TimePoint),
}

/// Fixed per-subject directory tree.
///
/// Directories of products that depend on the template and registration
/// method are nested under a run directory, `<method>_tmpl<tt>`. Normalized
/// volumes additionally depend on the time-point subset and live under
/// `<method>_tp<tt>-<tt>..`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directory {
    Dicom,
    Raw,
    RawSidecars,
    Brain,
    Masks,
    RunBrain,
    Registered,
    AffineTransforms,
    WarpCoefficients,
    BiasCorrected,
    BiasFields,
    Normalized,
    VarianceMaps,
    T1InFlair,
}

impl Directory {
    fn relative(&self, subject: &Subject) -> PathBuf {
        let run = run_tag(subject);
        let registered = Path::new("registered_nifti").join(&run);
        match self {
            Directory::Dicom => PathBuf::from("original_dicom"),
            Directory::Raw => PathBuf::from("original_nifti"),
            Directory::RawSidecars => PathBuf::from("original_nifti/json_info"),
            Directory::Brain => PathBuf::from("brain_nifti"),
            Directory::Masks => PathBuf::from("brain_nifti/masks"),
            Directory::RunBrain => Path::new("brain_nifti").join(run),
            Directory::Registered => registered,
            Directory::AffineTransforms => registered.join("FLIRT_mat"),
            Directory::WarpCoefficients => registered.join("FNIRT_coef"),
            Directory::BiasCorrected => Path::new("bias_nifti").join(run),
            Directory::BiasFields => Path::new("bias_nifti").join(run).join("fields"),
            Directory::Normalized => Path::new("normalised_nifti").join(format!(
                "{}_tp{}",
                subject.registration(),
                series_tag(subject)
            )),
            Directory::VarianceMaps => {
                Path::new("variance_maps").join(subject.registration().as_str())
            }
            Directory::T1InFlair => PathBuf::from("T1_in_FLAIR_nifti"),
        }
    }
}

/// `affine_tmpl05`
fn run_tag(subject: &Subject) -> String {
    format!("{}_tmpl{}", subject.registration(), subject.template())
}

/// `01-03-05`
fn series_tag(subject: &Subject) -> String {
    subject
        .time_points()
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join("-")
}

/// Maps `(subject, artifact)` to a canonical path under the data root.
///
/// Resolution is a pure function of its inputs; the skip-on-resume checks
/// and every stage consuming a previous stage's output depend on that. The
/// template, the registration method and the time-point subset are part of
/// every path whose content depends on them, so a run never resumes from
/// another run's products.
#[derive(Debug, Clone)]
pub struct Layout {
    data_root: PathBuf,
    modality: String,
    t1_modality: String,
}

impl Layout {
    pub fn new(data_root: impl Into<PathBuf>, modality: impl Into<String>) -> Self {
        Self {
            data_root: data_root.into(),
            modality: modality.into(),
            t1_modality: DEFAULT_T1_MODALITY.to_string(),
        }
    }

    pub fn with_t1_modality(mut self, t1_modality: impl Into<String>) -> Self {
        self.t1_modality = t1_modality.into();
        self
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Layout of the subject's T1 tree, e.g. for converting the T1 series.
    pub fn t1(&self) -> Layout {
        Layout::new(&self.data_root, &self.t1_modality).with_t1_modality(&self.t1_modality)
    }

    /// `<data_root>/<subject>/<modality>`
    pub fn subject_root(&self, subject_id: &str) -> PathBuf {
        self.data_root.join(subject_id).join(&self.modality)
    }

    pub fn directory(&self, subject: &Subject, directory: Directory) -> PathBuf {
        self.subject_root(subject.id()).join(directory.relative(subject))
    }

    /// File stem shared by every artifact of a time point, e.g. `B-RAP_0027_03_D1`.
    pub fn stem(subject_id: &str, time_point: TimePoint) -> String {
        format!("{subject_id}_{time_point}_D1")
    }

    /// DICOM input folder of one time point.
    pub fn dicom_root(&self, subject_id: &str, time_point: TimePoint) -> PathBuf {
        self.subject_root(subject_id)
            .join("original_dicom")
            .join(Self::stem(subject_id, time_point))
    }

    /// Canonical path of `artifact` for `subject`.
    pub fn path(&self, subject: &Subject, artifact: Artifact) -> PathBuf {
        let id = subject.id();
        let file = |directory: Directory, t: TimePoint, suffix: &str, ext: &str| {
            self.directory(subject, directory)
                .join(format!("{}{suffix}.{ext}", Self::stem(id, t)))
        };
        let t1 = |artifact: Artifact| self.t1().path(subject, artifact);
        match artifact {
            Artifact::Raw(t) => file(Directory::Raw, t, "", "nii.gz"),
            Artifact::RawSidecar(t) => file(Directory::RawSidecars, t, "", "json"),
            Artifact::ExtractedBrain(t) => file(Directory::Brain, t, "", "nii.gz"),
            Artifact::BrainMask(t) => file(Directory::Masks, t, "_mask", "nii.gz"),
            Artifact::Brain(t) if t == subject.template() => {
                file(Directory::Brain, t, "", "nii.gz")
            }
            Artifact::Brain(t) => file(Directory::RunBrain, t, "", "nii.gz"),
            Artifact::Registered(t) => file(Directory::Registered, t, "", "nii.gz"),
            Artifact::AffineTransform(t) => {
                file(Directory::AffineTransforms, t, "_flirt", "mat")
            }
            Artifact::WarpCoefficients(t) => {
                file(Directory::WarpCoefficients, t, "_warpcoef", "nii.gz")
            }
            Artifact::BiasCorrected(t) => {
                file(Directory::BiasCorrected, t, "_restore", "nii.gz")
            }
            Artifact::BiasField(t) => file(Directory::BiasFields, t, "_bias", "nii.gz"),
            Artifact::Normalized(t) => file(Directory::Normalized, t, "", "nii.gz"),
            Artifact::StandardHistogram => self
                .directory(subject, Directory::Normalized)
                .join("standard_histogram.npy"),
            Artifact::VarianceMap => self
                .directory(subject, Directory::VarianceMaps)
                .join(format!("{id}_tp{}_variance.nii.gz", series_tag(subject))),
            Artifact::T1Raw(t) => t1(Artifact::Raw(t)),
            Artifact::T1InFlair(t) => self
                .t1()
                .directory(subject, Directory::T1InFlair)
                .join(format!("{}.nii.gz", Self::stem(id, t))),
            Artifact::T1Brain(t) => t1(Artifact::ExtractedBrain(t)),
            // BET writes its mask beside the brain
            Artifact::T1BrainMask(t) => self
                .t1()
                .directory(subject, Directory::Brain)
                .join(format!("{}_mask.nii.gz", Self::stem(id, t))),
        }
    }

    /// Same as [`Layout::path`], creating the containing directory first.
    pub fn prepare(&self, subject: &Subject, artifact: Artifact) -> io::Result<PathBuf> {
        let path = self.path(subject, artifact);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(path)
    }
}
