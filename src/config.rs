use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::enums::{RegistrationMethod, TemplateExtraction};
use crate::error::Result;
use crate::paths::{DEFAULT_T1_MODALITY, Layout};
use crate::toolkit::FslToolkit;

/// Pipeline settings, read from a TOML file. Every field has a default.
///
/// ```toml
/// data_root = "/data/B-RAPIDD"
/// registration = "nonlinear"
/// tool_timeout_secs = 7200
///
/// [template_extraction]
/// method = "bet"
/// frac = 0.45
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub data_root: PathBuf,
    /// Per-subject directory holding this sequence's tree
    pub modality: String,
    /// Per-subject directory holding the same sessions' T1 scans
    pub t1_modality: String,
    pub registration: RegistrationMethod,
    pub template_extraction: TemplateExtraction,
    /// Normalize bias-corrected volumes rather than plain brains
    pub use_bias_corrected: bool,
    /// Directory with the FSL binaries; `PATH` lookup when unset
    pub fsl_bin: Option<PathBuf>,
    pub dcm2niix: PathBuf,
    pub tool_timeout_secs: u64,
    pub max_parallel_subjects: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("."),
            modality: "3D-FLAIR".to_string(),
            t1_modality: DEFAULT_T1_MODALITY.to_string(),
            registration: RegistrationMethod::default(),
            template_extraction: TemplateExtraction::default(),
            use_bias_corrected: true,
            fsl_bin: None,
            dcm2niix: PathBuf::from("dcm2niix"),
            tool_timeout_secs: 4 * 60 * 60,
            max_parallel_subjects: 1,
        }
    }
}

impl PipelineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: PipelineConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn layout(&self) -> Layout {
        Layout::new(&self.data_root, &self.modality).with_t1_modality(&self.t1_modality)
    }

    pub fn toolkit(&self) -> FslToolkit {
        FslToolkit::new(
            self.fsl_bin.clone(),
            self.dcm2niix.clone(),
            Duration::from_secs(self.tool_timeout_secs),
        )
    }
}
