//! Invocation of the external image-processing tools.
//!
//! Every FSL or `dcm2niix` call is described by a [`ToolCommand`] carrying
//! explicit parameters and the output files it must leave behind. A
//! [`Toolkit`] executes it; [`FslToolkit`] spawns the real binaries under a
//! timeout.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::oracle;

/// Cost function for intensity-based registration; robust to intensity
/// differences between the reference and moving images.
pub const COST_FUNCTION: &str = "mutualinfo";
pub const INTERPOLATION: &str = "trilinear";
pub const RIGID_DOF: u8 = 6;
pub const AFFINE_DOF: u8 = 12;
/// White matter, grey matter, CSF, small lesions, large lesions.
pub const TISSUE_CLASSES: u8 = 5;
pub const BIAS_ITERATIONS: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Flirt,
    Fnirt,
    FslMaths,
    Fast,
    Bet,
    Reorient2Std,
    Dcm2niix,
}

impl Tool {
    pub fn program(&self) -> &'static str {
        match self {
            Tool::Flirt => "flirt",
            Tool::Fnirt => "fnirt",
            Tool::FslMaths => "fslmaths",
            Tool::Fast => "fast",
            Tool::Bet => "bet",
            Tool::Reorient2Std => "fslreorient2std",
            Tool::Dcm2niix => "dcm2niix",
        }
    }
}

/// One external tool call.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    pub tool: Tool,
    pub args: Vec<OsString>,
    /// Files the call must produce; checked after a zero exit status.
    pub outputs: Vec<PathBuf>,
}

impl ToolCommand {
    fn new(tool: Tool) -> Self {
        Self {
            tool,
            args: Vec::new(),
            outputs: Vec::new(),
        }
    }

    fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn flag(self, name: &str, value: impl Into<OsString>) -> Self {
        self.arg(name).arg(value)
    }

    /// `--name=value` form used by FNIRT.
    fn long(self, name: &str, value: &Path) -> Self {
        let mut arg = OsString::from(format!("--{name}="));
        arg.push(value);
        self.arg(arg)
    }

    fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.outputs.push(path.into());
        self
    }

    /// FLIRT of `input` onto `reference` with the given degrees of freedom.
    pub fn flirt(
        reference: &Path,
        input: &Path,
        out: &Path,
        dof: u8,
        matrix: Option<&Path>,
    ) -> Self {
        let command = Self::new(Tool::Flirt)
            .flag("-in", input)
            .flag("-ref", reference)
            .flag("-out", out)
            .flag("-dof", dof.to_string())
            .flag("-cost", COST_FUNCTION)
            .flag("-interp", INTERPOLATION)
            .output(out);
        match matrix {
            Some(matrix) => command.flag("-omat", matrix).output(matrix),
            None => command,
        }
    }

    /// FNIRT of `input` onto `reference`, initialised by an affine matrix.
    pub fn fnirt(
        reference: &Path,
        input: &Path,
        affine: &Path,
        out: &Path,
        coefficients: &Path,
    ) -> Self {
        Self::new(Tool::Fnirt)
            .long("ref", reference)
            .long("in", input)
            .long("aff", affine)
            .long("iout", out)
            .long("cout", coefficients)
            .output(out)
            .output(coefficients)
    }

    /// Binary masking: `fslmaths <input> -mas <mask> <out>`.
    pub fn apply_mask(input: &Path, mask: &Path, out: &Path) -> Self {
        Self::new(Tool::FslMaths)
            .arg(input)
            .flag("-mas", mask)
            .arg(out)
            .output(out)
    }

    /// FAST tissue segmentation with bias-field estimation.
    ///
    /// Outputs land next to `basename` as `<basename>_restore` and
    /// `<basename>_bias`, together with segmentation byproducts.
    pub fn fast(input: &Path, basename: &Path) -> Self {
        let with_suffix = |suffix: &str| {
            let mut name = basename.as_os_str().to_owned();
            name.push(format!("_{suffix}.nii.gz"));
            PathBuf::from(name)
        };
        Self::new(Tool::Fast)
            .flag("-t", "1")
            .flag("-n", TISSUE_CLASSES.to_string())
            .flag("-I", BIAS_ITERATIONS.to_string())
            .arg("-b")
            .arg("-B")
            .flag("-o", basename)
            .arg(input)
            .output(with_suffix("restore"))
            .output(with_suffix("bias"))
    }

    /// BET brain extraction that also writes `<out stem>_mask.nii.gz`.
    pub fn bet(input: &Path, out: &Path, frac: f32, mask: &Path) -> Self {
        Self::new(Tool::Bet)
            .arg(input)
            .arg(out)
            .flag("-f", frac.to_string())
            .arg("-m")
            .output(out)
            .output(mask)
    }

    /// Reorient to the MNI152 axis convention, in place when `input == out`.
    pub fn reorient(input: &Path, out: &Path) -> Self {
        Self::new(Tool::Reorient2Std).arg(input).arg(out).output(out)
    }

    /// Convert one DICOM series to a gzipped NIfTI named `<name>.nii.gz`.
    pub fn dcm2niix(dicom_folder: &Path, out_dir: &Path, name: &str) -> Self {
        Self::new(Tool::Dcm2niix)
            .flag("-o", out_dir)
            .flag("-z", "y")
            .flag("-f", name)
            .arg(dicom_folder)
            .output(out_dir.join(format!("{name}.nii.gz")))
    }
}

/// Executes external tool calls.
///
/// Implementations must leave every path in [`ToolCommand::outputs`] on disk
/// when they return `Ok`.
#[allow(async_fn_in_trait)]
pub trait Toolkit {
    async fn run(&self, command: &ToolCommand) -> Result<()>;
}

/// Runs the real FSL and `dcm2niix` binaries.
#[derive(Debug, Clone)]
pub struct FslToolkit {
    fsl_bin: Option<PathBuf>,
    dcm2niix: PathBuf,
    timeout: Duration,
}

impl FslToolkit {
    pub fn new(fsl_bin: Option<PathBuf>, dcm2niix: PathBuf, timeout: Duration) -> Self {
        Self {
            fsl_bin,
            dcm2niix,
            timeout,
        }
    }

    fn program(&self, tool: Tool) -> PathBuf {
        match (tool, &self.fsl_bin) {
            (Tool::Dcm2niix, _) => self.dcm2niix.clone(),
            (_, Some(bin)) => bin.join(tool.program()),
            (_, None) => PathBuf::from(tool.program()),
        }
    }
}

impl Toolkit for FslToolkit {
    async fn run(&self, command: &ToolCommand) -> Result<()> {
        let tool = command.tool.program();
        let failure = |reason: String| PipelineError::ExternalToolFailure { tool, reason };
        let start = Instant::now();
        debug!(tool, args = ?command.args, "spawning");

        let child = Command::new(self.program(command.tool))
            .args(&command.args)
            .env("FSLOUTPUTTYPE", "NIFTI_GZ")
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => return Err(failure(format!("could not spawn: {err}"))),
            Err(_) => {
                warn!(tool, timeout_s = self.timeout.as_secs(), "tool timed out");
                return Err(failure(format!(
                    "timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failure(format!("{} ({})", output.status, stderr.trim())));
        }
        if let Some(missing) = command.outputs.iter().find(|path| !oracle::exists(path)) {
            return Err(failure(format!("no output at {}", missing.display())));
        }
        debug!(
            tool,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "finished"
        );
        Ok(())
    }
}
