use std::fmt;

use serde::Deserialize;

/// Registration strategy used to bring a time point onto the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationMethod {
    /// FLIRT, 6 degrees of freedom
    #[serde(alias = "rigidfsl")]
    Rigid,
    /// FLIRT, 12 degrees of freedom
    #[serde(alias = "affinefsl")]
    Affine,
    /// FNIRT seeded by an affine FLIRT matrix
    #[default]
    #[serde(alias = "nonlinearfsl", alias = "non-linear")]
    Nonlinear,
}

impl RegistrationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationMethod::Rigid => "rigid",
            RegistrationMethod::Affine => "affine",
            RegistrationMethod::Nonlinear => "nonlinear",
        }
    }
}

impl fmt::Display for RegistrationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a time point obtains its own brain volume and mask.
///
/// Used for the template, and for every time point when brains are
/// extracted independently.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum TemplateExtraction {
    /// Brain and mask are produced outside the pipeline (e.g. HD-BET)
    #[default]
    External,
    /// FSL BET with the given fractional intensity threshold
    Bet {
        #[serde(default = "default_bet_frac")]
        frac: f32,
    },
    /// Rigidly register the same session's T1 into FLAIR space, run BET on
    /// it and mask the FLAIR with the T1 brain mask
    #[serde(rename = "t1", alias = "t1guided")]
    T1Guided {
        #[serde(default = "default_t1_frac")]
        frac: f32,
    },
}

fn default_bet_frac() -> f32 {
    0.45
}

fn default_t1_frac() -> f32 {
    0.4
}

/// Final state of one unit of work inside a stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed,
    /// Output already present on disk
    Skipped,
    Failed(String),
}

impl Outcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}
