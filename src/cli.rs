use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::enums::RegistrationMethod;

#[derive(Debug, Parser)]
#[command(
    name = "aria-flair",
    version,
    about = "Longitudinal 3D-FLAIR registration, normalization and variance maps"
)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Overrides `data_root` from the configuration
    #[arg(long, global = true)]
    pub data_root: Option<PathBuf>,

    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the full pipeline for one subject
    Run(SubjectArgs),
    /// Run the full pipeline for every subject of a roster CSV
    Roster(RosterArgs),
    /// Convert a subject's DICOM series to NIfTI
    Convert(ConvertArgs),
    /// Extract every time point's brain and mask independently
    Extract(SubjectArgs),
    /// Only compute the variance map from normalized volumes
    Variance(SubjectArgs),
}

#[derive(Debug, Args)]
pub struct SubjectArgs {
    /// Subject identifier, e.g. B-RAP_0027
    #[arg(long)]
    pub subject: String,

    /// Number of acquired scans
    #[arg(long)]
    pub total: u8,

    /// Time points to analyse, chronological; the last is the template
    #[arg(long, value_delimiter = ',')]
    pub time_points: Vec<u8>,

    #[arg(long, value_enum)]
    pub method: Option<RegistrationMethod>,
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    #[command(flatten)]
    pub subject: SubjectArgs,

    /// Convert the T1 series instead of the FLAIR one
    #[arg(long, default_value_t = false)]
    pub t1: bool,
}

#[derive(Debug, Args)]
pub struct RosterArgs {
    /// CSV with `Subject_ID` and `Time_Points` columns
    #[arg(long)]
    pub roster: PathBuf,

    /// Time points to analyse for every subject; all when omitted
    #[arg(long, value_delimiter = ',')]
    pub time_points: Vec<u8>,

    #[arg(long, value_enum)]
    pub method: Option<RegistrationMethod>,

    /// Subjects processed concurrently; overrides the configuration
    #[arg(long)]
    pub parallel: Option<usize>,
}
