use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::enums::Outcome;
use crate::error::{PipelineError, Result};
use crate::oracle;
use crate::paths::{Artifact, Directory, Layout};
use crate::report::StageReport;
use crate::subject::{Subject, TimePoint};
use crate::toolkit::{ToolCommand, Toolkit};

/// What the reorganization pass did to the brain directory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Reorganized {
    pub restored: usize,
    pub fields: usize,
    pub removed: usize,
}

/// Where a FAST output file belongs, decided by its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    BiasCorrected,
    BiasField,
    Discard,
    Keep,
}

fn placement(file_name: &str, subject_id: &str) -> Placement {
    // strip up to two extensions, e.g. `.nii.gz`
    let mut base = file_name;
    for _ in 0..2 {
        if let Some((stem, _)) = base.rsplit_once('.') {
            base = stem;
        }
    }
    let suffix = base.rsplit_once('_').map_or(base, |(_, suffix)| suffix);
    match suffix {
        "restore" => Placement::BiasCorrected,
        "bias" => Placement::BiasField,
        "mixeltype" | "seg" => Placement::Discard,
        _ if base
            .strip_prefix(subject_id)
            .unwrap_or(base)
            .contains("pve") =>
        {
            Placement::Discard
        }
        _ => Placement::Keep,
    }
}

/// FAST bias-field correction over a subject's masked brains.
pub struct BiasCorrector<'a, T> {
    toolkit: &'a T,
    layout: &'a Layout,
}

impl<'a, T: Toolkit> BiasCorrector<'a, T> {
    pub fn new(toolkit: &'a T, layout: &'a Layout) -> Self {
        Self { toolkit, layout }
    }

    /// Correct one time point's brain volume.
    ///
    /// FAST writes into the run's brain directory; [`reorganize`] moves the
    /// results.
    pub async fn correct_time_point(&self, subject: &Subject, t: TimePoint) -> Result<Outcome> {
        if oracle::exists(&self.layout.path(subject, Artifact::BiasCorrected(t))) {
            return Ok(Outcome::Skipped);
        }
        let brain = self.layout.path(subject, Artifact::Brain(t));
        if !oracle::exists(&brain) {
            return Err(PipelineError::ArtifactNotFound(brain));
        }
        let work = self.layout.directory(subject, Directory::RunBrain);
        fs::create_dir_all(&work)?;
        let basename = work.join(Layout::stem(subject.id(), t));
        self.toolkit
            .run(&ToolCommand::fast(&brain, &basename))
            .await?;
        info!(subject = subject.id(), time_point = %t, "bias field corrected");
        Ok(Outcome::Completed)
    }

    /// Correct every configured time point, then reorganize the outputs.
    ///
    /// Failures are isolated to their time point. Outputs an interrupted run
    /// left in the run's brain directory are sorted first so they count as
    /// done.
    pub async fn correct(&self, subject: &Subject) -> StageReport {
        let mut report = StageReport::new("bias_correction");
        if let Err(err) = reorganize(self.layout, subject) {
            warn!(subject = subject.id(), error = %err, "sorting leftover bias outputs failed");
        }
        for &t in subject.time_points() {
            let outcome = self
                .correct_time_point(subject, t)
                .await
                .unwrap_or_else(|err| {
                    warn!(
                        subject = subject.id(),
                        time_point = %t,
                        error = %err,
                        "bias correction failed"
                    );
                    Outcome::Failed(err.to_string())
                });
            report.record(Some(t), outcome);
        }
        if let Err(err) = reorganize(self.layout, subject) {
            warn!(subject = subject.id(), error = %err, "reorganizing bias outputs failed");
            report.record(None, Outcome::Failed(err.to_string()));
        }
        report
    }
}

/// Sort FAST outputs out of the run's brain directory by filename suffix.
///
/// `*_restore` files move to the bias-corrected directory, `*_bias` files to
/// its `fields` subdirectory, and segmentation byproducts (`*_seg`,
/// `*_mixeltype`, anything containing `pve`) are deleted. Only files whose
/// name starts with the subject id are considered. Running it again is a
/// no-op.
pub fn reorganize(layout: &Layout, subject: &Subject) -> Result<Reorganized> {
    let source = layout.directory(subject, Directory::RunBrain);
    let corrected = layout.directory(subject, Directory::BiasCorrected);
    let fields = layout.directory(subject, Directory::BiasFields);
    let mut summary = Reorganized::default();
    if !source.is_dir() {
        return Ok(summary);
    }

    let entries = fs::read_dir(&source)?.collect::<std::io::Result<Vec<_>>>()?;
    for entry in entries {
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if !name.starts_with(subject.id()) {
            continue;
        }
        let path = entry.path();
        match placement(name, subject.id()) {
            Placement::BiasCorrected => {
                move_into(&path, &corrected, name)?;
                summary.restored += 1;
            }
            Placement::BiasField => {
                move_into(&path, &fields, name)?;
                summary.fields += 1;
            }
            Placement::Discard => {
                fs::remove_file(&path)?;
                summary.removed += 1;
            }
            Placement::Keep => {}
        }
    }
    debug!(subject = subject.id(), ?summary, "bias outputs reorganized");
    Ok(summary)
}

fn move_into(path: &Path, directory: &Path, name: &str) -> Result<()> {
    fs::create_dir_all(directory)?;
    fs::rename(path, directory.join(name))?;
    Ok(())
}
