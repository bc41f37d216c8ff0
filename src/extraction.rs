use std::fs;
use std::path::Path;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::enums::{Outcome, TemplateExtraction};
use crate::error::{PipelineError, Result};
use crate::oracle;
use crate::paths::{Artifact, Layout};
use crate::report::StageReport;
use crate::subject::{Subject, TimePoint};
use crate::toolkit::{RIGID_DOF, ToolCommand, Toolkit};

/// Produces a time point's own brain volume and mask from its raw scan.
///
/// The template always goes through here before mask propagation; other
/// time points only when brains are extracted independently.
pub struct BrainExtractor<'a, T> {
    toolkit: &'a T,
    layout: &'a Layout,
}

impl<'a, T: Toolkit> BrainExtractor<'a, T> {
    pub fn new(toolkit: &'a T, layout: &'a Layout) -> Self {
        Self { toolkit, layout }
    }

    /// Make sure the template time point has a brain volume and mask.
    pub async fn extract_template(
        &self,
        subject: &Subject,
        extraction: TemplateExtraction,
    ) -> Result<Outcome> {
        self.extract(subject, subject.template(), extraction).await
    }

    /// Extract the brain of `t` with `extraction`.
    ///
    /// # Errors
    ///
    /// With [`TemplateExtraction::External`] a missing brain or mask is
    /// [`PipelineError::ArtifactNotFound`]. The other methods need the raw
    /// FLAIR scan, and [`TemplateExtraction::T1Guided`] also the session's
    /// converted T1.
    pub async fn extract(
        &self,
        subject: &Subject,
        t: TimePoint,
        extraction: TemplateExtraction,
    ) -> Result<Outcome> {
        let brain = self.layout.path(subject, Artifact::ExtractedBrain(t));
        let mask = self.layout.path(subject, Artifact::BrainMask(t));
        if oracle::all_exist([brain.as_path(), mask.as_path()]) {
            return Ok(Outcome::Skipped);
        }

        let raw = self.layout.path(subject, Artifact::Raw(t));
        match extraction {
            TemplateExtraction::External => {
                let missing = if oracle::exists(&brain) { mask } else { brain };
                return Err(PipelineError::ArtifactNotFound(missing));
            }
            _ if !oracle::exists(&raw) => return Err(PipelineError::ArtifactNotFound(raw)),
            TemplateExtraction::Bet { frac } => self.bet(subject, t, &raw, frac).await?,
            TemplateExtraction::T1Guided { frac } => {
                self.t1_guided(subject, t, &raw, frac).await?
            }
        }
        info!(
            subject = subject.id(),
            time_point = %t,
            ?extraction,
            "brain extracted"
        );
        Ok(Outcome::Completed)
    }

    /// Extract every configured time point's brain.
    ///
    /// Time points are processed concurrently and fail independently.
    pub async fn extract_all(
        &self,
        subject: &Subject,
        extraction: TemplateExtraction,
    ) -> StageReport {
        let time_points = subject.time_points();
        let outcomes = join_all(
            time_points
                .iter()
                .map(|&t| self.extract(subject, t, extraction)),
        )
        .await;

        let mut report = StageReport::new("brain_extraction");
        for (&t, outcome) in time_points.iter().zip(outcomes) {
            let outcome = outcome.unwrap_or_else(|err| {
                warn!(
                    subject = subject.id(),
                    time_point = %t,
                    error = %err,
                    "brain extraction failed"
                );
                Outcome::Failed(err.to_string())
            });
            report.record(Some(t), outcome);
        }
        report
    }

    async fn bet(&self, subject: &Subject, t: TimePoint, raw: &Path, frac: f32) -> Result<()> {
        let brain = self.layout.prepare(subject, Artifact::ExtractedBrain(t))?;
        let mask = self.layout.prepare(subject, Artifact::BrainMask(t))?;
        // bet writes the mask beside its output
        let bet_mask =
            brain.with_file_name(format!("{}_mask.nii.gz", Layout::stem(subject.id(), t)));
        self.toolkit
            .run(&ToolCommand::bet(raw, &brain, frac, &bet_mask))
            .await?;
        fs::rename(&bet_mask, &mask)?;
        Ok(())
    }

    /// T1 rigidly into FLAIR space, BET on the T1, FLAIR masked with the
    /// T1 brain mask. Each intermediate is reused when present.
    async fn t1_guided(
        &self,
        subject: &Subject,
        t: TimePoint,
        raw: &Path,
        frac: f32,
    ) -> Result<()> {
        let t1_in_flair = self.layout.path(subject, Artifact::T1InFlair(t));
        if !oracle::exists(&t1_in_flair) {
            let t1 = self.layout.path(subject, Artifact::T1Raw(t));
            if !oracle::exists(&t1) {
                return Err(PipelineError::ArtifactNotFound(t1));
            }
            let out = self.layout.prepare(subject, Artifact::T1InFlair(t))?;
            self.toolkit
                .run(&ToolCommand::flirt(raw, &t1, &out, RIGID_DOF, None))
                .await?;
            debug!(subject = subject.id(), time_point = %t, "T1 registered to FLAIR");
        }

        let t1_brain = self.layout.path(subject, Artifact::T1Brain(t));
        let t1_mask = self.layout.path(subject, Artifact::T1BrainMask(t));
        if !oracle::all_exist([t1_brain.as_path(), t1_mask.as_path()]) {
            let t1_brain = self.layout.prepare(subject, Artifact::T1Brain(t))?;
            self.toolkit
                .run(&ToolCommand::bet(&t1_in_flair, &t1_brain, frac, &t1_mask))
                .await?;
        }

        let brain = self.layout.prepare(subject, Artifact::ExtractedBrain(t))?;
        self.toolkit
            .run(&ToolCommand::apply_mask(raw, &t1_mask, &brain))
            .await?;
        let mask = self.layout.prepare(subject, Artifact::BrainMask(t))?;
        fs::copy(&t1_mask, &mask)?;
        Ok(())
    }
}
