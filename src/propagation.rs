use futures::future::join_all;
use tracing::{info, warn};

use crate::enums::Outcome;
use crate::error::{PipelineError, Result};
use crate::oracle;
use crate::paths::{Artifact, Layout};
use crate::registration::Registrar;
use crate::report::StageReport;
use crate::subject::{Subject, TimePoint};
use crate::toolkit::{ToolCommand, Toolkit};

/// Gives every time point of a subject the template's brain boundary.
///
/// Every other time point is registered onto the template brain (see
/// [`crate::extraction::BrainExtractor`]) and masked with the template's
/// mask, so all time points share an identical brain outline for voxel-wise
/// comparison.
pub struct MaskPropagator<'a, T> {
    toolkit: &'a T,
    layout: &'a Layout,
}

impl<'a, T: Toolkit> MaskPropagator<'a, T> {
    pub fn new(toolkit: &'a T, layout: &'a Layout) -> Self {
        Self { toolkit, layout }
    }

    /// Register `target` onto the template brain and apply the template mask.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::TemplateTarget`] when `target` is the
    /// template itself.
    pub async fn propagate_mask(
        &self,
        subject: &Subject,
        template: TimePoint,
        target: TimePoint,
    ) -> Result<Outcome> {
        if target == template {
            return Err(PipelineError::TemplateTarget(target));
        }
        let out = self.layout.path(subject, Artifact::Brain(target));
        if oracle::exists(&out) {
            return Ok(Outcome::Skipped);
        }

        let reference = self.layout.path(subject, Artifact::Brain(template));
        let mask = self.layout.path(subject, Artifact::BrainMask(template));
        for required in [&reference, &mask] {
            if !oracle::exists(required) {
                return Err(PipelineError::ArtifactNotFound(required.clone()));
            }
        }

        Registrar::new(self.toolkit, self.layout)
            .register(subject, &reference, target)
            .await?;

        let registered = self.layout.path(subject, Artifact::Registered(target));
        let out = self.layout.prepare(subject, Artifact::Brain(target))?;
        self.toolkit
            .run(&ToolCommand::apply_mask(&registered, &mask, &out))
            .await?;
        info!(
            subject = subject.id(),
            time_point = %target,
            template = %template,
            "brain extracted with template mask"
        );
        Ok(Outcome::Completed)
    }

    /// Propagate the template mask to every other configured time point.
    ///
    /// Time points are processed concurrently; a failing time point is
    /// logged and reported without stopping the others.
    pub async fn propagate_all(&self, subject: &Subject) -> StageReport {
        let template = subject.template();
        let targets: Vec<TimePoint> = subject.non_template().collect();
        let outcomes = join_all(
            targets
                .iter()
                .map(|&target| self.propagate_mask(subject, template, target)),
        )
        .await;

        let mut report = StageReport::new("mask_propagation");
        for (target, outcome) in targets.into_iter().zip(outcomes) {
            let outcome = outcome.unwrap_or_else(|err| {
                warn!(
                    subject = subject.id(),
                    time_point = %target,
                    error = %err,
                    "mask propagation failed"
                );
                Outcome::Failed(err.to_string())
            });
            report.record(Some(target), outcome);
        }
        report
    }
}
