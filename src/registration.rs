use std::path::{Path, PathBuf};

use tracing::info;

use crate::enums::{Outcome, RegistrationMethod};
use crate::error::{PipelineError, Result};
use crate::oracle;
use crate::paths::{Artifact, Layout};
use crate::subject::{Subject, TimePoint};
use crate::toolkit::{AFFINE_DOF, RIGID_DOF, ToolCommand, Toolkit};

/// Output of an affine registration.
#[derive(Debug, Clone, PartialEq)]
pub struct AffineResult {
    pub volume: PathBuf,
    pub transform: PathBuf,
}

/// Registers a subject's raw time points onto a reference volume.
///
/// Every operation reads the target's raw volume and writes at the
/// [`Layout`] paths the rest of the pipeline expects. Completed outputs are
/// not recomputed.
pub struct Registrar<'a, T> {
    toolkit: &'a T,
    layout: &'a Layout,
}

impl<'a, T: Toolkit> Registrar<'a, T> {
    pub fn new(toolkit: &'a T, layout: &'a Layout) -> Self {
        Self { toolkit, layout }
    }

    /// Register with the subject's configured method.
    ///
    /// A non-linear registration whose affine matrix is absent runs the
    /// affine step first.
    pub async fn register(
        &self,
        subject: &Subject,
        reference: &Path,
        target: TimePoint,
    ) -> Result<Outcome> {
        match subject.registration() {
            RegistrationMethod::Rigid => self.rigid_register(subject, reference, target).await,
            RegistrationMethod::Affine => self
                .affine_register(subject, reference, target)
                .await
                .map(|(outcome, _)| outcome),
            RegistrationMethod::Nonlinear => {
                let transform = self.layout.path(subject, Artifact::AffineTransform(target));
                if !oracle::exists(&transform) {
                    info!(
                        subject = subject.id(),
                        time_point = %target,
                        "no affine matrix yet, running affine step first"
                    );
                    self.affine_register(subject, reference, target).await?;
                }
                self.nonlinear_register(subject, reference, target).await
            }
        }
    }

    pub async fn rigid_register(
        &self,
        subject: &Subject,
        reference: &Path,
        target: TimePoint,
    ) -> Result<Outcome> {
        let out = self.layout.path(subject, Artifact::Registered(target));
        if oracle::exists(&out) {
            return Ok(Outcome::Skipped);
        }
        let input = self.raw_input(subject, target)?;
        let out = self.layout.prepare(subject, Artifact::Registered(target))?;
        self.toolkit
            .run(&ToolCommand::flirt(reference, &input, &out, RIGID_DOF, None))
            .await?;
        info!(subject = subject.id(), time_point = %target, "rigid registration done");
        Ok(Outcome::Completed)
    }

    pub async fn affine_register(
        &self,
        subject: &Subject,
        reference: &Path,
        target: TimePoint,
    ) -> Result<(Outcome, AffineResult)> {
        let result = AffineResult {
            volume: self.layout.path(subject, Artifact::Registered(target)),
            transform: self.layout.path(subject, Artifact::AffineTransform(target)),
        };
        if oracle::all_exist([result.volume.as_path(), result.transform.as_path()]) {
            return Ok((Outcome::Skipped, result));
        }
        let input = self.raw_input(subject, target)?;
        self.layout.prepare(subject, Artifact::Registered(target))?;
        self.layout
            .prepare(subject, Artifact::AffineTransform(target))?;
        self.toolkit
            .run(&ToolCommand::flirt(
                reference,
                &input,
                &result.volume,
                AFFINE_DOF,
                Some(&result.transform),
            ))
            .await?;
        info!(subject = subject.id(), time_point = %target, "affine registration done");
        Ok((Outcome::Completed, result))
    }

    /// # Errors
    ///
    /// Returns [`PipelineError::MissingPrerequisite`] without touching the
    /// filesystem when no affine matrix exists for `(subject, target)`.
    pub async fn nonlinear_register(
        &self,
        subject: &Subject,
        reference: &Path,
        target: TimePoint,
    ) -> Result<Outcome> {
        let transform = self.layout.path(subject, Artifact::AffineTransform(target));
        if !oracle::exists(&transform) {
            return Err(PipelineError::MissingPrerequisite {
                subject: subject.id().to_string(),
                time_point: target,
                expected: transform,
            });
        }
        let out = self.layout.path(subject, Artifact::Registered(target));
        let coefficients = self.layout.path(subject, Artifact::WarpCoefficients(target));
        if oracle::all_exist([out.as_path(), coefficients.as_path()]) {
            return Ok(Outcome::Skipped);
        }
        let input = self.raw_input(subject, target)?;
        self.layout
            .prepare(subject, Artifact::WarpCoefficients(target))?;
        self.toolkit
            .run(&ToolCommand::fnirt(
                reference,
                &input,
                &transform,
                &out,
                &coefficients,
            ))
            .await?;
        info!(subject = subject.id(), time_point = %target, "non-linear registration done");
        Ok(Outcome::Completed)
    }

    fn raw_input(&self, subject: &Subject, target: TimePoint) -> Result<PathBuf> {
        let input = self.layout.path(subject, Artifact::Raw(target));
        if !oracle::exists(&input) {
            return Err(PipelineError::ArtifactNotFound(input));
        }
        Ok(input)
    }
}
