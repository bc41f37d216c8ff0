use std::path::PathBuf;

use tokio::task;
use tracing::info;

use crate::enums::Outcome;
use crate::error::{PipelineError, Result};
use crate::nyul::{NyulStandardizer, StandardHistogram};
use crate::oracle;
use crate::paths::{Artifact, Layout};
use crate::subject::Subject;
use crate::toolkit::{ToolCommand, Toolkit};
use crate::volume_loader::VolumeLoader;

/// Joint intensity standardization across a subject's time series.
pub struct Normalizer<'a, T> {
    toolkit: &'a T,
    layout: &'a Layout,
    standardizer: NyulStandardizer,
    use_bias_corrected: bool,
}

impl<'a, T: Toolkit> Normalizer<'a, T> {
    pub fn new(toolkit: &'a T, layout: &'a Layout) -> Self {
        Self {
            toolkit,
            layout,
            standardizer: NyulStandardizer::default(),
            use_bias_corrected: true,
        }
    }

    /// Normalize the brain volumes instead of the bias-corrected ones.
    pub fn use_bias_corrected(mut self, enabled: bool) -> Self {
        self.use_bias_corrected = enabled;
        self
    }

    pub fn with_standardizer(mut self, standardizer: NyulStandardizer) -> Self {
        self.standardizer = standardizer;
        self
    }

    /// Fit one model over every configured time point, write and reorient
    /// each normalized volume, then write the standard histogram.
    ///
    /// Loading, fitting and writing run on the blocking thread pool.
    ///
    /// The fit is joint, so the stage is skipped only when every output is
    /// present and otherwise redone in full.
    pub async fn normalize(&self, subject: &Subject) -> Result<Outcome> {
        let expected: Vec<PathBuf> = subject
            .time_points()
            .iter()
            .map(|&t| self.layout.path(subject, Artifact::Normalized(t)))
            .chain([self.layout.path(subject, Artifact::StandardHistogram)])
            .collect();
        if oracle::all_exist(expected.iter().map(PathBuf::as_path)) {
            return Ok(Outcome::Skipped);
        }

        let inputs: Vec<PathBuf> = subject
            .time_points()
            .iter()
            .map(|&t| {
                let artifact = if self.use_bias_corrected {
                    Artifact::BiasCorrected(t)
                } else {
                    Artifact::Brain(t)
                };
                self.layout.path(subject, artifact)
            })
            .collect();
        if let Some(missing) = inputs.iter().find(|path| !oracle::exists(path)) {
            return Err(PipelineError::ArtifactNotFound(missing.clone()));
        }

        let outputs: Vec<PathBuf> = subject
            .time_points()
            .iter()
            .map(|&t| self.layout.prepare(subject, Artifact::Normalized(t)))
            .collect::<std::io::Result<_>>()?;
        let standardizer = self.standardizer.clone();
        let written = outputs.clone();
        // fitting and transforming are CPU bound
        let model = task::spawn_blocking(move || -> Result<StandardHistogram> {
            let volumes = VolumeLoader::load_from_file_paths(&inputs)?;
            let images: Vec<_> = volumes.iter().map(|v| v.data()).collect();
            let model = standardizer.fit(&images)?;
            for (volume, out) in volumes.iter().zip(&written) {
                volume.with_data(model.transform(volume.data())?).save(out)?;
            }
            Ok(model)
        })
        .await??;

        for out in &outputs {
            self.toolkit
                .run(&ToolCommand::reorient(out, out))
                .await?;
        }
        // written last: its presence marks the stage complete
        model.save(self.layout.prepare(subject, Artifact::StandardHistogram)?)?;
        info!(
            subject = subject.id(),
            time_points = subject.time_points().len(),
            "intensity normalized"
        );
        Ok(Outcome::Completed)
    }
}
