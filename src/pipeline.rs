use std::time::Instant;

use futures::stream::{self, StreamExt};
use tokio::task;
use tracing::{info, warn};

use crate::bias::BiasCorrector;
use crate::convert::Converter;
use crate::enums::{Outcome, TemplateExtraction};
use crate::error::Result;
use crate::extraction::BrainExtractor;
use crate::normalize::Normalizer;
use crate::paths::Layout;
use crate::propagation::MaskPropagator;
use crate::report::{StageReport, SubjectReport};
use crate::subject::Subject;
use crate::toolkit::Toolkit;
use crate::variance::VarianceAggregator;

/// Canonical per-subject sequence: template extraction, mask propagation,
/// bias correction, normalization, variance.
///
/// Every stage runs on every call; stages skip the units whose artifacts are
/// already on disk, which makes a rerun resume where the last one stopped.
pub struct Pipeline<T> {
    toolkit: T,
    layout: Layout,
    template_extraction: TemplateExtraction,
    use_bias_corrected: bool,
}

impl<T: Toolkit> Pipeline<T> {
    pub fn new(toolkit: T, layout: Layout) -> Self {
        Self {
            toolkit,
            layout,
            template_extraction: TemplateExtraction::default(),
            use_bias_corrected: true,
        }
    }

    pub fn template_extraction(mut self, extraction: TemplateExtraction) -> Self {
        self.template_extraction = extraction;
        self
    }

    pub fn use_bias_corrected(mut self, enabled: bool) -> Self {
        self.use_bias_corrected = enabled;
        self
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn toolkit(&self) -> &T {
        &self.toolkit
    }

    /// Run every stage for `subject`.
    ///
    /// # Errors
    ///
    /// Per-time-point failures of propagation and bias correction are only
    /// recorded in the report. A missing template, a failed normalization or
    /// a failed variance computation ends the subject's run with an error.
    pub async fn run(&self, subject: &Subject) -> Result<SubjectReport> {
        let start = Instant::now();
        info!(
            subject = subject.id(),
            method = %subject.registration(),
            template = %subject.template(),
            "analysing subject"
        );
        let mut report = SubjectReport::new(subject.id());

        let extractor = BrainExtractor::new(&self.toolkit, &self.layout);
        let outcome = self
            .stage(subject, "template_extraction", || {
                extractor.extract_template(subject, self.template_extraction)
            })
            .await?;
        report.push(StageReport::single("template_extraction", outcome));

        report.push(
            MaskPropagator::new(&self.toolkit, &self.layout)
                .propagate_all(subject)
                .await,
        );

        report.push(
            BiasCorrector::new(&self.toolkit, &self.layout)
                .correct(subject)
                .await,
        );

        let normalizer = Normalizer::new(&self.toolkit, &self.layout)
            .use_bias_corrected(self.use_bias_corrected);
        let outcome = self
            .stage(subject, "normalization", || normalizer.normalize(subject))
            .await?;
        report.push(StageReport::single("normalization", outcome));

        let outcome = self
            .stage(subject, "variance", || self.variance(subject))
            .await?;
        report.push(StageReport::single("variance", outcome));

        info!(
            subject = subject.id(),
            failed = report.failed(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "subject finished"
        );
        Ok(report)
    }

    /// Convert every acquired scan of `subject` from DICOM.
    pub async fn convert(&self, subject: &Subject) -> StageReport {
        Converter::new(&self.toolkit, &self.layout)
            .convert(subject)
            .await
    }

    /// Convert every acquired T1 scan of `subject` into the T1 tree.
    pub async fn convert_t1(&self, subject: &Subject) -> StageReport {
        let layout = self.layout.t1();
        Converter::new(&self.toolkit, &layout).convert(subject).await
    }

    /// Extract a brain and mask for every configured time point on its own,
    /// with the configured extraction method.
    pub async fn extract(&self, subject: &Subject) -> StageReport {
        BrainExtractor::new(&self.toolkit, &self.layout)
            .extract_all(subject, self.template_extraction)
            .await
    }

    /// Variance map over the normalized series, computed on the blocking
    /// thread pool.
    pub async fn variance(&self, subject: &Subject) -> Result<Outcome> {
        let layout = self.layout.clone();
        let subject = subject.clone();
        task::spawn_blocking(move || VarianceAggregator::new(&layout).compute_variance(&subject))
            .await?
    }

    /// Run several subjects, at most `parallel` at a time.
    ///
    /// Subjects own disjoint directory trees, so they never write the same
    /// artifact. Results come back in completion order.
    pub async fn run_many(
        &self,
        subjects: &[Subject],
        parallel: usize,
    ) -> Vec<(String, Result<SubjectReport>)> {
        stream::iter(subjects)
            .map(|subject| async move { (subject.id().to_string(), self.run(subject).await) })
            .buffer_unordered(parallel.max(1))
            .collect()
            .await
    }

    async fn stage<F, Fut, O>(&self, subject: &Subject, name: &'static str, body: F) -> Result<O>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<O>>,
    {
        let start = Instant::now();
        info!(subject = subject.id(), stage = name, "stage started");
        let result = body().await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => info!(subject = subject.id(), stage = name, elapsed_ms, "stage finished"),
            Err(err) => warn!(
                subject = subject.id(),
                stage = name,
                elapsed_ms,
                error = %err,
                "stage failed"
            ),
        }
        result
    }
}
