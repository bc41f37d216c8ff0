mod common;

use aria_flair::error::PipelineError;
use aria_flair::propagation::MaskPropagator;
use aria_flair::toolkit::Tool;
use aria_flair::{Artifact, Layout, Outcome, RegistrationMethod};
use common::{RecordingToolkit, ramp, seed_subject, subject, tp, write_volume};
use tempfile::TempDir;

#[tokio::test]
async fn template_mask_reaches_every_other_time_point() {
    let tmp = TempDir::new().unwrap();
    let layout = Layout::new(tmp.path(), "3D-FLAIR");
    let subject = subject(&[1, 2, 3, 4, 5], RegistrationMethod::Affine);
    seed_subject(&layout, &subject);

    let toolkit = RecordingToolkit::new();
    let report = MaskPropagator::new(&toolkit, &layout)
        .propagate_all(&subject)
        .await;

    assert_eq!(report.completed(), 4);
    assert_eq!(report.failed(), 0);
    assert_eq!(toolkit.count(Tool::Flirt), 4);
    let masking: Vec<_> = toolkit
        .calls()
        .into_iter()
        .filter(|c| c.tool == Tool::FslMaths)
        .collect();
    assert_eq!(masking.len(), 4);

    let template_mask = layout.path(&subject, Artifact::BrainMask(tp(5)));
    for command in &masking {
        assert_eq!(command.args[2].as_os_str(), template_mask.as_os_str());
        assert!(!command.outputs[0].to_string_lossy().contains("_05_D1"));
    }
    for t in 1..=4 {
        assert!(layout.path(&subject, Artifact::Brain(tp(t))).is_file());
    }
}

#[tokio::test]
async fn one_failing_time_point_does_not_stop_the_others() {
    let tmp = TempDir::new().unwrap();
    let layout = Layout::new(tmp.path(), "3D-FLAIR");
    let subject = subject(&[1, 2, 3, 4, 5], RegistrationMethod::Affine);
    seed_subject(&layout, &subject);

    let toolkit = RecordingToolkit::failing(Tool::Flirt, "_03_D1");
    let report = MaskPropagator::new(&toolkit, &layout)
        .propagate_all(&subject)
        .await;

    assert_eq!(report.completed(), 3);
    assert_eq!(report.failed(), 1);
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures[0].0, Some(tp(3)));
    assert!(!layout.path(&subject, Artifact::Brain(tp(3))).exists());
    assert!(layout.path(&subject, Artifact::Brain(tp(4))).is_file());
}

#[tokio::test]
async fn template_cannot_be_a_propagation_target() {
    let tmp = TempDir::new().unwrap();
    let layout = Layout::new(tmp.path(), "3D-FLAIR");
    let subject = subject(&[1, 5], RegistrationMethod::Affine);
    seed_subject(&layout, &subject);

    let toolkit = RecordingToolkit::new();
    let err = MaskPropagator::new(&toolkit, &layout)
        .propagate_mask(&subject, tp(5), tp(5))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::TemplateTarget(t) if t == tp(5)));
    assert!(toolkit.calls().is_empty());
}

#[tokio::test]
async fn existing_brain_volume_is_skipped() {
    let tmp = TempDir::new().unwrap();
    let layout = Layout::new(tmp.path(), "3D-FLAIR");
    let subject = subject(&[2, 5], RegistrationMethod::Nonlinear);
    seed_subject(&layout, &subject);
    write_volume(&layout, &subject, Artifact::Brain(tp(2)), ramp(2.0));

    let toolkit = RecordingToolkit::new();
    let outcome = MaskPropagator::new(&toolkit, &layout)
        .propagate_mask(&subject, tp(5), tp(2))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Skipped);
    assert!(toolkit.calls().is_empty());
}
