mod common;

use std::fs;

use aria_flair::bias::{BiasCorrector, Reorganized, reorganize};
use aria_flair::paths::Directory;
use aria_flair::toolkit::Tool;
use aria_flair::{Artifact, Layout, Outcome, RegistrationMethod};
use common::{RecordingToolkit, ramp, seed_subject, subject, tp, write_volume};
use tempfile::TempDir;

#[test]
fn reorganize_sorts_fast_outputs_by_suffix() {
    let tmp = TempDir::new().unwrap();
    let layout = Layout::new(tmp.path(), "3D-FLAIR");
    let subject = subject(&[1, 2, 3], RegistrationMethod::Affine);
    let brain_dir = layout.directory(&subject, Directory::RunBrain);
    fs::create_dir_all(&brain_dir).unwrap();

    let id = subject.id();
    for t in ["01", "02", "03"] {
        for suffix in [
            "", "_restore", "_bias", "_seg", "_pveseg", "_pve_0", "_pve_1", "_mixeltype",
        ] {
            fs::write(brain_dir.join(format!("{id}_{t}_D1{suffix}.nii.gz")), b"x").unwrap();
        }
    }
    fs::write(brain_dir.join("notes_seg.txt"), b"x").unwrap();

    let summary = reorganize(&layout, &subject).unwrap();
    assert_eq!(
        summary,
        Reorganized {
            restored: 3,
            fields: 3,
            removed: 15,
        }
    );

    let corrected = layout.directory(&subject, Directory::BiasCorrected);
    let fields = layout.directory(&subject, Directory::BiasFields);
    for t in 1..=3 {
        assert!(layout.path(&subject, Artifact::BiasCorrected(tp(t))).is_file());
        assert!(layout.path(&subject, Artifact::BiasField(tp(t))).is_file());
        assert!(brain_dir.join(format!("{id}_0{t}_D1.nii.gz")).is_file());
    }
    assert_eq!(fs::read_dir(&fields).unwrap().count(), 3);

    let left: Vec<String> = fs::read_dir(&brain_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(id))
        .collect();
    assert_eq!(left.len(), 3);
    assert!(
        left.iter()
            .all(|n| !n.contains("pve") && !n.contains("seg") && !n.contains("mixeltype"))
    );
    assert!(brain_dir.join("notes_seg.txt").is_file());
    // the fields subdirectory is not mistaken for a corrected volume
    assert_eq!(
        fs::read_dir(&corrected)
            .unwrap()
            .filter(|e| e.as_ref().unwrap().path().is_file())
            .count(),
        3
    );

    assert_eq!(reorganize(&layout, &subject).unwrap(), Reorganized::default());
}

#[tokio::test]
async fn correction_runs_fast_once_per_time_point() {
    let tmp = TempDir::new().unwrap();
    let layout = Layout::new(tmp.path(), "3D-FLAIR");
    let subject = subject(&[1, 2, 5], RegistrationMethod::Affine);
    seed_subject(&layout, &subject);
    write_volume(&layout, &subject, Artifact::Brain(tp(1)), ramp(1.0));
    write_volume(&layout, &subject, Artifact::Brain(tp(2)), ramp(2.0));

    let toolkit = RecordingToolkit::new();
    let corrector = BiasCorrector::new(&toolkit, &layout);
    let report = corrector.correct(&subject).await;

    assert_eq!(report.completed(), 3);
    assert_eq!(toolkit.count(Tool::Fast), 3);
    for &t in subject.time_points() {
        assert!(layout.path(&subject, Artifact::BiasCorrected(t)).is_file());
        assert!(layout.path(&subject, Artifact::BiasField(t)).is_file());
    }
    let brain_dir = layout.directory(&subject, Directory::RunBrain);
    assert!(
        fs::read_dir(&brain_dir)
            .unwrap()
            .all(|e| !e.unwrap().file_name().to_string_lossy().contains("pve"))
    );

    toolkit.clear();
    let again = corrector.correct(&subject).await;
    assert_eq!(again.skipped(), 3);
    assert!(toolkit.calls().is_empty());
}

#[tokio::test]
async fn missing_brain_volume_fails_only_its_time_point() {
    let tmp = TempDir::new().unwrap();
    let layout = Layout::new(tmp.path(), "3D-FLAIR");
    let subject = subject(&[1, 5], RegistrationMethod::Affine);
    seed_subject(&layout, &subject);

    let toolkit = RecordingToolkit::new();
    let report = BiasCorrector::new(&toolkit, &layout).correct(&subject).await;

    assert_eq!(report.failed(), 1);
    assert_eq!(report.completed(), 1);
    assert!(matches!(report.units[0], (Some(t), Outcome::Failed(_)) if t == tp(1)));
}
