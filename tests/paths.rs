use std::path::PathBuf;

use aria_flair::{Artifact, Layout, RegistrationMethod, Subject, TimePoint};

fn artifacts(t: TimePoint) -> [Artifact; 13] {
    [
        Artifact::Raw(t),
        Artifact::RawSidecar(t),
        Artifact::ExtractedBrain(t),
        Artifact::Brain(t),
        Artifact::BrainMask(t),
        Artifact::Registered(t),
        Artifact::AffineTransform(t),
        Artifact::WarpCoefficients(t),
        Artifact::BiasCorrected(t),
        Artifact::BiasField(t),
        Artifact::Normalized(t),
        Artifact::T1Raw(t),
        Artifact::T1InFlair(t),
    ]
}

#[test]
fn time_points_are_always_two_digits() {
    let layout = Layout::new("/data", "3D-FLAIR");
    let subject =
        Subject::with_all_time_points("B-RAP_0027", 99, RegistrationMethod::Affine).unwrap();
    for index in 1..=99u8 {
        let t = TimePoint::new(index).unwrap();
        let expected = format!("B-RAP_0027_{index:02}_D1");
        for artifact in artifacts(t) {
            let path = layout.path(&subject, artifact);
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            assert!(name.starts_with(&expected), "{name} for {artifact:?}");
        }
    }
}

#[test]
fn resolution_is_deterministic_and_distinct() {
    let layout = Layout::new("/data", "3D-FLAIR");
    let subject = Subject::new("B-RAP_0027", 5, &[1, 3, 5], RegistrationMethod::Nonlinear).unwrap();
    let t = TimePoint::new(3).unwrap();

    let first: Vec<PathBuf> = artifacts(t).iter().map(|&a| layout.path(&subject, a)).collect();
    let second: Vec<PathBuf> = artifacts(t).iter().map(|&a| layout.path(&subject, a)).collect();
    assert_eq!(first, second);

    let mut unique = first.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), first.len());
}

#[test]
fn artifacts_live_in_the_expected_directories() {
    let layout = Layout::new("/data", "3D-FLAIR");
    let subject = Subject::new("B-RAP_0027", 5, &[1, 5], RegistrationMethod::Nonlinear).unwrap();
    let t = TimePoint::new(1).unwrap();
    let root = PathBuf::from("/data/B-RAP_0027/3D-FLAIR");

    let cases = [
        (Artifact::Raw(t), "original_nifti/B-RAP_0027_01_D1.nii.gz"),
        (Artifact::RawSidecar(t), "original_nifti/json_info/B-RAP_0027_01_D1.json"),
        (Artifact::ExtractedBrain(t), "brain_nifti/B-RAP_0027_01_D1.nii.gz"),
        (Artifact::Brain(t), "brain_nifti/nonlinear_tmpl05/B-RAP_0027_01_D1.nii.gz"),
        (
            Artifact::Registered(t),
            "registered_nifti/nonlinear_tmpl05/B-RAP_0027_01_D1.nii.gz",
        ),
        (
            Artifact::WarpCoefficients(t),
            "registered_nifti/nonlinear_tmpl05/FNIRT_coef/B-RAP_0027_01_D1_warpcoef.nii.gz",
        ),
        (
            Artifact::BiasCorrected(t),
            "bias_nifti/nonlinear_tmpl05/B-RAP_0027_01_D1_restore.nii.gz",
        ),
        (
            Artifact::BiasField(t),
            "bias_nifti/nonlinear_tmpl05/fields/B-RAP_0027_01_D1_bias.nii.gz",
        ),
        (
            Artifact::Normalized(t),
            "normalised_nifti/nonlinear_tp01-05/B-RAP_0027_01_D1.nii.gz",
        ),
        (
            Artifact::StandardHistogram,
            "normalised_nifti/nonlinear_tp01-05/standard_histogram.npy",
        ),
    ];
    for (artifact, relative) in cases {
        assert_eq!(layout.path(&subject, artifact), root.join(relative));
    }
    assert_eq!(
        layout.dicom_root("B-RAP_0027", t),
        root.join("original_dicom/B-RAP_0027_01_D1")
    );
}

#[test]
fn run_products_are_scoped_by_template_method_and_subset() {
    let layout = Layout::new("/data", "3D-FLAIR");
    let t = TimePoint::new(1).unwrap();
    let wide = Subject::new("B-RAP_0027", 5, &[1, 2, 3, 4, 5], RegistrationMethod::Affine).unwrap();
    let narrow = Subject::new("B-RAP_0027", 5, &[1, 2, 3], RegistrationMethod::Affine).unwrap();
    let rigid = Subject::new("B-RAP_0027", 5, &[1, 2, 3, 4, 5], RegistrationMethod::Rigid).unwrap();

    for artifact in [
        Artifact::Brain(t),
        Artifact::Registered(t),
        Artifact::AffineTransform(t),
        Artifact::BiasCorrected(t),
        Artifact::Normalized(t),
        Artifact::StandardHistogram,
    ] {
        assert_ne!(layout.path(&wide, artifact), layout.path(&narrow, artifact));
        assert_ne!(layout.path(&wide, artifact), layout.path(&rigid, artifact));
    }
    // inputs shared by every run
    for artifact in [Artifact::Raw(t), Artifact::ExtractedBrain(t), Artifact::BrainMask(t)] {
        assert_eq!(layout.path(&wide, artifact), layout.path(&narrow, artifact));
        assert_eq!(layout.path(&wide, artifact), layout.path(&rigid, artifact));
    }
}
