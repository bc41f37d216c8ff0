use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use dicom::object::OpenFileOptions;
use dicom_dictionary_std::tags;
use tracing::{info, warn};

use crate::enums::Outcome;
use crate::error::{PipelineError, Result};
use crate::oracle;
use crate::paths::{Artifact, Layout};
use crate::report::StageReport;
use crate::subject::{Subject, TimePoint};
use crate::toolkit::{ToolCommand, Toolkit};

fn is_dicom_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
}

fn contains_dicom(dir: &Path) -> Result<bool> {
    for entry in fs::read_dir(dir)? {
        if is_dicom_file(&entry?.path()) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Every directory under `root` (inclusive) that directly holds `.dcm` files.
fn dicom_folders(root: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        if contains_dicom(&dir)? {
            found.push(dir.clone());
        }
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                pending.push(entry.path());
            }
        }
    }
    found.sort();
    Ok(found)
}

/// Series Instance UIDs found in the headers of a folder's `.dcm` files.
fn series_uids(folder: &Path) -> Result<BTreeSet<String>> {
    let mut uids = BTreeSet::new();
    for entry in fs::read_dir(folder)? {
        let path = entry?.path();
        if !is_dicom_file(&path) {
            continue;
        }
        let object = OpenFileOptions::new()
            .read_until(tags::PIXEL_DATA)
            .open_file(&path)?;
        if let Some(uid) = object
            .element(tags::SERIES_INSTANCE_UID)
            .ok()
            .and_then(|e| e.to_str().ok())
        {
            uids.insert(uid.trim_end_matches('\0').trim().to_string());
        }
    }
    Ok(uids)
}

/// Locate the single folder holding one time point's DICOM series.
///
/// # Errors
///
/// [`PipelineError::DicomNotFound`] when no folder under the time point's
/// root holds `.dcm` files, and [`PipelineError::AmbiguousDicomSeries`]
/// when several folders do or the chosen folder mixes series.
pub fn find_dicom_folder(layout: &Layout, subject: &Subject, t: TimePoint) -> Result<PathBuf> {
    let root = layout.dicom_root(subject.id(), t);
    if !root.is_dir() {
        return Err(PipelineError::DicomNotFound(root));
    }
    let mut folders = dicom_folders(&root)?;
    match folders.len() {
        0 => Err(PipelineError::DicomNotFound(root)),
        1 => {
            let folder = folders.remove(0);
            let uids = series_uids(&folder)?;
            if uids.len() > 1 {
                return Err(PipelineError::AmbiguousDicomSeries {
                    root,
                    candidates: uids.into_iter().collect(),
                });
            }
            Ok(folder)
        }
        _ => Err(PipelineError::AmbiguousDicomSeries {
            root,
            candidates: folders
                .iter()
                .map(|f| f.display().to_string())
                .collect(),
        }),
    }
}

/// DICOM to NIfTI conversion of every acquired scan of a subject.
pub struct Converter<'a, T> {
    toolkit: &'a T,
    layout: &'a Layout,
}

impl<'a, T: Toolkit> Converter<'a, T> {
    pub fn new(toolkit: &'a T, layout: &'a Layout) -> Self {
        Self { toolkit, layout }
    }

    /// Convert one scan, reorient it and move it into the raw layout.
    ///
    /// Everything happens in a staging directory beside the raw volume; the
    /// raw path only appears once the volume is final, so a failed attempt
    /// is retried on the next run.
    pub async fn convert_time_point(&self, subject: &Subject, t: TimePoint) -> Result<Outcome> {
        let raw = self.layout.path(subject, Artifact::Raw(t));
        if oracle::exists(&raw) {
            return Ok(Outcome::Skipped);
        }
        let folder = find_dicom_folder(self.layout, subject, t)?;
        let raw = self.layout.prepare(subject, Artifact::Raw(t))?;
        let name = Layout::stem(subject.id(), t);
        let staging = raw.with_file_name(format!(".{name}.staging"));
        if staging.exists() {
            // left behind by an interrupted attempt
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        let staged = staging.join(format!("{name}.nii.gz"));
        self.toolkit
            .run(&ToolCommand::dcm2niix(&folder, &staging, &name))
            .await?;
        self.toolkit
            .run(&ToolCommand::reorient(&staged, &staged))
            .await?;

        let sidecar = staging.join(format!("{name}.json"));
        if sidecar.is_file() {
            fs::rename(
                &sidecar,
                self.layout.prepare(subject, Artifact::RawSidecar(t))?,
            )?;
        }
        fs::rename(&staged, &raw)?;
        fs::remove_dir_all(&staging)?;
        info!(subject = subject.id(), time_point = %t, "converted to NIfTI");
        Ok(Outcome::Completed)
    }

    /// Convert every acquired time point, `1..=total`.
    pub async fn convert(&self, subject: &Subject) -> StageReport {
        let mut report = StageReport::new("conversion");
        for t in subject.acquired() {
            let outcome = self
                .convert_time_point(subject, t)
                .await
                .unwrap_or_else(|err| {
                    warn!(
                        subject = subject.id(),
                        time_point = %t,
                        error = %err,
                        "conversion failed"
                    );
                    Outcome::Failed(err.to_string())
                });
            report.record(Some(t), outcome);
        }
        report
    }
}
