#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use aria_flair::error::{PipelineError, Result};
use aria_flair::toolkit::{Tool, ToolCommand, Toolkit};
use aria_flair::volume::Volume;
use aria_flair::{Artifact, Layout, RegistrationMethod, Subject, TimePoint};
use ndarray::Array3;

/// Stands in for FSL: records every call and writes the declared outputs.
#[derive(Default)]
pub struct RecordingToolkit {
    calls: Mutex<Vec<ToolCommand>>,
    fail_on: Option<(Tool, String)>,
}

impl RecordingToolkit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail calls of `tool` whose arguments mention `needle`.
    pub fn failing(tool: Tool, needle: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_on: Some((tool, needle.to_string())),
        }
    }

    pub fn calls(&self) -> Vec<ToolCommand> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, tool: Tool) -> usize {
        self.calls().iter().filter(|c| c.tool == tool).count()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl Toolkit for RecordingToolkit {
    async fn run(&self, command: &ToolCommand) -> Result<()> {
        let call_index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(command.clone());
            calls.len()
        };
        if let Some((tool, needle)) = &self.fail_on {
            let mentioned = command
                .args
                .iter()
                .any(|a| a.to_string_lossy().contains(needle.as_str()));
            if *tool == command.tool && mentioned {
                return Err(PipelineError::ExternalToolFailure {
                    tool: tool.program(),
                    reason: "exit status: 1".into(),
                });
            }
        }
        for output in &command.outputs {
            write_output(output, call_index as f32);
        }
        if command.tool == Tool::Dcm2niix {
        let nifti = command.outputs[0].to_string_lossy().into_owned();
        let sidecar = format!("{}.json", nifti.trim_end_matches(".nii.gz"));
        fs::write(sidecar, br#"{"Modality": "MR"}"#).unwrap();
    }
    if command.tool == Tool::Fast {
            // segmentation byproducts next to the restored image
            let restore = command.outputs[0].to_string_lossy().into_owned();
            let base = restore.trim_end_matches("_restore.nii.gz");
            for suffix in ["seg", "pveseg", "pve_0", "pve_1", "mixeltype"] {
                fs::write(format!("{base}_{suffix}.nii.gz"), b"byproduct").unwrap();
            }
        }
        Ok(())
    }
}

fn write_output(path: &Path, gain: f32) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    if path.to_string_lossy().ends_with(".nii.gz") {
        Volume::from_array(ramp(gain)).save(path).unwrap();
    } else {
        fs::write(path, b"1 0 0 0\n0 1 0 0\n0 0 1 0\n0 0 0 1\n").unwrap();
    }
}

pub fn ramp(gain: f32) -> Array3<f32> {
    Array3::from_shape_fn((4, 4, 4), |(x, y, z)| gain * (1 + x + 4 * y + 16 * z) as f32)
}

pub fn tp(index: u8) -> TimePoint {
    TimePoint::new(index).unwrap()
}

pub fn subject(time_points: &[u8], method: RegistrationMethod) -> Subject {
    Subject::new("B-RAP_0100", 5, time_points, method).unwrap()
}

pub fn write_volume(layout: &Layout, subject: &Subject, artifact: Artifact, data: Array3<f32>) {
    let path = layout.prepare(subject, artifact).unwrap();
    Volume::from_array(data).save(path).unwrap();
}

/// Raw scans for every time point plus the template's brain and mask.
pub fn seed_subject(layout: &Layout, subject: &Subject) {
    for &t in subject.time_points() {
        write_volume(layout, subject, Artifact::Raw(t), ramp(t.index() as f32));
    }
    let template = subject.template();
    write_volume(layout, subject, Artifact::Brain(template), ramp(1.0));
    write_volume(
        layout,
        subject,
        Artifact::BrainMask(template),
        Array3::from_elem((4, 4, 4), 1.0),
    );
}

/// Every regular file under `root`, sorted.
pub fn files_under(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}
