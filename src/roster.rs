use std::path::Path;

use serde::Deserialize;

use crate::enums::RegistrationMethod;
use crate::error::{PipelineError, Result};
use crate::subject::Subject;

/// One row of the subject roster CSV.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RosterEntry {
    #[serde(rename = "Subject_ID")]
    pub subject_id: String,
    #[serde(rename = "Time_Points")]
    pub time_points: u8,
}

impl RosterEntry {
    /// Subject over `selection`, or over every acquired scan when empty.
    pub fn subject(&self, selection: &[u8], registration: RegistrationMethod) -> Result<Subject> {
        if selection.is_empty() {
            Subject::with_all_time_points(&self.subject_id, self.time_points, registration)
        } else {
            Subject::new(&self.subject_id, self.time_points, selection, registration)
        }
    }
}

/// Read a `Subject_ID,Time_Points` roster; extra columns are ignored.
pub fn load_roster(path: impl AsRef<Path>) -> Result<Vec<RosterEntry>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path.as_ref())?;
    let entries = reader
        .deserialize()
        .collect::<std::result::Result<Vec<RosterEntry>, _>>()?;
    if entries.is_empty() {
        return Err(PipelineError::InvalidSubject(format!(
            "roster {} lists no subjects",
            path.as_ref().display()
        )));
    }
    Ok(entries)
}
