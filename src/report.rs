use std::fmt;

use crate::enums::Outcome;
use crate::subject::TimePoint;

/// Per-unit outcomes of one pipeline stage.
///
/// A unit is one time point, or the whole subject (`None`) for joint stages.
#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    pub stage: &'static str,
    pub units: Vec<(Option<TimePoint>, Outcome)>,
}

impl StageReport {
    pub fn new(stage: &'static str) -> Self {
        Self {
            stage,
            units: Vec::new(),
        }
    }

    /// Report for a stage with a single subject-wide unit.
    pub fn single(stage: &'static str, outcome: Outcome) -> Self {
        let mut report = Self::new(stage);
        report.record(None, outcome);
        report
    }

    pub fn record(&mut self, time_point: Option<TimePoint>, outcome: Outcome) {
        self.units.push((time_point, outcome));
    }

    pub fn count(&self, wanted: fn(&Outcome) -> bool) -> usize {
        self.units.iter().filter(|(_, o)| wanted(o)).count()
    }

    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Completed))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(Outcome::is_failed)
    }

    pub fn failures(&self) -> impl Iterator<Item = (Option<TimePoint>, &str)> {
        self.units.iter().filter_map(|(t, o)| match o {
            Outcome::Failed(reason) => Some((*t, reason.as_str())),
            _ => None,
        })
    }
}

/// Everything one pipeline run did for one subject.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectReport {
    pub subject: String,
    pub stages: Vec<StageReport>,
}

impl SubjectReport {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            stages: Vec::new(),
        }
    }

    pub fn push(&mut self, stage: StageReport) {
        self.stages.push(stage);
    }

    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == name)
    }

    pub fn failed(&self) -> usize {
        self.stages.iter().map(StageReport::failed).sum()
    }
}

impl fmt::Display for SubjectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.subject)?;
        for stage in &self.stages {
            writeln!(
                f,
                "  {:<18} completed={} skipped={} failed={}",
                stage.stage,
                stage.completed(),
                stage.skipped(),
                stage.failed()
            )?;
            for (time_point, reason) in stage.failures() {
                match time_point {
                    Some(t) => writeln!(f, "    [{t}] {reason}")?,
                    None => writeln!(f, "    {reason}")?,
                }
            }
        }
        Ok(())
    }
}
