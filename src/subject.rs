use std::fmt;

use crate::enums::RegistrationMethod;
use crate::error::{PipelineError, Result};

/// Index of a scan within a subject's longitudinal series, `1..=99`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimePoint(u8);

impl TimePoint {
    pub const MAX: u8 = 99;

    pub fn new(index: u8) -> Result<Self> {
        if index == 0 || index > Self::MAX {
            return Err(PipelineError::InvalidSubject(format!(
                "time point {index} outside 1..={}",
                Self::MAX
            )));
        }
        Ok(Self(index))
    }

    pub fn index(&self) -> u8 {
        self.0
    }
}

/// Renders as two zero-padded digits, e.g. `03`.
impl fmt::Display for TimePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

/// Identity and run configuration of one subject.
///
/// Constructed once per analysis run. The last configured time point is the
/// template whose brain mask is propagated to every other time point.
#[derive(Debug, Clone)]
pub struct Subject {
    id: String,
    total_time_points: u8,
    time_points: Vec<TimePoint>,
    registration: RegistrationMethod,
}

impl Subject {
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidSubject`] if the id is empty, the scan
    /// count is outside `1..=99`, no time points are given, they are not
    /// strictly increasing or one exceeds the total scan count.
    pub fn new(
        id: impl Into<String>,
        total_time_points: u8,
        time_points: &[u8],
        registration: RegistrationMethod,
    ) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() || id.contains(['/', '\\']) {
            return Err(PipelineError::InvalidSubject(format!(
                "bad subject id {id:?}"
            )));
        }
        if total_time_points == 0 || total_time_points > TimePoint::MAX {
            return Err(PipelineError::InvalidSubject(format!(
                "{id}: {total_time_points} acquired scans outside 1..={}",
                TimePoint::MAX
            )));
        }
        if time_points.is_empty() {
            return Err(PipelineError::InvalidSubject(format!(
                "{id}: no time points to consider"
            )));
        }
        if time_points.windows(2).any(|w| w[0] >= w[1]) {
            return Err(PipelineError::InvalidSubject(format!(
                "{id}: time points {time_points:?} are not in chronological order"
            )));
        }
        if let Some(&last) = time_points.last() {
            if last > total_time_points {
                return Err(PipelineError::InvalidSubject(format!(
                    "{id}: time point {last} exceeds the {total_time_points} acquired scans"
                )));
            }
        }
        let time_points = time_points
            .iter()
            .map(|&t| TimePoint::new(t))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            id,
            total_time_points,
            time_points,
            registration,
        })
    }

    /// Subject with every acquired scan under analysis.
    pub fn with_all_time_points(
        id: impl Into<String>,
        total_time_points: u8,
        registration: RegistrationMethod,
    ) -> Result<Self> {
        let all: Vec<u8> = (1..=total_time_points).collect();
        Self::new(id, total_time_points, &all, registration)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn total_time_points(&self) -> u8 {
        self.total_time_points
    }

    pub fn time_points(&self) -> &[TimePoint] {
        &self.time_points
    }

    pub fn registration(&self) -> RegistrationMethod {
        self.registration
    }

    pub fn template(&self) -> TimePoint {
        // non-empty by construction
        self.time_points[self.time_points.len() - 1]
    }

    /// Every configured time point except the template.
    pub fn non_template(&self) -> impl Iterator<Item = TimePoint> + '_ {
        let template = self.template();
        self.time_points.iter().copied().filter(move |t| *t != template)
    }

    /// Every acquired scan, `1..=total`, for conversion.
    pub fn acquired(&self) -> impl Iterator<Item = TimePoint> {
        // total is validated to 1..=MAX
        (1..=self.total_time_points).map(TimePoint)
    }
}
