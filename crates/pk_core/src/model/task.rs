use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use time::format_description::FormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
const NAIVE_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
const NAIVE_FRACTION_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]");

/// Feedback the backend attaches to a recorded check-in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInFeedback {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub motivation: Option<String>,
}

impl CheckInFeedback {
    pub fn is_empty(&self) -> bool {
        self.response.is_none() && self.suggestions.is_empty() && self.motivation.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckIn {
    pub timestamp: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<CheckInFeedback>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTask {
    #[serde(alias = "_id")]
    pub id: String,
    pub task: String,
    #[serde(default)]
    pub time_required: String,
    #[serde(default)]
    pub deadline: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub goal_id: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub motivation_tips: Vec<String>,
    #[serde(default)]
    pub checkpoints: Vec<String>,
    #[serde(default)]
    pub check_ins: Vec<CheckIn>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Delayed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Delayed => "delayed",
        }
    }

    /// Statuses a user can report at a check-in.
    pub fn is_reportable(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "pending" => Ok(Self::Pending),
            "in_progress" | "working" => Ok(Self::InProgress),
            "completed" | "done" => Ok(Self::Completed),
            "delayed" => Ok(Self::Delayed),
            _ => Err(AppError::invalid_input(format!(
                "unknown status '{}' (expected completed, in_progress or delayed)",
                raw.trim()
            ))),
        }
    }
}

impl SubTask {
    pub fn deadline_at(&self) -> Result<OffsetDateTime, AppError> {
        parse_timestamp(&self.deadline)
    }

    /// A task is overdue once its deadline has passed and it is not completed.
    /// Tasks with an unreadable deadline are never overdue.
    pub fn is_overdue(&self, now: OffsetDateTime) -> bool {
        if self.completed || self.status == TaskStatus::Completed {
            return false;
        }
        match self.deadline_at() {
            Ok(deadline) => deadline < now,
            Err(_) => false,
        }
    }

    /// Applies a confirmed check-in: replaces the status, recomputes the
    /// completion fields and appends the record to the history.
    pub fn record_check_in(&mut self, record: CheckIn) {
        self.status = record.status;
        if record.status == TaskStatus::Completed {
            self.completed = true;
            self.completed_at = Some(record.timestamp.clone());
        } else {
            self.completed = false;
            self.completed_at = None;
        }
        self.check_ins.push(record);
    }
}

/// Parses backend timestamps: RFC 3339, naive ISO datetimes (taken as UTC)
/// and bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_timestamp(value: &str) -> Result<OffsetDateTime, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_data("timestamp is empty"));
    }

    if let Ok(parsed) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Ok(parsed);
    }

    for format in [NAIVE_FRACTION_FORMAT, NAIVE_FORMAT] {
        if let Ok(parsed) = PrimitiveDateTime::parse(trimmed, format) {
            return Ok(parsed.assume_utc());
        }
    }

    Date::parse(trimmed, DATE_FORMAT)
        .map(|date| date.midnight().assume_utc())
        .map_err(|_| AppError::invalid_data(format!("unrecognized timestamp '{trimmed}'")))
}

/// Stable ascending sort by deadline; unreadable deadlines go last.
pub fn sort_by_deadline(tasks: &mut [SubTask]) {
    tasks.sort_by(|left, right| {
        match (left.deadline_at().ok(), right.deadline_at().ok()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
}

pub fn now_rfc3339() -> Result<String, AppError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|err| AppError::invalid_data(err.to_string()))
}
