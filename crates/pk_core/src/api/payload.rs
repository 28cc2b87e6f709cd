use crate::model::{CheckInFeedback, SubTask};
use serde::Deserialize;

/// `GET /subtasks` and `POST /breakdown` answer either with a bare array or
/// with an object wrapping it.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ListingPayload<T = SubTask> {
    Bare(Vec<T>),
    Wrapped { subtasks: Vec<T> },
}

impl<T> ListingPayload<T> {
    pub(crate) fn into_subtasks(self) -> Vec<T> {
        match self {
            Self::Bare(subtasks) => subtasks,
            Self::Wrapped { subtasks } => subtasks,
        }
    }
}

/// A `/breakdown` entry; stored records carry an id, freshly generated ones
/// may not.
#[derive(Debug, Deserialize)]
pub(crate) struct BreakdownEntry {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

impl BreakdownEntry {
    pub(crate) fn has_id(&self) -> bool {
        self.id.as_deref().is_some_and(|id| !id.trim().is_empty())
    }

    pub(crate) fn into_subtask(self) -> Result<SubTask, serde_json::Error> {
        let mut record = self.rest;
        if let Some(id) = self.id {
            record.insert("id".to_string(), serde_json::Value::String(id));
        }
        serde_json::from_value(serde_json::Value::Object(record))
    }
}

/// Sub-tasks from `/breakdown`, or `None` when any entry lacks an id and the
/// caller has to refetch the stored list instead.
pub(crate) fn breakdown_subtasks(
    entries: Vec<BreakdownEntry>,
) -> Result<Option<Vec<SubTask>>, serde_json::Error> {
    if entries.is_empty() || !entries.iter().all(BreakdownEntry::has_id) {
        return Ok(None);
    }
    entries
        .into_iter()
        .map(BreakdownEntry::into_subtask)
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

#[derive(Debug, Deserialize)]
pub(crate) struct AddTaskResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub subtasks: Option<Vec<SubTask>>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CheckInResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub motivation: Option<CheckInFeedback>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnalyzeReasonResponse {
    #[serde(default)]
    pub motivation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Pulls `{error: "..."}` out of a failed response body.
pub(crate) fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|parsed| parsed.error.trim().to_string())
        .filter(|message| !message.is_empty())
}
