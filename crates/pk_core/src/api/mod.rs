//! Typed client for the task-breakdown backend.
//!
//! Every endpoint goes through [`ApiClient::request`], which maps transport
//! failures, non-2xx statuses and undecodable bodies onto [`AppError`] the same
//! way for all calls.

mod payload;

use crate::config::{CheckInRoute, Config, SubmitRoute};
use crate::error::AppError;
use crate::model::{CheckInFeedback, SubTask, TaskStatus};
use async_trait::async_trait;
use payload::{
    AddTaskResponse, AnalyzeReasonResponse, BreakdownEntry, CheckInResponse, ListingPayload,
    breakdown_subtasks, error_message,
};
use reqwest::{Method, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

/// One progress report against a sub-task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressReport {
    pub goal_id: String,
    pub task_id: String,
    pub status: TaskStatus,
    pub reason: Option<String>,
}

/// The operations the board session needs from a backend.
#[async_trait]
pub trait TaskBackend: Send + Sync {
    /// Submits a goal. `Some` carries sub-tasks the backend returned directly,
    /// `None` means the caller has to refetch the list.
    async fn submit_goal(&self, goal: &str) -> Result<Option<Vec<SubTask>>, AppError>;

    async fn list_subtasks(&self) -> Result<Vec<SubTask>, AppError>;

    async fn report_progress(&self, report: &ProgressReport) -> Result<CheckInFeedback, AppError>;

    async fn delete_subtask(&self, id: &str) -> Result<(), AppError>;
}

pub struct ApiClient {
    base_url: Url,
    submit_route: SubmitRoute,
    check_in_route: CheckInRoute,
    client: reqwest::Client,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("submit_route", &self.submit_route)
            .field("check_in_route", &self.check_in_route)
            .finish()
    }
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let base_url = Url::parse(&config.base_url).map_err(|err| {
            AppError::invalid_input(format!("invalid base_url '{}': {}", config.base_url, err))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::invalid_input(format!(
                "invalid base_url '{}'",
                config.base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|err| AppError::io(err.to_string()))?;

        Ok(Self {
            base_url,
            submit_route: config.submit_route,
            check_in_route: config.check_in_route,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// `POST /breakdown {goal}`. The goal is stored either way; `None` means
    /// the response did not identify every sub-task and the list must be
    /// refetched.
    pub async fn breakdown(&self, goal: &str) -> Result<Option<Vec<SubTask>>, AppError> {
        let payload: ListingPayload<BreakdownEntry> = self
            .request(Method::POST, &["breakdown"], Some(&json!({ "goal": goal })))
            .await?;
        let subtasks = breakdown_subtasks(payload.into_subtasks())
            .map_err(|err| AppError::invalid_data(format!("POST /breakdown: {err}")))?;
        if subtasks.is_none() {
            debug!("breakdown returned sub-tasks without ids, refetch needed");
        }
        Ok(subtasks)
    }

    /// `POST /add-task {task}`; a 2xx body carrying `error` or
    /// `success: false` is still a failure.
    pub async fn add_task(&self, task: &str) -> Result<Option<Vec<SubTask>>, AppError> {
        let response: AddTaskResponse = self
            .request(Method::POST, &["add-task"], Some(&json!({ "task": task })))
            .await?;

        if let Some(message) = response.error {
            return Err(AppError::invalid_data(message));
        }
        if response.success == Some(false) {
            return Err(AppError::invalid_data("Failed to submit task"));
        }

        Ok(response.subtasks.filter(|subtasks| !subtasks.is_empty()))
    }

    /// `GET /subtasks`
    pub async fn list_subtasks(&self) -> Result<Vec<SubTask>, AppError> {
        let payload: ListingPayload = self
            .request(Method::GET, &["subtasks"], None::<&()>)
            .await?;
        Ok(payload.into_subtasks())
    }

    /// `POST /delete-subtask {subtask_id}`
    pub async fn delete_subtask(&self, id: &str) -> Result<(), AppError> {
        let _: serde_json::Value = self
            .request(
                Method::POST,
                &["delete-subtask"],
                Some(&json!({ "subtask_id": id })),
            )
            .await?;
        Ok(())
    }

    /// `POST /check-in/{goal_id}/{task_id} {status, reason}`
    pub async fn check_in(
        &self,
        goal_id: &str,
        task_id: &str,
        status: TaskStatus,
        reason: Option<&str>,
    ) -> Result<CheckInFeedback, AppError> {
        let response: CheckInResponse = self
            .request(
                Method::POST,
                &["check-in", goal_id, task_id],
                Some(&json!({ "status": status, "reason": reason })),
            )
            .await?;

        if let Some(message) = response.error {
            return Err(AppError::invalid_data(message));
        }
        if response.success == Some(false) {
            return Err(AppError::invalid_data("Failed to record check-in"));
        }

        Ok(response.motivation.unwrap_or_default())
    }

    /// `POST /analyze-reason {task_id, reason}`, returning the motivation text.
    pub async fn analyze_reason(
        &self,
        task_id: &str,
        reason: &str,
    ) -> Result<Option<String>, AppError> {
        let response: AnalyzeReasonResponse = self
            .request(
                Method::POST,
                &["analyze-reason"],
                Some(&json!({ "task_id": task_id, "reason": reason })),
            )
            .await?;
        Ok(response.motivation)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, AppError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::invalid_input("base_url cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn request<B, T>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<T, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(segments)?;
        debug!(%method, url = %url, "sending request");

        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|err| {
            warn!(%method, url = %url, error = %err, "request failed");
            AppError::network(format!("{method} {}: {err}", url.path()))
        })?;

        let status = response.status();
        let text = response.text().await.map_err(AppError::from)?;

        if !status.is_success() {
            let message = error_message(&text).unwrap_or_else(|| {
                format!("{method} {} failed with status {}", url.path(), status.as_u16())
            });
            warn!(%method, url = %url, status = status.as_u16(), %message, "backend rejected request");
            return Err(AppError::http(status.as_u16(), message));
        }

        let parsed = if text.trim().is_empty() {
            serde_json::from_value(serde_json::Value::Null)
        } else {
            serde_json::from_str(&text)
        };
        parsed.map_err(|err| {
            warn!(%method, url = %url, error = %err, "undecodable response body");
            AppError::invalid_data(format!("unexpected response from {}: {err}", url.path()))
        })
    }
}

#[async_trait]
impl TaskBackend for ApiClient {
    async fn submit_goal(&self, goal: &str) -> Result<Option<Vec<SubTask>>, AppError> {
        match self.submit_route {
            SubmitRoute::AddTask => self.add_task(goal).await,
            SubmitRoute::Breakdown => self.breakdown(goal).await,
        }
    }

    async fn list_subtasks(&self) -> Result<Vec<SubTask>, AppError> {
        ApiClient::list_subtasks(self).await
    }

    async fn report_progress(&self, report: &ProgressReport) -> Result<CheckInFeedback, AppError> {
        match self.check_in_route {
            CheckInRoute::Status => {
                self.check_in(
                    &report.goal_id,
                    &report.task_id,
                    report.status,
                    report.reason.as_deref(),
                )
                .await
            }
            CheckInRoute::Reason => match (report.status, report.reason.as_deref()) {
                (TaskStatus::Delayed, Some(reason)) => {
                    let motivation = self.analyze_reason(&report.task_id, reason).await?;
                    Ok(CheckInFeedback {
                        motivation,
                        ..CheckInFeedback::default()
                    })
                }
                _ => {
                    debug!(task_id = %report.task_id, status = %report.status, "reason route only reports delays");
                    Ok(CheckInFeedback::default())
                }
            },
        }
    }

    async fn delete_subtask(&self, id: &str) -> Result<(), AppError> {
        ApiClient::delete_subtask(self, id).await
    }
}
