//! In-memory board state and its reconciliation with the backend.
//!
//! The backend owns the truth; the session keeps a cache that is replaced on
//! every refresh and patched in place after confirmed mutations. Failed calls
//! never touch the cache, except a failed refresh which empties it.

use crate::api::{ProgressReport, TaskBackend};
use crate::error::AppError;
use crate::model::{CheckIn, CheckInFeedback, SubTask, TaskStatus, now_rfc3339, sort_by_deadline};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const SUBMIT_FAILED: &str = "Failed to submit task";

/// Sequence number of one issued listing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RefreshTicket(u64);

impl RefreshTicket {
    pub fn sequence(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The list was replaced; carries the new length.
    Applied(usize),
    /// Requested too soon after the previous refresh; no request was made.
    Skipped,
    /// A newer refresh was issued while this one was in flight.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The backend returned the new sub-tasks; they now head the list.
    Merged(Vec<SubTask>),
    /// Nothing came back directly, so the whole list was refetched.
    Refreshed,
}

/// Transient state of the open check-in prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckInDraft {
    pub task_id: String,
    pub status: TaskStatus,
    pub reason: String,
}

impl CheckInDraft {
    fn new(task_id: &str) -> Self {
        Self {
            task_id: task_id.to_string(),
            status: TaskStatus::InProgress,
            reason: String::new(),
        }
    }
}

pub struct BoardSession<B> {
    backend: Arc<B>,
    input: String,
    subtasks: Vec<SubTask>,
    loading: bool,
    error: Option<String>,
    check_in: Option<CheckInDraft>,
    min_refresh_gap: Duration,
    last_refresh: Option<Instant>,
    latest_ticket: u64,
}

impl<B: TaskBackend> BoardSession<B> {
    pub fn new(backend: Arc<B>, min_refresh_gap: Duration) -> Self {
        Self {
            backend,
            input: String::new(),
            subtasks: Vec::new(),
            loading: false,
            error: None,
            check_in: None,
            min_refresh_gap,
            last_refresh: None,
            latest_ticket: 0,
        }
    }

    pub fn backend(&self) -> Arc<B> {
        Arc::clone(&self.backend)
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, value: &str) {
        self.input = value.to_string();
    }

    pub fn subtasks(&self) -> &[SubTask] {
        &self.subtasks
    }

    pub fn get(&self, id: &str) -> Option<&SubTask> {
        self.subtasks.iter().find(|task| task.id == id)
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn check_in(&self) -> Option<&CheckInDraft> {
        self.check_in.as_ref()
    }

    fn fail(&mut self, operation: &str, err: AppError) -> AppError {
        warn!(operation, error = %err, "operation failed");
        self.error = Some(err.message().to_string());
        err
    }

    // ── goal submission ─────────────────────────────────────────

    pub async fn submit_goal(&mut self) -> Result<SubmitOutcome, AppError> {
        let goal = self.input.trim().to_string();
        if goal.is_empty() {
            return Err(AppError::invalid_input("goal is required"));
        }
        if self.loading {
            return Err(AppError::invalid_input("a submission is already in progress"));
        }

        self.loading = true;
        let result = self.backend.submit_goal(&goal).await;
        self.loading = false;

        let returned = match result {
            Ok(returned) => returned,
            Err(err) => {
                let err = match err {
                    AppError::Network(_) => AppError::network(SUBMIT_FAILED),
                    other => other,
                };
                return Err(self.fail("submit_goal", err));
            }
        };

        self.input.clear();
        self.error = None;

        match returned {
            Some(added) => {
                info!(count = added.len(), "merging submitted sub-tasks");
                let rest = std::mem::take(&mut self.subtasks)
                    .into_iter()
                    .filter(|task| !added.iter().any(|new| new.id == task.id));
                let mut merged = added.clone();
                merged.extend(rest);
                self.subtasks = merged;
                self.invalidate_inflight();
                Ok(SubmitOutcome::Merged(added))
            }
            None => {
                // Submission already succeeded; a failed refetch only shows up
                // through `error()`.
                let _ = self.retry().await;
                Ok(SubmitOutcome::Refreshed)
            }
        }
    }

    // ── listing ─────────────────────────────────────────────────

    /// Issues a ticket unless the previous refresh was less than the minimum
    /// gap ago.
    pub fn begin_refresh(&mut self) -> Option<RefreshTicket> {
        let now = Instant::now();
        if let Some(last) = self.last_refresh
            && now.duration_since(last) < self.min_refresh_gap
        {
            debug!("refresh skipped, previous one too recent");
            return None;
        }
        Some(self.issue_ticket(now))
    }

    /// Issues a ticket regardless of the rate limit.
    pub fn force_refresh(&mut self) -> RefreshTicket {
        self.issue_ticket(Instant::now())
    }

    /// Makes every ticket issued so far stale. Called after a confirmed
    /// mutation so a listing fetched before it cannot overwrite its effect.
    fn invalidate_inflight(&mut self) {
        self.latest_ticket += 1;
    }

    fn issue_ticket(&mut self, now: Instant) -> RefreshTicket {
        self.latest_ticket += 1;
        self.last_refresh = Some(now);
        RefreshTicket(self.latest_ticket)
    }

    /// Applies a listing response if it belongs to the latest issued ticket.
    pub fn finish_refresh(
        &mut self,
        ticket: RefreshTicket,
        result: Result<Vec<SubTask>, AppError>,
    ) -> Result<RefreshOutcome, AppError> {
        if ticket.0 != self.latest_ticket {
            debug!(
                ticket = ticket.0,
                latest = self.latest_ticket,
                "discarding stale listing response"
            );
            return Ok(RefreshOutcome::Stale);
        }

        match result {
            Ok(mut subtasks) => {
                sort_by_deadline(&mut subtasks);
                let count = subtasks.len();
                self.subtasks = subtasks;
                self.error = None;
                if let Some(draft) = self.check_in.as_ref()
                    && self.get(&draft.task_id).is_none()
                {
                    self.check_in = None;
                }
                info!(count, "sub-task list refreshed");
                Ok(RefreshOutcome::Applied(count))
            }
            Err(err) => {
                self.subtasks.clear();
                Err(self.fail("refresh", err))
            }
        }
    }

    pub async fn refresh(&mut self) -> Result<RefreshOutcome, AppError> {
        match self.begin_refresh() {
            Some(ticket) => self.fetch_and_apply(ticket).await,
            None => Ok(RefreshOutcome::Skipped),
        }
    }

    /// Manual retry from the error panel; bypasses the rate limit.
    pub async fn retry(&mut self) -> Result<RefreshOutcome, AppError> {
        let ticket = self.force_refresh();
        self.fetch_and_apply(ticket).await
    }

    async fn fetch_and_apply(&mut self, ticket: RefreshTicket) -> Result<RefreshOutcome, AppError> {
        let result = self.backend.list_subtasks().await;
        self.finish_refresh(ticket, result)
    }

    // ── check-ins ───────────────────────────────────────────────

    pub fn open_check_in(&mut self, id: &str) -> Result<&SubTask, AppError> {
        let trimmed_id = id.trim();
        let index = self
            .subtasks
            .iter()
            .position(|task| task.id == trimmed_id)
            .ok_or_else(|| AppError::invalid_input("task not found"))?;
        self.check_in = Some(CheckInDraft::new(trimmed_id));
        Ok(&self.subtasks[index])
    }

    pub fn set_check_in_status(&mut self, status: TaskStatus) -> Result<(), AppError> {
        if !status.is_reportable() {
            return Err(AppError::invalid_input(
                "status must be completed, in_progress or delayed",
            ));
        }
        let draft = self
            .check_in
            .as_mut()
            .ok_or_else(|| AppError::invalid_input("no check-in is open"))?;
        draft.status = status;
        Ok(())
    }

    pub fn set_check_in_reason(&mut self, reason: &str) -> Result<(), AppError> {
        let draft = self
            .check_in
            .as_mut()
            .ok_or_else(|| AppError::invalid_input("no check-in is open"))?;
        draft.reason = reason.to_string();
        Ok(())
    }

    pub fn close_check_in(&mut self) {
        self.check_in = None;
    }

    /// Sends the open check-in. The prompt is closed whatever the outcome.
    pub async fn submit_check_in(&mut self) -> Result<CheckInFeedback, AppError> {
        let draft = self
            .check_in
            .take()
            .ok_or_else(|| AppError::invalid_input("no check-in is open"))?;

        let goal_id = self
            .get(&draft.task_id)
            .map(|task| task.goal_id.clone())
            .ok_or_else(|| AppError::invalid_input("task not found"))?;

        let reason = Some(draft.reason.trim().to_string()).filter(|reason| !reason.is_empty());
        let timestamp = now_rfc3339()?;
        let report = ProgressReport {
            goal_id,
            task_id: draft.task_id.clone(),
            status: draft.status,
            reason: reason.clone(),
        };

        let feedback = match self.backend.report_progress(&report).await {
            Ok(feedback) => feedback,
            Err(err) => return Err(self.fail("check_in", err)),
        };

        match self.subtasks.iter_mut().find(|task| task.id == draft.task_id) {
            Some(task) => {
                task.record_check_in(CheckIn {
                    timestamp,
                    status: draft.status,
                    reason,
                    feedback: Some(feedback.clone()).filter(|feedback| !feedback.is_empty()),
                });
                info!(task_id = %task.id, status = %task.status, "check-in recorded");
            }
            None => debug!(task_id = %draft.task_id, "task left the list during check-in"),
        }
        self.invalidate_inflight();
        self.error = None;

        Ok(feedback)
    }

    /// Opens, fills and submits a check-in in one go.
    pub async fn record_check_in(
        &mut self,
        id: &str,
        status: TaskStatus,
        reason: Option<&str>,
    ) -> Result<CheckInFeedback, AppError> {
        self.open_check_in(id)?;
        let filled = self
            .set_check_in_status(status)
            .and_then(|_| self.set_check_in_reason(reason.unwrap_or_default()));
        if let Err(err) = filled {
            self.close_check_in();
            return Err(err);
        }
        self.submit_check_in().await
    }

    // ── deletion ────────────────────────────────────────────────

    /// Deletes a sub-task and drops it from the cache; returns the cached
    /// entry if there was one.
    pub async fn delete(&mut self, id: &str) -> Result<Option<SubTask>, AppError> {
        let trimmed_id = id.trim();
        if trimmed_id.is_empty() {
            return Err(AppError::invalid_input("id is required"));
        }

        if let Err(err) = self.backend.delete_subtask(trimmed_id).await {
            return Err(self.fail("delete", err));
        }

        if self
            .check_in
            .as_ref()
            .is_some_and(|draft| draft.task_id == trimmed_id)
        {
            self.check_in = None;
        }

        let removed = self
            .subtasks
            .iter()
            .position(|task| task.id == trimmed_id)
            .map(|index| self.subtasks.remove(index));
        self.invalidate_inflight();
        info!(task_id = trimmed_id, cached = removed.is_some(), "sub-task deleted");
        Ok(removed)
    }

    // ── overdue prompt ──────────────────────────────────────────

    pub fn first_overdue(&self, now: OffsetDateTime) -> Option<&SubTask> {
        self.subtasks.iter().find(|task| task.is_overdue(now))
    }

    /// Opens the check-in prompt for the first overdue task, unless a prompt
    /// is already open.
    pub fn prompt_overdue(&mut self, now: OffsetDateTime) -> Option<SubTask> {
        if self.check_in.is_some() {
            return None;
        }
        let task = self.first_overdue(now)?.clone();
        self.check_in = Some(CheckInDraft::new(&task.id));
        Some(task)
    }

    /// Refreshes (subject to the rate limit) and then prompts for the first
    /// overdue task.
    pub async fn scan_overdue(&mut self, now: OffsetDateTime) -> Result<Option<SubTask>, AppError> {
        self.refresh().await?;
        Ok(self.prompt_overdue(now))
    }
}

#[cfg(test)]
mod tests {
    use super::{BoardSession, RefreshOutcome, SubmitOutcome};
    use crate::api::{ProgressReport, TaskBackend};
    use crate::error::AppError;
    use crate::model::{CheckInFeedback, SubTask, TaskStatus};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use time::OffsetDateTime;

    #[derive(Default)]
    struct ScriptedBackend {
        submits: Mutex<VecDeque<Result<Option<Vec<SubTask>>, AppError>>>,
        listings: Mutex<VecDeque<Result<Vec<SubTask>, AppError>>>,
        reports: Mutex<VecDeque<Result<CheckInFeedback, AppError>>>,
        deletes: Mutex<VecDeque<Result<(), AppError>>>,
        submitted: Mutex<Vec<String>>,
        reported: Mutex<Vec<ProgressReport>>,
        list_calls: Mutex<usize>,
    }

    impl ScriptedBackend {
        fn with_listing(self, listing: Result<Vec<SubTask>, AppError>) -> Self {
            self.listings.lock().unwrap().push_back(listing);
            self
        }

        fn with_submit(self, result: Result<Option<Vec<SubTask>>, AppError>) -> Self {
            self.submits.lock().unwrap().push_back(result);
            self
        }

        fn with_report(self, result: Result<CheckInFeedback, AppError>) -> Self {
            self.reports.lock().unwrap().push_back(result);
            self
        }

        fn with_delete(self, result: Result<(), AppError>) -> Self {
            self.deletes.lock().unwrap().push_back(result);
            self
        }

        fn list_calls(&self) -> usize {
            *self.list_calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl TaskBackend for ScriptedBackend {
        async fn submit_goal(&self, goal: &str) -> Result<Option<Vec<SubTask>>, AppError> {
            self.submitted.lock().unwrap().push(goal.to_string());
            self.submits
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(None))
        }

        async fn list_subtasks(&self) -> Result<Vec<SubTask>, AppError> {
            *self.list_calls.lock().unwrap() += 1;
            self.listings
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        async fn report_progress(
            &self,
            report: &ProgressReport,
        ) -> Result<CheckInFeedback, AppError> {
            self.reported.lock().unwrap().push(report.clone());
            self.reports
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(CheckInFeedback::default()))
        }

        async fn delete_subtask(&self, _id: &str) -> Result<(), AppError> {
            self.deletes.lock().unwrap().pop_front().unwrap_or(Ok(()))
        }
    }

    fn subtask(id: &str, deadline: &str) -> SubTask {
        SubTask {
            id: id.to_string(),
            task: format!("task {id}"),
            time_required: "1 hour".to_string(),
            deadline: deadline.to_string(),
            goal: "write report".to_string(),
            goal_id: "goal-1".to_string(),
            completed: false,
            completed_at: None,
            status: TaskStatus::Pending,
            motivation_tips: Vec::new(),
            checkpoints: Vec::new(),
            check_ins: Vec::new(),
        }
    }

    fn session(backend: ScriptedBackend) -> (BoardSession<ScriptedBackend>, Arc<ScriptedBackend>) {
        let backend = Arc::new(backend);
        (
            BoardSession::new(Arc::clone(&backend), Duration::from_secs(2)),
            backend,
        )
    }

    fn ids(session: &BoardSession<ScriptedBackend>) -> Vec<&str> {
        session.subtasks().iter().map(|task| task.id.as_str()).collect()
    }

    #[tokio::test]
    async fn submit_rejects_blank_goal_without_request() {
        let (mut session, backend) = session(ScriptedBackend::default());
        session.set_input("   ");

        let err = session.submit_goal().await.unwrap_err();

        assert_eq!(err.code(), "invalid_input");
        assert!(backend.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn submit_merges_returned_subtasks_at_front() {
        let backend = ScriptedBackend::default()
            .with_listing(Ok(vec![subtask("old", "2025-01-05")]))
            .with_submit(Ok(Some(vec![subtask("new", "2025-01-09")])));
        let (mut session, backend) = session(backend);
        session.refresh().await.unwrap();
        session.set_input("write report");

        let outcome = session.submit_goal().await.unwrap();

        assert!(matches!(outcome, SubmitOutcome::Merged(ref added) if added.len() == 1));
        assert_eq!(ids(&session), vec!["new", "old"]);
        assert_eq!(session.input(), "");
        assert!(!session.loading());
        assert_eq!(*backend.submitted.lock().unwrap(), vec!["write report".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn submit_without_returned_subtasks_refetches_immediately() {
        let backend = ScriptedBackend::default()
            .with_listing(Ok(Vec::new()))
            .with_listing(Ok(vec![subtask("fresh", "2025-01-01")]))
            .with_submit(Ok(None));
        let (mut session, backend) = session(backend);
        session.refresh().await.unwrap();
        session.set_input("learn rust");

        let outcome = session.submit_goal().await.unwrap();

        assert_eq!(outcome, SubmitOutcome::Refreshed);
        assert_eq!(backend.list_calls(), 2);
        assert_eq!(ids(&session), vec!["fresh"]);
    }

    #[tokio::test]
    async fn failed_submit_keeps_input_and_surfaces_message() {
        let backend =
            ScriptedBackend::default().with_submit(Err(AppError::http(400, "No goal provided")));
        let (mut session, _backend) = session(backend);
        session.set_input("write report");

        let err = session.submit_goal().await.unwrap_err();

        assert_eq!(err.status(), Some(400));
        assert_eq!(session.input(), "write report");
        assert_eq!(session.error(), Some("No goal provided"));
        assert!(!session.loading());
    }

    #[tokio::test]
    async fn failed_submit_over_network_uses_generic_message() {
        let backend = ScriptedBackend::default()
            .with_submit(Err(AppError::network("connection refused")));
        let (mut session, _backend) = session(backend);
        session.set_input("write report");

        session.submit_goal().await.unwrap_err();

        assert_eq!(session.error(), Some("Failed to submit task"));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_sorts_by_deadline() {
        let backend = ScriptedBackend::default().with_listing(Ok(vec![
            subtask("c", "2025-03-01"),
            subtask("a", "2025-01-01"),
            subtask("b", "2025-02-01T12:00:00Z"),
        ]));
        let (mut session, _backend) = session(backend);

        let outcome = session.refresh().await.unwrap();

        assert_eq!(outcome, RefreshOutcome::Applied(3));
        assert_eq!(ids(&session), vec!["a", "b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn refreshes_within_two_seconds_make_one_call() {
        let (mut session, backend) = session(ScriptedBackend::default());

        session.refresh().await.unwrap();
        tokio::time::advance(Duration::from_millis(1_500)).await;
        let second = session.refresh().await.unwrap();

        assert_eq!(second, RefreshOutcome::Skipped);
        assert_eq!(backend.list_calls(), 1);

        tokio::time::advance(Duration::from_millis(600)).await;
        session.refresh().await.unwrap();
        assert_eq!(backend.list_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_empties_list_and_retry_recovers() {
        let backend = ScriptedBackend::default()
            .with_listing(Ok(vec![subtask("a", "2025-01-01")]))
            .with_listing(Err(AppError::http(500, "Failed to fetch tasks")))
            .with_listing(Ok(vec![subtask("b", "2025-01-01")]));
        let (mut session, backend) = session(backend);
        session.refresh().await.unwrap();
        tokio::time::advance(Duration::from_secs(3)).await;

        session.refresh().await.unwrap_err();
        assert!(session.subtasks().is_empty());
        assert_eq!(session.error(), Some("Failed to fetch tasks"));

        let outcome = session.retry().await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Applied(1));
        assert_eq!(session.error(), None);
        assert_eq!(backend.list_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_listing_response_is_discarded() {
        let (mut session, _backend) = session(ScriptedBackend::default());
        let older = session.begin_refresh().unwrap();
        let newer = session.force_refresh();

        let applied = session
            .finish_refresh(newer, Ok(vec![subtask("new", "2025-01-01")]))
            .unwrap();
        let stale = session
            .finish_refresh(older, Ok(vec![subtask("old", "2025-01-01")]))
            .unwrap();

        assert_eq!(applied, RefreshOutcome::Applied(1));
        assert_eq!(stale, RefreshOutcome::Stale);
        assert_eq!(ids(&session), vec!["new"]);
        assert!(newer > older);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_failure_does_not_clear_list() {
        let (mut session, _backend) = session(ScriptedBackend::default());
        let older = session.begin_refresh().unwrap();
        let newer = session.force_refresh();
        session
            .finish_refresh(newer, Ok(vec![subtask("kept", "2025-01-01")]))
            .unwrap();

        let outcome = session
            .finish_refresh(older, Err(AppError::network("timed out")))
            .unwrap();

        assert_eq!(outcome, RefreshOutcome::Stale);
        assert_eq!(ids(&session), vec!["kept"]);
        assert_eq!(session.error(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn completed_check_in_updates_task_and_appends_record() {
        let feedback = CheckInFeedback {
            response: Some("Great".to_string()),
            suggestions: vec!["Celebrate".to_string()],
            motivation: Some("Onwards".to_string()),
        };
        let backend = ScriptedBackend::default()
            .with_listing(Ok(vec![subtask("a", "2025-01-01")]))
            .with_report(Ok(feedback.clone()));
        let (mut session, backend) = session(backend);
        session.refresh().await.unwrap();

        session.open_check_in("a").unwrap();
        session.set_check_in_status(TaskStatus::Completed).unwrap();
        session.set_check_in_reason("finished early").unwrap();
        let returned = session.submit_check_in().await.unwrap();

        let task = session.get("a").unwrap();
        assert_eq!(returned, feedback);
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.completed);
        assert!(task.completed_at.is_some());
        assert_eq!(task.check_ins.len(), 1);
        assert_eq!(task.check_ins[0].status, TaskStatus::Completed);
        assert_eq!(task.check_ins[0].reason.as_deref(), Some("finished early"));
        assert_eq!(task.check_ins[0].feedback.as_ref(), Some(&feedback));
        assert!(session.check_in().is_none());

        let reported = backend.reported.lock().unwrap();
        assert_eq!(reported[0].goal_id, "goal-1");
        assert_eq!(reported[0].task_id, "a");
    }

    #[tokio::test(start_paused = true)]
    async fn non_completed_check_in_clears_completion() {
        let mut done = subtask("a", "2025-01-01");
        done.completed = true;
        done.completed_at = Some("2025-01-01T00:00:00Z".to_string());
        done.status = TaskStatus::Completed;
        let backend = ScriptedBackend::default().with_listing(Ok(vec![done]));
        let (mut session, _backend) = session(backend);
        session.refresh().await.unwrap();

        session
            .record_check_in("a", TaskStatus::InProgress, Some("  "))
            .await
            .unwrap();

        let task = session.get("a").unwrap();
        assert!(!task.completed);
        assert_eq!(task.completed_at, None);
        assert_eq!(task.check_ins[0].reason, None);
        assert_eq!(task.check_ins[0].feedback, None);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_check_in_appends_nothing_and_closes_prompt() {
        let backend = ScriptedBackend::default()
            .with_listing(Ok(vec![subtask("a", "2025-01-01")]))
            .with_report(Err(AppError::http(404, "Subtask not found")));
        let (mut session, _backend) = session(backend);
        session.refresh().await.unwrap();
        session.open_check_in("a").unwrap();
        session.set_check_in_status(TaskStatus::Delayed).unwrap();

        let err = session.submit_check_in().await.unwrap_err();

        assert_eq!(err.status(), Some(404));
        let task = session.get("a").unwrap();
        assert!(task.check_ins.is_empty());
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(session.check_in().is_none());
        assert_eq!(session.error(), Some("Subtask not found"));
    }

    #[tokio::test]
    async fn check_in_rejects_unknown_task_and_pending_status() {
        let (mut session, _backend) = session(ScriptedBackend::default());
        assert_eq!(session.open_check_in("nope").unwrap_err().code(), "invalid_input");

        session.subtasks.push(subtask("a", "2025-01-01"));
        session.open_check_in("a").unwrap();
        let err = session.set_check_in_status(TaskStatus::Pending).unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }

    #[tokio::test(start_paused = true)]
    async fn delete_removes_only_that_entry() {
        let backend = ScriptedBackend::default().with_listing(Ok(vec![
            subtask("a", "2025-01-01"),
            subtask("b", "2025-01-02"),
            subtask("c", "2025-01-03"),
        ]));
        let (mut session, _backend) = session(backend);
        session.refresh().await.unwrap();
        session.open_check_in("b").unwrap();

        let removed = session.delete("b").await.unwrap();

        assert_eq!(removed.map(|task| task.id), Some("b".to_string()));
        assert_eq!(ids(&session), vec!["a", "c"]);
        assert!(session.check_in().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_delete_leaves_list_unchanged() {
        let backend = ScriptedBackend::default()
            .with_listing(Ok(vec![subtask("a", "2025-01-01"), subtask("b", "2025-01-02")]))
            .with_delete(Err(AppError::network("connection reset")));
        let (mut session, _backend) = session(backend);
        session.refresh().await.unwrap();

        session.delete("a").await.unwrap_err();

        assert_eq!(ids(&session), vec!["a", "b"]);
        assert!(session.error().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn overdue_scan_prompts_first_overdue_in_list_order() {
        let now = OffsetDateTime::now_utc();
        let yesterday = (now - time::Duration::days(1)).date().to_string();
        let last_week = (now - time::Duration::days(7)).date().to_string();
        let tomorrow = (now + time::Duration::days(1)).date().to_string();
        let mut finished = subtask("finished", &last_week);
        finished.completed = true;
        finished.status = TaskStatus::Completed;

        let backend = ScriptedBackend::default().with_listing(Ok(vec![
            subtask("later", &tomorrow),
            subtask("late", &yesterday),
            finished,
        ]));
        let (mut session, _backend) = session(backend);

        let prompted = session.scan_overdue(now).await.unwrap();

        assert_eq!(prompted.map(|task| task.id), Some("late".to_string()));
        assert_eq!(session.check_in().map(|draft| draft.task_id.as_str()), Some("late"));
        assert!(session.prompt_overdue(now).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn added_task_due_yesterday_sorts_first_after_refresh() {
        let now = OffsetDateTime::now_utc();
        let tomorrow = (now + time::Duration::days(1)).date().to_string();
        let yesterday = (now - time::Duration::days(1)).date().to_string();
        let report = subtask("report", &tomorrow);
        let slides = subtask("slides", &yesterday);

        let backend = ScriptedBackend::default()
            .with_listing(Ok(Vec::new()))
            .with_submit(Ok(Some(vec![report.clone()])))
            .with_submit(Ok(Some(vec![slides.clone()])))
            .with_listing(Ok(vec![report, slides]));
        let (mut session, _backend) = session(backend);
        session.refresh().await.unwrap();

        session.set_input("write report");
        session.submit_goal().await.unwrap();
        assert_eq!(session.subtasks().len(), 1);

        session.set_input("prepare slides");
        session.submit_goal().await.unwrap();
        tokio::time::advance(Duration::from_secs(60)).await;
        session.refresh().await.unwrap();

        assert_eq!(ids(&session), vec!["slides", "report"]);
        assert_eq!(
            session.first_overdue(now).map(|task| task.id.as_str()),
            Some("slides")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn listing_issued_before_check_in_cannot_undo_it() {
        let backend = ScriptedBackend::default().with_listing(Ok(vec![subtask("a", "2025-01-01")]));
        let (mut session, _backend) = session(backend);
        session.retry().await.unwrap();
        let inflight = session.force_refresh();

        session
            .record_check_in("a", TaskStatus::Completed, None)
            .await
            .unwrap();
        let outcome = session
            .finish_refresh(inflight, Ok(vec![subtask("a", "2025-01-01")]))
            .unwrap();

        assert_eq!(outcome, RefreshOutcome::Stale);
        let task = session.get("a").unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.check_ins.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn listing_issued_before_delete_cannot_restore_entry() {
        let backend = ScriptedBackend::default()
            .with_listing(Ok(vec![subtask("a", "2025-01-01"), subtask("b", "2025-01-02")]));
        let (mut session, _backend) = session(backend);
        session.retry().await.unwrap();
        let inflight = session.force_refresh();

        session.delete("a").await.unwrap();
        let outcome = session
            .finish_refresh(
                inflight,
                Ok(vec![subtask("a", "2025-01-01"), subtask("b", "2025-01-02")]),
            )
            .unwrap();

        assert_eq!(outcome, RefreshOutcome::Stale);
        assert_eq!(ids(&session), vec!["b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn listing_issued_before_submit_cannot_drop_merged_subtasks() {
        let backend = ScriptedBackend::default()
            .with_listing(Ok(vec![subtask("old", "2025-01-05")]))
            .with_submit(Ok(Some(vec![subtask("new", "2025-01-09")])));
        let (mut session, _backend) = session(backend);
        session.retry().await.unwrap();
        let inflight = session.force_refresh();

        session.set_input("write report");
        session.submit_goal().await.unwrap();
        let outcome = session
            .finish_refresh(inflight, Ok(vec![subtask("old", "2025-01-05")]))
            .unwrap();

        assert_eq!(outcome, RefreshOutcome::Stale);
        assert_eq!(ids(&session), vec!["new", "old"]);
    }

    #[tokio::test(start_paused = true)]
    async fn listing_issued_after_mutation_still_applies() {
        let backend = ScriptedBackend::default().with_listing(Ok(vec![subtask("a", "2025-01-01")]));
        let (mut session, _backend) = session(backend);
        session.retry().await.unwrap();

        session.delete("a").await.unwrap();
        let ticket = session.force_refresh();
        let outcome = session
            .finish_refresh(ticket, Ok(vec![subtask("c", "2025-01-03")]))
            .unwrap();

        assert_eq!(outcome, RefreshOutcome::Applied(1));
        assert_eq!(ids(&session), vec!["c"]);
    }
}
