//! Timers and background fetches for a live board.

use crate::api::TaskBackend;
use crate::error::AppError;
use crate::model::SubTask;
use crate::session::RefreshTicket;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Refresh,
    OverdueScan,
}

/// The periodic refresh and the periodic overdue scan. Neither fires at
/// start-up; the initial load happens when the board is opened.
pub struct PollTimers {
    refresh: Interval,
    overdue: Interval,
}

impl PollTimers {
    pub fn new(refresh_every: Duration, scan_every: Duration) -> Self {
        let now = Instant::now();
        let mut refresh = interval_at(now + refresh_every, refresh_every);
        let mut overdue = interval_at(now + scan_every, scan_every);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);
        overdue.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { refresh, overdue }
    }

    pub async fn next(&mut self) -> Tick {
        tokio::select! {
            biased;
            _ = self.overdue.tick() => Tick::OverdueScan,
            _ = self.refresh.tick() => Tick::Refresh,
        }
    }
}

/// Why a background listing request was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPurpose {
    Refresh,
    OverdueScan,
}

#[derive(Debug)]
pub struct FetchResult {
    pub ticket: RefreshTicket,
    pub purpose: FetchPurpose,
    pub result: Result<Vec<SubTask>, AppError>,
}

/// Runs a listing request off the event loop; the result comes back through
/// the join set and is applied with its ticket.
pub fn spawn_fetch<B>(
    fetches: &mut JoinSet<FetchResult>,
    backend: Arc<B>,
    ticket: RefreshTicket,
    purpose: FetchPurpose,
) where
    B: TaskBackend + 'static,
{
    fetches.spawn(async move {
        let result = backend.list_subtasks().await;
        FetchResult {
            ticket,
            purpose,
            result,
        }
    });
}
