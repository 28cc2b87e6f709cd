//! The live board: periodic refreshes, overdue prompts and typed commands.

use crate::cli::{WatchCommand, WatchLine, normalize_parse_error, split_command_line};
use crate::render;
use clap::{CommandFactory, Parser};
use pk_core::api::TaskBackend;
use pk_core::config::{Config, Palette};
use pk_core::error::AppError;
use pk_core::model::TaskStatus;
use pk_core::notify::{Notifier, activation_argument};
use pk_core::poll::{FetchPurpose, FetchResult, PollTimers, Tick, spawn_fetch};
use pk_core::session::{BoardSession, RefreshOutcome, SubmitOutcome};
use time::OffsetDateTime;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct Board<'a, B> {
    pub session: BoardSession<B>,
    pub notifier: &'a dyn Notifier,
    pub palette: Palette,
}

enum Flow {
    Continue,
    Exit,
}

impl<B> Board<'_, B>
where
    B: TaskBackend + 'static,
{
    /// Runs until `exit`, end of input or cancellation.
    pub async fn run<R>(
        &mut self,
        config: &Config,
        input: R,
        cancel: CancellationToken,
    ) -> Result<(), AppError>
    where
        R: AsyncBufRead + Unpin,
    {
        match self.session.retry().await {
            Ok(_) => self.print_list(),
            Err(err) => render::print_error_panel(err.message(), &self.palette),
        }

        let mut timers = PollTimers::new(config.refresh_interval(), config.check_in_interval());
        let mut fetches: JoinSet<FetchResult> = JoinSet::new();
        let mut lines = input.lines();
        info!(
            refresh_secs = config.refresh_interval_secs,
            check_in_secs = config.check_in_interval_secs,
            "board open"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                tick = timers.next() => self.on_tick(tick, &mut fetches),
                Some(joined) = fetches.join_next(), if !fetches.is_empty() => {
                    self.on_fetch(joined);
                }
                line = lines.next_line() => {
                    let line = line.map_err(|err| AppError::io(err.to_string()))?;
                    let Some(line) = line else { break };
                    if let Flow::Exit = self.on_line(line.trim()).await {
                        break;
                    }
                }
            }
        }

        fetches.shutdown().await;
        info!("board closed");
        Ok(())
    }

    fn on_tick(&mut self, tick: Tick, fetches: &mut JoinSet<FetchResult>) {
        let purpose = match tick {
            Tick::Refresh => FetchPurpose::Refresh,
            Tick::OverdueScan => FetchPurpose::OverdueScan,
        };
        match self.session.begin_refresh() {
            Some(ticket) => {
                debug!(?purpose, ticket = ticket.sequence(), "background fetch");
                spawn_fetch(fetches, self.session.backend(), ticket, purpose);
            }
            // Too soon after the last load; the cache is fresh enough to scan.
            None if purpose == FetchPurpose::OverdueScan => self.prompt_overdue(),
            None => {}
        }
    }

    fn on_fetch(&mut self, joined: Result<FetchResult, JoinError>) {
        let fetched = match joined {
            Ok(fetched) => fetched,
            Err(err) => {
                warn!(error = %err, "background fetch did not finish");
                return;
            }
        };

        let before = self.session.subtasks().to_vec();
        match self.session.finish_refresh(fetched.ticket, fetched.result) {
            Ok(RefreshOutcome::Applied(_)) => {
                if before.as_slice() != self.session.subtasks() {
                    self.print_list();
                }
            }
            Ok(_) => {}
            Err(err) => {
                render::print_error_panel(err.message(), &self.palette);
                return;
            }
        }

        if fetched.purpose == FetchPurpose::OverdueScan {
            self.prompt_overdue();
        }
    }

    fn prompt_overdue(&mut self) {
        let now = OffsetDateTime::now_utc();
        let Some(task) = self.session.prompt_overdue(now) else {
            return;
        };
        render::print_prompt(&task, &self.palette, now);
        if let Err(err) = self
            .notifier
            .notify_with_action(&task, &activation_argument(&task.id))
        {
            warn!(task_id = %task.id, error = %err, "notification failed");
        }
    }

    async fn on_line(&mut self, line: &str) -> Flow {
        if line.is_empty() {
            return Flow::Continue;
        }
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            return Flow::Exit;
        }
        if line == "help" || line == "?" {
            println!("{}", WatchLine::command().render_help());
            return Flow::Continue;
        }

        let parsed = split_command_line(line).and_then(|args| {
            let argv = std::iter::once("pk".to_string()).chain(args);
            WatchLine::try_parse_from(argv).map_err(normalize_parse_error)
        });
        let result = match parsed {
            Ok(parsed) => self.run_command(parsed.command).await,
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            eprintln!("ERROR: {err}");
        }
        Flow::Continue
    }

    async fn run_command(&mut self, command: WatchCommand) -> Result<(), AppError> {
        let now = OffsetDateTime::now_utc();
        match command {
            WatchCommand::Add { goal } => {
                self.session.set_input(&goal.join(" "));
                match self.session.submit_goal().await? {
                    SubmitOutcome::Merged(added) => {
                        println!("Added {} sub-task(s)", added.len());
                        self.print_list();
                    }
                    SubmitOutcome::Refreshed => match self.session.error() {
                        Some(message) => render::print_error_panel(message, &self.palette),
                        None => self.print_list(),
                    },
                }
            }
            WatchCommand::List => match self.session.error() {
                Some(message) => render::print_error_panel(message, &self.palette),
                None => self.print_list(),
            },
            WatchCommand::Show { id } => {
                let task = self
                    .session
                    .get(id.trim())
                    .ok_or_else(|| AppError::invalid_input("task not found"))?;
                render::print_subtask_detail(task, &self.palette, now);
            }
            WatchCommand::CheckIn { id, status, reason } => {
                let status: TaskStatus = status.parse()?;
                let reason = reason.join(" ");
                let feedback = self
                    .session
                    .record_check_in(&id, status, Some(reason.as_str()))
                    .await?;
                println!("Checked in: {id} ({status})");
                render::print_feedback(&feedback, &self.palette);
            }
            WatchCommand::Delete { id } => {
                let removed = self.session.delete(&id).await?;
                match removed {
                    Some(task) => println!("Deleted: {} ({})", task.task, task.id),
                    None => println!("Deleted: {}", id.trim()),
                }
            }
            WatchCommand::Retry => match self.session.retry().await {
                Ok(_) => self.print_list(),
                Err(err) => render::print_error_panel(err.message(), &self.palette),
            },
            WatchCommand::Yes => self.answer(TaskStatus::InProgress, "").await?,
            WatchCommand::No { reason } => {
                let reason = reason.join(" ");
                if reason.trim().is_empty() {
                    return Err(AppError::invalid_input("say why: no <reason>"));
                }
                self.answer(TaskStatus::Delayed, &reason).await?
            }
            WatchCommand::Done => self.answer(TaskStatus::Completed, "").await?,
            WatchCommand::Skip => {
                if self.session.check_in().is_none() {
                    return Err(AppError::invalid_input("no check-in is open"));
                }
                self.session.close_check_in();
                println!("Prompt dismissed");
            }
        }
        Ok(())
    }

    async fn answer(&mut self, status: TaskStatus, reason: &str) -> Result<(), AppError> {
        self.session.set_check_in_status(status)?;
        self.session.set_check_in_reason(reason)?;
        let feedback = self.session.submit_check_in().await?;
        println!("Checked in ({status})");
        render::print_feedback(&feedback, &self.palette);
        Ok(())
    }

    fn print_list(&self) {
        render::print_subtasks_plain(self.session.subtasks(), &self.palette, OffsetDateTime::now_utc());
    }
}
