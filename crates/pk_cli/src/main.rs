use clap::Parser;
use pk_cli::cli::{Cli, Command, collect_config_overrides, normalize_parse_error};
use pk_cli::render;
use pk_cli::watch::Board;
use pk_core::api::ApiClient;
use pk_core::config::{Config, Palette, load_config_with_fallback, merge_overrides, palette_for_theme};
use pk_core::error::AppError;
use pk_core::model::TaskStatus;
use pk_core::notify::{activation_argument, notifier_from_env};
use pk_core::session::{BoardSession, SubmitOutcome};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const LOG_ENV_VAR: &str = "PK_LOG";

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

fn resolve_config(cli: &Cli) -> Result<Config, AppError> {
    let load = load_config_with_fallback();
    if let Some(err) = load.error {
        eprintln!("WARNING: using default config ({err})");
    }
    let overrides = collect_config_overrides(&cli.config_override).map_err(AppError::invalid_input)?;
    Ok(merge_overrides(&load.config, &overrides))
}

async fn run_command(cli: Cli) -> Result<(), AppError> {
    let config = resolve_config(&cli)?;
    let palette = palette_for_theme(config.theme.as_deref());
    let api = Arc::new(ApiClient::new(&config)?);
    info!(base_url = api.base_url(), "backend configured");
    let mut session = BoardSession::new(api, config.min_refresh_gap());
    let now = OffsetDateTime::now_utc();

    match cli.command.unwrap_or(Command::Watch) {
        Command::Add { goal } => {
            let goal = match goal {
                Some(value) if !value.trim().is_empty() => value,
                _ => return Err(AppError::invalid_input("goal is required")),
            };

            session.set_input(&goal);
            match session.submit_goal().await? {
                SubmitOutcome::Merged(added) => {
                    if cli.json {
                        render::print_subtasks_json(&added);
                    } else {
                        println!("Added {} sub-task(s) for: {}", added.len(), goal.trim());
                        render::print_subtasks_plain(&added, &palette, now);
                    }
                }
                SubmitOutcome::Refreshed => {
                    if let Some(message) = session.error() {
                        warn!(error = message, "goal submitted but the list could not be reloaded");
                    }
                    if cli.json {
                        render::print_subtasks_json(session.subtasks());
                    } else {
                        println!("Submitted goal: {}", goal.trim());
                        render::print_subtasks_plain(session.subtasks(), &palette, now);
                    }
                }
            }
        }
        Command::List { overdue } => {
            session.retry().await?;
            let tasks: Vec<_> = session
                .subtasks()
                .iter()
                .filter(|task| !overdue || task.is_overdue(now))
                .cloned()
                .collect();
            if cli.json {
                render::print_subtasks_json(&tasks);
            } else {
                render::print_subtasks_plain(&tasks, &palette, now);
            }
        }
        Command::Show { id } => {
            session.retry().await?;
            let task = session
                .get(id.trim())
                .ok_or_else(|| AppError::invalid_input("task not found"))?;
            if cli.json {
                println!("{}", serde_json::json!(task));
            } else {
                render::print_subtask_detail(task, &palette, now);
            }
        }
        Command::CheckIn {
            id,
            status,
            reason,
            reason_flag,
        } => {
            let status: TaskStatus = status.parse()?;
            let reason = reason.or(reason_flag);
            session.retry().await?;
            let feedback = session
                .record_check_in(&id, status, reason.as_deref())
                .await?;
            let task = session
                .get(id.trim())
                .ok_or_else(|| AppError::invalid_input("task not found"))?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({ "task": task, "feedback": feedback })
                );
            } else {
                println!("Checked in: {} ({})", task.task, render::status_label(task.status));
                render::print_feedback(&feedback, &palette);
            }
        }
        Command::Delete { id } => {
            let removed = session.delete(&id).await?;
            if cli.json {
                println!("{}", serde_json::json!({ "deleted": id.trim(), "task": removed }));
            } else {
                println!("Deleted sub-task: {}", id.trim());
            }
        }
        Command::Overdue => {
            session.retry().await?;
            match session.prompt_overdue(now) {
                Some(task) => {
                    if cli.json {
                        println!("{}", serde_json::json!(task));
                    } else {
                        render::print_prompt(&task, &palette, now);
                    }
                    let notifier = notifier_from_env()?;
                    if let Err(err) = notifier.notify_with_action(&task, &activation_argument(&task.id)) {
                        warn!(task_id = %task.id, error = %err, "notification failed");
                    }
                }
                None if cli.json => println!("null"),
                None => println!("No overdue sub-tasks."),
            }
        }
        Command::Watch => run_watch(session, &config, palette).await?,
    }

    Ok(())
}

async fn run_watch(
    session: BoardSession<ApiClient>,
    config: &Config,
    palette: Palette,
) -> Result<(), AppError> {
    let notifier = notifier_from_env()?;
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let mut board = Board {
        session,
        notifier: notifier.as_ref(),
        palette,
    };
    board
        .run(config, BufReader::new(tokio::io::stdin()), cancel.clone())
        .await?;

    // The blocking stdin read cannot be interrupted and would hold the
    // runtime open until the next newline.
    if cancel.is_cancelled() {
        std::process::exit(0);
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if !err.use_stderr() => {
            // --help and --version
            let _ = err.print();
            return;
        }
        Err(err) => {
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    if let Err(err) = run_command(cli).await {
        eprintln!("ERROR: {err}");
        std::process::exit(1);
    }
}
