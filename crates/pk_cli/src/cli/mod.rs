use clap::{Parser, Subcommand};
use pk_core::config::{CheckInRoute, ConfigOverrides, SubmitRoute, canonical_key};
use pk_core::error::AppError;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Override configuration values (format KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit a goal and get it broken into sub-tasks
    ///
    /// Example: pk add "Write the quarterly report"
    Add { goal: Option<String> },
    /// List sub-tasks, soonest deadline first
    ///
    /// Example: pk list
    /// Example: pk list --overdue
    List {
        /// Only show sub-tasks past their deadline
        #[arg(long)]
        overdue: bool,
    },
    /// Show a sub-task with its tips, checkpoints and check-in history
    ///
    /// Example: pk show 665f1c
    Show { id: String },
    /// Report progress on a sub-task
    ///
    /// Example: pk check-in 665f1c completed
    /// Example: pk check-in 665f1c delayed "waiting on data"
    CheckIn {
        id: String,
        /// completed, in_progress or delayed
        status: String,
        reason: Option<String>,
        #[arg(short = 'r', long = "reason", value_name = "REASON")]
        reason_flag: Option<String>,
    },
    /// Delete a sub-task
    ///
    /// Example: pk delete 665f1c
    Delete { id: String },
    /// Find the first overdue sub-task
    ///
    /// Example: pk overdue
    Overdue,
    /// Keep the board open: refresh periodically and prompt for overdue work
    ///
    /// Example: pk watch
    Watch,
}

/// Commands accepted on stdin while `pk watch` is running.
#[derive(Parser, Debug)]
#[command(name = "pk", disable_version_flag = true)]
pub struct WatchLine {
    #[command(subcommand)]
    pub command: WatchCommand,
}

#[derive(Subcommand, Debug)]
pub enum WatchCommand {
    /// Submit a goal
    Add {
        #[arg(required = true, num_args = 1..)]
        goal: Vec<String>,
    },
    /// Print the current list
    List,
    /// Show one sub-task
    Show { id: String },
    /// Report progress on a sub-task
    CheckIn {
        id: String,
        status: String,
        reason: Vec<String>,
    },
    /// Delete a sub-task
    Delete { id: String },
    /// Reload the list now
    Retry,
    /// Answer the open prompt: still working on it
    Yes,
    /// Answer the open prompt: not working on it, and why
    No {
        #[arg(required = true, num_args = 1..)]
        reason: Vec<String>,
    },
    /// Answer the open prompt: finished
    Done,
    /// Dismiss the open prompt
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOverrideTarget {
    BaseUrl,
    SubmitRoute,
    CheckInRoute,
    RefreshInterval,
    CheckInInterval,
    MinRefreshGap,
    RequestTimeout,
    Theme,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConfigOverride {
    pub target: ConfigOverrideTarget,
    pub value: String,
}

/// Parse a raw `KEY=VALUE` override string into a structured target.
pub fn parse_config_override(raw: &str) -> Result<ParsedConfigOverride, String> {
    let trimmed = raw.trim();
    let (key_raw, value_raw) = trimmed
        .split_once('=')
        .ok_or_else(|| "override must be in KEY=VALUE format".to_string())?;

    let field = canonical_key(key_raw);
    if field.is_empty() {
        return Err("override key cannot be empty".to_string());
    }

    let target = match field.as_str() {
        "base_url" | "url" | "backend" => ConfigOverrideTarget::BaseUrl,
        "submit_route" => ConfigOverrideTarget::SubmitRoute,
        "check_in_route" => ConfigOverrideTarget::CheckInRoute,
        "refresh_interval" | "refresh_interval_secs" => ConfigOverrideTarget::RefreshInterval,
        "check_in_interval" | "check_in_interval_secs" => ConfigOverrideTarget::CheckInInterval,
        "min_refresh_gap" | "min_refresh_gap_ms" => ConfigOverrideTarget::MinRefreshGap,
        "request_timeout" | "request_timeout_secs" => ConfigOverrideTarget::RequestTimeout,
        "theme" => ConfigOverrideTarget::Theme,
        other => return Err(format!("unknown config field '{other}'")),
    };

    Ok(ParsedConfigOverride {
        target,
        value: value_raw.trim().to_string(),
    })
}

/// Folds every `--config-override` into one set of overrides; later values win.
pub fn collect_config_overrides(raw: &[String]) -> Result<ConfigOverrides, String> {
    let mut overrides = ConfigOverrides::default();

    for entry in raw {
        let parsed = parse_config_override(entry)?;
        let value = parsed.value;
        match parsed.target {
            ConfigOverrideTarget::BaseUrl => overrides.base_url = Some(value),
            ConfigOverrideTarget::SubmitRoute => {
                overrides.submit_route =
                    Some(SubmitRoute::parse(&value).map_err(|err| err.message().to_string())?);
            }
            ConfigOverrideTarget::CheckInRoute => {
                overrides.check_in_route =
                    Some(CheckInRoute::parse(&value).map_err(|err| err.message().to_string())?);
            }
            ConfigOverrideTarget::RefreshInterval => {
                overrides.refresh_interval_secs = Some(parse_number(&value)?);
            }
            ConfigOverrideTarget::CheckInInterval => {
                overrides.check_in_interval_secs = Some(parse_number(&value)?);
            }
            ConfigOverrideTarget::MinRefreshGap => {
                overrides.min_refresh_gap_ms = Some(parse_number(&value)?);
            }
            ConfigOverrideTarget::RequestTimeout => {
                overrides.request_timeout_secs = Some(parse_number(&value)?);
            }
            ConfigOverrideTarget::Theme => overrides.theme = Some(value),
        }
    }

    Ok(overrides)
}

fn parse_number(value: &str) -> Result<u64, String> {
    value
        .parse::<u64>()
        .map_err(|_| format!("'{value}' is not a whole number"))
}

/// Keeps only the first line of clap's rendered error.
pub fn normalize_parse_error(err: clap::Error) -> AppError {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
    let message = first_line.strip_prefix("error: ").unwrap_or(first_line);
    AppError::invalid_input(message)
}

/// Splits a typed line into arguments. Double quotes group words and `\"`
/// escapes a quote inside them.
pub fn split_command_line(line: &str) -> Result<Vec<String>, AppError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escape = false;

    for ch in line.chars() {
        if escape {
            if ch != '"' && ch != '\\' {
                current.push('\\');
            }
            current.push(ch);
            escape = false;
            continue;
        }

        match ch {
            '\\' if in_quotes => escape = true,
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }

    if in_quotes {
        return Err(AppError::invalid_input("unterminated quote in command"));
    }
    if !current.is_empty() {
        args.push(current);
    }

    Ok(args)
}
