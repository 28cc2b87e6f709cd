use crate::error::AppError;
use crate::model::SubTask;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use linux::LinuxNotifier;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::WindowsNotifier;

const APP_NAME: &str = "pk";
const DISABLE_ENV_VAR: &str = "PK_DISABLE_NOTIFICATIONS";

/// Surfaces an overdue sub-task outside the terminal.
pub trait Notifier: Send + Sync {
    fn notify(&self, task: &SubTask) -> Result<(), AppError>;

    fn notify_with_action(&self, task: &SubTask, action: &str) -> Result<(), AppError> {
        let _ = action;
        self.notify(task)
    }
}

pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _task: &SubTask) -> Result<(), AppError> {
        Ok(())
    }
}

pub fn notifier_from_env() -> Result<Box<dyn Notifier>, AppError> {
    if std::env::var(DISABLE_ENV_VAR).is_ok() {
        return Ok(Box::new(NoopNotifier));
    }

    match platform_notifier() {
        Ok(notifier) => Ok(notifier),
        Err(err) => match err {
            AppError::InvalidData(_) => Ok(Box::new(NoopNotifier)),
            other => Err(other),
        },
    }
}

/// Title and body used for an overdue prompt.
pub fn prompt_text(task: &SubTask) -> (String, String) {
    let title = format!("{APP_NAME}: are you working on this?");
    let body = if task.deadline.trim().is_empty() {
        task.task.clone()
    } else {
        format!("{} (due {})", task.task, task.deadline)
    };
    (title, body)
}

const ACTION_PREFIX: &str = "show:";

pub fn activation_argument(task_id: &str) -> String {
    format!("{ACTION_PREFIX}{task_id}")
}

pub fn parse_activation_argument(argument: &str) -> Option<String> {
    argument
        .strip_prefix(ACTION_PREFIX)
        .filter(|id| !id.is_empty())
        .map(|id| id.to_string())
}

/// Opens the sub-task in a new `pk show` process.
pub fn launch_show(task_id: &str) -> Result<(), AppError> {
    let exe = std::env::current_exe().map_err(|err| AppError::io(err.to_string()))?;
    std::process::Command::new(exe)
        .arg("show")
        .arg(task_id)
        .spawn()
        .map_err(|err| AppError::io(err.to_string()))?;
    Ok(())
}

/// Runs `launch` for a clicked notification; failures are logged, since
/// there is no terminal to report them to. Returns whether it succeeded.
pub(crate) fn open_activated<F>(task_id: &str, launch: F) -> bool
where
    F: FnOnce(&str) -> Result<(), AppError>,
{
    match launch(task_id) {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(task_id, error = %err, "could not open sub-task");
            false
        }
    }
}

#[cfg(target_os = "linux")]
pub fn platform_notifier() -> Result<Box<dyn Notifier>, AppError> {
    Ok(Box::new(LinuxNotifier))
}

#[cfg(windows)]
pub fn platform_notifier() -> Result<Box<dyn Notifier>, AppError> {
    Ok(Box::new(WindowsNotifier))
}

#[cfg(not(any(target_os = "linux", windows)))]
pub fn platform_notifier() -> Result<Box<dyn Notifier>, AppError> {
    Err(AppError::invalid_data(
        "notifications are not supported on this platform",
    ))
}
