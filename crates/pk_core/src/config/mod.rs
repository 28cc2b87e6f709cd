use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_ENV_VAR: &str = "PK_CONFIG_PATH";
const BACKEND_ENV_VAR: &str = "PK_BACKEND_URL";

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

#[derive(Debug, Clone)]
pub struct Palette {
    pub accent: &'static str,
    pub muted: &'static str,
    pub warn: &'static str,
    pub reset: &'static str,
}

impl Palette {
    pub fn accentize(&self, text: &str) -> String {
        paint(self.accent, self.reset, text)
    }

    pub fn mutedize(&self, text: &str) -> String {
        paint(self.muted, self.reset, text)
    }

    pub fn warnize(&self, text: &str) -> String {
        paint(self.warn, self.reset, text)
    }
}

fn paint(color: &str, reset: &str, text: &str) -> String {
    if color.is_empty() {
        text.to_string()
    } else {
        format!("{color}{text}{reset}")
    }
}

pub fn palette_for_theme(theme: Option<&str>) -> Palette {
    match theme.and_then(canonical_theme_name).as_deref() {
        Some("noir") => Palette {
            accent: "\x1b[38;5;208m",
            muted: "\x1b[38;5;250m",
            warn: "\x1b[38;5;196m",
            reset: "\x1b[0m",
        },
        Some("solarized") => Palette {
            accent: "\x1b[38;5;108m",
            muted: "\x1b[38;5;250m",
            warn: "\x1b[38;5;166m",
            reset: "\x1b[0m",
        },
        _ => Palette {
            accent: "",
            muted: "",
            warn: "",
            reset: "",
        },
    }
}

pub fn canonical_theme_name(raw: &str) -> Option<String> {
    let trimmed = canonical_key(raw);
    if trimmed.is_empty() {
        return Some("default".into());
    }

    match trimmed.as_str() {
        "vanilla" | "light" => Some("default".to_string()),
        "dark" | "dark_mode" | "darkmode" => Some("noir".to_string()),
        _ => Some(trimmed),
    }
}

/// Lowercases and collapses any run of non-alphanumerics into one `_`.
pub fn canonical_key(raw: &str) -> String {
    let mut cleaned = String::new();
    let mut previous_underscore = false;

    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch.to_ascii_lowercase());
            previous_underscore = false;
        } else if !previous_underscore && !cleaned.is_empty() {
            cleaned.push('_');
            previous_underscore = true;
        }
    }

    cleaned.trim_matches('_').to_string()
}

/// Endpoint used to turn a goal into sub-tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmitRoute {
    #[default]
    AddTask,
    Breakdown,
}

impl SubmitRoute {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match canonical_key(raw).as_str() {
            "add_task" | "add" => Ok(Self::AddTask),
            "breakdown" => Ok(Self::Breakdown),
            other => Err(AppError::invalid_input(format!(
                "unknown submit route '{other}' (expected add-task or breakdown)"
            ))),
        }
    }
}

/// Endpoint used to report progress on a sub-task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckInRoute {
    #[default]
    Status,
    Reason,
}

impl CheckInRoute {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match canonical_key(raw).as_str() {
            "status" | "check_in" => Ok(Self::Status),
            "reason" | "analyze_reason" => Ok(Self::Reason),
            other => Err(AppError::invalid_input(format!(
                "unknown check-in route '{other}' (expected status or reason)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub submit_route: SubmitRoute,
    pub check_in_route: CheckInRoute,
    pub refresh_interval_secs: u64,
    pub check_in_interval_secs: u64,
    pub min_refresh_gap_ms: u64,
    pub request_timeout_secs: u64,
    pub theme: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            submit_route: SubmitRoute::default(),
            check_in_route: CheckInRoute::default(),
            refresh_interval_secs: 60,
            check_in_interval_secs: 120,
            min_refresh_gap_ms: 2_000,
            request_timeout_secs: 30,
            theme: None,
        }
    }
}

impl Config {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn check_in_interval(&self) -> Duration {
        Duration::from_secs(self.check_in_interval_secs.max(1))
    }

    pub fn min_refresh_gap(&self) -> Duration {
        Duration::from_millis(self.min_refresh_gap_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub error: Option<AppError>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub submit_route: Option<SubmitRoute>,
    pub check_in_route: Option<CheckInRoute>,
    pub refresh_interval_secs: Option<u64>,
    pub check_in_interval_secs: Option<u64>,
    pub min_refresh_gap_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub theme: Option<String>,
}

pub fn config_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata).join("pk").join(CONFIG_FILE_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("pk")
            .join(CONFIG_FILE_NAME))
    }
}

pub fn load_config() -> Result<Config, AppError> {
    let path = config_path()?;
    let config = if path.exists() {
        load_config_from_path(&path)?
    } else {
        Config::default()
    };
    Ok(apply_env(config))
}

/// Loads the config, falling back to defaults and reporting (not failing on)
/// an unreadable file. `PK_BACKEND_URL` is applied on top either way.
pub fn load_config_with_fallback() -> ConfigLoad {
    let mut load = match config_path() {
        Ok(path) => load_config_with_fallback_from_path(&path),
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    };
    load.config = apply_env(load.config);
    load
}

fn load_config_with_fallback_from_path(path: &Path) -> ConfigLoad {
    if !path.exists() {
        return ConfigLoad {
            config: Config::default(),
            error: None,
        };
    }

    match load_config_from_path(path) {
        Ok(config) => ConfigLoad {
            config,
            error: None,
        },
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_from_path(path: &Path) -> Result<Config, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
    let config: Config = serde_json::from_str(&content).map_err(|err| {
        AppError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err))
    })?;
    Ok(normalize_config(config))
}

fn apply_env(mut config: Config) -> Config {
    if let Ok(url) = std::env::var(BACKEND_ENV_VAR)
        && !url.trim().is_empty()
    {
        config.base_url = normalize_base_url(&url);
    }
    config
}

fn normalize_config(mut config: Config) -> Config {
    config.theme = config.theme.and_then(|name| canonical_theme_name(&name));
    config.base_url = normalize_base_url(&config.base_url);
    config
}

fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_BASE_URL.to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn merge_overrides(base: &Config, overrides: &ConfigOverrides) -> Config {
    let mut merged = base.clone();
    if let Some(url) = overrides.base_url.as_deref() {
        merged.base_url = normalize_base_url(url);
    }
    if let Some(route) = overrides.submit_route {
        merged.submit_route = route;
    }
    if let Some(route) = overrides.check_in_route {
        merged.check_in_route = route;
    }
    if let Some(secs) = overrides.refresh_interval_secs {
        merged.refresh_interval_secs = secs;
    }
    if let Some(secs) = overrides.check_in_interval_secs {
        merged.check_in_interval_secs = secs;
    }
    if let Some(ms) = overrides.min_refresh_gap_ms {
        merged.min_refresh_gap_ms = ms;
    }
    if let Some(secs) = overrides.request_timeout_secs {
        merged.request_timeout_secs = secs;
    }
    if let Some(theme) = overrides.theme.as_ref()
        && let Some(normalized) = canonical_theme_name(theme)
    {
        merged.theme = Some(normalized);
    }

    merged
}
