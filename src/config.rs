use std::env::VarError;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};

use crate::domain::todo::UserId;

pub const DEFAULT_API_URL: &str = "https://mate.academy/students-api";
const API_URL_ENV: &str = "TODOS_API_URL";
const USER_ID_ENV: &str = "TODOS_USER_ID";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    /// `None` when nothing usable was configured; the UI then shows a warning
    /// instead of talking to the service.
    pub user_id: Option<UserId>,
    pub timeout: Duration,
    pub tick: Duration,
    pub demo: bool,
    pub log_file: PathBuf,
}

/// Command-line values before environment fallbacks are applied.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub user_id: Option<UserId>,
    pub timeout_secs: u64,
    pub tick_ms: u64,
    pub demo: bool,
    pub log_file: Option<PathBuf>,
}

impl Config {
    pub fn resolve(overrides: Overrides) -> Result<Self> {
        Self::resolve_with(overrides, |name| std::env::var(name))
    }

    /// Same as [`Config::resolve`], reading the environment through `env`.
    pub fn resolve_with<F>(overrides: Overrides, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let api_url = match overrides.api_url {
            Some(url) => url,
            None => env_var(&env, API_URL_ENV)?.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        };
        let user_id = match overrides.user_id {
            Some(id) => Some(id),
            None => parse_user_id(env_var(&env, USER_ID_ENV)?.as_deref())?,
        }
        .filter(|id| *id != 0);
        let log_file = match overrides.log_file {
            Some(path) => path,
            None => default_log_path()?,
        };
        Ok(Self {
            api_url,
            user_id,
            timeout: Duration::from_secs(overrides.timeout_secs),
            tick: Duration::from_millis(overrides.tick_ms),
            demo: overrides.demo,
            log_file,
        })
    }
}

fn env_var<F>(env: &F, name: &str) -> Result<Option<String>>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    match env(name) {
        Ok(raw) => {
            let trimmed = raw.trim().to_string();
            if trimmed.is_empty() {
                return Err(anyhow!("env {name} is empty after trimming; please re-export"));
            }
            Ok(Some(trimmed))
        }
        Err(VarError::NotPresent) => Ok(None),
        Err(e) => Err(anyhow!("failed to read env {name}: {e}")),
    }
}

fn parse_user_id(raw: Option<&str>) -> Result<Option<UserId>> {
    raw.map(|s| {
        s.parse::<UserId>()
            .with_context(|| format!("{USER_ID_ENV} must be an integer, got {s:?}"))
    })
    .transpose()
}

fn default_log_path() -> Result<PathBuf> {
    let base = dirs::data_dir().context("failed to resolve data dir")?;
    Ok(base.join("todos").join("todos.log"))
}
