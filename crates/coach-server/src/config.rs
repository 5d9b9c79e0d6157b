//! Server configuration.

use anyhow::Context;
use coach_core::config::{CacheTtls, CoachConfig, JobSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "pretty" | "text" => Some(LogFormat::Pretty),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// TCP address to listen on
    pub bind: String,
    /// Service token file; defaults to `<home>/server/service-token`
    pub service_token_file: Option<PathBuf>,
    /// Recent turns returned by resume when the caller gives no limit
    pub resume_turn_limit: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:4100".to_string(),
            service_token_file: None,
            resume_turn_limit: CoachConfig::DEFAULT_RESUME_TURN_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// SQLite file; defaults to `<home>/coach.db`
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSection {
    /// Base URL of the enrichment worker
    pub url: String,
    pub request_timeout_ms: u64,
}

impl Default for WorkerSection {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:4200".to_string(),
            request_timeout_ms: 20_000,
        }
    }
}

impl WorkerSection {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    pub format: LogFormat,
}

/// Server configuration
///
/// Standard directory structure:
/// ```text
/// ~/.coach/
/// ├── config.toml           # Main configuration
/// ├── coach.db              # Database
/// └── server/
///     └── service-token     # Service token for front end → coach-server
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSection,
    pub database: DatabaseSection,
    pub worker: WorkerSection,
    pub cache: CacheTtls,
    pub jobs: JobSettings,
    pub log: LogSection,

    /// Coach home directory
    #[serde(skip)]
    pub home: PathBuf,
    /// Path the configuration was read from (may not exist)
    #[serde(skip)]
    pub config_path: PathBuf,
}

impl Config {
    /// Resolve the home directory: `COACH_HOME` if set, otherwise `~/.coach`
    pub fn home_dir() -> PathBuf {
        std::env::var("COACH_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".coach")
            })
    }

    /// Load configuration from file (if present), then apply environment overrides.
    ///
    /// `explicit` replaces `<home>/config.toml` and must exist.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        Self::load_from(&Self::home_dir(), explicit, |key| std::env::var(key).ok())
    }

    pub fn load_from(
        home: &Path,
        explicit: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let config_path = explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(|| home.join("config.toml"));

        let mut config = if explicit.is_some() || config_path.exists() {
            let raw = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            toml::from_str::<Config>(&raw)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else {
            Config::default()
        };

        config.home = home.to_path_buf();
        config.config_path = config_path;
        config.apply_env(env)?;

        std::fs::create_dir_all(&config.home)
            .with_context(|| format!("Failed to create {}", config.home.display()))?;

        Ok(config)
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(bind) = env("COACH_BIND") {
            self.server.bind = bind;
        }
        if let Some(path) = env("COACH_DATABASE_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }
        if let Some(url) = env("COACH_WORKER_URL") {
            self.worker.url = url;
        }
        if let Some(format) = env("COACH_LOG_FORMAT") {
            self.log.format = LogFormat::parse(&format)
                .with_context(|| format!("Unknown COACH_LOG_FORMAT '{}'", format))?;
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| self.home.join("coach.db"))
    }

    pub fn service_token_path(&self) -> PathBuf {
        self.server
            .service_token_file
            .clone()
            .unwrap_or_else(|| self.home.join("server").join("service-token"))
    }

    /// The part of the configuration the core library needs
    pub fn coach_config(&self) -> CoachConfig {
        CoachConfig {
            cache: self.cache.clone(),
            jobs: self.jobs.clone(),
            resume_turn_limit: self.server.resume_turn_limit,
        }
    }
}
