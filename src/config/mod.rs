use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod paths;
mod validate;

pub use paths::ProjectPaths;

/// Which composition overlays are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Development,
    Production,
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Profile::Development => write!(f, "development"),
            Profile::Production => write!(f, "production"),
        }
    }
}

/// Everything one invocation needs, fixed at startup.
#[derive(Debug, Clone)]
pub struct DeploymentConfig {
    pub profile: Profile,
    pub cleanup: bool,
    pub paths: ProjectPaths,
    pub settings: Settings,
}

impl DeploymentConfig {
    pub fn new(profile: Profile, cleanup: bool, project_root: PathBuf, settings: Settings) -> Self {
        let paths = ProjectPaths::new(project_root, &settings.env_file);
        Self {
            profile,
            cleanup,
            paths,
            settings,
        }
    }

    pub fn project_root(&self) -> &Path {
        self.paths.root()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub runtime: RuntimeSettings,
    #[serde(default)]
    pub compose: ComposeSettings,
    #[serde(default)]
    pub services: ServiceNames,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub readiness: ReadinessSettings,
    #[serde(default)]
    pub backup: BackupSettings,
    #[serde(default)]
    pub migration: MigrationSettings,
    #[serde(default)]
    pub urls: UrlSettings,
    #[serde(default)]
    pub env_file: EnvFileSettings,
}

impl Settings {
    /// Load settings from `path`, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            let settings = Self::default();
            validate::validate(&settings)?;
            return Ok(settings);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        let settings: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;

        validate::validate(&settings)?;

        Ok(settings)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuntimeSettings {
    #[serde(default = "default_docker")]
    pub program: String,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            program: default_docker(),
        }
    }
}

fn default_docker() -> String {
    "docker".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ComposeSettings {
    #[serde(default = "default_docker")]
    pub program: String,
    #[serde(default = "default_compose_args")]
    pub args: Vec<String>,
    #[serde(default = "default_base_file")]
    pub base_file: String,
    #[serde(default = "default_production_overlay")]
    pub production_overlay: String,
    pub project_name: Option<String>,
}

impl Default for ComposeSettings {
    fn default() -> Self {
        Self {
            program: default_docker(),
            args: default_compose_args(),
            base_file: default_base_file(),
            production_overlay: default_production_overlay(),
            project_name: None,
        }
    }
}

fn default_compose_args() -> Vec<String> {
    vec!["compose".to_string()]
}
fn default_base_file() -> String {
    "docker-compose.yml".to_string()
}
fn default_production_overlay() -> String {
    "docker-compose.prod.yml".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceNames {
    #[serde(default = "default_app_service")]
    pub app: String,
    #[serde(default = "default_database_service")]
    pub database: String,
    #[serde(default = "default_cache_service")]
    pub cache: String,
    #[serde(default = "default_metrics_service")]
    pub metrics: String,
    #[serde(default = "default_dashboard_service")]
    pub dashboard: String,
}

impl Default for ServiceNames {
    fn default() -> Self {
        Self {
            app: default_app_service(),
            database: default_database_service(),
            cache: default_cache_service(),
            metrics: default_metrics_service(),
            dashboard: default_dashboard_service(),
        }
    }
}

fn default_app_service() -> String {
    "app".to_string()
}
fn default_database_service() -> String {
    "db".to_string()
}
fn default_cache_service() -> String {
    "redis".to_string()
}
fn default_metrics_service() -> String {
    "prometheus".to_string()
}
fn default_dashboard_service() -> String {
    "grafana".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_user")]
    pub user: String,
    #[serde(default = "default_db_name")]
    pub name: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            user: default_db_user(),
            name: default_db_name(),
        }
    }
}

fn default_db_user() -> String {
    "postgres".to_string()
}
fn default_db_name() -> String {
    "app".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReadinessSettings {
    #[serde(default = "default_exec_interval")]
    pub exec_interval_secs: u64,
    #[serde(default = "default_http_interval")]
    pub http_interval_secs: u64,
    #[serde(default = "default_readiness_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_app_health_url")]
    pub app_url: String,
    #[serde(default = "default_metrics_health_url")]
    pub metrics_url: String,
    #[serde(default = "default_dashboard_health_url")]
    pub dashboard_url: String,
}

impl ReadinessSettings {
    pub fn exec_interval(&self) -> Duration {
        Duration::from_secs(self.exec_interval_secs)
    }

    pub fn http_interval(&self) -> Duration {
        Duration::from_secs(self.http_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            exec_interval_secs: default_exec_interval(),
            http_interval_secs: default_http_interval(),
            timeout_secs: default_readiness_timeout(),
            app_url: default_app_health_url(),
            metrics_url: default_metrics_health_url(),
            dashboard_url: default_dashboard_health_url(),
        }
    }
}

fn default_exec_interval() -> u64 {
    2
}
fn default_http_interval() -> u64 {
    5
}
fn default_readiness_timeout() -> u64 {
    300
}
fn default_app_health_url() -> String {
    "http://localhost:8000/health".to_string()
}
fn default_metrics_health_url() -> String {
    "http://localhost:9090/-/healthy".to_string()
}
fn default_dashboard_health_url() -> String {
    "http://localhost:3000/api/health".to_string()
}

/// What to do when a backup artifact cannot be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    Abort,
    Warn,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackupSettings {
    #[serde(default = "default_dump_failure")]
    pub dump_failure: FailurePolicy,
    #[serde(default = "default_archive_failure")]
    pub archive_failure: FailurePolicy,
    #[serde(default = "default_backup_excludes")]
    pub excludes: Vec<String>,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            dump_failure: default_dump_failure(),
            archive_failure: default_archive_failure(),
            excludes: default_backup_excludes(),
        }
    }
}

fn default_dump_failure() -> FailurePolicy {
    FailurePolicy::Abort
}
fn default_archive_failure() -> FailurePolicy {
    FailurePolicy::Warn
}
fn default_backup_excludes() -> Vec<String> {
    [
        "./backups",
        "./logs",
        "./.git",
        "./target",
        "node_modules",
        "__pycache__",
        "*.pyc",
        ".pytest_cache",
        ".venv",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MigrationSettings {
    #[serde(default = "default_migration_entry_point")]
    pub entry_point: String,
    #[serde(default = "default_migration_command")]
    pub command: Vec<String>,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            entry_point: default_migration_entry_point(),
            command: default_migration_command(),
        }
    }
}

fn default_migration_entry_point() -> String {
    "scripts/migrate.py".to_string()
}
fn default_migration_command() -> Vec<String> {
    vec!["python".to_string(), "scripts/migrate.py".to_string()]
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UrlSettings {
    #[serde(default = "default_app_url")]
    pub app: String,
    #[serde(default = "default_metrics_url")]
    pub metrics: String,
    #[serde(default = "default_dashboard_url")]
    pub dashboard: String,
}

impl Default for UrlSettings {
    fn default() -> Self {
        Self {
            app: default_app_url(),
            metrics: default_metrics_url(),
            dashboard: default_dashboard_url(),
        }
    }
}

fn default_app_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_metrics_url() -> String {
    "http://localhost:9090".to_string()
}
fn default_dashboard_url() -> String {
    "http://localhost:3000".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnvFileSettings {
    #[serde(default = "default_env_template")]
    pub template: String,
    #[serde(default = "default_env_path")]
    pub path: String,
}

impl Default for EnvFileSettings {
    fn default() -> Self {
        Self {
            template: default_env_template(),
            path: default_env_path(),
        }
    }
}

fn default_env_template() -> String {
    ".env.example".to_string()
}
fn default_env_path() -> String {
    ".env".to_string()
}
