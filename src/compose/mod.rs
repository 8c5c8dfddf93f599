//! Thin wrapper over the compose CLI for one project and profile.

use serde::Deserialize;
use tracing::{debug, info};

use crate::config::{DeploymentConfig, Profile};
use crate::error::{DeployError, DeployResult};
use crate::exec::{CommandSpec, Executor};

/// One row of `compose ps`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceStatus {
    #[serde(rename = "Service", default)]
    pub name: String,
    #[serde(rename = "State", default)]
    pub state: String,
    #[serde(rename = "Status", default)]
    pub status: String,
}

impl ServiceStatus {
    pub fn is_up(&self) -> bool {
        self.state.eq_ignore_ascii_case("running") || self.status.starts_with("Up")
    }
}

/// Parse `compose ps --format json`. Older Compose releases print one JSON
/// array, newer ones print one object per line.
pub fn parse_ps(output: &str) -> DeployResult<Vec<ServiceStatus>> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }
    trimmed
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).map_err(DeployError::from))
        .collect()
}

pub struct ServiceController<'a, E: Executor> {
    config: &'a DeploymentConfig,
    exec: &'a E,
}

impl<'a, E: Executor> ServiceController<'a, E> {
    pub fn new(config: &'a DeploymentConfig, exec: &'a E) -> Self {
        Self { config, exec }
    }

    /// `-f` arguments for the active profile, plus `-p` when a project name is set.
    pub fn file_args(&self) -> Vec<String> {
        let compose = &self.config.settings.compose;
        let mut args = vec!["-f".to_string(), compose.base_file.clone()];
        if self.config.profile == Profile::Production {
            args.push("-f".to_string());
            args.push(compose.production_overlay.clone());
        }
        if let Some(name) = &compose.project_name {
            args.push("-p".to_string());
            args.push(name.clone());
        }
        args
    }

    fn command<I, S>(&self, subcommand: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let compose = &self.config.settings.compose;
        let mut args = compose.args.clone();
        args.extend(self.file_args());
        args.extend(subcommand.into_iter().map(Into::into));
        CommandSpec::new(&compose.program, args).current_dir(self.config.project_root())
    }

    pub async fn status(&self) -> DeployResult<Vec<ServiceStatus>> {
        let out = self
            .exec
            .run_checked(&self.command(["ps", "--all", "--format", "json"]))
            .await?;
        parse_ps(&out.stdout)
    }

    /// Services currently reported up.
    pub async fn running(&self) -> DeployResult<Vec<ServiceStatus>> {
        Ok(self
            .status()
            .await?
            .into_iter()
            .filter(ServiceStatus::is_up)
            .collect())
    }

    /// Tear the stack down. Returns `false` without calling `down` when
    /// nothing is running.
    pub async fn stop(&self) -> DeployResult<bool> {
        let running = self.running().await?;
        if running.is_empty() {
            debug!("No running services, skipping down");
            return Ok(false);
        }
        info!("Stopping {} running service(s)", running.len());
        self.exec.run_checked(&self.command(["down"]).inherit()).await?;
        Ok(true)
    }

    /// Rebuild every image without the layer cache.
    pub async fn build(&self) -> DeployResult<()> {
        self.exec
            .run_checked(&self.command(["build", "--no-cache"]).inherit())
            .await?;
        Ok(())
    }

    pub async fn start(&self) -> DeployResult<()> {
        self.exec
            .run_checked(&self.command(["up", "-d"]).inherit())
            .await?;
        Ok(())
    }

    /// Run a command inside a service container without a TTY.
    pub fn exec_command(&self, service: &str, args: &[String]) -> CommandSpec {
        let mut sub = vec!["exec".to_string(), "-T".to_string(), service.to_string()];
        sub.extend(args.iter().cloned());
        self.command(sub)
    }
}
