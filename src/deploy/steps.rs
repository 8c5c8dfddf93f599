use std::path::PathBuf;

use tracing::{debug, info};

use crate::compose::ServiceController;
use crate::config::{DeploymentConfig, Profile};
use crate::error::{DeployError, DeployResult};
use crate::exec::{CommandSpec, Executor};
use crate::output;

/// Verifies the container tooling before anything touches the disk.
pub struct PrerequisiteChecker<'a, E: Executor> {
    config: &'a DeploymentConfig,
    exec: &'a E,
}

impl<'a, E: Executor> PrerequisiteChecker<'a, E> {
    pub fn new(config: &'a DeploymentConfig, exec: &'a E) -> Self {
        Self { config, exec }
    }

    pub async fn check(&self) -> DeployResult<()> {
        let runtime = &self.config.settings.runtime.program;
        let compose = &self.config.settings.compose;

        if !self.exec.has_program(runtime) {
            return Err(DeployError::ToolMissing(runtime.clone()));
        }
        if compose.program != *runtime && !self.exec.has_program(&compose.program) {
            return Err(DeployError::ToolMissing(compose.program.clone()));
        }

        let mut version_args = compose.args.clone();
        version_args.push("version".to_string());
        let version = CommandSpec::new(&compose.program, version_args);
        if !self.exec.run(&version).await?.success() {
            let cli = std::iter::once(compose.program.as_str())
                .chain(compose.args.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(" ");
            return Err(DeployError::ToolMissing(cli));
        }

        let info = self.exec.run(&CommandSpec::new(runtime, ["info"])).await?;
        if !info.success() {
            let reason = info
                .stderr
                .lines()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("`info` failed")
                .trim()
                .to_string();
            return Err(DeployError::DaemonUnreachable(reason));
        }
        debug!("{} daemon reachable", runtime);

        for file in self.compose_files() {
            if !file.is_file() {
                return Err(DeployError::ComposeFileMissing(file));
            }
        }

        Ok(())
    }

    fn compose_files(&self) -> Vec<PathBuf> {
        let compose = &self.config.settings.compose;
        let root = self.config.project_root();
        let mut files = vec![root.join(&compose.base_file)];
        if self.config.profile == Profile::Production {
            files.push(root.join(&compose.production_overlay));
        }
        files
    }
}

pub struct DirectoryProvisioner<'a> {
    config: &'a DeploymentConfig,
}

impl<'a> DirectoryProvisioner<'a> {
    pub fn new(config: &'a DeploymentConfig) -> Self {
        Self { config }
    }

    /// Returns the directories that had to be created.
    pub fn provision(&self) -> DeployResult<Vec<PathBuf>> {
        let mut created = Vec::new();
        for dir in self.config.paths.required_dirs() {
            if dir.is_dir() {
                continue;
            }
            std::fs::create_dir_all(&dir).map_err(|e| DeployError::fs(&dir, e))?;
            debug!("created {}", dir.display());
            created.push(dir);
        }
        Ok(created)
    }
}

pub struct MigrationRunner<'a, E: Executor> {
    config: &'a DeploymentConfig,
    exec: &'a E,
}

impl<'a, E: Executor> MigrationRunner<'a, E> {
    pub fn new(config: &'a DeploymentConfig, exec: &'a E) -> Self {
        Self { config, exec }
    }

    /// Run the migration entry point inside the app service. Returns `false`
    /// when the project has no entry point.
    pub async fn run(&self) -> DeployResult<bool> {
        let migration = &self.config.settings.migration;
        let entry = self.config.project_root().join(&migration.entry_point);
        if !entry.is_file() {
            output::warning(&format!(
                "No migration entry point at {}, skipping",
                migration.entry_point
            ));
            return Ok(false);
        }

        let cmd = ServiceController::new(self.config, self.exec)
            .exec_command(&self.config.settings.services.app, &migration.command)
            .inherit();
        self.exec.run_checked(&cmd).await?;
        Ok(true)
    }
}

pub const PRUNE_TARGETS: [&str; 4] = ["container", "image", "volume", "network"];

/// Prunes unused runtime resources host-wide.
pub struct ResourceCleaner<'a, E: Executor> {
    config: &'a DeploymentConfig,
    exec: &'a E,
}

impl<'a, E: Executor> ResourceCleaner<'a, E> {
    pub fn new(config: &'a DeploymentConfig, exec: &'a E) -> Self {
        Self { config, exec }
    }

    pub async fn prune(&self) -> DeployResult<()> {
        let runtime = &self.config.settings.runtime.program;
        output::warning(
            "Pruning removes ALL unused containers, images, volumes and networks on this host, not only this stack's",
        );
        for target in PRUNE_TARGETS {
            let out = self
                .exec
                .run_checked(&CommandSpec::new(runtime, [target, "prune", "-f"]))
                .await?;
            if let Some(line) = out.stdout.lines().rev().find(|l| !l.trim().is_empty()) {
                info!("{} prune: {}", target, line.trim());
            }
        }
        Ok(())
    }
}
