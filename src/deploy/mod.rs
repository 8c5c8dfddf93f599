pub mod record;
pub mod steps;

use std::fmt;
use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::backup::BackupAgent;
use crate::compose::{ServiceController, ServiceStatus};
use crate::config::DeploymentConfig;
use crate::envfile::{EnvOutcome, EnvironmentFileWriter};
use crate::error::{DeployError, DeployResult};
use crate::exec::Executor;
use crate::health::HealthReporter;
use crate::output;
use crate::readiness::{self, ReadinessPoller};
use crate::secrets::{PermissionHardener, SecretProvisioner};

use record::DeploymentRecord;
use steps::{DirectoryProvisioner, MigrationRunner, PrerequisiteChecker, ResourceCleaner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Check,
    Dirs,
    Secrets,
    Perms,
    EnvFile,
    Backup,
    StopOld,
    Build,
    StartNew,
    WaitReady,
    Migrate,
    HealthCheck,
    Cleanup,
}

impl Stage {
    /// Stages in execution order. `Cleanup` only runs when requested.
    pub fn plan(cleanup: bool) -> Vec<Stage> {
        let mut stages = vec![
            Stage::Check,
            Stage::Dirs,
            Stage::Secrets,
            Stage::Perms,
            Stage::EnvFile,
            Stage::Backup,
            Stage::StopOld,
            Stage::Build,
            Stage::StartNew,
            Stage::WaitReady,
            Stage::Migrate,
            Stage::HealthCheck,
        ];
        if cleanup {
            stages.push(Stage::Cleanup);
        }
        stages
    }

    pub fn description(self) -> &'static str {
        match self {
            Stage::Check => "Checking prerequisites",
            Stage::Dirs => "Creating directories",
            Stage::Secrets => "Generating secrets",
            Stage::Perms => "Setting permissions",
            Stage::EnvFile => "Writing environment file",
            Stage::Backup => "Backing up current deployment",
            Stage::StopOld => "Stopping running services",
            Stage::Build => "Building images",
            Stage::StartNew => "Starting services",
            Stage::WaitReady => "Waiting for services",
            Stage::Migrate => "Running migrations",
            Stage::HealthCheck => "Checking service health",
            Stage::Cleanup => "Pruning unused resources",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Check => "check",
            Stage::Dirs => "dirs",
            Stage::Secrets => "secrets",
            Stage::Perms => "perms",
            Stage::EnvFile => "envfile",
            Stage::Backup => "backup",
            Stage::StopOld => "stop-old",
            Stage::Build => "build",
            Stage::StartNew => "start-new",
            Stage::WaitReady => "wait-ready",
            Stage::Migrate => "migrate",
            Stage::HealthCheck => "health-check",
            Stage::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// First failure of a run, tagged with the stage it happened in.
#[derive(Debug, thiserror::Error)]
#[error("deployment failed at {stage}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: DeployError,
}

#[derive(Debug, Default)]
pub struct DeployOutcome {
    pub completed: Vec<Stage>,
    pub backup: Option<PathBuf>,
    pub services: Vec<ServiceStatus>,
}

pub struct Deployer<'a, E: Executor> {
    config: &'a DeploymentConfig,
    exec: &'a E,
}

impl<'a, E: Executor> Deployer<'a, E> {
    pub fn new(config: &'a DeploymentConfig, exec: &'a E) -> Self {
        Self { config, exec }
    }

    /// Run every stage in order, stopping at the first failure. Nothing done
    /// by earlier stages is undone.
    pub async fn run(&self) -> Result<DeployOutcome, PipelineError> {
        let started_at = chrono::Local::now();
        let plan = Stage::plan(self.config.cleanup);
        let mut outcome = DeployOutcome::default();

        output::header(&format!(
            "Deploying {} ({})",
            self.config.project_root().display(),
            self.config.profile
        ));

        for (i, stage) in plan.iter().copied().enumerate() {
            output::step(i + 1, plan.len(), stage.description());
            if let Err(source) = self.execute(stage, &mut outcome).await {
                error!(%stage, "{}", source);
                return Err(PipelineError { stage, source });
            }
            outcome.completed.push(stage);
        }

        let record = DeploymentRecord::new(
            self.config.profile,
            started_at,
            outcome.backup.as_deref(),
            outcome.services.iter().map(|s| s.name.clone()).collect(),
            &self.config.paths,
        );
        if let Err(e) = record.write(&self.config.paths.deploy_record()) {
            warn!("could not write deployment record: {}", e);
        }

        println!();
        output::success(&format!("Deployment ({}) complete", self.config.profile));
        Ok(outcome)
    }

    async fn execute(&self, stage: Stage, outcome: &mut DeployOutcome) -> DeployResult<()> {
        let config = self.config;
        let exec = self.exec;

        match stage {
            Stage::Check => {
                PrerequisiteChecker::new(config, exec).check().await?;
                output::success("Docker and Compose available, daemon reachable");
            }
            Stage::Dirs => {
                let created = DirectoryProvisioner::new(config).provision()?;
                output::success(&format!("{} director(ies) created", created.len()));
            }
            Stage::Secrets => {
                let report = SecretProvisioner::new(&config.paths).provision()?;
                output::success(&format!(
                    "{} secret(s) generated, {} kept",
                    report.created.len(),
                    report.kept.len()
                ));
            }
            Stage::Perms => {
                let changed = PermissionHardener::new(&config.paths).harden()?;
                output::success(&format!("Permissions set on {} path(s)", changed));
            }
            Stage::EnvFile => match EnvironmentFileWriter::new(&config.paths).write()? {
                EnvOutcome::Created { substituted } => output::success(&format!(
                    "Created {} ({} value(s) filled in)",
                    config.paths.env_file().display(),
                    substituted
                )),
                EnvOutcome::KeptExisting => output::warning(&format!(
                    "{} already exists, leaving it untouched",
                    config.paths.env_file().display()
                )),
            },
            Stage::Backup => {
                let running = ServiceController::new(config, exec).running().await?;
                if running.is_empty() {
                    output::info("No running deployment, skipping backup");
                } else {
                    let report = BackupAgent::new(config, exec).run().await?;
                    let saved: Vec<&str> = [(report.dump, "database"), (report.archive, "files")]
                        .iter()
                        .filter(|(done, _)| *done)
                        .map(|(_, what)| *what)
                        .collect();
                    output::success(&format!(
                        "Backup ({}) saved to {}",
                        saved.join(" + "),
                        report.dir.display()
                    ));
                    outcome.backup = Some(report.dir);
                }
            }
            Stage::StopOld => {
                if ServiceController::new(config, exec).stop().await? {
                    output::success("Previous stack stopped");
                } else {
                    output::info("Nothing running");
                }
            }
            Stage::Build => {
                let spinner = output::create_spinner("Building (no cache)...");
                let result = ServiceController::new(config, exec).build().await;
                spinner.finish_and_clear();
                result?;
                output::success("Images built");
            }
            Stage::StartNew => {
                ServiceController::new(config, exec).start().await?;
                output::success("Services started");
            }
            Stage::WaitReady => {
                let probes = readiness::default_probes(config)?;
                ReadinessPoller::new(config, exec).wait_all(&probes).await?;
            }
            Stage::Migrate => {
                if MigrationRunner::new(config, exec).run().await? {
                    output::success("Migrations applied");
                }
            }
            Stage::HealthCheck => {
                let summary = HealthReporter::new(config, exec).check().await?;
                info!("{} services up", summary.services.len());
                outcome.services = summary.services;
            }
            Stage::Cleanup => {
                ResourceCleaner::new(config, exec).prune().await?;
                output::success("Unused resources pruned");
            }
        }
        Ok(())
    }
}
