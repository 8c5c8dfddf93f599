use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::debug;

use crate::cli::Cli;
use crate::config::{DeploymentConfig, Settings};
use crate::deploy::Deployer;
use crate::exec::LocalExecutor;

pub async fn run(cli: Cli) -> Result<()> {
    let project_root = match cli.project_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };
    let project_root = canonical(project_root)?;

    let settings = Settings::load(&project_root.join(&cli.config))?;
    let config = DeploymentConfig::new(cli.environment, cli.cleanup, project_root, settings);

    let outcome = Deployer::new(&config, &LocalExecutor).run().await?;
    debug!(
        "{} stages completed, {} services up",
        outcome.completed.len(),
        outcome.services.len()
    );
    Ok(())
}

fn canonical(dir: PathBuf) -> Result<PathBuf> {
    dir.canonicalize()
        .with_context(|| format!("Project directory not found: {}", dir.display()))
}
