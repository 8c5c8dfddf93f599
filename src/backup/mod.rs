use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{info, warn};

use crate::compose::ServiceController;
use crate::config::{DeploymentConfig, FailurePolicy};
use crate::error::{DeployError, DeployResult};
use crate::exec::{CommandSpec, Executor};
use crate::output;

pub const DUMP_FILE: &str = "database.sql";
pub const ARCHIVE_FILE: &str = "app_data.tar.gz";

#[derive(Debug, Default, PartialEq, Eq)]
pub struct BackupReport {
    pub dir: PathBuf,
    pub dump: bool,
    pub archive: bool,
}

/// Snapshot of the running deployment, taken before it is torn down.
pub struct BackupAgent<'a, E: Executor> {
    config: &'a DeploymentConfig,
    exec: &'a E,
}

impl<'a, E: Executor> BackupAgent<'a, E> {
    pub fn new(config: &'a DeploymentConfig, exec: &'a E) -> Self {
        Self { config, exec }
    }

    pub async fn run(&self) -> DeployResult<BackupReport> {
        let dir = create_backup_dir(&self.config.paths.backups_dir(), &timestamp())?;
        info!("Backing up into {}", dir.display());

        let dump = self.dump_database(&dir).await;
        let dump = apply_policy("database dump", dump, self.config.settings.backup.dump_failure)?;

        let archive = self.archive_project(&dir).await;
        let archive = apply_policy(
            "project archive",
            archive,
            self.config.settings.backup.archive_failure,
        )?;

        Ok(BackupReport { dir, dump, archive })
    }

    async fn dump_database(&self, dir: &Path) -> DeployResult<()> {
        let db = &self.config.settings.database;
        let args = vec![
            "pg_dump".to_string(),
            "-U".to_string(),
            db.user.clone(),
            db.name.clone(),
        ];
        let cmd = ServiceController::new(self.config, self.exec)
            .exec_command(&self.config.settings.services.database, &args)
            .stdout_to(dir.join(DUMP_FILE));
        self.exec.run_checked(&cmd).await?;
        Ok(())
    }

    async fn archive_project(&self, dir: &Path) -> DeployResult<()> {
        let mut args = vec!["czf".to_string(), dir.join(ARCHIVE_FILE).display().to_string()];
        for pattern in &self.config.settings.backup.excludes {
            args.push(format!("--exclude={}", pattern));
        }
        args.push(".".to_string());

        let cmd = CommandSpec::new("tar", args).current_dir(self.config.project_root());
        self.exec.run_checked(&cmd).await?;
        Ok(())
    }
}

fn timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Create `root/<stamp>`, or `root/<stamp>-N` if that name is taken, so an
/// earlier backup is never reused.
fn create_backup_dir(root: &Path, stamp: &str) -> DeployResult<PathBuf> {
    std::fs::create_dir_all(root).map_err(|e| DeployError::fs(root, e))?;

    let mut candidate = root.join(stamp);
    let mut n = 1;
    loop {
        match std::fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                candidate = root.join(format!("{}-{}", stamp, n));
                n += 1;
            }
            Err(e) => return Err(DeployError::fs(&candidate, e)),
        }
    }
}

fn apply_policy(what: &str, result: DeployResult<()>, policy: FailurePolicy) -> DeployResult<bool> {
    match (result, policy) {
        (Ok(()), _) => Ok(true),
        (Err(e), FailurePolicy::Abort) => Err(e),
        (Err(e), FailurePolicy::Warn) => {
            warn!("{} failed: {}", what, e);
            output::warning(&format!("Backup {} failed, continuing: {}", what, e));
            Ok(false)
        }
    }
}
