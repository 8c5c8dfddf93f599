use std::path::{Path, PathBuf};

use super::EnvFileSettings;
use crate::secrets::SecretKind;

/// On-disk layout of a project, rooted at the directory being deployed.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    root: PathBuf,
    env_file: PathBuf,
    env_template: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: PathBuf, env: &EnvFileSettings) -> Self {
        Self {
            env_file: root.join(&env.path),
            env_template: root.join(&env.template),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.root.join("backups")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploads")
    }

    pub fn secrets_dir(&self) -> PathBuf {
        self.root.join("secrets")
    }

    pub fn secret_file(&self, kind: SecretKind) -> PathBuf {
        self.secrets_dir().join(kind.file_name())
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.root.join("scripts")
    }

    pub fn env_file(&self) -> &Path {
        &self.env_file
    }

    pub fn env_template(&self) -> &Path {
        &self.env_template
    }

    pub fn deploy_record(&self) -> PathBuf {
        self.logs_dir().join("last-deploy.json")
    }

    /// Directories that must exist before the stack starts.
    pub fn required_dirs(&self) -> Vec<PathBuf> {
        let grafana = self.root.join("monitoring/grafana/provisioning");
        vec![
            self.backups_dir(),
            self.logs_dir(),
            self.uploads_dir(),
            self.secrets_dir(),
            self.root.join("monitoring/rules"),
            grafana.join("dashboards"),
            grafana.join("datasources"),
            self.root.join("nginx/ssl"),
        ]
    }
}
