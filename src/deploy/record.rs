use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{Profile, ProjectPaths};
use crate::error::{DeployError, DeployResult};
use crate::secrets::{self, SecretKind};

/// Summary of the last successful deployment, kept under `logs/`.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub profile: Profile,
    pub started_at: String,
    pub finished_at: String,
    pub backup: Option<String>,
    pub services: Vec<String>,
    /// Secret file name → short SHA-256 of its content.
    pub secrets: BTreeMap<String, String>,
}

impl DeploymentRecord {
    pub fn new(
        profile: Profile,
        started_at: chrono::DateTime<chrono::Local>,
        backup: Option<&Path>,
        services: Vec<String>,
        paths: &ProjectPaths,
    ) -> Self {
        let secrets = SecretKind::ALL
            .iter()
            .filter_map(|kind| {
                secrets::read(paths, *kind)
                    .ok()
                    .map(|value| (kind.file_name().to_string(), secrets::fingerprint(&value)))
            })
            .collect();

        Self {
            profile,
            started_at: started_at.to_rfc3339(),
            finished_at: chrono::Local::now().to_rfc3339(),
            backup: backup.map(|p| p.display().to_string()),
            services,
            secrets,
        }
    }

    pub fn write(&self, path: &Path) -> DeployResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| DeployError::fs(path, e))
    }
}
