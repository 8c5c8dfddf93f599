use std::path::Path;

use tracing::debug;

use super::SecretKind;
use crate::config::ProjectPaths;
use crate::error::{DeployError, DeployResult};

/// Locks down generated secrets and marks helper scripts executable.
pub struct PermissionHardener<'a> {
    paths: &'a ProjectPaths,
}

impl<'a> PermissionHardener<'a> {
    pub fn new(paths: &'a ProjectPaths) -> Self {
        Self { paths }
    }

    /// Returns the number of paths whose mode was set.
    #[cfg(unix)]
    pub fn harden(&self) -> DeployResult<usize> {
        let mut changed = 0;

        let secrets_dir = self.paths.secrets_dir();
        if secrets_dir.is_dir() {
            set_mode(&secrets_dir, 0o700)?;
            changed += 1;
        }

        for kind in SecretKind::ALL {
            let path = self.paths.secret_file(kind);
            if path.is_file() {
                set_mode(&path, 0o600)?;
                changed += 1;
            }
        }

        let scripts = self.paths.scripts_dir();
        if scripts.is_dir() {
            let entries =
                std::fs::read_dir(&scripts).map_err(|e| DeployError::fs(&scripts, e))?;
            for entry in entries {
                let path = entry
                    .map_err(|e| DeployError::fs(&scripts, e))?
                    .path();
                if path.is_file() && path.extension().is_some_and(|ext| ext == "sh") {
                    set_mode(&path, 0o755)?;
                    changed += 1;
                }
            }
        }

        Ok(changed)
    }

    #[cfg(not(unix))]
    pub fn harden(&self) -> DeployResult<usize> {
        debug!("Skipping permission hardening on this platform");
        Ok(0)
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> DeployResult<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| DeployError::fs(path, e))?;
    debug!("chmod {:o} {}", mode, path.display());
    Ok(())
}
