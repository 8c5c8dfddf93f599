//! Generated credentials stored one per file under `secrets/`.

mod perms;

pub use perms::PermissionHardener;

use std::fs;
use std::io::{ErrorKind, Write as _};
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::ProjectPaths;
use crate::error::{DeployError, DeployResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SecretKind {
    AppSecretKey,
    DbPassword,
    RedisPassword,
    GrafanaPassword,
}

impl SecretKind {
    pub const ALL: [SecretKind; 4] = [
        SecretKind::AppSecretKey,
        SecretKind::DbPassword,
        SecretKind::RedisPassword,
        SecretKind::GrafanaPassword,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            SecretKind::AppSecretKey => "app_secret_key.txt",
            SecretKind::DbPassword => "db_password.txt",
            SecretKind::RedisPassword => "redis_password.txt",
            SecretKind::GrafanaPassword => "grafana_password.txt",
        }
    }

    /// Random bytes drawn before base64 encoding.
    pub fn byte_len(self) -> usize {
        match self {
            SecretKind::AppSecretKey => 32,
            _ => 16,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SecretKind::AppSecretKey => "app secret key",
            SecretKind::DbPassword => "database password",
            SecretKind::RedisPassword => "redis password",
            SecretKind::GrafanaPassword => "grafana password",
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    pub created: Vec<SecretKind>,
    pub kept: Vec<SecretKind>,
}

pub struct SecretProvisioner<'a> {
    paths: &'a ProjectPaths,
}

impl<'a> SecretProvisioner<'a> {
    pub fn new(paths: &'a ProjectPaths) -> Self {
        Self { paths }
    }

    /// Create every missing secret file. Existing files are never rewritten.
    pub fn provision(&self) -> DeployResult<ProvisionReport> {
        let dir = self.paths.secrets_dir();
        fs::create_dir_all(&dir).map_err(|e| DeployError::fs(&dir, e))?;

        let mut report = ProvisionReport::default();
        for kind in SecretKind::ALL {
            let path = self.paths.secret_file(kind);
            match write_private(&path, || format!("{}\n", generate(kind.byte_len())))? {
                Some(value) => {
                    info!("Generated {} ({})", kind.label(), fingerprint(&value));
                    report.created.push(kind);
                }
                None => {
                    debug!("Keeping existing {}", path.display());
                    report.kept.push(kind);
                }
            }
        }
        Ok(report)
    }
}

/// Base64 of `len` bytes from the OS CSPRNG.
pub fn generate(len: usize) -> String {
    let mut buf = vec![0u8; len];
    OsRng.fill_bytes(&mut buf);
    STANDARD.encode(&buf)
}

/// Read a secret back, without the trailing newline.
pub fn read(paths: &ProjectPaths, kind: SecretKind) -> DeployResult<String> {
    let path = paths.secret_file(kind);
    let value = fs::read_to_string(&path).map_err(|e| DeployError::fs(&path, e))?;
    Ok(value.trim().to_string())
}

/// Short SHA-256 prefix, safe to log.
pub fn fingerprint(value: &str) -> String {
    let digest = Sha256::digest(value.trim().as_bytes());
    hex::encode(&digest[..6])
}

/// Create `path` readable by the owner only and fill it with `contents()`.
/// If the file already exists nothing is touched, `contents` is not called
/// and `None` is returned.
pub fn write_private(
    path: &Path,
    contents: impl FnOnce() -> String,
) -> DeployResult<Option<String>> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = match options.open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(None),
        Err(e) => return Err(DeployError::fs(path, e)),
    };
    let contents = contents();
    file.write_all(contents.as_bytes())
        .map_err(|e| DeployError::fs(path, e))?;
    Ok(Some(contents))
}
