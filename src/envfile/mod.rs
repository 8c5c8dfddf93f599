use std::fs;
use std::io::ErrorKind;

use tracing::{debug, warn};

use crate::config::ProjectPaths;
use crate::error::{DeployError, DeployResult};
use crate::secrets::{self, SecretKind};

/// `.env` keys filled from secret files.
pub const SUBSTITUTIONS: [(&str, SecretKind); 3] = [
    ("POSTGRES_PASSWORD", SecretKind::DbPassword),
    ("REDIS_PASSWORD", SecretKind::RedisPassword),
    ("SECRET_KEY", SecretKind::AppSecretKey),
];

#[derive(Debug, PartialEq, Eq)]
pub enum EnvOutcome {
    Created { substituted: usize },
    KeptExisting,
}

pub struct EnvironmentFileWriter<'a> {
    paths: &'a ProjectPaths,
}

impl<'a> EnvironmentFileWriter<'a> {
    pub fn new(paths: &'a ProjectPaths) -> Self {
        Self { paths }
    }

    /// Materialize the env file from its template. An existing env file is
    /// left exactly as it is.
    pub fn write(&self) -> DeployResult<EnvOutcome> {
        let target = self.paths.env_file();
        if target.exists() {
            debug!("{} exists, not regenerating", target.display());
            return Ok(EnvOutcome::KeptExisting);
        }

        let template_path = self.paths.env_template();
        let template = match fs::read_to_string(template_path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(DeployError::TemplateMissing(template_path.to_path_buf()))
            }
            Err(e) => return Err(DeployError::fs(template_path, e)),
        };

        let mut values = Vec::with_capacity(SUBSTITUTIONS.len());
        for (key, kind) in SUBSTITUTIONS {
            values.push((key, secrets::read(self.paths, kind)?));
        }

        let (rendered, substituted) = substitute(&template, &values);
        for (key, _) in &values {
            if !substituted.contains(key) {
                warn!("{} has no {}= line; left unset", template_path.display(), key);
            }
        }

        if secrets::write_private(target, || rendered)?.is_some() {
            Ok(EnvOutcome::Created {
                substituted: substituted.len(),
            })
        } else {
            Ok(EnvOutcome::KeptExisting)
        }
    }
}

/// Replace each whole `KEY=...` line whose key is in `values`. Returns the
/// rendered text and the keys that were found.
pub fn substitute<'k>(template: &str, values: &[(&'k str, String)]) -> (String, Vec<&'k str>) {
    let mut found = Vec::new();
    let mut out = String::with_capacity(template.len());

    for line in template.split_inclusive('\n') {
        let body = line.trim_end_matches(['\n', '\r']);
        let ending = &line[body.len()..];
        let replacement = body.split_once('=').and_then(|(key, _)| {
            values
                .iter()
                .find(|(k, _)| *k == key.trim())
                .map(|(k, v)| (*k, v))
        });

        match replacement {
            Some((key, value)) => {
                out.push_str(key);
                out.push('=');
                out.push_str(value);
                out.push_str(ending);
                if !found.contains(&key) {
                    found.push(key);
                }
            }
            None => out.push_str(line),
        }
    }

    (out, found)
}
