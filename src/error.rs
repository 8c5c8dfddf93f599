use std::path::{Path, PathBuf};
use std::time::Duration;

pub type DeployResult<T> = Result<T, DeployError>;

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("required tool '{0}' not found on PATH")]
    ToolMissing(String),

    #[error("container runtime daemon is not reachable: {0}")]
    DaemonUnreachable(String),

    #[error("compose file not found: {}", .0.display())]
    ComposeFileMissing(PathBuf),

    #[error("failed to spawn '{program}'")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command failed ({status}): {command}{}", stderr_suffix(.stderr))]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("environment template not found: {}", .0.display())]
    TemplateMissing(PathBuf),

    #[error("{service} did not become ready within {}s ({attempts} attempts)", .waited.as_secs())]
    Timeout {
        service: String,
        waited: Duration,
        attempts: u32,
    },

    #[error("services not up: {}", .0.join(", "))]
    Unhealthy(Vec<String>),

    #[error("HTTP probe {url} failed: {reason}")]
    Http { url: String, reason: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("filesystem error at {}", .path.display())]
    Fs {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DeployError {
    pub fn fs(path: &Path, source: std::io::Error) -> Self {
        Self::Fs {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn stderr_suffix(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!("\nstderr: {}", stderr)
    }
}
