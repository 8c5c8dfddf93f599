//! Process and HTTP access for the pipeline.
//!
//! Every external tool call goes through [`Executor`], so the pipeline can be
//! driven against a scripted fake in tests.

mod http;

#[cfg(test)]
pub mod fake;

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{DeployError, DeployResult};

/// Where a command's stdout goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Collect stdout/stderr into the returned [`CommandOutput`].
    Capture,
    /// Stream straight to the terminal (builds, `up`).
    Inherit,
    /// Write stdout to a file, capture stderr.
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub output: OutputMode,
    /// Indices into `args` printed as `***`.
    redacted: BTreeSet<usize>,
}

impl CommandSpec {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            output: OutputMode::Capture,
            redacted: BTreeSet::new(),
        }
    }

    /// Hide every argument equal to `secret` from the command's display form,
    /// which is what gets logged and put into error messages.
    pub fn redact(mut self, secret: &str) -> Self {
        for (i, arg) in self.args.iter().enumerate() {
            if arg == secret {
                self.redacted.insert(i);
            }
        }
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn inherit(mut self) -> Self {
        self.output = OutputMode::Inherit;
        self
    }

    pub fn stdout_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = OutputMode::File(path.into());
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for (i, arg) in self.args.iter().enumerate() {
            if self.redacted.contains(&i) {
                write!(f, " ***")?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    fn status_text(&self) -> String {
        match self.code {
            Some(code) => format!("exit {}", code),
            None => "killed by signal".to_string(),
        }
    }
}

#[async_trait]
pub trait Executor: Send + Sync {
    /// Run a command to completion. A non-zero exit is not an error here;
    /// only failing to start the process is.
    async fn run(&self, cmd: &CommandSpec) -> DeployResult<CommandOutput>;

    /// GET `url` and return the response status code.
    async fn http_get(&self, url: &str) -> DeployResult<u16>;

    /// Whether `program` resolves on PATH.
    fn has_program(&self, program: &str) -> bool;

    /// Run a command and turn a non-zero exit into [`DeployError::CommandFailed`].
    async fn run_checked(&self, cmd: &CommandSpec) -> DeployResult<CommandOutput> {
        let output = self.run(cmd).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(DeployError::CommandFailed {
                command: cmd.to_string(),
                status: output.status_text(),
                stderr: output.stderr,
            })
        }
    }
}

/// Runs commands on this machine.
pub struct LocalExecutor;

#[async_trait]
impl Executor for LocalExecutor {
    async fn run(&self, cmd: &CommandSpec) -> DeployResult<CommandOutput> {
        debug!("exec: {}", cmd);

        let mut command = tokio::process::Command::new(&cmd.program);
        command.args(&cmd.args).stdin(Stdio::null());
        if let Some(dir) = &cmd.cwd {
            command.current_dir(dir);
        }

        let spawn_err = |source| DeployError::Spawn {
            program: cmd.program.clone(),
            source,
        };

        match &cmd.output {
            OutputMode::Capture => {
                let output = command.output().await.map_err(spawn_err)?;
                Ok(CommandOutput {
                    code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                })
            }
            OutputMode::Inherit => {
                let status = command
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit())
                    .status()
                    .await
                    .map_err(spawn_err)?;
                Ok(CommandOutput {
                    code: status.code(),
                    ..Default::default()
                })
            }
            OutputMode::File(path) => {
                let file = std::fs::File::create(path).map_err(|e| DeployError::fs(path, e))?;
                // `output()` would replace the file handle with a pipe.
                let child = command
                    .stdout(Stdio::from(file))
                    .stderr(Stdio::piped())
                    .spawn()
                    .map_err(spawn_err)?;
                let output = child.wait_with_output().await.map_err(spawn_err)?;
                Ok(CommandOutput {
                    code: output.status.code(),
                    stdout: String::new(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                })
            }
        }
    }

    async fn http_get(&self, url: &str) -> DeployResult<u16> {
        http::get_status(url).await
    }

    fn has_program(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_spec_displays_as_a_command_line() {
        let cmd = CommandSpec::new("docker", ["compose", "-f", "docker-compose.yml", "up", "-d"]);
        assert_eq!(cmd.to_string(), "docker compose -f docker-compose.yml up -d");
        assert_eq!(cmd.output, OutputMode::Capture);
    }

    #[test]
    fn redacted_arguments_are_hidden_from_display() {
        let cmd = CommandSpec::new("redis-cli", ["-a", "s3cr3t/+=", "ping"]).redact("s3cr3t/+=");
        assert_eq!(cmd.to_string(), "redis-cli -a *** ping");
        assert_eq!(cmd.args[1], "s3cr3t/+=");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_command_error_uses_redacted_form() {
        let err = LocalExecutor
            .run_checked(&CommandSpec::new("sh", ["-c", "exit 2", "hunter2"]).redact("hunter2"))
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("sh -c exit 2 ***"), "{}", message);
        assert!(!message.contains("hunter2"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn local_executor_captures_output_and_exit_code() {
        let ok = LocalExecutor
            .run(&CommandSpec::new("sh", ["-c", "echo hello; echo oops >&2"]))
            .await
            .unwrap();
        assert!(ok.success());
        assert_eq!(ok.stdout.trim(), "hello");
        assert_eq!(ok.stderr.trim(), "oops");

        let failed = LocalExecutor
            .run_checked(&CommandSpec::new("sh", ["-c", "exit 3"]))
            .await
            .unwrap_err();
        assert!(matches!(
            failed,
            DeployError::CommandFailed { ref status, .. } if status == "exit 3"
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn local_executor_writes_stdout_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("dump.sql");
        let out = LocalExecutor
            .run(&CommandSpec::new("sh", ["-c", "echo CREATE TABLE t;"]).stdout_to(&target))
            .await
            .unwrap();
        assert!(out.success());
        assert!(out.stdout.is_empty());
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "CREATE TABLE t;\n");

        let out = LocalExecutor
            .run(
                &CommandSpec::new("sh", ["-c", "seq 1 5000; echo warn >&2"]).stdout_to(&target),
            )
            .await
            .unwrap();
        assert_eq!(out.stderr.trim(), "warn");
        let dumped = std::fs::read_to_string(&target).unwrap();
        assert_eq!(dumped.lines().count(), 5000);
        assert_eq!(dumped.lines().last(), Some("5000"));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let err = LocalExecutor
            .run(&CommandSpec::new("definitely-not-a-real-binary-7f3a", Vec::<String>::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::Spawn { .. }));
        assert!(!LocalExecutor.has_program("definitely-not-a-real-binary-7f3a"));
    }
}
