//! Scripted [`Executor`] for unit tests.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{CommandOutput, CommandSpec, Executor, OutputMode};
use crate::error::{DeployError, DeployResult};

type CommandHandler = Box<dyn Fn(&CommandSpec) -> CommandOutput + Send + Sync>;
type HttpHandler = Box<dyn Fn(&str) -> DeployResult<u16> + Send + Sync>;

/// Records every call as a command line (`GET <url>` for HTTP) and answers
/// from the installed handlers. Unhandled commands succeed with empty output;
/// unhandled URLs answer 200.
pub struct FakeExecutor {
    calls: Mutex<Vec<String>>,
    programs: HashSet<String>,
    on_command: CommandHandler,
    on_http: HttpHandler,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            programs: ["docker", "tar"].iter().map(|p| p.to_string()).collect(),
            on_command: Box::new(|_| ok("")),
            on_http: Box::new(|_| Ok(200)),
        }
    }

    pub fn on_command(
        mut self,
        f: impl Fn(&CommandSpec) -> CommandOutput + Send + Sync + 'static,
    ) -> Self {
        self.on_command = Box::new(f);
        self
    }

    pub fn on_http(mut self, f: impl Fn(&str) -> DeployResult<u16> + Send + Sync + 'static) -> Self {
        self.on_http = Box::new(f);
        self
    }

    pub fn without_program(mut self, program: &str) -> Self {
        self.programs.remove(program);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls containing `needle`, in order.
    pub fn calls_matching(&self, needle: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.contains(needle))
            .collect()
    }
}

pub fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        code: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

pub fn fail(stderr: &str) -> CommandOutput {
    CommandOutput {
        code: Some(1),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

/// `docker compose ps --format json` line for one service.
pub fn ps_line(service: &str, state: &str, status: &str) -> String {
    format!(
        r#"{{"Name":"stack-{0}-1","Service":"{0}","State":"{1}","Status":"{2}"}}"#,
        service, state, status
    )
}

#[async_trait]
impl Executor for FakeExecutor {
    async fn run(&self, cmd: &CommandSpec) -> DeployResult<CommandOutput> {
        self.calls.lock().unwrap().push(cmd.to_string());
        let output = (self.on_command)(cmd);
        if let OutputMode::File(path) = &cmd.output {
            std::fs::write(path, &output.stdout).map_err(|e| DeployError::fs(path, e))?;
        }
        Ok(output)
    }

    async fn http_get(&self, url: &str) -> DeployResult<u16> {
        self.calls.lock().unwrap().push(format!("GET {}", url));
        (self.on_http)(url)
    }

    fn has_program(&self, program: &str) -> bool {
        self.programs.contains(program)
    }
}
