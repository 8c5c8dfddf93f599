//! Blocking, in-order readiness checks for the dependent services.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::compose::ServiceController;
use crate::config::DeploymentConfig;
use crate::error::{DeployError, DeployResult};
use crate::exec::{CommandSpec, Executor};
use crate::output;
use crate::secrets::{self, SecretKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeKind {
    /// Command run inside the service container; ready on exit 0 and, when
    /// set, `expect` appearing in stdout. Arguments equal to one of
    /// `secrets` never show up in logs.
    Exec {
        args: Vec<String>,
        expect: Option<String>,
        secrets: Vec<String>,
    },
    /// Ready on a 2xx response.
    Http { url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub service: String,
    pub kind: ProbeKind,
    pub interval: Duration,
}

/// Database, cache, app, metrics, dashboard, in that order.
pub fn default_probes(config: &DeploymentConfig) -> DeployResult<Vec<Probe>> {
    let settings = &config.settings;
    let readiness = &settings.readiness;
    let services = &settings.services;
    let redis_password = secrets::read(&config.paths, SecretKind::RedisPassword)?;

    let exec = |service: &str, args: &[&str], expect: Option<&str>, secrets: &[&str]| Probe {
        service: service.to_string(),
        kind: ProbeKind::Exec {
            args: args.iter().map(|a| a.to_string()).collect(),
            expect: expect.map(str::to_string),
            secrets: secrets.iter().map(|s| s.to_string()).collect(),
        },
        interval: readiness.exec_interval(),
    };
    let http = |service: &str, url: &str| Probe {
        service: service.to_string(),
        kind: ProbeKind::Http {
            url: url.to_string(),
        },
        interval: readiness.http_interval(),
    };

    Ok(vec![
        exec(
            &services.database,
            &["pg_isready", "-U", settings.database.user.as_str()],
            None,
            &[],
        ),
        exec(
            &services.cache,
            &["redis-cli", "--no-auth-warning", "-a", redis_password.as_str(), "ping"],
            Some("PONG"),
            &[redis_password.as_str()],
        ),
        http(&services.app, &readiness.app_url),
        http(&services.metrics, &readiness.metrics_url),
        http(&services.dashboard, &readiness.dashboard_url),
    ])
}

pub struct ReadinessPoller<'a, E: Executor> {
    services: ServiceController<'a, E>,
    exec: &'a E,
    timeout: Duration,
}

impl<'a, E: Executor> ReadinessPoller<'a, E> {
    pub fn new(config: &'a DeploymentConfig, exec: &'a E) -> Self {
        Self {
            services: ServiceController::new(config, exec),
            exec,
            timeout: config.settings.readiness.timeout(),
        }
    }

    /// Wait for each probe in turn. A probe is not tried until every probe
    /// before it has passed.
    pub async fn wait_all(&self, probes: &[Probe]) -> DeployResult<()> {
        for probe in probes {
            let spinner = output::create_spinner(&format!("Waiting for {}...", probe.service));
            let result = self.wait_for(probe).await;
            spinner.finish_and_clear();

            let attempts = result?;
            output::success(&format!("{} is ready", probe.service));
            debug!("{} ready after {} attempt(s)", probe.service, attempts);
        }
        Ok(())
    }

    /// Poll one probe until it passes or the deadline passes. An attempt
    /// still running at the deadline is abandoned. Returns the number of
    /// attempts made.
    pub async fn wait_for(&self, probe: &Probe) -> DeployResult<u32> {
        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut attempts = 0;
        let timed_out = |attempts| DeployError::Timeout {
            service: probe.service.clone(),
            waited: started.elapsed(),
            attempts,
        };

        loop {
            attempts += 1;
            match tokio::time::timeout_at(deadline, self.check(probe)).await {
                Ok(ready) => {
                    if ready? {
                        return Ok(attempts);
                    }
                }
                Err(_) => {
                    debug!("{} attempt {} still running at deadline", probe.service, attempts);
                    return Err(timed_out(attempts));
                }
            }
            debug!("{} not ready (attempt {})", probe.service, attempts);

            if Instant::now() + probe.interval > deadline {
                return Err(timed_out(attempts));
            }
            tokio::time::sleep(probe.interval).await;
        }
    }

    fn exec_command(&self, service: &str, args: &[String], secrets: &[String]) -> CommandSpec {
        secrets
            .iter()
            .fold(self.services.exec_command(service, args), |cmd, secret| {
                cmd.redact(secret)
            })
    }

    async fn check(&self, probe: &Probe) -> DeployResult<bool> {
        match &probe.kind {
            ProbeKind::Exec {
                args,
                expect,
                secrets,
            } => {
                let cmd = self.exec_command(&probe.service, args, secrets);
                let out = self.exec.run(&cmd).await?;
                Ok(out.success()
                    && expect
                        .as_deref()
                        .map_or(true, |needle| out.stdout.contains(needle)))
            }
            ProbeKind::Http { url } => match self.exec.http_get(url).await {
                Ok(status) => Ok((200..300).contains(&status)),
                Err(e) => {
                    debug!("{}", e);
                    Ok(false)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EnvFileSettings, Profile, ProjectPaths, Settings};
    use crate::exec::fake::{fail, ok, FakeExecutor};
    use crate::exec::CommandOutput;
    use async_trait::async_trait;
    use crate::secrets::SecretProvisioner;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn config(timeout_secs: u64) -> DeploymentConfig {
        let mut settings = Settings::default();
        settings.readiness.timeout_secs = timeout_secs;
        DeploymentConfig::new(Profile::Development, false, PathBuf::from("/srv/app"), settings)
    }

    fn exec_probe(service: &str, expect: Option<&str>) -> Probe {
        Probe {
            service: service.to_string(),
            kind: ProbeKind::Exec {
                args: vec!["check".to_string()],
                expect: expect.map(str::to_string),
                secrets: Vec::new(),
            },
            interval: Duration::from_millis(5),
        }
    }

    fn http_probe(service: &str, url: &str) -> Probe {
        Probe {
            service: service.to_string(),
            kind: ProbeKind::Http {
                url: url.to_string(),
            },
            interval: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn later_probe_waits_for_earlier_one() {
        let cfg = config(60);
        let db_attempts = Arc::new(AtomicU32::new(0));
        let counter = db_attempts.clone();
        let exec = FakeExecutor::new().on_command(move |cmd| {
            if cmd.args.contains(&"db".to_string()) {
                if counter.fetch_add(1, Ordering::SeqCst) < 3 {
                    fail("no response")
                } else {
                    ok("accepting connections")
                }
            } else {
                ok("PONG")
            }
        });

        let probes = vec![exec_probe("db", None), exec_probe("redis", Some("PONG"))];
        ReadinessPoller::new(&cfg, &exec).wait_all(&probes).await.unwrap();

        let calls = exec.calls();
        assert_eq!(calls.len(), 5);
        assert!(calls[..4].iter().all(|c| c.contains("exec -T db check")));
        assert!(calls[4].contains("exec -T redis check"));
    }

    #[tokio::test]
    async fn exec_probe_requires_expected_output() {
        let cfg = config(60);
        let seen = Arc::new(AtomicU32::new(0));
        let counter = seen.clone();
        let exec = FakeExecutor::new().on_command(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                ok("NOAUTH Authentication required.")
            } else {
                ok("PONG\n")
            }
        });

        let attempts = ReadinessPoller::new(&cfg, &exec)
            .wait_for(&exec_probe("redis", Some("PONG")))
            .await
            .unwrap();
        assert_eq!(attempts, 2);
    }

    #[tokio::test]
    async fn http_probe_retries_errors_and_non_2xx() {
        let cfg = config(60);
        let seen = Arc::new(AtomicU32::new(0));
        let counter = seen.clone();
        let exec = FakeExecutor::new().on_http(move |url| match counter.fetch_add(1, Ordering::SeqCst) {
            0 => Err(DeployError::Http {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            }),
            1 => Ok(503),
            _ => Ok(204),
        });

        let attempts = ReadinessPoller::new(&cfg, &exec)
            .wait_for(&http_probe("app", "http://localhost:8000/health"))
            .await
            .unwrap();
        assert_eq!(attempts, 3);
        assert_eq!(exec.calls_matching("GET http://localhost:8000/health").len(), 3);
    }

    #[tokio::test]
    async fn permanently_down_service_times_out() {
        let cfg = config(1);
        let exec = FakeExecutor::new().on_http(|_| Ok(502));
        let mut probe = http_probe("grafana", "http://localhost:3000/api/health");
        probe.interval = Duration::from_millis(200);

        let err = ReadinessPoller::new(&cfg, &exec)
            .wait_all(&[probe, http_probe("never", "http://localhost:1/")])
            .await
            .unwrap_err();

        match err {
            DeployError::Timeout { service, attempts, .. } => {
                assert_eq!(service, "grafana");
                assert!((4..=6).contains(&attempts), "attempts = {}", attempts);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(exec.calls_matching("localhost:1/").is_empty());
    }

    /// Executor whose commands never finish.
    struct Hanging;

    #[async_trait]
    impl Executor for Hanging {
        async fn run(&self, _cmd: &CommandSpec) -> DeployResult<CommandOutput> {
            std::future::pending().await
        }

        async fn http_get(&self, _url: &str) -> DeployResult<u16> {
            std::future::pending().await
        }

        fn has_program(&self, _program: &str) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn hung_attempt_is_cut_off_at_the_deadline() {
        let cfg = config(1);
        let exec = Hanging;
        let poller = ReadinessPoller::new(&cfg, &exec);

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            poller.wait_for(&exec_probe("redis", Some("PONG"))),
        )
        .await
        .expect("poller kept waiting past its deadline");

        match result {
            Err(DeployError::Timeout {
                service,
                attempts,
                waited,
            }) => {
                assert_eq!(service, "redis");
                assert_eq!(attempts, 1);
                assert!(waited >= Duration::from_secs(1));
            }
            other => panic!("unexpected result: {:?}", other.map_err(|e| e.to_string())),
        }
    }

    #[test]
    fn redis_probe_command_hides_the_password() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = DeploymentConfig::new(
            Profile::Development,
            false,
            dir.path().to_path_buf(),
            Settings::default(),
        );
        SecretProvisioner::new(&cfg.paths).provision().unwrap();
        let redis_password = secrets::read(&cfg.paths, SecretKind::RedisPassword).unwrap();

        let exec = FakeExecutor::new();
        let poller = ReadinessPoller::new(&cfg, &exec);
        let probes = default_probes(&cfg).unwrap();
        let ProbeKind::Exec { args, secrets, .. } = &probes[1].kind else {
            panic!("cache probe should run inside the container");
        };

        let cmd = poller.exec_command(&probes[1].service, args, secrets);
        let shown = cmd.to_string();
        assert!(!shown.contains(&redis_password), "{}", shown);
        assert!(shown.ends_with("exec -T redis redis-cli --no-auth-warning -a *** ping"));
        assert!(cmd.args.contains(&redis_password));
    }

    #[tokio::test]
    async fn logged_probe_calls_never_contain_the_password() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = DeploymentConfig::new(
            Profile::Development,
            false,
            dir.path().to_path_buf(),
            Settings::default(),
        );
        SecretProvisioner::new(&cfg.paths).provision().unwrap();
        let redis_password = secrets::read(&cfg.paths, SecretKind::RedisPassword).unwrap();

        let exec = FakeExecutor::new().on_command(|_| ok("PONG"));
        let probes = default_probes(&cfg).unwrap();
        ReadinessPoller::new(&cfg, &exec)
            .wait_all(&probes[..2])
            .await
            .unwrap();

        let calls = exec.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| !c.contains(&redis_password)));
    }

    #[test]
    fn default_probes_cover_the_stack_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = DeploymentConfig::new(
            Profile::Development,
            false,
            dir.path().to_path_buf(),
            Settings::default(),
        );
        let paths = ProjectPaths::new(dir.path().to_path_buf(), &EnvFileSettings::default());
        SecretProvisioner::new(&paths).provision().unwrap();
        let redis_password = secrets::read(&paths, SecretKind::RedisPassword).unwrap();

        let probes = default_probes(&cfg).unwrap();
        let services: Vec<&str> = probes.iter().map(|p| p.service.as_str()).collect();
        assert_eq!(services, vec!["db", "redis", "app", "prometheus", "grafana"]);

        assert_eq!(probes[0].interval, Duration::from_secs(2));
        assert_eq!(probes[1].interval, Duration::from_secs(2));
        assert_eq!(probes[2].interval, Duration::from_secs(5));
        match &probes[1].kind {
            ProbeKind::Exec {
                args,
                expect,
                secrets,
            } => {
                assert!(args.contains(&redis_password));
                assert_eq!(expect.as_deref(), Some("PONG"));
                assert_eq!(secrets, &vec![redis_password.clone()]);
            }
            other => panic!("unexpected probe: {:?}", other),
        }
        assert_eq!(
            probes[4].kind,
            ProbeKind::Http {
                url: "http://localhost:3000/api/health".to_string()
            }
        );
    }
}
