use tracing::{info, warn};

use crate::compose::{ServiceController, ServiceStatus};
use crate::config::DeploymentConfig;
use crate::error::{DeployError, DeployResult};
use crate::exec::Executor;
use crate::output;
use crate::secrets::{self, SecretKind};

/// Services that were up at the final check.
#[derive(Debug, PartialEq, Eq)]
pub struct HealthSummary {
    pub services: Vec<ServiceStatus>,
}

/// Services in `statuses` that are not up.
pub fn not_up(statuses: &[ServiceStatus]) -> Vec<String> {
    statuses
        .iter()
        .filter(|s| !s.is_up())
        .map(|s| s.name.clone())
        .collect()
}

pub struct HealthReporter<'a, E: Executor> {
    config: &'a DeploymentConfig,
    services: ServiceController<'a, E>,
}

impl<'a, E: Executor> HealthReporter<'a, E> {
    pub fn new(config: &'a DeploymentConfig, exec: &'a E) -> Self {
        Self {
            config,
            services: ServiceController::new(config, exec),
        }
    }

    /// Final gate: fails if and only if some reported service is not up.
    pub async fn check(&self) -> DeployResult<HealthSummary> {
        let statuses = self.services.status().await?;
        let failing = not_up(&statuses);

        if !failing.is_empty() {
            output::header("Service status");
            output::status_table(&statuses);
            return Err(DeployError::Unhealthy(failing));
        }

        if statuses.is_empty() {
            warn!("Compose reported no services; nothing to gate on");
            output::warning("No services reported by compose");
        } else {
            info!("All {} services up", statuses.len());
        }
        self.print_access()?;
        Ok(HealthSummary { services: statuses })
    }

    fn print_access(&self) -> DeployResult<()> {
        let urls = &self.config.settings.urls;
        let grafana_password = secrets::read(&self.config.paths, SecretKind::GrafanaPassword)?;

        output::header("Access");
        println!("  Application: {}", urls.app);
        println!("  Prometheus:  {}", urls.metrics);
        println!("  Grafana:     {} (admin / {})", urls.dashboard, grafana_password);
        Ok(())
    }
}
