use anyhow::{bail, Result};

use super::Settings;

pub fn validate(settings: &Settings) -> Result<()> {
    if settings.runtime.program.is_empty() {
        bail!("runtime.program cannot be empty");
    }

    if settings.compose.program.is_empty() {
        bail!("compose.program cannot be empty");
    }

    if settings.compose.base_file.is_empty() {
        bail!("compose.base_file cannot be empty");
    }

    if settings.compose.production_overlay.is_empty() {
        bail!("compose.production_overlay cannot be empty");
    }

    let services = &settings.services;
    for (key, name) in [
        ("app", &services.app),
        ("database", &services.database),
        ("cache", &services.cache),
        ("metrics", &services.metrics),
        ("dashboard", &services.dashboard),
    ] {
        if name.is_empty() {
            bail!("services.{} cannot be empty", key);
        }
    }

    if settings.database.user.is_empty() || settings.database.name.is_empty() {
        bail!("database.user and database.name cannot be empty");
    }

    let readiness = &settings.readiness;
    if readiness.exec_interval_secs == 0 || readiness.http_interval_secs == 0 {
        bail!("readiness intervals must be at least 1 second");
    }
    if readiness.timeout_secs == 0 {
        bail!("readiness.timeout_secs must be at least 1 second");
    }

    for (key, url) in [
        ("app_url", &readiness.app_url),
        ("metrics_url", &readiness.metrics_url),
        ("dashboard_url", &readiness.dashboard_url),
    ] {
        if !url.starts_with("http://") {
            bail!(
                "readiness.{} has invalid value '{}'. Only http:// URLs are supported",
                key,
                url
            );
        }
    }

    if settings.migration.command.is_empty() {
        bail!("migration.command cannot be empty");
    }

    if settings.env_file.template.is_empty() || settings.env_file.path.is_empty() {
        bail!("env_file.template and env_file.path cannot be empty");
    }

    Ok(())
}
