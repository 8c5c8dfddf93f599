use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

fn deploy() -> Command {
    Command::cargo_bin("deploy").unwrap()
}

#[test]
fn help_exits_zero_and_lists_environments() {
    deploy()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("development"))
        .stdout(predicate::str::contains("production"))
        .stdout(predicate::str::contains("--cleanup"));

    deploy().arg("-h").assert().success();
}

#[test]
fn unknown_environment_exits_one_with_usage() {
    deploy()
        .arg("staging")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("staging"))
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn missing_project_dir_is_reported() {
    deploy()
        .args(["-C", "/definitely/not/here"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Project directory not found"));
}

#[test]
fn invalid_settings_file_fails_before_any_side_effect() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("deploy.toml"), "[readiness]\ntimeout_secs = 0\n").unwrap();

    deploy()
        .arg("-C")
        .arg(dir.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("timeout_secs"));

    assert!(!dir.path().join("secrets").exists());
}

#[cfg(unix)]
mod with_stub_docker {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// Put an executable `docker` script in `bin`.
    fn stub_docker(bin: &Path, script: &str) {
        fs::create_dir_all(bin).unwrap();
        let path = bin.join("docker");
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn project(root: &Path) {
        fs::write(root.join("docker-compose.yml"), "services: {}\n").unwrap();
        fs::write(root.join(".env.example"), "POSTGRES_PASSWORD=x\n").unwrap();
    }

    #[test]
    fn missing_docker_binary_exits_one() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("bin");
        fs::create_dir_all(&bin).unwrap();
        let root = dir.path().join("project");
        fs::create_dir_all(&root).unwrap();
        project(&root);

        deploy()
            .env("PATH", &bin)
            .arg("-C")
            .arg(&root)
            .assert()
            .code(1)
            .stderr(predicate::str::contains("'docker' not found"));

        assert!(!root.join("secrets").exists());
    }

    #[test]
    fn unreachable_daemon_aborts_at_check_without_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("bin");
        stub_docker(
            &bin,
            "#!/bin/sh\n\
             if [ \"$1\" = \"info\" ]; then\n\
             echo 'Cannot connect to the Docker daemon at unix:///var/run/docker.sock.' >&2\n\
             exit 1\n\
             fi\n\
             exit 0\n",
        );
        let root = dir.path().join("project");
        fs::create_dir_all(&root).unwrap();
        project(&root);

        deploy()
            .env("PATH", &bin)
            .arg("-C")
            .arg(&root)
            .arg("production")
            .assert()
            .code(1)
            .stderr(predicate::str::contains("deployment failed at check"))
            .stderr(predicate::str::contains("Cannot connect to the Docker daemon"));

        let mut entries: Vec<String> = fs::read_dir(&root)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        entries.sort();
        assert_eq!(entries, vec![".env.example", "docker-compose.yml"]);
    }
}
