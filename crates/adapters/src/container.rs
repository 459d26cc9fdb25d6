// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! Container Driver: wraps the container runtime. The only
//! implementation shells out to the `docker` CLI, the pattern this stack
//! already uses to run workloads it doesn't want to link an SDK for.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use pgfork_core::EngineError;

use crate::process;

/// A branch's container, as specified before `create`.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub env: BTreeMap<String, String>,
    /// (host path, in-container path, read-only)
    pub mounts: Vec<(String, String, bool)>,
}

/// Runtime status of a container, as reported by `inspectStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    Running,
    Stopped,
    Missing,
}

#[async_trait]
pub trait ContainerDriver: Send + Sync {
    async fn create(&self, spec: &ContainerSpec) -> Result<(), EngineError>;
    async fn start(&self, name: &str) -> Result<(), EngineError>;
    async fn stop(&self, name: &str, timeout: Duration) -> Result<(), EngineError>;
    async fn remove(&self, name: &str, force: bool) -> Result<(), EngineError>;
    async fn restart(&self, name: &str) -> Result<(), EngineError>;
    async fn get_by_name(&self, name: &str) -> Result<Option<String>, EngineError>;
    /// Names of every container (running or stopped) whose name starts with
    /// `prefix`, for orphan reconciliation.
    async fn list_by_name_prefix(&self, prefix: &str) -> Result<Vec<String>, EngineError>;
    async fn get_port(&self, name: &str, container_port: u16) -> Result<Option<u16>, EngineError>;
    async fn inspect_status(&self, name: &str) -> Result<ContainerStatus, EngineError>;
    async fn wait_healthy(&self, name: &str, timeout: Duration) -> Result<(), EngineError>;
    async fn pull_image(&self, image: &str) -> Result<(), EngineError>;
    async fn image_exists(&self, image: &str) -> Result<bool, EngineError>;
    async fn exec_sql(&self, container_name: &str, sql: &str, user: &str) -> Result<(), EngineError>;
}

const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Docker-backed [`ContainerDriver`].
pub struct DockerContainerDriver;

impl DockerContainerDriver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DockerContainerDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerDriver for DockerContainerDriver {
    async fn create(&self, spec: &ContainerSpec) -> Result<(), EngineError> {
        let mut args = vec![
            "create".to_string(),
            "--name".to_string(),
            spec.name.clone(),
            "--restart".to_string(),
            "unless-stopped".to_string(),
            "-p".to_string(),
            "0:5432".to_string(),
        ];
        for (k, v) in &spec.env {
            args.push("-e".to_string());
            args.push(format!("{k}={v}"));
        }
        for (host, container, ro) in &spec.mounts {
            args.push("-v".to_string());
            args.push(if *ro { format!("{host}:{container}:ro") } else { format!("{host}:{container}") });
        }
        args.push(spec.image.clone());

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        process::run_ok("docker", &arg_refs).await
    }

    async fn start(&self, name: &str) -> Result<(), EngineError> {
        process::run_ok("docker", &["start", name]).await
    }

    async fn stop(&self, name: &str, timeout: Duration) -> Result<(), EngineError> {
        let secs = timeout.as_secs().to_string();
        process::run_ok("docker", &["stop", "-t", &secs, name]).await
    }

    async fn remove(&self, name: &str, force: bool) -> Result<(), EngineError> {
        let mut args = vec!["rm"];
        if force {
            args.push("-f");
        }
        args.push(name);
        process::run_ok("docker", &args).await
    }

    async fn restart(&self, name: &str) -> Result<(), EngineError> {
        process::run_ok("docker", &["restart", name]).await
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<String>, EngineError> {
        let out = process::run("docker", &["ps", "-a", "--filter", &format!("name=^{name}$"), "--format", "{{.ID}}"])
            .await?;
        Ok(out.lines().next().map(str::to_string).filter(|s| !s.is_empty()))
    }

    async fn list_by_name_prefix(&self, prefix: &str) -> Result<Vec<String>, EngineError> {
        let out = process::run(
            "docker",
            &["ps", "-a", "--filter", &format!("name=^{prefix}"), "--format", "{{.Names}}"],
        )
        .await?;
        Ok(out.lines().filter(|l| !l.is_empty()).map(str::to_string).collect())
    }

    async fn get_port(&self, name: &str, container_port: u16) -> Result<Option<u16>, EngineError> {
        let out = match process::run("docker", &["port", name, &container_port.to_string()]).await {
            Ok(out) => out,
            Err(_) => return Ok(None),
        };
        // Output looks like "0.0.0.0:54321" or ":::54321".
        let port = out
            .lines()
            .next()
            .and_then(|line| line.rsplit(':').next())
            .and_then(|p| p.trim().parse().ok());
        Ok(port)
    }

    async fn inspect_status(&self, name: &str) -> Result<ContainerStatus, EngineError> {
        let out = process::run("docker", &["inspect", "-f", "{{.State.Running}}", name]).await;
        match out {
            Ok(s) if s.trim() == "true" => Ok(ContainerStatus::Running),
            Ok(_) => Ok(ContainerStatus::Stopped),
            Err(_) => Ok(ContainerStatus::Missing),
        }
    }

    async fn wait_healthy(&self, name: &str, timeout: Duration) -> Result<(), EngineError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let out = process::run("docker", &["inspect", "-f", "{{.State.Health.Status}}", name]).await;
            match out {
                Ok(s) if s.trim() == "healthy" => return Ok(()),
                // No health check configured: running is good enough.
                Ok(s) if s.trim() == "<no value>" && self.inspect_status(name).await? == ContainerStatus::Running => {
                    return Ok(());
                }
                _ => {}
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(EngineError::system_with_hint(
                    format!("container '{name}' did not become healthy within {timeout:?}"),
                    "check `docker logs` for startup errors",
                ));
            }
            sleep(HEALTH_POLL_INTERVAL).await;
        }
    }

    async fn pull_image(&self, image: &str) -> Result<(), EngineError> {
        process::run_ok("docker", &["pull", image]).await
    }

    async fn image_exists(&self, image: &str) -> Result<bool, EngineError> {
        Ok(process::run("docker", &["image", "inspect", image]).await.is_ok())
    }

    async fn exec_sql(&self, container_name: &str, sql: &str, user: &str) -> Result<(), EngineError> {
        process::run_ok("docker", &["exec", "-u", user, container_name, "psql", "-U", user, "-c", sql]).await
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::BTreeMap as Map;

    #[derive(Default)]
    pub struct FakeContainerDriver {
        containers: Mutex<Map<String, ContainerStatus>>,
        ports: Mutex<Map<String, u16>>,
        next_port: Mutex<u16>,
    }

    impl FakeContainerDriver {
        pub fn new() -> Self {
            Self { next_port: Mutex::new(40000), ..Default::default() }
        }
    }

    #[async_trait]
    impl ContainerDriver for FakeContainerDriver {
        async fn create(&self, spec: &ContainerSpec) -> Result<(), EngineError> {
            self.containers.lock().insert(spec.name.clone(), ContainerStatus::Stopped);
            Ok(())
        }

        async fn start(&self, name: &str) -> Result<(), EngineError> {
            let mut port_counter = self.next_port.lock();
            let port = *port_counter;
            *port_counter += 1;
            self.ports.lock().insert(name.to_string(), port);
            self.containers.lock().insert(name.to_string(), ContainerStatus::Running);
            Ok(())
        }

        async fn stop(&self, name: &str, _timeout: Duration) -> Result<(), EngineError> {
            self.containers.lock().insert(name.to_string(), ContainerStatus::Stopped);
            Ok(())
        }

        async fn remove(&self, name: &str, _force: bool) -> Result<(), EngineError> {
            self.containers.lock().remove(name);
            self.ports.lock().remove(name);
            Ok(())
        }

        async fn restart(&self, name: &str) -> Result<(), EngineError> {
            self.start(name).await
        }

        async fn get_by_name(&self, name: &str) -> Result<Option<String>, EngineError> {
            Ok(self.containers.lock().contains_key(name).then(|| name.to_string()))
        }

        async fn list_by_name_prefix(&self, prefix: &str) -> Result<Vec<String>, EngineError> {
            Ok(self.containers.lock().keys().filter(|n| n.starts_with(prefix)).cloned().collect())
        }

        async fn get_port(&self, name: &str, _container_port: u16) -> Result<Option<u16>, EngineError> {
            Ok(self.ports.lock().get(name).copied())
        }

        async fn inspect_status(&self, name: &str) -> Result<ContainerStatus, EngineError> {
            Ok(self.containers.lock().get(name).copied().unwrap_or(ContainerStatus::Missing))
        }

        async fn wait_healthy(&self, _name: &str, _timeout: Duration) -> Result<(), EngineError> {
            Ok(())
        }

        async fn pull_image(&self, _image: &str) -> Result<(), EngineError> {
            Ok(())
        }

        async fn image_exists(&self, _image: &str) -> Result<bool, EngineError> {
            Ok(true)
        }

        async fn exec_sql(&self, _container_name: &str, _sql: &str, _user: &str) -> Result<(), EngineError> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeContainerDriver;
    use super::*;

    #[tokio::test]
    async fn create_start_assigns_port() {
        let driver = FakeContainerDriver::new();
        let spec = ContainerSpec {
            name: "pgfork-api-main".into(),
            image: "postgres:16".into(),
            env: BTreeMap::new(),
            mounts: vec![],
        };
        driver.create(&spec).await.unwrap();
        assert_eq!(driver.inspect_status(&spec.name).await.unwrap(), ContainerStatus::Stopped);
        driver.start(&spec.name).await.unwrap();
        assert_eq!(driver.inspect_status(&spec.name).await.unwrap(), ContainerStatus::Running);
        assert!(driver.get_port(&spec.name, 5432).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn missing_container_reports_missing() {
        let driver = FakeContainerDriver::new();
        assert_eq!(driver.inspect_status("ghost").await.unwrap(), ContainerStatus::Missing);
    }
}
