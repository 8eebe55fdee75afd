use forge_common::ForgeError;

use crate::engine::{ContainerEngine, GenericEngine};
use crate::guard::{is_blocked_mount_source, is_dangerous_command, scan_for_secrets};
use crate::model::{Engine, SandboxConfig, SandboxResult};

/// Facade over the two supported container engines. Engine selection is
/// configuration-driven (`SandboxConfig::engine`) with a fallback to
/// whichever engine probes available, docker first.
pub struct SandboxRunner {
    docker: GenericEngine,
    podman: GenericEngine,
}

impl Default for SandboxRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl SandboxRunner {
    pub fn new() -> Self {
        SandboxRunner { docker: GenericEngine::docker(), podman: GenericEngine::podman() }
    }

    /// True if at least one of docker/podman is reachable.
    pub async fn is_available(&self) -> bool {
        self.docker.is_available().await || self.podman.is_available().await
    }

    async fn select(&self, preferred: Option<Engine>) -> Option<&dyn ContainerEngine> {
        match preferred {
            Some(Engine::Docker) => self.docker.is_available().await.then_some(&self.docker as &dyn ContainerEngine),
            Some(Engine::Podman) => self.podman.is_available().await.then_some(&self.podman as &dyn ContainerEngine),
            None => {
                if self.docker.is_available().await {
                    Some(&self.docker as &dyn ContainerEngine)
                } else if self.podman.is_available().await {
                    Some(&self.podman as &dyn ContainerEngine)
                } else {
                    None
                }
            }
        }
    }

    pub async fn run(&self, config: &SandboxConfig, argv: &[String]) -> Result<SandboxResult, ForgeError> {
        if is_dangerous_command(argv) {
            return Err(ForgeError::PolicyViolation(format!("refusing to run a flagged command: {}", argv.join(" "))));
        }
        for mount in &config.mounts {
            if is_blocked_mount_source(&mount.source) {
                return Err(ForgeError::PolicyViolation(format!("mount source is blocked: {}", mount.source)));
            }
        }

        let engine = self
            .select(config.engine)
            .await
            .ok_or_else(|| ForgeError::ProviderUnavailable("no container engine (docker/podman) is available".to_string()))?;

        let container_id = format!("forge-{}", forge_common::new_id());
        let result = engine.run(&container_id, config, argv).await?;

        for findings in [scan_for_secrets(&result.output), scan_for_secrets(&result.logs)] {
            if !findings.is_empty() {
                tracing::warn!(container_id = %container_id, ?findings, "sandbox output matched a secret pattern");
            }
        }

        engine.cleanup(&container_id).await;
        Ok(result)
    }

    pub async fn cleanup(&self, preferred: Option<Engine>, container_id: &str) {
        if let Some(engine) = self.select(preferred).await {
            engine.cleanup(container_id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Mount, NetworkMode};

    fn config() -> SandboxConfig {
        SandboxConfig {
            image: "alpine:latest".to_string(),
            engine: None,
            network: NetworkMode::None,
            memory_limit_mb: Some(256),
            cpu_limit: Some(1.0),
            timeout_secs: 5,
            mounts: vec![],
            env: vec![],
            working_dir: None,
        }
    }

    #[tokio::test]
    async fn rejects_dangerous_argv_without_touching_an_engine() {
        let runner = SandboxRunner::new();
        let err = runner.run(&config(), &["rm".into(), "-rf".into(), "/".into()]).await.unwrap_err();
        assert!(matches!(err, ForgeError::PolicyViolation(_)));
    }

    #[tokio::test]
    async fn rejects_blocked_mount_source() {
        let runner = SandboxRunner::new();
        let home = dirs::home_dir().unwrap_or_default();
        let mut cfg = config();
        cfg.mounts = vec![Mount { source: home.join(".ssh").to_string_lossy().to_string(), target: "/root/.ssh".to_string(), read_only: true }];
        let err = runner.run(&cfg, &["ls".into()]).await.unwrap_err();
        assert!(matches!(err, ForgeError::PolicyViolation(_)));
    }
}
