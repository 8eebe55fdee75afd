use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use forge_common::ForgeError;

use crate::model::{NetworkMode, SandboxConfig, SandboxResult};

const MAX_OUTPUT_BYTES: usize = 200 * 1024;

#[async_trait]
pub trait ContainerEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Cheap availability probe, used by the runner to pick an engine and
    /// by `IsAvailable`.
    async fn is_available(&self) -> bool;

    async fn run(&self, container_id: &str, config: &SandboxConfig, argv: &[String]) -> Result<SandboxResult, ForgeError>;

    /// Best-effort teardown. Failures are logged, never propagated — the
    /// caller already has whatever result it needed.
    async fn cleanup(&self, container_id: &str);
}

pub struct GenericEngine {
    binary: &'static str,
}

impl GenericEngine {
    pub fn docker() -> Self {
        GenericEngine { binary: "docker" }
    }

    pub fn podman() -> Self {
        GenericEngine { binary: "podman" }
    }

    fn run_args(&self, container_id: &str, config: &SandboxConfig, argv: &[String]) -> Vec<String> {
        let mut args = vec!["run".to_string(), "--rm".to_string(), "--name".to_string(), container_id.to_string()];

        match config.network {
            NetworkMode::None => args.extend(["--network".to_string(), "none".to_string()]),
            NetworkMode::Bridge => args.extend(["--network".to_string(), "bridge".to_string()]),
        }
        if let Some(mb) = config.memory_limit_mb {
            args.extend(["--memory".to_string(), format!("{mb}m")]);
        }
        if let Some(cpu) = config.cpu_limit {
            args.extend(["--cpus".to_string(), format!("{cpu}")]);
        }
        for mount in &config.mounts {
            let spec = if mount.read_only {
                format!("{}:{}:ro", mount.source, mount.target)
            } else {
                format!("{}:{}", mount.source, mount.target)
            };
            args.extend(["-v".to_string(), spec]);
        }
        for (k, v) in &config.env {
            args.extend(["-e".to_string(), format!("{k}={v}")]);
        }
        if let Some(wd) = &config.working_dir {
            args.extend(["-w".to_string(), wd.clone()]);
        }
        args.push(config.image.clone());
        args.extend(argv.iter().cloned());
        args
    }
}

#[async_trait]
impl ContainerEngine for GenericEngine {
    fn name(&self) -> &'static str {
        self.binary
    }

    async fn is_available(&self) -> bool {
        let probe = Command::new(self.binary).arg("info").stdout(Stdio::null()).stderr(Stdio::null()).status().await;
        matches!(probe, Ok(status) if status.success())
    }

    async fn run(&self, container_id: &str, config: &SandboxConfig, argv: &[String]) -> Result<SandboxResult, ForgeError> {
        let args = self.run_args(container_id, config, argv);
        let start = tokio::time::Instant::now();

        let spawn_result = Command::new(self.binary).args(&args).stdout(Stdio::piped()).stderr(Stdio::piped()).spawn();

        let mut child = match spawn_result {
            Ok(c) => c,
            Err(e) => return Err(ForgeError::Other(anyhow::anyhow!("failed to spawn {}: {e}", self.binary))),
        };

        let stdout_pipe = child.stdout.take().expect("piped stdout");
        let stderr_pipe = child.stderr.take().expect("piped stderr");
        let mut stdout_lines = BufReader::new(stdout_pipe).lines();
        let mut stderr_lines = BufReader::new(stderr_pipe).lines();

        let mut output = String::new();
        let mut logs = String::new();
        let mut stdout_done = false;
        let mut stderr_done = false;
        let mut timed_out = false;

        let deadline = tokio::time::Instant::now() + Duration::from_secs(config.timeout_secs);

        while !stdout_done || !stderr_done {
            tokio::select! {
                biased;
                line = stdout_lines.next_line(), if !stdout_done => {
                    match line {
                        Ok(Some(l)) => append_bounded(&mut output, &l),
                        _ => stdout_done = true,
                    }
                }
                line = stderr_lines.next_line(), if !stderr_done => {
                    match line {
                        Ok(Some(l)) => append_bounded(&mut logs, &l),
                        _ => stderr_done = true,
                    }
                }
                _ = tokio::time::sleep_until(deadline) => {
                    timed_out = true;
                    let _ = child.kill().await;
                    break;
                }
            }
        }

        let duration_sec = start.elapsed().as_secs_f64();

        if timed_out {
            return Ok(SandboxResult {
                output,
                logs,
                exit_code: -1,
                duration_sec,
                container_id: Some(container_id.to_string()),
                success: false,
                error: Some(format!("timed out after {}s", config.timeout_secs)),
            });
        }

        let status = child.wait().await;
        let exit_code = status.as_ref().ok().and_then(|s| s.code()).unwrap_or(-1);
        let success = status.map(|s| s.success()).unwrap_or(false);

        Ok(SandboxResult {
            output,
            logs,
            exit_code,
            duration_sec,
            container_id: Some(container_id.to_string()),
            success,
            error: if success { None } else { Some(format!("exited with code {exit_code}")) },
        })
    }

    async fn cleanup(&self, container_id: &str) {
        let result = Command::new(self.binary).args(["rm", "-f", container_id]).stdout(Stdio::null()).stderr(Stdio::null()).status().await;
        if !matches!(result, Ok(status) if status.success()) {
            tracing::warn!(engine = self.binary, container_id, "sandbox cleanup failed");
        }
    }
}

fn append_bounded(buf: &mut String, line: &str) {
    if buf.len() >= MAX_OUTPUT_BYTES {
        return;
    }
    if !buf.is_empty() {
        buf.push('\n');
    }
    buf.push_str(line);
}
