use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    None,
    Bridge,
}

impl Default for NetworkMode {
    fn default() -> Self {
        NetworkMode::None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mount {
    pub source: String,
    pub target: String,
    pub read_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Docker,
    Podman,
}

/// Per-call sandbox policy: the caller declares caps and mounts, the runner
/// picks and probes a container engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    pub image: String,
    #[serde(default)]
    pub engine: Option<Engine>,
    #[serde(default)]
    pub network: NetworkMode,
    #[serde(default)]
    pub memory_limit_mb: Option<u64>,
    #[serde(default)]
    pub cpu_limit: Option<f64>,
    pub timeout_secs: u64,
    #[serde(default)]
    pub mounts: Vec<Mount>,
    #[serde(default)]
    pub env: Vec<(String, String)>,
    #[serde(default)]
    pub working_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SandboxResult {
    pub output: String,
    pub logs: String,
    pub exit_code: i32,
    pub duration_sec: f64,
    pub container_id: Option<String>,
    pub success: bool,
    pub error: Option<String>,
}
