use forge_common::ForgeError;

/// Initializes the process-wide `tracing` subscriber from `RUST_LOG`,
/// defaulting every `forge` target to `info` when unset. Call once, at
/// process start.
pub fn init_logging() -> Result<(), ForgeError> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("forge=info"))
        .map_err(|e| ForgeError::Other(anyhow::anyhow!(e)))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| ForgeError::Other(anyhow::anyhow!(e)))
}
