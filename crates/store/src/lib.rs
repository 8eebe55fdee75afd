//! Persistence: one JSON document per [`Report`] under
//! `<configDir>/reports/<id>.json`, and a single atomically-written
//! [`Settings`] object at `<configDir>/settings.json` cached in memory
//! behind a reader/writer lock.

mod report;
mod settings;

pub use report::{Report, ReportStore};
pub use settings::{Settings, SettingsStore};

/// `<dirs::config_dir()>/forge`, matching the teacher's
/// `Config::config_dir` resolution (`HOME`/`USERPROFILE` via the `dirs`
/// crate) under this project's own namespace.
pub fn default_config_dir() -> std::path::PathBuf {
    dirs::config_dir().unwrap_or_else(|| std::path::PathBuf::from(".")).join("forge")
}
