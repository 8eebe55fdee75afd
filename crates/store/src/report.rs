use std::fs::File;
use std::path::PathBuf;

use fs2::FileExt;
use forge_common::{new_id, now_rfc3339, ForgeError};
use serde::{Deserialize, Serialize};

/// `{id, taskId, type, title, summary, content, createdAt, updatedAt}`,
/// one JSON document per id under `<configDir>/reports/<id>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub task_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub summary: String,
    pub content: serde_json::Value,
    pub created_at: String,
    pub updated_at: String,
}

/// File-backed report store, one document per id, grounded on the
/// teacher's per-id JSON task files (`.lock`-guarded read/modify/write,
/// `fs2::FileExt::lock_exclusive`).
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        ReportStore { dir: config_dir.into().join("reports") }
    }

    fn lock_path(&self) -> PathBuf {
        self.dir.join(".lock")
    }

    fn acquire_lock(&self) -> Result<File, ForgeError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| ForgeError::Other(e.into()))?;
        let path = self.lock_path();
        if !path.exists() {
            std::fs::write(&path, b"").map_err(|e| ForgeError::Other(e.into()))?;
        }
        let file = std::fs::OpenOptions::new().read(true).write(true).open(&path).map_err(|e| ForgeError::Other(e.into()))?;
        file.lock_exclusive().map_err(|e| ForgeError::Other(e.into()))?;
        Ok(file)
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Creates a new report with a fresh id. Idempotent in the sense that a
    /// write-then-rename never leaves a half-written document behind.
    pub fn create(&self, task_id: &str, kind: &str, title: &str, summary: &str, content: serde_json::Value) -> Result<Report, ForgeError> {
        let lock = self.acquire_lock()?;
        let now = now_rfc3339();
        let report = Report { id: new_id(), task_id: task_id.to_string(), kind: kind.to_string(), title: title.to_string(), summary: summary.to_string(), content, created_at: now.clone(), updated_at: now };
        self.write(&report)?;
        drop(lock);
        Ok(report)
    }

    pub fn load(&self, id: &str) -> Result<Report, ForgeError> {
        let path = self.path_for(id);
        let content = std::fs::read_to_string(&path).map_err(|_| ForgeError::Path(format!("report '{id}' not found")))?;
        serde_json::from_str(&content).map_err(|e| ForgeError::Parse(e.to_string()))
    }

    pub fn list(&self) -> Result<Vec<Report>, ForgeError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut reports = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(|e| ForgeError::Other(e.into()))?.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.ends_with(".json") {
                continue;
            }
            if let Ok(content) = std::fs::read_to_string(entry.path()) {
                if let Ok(report) = serde_json::from_str::<Report>(&content) {
                    reports.push(report);
                }
            }
        }
        reports.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(reports)
    }

    fn write(&self, report: &Report) -> Result<(), ForgeError> {
        let json = serde_json::to_string_pretty(report).map_err(|e| ForgeError::Parse(e.to_string()))?;
        let final_path = self.path_for(&report.id);
        let tmp_path = self.dir.join(format!(".{}.json.tmp", report.id));
        std::fs::write(&tmp_path, json).map_err(|e| ForgeError::Other(e.into()))?;
        std::fs::rename(&tmp_path, &final_path).map_err(|e| ForgeError::Other(e.into()))?;
        Ok(())
    }
}
