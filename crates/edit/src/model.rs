use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EditKind {
    FullRewrite,
    AnchorPatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnchorOp {
    Replace,
    InsertBefore,
    InsertAfter,
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anchor {
    pub before: String,
    pub after: String,
}

/// A single requested mutation. `anchor` is required when `kind` is
/// `AnchorPatch` and ignored otherwise; `op` is ignored for `FullRewrite`,
/// which always replaces the whole file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edit {
    pub id: String,
    pub path: String,
    pub language: Option<String>,
    pub kind: EditKind,
    pub op: AnchorOp,
    pub content: String,
    pub anchor: Option<Anchor>,
}

/// Prior state of a file, captured before an op mutates it. `existed=false`
/// with empty `content` means rollback should delete the file again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSnapshot {
    pub existed: bool,
    pub content: Vec<u8>,
    pub content_hash: String,
}

impl BackupSnapshot {
    pub fn capture(path: &std::path::Path) -> std::io::Result<Self> {
        match std::fs::read(path) {
            Ok(content) => {
                let content_hash = hash_bytes(&content);
                Ok(BackupSnapshot { existed: true, content, content_hash })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(BackupSnapshot { existed: false, content: Vec::new(), content_hash: hash_bytes(&[]) })
            }
            Err(e) => Err(e),
        }
    }
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResult {
    pub operation_id: String,
    pub path: String,
    pub success: bool,
    pub error: Option<String>,
    pub backup_snapshot: Option<BackupSnapshot>,
}

impl ApplyResult {
    pub fn ok(operation_id: impl Into<String>, path: impl Into<String>, backup: BackupSnapshot) -> Self {
        ApplyResult { operation_id: operation_id.into(), path: path.into(), success: true, error: None, backup_snapshot: Some(backup) }
    }

    pub fn failed(operation_id: impl Into<String>, path: impl Into<String>, error: impl Into<String>) -> Self {
        ApplyResult { operation_id: operation_id.into(), path: path.into(), success: false, error: Some(error.into()), backup_snapshot: None }
    }
}
