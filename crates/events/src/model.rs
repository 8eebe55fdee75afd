use serde::{Deserialize, Serialize};

/// The closed set of topics emitters publish to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    #[serde(rename = "context.progress")]
    ContextProgress,
    #[serde(rename = "stream.chunk")]
    StreamChunk,
    #[serde(rename = "task.stateChange")]
    TaskStateChange,
    #[serde(rename = "verify.stageResult")]
    VerifyStageResult,
    #[serde(rename = "task.error")]
    TaskError,
}

impl Topic {
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::ContextProgress => "context.progress",
            Topic::StreamChunk => "stream.chunk",
            Topic::TaskStateChange => "task.stateChange",
            Topic::VerifyStageResult => "verify.stageResult",
            Topic::TaskError => "task.error",
        }
    }
}

/// One topic's payload shape, mirroring the teacher's single
/// event-enum-per-producer convention rather than an untyped JSON blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Payload {
    ContextProgress { current: usize, total: usize },
    StreamChunk { content: String, done: bool, finish_reason: Option<String> },
    TaskStateChange { node_id: String, state: String },
    VerifyStageResult { stage: String, pass: bool, findings: usize },
    TaskError { node_id: Option<String>, message: String },
}

impl Payload {
    pub fn topic(&self) -> Topic {
        match self {
            Payload::ContextProgress { .. } => Topic::ContextProgress,
            Payload::StreamChunk { .. } => Topic::StreamChunk,
            Payload::TaskStateChange { .. } => Topic::TaskStateChange,
            Payload::VerifyStageResult { .. } => Topic::VerifyStageResult,
            Payload::TaskError { .. } => Topic::TaskError,
        }
    }
}

/// A published event: topic, payload, and a bus-assigned sequence number
/// that lets a subscriber detect gaps after a `Lagged` broadcast error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub topic: Topic,
    pub payload: Payload,
    pub seq: u64,
}
