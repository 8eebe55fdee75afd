//! Verification Pipeline: runs format/build/test/security stages against a
//! workspace through a per-language adapter registry, narrowing the test
//! stage to call-graph-affected files when a symbol index is available.

mod adapters;
mod model;
mod pipeline;
mod targeted;

pub use adapters::{detect_adapter, Commands, GoAdapter, LanguageVerifyAdapter, NodeAdapter, PythonAdapter, RustAdapter};
pub use model::{ErrorDetails, ErrorType, Severity, Stage, StageResult, VerificationPolicy, VerificationReport};
pub use pipeline::VerificationPipeline;
pub use targeted::affected_files;
