//! Taskflow Engine: asks the AI facade to decompose a task into a DAG,
//! schedules ready nodes under bounded concurrency, and drives each node's
//! `ContextBuilder -> AIFacade -> EditApplyEngine -> VerificationPipeline`
//! action pipeline with bounded self-correction on failure.

mod analyzer;
mod budget;
mod dag;
mod engine;
mod model;

pub use analyzer::{CorrectionEngine, CorrectiveAction, ErrorAnalyzer};
pub use budget::TaskBudgets;
pub use dag::DagError;
pub use engine::Engine;
pub use model::{NodeKind, NodeState, PlanNodeSpec, SLAPolicy, TaskResult, TaskflowNode, TaskflowPlan};
