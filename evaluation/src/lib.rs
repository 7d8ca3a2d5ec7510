//! Taala Evaluation - multi-dimensional capability scoring
//!
//! Converts a conversation transcript plus produced artifacts into a
//! structured report:
//! - Deterministic heuristics (interaction counts, prompt-style
//!   classification, the overall capability formula)
//! - A pluggable generative-assist backend for the judgement-call
//!   dimensions
//! - Task acquisition with a fixed fallback so the flow never blocks on
//!   backend unavailability

pub mod backend;
pub mod engine;
pub mod json;
pub mod report;
pub mod task;

// Re-export main types for convenience
pub use backend::{
    CapabilityAssist, ContentAssist, LlmScoringBackend, ScoringBackend, ScoringContext,
    ScoringError, TemplateScoringBackend,
};
pub use engine::{ArtifactSnapshot, EvaluationEngine};
pub use report::{
    AiCapability, ContentDimensions, ContentScore, EvaluationReport, Metrics, PromptStyle,
    PromptStyleType, ScoreItem,
};
pub use task::{ChallengeTask, TaskService};
