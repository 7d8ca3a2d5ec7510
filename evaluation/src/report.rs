//! Report data model.
//!
//! Field names serialize in camelCase so reports match the JSON shape the
//! surrounding product consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One scored dimension: numeric score, comment, supporting evidence.
///
/// Score and comment are always produced together; evidence defaults to
/// empty rather than being absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreItem {
    pub score: u32,
    pub comment: String,
    #[serde(default)]
    pub evidence: Vec<String>,
}

impl ScoreItem {
    /// Create an item, clamping the score into [0, 100].
    pub fn new(score: u32, comment: impl Into<String>, evidence: Vec<String>) -> Self {
        Self {
            score: score.min(100),
            comment: comment.into(),
            evidence,
        }
    }

    /// Zero-score item with no evidence.
    pub fn zero(comment: impl Into<String>) -> Self {
        Self::new(0, comment, Vec::new())
    }

    /// Re-clamp a deserialized item into the valid range.
    pub fn clamped(mut self) -> Self {
        self.score = self.score.min(100);
        self
    }
}

/// Clamp a raw floating-point score into [0, 100], flooring.
pub fn clamp_score(raw: f64) -> u32 {
    raw.clamp(0.0, 100.0).floor() as u32
}

/// The three content-evaluation dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentDimensions {
    pub ai_trace: ScoreItem,
    pub goal_alignment: ScoreItem,
    pub positioning: ScoreItem,
}

/// Content-evaluation dimension group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentScore {
    pub total: u32,
    pub dimensions: ContentDimensions,
    pub analysis: String,
}

/// AI-collaboration capability dimension group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiCapability {
    pub problem_framing: ScoreItem,
    pub task_decomposition: ScoreItem,
    pub quality_evaluation: ScoreItem,
    pub context_engineering: ScoreItem,
    pub human_ai_boundary: ScoreItem,
    pub reflection_iteration: ScoreItem,
    /// Derived, never above 98
    pub overall_score: u32,
    pub summary: String,
}

/// Prompting-style classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptStyleType {
    Comprehensive,
    Conversational,
    Mixed,
}

/// Prompt-style dimension group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptStyle {
    #[serde(rename = "type")]
    pub kind: PromptStyleType,
    pub analysis: String,
    #[serde(default)]
    pub evidence: Vec<String>,
}

/// Session-level interaction metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub interaction_count: usize,
    /// Fraction in [0, 1]
    pub adoption_rate: f64,
    /// Elapsed session seconds
    pub duration: u64,
}

/// Complete evaluation report. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationReport {
    pub id: String,
    pub generated_at: DateTime<Utc>,
    pub task_id: String,
    pub content_score: ContentScore,
    pub ai_capability: AiCapability,
    pub prompt_style: PromptStyle,
    pub metrics: Metrics,
}
