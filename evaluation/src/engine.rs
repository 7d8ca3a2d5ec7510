//! Evaluation engine.
//!
//! Pure function of (transcript, task, artifact snapshot) plus one
//! generative-assist call per dimension group. All numeric aggregation is
//! deterministic and local; backend failure degrades to conservative
//! defaults instead of erroring. Evaluation never raises to its caller.

use chrono::Utc;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use taala_inference::{ChatMessage, Role};

use crate::backend::{
    CapabilityAssist, ContentAssist, ScoringBackend, ScoringContext, TemplateScoringBackend,
};
use crate::report::{
    clamp_score, AiCapability, ContentDimensions, ContentScore, EvaluationReport, Metrics,
    PromptStyle, PromptStyleType, ScoreItem,
};
use crate::task::ChallengeTask;

/// Scoring constants. These are product policy, tunable as a block, not a
/// calibrated metric model.
mod policy {
    /// Base of the overall capability formula
    pub const BASE_SCORE: f64 = 75.0;
    /// Cap on the per-interaction bonus
    pub const ITERATION_BONUS_CAP: f64 = 10.0;
    /// Cap on the average-length bonus
    pub const LENGTH_BONUS_CAP: f64 = 5.0;
    /// Bonus for an attached image artifact
    pub const IMAGE_BONUS: f64 = 5.0;
    /// Hard ceiling on the overall score
    pub const OVERALL_CAP: f64 = 98.0;

    /// Task-decomposition branch: score when the user split the work up
    pub const DECOMPOSED_SCORE: u32 = 90;
    pub const MONOLITHIC_SCORE: u32 = 75;
    /// Reflection branch: score with / without mid-task correction
    pub const ITERATIVE_SCORE: u32 = 92;
    pub const SINGLE_PASS_SCORE: u32 = 70;

    /// Conservative score substituted when the assist backend is down
    pub const DEGRADED_SCORE: u32 = 60;

    /// Placeholder until a real adoption-tracking source exists
    pub const ADOPTION_RATE_PLACEHOLDER: f64 = 0.85;
}

/// Snapshot of the artifacts produced during a test round.
#[derive(Debug, Clone, Default)]
pub struct ArtifactSnapshot {
    pub title: Option<String>,
    pub content: Option<String>,
    pub image: Option<String>,
}

/// Classify the prompting style. First matching rule wins.
pub fn classify_prompt_style(avg_length: f64, interaction_count: usize) -> PromptStyleType {
    if avg_length > 100.0 && interaction_count < 5 {
        PromptStyleType::Comprehensive
    } else if interaction_count > 8 {
        PromptStyleType::Conversational
    } else {
        PromptStyleType::Mixed
    }
}

/// Overall capability score: base plus capped interaction, length, and
/// image bonuses, floored, never above the cap.
pub fn overall_capability_score(
    interaction_count: usize,
    avg_length: f64,
    has_image: bool,
) -> u32 {
    let iteration_bonus = ((interaction_count * 2) as f64).min(policy::ITERATION_BONUS_CAP);
    let length_bonus = (avg_length / 10.0).min(policy::LENGTH_BONUS_CAP);
    let image_bonus = if has_image { policy::IMAGE_BONUS } else { 0.0 };

    let raw = policy::BASE_SCORE + iteration_bonus + length_bonus + image_bonus;
    clamp_score(raw.min(policy::OVERALL_CAP))
}

/// Evaluation engine with an injected scoring backend.
pub struct EvaluationEngine {
    backend: Arc<dyn ScoringBackend>,
}

impl EvaluationEngine {
    pub fn new(backend: Arc<dyn ScoringBackend>) -> Self {
        Self { backend }
    }

    /// Engine over the deterministic template backend.
    pub fn with_template_backend() -> Self {
        Self::new(Arc::new(TemplateScoringBackend))
    }

    /// Produce a report. Infallible: backend unavailability degrades the
    /// assisted dimensions but always yields a complete, well-formed report.
    pub async fn evaluate(
        &self,
        transcript: &[ChatMessage],
        task: &ChallengeTask,
        snapshot: &ArtifactSnapshot,
        session_secs: u64,
    ) -> EvaluationReport {
        let user_messages: Vec<&ChatMessage> = transcript
            .iter()
            .filter(|m| m.role == Role::User)
            .collect();
        let interaction_count = user_messages.len();

        if interaction_count == 0 {
            return degenerate_report();
        }

        let total_chars: usize = user_messages
            .iter()
            .map(|m| m.content.chars().count())
            .sum();
        let avg_length = total_chars as f64 / interaction_count as f64;
        let has_image = snapshot.image.is_some();

        let ctx = ScoringContext {
            transcript: transcript.to_vec(),
            task: task.clone(),
            snapshot: snapshot.clone(),
            interaction_count,
            avg_length,
        };

        let content_assist = match self.backend.assist_content(&ctx).await {
            Ok(assist) => normalize_content(assist),
            Err(err) => {
                warn!(error = %err, "content assist unavailable, degrading");
                degraded_content()
            }
        };
        let capability_assist = match self.backend.assist_capability(&ctx).await {
            Ok(assist) => normalize_capability(assist),
            Err(err) => {
                warn!(error = %err, "capability assist unavailable, degrading");
                degraded_capability()
            }
        };

        let style = classify_prompt_style(avg_length, interaction_count);
        let overall = overall_capability_score(interaction_count, avg_length, has_image);

        let task_decomposition = if interaction_count > 3 {
            ScoreItem::new(
                policy::DECOMPOSED_SCORE,
                "展现了优秀的分步执行能力，先定大纲再填内容，逻辑清晰。",
                vec![format!("将任务拆分为 {} 个交互步骤。", interaction_count)],
            )
        } else {
            ScoreItem::new(
                policy::MONOLITHIC_SCORE,
                "倾向于一次性生成所有内容，建议尝试将任务拆解为'选题-大纲-正文'多步进行。",
                vec![format!("将任务拆分为 {} 个交互步骤。", interaction_count)],
            )
        };

        let reflection_iteration = if interaction_count > 5 {
            ScoreItem::new(
                policy::ITERATIVE_SCORE,
                "具备极强的迭代意识，通过多轮对话不断修正AI的输出，最终效果显著提升。",
                vec!["第 3 轮交互中提出了具体的修改意见。".to_string()],
            )
        } else {
            ScoreItem::new(
                policy::SINGLE_PASS_SCORE,
                "较少进行追问和修正，建议在AI输出不完美时大胆提出修改意见。",
                vec!["交互轮次较少，未进行深度迭代。".to_string()],
            )
        };

        let content_total = {
            let dims = [
                content_assist.ai_trace.score,
                content_assist.goal_alignment.score,
                content_assist.positioning.score,
            ];
            (dims.iter().sum::<u32>() as f64 / dims.len() as f64).round() as u32
        };

        EvaluationReport {
            id: Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            task_id: format!("test-{}", Uuid::new_v4()),
            content_score: ContentScore {
                total: content_total,
                dimensions: ContentDimensions {
                    ai_trace: content_assist.ai_trace,
                    goal_alignment: content_assist.goal_alignment,
                    positioning: content_assist.positioning,
                },
                analysis: content_assist.analysis,
            },
            ai_capability: AiCapability {
                problem_framing: capability_assist.problem_framing,
                task_decomposition,
                quality_evaluation: capability_assist.quality_evaluation,
                context_engineering: capability_assist.context_engineering,
                human_ai_boundary: capability_assist.human_ai_boundary,
                reflection_iteration,
                overall_score: overall,
                summary: capability_assist.summary,
            },
            prompt_style: PromptStyle {
                kind: style,
                analysis: style_analysis(style).to_string(),
                evidence: vec![
                    format!("平均指令长度: {} 字符", avg_length.floor() as u64),
                    format!("总交互轮次: {} 次", interaction_count),
                ],
            },
            metrics: Metrics {
                interaction_count,
                adoption_rate: policy::ADOPTION_RATE_PLACEHOLDER,
                duration: session_secs,
            },
        }
    }
}

fn style_analysis(style: PromptStyleType) -> &'static str {
    match style {
        PromptStyleType::Comprehensive => {
            "你倾向于通过一个详尽的 Prompt 一次性解决问题。这种风格适合明确的任务，但面对复杂创作时，可能导致 AI 顾此失彼。"
        }
        PromptStyleType::Conversational => {
            "你喜欢通过对话一步步引导 AI。这是一种非常高效的协作模式，能够精准控制每个环节的产出质量。"
        }
        PromptStyleType::Mixed => {
            "你灵活结合了长指令与短对话，既有全局观又能处理细节，继续保持！"
        }
    }
}

fn normalize_content(assist: ContentAssist) -> ContentAssist {
    ContentAssist {
        ai_trace: assist.ai_trace.clamped(),
        goal_alignment: assist.goal_alignment.clamped(),
        positioning: assist.positioning.clamped(),
        analysis: assist.analysis,
    }
}

fn normalize_capability(assist: CapabilityAssist) -> CapabilityAssist {
    CapabilityAssist {
        problem_framing: assist.problem_framing.clamped(),
        quality_evaluation: assist.quality_evaluation.clamped(),
        context_engineering: assist.context_engineering.clamped(),
        human_ai_boundary: assist.human_ai_boundary.clamped(),
        summary: assist.summary,
    }
}

fn degraded_item() -> ScoreItem {
    ScoreItem::new(
        policy::DEGRADED_SCORE,
        "评估服务降级，使用保守默认分。",
        Vec::new(),
    )
}

fn degraded_content() -> ContentAssist {
    ContentAssist {
        ai_trace: degraded_item(),
        goal_alignment: degraded_item(),
        positioning: degraded_item(),
        analysis: "生成式评估服务暂时不可用，本次内容评估采用保守默认分。".to_string(),
    }
}

fn degraded_capability() -> CapabilityAssist {
    CapabilityAssist {
        problem_framing: degraded_item(),
        quality_evaluation: degraded_item(),
        context_engineering: degraded_item(),
        human_ai_boundary: degraded_item(),
        summary: "生成式评估服务暂时不可用，能力评估采用保守默认分。".to_string(),
    }
}

/// Fixed report for a transcript with no user input. Never calls the
/// scoring backend.
fn degenerate_report() -> EvaluationReport {
    let no_input = || ScoreItem::zero("无有效输入");
    let not_started = || ScoreItem::zero("未开始任务");

    EvaluationReport {
        id: Uuid::new_v4().to_string(),
        generated_at: Utc::now(),
        task_id: format!("test-{}", Uuid::new_v4()),
        content_score: ContentScore {
            total: 0,
            dimensions: ContentDimensions {
                ai_trace: no_input(),
                goal_alignment: no_input(),
                positioning: no_input(),
            },
            analysis: "未检测到任何用户交互。请在对话框中输入指令与 AI 协作完成任务。"
                .to_string(),
        },
        ai_capability: AiCapability {
            problem_framing: not_started(),
            task_decomposition: not_started(),
            quality_evaluation: not_started(),
            context_engineering: not_started(),
            human_ai_boundary: not_started(),
            reflection_iteration: not_started(),
            overall_score: 0,
            summary: "本次测试未检测到有效操作。请尝试向 AI 发送指令，引导它完成小红书笔记创作。"
                .to_string(),
        },
        prompt_style: PromptStyle {
            kind: PromptStyleType::Mixed,
            analysis: "无".to_string(),
            evidence: Vec::new(),
        },
        metrics: Metrics {
            interaction_count: 0,
            adoption_rate: 0.0,
            duration: 0,
        },
    }
}
