//! Generative-assist scoring backends.
//!
//! The engine computes its formula-driven dimensions locally and delegates
//! the judgement-call dimensions here, one call per dimension group. The
//! seam is a trait so the deterministic heuristics can be unit-tested
//! without a live model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use taala_inference::{ChatBackend, ChatMessage, InferenceError};

use crate::engine::ArtifactSnapshot;
use crate::json::strip_code_fences;
use crate::report::ScoreItem;
use crate::task::ChallengeTask;

/// Error from a scoring backend. Always absorbed by the engine.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("Backend error: {0}")]
    Backend(#[from] InferenceError),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Everything a backend may consider when scoring.
#[derive(Debug, Clone)]
pub struct ScoringContext {
    pub transcript: Vec<ChatMessage>,
    pub task: ChallengeTask,
    pub snapshot: ArtifactSnapshot,
    pub interaction_count: usize,
    pub avg_length: f64,
}

/// Assisted scores for the content dimension group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentAssist {
    pub ai_trace: ScoreItem,
    pub goal_alignment: ScoreItem,
    pub positioning: ScoreItem,
    pub analysis: String,
}

/// Assisted scores for the capability dimension group.
///
/// Task decomposition and reflection/iteration are computed by the engine's
/// own heuristics and are not part of the assist.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityAssist {
    pub problem_framing: ScoreItem,
    pub quality_evaluation: ScoreItem,
    pub context_engineering: ScoreItem,
    pub human_ai_boundary: ScoreItem,
    pub summary: String,
}

/// Scoring seam injected into the engine.
#[async_trait]
pub trait ScoringBackend: Send + Sync {
    /// Score the content dimension group.
    async fn assist_content(&self, ctx: &ScoringContext) -> Result<ContentAssist, ScoringError>;

    /// Score the capability dimension group.
    async fn assist_capability(
        &self,
        ctx: &ScoringContext,
    ) -> Result<CapabilityAssist, ScoringError>;
}

/// Deterministic backend reproducing the product's calibrated comment
/// templates. Used as the default and in tests.
#[derive(Debug, Default)]
pub struct TemplateScoringBackend;

#[async_trait]
impl ScoringBackend for TemplateScoringBackend {
    async fn assist_content(&self, ctx: &ScoringContext) -> Result<ContentAssist, ScoringError> {
        let title = ctx
            .snapshot
            .title
            .clone()
            .unwrap_or_else(|| ctx.task.title.clone());
        let has_image = ctx.snapshot.image.is_some();

        let image_note = if has_image {
            "配图生成成功，视觉效果良好。"
        } else {
            "未检测到最终配图，建议配合图片提升笔记吸引力。"
        };

        Ok(ContentAssist {
            ai_trace: ScoreItem::new(
                85,
                "AI 痕迹控制尚可，但部分连接词仍显生硬。",
                vec![
                    "检测到'首先'、'其次'等结构化连接词使用频率较高。".to_string(),
                    "表情包使用密度适中，符合真人习惯。".to_string(),
                ],
            ),
            goal_alignment: ScoreItem::new(
                90,
                "内容高度符合任务设定的核心目标。",
                vec![
                    "正文明确提到了任务要求的核心卖点。".to_string(),
                    format!("标题\"{}\"具有较强吸引力。", title),
                ],
            ),
            positioning: ScoreItem::new(
                88,
                "语气和人设基本符合定位要求。",
                vec![
                    "使用了第一人称叙述。".to_string(),
                    "口语化表达占比 70% 以上。".to_string(),
                ],
            ),
            analysis: format!(
                "生成的内容结构完整，能够覆盖任务要求的痛点与解决方案。{}但在'小红书味'（如表情包密度、口语化程度）上还有提升空间。",
                image_note
            ),
        })
    }

    async fn assist_capability(
        &self,
        ctx: &ScoringContext,
    ) -> Result<CapabilityAssist, ScoringError> {
        let framing_evidence = if ctx.interaction_count > 0 {
            vec!["首轮指令包含了明确的任务背景设定。".to_string()]
        } else {
            Vec::new()
        };

        Ok(CapabilityAssist {
            problem_framing: ScoreItem::new(
                85,
                "能够清晰定义任务目标，但在初始Prompt中对'目标受众'的描述还可以更具体。",
                framing_evidence,
            ),
            quality_evaluation: ScoreItem::new(
                82,
                "对AI生成内容的幻觉（如虚构成分）有基本的辨识能力，但对'网感'的把控还需加强。",
                vec![
                    "未出现明显的逻辑矛盾。".to_string(),
                    "修正了 AI 生成的生硬表达。".to_string(),
                ],
            ),
            context_engineering: ScoreItem::new(
                88,
                "能够有效地将任务背景（平价、学生党）传递给AI，上下文保持良好。",
                vec!["指令中包含'学生党'、'平价'等上下文约束关键词。".to_string()],
            ),
            human_ai_boundary: ScoreItem::new(
                80,
                "能够主导创作方向，但在具体文案润色上可能过度依赖AI，建议保留更多个人风格。",
                vec!["主要依赖 AI 生成完整段落，人工修改痕迹较少。".to_string()],
            ),
            summary: "你已经具备了良好的 AI 协作基础，特别是在明确任务目标方面表现出色。进阶建议：尝试更精细的任务拆解，并像'主编'一样严格审核 AI 的输出，多轮打磨以追求极致效果。".to_string(),
        })
    }
}

const CONTENT_ASSIST_PROMPT: &str = r#"你是一个小红书内容评估专家。请根据用户与 AI 的协作记录和任务要求，对最终内容进行三个维度的评分（0-100）：aiTrace（AI 痕迹控制）、goalAlignment（目标契合度）、positioning（人设定位契合度）。
请严格按照以下 JSON 格式返回（纯 JSON，不要 Markdown）：
{
  "aiTrace": { "score": 85, "comment": "点评", "evidence": ["依据"] },
  "goalAlignment": { "score": 90, "comment": "点评", "evidence": ["依据"] },
  "positioning": { "score": 88, "comment": "点评", "evidence": ["依据"] },
  "analysis": "整体分析"
}"#;

const CAPABILITY_ASSIST_PROMPT: &str = r#"你是一个 AI 协作能力评估专家。请根据用户与 AI 的协作记录，对以下四个维度评分（0-100）：problemFraming（问题定义）、qualityEvaluation（质量评估）、contextEngineering（上下文工程）、humanAIBoundary（人机分工）。
请严格按照以下 JSON 格式返回（纯 JSON，不要 Markdown）：
{
  "problemFraming": { "score": 85, "comment": "点评", "evidence": ["依据"] },
  "qualityEvaluation": { "score": 82, "comment": "点评", "evidence": ["依据"] },
  "contextEngineering": { "score": 88, "comment": "点评", "evidence": ["依据"] },
  "humanAIBoundary": { "score": 80, "comment": "点评", "evidence": ["依据"] },
  "summary": "总体评价与建议"
}"#;

/// Backend that drives a chat model with a strict-JSON contract.
pub struct LlmScoringBackend {
    backend: Arc<dyn ChatBackend>,
}

impl LlmScoringBackend {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    fn render_context(ctx: &ScoringContext) -> String {
        let mut rendered = format!(
            "任务：{}\n目标：{}\n定位：{}\n\n协作记录：\n",
            ctx.task.title, ctx.task.goal, ctx.task.positioning
        );
        for message in &ctx.transcript {
            let role = match message.role {
                taala_inference::Role::User => "用户",
                taala_inference::Role::Assistant => "AI",
                taala_inference::Role::System => "系统",
            };
            rendered.push_str(&format!("[{}] {}\n", role, message.content));
        }
        if let Some(content) = &ctx.snapshot.content {
            rendered.push_str(&format!("\n最终笔记内容：\n{}\n", content));
        }
        rendered
    }

    async fn ask<T: serde::de::DeserializeOwned>(
        &self,
        system_prompt: &str,
        ctx: &ScoringContext,
    ) -> Result<T, ScoringError> {
        let messages = [
            ChatMessage::system(system_prompt),
            ChatMessage::user(Self::render_context(ctx)),
        ];
        let response = self.backend.complete(&messages).await?;
        let json = strip_code_fences(&response);
        serde_json::from_str(&json).map_err(|e| ScoringError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ScoringBackend for LlmScoringBackend {
    async fn assist_content(&self, ctx: &ScoringContext) -> Result<ContentAssist, ScoringError> {
        self.ask(CONTENT_ASSIST_PROMPT, ctx).await
    }

    async fn assist_capability(
        &self,
        ctx: &ScoringContext,
    ) -> Result<CapabilityAssist, ScoringError> {
        self.ask(CAPABILITY_ASSIST_PROMPT, ctx).await
    }
}
