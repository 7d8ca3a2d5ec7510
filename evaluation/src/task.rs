//! Challenge-task acquisition.
//!
//! One generative call produces the round's task; any transport or parse
//! failure falls back to a fixed task so acquisition never blocks the
//! rest of the flow.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use taala_inference::{ChatBackend, ChatMessage};

use crate::backend::ScoringError;
use crate::json::strip_code_fences;

/// The structured goal description driving one capability-test round.
/// Immutable once acquired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeTask {
    pub title: String,
    pub value: String,
    pub positioning: String,
    pub goal: String,
}

const TASK_PROMPT: &str = r#"你是一个小红书运营专家。请随机生成一个具体的、有挑战性的小红书运营任务，用于测试运营人员的能力。

任务范围（随机选择其一）：
1. 美妆护肤类（如平价好物、成分党分析）
2. 穿搭时尚类（如季节搭配、显瘦技巧）
3. 家居生活类（如收纳整理、租房改造）
4. 美食探店类（如独居食谱、网红店测评）
5. 职场干货类（如面试技巧、工具推荐）

请严格按照以下 JSON 格式返回（纯 JSON，不要 Markdown）：
{
  "title": "任务标题（如：为一款平价国货散粉生成夏季控油测评笔记）",
  "value": "核心价值（如：通过真实测评展示产品的极致性价比与持妆能力，建立'学生党/油皮救星'的品牌心智。）",
  "positioning": "人设定位（如：专注于平价好物挖掘的真实测评博主，语气真诚、接地气，拒绝过度营销感。）",
  "goal": "核心目标（如：产出一篇高互动图文笔记（预期点赞收藏 500+），重点突出'8小时不脱妆'与'磨皮级柔焦'两大卖点，引导用户在评论区求链接。）"
}"#;

/// Task acquisition over a chat backend.
pub struct TaskService {
    backend: Arc<dyn ChatBackend>,
}

impl TaskService {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    /// The hard-coded task used when generation fails.
    pub fn fallback() -> ChallengeTask {
        ChallengeTask {
            title: "为一款平价国货散粉生成夏季控油测评笔记".to_string(),
            value: "核心价值：通过真实测评展示产品的极致性价比与持妆能力，建立'学生党/油皮救星'的品牌心智。"
                .to_string(),
            positioning: "人设定位：专注于平价好物挖掘的真实测评博主，语气真诚、接地气，拒绝过度营销感。"
                .to_string(),
            goal: "核心目标：产出一篇高互动图文笔记（预期点赞收藏 500+），重点突出'8小时不脱妆'与'磨皮级柔焦'两大卖点，引导用户在评论区求链接。"
                .to_string(),
        }
    }

    /// Fetch a fresh task. Never fails: generation or parse errors return
    /// the fixed fallback task.
    pub async fn fetch(&self) -> ChallengeTask {
        match self.try_fetch().await {
            Ok(task) => task,
            Err(err) => {
                warn!(error = %err, "task generation failed, using fallback task");
                Self::fallback()
            }
        }
    }

    async fn try_fetch(&self) -> Result<ChallengeTask, ScoringError> {
        let messages = [
            ChatMessage::system(TASK_PROMPT),
            ChatMessage::user("请生成一个新的测试任务"),
        ];
        let response = self.backend.complete(&messages).await?;
        let json = strip_code_fences(&response);
        serde_json::from_str(&json).map_err(|e| ScoringError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taala_inference::MockBackend;

    #[tokio::test]
    async fn test_fetch_parses_generated_task() {
        let backend = Arc::new(MockBackend::default().with_response(
            r#"{"title":"冬季护手霜横评","value":"真实对比","positioning":"成分党博主","goal":"高收藏横评笔记"}"#,
        ));
        let service = TaskService::new(backend);

        let task = service.fetch().await;
        assert_eq!(task.title, "冬季护手霜横评");
    }

    #[tokio::test]
    async fn test_fetch_strips_markdown_fences() {
        let backend = Arc::new(MockBackend::default().with_response(
            "```json\n{\"title\":\"租房改造\",\"value\":\"v\",\"positioning\":\"p\",\"goal\":\"g\"}\n```",
        ));
        let service = TaskService::new(backend);

        let task = service.fetch().await;
        assert_eq!(task.title, "租房改造");
    }

    #[tokio::test]
    async fn test_backend_failure_returns_fallback_without_raising() {
        let backend = Arc::new(MockBackend::default().with_failure(true));
        let service = TaskService::new(backend);

        let task = service.fetch().await;
        assert_eq!(task, TaskService::fallback());
    }

    #[tokio::test]
    async fn test_unparseable_response_returns_fallback() {
        let backend = Arc::new(MockBackend::default().with_response("抱歉，我无法生成任务。"));
        let service = TaskService::new(backend);

        let task = service.fetch().await;
        assert_eq!(task, TaskService::fallback());
    }
}
