//! Capability-test controller.
//!
//! Finite-state machine over setup → testing → report. The controller is
//! the only writer of the transcript: messages are appended in response
//! to user actions and fragment arrival, and all session-scoped state is
//! discarded when a round is dismissed.

use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use taala_evaluation::{
    ArtifactSnapshot, ChallengeTask, EvaluationEngine, EvaluationReport, TaskService,
};
use taala_inference::{CancelToken, ChatBackend, ChatMessage, Role};

use crate::history::ReportHistory;
use crate::message::{Message, MessageKind};
use crate::phase::Phase;

/// User-visible reply substituted when a completion call fails.
const SERVICE_UNAVAILABLE_REPLY: &str = "抱歉，服务暂时不可用，请检查网络或 API 配置。";

/// Errors for illegal controller actions.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Action not available in the current phase
    #[error("action not available in phase {0:?}")]
    InvalidPhase(Phase),

    /// A streaming request is already in flight
    #[error("a request is already in flight")]
    Busy,

    /// Starting requires an acquired task
    #[error("no task acquired")]
    NoTask,

    /// Submitting requires at least one user-authored message
    #[error("submit requires at least one user message")]
    NoUserInput,
}

/// Orchestrates one capability-test session.
pub struct CapabilityTestController {
    phase: Phase,
    messages: Vec<Message>,
    task: Option<ChallengeTask>,
    images: Vec<String>,
    imported_content: String,
    busy: bool,
    started_at: Option<Instant>,
    report: Option<EvaluationReport>,
    backend: Arc<dyn ChatBackend>,
    engine: EvaluationEngine,
    tasks: TaskService,
    history: ReportHistory,
}

impl CapabilityTestController {
    pub fn new(backend: Arc<dyn ChatBackend>, engine: EvaluationEngine) -> Self {
        let tasks = TaskService::new(Arc::clone(&backend));
        Self {
            phase: Phase::Setup,
            messages: Vec::new(),
            task: None,
            images: Vec::new(),
            imported_content: String::new(),
            busy: false,
            started_at: None,
            report: None,
            backend,
            engine,
            tasks,
            history: ReportHistory::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn task(&self) -> Option<&ChallengeTask> {
        self.task.as_ref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn report(&self) -> Option<&EvaluationReport> {
        self.report.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn history(&self) -> &ReportHistory {
        &self.history
    }

    /// Acquire (or re-roll) the challenge task. Setup only; the phase does
    /// not change. Acquisition itself never fails, so the task slot is
    /// always filled afterwards.
    pub async fn acquire_task(&mut self) -> Result<(), SessionError> {
        if self.phase != Phase::Setup {
            return Err(SessionError::InvalidPhase(self.phase));
        }
        self.task = Some(self.tasks.fetch().await);
        Ok(())
    }

    /// Begin the testing phase. Requires an acquired task; seeds the
    /// transcript with the assistant greeting.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.phase != Phase::Setup {
            return Err(SessionError::InvalidPhase(self.phase));
        }
        let task = self.task.as_ref().ok_or(SessionError::NoTask)?;

        self.messages.push(Message::assistant(format!(
            "你好！我是你的通用 AI 助手。\n我们要完成的任务是：**{}**。\n请告诉我你的想法，或者直接开始创作。在这个模式下，我不会主动引导你，一切由你主导。\n你可以要求我生成文本或图片。",
            task.title
        )));
        self.started_at = Some(Instant::now());
        self.phase = self.phase.next();
        Ok(())
    }

    /// Send a user message and stream the assistant reply into the
    /// transcript.
    ///
    /// Fragments are appended strictly in arrival order. Cancelling the
    /// token mid-stream retains the partial content as the final message;
    /// a failed call substitutes a fallback reply. Either way the session
    /// resumes and the busy flag is cleared.
    pub async fn send(
        &mut self,
        text: impl Into<String>,
        cancel: CancelToken,
    ) -> Result<(), SessionError> {
        self.begin_turn(text)?;

        let transcript = self.wire_transcript();
        let result = self.backend.complete_stream(&transcript, cancel).await;

        match result {
            Ok(mut stream) => {
                self.messages.push(Message::assistant(""));
                while let Some(fragment) = stream.next().await {
                    if let Some(last) = self.messages.last_mut() {
                        last.content.push_str(&fragment);
                    }
                }
                if stream.is_interrupted() {
                    // Partial content stands; the notice tells the user the
                    // reply was cut short rather than finished.
                    warn!("stream ended abnormally, appending service notice");
                    match self.messages.last_mut() {
                        Some(last) if last.content.is_empty() => {
                            last.content = SERVICE_UNAVAILABLE_REPLY.to_string();
                        }
                        _ => self.messages.push(Message::assistant(SERVICE_UNAVAILABLE_REPLY)),
                    }
                }
                debug!(turns = self.messages.len(), "assistant reply complete");
            }
            Err(err) => {
                warn!(error = %err, "streaming completion failed");
                self.messages.push(Message::assistant(SERVICE_UNAVAILABLE_REPLY));
            }
        }

        self.busy = false;
        Ok(())
    }

    /// Blocking variant of [`send`](Self::send).
    pub async fn send_blocking(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
        self.begin_turn(text)?;

        let transcript = self.wire_transcript();
        let reply = match self.backend.complete(&transcript).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(error = %err, "blocking completion failed");
                SERVICE_UNAVAILABLE_REPLY.to_string()
            }
        };
        self.messages.push(Message::assistant(reply));

        self.busy = false;
        Ok(())
    }

    fn begin_turn(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
        if self.phase != Phase::Testing {
            return Err(SessionError::InvalidPhase(self.phase));
        }
        if self.busy {
            return Err(SessionError::Busy);
        }
        self.messages.push(Message::user(text));
        self.busy = true;
        Ok(())
    }

    // Image turns have no wire form and are filtered out here.
    fn wire_transcript(&self) -> Vec<ChatMessage> {
        self.messages.iter().filter_map(Message::to_chat).collect()
    }

    /// Record a produced image: an assistant image turn in the transcript
    /// plus the artifact slot the snapshot draws from.
    pub fn attach_image(&mut self, url: impl Into<String>) {
        let url = url.into();
        self.messages.push(Message::assistant_image(url.clone()));
        self.images.push(url);
    }

    /// Track imported text content.
    pub fn import_content(&mut self, content: impl Into<String>) {
        self.imported_content = content.into();
    }

    /// Whether submit is enabled: at least one user-authored message.
    pub fn can_submit(&self) -> bool {
        self.messages.iter().any(|m| m.role == Role::User)
    }

    /// Submit the round for evaluation and move to the report phase.
    pub async fn submit(&mut self) -> Result<&EvaluationReport, SessionError> {
        if self.phase != Phase::Testing {
            return Err(SessionError::InvalidPhase(self.phase));
        }
        if self.busy {
            return Err(SessionError::Busy);
        }
        // The engine's degenerate fallback covers this case too; the guard
        // keeps report unreachable without user input in the first place.
        if !self.can_submit() {
            return Err(SessionError::NoUserInput);
        }

        let task = self.task.clone().unwrap_or_else(TaskService::fallback);
        let snapshot = self.artifact_snapshot(&task);
        let transcript = self.wire_transcript();
        let session_secs = self
            .started_at
            .map(|t| t.elapsed().as_secs())
            .unwrap_or_default();

        let report = self
            .engine
            .evaluate(&transcript, &task, &snapshot, session_secs)
            .await;

        self.history.record(task.title.clone(), report.clone());
        self.report = Some(report);
        self.phase = self.phase.next();

        Ok(self.report.as_ref().expect("report just stored"))
    }

    fn artifact_snapshot(&self, task: &ChallengeTask) -> ArtifactSnapshot {
        // The most recent assistant text stands in for the produced note
        // body, matching what the preview shows at submit time.
        let content = self
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant && m.kind == MessageKind::Text)
            .map(|m| m.content.clone());

        ArtifactSnapshot {
            title: Some(task.title.clone()),
            content,
            image: self.images.first().cloned(),
        }
    }

    /// Dismiss the report: reset all session-scoped state and re-acquire a
    /// task for the next round.
    pub async fn dismiss(&mut self) -> Result<(), SessionError> {
        if self.phase != Phase::Report {
            return Err(SessionError::InvalidPhase(self.phase));
        }

        self.messages.clear();
        self.images.clear();
        self.imported_content.clear();
        self.report = None;
        self.task = None;
        self.started_at = None;
        self.phase = self.phase.next();

        self.acquire_task().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use taala_inference::{FragmentStream, InferenceError, MockBackend};

    const TASK_JSON: &str =
        r#"{"title":"城郊露营测评","value":"价值","positioning":"定位","goal":"目标"}"#;

    fn controller_with(backend: Arc<dyn ChatBackend>) -> CapabilityTestController {
        CapabilityTestController::new(backend, EvaluationEngine::with_template_backend())
    }

    async fn controller_in_testing(backend: Arc<dyn ChatBackend>) -> CapabilityTestController {
        let mut controller = controller_with(backend);
        controller.acquire_task().await.unwrap();
        controller.start().unwrap();
        controller
    }

    #[tokio::test]
    async fn test_start_requires_a_task() {
        let mut controller = controller_with(Arc::new(MockBackend::default()));
        assert!(matches!(controller.start(), Err(SessionError::NoTask)));
    }

    #[tokio::test]
    async fn test_start_seeds_greeting_with_task_title() {
        let backend = Arc::new(MockBackend::default().with_response(TASK_JSON));
        let controller = controller_in_testing(backend).await;

        assert_eq!(controller.phase(), Phase::Testing);
        assert_eq!(controller.messages().len(), 1);
        assert!(controller.messages()[0].content.contains("城郊露营测评"));
        assert!(!controller.can_submit());
    }

    #[tokio::test]
    async fn test_send_streams_reply_into_transcript() {
        let backend = Arc::new(
            MockBackend::default()
                .with_response(TASK_JSON)
                .with_fragments(["好的", "，这就", "开始写"]),
        );
        let mut controller = controller_in_testing(backend).await;

        controller
            .send("写一篇关于露营的笔记", CancelToken::new())
            .await
            .unwrap();

        let messages = controller.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[2].content, "好的，这就开始写");
        assert!(!controller.is_busy());
        assert!(controller.can_submit());
    }

    #[tokio::test]
    async fn test_send_outside_testing_is_rejected() {
        let mut controller = controller_with(Arc::new(MockBackend::default()));
        let result = controller.send("你好", CancelToken::new()).await;
        assert!(matches!(
            result,
            Err(SessionError::InvalidPhase(Phase::Setup))
        ));
    }

    #[tokio::test]
    async fn test_failed_stream_substitutes_fallback_reply() {
        let backend = Arc::new(MockBackend::default().with_response(TASK_JSON));
        let mut controller = controller_in_testing(Arc::clone(&backend) as Arc<dyn ChatBackend>).await;

        // Make subsequent calls fail after setup succeeded.
        let failing = Arc::new(MockBackend::default().with_failure(true));
        controller.backend = failing;

        controller.send("写一篇笔记", CancelToken::new()).await.unwrap();

        let last = controller.messages().last().unwrap();
        assert_eq!(last.content, SERVICE_UNAVAILABLE_REPLY);
        assert!(!controller.is_busy());
    }

    /// Backend that cancels the caller's token after delivering a set
    /// number of fragments, then keeps honouring it.
    struct CancelAfter {
        fragments: Vec<String>,
        cancel_after: usize,
    }

    #[async_trait]
    impl ChatBackend for CancelAfter {
        fn id(&self) -> &str {
            "cancel-after"
        }

        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, InferenceError> {
            Ok(self.fragments.concat())
        }

        async fn complete_stream(
            &self,
            _messages: &[ChatMessage],
            cancel: CancelToken,
        ) -> Result<FragmentStream, InferenceError> {
            let fragments = self.fragments.clone();
            let cancel_after = self.cancel_after;
            let (sender, stream) = FragmentStream::channel(1);
            tokio::spawn(async move {
                for (index, fragment) in fragments.into_iter().enumerate() {
                    if cancel.is_cancelled() {
                        break;
                    }
                    if sender.send(fragment).await.is_err() {
                        break;
                    }
                    if index + 1 == cancel_after {
                        cancel.cancel();
                    }
                }
            });
            Ok(stream)
        }
    }

    #[tokio::test]
    async fn test_cancellation_retains_partial_content() {
        let backend = Arc::new(CancelAfter {
            fragments: vec!["一".into(), "二".into(), "三".into(), "四".into()],
            cancel_after: 2,
        });
        let mut controller = controller_with(Arc::clone(&backend) as Arc<dyn ChatBackend>);
        controller.task = Some(TaskService::fallback());
        controller.start().unwrap();

        controller.send("写一篇笔记", CancelToken::new()).await.unwrap();

        // Exactly the fragments delivered before cancellation, no more.
        let last = controller.messages().last().unwrap();
        assert_eq!(last.content, "一二");
        assert!(!controller.is_busy());
    }

    /// Backend that aborts the stream after delivering a set number of
    /// fragments, as a mid-stream transport failure would.
    struct InterruptAfter {
        fragments: Vec<String>,
        abort_after: usize,
    }

    #[async_trait]
    impl ChatBackend for InterruptAfter {
        fn id(&self) -> &str {
            "interrupt-after"
        }

        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, InferenceError> {
            Ok(self.fragments.concat())
        }

        async fn complete_stream(
            &self,
            _messages: &[ChatMessage],
            _cancel: CancelToken,
        ) -> Result<FragmentStream, InferenceError> {
            let fragments = self.fragments.clone();
            let abort_after = self.abort_after;
            let (sender, stream) = FragmentStream::channel(1);
            tokio::spawn(async move {
                for fragment in fragments.into_iter().take(abort_after) {
                    if sender.send(fragment).await.is_err() {
                        return;
                    }
                }
                sender.abort();
            });
            Ok(stream)
        }
    }

    #[tokio::test]
    async fn test_interrupted_stream_keeps_partial_and_appends_notice() {
        let backend = Arc::new(InterruptAfter {
            fragments: vec!["一".into(), "二".into(), "三".into()],
            abort_after: 2,
        });
        let mut controller = controller_with(Arc::clone(&backend) as Arc<dyn ChatBackend>);
        controller.task = Some(TaskService::fallback());
        controller.start().unwrap();

        controller.send("写一篇笔记", CancelToken::new()).await.unwrap();

        let messages = controller.messages();
        assert_eq!(messages[messages.len() - 2].content, "一二");
        assert_eq!(messages.last().unwrap().content, SERVICE_UNAVAILABLE_REPLY);
        assert!(!controller.is_busy());
    }

    #[tokio::test]
    async fn test_interruption_before_any_fragment_becomes_the_notice() {
        let backend = Arc::new(InterruptAfter {
            fragments: vec!["一".into()],
            abort_after: 0,
        });
        let mut controller = controller_with(Arc::clone(&backend) as Arc<dyn ChatBackend>);
        controller.task = Some(TaskService::fallback());
        controller.start().unwrap();

        controller.send("写一篇笔记", CancelToken::new()).await.unwrap();

        // No empty assistant turn is left behind
        let last = controller.messages().last().unwrap();
        assert_eq!(last.content, SERVICE_UNAVAILABLE_REPLY);
    }

    #[tokio::test]
    async fn test_image_turns_stay_out_of_the_wire_transcript() {
        let backend = Arc::new(
            MockBackend::default()
                .with_response(TASK_JSON)
                .with_fragments(["正文"]),
        );
        let mut controller = controller_in_testing(backend).await;
        controller.send("写正文", CancelToken::new()).await.unwrap();
        controller.attach_image("https://example.com/cover.png");

        // The image shows up as an assistant turn in the transcript
        let last = controller.messages().last().unwrap();
        assert_eq!(last.kind, MessageKind::Image);

        // but never reaches the model
        let wire = controller.wire_transcript();
        assert_eq!(wire.len(), 3);
        assert!(wire.iter().all(|m| !m.content.contains("example.com")));
    }

    #[tokio::test]
    async fn test_submit_without_user_input_is_rejected() {
        let backend = Arc::new(MockBackend::default().with_response(TASK_JSON));
        let mut controller = controller_in_testing(backend).await;

        assert!(matches!(
            controller.submit().await,
            Err(SessionError::NoUserInput)
        ));
        assert_eq!(controller.phase(), Phase::Testing);
    }

    #[tokio::test]
    async fn test_submit_produces_report_and_records_history() {
        let backend = Arc::new(
            MockBackend::default()
                .with_response(TASK_JSON)
                .with_fragments(["回复"]),
        );
        let mut controller = controller_in_testing(backend).await;

        controller.send("写一篇关于露营的笔记", CancelToken::new()).await.unwrap();
        controller.attach_image("https://example.com/cover.png");

        let report = controller.submit().await.unwrap();
        assert!(report.ai_capability.overall_score >= 75);

        assert_eq!(controller.phase(), Phase::Report);
        assert_eq!(controller.history().count(), 1);
        assert!(controller.report().is_some());
    }

    #[tokio::test]
    async fn test_snapshot_uses_last_assistant_text_and_first_image() {
        let backend = Arc::new(
            MockBackend::default()
                .with_response(TASK_JSON)
                .with_fragments(["最终正文"]),
        );
        let mut controller = controller_in_testing(backend).await;
        controller.send("写正文", CancelToken::new()).await.unwrap();
        controller.attach_image("https://example.com/1.png");
        controller.attach_image("https://example.com/2.png");

        let task = controller.task.clone().unwrap();
        let snapshot = controller.artifact_snapshot(&task);
        assert_eq!(snapshot.content.as_deref(), Some("最终正文"));
        assert_eq!(snapshot.image.as_deref(), Some("https://example.com/1.png"));
        assert_eq!(snapshot.title.as_deref(), Some("城郊露营测评"));
    }

    #[tokio::test]
    async fn test_dismiss_resets_session_and_reacquires_task() {
        let backend = Arc::new(
            MockBackend::default()
                .with_response(TASK_JSON)
                .with_fragments(["回复"]),
        );
        let mut controller = controller_in_testing(backend).await;
        controller.send("写一篇笔记", CancelToken::new()).await.unwrap();
        controller.submit().await.unwrap();

        controller.dismiss().await.unwrap();

        assert_eq!(controller.phase(), Phase::Setup);
        assert!(controller.messages().is_empty());
        assert!(controller.report().is_none());
        assert!(controller.task().is_some());
        // History survives the reset
        assert_eq!(controller.history().count(), 1);
    }

    #[tokio::test]
    async fn test_dismiss_outside_report_is_rejected() {
        let backend = Arc::new(MockBackend::default().with_response(TASK_JSON));
        let mut controller = controller_in_testing(backend).await;
        assert!(matches!(
            controller.dismiss().await,
            Err(SessionError::InvalidPhase(Phase::Testing))
        ));
    }

    #[tokio::test]
    async fn test_reroll_replaces_task_in_setup_only() {
        let backend = Arc::new(MockBackend::default().with_response(TASK_JSON));
        let mut controller = controller_with(backend);

        controller.acquire_task().await.unwrap();
        controller.acquire_task().await.unwrap();
        assert_eq!(controller.task().unwrap().title, "城郊露营测评");

        controller.start().unwrap();
        assert!(matches!(
            controller.acquire_task().await,
            Err(SessionError::InvalidPhase(Phase::Testing))
        ));
    }

    #[tokio::test]
    async fn test_send_blocking_appends_full_reply() {
        let backend = Arc::new(MockBackend::default().with_response(TASK_JSON));
        let mut controller = controller_in_testing(backend).await;

        controller.send_blocking("写一篇笔记").await.unwrap();
        // The mock echoes its scripted response as the reply.
        assert_eq!(controller.messages().last().unwrap().content, TASK_JSON);
    }
}
