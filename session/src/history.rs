//! In-memory report history.
//!
//! Reports are immutable once produced; each is recorded here keyed by a
//! generated identifier and timestamp, newest first, pruned at capacity.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use uuid::Uuid;

use taala_evaluation::EvaluationReport;

/// Maximum retained reports before pruning.
const MAX_HISTORY_ENTRIES: usize = 1_000;

/// One recorded evaluation round.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub id: String,
    pub recorded_at: DateTime<Utc>,
    pub task_title: String,
    pub report: EvaluationReport,
}

/// Bounded log of produced reports.
pub struct ReportHistory {
    entries: VecDeque<HistoryEntry>,
    max_entries: usize,
}

impl ReportHistory {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            max_entries: MAX_HISTORY_ENTRIES,
        }
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_entries,
        }
    }

    /// Record a report. Returns the generated entry id.
    pub fn record(&mut self, task_title: impl Into<String>, report: EvaluationReport) -> String {
        let entry = HistoryEntry {
            id: Uuid::new_v4().to_string(),
            recorded_at: Utc::now(),
            task_title: task_title.into(),
            report,
        };
        let id = entry.id.clone();

        self.entries.push_front(entry);
        while self.entries.len() > self.max_entries {
            self.entries.pop_back();
        }

        id
    }

    /// Most recent entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<&HistoryEntry> {
        self.entries.iter().take(limit).collect()
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for ReportHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use taala_evaluation::{ArtifactSnapshot, EvaluationEngine, TemplateScoringBackend, TaskService};

    async fn sample_report() -> EvaluationReport {
        let engine = EvaluationEngine::new(Arc::new(TemplateScoringBackend));
        engine
            .evaluate(
                &[],
                &TaskService::fallback(),
                &ArtifactSnapshot::default(),
                0,
            )
            .await
    }

    #[tokio::test]
    async fn test_record_and_recent_ordering() {
        let mut history = ReportHistory::new();
        history.record("第一轮", sample_report().await);
        history.record("第二轮", sample_report().await);

        let recent = history.recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].task_title, "第二轮");
    }

    #[tokio::test]
    async fn test_prunes_at_capacity() {
        let mut history = ReportHistory::with_max_entries(2);
        for round in 0..4 {
            history.record(format!("第{}轮", round), sample_report().await);
        }
        assert_eq!(history.count(), 2);
        assert_eq!(history.recent(2)[0].task_title, "第3轮");
    }
}
