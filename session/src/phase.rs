//! Session phases.
//!
//! Modeled as a tagged enum with exhaustive transition handling so
//! inconsistent combinations ("report visible while testing") cannot be
//! represented.

use serde::{Deserialize, Serialize};

/// Exactly one phase is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Acquiring and presenting the challenge task
    Setup,
    /// Accumulating the transcript and artifacts
    Testing,
    /// Exposing the produced report; terminal per round
    Report,
}

impl Phase {
    /// Legal forward transition for each phase. Dismissing a report wraps
    /// back to setup; no transition skips a phase.
    pub fn next(self) -> Phase {
        match self {
            Phase::Setup => Phase::Testing,
            Phase::Testing => Phase::Report,
            Phase::Report => Phase::Setup,
        }
    }
}
