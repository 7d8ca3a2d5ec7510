//! Taala Session - the capability-test flow
//!
//! Owns one test round's mutable state and drives it through the
//! three-phase workflow: acquire a task, run a guided-free interaction,
//! submit, receive a report.

pub mod controller;
pub mod history;
pub mod message;
pub mod phase;

// Re-export main types for convenience
pub use controller::{CapabilityTestController, SessionError};
pub use history::{HistoryEntry, ReportHistory};
pub use message::{Message, MessageKind};
pub use phase::Phase;
