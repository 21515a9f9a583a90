//! Event logging for flow replay and auditing.
//!
//! This module defines the FlowEvent enum which captures every observable
//! step the flow engine takes. Events enable:
//! - Deterministic replay (re-run a session from the event log)
//! - Debugging (understand what happened and in what order)
//! - Auditing (verify step ordering, e.g. approval confirmed before
//!   the subscription was submitted)
//!
//! # Event Types
//!
//! Events are categorized by engine phase:
//! - **Read**: Cached query refreshes completing or failing
//! - **Submission**: Writes accepted or rejected by the ledger
//! - **Confirmation**: Submitted writes confirming, failing, or timing out
//! - **Flow**: Whole flows reaching a terminal outcome
//!
//! # Example
//!
//! ```rust
//! use substream_core_rs::models::FlowEvent;
//! use substream_core_rs::ledger::QueryKind;
//!
//! let event = FlowEvent::ReadCompleted {
//!     seq: 1,
//!     query: QueryKind::AllProducts,
//! };
//!
//! println!("Event #{}: {:?}", event.seq(), event);
//! ```

use crate::ledger::{QueryKind, SubmissionHandle};
use crate::orchestrator::engine::{FlowKind, FlowStep};

/// Flow event capturing one observable engine step.
///
/// All events include a sequence number for total ordering.
/// Sequence numbers are assigned by the engine and never reused.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowEvent {
    /// A cached query refreshed successfully
    ReadCompleted { seq: u64, query: QueryKind },

    /// A cached query refresh failed (stale value retained)
    ReadFailed {
        seq: u64,
        query: QueryKind,
        error: String,
    },

    /// The ledger accepted a write submission
    Submitted {
        seq: u64,
        step: FlowStep,
        handle: SubmissionHandle,
    },

    /// The ledger rejected a write at submission time
    SubmissionRejected {
        seq: u64,
        step: FlowStep,
        error: String,
    },

    /// A submitted write confirmed
    Confirmed {
        seq: u64,
        step: FlowStep,
        handle: SubmissionHandle,
    },

    /// A submitted write failed after submission
    ConfirmationFailed {
        seq: u64,
        step: FlowStep,
        handle: SubmissionHandle,
        reason: Option<String>,
    },

    /// A submitted write exhausted its confirmation window
    ConfirmationTimedOut {
        seq: u64,
        step: FlowStep,
        handle: SubmissionHandle,
    },

    /// A flow ran all its steps to completion
    FlowSucceeded {
        seq: u64,
        flow: FlowKind,
        refreshed: Vec<QueryKind>,
    },

    /// A flow ended without completing
    FlowFailed {
        seq: u64,
        flow: FlowKind,
        step: FlowStep,
    },
}

impl FlowEvent {
    /// Get the sequence number of this event
    pub fn seq(&self) -> u64 {
        match self {
            FlowEvent::ReadCompleted { seq, .. } => *seq,
            FlowEvent::ReadFailed { seq, .. } => *seq,
            FlowEvent::Submitted { seq, .. } => *seq,
            FlowEvent::SubmissionRejected { seq, .. } => *seq,
            FlowEvent::Confirmed { seq, .. } => *seq,
            FlowEvent::ConfirmationFailed { seq, .. } => *seq,
            FlowEvent::ConfirmationTimedOut { seq, .. } => *seq,
            FlowEvent::FlowSucceeded { seq, .. } => *seq,
            FlowEvent::FlowFailed { seq, .. } => *seq,
        }
    }

    /// Get a short description of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            FlowEvent::ReadCompleted { .. } => "ReadCompleted",
            FlowEvent::ReadFailed { .. } => "ReadFailed",
            FlowEvent::Submitted { .. } => "Submitted",
            FlowEvent::SubmissionRejected { .. } => "SubmissionRejected",
            FlowEvent::Confirmed { .. } => "Confirmed",
            FlowEvent::ConfirmationFailed { .. } => "ConfirmationFailed",
            FlowEvent::ConfirmationTimedOut { .. } => "ConfirmationTimedOut",
            FlowEvent::FlowSucceeded { .. } => "FlowSucceeded",
            FlowEvent::FlowFailed { .. } => "FlowFailed",
        }
    }

    /// Get the submission handle if the event relates to a specific submission
    pub fn handle(&self) -> Option<&SubmissionHandle> {
        match self {
            FlowEvent::Submitted { handle, .. } => Some(handle),
            FlowEvent::Confirmed { handle, .. } => Some(handle),
            FlowEvent::ConfirmationFailed { handle, .. } => Some(handle),
            FlowEvent::ConfirmationTimedOut { handle, .. } => Some(handle),
            _ => None,
        }
    }

    /// Get the flow step if the event relates to a specific step
    pub fn step(&self) -> Option<FlowStep> {
        match self {
            FlowEvent::Submitted { step, .. } => Some(*step),
            FlowEvent::SubmissionRejected { step, .. } => Some(*step),
            FlowEvent::Confirmed { step, .. } => Some(*step),
            FlowEvent::ConfirmationFailed { step, .. } => Some(*step),
            FlowEvent::ConfirmationTimedOut { step, .. } => Some(*step),
            FlowEvent::FlowFailed { step, .. } => Some(*step),
            _ => None,
        }
    }
}

/// Event log for storing and querying flow events.
///
/// This is a simple wrapper around Vec<FlowEvent> with convenience methods.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<FlowEvent>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Add an event to the log
    pub fn log(&mut self, event: FlowEvent) {
        self.events.push(event);
    }

    /// Get the number of events logged
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get all events
    pub fn events(&self) -> &[FlowEvent] {
        &self.events
    }

    /// Get events of a specific type
    pub fn events_of_type(&self, event_type: &str) -> Vec<&FlowEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Get events for a specific submission handle
    pub fn events_for_handle(&self, handle: &SubmissionHandle) -> Vec<&FlowEvent> {
        self.events
            .iter()
            .filter(|e| e.handle() == Some(handle))
            .collect()
    }

    /// Get events whose sequence number is `seq` or later, in log order.
    ///
    /// Lets a host resume rendering from the last sequence number it saw.
    pub fn events_at_or_after(&self, seq: u64) -> Vec<&FlowEvent> {
        self.events.iter().filter(|e| e.seq() >= seq).collect()
    }

    /// Clear all events
    pub fn clear(&mut self) {
        self.events.clear();
    }
}
