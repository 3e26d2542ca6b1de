//! Mission progress events
//!
//! The executor narrates itself through an ordered event stream: tool
//! starts strictly precede their completions, `progress` steps are
//! monotonic, and exactly one terminal event (`complete` or `error`)
//! closes the stream.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MissionEvent {
    Thinking {
        content: String,
    },

    Progress {
        step: usize,
        total: usize,
        percentage: u8,
    },

    ToolStart {
        tool: String,
        args: serde_json::Value,
    },

    ToolComplete {
        tool: String,
        summary: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<bool>,
    },

    ActionStart {
        action: String,
        title: String,
    },

    ActionComplete {
        action: String,
        result: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<bool>,
    },

    Complete {
        report: String,
    },

    Error {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        context: Option<String>,
    },
}

impl MissionEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MissionEvent::Complete { .. } | MissionEvent::Error { .. })
    }
}

/// Event sink backed by a bounded channel; a full channel applies
/// backpressure, a dropped receiver reads as cancellation.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<MissionEvent>,
    cancel: CancellationToken,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<MissionEvent>, cancel: CancellationToken) -> Self {
        Self { tx, cancel }
    }

    pub async fn emit(&self, event: MissionEvent) {
        if self.tx.send(event).await.is_err() {
            // Nobody is listening anymore; stop the mission at the next
            // checkpoint.
            self.cancel.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
