//! Spawned mission execution with an event receiver and a cancel handle.

use crate::error::Result;
use crate::events::{EventSink, MissionEvent};
use crate::mission::{MissionExecutor, MissionOutcome};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A running mission: drain `events` until the terminal event; trigger
/// `cancel` to stop the mission at its next checkpoint.
pub struct MissionHandle {
    pub events: mpsc::Receiver<MissionEvent>,
    pub cancel: CancellationToken,
}

#[derive(Clone)]
pub struct MissionRunner {
    executor: Arc<MissionExecutor>,
}

impl MissionRunner {
    pub fn new(executor: Arc<MissionExecutor>) -> Self {
        Self { executor }
    }

    /// Spawn execution in the background and return the event receiver.
    pub fn spawn(&self, objective: String, conversation_id: Option<i64>) -> MissionHandle {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let sink = EventSink::new(tx, cancel.clone());
        let executor = Arc::clone(&self.executor);

        tokio::spawn(async move {
            // The terminal event carries the outcome; the return value only
            // matters to buffered callers.
            let _ = executor.run(&objective, conversation_id, &sink).await;
        });

        MissionHandle { events: rx, cancel }
    }

    /// Run inline, discarding progress events, and return the outcome.
    pub async fn run_buffered(
        &self,
        objective: &str,
        conversation_id: Option<i64>,
    ) -> Result<MissionOutcome> {
        let (tx, mut rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let sink = EventSink::new(tx, CancellationToken::new());

        // Keep the channel drained so the executor never blocks on it.
        let drain = tokio::spawn(async move { while rx.recv().await.is_some() {} });

        let result = self.executor.run(objective, conversation_id, &sink).await;
        drop(sink);
        let _ = drain.await;
        result
    }
}
