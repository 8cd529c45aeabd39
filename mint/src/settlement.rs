//! Fire-and-forget hand-off of finalized transactions.
//!
//! The core path only ever calls [`SettlementDispatcher::dispatch`], which
//! never waits: events go into a bounded queue drained by a background task.
//! A full or closed queue drops the event with a warning.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::types::{MintError, MintTransaction, Result, TransferRecord};

/// A finalized transaction for external anchoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SettlementEvent {
    Mint(MintTransaction),
    Transfer(TransferRecord),
}

impl SettlementEvent {
    pub fn id(&self) -> &str {
        match self {
            Self::Mint(tx) => &tx.id,
            Self::Transfer(record) => &record.id,
        }
    }
}

/// Receiver of finalized transactions, e.g. an on-chain anchor.
#[async_trait::async_trait]
pub trait SettlementSink: Send + Sync {
    /// Name of the sink.
    fn name(&self) -> &str;

    /// Settle one event.
    async fn settle(&self, event: &SettlementEvent) -> Result<()>;
}

/// Default sink: logs each event as JSON.
pub struct LoggingSettlementSink;

#[async_trait::async_trait]
impl SettlementSink for LoggingSettlementSink {
    fn name(&self) -> &str {
        "logging"
    }

    async fn settle(&self, event: &SettlementEvent) -> Result<()> {
        let payload = serde_json::to_string(event)
            .map_err(|e| MintError::SettlementError(e.to_string()))?;
        info!(event_id = %event.id(), payload = %payload, "Settlement event");
        Ok(())
    }
}

/// Queue feeding a [`SettlementSink`] from a background task.
pub struct SettlementDispatcher {
    tx: mpsc::Sender<SettlementEvent>,
}

impl SettlementDispatcher {
    /// Start the background worker. Must be called within a Tokio runtime.
    pub fn spawn(sink: Arc<dyn SettlementSink>, queue_capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<SettlementEvent>(queue_capacity.max(1));

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match sink.settle(&event).await {
                    Ok(()) => debug!(sink = sink.name(), event_id = %event.id(), "Event settled"),
                    Err(e) => warn!(
                        sink = sink.name(),
                        event_id = %event.id(),
                        error = %e,
                        "Settlement failed"
                    ),
                }
            }
            debug!(sink = sink.name(), "Settlement worker stopped");
        });

        Self { tx }
    }

    /// Queue an event without waiting. Returns whether it was accepted.
    pub fn dispatch(&self, event: SettlementEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!(event_id = %event.id(), "Settlement queue full, dropping event");
                false
            }
            Err(TrySendError::Closed(event)) => {
                warn!(event_id = %event.id(), "Settlement worker gone, dropping event");
                false
            }
        }
    }
}
