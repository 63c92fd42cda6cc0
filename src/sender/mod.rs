//! Event delivery
//!
//! A [`Sender`] receives the events of one polling cycle. The Honeycomb
//! sender posts them to the batch events API; the JSON lines sender writes
//! them to a local stream (used by `--dry-run`).

mod honeycomb;

use async_trait::async_trait;
use std::io::Write;
use std::sync::Mutex;

pub use honeycomb::HoneycombSender;

use crate::error::SendError;
use crate::transformer::Event;

/// Outcome of delivering one cycle's events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendReport {
    /// Events accepted by the sink
    pub sent: usize,
    /// Events rejected or lost
    pub failed: usize,
}

impl SendReport {
    pub fn merge(&mut self, other: SendReport) {
        self.sent += other.sent;
        self.failed += other.failed;
    }
}

/// Delivery collaborator for materialized events
#[async_trait]
pub trait Sender: Send + Sync {
    /// Deliver events; transport retries are the sender's concern
    async fn send(&self, events: &[Event]) -> Result<SendReport, SendError>;
}

/// Writes each event as one JSON object per line
pub struct JsonLinesSender<W> {
    writer: Mutex<W>,
}

impl JsonLinesSender<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonLinesSender<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the underlying writer
    pub fn into_inner(self) -> W {
        match self.writer.into_inner() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl<W: Write + Send> Sender for JsonLinesSender<W> {
    async fn send(&self, events: &[Event]) -> Result<SendReport, SendError> {
        let mut writer = match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        for event in events {
            serde_json::to_writer(&mut *writer, event)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        Ok(SendReport {
            sent: events.len(),
            failed: 0,
        })
    }
}
