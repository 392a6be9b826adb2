use arq_lab_abstract::{AckRejection, TransferEvent, TransferObserver};
use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};

/// Logs one terse status line per event, e.g. `SENDing 3 1500:2000 DROP`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TransferObserver for TracingObserver {
    fn on_event(&mut self, event: &TransferEvent) {
        match event {
            TransferEvent::Attempt {
                seq,
                resend,
                start,
                end,
                outcome,
            } => info!(
                "{} {seq} {start}:{end} {}",
                verb(*resend),
                outcome.label()
            ),
            TransferEvent::Timeout { seq } => warn!("TIMEOUT {seq}"),
            TransferEvent::AckOk { ack } => info!("AckRcvd {ack} MoveWnd"),
            TransferEvent::AckBad { seq, reason } => match reason {
                AckRejection::Corrupted { ack } => info!("AckRcvd {ack} ErrAck"),
                AckRejection::Mismatch { ack } => info!("AckRcvd {ack} DuplAck"),
                AckRejection::Malformed | AckRejection::NotAnAck => {
                    info!("AckRcvd ? ErrAck (waiting for {seq})")
                }
            },
            TransferEvent::Delivered { seq, bytes } => info!("RECV {seq} {bytes} bytes"),
            TransferEvent::Corrupt { seq: Some(seq) } => info!("RECV {seq} CRPT"),
            TransferEvent::Corrupt { seq: None } => info!("RECV ? CRPT"),
            TransferEvent::Duplicate { seq, expected } => {
                info!("DUPL {seq} !Seq (expected {expected})")
            }
            TransferEvent::AckSent {
                ack,
                resend,
                outcome,
            } => info!("{} ACK {ack} {}", verb(*resend), outcome.label()),
            TransferEvent::Close => info!("CLOSE"),
        }
    }
}

fn verb(resend: bool) -> &'static str {
    if resend { "ReSend." } else { "SENDing" }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedEvent {
    /// Milliseconds since the observer was created.
    pub at_ms: u64,
    #[serde(flatten)]
    pub event: TransferEvent,
}

/// Keeps every event with a timestamp, for traces and tests.
#[derive(Debug, Clone)]
pub struct RecordingObserver {
    started: Instant,
    events: Vec<RecordedEvent>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            events: Vec::new(),
        }
    }

    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<RecordedEvent> {
        self.events
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

impl Default for RecordingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferObserver for RecordingObserver {
    fn on_event(&mut self, event: &TransferEvent) {
        self.events.push(RecordedEvent {
            at_ms: self.elapsed_ms(),
            event: event.clone(),
        });
    }
}
