//! Receiving side of the stop-and-wait protocol.

use arq_lab_abstract::{OutputSink, Packet, TransferEvent, TransferObserver, encode_ack};
use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::io;
use std::net::SocketAddr;
use thiserror::Error;
use tracing::{debug, info, trace};

use crate::fault::FaultInjector;
use crate::transport::{RecvOutcome, Transport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    Listening,
    Delivering,
    Rejecting,
    Closed,
}

/// How a valid packet whose sequence number is not the expected one is
/// answered. It is never delivered under either policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Re-acknowledge the last delivered sequence number and keep waiting
    /// for the expected one. Nothing is sent before the first delivery.
    #[default]
    ReackLastGood,
    /// Adopt the packet's ack number as the expected sequence, acknowledge
    /// it and move past it.
    Resync,
}

#[derive(Debug, Error)]
pub enum ReceiverError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to write delivered payload: {0}")]
    Sink(#[source] io::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReceiveSummary {
    pub delivered_packets: u64,
    pub delivered_bytes: u64,
    pub rejected: u64,
    pub duplicates: u64,
    pub acks_sent: u64,
    pub next_expected_seq: u32,
}

pub struct ReceiverEngine<T, O, R = StdRng> {
    transport: T,
    injector: FaultInjector<R>,
    observer: O,
    policy: DuplicatePolicy,
    next_expected_seq: u32,
    state: ReceiverState,
    summary: ReceiveSummary,
}

impl<T, O, R> ReceiverEngine<T, O, R>
where
    T: Transport,
    O: TransferObserver,
    R: Rng,
{
    pub fn new(transport: T, injector: FaultInjector<R>, observer: O) -> Self {
        Self {
            transport,
            injector,
            observer,
            policy: DuplicatePolicy::default(),
            next_expected_seq: 0,
            state: ReceiverState::Listening,
            summary: ReceiveSummary::default(),
        }
    }

    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn next_expected_seq(&self) -> u32 {
        self.next_expected_seq
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn into_parts(self) -> (T, O) {
        (self.transport, self.observer)
    }

    /// Receive until CLOSE, appending in-order payloads to `sink`.
    pub async fn run<S: OutputSink>(
        &mut self,
        sink: &mut S,
    ) -> Result<ReceiveSummary, ReceiverError> {
        info!("Listening, waiting for packet {}", self.next_expected_seq);
        while self.state != ReceiverState::Closed {
            self.state = match self.transport.recv_from(None).await {
                RecvOutcome::Datagram { bytes, from } => self.handle(&bytes, from, sink).await?,
                RecvOutcome::TimedOut => ReceiverState::Listening,
                RecvOutcome::Failed(err) => return Err(err.into()),
            };
            trace!(state = ?self.state, next = self.next_expected_seq, "receiver step");
        }

        self.summary.next_expected_seq = self.next_expected_seq;
        info!(
            "Received CLOSE after {} packets ({} bytes)",
            self.summary.delivered_packets, self.summary.delivered_bytes
        );
        Ok(self.summary.clone())
    }

    async fn handle<S: OutputSink>(
        &mut self,
        bytes: &[u8],
        from: SocketAddr,
        sink: &mut S,
    ) -> Result<ReceiverState, ReceiverError> {
        if bytes.is_empty() {
            self.observer.on_event(&TransferEvent::Close);
            return Ok(ReceiverState::Closed);
        }

        let decoded = match Packet::decode(bytes) {
            Ok(decoded) => decoded,
            Err(err) => {
                debug!("malformed datagram from {from}: {err}");
                return Ok(self.reject(None));
            }
        };
        let valid = decoded.is_valid();
        let (ack_no, seq, payload) = match decoded.packet {
            Packet::Data {
                ack_no,
                seq,
                payload,
            } => (ack_no, seq, payload),
            Packet::Ack { .. } => {
                debug!("unexpected ack from {from}");
                return Ok(self.reject(None));
            }
        };

        if !valid {
            return Ok(self.reject(Some(seq)));
        }

        if seq != self.next_expected_seq {
            self.summary.duplicates += 1;
            self.observer.on_event(&TransferEvent::Duplicate {
                seq,
                expected: self.next_expected_seq,
            });
            match self.policy {
                DuplicatePolicy::ReackLastGood => {
                    if let Some(last_good) = self.next_expected_seq.checked_sub(1) {
                        self.send_ack(last_good, true, from).await?;
                    }
                }
                DuplicatePolicy::Resync => {
                    self.next_expected_seq = ack_no;
                    self.send_ack(ack_no, true, from).await?;
                    self.next_expected_seq = ack_no.saturating_add(1);
                }
            }
            return Ok(ReceiverState::Rejecting);
        }

        self.send_ack(seq, false, from).await?;
        sink.append(&payload).map_err(ReceiverError::Sink)?;
        self.summary.delivered_packets += 1;
        self.summary.delivered_bytes += payload.len() as u64;
        self.observer.on_event(&TransferEvent::Delivered {
            seq,
            bytes: payload.len(),
        });
        self.next_expected_seq = self.next_expected_seq.saturating_add(1);
        Ok(ReceiverState::Delivering)
    }

    fn reject(&mut self, seq: Option<u32>) -> ReceiverState {
        self.summary.rejected += 1;
        self.observer.on_event(&TransferEvent::Corrupt { seq });
        ReceiverState::Rejecting
    }

    async fn send_ack(
        &mut self,
        ack: u32,
        resend: bool,
        to: SocketAddr,
    ) -> Result<(), ReceiverError> {
        let mut frame = encode_ack(ack);
        let outcome = self
            .injector
            .send(&mut self.transport, &mut frame, to)
            .await?;
        self.summary.acks_sent += 1;
        self.observer.on_event(&TransferEvent::AckSent {
            ack,
            resend,
            outcome,
        });
        Ok(())
    }
}
