//! Sending side of the stop-and-wait protocol.
//!
//! One data packet is in flight at a time. Chunk `i` is retransmitted until a
//! valid acknowledgment carrying `i` arrives, then the engine moves on to
//! `i + 1`. There is no retry limit: an unreachable receiver keeps the
//! sender retransmitting until the process is stopped.

use arq_lab_abstract::{
    AckRejection, Packet, PacketError, SendOutcome, TransferEvent, TransferObserver,
};
use bytes::Bytes;
use rand::Rng;
use rand::rngs::StdRng;
use serde::Serialize;
use std::net::SocketAddr;
use std::ops::Range;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, trace};

use crate::fault::FaultInjector;
use crate::transport::{RecvOutcome, Transport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    Sending,
    AwaitingAck,
    Advancing,
    Retransmitting,
    Closing,
    Done,
}

#[derive(Debug, Error)]
pub enum SenderError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("chunk {index} cannot be framed: {source}")]
    Chunk {
        index: usize,
        #[source]
        source: PacketError,
    },
    #[error("payload needs more chunks than sequence numbers can address")]
    TooManyChunks,
}

/// Counters for one finished transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SendSummary {
    pub chunks: u32,
    pub bytes: u64,
    pub attempts: u64,
    pub retransmissions: u64,
    pub timeouts: u64,
    pub rejected_acks: u64,
    pub dropped: u64,
    pub corrupted: u64,
}

struct Segment {
    packet: Packet,
    range: Range<u64>,
}

pub struct SenderEngine<T, O, R = StdRng> {
    transport: T,
    injector: FaultInjector<R>,
    observer: O,
    dest: SocketAddr,
    timeout: Duration,
    state: SenderState,
}

impl<T, O, R> SenderEngine<T, O, R>
where
    T: Transport,
    O: TransferObserver,
    R: Rng,
{
    pub fn new(
        transport: T,
        injector: FaultInjector<R>,
        observer: O,
        dest: SocketAddr,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            injector,
            observer,
            dest,
            timeout,
            state: SenderState::Sending,
        }
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn into_parts(self) -> (T, O) {
        (self.transport, self.observer)
    }

    /// Deliver `chunks` in order, then send CLOSE.
    ///
    /// Each chunk must fit in one data packet. Only transport failures end
    /// the transfer early.
    pub async fn run<I>(&mut self, chunks: I) -> Result<SendSummary, SenderError>
    where
        I: IntoIterator<Item = Bytes>,
    {
        let segments = segment(chunks)?;
        let mut summary = SendSummary {
            chunks: segments.len() as u32,
            bytes: segments.last().map_or(0, |s| s.range.end),
            ..Default::default()
        };
        info!(
            "Sending {} bytes in {} packets to {}",
            summary.bytes, summary.chunks, self.dest
        );

        let mut index = 0usize;
        let mut resend = false;
        self.state = if segments.is_empty() {
            SenderState::Closing
        } else {
            SenderState::Sending
        };

        loop {
            trace!(state = ?self.state, index, "sender step");
            self.state = match self.state {
                SenderState::Sending => {
                    let segment = &segments[index];
                    // A fresh frame per attempt; the injector may flip its flag.
                    let mut frame = segment.packet.encode();
                    let outcome = self
                        .injector
                        .send(&mut self.transport, &mut frame, self.dest)
                        .await?;
                    summary.attempts += 1;
                    match outcome {
                        SendOutcome::Dropped => summary.dropped += 1,
                        SendOutcome::Corrupted => summary.corrupted += 1,
                        SendOutcome::Ok => {}
                    }
                    self.observer.on_event(&TransferEvent::Attempt {
                        seq: index as u32,
                        resend,
                        start: segment.range.start,
                        end: segment.range.end,
                        outcome,
                    });
                    SenderState::AwaitingAck
                }
                SenderState::AwaitingAck => {
                    let seq = index as u32;
                    match self.transport.recv_from(Some(self.timeout)).await {
                        RecvOutcome::TimedOut => {
                            summary.timeouts += 1;
                            self.observer.on_event(&TransferEvent::Timeout { seq });
                            SenderState::Retransmitting
                        }
                        RecvOutcome::Failed(err) => return Err(err.into()),
                        RecvOutcome::Datagram { bytes, from } => match check_ack(&bytes, seq) {
                            Ok(ack) => {
                                self.observer.on_event(&TransferEvent::AckOk { ack });
                                SenderState::Advancing
                            }
                            Err(reason) => {
                                debug!("rejected ack from {from}: {reason:?}");
                                summary.rejected_acks += 1;
                                self.observer
                                    .on_event(&TransferEvent::AckBad { seq, reason });
                                SenderState::Retransmitting
                            }
                        },
                    }
                }
                SenderState::Advancing => {
                    index += 1;
                    resend = false;
                    if index == segments.len() {
                        SenderState::Closing
                    } else {
                        SenderState::Sending
                    }
                }
                SenderState::Retransmitting => {
                    resend = true;
                    summary.retransmissions += 1;
                    SenderState::Sending
                }
                SenderState::Closing => {
                    // CLOSE bypasses fault injection and is never acknowledged.
                    self.transport.send_to(&[], self.dest).await?;
                    self.observer.on_event(&TransferEvent::Close);
                    SenderState::Done
                }
                SenderState::Done => break,
            };
        }

        info!(
            "Transfer complete: {} attempts, {} retransmissions",
            summary.attempts, summary.retransmissions
        );
        Ok(summary)
    }
}

fn segment<I>(chunks: I) -> Result<Vec<Segment>, SenderError>
where
    I: IntoIterator<Item = Bytes>,
{
    let mut offset = 0u64;
    let mut segments = Vec::new();
    for (index, chunk) in chunks.into_iter().enumerate() {
        let seq = u32::try_from(index).map_err(|_| SenderError::TooManyChunks)?;
        let len = chunk.len() as u64;
        let packet =
            Packet::data(seq, chunk).map_err(|source| SenderError::Chunk { index, source })?;
        segments.push(Segment {
            packet,
            range: offset..offset + len,
        });
        offset += len;
    }
    Ok(segments)
}

/// Accept `bytes` only as a valid acknowledgment for `expected`.
fn check_ack(bytes: &[u8], expected: u32) -> Result<u32, AckRejection> {
    let decoded = Packet::decode(bytes).map_err(|_| AckRejection::Malformed)?;
    let ack = match decoded.packet {
        Packet::Ack { ack_no } => ack_no,
        Packet::Data { .. } => return Err(AckRejection::NotAnAck),
    };
    if !decoded.is_valid() {
        Err(AckRejection::Corrupted { ack })
    } else if ack != expected {
        Err(AckRejection::Mismatch { ack })
    } else {
        Ok(ack)
    }
}
