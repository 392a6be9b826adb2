use serde::Serialize;
use std::io::{self, Write};

/// What the fault injector did with one outgoing packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SendOutcome {
    Ok,
    Dropped,
    Corrupted,
}

impl SendOutcome {
    /// Short status tag used in console output.
    pub fn label(&self) -> &'static str {
        match self {
            SendOutcome::Ok => "SENT",
            SendOutcome::Dropped => "DROP",
            SendOutcome::Corrupted => "ERR",
        }
    }
}

/// Why the sender refused an incoming datagram as an acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AckRejection {
    Malformed,
    NotAnAck,
    Corrupted { ack: u32 },
    Mismatch { ack: u32 },
}

/// Status events emitted by both engines. Purely observational.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransferEvent {
    /// Sender pushed data packet `seq` (file bytes `start..end`) into the channel.
    Attempt {
        seq: u32,
        resend: bool,
        start: u64,
        end: u64,
        outcome: SendOutcome,
    },
    Timeout {
        seq: u32,
    },
    AckOk {
        ack: u32,
    },
    AckBad {
        seq: u32,
        reason: AckRejection,
    },
    /// Receiver handed the payload of `seq` to the output sink.
    Delivered {
        seq: u32,
        bytes: usize,
    },
    /// Receiver discarded a damaged datagram; `seq` is known when it decoded.
    Corrupt {
        seq: Option<u32>,
    },
    Duplicate {
        seq: u32,
        expected: u32,
    },
    AckSent {
        ack: u32,
        resend: bool,
        outcome: SendOutcome,
    },
    Close,
}

pub trait TransferObserver {
    fn on_event(&mut self, event: &TransferEvent);
}

impl TransferObserver for () {
    fn on_event(&mut self, _event: &TransferEvent) {}
}

impl<O: TransferObserver + ?Sized> TransferObserver for &mut O {
    fn on_event(&mut self, event: &TransferEvent) {
        (**self).on_event(event);
    }
}

impl<A: TransferObserver, B: TransferObserver> TransferObserver for (A, B) {
    fn on_event(&mut self, event: &TransferEvent) {
        self.0.on_event(event);
        self.1.on_event(event);
    }
}

/// Append-only destination for delivered payloads.
pub trait OutputSink {
    fn append(&mut self, bytes: &[u8]) -> io::Result<()>;
}

impl<W: Write> OutputSink for W {
    fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_all(bytes)?;
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter(usize);

    impl TransferObserver for Counter {
        fn on_event(&mut self, _event: &TransferEvent) {
            self.0 += 1;
        }
    }

    #[test]
    fn pair_forwards_to_both_observers() {
        let mut pair = (Counter::default(), Counter::default());
        pair.on_event(&TransferEvent::Close);
        pair.on_event(&TransferEvent::Timeout { seq: 1 });
        assert_eq!(pair.0.0, 2);
        assert_eq!(pair.1.0, 2);
    }

    #[test]
    fn events_serialize_with_a_type_tag() {
        let event = TransferEvent::AckBad {
            seq: 3,
            reason: AckRejection::Mismatch { ack: 2 },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ack_bad");
        assert_eq!(json["seq"], 3);
        assert_eq!(json["reason"]["mismatch"]["ack"], 2);
    }

    #[test]
    fn vec_sink_appends_in_order() {
        let mut sink: Vec<u8> = Vec::new();
        // Vec has an inherent `append`, so go through the trait explicitly.
        OutputSink::append(&mut sink, b"ab").unwrap();
        OutputSink::append(&mut sink, b"cd").unwrap();
        assert_eq!(sink, b"abcd");
    }
}
