//! Scripted transport for driving one engine without a peer.

use bytes::Bytes;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;

use crate::transport::{RecvOutcome, Transport, TransportError};

pub(crate) enum Scripted {
    Datagram(Vec<u8>),
    Timeout,
}

/// Records every send and answers receives from a fixed script. An exhausted
/// script reports the channel as closed so a misbehaving engine fails fast.
pub(crate) struct ScriptedTransport {
    pub peer: SocketAddr,
    pub sent: Vec<(Vec<u8>, SocketAddr)>,
    pub recv_timeouts: Vec<Option<Duration>>,
    script: VecDeque<Scripted>,
}

impl ScriptedTransport {
    pub fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            peer: "192.0.2.1:9000".parse().unwrap(),
            sent: Vec::new(),
            recv_timeouts: Vec::new(),
            script: script.into_iter().collect(),
        }
    }

    pub fn sent_bytes(&self) -> Vec<&[u8]> {
        self.sent.iter().map(|(bytes, _)| bytes.as_slice()).collect()
    }
}

impl Transport for ScriptedTransport {
    async fn send_to(&mut self, bytes: &[u8], dest: SocketAddr) -> Result<(), TransportError> {
        self.sent.push((bytes.to_vec(), dest));
        Ok(())
    }

    async fn recv_from(&mut self, timeout: Option<Duration>) -> RecvOutcome {
        self.recv_timeouts.push(timeout);
        match self.script.pop_front() {
            Some(Scripted::Datagram(bytes)) => RecvOutcome::Datagram {
                bytes: Bytes::from(bytes),
                from: self.peer,
            },
            Some(Scripted::Timeout) => RecvOutcome::TimedOut,
            None => RecvOutcome::Failed(TransportError::Closed),
        }
    }
}
