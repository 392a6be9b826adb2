//! In-process datagram channel for simulations and tests.

use bytes::Bytes;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use crate::transport::{RecvOutcome, Transport, TransportError};

type Datagram = (Bytes, SocketAddr);

/// One end of a connected in-memory pair.
///
/// Datagrams addressed anywhere other than the peer vanish, as they would on
/// a real network. Once the peer is dropped, sends and receives fail with
/// [`TransportError::Closed`].
#[derive(Debug)]
pub struct MemoryTransport {
    local_addr: SocketAddr,
    peer_addr: SocketAddr,
    tx: mpsc::UnboundedSender<Datagram>,
    rx: mpsc::UnboundedReceiver<Datagram>,
}

impl MemoryTransport {
    pub fn pair(a: SocketAddr, b: SocketAddr) -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (
            Self {
                local_addr: a,
                peer_addr: b,
                tx: a_tx,
                rx: a_rx,
            },
            Self {
                local_addr: b,
                peer_addr: a,
                tx: b_tx,
                rx: b_rx,
            },
        )
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

impl Transport for MemoryTransport {
    async fn send_to(&mut self, bytes: &[u8], dest: SocketAddr) -> Result<(), TransportError> {
        if dest != self.peer_addr {
            debug!("{} -> {dest}: no such peer, datagram discarded", self.local_addr);
            return Ok(());
        }
        self.tx
            .send((Bytes::copy_from_slice(bytes), self.local_addr))
            .map_err(|_| TransportError::Closed)
    }

    async fn recv_from(&mut self, timeout: Option<Duration>) -> RecvOutcome {
        let received = match timeout {
            Some(limit) => match tokio::time::timeout(limit, self.rx.recv()).await {
                Ok(received) => received,
                Err(_) => return RecvOutcome::TimedOut,
            },
            None => self.rx.recv().await,
        };

        match received {
            Some((bytes, from)) => RecvOutcome::Datagram { bytes, from },
            None => RecvOutcome::Failed(TransportError::Closed),
        }
    }
}
