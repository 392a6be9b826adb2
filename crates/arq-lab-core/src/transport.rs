use bytes::Bytes;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("peer transport closed")]
    Closed,
}

/// Result of one receive call. A deadline expiring is an ordinary outcome,
/// not an error.
#[derive(Debug)]
pub enum RecvOutcome {
    Datagram { bytes: Bytes, from: SocketAddr },
    TimedOut,
    Failed(TransportError),
}

/// Unreliable datagram channel owned by one engine.
pub trait Transport {
    fn send_to(
        &mut self,
        bytes: &[u8],
        dest: SocketAddr,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Wait for the next datagram. `None` waits forever.
    fn recv_from(&mut self, timeout: Option<Duration>) -> impl Future<Output = RecvOutcome> + Send;
}
