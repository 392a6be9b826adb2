use bytes::Bytes;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::debug;

use crate::transport::{RecvOutcome, Transport, TransportError};

/// Largest datagram accepted from the socket; anything longer is truncated
/// and then fails to decode.
const MAX_DATAGRAM: usize = 65_535;

/// [`Transport`] over a tokio UDP socket.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
    buf: Vec<u8>,
}

impl UdpTransport {
    /// Bind to `addr`; port 0 lets the OS pick one.
    pub async fn bind(addr: SocketAddr) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(addr).await?;
        let local_addr = socket.local_addr()?;
        debug!("UDP transport bound to {local_addr}");
        Ok(Self {
            socket,
            local_addr,
            buf: vec![0u8; MAX_DATAGRAM],
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Transport for UdpTransport {
    async fn send_to(&mut self, bytes: &[u8], dest: SocketAddr) -> Result<(), TransportError> {
        self.socket.send_to(bytes, dest).await?;
        Ok(())
    }

    async fn recv_from(&mut self, timeout: Option<Duration>) -> RecvOutcome {
        let recv = self.socket.recv_from(&mut self.buf);
        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, recv).await {
                Ok(result) => result,
                Err(_) => return RecvOutcome::TimedOut,
            },
            None => recv.await,
        };

        match result {
            Ok((n, from)) => RecvOutcome::Datagram {
                bytes: Bytes::copy_from_slice(&self.buf[..n]),
                from,
            },
            Err(err) => RecvOutcome::Failed(err.into()),
        }
    }
}
