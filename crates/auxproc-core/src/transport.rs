//! Datagram transport for the signal channel.
//!
//! One JSON object per UDP datagram, in both directions. This adapter
//! is deliberately thin: framing beyond "one signal per datagram" and
//! any richer wire encoding belong to the external collaborator that
//! owns the channel. Undecodable datagrams are logged to the diagnostic
//! stream and skipped, never answered.

use std::io;
use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::signal::{Reply, Signal};

/// Largest datagram accepted on the signal channel.
const MAX_DATAGRAM: usize = 64 * 1024;

/// UDP endpoint carrying [`Signal`]s in and [`Reply`]s out.
pub struct UdpTransport {
    socket: UdpSocket,
    buf: Vec<u8>,
}

impl UdpTransport {
    /// Bind the signal channel endpoint.
    pub async fn bind(addr: &str) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        debug!(addr = %socket.local_addr()?, "signal channel bound");
        Ok(Self {
            socket,
            buf: vec![0u8; MAX_DATAGRAM],
        })
    }

    /// Local address of the bound socket.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive one datagram and decode it.
    ///
    /// Returns `None` for datagrams that do not decode as a known
    /// signal; those are logged and ignored per the dispatch contract.
    pub async fn recv(&mut self) -> io::Result<Option<(Signal, SocketAddr)>> {
        let (len, from) = self.socket.recv_from(&mut self.buf).await?;
        match serde_json::from_slice::<Signal>(&self.buf[..len]) {
            Ok(signal) => Ok(Some((signal, from))),
            Err(e) => {
                warn!(%from, len, error = %e, "ignoring undecodable datagram");
                Ok(None)
            }
        }
    }

    /// Send one reply datagram.
    pub async fn send(&self, reply: &Reply, to: SocketAddr) -> io::Result<()> {
        let payload = serde_json::to_vec(reply)?;
        self.socket.send_to(&payload, to).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SvarKey;
    use pretty_assertions::assert_eq;

    async fn pair() -> (UdpTransport, UdpSocket) {
        let transport = UdpTransport::bind("127.0.0.1:0").await.unwrap();
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        (transport, peer)
    }

    #[tokio::test]
    async fn test_recv_decodes_signal() {
        let (mut transport, peer) = pair().await;
        let addr = transport.local_addr().unwrap();

        let sig = Signal::GetValue { key: SvarKey(9) };
        peer.send_to(&serde_json::to_vec(&sig).unwrap(), addr)
            .await
            .unwrap();

        let (received, from) = transport.recv().await.unwrap().unwrap();
        assert_eq!(received, sig);
        assert_eq!(from, peer.local_addr().unwrap());
    }

    #[tokio::test]
    async fn test_recv_skips_garbage() {
        let (mut transport, peer) = pair().await;
        let addr = transport.local_addr().unwrap();

        peer.send_to(b"not json", addr).await.unwrap();
        assert!(transport.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_send_reply() {
        let (transport, peer) = pair().await;
        let reply = Reply::Assigned {
            status: 0,
            key: SvarKey(3),
        };
        transport
            .send(&reply, peer.local_addr().unwrap())
            .await
            .unwrap();

        let mut buf = [0u8; 1024];
        let (len, _) = peer.recv_from(&mut buf).await.unwrap();
        let back: Reply = serde_json::from_slice(&buf[..len]).unwrap();
        assert_eq!(back, reply);
    }
}
