//! Async UDP socket wrapper for a connected CoAP peer.
//!
//! Reads and writes take an optional deadline; `None` waits indefinitely.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::time::{Instant, timeout_at};

/// Datagram I/O used by the reader task.
///
/// Implemented by [`CoapSocket`]; tests drive the reader with scripted I/O.
pub trait DatagramIo: Send + Sync + 'static {
    /// Receive one datagram into `buf`, returning its length.
    fn recv_datagram(&self, buf: &mut [u8]) -> impl Future<Output = io::Result<usize>> + Send;

    /// Send one datagram to the peer.
    fn send_datagram(&self, data: &[u8]) -> impl Future<Output = io::Result<usize>> + Send;
}

/// Connected UDP socket shared between the request path and the reader task.
#[derive(Debug, Clone)]
pub struct CoapSocket {
    /// The underlying UDP socket.
    socket: Arc<UdpSocket>,
}

impl CoapSocket {
    /// Bind to `local` and connect to `peer`.
    pub async fn connect(local: SocketAddr, peer: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(local).await?;
        socket.connect(peer).await?;
        Ok(Self::from_socket(socket))
    }

    /// Wrap a socket that is already connected to its peer.
    pub fn from_socket(socket: UdpSocket) -> Self {
        Self {
            socket: Arc::new(socket),
        }
    }

    /// Get the local address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Get the connected peer address.
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.socket.peer_addr()
    }

    /// Write one datagram.
    pub async fn write(&self, data: &[u8], deadline: Option<Instant>) -> io::Result<usize> {
        match deadline {
            Some(at) => timeout_at(at, self.socket.send(data))
                .await
                .map_err(|_| io::Error::from(io::ErrorKind::TimedOut))?,
            None => self.socket.send(data).await,
        }
    }

    /// Read one datagram into `buf`, returning the received length.
    pub async fn read(&self, buf: &mut [u8], deadline: Option<Instant>) -> io::Result<usize> {
        match deadline {
            Some(at) => timeout_at(at, self.socket.recv(buf))
                .await
                .map_err(|_| io::Error::from(io::ErrorKind::TimedOut))?,
            None => self.socket.recv(buf).await,
        }
    }
}

impl DatagramIo for CoapSocket {
    async fn recv_datagram(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.read(buf, None).await
    }

    async fn send_datagram(&self, data: &[u8]) -> io::Result<usize> {
        self.write(data, None).await
    }
}
