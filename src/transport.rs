//! Datagram transport abstraction.
//!
//! The generator talks to the target over a connectionless, unreliable,
//! message-boundary-preserving channel bound to one remote host and two ports:
//! one for write/preload traffic and one for read/measurement traffic. The
//! trait keeps the scheduler and receiver independent of the concrete socket,
//! so tests can substitute a simulated endpoint.

use std::io;
use std::net::{IpAddr, SocketAddr, UdpSocket};

/// A black-box datagram channel: fire-and-forget sends plus a blocking receive.
///
/// Implementations must preserve datagram boundaries. Delivery is not
/// guaranteed and no implementation retries.
pub trait Channel: Send + Sync {
    /// Send a frame to the write/preload port.
    fn send_write(&self, frame: &[u8]) -> io::Result<()>;

    /// Send a frame to the read/measurement port.
    fn send_read(&self, frame: &[u8]) -> io::Result<()>;

    /// Block until a datagram arrives and copy it into `buf`, returning its
    /// length. Datagrams longer than `buf` are truncated.
    fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;
}

/// UDP channel over a single unbound local socket and two remote endpoints.
pub struct UdpChannel {
    socket: UdpSocket,
    write_addr: SocketAddr,
    read_addr: SocketAddr,
}

impl UdpChannel {
    /// Bind an ephemeral local socket for traffic to `host`.
    pub fn connect(host: IpAddr, write_port: u16, read_port: u16) -> io::Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))?;
        Ok(Self {
            socket,
            write_addr: SocketAddr::new(host, write_port),
            read_addr: SocketAddr::new(host, read_port),
        })
    }
}

impl Channel for UdpChannel {
    fn send_write(&self, frame: &[u8]) -> io::Result<()> {
        self.socket.send_to(frame, self.write_addr).map(|_| ())
    }

    fn send_read(&self, frame: &[u8]) -> io::Result<()> {
        self.socket.send_to(frame, self.read_addr).map(|_| ())
    }

    fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let (len, _peer) = self.socket.recv_from(buf)?;
        Ok(len)
    }
}
