//! Datagram transport for RTP delivery.
//!
//! The sender and receiver talk to the network through the [`Transport`]
//! trait so the loops can be driven by something other than a socket.
//! [`UdpTransport`] is the real implementation.

pub mod udp;

use std::io;
use std::net::SocketAddr;

pub use udp::UdpTransport;

/// Largest datagram a UDP socket can hand back.
pub const MAX_DATAGRAM_SIZE: usize = 65536;

/// Connectionless datagram transport.
pub trait Transport {
    /// Send one datagram to the connected peer.
    fn send(&self, datagram: &[u8]) -> io::Result<usize>;

    /// Block until one datagram arrives. Returns its length and sender.
    ///
    /// Bytes beyond `buf.len()` are discarded by the socket.
    fn recv(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, datagram: &[u8]) -> io::Result<usize> {
        (**self).send(datagram)
    }

    fn recv(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        (**self).recv(buf)
    }
}
