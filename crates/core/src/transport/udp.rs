use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use super::Transport;
use crate::error::{Result, RtpError};

/// UDP socket carrying RTP datagrams.
///
/// Built either connected to a remote peer ([`connect`](Self::connect), the
/// sending side) or bound to a local address ([`bind`](Self::bind), the
/// receiving side). Setup failures come back as
/// [`RtpError::TransportSetup`] naming the address involved.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind an ephemeral local socket and connect it to `remote`.
    pub fn connect(remote: &str) -> Result<Self> {
        let setup = |source: io::Error| RtpError::TransportSetup {
            addr: remote.to_string(),
            source,
        };

        let peer = resolve(remote).map_err(setup)?;
        let local = if peer.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };

        let socket = UdpSocket::bind(local).map_err(setup)?;
        socket.connect(peer).map_err(setup)?;

        tracing::debug!(%peer, local = ?socket.local_addr().ok(), "UDP transport connected");
        Ok(Self { socket })
    }

    /// Bind a socket listening on `local` (e.g. `0.0.0.0:5004`).
    pub fn bind(local: &str) -> Result<Self> {
        let setup = |source: io::Error| RtpError::TransportSetup {
            addr: local.to_string(),
            source,
        };

        let addr = resolve(local).map_err(setup)?;
        let socket = UdpSocket::bind(addr).map_err(setup)?;

        tracing::debug!(local = ?socket.local_addr().ok(), "UDP transport bound");
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Bound every receive. `None` blocks indefinitely.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        Ok(self.socket.set_read_timeout(timeout)?)
    }
}

impl Transport for UdpTransport {
    fn send(&self, datagram: &[u8]) -> io::Result<usize> {
        self.socket.send(datagram)
    }

    fn recv(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf)
    }
}

fn resolve(addr: &str) -> io::Result<SocketAddr> {
    addr.to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "address resolved to nothing")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_datagram() {
        let rx = UdpTransport::bind("127.0.0.1:0").unwrap();
        let rx_addr = rx.local_addr().unwrap();
        rx.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

        let tx = UdpTransport::connect(&rx_addr.to_string()).unwrap();
        assert_eq!(tx.send(&[1, 2, 3]).unwrap(), 3);

        let mut buf = [0u8; 16];
        let (n, peer) = rx.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[1u8, 2, 3]);
        assert_eq!(peer, tx.local_addr().unwrap());
    }

    #[test]
    fn unresolvable_address_is_setup_failure() {
        let err = UdpTransport::connect("not an address").unwrap_err();
        assert!(matches!(err, RtpError::TransportSetup { ref addr, .. } if addr == "not an address"));
    }

    #[test]
    fn bind_conflict_is_setup_failure() {
        let first = UdpTransport::bind("127.0.0.1:0").unwrap();
        let taken = first.local_addr().unwrap().to_string();
        assert!(matches!(
            UdpTransport::bind(&taken),
            Err(RtpError::TransportSetup { .. })
        ));
    }
}
