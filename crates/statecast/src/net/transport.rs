use std::io;
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::time::Duration;

/// Send half of the unreliable transport seam.
pub trait PacketSink {
    fn send(&mut self, datagram: &[u8]) -> io::Result<usize>;
}

/// Receive half of the unreliable transport seam. `Ok(None)` means the
/// bounded timeout elapsed with nothing to read — a retry signal, never an
/// error.
pub trait PacketSource {
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>>;
}

/// UDP broadcast sender. Binds an ephemeral port and addresses every
/// datagram to the configured target.
pub struct Broadcaster {
    socket: UdpSocket,
    target: SocketAddr,
}

impl Broadcaster {
    pub fn new(addr: IpAddr, port: u16) -> io::Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))?;
        socket.set_broadcast(true)?;

        Ok(Self {
            socket,
            target: SocketAddr::new(addr, port),
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl PacketSink for Broadcaster {
    fn send(&mut self, datagram: &[u8]) -> io::Result<usize> {
        self.socket.send_to(datagram, self.target)
    }
}

/// UDP broadcast receiver with a bounded blocking receive.
pub struct Receiver {
    socket: UdpSocket,
}

impl Receiver {
    pub fn bind(port: u16, timeout: Duration) -> io::Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", port))?;
        socket.set_broadcast(true)?;
        socket.set_read_timeout(Some(timeout))?;

        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl PacketSource for Receiver {
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        match self.socket.recv_from(buf) {
            Ok((len, _)) => Ok(Some(len)),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receive_timeout_is_not_an_error() {
        let mut receiver = Receiver::bind(0, Duration::from_millis(10)).unwrap();
        let port = receiver.local_addr().unwrap().port();
        let mut buf = [0u8; 64];

        assert!(receiver.receive(&mut buf).unwrap().is_none());

        let mut sender = Broadcaster::new("127.0.0.1".parse().unwrap(), port).unwrap();
        sender.send(b"hello").unwrap();

        let mut len = None;
        for _ in 0..100 {
            if let Some(n) = receiver.receive(&mut buf).unwrap() {
                len = Some(n);
                break;
            }
        }
        let len = len.expect("no datagram within timeout budget");
        assert_eq!(&buf[..len], b"hello");
    }
}
