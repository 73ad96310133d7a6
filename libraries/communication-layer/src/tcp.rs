//! Packet transport over plain TCP connections.
//!
//! Each packet is serialized with `bincode` and written as one message: an
//! 8-byte little-endian length followed by the serialized bytes. An input port
//! binds a listener and accepts any number of peers; an output port connects
//! lazily on the first publish and reconnects on the next publish after a
//! failure.

use std::{
    io::{self, Read, Write},
    net::{IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

use conduit_message::Packet;

use crate::{BoxError, CommunicationLayer, PortAddress, PortEvent, Publisher, Subscriber};

/// Number of received events that are buffered before the connection threads
/// stop reading from their sockets.
const EVENT_BUFFER: usize = 64;

/// Largest message a peer may announce in its length prefix.
pub const MAX_MESSAGE_LEN: u64 = 64 * 1024 * 1024;

/// How long a publisher waits for its peer to accept a connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Transport backend that uses TCP connections.
#[derive(Debug, Default)]
pub struct TcpLayer {}

impl TcpLayer {
    /// Creates a new TCP backend.
    pub fn new() -> Self {
        Self {}
    }
}

impl CommunicationLayer for TcpLayer {
    fn bind(&mut self, address: &PortAddress) -> Result<Box<dyn Subscriber>, BoxError> {
        let socket_addr = resolve(address, true)?;
        let subscriber = TcpSubscriber::bind(socket_addr)?;
        tracing::debug!("bound `{address}` on {}", subscriber.local_addr);
        Ok(Box::new(subscriber))
    }

    fn connect(&mut self, address: &PortAddress) -> Result<Box<dyn Publisher>, BoxError> {
        let socket_addr = resolve(address, false)?;
        Ok(Box::new(TcpPublisher {
            address: socket_addr,
            stream: None,
            closed: false,
        }))
    }
}

fn resolve(address: &PortAddress, bind: bool) -> Result<SocketAddr, BoxError> {
    let PortAddress::Tcp(host_port) = address else {
        return Err(format!("tcp layer cannot handle `{address}`").into());
    };
    // `*:port` binds all interfaces
    let host_port = match host_port.strip_prefix("*:") {
        Some(port) if bind => format!("0.0.0.0:{port}"),
        _ => host_port.clone(),
    };
    host_port
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| format!("`{address}` did not resolve to any socket address").into())
}

/// Input port that accepts packets from any number of TCP peers.
pub struct TcpSubscriber {
    local_addr: SocketAddr,
    events: flume::Receiver<PortEvent>,
    closed: Arc<AtomicBool>,
    connections: Arc<Mutex<Vec<TcpStream>>>,
}

impl TcpSubscriber {
    /// Binds a listener on `addr` and starts accepting peers.
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        let local_addr = listener.local_addr()?;
        let (tx, rx) = flume::bounded(EVENT_BUFFER);
        let closed = Arc::new(AtomicBool::new(false));
        let connections = Arc::new(Mutex::new(Vec::new()));

        let accept_closed = closed.clone();
        let accept_connections = connections.clone();
        thread::Builder::new()
            .name(format!("accept {local_addr}"))
            .spawn(move || accept_loop(listener, tx, accept_closed, accept_connections))?;

        Ok(Self {
            local_addr,
            events: rx,
            closed,
            connections,
        })
    }

    /// The address the listener is bound to.
    ///
    /// Differs from the requested address when binding port `0`.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Subscriber for TcpSubscriber {
    fn events(&self) -> &flume::Receiver<PortEvent> {
        &self.events
    }

    fn close(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let connections = std::mem::take(
            &mut *self
                .connections
                .lock()
                .unwrap_or_else(|err| err.into_inner()),
        );
        for connection in connections {
            let _ = connection.shutdown(Shutdown::Both);
        }
        // wake up the accept loop so that it drops the listener
        let _ = TcpStream::connect(wake_address(self.local_addr));
    }
}

impl Drop for TcpSubscriber {
    fn drop(&mut self) {
        self.close();
    }
}

fn wake_address(local_addr: SocketAddr) -> SocketAddr {
    match local_addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(Ipv4Addr::LOCALHOST.into(), local_addr.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(Ipv6Addr::LOCALHOST.into(), local_addr.port())
        }
        _ => local_addr,
    }
}

fn accept_loop(
    listener: TcpListener,
    events: flume::Sender<PortEvent>,
    closed: Arc<AtomicBool>,
    connections: Arc<Mutex<Vec<TcpStream>>>,
) {
    for stream in listener.incoming() {
        if closed.load(Ordering::SeqCst) {
            break;
        }
        let stream = match stream {
            Ok(stream) => stream,
            Err(err) => {
                if events
                    .send(PortEvent::Error(format!("failed to accept connection: {err}")))
                    .is_err()
                {
                    break;
                }
                continue;
            }
        };
        let _ = stream.set_nodelay(true);
        match stream.try_clone() {
            Ok(handle) => connections
                .lock()
                .unwrap_or_else(|err| err.into_inner())
                .push(handle),
            Err(err) => tracing::warn!("failed to clone connection handle: {err}"),
        }
        let events = events.clone();
        let closed = closed.clone();
        let spawned = thread::Builder::new()
            .name("tcp port reader".into())
            .spawn(move || receive_loop(stream, events, closed));
        if let Err(err) = spawned {
            tracing::error!("failed to spawn connection thread: {err}");
        }
    }
    tracing::trace!("accept loop finished");
}

fn receive_loop(mut stream: TcpStream, events: flume::Sender<PortEvent>, closed: Arc<AtomicBool>) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown peer".into());
    loop {
        let event = match tcp_receive(&mut stream) {
            Ok(raw) => match bincode::deserialize::<Packet>(&raw) {
                Ok(packet) if packet.is_empty() => PortEvent::Disconnected,
                Ok(packet) => PortEvent::Packet(packet),
                // the length prefix keeps the stream in sync, so keep reading
                Err(err) => PortEvent::Error(format!("failed to deserialize packet: {err}")),
            },
            Err(_) if closed.load(Ordering::SeqCst) => break,
            Err(err) => match err.kind() {
                io::ErrorKind::UnexpectedEof
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted => PortEvent::Disconnected,
                _ => {
                    let _ = events.send(PortEvent::Error(format!(
                        "failed to receive from {peer}: {err}"
                    )));
                    break;
                }
            },
        };
        let finished = event == PortEvent::Disconnected;
        if events.send(event).is_err() || finished {
            break;
        }
    }
    tracing::debug!("connection to {peer} finished");
}

/// Output port that sends packets to one TCP peer.
struct TcpPublisher {
    address: SocketAddr,
    stream: Option<TcpStream>,
    closed: bool,
}

impl TcpPublisher {
    fn stream(&mut self) -> io::Result<&mut TcpStream> {
        let stream = match self.stream.take() {
            Some(stream) => stream,
            None => {
                let stream = TcpStream::connect_timeout(&self.address, CONNECT_TIMEOUT)?;
                stream.set_nodelay(true)?;
                stream
            }
        };
        Ok(self.stream.insert(stream))
    }
}

impl Publisher for TcpPublisher {
    fn publish(&mut self, packet: &Packet) -> Result<(), BoxError> {
        if self.closed {
            return Err("port is closed".into());
        }
        let serialized = bincode::serialize(packet)?;
        let result = self
            .stream()
            .and_then(|stream| tcp_send(stream, &serialized));
        if let Err(err) = result {
            // reconnect on the next publish
            self.stream = None;
            return Err(format!("failed to send to {}: {err}", self.address).into());
        }
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

fn tcp_send(connection: &mut (impl Write + Unpin), message: &[u8]) -> io::Result<()> {
    let len_raw = (message.len() as u64).to_le_bytes();
    connection.write_all(&len_raw)?;
    connection.write_all(message)?;
    connection.flush()?;
    Ok(())
}

fn tcp_receive(connection: &mut (impl Read + Unpin)) -> io::Result<Vec<u8>> {
    let reply_len = {
        let mut raw = [0; 8];
        connection.read_exact(&mut raw)?;
        u64::from_le_bytes(raw)
    };
    if reply_len > MAX_MESSAGE_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("message of {reply_len} bytes exceeds the limit of {MAX_MESSAGE_LEN} bytes"),
        ));
    }
    let reply_len = usize::try_from(reply_len)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    let mut reply = vec![0; reply_len];
    connection.read_exact(&mut reply)?;
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn bind_local() -> (TcpSubscriber, PortAddress) {
        let subscriber = TcpSubscriber::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let address = PortAddress::Tcp(subscriber.local_addr().to_string());
        (subscriber, address)
    }

    #[test]
    fn packets_arrive_in_order() {
        let (subscriber, address) = bind_local();
        let mut publisher = TcpLayer::new().connect(&address).unwrap();

        for payload in ["one", "two", "three"] {
            publisher.publish(&Packet::data(payload)).unwrap();
        }
        publisher.publish(&Packet::open_bracket()).unwrap();

        for payload in ["one", "two", "three"] {
            assert_eq!(
                subscriber.events().recv_timeout(TIMEOUT),
                Ok(PortEvent::Packet(Packet::data(payload)))
            );
        }
        assert_eq!(
            subscriber.events().recv_timeout(TIMEOUT),
            Ok(PortEvent::Packet(Packet::open_bracket()))
        );
    }

    #[test]
    fn closing_the_peer_reports_disconnect() {
        let (subscriber, address) = bind_local();
        let mut publisher = TcpLayer::new().connect(&address).unwrap();
        publisher.publish(&Packet::data("last")).unwrap();
        publisher.close();

        assert_eq!(
            subscriber.events().recv_timeout(TIMEOUT),
            Ok(PortEvent::Packet(Packet::data("last")))
        );
        assert_eq!(
            subscriber.events().recv_timeout(TIMEOUT),
            Ok(PortEvent::Disconnected)
        );
    }

    #[test]
    fn empty_packet_is_a_disconnect_marker() {
        let (subscriber, address) = bind_local();
        let mut publisher = TcpLayer::new().connect(&address).unwrap();
        publisher.publish(&Packet::from_frames(vec![])).unwrap();

        assert_eq!(
            subscriber.events().recv_timeout(TIMEOUT),
            Ok(PortEvent::Disconnected)
        );
    }

    #[test]
    fn publish_without_peer_fails_and_recovers() {
        let free_addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let address = PortAddress::Tcp(free_addr.to_string());

        let mut publisher = TcpLayer::new().connect(&address).unwrap();
        assert!(publisher.publish(&Packet::data("lost")).is_err());

        let subscriber = TcpSubscriber::bind(free_addr).unwrap();
        publisher.publish(&Packet::data("found")).unwrap();
        assert_eq!(
            subscriber.events().recv_timeout(TIMEOUT),
            Ok(PortEvent::Packet(Packet::data("found")))
        );
    }

    #[test]
    fn oversized_message_drops_the_connection() {
        let (subscriber, address) = bind_local();
        let PortAddress::Tcp(host_port) = &address else {
            unreachable!()
        };
        let mut raw = TcpStream::connect(host_port.as_str()).unwrap();
        raw.write_all(&(1u64 << 44).to_le_bytes()).unwrap();
        raw.write_all(b"junk").unwrap();

        assert!(matches!(
            subscriber.events().recv_timeout(TIMEOUT),
            Ok(PortEvent::Error(_))
        ));

        // other peers are still accepted
        let mut publisher = TcpLayer::new().connect(&address).unwrap();
        publisher.publish(&Packet::data("fine")).unwrap();
        assert_eq!(
            subscriber.events().recv_timeout(TIMEOUT),
            Ok(PortEvent::Packet(Packet::data("fine")))
        );
    }

    #[test]
    fn unreachable_peer_fails_within_the_connect_timeout() {
        // non-routable address: either rejected at once or never answered
        let address = PortAddress::Tcp("10.255.255.1:9".into());
        let mut publisher = TcpLayer::new().connect(&address).unwrap();

        let started = Instant::now();
        assert!(publisher.publish(&Packet::data("lost")).is_err());
        assert!(started.elapsed() < CONNECT_TIMEOUT + Duration::from_secs(2));
    }

    #[test]
    fn memory_addresses_are_rejected() {
        let mut layer = TcpLayer::new();
        assert!(layer.bind(&PortAddress::Memory("in".into())).is_err());
        assert!(layer.connect(&PortAddress::Memory("out".into())).is_err());
    }
}
