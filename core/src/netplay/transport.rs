//! Sockets: one TCP stream for the handshake and commands, one UDP socket
//! for input packets.

use std::io::{self, ErrorKind};
use std::net::{
    Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs, UdpSocket,
};
use std::thread;
use std::time::{Duration, Instant};

use super::NetplayError;
use super::wire::{self, FrameRecord, PACKET_SIZE, UDP_FRAME_PACKETS};

/// Client connect attempts before giving up.
const CONNECT_ATTEMPTS: u32 = 3;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Upper bound on a blocking TCP read before the peer counts as gone.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest a wait blocks on the UDP socket before checking the stream.
const WAIT_SLICE: Duration = Duration::from_millis(50);

/// Interval between cancel checks while waiting for a client.
const ACCEPT_POLL: Duration = Duration::from_millis(500);
const ACCEPT_SLICE: Duration = Duration::from_millis(10);

/// Map the ways a closed peer shows up on a stream to `Disconnected`.
pub(crate) fn closed(e: io::Error) -> NetplayError {
    match e.kind() {
        ErrorKind::UnexpectedEof
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe => NetplayError::Disconnected,
        _ => NetplayError::Io(e),
    }
}

/// Host side sockets, bound before a client connects. TCP and UDP share the
/// port.
pub struct NetplayListener {
    tcp: TcpListener,
    udp: UdpSocket,
}

impl NetplayListener {
    /// Bind both sockets on `port`; `0` picks a free port.
    pub fn bind(port: u16) -> io::Result<Self> {
        let tcp = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))?;
        let port = tcp.local_addr()?.port();
        let udp = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))?;
        tracing::info!(port, "Netplay listening");
        Ok(Self { tcp, udp })
    }

    pub fn port(&self) -> io::Result<u16> {
        Ok(self.tcp.local_addr()?.port())
    }

    /// Wait for one client. `cancel` runs every half second and aborts the
    /// wait when it returns true.
    pub(crate) fn accept(
        self,
        mut cancel: impl FnMut() -> bool,
    ) -> Result<Transport, NetplayError> {
        self.tcp.set_nonblocking(true)?;
        let mut last_check = Instant::now();
        loop {
            match self.tcp.accept() {
                Ok((stream, addr)) => {
                    tracing::info!(%addr, "Netplay client connected");
                    return Transport::new(stream, self.udp, None);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if last_check.elapsed() >= ACCEPT_POLL {
                        last_check = Instant::now();
                        if cancel() {
                            return Err(NetplayError::Cancelled);
                        }
                    }
                    thread::sleep(ACCEPT_SLICE);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

pub(crate) struct Transport {
    tcp: TcpStream,
    udp: UdpSocket,
    /// Where input packets go. The host learns it from the first packet.
    peer_udp: Option<SocketAddr>,
    peer_addr: SocketAddr,
    /// Outgoing packets still to be dropped (loss simulation).
    drop_outgoing: u32,
}

impl Transport {
    fn new(
        tcp: TcpStream,
        udp: UdpSocket,
        peer_udp: Option<SocketAddr>,
    ) -> Result<Self, NetplayError> {
        tcp.set_nonblocking(false)?;
        tcp.set_nodelay(true)?;
        tcp.set_read_timeout(Some(COMMAND_TIMEOUT))?;
        udp.set_nonblocking(true)?;
        let peer_addr = tcp.peer_addr()?;
        Ok(Self {
            tcp,
            udp,
            peer_udp,
            peer_addr,
            drop_outgoing: 0,
        })
    }

    /// Connect to a host, retrying a failed attempt twice.
    pub(crate) fn connect(server: &str, port: u16) -> Result<Self, NetplayError> {
        let addrs: Vec<SocketAddr> = (server, port)
            .to_socket_addrs()
            .map_err(|_| NetplayError::Resolve(format!("{server}:{port}")))?
            .collect();
        if addrs.is_empty() {
            return Err(NetplayError::Resolve(format!("{server}:{port}")));
        }

        let mut last_error = None;
        for attempt in 1..=CONNECT_ATTEMPTS {
            for addr in &addrs {
                match TcpStream::connect_timeout(addr, CONNECT_TIMEOUT) {
                    Ok(stream) => {
                        let local: SocketAddr = if addr.is_ipv4() {
                            (Ipv4Addr::UNSPECIFIED, 0).into()
                        } else {
                            (Ipv6Addr::UNSPECIFIED, 0).into()
                        };
                        let udp = UdpSocket::bind(local)?;
                        return Self::new(stream, udp, Some(*addr));
                    }
                    Err(e) => {
                        tracing::warn!(attempt, %addr, error = %e, "Netplay connect failed");
                        last_error = Some(e);
                    }
                }
            }
        }
        Err(last_error.map_or(NetplayError::Disconnected, NetplayError::Io))
    }

    pub(crate) fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub(crate) fn stream(&mut self) -> &mut TcpStream {
        &mut self.tcp
    }

    pub(crate) fn drop_outgoing(&mut self, packets: u32) {
        self.drop_outgoing = packets;
    }

    pub(crate) fn send_packet(
        &mut self,
        records: &[FrameRecord; UDP_FRAME_PACKETS],
    ) -> Result<(), NetplayError> {
        let Some(addr) = self.peer_udp else {
            return Ok(());
        };
        if self.drop_outgoing > 0 {
            self.drop_outgoing -= 1;
            return Ok(());
        }
        let packet = wire::encode_packet(records);
        match self.udp.send_to(&packet, addr) {
            Ok(PACKET_SIZE) => Ok(()),
            Ok(sent) => Err(NetplayError::Protocol(format!(
                "short UDP send of {sent} bytes"
            ))),
            // A full socket buffer is just a lost packet.
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Drain every input packet that has arrived.
    pub(crate) fn recv_packets(
        &mut self,
    ) -> Result<Vec<[FrameRecord; UDP_FRAME_PACKETS]>, NetplayError> {
        let mut packets = Vec::new();
        let mut buf = [0u8; PACKET_SIZE + 1];
        loop {
            match self.udp.recv_from(&mut buf) {
                Ok((len, from)) => {
                    let known = self.peer_udp;
                    let peer = match known {
                        Some(peer) => peer,
                        None if from.ip() == self.peer_addr.ip() => {
                            tracing::info!(%from, "Netplay peer input address");
                            self.peer_udp = Some(from);
                            from
                        }
                        None => {
                            tracing::warn!(
                                %from,
                                peer = %self.peer_addr,
                                "Ignoring netplay packet from stranger"
                            );
                            continue;
                        }
                    };
                    if from != peer {
                        continue;
                    }
                    match wire::decode_packet(&buf[..len]) {
                        Some(records) => packets.push(records),
                        None => tracing::warn!(len, "Dropping malformed netplay packet"),
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                // ICMP port unreachable surfaces here on some platforms.
                Err(e) if e.kind() == ErrorKind::ConnectionReset => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(packets)
    }

    /// Whether a command is waiting on the stream.
    pub(crate) fn command_ready(&self) -> Result<bool, NetplayError> {
        self.tcp.set_nonblocking(true)?;
        let result = self.tcp.peek(&mut [0u8; 1]);
        self.tcp.set_nonblocking(false)?;
        match result {
            Ok(0) => Err(NetplayError::Disconnected),
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(false),
            Err(e) => Err(closed(e)),
        }
    }

    /// Block on the UDP socket for at most `timeout`. Returns whether a
    /// packet is waiting.
    fn packet_ready(&self, timeout: Duration) -> Result<bool, NetplayError> {
        self.udp.set_read_timeout(Some(timeout))?;
        let mut buf = [0u8; PACKET_SIZE + 1];
        match self.udp.peek_from(&mut buf) {
            Ok(_) => Ok(true),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                Ok(false)
            }
            Err(e) if e.kind() == ErrorKind::ConnectionReset => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Block until either socket has data or `timeout` passes. Returns
    /// whether data arrived.
    pub(crate) fn wait(&self, timeout: Duration) -> Result<bool, NetplayError> {
        if self.command_ready()? {
            return Ok(true);
        }
        let deadline = Instant::now() + timeout;
        self.udp.set_nonblocking(false)?;
        let result = self.wait_blocking(deadline);
        self.udp.set_nonblocking(true)?;
        result
    }

    fn wait_blocking(&self, deadline: Instant) -> Result<bool, NetplayError> {
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return Ok(false);
            }
            if self.packet_ready(left.min(WAIT_SLICE))? || self.command_ready()? {
                return Ok(true);
            }
        }
    }
}
