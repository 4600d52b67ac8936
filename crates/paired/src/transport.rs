//! Listening endpoints the paired device connects to

use std::net::{IpAddr, SocketAddr};

use async_trait::async_trait;
use log::{debug, info};
use tokio::io::AsyncWrite;
use tokio::net::{TcpListener, TcpStream};

use crate::TransportError;

/// Binds a fresh listening endpoint on the configured local address.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    type Listener: PeerListener;

    async fn bind(&self) -> Result<Self::Listener, TransportError>;
}

/// A bound endpoint waiting for the paired device.
///
/// Dropping the listener closes it. `accept` may wait forever; callers
/// bound it with a timeout.
#[async_trait]
pub trait PeerListener: Send {
    type Peer: AsyncWrite + Unpin + Send;

    async fn accept(&mut self) -> Result<Self::Peer, TransportError>;
}

/// Stream socket stand-in for the serial-over-radio profile used by the
/// paired device. One peer is served at a time.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    addr: SocketAddr,
}

impl TcpTransport {
    /// Validates the local address once; a malformed address is fatal.
    pub fn new(local_address: &str, port: u16) -> Result<Self, TransportError> {
        let ip: IpAddr = local_address
            .trim()
            .parse()
            .map_err(|_| TransportError::InvalidAddress(local_address.to_string()))?;
        Ok(Self {
            addr: SocketAddr::new(ip, port),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

#[async_trait]
impl PeerTransport for TcpTransport {
    type Listener = TcpPeerListener;

    async fn bind(&self) -> Result<TcpPeerListener, TransportError> {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(TransportError::Bind)?;
        debug!("Listening for paired device on {}", self.addr);
        Ok(TcpPeerListener { listener })
    }
}

pub struct TcpPeerListener {
    listener: TcpListener,
}

impl TcpPeerListener {
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener.local_addr().map_err(TransportError::Bind)
    }
}

#[async_trait]
impl PeerListener for TcpPeerListener {
    type Peer = TcpStream;

    async fn accept(&mut self) -> Result<TcpStream, TransportError> {
        let (stream, peer) = self.listener.accept().await.map_err(TransportError::Accept)?;
        stream.set_nodelay(true).map_err(TransportError::Accept)?;
        info!("Paired device connected from {}", peer);
        Ok(stream)
    }
}
