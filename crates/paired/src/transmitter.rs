//! Reconnecting feed of the latest fix to the paired device
//!
//! ```text
//!            bind+accept ok
//! Disconnected ──> Connecting ──────────────> Connected
//!      ^               │ bind/accept failed       │ write failed
//!      └───────────────┴──────────────────────────┘
//! ```
//!
//! A failed connect attempt waits one tick before the next attempt; a
//! failed write goes straight back to connecting.

use std::time::Duration;

use futures_util::SinkExt;
use gps_relay_core::{FixStore, ShutdownSignal};
use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::time::timeout;
use tokio_util::codec::FramedWrite;

use crate::{FixLineCodec, PeerListener, PeerTransport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone)]
pub struct TransmitterConfig {
    pub accept_timeout: Duration,
    pub write_timeout: Duration,
    pub tick_interval: Duration,
}

impl Default for TransmitterConfig {
    fn default() -> Self {
        Self {
            accept_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(5),
            tick_interval: Duration::from_secs(1),
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A peer was accepted; the next tick writes to it.
    Connected,
    /// Bind or accept failed or timed out; still disconnected.
    ConnectFailed,
    /// A line was written. `valid` is false for the sentinel line.
    Sent { valid: bool },
    /// The write failed and the peer was dropped.
    Disconnected,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransmitterStats {
    pub connect_attempts: u64,
    pub connections: u64,
    pub lines_sent: u64,
    pub disconnects: u64,
}

type PeerOf<T> = <<T as PeerTransport>::Listener as PeerListener>::Peer;

/// Both handles of a live connection; dropping it closes them.
struct Session<T: PeerTransport> {
    _listener: T::Listener,
    writer: FramedWrite<PeerOf<T>, FixLineCodec>,
}

pub struct PairedDeviceTransmitter<T: PeerTransport> {
    transport: T,
    store: FixStore,
    shutdown: ShutdownSignal,
    config: TransmitterConfig,
    session: Option<Session<T>>,
    state: watch::Sender<ConnectionState>,
    stats: TransmitterStats,
}

impl<T: PeerTransport> PairedDeviceTransmitter<T> {
    pub fn new(
        transport: T,
        store: FixStore,
        shutdown: ShutdownSignal,
        config: TransmitterConfig,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            transport,
            store,
            shutdown,
            config,
            session: None,
            state,
            stats: TransmitterStats::default(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Follow connection state changes from another task.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn stats(&self) -> TransmitterStats {
        self.stats
    }

    fn set_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            debug!("Paired link {:?} -> {:?}", current, next);
            *current = next;
            true
        });
    }

    /// Run until shutdown. Only fatal transport errors are returned.
    pub async fn run(mut self) -> Result<TransmitterStats, TransportError> {
        info!("Paired device transmitter started with config: {:?}", self.config);
        let shutdown = self.shutdown.clone();

        loop {
            if shutdown.is_triggered() {
                break;
            }

            // Bind and accept can wait indefinitely and are abandoned on
            // shutdown; a started write runs until it completes or times out.
            let outcome = if self.session.is_some() {
                self.step().await
            } else {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    outcome = self.connect() => outcome,
                }
            };

            match outcome {
                Ok(StepOutcome::Disconnected) => continue,
                Ok(_) => {
                    if shutdown.sleep(self.config.tick_interval).await {
                        break;
                    }
                }
                Err(e) => {
                    self.close();
                    return Err(e);
                }
            }
        }

        self.close();
        info!("Paired device transmitter stopped: {:?}", self.stats);
        Ok(self.stats)
    }

    /// Perform one tick of the state machine.
    pub async fn step(&mut self) -> Result<StepOutcome, TransportError> {
        if self.session.is_none() {
            return self.connect().await;
        }

        let fix = self.store.get().await;
        let valid = fix.as_ref().is_some_and(|fix| fix.is_valid());
        let write_timeout = self.config.write_timeout;

        let Some(session) = self.session.as_mut() else {
            return Ok(StepOutcome::ConnectFailed);
        };
        let result = match timeout(write_timeout, session.writer.send(fix)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TransportError::Write(e)),
            Err(_) => Err(TransportError::WriteTimeout(write_timeout)),
        };

        match result {
            Ok(()) => {
                self.stats.lines_sent += 1;
                Ok(StepOutcome::Sent { valid })
            }
            Err(e) => {
                warn!("Paired device write failed, dropping link: {}", e);
                self.close();
                self.stats.disconnects += 1;
                Ok(StepOutcome::Disconnected)
            }
        }
    }

    async fn connect(&mut self) -> Result<StepOutcome, TransportError> {
        self.set_state(ConnectionState::Connecting);
        self.stats.connect_attempts += 1;

        let mut listener = match self.transport.bind().await {
            Ok(listener) => listener,
            Err(e) => return self.connect_failed(e),
        };

        let accept_timeout = self.config.accept_timeout;
        let peer = match timeout(accept_timeout, listener.accept()).await {
            Ok(Ok(peer)) => peer,
            Ok(Err(e)) => return self.connect_failed(e),
            Err(_) => return self.connect_failed(TransportError::AcceptTimeout(accept_timeout)),
        };

        self.session = Some(Session {
            _listener: listener,
            writer: FramedWrite::new(peer, FixLineCodec),
        });
        self.stats.connections += 1;
        self.set_state(ConnectionState::Connected);
        info!("Paired device link established");
        Ok(StepOutcome::Connected)
    }

    fn connect_failed(&mut self, e: TransportError) -> Result<StepOutcome, TransportError> {
        self.set_state(ConnectionState::Disconnected);
        if e.is_fatal() {
            return Err(e);
        }
        warn!("Paired device not connected: {}", e);
        Ok(StepOutcome::ConnectFailed)
    }

    fn close(&mut self) {
        if self.session.take().is_some() {
            info!("Paired device link closed");
        }
        self.set_state(ConnectionState::Disconnected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gps_relay_core::decode_fix;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tokio_test::io::{Builder, Mock};

    const SCENARIO_A: &[u8] = b"KF4WBK,171207.000,A,3557.3377,N,07901.1607,W,120923";
    const SCENARIO_A_LINE: &[u8] = b"KF4WBK,12:09:23,17:12:07,35.955628,-79.019345\r\n";

    enum Script {
        BindFails(io::ErrorKind),
        AcceptFails,
        AcceptHangs,
        Peer(Mock),
    }

    #[derive(Clone, Default)]
    struct ScriptedTransport {
        script: Arc<Mutex<VecDeque<Script>>>,
        binds: Arc<Mutex<u32>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Script>) -> Self {
            Self {
                script: Arc::new(Mutex::new(script.into())),
                binds: Arc::default(),
            }
        }

        fn binds(&self) -> u32 {
            *self.binds.lock().unwrap()
        }
    }

    struct ScriptedListener(Option<Script>);

    #[async_trait]
    impl PeerTransport for ScriptedTransport {
        type Listener = ScriptedListener;

        async fn bind(&self) -> Result<ScriptedListener, TransportError> {
            *self.binds.lock().unwrap() += 1;
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Script::BindFails(kind)) => Err(TransportError::Bind(kind.into())),
                other => Ok(ScriptedListener(other)),
            }
        }
    }

    #[async_trait]
    impl PeerListener for ScriptedListener {
        type Peer = Mock;

        async fn accept(&mut self) -> Result<Mock, TransportError> {
            match self.0.take() {
                Some(Script::Peer(mock)) => Ok(mock),
                Some(Script::AcceptFails) => {
                    Err(TransportError::Accept(io::ErrorKind::ConnectionAborted.into()))
                }
                _ => std::future::pending().await,
            }
        }
    }

    fn broken_peer() -> Mock {
        Builder::new()
            .write_error(io::ErrorKind::BrokenPipe.into())
            .build()
    }

    fn transmitter(
        transport: ScriptedTransport,
    ) -> (PairedDeviceTransmitter<ScriptedTransport>, FixStore, ShutdownSignal) {
        let store = FixStore::new();
        let shutdown = ShutdownSignal::new();
        let config = TransmitterConfig {
            accept_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(5),
            tick_interval: Duration::from_secs(1),
        };
        let transmitter =
            PairedDeviceTransmitter::new(transport, store.clone(), shutdown.clone(), config);
        (transmitter, store, shutdown)
    }

    #[tokio::test]
    async fn test_connect_then_send_latest_fix() {
        let peer = Builder::new().write(SCENARIO_A_LINE).build();
        let transport = ScriptedTransport::new(vec![Script::Peer(peer)]);
        let (mut transmitter, store, _) = transmitter(transport);
        store.set(decode_fix(SCENARIO_A).unwrap()).await;

        assert_eq!(transmitter.state(), ConnectionState::Disconnected);
        assert_eq!(transmitter.step().await.unwrap(), StepOutcome::Connected);
        assert_eq!(transmitter.state(), ConnectionState::Connected);

        assert_eq!(transmitter.step().await.unwrap(), StepOutcome::Sent { valid: true });
        assert_eq!(transmitter.stats().lines_sent, 1);
    }

    #[tokio::test]
    async fn test_sentinel_sent_without_valid_fix() {
        let peer = Builder::new()
            .write(b"No valid location\r\n")
            .write(b"No valid location\r\n")
            .build();
        let transport = ScriptedTransport::new(vec![Script::Peer(peer)]);
        let (mut transmitter, store, _) = transmitter(transport);

        transmitter.step().await.unwrap();
        assert_eq!(transmitter.step().await.unwrap(), StepOutcome::Sent { valid: false });

        store.set(decode_fix(b"kf4wbk,V").unwrap()).await;
        assert_eq!(transmitter.step().await.unwrap(), StepOutcome::Sent { valid: false });
    }

    #[tokio::test]
    async fn test_write_failure_rebinds_on_next_tick() {
        let transport = ScriptedTransport::new(vec![
            Script::Peer(broken_peer()),
            Script::Peer(broken_peer()),
            Script::AcceptFails,
            Script::BindFails(io::ErrorKind::AddrInUse),
            Script::Peer(Builder::new().write(SCENARIO_A_LINE).build()),
        ]);
        let (mut transmitter, store, _) = transmitter(transport.clone());
        store.set(decode_fix(SCENARIO_A).unwrap()).await;

        for _ in 0..2 {
            assert_eq!(transmitter.step().await.unwrap(), StepOutcome::Connected);
            assert_eq!(transmitter.step().await.unwrap(), StepOutcome::Disconnected);
            assert_eq!(transmitter.state(), ConnectionState::Disconnected);
        }
        assert_eq!(transport.binds(), 2);

        // the next tick goes through bind/accept again rather than writing
        assert_eq!(transmitter.step().await.unwrap(), StepOutcome::ConnectFailed);
        assert_eq!(transmitter.state(), ConnectionState::Disconnected);
        assert_eq!(transmitter.step().await.unwrap(), StepOutcome::ConnectFailed);
        assert_eq!(transport.binds(), 4);

        assert_eq!(transmitter.step().await.unwrap(), StepOutcome::Connected);
        assert_eq!(transmitter.state(), ConnectionState::Connected);
        assert_eq!(transmitter.step().await.unwrap(), StepOutcome::Sent { valid: true });

        let stats = transmitter.stats();
        assert_eq!(stats.connections, 3);
        assert_eq!(stats.disconnects, 2);
        assert_eq!(stats.lines_sent, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_accept_timeout_is_recoverable() {
        let transport = ScriptedTransport::new(vec![Script::AcceptHangs]);
        let (mut transmitter, _, _) = transmitter(transport);

        let start = tokio::time::Instant::now();
        assert_eq!(transmitter.step().await.unwrap(), StepOutcome::ConnectFailed);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(30) && waited < Duration::from_secs(31));
        assert_eq!(transmitter.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_address_failure_is_fatal() {
        let transport =
            ScriptedTransport::new(vec![Script::BindFails(io::ErrorKind::AddrNotAvailable)]);
        let (mut transmitter, _, _) = transmitter(transport);

        let err = transmitter.step().await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(transmitter.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_propagates_fatal_error() {
        let transport = ScriptedTransport::new(vec![
            Script::BindFails(io::ErrorKind::AddrInUse),
            Script::BindFails(io::ErrorKind::InvalidInput),
        ]);
        let (transmitter, _, _) = transmitter(transport.clone());

        let result = transmitter.run().await;
        assert!(matches!(result, Err(TransportError::Bind(_))));
        assert_eq!(transport.binds(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_pending_accept() {
        let transport = ScriptedTransport::new(vec![Script::AcceptHangs]);
        let store = FixStore::new();
        let shutdown = ShutdownSignal::new();
        let config = TransmitterConfig::default();
        let tick = config.tick_interval;
        let transmitter =
            PairedDeviceTransmitter::new(transport.clone(), store, shutdown.clone(), config);
        let mut state = transmitter.subscribe();

        let handle = tokio::spawn(transmitter.run());
        state.wait_for(|s| *s == ConnectionState::Connecting).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        shutdown.trigger();

        let stopped_at = tokio::time::Instant::now();
        let stats = tokio::time::timeout(tick, handle)
            .await
            .expect("accept was not abandoned on shutdown")
            .unwrap()
            .unwrap();
        assert!(stopped_at.elapsed() < tick);
        assert_eq!(stats.connect_attempts, 1);
        assert_eq!(stats.connections, 0);
        assert_eq!(transport.binds(), 1);
        assert_eq!(*state.borrow(), ConnectionState::Disconnected);
    }

    /// Writes the first line slowly so shutdown lands mid-write.
    struct SlowPeer {
        written: Arc<Mutex<Vec<u8>>>,
        delay: Option<std::pin::Pin<Box<tokio::time::Sleep>>>,
    }

    impl tokio::io::AsyncWrite for SlowPeer {
        fn poll_write(
            mut self: std::pin::Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
            buf: &[u8],
        ) -> std::task::Poll<io::Result<usize>> {
            let delay = self
                .delay
                .get_or_insert_with(|| Box::pin(tokio::time::sleep(Duration::from_millis(500))));
            std::task::ready!(std::future::Future::poll(delay.as_mut(), cx));
            self.written.lock().unwrap().extend_from_slice(buf);
            std::task::Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
    }

    struct SlowPeerTransport(Arc<Mutex<Vec<u8>>>);

    struct SlowPeerListener(Arc<Mutex<Vec<u8>>>);

    #[async_trait]
    impl PeerTransport for SlowPeerTransport {
        type Listener = SlowPeerListener;

        async fn bind(&self) -> Result<SlowPeerListener, TransportError> {
            Ok(SlowPeerListener(self.0.clone()))
        }
    }

    #[async_trait]
    impl PeerListener for SlowPeerListener {
        type Peer = SlowPeer;

        async fn accept(&mut self) -> Result<SlowPeer, TransportError> {
            Ok(SlowPeer {
                written: self.0.clone(),
                delay: None,
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_mid_write_finishes_the_line() {
        let written = Arc::new(Mutex::new(Vec::new()));
        let store = FixStore::new();
        let shutdown = ShutdownSignal::new();
        store.set(decode_fix(SCENARIO_A).unwrap()).await;
        let transmitter = PairedDeviceTransmitter::new(
            SlowPeerTransport(written.clone()),
            store,
            shutdown.clone(),
            TransmitterConfig::default(),
        );

        let handle = tokio::spawn(transmitter.run());
        // connected at 0s, write starts after one tick and takes 500ms
        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert!(written.lock().unwrap().is_empty());
        shutdown.trigger();

        let stats = handle.await.unwrap().unwrap();
        assert_eq!(stats.lines_sent, 1);
        assert_eq!(&written.lock().unwrap()[..], SCENARIO_A_LINE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_exits_within_one_tick_of_shutdown() {
        let peer = Builder::new()
            .write(b"No valid location\r\n")
            .write(b"No valid location\r\n")
            .build();
        let transport = ScriptedTransport::new(vec![Script::Peer(peer)]);
        let (transmitter, _, shutdown) = transmitter(transport);
        let mut state = transmitter.subscribe();

        let handle = tokio::spawn(transmitter.run());
        state.wait_for(|s| *s == ConnectionState::Connected).await.unwrap();

        // connect tick, then two writes one second apart
        tokio::time::sleep(Duration::from_millis(2500)).await;
        shutdown.trigger();

        let stats = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(stats.lines_sent, 2);
        assert_eq!(*state.borrow(), ConnectionState::Disconnected);
    }
}
