use bytes::{Buf, BytesMut};
use concread::cowcell::asynch::CowCellReadTxn;
use std::io::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{self, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, trace, warn};

use crate::cache::RecordCache;
use crate::config::ConfigFile;
use crate::enums::{Agent, AgentState};
use crate::error::TriDnsError;
use crate::message::Message;
use crate::resolver::Resolver;
use crate::{MAX_STREAM_MESSAGE_BYTES, MAX_UDP_PAYLOAD, UDP_BUFFER_SIZE};

/// One datagram in, at most one out. Malformed input is dropped
/// without a response; oversized responses go back truncated.
pub(crate) async fn handle_datagram(resolver: &Resolver, buf: &[u8]) -> Option<Vec<u8>> {
    let query = match Message::from_bytes(buf) {
        Ok(value) => value,
        Err(error) => {
            debug!(
                "Dropping malformed datagram ({error}): {}",
                crate::utils::hex_preview(buf, 32)
            );
            return None;
        }
    };
    let response = resolver.process(&query).await;
    trace!("{}", response.summary());
    let reply_bytes = match response.as_bytes() {
        Ok(value) => value,
        Err(error) => {
            error!("Failed to serialize response: {error}");
            return None;
        }
    };
    if reply_bytes.len() <= MAX_UDP_PAYLOAD {
        return Some(reply_bytes);
    }
    match response.set_truncated().as_bytes() {
        Ok(value) => Some(value),
        Err(error) => {
            error!("Failed to serialize truncated response: {error}");
            None
        }
    }
}

pub async fn udp_server(
    config: CowCellReadTxn<ConfigFile>,
    resolver: Arc<Resolver>,
    agent_tx: broadcast::Sender<AgentState>,
) -> io::Result<()> {
    let listen_addr = config.udp_listen_addr().map_err(Error::from)?;
    let udp_sock = match UdpSocket::bind(listen_addr).await {
        Ok(value) => {
            info!("Started UDP listener on {listen_addr}");
            value
        }
        Err(error) => {
            error!("Failed to start UDP listener on {listen_addr}: {error:?}");
            return Ok(());
        }
    };
    let _ = agent_tx.send(AgentState::Started {
        agent: Agent::UdpServer,
    });

    let udp_sock = Arc::new(udp_sock);
    let mut udp_buffer = [0; UDP_BUFFER_SIZE];
    loop {
        let (len, addr) = match udp_sock.recv_from(&mut udp_buffer).await {
            Ok(value) => value,
            Err(error) => {
                error!("Error receiving UDP datagram: {error:?}");
                continue;
            }
        };
        trace!("{len} bytes received from {addr:?}");

        // resolution can sit on an upstream timeout for seconds; the
        // receive loop stays hot while each datagram resolves on its
        // own task
        let query_bytes = udp_buffer[..len].to_vec();
        let task_resolver = resolver.clone();
        let task_sock = udp_sock.clone();
        tokio::spawn(async move {
            if let Some(reply_bytes) = handle_datagram(&task_resolver, &query_bytes).await {
                match task_sock.send_to(&reply_bytes, addr).await {
                    Ok(sent) => trace!("{sent} bytes sent to {addr:?}"),
                    Err(error) => error!("Failed to send response to {addr:?}: {error:?}"),
                }
            }
        });
    }
}

/// Pops one length-prefixed message off the front of the accumulator.
/// `Ok(None)` means an incomplete frame: leave the bytes alone and read
/// more. A zero length prefix is a protocol violation and kills the
/// connection.
pub(crate) fn next_frame(accumulator: &mut BytesMut) -> Result<Option<Vec<u8>>, TriDnsError> {
    if accumulator.len() < 2 {
        return Ok(None);
    }
    let frame_len = u16::from_be_bytes([accumulator[0], accumulator[1]]) as usize;
    if frame_len == 0 {
        return Err(TriDnsError::format("zero-length DoT frame"));
    }
    if accumulator.len() < 2 + frame_len {
        return Ok(None);
    }
    accumulator.advance(2);
    let frame = accumulator.split_to(frame_len);
    Ok(Some(frame.to_vec()))
}

/// Drives one DoT connection: accumulate, deframe, resolve, respond,
/// in arrival order. Any framing or format problem closes the
/// connection; that is the whole error recovery story.
pub(crate) async fn dot_conn_handler<S>(
    mut stream: S,
    addr: SocketAddr,
    resolver: Arc<Resolver>,
) -> Result<(), TriDnsError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut accumulator = BytesMut::with_capacity(4096);
    let mut chunk = [0u8; 4096];
    loop {
        let len = stream.read(&mut chunk).await?;
        if len == 0 {
            trace!("DoT peer {addr:?} closed the connection");
            return Ok(());
        }
        accumulator.extend_from_slice(&chunk[..len]);

        while let Some(frame) = next_frame(&mut accumulator)? {
            let query = match Message::from_bytes(&frame) {
                Ok(value) => value,
                Err(error) => {
                    debug!("Closing DoT connection from {addr:?}: {error}");
                    return Err(error);
                }
            };
            let response = resolver.process(&query).await;
            trace!("{}", response.summary());
            let payload = response.as_bytes()?;
            if payload.len() > MAX_STREAM_MESSAGE_BYTES {
                return Err(TriDnsError::format("response too large for a DoT frame"));
            }
            let mut framed = Vec::with_capacity(payload.len() + 2);
            framed.extend((payload.len() as u16).to_be_bytes());
            framed.extend(payload);
            stream.write_all(&framed).await?;
        }
    }
}

/// DNS over TLS. Ref <https://www.rfc-editor.org/rfc/rfc7858>: each
/// connection carries a stream of 2-byte length-prefixed messages.
pub async fn dot_server(
    config: CowCellReadTxn<ConfigFile>,
    resolver: Arc<Resolver>,
    agent_tx: broadcast::Sender<AgentState>,
) -> io::Result<()> {
    let listen_addr = config.dot_listen_addr().map_err(Error::from)?;
    let tls_config = match crate::tls::dot_server_config(&config) {
        Ok(value) => value,
        Err(error) => {
            error!("Failed to load TLS material for DoT: {error}");
            return Ok(());
        }
    };
    let acceptor = TlsAcceptor::from(tls_config);

    let listener = match TcpListener::bind(listen_addr).await {
        Ok(value) => {
            info!("Started DoT listener on {listen_addr}");
            value
        }
        Err(error) => {
            error!("Failed to start DoT listener on {listen_addr}: {error:?}");
            return Ok(());
        }
    };
    let _ = agent_tx.send(AgentState::Started {
        agent: Agent::DotServer,
    });

    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(value) => value,
            Err(error) => {
                error!("Couldn't accept DoT connection: {error:?}");
                continue;
            }
        };
        debug!("DoT connection from {addr:?}");

        let conn_acceptor = acceptor.clone();
        let conn_resolver = resolver.clone();
        tokio::spawn(async move {
            let tls_stream = match conn_acceptor.accept(stream).await {
                Ok(value) => value,
                Err(error) => {
                    debug!("TLS handshake with {addr:?} failed: {error:?}");
                    return;
                }
            };
            if let Err(error) = dot_conn_handler(tls_stream, addr, conn_resolver).await {
                debug!("DoT connection from {addr:?} ended: {error}");
            }
        });
    }
}

/// One DoQ stream, one message: everything up to the peer's FIN is the
/// query, the response goes back without a length prefix and the
/// stream finishes. An empty stream closes silently.
async fn doq_stream_handler(
    mut send: quinn::SendStream,
    mut recv: quinn::RecvStream,
    resolver: Arc<Resolver>,
) -> Result<(), TriDnsError> {
    let buf = recv
        .read_to_end(MAX_STREAM_MESSAGE_BYTES)
        .await
        .map_err(|error| TriDnsError::Quic(error.to_string()))?;
    if buf.is_empty() {
        return Ok(());
    }
    let query = Message::from_bytes(&buf)?;
    let response = resolver.process(&query).await;
    send.write_all(&response.as_bytes()?)
        .await
        .map_err(|error| TriDnsError::Quic(error.to_string()))?;
    let _ = send.finish();
    Ok(())
}

/// DNS over QUIC. Ref <https://www.rfc-editor.org/rfc/rfc9250>: one
/// message per bidirectional stream, delimited by FIN.
pub async fn doq_server(
    config: CowCellReadTxn<ConfigFile>,
    resolver: Arc<Resolver>,
    agent_tx: broadcast::Sender<AgentState>,
) -> io::Result<()> {
    let listen_addr = config.doq_listen_addr().map_err(Error::from)?;
    let server_config = match crate::tls::doq_server_config(&config) {
        Ok(value) => value,
        Err(error) => {
            error!("Failed to load TLS material for DoQ: {error}");
            return Ok(());
        }
    };
    let endpoint = match quinn::Endpoint::server(server_config, listen_addr) {
        Ok(value) => {
            info!("Started DoQ listener on {listen_addr}");
            value
        }
        Err(error) => {
            error!("Failed to start DoQ listener on {listen_addr}: {error:?}");
            return Ok(());
        }
    };
    let _ = agent_tx.send(AgentState::Started {
        agent: Agent::DoqServer,
    });

    while let Some(incoming) = endpoint.accept().await {
        let conn_resolver = resolver.clone();
        tokio::spawn(async move {
            let connection = match incoming.await {
                Ok(value) => value,
                Err(error) => {
                    debug!("QUIC handshake failed: {error:?}");
                    return;
                }
            };
            let addr = connection.remote_address();
            debug!("DoQ connection from {addr:?}");
            loop {
                let (send, recv) = match connection.accept_bi().await {
                    Ok(value) => value,
                    Err(quinn::ConnectionError::ApplicationClosed(_))
                    | Err(quinn::ConnectionError::TimedOut) => {
                        trace!("DoQ connection from {addr:?} closed");
                        break;
                    }
                    Err(error) => {
                        debug!("DoQ connection from {addr:?} ended: {error:?}");
                        break;
                    }
                };
                // streams are independent; a malformed one doesn't take
                // its siblings down
                let stream_resolver = conn_resolver.clone();
                tokio::spawn(async move {
                    if let Err(error) = doq_stream_handler(send, recv, stream_resolver).await {
                        debug!("DoQ stream from {addr:?} ended: {error}");
                    }
                });
            }
        });
    }
    Ok(())
}

/// Sweeps expired cache entries in the background so eviction pressure
/// doesn't build up between inserts.
pub async fn cache_sweeper(
    config: CowCellReadTxn<ConfigFile>,
    cache: Arc<RecordCache>,
    agent_tx: broadcast::Sender<AgentState>,
) {
    let _ = agent_tx.send(AgentState::Started {
        agent: Agent::CacheSweeper,
    });
    let mut interval =
        tokio::time::interval(Duration::from_secs(config.cache_sweep_seconds.max(1)));
    loop {
        interval.tick().await;
        let removed = cache.evict_expired();
        if removed > 0 {
            debug!("Cache sweep removed {removed} expired entries");
        }
    }
}

/// A pluggable listener. The service only knows this surface, so a
/// fourth transport is a new impl and one line of wiring, not a change
/// to the service itself.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    fn agent(&self) -> Agent;

    /// Bind and serve until the task is torn down. Startup failures
    /// are logged and swallowed so one broken listener doesn't poison
    /// the rest; the supervision loop notices the early exit.
    async fn serve(
        self: Box<Self>,
        config: CowCellReadTxn<ConfigFile>,
        resolver: Arc<Resolver>,
        agent_tx: broadcast::Sender<AgentState>,
    ) -> io::Result<()>;
}

pub struct UdpTransport;

#[async_trait::async_trait]
impl Transport for UdpTransport {
    fn agent(&self) -> Agent {
        Agent::UdpServer
    }

    async fn serve(
        self: Box<Self>,
        config: CowCellReadTxn<ConfigFile>,
        resolver: Arc<Resolver>,
        agent_tx: broadcast::Sender<AgentState>,
    ) -> io::Result<()> {
        udp_server(config, resolver, agent_tx).await
    }
}

pub struct DotTransport;

#[async_trait::async_trait]
impl Transport for DotTransport {
    fn agent(&self) -> Agent {
        Agent::DotServer
    }

    async fn serve(
        self: Box<Self>,
        config: CowCellReadTxn<ConfigFile>,
        resolver: Arc<Resolver>,
        agent_tx: broadcast::Sender<AgentState>,
    ) -> io::Result<()> {
        dot_server(config, resolver, agent_tx).await
    }
}

pub struct DoqTransport;

#[async_trait::async_trait]
impl Transport for DoqTransport {
    fn agent(&self) -> Agent {
        Agent::DoqServer
    }

    async fn serve(
        self: Box<Self>,
        config: CowCellReadTxn<ConfigFile>,
        resolver: Arc<Resolver>,
        agent_tx: broadcast::Sender<AgentState>,
    ) -> io::Result<()> {
        doq_server(config, resolver, agent_tx).await
    }
}

#[derive(Debug)]
pub struct Servers {
    pub listeners: Vec<(Agent, JoinHandle<Result<(), Error>>)>,
    pub sweeper: Option<JoinHandle<()>>,
    pub agent_tx: broadcast::Sender<AgentState>,
}

impl Default for Servers {
    fn default() -> Self {
        let (agent_tx, _) = broadcast::channel(32);
        Self {
            listeners: vec![],
            sweeper: None,
            agent_tx,
        }
    }
}

impl Servers {
    pub fn build(agent_tx: broadcast::Sender<AgentState>) -> Self {
        Self {
            agent_tx,
            ..Default::default()
        }
    }

    pub fn with_listener(mut self, agent: Agent, handle: JoinHandle<Result<(), Error>>) -> Self {
        self.listeners.push((agent, handle));
        self
    }

    pub fn with_sweeper(self, sweeper: JoinHandle<()>) -> Self {
        Self {
            sweeper: Some(sweeper),
            ..self
        }
    }

    fn send_stopped(&self, agent: Agent) {
        info!("{agent:?} shut down");
        if let Err(error) = self.agent_tx.send(AgentState::Stopped { agent }) {
            warn!("Failed to send agent shutdown message: {error:?}");
        };
    }

    /// True when any listener task has stopped; one transport dying is
    /// reason enough to shut the service down.
    pub fn any_finished(&self) -> bool {
        let mut finished = false;
        for (agent, handle) in &self.listeners {
            if handle.is_finished() {
                self.send_stopped(agent.clone());
                finished = true;
            }
        }
        finished
    }

    /// Tears the listener tasks down; their sockets close with them.
    pub fn shutdown(&self) {
        for (_, handle) in &self.listeners {
            handle.abort();
        }
        if let Some(sweeper) = &self.sweeper {
            sweeper.abort();
        }
    }
}
