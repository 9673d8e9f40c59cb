use crate::error::TriDnsError;
use crate::message::Message;
use crate::{DNS_PORT, MAX_UDP_PAYLOAD};
use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::Path;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Where queries go when the cache and the handler both pass.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// The reply from the first upstream that produced one, already
    /// carrying the original query's id. `None` when every server
    /// failed.
    async fn proxy(&self, query: &Message) -> Option<Message>;
}

/// Query ids for outbound upstream traffic: a wrapping counter with a
/// random start, owned by whoever constructs the client, so tests
/// never share one.
pub struct IdGenerator {
    next: AtomicU16,
}

impl Default for IdGenerator {
    fn default() -> Self {
        IdGenerator {
            next: AtomicU16::new(rand::random()),
        }
    }
}

impl IdGenerator {
    pub fn next_id(&self) -> u16 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// Walks the configured servers in order and hands back the first
/// reply. One ephemeral socket per attempt, one fresh id per attempt,
/// one timeout per server.
pub struct FailoverClient {
    servers: Vec<SocketAddr>,
    timeout: Duration,
    ids: IdGenerator,
}

impl FailoverClient {
    pub fn new(servers: Vec<SocketAddr>, timeout: Duration) -> Self {
        FailoverClient {
            servers,
            timeout,
            ids: IdGenerator::default(),
        }
    }

    async fn query_one(
        &self,
        server: SocketAddr,
        query: &Message,
    ) -> Result<Message, TriDnsError> {
        let bind_addr = match server {
            SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
        };
        let sock = UdpSocket::bind(bind_addr).await?;
        sock.connect(server).await?;

        let outbound = query.with_id(self.ids.next_id());
        sock.send(&outbound.as_bytes()?).await?;

        let mut buf = [0u8; MAX_UDP_PAYLOAD];
        let len = timeout(self.timeout, sock.recv(&mut buf))
            .await
            .map_err(|_| TriDnsError::UpstreamTimeout)??;

        let reply = Message::from_bytes(&buf[..len])?;
        // the caller matches replies by the id it sent, not the one we
        // invented for the upstream leg
        Ok(reply.with_id(query.id()))
    }
}

#[async_trait]
impl Upstream for FailoverClient {
    async fn proxy(&self, query: &Message) -> Option<Message> {
        for server in &self.servers {
            match self.query_one(*server, query).await {
                Ok(reply) => return Some(reply),
                Err(error) => {
                    debug!("upstream {server} failed: {error}");
                }
            }
        }
        None
    }
}

/// Parses one `host[:port]` upstream entry. Bare addresses (including
/// bare IPv6 like `::1`) get port 53; an explicit port uses the
/// `host:port` / `[v6]:port` forms.
pub fn parse_upstream(entry: &str) -> Option<SocketAddr> {
    let entry = entry.trim();
    if let Ok(ip) = entry.parse::<IpAddr>() {
        return Some(SocketAddr::new(ip, DNS_PORT));
    }
    entry.parse::<SocketAddr>().ok()
}

/// Reads `nameserver` lines out of a resolv.conf-shaped file.
pub fn system_resolvers(path: &Path) -> Result<Vec<SocketAddr>, TriDnsError> {
    let contents = std::fs::read_to_string(path)?;
    let mut servers = Vec::new();
    for line in contents.lines() {
        if let Some(rest) = line.strip_prefix("nameserver ") {
            match rest.trim().parse::<IpAddr>() {
                Ok(ip) => servers.push(SocketAddr::new(ip, DNS_PORT)),
                Err(error) => warn!("skipping resolv.conf nameserver {rest:?}: {error}"),
            }
        }
    }
    Ok(servers)
}

/// Resolves the configured upstream list: explicit entries first, the
/// system resolvers when asked and nothing is configured, and the
/// public fallbacks when all else is empty.
pub fn upstream_servers(
    configured: &[String],
    use_system_resolvers: bool,
    resolv_conf: &Path,
) -> Vec<SocketAddr> {
    let mut servers: Vec<SocketAddr> = Vec::new();
    for entry in configured {
        match parse_upstream(entry) {
            Some(addr) => servers.push(addr),
            None => warn!("skipping unparseable upstream server {entry:?}"),
        }
    }
    if servers.is_empty() && use_system_resolvers {
        match system_resolvers(resolv_conf) {
            Ok(found) => servers = found,
            Err(error) => warn!("failed to read {resolv_conf:?}: {error}"),
        }
    }
    if servers.is_empty() {
        servers = vec![
            SocketAddr::new(IpAddr::from([8, 8, 8, 8]), DNS_PORT),
            SocketAddr::new(IpAddr::from([1, 1, 1, 1]), DNS_PORT),
        ];
    }
    servers
}
