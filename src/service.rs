//! Top-level wiring: one [Service] owns the cache, the resolver and
//! the configuration, and starts a task per enabled transport. The
//! embedder's [Handler] comes in through the constructor; everything
//! else is built from configuration.

use crate::cache::RecordCache;
use crate::config::ConfigFile;
use crate::enums::AgentState;
use crate::error::TriDnsError;
use crate::resolver::{Handler, Resolver};
use crate::servers::{
    cache_sweeper, DoqTransport, DotTransport, Servers, Transport, UdpTransport,
};
use crate::upstream::{upstream_servers, FailoverClient};
use concread::cowcell::asynch::CowCell;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

pub const RESOLV_CONF: &str = "/etc/resolv.conf";

pub struct Service {
    config: CowCell<ConfigFile>,
    cache: Arc<RecordCache>,
    resolver: Arc<Resolver>,
}

impl Service {
    /// Builds the resolution pipeline from configuration. Pass
    /// [crate::resolver::NoopHandler] when there is no embedder logic.
    pub async fn build(
        config: CowCell<ConfigFile>,
        handler: Box<dyn Handler>,
    ) -> Result<Service, TriDnsError> {
        let cfg = config.read().await;
        let cache = Arc::new(RecordCache::new(cfg.cache_max_entries, cfg.negative_ttl()));
        let servers = upstream_servers(
            &cfg.upstream_servers,
            cfg.use_system_resolvers,
            Path::new(RESOLV_CONF),
        );
        info!("Upstream servers: {servers:?}");
        let upstream = FailoverClient::new(servers, cfg.upstream_timeout());
        let resolver = Arc::new(Resolver::new(
            cache.clone(),
            cfg.cache_enabled,
            handler,
            Box::new(upstream),
        ));
        drop(cfg);
        Ok(Service {
            config,
            cache,
            resolver,
        })
    }

    /// Spawns the enabled listeners plus the cache sweeper and hands
    /// back their join handles.
    pub async fn start(&self) -> Result<Servers, TriDnsError> {
        let (agent_tx, _) = broadcast::channel::<AgentState>(32);
        let mut servers = Servers::build(agent_tx.clone());
        let cfg = self.config.read().await;

        let mut transports: Vec<Box<dyn Transport>> = Vec::new();
        if cfg.enable_udp {
            transports.push(Box::new(UdpTransport));
        }
        if cfg.enable_dot {
            transports.push(Box::new(DotTransport));
        }
        if cfg.enable_doq {
            transports.push(Box::new(DoqTransport));
        }
        for transport in transports {
            let agent = transport.agent();
            let handle = tokio::spawn(transport.serve(
                self.config.read().await,
                self.resolver.clone(),
                agent_tx.clone(),
            ));
            servers = servers.with_listener(agent, handle);
        }
        if cfg.cache_enabled {
            servers = servers.with_sweeper(tokio::spawn(cache_sweeper(
                self.config.read().await,
                self.cache.clone(),
                agent_tx.clone(),
            )));
        }
        Ok(servers)
    }

    /// Stops the listeners and drops whatever the cache held.
    pub fn shutdown(&self, servers: &Servers) {
        servers.shutdown();
        self.cache.clear();
    }

    pub fn cache(&self) -> Arc<RecordCache> {
        self.cache.clone()
    }

    pub fn resolver(&self) -> Arc<Resolver> {
        self.resolver.clone()
    }
}
