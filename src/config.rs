use crate::error::TriDnsError;
use crate::{DNS_PORT, DNS_TLS_PORT};
use concread::cowcell::asynch::CowCell;
use config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Checked in order when no `--config` is given.
pub const CONFIG_LOCATIONS: [&str; 2] = ["~/.config/tridns.json", "./tridns.json"];

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
/// The main config blob, write this as a JSON file and load it and
/// it'll make things go. Every field has a default so a partial file
/// is fine.
pub struct ConfigFile {
    /// Listener address for every transport, default is 127.0.0.1
    pub address: String,
    /// Plain DNS over UDP, default 53
    pub udp_port: u16,
    /// DNS over TLS (TCP), default 853
    pub dot_port: u16,
    /// DNS over QUIC (UDP), default 853
    pub doq_port: u16,
    pub enable_udp: bool,
    /// DoT needs cert_file/key_file as well
    pub enable_dot: bool,
    /// DoQ needs cert_file/key_file as well
    pub enable_doq: bool,
    /// PEM certificate chain for DoT/DoQ
    pub cert_file: Option<PathBuf>,
    /// PEM private key for DoT/DoQ
    pub key_file: Option<PathBuf>,
    /// Ordered `host[:port]` failover targets
    pub upstream_servers: Vec<String>,
    /// Read /etc/resolv.conf when upstream_servers is empty
    pub use_system_resolvers: bool,
    pub cache_enabled: bool,
    /// Entry count that triggers eviction
    pub cache_max_entries: usize,
    /// How long an NXDOMAIN is remembered
    pub cache_negative_ttl_seconds: u64,
    /// Period of the background expired-entry sweep
    pub cache_sweep_seconds: u64,
    /// Per-upstream-server read timeout
    pub upstream_timeout_ms: u64,
    /// Default is "info"; RUST_LOG wins when set
    pub log_level: String,
}

impl Default for ConfigFile {
    fn default() -> Self {
        ConfigFile {
            address: "127.0.0.1".to_string(),
            udp_port: DNS_PORT,
            dot_port: DNS_TLS_PORT,
            doq_port: DNS_TLS_PORT,
            enable_udp: true,
            enable_dot: false,
            enable_doq: false,
            cert_file: None,
            key_file: None,
            upstream_servers: vec![],
            use_system_resolvers: true,
            cache_enabled: true,
            cache_max_entries: crate::cache::DEFAULT_MAX_ENTRIES,
            cache_negative_ttl_seconds: 300,
            cache_sweep_seconds: 60,
            upstream_timeout_ms: 5000,
            log_level: "info".to_string(),
        }
    }
}

impl ConfigFile {
    /// JSONify the configfile in a pretty way using serde
    pub fn as_json_pretty(&self) -> Result<String, TriDnsError> {
        serde_json::to_string_pretty(self)
            .map_err(|error| TriDnsError::Config(format!("failed to serialize config: {error}")))
    }

    fn listen_addr(&self, port: u16) -> Result<SocketAddr, TriDnsError> {
        format!("{}:{}", self.address, port)
            .parse()
            .map_err(|error| {
                TriDnsError::Config(format!(
                    "failed to parse listener address {}:{}: {error}",
                    self.address, port
                ))
            })
    }

    pub fn udp_listen_addr(&self) -> Result<SocketAddr, TriDnsError> {
        self.listen_addr(self.udp_port)
    }

    pub fn dot_listen_addr(&self) -> Result<SocketAddr, TriDnsError> {
        self.listen_addr(self.dot_port)
    }

    pub fn doq_listen_addr(&self) -> Result<SocketAddr, TriDnsError> {
        self.listen_addr(self.doq_port)
    }

    /// Cert and key paths with `~` expanded; an error when either is
    /// missing, since a TLS transport without material can't start.
    pub fn tls_material(&self) -> Result<(PathBuf, PathBuf), TriDnsError> {
        let cert_file = self
            .cert_file
            .as_ref()
            .ok_or_else(|| TriDnsError::Config("cert_file is not set".to_string()))?;
        let key_file = self
            .key_file
            .as_ref()
            .ok_or_else(|| TriDnsError::Config("key_file is not set".to_string()))?;
        Ok((tilde_expand(cert_file), tilde_expand(key_file)))
    }

    pub fn negative_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_negative_ttl_seconds)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    /// Uses [Self::try_from_file] and wraps it in a CowCell (moo)
    pub fn try_as_cowcell(
        config_path: Option<&String>,
    ) -> Result<CowCell<ConfigFile>, TriDnsError> {
        Ok(CowCell::new(ConfigFile::try_from_file(config_path)?))
    }

    /// Loads the configuration from a given file or from the default
    /// locations; defaults apply when nothing is found.
    pub fn try_from_file(config_path: Option<&String>) -> Result<ConfigFile, TriDnsError> {
        let file_locations = match config_path {
            Some(value) => vec![value.to_owned()],
            None => CONFIG_LOCATIONS.iter().map(|x| x.to_string()).collect(),
        };

        for location in &file_locations {
            let path = shellexpand::tilde(location).into_owned();
            if !std::path::Path::new(&path).exists() {
                continue;
            }
            let parsed = Config::builder()
                .add_source(File::new(&path, FileFormat::Json))
                .build()
                .map_err(|error| {
                    TriDnsError::Config(format!("failed to load {path}: {error}"))
                })?
                .try_deserialize()
                .map_err(|error| {
                    TriDnsError::Config(format!("failed to parse {path}: {error}"))
                })?;
            return Ok(parsed);
        }

        if config_path.is_some() {
            return Err(TriDnsError::Config(format!(
                "config file {} doesn't exist",
                file_locations.join(", ")
            )));
        }
        Ok(ConfigFile::default())
    }

    /// Everything `config-check` verifies before declaring a config
    /// usable.
    pub fn check(&self) -> Result<(), Vec<String>> {
        let mut errors: Vec<String> = Vec::new();

        if let Err(error) = self.udp_listen_addr() {
            errors.push(error.to_string());
        }
        for entry in &self.upstream_servers {
            if crate::upstream::parse_upstream(entry).is_none() {
                errors.push(format!("upstream server {entry:?} doesn't parse"));
            }
        }
        if self.enable_dot || self.enable_doq {
            match self.tls_material() {
                Ok((cert_file, key_file)) => {
                    if !cert_file.exists() {
                        errors.push(format!("cert_file {cert_file:?} doesn't exist"));
                    }
                    if !key_file.exists() {
                        errors.push(format!("key_file {key_file:?} doesn't exist"));
                    }
                }
                Err(error) => errors.push(error.to_string()),
            }
        }

        match errors.is_empty() {
            true => Ok(()),
            false => Err(errors),
        }
    }
}

fn tilde_expand(path: &PathBuf) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy().into_owned()).into_owned())
}
