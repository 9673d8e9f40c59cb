//! Log setup: tracing with an env-filter. The configured level is the
//! baseline; RUST_LOG overrides it so individual targets can be turned
//! up without touching the config file.

use crate::error::TriDnsError;
use tracing_subscriber::EnvFilter;

pub fn init(log_level: &str, debug: bool) -> Result<(), TriDnsError> {
    let base = match debug {
        true => "debug",
        false => log_level,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|error| TriDnsError::Startup(format!("failed to set up logging: {error}")))
}
