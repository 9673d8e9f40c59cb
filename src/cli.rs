//! Code related to CLI things

use clap::{Parser, Subcommand};

#[derive(Parser, Clone)]
pub struct SharedOpts {
    #[clap(short, long, help = "Configuration file")]
    pub config: Option<String>,
    #[clap(short, long)]
    pub debug: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the DNS service
    Server {
        #[clap(flatten)]
        sopt: SharedOpts,
    },
    /// Validate the configuration (listener addresses, upstreams, TLS
    /// material) and exit
    ConfigCheck {
        #[clap(flatten)]
        sopt: SharedOpts,
    },
    /// Print the effective configuration as JSON
    ExportConfig {
        #[clap(flatten)]
        sopt: SharedOpts,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Server {
            sopt: SharedOpts {
                config: None,
                debug: false,
            },
        }
    }
}

#[derive(Parser)]
#[command(arg_required_else_help(false))]
/// A caching DNS forwarder serving plain UDP, DNS-over-TLS and
/// DNS-over-QUIC.
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    pub fn sopt(command: &Commands) -> &SharedOpts {
        match command {
            Commands::Server { sopt } => sopt,
            Commands::ConfigCheck { sopt } => sopt,
            Commands::ExportConfig { sopt } => sopt,
        }
    }
}
