use clap::Parser;
use std::time::Duration;
use tracing::{error, info};
use tridns::cli::{Cli, Commands};
use tridns::config::ConfigFile;
use tridns::error::TriDnsError;
use tridns::resolver::NoopHandler;
use tridns::service::Service;

async fn run_server(config: concread::cowcell::asynch::CowCell<ConfigFile>) -> Result<(), TriDnsError> {
    // rustls wants one process-wide crypto provider before any TLS
    // config is built; an Err here just means it's already installed
    let _ = rustls::crypto::ring::default_provider().install_default();

    let service = Service::build(config, Box::new(NoopHandler)).await?;
    let servers = service.start().await?;

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(error) = signal {
                    error!("Failed to listen for shutdown signal: {error:?}");
                }
                info!("Shutting down");
                service.shutdown(&servers);
                break;
            }
            _ = tokio::time::sleep(Duration::from_secs(1)) => {
                if servers.any_finished() {
                    error!("A listener stopped, shutting down");
                    service.shutdown(&servers);
                    break;
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), TriDnsError> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or_default();
    let sopt = Cli::sopt(&command).clone();

    match command {
        Commands::Server { .. } => {
            let config = ConfigFile::try_as_cowcell(sopt.config.as_ref())?;
            {
                let cfg = config.read().await;
                tridns::logging::init(&cfg.log_level, sopt.debug)?;
            }
            run_server(config).await
        }
        Commands::ConfigCheck { .. } => {
            let config = ConfigFile::try_from_file(sopt.config.as_ref())?;
            match config.check() {
                Ok(()) => {
                    println!("Config OK");
                    Ok(())
                }
                Err(errors) => {
                    for error in errors {
                        eprintln!("{error}");
                    }
                    std::process::exit(1);
                }
            }
        }
        Commands::ExportConfig { .. } => {
            let config = ConfigFile::try_from_file(sopt.config.as_ref())?;
            println!("{}", config.as_json_pretty()?);
            Ok(())
        }
    }
}
