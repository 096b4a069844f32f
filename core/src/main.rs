use clap::Parser;
use sspq::{BrokerConfig, BrokerServer, LogLevel, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "sspq-server")]
#[command(version)]
#[command(about = "SSPQ Server - Super Simple Queue Server")]
struct Args {
    /// Host address to bind. Use 0.0.0.0 to make the server public
    #[arg(long, value_name = "host")]
    host: Option<String>,

    /// Port the server listens on
    #[arg(short, long, value_name = "port")]
    port: Option<u16>,

    /// Output verbosity: fail | warn | info | dbug
    #[arg(short, long, alias = "loglevel", value_name = "log-level")]
    log_level: Option<LogLevel>,

    /// Drop messages whose retries run out instead of dead-lettering them
    #[arg(short = 'n', long, alias = "ndlq")]
    no_dead_letter_queue: bool,
}

impl Args {
    /// Command-line flags win over `SSPQ_*` environment settings.
    fn apply(self, mut config: BrokerConfig) -> BrokerConfig {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(log_level) = self.log_level {
            config.log_level = log_level;
        }
        if self.no_dead_letter_queue {
            config.dead_letter_queue = false;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.apply(BrokerConfig::from_env()?);

    tracing_subscriber::fmt()
        .with_max_level(config.log_level.to_tracing_level())
        .init();

    info!("Starting SSPQ broker on {}", config.bind_address());
    info!("Log level: {}", config.log_level);
    info!("Dead-letter queue enabled: {}", config.dead_letter_queue);

    let server = Arc::new(BrokerServer::new(config)?);

    let mut server_handle = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.run().await })
    };

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
            server.shutdown();
            match (&mut server_handle).await {
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task failed: {}", e),
                Ok(Ok(())) => {}
            }
        }
        result = &mut server_handle => {
            match result {
                Ok(Ok(())) => info!("Server task completed"),
                Ok(Err(e)) => {
                    error!("Server error: {}", e);
                    return Err(e);
                }
                Err(e) => error!("Server task failed: {}", e),
            }
        }
    }

    let metrics = server.metrics().snapshot();
    info!(
        "Delivered {} / retried {} / dead-lettered {} / dropped {}; {} left in dead-letter queue",
        metrics.confirmed,
        metrics.retried,
        metrics.dead_lettered,
        metrics.dropped,
        server.dead_letters().len()
    );
    info!("SSPQ shut down successfully");
    Ok(())
}
