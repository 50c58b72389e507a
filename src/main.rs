mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use mssql_legacy::util::sql_escape;
use mssql_legacy::{connection_string, plugin, ConnectionConfig};
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_str())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Url { source } => {
            let config = ConnectionConfig::validate(source.resolve()?)?;
            println!("{}", connection_string::build(&config));
        }

        Commands::Quote { value, charset } => {
            println!("{}", sql_escape::quote(&value, charset.as_deref()));
        }

        Commands::Ping { source } => {
            let plugin = plugin::assemble(source.resolve()?)?;

            println!("Connecting to: {}", plugin.connection_string());

            let started = Instant::now();
            let lease = plugin
                .connection_factory()
                .acquire()
                .await
                .context("Failed to borrow a connection")?;
            drop(lease);

            if let Some(stats) = plugin.connection_factory().stats() {
                println!(
                    "OK in {:?} ({} opened, {} idle)",
                    started.elapsed(),
                    stats.connections_created,
                    stats.idle
                );
            }
            plugin.close();
        }
    }

    Ok(())
}
