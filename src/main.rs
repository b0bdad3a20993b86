//! icinga2rt - Icinga2 to Request Tracker ticket synchronization
//!
//! Main entry point for the icinga2rt CLI.

use clap::Parser;
use icinga2rt::cache::EventCache;
use icinga2rt::commands::{Cli, Commands};
use icinga2rt::config::{validate_config_result, Icinga2RtConfig};
use icinga2rt::integrations::{IcingaClient, InMemoryTicketSystem, RequestTracker, TicketSystem};
use icinga2rt::permit::PermitFilter;
use icinga2rt::stream::{BackoffConfig, StreamConsumer, Subscription};
use icinga2rt::sync::{Daemon, TicketSettings, TicketSynchronizer, TracingObserver};
use std::path::Path;
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> icinga2rt::Result<()> {
    if let Commands::ExampleConfig { ref path } = cli.command {
        init_logging(cli.verbose, "info");
        return write_example_config(path);
    }

    let config = Icinga2RtConfig::load(cli.config_path())?;
    validate_config_result(&config)?;
    init_logging(cli.verbose, &config.logging.level);

    match cli.command {
        Commands::Run => {
            let debug_events = cli.debug_events || config.logging.debug_events;
            run_daemon(&config, debug_events).await
        }
        Commands::DumpCache => {
            let cache = EventCache::open(&config.cache)?;
            println!("{}", cache.dump()?);
            Ok(())
        }
        Commands::StaleCache => {
            let cache = EventCache::open(&config.cache)?;
            let tickets = ticket_system(&config)?;
            for key in cache.find_stale(&tickets).await? {
                println!("{}", key);
            }
            Ok(())
        }
        Commands::CleanCache => {
            let cache = EventCache::open(&config.cache)?;
            let tickets = ticket_system(&config)?;
            let stale = cache.find_stale(&tickets).await?;
            let removed = cache.clean(&stale)?;
            println!("Removed {} stale cache entries", removed);
            Ok(())
        }
        Commands::ExampleConfig { .. } => Ok(()),
    }
}

fn init_logging(verbosity: u8, configured: &str) {
    let level = icinga2rt::logging::level_for_verbosity(verbosity, configured);
    if let Err(e) = icinga2rt::logging::init(&level) {
        eprintln!("Failed to initialize logging: {}", e);
    }
}

fn write_example_config(path: &Path) -> icinga2rt::Result<()> {
    Icinga2RtConfig::example().save(path)?;
    println!("Example configuration written to {}", path.display());
    Ok(())
}

/// RT when configured, otherwise the in-memory ticket system
fn ticket_system(config: &Icinga2RtConfig) -> icinga2rt::Result<Box<dyn TicketSystem>> {
    match config.rt {
        Some(ref rt) => {
            tracing::info!(url = %rt.url, "Using Request Tracker");
            Ok(Box::new(RequestTracker::new(rt)?))
        }
        None => {
            tracing::warn!("No rt section configured, tickets are kept in memory only");
            Ok(Box::new(InMemoryTicketSystem::new(
                config.ticket.nobody.clone(),
            )))
        }
    }
}

async fn run_daemon(config: &Icinga2RtConfig, debug_events: bool) -> icinga2rt::Result<()> {
    let cache = EventCache::open(&config.cache)?;
    let tickets = ticket_system(config)?;

    let synchronizer = TicketSynchronizer::new(
        cache,
        tickets,
        PermitFilter::new(config.ticket.permit.iter().copied()),
        TicketSettings::from(&config.ticket),
    )
    .with_observer(Arc::new(TracingObserver::new(debug_events)));

    let subscription =
        Subscription::notifications(&config.icinga.queue).with_filter(&config.icinga.filter);
    let consumer = StreamConsumer::new(
        IcingaClient::new(&config.icinga)?,
        subscription,
        BackoffConfig::with_max_attempts(config.icinga.retries),
    );

    tracing::info!(url = %config.icinga.url, queue = %config.icinga.queue, "Starting icinga2rt");

    Daemon::new(consumer, synchronizer).run().await
}
