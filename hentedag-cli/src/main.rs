//! Command-line client for hentedag: discover providers, print calendars,
//! and mirror the hub device state to the console.
#![allow(
    clippy::print_stdout,
    clippy::print_stderr,
    reason = "console client output is the point of this binary"
)]

mod console;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use reqwest::Client;
use tracing_subscriber::EnvFilter;

use hentedag_core::dates::format_long;
use hentedag_core::discovery::DiscoveryOutcome;
use hentedag_core::model::AddressBinding;
use hentedag_core::plugin::ProviderRegistry;
use hentedag_core::service::CalendarService;
use hentedag_hub::device::{DeviceSettings, WasteDevice};
use hentedag_hub::platform::HubDevice;
use hentedag_provider_avfallskalender as avfallskalender;
use hentedag_provider_avfallsor as avfallsor;
use hentedag_provider_bir as bir;
use hentedag_provider_glor as glor;
use hentedag_provider_innherred as innherred;
use hentedag_provider_minrenovasjon as minrenovasjon;
use hentedag_provider_oslo as oslo;
use hentedag_provider_remidt as remidt;
use hentedag_provider_stavanger as stavanger;

use crate::console::{ConsoleHub, ConsoleProgress};

/// Environment override for the watch poll interval.
const POLL_INTERVAL_VAR: &str = "HENTEDAG_POLL_INTERVAL_SECS";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 3600;

#[derive(Parser)]
#[command(name = "hentedag", version, about = "Norwegian waste collection schedules")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the providers in discovery priority order.
    Providers,
    /// Find out which provider serves an address.
    Discover {
        /// Street address, e.g. "Bjørnavegen 72B".
        address: String,
    },
    /// Fetch and print the pickup calendar for an address.
    Calendar {
        /// Street address, e.g. "Bjørnavegen 72B".
        address: String,
    },
    /// Poll the calendar on an interval, mirroring device state to the console.
    Watch {
        /// Street address, e.g. "Bjørnavegen 72B".
        address: String,
        /// Seconds between polls; overrides HENTEDAG_POLL_INTERVAL_SECS.
        #[arg(long)]
        interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hentedag=info")),
        )
        .init();

    let cli = Cli::parse();

    let client = Client::builder()
        .user_agent(concat!("hentedag/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("HTTP client setup failed")?;
    let api_key = std::env::var(avfallskalender::API_KEY_VAR).ok();

    // Discovery priority order: direct integrations first, the commercial
    // aggregator as the last resort.
    let plugins = vec![
        minrenovasjon::plugin(client.clone()),
        remidt::plugin(client.clone()),
        glor::plugin(client.clone()),
        stavanger::plugin(client.clone()),
        bir::plugin(client.clone()),
        innherred::plugin(client.clone()),
        oslo::plugin(client.clone()),
        avfallsor::plugin(client.clone()),
        avfallskalender::plugin(client.clone(), api_key),
    ];
    let registry = Arc::new(ProviderRegistry::new(plugins));
    let service = Arc::new(CalendarService::new(registry, client));

    match cli.command {
        Command::Providers => {
            for meta in service.providers() {
                println!("{}", meta.name);
            }
        }
        Command::Discover { address } => {
            let binding = discover(&service, &address).await?;
            println!("{} → {} (id {})", binding.raw_address, binding.provider, binding.address_id);
        }
        Command::Calendar { address } => {
            let binding = discover(&service, &address).await?;
            print_calendar(&service, &binding).await?;
        }
        Command::Watch { address, interval } => {
            let binding = discover(&service, &address).await?;
            watch(service, binding, poll_interval(interval)).await?;
        }
    }
    Ok(())
}

async fn discover(service: &CalendarService, address: &str) -> Result<AddressBinding> {
    match service.discover(address, &ConsoleProgress).await {
        DiscoveryOutcome::Found(binding) => Ok(binding),
        DiscoveryOutcome::Exhausted { tried } => {
            bail!("no provider recognized \"{address}\" ({} probed)", tried.len())
        }
        DiscoveryOutcome::InvalidAddress => {
            bail!("\"{address}\" has no parsable house number")
        }
    }
}

async fn print_calendar(service: &CalendarService, binding: &AddressBinding) -> Result<()> {
    let snapshot = service
        .fetch_calendar(binding)
        .await
        .with_context(|| format!("calendar fetch from {} failed", binding.provider))?;

    if snapshot.pickups.is_empty() {
        println!("Ingen kommende hentinger.");
        return Ok(());
    }
    for pickup in &snapshot.pickups {
        println!("{:<12} {}", pickup.category.long_label(), format_long(pickup.date));
    }
    if let Some(summary) = snapshot.summary {
        let days = match summary.days_remaining {
            0 => "i dag".to_owned(),
            1 => "i morgen".to_owned(),
            days => format!("om {days} dager"),
        };
        println!("Neste henting: {} {days}", summary.display);
    }
    Ok(())
}

async fn watch(
    service: Arc<CalendarService>,
    binding: AddressBinding,
    interval: Duration,
) -> Result<()> {
    let hub = Arc::new(ConsoleHub::default());
    let device = Arc::new(WasteDevice::new(
        Arc::clone(&hub) as Arc<dyn HubDevice>,
        service,
        binding,
        DeviceSettings::default(),
    ));
    device.apply_settings(DeviceSettings::default()).await?;

    println!("Polling every {}s; Ctrl-C to stop.", interval.as_secs());
    let poller = device.spawn_poller(interval);
    tokio::signal::ctrl_c().await.context("signal handler failed")?;

    poller.stop();
    device.teardown().await;
    println!("Stopped.");
    Ok(())
}

fn poll_interval(flag: Option<u64>) -> Duration {
    let secs = flag
        .or_else(|| {
            std::env::var(POLL_INTERVAL_VAR)
                .ok()
                .and_then(|value| value.parse().ok())
        })
        .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
    Duration::from_secs(secs.max(1))
}
