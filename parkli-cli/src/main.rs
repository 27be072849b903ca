//! Command line front end that prints parking availability of Swiss cities as JSON.

mod cli;

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use parkli_core::{
    AdapterContext, CityId, FacilityId, LogFormat, ParkliService, Settings, SourceRegistry,
};
use parkli_provider_basel as basel;
use parkli_provider_bern as bern;
use parkli_provider_lucerne as lucerne;
use parkli_provider_zurich as zurich;

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref()).context("loading settings")?;
    init_tracing(&settings);
    debug!(?settings, "settings loaded");

    let context = AdapterContext::from_settings(&settings).context("building HTTP client")?;
    let registry = SourceRegistry::new(vec![
        zurich::plugin(&context),
        bern::plugin(&context),
        basel::plugin(&context),
        lucerne::plugin(&context),
    ]);
    let service = ParkliService::new(Arc::new(registry));

    match cli.command {
        Command::Cities => print_json(&service.cities(), cli.compact),
        Command::City { city } => {
            let city = service.city(&CityId(city)).await?;
            print_json(city.as_ref(), cli.compact)
        }
        Command::Facility { city, facility } => {
            let facility = service
                .facility(&CityId(city), &FacilityId(facility))
                .await?;
            print_json(&facility, cli.compact)
        }
    }
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    match settings.log_format {
        LogFormat::Pretty => builder.with_target(false).init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn print_json<T: Serialize>(value: &T, compact: bool) -> Result<()> {
    let mut stdout = io::stdout().lock();
    if compact {
        serde_json::to_writer(&mut stdout, value)?;
    } else {
        serde_json::to_writer_pretty(&mut stdout, value)?;
    }
    writeln!(stdout)?;
    Ok(())
}
