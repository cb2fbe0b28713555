use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use propnet_geo::config::Config;
use propnet_geo::location::{format_coords, Coordinate, Resolution};
use propnet_geo::server::{self, AppState};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// PropNet Geo: turn whatever a dealer pasted into a map position.
///
/// Accepts raw coordinates, Google Maps links, maps.app.goo.gl short links
/// and place names. Results are JSON on stdout; banners go to stderr.
///
/// Examples:
///   propnet-geo resolve "29.3909, 76.9635"
///   propnet-geo resolve "https://maps.app.goo.gl/AbCdEf"
///   propnet-geo suggest "Model Town Panipat"
///   propnet-geo city Karnal
///   propnet-geo areas --city Panipat
///   propnet-geo serve --port 8080
#[derive(Parser)]
#[command(name = "propnet-geo", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve one input to a single coordinate.
    Resolve {
        /// Coordinates, map link, short link or place name.
        input: String,
    },
    /// List candidate places for a search query.
    Suggest { query: String },
    /// Locate a city centre, falling back to the configured default.
    City { name: String },
    /// List cities, or the areas of one city.
    Areas {
        #[arg(long)]
        city: Option<String>,
        /// Ignore the cached copy and fetch again.
        #[arg(long)]
        refresh: bool,
    },
    /// Run the JSON API.
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long, short = 'p')]
        port: Option<u16>,
    },
}

#[derive(Serialize)]
struct CityOutput {
    city: String,
    located: bool,
    coordinate: Coordinate,
    formatted_coords: String,
    maps_url: String,
}

fn init_tracing(format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Token cancelled on Ctrl-C, so an interrupted lookup stops its relays.
fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            child.cancel();
        }
    });
    token
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn banner(c: Coordinate) {
    eprintln!("  \u{1F4CD} {}", format_coords(c.lat(), c.lng()));
    eprintln!("     {}", c.maps_url());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let mut config = Config::from_env().context("invalid configuration")?;
    init_tracing(&config.log_format);

    match cli.command {
        Command::Resolve { input } => {
            let state = AppState::from_config(config);
            let resolution = state
                .resolver
                .resolve_input(&input, &interrupt_token())
                .await
                .context("interrupted")?;
            match &resolution {
                Resolution::Coordinate { coordinate } => banner(*coordinate),
                Resolution::NotFound => {
                    eprintln!("  Location not found: '{input}'. Try a different search term or paste coordinates directly.")
                }
                Resolution::Unavailable => {
                    eprintln!("  Location services are unreachable. Paste coordinates directly.")
                }
                Resolution::Candidates { .. } => {}
            }
            print_json(&resolution)?;
            if !resolution.is_found() {
                std::process::exit(1);
            }
        }

        Command::Suggest { query } => {
            let state = AppState::from_config(config);
            let resolution = state
                .resolver
                .suggest(&query, &interrupt_token())
                .await
                .context("interrupted")?;
            if let Resolution::Candidates { candidates } = &resolution {
                for (i, c) in candidates.iter().enumerate() {
                    eprintln!("  {}. {}", i + 1, c.display_name);
                }
            }
            print_json(&resolution)?;
        }

        Command::City { name } => {
            let name = name.trim().to_string();
            if name.is_empty() {
                bail!("city name is empty");
            }
            let state = AppState::from_config(config);
            let centre = state
                .cities
                .locate_or_default(&name, &interrupt_token())
                .await
                .context("interrupted")?;
            let coordinate = centre.coordinate;
            if !centre.located {
                eprintln!("  \u{26A0}\u{FE0F}  '{name}' not found, using the default centre");
            }
            banner(coordinate);
            print_json(&CityOutput {
                city: name,
                located: centre.located,
                coordinate,
                formatted_coords: format_coords(coordinate.lat(), coordinate.lng()),
                maps_url: coordinate.maps_url(),
            })?;
        }

        Command::Areas { city, refresh } => {
            let state = AppState::from_config(config);
            if refresh && state.areas.data(true).await.is_none() {
                eprintln!("  \u{26A0}\u{FE0F}  area directory unavailable");
            }
            let list = match city.as_deref().map(str::trim) {
                Some(city) if !city.is_empty() => state.areas.areas_for_city(city).await,
                _ => state.areas.cities().await,
            };
            print_json(&list)?;
        }

        Command::Serve { host, port } => {
            if host.is_some() || port.is_some() {
                let (default_host, default_port) = config
                    .listen_addr
                    .rsplit_once(':')
                    .unwrap_or(("127.0.0.1", "3000"));
                let host = host.unwrap_or_else(|| default_host.to_string());
                let port = port.map_or_else(|| default_port.to_string(), |p| p.to_string());
                config.listen_addr = format!("{host}:{port}");
            }
            eprintln!("  PropNet Geo API on http://{}", config.listen_addr);
            server::start(Arc::new(AppState::from_config(config)))
                .await
                .context("server failed")?;
        }
    }

    Ok(())
}
