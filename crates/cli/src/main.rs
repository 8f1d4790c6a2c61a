use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use pinplace_agents::{build_http_client, MapAssistant};
use pinplace_core::export::{export_file_name, to_csv, to_kml};
use pinplace_core::spatial::{bounds, centroid, find_in_radius};
use pinplace_core::{AssistantContext, BotAction, MapContext, Pin, Point, Settings, SpatialQuery};
use pinplace_directions::{format_distance, format_duration, DirectionsResolver, RoutePlanner};
use pinplace_geocoding::{Geocoder, GeocodingResolver, DEFAULT_SEARCH_LIMIT};
use pinplace_observability::{init_tracing, AppMetrics};

const CLI_OWNER: &str = "cli-owner";
const CLI_VIEWER: &str = "cli-viewer";

#[derive(Debug, Parser)]
#[command(name = "pinplace")]
#[command(about = "PinPlace geocoding, routing and map assistant")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExportFormat {
    Csv,
    Kml,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve an address, city or venue through the full fallback chain.
    Geocode { query: String },
    Zip { zip: String },
    /// Place suggestions for an autocomplete box.
    Search {
        query: String,
        #[arg(long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,
    },
    Route {
        #[arg(long, value_parser = parse_point)]
        from: Point,
        #[arg(long, value_parser = parse_point)]
        to: Point,
    },
    Radius {
        #[arg(long)]
        pins: PathBuf,
        #[arg(long, value_parser = parse_point)]
        center: Point,
        #[arg(long)]
        miles: f64,
    },
    Summary {
        #[arg(long)]
        pins: PathBuf,
    },
    Export {
        #[arg(long)]
        pins: PathBuf,
        #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
        #[arg(long, default_value = "pinplace")]
        map_name: String,
        /// Defaults to a file name derived from the map name.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Interactive assistant over a local pin file.
    Chat {
        #[arg(long)]
        pins: Option<PathBuf>,
        #[arg(long, default_value = "My Map")]
        map_name: String,
        #[arg(long)]
        creator: bool,
        #[arg(long)]
        locked: bool,
        /// Write pin changes back to --pins on exit.
        #[arg(long)]
        save: bool,
    },
}

struct Services {
    settings: Settings,
    geocoder: Arc<GeocodingResolver>,
    planner: Arc<DirectionsResolver>,
    assistant: MapAssistant,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("pinplace_cli");
    let cli = Cli::parse();
    let services = build_services()?;

    match cli.command {
        Command::Geocode { query } => {
            let result = services.geocoder.resolve_address(&query).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Zip { zip } => {
            let result = services.geocoder.resolve_zip(&zip).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Search { query, limit } => {
            let places = services.geocoder.search_places(&query, limit).await?;
            println!("{}", serde_json::to_string_pretty(&places)?);
        }
        Command::Route { from, to } => {
            let directions = services.planner.route(from, to).await;
            println!(
                "{} / {} ({:?})",
                format_duration(directions.duration_min),
                format_distance(directions.distance_km),
                directions.source
            );
        }
        Command::Radius {
            pins,
            center,
            miles,
        } => {
            if !miles.is_finite() || miles <= 0.0 {
                bail!("--miles must be a positive number");
            }
            let pins = load_pins(&pins)?;
            let matches = find_in_radius(
                &pins,
                &SpatialQuery {
                    center,
                    radius_miles: miles,
                },
            );
            println!("{}", serde_json::to_string_pretty(&matches)?);
        }
        Command::Summary { pins } => {
            let pins = load_pins(&pins)?;
            let defaults = &services.settings.map_defaults;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "count": pins.len(),
                    "center": centroid(&pins, defaults),
                    "bounds": bounds(&pins, defaults),
                }))?
            );
        }
        Command::Export {
            pins,
            format,
            map_name,
            output,
        } => {
            let pins = load_pins(&pins)?;
            let (body, extension) = match format {
                ExportFormat::Csv => (to_csv(&pins), "csv"),
                ExportFormat::Kml => (to_kml(&map_name, &pins), "kml"),
            };
            let output =
                output.unwrap_or_else(|| PathBuf::from(export_file_name(&map_name, extension)));
            fs::write(&output, body)
                .with_context(|| format!("failed writing {}", output.display()))?;
            println!("wrote {} pins to {}", pins.len(), output.display());
        }
        Command::Chat {
            pins,
            map_name,
            creator,
            locked,
            save,
        } => {
            let loaded = match &pins {
                Some(path) if path.exists() => load_pins(path)?,
                _ => Vec::new(),
            };
            let context = AssistantContext {
                map: MapContext {
                    name: map_name,
                    owner_id: CLI_OWNER.to_string(),
                    is_locked: locked,
                    editable_until: None,
                },
                pins: loaded,
                caller_id: Some((if creator { CLI_OWNER } else { CLI_VIEWER }).to_string()),
            };

            let context = run_chat(&services.assistant, context).await?;
            if save {
                let Some(path) = pins else {
                    bail!("--save needs --pins");
                };
                save_pins(&path, &context.pins)?;
                println!("saved {} pins to {}", context.pins.len(), path.display());
            }
        }
    }

    Ok(())
}

async fn run_chat(assistant: &MapAssistant, mut context: AssistantContext) -> Result<AssistantContext> {
    println!(
        "PinPlace assistant for \"{}\" ({} pins). type 'exit' to quit.",
        context.map.name,
        context.pins.len()
    );

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }

        let message = line.trim();
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }
        if message.is_empty() {
            continue;
        }

        let response = assistant.handle_message(message, &context).await;
        println!("\n{}\n", response.message);

        if let Some(action) = response.action {
            apply_action(&mut context, action);
        }
    }

    Ok(context)
}

/// The router only proposes changes; the shell owns the pin list.
fn apply_action(context: &mut AssistantContext, action: BotAction) {
    match action {
        BotAction::AddPin { pin } => {
            context.pins.push(Pin {
                id: uuid::Uuid::new_v4().to_string(),
                lat: pin.lat,
                lng: pin.lng,
                name: pin.name,
                description: pin.description,
                created_at: Utc::now(),
            });
        }
        BotAction::DeleteAllPins { .. } => context.pins.clear(),
        BotAction::HighlightPins { pin_ids } => {
            for pin in context.pins.iter().filter(|pin| pin_ids.contains(&pin.id)) {
                println!("  * {} ({:.4}, {:.4})", pin.name, pin.lat, pin.lng);
            }
        }
    }
}

fn build_services() -> Result<Services> {
    let settings = Settings::from_env().context("invalid PINPLACE_* configuration")?;
    let metrics = AppMetrics::shared();
    let client = build_http_client(settings.http_timeout, &settings.geocoding.user_agent)?;

    let geocoder = Arc::new(GeocodingResolver::from_settings(
        &settings.geocoding,
        client.clone(),
    )?);
    let planner = Arc::new(DirectionsResolver::from_settings(
        &settings.directions,
        client.clone(),
    ));
    let classifier = pinplace_inference::from_settings(&settings.inference, client);
    let assistant = MapAssistant::new(geocoder.clone(), planner.clone(), classifier, metrics);

    Ok(Services {
        settings,
        geocoder,
        planner,
        assistant,
    })
}

fn parse_point(raw: &str) -> Result<Point, String> {
    let (lat, lng) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LNG, got {raw:?}"))?;
    let lat = lat
        .trim()
        .parse::<f64>()
        .map_err(|err| format!("bad latitude: {err}"))?;
    let lng = lng
        .trim()
        .parse::<f64>()
        .map_err(|err| format!("bad longitude: {err}"))?;
    Point::try_new(lat, lng).map_err(|err| err.to_string())
}

fn load_pins(path: &Path) -> Result<Vec<Pin>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading pins from {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid pin file {}", path.display()))
}

fn save_pins(path: &Path, pins: &[Pin]) -> Result<()> {
    let raw = serde_json::to_string_pretty(pins)?;
    fs::write(path, raw).with_context(|| format!("failed writing pins to {}", path.display()))
}
