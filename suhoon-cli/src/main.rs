use std::{path::PathBuf, sync::Arc};

use anyhow::bail;
use clap::{Parser, Subcommand};
use log::debug;
use suhoon_gemini::{DEFAULT_MODEL, GeminiClient, api_key_from_env};
use suhoon_logic::{
    Diagnosis, DiagnosisState, GeoCoordinate, HeadlessMap, ImageUpload, PhoneSuffix,
    ReportedLocation, SiteProfile, StateUpdateSender, TileSource, TrackerSettings, TrackingSession,
    TrackingSnapshot, TrackingStatus, prelude::*,
};
use tokio::sync::mpsc;

#[derive(Parser)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the business profile shown on the landing page
    Site,
    /// Simulate a technician driving to the given position
    Track {
        /// Last four digits of the phone number the visit was booked with
        #[arg(long)]
        phone_suffix: PhoneSuffix,
        /// Latitude of the customer
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        /// Longitude of the customer
        #[arg(long, allow_hyphen_values = true)]
        long: f64,
        /// Stop after this many movement ticks
        #[arg(long, default_value_t = 60)]
        ticks: u32,
        /// JSON file with tracker settings
        #[arg(long)]
        settings: Option<PathBuf>,
        /// Fixed seed for the technician's starting point
        #[arg(long)]
        seed: Option<u64>,
        /// Milliseconds between ticks
        #[arg(long)]
        tick_millis: Option<u64>,
    },
    /// Ask the AI for a diagnosis of a problem
    Diagnose {
        /// Description of the symptoms
        #[arg(long, default_value = "")]
        text: String,
        /// Photo of the problem
        #[arg(long)]
        image: Option<PathBuf>,
        /// Model to use
        #[arg(long, default_value = DEFAULT_MODEL)]
        model: String,
        /// API key, read from the environment if not given
        #[arg(long)]
        api_key: Option<String>,
    },
}

struct UpdateSender(mpsc::Sender<()>);

impl StateUpdateSender for UpdateSender {
    fn send_update(&self) {
        if self.0.try_send(()).is_err() {
            debug!("Update dropped, output is behind");
        }
    }
}

fn load_settings(path: Option<PathBuf>) -> Result<TrackerSettings> {
    let Some(path) = path else {
        return Ok(TrackerSettings::default());
    };
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read settings from {path:?}"))?;
    serde_json::from_str(&raw).context("Invalid settings file")
}

fn print_progress(snapshot: &TrackingSnapshot) {
    if let (Some(distance), Some(eta)) = (snapshot.distance_meters, snapshot.eta_minutes) {
        println!("[{:>3}] {distance:>6.0}m away, ~{eta} min", snapshot.ticks);
    }
}

async fn track(
    phone_suffix: PhoneSuffix,
    user: GeoCoordinate,
    ticks: u32,
    settings: TrackerSettings,
) -> Result {
    let (tx, mut rx) = mpsc::channel(8);
    let session = Arc::new(TrackingSession::new(
        settings,
        ReportedLocation(Some(user)),
        HeadlessMap,
        TileSource::default(),
        UpdateSender(tx),
    )?);

    let status = session.locate().await;
    if status != TrackingStatus::Active {
        bail!("Could not start tracking, session is {status:?}");
    }

    let engineer = SiteProfile::default().engineer;
    println!(
        "Visit for {phone_suffix}: {} {} ({})",
        engineer.name, engineer.title, engineer.call_uri
    );

    let snapshot = session.snapshot().await;
    if let Some(tech) = snapshot.technician {
        println!("Technician dispatched from {:.5}, {:.5}", tech.lat, tech.long);
    }
    print_progress(&snapshot);

    // Skip the updates from locating
    while rx.try_recv().is_ok() {}

    // Updates can be dropped when output falls behind, the session counts the ticks
    let mut printed = snapshot.ticks;
    while printed < ticks {
        if rx.recv().await.is_none() {
            break;
        }
        let snapshot = session.snapshot().await;
        if snapshot.ticks != printed {
            printed = snapshot.ticks;
            print_progress(&snapshot);
        }
        if snapshot.arrived {
            println!("Technician arrived");
            break;
        }
    }

    session.reset().await;
    Ok(())
}

async fn diagnose(
    text: String,
    image: Option<PathBuf>,
    model: String,
    api_key: Option<String>,
) -> Result {
    let api_key = match api_key {
        Some(key) => key,
        None => api_key_from_env()?,
    };
    let desk = Diagnosis::new(GeminiClient::new(api_key)?.with_model(model));

    desk.set_text(text).await;
    if let Some(path) = image {
        desk.attach(ImageUpload::from_path(&path)?).await;
    }

    match desk.submit().await? {
        DiagnosisState::Done(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        DiagnosisState::Failed(msg) => bail!(msg),
        state => bail!("Diagnosis ended in unexpected state {state:?}"),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result {
    colog::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Site => {
            println!("{}", serde_json::to_string_pretty(&SiteProfile::default())?);
            Ok(())
        }
        Commands::Track {
            phone_suffix,
            lat,
            long,
            ticks,
            settings,
            seed,
            tick_millis,
        } => {
            let user = GeoCoordinate::new(lat, long);
            if !user.is_valid() {
                bail!("{lat}, {long} is not a valid position");
            }
            let mut settings = load_settings(settings)?;
            if let Some(seed) = seed {
                settings = settings.with_seed(seed);
            }
            if let Some(millis) = tick_millis {
                settings.tick_millis = millis;
            }
            settings.validate()?;
            track(phone_suffix, user, ticks, settings).await
        }
        Commands::Diagnose {
            text,
            image,
            model,
            api_key,
        } => diagnose(text, image, model, api_key).await,
    }
}
