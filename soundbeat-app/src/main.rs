//! Soundbeat command-line entry point.
//!
//! Meters a WAV file and writes one JSON line per block to stdout (or the
//! configured output file). Logs go to stderr so they never mix with data.

mod settings;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use soundbeat_core::{JsonLinesSink, MeterEngine, WavSource};
use tracing::{error, info, warn};

use settings::{default_settings_path, load_settings, save_settings, AppSettings};

#[derive(Debug, Parser)]
#[command(name = "soundbeat", version, about = "Per-block peak levels of an audio file as JSON lines")]
struct Cli {
    /// File to meter. Overrides `name` from the settings file.
    name: Option<String>,

    /// Settings file (defaults to $XDG_CONFIG_HOME/soundbeat/settings.json).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Block period, e.g. `10ms` or `0.25s`.
    #[arg(long)]
    period: Option<String>,

    /// Multiplier on the virtual time attributed to each block.
    #[arg(long)]
    zoom: Option<f64>,

    /// Backdate timestamps so the last block lands at the current time.
    #[arg(long)]
    backdate: bool,

    /// Do not backdate, even if the settings file asks for it.
    #[arg(long, conflicts_with = "backdate")]
    no_backdate: bool,

    /// Write JSON lines to this file instead of stdout.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Persist the merged settings back to the settings file.
    #[arg(long)]
    save: bool,
}

impl Cli {
    fn apply(&self, settings: &mut AppSettings) {
        if let Some(name) = &self.name {
            settings.name = name.clone();
        }
        if let Some(period) = &self.period {
            settings.period = period.clone();
        }
        if let Some(zoom) = self.zoom {
            settings.zoom = zoom;
        }
        if self.backdate {
            settings.backdate = true;
        } else if self.no_backdate {
            settings.backdate = false;
        }
        if let Some(output) = &self.output {
            settings.output = Some(output.clone());
        }
        settings.normalize();
    }
}

fn open_output(settings: &AppSettings) -> anyhow::Result<Box<dyn Write + Send>> {
    Ok(match &settings.output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("cannot create {}", path.display()))?,
        ),
        None => Box::new(io::stdout()),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("soundbeat=info")),
        )
        .init();

    let cli = Cli::parse();
    let settings_path = cli.config.clone().unwrap_or_else(default_settings_path);
    let mut settings = load_settings(&settings_path);
    cli.apply(&mut settings);

    let config = settings
        .metering_config()
        .context("invalid configuration")?;

    if cli.save {
        save_settings(&settings_path, &settings)
            .with_context(|| format!("cannot save {}", settings_path.display()))?;
        info!(path = %settings_path.display(), "settings saved");
    }

    info!(name = %settings.name, "soundbeat starting");

    let sink = JsonLinesSink::new(BufWriter::new(open_output(&settings)?), settings.name.clone());
    let engine = Arc::new(MeterEngine::new(config));
    let path = PathBuf::from(&settings.name);
    engine.start(move || WavSource::open(path), sink)?;

    let signal_engine = Arc::clone(&engine);
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after current block");
            let _ = signal_engine.stop();
        }
    });

    let outcome = engine.wait().await;
    ctrl_c.abort();

    match outcome {
        Ok(summary) => {
            info!(
                records = summary.blocks_emitted,
                analyzed = ?summary.analyzed_duration,
                took = ?summary.wall_clock_elapsed,
                reason = ?summary.stop_reason,
                "soundbeat ended analyzing {}",
                settings.name
            );
            Ok(())
        }
        Err(e) => {
            error!(records = e.blocks_emitted, "metering failed: {}", e.error);
            Err(e.into())
        }
    }
}
