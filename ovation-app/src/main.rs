//! Ovation terminal host.
//!
//! Reads settings, opens the microphone (or replays a WAV file), prints one
//! line per reading and takes occupancy updates and start/stop commands on
//! stdin until `quit` or Ctrl-C.
//!
//! ```text
//! ovation [--occupancy N] [--device NAME] [--wav PATH [--loop]] [--json] [--settings PATH] [--list-devices]
//! ```

mod commands;
mod report;
mod settings;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use ovation_core::{
    audio::device::list_input_devices, CaptureSource, CpalCapture, SamplingSession,
    WavFileCapture,
};
use settings::{default_settings_path, load_settings};
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tracing::info;

/// Minimum spacing between printed reading lines; cycles run much faster.
const PRINT_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Default)]
struct Args {
    settings: Option<PathBuf>,
    occupancy: Option<u32>,
    device: Option<String>,
    wav: Option<PathBuf>,
    looping: bool,
    json: bool,
    list_devices: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--settings" => {
                args.settings = Some(it.next().context("--settings needs a path")?.into());
            }
            "--occupancy" => {
                let raw = it.next().context("--occupancy needs a number")?;
                args.occupancy = Some(
                    raw.parse()
                        .with_context(|| format!("invalid occupancy '{raw}'"))?,
                );
            }
            "--device" => args.device = Some(it.next().context("--device needs a name")?),
            "--wav" => args.wav = Some(it.next().context("--wav needs a path")?.into()),
            "--loop" => args.looping = true,
            "--json" => args.json = true,
            "--list-devices" => args.list_devices = true,
            "-h" | "--help" => {
                println!(
                    "usage: ovation [--occupancy N] [--device NAME] [--wav PATH [--loop]] [--json] [--settings PATH] [--list-devices]"
                );
                std::process::exit(0);
            }
            other => bail!("unknown argument '{other}'"),
        }
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── Tracing ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ovation=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args()?;

    if args.list_devices {
        for device in list_input_devices() {
            println!("{}", report::device_line(&device));
        }
        return Ok(());
    }

    let settings_path = args.settings.clone().unwrap_or_else(default_settings_path);
    let mut app_settings = load_settings(&settings_path);
    if let Some(device) = args.device.clone() {
        app_settings.preferred_input_device = Some(device);
    }
    if let Some(occupancy) = args.occupancy {
        app_settings.occupancy = occupancy;
    }
    app_settings.normalize();
    info!(
        settings_path = ?settings_path,
        occupancy = app_settings.occupancy,
        venue_volume_m3 = app_settings.venue_volume_m3,
        cycle_interval_ms = app_settings.cycle_interval_ms,
        "settings loaded"
    );

    // ── Session setup ─────────────────────────────────────────────────────
    let config = app_settings
        .session_config()
        .context("invalid threshold settings")?;
    let source = match &args.wav {
        Some(path) => CaptureSource::new(
            WavFileCapture::new(path)
                .with_block_size(app_settings.block_size)
                .looping(args.looping),
        ),
        None => CaptureSource::new(CpalCapture::new(app_settings.capture_config())),
    };
    let session = Arc::new(SamplingSession::new(config, source));
    session.set_occupancy(app_settings.occupancy);
    let floor_db = app_settings.display_floor_db;

    println!(
        "{}",
        report::threshold_line(session.threshold_model(), session.occupancy())
    );
    println!("{}", commands::HELP);

    // ── Observers ─────────────────────────────────────────────────────────
    let mut reading_rx = session.subscribe_readings();
    let json = args.json;
    tokio::spawn(async move {
        let mut last_print: Option<Instant> = None;
        loop {
            match reading_rx.recv().await {
                Ok(event) => {
                    if last_print.is_some_and(|t| t.elapsed() < PRINT_INTERVAL) {
                        continue;
                    }
                    last_print = Some(Instant::now());
                    if json {
                        match serde_json::to_string(&event) {
                            Ok(line) => println!("{line}"),
                            Err(e) => tracing::warn!("serialize reading: {e}"),
                        }
                    } else {
                        println!("{}", report::reading_line(&event, floor_db));
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::debug!("reading receiver lagged by {n} events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut status_rx = session.subscribe_status();
    tokio::spawn(async move {
        loop {
            match status_rx.recv().await {
                Ok(event) => {
                    if let Some(detail) = event.detail {
                        println!("capture stopped: {detail}");
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!("status receiver lagged by {n} events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Auto-start when the occupancy is already known.
    if session.occupancy() > 0 {
        let s = Arc::clone(&session);
        let started = tokio::task::spawn_blocking(move || commands::start_gated(&s)).await?;
        if let Err(message) = started {
            println!("{message}");
        }
    }

    // ── Input loop ────────────────────────────────────────────────────────
    // Plain thread so a pending stdin read never holds up runtime shutdown.
    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
    std::thread::Builder::new()
        .name("ovation-stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lines() {
                let Ok(line) = line else { break };
                if line_tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("spawning stdin reader")?;

    loop {
        tokio::select! {
            line = line_rx.recv() => {
                let Some(line) = line else {
                    wait_for_idle_or_interrupt(&session).await;
                    break;
                };
                let command = match commands::parse(&line) {
                    Ok(command) => command,
                    Err(message) => {
                        println!("{message}");
                        continue;
                    }
                };
                let s = Arc::clone(&session);
                let flow =
                    tokio::task::spawn_blocking(move || commands::apply(&s, command, floor_db))
                        .await?;
                if flow == commands::Flow::Exit {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    let s = Arc::clone(&session);
    tokio::task::spawn_blocking(move || s.stop()).await?;
    println!("{}", report::summary_line(&session.snapshot(), floor_db));
    Ok(())
}

/// Stdin closed (e.g. piped input): keep measuring until capture ends or Ctrl-C.
async fn wait_for_idle_or_interrupt(session: &SamplingSession) {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                return;
            }
            _ = tokio::time::sleep(Duration::from_millis(200)) => {
                if !session.is_running() {
                    return;
                }
            }
        }
    }
}
