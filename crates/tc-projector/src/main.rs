//! Tablecast projector: follows a session over the push channel and lays
//! out what the table should show, plus calibration helpers.

mod display;

use clap::{Parser, Subcommand};
use display::Frame;
use std::path::PathBuf;
use tc_core::{Point, compute_homography};
use tc_render::Surface;
use tc_sync::config::ConfigError;
use tc_sync::{Baseline, HttpStore, LiveChannel, SessionStore, SyncConfig, SyncError, WsConnector};

#[derive(Parser)]
#[command(name = "tc-projector", version, about = "Headless projection display and calibration helper")]
struct Cli {
    /// JSON file with `server` / reconnect settings.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Session server base URL. Wins over the config file and environment.
    #[arg(long, global = true)]
    server: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Follow a session and lay out every snapshot it pushes.
    Watch {
        session: String,
        #[arg(long, default_value_t = 1920.0)]
        width: f64,
        #[arg(long, default_value_t = 1080.0)]
        height: f64,
    },
    /// Print a session as JSON.
    Show { session: String },
    /// Create a session and print its id.
    Create {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        id: Option<String>,
    },
    /// Print the homography for four corners (x y, in corner order).
    Warp {
        #[arg(required = true, num_args = 8, allow_negative_numbers = true)]
        corners: Vec<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let config = sync_config(&cli)?;

    match cli.command {
        Command::Watch {
            session,
            width,
            height,
        } => watch(&config, &session, Surface::new(width, height)).await?,
        Command::Show { session } => {
            let store = HttpStore::new(&config.server)?;
            let session = store.session(&session).await?;
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        Command::Create { name, id } => {
            let store = HttpStore::new(&config.server)?;
            let session = store.create_session(name.as_deref(), id.as_deref()).await?;
            println!("{}", session.id);
        }
        Command::Warp { corners } => print_warp(&corners),
    }

    Ok(())
}

fn sync_config(cli: &Cli) -> Result<SyncConfig, ConfigError> {
    let file = match &cli.config {
        Some(path) => SyncConfig::load(path)?,
        None => SyncConfig::default(),
    };
    let mut config = file.with_env();
    if let Some(server) = &cli.server {
        config.server = server.clone();
    }
    Ok(config)
}

async fn watch(config: &SyncConfig, session: &str, surface: Surface) -> Result<(), SyncError> {
    let connector = WsConnector::new(&config.server)?;
    let baseline = Baseline::new();
    let mut updates = baseline.subscribe();
    let channel = LiveChannel::spawn(connector, session, baseline.clone(), config.reconnect_policy());
    let mut state = channel.watch_state();
    log::info!("watching session {session} on {}", config.server);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                log::info!("channel {current:?}");
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                if let Some(session) = snapshot {
                    let frame = Frame::render(&session, surface);
                    log::info!("{}", frame.summary());
                    log::debug!("warp mat3 {:?}", frame.warp);
                }
            }
        }
    }

    channel.stop().await;
    log::info!("stopped watching {session}");
    Ok(())
}

fn print_warp(coords: &[f64]) {
    let corners: Vec<Point> = coords
        .chunks_exact(2)
        .map(|c| Point::new(c[0], c[1]))
        .collect();
    let m = compute_homography(&corners);
    for row in m.0.chunks_exact(3) {
        println!("{:>12.6} {:>12.6} {:>12.6}", row[0], row[1], row[2]);
    }
    println!("mat3 {:?}", m.to_gl_mat3());
}
