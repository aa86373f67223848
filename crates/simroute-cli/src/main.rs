//! Replay a GPX route on every booted iOS Simulator.
//!
//! Loads `routes/<name>.json`, moves each booted simulator to the route's
//! starting point, then starts `xcrun simctl location ... start` with the
//! track's waypoints. Playback continues until `q` (or `Esc`, `Ctrl-C`) is
//! pressed, at which point every simulator's location is cleared.
//!
//! # Usage
//!
//! ```bash
//! # Walk the "disneyland" route at the default 20 m/s, one update per second
//! simroute --route disneyland
//!
//! # Walking pace with half-second updates
//! simroute -r disneyland --speed 1.4 --interval 0.5
//!
//! # Routes and tracks kept somewhere else
//! SIMROUTE_ROUTES_DIR=~/routes SIMROUTE_GPX_DIR=~/tracks simroute -r commute
//!
//! # Show the available routes
//! simroute --list
//! ```

mod keyboard;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use crossterm::style::Stylize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use simroute_core::device::RouteParams;
use simroute_core::route::{self, RouteError, DEFAULT_ROUTES_DIR};
use simroute_core::session::{CancelSignal, Session, SessionConfig, SessionError};
use simroute_core::simctl::SimctlDevices;
use simroute_core::track::DEFAULT_GPX_DIR;

use keyboard::CancelListener;

/// Replay a GPX route on every booted iOS Simulator.
#[derive(Parser, Debug)]
#[command(name = "simroute")]
#[command(about = "Replay a GPX route on every booted iOS Simulator until a key is pressed")]
#[command(version)]
struct Cli {
    /// Route name (loads <routes-dir>/<name>.json)
    #[arg(short, long, required_unless_present = "list")]
    route: Option<String>,

    /// Travel speed in meters per second
    #[arg(short, long, default_value_t = 20.0, value_parser = positive_number)]
    speed: f64,

    /// Seconds between location updates
    #[arg(short, long, default_value_t = 1.0, value_parser = positive_number)]
    interval: f64,

    /// Directory containing route configs
    #[arg(long, default_value = DEFAULT_ROUTES_DIR, env = "SIMROUTE_ROUTES_DIR")]
    routes_dir: PathBuf,

    /// Directory GPX files are resolved against
    #[arg(long, default_value = DEFAULT_GPX_DIR, env = "SIMROUTE_GPX_DIR")]
    gpx_dir: PathBuf,

    /// List available routes and exit
    #[arg(long)]
    list: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn positive_number(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("`{}` is not a number", s))?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(format!("`{}` must be greater than zero", s))
    }
}

#[derive(Debug)]
enum CliError {
    Session(SessionError),
    Routes(RouteError),
}

impl CliError {
    fn exit_status(&self) -> u8 {
        match self {
            CliError::Session(SessionError::Route(_)) | CliError::Routes(_) => 2,
            CliError::Session(SessionError::Track { .. }) => 3,
            CliError::Session(SessionError::NoBootedDevices | SessionError::Enumeration(_)) => 4,
            CliError::Session(SessionError::IllegalTransition { .. }) => 1,
        }
    }

    fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.exit_status())
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Session(e) => write!(f, "{}", e),
            CliError::Routes(e) => write!(f, "{}", e),
        }
    }
}

impl From<SessionError> for CliError {
    fn from(e: SessionError) -> Self {
        CliError::Session(e)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = logging::init(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", format!("Error: {}", e).red());
            e.exit_code()
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    if cli.list {
        let names = route::list_routes(&cli.routes_dir).map_err(CliError::Routes)?;
        if names.is_empty() {
            eprintln!("No routes found in {}", cli.routes_dir.display());
        }
        for name in names {
            println!("{}", name);
        }
        return Ok(());
    }

    // clap guarantees a route unless --list was given
    let Some(route) = cli.route else {
        return Ok(());
    };

    let config = SessionConfig {
        route,
        routes_dir: cli.routes_dir,
        gpx_dir: cli.gpx_dir,
        params: RouteParams {
            speed: cli.speed,
            interval: cli.interval,
        },
    };
    debug!(?config, "Session config");

    let (cancel_tx, mut cancel_rx) = mpsc::channel::<CancelSignal>(4);

    let interrupt_tx = cancel_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = interrupt_tx.send(CancelSignal::Interrupt).await;
        }
    });

    let listener = CancelListener::spawn(cancel_tx);
    if listener.is_active() {
        info!("Press q to stop the simulation");
    } else {
        info!("Press Ctrl-C to stop the simulation");
    }

    let mut session = Session::new(config, Arc::new(SimctlDevices::new()));
    let result = session.run(&mut cancel_rx).await;
    drop(listener);

    let report = result?;
    info!(
        route = %report.route,
        started = report.started.len(),
        stopped = report.stopped.len(),
        failures = report.failures.len(),
        "Simulation stopped"
    );
    Ok(())
}
