//! Route playback sessions.
//!
//! A [`Session`] drives one run end to end: load the route and its track,
//! place every booted simulator at the starting point, start the route on each,
//! wait for a cancel signal, then stop every route that is still running.
//!
//! # State machine
//!
//! ```text
//! Idle -> Initializing -> Running -> Stopping -> Terminated
//!              |                                    ^
//!              +------------- fatal error ----------+
//! ```
//!
//! Any other transition is rejected with [`SessionError::IllegalTransition`].
//!
//! Cancel signals arrive on an mpsc channel. The channel is only read once the
//! session is `Running`, so a signal sent while devices are still being set up
//! waits in the queue instead of interleaving with startup.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use simroute_core::session::{CancelSignal, Session, SessionConfig};
//! use simroute_core::simctl::SimctlDevices;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (tx, mut rx) = tokio::sync::mpsc::channel(1);
//!     let mut session = Session::new(SessionConfig::new("disneyland"), Arc::new(SimctlDevices::new()));
//!
//!     tokio::spawn(async move {
//!         tokio::signal::ctrl_c().await.ok();
//!         let _ = tx.send(CancelSignal::Interrupt).await;
//!     });
//!
//!     let report = session.run(&mut rx).await.unwrap();
//!     println!("stopped {} devices", report.stopped.len());
//! }
//! ```

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::device::{DeviceControl, DeviceError, DeviceId, RouteParams, Waypoint};
use crate::location::{ActiveSimulations, LocationController};
use crate::route::{RouteConfig, RouteError, DEFAULT_ROUTES_DIR};
use crate::track::{self, TrackError, DEFAULT_GPX_DIR};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Initializing,
    Running,
    Stopping,
    Terminated,
}

impl SessionState {
    /// Whether moving from `self` to `next` is a legal step.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Initializing)
                | (Initializing, Running)
                | (Initializing, Terminated)
                | (Running, Stopping)
                | (Stopping, Terminated)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Why a running session was asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelSignal {
    /// The cancel key was pressed.
    Key,
    /// The process received SIGINT.
    Interrupt,
}

/// Errors that end a session. Per-device failures are not errors; they are
/// logged and collected in [`SessionReport::failures`].
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("Track {}: {source}", path.display())]
    Track {
        path: PathBuf,
        #[source]
        source: TrackError,
    },

    #[error("Failed to list booted simulators: {0}")]
    Enumeration(#[source] DeviceError),

    #[error("No booted simulators found")]
    NoBootedDevices,

    #[error("Illegal session transition from {from} to {to}")]
    IllegalTransition { from: SessionState, to: SessionState },
}

/// Inputs for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Name of the route config to load.
    pub route: String,
    /// Directory holding `<route>.json` files.
    pub routes_dir: PathBuf,
    /// Directory the route's `gpxFile` is resolved against.
    pub gpx_dir: PathBuf,
    pub params: RouteParams,
}

impl SessionConfig {
    /// Config for `route` with default directories and playback parameters.
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            routes_dir: PathBuf::from(DEFAULT_ROUTES_DIR),
            gpx_dir: PathBuf::from(DEFAULT_GPX_DIR),
            params: RouteParams::default(),
        }
    }
}

/// A per-device command that can fail without ending the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    SetPosition,
    StartRoute,
    Stop,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::SetPosition => "set-position",
            Operation::StartRoute => "start-route",
            Operation::Stop => "stop",
        };
        f.write_str(name)
    }
}

/// A per-device command failure.
#[derive(Debug, Clone)]
pub struct DeviceFailure {
    pub device: DeviceId,
    pub operation: Operation,
    pub message: String,
}

/// What happened during a session.
#[derive(Debug, Clone, Default)]
pub struct SessionReport {
    pub route: String,
    pub waypoints: usize,
    /// Devices whose route was started, in start order.
    pub started: Vec<DeviceId>,
    /// Devices cleared successfully during the stop phase.
    pub stopped: Vec<DeviceId>,
    pub failures: Vec<DeviceFailure>,
    pub cancel: Option<CancelSignal>,
}

impl SessionReport {
    fn record_failure(&mut self, device: &DeviceId, operation: Operation, err: &DeviceError) {
        warn!(device = %device, %operation, error = %err, "Device command failed");
        self.failures.push(DeviceFailure {
            device: device.clone(),
            operation,
            message: err.to_string(),
        });
    }
}

/// One playback run over every booted simulator.
pub struct Session {
    config: SessionConfig,
    controller: LocationController,
    state: SessionState,
    active: ActiveSimulations,
    report: SessionReport,
}

impl Session {
    pub fn new(config: SessionConfig, control: Arc<dyn DeviceControl>) -> Self {
        let report = SessionReport {
            route: config.route.clone(),
            ..Default::default()
        };
        Self {
            config,
            controller: LocationController::new(control),
            state: SessionState::Idle,
            active: ActiveSimulations::new(),
            report,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn active(&self) -> &ActiveSimulations {
        &self.active
    }

    pub fn report(&self) -> &SessionReport {
        &self.report
    }

    fn transition(&mut self, next: SessionState) -> Result<(), SessionError> {
        if !self.state.can_transition_to(next) {
            return Err(SessionError::IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(from = %self.state, to = %next, "Session transition");
        self.state = next;
        Ok(())
    }

    /// Runs the whole session: start, wait for a cancel signal, stop.
    ///
    /// Returns the report once every device has been stopped. Fatal startup
    /// errors are returned before any device-directed command is sent.
    pub async fn run(&mut self, cancel: &mut mpsc::Receiver<CancelSignal>) -> Result<SessionReport, SessionError> {
        let span = info_span!("session", route = %self.config.route);
        async {
            self.start().await?;
            let signal = wait_for_cancel(cancel).await;
            info!(?signal, "Cancel received");
            self.report.cancel = Some(signal);
            self.stop().await?;
            Ok::<_, SessionError>(self.report.clone())
        }
        .instrument(span)
        .await
    }

    /// Moves from `Idle` to `Running`: loads the route, positions and starts every device.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::Initializing)?;
        match self.initialize().await {
            Ok(()) => self.transition(SessionState::Running),
            Err(err) => {
                self.transition(SessionState::Terminated)?;
                Err(err)
            }
        }
    }

    async fn initialize(&mut self) -> Result<(), SessionError> {
        let route = RouteConfig::load(&self.config.routes_dir, &self.config.route)?;
        info!(
            name = %route.name,
            description = %route.description,
            start = %route.starting_point,
            "Loaded route"
        );

        let gpx_path = self.config.gpx_dir.join(&route.gpx_file);
        let waypoints = track::load_waypoints(&gpx_path).map_err(|source| SessionError::Track {
            path: gpx_path.clone(),
            source,
        })?;
        self.report.waypoints = waypoints.len();
        info!(path = %gpx_path.display(), points = waypoints.len(), "Loaded track");

        let devices = self
            .controller
            .control()
            .booted_devices()
            .await
            .map_err(SessionError::Enumeration)?;
        if devices.is_empty() {
            return Err(SessionError::NoBootedDevices);
        }
        info!(count = devices.len(), "Found booted simulators");

        let mut positioned = Vec::with_capacity(devices.len());
        for device in devices {
            match self.controller.set_position(&device, route.starting_point).await {
                Ok(()) => {
                    info!(device = %device, "Moved to starting point");
                    positioned.push(device);
                }
                Err(err) => self.report.record_failure(&device, Operation::SetPosition, &err),
            }
        }

        for device in &positioned {
            self.start_device(device, &waypoints).await;
        }

        if self.active.is_empty() {
            warn!("No route could be started on any simulator");
        } else {
            info!(
                devices = self.active.len(),
                speed = self.config.params.speed,
                interval = self.config.params.interval,
                "Route running"
            );
        }
        Ok(())
    }

    async fn start_device(&mut self, device: &DeviceId, waypoints: &[Waypoint]) {
        let result = self
            .controller
            .start_route(&mut self.active, device, waypoints, self.config.params)
            .await;
        match result {
            Ok(()) => {
                info!(device = %device, "Route started");
                self.report.started.push(device.clone());
            }
            Err(err) => self.report.record_failure(device, Operation::StartRoute, &err),
        }
    }

    /// Moves from `Running` to `Terminated`, stopping every active route.
    ///
    /// Devices are re-enumerated first since simulators may have been closed
    /// during the run; routes on devices that are gone are dropped without a
    /// command. Devices that never had a route started are left alone. If
    /// enumeration fails, every device still marked active is stopped.
    pub async fn stop(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::Stopping)?;

        match self.controller.control().booted_devices().await {
            Ok(booted) => {
                for gone in self.active.retain_booted(&booted) {
                    debug!(device = %gone, "Simulator no longer booted, dropping its route");
                }
            }
            Err(err) => {
                warn!(error = %err, "Failed to list booted simulators, stopping tracked devices");
            }
        }

        let targets: Vec<DeviceId> = self.active.devices().cloned().collect();
        for device in &targets {
            match self.controller.stop(&mut self.active, device).await {
                Ok(()) => {
                    info!(device = %device, "Route stopped");
                    self.report.stopped.push(device.clone());
                }
                Err(err) => self.report.record_failure(device, Operation::Stop, &err),
            }
        }

        self.transition(SessionState::Terminated)
    }
}

/// Waits for the next cancel signal. A closed channel never resolves: only an
/// explicit signal ends a run.
async fn wait_for_cancel(cancel: &mut mpsc::Receiver<CancelSignal>) -> CancelSignal {
    match cancel.recv().await {
        Some(signal) => signal,
        None => std::future::pending().await,
    }
}
