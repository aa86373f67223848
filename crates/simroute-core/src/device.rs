//! Device control trait for backend-agnostic location simulation.
//!
//! This module defines the [`DeviceControl`] trait, the capability interface
//! the rest of the crate uses to talk to simulators. The production backend is
//! [`SimctlDevices`](crate::simctl::SimctlDevices), which shells out to
//! `xcrun simctl`; tests swap in a recording mock.
//!
//! # Example
//!
//! ```no_run
//! use simroute_core::device::{Coordinate, DeviceControl};
//! use simroute_core::simctl::SimctlDevices;
//!
//! # async fn example() -> Result<(), simroute_core::device::DeviceError> {
//! let devices = SimctlDevices::new();
//! for device in devices.booted_devices().await? {
//!     devices.set_location(&device, Coordinate::new(37.3349, -122.0090)).await?;
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while controlling a simulator.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// The device-control command ran but reported failure.
    #[error("Command failed: {0}")]
    CommandFailed(String),

    /// Failed to parse the device list returned by the platform tool.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// An I/O error occurred while spawning or waiting on the command.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking task running the command was cancelled or panicked.
    #[error("Command task failed: {0}")]
    Task(String),
}

/// Opaque identifier (UDID) of a booted simulator.
///
/// Only meaningful while the simulator stays booted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(udid: impl Into<String>) -> Self {
        Self(udid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(udid: &str) -> Self {
        Self::new(udid)
    }
}

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Returns true when both components are finite and within WGS84 bounds.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Formats as `lat,lon`, the form simctl expects for each waypoint argument.
impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

/// One sample along a track. Route order is the order of the slice it lives in.
pub type Waypoint = Coordinate;

/// Playback parameters handed verbatim to the platform tool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteParams {
    /// Travel speed in meters per second.
    pub speed: f64,
    /// Seconds between location updates.
    pub interval: f64,
}

impl Default for RouteParams {
    fn default() -> Self {
        Self {
            speed: 20.0,
            interval: 1.0,
        }
    }
}

/// Capability interface over the host's simulator location tooling.
///
/// Every method is a single external call: no retries, no timeouts. A failure
/// for one device says nothing about the others.
#[async_trait]
pub trait DeviceControl: Send + Sync {
    /// Lists the identifiers of every currently booted simulator.
    async fn booted_devices(&self) -> Result<Vec<DeviceId>, DeviceError>;

    /// Moves the device to `coordinate` immediately.
    async fn set_location(&self, device: &DeviceId, coordinate: Coordinate) -> Result<(), DeviceError>;

    /// Starts continuous movement through `waypoints` in order.
    ///
    /// Interpolation and looping are handled by the platform.
    async fn start_route(
        &self,
        device: &DeviceId,
        waypoints: &[Waypoint],
        params: RouteParams,
    ) -> Result<(), DeviceError>;

    /// Clears any simulated location or route on the device.
    async fn clear_location(&self, device: &DeviceId) -> Result<(), DeviceError>;
}
