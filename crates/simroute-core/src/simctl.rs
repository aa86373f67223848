//! Interface to Apple's `xcrun simctl` command-line tool.
//!
//! This module wraps the parts of simctl that location playback needs: listing
//! booted devices and the `simctl location` subcommands (`set`, `start`,
//! `clear`).
//!
//! [`Simctl`] holds the synchronous command wrappers. [`SimctlDevices`] adapts
//! them to the async [`DeviceControl`] trait by running each command on
//! tokio's blocking pool.
//!
//! # Requirements
//!
//! Xcode must be installed for `xcrun simctl` to be available, and at least
//! one simulator must be booted.
//!
//! # Example
//!
//! ```no_run
//! use simroute_core::device::{Coordinate, DeviceId};
//! use simroute_core::simctl::Simctl;
//!
//! for udid in Simctl::booted_udids().unwrap() {
//!     Simctl::set_location(&DeviceId::new(udid), Coordinate::new(51.5007, -0.1246)).unwrap();
//! }
//! ```

use std::collections::HashMap;
use std::process::Command;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::device::{Coordinate, DeviceControl, DeviceError, DeviceId, RouteParams, Waypoint};

const BOOTED_STATE: &str = "Booted";

/// A simulator as reported by `xcrun simctl list devices -j`.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulatorDevice {
    /// The unique device identifier (UDID).
    pub udid: String,

    /// Human-readable name (e.g., "iPhone 15 Pro").
    pub name: String,

    /// Current state (e.g., "Booted", "Shutdown").
    pub state: String,
}

impl SimulatorDevice {
    pub fn is_booted(&self) -> bool {
        self.state == BOOTED_STATE
    }
}

#[derive(Debug, Deserialize)]
struct DeviceList {
    devices: HashMap<String, Vec<SimulatorDevice>>,
}

/// Wrapper for `xcrun simctl` commands.
///
/// All methods are synchronous and execute shell commands.
pub struct Simctl;

impl Simctl {
    /// Lists every simulator across all runtimes.
    ///
    /// # Errors
    ///
    /// - [`DeviceError::Io`] if the command fails to execute
    /// - [`DeviceError::CommandFailed`] if simctl returns a non-zero exit code
    /// - [`DeviceError::JsonParse`] if the output cannot be parsed as JSON
    pub fn list_devices() -> Result<Vec<SimulatorDevice>, DeviceError> {
        let stdout = Self::run(&["list", "devices", "-j"])?;
        Self::parse_device_list(&stdout)
    }

    /// Returns the UDIDs of all booted simulators, in listing order.
    pub fn booted_udids() -> Result<Vec<String>, DeviceError> {
        let devices = Self::list_devices()?;
        Ok(Self::booted(&devices)
            .map(|d| {
                debug!(udid = %d.udid, name = %d.name, "Found booted simulator");
                d.udid.clone()
            })
            .collect())
    }

    /// Jumps the device to a fixed coordinate.
    pub fn set_location(device: &DeviceId, coordinate: Coordinate) -> Result<(), DeviceError> {
        Self::run_owned(Self::set_location_args(device, coordinate)).map(|_| ())
    }

    /// Starts route playback through `waypoints` at the given speed and interval.
    pub fn start_route(
        device: &DeviceId,
        waypoints: &[Waypoint],
        params: RouteParams,
    ) -> Result<(), DeviceError> {
        Self::run_owned(Self::start_route_args(device, waypoints, params)).map(|_| ())
    }

    /// Clears the simulated location, stopping any running route.
    pub fn clear_location(device: &DeviceId) -> Result<(), DeviceError> {
        Self::run_owned(Self::clear_location_args(device)).map(|_| ())
    }

    /// Arguments (after `xcrun simctl`) for `location <udid> set <lat>,<lon>`.
    pub fn set_location_args(device: &DeviceId, coordinate: Coordinate) -> Vec<String> {
        vec![
            "location".to_string(),
            device.to_string(),
            "set".to_string(),
            coordinate.to_string(),
        ]
    }

    /// Arguments for `location <udid> start --speed=<s> --interval=<i> <lat>,<lon>...`.
    ///
    /// Waypoints keep the order of the slice.
    pub fn start_route_args(device: &DeviceId, waypoints: &[Waypoint], params: RouteParams) -> Vec<String> {
        let mut args = vec![
            "location".to_string(),
            device.to_string(),
            "start".to_string(),
            format!("--speed={}", params.speed),
            format!("--interval={}", params.interval),
        ];
        args.extend(waypoints.iter().map(|w| w.to_string()));
        args
    }

    /// Arguments for `location <udid> clear`.
    pub fn clear_location_args(device: &DeviceId) -> Vec<String> {
        vec!["location".to_string(), device.to_string(), "clear".to_string()]
    }

    /// Parses device list JSON into a flat vector of devices.
    ///
    /// Exposed for testing; takes the raw bytes of `simctl list devices -j`.
    pub fn parse_device_list(json: &[u8]) -> Result<Vec<SimulatorDevice>, DeviceError> {
        let device_list: DeviceList = serde_json::from_slice(json)?;
        Ok(device_list.devices.into_values().flatten().collect())
    }

    /// Iterates over the booted devices in a list.
    pub fn booted(devices: &[SimulatorDevice]) -> impl Iterator<Item = &SimulatorDevice> {
        devices.iter().filter(|d| d.is_booted())
    }

    fn run_owned(args: Vec<String>) -> Result<Vec<u8>, DeviceError> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        Self::run(&args)
    }

    fn run(args: &[&str]) -> Result<Vec<u8>, DeviceError> {
        debug!(args = ?args, "xcrun simctl");
        let output = Command::new("xcrun").arg("simctl").args(args).output()?;

        if !output.status.success() {
            return Err(DeviceError::CommandFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(output.stdout)
    }
}

/// [`DeviceControl`] backed by `xcrun simctl`.
///
/// Each call runs on tokio's blocking pool and is awaited to completion.
#[derive(Debug, Default, Clone)]
pub struct SimctlDevices;

impl SimctlDevices {
    pub fn new() -> Self {
        Self
    }
}

async fn blocking<T, F>(f: F) -> Result<T, DeviceError>
where
    F: FnOnce() -> Result<T, DeviceError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DeviceError::Task(e.to_string()))?
}

#[async_trait]
impl DeviceControl for SimctlDevices {
    async fn booted_devices(&self) -> Result<Vec<DeviceId>, DeviceError> {
        let udids = blocking(Simctl::booted_udids).await?;
        Ok(udids.into_iter().map(DeviceId::new).collect())
    }

    async fn set_location(&self, device: &DeviceId, coordinate: Coordinate) -> Result<(), DeviceError> {
        let device = device.clone();
        blocking(move || Simctl::set_location(&device, coordinate)).await
    }

    async fn start_route(
        &self,
        device: &DeviceId,
        waypoints: &[Waypoint],
        params: RouteParams,
    ) -> Result<(), DeviceError> {
        let device = device.clone();
        let waypoints = waypoints.to_vec();
        blocking(move || Simctl::start_route(&device, &waypoints, params)).await
    }

    async fn clear_location(&self, device: &DeviceId) -> Result<(), DeviceError> {
        let device = device.clone();
        blocking(move || Simctl::clear_location(&device)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Sample JSON matching actual simctl output format
    const SAMPLE_DEVICE_LIST: &str = r#"{
        "devices": {
            "com.apple.CoreSimulator.SimRuntime.iOS-17-0": [
                {
                    "udid": "A1B2C3D4-E5F6-7890-ABCD-EF1234567890",
                    "name": "iPhone 15 Pro",
                    "state": "Booted",
                    "deviceTypeIdentifier": "com.apple.CoreSimulator.SimDeviceType.iPhone-15-Pro"
                },
                {
                    "udid": "B2C3D4E5-F6A7-8901-BCDE-F12345678901",
                    "name": "iPhone 15",
                    "state": "Shutdown"
                }
            ],
            "com.apple.CoreSimulator.SimRuntime.iOS-16-4": [
                {
                    "udid": "C3D4E5F6-A7B8-9012-CDEF-123456789012",
                    "name": "iPad Air",
                    "state": "Booted"
                }
            ]
        }
    }"#;

    fn device() -> DeviceId {
        DeviceId::new("A1B2C3D4-E5F6-7890-ABCD-EF1234567890")
    }

    #[test]
    fn test_parse_device_list_flattens_runtimes() {
        let devices = Simctl::parse_device_list(SAMPLE_DEVICE_LIST.as_bytes()).unwrap();
        assert_eq!(devices.len(), 3);
    }

    #[test]
    fn test_booted_filters_by_state() {
        let devices = Simctl::parse_device_list(SAMPLE_DEVICE_LIST.as_bytes()).unwrap();
        let mut names: Vec<&str> = Simctl::booted(&devices).map(|d| d.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["iPad Air", "iPhone 15 Pro"]);
    }

    #[test]
    fn test_booted_none() {
        let devices = Simctl::parse_device_list(br#"{"devices": {}}"#).unwrap();
        assert_eq!(Simctl::booted(&devices).count(), 0);
    }

    #[test]
    fn test_parse_device_list_invalid_json() {
        match Simctl::parse_device_list(b"not valid json") {
            Err(DeviceError::JsonParse(_)) => {}
            other => panic!("Expected JsonParse error, got: {:?}", other),
        }
    }

    #[test]
    fn test_set_location_args() {
        let args = Simctl::set_location_args(&device(), Coordinate::new(33.8121, -117.919));
        assert_eq!(
            args,
            vec!["location", "A1B2C3D4-E5F6-7890-ABCD-EF1234567890", "set", "33.8121,-117.919"]
        );
    }

    #[test]
    fn test_start_route_args_keep_waypoint_order() {
        let waypoints = [
            Coordinate::new(1.0, 2.0),
            Coordinate::new(-3.5, 4.25),
            Coordinate::new(0.5, 0.0),
        ];
        let params = RouteParams { speed: 1.4, interval: 1.0 };
        let args = Simctl::start_route_args(&device(), &waypoints, params);
        assert_eq!(
            args,
            vec![
                "location",
                "A1B2C3D4-E5F6-7890-ABCD-EF1234567890",
                "start",
                "--speed=1.4",
                "--interval=1",
                "1,2",
                "-3.5,4.25",
                "0.5,0",
            ]
        );
    }

    #[test]
    fn test_clear_location_args() {
        let args = Simctl::clear_location_args(&device());
        assert_eq!(args, vec!["location", "A1B2C3D4-E5F6-7890-ABCD-EF1234567890", "clear"]);
    }

    #[test]
    fn test_clear_location_with_invalid_udid() {
        // Fails either because the device doesn't exist or because xcrun is missing.
        assert!(Simctl::clear_location(&DeviceId::new("invalid-udid-that-does-not-exist")).is_err());
    }
}
