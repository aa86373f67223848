//! Shared test helpers for simroute-core integration tests.
//!
//! Provides a recording [`DeviceControl`] mock and scratch directories laid
//! out like a real project (`routes/` and `gpx/`).

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use simroute_core::device::{Coordinate, DeviceControl, DeviceError, DeviceId, RouteParams, Waypoint};
use simroute_core::session::SessionConfig;

// ---------------------------------------------------------------------------
// Recording mock
// ---------------------------------------------------------------------------

/// One call made against the mock, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Enumerate,
    Set(DeviceId, Coordinate),
    Start(DeviceId, Vec<Waypoint>, RouteParams),
    Clear(DeviceId),
}

/// Scripted device backend that records every call.
///
/// `booted` is what enumeration returns; it can be changed mid-test to model
/// a simulator closing. Devices in the `fail_*` sets reject that command.
#[derive(Default)]
pub struct MockDevices {
    pub booted: Mutex<Vec<DeviceId>>,
    pub calls: Mutex<Vec<Call>>,
    pub fail_enumerate: Mutex<bool>,
    pub fail_set: HashSet<DeviceId>,
    pub fail_start: HashSet<DeviceId>,
    pub fail_clear: HashSet<DeviceId>,
}

impl MockDevices {
    pub fn with_booted(ids: &[&str]) -> Self {
        Self {
            booted: Mutex::new(ids.iter().map(|id| DeviceId::new(*id)).collect()),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_booted(&self, ids: &[&str]) {
        *self.booted.lock().unwrap() = ids.iter().map(|id| DeviceId::new(*id)).collect();
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn refuse(device: &DeviceId) -> DeviceError {
    DeviceError::CommandFailed(format!("Invalid device: {}", device))
}

#[async_trait]
impl DeviceControl for MockDevices {
    async fn booted_devices(&self) -> Result<Vec<DeviceId>, DeviceError> {
        self.record(Call::Enumerate);
        if *self.fail_enumerate.lock().unwrap() {
            return Err(DeviceError::CommandFailed("simctl unavailable".to_string()));
        }
        Ok(self.booted.lock().unwrap().clone())
    }

    async fn set_location(&self, device: &DeviceId, coordinate: Coordinate) -> Result<(), DeviceError> {
        self.record(Call::Set(device.clone(), coordinate));
        if self.fail_set.contains(device) {
            return Err(refuse(device));
        }
        Ok(())
    }

    async fn start_route(
        &self,
        device: &DeviceId,
        waypoints: &[Waypoint],
        params: RouteParams,
    ) -> Result<(), DeviceError> {
        self.record(Call::Start(device.clone(), waypoints.to_vec(), params));
        if self.fail_start.contains(device) {
            return Err(refuse(device));
        }
        Ok(())
    }

    async fn clear_location(&self, device: &DeviceId) -> Result<(), DeviceError> {
        self.record(Call::Clear(device.clone()));
        if self.fail_clear.contains(device) {
            return Err(refuse(device));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scratch project directories
// ---------------------------------------------------------------------------

/// Three-point track used by most scenarios.
pub const THREE_POINT_GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="simroute-tests" xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <name>Main Street</name>
    <trkseg>
      <trkpt lat="33.8121" lon="-117.919"></trkpt>
      <trkpt lat="33.8135" lon="-117.9187"></trkpt>
      <trkpt lat="33.8148" lon="-117.9189"></trkpt>
    </trkseg>
  </trk>
</gpx>
"#;

pub fn three_points() -> Vec<Waypoint> {
    vec![
        Coordinate::new(33.8121, -117.919),
        Coordinate::new(33.8135, -117.9187),
        Coordinate::new(33.8148, -117.9189),
    ]
}

/// A temporary project with `routes/` and `gpx/` directories, removed on drop.
pub struct Project {
    pub root: PathBuf,
}

impl Project {
    pub fn new() -> Self {
        let root = std::env::temp_dir().join(format!("simroute_test_{}", uuid::Uuid::new_v4().simple()));
        std::fs::create_dir_all(root.join("routes")).unwrap();
        std::fs::create_dir_all(root.join("gpx")).unwrap();
        Self { root }
    }

    pub fn write_route(&self, name: &str, json: &str) -> &Self {
        std::fs::write(self.root.join("routes").join(format!("{name}.json")), json).unwrap();
        self
    }

    pub fn write_gpx(&self, file: &str, contents: &str) -> &Self {
        std::fs::write(self.root.join("gpx").join(file), contents).unwrap();
        self
    }

    pub fn session_config(&self, route: &str, params: RouteParams) -> SessionConfig {
        SessionConfig {
            route: route.to_string(),
            routes_dir: self.root.join("routes"),
            gpx_dir: self.root.join("gpx"),
            params,
        }
    }
}

impl Drop for Project {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

/// The standard scenario: `park` route starting at (33.8121, -117.9190) over a three-point track.
pub fn park_project() -> Project {
    let project = Project::new();
    project
        .write_route(
            "park",
            r#"{"startingPoint":{"latitude":33.8121,"longitude":-117.9190},"gpxFile":"x.gpx"}"#,
        )
        .write_gpx("x.gpx", THREE_POINT_GPX);
    project
}
