//! Per-device location commands and active-route tracking.
//!
//! [`LocationController`] issues commands through a [`DeviceControl`] backend
//! and keeps [`ActiveSimulations`] consistent with what it has started. The
//! set is owned by the caller and passed in by `&mut`, so a controller can be
//! shared while each session keeps its own view of which routes are running.
//!
//! Invariants:
//!
//! - a device is in the set only while its route is running
//! - starting a route on an already-active device stops it exactly once first
//! - [`LocationController::stop`] removes the entry before the clear command
//!   goes out, so stopping twice is harmless

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::device::{Coordinate, DeviceControl, DeviceError, DeviceId, RouteParams, Waypoint};

/// Devices with a route currently playing.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ActiveSimulations {
    devices: BTreeSet<DeviceId>,
}

impl ActiveSimulations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, device: &DeviceId) -> bool {
        self.devices.contains(device)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Active devices in identifier order.
    pub fn devices(&self) -> impl Iterator<Item = &DeviceId> {
        self.devices.iter()
    }

    fn insert(&mut self, device: DeviceId) {
        self.devices.insert(device);
    }

    fn remove(&mut self, device: &DeviceId) -> bool {
        self.devices.remove(device)
    }

    /// Drops every entry not present in `booted`, returning the dropped ids.
    pub fn retain_booted(&mut self, booted: &[DeviceId]) -> Vec<DeviceId> {
        let gone: Vec<DeviceId> = self
            .devices
            .iter()
            .filter(|d| !booted.contains(d))
            .cloned()
            .collect();
        for device in &gone {
            self.devices.remove(device);
        }
        gone
    }
}

/// Issues location commands to individual devices.
#[derive(Clone)]
pub struct LocationController {
    control: Arc<dyn DeviceControl>,
}

impl LocationController {
    pub fn new(control: Arc<dyn DeviceControl>) -> Self {
        Self { control }
    }

    /// The backend, for enumeration.
    pub fn control(&self) -> &Arc<dyn DeviceControl> {
        &self.control
    }

    /// Jumps `device` to `coordinate`.
    pub async fn set_position(&self, device: &DeviceId, coordinate: Coordinate) -> Result<(), DeviceError> {
        debug!(device = %device, %coordinate, "Setting position");
        self.control.set_location(device, coordinate).await
    }

    /// Starts playing `waypoints` on `device`, stopping any route already running there.
    ///
    /// The device is recorded as active only if the start command succeeds.
    /// A failure of the preceding stop is returned without attempting the start.
    pub async fn start_route(
        &self,
        active: &mut ActiveSimulations,
        device: &DeviceId,
        waypoints: &[Waypoint],
        params: RouteParams,
    ) -> Result<(), DeviceError> {
        if active.contains(device) {
            debug!(device = %device, "Route already active, stopping it first");
            self.stop(active, device).await?;
        }

        debug!(
            device = %device,
            points = waypoints.len(),
            speed = params.speed,
            interval = params.interval,
            "Starting route"
        );
        self.control.start_route(device, waypoints, params).await?;
        active.insert(device.clone());
        Ok(())
    }

    /// Clears the simulated location on `device` and forgets its route.
    ///
    /// Safe on a device with no active route: the set is left as is and the
    /// clear command is still sent.
    pub async fn stop(&self, active: &mut ActiveSimulations, device: &DeviceId) -> Result<(), DeviceError> {
        let was_active = active.remove(device);
        debug!(device = %device, was_active, "Stopping route");
        self.control.clear_location(device).await
    }
}
