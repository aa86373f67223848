//! # simroute-core
//!
//! Core library for replaying GPX routes on iOS Simulators on macOS.
//!
//! The crate does no geospatial work of its own: it reads a route config and a
//! GPX track, then hands the raw waypoints to `xcrun simctl location`, which
//! does the interpolation and timing.
//!
//! ## Modules
//!
//! - [`device`] - The [`DeviceControl`](device::DeviceControl) capability trait and shared types
//! - [`simctl`] - Wrapper around Apple's `xcrun simctl` CLI
//! - [`route`] - Named route configs (`routes/<name>.json`)
//! - [`track`] - GPX track loading
//! - [`location`] - Per-device location commands and active-route tracking
//! - [`session`] - The playback session state machine
//!
//! ## External Dependencies
//!
//! - **Xcode** (for `xcrun simctl`), with at least one simulator booted
//!
//! ## Example
//!
//! ```no_run
//! use simroute_core::device::DeviceId;
//! use simroute_core::simctl::Simctl;
//! use simroute_core::track;
//!
//! let waypoints = track::load_waypoints("gpx/disneyland.gpx".as_ref()).expect("Bad track");
//! for udid in Simctl::booted_udids().expect("simctl failed") {
//!     Simctl::start_route(&DeviceId::new(udid), &waypoints, Default::default()).expect("Failed to start");
//! }
//! ```

pub mod device;
pub mod location;
pub mod route;
pub mod session;
pub mod simctl;
pub mod track;
