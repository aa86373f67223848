//! Named route configurations.
//!
//! A route is a JSON file `<routes_dir>/<name>.json`:
//!
//! ```json
//! {
//!   "name": "Disneyland",
//!   "description": "Walk from the entrance to the castle",
//!   "gpxFile": "disneyland.gpx",
//!   "startingPoint": { "latitude": 33.8121, "longitude": -117.9190 }
//! }
//! ```
//!
//! `gpxFile` is resolved against the track directory by the caller, not here.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::device::Coordinate;

/// Default directory holding route configs, relative to the working directory.
pub const DEFAULT_ROUTES_DIR: &str = "routes";

const ROUTE_EXTENSION: &str = "json";

/// Errors loading a route configuration. All are fatal for a run.
#[derive(Error, Debug)]
pub enum RouteError {
    #[error("Invalid route name: {0:?}")]
    InvalidName(String),

    #[error("Route config not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed route config {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Starting point out of range in {}: {coordinate}", path.display())]
    InvalidStartingPoint { path: PathBuf, coordinate: Coordinate },
}

/// A parsed route configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteConfig {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// GPX file path, relative to the track directory.
    pub gpx_file: PathBuf,

    /// Where every device is placed before playback begins.
    pub starting_point: Coordinate,
}

impl RouteConfig {
    /// Loads `<routes_dir>/<name>.json`.
    ///
    /// # Errors
    ///
    /// - [`RouteError::InvalidName`] for an empty name or one that would escape `routes_dir`
    /// - [`RouteError::NotFound`] if the file does not exist
    /// - [`RouteError::Malformed`] if the JSON is invalid or a required field is missing
    /// - [`RouteError::InvalidStartingPoint`] if the starting point is outside WGS84 bounds
    pub fn load(routes_dir: &Path, name: &str) -> Result<Self, RouteError> {
        let path = route_path(routes_dir, name)?;
        let contents = std::fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                RouteError::NotFound(path.clone())
            } else {
                RouteError::Io {
                    path: path.clone(),
                    source,
                }
            }
        })?;

        let config: RouteConfig = serde_json::from_str(&contents).map_err(|source| RouteError::Malformed {
            path: path.clone(),
            source,
        })?;

        if !config.starting_point.is_valid() {
            return Err(RouteError::InvalidStartingPoint {
                path,
                coordinate: config.starting_point,
            });
        }
        Ok(config)
    }
}

/// Resolves the config file path for a route name.
pub fn route_path(routes_dir: &Path, name: &str) -> Result<PathBuf, RouteError> {
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(RouteError::InvalidName(name.to_string()));
    }
    Ok(routes_dir.join(format!("{name}.{ROUTE_EXTENSION}")))
}

/// Lists the route names available in `routes_dir`, sorted.
pub fn list_routes(routes_dir: &Path) -> Result<Vec<String>, RouteError> {
    let entries = std::fs::read_dir(routes_dir).map_err(|source| RouteError::Io {
        path: routes_dir.to_path_buf(),
        source,
    })?;

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == ROUTE_EXTENSION))
        .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
        .collect();
    names.sort();
    Ok(names)
}
