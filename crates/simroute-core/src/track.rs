//! GPX track loading.
//!
//! Parsing is delegated to the [`gpx`] crate. Only the first track is used;
//! its segments are concatenated in document order.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::device::{Coordinate, Waypoint};

/// Default directory holding GPX files, relative to the working directory.
pub const DEFAULT_GPX_DIR: &str = "gpx";

/// Errors loading a track. All are fatal for a run.
#[derive(Error, Debug)]
pub enum TrackError {
    #[error("Failed to open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("GPX parse error: {0}")]
    Parse(String),

    #[error("GPX file has no track points")]
    Empty,
}

/// Reads the first track of the GPX file at `path`.
pub fn load_waypoints(path: &Path) -> Result<Vec<Waypoint>, TrackError> {
    let file = File::open(path).map_err(|source| TrackError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let waypoints = parse_waypoints(BufReader::new(file))?;
    debug!(path = %path.display(), points = waypoints.len(), "Loaded track");
    Ok(waypoints)
}

/// Parses GPX from any reader and returns the first track's points in order.
///
/// # Errors
///
/// - [`TrackError::Parse`] if the content is not valid GPX
/// - [`TrackError::Empty`] if there is no track or the first track has no points
pub fn parse_waypoints<R: Read>(reader: R) -> Result<Vec<Waypoint>, TrackError> {
    let gpx = gpx::read(reader).map_err(|e| TrackError::Parse(e.to_string()))?;
    let track = gpx.tracks.first().ok_or(TrackError::Empty)?;

    let waypoints: Vec<Waypoint> = track
        .segments
        .iter()
        .flat_map(|segment| segment.points.iter())
        .map(|wpt| {
            // geo-types points are (x = longitude, y = latitude)
            let point = wpt.point();
            Coordinate::new(point.y(), point.x())
        })
        .collect();

    if waypoints.is_empty() {
        return Err(TrackError::Empty);
    }
    Ok(waypoints)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_SEGMENTS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="simroute-tests" xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <name>Loop</name>
    <trkseg>
      <trkpt lat="33.8121" lon="-117.9190"></trkpt>
      <trkpt lat="33.8130" lon="-117.9185"></trkpt>
    </trkseg>
    <trkseg>
      <trkpt lat="33.8142" lon="-117.9179"></trkpt>
    </trkseg>
  </trk>
  <trk>
    <trkseg>
      <trkpt lat="1.0" lon="1.0"></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

    #[test]
    fn first_track_points_in_document_order() {
        let waypoints = parse_waypoints(TWO_SEGMENTS.as_bytes()).unwrap();
        assert_eq!(
            waypoints,
            vec![
                Coordinate::new(33.8121, -117.9190),
                Coordinate::new(33.8130, -117.9185),
                Coordinate::new(33.8142, -117.9179),
            ]
        );
    }

    #[test]
    fn no_tracks_is_empty() {
        let gpx = r#"<?xml version="1.0"?>
<gpx version="1.1" creator="simroute-tests">
  <wpt lat="10.0" lon="20.0"></wpt>
</gpx>"#;
        assert!(matches!(parse_waypoints(gpx.as_bytes()), Err(TrackError::Empty)));
    }

    #[test]
    fn track_without_points_is_empty() {
        let gpx = r#"<?xml version="1.0"?>
<gpx version="1.1" creator="simroute-tests">
  <trk><trkseg></trkseg></trk>
</gpx>"#;
        assert!(matches!(parse_waypoints(gpx.as_bytes()), Err(TrackError::Empty)));
    }

    #[test]
    fn garbage_is_parse_error() {
        assert!(matches!(parse_waypoints(&b"definitely not xml"[..]), Err(TrackError::Parse(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = load_waypoints(Path::new("/nonexistent/simroute/track.gpx"));
        assert!(matches!(result, Err(TrackError::Io { .. })));
    }
}
