use crate::error::{config_error, AppResult};
use serde::{Deserialize, Serialize};

/// Padding used when a new event starts from the current map centre
pub const CREATE_CENTER_BUFFER: f64 = 0.01;

/// Padding used when panning towards a marker near the map edge
pub const PAN_EDGE_BUFFER: f64 = 0.07;

/// Region the map may show
pub const MAP_BOUNDS: Bounds = Bounds {
    north: 37.19,
    south: 36.78,
    east: -121.63,
    west: -122.46,
};

/// Region new events may be placed in
pub const EVENT_BOUNDS: Bounds = Bounds {
    north: 37.06,
    south: 36.78,
    east: -121.72,
    west: -122.34,
};

/// A point on the map in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Axis-aligned latitude/longitude rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl Bounds {
    /// Reject rectangles that are empty or inverted
    pub fn validate(&self) -> AppResult<()> {
        let finite = [self.north, self.south, self.east, self.west]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(config_error("Bounds must be finite numbers"));
        }
        if self.north <= self.south {
            return Err(config_error("Bounds north must be greater than south"));
        }
        if self.east <= self.west {
            return Err(config_error("Bounds east must be greater than west"));
        }
        Ok(())
    }

    /// Midpoint of the rectangle
    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.north + self.south) / 2.0,
            (self.east + self.west) / 2.0,
        )
    }

    pub fn contains(&self, point: LatLng) -> bool {
        is_within_bounds(point.lat, point.lng, self)
    }
}

/// Boundary-inclusive rectangle test
pub fn is_within_bounds(lat: f64, lng: f64, bounds: &Bounds) -> bool {
    lat <= bounds.north && lat >= bounds.south && lng <= bounds.east && lng >= bounds.west
}

/// Pull a point so it sits at least `buffer` inside the bounds
pub fn clamp_inside(point: LatLng, bounds: &Bounds, buffer: f64) -> LatLng {
    let mut lat = point.lat;
    let mut lng = point.lng;

    if lat > bounds.north - buffer {
        lat = bounds.north - buffer;
    }
    if lat < bounds.south + buffer {
        lat = bounds.south + buffer;
    }
    if lng > bounds.east - buffer {
        lng = bounds.east - buffer;
    }
    if lng < bounds.west + buffer {
        lng = bounds.west + buffer;
    }

    LatLng { lat, lng }
}

/// Shift a pan target by `buffer` away from every edge it is within `buffer` of
pub fn nudge_from_edges(point: LatLng, bounds: &Bounds, buffer: f64) -> LatLng {
    let mut lat = point.lat;
    let mut lng = point.lng;

    if point.lat >= bounds.north - buffer {
        lat -= buffer;
    }
    if point.lat <= bounds.south + buffer {
        lat += buffer;
    }
    if point.lng >= bounds.east - buffer {
        lng -= buffer;
    }
    if point.lng <= bounds.west + buffer {
        lng += buffer;
    }

    LatLng { lat, lng }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIT: Bounds = Bounds {
        north: 1.0,
        south: 0.0,
        east: 1.0,
        west: 0.0,
    };

    #[test]
    fn test_is_within_bounds_inclusive() {
        assert!(is_within_bounds(0.5, 0.5, &UNIT));
        // Every edge and corner counts as inside
        assert!(is_within_bounds(1.0, 0.5, &UNIT));
        assert!(is_within_bounds(0.0, 0.5, &UNIT));
        assert!(is_within_bounds(0.5, 1.0, &UNIT));
        assert!(is_within_bounds(0.5, 0.0, &UNIT));
        assert!(is_within_bounds(0.0, 0.0, &UNIT));
        assert!(is_within_bounds(1.0, 1.0, &UNIT));
    }

    #[test]
    fn test_is_within_bounds_outside() {
        assert!(!is_within_bounds(1.0001, 0.5, &UNIT));
        assert!(!is_within_bounds(-0.0001, 0.5, &UNIT));
        assert!(!is_within_bounds(0.5, 1.0001, &UNIT));
        assert!(!is_within_bounds(0.5, -0.0001, &UNIT));
        assert!(!is_within_bounds(f64::NAN, 0.5, &UNIT));
    }

    #[test]
    fn test_campus_points() {
        // Science Hill sits inside both regions
        let science_hill = LatLng::new(37.0, -122.06);
        assert!(EVENT_BOUNDS.contains(science_hill));
        assert!(MAP_BOUNDS.contains(science_hill));

        // Visible on the map but too far north for events
        let north_county = LatLng::new(37.1, -122.06);
        assert!(MAP_BOUNDS.contains(north_county));
        assert!(!EVENT_BOUNDS.contains(north_county));
    }

    #[test]
    fn test_clamp_inside() {
        let clamped = clamp_inside(LatLng::new(2.0, -3.0), &UNIT, 0.1);
        assert_eq!(clamped, LatLng::new(0.9, 0.1));

        let untouched = clamp_inside(LatLng::new(0.5, 0.5), &UNIT, 0.1);
        assert_eq!(untouched, LatLng::new(0.5, 0.5));
    }

    #[test]
    fn test_nudge_from_edges() {
        let nudged = nudge_from_edges(LatLng::new(0.95, 0.02), &UNIT, 0.1);
        assert!((nudged.lat - 0.85).abs() < 1e-9);
        assert!((nudged.lng - 0.12).abs() < 1e-9);

        let centre = nudge_from_edges(LatLng::new(0.5, 0.5), &UNIT, 0.1);
        assert_eq!(centre, LatLng::new(0.5, 0.5));
    }

    #[test]
    fn test_validate_bounds() {
        assert!(MAP_BOUNDS.validate().is_ok());
        assert!(EVENT_BOUNDS.validate().is_ok());

        let inverted = Bounds {
            north: 0.0,
            south: 1.0,
            ..UNIT
        };
        assert!(inverted.validate().is_err());

        let flat = Bounds {
            east: 0.0,
            ..UNIT
        };
        assert!(flat.validate().is_err());
    }
}
