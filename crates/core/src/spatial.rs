//! Great-circle math over pins.
//!
//! Everything here is pure and total: malformed input yields NaN rather
//! than an error, and callers validate coordinates at their boundary.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::models::{Bounds, Located, Point, SpatialQuery, WithDistance};

pub const EARTH_RADIUS_KM: f64 = 6371.0;
pub const MILES_PER_KM: f64 = 0.621371;

/// Center and viewport used when a map has no pins yet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapDefaults {
    pub center: Point,
    pub bounds: Bounds,
}

impl MapDefaults {
    /// Defaults around an arbitrary home point, with a 0.1 degree margin.
    pub fn around(center: Point) -> Self {
        Self {
            center,
            bounds: Bounds {
                north: center.lat + 0.1,
                south: center.lat - 0.1,
                east: center.lng + 0.1,
                west: center.lng - 0.1,
            },
        }
    }
}

impl Default for MapDefaults {
    /// New York City.
    fn default() -> Self {
        Self {
            center: Point::new(40.7128, -74.0060),
            bounds: Bounds {
                north: 40.8,
                south: 40.6,
                east: -73.9,
                west: -74.1,
            },
        }
    }
}

pub fn haversine_km(a: Point, b: Point) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Great-circle distance in miles.
pub fn distance(a: Point, b: Point) -> f64 {
    haversine_km(a, b) * MILES_PER_KM
}

/// Items within `query.radius_miles` of the center, nearest first. Equal
/// distances keep input order.
pub fn find_in_radius<T>(items: &[T], query: &SpatialQuery) -> Vec<WithDistance<T>>
where
    T: Located + Clone,
{
    let mut hits = items
        .iter()
        .map(|item| WithDistance {
            distance: distance(query.center, item.point()),
            item: item.clone(),
        })
        .filter(|hit| hit.distance <= query.radius_miles)
        .collect::<Vec<_>>();

    hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
    hits
}

pub fn centroid<T: Located>(items: &[T], defaults: &MapDefaults) -> Point {
    if items.is_empty() {
        return defaults.center;
    }

    let count = items.len() as f64;
    let (lat_sum, lng_sum) = items.iter().fold((0.0, 0.0), |(lat, lng), item| {
        let point = item.point();
        (lat + point.lat, lng + point.lng)
    });

    Point::new(lat_sum / count, lng_sum / count)
}

pub fn bounds<T: Located>(items: &[T], defaults: &MapDefaults) -> Bounds {
    let mut points = items.iter().map(Located::point);
    let Some(first) = points.next() else {
        return defaults.bounds;
    };

    points.fold(
        Bounds {
            north: first.lat,
            south: first.lat,
            east: first.lng,
            west: first.lng,
        },
        |acc, point| Bounds {
            north: acc.north.max(point.lat),
            south: acc.south.min(point.lat),
            east: acc.east.max(point.lng),
            west: acc.west.min(point.lng),
        },
    )
}
