//! Coordinate conversions between geographic degrees, the spherical Mercator
//! plane and slippy-map tile indices.
//!
//! All functions are pure. The scene places the Mercator plane on world XZ:
//! projected `x` maps to world `x`, projected `y` (north) maps to world `-z`,
//! so tile rows grow along `+z` exactly like texture rows.

use std::f64::consts::PI;

use nalgebra::Point3;

use crate::core::constants::{EARTH_ORIGIN, EARTH_PERIMETER};
use crate::core::geo::{LatLng, Point, TileCoord};

/// Projects latitude/longitude (degrees) onto the spherical Mercator plane.
#[inline]
pub fn geographic_to_projected(latitude: f64, longitude: f64) -> Point {
    let x = longitude * EARTH_ORIGIN / 180.0;
    let y = ((90.0 + latitude) * PI / 360.0).tan().ln() / (PI / 180.0);
    Point::new(x, y * EARTH_ORIGIN / 180.0)
}

/// Inverse of [`geographic_to_projected`].
#[inline]
pub fn projected_to_geographic(x: f64, y: f64) -> LatLng {
    let longitude = x / EARTH_ORIGIN * 180.0;
    let latitude = (y / EARTH_ORIGIN * PI).exp().atan() * 360.0 / PI - 90.0;
    LatLng::new(latitude, longitude)
}

/// North-west corner of tile `(x, y)` at `zoom`. Fractional indices address
/// points inside a tile, so `x + 0.5, y + 0.5` is the tile centre.
#[inline]
pub fn tile_to_geographic(zoom: u8, x: f64, y: f64) -> LatLng {
    let n = 2.0_f64.powi(zoom as i32);
    let longitude = x / n * 360.0 - 180.0;
    let latitude = (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees();
    LatLng::new(latitude, longitude)
}

/// Forward slippy-tile formula. Returns fractional tile indices.
#[inline]
pub fn geographic_to_tile(latitude: f64, longitude: f64, zoom: u8) -> (f64, f64) {
    let n = 2.0_f64.powi(zoom as i32);
    let x = (longitude + 180.0) / 360.0 * n;
    let lat_rad = latitude.to_radians();
    let y = (1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n;
    (x, y)
}

/// Projected extent of a tile as `(min, max)` corners.
///
/// Tile edges are evenly spaced on the Mercator plane, so this is linear in
/// the tile index.
pub fn tile_projected_bounds(coord: TileCoord) -> (Point, Point) {
    let n = TileCoord::tiles_per_side(coord.level) as f64;
    let size = EARTH_PERIMETER / n;
    let min_x = coord.x as f64 * size - EARTH_ORIGIN;
    let max_y = EARTH_ORIGIN - coord.y as f64 * size;
    (
        Point::new(min_x, max_y - size),
        Point::new(min_x + size, max_y),
    )
}

/// Places a projected point on the world XZ plane.
#[inline]
pub fn projected_to_world(point: Point) -> Point3<f64> {
    Point3::new(point.x, 0.0, -point.y)
}

/// Reads a world position back onto the projected plane (height ignored).
#[inline]
pub fn world_to_projected(position: &Point3<f64>) -> Point {
    Point::new(position.x, -position.z)
}
