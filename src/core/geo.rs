use serde::{Deserialize, Serialize};

use crate::core::constants::{MAX_LATITUDE, MAX_TILE_LEVEL};
use crate::core::projection;
use crate::ConfigurationError;

/// Represents a geographical coordinate with latitude and longitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Creates a new LatLng coordinate
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Validates that the coordinates are within valid ranges
    pub fn is_valid(&self) -> bool {
        self.lat >= -90.0 && self.lat <= 90.0 && self.lng >= -180.0 && self.lng <= 180.0
    }

    /// Clamps latitude to the square covered by Web Mercator
    pub fn clamp_lat(lat: f64) -> f64 {
        lat.clamp(-MAX_LATITUDE, MAX_LATITUDE)
    }

    /// Converts to spherical Mercator units (EPSG:3857)
    pub fn to_projected(&self) -> Point {
        projection::geographic_to_projected(self.lat, self.lng)
    }

    /// Creates LatLng from spherical Mercator units
    pub fn from_projected(point: Point) -> Self {
        projection::projected_to_geographic(point.x, point.y)
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// A point on the projected Mercator plane
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// One of the four children of a subdivided tile, in child order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quadrant {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::TopLeft,
        Quadrant::TopRight,
        Quadrant::BottomLeft,
        Quadrant::BottomRight,
    ];

    /// Column/row offset of this quadrant inside its parent (0 or 1 each).
    pub fn offset(self) -> (u32, u32) {
        match self {
            Quadrant::TopLeft => (0, 0),
            Quadrant::TopRight => (1, 0),
            Quadrant::BottomLeft => (0, 1),
            Quadrant::BottomRight => (1, 1),
        }
    }
}

/// Represents a tile coordinate in the slippy map tile system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub level: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub fn new(level: u8, x: u32, y: u32) -> Self {
        Self { level, x, y }
    }

    /// Builds a coordinate, rejecting levels or indices outside the tile grid.
    pub fn checked(level: u8, x: u32, y: u32) -> Result<Self, ConfigurationError> {
        let coord = Self::new(level, x, y);
        if level > MAX_TILE_LEVEL {
            return Err(ConfigurationError::ZoomOutOfRange {
                zoom: level,
                min: 0,
                max: MAX_TILE_LEVEL,
            });
        }
        if !coord.is_valid() {
            return Err(ConfigurationError::InvalidTileIndex { level, x, y });
        }
        Ok(coord)
    }

    /// Creates the tile containing a LatLng at the given zoom level
    pub fn from_lat_lng(lat_lng: &LatLng, level: u8) -> Result<Self, ConfigurationError> {
        let (fx, fy) =
            projection::geographic_to_tile(LatLng::clamp_lat(lat_lng.lat), lat_lng.lng, level);
        let last = Self::tiles_per_side(level) - 1;
        let x = (fx.floor().max(0.0) as u64).min(last as u64) as u32;
        let y = (fy.floor().max(0.0) as u64).min(last as u64) as u32;
        Self::checked(level, x, y)
    }

    /// Number of tiles along one axis at `level`.
    pub fn tiles_per_side(level: u8) -> u32 {
        1u32 << level.min(31)
    }

    /// Converts tile coordinate to LatLng (northwest corner)
    pub fn to_lat_lng(&self) -> LatLng {
        projection::tile_to_geographic(self.level, self.x as f64, self.y as f64)
    }

    /// Geographic centre of the tile
    pub fn center(&self) -> LatLng {
        projection::tile_to_geographic(self.level, self.x as f64 + 0.5, self.y as f64 + 0.5)
    }

    /// Gets the parent tile at a lower zoom level
    pub fn parent(&self) -> Option<TileCoord> {
        if self.level == 0 {
            None
        } else {
            Some(TileCoord::new(self.level - 1, self.x / 2, self.y / 2))
        }
    }

    /// Child tile covering `quadrant` of this tile.
    pub fn child(&self, quadrant: Quadrant) -> TileCoord {
        let (dx, dy) = quadrant.offset();
        TileCoord::new(self.level + 1, self.x * 2 + dx, self.y * 2 + dy)
    }

    /// The four child tiles in quadrant order.
    pub fn children(&self) -> [TileCoord; 4] {
        Quadrant::ALL.map(|q| self.child(q))
    }

    /// Which quadrant of its parent this tile occupies.
    pub fn quadrant(&self) -> Option<Quadrant> {
        if self.level == 0 {
            return None;
        }
        Some(match (self.x % 2, self.y % 2) {
            (0, 0) => Quadrant::TopLeft,
            (1, 0) => Quadrant::TopRight,
            (0, _) => Quadrant::BottomLeft,
            _ => Quadrant::BottomRight,
        })
    }

    /// Checks if the tile is valid for its zoom level
    pub fn is_valid(&self) -> bool {
        if self.level > MAX_TILE_LEVEL {
            return false;
        }
        let max_coord = Self::tiles_per_side(self.level);
        self.x < max_coord && self.y < max_coord
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.level, self.x, self.y)
    }
}
