//! Core constants for the spherical Mercator plane and the quadtree defaults.
//! Keeping them in a single place makes it easier to tweak engine-wide magic numbers.

/// Half of the Earth's perimeter in spherical Mercator units (EPSG:3857 origin shift).
pub const EARTH_ORIGIN: f64 = 20_037_508.342_789_244;

/// Full Earth perimeter in spherical Mercator units.
pub const EARTH_PERIMETER: f64 = EARTH_ORIGIN * 2.0;

/// Latitude at which the Mercator square ends.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Deepest zoom level representable by a `TileCoord`.
pub const MAX_TILE_LEVEL: u8 = 30;

/// Number of children produced by one subdivision.
pub const CHILDREN_PER_NODE: u8 = 4;

/// Root tile used when the caller does not configure one.
pub const DEFAULT_ROOT_LEVEL: u8 = 10;
pub const DEFAULT_ROOT_X: u32 = 812;
pub const DEFAULT_ROOT_Y: u32 = 394;

/// Raycast LOD defaults.
pub const DEFAULT_SUBDIVISION_RAYS: u32 = 2;
pub const DEFAULT_THRESHOLD_UP: f64 = 0.6;
pub const DEFAULT_THRESHOLD_DOWN: f64 = 0.15;

/// Weight applied to a tile's world size when `scale_distance` is enabled.
pub const SCALE_DISTANCE_FACTOR: f64 = 1.3;

/// Radial LOD defaults (world units after level normalisation).
pub const DEFAULT_SUBDIVIDE_DISTANCE: f64 = 50.0;
pub const DEFAULT_SIMPLIFY_DISTANCE: f64 = 300.0;
