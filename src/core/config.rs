//! Configuration for providers, the root tile and LOD tuning
//!
//! Everything here is plain serde data so hosts can keep it in JSON next to
//! their own settings. [`MapConfig::validate`] rejects inconsistent values
//! before a [`MapView`](crate::MapView) is built from them.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::constants::{
    DEFAULT_ROOT_LEVEL, DEFAULT_ROOT_X, DEFAULT_ROOT_Y, DEFAULT_SIMPLIFY_DISTANCE,
    DEFAULT_SUBDIVIDE_DISTANCE, DEFAULT_SUBDIVISION_RAYS, DEFAULT_THRESHOLD_DOWN,
    DEFAULT_THRESHOLD_UP,
};
use crate::core::geo::TileCoord;
use crate::core::map::Footprint;
use crate::tiles::source::check_range;
use crate::tiles::{MapBoxMode, MapBoxProvider, OpenStreetMapProvider, TileProvider};
use crate::{ConfigurationError, Result};

fn default_osm_address() -> String {
    OpenStreetMapProvider::DEFAULT_ADDRESS.to_string()
}

fn default_format() -> String {
    "png".to_string()
}

fn default_osm_max_zoom() -> u8 {
    19
}

fn default_mapbox_max_zoom() -> u8 {
    18
}

fn default_mapbox_version() -> String {
    "v4".to_string()
}

/// Which tile service to use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderConfig {
    OpenStreetMap {
        #[serde(default = "default_osm_address")]
        address: String,
        #[serde(default = "default_format")]
        format: String,
        #[serde(default)]
        min_zoom: u8,
        #[serde(default = "default_osm_max_zoom")]
        max_zoom: u8,
    },
    MapBox {
        token: String,
        id: String,
        #[serde(default)]
        mode: MapBoxMode,
        #[serde(default = "default_format")]
        format: String,
        #[serde(default)]
        hdpi: bool,
        #[serde(default = "default_mapbox_version")]
        version: String,
        #[serde(default)]
        min_zoom: u8,
        #[serde(default = "default_mapbox_max_zoom")]
        max_zoom: u8,
    },
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::OpenStreetMap {
            address: default_osm_address(),
            format: default_format(),
            min_zoom: 0,
            max_zoom: default_osm_max_zoom(),
        }
    }
}

impl ProviderConfig {
    pub fn zoom_range(&self) -> (u8, u8) {
        match self {
            Self::OpenStreetMap {
                min_zoom, max_zoom, ..
            }
            | Self::MapBox {
                min_zoom, max_zoom, ..
            } => (*min_zoom, *max_zoom),
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        let (min, max) = self.zoom_range();
        check_range(min, max)?;
        match self {
            Self::OpenStreetMap { address, .. } if address.trim().is_empty() => Err(
                ConfigurationError::InvalidProvider("empty tile server address".to_string()),
            ),
            Self::MapBox { token, id, .. } if token.is_empty() || id.is_empty() => Err(
                ConfigurationError::InvalidProvider("mapbox needs a token and an id".to_string()),
            ),
            _ => Ok(()),
        }
    }

    /// Instantiate the configured provider
    pub fn build(&self) -> std::result::Result<Arc<dyn TileProvider>, ConfigurationError> {
        self.validate()?;
        let provider: Arc<dyn TileProvider> = match self {
            Self::OpenStreetMap {
                address,
                format,
                min_zoom,
                max_zoom,
            } => Arc::new(
                OpenStreetMapProvider::new(address.clone())
                    .with_format(format.clone())
                    .with_zoom_range(*min_zoom, *max_zoom)?,
            ),
            Self::MapBox {
                token,
                id,
                mode,
                format,
                hdpi,
                version,
                min_zoom,
                max_zoom,
            } => Arc::new(
                MapBoxProvider::new(token.clone(), id.clone(), *mode)
                    .with_format(format.clone())
                    .with_hdpi(*hdpi)
                    .with_version(version.clone())
                    .with_zoom_range(*min_zoom, *max_zoom)?,
            ),
        };
        Ok(provider)
    }
}

/// Tile the quadtree starts from and where it sits in the world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootConfig {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
    pub footprint: Footprint,
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            zoom: DEFAULT_ROOT_LEVEL,
            x: DEFAULT_ROOT_X,
            y: DEFAULT_ROOT_Y,
            footprint: Footprint::Mercator,
        }
    }
}

impl RootConfig {
    pub fn coord(&self) -> std::result::Result<TileCoord, ConfigurationError> {
        TileCoord::checked(self.zoom, self.x, self.y)
    }
}

/// Which per-frame heuristic drives subdivision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LodStrategy {
    #[default]
    Raycast,
    Radial,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodConfig {
    pub strategy: LodStrategy,
    /// Random rays cast per frame (raycast strategy)
    pub subdivision_rays: u32,
    /// Subdivide when the weighted distance rises above this
    pub threshold_up: f64,
    /// Simplify the parent when the weighted distance falls below this
    pub threshold_down: f64,
    pub power_distance: bool,
    pub scale_distance: bool,
    /// Radial strategy: subdivide closer than this
    pub subdivide_distance: f64,
    /// Radial strategy: simplify farther than this
    pub simplify_distance: f64,
    /// Seed for the ray sampler; random when absent
    pub seed: Option<u64>,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            strategy: LodStrategy::Raycast,
            subdivision_rays: DEFAULT_SUBDIVISION_RAYS,
            threshold_up: DEFAULT_THRESHOLD_UP,
            threshold_down: DEFAULT_THRESHOLD_DOWN,
            power_distance: false,
            scale_distance: true,
            subdivide_distance: DEFAULT_SUBDIVIDE_DISTANCE,
            simplify_distance: DEFAULT_SIMPLIFY_DISTANCE,
            seed: None,
        }
    }
}

/// Unified configuration presets for LodConfig
impl LodConfig {
    /// More samples and a lower bar for subdividing
    pub fn detailed() -> Self {
        Self {
            subdivision_rays: 6,
            threshold_up: 0.4,
            threshold_down: 0.1,
            ..Self::default()
        }
    }

    /// Fewer samples, keeps coarse tiles longer
    pub fn conservative() -> Self {
        Self {
            subdivision_rays: 1,
            threshold_up: 0.9,
            threshold_down: 0.2,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        if self.subdivision_rays == 0 {
            return Err(ConfigurationError::InvalidLod(
                "at least one subdivision ray is required".to_string(),
            ));
        }
        if !(self.threshold_down < self.threshold_up) {
            return Err(ConfigurationError::InvalidLod(format!(
                "threshold_down {} must be below threshold_up {}",
                self.threshold_down, self.threshold_up
            )));
        }
        if !(self.subdivide_distance < self.simplify_distance) {
            return Err(ConfigurationError::InvalidLod(format!(
                "subdivide_distance {} must be below simplify_distance {}",
                self.subdivide_distance, self.simplify_distance
            )));
        }
        Ok(())
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub provider: ProviderConfig,
    pub root: RootConfig,
    pub lod: LodConfig,
}

impl MapConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        self.provider.validate()?;
        let (min, max) = self.provider.zoom_range();
        let root = self.root.coord()?;
        if root.level < min || root.level > max {
            return Err(ConfigurationError::ZoomOutOfRange {
                zoom: root.level,
                min,
                max,
            });
        }
        if let Footprint::Planar { size, .. } = self.root.footprint {
            if !(size > 0.0) {
                return Err(ConfigurationError::InvalidFootprint(format!(
                    "planar size must be positive, got {}",
                    size
                )));
            }
        }
        self.lod.validate()
    }
}
