use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::loader::{download_image, download_json};
use super::texture::TileImage;
use crate::core::constants::MAX_TILE_LEVEL;
use crate::core::geo::TileCoord;
use crate::{ConfigurationError, FetchError};

/// Best-effort description of a tile set (TileJSON subset).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub attribution: Option<String>,
    #[serde(default)]
    pub minzoom: Option<u8>,
    #[serde(default)]
    pub maxzoom: Option<u8>,
    /// `[west, south, east, north]` in degrees
    #[serde(default)]
    pub bounds: Option<[f64; 4]>,
    /// `[longitude, latitude, zoom]`
    #[serde(default)]
    pub center: Option<[f64; 3]>,
}

/// Anything that can produce imagery for a tile.
///
/// Callers clamp the requested level to `[min_zoom, max_zoom]` before
/// fetching; providers do not re-check it.
#[async_trait]
pub trait TileProvider: Send + Sync {
    /// Human readable provider name, used in logs.
    fn name(&self) -> &str;

    fn min_zoom(&self) -> u8;

    fn max_zoom(&self) -> u8;

    /// Address the tile is served from.
    fn url(&self, coord: TileCoord) -> String;

    /// Fetch and decode one tile. Failures are reported, never retried.
    async fn fetch_tile(&self, coord: TileCoord) -> Result<TileImage, FetchError> {
        download_image(&self.url(coord)).await
    }

    /// Not required for rendering; `None` when unavailable.
    async fn metadata(&self) -> Option<ProviderMetadata> {
        None
    }

    /// Rejects levels outside this provider's range.
    fn check_zoom(&self, zoom: u8) -> Result<(), ConfigurationError> {
        if zoom < self.min_zoom() || zoom > self.max_zoom() {
            return Err(ConfigurationError::ZoomOutOfRange {
                zoom,
                min: self.min_zoom(),
                max: self.max_zoom(),
            });
        }
        Ok(())
    }
}

/// Zoom bounds must be ordered and stay within the tile grid's deepest level.
pub(crate) fn check_range(min_zoom: u8, max_zoom: u8) -> Result<(), ConfigurationError> {
    if min_zoom > max_zoom || max_zoom > MAX_TILE_LEVEL {
        return Err(ConfigurationError::InvalidZoomRange {
            min: min_zoom,
            max: max_zoom,
        });
    }
    Ok(())
}

/// Generic XYZ server laid out as `{address}/{z}/{x}/{y}.{format}`.
#[derive(Debug, Clone)]
pub struct OpenStreetMapProvider {
    address: String,
    format: String,
    min_zoom: u8,
    max_zoom: u8,
}

impl OpenStreetMapProvider {
    pub const DEFAULT_ADDRESS: &'static str = "https://a.tile.openstreetmap.org";

    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into().trim_end_matches('/').to_string(),
            format: "png".to_string(),
            min_zoom: 0,
            max_zoom: 19,
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_zoom_range(mut self, min_zoom: u8, max_zoom: u8) -> Result<Self, ConfigurationError> {
        check_range(min_zoom, max_zoom)?;
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        Ok(self)
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl Default for OpenStreetMapProvider {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ADDRESS)
    }
}

#[async_trait]
impl TileProvider for OpenStreetMapProvider {
    fn name(&self) -> &str {
        "openstreetmap"
    }

    fn min_zoom(&self) -> u8 {
        self.min_zoom
    }

    fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    fn url(&self, coord: TileCoord) -> String {
        format!(
            "{}/{}/{}/{}.{}",
            self.address, coord.level, coord.x, coord.y, self.format
        )
    }

    async fn metadata(&self) -> Option<ProviderMetadata> {
        Some(ProviderMetadata {
            name: Some("OpenStreetMap".to_string()),
            attribution: Some("© OpenStreetMap contributors".to_string()),
            minzoom: Some(self.min_zoom),
            maxzoom: Some(self.max_zoom),
            bounds: None,
            center: None,
        })
    }
}

/// How a Mapbox identifier is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapBoxMode {
    /// `id` is a style such as `mapbox/streets-v11` (Static Tiles API)
    #[default]
    Style,
    /// `id` is a tileset id such as `mapbox.satellite` (raster tiles API)
    MapId,
}

const MAPBOX_ADDRESS: &str = "https://api.mapbox.com";

/// Mapbox styles or raster tilesets.
#[derive(Clone)]
pub struct MapBoxProvider {
    api_token: String,
    id: String,
    mode: MapBoxMode,
    format: String,
    use_hdpi: bool,
    version: String,
    min_zoom: u8,
    max_zoom: u8,
}

impl MapBoxProvider {
    pub fn new(api_token: impl Into<String>, id: impl Into<String>, mode: MapBoxMode) -> Self {
        Self {
            api_token: api_token.into(),
            id: id.into(),
            mode,
            format: "png".to_string(),
            use_hdpi: false,
            version: "v4".to_string(),
            min_zoom: 0,
            max_zoom: 18,
        }
    }

    /// Request `@2x` tiles.
    pub fn with_hdpi(mut self, use_hdpi: bool) -> Self {
        self.use_hdpi = use_hdpi;
        self
    }

    /// Image format for `MapId` requests (`png`, `jpg90`, ...).
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// API version segment for `MapId` requests.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_zoom_range(mut self, min_zoom: u8, max_zoom: u8) -> Result<Self, ConfigurationError> {
        check_range(min_zoom, max_zoom)?;
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        Ok(self)
    }

    pub fn mode(&self) -> MapBoxMode {
        self.mode
    }

    fn hdpi_suffix(&self) -> &'static str {
        if self.use_hdpi {
            "@2x"
        } else {
            ""
        }
    }

    fn metadata_url(&self) -> String {
        format!(
            "{}/{}/{}.json?access_token={}",
            MAPBOX_ADDRESS, self.version, self.id, self.api_token
        )
    }
}

// The token stays out of debug output.
impl std::fmt::Debug for MapBoxProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapBoxProvider")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("format", &self.format)
            .field("use_hdpi", &self.use_hdpi)
            .field("version", &self.version)
            .field("min_zoom", &self.min_zoom)
            .field("max_zoom", &self.max_zoom)
            .finish()
    }
}

#[async_trait]
impl TileProvider for MapBoxProvider {
    fn name(&self) -> &str {
        "mapbox"
    }

    fn min_zoom(&self) -> u8 {
        self.min_zoom
    }

    fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    fn url(&self, coord: TileCoord) -> String {
        match self.mode {
            MapBoxMode::Style => format!(
                "{}/styles/v1/{}/tiles/{}/{}/{}{}?access_token={}",
                MAPBOX_ADDRESS,
                self.id,
                coord.level,
                coord.x,
                coord.y,
                self.hdpi_suffix(),
                self.api_token
            ),
            MapBoxMode::MapId => format!(
                "{}/{}/{}/{}/{}/{}{}.{}?access_token={}",
                MAPBOX_ADDRESS,
                self.version,
                self.id,
                coord.level,
                coord.x,
                coord.y,
                self.hdpi_suffix(),
                self.format,
                self.api_token
            ),
        }
    }

    async fn metadata(&self) -> Option<ProviderMetadata> {
        if self.mode != MapBoxMode::MapId {
            return None;
        }
        match download_json::<ProviderMetadata>(&self.metadata_url()).await {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                log::warn!("mapbox metadata for {} unavailable: {}", self.id, e);
                None
            }
        }
    }
}
