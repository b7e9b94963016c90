//! # mapquad
//!
//! A quadtree level-of-detail engine for slippy-map tiles.
//!
//! A [`MapView`] owns a tree of tiles rooted at a configured zoom level. Once
//! per frame the host hands it a camera through a [`LodControl`] strategy,
//! which subdivides tiles that have become large on screen and collapses
//! tiles that have become small. New tiles fetch their imagery from a
//! [`TileProvider`] asynchronously; completions are applied on the update
//! thread by [`MapView::update`], and four siblings are always revealed
//! together.

pub mod core;
pub mod lod;
pub mod prelude;
pub mod rendering;
pub mod runtime;
pub mod tiles;
pub mod tree;
pub use crate::core::constants;

// Re-export public API
pub use core::{
    config::MapConfig,
    geo::{LatLng, Point, Quadrant, TileCoord},
    map::{Footprint, MapView},
    projection,
};

pub use lod::{LodAction, LodControl, LodRadial, LodRaycast};

pub use rendering::{camera::Camera, ray::Ray};

pub use tiles::{MapBoxProvider, OpenStreetMapProvider, TileImage, TileProvider};

pub use tree::{NodeId, NodeState, QuadTree, QuadTreeNode};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),
}

/// Failure to obtain imagery for a single tile.
///
/// Delivered to the requesting node only. The node keeps rendering with a
/// placeholder and no retry is attempted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Http { status: u16, url: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

/// Invalid input rejected before any tree mutation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Zoom {zoom} outside provider range [{min}, {max}]")]
    ZoomOutOfRange { zoom: u8, min: u8, max: u8 },

    #[error("Tile index {x},{y} outside grid at level {level}")]
    InvalidTileIndex { level: u8, x: u32, y: u32 },

    #[error("Minimum zoom {min} exceeds maximum zoom {max}")]
    InvalidZoomRange { min: u8, max: u8 },

    #[error("Invalid LOD settings: {0}")]
    InvalidLod(String),

    #[error("Invalid provider settings: {0}")]
    InvalidProvider(String),

    #[error("Invalid root footprint: {0}")]
    InvalidFootprint(String),

    #[error("No async runtime available: {0}")]
    NoRuntime(String),
}

/// Error type alias for convenience
pub type Error = MapError;
