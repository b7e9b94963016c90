//! Prelude module for common mapquad types and traits
//!
//! Re-exports what a host needs to build a map and drive it every frame,
//! for easy importing with `use mapquad::prelude::*;`

pub use crate::core::{
    config::{LodConfig, LodStrategy, MapConfig, ProviderConfig, RootConfig},
    geo::{LatLng, Point, Quadrant, TileCoord},
    map::{Footprint, MapView},
    projection,
};

pub use crate::lod::{LodAction, LodControl, LodRadial, LodRaycast};

pub use crate::rendering::{
    camera::Camera,
    ray::{Intersection, Ray},
};

pub use crate::tiles::{
    MapBoxMode, MapBoxProvider, OpenStreetMapProvider, ProviderMetadata, TextureHandle, TileImage,
    TileProvider,
};

pub use crate::tree::{
    NodeId, NodeMaterial, NodeState, QuadTree, QuadTreeNode, SubdivideOutcome, TreeStats,
};

pub use crate::runtime::{default_spawner, AsyncHandle, AsyncSpawner, BlockingSpawner};

#[cfg(feature = "tokio-runtime")]
pub use crate::runtime::TokioSpawner;

pub use crate::{ConfigurationError, Error as MapError, FetchError, Result};

pub use std::sync::Arc;
