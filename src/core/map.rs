use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    core::{
        config::MapConfig,
        geo::{Point, TileCoord},
        projection,
    },
    lod::{LodAction, LodControl},
    rendering::camera::Camera,
    runtime::{self, AsyncSpawner},
    tiles::{TileLoader, TileProvider},
    tree::{NodeGeometry, NodeId, QuadTree, QuadTreeNode, SubdivideOutcome, TreeStats},
    Result,
};
use nalgebra::Point3;

/// World region the root tile covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Footprint {
    /// The root's own extent on the spherical Mercator plane.
    #[default]
    Mercator,
    /// A caller-chosen square on the XZ plane, handy for tests and small scenes.
    Planar {
        center_x: f64,
        center_z: f64,
        size: f64,
    },
}

impl Footprint {
    pub fn root_geometry(&self, root: TileCoord) -> NodeGeometry {
        match *self {
            Footprint::Mercator => {
                let (min, max) = projection::tile_projected_bounds(root);
                let center = projection::projected_to_world(Point::new(
                    (min.x + max.x) / 2.0,
                    (min.y + max.y) / 2.0,
                ));
                NodeGeometry::new(center, max.x - min.x)
            }
            Footprint::Planar {
                center_x,
                center_z,
                size,
            } => NodeGeometry::new(Point3::new(center_x, 0.0, center_z), size),
        }
    }
}

/// A tiled map: one quadtree, one provider, and the loader feeding it.
///
/// Every structural change queues fetches on the tree; the view hands them to
/// the loader straight away and applies completions in [`MapView::update`].
pub struct MapView {
    tree: QuadTree,
    provider: Arc<dyn TileProvider>,
    loader: TileLoader,
    footprint: Footprint,
}

impl MapView {
    /// Map on the runtime picked by [`runtime::default_spawner`]: the
    /// caller's Tokio runtime, or a background one when there is none.
    pub fn new(
        provider: Arc<dyn TileProvider>,
        root: TileCoord,
        footprint: Footprint,
    ) -> Result<Self> {
        Self::with_spawner(provider, root, footprint, runtime::default_spawner()?)
    }

    /// Fails with a configuration error, before anything is fetched, when
    /// `root` is not a valid tile in the provider's zoom range.
    pub fn with_spawner(
        provider: Arc<dyn TileProvider>,
        root: TileCoord,
        footprint: Footprint,
        spawner: Arc<dyn AsyncSpawner>,
    ) -> Result<Self> {
        let root = TileCoord::checked(root.level, root.x, root.y)?;
        provider.check_zoom(root.level)?;

        log::info!("map rooted at {} using {}", root, provider.name());
        let mut view = Self {
            tree: QuadTree::new(root, footprint.root_geometry(root)),
            provider,
            loader: TileLoader::new(spawner),
            footprint,
        };
        view.dispatch();
        Ok(view)
    }

    pub fn from_config(config: &MapConfig) -> Result<Self> {
        Self::from_config_with_spawner(config, runtime::default_spawner()?)
    }

    pub fn from_config_with_spawner(
        config: &MapConfig,
        spawner: Arc<dyn AsyncSpawner>,
    ) -> Result<Self> {
        config.validate()?;
        let provider = config.provider.build()?;
        let root = config.root.coord()?;
        Self::with_spawner(provider, root, config.root.footprint, spawner)
    }

    /// Hands queued fetches and cancellations from the tree to the loader.
    fn dispatch(&mut self) {
        for ticket in self.tree.take_cancelled() {
            self.loader.cancel(ticket);
        }
        for request in self.tree.take_requests() {
            self.loader.dispatch(&self.provider, request);
        }
    }

    /// Swaps the tile source and reloads everything. Passing the provider
    /// already in use does nothing and returns `Ok(false)`.
    pub fn set_provider(&mut self, provider: Arc<dyn TileProvider>) -> Result<bool> {
        if Arc::ptr_eq(&self.provider, &provider) {
            return Ok(false);
        }
        if let Some(root) = self.root_coord() {
            provider.check_zoom(root.level)?;
        }

        log::info!(
            "switching provider {} -> {}",
            self.provider.name(),
            provider.name()
        );
        self.provider = provider;
        self.clear();
        Ok(true)
    }

    /// Full reload: drops every children cache and refetches every live
    /// node from the current provider. Returns the number of fetches issued.
    pub fn clear(&mut self) -> usize {
        let issued = self.tree.reload();
        self.dispatch();
        log::debug!("reloading {} tiles", issued);
        issued
    }

    /// Replaces the whole tree with one rooted at `root`. Nothing changes if
    /// `root` is rejected.
    pub fn set_root(&mut self, root: TileCoord, footprint: Footprint) -> Result<()> {
        let root = TileCoord::checked(root.level, root.x, root.y)?;
        self.provider.check_zoom(root.level)?;

        log::info!("moving map root to {}", root);
        self.footprint = footprint;
        self.tree.reset_root(root, footprint.root_geometry(root));
        self.dispatch();
        Ok(())
    }

    pub fn subdivide(&mut self, id: NodeId) -> SubdivideOutcome {
        let outcome = self.tree.subdivide(id, self.provider.max_zoom());
        self.dispatch();
        outcome
    }

    pub fn simplify(&mut self, id: NodeId) -> bool {
        let simplified = self.tree.simplify(id);
        self.dispatch();
        simplified
    }

    /// Applies every completed fetch. Returns how many were accepted.
    pub fn update(&mut self) -> usize {
        let mut applied = 0;
        for result in self.loader.try_recv_results() {
            if self.tree.apply_result(result) {
                applied += 1;
            }
        }
        applied
    }

    /// Per-frame entry point: applies completed fetches, then lets `lod`
    /// adjust the tree for `camera`.
    pub fn update_lod(&mut self, lod: &mut dyn LodControl, camera: &Camera) -> Option<LodAction> {
        self.update();
        lod.update_lod(self, camera)
    }

    pub fn tree(&self) -> &QuadTree {
        &self.tree
    }

    pub fn node(&self, id: NodeId) -> Option<&QuadTreeNode> {
        self.tree.get(id)
    }

    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    pub fn root_coord(&self) -> Option<TileCoord> {
        self.tree.get(self.tree.root()).map(|root| root.coordinate())
    }

    pub fn provider(&self) -> &Arc<dyn TileProvider> {
        &self.provider
    }

    pub fn footprint(&self) -> Footprint {
        self.footprint
    }

    pub fn stats(&self) -> TreeStats {
        self.tree.stats()
    }

    /// Fetches spawned but not yet reported back.
    pub fn in_flight(&self) -> usize {
        self.loader.in_flight_count()
    }
}

impl std::fmt::Debug for MapView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapView")
            .field("provider", &self.provider.name())
            .field("footprint", &self.footprint)
            .field("stats", &self.tree.stats())
            .finish()
    }
}
