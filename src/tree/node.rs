use nalgebra::{Point3, Vector3};

use crate::core::geo::{Quadrant, TileCoord};
use crate::tiles::{FetchTicket, TextureHandle};

/// Stable handle to a node owned by a [`QuadTree`](super::QuadTree).
/// Ids are never reused, so a stale id simply stops resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// Imagery status of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Unloaded,
    Loading,
    Loaded,
    Failed,
}

/// World placement of a tile: a square on the XZ plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeGeometry {
    pub center: Point3<f64>,
    pub size: f64,
}

impl NodeGeometry {
    pub fn new(center: Point3<f64>, size: f64) -> Self {
        Self { center, size }
    }

    /// Half-scale square offset by a quarter of this one, so the four
    /// children tile this footprint exactly.
    pub fn child(&self, quadrant: Quadrant) -> NodeGeometry {
        let (dx, dy) = quadrant.offset();
        let quarter = self.size / 4.0;
        let center = Point3::new(
            self.center.x + (dx as f64 * 2.0 - 1.0) * quarter,
            self.center.y,
            self.center.z + (dy as f64 * 2.0 - 1.0) * quarter,
        );
        NodeGeometry::new(center, self.size / 2.0)
    }

    /// Length of the tile's scale vector. The tile is flat, so only the
    /// two horizontal axes contribute.
    pub fn world_scale(&self) -> f64 {
        Vector3::new(self.size, 0.0, self.size).norm()
    }

    pub fn contains_xz(&self, x: f64, z: f64) -> bool {
        let half = self.size / 2.0;
        (x - self.center.x).abs() <= half && (z - self.center.z).abs() <= half
    }
}

/// What the host should draw for a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeMaterial<'a> {
    Texture(&'a TextureHandle),
    /// Fetch failed and nothing was loaded before
    Placeholder,
    /// Still waiting for the first texture
    Blank,
}

/// Runtime state of one tile in the quadtree.
#[derive(Debug, Clone)]
pub struct QuadTreeNode {
    pub(crate) id: NodeId,
    pub(crate) coordinate: TileCoord,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Option<[NodeId; 4]>,
    pub(crate) children_cache: Option<[NodeId; 4]>,
    pub(crate) state: NodeState,
    pub(crate) subdivided: bool,
    pub(crate) children_loaded: u8,
    pub(crate) visible: bool,
    pub(crate) leaf_renderable: bool,
    pub(crate) texture: Option<TextureHandle>,
    pub(crate) geometry: NodeGeometry,
    pub(crate) pending: Option<FetchTicket>,
    /// Set once this node has counted towards its parent's reveal.
    pub(crate) ready_reported: bool,
}

impl QuadTreeNode {
    pub(crate) fn new(
        id: NodeId,
        coordinate: TileCoord,
        parent: Option<NodeId>,
        geometry: NodeGeometry,
    ) -> Self {
        Self {
            id,
            coordinate,
            parent,
            children: None,
            children_cache: None,
            state: NodeState::Unloaded,
            subdivided: false,
            children_loaded: 0,
            visible: false,
            leaf_renderable: true,
            texture: None,
            geometry,
            pending: None,
            ready_reported: false,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn coordinate(&self) -> TileCoord {
        self.coordinate
    }

    pub fn level(&self) -> u8 {
        self.coordinate.level
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Live children in quadrant order, if subdivided.
    pub fn children(&self) -> Option<&[NodeId; 4]> {
        self.children.as_ref()
    }

    pub fn children_cache(&self) -> Option<&[NodeId; 4]> {
        self.children_cache.as_ref()
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn is_subdivided(&self) -> bool {
        self.subdivided
    }

    pub fn children_loaded(&self) -> u8 {
        self.children_loaded
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether this node draws its own tile rather than deferring to children.
    pub fn is_leaf_renderable(&self) -> bool {
        self.leaf_renderable
    }

    /// Drawn this frame and hit-testable by the LOD rays.
    pub fn is_renderable(&self) -> bool {
        self.visible && self.leaf_renderable
    }

    pub fn texture(&self) -> Option<&TextureHandle> {
        self.texture.as_ref()
    }

    pub fn geometry(&self) -> &NodeGeometry {
        &self.geometry
    }

    pub fn pending_ticket(&self) -> Option<FetchTicket> {
        self.pending
    }

    pub fn material(&self) -> NodeMaterial<'_> {
        match (&self.texture, self.state) {
            (Some(texture), _) => NodeMaterial::Texture(texture),
            (None, NodeState::Failed) => NodeMaterial::Placeholder,
            (None, _) => NodeMaterial::Blank,
        }
    }
}
