//! Arena-backed quadtree of map tiles.
//!
//! The tree owns every node, live or cached. Parents refer to children by
//! [`NodeId`] and children keep a non-owning id back to their parent for the
//! readiness chain. All mutation happens on the update thread; fetches are
//! queued as [`FetchRequest`]s for the owner to dispatch.

use fxhash::FxHashMap;

use super::node::{NodeGeometry, NodeId, NodeState, QuadTreeNode};
use crate::core::constants::{CHILDREN_PER_NODE, MAX_TILE_LEVEL};
use crate::core::geo::{Quadrant, TileCoord};
use crate::rendering::ray::{Intersection, Ray};
use crate::tiles::{FetchRequest, FetchTicket, TextureHandle, TileResult};

/// What a call to [`QuadTree::subdivide`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubdivideOutcome {
    /// Four new children were created and their fetches queued.
    Created,
    /// Cached children were restored without fetching.
    Restored,
    AlreadySubdivided,
    /// The next level would exceed the provider's maximum zoom.
    MaxZoom,
    /// The parent is still waiting for this node's siblings.
    SiblingsLoading,
    UnknownNode,
}

impl SubdivideOutcome {
    pub fn changed_tree(self) -> bool {
        matches!(self, SubdivideOutcome::Created | SubdivideOutcome::Restored)
    }
}

/// Direction used by neighbour queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborDirection {
    Left,
    Right,
    Above,
    Below,
}

/// Snapshot of tree composition for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub live: usize,
    pub cached: usize,
    pub loading: usize,
    pub loaded: usize,
    pub failed: usize,
    pub renderable: usize,
    pub deepest_level: u8,
}

#[derive(Debug)]
pub struct QuadTree {
    nodes: FxHashMap<NodeId, QuadTreeNode>,
    root: NodeId,
    next_id: u64,
    next_ticket: u64,
    requests: Vec<FetchRequest>,
    cancelled: Vec<FetchTicket>,
}

impl QuadTree {
    /// Creates a tree whose root immediately starts loading.
    pub fn new(root: TileCoord, geometry: NodeGeometry) -> Self {
        let mut tree = Self {
            nodes: FxHashMap::default(),
            root: NodeId(0),
            next_id: 0,
            next_ticket: 0,
            requests: Vec::new(),
            cancelled: Vec::new(),
        };
        tree.root = tree.spawn_node(root, None, geometry);
        log::debug!("quadtree rooted at {}", root);
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Discards every node and starts loading a new root. Ids and tickets
    /// keep counting, so completions meant for the old tree never match.
    pub fn reset_root(&mut self, root: TileCoord, geometry: NodeGeometry) {
        for (_, node) in self.nodes.drain() {
            if let Some(ticket) = node.pending {
                self.cancelled.push(ticket);
            }
        }
        self.requests.clear();
        self.root = self.spawn_node(root, None, geometry);
        log::debug!("quadtree re-rooted at {}", root);
    }

    pub fn get(&self, id: NodeId) -> Option<&QuadTreeNode> {
        self.nodes.get(&id)
    }

    /// Every node the tree owns, live or cached.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Children of `id` in quadrant order.
    pub fn children(&self, id: NodeId) -> Option<[&QuadTreeNode; 4]> {
        let ids = self.nodes.get(&id)?.children?;
        let mut out = Vec::with_capacity(4);
        for child in ids {
            out.push(self.nodes.get(&child)?);
        }
        out.try_into().ok()
    }

    fn spawn_node(
        &mut self,
        coordinate: TileCoord,
        parent: Option<NodeId>,
        geometry: NodeGeometry,
    ) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes
            .insert(id, QuadTreeNode::new(id, coordinate, parent, geometry));
        self.issue_fetch(id);
        id
    }

    /// Queues exactly one fetch for `id`, superseding any outstanding one.
    fn issue_fetch(&mut self, id: NodeId) {
        let ticket = FetchTicket(self.next_ticket);
        self.next_ticket += 1;
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        if let Some(previous) = node.pending.replace(ticket) {
            self.cancelled.push(previous);
        }
        node.state = NodeState::Loading;
        self.requests.push(FetchRequest {
            node: id,
            coord: node.coordinate,
            ticket,
        });
    }

    /// Fetches queued since the last call.
    pub fn take_requests(&mut self) -> Vec<FetchRequest> {
        std::mem::take(&mut self.requests)
    }

    /// Tickets whose results must no longer be applied.
    pub fn take_cancelled(&mut self) -> Vec<FetchTicket> {
        std::mem::take(&mut self.cancelled)
    }

    /// Pushes detail down to four children of `id`.
    ///
    /// No-op when already subdivided, when the child level would pass
    /// `max_zoom` (never deeper than [`MAX_TILE_LEVEL`]), or while the parent
    /// of `id` is still loading its children.
    /// Reuses the children cache when one exists.
    pub fn subdivide(&mut self, id: NodeId, max_zoom: u8) -> SubdivideOutcome {
        let Some(node) = self.nodes.get(&id) else {
            return SubdivideOutcome::UnknownNode;
        };
        if node.subdivided || node.children.is_some() {
            return SubdivideOutcome::AlreadySubdivided;
        }
        let max_zoom = max_zoom.min(MAX_TILE_LEVEL);
        if u16::from(node.coordinate.level) + 1 > u16::from(max_zoom) {
            return SubdivideOutcome::MaxZoom;
        }
        if let Some(parent) = node.parent {
            let siblings_loaded = self
                .nodes
                .get(&parent)
                .map(|p| p.children_loaded)
                .unwrap_or(0);
            if siblings_loaded < CHILDREN_PER_NODE {
                return SubdivideOutcome::SiblingsLoading;
            }
        }

        let coordinate = node.coordinate;
        let geometry = node.geometry;
        let cached = node.children_cache;

        if let Some(children) = cached {
            let mut all_loaded = false;
            if let Some(node) = self.nodes.get_mut(&id) {
                node.children_cache = None;
                node.children = Some(children);
                node.subdivided = true;
                all_loaded = node.children_loaded >= CHILDREN_PER_NODE;
            }
            if all_loaded {
                self.reveal_children(id);
            }
            log::debug!("restored cached children of {}", coordinate);
            return SubdivideOutcome::Restored;
        }

        let children = Quadrant::ALL.map(|quadrant| {
            self.spawn_node(
                coordinate.child(quadrant),
                Some(id),
                geometry.child(quadrant),
            )
        });
        if let Some(node) = self.nodes.get_mut(&id) {
            node.children = Some(children);
            node.subdivided = true;
            node.children_loaded = 0;
        }
        log::debug!("subdivided {}", coordinate);
        SubdivideOutcome::Created
    }

    /// Collapses the children of `id` into its cache and makes `id` draw its
    /// own tile again. Returns `false` when `id` has no children.
    pub fn simplify(&mut self, id: NodeId) -> bool {
        let Some(node) = self.nodes.get_mut(&id) else {
            return false;
        };
        let Some(children) = node.children.take() else {
            return false;
        };
        debug_assert!(node.children_cache.is_none());
        node.children_cache = Some(children);
        node.subdivided = false;
        node.leaf_renderable = true;
        let coordinate = node.coordinate;

        for child in children {
            if let Some(child) = self.nodes.get_mut(&child) {
                child.visible = false;
            }
        }
        log::debug!("simplified {}", coordinate);
        true
    }

    /// Records that `id` finished loading.
    ///
    /// The root becomes visible directly. Otherwise the parent's loaded
    /// counter advances, and the fourth sibling reveals all four at once.
    pub fn node_ready(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        if node.ready_reported {
            return;
        }
        node.ready_reported = true;

        let Some(parent) = node.parent else {
            node.visible = true;
            return;
        };

        let Some(parent_node) = self.nodes.get_mut(&parent) else {
            return;
        };
        parent_node.children_loaded = (parent_node.children_loaded + 1).min(CHILDREN_PER_NODE);
        if parent_node.children_loaded == CHILDREN_PER_NODE && parent_node.children.is_some() {
            self.reveal_children(parent);
        }
    }

    fn reveal_children(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        let Some(children) = node.children else {
            return;
        };
        node.leaf_renderable = false;
        for child in children {
            if let Some(child) = self.nodes.get_mut(&child) {
                child.visible = true;
            }
        }
    }

    /// Applies a completed fetch. Stale results (destroyed node or a ticket
    /// that has been superseded) are discarded and `false` is returned.
    ///
    /// Failed children never count towards the four-way reveal; their parent
    /// keeps drawing the coarser tile. A failed root is shown with a
    /// placeholder.
    pub fn apply_result(&mut self, result: TileResult) -> bool {
        let TileResult { request, data } = result;
        let Some(node) = self.nodes.get_mut(&request.node) else {
            log::debug!("discarding tile {} for destroyed node", request.coord);
            return false;
        };
        if node.pending != Some(request.ticket) {
            log::debug!(
                "discarding stale tile {} (ticket {})",
                request.coord,
                request.ticket.0
            );
            return false;
        }
        node.pending = None;

        match data {
            Ok(image) => {
                node.texture = Some(TextureHandle::new(image));
                node.state = NodeState::Loaded;
                self.node_ready(request.node);
            }
            Err(e) => {
                log::warn!("tile {} failed: {}", request.coord, e);
                node.state = NodeState::Failed;
                if node.parent.is_none() {
                    node.visible = true;
                }
            }
        }
        true
    }

    /// Drops every children cache and refetches every live node.
    ///
    /// Current textures and visibility stay in place until replacements
    /// arrive. Returns the number of fetches queued.
    pub fn reload(&mut self) -> usize {
        let live = self.live_nodes();
        for &id in &live {
            let cached = self.nodes.get_mut(&id).and_then(|n| {
                let cache = n.children_cache.take();
                if cache.is_some() {
                    n.children_loaded = 0;
                }
                cache
            });
            if let Some(cached) = cached {
                for child in cached {
                    self.destroy_subtree(child);
                }
            }
        }
        for &id in &live {
            self.issue_fetch(id);
        }
        live.len()
    }

    /// Removes `id` and everything below it, cancelling outstanding fetches.
    fn destroy_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.remove(&current) else {
                continue;
            };
            if let Some(ticket) = node.pending {
                self.cancelled.push(ticket);
            }
            stack.extend(node.children.into_iter().flatten());
            stack.extend(node.children_cache.into_iter().flatten());
        }
    }

    /// Nodes reachable from the root through live children, depth first.
    pub fn live_nodes(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            out.push(id);
            if let Some(children) = node.children {
                stack.extend(children.iter().rev());
            }
        }
        out
    }

    /// Live nodes currently drawing their own tile.
    pub fn renderable_nodes(&self) -> Vec<NodeId> {
        self.live_nodes()
            .into_iter()
            .filter(|id| self.nodes.get(id).is_some_and(|n| n.is_renderable()))
            .collect()
    }

    /// Hits of `ray` against renderable tiles, nearest first.
    pub fn raycast(&self, ray: &Ray) -> Vec<Intersection> {
        let mut hits: Vec<Intersection> = self
            .renderable_nodes()
            .into_iter()
            .filter_map(|id| {
                let node = self.nodes.get(&id)?;
                let distance = ray.intersect_tile(&node.geometry.center, node.geometry.size)?;
                Some(Intersection {
                    node: id,
                    distance,
                    point: ray.at(distance),
                })
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }

    /// Adjacent tiles for edge stitching. Crack-free stitching is not
    /// implemented, so this is always empty; it is the hook a stitching pass
    /// would fill in.
    pub fn neighbors(&self, _id: NodeId, _direction: NeighborDirection) -> Vec<NodeId> {
        Vec::new()
    }

    pub fn stats(&self) -> TreeStats {
        let live = self.live_nodes();
        let mut stats = TreeStats {
            live: live.len(),
            cached: self.nodes.len() - live.len(),
            ..TreeStats::default()
        };
        for id in &live {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            match node.state {
                NodeState::Loading => stats.loading += 1,
                NodeState::Loaded => stats.loaded += 1,
                NodeState::Failed => stats.failed += 1,
                NodeState::Unloaded => {}
            }
            if node.is_renderable() {
                stats.renderable += 1;
            }
            stats.deepest_level = stats.deepest_level.max(node.level());
        }
        stats
    }
}
