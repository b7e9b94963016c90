//! Per-frame level-of-detail strategies
//!
//! A strategy inspects the camera once per frame and makes at most one
//! structural change to the map: subdividing a tile that has grown large on
//! screen, or collapsing the parent of a tile that has shrunk.

pub mod radial;
pub mod raycast;

pub use radial::LodRadial;
pub use raycast::LodRaycast;

use crate::core::config::{LodConfig, LodStrategy};
use crate::core::map::MapView;
use crate::rendering::camera::Camera;
use crate::tree::{NodeId, SubdivideOutcome};

/// The structural change a strategy attempted in one frame, with what the
/// tree made of it. A guarded no-op still ends the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LodAction {
    /// `subdivide` was called on this node.
    Subdivide(NodeId, SubdivideOutcome),
    /// `simplify` was called on this node, the parent of the tile that
    /// shrank. `false` when it had no children to collapse.
    Simplify(NodeId, bool),
}

impl LodAction {
    pub fn node(&self) -> NodeId {
        match *self {
            LodAction::Subdivide(id, _) | LodAction::Simplify(id, _) => id,
        }
    }

    /// Whether the tree actually changed shape.
    pub fn changed_tree(&self) -> bool {
        match *self {
            LodAction::Subdivide(_, outcome) => outcome.changed_tree(),
            LodAction::Simplify(_, simplified) => simplified,
        }
    }
}

/// Decides, once per frame, where the tree needs more or less detail.
pub trait LodControl {
    /// Makes at most one structural change to `view`. Returns the change
    /// attempted, or `None` when the tree was left alone.
    fn update_lod(&mut self, view: &mut MapView, camera: &Camera) -> Option<LodAction>;
}

/// Strategy described by `config`.
pub fn from_config(config: &LodConfig) -> Box<dyn LodControl> {
    match config.strategy {
        LodStrategy::Raycast => Box::new(LodRaycast::from_config(config)),
        LodStrategy::Radial => Box::new(LodRadial::from_config(config)),
    }
}
