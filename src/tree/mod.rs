pub mod node;
pub mod quadtree;

pub use node::{NodeGeometry, NodeId, NodeMaterial, NodeState, QuadTreeNode};
pub use quadtree::{NeighborDirection, QuadTree, SubdivideOutcome, TreeStats};
