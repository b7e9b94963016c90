use nalgebra::{Point3, Unit, Vector3};

use crate::tree::NodeId;

/// Below this, a ray is treated as parallel to the map plane.
const PARALLEL_EPSILON: f64 = 1e-12;

/// Half-line in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point3<f64>,
    pub direction: Unit<Vector3<f64>>,
}

impl Ray {
    /// `None` when `direction` has no length.
    pub fn new(origin: Point3<f64>, direction: Vector3<f64>) -> Option<Self> {
        Unit::try_new(direction, PARALLEL_EPSILON).map(|direction| Self { origin, direction })
    }

    pub fn at(&self, distance: f64) -> Point3<f64> {
        self.origin + self.direction.into_inner() * distance
    }

    /// Distance to the horizontal plane at height `y`, if ahead of the origin.
    pub fn intersect_plane(&self, y: f64) -> Option<f64> {
        let dy = self.direction.y;
        if dy.abs() < PARALLEL_EPSILON {
            return None;
        }
        let t = (y - self.origin.y) / dy;
        (t >= 0.0).then_some(t)
    }

    /// Distance to an axis-aligned square tile lying on the XZ plane.
    pub fn intersect_tile(&self, center: &Point3<f64>, size: f64) -> Option<f64> {
        let t = self.intersect_plane(center.y)?;
        let hit = self.at(t);
        let half = size / 2.0;
        ((hit.x - center.x).abs() <= half && (hit.z - center.z).abs() <= half).then_some(t)
    }
}

/// A ray hitting a renderable tile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    pub node: NodeId,
    pub distance: f64,
    pub point: Point3<f64>,
}
