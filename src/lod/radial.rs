use super::{LodAction, LodControl};
use crate::core::config::LodConfig;
use crate::core::constants::{DEFAULT_SIMPLIFY_DISTANCE, DEFAULT_SUBDIVIDE_DISTANCE};
use crate::core::map::MapView;
use crate::rendering::camera::Camera;

/// Distance-from-camera strategy.
///
/// The eye distance to each drawn tile is divided by `2^(max_zoom - level)`
/// so deeper tiles must be proportionally closer before they split again.
#[derive(Debug, Clone, PartialEq)]
pub struct LodRadial {
    /// Subdivide tiles closer than this
    pub subdivide_distance: f64,
    /// Simplify the parent of tiles farther than this
    pub simplify_distance: f64,
}

impl LodRadial {
    pub fn new(subdivide_distance: f64, simplify_distance: f64) -> Self {
        Self {
            subdivide_distance,
            simplify_distance,
        }
    }

    pub fn from_config(config: &LodConfig) -> Self {
        Self::new(config.subdivide_distance, config.simplify_distance)
    }

    pub fn scaled_distance(&self, raw: f64, level: u8, max_zoom: u8) -> f64 {
        let depth = i32::from(max_zoom) - i32::from(level);
        raw / 2f64.powi(depth)
    }
}

impl Default for LodRadial {
    fn default() -> Self {
        Self::new(DEFAULT_SUBDIVIDE_DISTANCE, DEFAULT_SIMPLIFY_DISTANCE)
    }
}

impl LodControl for LodRadial {
    fn update_lod(&mut self, view: &mut MapView, camera: &Camera) -> Option<LodAction> {
        let max_zoom = view.provider().max_zoom();

        for id in view.tree().renderable_nodes() {
            let Some(node) = view.node(id) else {
                continue;
            };
            let distance = self.scaled_distance(
                camera.distance_to(&node.geometry().center),
                node.level(),
                max_zoom,
            );
            let level = node.level();
            let parent = node.parent();

            let action = if distance < self.subdivide_distance {
                if level >= max_zoom {
                    continue;
                }
                LodAction::Subdivide(id, view.subdivide(id))
            } else if distance > self.simplify_distance {
                let Some(parent) = parent else {
                    continue;
                };
                LodAction::Simplify(parent, view.simplify(parent))
            } else {
                continue;
            };
            log::debug!("lod radial: {:?}", action);
            return Some(action);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lod::fixtures::{overhead, planar_view};
    use crate::tree::SubdivideOutcome;

    #[test]
    fn test_scaled_distance_halves_per_level() {
        let lod = LodRadial::default();
        assert_eq!(lod.scaled_distance(800.0, 10, 12), 200.0);
        assert_eq!(lod.scaled_distance(800.0, 11, 12), 400.0);
        assert_eq!(lod.scaled_distance(800.0, 12, 12), 800.0);
    }

    #[test]
    fn test_close_camera_subdivides_root() {
        let mut view = planar_view();
        let root = view.root();
        let mut lod = LodRadial::default();

        // 100 / 2^(12 - 10) = 25, inside the subdivide radius
        let action = view.update_lod(&mut lod, &overhead(100.0, 60.0));
        assert_eq!(
            action,
            Some(LodAction::Subdivide(root, SubdivideOutcome::Created))
        );
        assert!(view.node(root).unwrap().is_subdivided());
    }

    #[test]
    fn test_mid_range_camera_leaves_tree_alone() {
        let mut view = planar_view();
        let mut lod = LodRadial::default();
        // 800 / 4 = 200
        assert_eq!(view.update_lod(&mut lod, &overhead(800.0, 60.0)), None);
        assert_eq!(view.tree().len(), 1);
    }

    #[test]
    fn test_distant_camera_simplifies() {
        let mut view = planar_view();
        let root = view.root();
        view.subdivide(root);
        view.update();

        let mut lod = LodRadial::default();
        let action = view.update_lod(&mut lod, &overhead(2_000.0, 60.0));
        assert_eq!(action, Some(LodAction::Simplify(root, true)));
        assert!(view.tree().children(root).is_none());
    }
}
