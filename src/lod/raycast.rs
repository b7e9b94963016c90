use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{LodAction, LodControl};
use crate::core::config::LodConfig;
use crate::core::constants::{
    DEFAULT_SUBDIVISION_RAYS, DEFAULT_THRESHOLD_DOWN, DEFAULT_THRESHOLD_UP, SCALE_DISTANCE_FACTOR,
};
use crate::core::map::MapView;
use crate::rendering::{camera::Camera, ray::Intersection};

/// Screen-space sampling strategy.
///
/// Each frame a few rays are shot through random points of the viewport.
/// The nearest tile whose weighted hit distance leaves the
/// `[threshold_down, threshold_up]` band is subdivided (distance above the
/// band) or has its parent simplified (below it).
#[derive(Debug, Clone)]
pub struct LodRaycast {
    pub subdivision_rays: u32,
    pub threshold_up: f64,
    pub threshold_down: f64,
    /// Raise the distance to the tile's level: `(d * 2) ^ level`
    pub power_distance: bool,
    /// Normalize by tile size: `1.3 * scale / d`
    pub scale_distance: bool,
    rng: StdRng,
}

impl LodRaycast {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Reproducible ray sampling.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            subdivision_rays: DEFAULT_SUBDIVISION_RAYS,
            threshold_up: DEFAULT_THRESHOLD_UP,
            threshold_down: DEFAULT_THRESHOLD_DOWN,
            power_distance: false,
            scale_distance: true,
            rng,
        }
    }

    pub fn from_config(config: &LodConfig) -> Self {
        let mut lod = match config.seed {
            Some(seed) => Self::seeded(seed),
            None => Self::new(),
        };
        lod.subdivision_rays = config.subdivision_rays;
        lod.threshold_up = config.threshold_up;
        lod.threshold_down = config.threshold_down;
        lod.power_distance = config.power_distance;
        lod.scale_distance = config.scale_distance;
        lod
    }

    /// Casts `subdivision_rays` rays through random viewport points and
    /// returns every renderable tile they hit, nearest first.
    pub fn sample(&mut self, view: &MapView, camera: &Camera) -> Vec<Intersection> {
        let mut hits = Vec::new();
        for _ in 0..self.subdivision_rays {
            let x = self.rng.gen_range(-1.0..=1.0);
            let y = self.rng.gen_range(-1.0..=1.0);
            if let Some(ray) = camera.ray_from_ndc(x, y) {
                hits.extend(view.tree().raycast(&ray));
            }
        }
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }

    /// Raw hit distance adjusted by the enabled weightings.
    pub fn weighted_distance(&self, distance: f64, level: u8, world_scale: f64) -> f64 {
        let mut distance = distance;
        if self.power_distance {
            distance = (distance * 2.0).powi(i32::from(level));
        }
        if self.scale_distance {
            distance = SCALE_DISTANCE_FACTOR * world_scale / distance;
        }
        distance
    }

    /// Walks `hits` in order and attempts the first structural change one of
    /// them calls for. The attempt ends the frame even when a guard turns it
    /// into a no-op.
    pub fn apply(&self, view: &mut MapView, hits: &[Intersection]) -> Option<LodAction> {
        for hit in hits {
            let Some(node) = view.node(hit.node) else {
                continue;
            };
            let distance =
                self.weighted_distance(hit.distance, node.level(), node.geometry().world_scale());
            let coordinate = node.coordinate();
            let parent = node.parent();

            if distance > self.threshold_up {
                let outcome = view.subdivide(hit.node);
                log::debug!(
                    "lod: subdivide {} at {:.3} -> {:?}",
                    coordinate,
                    distance,
                    outcome
                );
                return Some(LodAction::Subdivide(hit.node, outcome));
            }
            if distance < self.threshold_down {
                if let Some(parent) = parent {
                    let simplified = view.simplify(parent);
                    log::debug!(
                        "lod: simplify parent of {} at {:.3} -> {}",
                        coordinate,
                        distance,
                        simplified
                    );
                    return Some(LodAction::Simplify(parent, simplified));
                }
            }
        }
        None
    }
}

impl Default for LodRaycast {
    fn default() -> Self {
        Self::new()
    }
}

impl LodControl for LodRaycast {
    fn update_lod(&mut self, view: &mut MapView, camera: &Camera) -> Option<LodAction> {
        let hits = self.sample(view, camera);
        self.apply(view, &hits)
    }
}
