use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mapquad::prelude::*;

/// Provider serving solid tiles, failing any coordinate it is told to.
#[derive(Default)]
struct MockProvider {
    fetches: AtomicUsize,
    failing: Mutex<Vec<TileCoord>>,
    delay: Option<Duration>,
}

impl MockProvider {
    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn fail(&self, coord: TileCoord) {
        self.failing.lock().unwrap().push(coord);
    }
}

#[async_trait]
impl TileProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn min_zoom(&self) -> u8 {
        0
    }

    fn max_zoom(&self) -> u8 {
        16
    }

    fn url(&self, coord: TileCoord) -> String {
        format!("mock://{}", coord)
    }

    async fn fetch_tile(&self, coord: TileCoord) -> std::result::Result<TileImage, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(&coord) {
            return Err(FetchError::Http {
                status: 500,
                url: self.url(coord),
            });
        }
        Ok(TileImage::solid(4, 4, [200, 200, 200, 255]))
    }
}

fn planar() -> Footprint {
    Footprint::Planar {
        center_x: 0.0,
        center_z: 0.0,
        size: 1000.0,
    }
}

fn inline_view(provider: Arc<MockProvider>) -> MapView {
    let mut view = MapView::with_spawner(
        provider,
        TileCoord::new(10, 812, 394),
        planar(),
        Arc::new(BlockingSpawner),
    )
    .unwrap();
    view.update();
    view
}

fn visible_children(view: &MapView, id: NodeId) -> usize {
    view.tree()
        .children(id)
        .map(|children| children.iter().filter(|c| c.is_visible()).count())
        .unwrap_or(0)
}

/// End-to-end scenarios on a map whose fetches complete inline
#[cfg(test)]
mod map_view_tests {
    use super::*;

    /// A hit at normalized distance 0.8 causes exactly one subdivision
    #[test]
    fn test_far_hit_subdivides_into_four_loading_children() {
        let provider = Arc::new(MockProvider::default());
        let mut view = inline_view(provider.clone());
        let root = view.root();

        let mut lod = LodRaycast::seeded(5);
        lod.scale_distance = false;
        let hit = Intersection {
            node: root,
            distance: 0.8,
            point: view.node(root).unwrap().geometry().center,
        };

        assert_eq!(
            lod.apply(&mut view, &[hit]),
            Some(LodAction::Subdivide(root, SubdivideOutcome::Created))
        );
        assert_eq!(provider.fetches(), 5);
        assert_eq!(view.tree().len(), 5);

        let children = view.tree().children(root).unwrap();
        assert!(children.iter().all(|c| c.state() == NodeState::Loading));
        assert_eq!(visible_children(&view, root), 0);

        assert_eq!(view.update(), 4);
        assert_eq!(visible_children(&view, root), 4);
        assert!(!view.node(root).unwrap().is_leaf_renderable());
    }

    /// One failing child keeps the parent on screen and its siblings hidden
    #[test]
    fn test_failed_child_blocks_reveal() {
        let provider = Arc::new(MockProvider::default());
        let root_coord = TileCoord::new(10, 812, 394);
        provider.fail(root_coord.child(Quadrant::BottomRight));
        let mut view = inline_view(provider.clone());
        let root = view.root();

        assert_eq!(view.subdivide(root), SubdivideOutcome::Created);
        assert_eq!(view.update(), 4);

        let node = view.node(root).unwrap();
        assert_eq!(node.children_loaded(), 3);
        assert!(node.is_renderable());
        assert_eq!(visible_children(&view, root), 0);

        let failed = view.tree().children(root).unwrap()[3];
        assert_eq!(failed.state(), NodeState::Failed);
        assert_eq!(failed.material(), NodeMaterial::Placeholder);

        // Loaded siblings may not subdivide while the group is incomplete.
        let sibling = view.tree().children(root).unwrap()[0].id();
        assert_eq!(view.subdivide(sibling), SubdivideOutcome::SiblingsLoading);
    }

    /// A failing root is still drawn, with a placeholder
    #[test]
    fn test_failed_root_shows_placeholder() {
        let provider = Arc::new(MockProvider::default());
        provider.fail(TileCoord::new(10, 812, 394));
        let view = inline_view(provider);

        let root = view.node(view.root()).unwrap();
        assert_eq!(root.state(), NodeState::Failed);
        assert!(root.is_renderable());
        assert_eq!(root.material(), NodeMaterial::Placeholder);
    }

    /// Simplify followed by subdivide replays the cache with zero fetches
    #[test]
    fn test_simplify_then_subdivide_issues_no_fetches() {
        let provider = Arc::new(MockProvider::default());
        let mut view = inline_view(provider.clone());
        let root = view.root();
        view.subdivide(root);
        view.update();

        assert!(view.simplify(root));
        assert_eq!(visible_children(&view, root), 0);
        assert!(view.node(root).unwrap().is_renderable());

        let fetches = provider.fetches();
        assert_eq!(view.subdivide(root), SubdivideOutcome::Restored);
        assert_eq!(provider.fetches(), fetches);
        assert_eq!(view.in_flight(), 0);
        assert_eq!(visible_children(&view, root), 4);
    }

    /// Simplifying a leaf and subdividing past max zoom are no-ops
    #[test]
    fn test_invalid_structural_calls_are_no_ops() {
        let provider = Arc::new(MockProvider::default());
        let mut view = MapView::with_spawner(
            provider.clone(),
            TileCoord::new(16, 0, 0),
            planar(),
            Arc::new(BlockingSpawner),
        )
        .unwrap();
        view.update();
        let root = view.root();

        assert!(!view.simplify(root));
        assert_eq!(view.subdivide(root), SubdivideOutcome::MaxZoom);
        assert_eq!(view.subdivide(NodeId(9999)), SubdivideOutcome::UnknownNode);
        assert_eq!(view.tree().len(), 1);
        assert_eq!(provider.fetches(), 1);
    }

    /// Swapping providers refetches every live tile from the new one
    #[test]
    fn test_provider_swap_reloads_from_new_provider() {
        let first = Arc::new(MockProvider::default());
        let mut view = inline_view(first.clone());
        let root = view.root();
        view.subdivide(root);
        view.update();
        let child = view.tree().children(root).unwrap()[1].id();
        view.subdivide(child);
        view.update();
        view.simplify(child);
        assert_eq!(view.stats().cached, 4);

        let second = Arc::new(MockProvider::default());
        assert!(view.set_provider(second.clone()).unwrap());
        assert_eq!(second.fetches(), 5);
        assert_eq!(view.stats().cached, 0);
        assert_eq!(view.node(child).unwrap().children_loaded(), 0);

        // Everything stays drawn while replacements stream in.
        assert_eq!(visible_children(&view, root), 4);
        assert_eq!(view.update(), 5);
        assert_eq!(view.stats().loaded, 5);
    }

    /// Swapping to a provider that cannot serve the root level is refused
    #[test]
    fn test_provider_swap_rejects_out_of_range_root() {
        let mut view = inline_view(Arc::new(MockProvider::default()));
        let osm = OpenStreetMapProvider::default().with_zoom_range(0, 5).unwrap();

        let err = view.set_provider(Arc::new(osm)).unwrap_err();
        assert!(matches!(
            err,
            MapError::Configuration(ConfigurationError::ZoomOutOfRange { zoom: 10, .. })
        ));
        assert_eq!(view.provider().name(), "mock");
    }

    /// The config path builds a working map with the chosen strategy
    #[test]
    fn test_map_from_config_with_radial_strategy() {
        let json = r#"{
            "provider": { "kind": "open_street_map", "max_zoom": 12 },
            "root": {
                "zoom": 10, "x": 812, "y": 394,
                "footprint": { "kind": "planar", "center_x": 0.0, "center_z": 0.0, "size": 1000.0 }
            },
            "lod": { "strategy": "radial" }
        }"#;
        let config = MapConfig::from_json_str(json).unwrap();
        assert_eq!(config.lod.strategy, LodStrategy::Radial);

        assert_eq!(
            config.root.footprint,
            Footprint::Planar {
                center_x: 0.0,
                center_z: 0.0,
                size: 1000.0
            }
        );

        let provider = config.provider.build().unwrap();
        assert_eq!(provider.max_zoom(), 12);
        assert_eq!(
            provider.url(TileCoord::new(10, 812, 394)),
            "https://a.tile.openstreetmap.org/10/812/394.png"
        );

        let mut lod = mapquad::lod::from_config(&config.lod);
        let mut view = inline_view(Arc::new(MockProvider::default()));
        let root = view.root();
        // Planar root of 1000 units, camera 100 above: 100 / 2^(16 - 10) is
        // well inside the subdivide radius.
        let mut camera = Camera::new(
            nalgebra::Point3::new(0.0, 100.0, 1.0),
            nalgebra::Point3::origin(),
            60.0,
            1.0,
        );
        camera.set_clip_planes(0.1, 1.0e5);
        assert_eq!(
            view.update_lod(lod.as_mut(), &camera),
            Some(LodAction::Subdivide(root, SubdivideOutcome::Created))
        );
    }
}

/// Fetches running concurrently on Tokio, completing in any order
#[cfg(test)]
mod async_loading_tests {
    use super::*;

    async fn drain(view: &mut MapView) {
        for _ in 0..200 {
            view.update();
            if view.stats().loading == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("tiles never finished loading: {:?}", view.stats());
    }

    #[tokio::test]
    async fn test_tokio_fetches_reveal_children_together() {
        let provider = Arc::new(MockProvider {
            delay: Some(Duration::from_millis(10)),
            ..MockProvider::default()
        });
        let spawner = TokioSpawner::current().unwrap();
        let mut view = MapView::with_spawner(
            provider.clone(),
            TileCoord::new(10, 812, 394),
            planar(),
            Arc::new(spawner),
        )
        .unwrap();
        drain(&mut view).await;
        assert!(view.node(view.root()).unwrap().is_visible());

        let root = view.root();
        view.subdivide(root);
        assert_eq!(view.in_flight(), 4);
        assert_eq!(visible_children(&view, root), 0);

        drain(&mut view).await;
        assert_eq!(visible_children(&view, root), 4);
        assert_eq!(view.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_simplified_then_cleared_children_are_cancelled() {
        let provider = Arc::new(MockProvider {
            delay: Some(Duration::from_millis(50)),
            ..MockProvider::default()
        });
        let mut view = MapView::with_spawner(
            provider.clone(),
            TileCoord::new(10, 812, 394),
            planar(),
            Arc::new(TokioSpawner::current().unwrap()),
        )
        .unwrap();
        drain(&mut view).await;

        let root = view.root();
        view.subdivide(root);
        view.simplify(root);
        // Dropping the cache destroys the loading children and aborts them.
        view.clear();
        assert_eq!(view.in_flight(), 1);
        assert_eq!(view.tree().len(), 1);

        drain(&mut view).await;
        assert_eq!(view.stats().loaded, 1);
        assert!(view.node(root).unwrap().is_renderable());
    }
}

/// Default constructors used from plain threads with no runtime of their own
#[cfg(test)]
mod background_runtime_tests {
    use super::*;

    /// Tiles load on the library's runtime while the caller keeps polling
    #[test]
    fn test_default_constructor_loads_outside_tokio() {
        let provider = Arc::new(MockProvider {
            delay: Some(Duration::from_millis(20)),
            ..MockProvider::default()
        });
        let mut view =
            MapView::new(provider.clone(), TileCoord::new(10, 812, 394), planar()).unwrap();

        // The fetch was handed off rather than run here.
        assert_eq!(view.in_flight(), 1);
        assert_eq!(view.node(view.root()).unwrap().state(), NodeState::Loading);

        for _ in 0..500 {
            view.update();
            if view.stats().loading == 0 {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(view.stats().loaded, 1);
        assert!(view.node(view.root()).unwrap().is_visible());
    }

    /// The stock config builds without a caller runtime and without blocking
    #[test]
    fn test_default_config_builds_outside_tokio() {
        let view = MapView::from_config(&MapConfig::default()).unwrap();
        assert_eq!(view.tree().len(), 1);
        assert_eq!(view.root_coord(), Some(TileCoord::new(10, 812, 394)));
    }
}
