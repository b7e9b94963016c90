use mapquad::tiles::{FetchRequest, TileResult};
use mapquad::tree::NodeGeometry;
use mapquad::{FetchError, NodeId, QuadTree, Quadrant, TileCoord, TileImage};
use nalgebra::Point3;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Structural properties of the tree under long random operation sequences
#[cfg(test)]
mod quadtree_tests {
    use super::*;

    const ROOT: TileCoord = TileCoord {
        level: 10,
        x: 812,
        y: 394,
    };
    const MAX_ZOOM: u8 = 14;

    fn tree() -> QuadTree {
        QuadTree::new(ROOT, NodeGeometry::new(Point3::origin(), 1024.0))
    }

    fn complete(tree: &mut QuadTree, request: FetchRequest, ok: bool) {
        let data = if ok {
            Ok(TileImage::solid(1, 1, [0, 0, 255, 255]))
        } else {
            Err(FetchError::Network("connection reset".to_string()))
        };
        tree.apply_result(TileResult { request, data });
    }

    /// Children are complete, correctly indexed, and revealed all-or-nothing.
    /// No drawn tile has a drawn ancestor.
    fn check_invariants(tree: &QuadTree) {
        for id in tree.live_nodes() {
            let node = tree.get(id).unwrap();
            assert!(node.level() >= ROOT.level);

            if node.children().is_some() {
                let children = tree.children(id).expect("live children resolve");
                assert!(node.is_subdivided());
                assert!(node.children_cache().is_none());

                for (quadrant, child) in Quadrant::ALL.iter().zip(children.iter()) {
                    assert_eq!(child.level(), node.level() + 1);
                    assert_eq!(child.coordinate(), node.coordinate().child(*quadrant));
                    let (dx, dy) = quadrant.offset();
                    assert_eq!(child.coordinate().x, node.coordinate().x * 2 + dx);
                    assert_eq!(child.coordinate().y, node.coordinate().y * 2 + dy);
                    assert_eq!(child.parent(), Some(id));
                }

                let visible = children.iter().filter(|c| c.is_visible()).count();
                assert!(
                    visible == 0 || visible == 4,
                    "{} of 4 children of {} visible",
                    visible,
                    node.coordinate()
                );
            } else {
                assert!(!node.is_subdivided());
            }

            if node.is_renderable() {
                let mut ancestor = node.parent();
                while let Some(parent) = ancestor {
                    let parent = tree.get(parent).unwrap();
                    assert!(
                        !parent.is_renderable(),
                        "{} drawn under drawn {}",
                        node.coordinate(),
                        parent.coordinate()
                    );
                    ancestor = parent.parent();
                }
            }
        }
    }

    /// Random subdivide/simplify/complete/reload sequences keep every invariant
    #[test]
    fn test_random_operations_preserve_invariants() {
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut tree = tree();
            let mut pending: Vec<FetchRequest> = tree.take_requests();

            for _ in 0..400 {
                let live = tree.live_nodes();
                match rng.gen_range(0..100) {
                    0..=29 => {
                        let id = *live.choose(&mut rng).unwrap();
                        tree.subdivide(id, MAX_ZOOM);
                    }
                    30..=44 => {
                        let id = *live.choose(&mut rng).unwrap();
                        tree.simplify(id);
                    }
                    45..=97 => {
                        if !pending.is_empty() {
                            let index = rng.gen_range(0..pending.len());
                            let request = pending.swap_remove(index);
                            complete(&mut tree, request, rng.gen_bool(0.9));
                        }
                    }
                    _ => {
                        tree.reload();
                    }
                }
                pending.extend(tree.take_requests());
                tree.take_cancelled();
                check_invariants(&tree);
            }
        }
    }

    /// Siblings never show up one at a time, whatever order they finish in
    #[test]
    fn test_reveal_is_atomic_for_every_completion_order() {
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..50 {
            let mut tree = tree();
            let root = tree.root();
            for request in tree.take_requests() {
                complete(&mut tree, request, true);
            }
            tree.subdivide(root, MAX_ZOOM);

            let mut requests = tree.take_requests();
            requests.shuffle(&mut rng);
            for (done, request) in requests.into_iter().enumerate() {
                let visible = tree
                    .children(root)
                    .unwrap()
                    .iter()
                    .filter(|c| c.is_visible())
                    .count();
                assert_eq!(visible, 0, "revealed after {} completions", done);
                assert!(tree.get(root).unwrap().is_renderable());
                complete(&mut tree, request, true);
            }

            assert!(tree.children(root).unwrap().iter().all(|c| c.is_visible()));
            assert!(!tree.get(root).unwrap().is_renderable());
        }
    }

    /// Re-subdividing from the cache restores the same nodes without fetching
    #[test]
    fn test_cached_children_are_reused() {
        let mut tree = tree();
        let root = tree.root();
        for request in tree.take_requests() {
            complete(&mut tree, request, true);
        }
        tree.subdivide(root, MAX_ZOOM);
        for request in tree.take_requests() {
            complete(&mut tree, request, true);
        }
        let before: Vec<NodeId> = tree.get(root).unwrap().children().unwrap().to_vec();

        assert!(tree.simplify(root));
        assert!(tree.get(root).unwrap().is_renderable());
        assert!(tree.subdivide(root, MAX_ZOOM).changed_tree());

        assert!(tree.take_requests().is_empty());
        let after: Vec<NodeId> = tree.get(root).unwrap().children().unwrap().to_vec();
        assert_eq!(before, after);
        assert!(tree.children(root).unwrap().iter().all(|c| c.is_visible()));
    }
}
