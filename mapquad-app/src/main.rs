use std::time::Duration;

use anyhow::Context;
use mapquad::{lod, prelude::*};
use nalgebra::Vector3;

const FRAME_INTERVAL: Duration = Duration::from_millis(16);
const DEFAULT_FRAMES: u32 = 600;

/// Headless fly-through: descends towards the root tile and reports how the
/// tree refines as tiles stream in.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => MapConfig::from_file(&path)
            .with_context(|| format!("failed to load config from {}", path))?,
        None => MapConfig::default(),
    };
    let frames = match args.next() {
        Some(frames) => frames
            .parse::<u32>()
            .with_context(|| format!("invalid frame count {}", frames))?,
        None => DEFAULT_FRAMES,
    };

    let mut view = MapView::from_config(&config).context("failed to build map")?;
    let mut lod = lod::from_config(&config.lod);

    let root = view
        .node(view.root())
        .map(|node| *node.geometry())
        .context("map has no root")?;
    let start_height = root.size * 2.0;
    let end_height = root.size / 200.0;
    let mut camera = Camera::new(
        root.center + Vector3::new(0.0, start_height, root.size / 4.0),
        root.center,
        60.0,
        16.0 / 9.0,
    );
    camera.set_clip_planes(end_height / 10.0, start_height * 10.0);

    log::info!(
        "flying over {} for {} frames with {}",
        view.root_coord().map(|c| c.to_string()).unwrap_or_default(),
        frames,
        view.provider().name()
    );

    let mut interval = tokio::time::interval(FRAME_INTERVAL);
    for frame in 0..frames {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                log::info!("interrupted at frame {}", frame);
                break;
            }
        }

        // Exponential descent so every level gets comparable screen time.
        let t = f64::from(frame) / f64::from(frames.max(1));
        let height = start_height * (end_height / start_height).powf(t);
        camera.set_position(root.center + Vector3::new(0.0, height, height / 8.0));

        match view.update_lod(lod.as_mut(), &camera) {
            Some(action) if action.changed_tree() => {
                log::debug!("frame {}: {:?}", frame, action)
            }
            Some(action) => log::trace!("frame {}: held back, {:?}", frame, action),
            None => {}
        }

        if frame % 60 == 0 {
            let stats = view.stats();
            log::info!(
                "frame {:4} height {:>12.1} live {:3} cached {:3} loading {:3} failed {:2} deepest z{}",
                frame,
                height,
                stats.live,
                stats.cached,
                stats.loading,
                stats.failed,
                stats.deepest_level
            );
        }
    }

    let stats = view.stats();
    log::info!(
        "done: {} live tiles, {} renderable, deepest z{}, {} fetches still in flight",
        stats.live,
        stats.renderable,
        stats.deepest_level,
        view.in_flight()
    );
    Ok(())
}
