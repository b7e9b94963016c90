use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use fxhash::FxHashMap;
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;

use super::source::TileProvider;
use super::texture::TileImage;
use crate::core::geo::TileCoord;
use crate::runtime::{self, AsyncHandle, AsyncSpawner, CancellationToken};
use crate::tree::NodeId;
use crate::FetchError;

/// Per-request timeout for tile downloads
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared async HTTP client with a custom User-Agent so that public tile
/// servers (e.g. OpenStreetMap) don't reject the request. Building the client
/// once avoids the cost of TLS and connection pool setup for every tile.
pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent("mapquad/0.1.0")
        .tcp_keepalive(Duration::from_secs(30))
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(16)
        .build()
        .expect("failed to build reqwest async client")
});

/// Drops the query string so access tokens never reach logs or errors.
fn redact(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

async fn download_bytes(url: &str) -> Result<Vec<u8>, FetchError> {
    let response = HTTP_CLIENT
        .get(url)
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await
        .map_err(|e| FetchError::Network(e.without_url().to_string()))?;

    if !response.status().is_success() {
        return Err(FetchError::Http {
            status: response.status().as_u16(),
            url: redact(url).to_string(),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| FetchError::Network(e.without_url().to_string()))?;
    Ok(bytes.to_vec())
}

/// Download and decode a raster tile.
pub(crate) async fn download_image(url: &str) -> Result<TileImage, FetchError> {
    let bytes = download_bytes(url).await?;
    log::debug!("downloaded {} ({} bytes)", redact(url), bytes.len());
    TileImage::decode(&bytes)
}

/// Download a JSON document such as TileJSON metadata.
pub(crate) async fn download_json<T: DeserializeOwned>(url: &str) -> Result<T, FetchError> {
    let bytes = download_bytes(url).await?;
    serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))
}

/// Identifies one outstanding fetch. A node accepts a completion only if it
/// carries the ticket the node is still waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FetchTicket(pub u64);

/// A node asking for its imagery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    pub node: NodeId,
    pub coord: TileCoord,
    pub ticket: FetchTicket,
}

/// Result of a tile loading operation
#[derive(Debug)]
pub struct TileResult {
    pub request: FetchRequest,
    pub data: Result<TileImage, FetchError>,
}

struct InFlight {
    handle: Box<dyn AsyncHandle>,
    token: CancellationToken,
}

/// Spawns one task per fetch and hands completions back to the update
/// thread over a channel. No concurrency cap and no retries.
pub struct TileLoader {
    spawner: Arc<dyn AsyncSpawner>,
    result_tx: Sender<TileResult>,
    result_rx: Receiver<TileResult>,
    in_flight: FxHashMap<FetchTicket, InFlight>,
}

impl TileLoader {
    pub fn new(spawner: Arc<dyn AsyncSpawner>) -> Self {
        let (result_tx, result_rx) = unbounded();
        Self {
            spawner,
            result_tx,
            result_rx,
            in_flight: FxHashMap::default(),
        }
    }

    /// Start fetching `request.coord` from `provider`.
    pub fn dispatch(&mut self, provider: &Arc<dyn TileProvider>, request: FetchRequest) {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let result_tx = self.result_tx.clone();
        let provider = Arc::clone(provider);

        log::debug!(
            "fetch tile {} from {} (ticket {})",
            request.coord,
            provider.name(),
            request.ticket.0
        );

        let handle = runtime::spawn(self.spawner.as_ref(), async move {
            let data = provider.fetch_tile(request.coord).await;
            if task_token.is_cancelled() {
                return;
            }
            // The receiver lives as long as the loader; a send error means
            // the map was torn down and the result is moot.
            let _ = result_tx.send(TileResult { request, data });
        });

        if !handle.is_finished() {
            self.in_flight.insert(request.ticket, InFlight { handle, token });
        }
    }

    /// Abort a fetch whose node was destroyed or superseded.
    pub fn cancel(&mut self, ticket: FetchTicket) {
        if let Some(in_flight) = self.in_flight.remove(&ticket) {
            in_flight.token.cancel();
            in_flight.handle.cancel();
            log::debug!("cancelled fetch ticket {}", ticket.0);
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, in_flight) in self.in_flight.drain() {
            in_flight.token.cancel();
            in_flight.handle.cancel();
        }
    }

    /// Try to receive completed tile results (non-blocking)
    pub fn try_recv_results(&mut self) -> Vec<TileResult> {
        let mut results = Vec::new();
        while let Ok(result) = self.result_rx.try_recv() {
            self.in_flight.remove(&result.request.ticket);
            results.push(result);
        }
        results
    }

    /// Check if there are any pending results without consuming them
    pub fn has_pending_results(&self) -> bool {
        !self.result_rx.is_empty()
    }

    /// Number of spawned fetches that have not reported back.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

impl Drop for TileLoader {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::BlockingSpawner;
    use async_trait::async_trait;

    struct Synthetic;

    #[async_trait]
    impl TileProvider for Synthetic {
        fn name(&self) -> &str {
            "synthetic"
        }
        fn min_zoom(&self) -> u8 {
            0
        }
        fn max_zoom(&self) -> u8 {
            20
        }
        fn url(&self, coord: TileCoord) -> String {
            format!("synthetic://{}", coord)
        }
        async fn fetch_tile(&self, coord: TileCoord) -> Result<TileImage, FetchError> {
            if coord.x == 0 {
                Err(FetchError::Network("unreachable".to_string()))
            } else {
                Ok(TileImage::solid(1, 1, [coord.level, 0, 0, 255]))
            }
        }
    }

    fn request(x: u32, ticket: u64) -> FetchRequest {
        FetchRequest {
            node: NodeId(ticket),
            coord: TileCoord::new(3, x, 1),
            ticket: FetchTicket(ticket),
        }
    }

    #[test]
    fn test_results_are_delivered_over_channel() {
        let provider: Arc<dyn TileProvider> = Arc::new(Synthetic);
        let mut loader = TileLoader::new(Arc::new(BlockingSpawner));

        loader.dispatch(&provider, request(1, 1));
        loader.dispatch(&provider, request(0, 2));
        assert!(loader.has_pending_results());

        let results = loader.try_recv_results();
        assert_eq!(results.len(), 2);
        assert!(results[0].data.is_ok());
        assert_eq!(
            results[1].data,
            Err(FetchError::Network("unreachable".to_string()))
        );
        assert_eq!(loader.in_flight_count(), 0);
        assert!(loader.try_recv_results().is_empty());
    }

    #[test]
    fn test_redact_strips_query() {
        assert_eq!(
            redact("https://api.mapbox.com/x/1/2/3?access_token=secret"),
            "https://api.mapbox.com/x/1/2/3"
        );
        assert_eq!(redact("https://a/1/2/3.png"), "https://a/1/2/3.png");
    }
}
