//! Runtime abstraction layer for async operations
//!
//! Tile fetches are the only suspending work in the engine. They are handed
//! to an [`AsyncSpawner`]: Tokio by default, or an inline executor that
//! callers opt into for synthetic providers and tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::ConfigurationError;

/// Boxed future accepted by [`AsyncSpawner::spawn_boxed`].
pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A trait for spawning async tasks (object-safe version)
pub trait AsyncSpawner: Send + Sync + 'static {
    /// Spawn a future and return a handle to it
    fn spawn_boxed(&self, future: BoxFuture) -> Box<dyn AsyncHandle>;
}

/// Handle to a spawned async task
pub trait AsyncHandle: Send + Sync {
    /// Check if the task is finished
    fn is_finished(&self) -> bool;

    /// Cancel the task
    fn cancel(&self);
}

/// Spawn with a concrete future type.
pub fn spawn<F>(spawner: &dyn AsyncSpawner, future: F) -> Box<dyn AsyncHandle>
where
    F: Future<Output = ()> + Send + 'static,
{
    spawner.spawn_boxed(Box::pin(future))
}

/// Runs each future to completion on the calling thread.
///
/// Never chosen by [`default_spawner`]. Pass it explicitly for providers
/// that never touch a reactor, such as synthetic tiles in tests.
/// Network-backed providers need `TokioSpawner`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockingSpawner;

impl AsyncSpawner for BlockingSpawner {
    fn spawn_boxed(&self, future: BoxFuture) -> Box<dyn AsyncHandle> {
        futures::executor::block_on(future);
        Box::new(FinishedHandle)
    }
}

struct FinishedHandle;

impl AsyncHandle for FinishedHandle {
    fn is_finished(&self) -> bool {
        true
    }

    fn cancel(&self) {}
}

#[cfg(feature = "tokio-runtime")]
pub use tokio_impl::TokioSpawner;

#[cfg(feature = "tokio-runtime")]
mod tokio_impl {
    use super::*;
    use ::tokio::runtime::{Builder, Handle, Runtime};
    use ::tokio::task::JoinHandle;
    use once_cell::sync::Lazy;

    const BACKGROUND_WORKERS: usize = 2;

    /// Runtime owned by the library for hosts that do not run Tokio
    /// themselves. Built on first use and kept for the life of the process.
    static BACKGROUND: Lazy<Result<Runtime, String>> = Lazy::new(|| {
        log::debug!("starting background runtime for tile fetches");
        Builder::new_multi_thread()
            .worker_threads(BACKGROUND_WORKERS)
            .thread_name("mapquad-fetch")
            .enable_all()
            .build()
            .map_err(|e| e.to_string())
    });

    /// Tokio-based async spawner
    #[derive(Debug, Clone)]
    pub struct TokioSpawner {
        handle: Handle,
    }

    impl TokioSpawner {
        pub fn new(handle: Handle) -> Self {
            Self { handle }
        }

        /// Spawner bound to the runtime the caller is running in, if any.
        pub fn current() -> Option<Self> {
            Handle::try_current().ok().map(Self::new)
        }

        /// Spawner on the library's own background runtime.
        pub fn background() -> Result<Self, ConfigurationError> {
            match &*BACKGROUND {
                Ok(runtime) => Ok(Self::new(runtime.handle().clone())),
                Err(e) => Err(ConfigurationError::NoRuntime(e.clone())),
            }
        }
    }

    impl AsyncSpawner for TokioSpawner {
        fn spawn_boxed(&self, future: BoxFuture) -> Box<dyn AsyncHandle> {
            Box::new(TokioHandle(self.handle.spawn(future)))
        }
    }

    struct TokioHandle(JoinHandle<()>);

    impl AsyncHandle for TokioHandle {
        fn is_finished(&self) -> bool {
            self.0.is_finished()
        }

        fn cancel(&self) {
            self.0.abort();
        }
    }
}

/// The runtime the caller is in when it is Tokio, the library's background
/// Tokio runtime otherwise. Fetches never run on the calling thread.
#[cfg(feature = "tokio-runtime")]
pub fn default_spawner() -> Result<Arc<dyn AsyncSpawner>, ConfigurationError> {
    if let Some(spawner) = TokioSpawner::current() {
        return Ok(Arc::new(spawner));
    }
    Ok(Arc::new(TokioSpawner::background()?))
}

/// Without Tokio there is nothing to run fetches on; callers must supply a
/// spawner of their own.
#[cfg(not(feature = "tokio-runtime"))]
pub fn default_spawner() -> Result<Arc<dyn AsyncSpawner>, ConfigurationError> {
    Err(ConfigurationError::NoRuntime(
        "built without the tokio-runtime feature".to_string(),
    ))
}

/// Cooperative cancellation flag shared between a fetch task and its owner.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_blocking_spawner_runs_inline() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let handle = spawn(&BlockingSpawner, async move {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert!(handle.is_finished());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancellation_token_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[cfg(feature = "tokio-runtime")]
    #[::tokio::test]
    async fn test_tokio_spawner() {
        let spawner = TokioSpawner::current().expect("inside tokio test");
        let handle = spawn(&spawner, async {
            ::tokio::time::sleep(::tokio::time::Duration::from_millis(10)).await;
        });

        // Should not be finished immediately
        assert!(!handle.is_finished());

        ::tokio::time::sleep(::tokio::time::Duration::from_millis(50)).await;
        assert!(handle.is_finished());
    }

    #[cfg(feature = "tokio-runtime")]
    #[test]
    fn test_default_spawner_outside_tokio_does_not_block() {
        let spawner = default_spawner().unwrap();
        let (tx, rx) = crossbeam_channel::bounded(1);
        let handle = spawn(spawner.as_ref(), async move {
            ::tokio::time::sleep(::tokio::time::Duration::from_millis(20)).await;
            let _ = tx.send(());
        });

        // The sleep needs a timer driver, and it ran off this thread.
        assert!(!handle.is_finished());
        assert!(rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .is_ok());
    }
}
