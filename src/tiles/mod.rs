pub mod loader;
pub mod source;
pub mod texture;

// Re-exports for convenience
pub use loader::{FetchRequest, FetchTicket, TileLoader, TileResult};
pub use source::{MapBoxMode, MapBoxProvider, OpenStreetMapProvider, ProviderMetadata, TileProvider};
pub use texture::{TextureHandle, TileImage};
