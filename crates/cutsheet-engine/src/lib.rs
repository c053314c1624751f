//! Contact-sheet engine: remote generation, grid tiling and archive assembly.

pub mod archive;
pub mod config;
pub mod fal;
pub mod remote;
pub mod selection;
pub mod session;
pub mod tiler;

#[cfg(test)]
mod testing;

pub use archive::{assemble, ArchiveBundle, ArchiveEntrySummary, UpscaleOutcome};
pub use config::{ClientConfig, UploadMode};
pub use fal::FalClient;
pub use remote::RemoteImageService;
pub use selection::Selection;
pub use session::{QualityMode, SessionContext, SourceImage};
pub use tiler::{tile, Tile, TileBounds, TileSet};
