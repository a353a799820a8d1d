//! Bundled resources for the explorer: loop samples, shape models, and the
//! catalog that ties the two together.
pub mod asset_manager;
pub mod catalog;
pub mod loader;
pub mod util;
pub mod wav;

pub use asset_manager::{AssetManager, MemoryResources, ResourceSource};
pub use catalog::ShapeModel;
pub use loader::{CachedModelRepository, GlbFileLoader, encode_glb, parse_glb, Model, ModelLoader, ModelRepository};
pub use util::AssetError;
pub use wav::{WavClip, WavFormat, encode_wav, parse_wav};
