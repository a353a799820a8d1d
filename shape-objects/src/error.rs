use sound_assets::{AssetError, ShapeModel};
use sound_system::CompositionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShapeError {
    #[error("failed to load model for {model}: {source}")]
    ModelLoad {
        model: ShapeModel,
        #[source]
        source: AssetError,
    },
    #[error("{0} is not initialized")]
    NotInitialized(ShapeModel),
    #[error(transparent)]
    Composition(#[from] CompositionError),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error("could not start simulation thread: {0}")]
    Thread(#[source] std::io::Error),
    #[error("config error: {0}")]
    Config(String),
}
