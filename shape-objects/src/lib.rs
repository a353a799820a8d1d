//! The explorer scene: nine spawnable shapes, each carrying a sound
//! component, a height-driven variant switch and a spin loop.
pub mod config;
pub mod entity;
pub mod error;
pub mod explorer;
pub mod height_switch;
pub mod shape;
pub mod simulation;

#[cfg(test)]
mod test_support;

pub use config::ExplorerConfig;
pub use entity::{Pose, ShapeEntity};
pub use error::ShapeError;
pub use explorer::SoundExplorer;
pub use height_switch::VariantHeightSwitch;
pub use shape::{BehaviorSettings, ShapeObject, rotation_weights, spin};
pub use simulation::{SimulationControl, SimulationLoop};
