//! Synchronized multi-track playback.
//!
//! [`SoundManager`] owns the tracks, [`SoundComposition`] decides their
//! volumes, and each shape holds a [`SoundComponent`]. Tracks come from a
//! [`TrackHost`]; [`Mixer`] is the software host that feeds an audio backend.

pub mod component;
pub mod composition;
pub mod error;
pub mod manager;
pub mod mixer;
pub mod spatialiser;
pub mod track;

#[cfg(any(test, feature = "mock-host"))]
pub mod recording;

pub use component::{ComponentStatus, PropertyListener, SoundComponent, SoundVariant, VariantResources};
pub use composition::{ComponentId, CompositionState, SoundComposition};
pub use error::{CompositionError, SoundError, TrackError};
pub use manager::SoundManager;
pub use mixer::{render_fn_for_mixer, Mixer, MixerTrack, RenderClosure};
pub use spatialiser::Spatialiser;
pub use track::{LoopCount, PlayState, PointSource, SpatialTrack, TrackHost, TrackId, TrackSpec};

#[cfg(any(test, feature = "mock-host"))]
pub use recording::{RecordingHost, RecordingTrack};
