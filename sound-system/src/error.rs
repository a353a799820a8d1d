use thiserror::Error;

use sound_assets::AssetError;

use crate::component::SoundVariant;
use crate::composition::ComponentId;
use crate::track::TrackId;

/// Failures reported by a [`TrackHost`](crate::TrackHost) or one of its tracks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackError {
    #[error("unsupported track format: {0}")]
    Format(String),
    #[error("track construction failed: {0}")]
    Construction(String),
    #[error("PCM write failed: {0}")]
    Write(String),
    #[error("invalid loop points: {0}")]
    LoopPoints(String),
    #[error("track already released")]
    Released,
}

#[derive(Error, Debug)]
pub enum SoundError {
    #[error("asset error: {0}")]
    Asset(#[from] AssetError),
    #[error("track error: {0}")]
    Track(#[from] TrackError),
    #[error("no track with index {0}")]
    UnknownTrack(TrackId),
    #[error("tracks already started; no more tracks can be loaded")]
    AlreadyStarted,
    #[error("sound manager is closed")]
    Closed,
}

#[derive(Error, Debug)]
pub enum CompositionError {
    /// Membership is fixed once playback has started. Treat as a programming
    /// error.
    #[error("composition membership is frozen once playback has started")]
    MembershipFrozen,
    #[error("component {0} has been detached")]
    Detached(ComponentId),
    #[error("component {0} is not attached")]
    NotAttached(ComponentId),
    #[error("unknown component {0}")]
    UnknownComponent(ComponentId),
    #[error("component {0} sounds are already loaded")]
    AlreadyLoaded(ComponentId),
    #[error("component has no {0:?} variant")]
    MissingVariant(SoundVariant),
    #[error(transparent)]
    Sound(#[from] SoundError),
}
