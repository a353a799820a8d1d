//! The capability seam between the sound engine and whatever actually
//! produces audio: a host builds tracks, a track plays PCM at a point in
//! space.

use std::sync::Arc;

use arc_swap::ArcSwap;
use glam::Vec3;

use crate::error::TrackError;

/// Index of a track inside its [`SoundManager`](crate::SoundManager).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub usize);

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Shape of the buffer a static track is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackSpec {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub frames: usize,
}

impl TrackSpec {
    /// Every bundled loop is recorded at this rate.
    pub const SAMPLE_RATE: u32 = 44_100;

    /// 44.1 kHz mono 16-bit, the only format tracks are built with.
    pub fn mono16(frames: usize) -> Self {
        Self {
            sample_rate: Self::SAMPLE_RATE,
            channels: 1,
            bits_per_sample: 16,
            frames,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopCount {
    /// Number of extra passes over the loop region.
    Finite(u32),
    Infinite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Stopped,
    Playing,
}

/// A position a track is bound to. Clones share the same position, so the
/// owner can move it and every bound track follows.
#[derive(Debug, Clone)]
pub struct PointSource {
    position: Arc<ArcSwap<Vec3>>,
}

impl PointSource {
    pub fn new(position: Vec3) -> Self {
        Self {
            position: Arc::new(ArcSwap::from_pointee(position)),
        }
    }

    pub fn position(&self) -> Vec3 {
        **self.position.load()
    }

    pub fn set_position(&self, position: Vec3) {
        self.position.store(Arc::new(position));
    }
}

impl Default for PointSource {
    fn default() -> Self {
        Self::new(Vec3::ZERO)
    }
}

/// One physical looping playback unit.
///
/// All methods take `&self`; implementations use interior mutability so a
/// track can be shared with a render thread.
pub trait SpatialTrack: Send + Sync {
    /// Copy PCM into the track's static buffer. Returns frames written.
    fn write(&self, pcm: &[i16]) -> Result<usize, TrackError>;

    /// Loop `[start, end)` frames `count` more times.
    fn set_loop_points(&self, start: usize, end: usize, count: LoopCount) -> Result<(), TrackError>;

    fn play(&self);

    fn stop(&self);

    /// Volume in [0.0, 1.0]. Callers clamp before calling.
    fn set_volume(&self, volume: f32);

    fn volume(&self) -> f32;

    fn play_state(&self) -> PlayState;

    /// Free the underlying resource. Later calls are no-ops.
    fn release(&self);

    fn is_released(&self) -> bool;
}

/// Builds point-sourced static tracks.
pub trait TrackHost: Send + Sync {
    fn create_track(&self, spec: TrackSpec, source: &PointSource) -> Result<Arc<dyn SpatialTrack>, TrackError>;
}

pub(crate) fn check_spec(spec: &TrackSpec) -> Result<(), TrackError> {
    if spec.channels != 1 || spec.bits_per_sample != 16 {
        return Err(TrackError::Format(format!(
            "{} channel(s) at {} bits, expected mono 16-bit",
            spec.channels, spec.bits_per_sample
        )));
    }
    if spec.sample_rate == 0 {
        return Err(TrackError::Format("zero sample rate".into()));
    }
    Ok(())
}
