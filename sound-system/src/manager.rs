use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use sound_assets::{parse_wav, ResourceSource, WavClip};

use crate::error::{SoundError, TrackError};
use crate::track::{LoopCount, PlayState, PointSource, SpatialTrack, TrackHost, TrackId, TrackSpec};

/// Owns every track of the mix.
///
/// Tracks are appended while sounds load and are never removed; after that
/// the list is only read, so volume writes go straight to the track without
/// taking a lock.
pub struct SoundManager {
    host: Arc<dyn TrackHost>,
    tracks: ArcSwap<Vec<Arc<dyn SpatialTrack>>>,
    // serialises appends against the first play and close
    load_lock: Mutex<()>,
    started: AtomicBool,
    closed: AtomicBool,
}

impl SoundManager {
    pub fn new(host: Arc<dyn TrackHost>) -> Self {
        Self {
            host,
            tracks: ArcSwap::from_pointee(Vec::new()),
            load_lock: Mutex::new(()),
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Decode `resource_id` and build a silent looping track bound to `sink`.
    pub fn load_sound(
        &self,
        source: &dyn ResourceSource,
        sink: &PointSource,
        resource_id: &str,
    ) -> Result<TrackId, SoundError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SoundError::Closed);
        }
        if self.started.load(Ordering::Acquire) {
            return Err(SoundError::AlreadyStarted);
        }

        let bytes = source.open(resource_id)?;
        let clip = parse_wav(&bytes)?;
        if let Some(fmt) = clip
            .format
            .filter(|f| f.channels != 1 || f.sample_rate != TrackSpec::SAMPLE_RATE)
        {
            tracing::warn!(
                resource = resource_id,
                channels = fmt.channels,
                sample_rate = fmt.sample_rate,
                "resource format differs from track format; playing as 44.1 kHz mono"
            );
        }

        let spec = TrackSpec::mono16(clip.samples.len());
        let track = self.host.create_track(spec, sink)?;
        if let Err(e) = Self::prepare(track.as_ref(), &clip) {
            track.release();
            tracing::warn!(resource = resource_id, error = %e, "track setup failed; released");
            return Err(e.into());
        }

        let _guard = self.load_lock.lock();
        let refused = if self.closed.load(Ordering::Acquire) {
            Some(SoundError::Closed)
        } else if self.started.load(Ordering::Acquire) {
            Some(SoundError::AlreadyStarted)
        } else {
            None
        };
        if let Some(e) = refused {
            track.release();
            tracing::warn!(resource = resource_id, error = %e, "mix changed while loading; track released");
            return Err(e);
        }
        let mut next = (**self.tracks.load()).clone();
        next.push(track);
        let id = TrackId(next.len() - 1);
        self.tracks.store(Arc::new(next));
        tracing::debug!(resource = resource_id, track = %id, frames = clip.samples.len(), "sound loaded");
        Ok(id)
    }

    fn prepare(track: &dyn SpatialTrack, clip: &WavClip) -> Result<(), TrackError> {
        let written = track.write(&clip.samples)?;
        if written != clip.samples.len() {
            return Err(TrackError::Write(format!(
                "short write: {} of {} frames",
                written,
                clip.samples.len()
            )));
        }
        track.set_loop_points(0, written, LoopCount::Infinite)?;
        track.set_volume(0.0);
        Ok(())
    }

    /// Start every track in index order. Only the first call does anything;
    /// it returns the time between the first and last `play()`.
    pub fn play_all_sounds(&self) -> Option<Duration> {
        if self.closed.load(Ordering::Acquire) {
            tracing::warn!("play_all_sounds on a closed manager");
            return None;
        }
        let tracks = {
            let _guard = self.load_lock.lock();
            if self.started.swap(true, Ordering::AcqRel) {
                tracing::warn!("play_all_sounds called more than once; ignored");
                return None;
            }
            self.tracks.load_full()
        };
        let begin = Instant::now();
        for track in tracks.iter() {
            track.play();
        }
        let skew = begin.elapsed();
        tracing::info!(
            tracks = tracks.len(),
            skew_us = skew.as_micros() as u64,
            "all tracks started"
        );
        Some(skew)
    }

    /// Write a track volume, clamped to [0.0, 1.0].
    pub fn set_volume(&self, track: TrackId, volume: f32) -> Result<(), SoundError> {
        let tracks = self.tracks.load();
        let t = tracks.get(track.0).ok_or(SoundError::UnknownTrack(track))?;
        let volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        t.set_volume(volume);
        tracing::trace!(track = %track, volume, "set_volume");
        Ok(())
    }

    pub fn volume(&self, track: TrackId) -> Option<f32> {
        self.tracks.load().get(track.0).map(|t| t.volume())
    }

    pub fn track_count(&self) -> usize {
        self.tracks.load().len()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop and release every track. Safe to call more than once.
    pub fn close(&self) {
        let tracks = {
            let _guard = self.load_lock.lock();
            if self.closed.swap(true, Ordering::AcqRel) {
                return;
            }
            self.tracks.load_full()
        };
        let mut released = 0usize;
        for track in tracks.iter() {
            if track.play_state() == PlayState::Playing {
                track.stop();
            }
            if !track.is_released() {
                track.release();
                released += 1;
            }
        }
        tracing::info!(released, "sound manager closed");
    }
}

impl Drop for SoundManager {
    fn drop(&mut self) {
        self.close();
    }
}
