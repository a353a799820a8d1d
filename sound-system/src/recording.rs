//! A [`TrackHost`] that produces no audio and records every call made to its
//! tracks. Lets tests count `play()` and volume writes exactly.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::TrackError;
use crate::track::{check_spec, LoopCount, PlayState, PointSource, SpatialTrack, TrackHost, TrackSpec};

#[derive(Default)]
struct Counters {
    created: AtomicUsize,
    released: AtomicUsize,
    plays: AtomicUsize,
    stops: AtomicUsize,
    volume_writes: AtomicUsize,
    play_order: Mutex<Vec<usize>>,
}

#[derive(Default)]
struct Faults {
    create: AtomicBool,
    write: AtomicBool,
    loop_points: AtomicBool,
}

pub struct RecordingTrack {
    index: usize,
    counters: Arc<Counters>,
    faults: Arc<Faults>,
    source: PointSource,
    frames: usize,
    written: AtomicUsize,
    loop_points: Mutex<Option<(usize, usize, LoopCount)>>,
    volume: AtomicU32,
    playing: AtomicBool,
    released: AtomicBool,
}

impl RecordingTrack {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn frames_written(&self) -> usize {
        self.written.load(Ordering::SeqCst)
    }

    pub fn loop_points(&self) -> Option<(usize, usize, LoopCount)> {
        *self.loop_points.lock()
    }

    pub fn source(&self) -> &PointSource {
        &self.source
    }
}

impl SpatialTrack for RecordingTrack {
    fn write(&self, pcm: &[i16]) -> Result<usize, TrackError> {
        if self.faults.write.load(Ordering::SeqCst) {
            return Err(TrackError::Write("injected failure".into()));
        }
        let n = pcm.len().min(self.frames);
        self.written.store(n, Ordering::SeqCst);
        Ok(n)
    }

    fn set_loop_points(&self, start: usize, end: usize, count: LoopCount) -> Result<(), TrackError> {
        if self.faults.loop_points.load(Ordering::SeqCst) {
            return Err(TrackError::LoopPoints("injected failure".into()));
        }
        if start >= end || end > self.frames_written() {
            return Err(TrackError::LoopPoints(format!("[{}, {})", start, end)));
        }
        *self.loop_points.lock() = Some((start, end, count));
        Ok(())
    }

    fn play(&self) {
        self.counters.plays.fetch_add(1, Ordering::SeqCst);
        self.counters.play_order.lock().push(self.index);
        self.playing.store(true, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.counters.stops.fetch_add(1, Ordering::SeqCst);
        self.playing.store(false, Ordering::SeqCst);
    }

    fn set_volume(&self, volume: f32) {
        self.counters.volume_writes.fetch_add(1, Ordering::SeqCst);
        self.volume.store(volume.to_bits(), Ordering::SeqCst);
    }

    fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::SeqCst))
    }

    fn play_state(&self) -> PlayState {
        if self.playing.load(Ordering::SeqCst) {
            PlayState::Playing
        } else {
            PlayState::Stopped
        }
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.counters.released.fetch_add(1, Ordering::SeqCst);
            self.playing.store(false, Ordering::SeqCst);
        }
    }

    fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

/// Records every track it builds. Failures can be injected per stage.
#[derive(Default)]
pub struct RecordingHost {
    counters: Arc<Counters>,
    faults: Arc<Faults>,
    tracks: Mutex<Vec<Arc<RecordingTrack>>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_creates(&self, fail: bool) {
        self.faults.create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.faults.write.store(fail, Ordering::SeqCst);
    }

    pub fn fail_loop_points(&self, fail: bool) {
        self.faults.loop_points.store(fail, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        self.counters.created.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.counters.released.load(Ordering::SeqCst)
    }

    pub fn play_calls(&self) -> usize {
        self.counters.plays.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.counters.stops.load(Ordering::SeqCst)
    }

    pub fn volume_calls(&self) -> usize {
        self.counters.volume_writes.load(Ordering::SeqCst)
    }

    /// Creation index of each track, in the order `play()` reached it.
    pub fn play_order(&self) -> Vec<usize> {
        self.counters.play_order.lock().clone()
    }

    /// Track by creation index, including ones that were released.
    pub fn track(&self, index: usize) -> Option<Arc<RecordingTrack>> {
        self.tracks.lock().get(index).cloned()
    }

    /// Volumes of every live track, in creation order.
    pub fn volumes(&self) -> Vec<f32> {
        self.tracks
            .lock()
            .iter()
            .filter(|t| !t.is_released())
            .map(|t| t.volume())
            .collect()
    }
}

impl TrackHost for RecordingHost {
    fn create_track(&self, spec: TrackSpec, source: &PointSource) -> Result<Arc<dyn SpatialTrack>, TrackError> {
        check_spec(&spec)?;
        if self.faults.create.load(Ordering::SeqCst) {
            return Err(TrackError::Construction("injected failure".into()));
        }
        let mut tracks = self.tracks.lock();
        let track = Arc::new(RecordingTrack {
            index: tracks.len(),
            counters: self.counters.clone(),
            faults: self.faults.clone(),
            source: source.clone(),
            frames: spec.frames,
            written: AtomicUsize::new(0),
            loop_points: Mutex::new(None),
            volume: AtomicU32::new(1.0f32.to_bits()),
            playing: AtomicBool::new(false),
            released: AtomicBool::new(false),
        });
        tracks.push(track.clone());
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        Ok(track)
    }
}
