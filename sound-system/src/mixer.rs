//! Software [`TrackHost`]: keeps every track in memory and mixes them into
//! the device buffer from the audio callback.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};
use glam::Vec3;
use parking_lot::Mutex;

use crate::error::TrackError;
use crate::spatialiser::Spatialiser;
use crate::track::{check_spec, LoopCount, PlayState, PointSource, SpatialTrack, TrackHost, TrackSpec};

const ATTACK_MS: f32 = 5.0;
const RELEASE_MS: f32 = 50.0;

#[derive(Debug, Clone, Copy)]
struct LoopRegion {
    start: usize,
    end: usize,
    count: LoopCount,
}

struct RenderState {
    // position in source frames
    playhead: f64,
    volume: f32,
    // per-frame step toward `ramp_to`, fixed when the target changes
    incr: f32,
    ramp_to: f32,
    loops_done: u32,
}

/// A track owned by a [`Mixer`].
pub struct MixerTrack {
    spec: TrackSpec,
    source: PointSource,
    pcm: ArcSwapOption<Vec<f32>>,
    region: ArcSwapOption<LoopRegion>,
    playing: AtomicBool,
    released: AtomicBool,
    target_volume: AtomicU32,
    state: Mutex<RenderState>,
}

impl MixerTrack {
    fn new(spec: TrackSpec, source: PointSource) -> Self {
        Self {
            spec,
            source,
            pcm: ArcSwapOption::from(None),
            region: ArcSwapOption::from(None),
            playing: AtomicBool::new(false),
            released: AtomicBool::new(false),
            target_volume: AtomicU32::new(1.0f32.to_bits()),
            state: Mutex::new(RenderState {
                playhead: 0.0,
                volume: 1.0,
                incr: 0.0,
                ramp_to: 1.0,
                loops_done: 0,
            }),
        }
    }

    pub fn spec(&self) -> TrackSpec {
        self.spec
    }

    /// Current playhead in source frames.
    pub fn playhead(&self) -> f64 {
        self.state.lock().playhead
    }

    fn is_audible(&self) -> bool {
        self.playing.load(Ordering::Acquire) && !self.released.load(Ordering::Acquire)
    }

    /// Render this track into `out` as mono at `device_rate`. Returns false
    /// when nothing was produced. Silent tracks still advance so they stay
    /// aligned with the others.
    fn render_mono(&self, out: &mut [f32], device_rate: u32) -> bool {
        if !self.is_audible() {
            return false;
        }
        let Some(pcm) = self.pcm.load_full() else {
            return false;
        };
        if pcm.is_empty() {
            return false;
        }
        let region = self.region.load_full().map(|r| *r).unwrap_or(LoopRegion {
            start: 0,
            end: pcm.len(),
            count: LoopCount::Finite(0),
        });
        let start = region.start as f64;
        let end = region.end.min(pcm.len()) as f64;
        let span = end - start;
        let step = self.spec.sample_rate as f64 / device_rate.max(1) as f64;
        let target = f32::from_bits(self.target_volume.load(Ordering::Relaxed));

        let mut st = self.state.lock();

        if st.volume == 0.0 && target == 0.0 {
            st.playhead += step * out.len() as f64;
            if st.playhead >= end && span > 0.0 {
                let passes = ((st.playhead - start) / span).floor() as u32;
                if self.loops_remain(region.count, st.loops_done) {
                    st.loops_done = st.loops_done.saturating_add(passes);
                    st.playhead = start + (st.playhead - start) % span;
                } else {
                    self.playing.store(false, Ordering::Release);
                }
            }
            return false;
        }

        if target != st.ramp_to {
            let ramp_ms = if target > st.volume { ATTACK_MS } else { RELEASE_MS };
            let ramp_frames = (ramp_ms * device_rate as f32 / 1000.0).max(1.0);
            st.incr = (target - st.volume) / ramp_frames;
            st.ramp_to = target;
        }
        let incr = st.incr;

        for s in out.iter_mut() {
            if st.playhead >= end {
                if span > 0.0 && self.loops_remain(region.count, st.loops_done) {
                    st.loops_done = st.loops_done.saturating_add(1);
                    st.playhead = start + (st.playhead - start) % span;
                } else {
                    self.playing.store(false, Ordering::Release);
                    break;
                }
            }
            let idx = st.playhead as usize;
            let frac = (st.playhead - idx as f64) as f32;
            let a = pcm[idx];
            let next = if idx + 1 < end as usize { idx + 1 } else { region.start };
            let b = pcm.get(next).copied().unwrap_or(0.0);
            *s = (a + (b - a) * frac) * st.volume;

            st.volume = if incr >= 0.0 {
                (st.volume + incr).min(target)
            } else {
                (st.volume + incr).max(target)
            };
            st.playhead += step;
        }
        true
    }

    fn loops_remain(&self, count: LoopCount, done: u32) -> bool {
        match count {
            LoopCount::Infinite => true,
            LoopCount::Finite(n) => done < n,
        }
    }
}

impl SpatialTrack for MixerTrack {
    fn write(&self, pcm: &[i16]) -> Result<usize, TrackError> {
        if self.released.load(Ordering::Acquire) {
            return Err(TrackError::Released);
        }
        if self.pcm.load().is_some() {
            return Err(TrackError::Write("static buffer already written".into()));
        }
        let n = pcm.len().min(self.spec.frames);
        let samples: Vec<f32> = pcm[..n].iter().map(|s| *s as f32 / 32768.0).collect();
        self.pcm.store(Some(Arc::new(samples)));
        Ok(n)
    }

    fn set_loop_points(&self, start: usize, end: usize, count: LoopCount) -> Result<(), TrackError> {
        if self.released.load(Ordering::Acquire) {
            return Err(TrackError::Released);
        }
        let written = self.pcm.load().as_ref().map_or(0, |p| p.len());
        if start >= end || end > written {
            return Err(TrackError::LoopPoints(format!(
                "[{}, {}) outside {} written frames",
                start, end, written
            )));
        }
        self.region.store(Some(Arc::new(LoopRegion { start, end, count })));
        Ok(())
    }

    fn play(&self) {
        if self.released.load(Ordering::Acquire) {
            return;
        }
        self.playing.store(true, Ordering::Release);
    }

    fn stop(&self) {
        self.playing.store(false, Ordering::Release);
        let mut st = self.state.lock();
        st.playhead = 0.0;
        st.loops_done = 0;
    }

    fn set_volume(&self, volume: f32) {
        self.target_volume.store(volume.to_bits(), Ordering::Relaxed);
        if !self.playing.load(Ordering::Acquire) {
            // nothing to declick yet
            let mut st = self.state.lock();
            st.volume = volume;
            st.ramp_to = volume;
        }
    }

    fn volume(&self) -> f32 {
        f32::from_bits(self.target_volume.load(Ordering::Relaxed))
    }

    fn play_state(&self) -> PlayState {
        if self.playing.load(Ordering::Acquire) {
            PlayState::Playing
        } else {
            PlayState::Stopped
        }
    }

    fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        self.playing.store(false, Ordering::Release);
        self.pcm.store(None);
    }

    fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

/// Mixes every playing track, spatialised around a single listener.
pub struct Mixer {
    tracks: ArcSwap<Vec<Arc<MixerTrack>>>,
    add_lock: Mutex<()>,
    spatialiser: ArcSwap<Spatialiser>,
    frames_rendered: AtomicU64,
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new()
    }
}

impl Mixer {
    pub fn new() -> Self {
        Self {
            tracks: ArcSwap::from_pointee(Vec::new()),
            add_lock: Mutex::new(()),
            spatialiser: ArcSwap::from_pointee(Spatialiser::new()),
            frames_rendered: AtomicU64::new(0),
        }
    }

    pub fn set_listener_position(&self, pos: Vec3) {
        let mut sp = **self.spatialiser.load();
        sp.set_listener_position(pos);
        self.spatialiser.store(Arc::new(sp));
    }

    pub fn listener_position(&self) -> Vec3 {
        self.spatialiser.load().listener_position
    }

    /// Tracks that have not been released.
    pub fn track_count(&self) -> usize {
        self.tracks.load().iter().filter(|t| !t.is_released()).count()
    }

    pub fn tracks(&self) -> Arc<Vec<Arc<MixerTrack>>> {
        self.tracks.load_full()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }

    /// Audio-thread entry point. `out` is interleaved with
    /// `out.len() / frames` channels.
    pub fn render(&self, out: &mut [f32], sample_rate: u32, frames: usize) {
        out.fill(0.0);
        if frames == 0 {
            return;
        }
        let channels = out.len() / frames;
        if channels == 0 {
            return;
        }
        let snapshot = self.tracks.load();
        let sp = **self.spatialiser.load();

        thread_local! {
            static TL_MONO: std::cell::RefCell<Vec<f32>> = const { std::cell::RefCell::new(Vec::new()) };
            static TL_STEREO: std::cell::RefCell<Vec<f32>> = const { std::cell::RefCell::new(Vec::new()) };
        }

        TL_MONO.with(|mono_cell| {
            TL_STEREO.with(|stereo_cell| {
                let mut mono = mono_cell.borrow_mut();
                mono.resize(frames, 0.0);
                let mut stereo = stereo_cell.borrow_mut();
                stereo.resize(frames * 2, 0.0);

                for track in snapshot.iter() {
                    mono.fill(0.0);
                    if !track.render_mono(&mut mono, sample_rate) {
                        continue;
                    }
                    sp.process_mono_to_stereo(&mono, &mut stereo, track.source.position(), 1.0);
                    for (i, frame) in out.chunks_exact_mut(channels).enumerate() {
                        let (l, r) = (stereo[2 * i], stereo[2 * i + 1]);
                        if channels == 1 {
                            frame[0] += 0.5 * (l + r);
                        } else {
                            frame[0] += l;
                            frame[1] += r;
                        }
                    }
                }
            })
        });

        self.frames_rendered.fetch_add(frames as u64, Ordering::Relaxed);
    }
}

impl TrackHost for Mixer {
    fn create_track(&self, spec: TrackSpec, source: &PointSource) -> Result<Arc<dyn SpatialTrack>, TrackError> {
        check_spec(&spec)?;
        let track = Arc::new(MixerTrack::new(spec, source.clone()));

        let _guard = self.add_lock.lock();
        let mut next: Vec<Arc<MixerTrack>> = self
            .tracks
            .load()
            .iter()
            .filter(|t| !t.is_released())
            .cloned()
            .collect();
        next.push(track.clone());
        self.tracks.store(Arc::new(next));
        tracing::debug!(frames = spec.frames, "mixer track created");
        Ok(track)
    }
}

/// Render closure type accepted by the audio backend.
pub type RenderClosure = Arc<dyn Fn(&mut [f32], u32, usize) + Send + Sync + 'static>;

/// Wrap a mixer as a backend render callback.
pub fn render_fn_for_mixer(mixer: Arc<Mixer>) -> RenderClosure {
    Arc::new(move |buffer: &mut [f32], sample_rate: u32, frames: usize| {
        mixer.render(buffer, sample_rate, frames);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded_track(mixer: &Mixer, pcm: &[i16], pos: Vec3) -> Arc<dyn SpatialTrack> {
        let track = mixer
            .create_track(TrackSpec::mono16(pcm.len()), &PointSource::new(pos))
            .unwrap();
        track.write(pcm).unwrap();
        track.set_loop_points(0, pcm.len(), LoopCount::Infinite).unwrap();
        track
    }

    #[test]
    fn rejects_non_mono_tracks() {
        let mixer = Mixer::new();
        let spec = TrackSpec { channels: 2, ..TrackSpec::mono16(4) };
        assert!(mixer.create_track(spec, &PointSource::default()).is_err());
        assert_eq!(mixer.track_count(), 0);
    }

    #[test]
    fn stopped_tracks_render_silence() {
        let mixer = Mixer::new();
        let _t = loaded_track(&mixer, &[16_000; 8], Vec3::new(0.0, 0.0, 1.0));
        let mut out = vec![1.0; 16];
        mixer.render(&mut out, 44_100, 8);
        assert!(out.iter().all(|s| *s == 0.0));
        assert_eq!(mixer.frames_rendered(), 8);
    }

    #[test]
    fn playing_track_is_heard_in_both_channels() {
        let mixer = Mixer::new();
        let t = loaded_track(&mixer, &[16_000; 64], Vec3::new(0.0, 0.0, 1.0));
        t.play();
        let mut out = vec![0.0; 128];
        mixer.render(&mut out, 44_100, 64);
        assert!(out[0] > 0.0 && out[1] > 0.0);
        assert!((out[0] - out[1]).abs() < 1e-6);
    }

    #[test]
    fn looping_track_wraps_and_keeps_playing() {
        let mixer = Mixer::new();
        let t = loaded_track(&mixer, &[1000, 2000, 3000, 4000], Vec3::ZERO);
        t.play();
        let mut out = vec![0.0; 20];
        mixer.render(&mut out, 44_100, 10);
        assert_eq!(t.play_state(), PlayState::Playing);
        let tracks = mixer.tracks();
        assert!(tracks[0].playhead() < 4.0);
    }

    #[test]
    fn muted_track_keeps_its_place() {
        let mixer = Mixer::new();
        let pcm: Vec<i16> = (0..100).map(|i| i as i16 * 100).collect();
        let t = loaded_track(&mixer, &pcm, Vec3::ZERO);
        t.set_volume(0.0);
        t.play();
        // let the ramp settle on zero first
        let mut out = vec![0.0; 2 * 4096];
        mixer.render(&mut out, 44_100, 4096);
        let before = mixer.tracks()[0].playhead();
        let mut out = vec![0.0; 2 * 30];
        mixer.render(&mut out, 44_100, 30);
        assert!(out.iter().all(|s| *s == 0.0));
        let after = mixer.tracks()[0].playhead();
        let moved = (after - before).rem_euclid(100.0);
        assert!((moved - 30.0).abs() < 1e-6, "moved {moved}");
    }

    #[test]
    fn volume_changes_ramp_over_several_blocks_and_land_on_target() {
        let mixer = Mixer::new();
        let t = loaded_track(&mixer, &[16_000; 512], Vec3::new(0.0, 0.0, 1.0));
        t.set_volume(0.0);
        t.play();
        t.set_volume(1.0);
        let mut out = vec![0.0; 2 * 64];
        mixer.render(&mut out, 48_000, 64);
        // attack is 240 frames at 48 kHz, so the first block is still rising
        assert!(out[0] < out[2 * 63]);

        t.set_volume(0.0);
        for _ in 0..40 {
            mixer.render(&mut out, 48_000, 64);
        }
        // 2400 release frames fit in 40 blocks of 64
        mixer.render(&mut out, 48_000, 64);
        assert!(out.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn non_looping_track_stops_at_the_end() {
        let mixer = Mixer::new();
        let t = mixer
            .create_track(TrackSpec::mono16(4), &PointSource::default())
            .unwrap();
        t.write(&[100; 4]).unwrap();
        t.play();
        let mut out = vec![0.0; 16];
        mixer.render(&mut out, 44_100, 8);
        assert_eq!(t.play_state(), PlayState::Stopped);
    }

    #[test]
    fn fractional_playhead_follows_device_rate() {
        let mixer = Mixer::new();
        let t = loaded_track(&mixer, &[0; 44_100], Vec3::ZERO);
        t.play();
        let mut out = vec![0.0; 2 * 480];
        mixer.render(&mut out, 48_000, 480);
        let expected = 480.0 * 44_100.0 / 48_000.0;
        assert!((mixer.tracks()[0].playhead() - expected).abs() < 1e-6);
    }

    #[test]
    fn loop_points_must_lie_inside_written_data() {
        let mixer = Mixer::new();
        let t = mixer
            .create_track(TrackSpec::mono16(4), &PointSource::default())
            .unwrap();
        assert!(t.set_loop_points(0, 4, LoopCount::Infinite).is_err());
        t.write(&[1, 2, 3, 4]).unwrap();
        assert!(t.set_loop_points(2, 2, LoopCount::Infinite).is_err());
        assert!(t.set_loop_points(0, 4, LoopCount::Infinite).is_ok());
    }

    #[test]
    fn released_tracks_are_dropped_from_the_mix() {
        let mixer = Mixer::new();
        let t = loaded_track(&mixer, &[100; 4], Vec3::ZERO);
        t.play();
        t.release();
        t.release();
        assert!(t.is_released());
        assert_eq!(mixer.track_count(), 0);
        assert!(matches!(t.write(&[1]), Err(TrackError::Released)));
        let mut out = vec![0.0; 8];
        mixer.render(&mut out, 44_100, 4);
        assert!(out.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn render_fn_forwards_to_mixer() {
        let mixer = Arc::new(Mixer::new());
        let t = loaded_track(&mixer, &[20_000; 32], Vec3::new(0.0, 0.0, 1.0));
        t.play();
        let render = render_fn_for_mixer(mixer.clone());
        let mut out = vec![0.0; 32];
        render(&mut out, 44_100, 32);
        assert!(out.iter().any(|s| *s != 0.0));
        assert_eq!(mixer.frames_rendered(), 32);
    }
}
