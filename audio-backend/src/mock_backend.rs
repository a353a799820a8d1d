use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::{AudioBackend, BackendError, DeviceInfo, DiagnosticEvent, DiagnosticsCb, RenderFn};

/// In-process backend with no device behind it.
///
/// Nothing renders on its own; callers pull audio with [`MockAudioBackend::pump`],
/// which makes mixer output reproducible in tests.
pub struct MockAudioBackend {
    info: DeviceInfo,
    render: Arc<ArcSwapOption<RenderFn>>,
    frames: AtomicU64,
    diagnostics: Option<DiagnosticsCb>,
}

impl MockAudioBackend {
    pub fn new() -> Self {
        Self::with_info(DeviceInfo {
            sample_rate: 48_000,
            buffer_size: 256,
            channels: 2,
            device_name: Some("mock-device".to_string()),
        })
    }

    pub fn with_info(info: DeviceInfo) -> Self {
        Self {
            info,
            render: Arc::new(ArcSwapOption::from(None)),
            frames: AtomicU64::new(0),
            diagnostics: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.render.load().is_some()
    }

    /// Run the render callback once for `frames` frames and return the
    /// interleaved buffer. Silence when the backend is stopped.
    pub fn pump(&self, frames: usize) -> Vec<f32> {
        let channels = self.info.channels.max(1) as usize;
        let mut buf = vec![0.0f32; frames * channels];
        let guard = self.render.load();
        if let Some(render) = guard.as_ref() {
            // Same contract as the device backend: a panicking renderer yields silence.
            let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                (render)(&mut buf, self.info.sample_rate, frames);
            }));
            if res.is_err() {
                buf.iter_mut().for_each(|s| *s = 0.0);
            }
            self.frames.fetch_add(frames as u64, Ordering::Relaxed);
        }
        buf
    }

    /// Deliver a diagnostics event as if the device had reported it.
    pub fn emit_diagnostic(&self, event: DiagnosticEvent) {
        if let Some(cb) = &self.diagnostics {
            cb(event);
        }
    }
}

impl Default for MockAudioBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for MockAudioBackend {
    fn start(&mut self, render: RenderFn) -> Result<(), BackendError> {
        self.render.store(Some(Arc::new(render)));
        self.frames.store(0, Ordering::Relaxed);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BackendError> {
        self.render.store(None);
        Ok(())
    }

    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn frames_since_start(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    fn set_diagnostics_callback(&mut self, cb: Option<DiagnosticsCb>) {
        self.diagnostics = cb;
    }
}
