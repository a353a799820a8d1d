// Output-device layer for the sound explorer.
// The mixer hands a render closure to a backend; the backend calls it on its
// own thread whenever the device wants more samples.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

// Deterministic in-process backend. Always compiled so tests and headless runs
// can drive the render path by hand.
pub mod mock_backend;

// Real device output through cpal. Optional because it links against the
// platform audio libraries.
#[cfg(feature = "cpal-device")]
pub mod cpal_backend;

/// Failures reported by an output backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no output device available")]
    DeviceNotFound,
    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to build output stream: {0}")]
    StreamCreationFailed(String),
    #[error("backend control channel closed")]
    ControlChannelClosed,
    #[error("{0}")]
    Other(String),
}

/// The render callback function.
///
/// Called on the device thread with an interleaved output buffer, the device
/// sample rate and the number of frames in the buffer. It must fully overwrite
/// the buffer.
pub type RenderFn = Arc<dyn Fn(&mut [f32], u32, usize) + Send + Sync + 'static>;

/// Diagnostics events emitted by the backend (never on the render path).
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticEvent {
    XRun { count: u32 },
    DeviceRemoved,
    BufferSizeChanged { frames: usize },
    Other(String),
}

impl fmt::Display for DiagnosticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticEvent::XRun { count } => write!(f, "XRun(count={})", count),
            DiagnosticEvent::DeviceRemoved => write!(f, "DeviceRemoved"),
            DiagnosticEvent::BufferSizeChanged { frames } => {
                write!(f, "BufferSizeChanged(frames={})", frames)
            }
            DiagnosticEvent::Other(s) => write!(f, "Other({})", s),
        }
    }
}

/// Non-RT diagnostics callback type.
pub type DiagnosticsCb = Arc<dyn Fn(DiagnosticEvent) + Send + Sync + 'static>;

/// Effective configuration of an output device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub sample_rate: u32,
    /// Frames per callback; 0 when the device picks its own size.
    pub buffer_size: usize,
    pub channels: u16,
    pub device_name: Option<String>,
}

/// The contract every output backend fulfils.
pub trait AudioBackend: Send {
    fn start(&mut self, render: RenderFn) -> Result<(), BackendError>;
    fn stop(&mut self) -> Result<(), BackendError>;
    fn info(&self) -> &DeviceInfo;
    /// Frames rendered since the stream started. 0 if not running.
    fn frames_since_start(&self) -> u64;
    /// Register or clear the diagnostics callback.
    fn set_diagnostics_callback(&mut self, cb: Option<DiagnosticsCb>);

    fn sample_rate(&self) -> u32 {
        self.info().sample_rate
    }

    fn channels(&self) -> u16 {
        self.info().channels
    }

    fn buffer_size(&self) -> usize {
        self.info().buffer_size
    }

    fn device_name(&self) -> Option<&str> {
        self.info().device_name.as_deref()
    }
}

/// Runtime helper telling callers whether `create_audio_backend` hands out the
/// mock backend.
pub fn is_mock_backend_enabled() -> bool {
    cfg!(any(feature = "mock-audio", not(feature = "cpal-device")))
}

/// Open the default output backend for this build.
///
/// Builds with `cpal-device` (and without `mock-audio`) get the system output
/// device; every other build gets a [`mock_backend::MockAudioBackend`].
pub fn create_audio_backend() -> Result<Box<dyn AudioBackend>, BackendError> {
    let backend = open_backend()?;
    tracing::info!(
        sample_rate = backend.sample_rate(),
        buffer_size = backend.buffer_size(),
        channels = backend.channels(),
        device = backend.device_name().unwrap_or("<unknown>"),
        mock = is_mock_backend_enabled(),
        "audio backend opened"
    );
    Ok(backend)
}

#[cfg(all(feature = "cpal-device", not(feature = "mock-audio")))]
fn open_backend() -> Result<Box<dyn AudioBackend>, BackendError> {
    Ok(Box::new(cpal_backend::CpalAudioBackend::new()?))
}

#[cfg(any(feature = "mock-audio", not(feature = "cpal-device")))]
fn open_backend() -> Result<Box<dyn AudioBackend>, BackendError> {
    Ok(Box::new(mock_backend::MockAudioBackend::new()))
}
