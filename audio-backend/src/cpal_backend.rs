use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use arc_swap::ArcSwapOption;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, StreamConfig};
use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::{AudioBackend, BackendError, DeviceInfo, DiagnosticEvent, DiagnosticsCb, RenderFn};

/// Worker-thread-backed cpal backend.
///
/// `CpalAudioBackend` is a Send handle that talks to a worker thread over a
/// control channel. The worker owns the cpal `Stream`, which is not Send on
/// every platform.
pub struct CpalAudioBackend {
    info: DeviceInfo,
    shared: Arc<Shared>,
    ctrl_tx: Sender<CtrlMsg>,
    worker: Option<thread::JoinHandle<()>>,
}

/// State read by the device callback. Lock-free on the render path.
struct Shared {
    render: ArcSwapOption<RenderFn>,
    frames: AtomicU64,
    diagnostics: ArcSwapOption<DiagnosticsCb>,
}

enum CtrlMsg {
    Start,
    Stop,
    Shutdown,
}

impl CpalAudioBackend {
    pub fn new() -> Result<Self, BackendError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(BackendError::DeviceNotFound)?;

        let mut supported_configs = device
            .supported_output_configs()
            .map_err(|e| BackendError::Other(e.to_string()))?
            .collect::<Vec<_>>();

        // Prefer f32 interleaved stereo; the mixer writes f32 only.
        let chosen = supported_configs
            .iter()
            .rev()
            .find(|c| c.sample_format() == SampleFormat::F32 && c.channels() >= 2)
            .cloned()
            .or_else(|| {
                supported_configs.retain(|c| c.sample_format() == SampleFormat::F32);
                supported_configs.pop()
            })
            .ok_or_else(|| BackendError::UnsupportedFormat("no f32 output config".into()))?;

        let config: StreamConfig = chosen.with_max_sample_rate().config();
        let buffer_size = match config.buffer_size {
            cpal::BufferSize::Fixed(n) => n as usize,
            cpal::BufferSize::Default => 0,
        };

        let info = DeviceInfo {
            sample_rate: config.sample_rate.0,
            buffer_size,
            channels: config.channels,
            device_name: device.name().ok(),
        };

        let shared = Arc::new(Shared {
            render: ArcSwapOption::from(None),
            frames: AtomicU64::new(0),
            diagnostics: ArcSwapOption::from(None),
        });

        let (ctrl_tx, ctrl_rx) = unbounded::<CtrlMsg>();
        let worker_shared = shared.clone();
        let worker = thread::Builder::new()
            .name("audio-output".into())
            .spawn(move || worker_loop(device, config, ctrl_rx, worker_shared))
            .map_err(|e| BackendError::Other(e.to_string()))?;

        Ok(Self {
            info,
            shared,
            ctrl_tx,
            worker: Some(worker),
        })
    }

    fn send(&self, msg: CtrlMsg) -> Result<(), BackendError> {
        self.ctrl_tx
            .send(msg)
            .map_err(|_| BackendError::ControlChannelClosed)
    }
}

fn report(shared: &Shared, event: DiagnosticEvent) {
    if let Some(cb) = shared.diagnostics.load_full() {
        // Never call user code from the device callback thread.
        thread::spawn(move || cb(event));
    }
}

fn worker_loop(device: Device, config: StreamConfig, rx: Receiver<CtrlMsg>, shared: Arc<Shared>) {
    let channels = config.channels.max(1) as usize;
    let sample_rate = config.sample_rate.0;
    let mut stream: Option<cpal::Stream> = None;

    while let Ok(msg) = rx.recv() {
        match msg {
            CtrlMsg::Start => {
                if stream.is_some() {
                    continue;
                }
                let cb_shared = shared.clone();
                let data_cb = move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / channels;
                    let guard = cb_shared.render.load();
                    match guard.as_ref() {
                        Some(render) => {
                            let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                                (render)(data, sample_rate, frames);
                            }));
                            if res.is_err() {
                                data.iter_mut().for_each(|s| *s = 0.0);
                            }
                        }
                        None => data.iter_mut().for_each(|s| *s = 0.0),
                    }
                    cb_shared.frames.fetch_add(frames as u64, Ordering::Relaxed);
                };
                let err_shared = shared.clone();
                let err_cb = move |err: cpal::StreamError| {
                    tracing::warn!(error = %err, "output stream error");
                    let event = match err {
                        cpal::StreamError::DeviceNotAvailable => DiagnosticEvent::DeviceRemoved,
                        _ => DiagnosticEvent::XRun { count: 1 },
                    };
                    report(&err_shared, event);
                };

                match device.build_output_stream(&config, data_cb, err_cb, None) {
                    Ok(s) => match s.play() {
                        Ok(()) => {
                            shared.frames.store(0, Ordering::Relaxed);
                            stream = Some(s);
                            tracing::debug!("output stream started");
                        }
                        Err(e) => tracing::error!(error = %e, "failed to start output stream"),
                    },
                    Err(e) => {
                        tracing::error!(error = %e, "failed to build output stream");
                        report(&shared, DiagnosticEvent::Other(format!("stream build failed: {}", e)));
                    }
                }
            }
            CtrlMsg::Stop => {
                // Dropping the stream stops the device callback.
                stream = None;
            }
            CtrlMsg::Shutdown => return,
        }
    }
}

impl AudioBackend for CpalAudioBackend {
    fn start(&mut self, render: RenderFn) -> Result<(), BackendError> {
        self.shared.render.store(Some(Arc::new(render)));
        self.send(CtrlMsg::Start)
    }

    fn stop(&mut self) -> Result<(), BackendError> {
        self.send(CtrlMsg::Stop)?;
        self.shared.render.store(None);
        Ok(())
    }

    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn frames_since_start(&self) -> u64 {
        self.shared.frames.load(Ordering::Relaxed)
    }

    fn set_diagnostics_callback(&mut self, cb: Option<DiagnosticsCb>) {
        self.shared.diagnostics.store(cb.map(Arc::new));
    }
}

impl Drop for CpalAudioBackend {
    fn drop(&mut self) {
        let _ = self.ctrl_tx.send(CtrlMsg::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
