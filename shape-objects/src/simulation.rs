use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

struct Shared {
    enabled: AtomicBool,
    paused: AtomicBool,
    // set on resume so the next tick only records the time
    rebase: AtomicBool,
}

/// Pause/resume handle that can outlive borrows of the loop.
#[derive(Clone)]
pub struct SimulationControl {
    shared: Arc<Shared>,
}

impl SimulationControl {
    pub fn set_paused(&self, paused: bool) {
        let was = self.shared.paused.swap(paused, Ordering::AcqRel);
        if was && !paused {
            self.shared.rebase.store(true, Ordering::Release);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::Acquire)
    }
}

/// Calls `update(dt_seconds)` roughly every `tick` on its own thread.
///
/// The first tick, and the first after a resume, only records the time.
/// Dropping the loop stops and joins the thread.
pub struct SimulationLoop {
    control: SimulationControl,
    handle: Option<JoinHandle<()>>,
}

impl SimulationLoop {
    pub const DEFAULT_TICK: Duration = Duration::from_millis(16);

    pub fn start<F>(name: &str, tick: Duration, paused: bool, mut update: F) -> std::io::Result<Self>
    where
        F: FnMut(f64) + Send + 'static,
    {
        let shared = Arc::new(Shared {
            enabled: AtomicBool::new(true),
            paused: AtomicBool::new(paused),
            rebase: AtomicBool::new(false),
        });
        let worker = shared.clone();
        let handle = std::thread::Builder::new()
            .name(format!("sim-{}", name))
            .spawn(move || {
                let mut last: Option<Instant> = None;
                while worker.enabled.load(Ordering::Acquire) {
                    if worker.paused.load(Ordering::Acquire) {
                        last = None;
                        std::thread::park_timeout(tick);
                        continue;
                    }
                    if worker.rebase.swap(false, Ordering::AcqRel) {
                        last = None;
                    }
                    let now = Instant::now();
                    if let Some(prev) = last {
                        update(now.duration_since(prev).as_secs_f64());
                    }
                    last = Some(now);
                    std::thread::park_timeout(tick);
                }
            })?;
        Ok(Self {
            control: SimulationControl { shared },
            handle: Some(handle),
        })
    }

    pub fn control(&self) -> SimulationControl {
        self.control.clone()
    }

    pub fn set_paused(&self, paused: bool) {
        self.control.set_paused(paused);
    }

    pub fn is_paused(&self) -> bool {
        self.control.is_paused()
    }
}

impl Drop for SimulationLoop {
    fn drop(&mut self) {
        self.control.shared.enabled.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                tracing::warn!("simulation thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn ticks_while_running_and_not_while_paused() {
        let ticks = Arc::new(Mutex::new(Vec::new()));
        let sink = ticks.clone();
        let sim = SimulationLoop::start("test", Duration::from_millis(2), false, move |dt| sink.lock().push(dt)).unwrap();
        std::thread::sleep(Duration::from_millis(60));
        sim.set_paused(true);
        std::thread::sleep(Duration::from_millis(10));
        let count = ticks.lock().len();
        assert!(count > 0);
        assert!(ticks.lock().iter().all(|dt| *dt > 0.0));

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(ticks.lock().len(), count);
    }

    #[test]
    fn resume_does_not_count_paused_time() {
        let ticks = Arc::new(Mutex::new(Vec::new()));
        let sink = ticks.clone();
        let sim = SimulationLoop::start("test", Duration::from_millis(2), true, move |dt| sink.lock().push(dt)).unwrap();
        std::thread::sleep(Duration::from_millis(100));
        sim.set_paused(false);
        std::thread::sleep(Duration::from_millis(40));
        drop(sim);
        let ticks = ticks.lock();
        assert!(!ticks.is_empty());
        assert!(ticks.iter().all(|dt| *dt < 0.09), "{ticks:?}");
    }
}
