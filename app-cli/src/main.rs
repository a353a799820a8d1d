use std::io::{stdout, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::{terminal, ExecutableCommand};
use glam::Vec3;

use audio_backend::{create_audio_backend, is_mock_backend_enabled};
use shape_objects::{ExplorerConfig, SoundExplorer};
use sound_assets::{AssetManager, CachedModelRepository, GlbFileLoader, ShapeModel};
use sound_system::{render_fn_for_mixer, CompositionState, Mixer};

#[derive(Parser)]
#[command(name = "sound-explorer", about = "Spawn shapes and play their loops in sync")]
struct Cli {
    /// RON config file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Asset root (overrides the config)
    #[arg(short, long)]
    assets: Option<PathBuf>,
    /// No terminal UI: spawn every shape and play for a while
    #[arg(long)]
    headless: bool,
    /// Headless run length
    #[arg(long, default_value_t = 10)]
    seconds: u64,
    /// Log file for the interactive UI
    #[arg(long, default_value = "sound-explorer.log")]
    log_file: PathBuf,
}

const DRAG_STEP: f32 = 0.1;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let mut config = match &cli.config {
        Some(path) => ExplorerConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => ExplorerConfig::default(),
    };
    if let Some(dir) = &cli.assets {
        config.asset_dir = dir.clone();
    }

    let mixer = Arc::new(Mixer::new());
    let mut backend = create_audio_backend().context("opening audio output")?;
    backend
        .start(render_fn_for_mixer(mixer.clone()))
        .context("starting audio output")?;

    let resources = AssetManager::from_dir(config.sound_dir())
        .with_context(|| format!("reading sounds from {}", config.sound_dir().display()))?;
    let models = CachedModelRepository::new(GlbFileLoader::new(config.asset_dir.clone()));
    let explorer = SoundExplorer::initialize(config, mixer.clone(), &resources, &models)?;
    mixer.set_listener_position(explorer.head_pose().translation);

    for (model, reason) in explorer.unavailable() {
        tracing::warn!(shape = %model, reason = %reason, "shape unavailable");
    }

    let outcome = if cli.headless {
        run_headless(&explorer, &mixer, Duration::from_secs(cli.seconds))
    } else {
        run_interactive(&explorer, &mixer)
    };

    explorer.shutdown();
    backend.stop().context("stopping audio output")?;
    outcome
}

fn init_logging(cli: &Cli) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if cli.headless {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    } else {
        // the terminal belongs to the UI
        let file = std::fs::File::create(&cli.log_file)
            .with_context(|| format!("creating {}", cli.log_file.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init();
    }
    Ok(())
}

/// Pulls audio from the mixer when no device does. Renders as many frames as
/// wall-clock time has passed since the last call.
struct MixerPump {
    buf: Vec<f32>,
    last: Instant,
}

impl MixerPump {
    const RATE: u32 = 48_000;
    const MAX_BLOCK: usize = 4096;

    fn new() -> Self {
        Self {
            buf: vec![0.0; Self::MAX_BLOCK * 2],
            last: Instant::now(),
        }
    }

    /// Returns the peak of what was rendered.
    fn pump(&mut self, mixer: &Mixer) -> f32 {
        let now = Instant::now();
        let due = (now.duration_since(self.last).as_secs_f64() * Self::RATE as f64) as usize;
        self.last = now;
        let mut peak = 0.0f32;
        let mut left = due;
        while left > 0 {
            let frames = left.min(Self::MAX_BLOCK);
            let out = &mut self.buf[..frames * 2];
            mixer.render(out, Self::RATE, frames);
            peak = out.iter().fold(peak, |p, s| p.max(s.abs()));
            left -= frames;
        }
        peak
    }
}

fn run_headless(explorer: &SoundExplorer, mixer: &Mixer, run_for: Duration) -> Result<()> {
    for model in ShapeModel::ALL.into_iter().filter(|m| explorer.is_available(*m)) {
        explorer.spawn_shape(model)?;
    }
    if explorer.state() != CompositionState::Playing {
        explorer.toggle_playback();
    }

    // Without a device nothing pulls from the mixer, so drive it here.
    let mut pump = is_mock_backend_enabled().then(MixerPump::new);
    let start = Instant::now();
    let mut last_report = Instant::now();
    let mut peak = 0.0f32;
    while start.elapsed() < run_for {
        if let Some(pump) = pump.as_mut() {
            peak = peak.max(pump.pump(mixer));
        }
        if last_report.elapsed() >= Duration::from_secs(1) {
            tracing::info!(
                state = ?explorer.state(),
                spawned = explorer.spawned_shapes().len(),
                frames = mixer.frames_rendered(),
                peak,
                "running"
            );
            peak = 0.0;
            last_report = Instant::now();
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    Ok(())
}

fn run_interactive(explorer: &SoundExplorer, mixer: &Mixer) -> Result<()> {
    let mut out = stdout();
    terminal::enable_raw_mode()?;
    out.execute(crossterm::cursor::Hide)?;
    out.execute(terminal::EnterAlternateScreen)?;

    let result = ui_loop(explorer, mixer, &mut out);

    out.execute(terminal::LeaveAlternateScreen)?;
    out.execute(crossterm::cursor::Show)?;
    terminal::disable_raw_mode()?;
    result
}

fn ui_loop(explorer: &SoundExplorer, mixer: &Mixer, out: &mut std::io::Stdout) -> Result<()> {
    let target_frame = Duration::from_micros(16_667);
    let mut selected: Option<ShapeModel> = None;
    let mut message = String::new();
    let mut pump = is_mock_backend_enabled().then(MixerPump::new);
    if pump.is_some() {
        tracing::warn!("no audio device in this build; the mix is rendered but not heard");
    }

    'running: loop {
        let frame_start = Instant::now();
        while event::poll(Duration::from_millis(0))? {
            let Event::Key(key) = event::read()? else { continue };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if key.code == KeyCode::Esc
                || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
            {
                break 'running;
            }
            let outcome = handle_key(explorer, key.code, &mut selected);
            message = match outcome {
                Ok(Some(m)) => m,
                Ok(None) => message,
                Err(e) => format!("error: {e}"),
            };
        }

        if selected.is_some_and(|m| !explorer.shape(m).is_spawned()) {
            selected = explorer.spawned_shapes().first().copied();
        }
        mixer.set_listener_position(explorer.head_pose().translation);
        let peak = pump.as_mut().map(|p| p.pump(mixer));
        draw(explorer, selected, &message, peak, out)?;

        let elapsed = frame_start.elapsed();
        if elapsed < target_frame {
            std::thread::sleep(target_frame - elapsed);
        }
    }
    Ok(())
}

fn handle_key(
    explorer: &SoundExplorer,
    code: KeyCode,
    selected: &mut Option<ShapeModel>,
) -> Result<Option<String>> {
    let msg = match code {
        KeyCode::Char(c @ '1'..='9') => {
            let index = c as usize - '1' as usize;
            let Some(model) = ShapeModel::from_index(index) else { return Ok(None) };
            if !explorer.is_available(model) {
                return Ok(Some(format!("{model} is unavailable")));
            }
            explorer.toggle_shape(model)?;
            if explorer.shape(model).is_spawned() {
                *selected = Some(model);
                format!("spawned {model}")
            } else {
                format!("recalled {model}")
            }
        }
        KeyCode::Char(' ') => format!("composition {:?}", explorer.toggle_playback()),
        KeyCode::Char('p') => {
            if explorer.state() == CompositionState::Playing {
                explorer.on_pause();
                "paused".to_string()
            } else {
                explorer.on_resume();
                "resumed".to_string()
            }
        }
        KeyCode::Char('r') => {
            explorer.restart_shapes()?;
            *selected = None;
            "all shapes recalled".to_string()
        }
        KeyCode::Char('t') => {
            let Some(model) = *selected else { return Ok(None) };
            explorer.tap_shape(model)?;
            format!("tapped {model}")
        }
        KeyCode::Tab => {
            let spawned = explorer.spawned_shapes();
            let next = selected
                .and_then(|m| spawned.iter().position(|s| *s == m))
                .map(|i| (i + 1) % spawned.len())
                .unwrap_or(0);
            *selected = spawned.get(next).copied();
            return Ok(None);
        }
        KeyCode::Up | KeyCode::Down => {
            let Some(model) = *selected else { return Ok(None) };
            let step = if code == KeyCode::Up { DRAG_STEP } else { -DRAG_STEP };
            let at = explorer.shape(model).entity().pose().translation + Vec3::Y * step;
            match explorer.drag_shape(model, at)? {
                Some(v) => format!("{model} switched to {v:?}"),
                None => return Ok(None),
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(msg))
}

fn draw(
    explorer: &SoundExplorer,
    selected: Option<ShapeModel>,
    message: &str,
    silent_peak: Option<f32>,
    out: &mut std::io::Stdout,
) -> Result<()> {
    out.execute(terminal::Clear(terminal::ClearType::All))?;
    out.execute(crossterm::cursor::MoveTo(0, 0))?;
    write!(out, "Sound Explorer  [{:?}]", explorer.state())?;
    if let Some(peak) = silent_peak {
        write!(out, "  no audio device, mix peak {peak:.2}")?;
    }
    write!(out, "\r\n")?;
    write!(
        out,
        "1-9 spawn/recall  space play/stop  p pause/resume  tab select  up/down lift  t tap  r restart  esc quit\r\n\r\n"
    )?;
    for (i, model) in ShapeModel::ALL.iter().enumerate() {
        let shape = explorer.shape(*model);
        let marker = if selected == Some(*model) { '>' } else { ' ' };
        let status = if !explorer.is_available(*model) {
            "unavailable".to_string()
        } else if shape.is_spawned() {
            let p = shape.entity().pose().translation;
            format!(
                "{:<7} {:?} y={:.2}{}",
                if shape.component().is_playing() { "playing" } else { "stopped" },
                shape.component().variant(),
                p.y,
                if shape.is_spinning() { " (spinning)" } else { "" }
            )
        } else {
            "-".to_string()
        };
        write!(out, "{marker} {} {:<11} {status}\r\n", i + 1, model.name())?;
    }
    write!(out, "\r\n{message}\r\n")?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pump_renders_elapsed_time_in_bounded_blocks() {
        let mixer = Mixer::new();
        let mut pump = MixerPump::new();
        pump.last = Instant::now() - Duration::from_millis(200);
        let peak = pump.pump(&mixer);
        assert_eq!(peak, 0.0);
        // 200 ms at 48 kHz, split across several blocks
        assert!(mixer.frames_rendered() >= 9_600);
    }
}
