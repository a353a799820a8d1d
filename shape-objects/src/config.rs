use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ShapeError;

/// Explorer settings, read from a RON file. Missing fields take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    /// Root holding `glb/` models.
    pub asset_dir: PathBuf,
    /// Directory of `*.wav` loops. Defaults to `<asset_dir>/sounds`.
    pub sound_dir: Option<PathBuf>,
    /// Metres in front of the listener a spawned shape appears.
    pub spawn_distance: f32,
    pub listener_height: f32,
    pub height_to_change_sound: f32,
    pub debounce: f32,
    pub simulation_tick_ms: u64,
    /// Start the composition once everything has loaded.
    pub autoplay: bool,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            asset_dir: PathBuf::from("assets"),
            sound_dir: None,
            spawn_distance: 1.0,
            listener_height: 1.6,
            height_to_change_sound: 0.3,
            debounce: 0.05,
            simulation_tick_ms: 16,
            autoplay: true,
        }
    }
}

impl ExplorerConfig {
    pub fn from_ron_str(text: &str) -> Result<Self, ShapeError> {
        let cfg: ExplorerConfig = ron::de::from_str(text).map_err(|e| ShapeError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ShapeError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ShapeError::Config(format!("{}: {}", path.display(), e)))?;
        let cfg = Self::from_ron_str(&text)?;
        tracing::info!(path = %path.display(), "loaded explorer config");
        Ok(cfg)
    }

    pub fn sound_dir(&self) -> PathBuf {
        self.sound_dir.clone().unwrap_or_else(|| self.asset_dir.join("sounds"))
    }

    pub fn validate(&self) -> Result<(), ShapeError> {
        if self.height_to_change_sound <= 0.0 {
            return Err(ShapeError::Config("height_to_change_sound must be positive".into()));
        }
        if self.debounce < 0.0 || self.debounce >= self.height_to_change_sound {
            return Err(ShapeError::Config("debounce must be in [0, height_to_change_sound)".into()));
        }
        if self.simulation_tick_ms == 0 {
            return Err(ShapeError::Config("simulation_tick_ms must be non-zero".into()));
        }
        Ok(())
    }
}
