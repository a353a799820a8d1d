use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::util::AssetError;

/// Something that can hand out bundled resource bytes by id.
///
/// Resource ids are the bare sample names used by the catalog
/// (`"inst01_high"`), never paths.
pub trait ResourceSource: Send + Sync {
    fn open(&self, id: &str) -> Result<Vec<u8>, AssetError>;

    fn contains(&self, id: &str) -> bool;
}

/// Resource registry backed by files on disk.
#[derive(Debug, Default, Clone)]
pub struct AssetManager {
    // id -> path
    assets: HashMap<String, PathBuf>,
}

impl AssetManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every `*.wav` file directly inside `dir` under its file stem.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, AssetError> {
        let dir = dir.as_ref();
        let mut mgr = Self::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_wav = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
            if !is_wav {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                mgr.register_asset(stem.to_string(), path.clone());
            }
        }
        tracing::info!(dir = %dir.display(), count = mgr.len(), "registered sound resources");
        Ok(mgr)
    }

    pub fn register_asset(&mut self, id: impl Into<String>, path: impl Into<PathBuf>) {
        self.assets.insert(id.into(), path.into());
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn path_of(&self, id: &str) -> Option<&Path> {
        self.assets.get(id).map(PathBuf::as_path)
    }
}

impl ResourceSource for AssetManager {
    fn open(&self, id: &str) -> Result<Vec<u8>, AssetError> {
        let path = self
            .assets
            .get(id)
            .ok_or_else(|| AssetError::NotFound(id.to_string()))?;
        Ok(std::fs::read(path)?)
    }

    fn contains(&self, id: &str) -> bool {
        self.assets.contains_key(id)
    }
}

/// In-memory resources, for tests and generated content.
#[derive(Debug, Default, Clone)]
pub struct MemoryResources {
    blobs: HashMap<String, Vec<u8>>,
}

impl MemoryResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, bytes: Vec<u8>) {
        self.blobs.insert(id.into(), bytes);
    }

    pub fn with(mut self, id: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(id, bytes);
        self
    }
}

impl ResourceSource for MemoryResources {
    fn open(&self, id: &str) -> Result<Vec<u8>, AssetError> {
        self.blobs
            .get(id)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(id.to_string()))
    }

    fn contains(&self, id: &str) -> bool {
        self.blobs.contains_key(id)
    }
}
