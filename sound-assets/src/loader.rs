use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use crate::catalog::ShapeModel;
use crate::util::{read_u32_le, AssetError, GLB_JSON_CHUNK, GLB_MAGIC, MAX_GLB_BYTES};

/// A validated binary glTF model.
///
/// Only the container is checked here; scene parsing belongs to whatever
/// renders the shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    pub asset_name: String,
    pub version: u32,
    pub json: String,
    pub bytes: Arc<[u8]>,
}

/// Loads a model by asset name.
pub trait ModelLoader: Send + Sync {
    fn load(&self, asset_name: &str) -> Result<Model, AssetError>;
}

/// Reads `.glb` files under a root directory.
#[derive(Debug, Clone)]
pub struct GlbFileLoader {
    root: PathBuf,
}

impl GlbFileLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ModelLoader for GlbFileLoader {
    fn load(&self, asset_name: &str) -> Result<Model, AssetError> {
        let path = self.root.join(asset_name);
        let file = std::fs::File::open(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AssetError::NotFound(asset_name.to_string()),
            _ => AssetError::Io(e),
        })?;
        let mut bytes = Vec::new();
        file.take(MAX_GLB_BYTES + 1).read_to_end(&mut bytes)?;
        if bytes.len() as u64 > MAX_GLB_BYTES {
            return Err(AssetError::ResourceLimit(format!("{} exceeds model size cap", asset_name)));
        }
        parse_glb(asset_name, bytes)
    }
}

/// Validate a GLB container: 12-byte header (`glTF`, version 2, total
/// length) followed by a JSON chunk.
pub fn parse_glb(asset_name: &str, bytes: Vec<u8>) -> Result<Model, AssetError> {
    let invalid = |reason: &str| AssetError::InvalidModel {
        asset: asset_name.to_string(),
        reason: reason.to_string(),
    };
    if bytes.get(0..4) != Some(GLB_MAGIC.as_slice()) {
        return Err(invalid("missing glTF magic"));
    }
    let version = read_u32_le(&bytes, 4).ok_or_else(|| invalid("truncated header"))?;
    if version != 2 {
        return Err(invalid(&format!("unsupported version {}", version)));
    }
    let total = read_u32_le(&bytes, 8).ok_or_else(|| invalid("truncated header"))? as usize;
    if total > bytes.len() {
        return Err(invalid("declared length exceeds file size"));
    }
    let chunk_len = read_u32_le(&bytes, 12).ok_or_else(|| invalid("missing JSON chunk"))? as usize;
    let chunk_type = read_u32_le(&bytes, 16).ok_or_else(|| invalid("missing JSON chunk"))?;
    if chunk_type != GLB_JSON_CHUNK {
        return Err(invalid("first chunk is not JSON"));
    }
    let json = bytes
        .get(20..20 + chunk_len)
        .ok_or_else(|| invalid("JSON chunk truncated"))?;
    let json = std::str::from_utf8(json)
        .map_err(|_| invalid("JSON chunk is not UTF-8"))?
        .trim_end_matches(' ')
        .to_string();

    Ok(Model {
        asset_name: asset_name.to_string(),
        version,
        json,
        bytes: bytes.into(),
    })
}

/// Build a minimal GLB container around `json`, padded to four bytes.
pub fn encode_glb(json: &str) -> Vec<u8> {
    let mut json = json.as_bytes().to_vec();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let total = 12 + 8 + json.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(GLB_MAGIC);
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(&GLB_JSON_CHUNK.to_le_bytes());
    out.extend_from_slice(&json);
    out
}

/// Gets models by catalog entry, loading them on first use.
pub trait ModelRepository: Send + Sync {
    /// Returns the cached model or loads it. Concurrent requests for the same
    /// model share one load.
    fn get_or_load_model(&self, model: ShapeModel) -> Result<Arc<Model>, AssetError>;

    /// Drop every cached model.
    fn clear(&self);
}

/// [`ModelRepository`] with an LRU cache sized to the catalog.
///
/// Failed loads are not cached, so a later request tries again.
pub struct CachedModelRepository<L: ModelLoader> {
    loader: L,
    cache: Mutex<LruCache<ShapeModel, Arc<Model>>>,
    // one gate per model so concurrent callers wait for a single load
    loading: Mutex<HashMap<ShapeModel, Arc<Mutex<()>>>>,
}

impl<L: ModelLoader> CachedModelRepository<L> {
    pub fn new(loader: L) -> Self {
        let cap = std::num::NonZeroUsize::new(ShapeModel::ALL.len()).unwrap_or(std::num::NonZeroUsize::MIN);
        Self {
            loader,
            cache: Mutex::new(LruCache::new(cap)),
            loading: Mutex::new(HashMap::new()),
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn cached_len(&self) -> usize {
        self.cache.lock().len()
    }

    fn cached(&self, model: ShapeModel) -> Option<Arc<Model>> {
        self.cache.lock().get(&model).cloned()
    }
}

impl<L: ModelLoader> ModelRepository for CachedModelRepository<L> {
    fn get_or_load_model(&self, model: ShapeModel) -> Result<Arc<Model>, AssetError> {
        if let Some(found) = self.cached(model) {
            return Ok(found);
        }

        let gate = self.loading.lock().entry(model).or_default().clone();
        let _loading = gate.lock();

        // Another caller may have finished while we waited on the gate.
        if let Some(found) = self.cached(model) {
            return Ok(found);
        }

        // the model is cached before its gate goes away
        let result = self.loader.load(model.asset_name()).map(|loaded| {
            let loaded = Arc::new(loaded);
            self.cache.lock().put(model, loaded.clone());
            loaded
        });
        self.loading.lock().remove(&model);
        match &result {
            Ok(_) => tracing::debug!(%model, "model loaded"),
            Err(e) => tracing::warn!(%model, error = %e, "model load failed"),
        }
        result
    }

    fn clear(&self) {
        self.cache.lock().clear();
        self.loading.lock().clear();
    }
}
