//! Fixtures shared by the unit tests.

use std::collections::HashSet;
use std::sync::Arc;

use sound_assets::{
    encode_glb, encode_wav, parse_glb, AssetError, MemoryResources, Model, ModelRepository, ShapeModel,
};

fn loop_wav() -> Vec<u8> {
    let samples: Vec<i16> = (0..64).map(|i| (i * 97 % 2000) as i16 - 1000).collect();
    encode_wav(&samples, 1, 44_100)
}

/// Every sample the catalog references.
pub fn catalog_sounds() -> MemoryResources {
    catalog_sounds_without(&[])
}

pub fn catalog_sounds_without(missing: &[&str]) -> MemoryResources {
    let mut res = MemoryResources::new();
    for model in ShapeModel::ALL {
        for id in [model.low_sound_resource(), model.high_sound_resource()] {
            if !missing.contains(&id) {
                res.insert(id, loop_wav());
            }
        }
    }
    res
}

/// Builds tiny GLB models on demand; listed shapes report `NotFound`.
pub struct FakeModels {
    missing: HashSet<ShapeModel>,
}

impl FakeModels {
    pub fn all() -> Self {
        Self::without(&[])
    }

    pub fn without(missing: &[ShapeModel]) -> Self {
        Self {
            missing: missing.iter().copied().collect(),
        }
    }
}

impl ModelRepository for FakeModels {
    fn get_or_load_model(&self, model: ShapeModel) -> Result<Arc<Model>, AssetError> {
        if self.missing.contains(&model) {
            return Err(AssetError::NotFound(model.asset_name().to_string()));
        }
        let json = format!(r#"{{"asset":{{"version":"2.0"}},"scenes":[{{"name":"{}"}}]}}"#, model.name());
        parse_glb(model.asset_name(), encode_glb(&json)).map(Arc::new)
    }

    fn clear(&self) {}
}
