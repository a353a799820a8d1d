use sound_assets::{
    AssetManager, CachedModelRepository, GlbFileLoader, ModelRepository, ResourceSource, ShapeModel,
    encode_glb, encode_wav, parse_wav,
};
use tempfile::tempdir;

#[test]
fn every_catalog_sample_resolves_from_a_bundle_dir() {
    let dir = tempdir().unwrap();
    for model in ShapeModel::ALL {
        for id in [model.low_sound_resource(), model.high_sound_resource()] {
            let samples: Vec<i16> = (0..64).map(|i| (i * 100) as i16).collect();
            std::fs::write(dir.path().join(format!("{id}.wav")), encode_wav(&samples, 1, 44_100)).unwrap();
        }
    }

    let bundle = AssetManager::from_dir(dir.path()).unwrap();
    assert_eq!(bundle.len(), 18);
    for model in ShapeModel::ALL {
        let bytes = bundle.open(model.low_sound_resource()).unwrap();
        let clip = parse_wav(&bytes).unwrap();
        assert_eq!(clip.frames(1), 64);
    }
}

#[test]
fn repository_loads_catalog_models_from_disk() {
    let dir = tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("glb")).unwrap();
    std::fs::write(
        dir.path().join(ShapeModel::Pumpod.asset_name()),
        encode_glb(r#"{"asset":{"version":"2.0"}}"#),
    )
    .unwrap();

    let repo = CachedModelRepository::new(GlbFileLoader::new(dir.path()));
    let model = repo.get_or_load_model(ShapeModel::Pumpod).unwrap();
    assert_eq!(model.asset_name, "glb/pumpod_animated.glb");
    assert!(model.json.contains("2.0"));

    // not on disk yet, so it fails and nothing is cached
    assert!(repo.get_or_load_model(ShapeModel::Pluff).is_err());
    assert_eq!(repo.cached_len(), 1);

    std::fs::write(dir.path().join(ShapeModel::Pluff.asset_name()), encode_glb("{}")).unwrap();
    assert!(repo.get_or_load_model(ShapeModel::Pluff).is_ok());
    assert_eq!(repo.cached_len(), 2);
}
