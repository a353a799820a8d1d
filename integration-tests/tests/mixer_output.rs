use std::sync::Arc;

use audio_backend::mock_backend::MockAudioBackend;
use audio_backend::AudioBackend;
use integration_tests::{peak, write_asset_tree};
use shape_objects::{ExplorerConfig, SoundExplorer};
use sound_assets::{AssetManager, CachedModelRepository, GlbFileLoader, ShapeModel};
use sound_system::{render_fn_for_mixer, Mixer, SpatialTrack};

fn rig() -> (tempfile::TempDir, Arc<Mixer>, MockAudioBackend, SoundExplorer) {
    let dir = tempfile::tempdir().unwrap();
    write_asset_tree(dir.path()).unwrap();
    let config = ExplorerConfig {
        asset_dir: dir.path().to_path_buf(),
        ..ExplorerConfig::default()
    };
    let mixer = Arc::new(Mixer::new());
    let mut backend = MockAudioBackend::new();
    backend.start(render_fn_for_mixer(mixer.clone())).unwrap();

    let resources = AssetManager::from_dir(config.sound_dir()).unwrap();
    let models = CachedModelRepository::new(GlbFileLoader::new(config.asset_dir.clone()));
    let explorer = SoundExplorer::initialize(config, mixer.clone(), &resources, &models).unwrap();
    mixer.set_listener_position(explorer.head_pose().translation);
    (dir, mixer, backend, explorer)
}

#[test]
fn nothing_is_heard_until_a_shape_is_spawned() {
    let (_dir, mixer, backend, _explorer) = rig();
    assert_eq!(mixer.track_count(), 18);
    let out = backend.pump(1024);
    assert_eq!(peak(&out), 0.0);
    assert_eq!(backend.frames_since_start(), 1024);
}

#[test]
fn spawned_shape_is_heard_and_fades_out_on_stop() {
    let (_dir, _mixer, backend, explorer) = rig();
    explorer.spawn_shape(ShapeModel::Bloomspire).unwrap();
    backend.pump(512);
    let out = backend.pump(1024);
    assert!(peak(&out) > 0.05, "peak {}", peak(&out));

    explorer.toggle_playback();
    // release ramp is 50 ms
    backend.pump(48_000 / 20 + 256);
    assert_eq!(peak(&backend.pump(512)), 0.0);
}

#[test]
fn all_tracks_stay_aligned_while_muted() {
    let (_dir, mixer, backend, explorer) = rig();
    for _ in 0..10 {
        backend.pump(1000);
    }
    explorer.spawn_shape(ShapeModel::Munchkin).unwrap();
    backend.pump(333);

    let tracks = mixer.tracks();
    let first = tracks[0].playhead();
    assert!(tracks.iter().all(|t| (t.playhead() - first).abs() < 1e-6));
}

#[test]
fn shutdown_empties_the_mix() {
    let (_dir, mixer, backend, explorer) = rig();
    explorer.spawn_shape(ShapeModel::Pluff).unwrap();
    explorer.shutdown();
    assert_eq!(peak(&backend.pump(256)), 0.0);
    assert_eq!(mixer.track_count(), 0);
    assert!(mixer.tracks().iter().all(|t| t.is_released()));
}
