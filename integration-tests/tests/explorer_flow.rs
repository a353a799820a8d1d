use std::sync::Arc;

use glam::Vec3;
use integration_tests::write_asset_tree;
use shape_objects::{ExplorerConfig, SoundExplorer};
use sound_assets::{AssetManager, CachedModelRepository, GlbFileLoader, ShapeModel};
use sound_system::{CompositionState, RecordingHost, SoundVariant, SpatialTrack};

fn explorer_from_disk(config: ExplorerConfig) -> (tempfile::TempDir, Arc<RecordingHost>, SoundExplorer) {
    let dir = tempfile::tempdir().unwrap();
    write_asset_tree(dir.path()).unwrap();
    let config = ExplorerConfig {
        asset_dir: dir.path().to_path_buf(),
        ..config
    };
    let resources = AssetManager::from_dir(config.sound_dir()).unwrap();
    let models = CachedModelRepository::new(GlbFileLoader::new(config.asset_dir.clone()));
    let host = Arc::new(RecordingHost::new());
    let explorer = SoundExplorer::initialize(config, host.clone(), &resources, &models).unwrap();
    assert_eq!(models.cached_len(), 9);
    (dir, host, explorer)
}

#[test]
fn first_play_starts_all_eighteen_tracks_and_writes_each_volume_once() {
    let config = ExplorerConfig {
        autoplay: false,
        ..ExplorerConfig::default()
    };
    let (_dir, host, explorer) = explorer_from_disk(config);
    assert_eq!(explorer.state(), CompositionState::Ready);
    assert_eq!(host.created(), 18);

    let writes_before = host.volume_calls();
    assert_eq!(explorer.toggle_playback(), CompositionState::Playing);
    assert_eq!(host.play_calls(), 18);
    assert_eq!(host.volume_calls() - writes_before, 18);
    assert_eq!(host.play_order(), (0..18).collect::<Vec<_>>());

    // a second play after stop restarts nothing
    explorer.toggle_playback();
    explorer.toggle_playback();
    assert_eq!(host.play_calls(), 18);
}

#[test]
fn spawn_lift_and_recall_drive_track_volumes() {
    let (_dir, host, explorer) = explorer_from_disk(ExplorerConfig::default());
    let twistbud = explorer.shape(ShapeModel::Twistbud);
    let low = twistbud.component().track(SoundVariant::Low).unwrap();
    let high = twistbud.component().track(SoundVariant::High).unwrap();

    explorer.spawn_shape(ShapeModel::Twistbud).unwrap();
    assert_eq!(host.track(low.0).unwrap().volume(), 1.0);
    assert_eq!(host.track(high.0).unwrap().volume(), 0.0);

    let spawned_at = twistbud.entity().pose().translation;
    let lifted = explorer
        .drag_shape(ShapeModel::Twistbud, spawned_at + Vec3::Y * 0.4)
        .unwrap();
    assert_eq!(lifted, Some(SoundVariant::High));
    assert_eq!(host.track(low.0).unwrap().volume(), 0.0);
    assert_eq!(host.track(high.0).unwrap().volume(), 1.0);

    // tracks follow the shape
    let source = host.track(high.0).unwrap().source().position();
    assert!(source.abs_diff_eq(spawned_at + Vec3::Y * 0.4, 1e-6));

    explorer.recall_shape(ShapeModel::Twistbud).unwrap();
    assert!(host.volumes().iter().all(|v| *v == 0.0));
}

#[test]
fn tapping_after_a_global_stop_restarts_with_only_that_shape() {
    let (_dir, _host, explorer) = explorer_from_disk(ExplorerConfig::default());
    explorer.spawn_shape(ShapeModel::Cello).unwrap();
    explorer.spawn_shape(ShapeModel::Pumpod).unwrap();
    explorer.toggle_playback();
    assert_eq!(explorer.state(), CompositionState::Stopped);

    explorer.tap_shape(ShapeModel::Pumpod).unwrap();
    assert_eq!(explorer.state(), CompositionState::Playing);
    assert!(explorer.shape(ShapeModel::Pumpod).component().is_playing());
    assert!(!explorer.shape(ShapeModel::Cello).component().is_playing());
}

#[test]
fn state_stream_reports_lifecycle() {
    let (_dir, _host, explorer) = explorer_from_disk(ExplorerConfig::default());
    let rx = explorer.subscribe();
    explorer.on_pause();
    explorer.on_resume();
    let states: Vec<_> = rx.try_iter().collect();
    assert_eq!(
        states,
        vec![CompositionState::Playing, CompositionState::Stopped, CompositionState::Playing]
    );
}

#[test]
fn missing_model_file_leaves_other_shapes_usable() {
    let dir = tempfile::tempdir().unwrap();
    write_asset_tree(dir.path()).unwrap();
    std::fs::remove_file(dir.path().join(ShapeModel::Swirlnut.asset_name())).unwrap();

    let config = ExplorerConfig {
        asset_dir: dir.path().to_path_buf(),
        ..ExplorerConfig::default()
    };
    let resources = AssetManager::from_dir(config.sound_dir()).unwrap();
    let models = CachedModelRepository::new(GlbFileLoader::new(config.asset_dir.clone()));
    let explorer = SoundExplorer::initialize(config, Arc::new(RecordingHost::new()), &resources, &models).unwrap();

    assert!(!explorer.is_available(ShapeModel::Swirlnut));
    assert!(explorer.spawn_shape(ShapeModel::Swirlnut).is_err());
    assert!(explorer.spawn_shape(ShapeModel::Squube).unwrap());
    assert_eq!(explorer.state(), CompositionState::Playing);
}
