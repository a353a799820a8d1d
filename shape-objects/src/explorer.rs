use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::Receiver;
use glam::Vec3;
use parking_lot::Mutex;
use sound_assets::{ModelRepository, ResourceSource, ShapeModel};
use sound_system::{CompositionState, SoundComposition, SoundManager, SoundVariant, TrackHost};

use crate::config::ExplorerConfig;
use crate::entity::Pose;
use crate::error::ShapeError;
use crate::shape::{BehaviorSettings, ShapeObject};

/// Owns the mix and the nine shapes, and turns user commands into calls on
/// them.
pub struct SoundExplorer {
    config: ExplorerConfig,
    manager: Arc<SoundManager>,
    composition: Arc<SoundComposition>,
    shapes: Vec<ShapeObject>,
    failed: BTreeMap<ShapeModel, String>,
    head: Mutex<Pose>,
    play_on_resume: AtomicBool,
}

impl SoundExplorer {
    /// Build every shape, load all sounds in load order, then fetch models.
    ///
    /// A shape whose sounds or model fail to load is recorded and can't be
    /// spawned; the others still work.
    pub fn initialize(
        config: ExplorerConfig,
        host: Arc<dyn TrackHost>,
        resources: &dyn ResourceSource,
        models: &dyn ModelRepository,
    ) -> Result<Self, ShapeError> {
        config.validate()?;
        let manager = Arc::new(SoundManager::new(host));
        let composition = SoundComposition::with_expected_components(manager.clone(), ShapeModel::ALL.len());

        let mut shapes = Vec::with_capacity(ShapeModel::ALL.len());
        for model in ShapeModel::ALL {
            shapes.push(ShapeObject::create(&composition, model)?);
        }

        let mut failed = BTreeMap::new();
        for model in ShapeModel::LOAD_ORDER {
            let shape = &shapes[model.index()];
            if let Err(e) = shape.load_sounds(resources) {
                tracing::error!(shape = %model, error = %e, "sound load failed; shape removed from the mix");
                shape.component().detach()?;
                failed.insert(model, e.to_string());
            }
        }

        let settings = BehaviorSettings {
            height_to_change_sound: config.height_to_change_sound,
            debounce: config.debounce,
            tick: Duration::from_millis(config.simulation_tick_ms),
        };
        for shape in &shapes {
            if failed.contains_key(&shape.model()) {
                continue;
            }
            if let Err(e) = shape.initialize_model_and_behaviors(models, settings) {
                tracing::error!(shape = %shape.model(), error = %e, "shape unavailable");
                failed.insert(shape.model(), e.to_string());
            }
        }

        let head = Pose::from_translation(Vec3::new(0.0, config.listener_height, 0.0));
        let explorer = Self {
            config,
            manager,
            composition,
            shapes,
            failed,
            head: Mutex::new(head),
            play_on_resume: AtomicBool::new(false),
        };

        tracing::info!(
            tracks = explorer.manager.track_count(),
            unavailable = explorer.failed.len(),
            state = ?explorer.composition.state(),
            "explorer initialized"
        );
        if explorer.config.autoplay {
            explorer.composition.play();
        }
        Ok(explorer)
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    pub fn manager(&self) -> &Arc<SoundManager> {
        &self.manager
    }

    pub fn composition(&self) -> &Arc<SoundComposition> {
        &self.composition
    }

    pub fn state(&self) -> CompositionState {
        self.composition.state()
    }

    pub fn subscribe(&self) -> Receiver<CompositionState> {
        self.composition.subscribe()
    }

    pub fn shape(&self, model: ShapeModel) -> &ShapeObject {
        &self.shapes[model.index()]
    }

    pub fn shapes(&self) -> &[ShapeObject] {
        &self.shapes
    }

    /// Shapes that could not be set up, with the reason.
    pub fn unavailable(&self) -> &BTreeMap<ShapeModel, String> {
        &self.failed
    }

    pub fn is_available(&self, model: ShapeModel) -> bool {
        !self.failed.contains_key(&model)
    }

    pub fn head_pose(&self) -> Pose {
        *self.head.lock()
    }

    pub fn set_head_pose(&self, pose: Pose) {
        *self.head.lock() = pose;
    }

    /// Where a shape appears: in front of the head at the configured distance.
    pub fn spawn_pose(&self) -> Pose {
        self.head_pose()
            .transform(Pose::from_translation(Vec3::NEG_Z * self.config.spawn_distance))
    }

    /// Place a shape in front of the user and start it. Returns false if it
    /// was already out.
    pub fn spawn_shape(&self, model: ShapeModel) -> Result<bool, ShapeError> {
        let shape = self.shape(model);
        if shape.is_spawned() {
            return Ok(false);
        }
        shape.spawn_at(self.spawn_pose())?;
        tracing::info!(shape = %model, "spawned");
        Ok(true)
    }

    /// Stop and hide a shape. Returns false if it was not out.
    pub fn recall_shape(&self, model: ShapeModel) -> Result<bool, ShapeError> {
        let shape = self.shape(model);
        if !shape.is_spawned() {
            return Ok(false);
        }
        shape.recall()?;
        tracing::info!(shape = %model, "recalled");
        Ok(true)
    }

    /// Spawn if hidden, recall if out.
    pub fn toggle_shape(&self, model: ShapeModel) -> Result<bool, ShapeError> {
        if self.shape(model).is_spawned() {
            self.recall_shape(model)
        } else {
            self.spawn_shape(model)
        }
    }

    /// Recall everything.
    pub fn restart_shapes(&self) -> Result<(), ShapeError> {
        for shape in self.shapes.iter().filter(|s| s.is_spawned()) {
            shape.recall()?;
        }
        tracing::info!("all shapes recalled");
        Ok(())
    }

    pub fn spawned_shapes(&self) -> Vec<ShapeModel> {
        self.shapes
            .iter()
            .filter(|s| s.is_spawned())
            .map(|s| s.model())
            .collect()
    }

    pub fn has_spawned_shapes(&self) -> bool {
        self.shapes.iter().any(|s| s.is_spawned())
    }

    pub fn tap_shape(&self, model: ShapeModel) -> Result<(), ShapeError> {
        self.shape(model).tap()
    }

    /// Move a spawned shape; returns the variant it switched to, if any.
    pub fn drag_shape(&self, model: ShapeModel, translation: Vec3) -> Result<Option<SoundVariant>, ShapeError> {
        self.shape(model).drag_to(translation)
    }

    /// Global play/stop. Returns the state afterwards.
    pub fn toggle_playback(&self) -> CompositionState {
        match self.composition.state() {
            CompositionState::Playing => {
                self.composition.stop();
            }
            CompositionState::Ready | CompositionState::Stopped => {
                self.composition.play();
            }
            CompositionState::Loading => {
                tracing::warn!("playback toggled while sounds are still loading");
            }
        }
        self.composition.state()
    }

    /// App went to the background: silence the mix and remember whether it
    /// was playing.
    pub fn on_pause(&self) {
        let was_playing = self.composition.stop();
        self.play_on_resume.store(was_playing, Ordering::SeqCst);
        tracing::debug!(was_playing, "paused");
    }

    pub fn on_resume(&self) {
        if self.play_on_resume.swap(false, Ordering::SeqCst) {
            self.composition.play();
        }
    }

    /// Release every track. The explorer is inert afterwards.
    pub fn shutdown(&self) {
        self.composition.stop();
        self.manager.close();
    }
}

impl Drop for SoundExplorer {
    fn drop(&mut self) {
        self.manager.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{catalog_sounds, catalog_sounds_without, FakeModels};
    use sound_assets::MemoryResources;
    use sound_system::{RecordingHost, SpatialTrack};

    fn explorer_with(
        config: ExplorerConfig,
        resources: &MemoryResources,
        models: &FakeModels,
    ) -> (Arc<RecordingHost>, SoundExplorer) {
        let host = Arc::new(RecordingHost::new());
        let explorer = SoundExplorer::initialize(config, host.clone(), resources, models).unwrap();
        (host, explorer)
    }

    fn explorer() -> (Arc<RecordingHost>, SoundExplorer) {
        explorer_with(ExplorerConfig::default(), &catalog_sounds(), &FakeModels::all())
    }

    #[test]
    fn initialize_loads_eighteen_tracks_in_load_order_and_autoplays() {
        let (host, explorer) = explorer();
        assert_eq!(explorer.manager().track_count(), 18);
        assert_eq!(explorer.state(), CompositionState::Playing);
        assert_eq!(host.play_calls(), 18);
        assert_eq!(host.volumes(), vec![0.0; 18]);

        // first two tracks belong to the first shape in load order
        let cello = explorer.shape(ShapeModel::Cello).component().clone();
        assert_eq!(cello.track(SoundVariant::Low).map(|t| t.0), Some(0));
        assert_eq!(cello.track(SoundVariant::High).map(|t| t.0), Some(1));
        assert!(explorer.unavailable().is_empty());
    }

    #[test]
    fn spawn_places_shape_in_front_and_makes_it_audible() {
        let (host, explorer) = explorer();
        assert!(explorer.spawn_shape(ShapeModel::Pluff).unwrap());
        assert!(!explorer.spawn_shape(ShapeModel::Pluff).unwrap());

        let pose = explorer.shape(ShapeModel::Pluff).entity().pose();
        assert!(pose.translation.abs_diff_eq(Vec3::new(0.0, 1.6, -1.0), 1e-6));
        assert_eq!(explorer.spawned_shapes(), vec![ShapeModel::Pluff]);

        let low = explorer.shape(ShapeModel::Pluff).component().track(SoundVariant::Low).unwrap();
        assert_eq!(host.track(low.0).unwrap().volume(), 1.0);

        assert!(explorer.recall_shape(ShapeModel::Pluff).unwrap());
        assert!(!explorer.has_spawned_shapes());
        assert_eq!(host.track(low.0).unwrap().volume(), 0.0);
    }

    #[test]
    fn spawn_follows_the_head() {
        let (_host, explorer) = explorer();
        explorer.set_head_pose(Pose::new(
            Vec3::new(2.0, 1.5, 0.0),
            glam::Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
        ));
        explorer.spawn_shape(ShapeModel::Squube).unwrap();
        let t = explorer.shape(ShapeModel::Squube).entity().pose().translation;
        assert!(t.abs_diff_eq(Vec3::new(1.0, 1.5, 0.0), 1e-5));
    }

    #[test]
    fn restart_recalls_everything() {
        let (host, explorer) = explorer();
        explorer.spawn_shape(ShapeModel::Pumpod).unwrap();
        explorer.spawn_shape(ShapeModel::Munchkin).unwrap();
        explorer.restart_shapes().unwrap();
        assert!(explorer.spawned_shapes().is_empty());
        assert_eq!(host.volumes(), vec![0.0; 18]);
    }

    #[test]
    fn pause_and_resume_restore_playback() {
        let (_host, explorer) = explorer();
        explorer.on_pause();
        assert_eq!(explorer.state(), CompositionState::Stopped);
        explorer.on_resume();
        assert_eq!(explorer.state(), CompositionState::Playing);

        explorer.toggle_playback();
        explorer.on_pause();
        explorer.on_resume();
        assert_eq!(explorer.state(), CompositionState::Stopped);
    }

    #[test]
    fn missing_model_only_disables_that_shape() {
        let models = FakeModels::without(&[ShapeModel::Bloomspire]);
        let (_host, explorer) = explorer_with(ExplorerConfig::default(), &catalog_sounds(), &models);
        assert!(!explorer.is_available(ShapeModel::Bloomspire));
        assert!(matches!(
            explorer.spawn_shape(ShapeModel::Bloomspire),
            Err(ShapeError::NotInitialized(ShapeModel::Bloomspire))
        ));
        assert!(explorer.spawn_shape(ShapeModel::Cello).unwrap());
        assert_eq!(explorer.manager().track_count(), 18);
    }

    #[test]
    fn missing_sound_detaches_the_shape_and_the_rest_still_play() {
        let resources = catalog_sounds_without(&[ShapeModel::Pluff.high_sound_resource()]);
        let (host, explorer) = explorer_with(ExplorerConfig::default(), &resources, &FakeModels::all());
        assert!(!explorer.is_available(ShapeModel::Pluff));
        assert_eq!(explorer.state(), CompositionState::Playing);
        // Pluff's low track was built before the failure and stays silent
        assert_eq!(explorer.manager().track_count(), 17);
        assert_eq!(host.play_calls(), 17);
        assert!(explorer.spawn_shape(ShapeModel::Munchkin).unwrap());
    }

    #[test]
    fn without_autoplay_the_mix_waits() {
        let config = ExplorerConfig {
            autoplay: false,
            ..ExplorerConfig::default()
        };
        let (host, explorer) = explorer_with(config, &catalog_sounds(), &FakeModels::all());
        assert_eq!(explorer.state(), CompositionState::Ready);
        assert_eq!(host.play_calls(), 0);
        assert_eq!(explorer.toggle_playback(), CompositionState::Playing);
        assert_eq!(host.play_calls(), 18);
    }

    #[test]
    fn shutdown_releases_all_tracks() {
        let (host, explorer) = explorer();
        explorer.shutdown();
        assert_eq!(host.released(), 18);
        drop(explorer);
        assert_eq!(host.released(), 18);
    }
}
