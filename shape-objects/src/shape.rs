use std::sync::Arc;
use std::time::Duration;

use glam::{Quat, Vec3};
use parking_lot::Mutex;
use sound_assets::{Model, ModelRepository, ResourceSource, ShapeModel};
use sound_system::{CompositionState, SoundComponent, SoundComposition, SoundVariant, VariantResources};

use crate::entity::{Pose, ShapeEntity};
use crate::error::ShapeError;
use crate::height_switch::VariantHeightSwitch;
use crate::simulation::SimulationLoop;

/// Degrees per second about the diagonal axis, at full low weight.
const LOW_SPIN_DEG: f32 = 40.0;
/// Degrees per second about X, at full high weight.
const HIGH_SPIN_DEG: f32 = 70.0;

/// How much each spin contributes for a variant.
pub fn rotation_weights(variant: SoundVariant) -> (f32, f32) {
    match variant {
        SoundVariant::Low => (1.0, 0.0),
        SoundVariant::Medium => (0.5, 0.5),
        SoundVariant::High => (0.0, 1.0),
    }
}

/// Rotation after spinning for `dt` seconds.
pub fn spin(rotation: Quat, variant: SoundVariant, dt: f64) -> Quat {
    let (low, high) = rotation_weights(variant);
    let dt = dt as f32;
    rotation
        * Quat::from_axis_angle(Vec3::ONE.normalize(), (LOW_SPIN_DEG * dt * low).to_radians())
        * Quat::from_axis_angle(Vec3::X, (HIGH_SPIN_DEG * dt * high).to_radians())
}

/// Tuning for the per-shape behaviours.
#[derive(Debug, Clone, Copy)]
pub struct BehaviorSettings {
    pub height_to_change_sound: f32,
    pub debounce: f32,
    pub tick: Duration,
}

impl Default for BehaviorSettings {
    fn default() -> Self {
        Self {
            height_to_change_sound: VariantHeightSwitch::DEFAULT_HEIGHT_TO_CHANGE,
            debounce: VariantHeightSwitch::DEFAULT_DEBOUNCE,
            tick: SimulationLoop::DEFAULT_TICK,
        }
    }
}

struct Behaviors {
    model: Arc<Model>,
    switch: VariantHeightSwitch,
    simulation: SimulationLoop,
}

/// One spawnable shape: its entity, its sound component and, once
/// initialized, its model and behaviours.
pub struct ShapeObject {
    model: ShapeModel,
    entity: Arc<ShapeEntity>,
    component: SoundComponent,
    behaviors: Mutex<Option<Behaviors>>,
}

impl ShapeObject {
    /// Build the entity (hidden) and attach a sound component to it. Tracks
    /// bind to the entity, so this comes before any sound is loaded.
    pub fn create(composition: &Arc<SoundComposition>, model: ShapeModel) -> Result<Self, ShapeError> {
        let entity = Arc::new(ShapeEntity::new(model.name(), Pose::IDENTITY));
        entity.set_hidden(true);
        let component = SoundComponent::new(composition, VariantResources::for_shape(model), SoundVariant::Low);
        component.attach(entity.source())?;
        Ok(Self {
            model,
            entity,
            component,
            behaviors: Mutex::new(None),
        })
    }

    pub fn model(&self) -> ShapeModel {
        self.model
    }

    pub fn entity(&self) -> &Arc<ShapeEntity> {
        &self.entity
    }

    pub fn component(&self) -> &SoundComponent {
        &self.component
    }

    pub fn load_sounds(&self, resources: &dyn ResourceSource) -> Result<(), ShapeError> {
        self.component.load_sounds(resources)?;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.behaviors.lock().is_some()
    }

    pub fn loaded_model(&self) -> Option<Arc<Model>> {
        self.behaviors.lock().as_ref().map(|b| b.model.clone())
    }

    /// Fetch the model and start the rotation loop. A missing model is fatal
    /// for this shape. Calling again after success does nothing.
    pub fn initialize_model_and_behaviors(
        &self,
        repo: &dyn ModelRepository,
        settings: BehaviorSettings,
    ) -> Result<(), ShapeError> {
        let mut behaviors = self.behaviors.lock();
        if behaviors.is_some() {
            return Ok(());
        }

        let model = repo
            .get_or_load_model(self.model)
            .map_err(|source| ShapeError::ModelLoad { model: self.model, source })?;

        let variant = Arc::new(Mutex::new(self.component.variant()));
        let entity = self.entity.clone();
        let spin_variant = variant.clone();
        let audible = self.component.status().is_some_and(|s| s.is_audible());
        let simulation = SimulationLoop::start(self.model.name(), settings.tick, !audible, move |dt| {
            let v = *spin_variant.lock();
            entity.rotate_by(|r| spin(r, v, dt));
        })
        .map_err(ShapeError::Thread)?;

        let control = simulation.control();
        self.component.on_property_changed(move |status| {
            *variant.lock() = status.variant;
            control.set_paused(!status.is_audible());
        })?;

        let switch = VariantHeightSwitch::new(
            self.entity.pose().translation.y,
            settings.height_to_change_sound,
            settings.debounce,
        );
        *behaviors = Some(Behaviors { model, switch, simulation });
        tracing::debug!(shape = %self.model, "model and behaviors initialized");
        Ok(())
    }

    /// Tap: start this shape (restarting the mix if it was stopped) or
    /// toggle it.
    pub fn tap(&self) -> Result<(), ShapeError> {
        let composition = self.component.composition();
        if composition.state() == CompositionState::Stopped {
            composition.stop_all_sound_components();
            self.component.play()?;
            composition.play();
        } else if !self.component.is_playing() {
            self.component.play()?;
        } else {
            self.component.stop()?;
        }
        Ok(())
    }

    /// Move the shape and switch variant if it crossed the height line.
    pub fn drag_to(&self, translation: Vec3) -> Result<Option<SoundVariant>, ShapeError> {
        self.entity.set_translation(translation);
        let switch = match self.behaviors.lock().as_ref() {
            Some(b) => b.switch,
            None => return Ok(None),
        };
        let next = switch.on_move(translation.y, self.component.variant());
        if let Some(v) = next {
            self.component.set_variant(v)?;
            tracing::debug!(shape = %self.model, variant = ?v, height = translation.y, "variant switched by height");
        }
        Ok(next)
    }

    /// Show the shape at `pose` and start it.
    pub fn spawn_at(&self, pose: Pose) -> Result<(), ShapeError> {
        if !self.is_initialized() {
            return Err(ShapeError::NotInitialized(self.model));
        }
        self.entity.set_pose(pose);
        if let Some(b) = self.behaviors.lock().as_mut() {
            b.switch.rebase(pose.translation.y);
        }
        self.entity.set_hidden(false);
        self.component.play()?;
        Ok(())
    }

    /// Stop and hide the shape.
    pub fn recall(&self) -> Result<(), ShapeError> {
        self.component.stop()?;
        self.entity.set_hidden(true);
        Ok(())
    }

    pub fn is_spawned(&self) -> bool {
        !self.entity.is_hidden()
    }

    pub fn is_spinning(&self) -> bool {
        self.behaviors
            .lock()
            .as_ref()
            .is_some_and(|b| !b.simulation.is_paused())
    }
}

impl std::fmt::Debug for ShapeObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShapeObject")
            .field("model", &self.model)
            .field("component", &self.component)
            .finish()
    }
}
