use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sound_assets::{ResourceSource, ShapeModel};

use crate::composition::{ComponentId, CompositionState, SoundComposition};
use crate::error::CompositionError;
use crate::track::{PointSource, TrackId};

/// Which of a component's tracks is audible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SoundVariant {
    Low,
    Medium,
    High,
}

/// Resource ids backing each variant. `Low` and `High` are always present;
/// `Medium` only in the three-tier layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantResources {
    low: String,
    medium: Option<String>,
    high: String,
}

impl VariantResources {
    pub fn two(low: impl Into<String>, high: impl Into<String>) -> Self {
        Self {
            low: low.into(),
            medium: None,
            high: high.into(),
        }
    }

    pub fn three(low: impl Into<String>, medium: impl Into<String>, high: impl Into<String>) -> Self {
        Self {
            low: low.into(),
            medium: Some(medium.into()),
            high: high.into(),
        }
    }

    /// The low/high pair a catalog shape ships with.
    pub fn for_shape(model: ShapeModel) -> Self {
        Self::two(model.low_sound_resource(), model.high_sound_resource())
    }

    pub fn resource(&self, variant: SoundVariant) -> Option<&str> {
        match variant {
            SoundVariant::Low => Some(&self.low),
            SoundVariant::Medium => self.medium.as_deref(),
            SoundVariant::High => Some(&self.high),
        }
    }

    pub fn has(&self, variant: SoundVariant) -> bool {
        self.resource(variant).is_some()
    }

    /// Present variants, low to high.
    pub fn iter(&self) -> impl Iterator<Item = (SoundVariant, &str)> {
        [SoundVariant::Low, SoundVariant::Medium, SoundVariant::High]
            .into_iter()
            .filter_map(|v| self.resource(v).map(|r| (v, r)))
    }
}

/// Snapshot handed to property listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentStatus {
    pub id: ComponentId,
    pub playing: bool,
    pub variant: SoundVariant,
    pub attached: bool,
    pub detached: bool,
    pub composition_state: CompositionState,
}

impl ComponentStatus {
    /// Audible right now: playing, and the whole mix is playing.
    pub fn is_audible(&self) -> bool {
        self.playing && self.composition_state == CompositionState::Playing
    }
}

pub type PropertyListener = Arc<dyn Fn(&ComponentStatus) + Send + Sync>;

/// Per-shape handle onto a component of a [`SoundComposition`].
///
/// Created together with its shape, before any sound is loaded. Once
/// detached it cannot be attached again.
#[derive(Clone)]
pub struct SoundComponent {
    composition: Arc<SoundComposition>,
    id: ComponentId,
}

impl SoundComponent {
    pub fn new(composition: &Arc<SoundComposition>, resources: VariantResources, default_variant: SoundVariant) -> Self {
        let id = composition.create_component(resources, default_variant);
        Self {
            composition: composition.clone(),
            id,
        }
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn composition(&self) -> &Arc<SoundComposition> {
        &self.composition
    }

    pub fn attach(&self, source: &PointSource) -> Result<(), CompositionError> {
        self.composition.register_component(self.id, source)
    }

    pub fn load_sounds(&self, resources: &dyn ResourceSource) -> Result<(), CompositionError> {
        self.composition.load_component_sounds(self.id, resources)
    }

    pub fn detach(&self) -> Result<(), CompositionError> {
        self.composition.detach_component(self.id)
    }

    pub fn play(&self) -> Result<(), CompositionError> {
        self.composition.play_sound(self.id)
    }

    pub fn stop(&self) -> Result<(), CompositionError> {
        self.composition.stop_sound(self.id)
    }

    pub fn is_playing(&self) -> bool {
        self.status().is_some_and(|s| s.playing)
    }

    pub fn variant(&self) -> SoundVariant {
        self.status().map_or(SoundVariant::Low, |s| s.variant)
    }

    pub fn set_variant(&self, variant: SoundVariant) -> Result<(), CompositionError> {
        self.composition.replace_sound(self.id, variant)
    }

    pub fn status(&self) -> Option<ComponentStatus> {
        self.composition.status(self.id)
    }

    pub fn track(&self, variant: SoundVariant) -> Option<TrackId> {
        self.composition.track_of(self.id, variant)
    }

    /// Called synchronously after every change to this component, including
    /// composition play/stop. Replaces any earlier listener.
    pub fn on_property_changed<F>(&self, listener: F) -> Result<(), CompositionError>
    where
        F: Fn(&ComponentStatus) + Send + Sync + 'static,
    {
        self.composition.set_listener(self.id, Arc::new(listener))
    }
}

impl std::fmt::Debug for SoundComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundComponent").field("id", &self.id).finish()
    }
}
