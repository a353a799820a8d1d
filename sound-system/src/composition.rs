//! The mix as a whole: which components take part, and whether it is
//! playing.
//!
//! Every track is started exactly once, the first time the composition
//! plays. From then on play, stop and variant changes are volume writes only,
//! so the loops never drift apart.

use std::collections::BTreeMap;
use std::sync::Arc;

use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use sound_assets::ResourceSource;

use crate::component::{ComponentStatus, PropertyListener, SoundVariant, VariantResources};
use crate::error::CompositionError;
use crate::manager::SoundManager;
use crate::track::{PointSource, TrackId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub usize);

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "c{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CompositionState {
    Loading,
    Ready,
    Playing,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadState {
    Unloaded,
    Loading,
    Loaded,
}

struct Entry {
    resources: VariantResources,
    variant: SoundVariant,
    playing: bool,
    tracks: BTreeMap<SoundVariant, TrackId>,
    source: Option<PointSource>,
    attached: bool,
    detached: bool,
    load: LoadState,
    listener: Option<PropertyListener>,
}

impl Entry {
    fn active_track(&self) -> Option<TrackId> {
        self.tracks.get(&self.variant).copied()
    }

    fn target_volume(&self, variant: SoundVariant) -> f32 {
        if self.playing && variant == self.variant { 1.0 } else { 0.0 }
    }
}

struct Inner {
    state: CompositionState,
    initialized: bool,
    expected: Option<usize>,
    entries: Vec<Entry>,
    members: Vec<ComponentId>,
    subscribers: Vec<Sender<CompositionState>>,
}

type Notifications = Vec<(PropertyListener, ComponentStatus)>;

impl Inner {
    fn entry_mut(&mut self, id: ComponentId) -> Result<&mut Entry, CompositionError> {
        self.entries.get_mut(id.0).ok_or(CompositionError::UnknownComponent(id))
    }

    fn live_entry_mut(&mut self, id: ComponentId) -> Result<&mut Entry, CompositionError> {
        let entry = self.entry_mut(id)?;
        if entry.detached {
            return Err(CompositionError::Detached(id));
        }
        Ok(entry)
    }

    fn frozen(&self) -> bool {
        self.initialized
    }

    fn status(&self, id: ComponentId) -> Option<ComponentStatus> {
        let e = self.entries.get(id.0)?;
        Some(ComponentStatus {
            id,
            playing: e.playing,
            variant: e.variant,
            attached: e.attached,
            detached: e.detached,
            composition_state: self.state,
        })
    }

    fn notification(&self, id: ComponentId) -> Option<(PropertyListener, ComponentStatus)> {
        let listener = self.entries.get(id.0)?.listener.clone()?;
        Some((listener, self.status(id)?))
    }

    /// Leave `Loading` once enough members have their sounds.
    fn check_ready(&mut self) {
        if let (CompositionState::Loading, Some(expected)) = (self.state, self.expected) {
            let ready = self
                .members
                .iter()
                .filter(|m| self.entries[m.0].load == LoadState::Loaded)
                .count();
            if ready >= expected {
                self.set_state(CompositionState::Ready);
            }
        }
    }

    fn set_state(&mut self, state: CompositionState) {
        if self.state == state {
            return;
        }
        tracing::debug!(from = ?self.state, to = ?state, "composition state");
        self.state = state;
        // unbounded sends never block
        self.subscribers.retain(|tx| tx.send(state).is_ok());
    }
}

/// Coordinates the components of one mix over a [`SoundManager`].
///
/// One lock guards membership, component state and the composition state.
/// It is held for bookkeeping and volume writes only; sound loading and
/// listener callbacks happen outside it.
pub struct SoundComposition {
    manager: Arc<SoundManager>,
    inner: Mutex<Inner>,
}

impl SoundComposition {
    /// A composition that is `Ready` immediately.
    pub fn new(manager: Arc<SoundManager>) -> Arc<Self> {
        Self::build(manager, CompositionState::Ready, None)
    }

    /// A composition that stays `Loading` until `count` attached components
    /// have loaded their sounds.
    pub fn with_expected_components(manager: Arc<SoundManager>, count: usize) -> Arc<Self> {
        let state = if count == 0 {
            CompositionState::Ready
        } else {
            CompositionState::Loading
        };
        Self::build(manager, state, Some(count))
    }

    fn build(manager: Arc<SoundManager>, state: CompositionState, expected: Option<usize>) -> Arc<Self> {
        Arc::new(Self {
            manager,
            inner: Mutex::new(Inner {
                state,
                initialized: false,
                expected,
                entries: Vec::new(),
                members: Vec::new(),
                subscribers: Vec::new(),
            }),
        })
    }

    pub fn manager(&self) -> &Arc<SoundManager> {
        &self.manager
    }

    pub fn state(&self) -> CompositionState {
        self.inner.lock().state
    }

    /// Stream of state changes. The current state is sent first.
    pub fn subscribe(&self) -> Receiver<CompositionState> {
        let (tx, rx) = unbounded();
        let mut inner = self.inner.lock();
        let _ = tx.send(inner.state);
        inner.subscribers.push(tx);
        rx
    }

    /// Attached components, in attach order.
    pub fn components(&self) -> Vec<ComponentId> {
        self.inner.lock().members.clone()
    }

    pub fn status(&self, id: ComponentId) -> Option<ComponentStatus> {
        self.inner.lock().status(id)
    }

    /// Track backing `variant` of a component, once its sounds are loaded.
    pub fn track_of(&self, id: ComponentId, variant: SoundVariant) -> Option<TrackId> {
        self.inner.lock().entries.get(id.0)?.tracks.get(&variant).copied()
    }

    pub(crate) fn create_component(&self, resources: VariantResources, default_variant: SoundVariant) -> ComponentId {
        let variant = if resources.has(default_variant) {
            default_variant
        } else {
            SoundVariant::Low
        };
        let mut inner = self.inner.lock();
        let id = ComponentId(inner.entries.len());
        inner.entries.push(Entry {
            resources,
            variant,
            playing: false,
            tracks: BTreeMap::new(),
            source: None,
            attached: false,
            detached: false,
            load: LoadState::Unloaded,
            listener: None,
        });
        id
    }

    pub(crate) fn set_listener(&self, id: ComponentId, listener: PropertyListener) -> Result<(), CompositionError> {
        self.inner.lock().entry_mut(id)?.listener = Some(listener);
        Ok(())
    }

    /// Make a component a member of the mix, bound to `source`.
    pub fn register_component(&self, id: ComponentId, source: &PointSource) -> Result<(), CompositionError> {
        let mut inner = self.inner.lock();
        if inner.frozen() {
            tracing::error!(component = %id, "component registered after playback started");
            return Err(CompositionError::MembershipFrozen);
        }
        let entry = inner.live_entry_mut(id)?;
        if entry.attached {
            return Ok(());
        }
        entry.attached = true;
        entry.source = Some(source.clone());
        inner.members.push(id);
        tracing::debug!(component = %id, "component attached");
        Ok(())
    }

    /// Load one track per variant of an attached component.
    pub fn load_component_sounds(
        &self,
        id: ComponentId,
        resources: &dyn ResourceSource,
    ) -> Result<(), CompositionError> {
        let (source, wanted) = {
            let mut inner = self.inner.lock();
            if inner.frozen() {
                return Err(CompositionError::MembershipFrozen);
            }
            let entry = inner.live_entry_mut(id)?;
            if !entry.attached {
                return Err(CompositionError::NotAttached(id));
            }
            if entry.load != LoadState::Unloaded {
                return Err(CompositionError::AlreadyLoaded(id));
            }
            entry.load = LoadState::Loading;
            let source = entry.source.clone().unwrap_or_default();
            // a retry after a partial failure only loads what is missing
            let wanted: Vec<(SoundVariant, String)> = entry
                .resources
                .iter()
                .filter(|(v, _)| !entry.tracks.contains_key(v))
                .map(|(v, r)| (v, r.to_string()))
                .collect();
            (source, wanted)
        };

        let mut loaded = BTreeMap::new();
        let mut failure = None;
        for (variant, resource) in wanted {
            match self.manager.load_sound(resources, &source, &resource) {
                Ok(track) => {
                    loaded.insert(variant, track);
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        let mut inner = self.inner.lock();
        let entry = inner.entry_mut(id)?;
        entry.tracks.extend(loaded);
        if let Some(e) = failure {
            // Tracks already built stay with the manager, silent, and are
            // reused by the next attempt.
            entry.load = LoadState::Unloaded;
            tracing::warn!(component = %id, error = %e, "component sounds failed to load");
            return Err(e.into());
        }
        entry.load = LoadState::Loaded;
        tracing::debug!(component = %id, tracks = entry.tracks.len(), "component sounds loaded");

        inner.check_ready();
        Ok(())
    }

    fn write_volumes(&self, inner: &Inner) {
        for id in &inner.members {
            let entry = &inner.entries[id.0];
            for (variant, track) in &entry.tracks {
                if let Err(e) = self.manager.set_volume(*track, entry.target_volume(*variant)) {
                    tracing::warn!(component = %id, error = %e, "volume write failed");
                }
            }
        }
    }

    fn mute_all(&self, inner: &Inner) {
        for id in &inner.members {
            for track in inner.entries[id.0].tracks.values() {
                if let Err(e) = self.manager.set_volume(*track, 0.0) {
                    tracing::warn!(component = %id, error = %e, "volume write failed");
                }
            }
        }
    }

    fn member_notifications(inner: &Inner) -> Notifications {
        inner.members.iter().filter_map(|id| inner.notification(*id)).collect()
    }

    fn notify(notifications: Notifications) {
        for (listener, status) in notifications {
            listener(&status);
        }
    }

    /// Start or resume the mix. Returns false unless `Ready` or `Stopped`.
    ///
    /// The first successful call starts every track, then writes one volume
    /// per track from each component's state.
    pub fn play(&self) -> bool {
        let notifications = {
            let mut inner = self.inner.lock();
            if !matches!(inner.state, CompositionState::Ready | CompositionState::Stopped) {
                return false;
            }
            if !inner.initialized {
                self.initialize_sounds(&mut inner);
            } else {
                self.write_volumes(&inner);
            }
            inner.set_state(CompositionState::Playing);
            Self::member_notifications(&inner)
        };
        Self::notify(notifications);
        true
    }

    fn initialize_sounds(&self, inner: &mut Inner) {
        inner.initialized = true;
        self.manager.play_all_sounds();
        self.write_volumes(inner);
        tracing::info!(components = inner.members.len(), "composition initialized");
    }

    /// Silence every track. Returns false unless `Playing`.
    pub fn stop(&self) -> bool {
        let notifications = {
            let mut inner = self.inner.lock();
            if inner.state != CompositionState::Playing {
                return false;
            }
            self.mute_all(&inner);
            inner.set_state(CompositionState::Stopped);
            Self::member_notifications(&inner)
        };
        Self::notify(notifications);
        true
    }

    pub fn play_sound(&self, id: ComponentId) -> Result<(), CompositionError> {
        self.set_component_playing(id, true)
    }

    pub fn stop_sound(&self, id: ComponentId) -> Result<(), CompositionError> {
        self.set_component_playing(id, false)
    }

    fn set_component_playing(&self, id: ComponentId, playing: bool) -> Result<(), CompositionError> {
        let notification = {
            let mut inner = self.inner.lock();
            let live = inner.state == CompositionState::Playing;
            let entry = inner.live_entry_mut(id)?;
            if entry.playing == playing {
                return Ok(());
            }
            entry.playing = playing;
            let track = entry.active_track();
            if let (true, Some(track)) = (live && entry.attached, track) {
                self.manager.set_volume(track, if playing { 1.0 } else { 0.0 })?;
            }
            tracing::debug!(component = %id, playing, "component playing changed");
            inner.notification(id)
        };
        Self::notify(notification.into_iter().collect());
        Ok(())
    }

    /// Switch the audible variant of a component.
    pub fn replace_sound(&self, id: ComponentId, variant: SoundVariant) -> Result<(), CompositionError> {
        let notification = {
            let mut inner = self.inner.lock();
            let live = inner.state == CompositionState::Playing;
            let entry = inner.live_entry_mut(id)?;
            if !entry.resources.has(variant) {
                return Err(CompositionError::MissingVariant(variant));
            }
            if entry.variant == variant {
                return Ok(());
            }
            let old = entry.active_track();
            entry.variant = variant;
            let new = entry.active_track();
            if live && entry.attached {
                if let Some(old) = old {
                    self.manager.set_volume(old, 0.0)?;
                }
                if let (true, Some(new)) = (entry.playing, new) {
                    self.manager.set_volume(new, 1.0)?;
                }
            }
            tracing::debug!(component = %id, ?variant, "component variant changed");
            inner.notification(id)
        };
        Self::notify(notification.into_iter().collect());
        Ok(())
    }

    /// Stop every component. Returns false before the mix has first played.
    pub fn stop_all_sound_components(&self) -> bool {
        let notifications = {
            let mut inner = self.inner.lock();
            if matches!(inner.state, CompositionState::Loading | CompositionState::Ready) {
                return false;
            }
            let live = inner.state == CompositionState::Playing;
            let members = inner.members.clone();
            let mut changed = Vec::new();
            for id in members {
                let entry = &mut inner.entries[id.0];
                if !entry.playing {
                    continue;
                }
                entry.playing = false;
                if let (true, Some(track)) = (live, entry.active_track()) {
                    if let Err(e) = self.manager.set_volume(track, 0.0) {
                        tracing::warn!(component = %id, error = %e, "volume write failed");
                    }
                }
                changed.push(id);
            }
            changed.iter().filter_map(|id| inner.notification(*id)).collect()
        };
        Self::notify(notifications);
        true
    }

    /// Stop a component and remove it from the mix for good. Its tracks keep
    /// looping, silent.
    pub fn detach_component(&self, id: ComponentId) -> Result<(), CompositionError> {
        let notification = {
            let mut inner = self.inner.lock();
            let live = inner.state == CompositionState::Playing;
            let entry = inner.entry_mut(id)?;
            if entry.detached {
                return Ok(());
            }
            if let (true, Some(track)) = (live && entry.playing, entry.active_track()) {
                self.manager.set_volume(track, 0.0)?;
            }
            let was_member = entry.attached;
            entry.playing = false;
            entry.attached = false;
            entry.detached = true;
            inner.members.retain(|m| *m != id);
            if was_member {
                // a detached member is no longer waited for
                inner.expected = inner.expected.map(|n| n.saturating_sub(1));
                inner.check_ready();
            }
            tracing::debug!(component = %id, "component detached");
            inner.notification(id)
        };
        Self::notify(notification.into_iter().collect());
        Ok(())
    }
}
