use std::sync::atomic::{AtomicBool, Ordering};

use glam::{Quat, Vec3};
use parking_lot::Mutex;
use sound_system::PointSource;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self { translation, rotation }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self::new(translation, Quat::IDENTITY)
    }

    /// Map a pose expressed relative to `self` into the parent space.
    pub fn transform(&self, local: Pose) -> Pose {
        Pose {
            translation: self.translation + self.rotation * local.translation,
            rotation: (self.rotation * local.rotation).normalize(),
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A node in the scene a shape lives on. Its tracks are bound to its point
/// source, which follows the entity's translation.
#[derive(Debug)]
pub struct ShapeEntity {
    name: String,
    pose: Mutex<Pose>,
    hidden: AtomicBool,
    source: PointSource,
}

impl ShapeEntity {
    pub fn new(name: impl Into<String>, pose: Pose) -> Self {
        Self {
            name: name.into(),
            pose: Mutex::new(pose),
            hidden: AtomicBool::new(false),
            source: PointSource::new(pose.translation),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pose(&self) -> Pose {
        *self.pose.lock()
    }

    pub fn set_pose(&self, pose: Pose) {
        *self.pose.lock() = pose;
        self.source.set_position(pose.translation);
    }

    pub fn set_translation(&self, translation: Vec3) {
        let mut pose = self.pose.lock();
        pose.translation = translation;
        self.source.set_position(translation);
    }

    /// Apply `f` to the rotation under the pose lock.
    pub fn rotate_by(&self, f: impl FnOnce(Quat) -> Quat) {
        let mut pose = self.pose.lock();
        pose.rotation = f(pose.rotation).normalize();
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden.load(Ordering::Acquire)
    }

    pub fn set_hidden(&self, hidden: bool) {
        self.hidden.store(hidden, Ordering::Release);
    }

    pub fn source(&self) -> &PointSource {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_source_follows_translation() {
        let e = ShapeEntity::new("shape", Pose::IDENTITY);
        e.set_translation(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(e.source().position(), Vec3::new(1.0, 2.0, 3.0));
        e.set_pose(Pose::from_translation(Vec3::Y));
        assert_eq!(e.source().position(), Vec3::Y);
    }

    #[test]
    fn transform_places_child_in_parent_space() {
        let head = Pose::new(Vec3::new(0.0, 1.6, 0.0), Quat::from_rotation_y(std::f32::consts::FRAC_PI_2));
        let ahead = head.transform(Pose::from_translation(Vec3::NEG_Z));
        assert!((ahead.translation - Vec3::new(-1.0, 1.6, 0.0)).length() < 1e-5);
    }
}
