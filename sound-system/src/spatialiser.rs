use glam::Vec3;

/// Simple in-Rust mono to stereo panner with distance roll-off.
#[derive(Default, Debug, Clone, Copy)]
pub struct Spatialiser {
    pub listener_position: Vec3,
}

impl Spatialiser {
    pub fn new() -> Self {
        Self { listener_position: Vec3::ZERO }
    }

    pub fn set_listener_position(&mut self, pos: Vec3) {
        self.listener_position = pos;
    }

    /// Left and right gains for a source at `source_pos`.
    pub fn gains(&self, source_pos: Vec3, base_gain: f32) -> (f32, f32) {
        let d = source_pos - self.listener_position;
        // -Z is straight ahead; sources behind mirror onto the front arc
        let mut az = d.x.atan2(-d.z);
        if az.abs() > std::f32::consts::FRAC_PI_2 {
            az = az.signum() * std::f32::consts::PI - az;
        }
        let pan = (az / std::f32::consts::FRAC_PI_2).clamp(-1.0, 1.0);
        let dist = d.length().max(0.0001);
        let rolloff = 1.0 / (1.0 + dist * 0.1);
        let left = base_gain * rolloff * ((1.0 - pan) * 0.5);
        let right = base_gain * rolloff * ((1.0 + pan) * 0.5);
        (left, right)
    }

    /// `out` is interleaved stereo and must hold `src.len() * 2` samples.
    pub fn process_mono_to_stereo(&self, src: &[f32], out: &mut [f32], source_pos: Vec3, base_gain: f32) {
        debug_assert!(out.len() >= src.len() * 2);
        let (left, right) = self.gains(source_pos, base_gain);
        for (s, frame) in src.iter().zip(out.chunks_exact_mut(2)) {
            frame[0] = s * left;
            frame[1] = s * right;
        }
    }
}
