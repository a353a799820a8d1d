use sound_system::SoundVariant;

/// Picks Low or High from how far a shape has been lifted.
///
/// Above `initial + height_to_change` it goes High; it only drops back to
/// Low once below that line by more than `debounce`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariantHeightSwitch {
    initial_height: f32,
    height_to_change: f32,
    debounce: f32,
}

impl VariantHeightSwitch {
    pub const DEFAULT_HEIGHT_TO_CHANGE: f32 = 0.3;
    pub const DEFAULT_DEBOUNCE: f32 = 0.05;

    pub fn new(initial_height: f32, height_to_change: f32, debounce: f32) -> Self {
        Self {
            initial_height,
            height_to_change,
            debounce,
        }
    }

    pub fn high_threshold(&self) -> f32 {
        self.initial_height + self.height_to_change
    }

    /// Measure from a new resting height.
    pub fn rebase(&mut self, initial_height: f32) {
        self.initial_height = initial_height;
    }

    /// The variant to switch to at `height`, if any.
    pub fn on_move(&self, height: f32, current: SoundVariant) -> Option<SoundVariant> {
        match current {
            SoundVariant::High => (height < self.high_threshold() - self.debounce).then_some(SoundVariant::Low),
            SoundVariant::Low | SoundVariant::Medium => {
                (height > self.high_threshold()).then_some(SoundVariant::High)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn switch() -> VariantHeightSwitch {
        VariantHeightSwitch::new(1.0, 0.3, 0.05)
    }

    #[test]
    fn lifting_past_threshold_goes_high() {
        let s = switch();
        assert_eq!(s.on_move(1.2, SoundVariant::Low), None);
        assert_eq!(s.on_move(1.31, SoundVariant::Low), Some(SoundVariant::High));
    }

    #[test]
    fn dropping_back_needs_the_debounce_margin() {
        let s = switch();
        assert_eq!(s.on_move(1.28, SoundVariant::High), None);
        assert_eq!(s.on_move(1.24, SoundVariant::High), Some(SoundVariant::Low));
    }

    #[test]
    fn rebase_moves_the_threshold() {
        let mut s = switch();
        s.rebase(2.0);
        assert_eq!(s.on_move(1.5, SoundVariant::Low), None);
        assert_eq!(s.on_move(2.4, SoundVariant::Low), Some(SoundVariant::High));
    }
}
