//! The fixed set of spawnable shapes and the samples bound to each.

use serde::{Deserialize, Serialize};

/// A spawnable shape.
///
/// Low/high sample assignments are intentional and some are crossed
/// (Pumpod's low variant plays `inst01_high`). Do not "fix" them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShapeModel {
    Pumpod,
    Pluff,
    Pillowtri,
    Swirlnut,
    Twistbud,
    Squube,
    Bloomspire,
    Cello,
    Munchkin,
}

impl ShapeModel {
    /// Menu order.
    pub const ALL: [ShapeModel; 9] = [
        ShapeModel::Pumpod,
        ShapeModel::Pluff,
        ShapeModel::Pillowtri,
        ShapeModel::Swirlnut,
        ShapeModel::Twistbud,
        ShapeModel::Squube,
        ShapeModel::Bloomspire,
        ShapeModel::Cello,
        ShapeModel::Munchkin,
    ];

    /// Order in which tracks are loaded and started. The more syncopated
    /// parts go first so they get the tightest start alignment.
    pub const LOAD_ORDER: [ShapeModel; 9] = [
        ShapeModel::Cello,      // harp
        ShapeModel::Pillowtri,  // bass
        ShapeModel::Swirlnut,   // rhythmic bass
        ShapeModel::Pumpod,     // sticks
        ShapeModel::Bloomspire, // drums
        ShapeModel::Squube,     // shaker
        ShapeModel::Munchkin,   // rhythmic voices
        ShapeModel::Twistbud,   // melody
        ShapeModel::Pluff,      // chimes
    ];

    /// Position in [`ShapeModel::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<ShapeModel> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            ShapeModel::Pumpod => "pumpod",
            ShapeModel::Pluff => "pluff",
            ShapeModel::Pillowtri => "pillowtri",
            ShapeModel::Swirlnut => "swirlnut",
            ShapeModel::Twistbud => "twistbud",
            ShapeModel::Squube => "squube",
            ShapeModel::Bloomspire => "bloomspire",
            ShapeModel::Cello => "cello",
            ShapeModel::Munchkin => "munchkin",
        }
    }

    /// Model asset path relative to the asset root.
    pub fn asset_name(self) -> &'static str {
        match self {
            ShapeModel::Pumpod => "glb/pumpod_animated.glb",
            ShapeModel::Pluff => "glb/pluff_animated.glb",
            ShapeModel::Pillowtri => "glb/pillowtri_animated.glb",
            ShapeModel::Swirlnut => "glb/swirlnut_animated.glb",
            ShapeModel::Twistbud => "glb/twistbud_animated.glb",
            ShapeModel::Squube => "glb/squube_animated.glb",
            ShapeModel::Bloomspire => "glb/bloomspire_animated.glb",
            ShapeModel::Cello => "glb/cello_animated.glb",
            ShapeModel::Munchkin => "glb/munchkin_animated.glb",
        }
    }

    pub fn low_sound_resource(self) -> &'static str {
        match self {
            ShapeModel::Pumpod => "inst01_high",
            ShapeModel::Pluff => "inst02_mid",
            ShapeModel::Pillowtri => "inst03_high",
            ShapeModel::Swirlnut => "inst04_low",
            ShapeModel::Twistbud => "inst05_high",
            ShapeModel::Squube => "inst06_high",
            ShapeModel::Bloomspire => "inst07_low",
            ShapeModel::Cello => "inst08_high",
            ShapeModel::Munchkin => "inst09_low",
        }
    }

    pub fn high_sound_resource(self) -> &'static str {
        match self {
            ShapeModel::Pumpod => "inst01_low",
            ShapeModel::Pluff => "inst02_high",
            ShapeModel::Pillowtri => "inst03_low",
            ShapeModel::Swirlnut => "inst04_high",
            ShapeModel::Twistbud => "inst05_mid",
            ShapeModel::Squube => "inst06_low",
            ShapeModel::Bloomspire => "inst07_mid",
            ShapeModel::Cello => "inst08_mid",
            ShapeModel::Munchkin => "inst09_high",
        }
    }
}

impl std::fmt::Display for ShapeModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crossed_sample_assignments_are_kept() {
        let expected = [
            (ShapeModel::Pumpod, "inst01_high", "inst01_low"),
            (ShapeModel::Pluff, "inst02_mid", "inst02_high"),
            (ShapeModel::Pillowtri, "inst03_high", "inst03_low"),
            (ShapeModel::Swirlnut, "inst04_low", "inst04_high"),
            (ShapeModel::Twistbud, "inst05_high", "inst05_mid"),
            (ShapeModel::Squube, "inst06_high", "inst06_low"),
            (ShapeModel::Bloomspire, "inst07_low", "inst07_mid"),
            (ShapeModel::Cello, "inst08_high", "inst08_mid"),
            (ShapeModel::Munchkin, "inst09_low", "inst09_high"),
        ];
        for (model, low, high) in expected {
            assert_eq!(model.low_sound_resource(), low, "{model} low");
            assert_eq!(model.high_sound_resource(), high, "{model} high");
        }
    }

    #[test]
    fn load_order_is_a_permutation_of_all() {
        let mut sorted = ShapeModel::LOAD_ORDER;
        sorted.sort();
        assert_eq!(sorted, ShapeModel::ALL);
    }

    #[test]
    fn index_round_trips_through_menu_order() {
        for (i, model) in ShapeModel::ALL.iter().enumerate() {
            assert_eq!(model.index(), i);
            assert_eq!(ShapeModel::from_index(i), Some(*model));
        }
        assert_eq!(ShapeModel::from_index(9), None);
    }

    #[test]
    fn asset_names_are_glb_paths() {
        for model in ShapeModel::ALL {
            assert!(model.asset_name().starts_with("glb/"));
            assert!(model.asset_name().ends_with("_animated.glb"));
            assert!(model.asset_name().contains(model.name()));
        }
    }
}
