//! Fixtures for the cross-crate tests under `tests/`.

use std::path::Path;

use sound_assets::{encode_glb, encode_wav, ShapeModel};

/// A 440 Hz sine at 44.1 kHz.
pub fn tone(frames: usize) -> Vec<i16> {
    (0..frames)
        .map(|i| {
            let t = i as f32 / 44_100.0;
            ((t * 440.0 * std::f32::consts::TAU).sin() * 8_000.0) as i16
        })
        .collect()
}

/// Lay out an asset tree the way the explorer expects it: `glb/` models and
/// `sounds/` loops for every catalog shape.
pub fn write_asset_tree(root: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(root.join("glb"))?;
    std::fs::create_dir_all(root.join("sounds"))?;
    let wav = encode_wav(&tone(4_410), 1, 44_100);
    for model in ShapeModel::ALL {
        for id in [model.low_sound_resource(), model.high_sound_resource()] {
            std::fs::write(root.join("sounds").join(format!("{id}.wav")), &wav)?;
        }
        let json = format!(r#"{{"asset":{{"version":"2.0"}},"nodes":[{{"name":"{}"}}]}}"#, model.name());
        std::fs::write(root.join(model.asset_name()), encode_glb(&json))?;
    }
    Ok(())
}

/// Peak absolute sample.
pub fn peak(buf: &[f32]) -> f32 {
    buf.iter().fold(0.0f32, |p, s| p.max(s.abs()))
}
