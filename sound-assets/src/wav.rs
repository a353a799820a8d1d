//! RIFF/WAVE reader for the bundled loop samples.
//!
//! Only what the tracks need: the `data` chunk as 16-bit little-endian PCM,
//! plus the `fmt ` chunk when one is present so callers can check it against
//! the fixed track format.

use crate::util::{read_u16_le, read_u32_le, AssetError, DATA_ID, FMT_ID, MAX_WAV_BYTES, RIFF_ID, WAVE_ID};

const WAVE_FORMAT_PCM: u16 = 1;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Contents of a `fmt ` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

/// A parsed WAV resource.
#[derive(Debug, Clone)]
pub struct WavClip {
    /// `None` when the file carries no `fmt ` chunk before its data.
    pub format: Option<WavFormat>,
    pub samples: Vec<i16>,
}

impl WavClip {
    /// Number of frames for a given channel count.
    pub fn frames(&self, channels: u16) -> usize {
        self.samples.len() / channels.max(1) as usize
    }

    pub fn byte_len(&self) -> usize {
        self.samples.len() * 2
    }
}

/// Parse a RIFF/WAVE byte buffer.
///
/// Checks `RIFF` at offset 0 and `WAVE` at offset 8, then walks the chunk
/// list from offset 12 until the `data` chunk. A data length that runs past
/// the end of the buffer is clamped to what is present.
pub fn parse_wav(bytes: &[u8]) -> Result<WavClip, AssetError> {
    if bytes.len() > MAX_WAV_BYTES {
        return Err(AssetError::ResourceLimit(format!("wav is {} bytes", bytes.len())));
    }
    if bytes.get(0..4) != Some(RIFF_ID.as_slice()) {
        return Err(AssetError::MissingRiff);
    }
    if bytes.get(8..12) != Some(WAVE_ID.as_slice()) {
        return Err(AssetError::MissingWave);
    }

    let mut format = None;
    let mut pos = 12usize;
    loop {
        if pos >= bytes.len() {
            return Err(AssetError::MissingData);
        }
        let Some(id) = bytes.get(pos..pos + 4) else {
            return Err(AssetError::MissingData);
        };
        let Some(declared) = read_u32_le(bytes, pos + 4) else {
            if id == DATA_ID {
                return Err(AssetError::Truncated("data chunk header"));
            }
            return Err(AssetError::MissingData);
        };
        let body = pos + 8;

        if id == DATA_ID {
            let available = bytes.len() - body;
            let len = declared as usize;
            let len = if len > available {
                tracing::warn!(declared = len, available, "wav data chunk runs past end of file; clamping");
                available
            } else {
                len
            };
            let format = check_format(format)?;
            let samples = bytes[body..body + len]
                .chunks_exact(2)
                .map(|b| i16::from_le_bytes([b[0], b[1]]))
                .collect();
            return Ok(WavClip { format, samples });
        }

        if id == FMT_ID {
            format = Some(parse_fmt(bytes, body, declared as usize)?);
        }

        // Chunks are word aligned.
        let padded = (declared as usize).saturating_add(declared as usize & 1);
        pos = body.saturating_add(padded);
    }
}

fn parse_fmt(bytes: &[u8], body: usize, len: usize) -> Result<WavFormat, AssetError> {
    if len < 16 {
        return Err(AssetError::Truncated("fmt chunk"));
    }
    let field = |off: usize| read_u16_le(bytes, body + off).ok_or(AssetError::Truncated("fmt chunk"));
    Ok(WavFormat {
        format_tag: field(0)?,
        channels: field(2)?,
        sample_rate: read_u32_le(bytes, body + 4).ok_or(AssetError::Truncated("fmt chunk"))?,
        bits_per_sample: field(14)?,
    })
}

fn check_format(format: Option<WavFormat>) -> Result<Option<WavFormat>, AssetError> {
    if let Some(f) = format {
        if f.format_tag != WAVE_FORMAT_PCM && f.format_tag != WAVE_FORMAT_EXTENSIBLE {
            return Err(AssetError::UnsupportedEncoding(format!("format tag {:#06x}", f.format_tag)));
        }
        if f.bits_per_sample != 16 {
            return Err(AssetError::UnsupportedEncoding(format!("{}-bit samples", f.bits_per_sample)));
        }
    }
    Ok(format)
}

/// Build a canonical 16-bit PCM WAV file. Used by tools and tests to produce
/// fixtures.
pub fn encode_wav(samples: &[i16], channels: u16, sample_rate: u32) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let block_align = channels * 2;
    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(RIFF_ID);
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(WAVE_ID);
    out.extend_from_slice(FMT_ID);
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&WAVE_FORMAT_PCM.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(DATA_ID);
    out.extend_from_slice(&data_len.to_le_bytes());
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_file() {
        let bytes = encode_wav(&[1, -2, 3, -4], 1, 44_100);
        let clip = parse_wav(&bytes).unwrap();
        assert_eq!(clip.samples, vec![1, -2, 3, -4]);
        let fmt = clip.format.unwrap();
        assert_eq!(fmt.channels, 1);
        assert_eq!(fmt.sample_rate, 44_100);
        assert_eq!(fmt.bits_per_sample, 16);
        assert_eq!(clip.frames(1), 4);
    }

    #[test]
    fn skips_unknown_and_odd_sized_chunks() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"LIST");
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&[9, 9, 9, 0]); // 3 bytes + pad
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&4u32.to_le_bytes());
        bytes.extend_from_slice(&[0x10, 0x00, 0xF0, 0xFF]);

        let clip = parse_wav(&bytes).unwrap();
        assert!(clip.format.is_none());
        assert_eq!(clip.samples, vec![16, -16]);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = encode_wav(&[0; 4], 1, 44_100);
        bytes[0] = b'X';
        assert!(matches!(parse_wav(&bytes), Err(AssetError::MissingRiff)));

        let mut bytes = encode_wav(&[0; 4], 1, 44_100);
        bytes[8..12].copy_from_slice(b"AVI ");
        assert!(matches!(parse_wav(&bytes), Err(AssetError::MissingWave)));
    }

    #[test]
    fn missing_data_chunk_is_an_error() {
        let bytes = encode_wav(&[], 1, 44_100);
        let without_data = &bytes[..36];
        assert!(matches!(parse_wav(without_data), Err(AssetError::MissingData)));
    }

    #[test]
    fn overlong_data_length_is_clamped() {
        let mut bytes = encode_wav(&[5, 6, 7], 1, 44_100);
        bytes[40..44].copy_from_slice(&1000u32.to_le_bytes());
        let clip = parse_wav(&bytes).unwrap();
        assert_eq!(clip.samples, vec![5, 6, 7]);
    }

    #[test]
    fn eight_bit_pcm_is_rejected() {
        let mut bytes = encode_wav(&[0; 2], 1, 44_100);
        bytes[34..36].copy_from_slice(&8u16.to_le_bytes());
        assert!(matches!(parse_wav(&bytes), Err(AssetError::UnsupportedEncoding(_))));
    }
}
