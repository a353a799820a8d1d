use thiserror::Error;

/// Constants & small helpers
pub const RIFF_ID: &[u8; 4] = b"RIFF";
pub const WAVE_ID: &[u8; 4] = b"WAVE";
pub const FMT_ID: &[u8; 4] = b"fmt ";
pub const DATA_ID: &[u8; 4] = b"data";
pub const GLB_MAGIC: &[u8; 4] = b"glTF";
pub const GLB_JSON_CHUNK: u32 = 0x4E4F_534A; // "JSON" little-endian

// safety caps
pub const MAX_WAV_BYTES: usize = 256 * 1024 * 1024;
pub const MAX_GLB_BYTES: u64 = 512 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("invalid WAV file - missing 'RIFF'")]
    MissingRiff,
    #[error("invalid WAV file - missing 'WAVE'")]
    MissingWave,
    #[error("invalid WAV file - no data section found")]
    MissingData,
    #[error("invalid WAV file - truncated {0}")]
    Truncated(&'static str),
    #[error("unsupported WAV encoding: {0}")]
    UnsupportedEncoding(String),
    #[error("invalid model {asset}: {reason}")]
    InvalidModel { asset: String, reason: String },
    #[error("resource limits exceeded: {0}")]
    ResourceLimit(String),
}

pub(crate) fn read_u16_le(bytes: &[u8], at: usize) -> Option<u16> {
    bytes.get(at..at + 2).map(|b| u16::from_le_bytes([b[0], b[1]]))
}

pub(crate) fn read_u32_le(bytes: &[u8], at: usize) -> Option<u32> {
    bytes
        .get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}
