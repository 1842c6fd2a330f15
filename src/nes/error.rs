use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MapperError {
    #[error("unsupported mapper {id}: no clocked-IRQ chip is implemented for it")]
    UnsupportedMapper { id: u16 },

    #[error("PRG ROM of {len} bytes is not a whole number of 8 KiB banks")]
    InvalidPrgSize { len: usize },

    #[error("CHR memory of {len} bytes is not a whole number of 1 KiB banks")]
    InvalidChrSize { len: usize },
}

#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error("failed to read ROM {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ROM is too small to contain an iNES header ({len} bytes)")]
    TooSmall { len: usize },

    #[error("invalid iNES header magic, expected NES<EOF>")]
    BadMagic,

    #[error("NES 2.0 exponent-multiplier ROM sizes are not supported")]
    ExponentSize,

    #[error("ROM truncated: {section} needs {expected} bytes, {found} left")]
    Truncated {
        section: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("mapper {id} has no scanline IRQ chip in this crate")]
    UnsupportedMapper { id: u16 },
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("save state does not start with the mapper state magic")]
    BadMagic,

    #[error("save state is truncated ({len} bytes)")]
    Truncated { len: usize },

    #[error("unsupported save state version: v{0}")]
    UnsupportedVersion(u8),

    #[error("save state checksum mismatch")]
    ChecksumMismatch,

    #[error("malformed save state payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("failed to encode save state: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("save state belongs to {found}, not {expected}")]
    ChipMismatch {
        expected: &'static str,
        found: String,
    },

    #[error("save state has {found} bank registers, expected {expected}")]
    BankCount { expected: usize, found: usize },

    #[error("save state has {found} control registers, expected {expected}")]
    ControlCount { expected: usize, found: usize },
}
