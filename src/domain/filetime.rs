//! FILETIME codec.
//!
//! The chain engine stores the resync instant as a Windows FILETIME: a 64-bit
//! count of 100-nanosecond ticks since 1601-01-01 UTC, written to the registry
//! as exactly 8 little-endian bytes. Byte 0 is the least-significant byte of
//! the tick count; that layout is fixed by the OS reader of this value, so any
//! internal representation must serialize to it unchanged.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Seconds between the FILETIME epoch (1601-01-01) and the Unix epoch (1970-01-01).
const UNIX_EPOCH_OFFSET_SECS: i64 = 11_644_473_600;

/// FILETIME ticks per second (100 ns granularity).
const TICKS_PER_SECOND: u64 = 10_000_000;

/// Nanoseconds per FILETIME tick.
const NANOS_PER_TICK: u32 = 100;

/// Errors from decoding a binary FILETIME buffer.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer holds fewer than the 8 bytes a FILETIME requires. A short
    /// buffer is malformed data, not a missing-value signal.
    #[error("binary timestamp too short: {len} bytes (need {})", FileTime::WIRE_LEN)]
    TooShort { len: usize },
}

/// An absolute instant expressed as a FILETIME tick count.
///
/// The full 64-bit space is valid; arithmetic never overflows on decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileTime(u64);

impl FileTime {
    /// Number of bytes in the wire representation.
    pub const WIRE_LEN: usize = 8;

    /// Construct from a raw tick count.
    #[must_use]
    pub const fn from_ticks(ticks: u64) -> Self {
        FileTime(ticks)
    }

    /// The raw tick count (100 ns intervals since 1601-01-01 UTC).
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.0
    }

    /// Serialize to the 8-byte little-endian wire form. Total function: every
    /// representable instant converts cleanly.
    #[must_use]
    pub const fn to_bytes(&self) -> [u8; Self::WIRE_LEN] {
        self.0.to_le_bytes()
    }

    /// Reconstruct a `FileTime` from little-endian bytes.
    ///
    /// Trailing bytes beyond the first 8 are ignored, matching how registry
    /// consumers treat oversized REG_BINARY payloads.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::TooShort`] when fewer than 8 bytes are supplied.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < Self::WIRE_LEN {
            return Err(DecodeError::TooShort { len: bytes.len() });
        }
        let mut raw = [0u8; Self::WIRE_LEN];
        raw.copy_from_slice(&bytes[..Self::WIRE_LEN]);
        Ok(FileTime(u64::from_le_bytes(raw)))
    }

    /// Convert a UTC calendar timestamp into a `FileTime`.
    ///
    /// Sub-tick precision (the two low decimal digits of the nanosecond
    /// field) is truncated. Instants outside the representable FILETIME range
    /// saturate at the range boundaries; realistic calendar dates are always
    /// in range.
    #[must_use]
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        let secs = i128::from(dt.timestamp()) + i128::from(UNIX_EPOCH_OFFSET_SECS);
        let sub_ticks = i128::from(dt.timestamp_subsec_nanos() / NANOS_PER_TICK);
        let ticks = secs * i128::from(TICKS_PER_SECOND) + sub_ticks;
        FileTime(ticks.clamp(0, i128::from(u64::MAX)) as u64)
    }

    /// Convert to a UTC calendar timestamp, exact to the tick.
    #[must_use]
    pub fn to_datetime(&self) -> DateTime<Utc> {
        let secs = (self.0 / TICKS_PER_SECOND) as i64 - UNIX_EPOCH_OFFSET_SECS;
        let nanos = (self.0 % TICKS_PER_SECOND) as u32 * NANOS_PER_TICK;
        // The whole u64 tick range lands inside chrono's representable span.
        DateTime::from_timestamp(secs, nanos).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// The current instant as a `FileTime`.
    #[must_use]
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }
}

impl std::fmt::Display for FileTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} ticks)", self.to_datetime().to_rfc3339(), self.0)
    }
}
