//! Versioned, checksummed record at a fixed offset in non-volatile memory.
//!
//! ```text
//!  offset ─▶ ┌────────┬─────────┬─────────┬──────────┬──────────┬─────────────────┐
//!            │ magic  │ version │ pay len │ checksum │ reserved │ postcard payload │
//!            │ u32 LE │ u16 LE  │ u16 LE  │ u32 LE   │ u32      │ pay len bytes    │
//!            └────────┴─────────┴─────────┴──────────┴──────────┴─────────────────┘
//! ```
//!
//! The checksum is the first four bytes of SHA-256 over the magic, version,
//! payload length and payload.  Any mismatch on load resets the record to
//! its compiled defaults and writes them back straight away; there is no
//! partial repair.
//!
//! Mutations only touch RAM and mark the record dirty.  [`DurableRecord::flush`]
//! is called every tick and writes once the record has been quiet for its
//! debounce delay, so bursts of setter calls coalesce into one write.

use core::fmt;

use log::{debug, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::app::ports::NvStorage;
use crate::error::StorageError;

/// Size of the on-media header.
pub const HEADER_LEN: usize = 16;

/// Largest region any record may reserve.
pub const MAX_RECORD_LEN: usize = 128;

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Compile-time description of one persisted record type.
///
/// Fields may only be appended between versions; bump `VERSION` whenever
/// the payload layout changes so old images are discarded.
pub trait RecordSchema: Serialize + DeserializeOwned + Clone + PartialEq {
    /// Short name for logs.
    const NAME: &'static str;
    const MAGIC: u32;
    const VERSION: u16;
    /// Byte offset of the region in non-volatile memory.
    const OFFSET: usize;
    /// Region length including the header.
    const REGION_LEN: usize;
    /// Quiet period before a dirty record is written.
    const SAVE_DELAY_MS: u64;

    fn defaults() -> Self;
}

// ---------------------------------------------------------------------------
// Load failures
// ---------------------------------------------------------------------------

/// Why a stored image was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corrupt {
    Unreadable(StorageError),
    MagicMismatch { found: u32 },
    VersionMismatch { found: u16 },
    BadLength(u16),
    ChecksumMismatch,
    Undecodable,
    Invalid(&'static str),
}

impl fmt::Display for Corrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreadable(e) => write!(f, "unreadable: {e}"),
            Self::MagicMismatch { found } => write!(f, "magic mismatch (found {found:#010x})"),
            Self::VersionMismatch { found } => write!(f, "version mismatch (found {found})"),
            Self::BadLength(len) => write!(f, "bad payload length {len}"),
            Self::ChecksumMismatch => write!(f, "checksum mismatch"),
            Self::Undecodable => write!(f, "payload undecodable"),
            Self::Invalid(why) => write!(f, "invalid: {why}"),
        }
    }
}

/// Result of [`DurableRecord::load`].  Both outcomes leave a usable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The stored image was intact and valid.
    Restored,
    /// Defaults were installed because the stored image was rejected.
    Initialized(Corrupt),
}

// ---------------------------------------------------------------------------
// Header codec
// ---------------------------------------------------------------------------

fn checksum(magic: u32, version: u16, payload: &[u8]) -> u32 {
    let mut hasher = hmac_sha256::Hash::new();
    hasher.update(magic.to_le_bytes());
    hasher.update(version.to_le_bytes());
    hasher.update((payload.len() as u16).to_le_bytes());
    hasher.update(payload);
    let digest = hasher.finalize();
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}

fn le_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn le_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

// ---------------------------------------------------------------------------
// DurableRecord
// ---------------------------------------------------------------------------

/// RAM copy of one record plus its write-back state.
#[derive(Debug, Clone)]
pub struct DurableRecord<T: RecordSchema> {
    value: T,
    dirty: bool,
    /// Tick at which the current quiet period started.
    pending_since_ms: Option<u64>,
}

impl<T: RecordSchema> Default for DurableRecord<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: RecordSchema> DurableRecord<T> {
    /// A record holding defaults, not yet loaded.
    pub fn new() -> Self {
        Self {
            value: T::defaults(),
            dirty: false,
            pending_since_ms: None,
        }
    }

    /// Parse and verify a raw region image.
    pub fn decode(region: &[u8]) -> Result<T, Corrupt> {
        if region.len() < HEADER_LEN {
            return Err(Corrupt::BadLength(region.len() as u16));
        }
        let magic = le_u32(region, 0);
        if magic != T::MAGIC {
            return Err(Corrupt::MagicMismatch { found: magic });
        }
        let version = le_u16(region, 4);
        if version != T::VERSION {
            return Err(Corrupt::VersionMismatch { found: version });
        }
        let len = le_u16(region, 6);
        let end = HEADER_LEN + len as usize;
        if end > region.len() || end > T::REGION_LEN {
            return Err(Corrupt::BadLength(len));
        }
        let payload = &region[HEADER_LEN..end];
        if le_u32(region, 8) != checksum(magic, version, payload) {
            return Err(Corrupt::ChecksumMismatch);
        }
        postcard::from_bytes(payload).map_err(|_| Corrupt::Undecodable)
    }

    /// Serialise `value` with its header into `buf`, returning the used length.
    pub fn encode(value: &T, buf: &mut [u8]) -> Result<usize, StorageError> {
        let limit = T::REGION_LEN.min(buf.len());
        if limit < HEADER_LEN {
            return Err(StorageError::RecordTooLarge);
        }
        let (header, body) = buf[..limit].split_at_mut(HEADER_LEN);
        let payload_len = postcard::to_slice(value, body)
            .map_err(|_| StorageError::RecordTooLarge)?
            .len();

        let sum = checksum(T::MAGIC, T::VERSION, &body[..payload_len]);
        header[0..4].copy_from_slice(&T::MAGIC.to_le_bytes());
        header[4..6].copy_from_slice(&T::VERSION.to_le_bytes());
        header[6..8].copy_from_slice(&(payload_len as u16).to_le_bytes());
        header[8..12].copy_from_slice(&sum.to_le_bytes());
        header[12..16].fill(0);
        Ok(HEADER_LEN + payload_len)
    }

    /// Read the region, verify it, and run `validate` on the payload.
    ///
    /// On any failure the defaults are installed and written back
    /// immediately.  A failed write-back leaves the record dirty so the
    /// next flush retries.
    pub fn load(
        &mut self,
        storage: &mut impl NvStorage,
        validate: impl FnOnce(&T) -> Result<(), &'static str>,
    ) -> LoadOutcome {
        let mut region = [0u8; MAX_RECORD_LEN];
        let region = &mut region[..T::REGION_LEN.min(MAX_RECORD_LEN)];

        let verdict = storage
            .read(T::OFFSET, region)
            .map_err(Corrupt::Unreadable)
            .and_then(|()| Self::decode(region))
            .and_then(|value| validate(&value).map(|()| value).map_err(Corrupt::Invalid));

        match verdict {
            Ok(value) => {
                debug!("{}: restored from offset {}", T::NAME, T::OFFSET);
                self.value = value;
                self.dirty = false;
                self.pending_since_ms = None;
                LoadOutcome::Restored
            }
            Err(why) => {
                warn!("{}: {}, reinitialising to defaults", T::NAME, why);
                self.initialize();
                if let Err(e) = self.write_through(storage) {
                    warn!("{}: writing defaults failed: {}", T::NAME, e);
                }
                LoadOutcome::Initialized(why)
            }
        }
    }

    /// Replace the value with compiled defaults and mark dirty.
    pub fn initialize(&mut self) {
        self.value = T::defaults();
        self.mark_dirty();
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// Mutate the RAM copy.  Marks the record dirty only if something changed.
    pub fn update(&mut self, f: impl FnOnce(&mut T)) {
        let before = self.value.clone();
        f(&mut self.value);
        if self.value != before {
            self.mark_dirty();
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write the record if it is dirty and either `force` is set or it has
    /// been quiet for `SAVE_DELAY_MS`.  Returns whether a write happened.
    pub fn flush(
        &mut self,
        storage: &mut impl NvStorage,
        now_ms: u64,
        force: bool,
    ) -> Result<bool, StorageError> {
        if !self.dirty {
            return Ok(false);
        }
        let since = *self.pending_since_ms.get_or_insert(now_ms);
        if !force && now_ms.saturating_sub(since) < T::SAVE_DELAY_MS {
            return Ok(false);
        }
        self.write_through(storage)?;
        Ok(true)
    }

    // ── Internal ──────────────────────────────────────────────

    fn mark_dirty(&mut self) {
        self.dirty = true;
        // Restart the quiet period; the next flush stamps it.
        self.pending_since_ms = None;
    }

    fn write_through(&mut self, storage: &mut impl NvStorage) -> Result<(), StorageError> {
        let mut buf = [0u8; MAX_RECORD_LEN];
        let len = Self::encode(&self.value, &mut buf)?;
        storage.write(T::OFFSET, &buf[..len])?;
        self.dirty = false;
        self.pending_since_ms = None;
        debug!("{}: {} bytes written at offset {}", T::NAME, len, T::OFFSET);
        Ok(())
    }
}
