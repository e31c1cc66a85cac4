//! Durable record store.
//!
//! Typed records live at fixed, non-overlapping regions of a byte-addressable
//! [`NvStorage`](crate::app::ports::NvStorage) device.  See [`record`] for the
//! on-media format and the load/flush rules.

pub mod record;

pub use record::{Corrupt, DurableRecord, LoadOutcome, RecordSchema, HEADER_LEN, MAX_RECORD_LEN};
