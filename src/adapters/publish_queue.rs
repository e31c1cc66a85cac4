//! Outbound report queue.
//!
//! Implements [`TelemetryPort`].  Reports are serialised to JSON on
//! enqueue and held in a fixed-capacity FIFO until the board is connected.
//! Each [`service`](TelemetryPort::service) call hands at most one payload
//! to the [`Uplink`] and forwards the webhook status to the
//! [`AckSignal`].
//!
//! ```text
//!  enqueue ──▶ [ json | json | … ] ──service()──▶ Uplink ──status──▶ AckSignal
//!                     ▲                              │
//!                     └──────── Failed (requeue) ────┘
//! ```

use heapless::{Deque, String};
use log::{debug, info, warn};

use crate::app::ports::TelemetryPort;
use crate::error::TelemetryError;
use crate::telemetry::{AckSignal, REPORT_EVENT, TelemetryRecord};

/// Largest JSON payload accepted.
pub const PAYLOAD_CAPACITY: usize = 256;

pub type Payload = String<PAYLOAD_CAPACITY>;

/// Outcome of handing one payload to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Sent; the webhook answered with this status.
    Answered(u16),
    /// Sent; no response will come.
    Unanswered,
    /// Not sent.  The payload stays queued.
    Failed,
}

/// Transport that carries a payload to the cloud.
pub trait Uplink {
    fn publish(&mut self, event: &str, payload: &str) -> Delivery;
}

/// Writes every report to the serial console and answers `200`.
/// Used on bench boards that have no webhook behind them.
#[derive(Default)]
pub struct ConsoleUplink;

impl Uplink for ConsoleUplink {
    fn publish(&mut self, event: &str, payload: &str) -> Delivery {
        info!("UPLINK | {} {}", event, payload);
        Delivery::Answered(200)
    }
}

pub struct PublishQueue<U, const N: usize> {
    pending: Deque<Payload, N>,
    uplink: U,
    ack: &'static AckSignal,
}

impl<U: Uplink, const N: usize> PublishQueue<U, N> {
    pub fn new(uplink: U, ack: &'static AckSignal) -> Self {
        Self {
            pending: Deque::new(),
            uplink,
            ack,
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn uplink_mut(&mut self) -> &mut U {
        &mut self.uplink
    }
}

impl<U: Uplink, const N: usize> TelemetryPort for PublishQueue<U, N> {
    fn enqueue(&mut self, record: &TelemetryRecord) -> Result<(), TelemetryError> {
        let json = record.to_json()?;
        let payload = Payload::try_from(json.as_str()).map_err(|_| TelemetryError::Encode)?;
        self.pending
            .push_back(payload)
            .map_err(|_| TelemetryError::QueueFull)?;
        debug!("Publish queue: {} pending", self.pending.len());
        Ok(())
    }

    fn service(&mut self) {
        let Some(payload) = self.pending.pop_front() else {
            return;
        };
        match self.uplink.publish(REPORT_EVENT, &payload) {
            Delivery::Answered(status) => self.ack.on_response(status),
            Delivery::Unanswered => debug!("Publish queue: no response expected"),
            Delivery::Failed => {
                warn!("Publish queue: send failed, keeping payload");
                // Just popped, so there is room at the front.
                let _ = self.pending.push_front(payload);
            }
        }
    }
}
