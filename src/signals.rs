//! Interrupt-raised one-shot flags.
//!
//! ISRs only ever set a flag; the control loop takes (reads and clears)
//! every flag once per tick.
//!
//! ```text
//! ┌──────────────────┐  raise()  ┌────────────────┐  take()  ┌────────────┐
//! │ user switch ISR  │──────────▶│                │─────────▶│            │
//! │ sensor INT ISR   │──────────▶│ InterruptFlags │          │ Main loop  │
//! │ alloc-fail hook  │──────────▶│  (AtomicBool)  │          │ (consumer) │
//! └──────────────────┘           └────────────────┘          └────────────┘
//! ```

use core::sync::atomic::{AtomicBool, Ordering};

/// Sources that can raise a flag from interrupt context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Irq {
    UserSwitch,
    SensorActivity,
    OutOfMemory,
}

/// Flags drained by the control loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingIrqs {
    pub user_switch: bool,
    pub sensor_activity: bool,
    pub out_of_memory: bool,
}

/// Lock-free flag set shared between ISRs and the control loop.
pub struct InterruptFlags {
    user_switch: AtomicBool,
    sensor_activity: AtomicBool,
    out_of_memory: AtomicBool,
}

impl Default for InterruptFlags {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptFlags {
    pub const fn new() -> Self {
        Self {
            user_switch: AtomicBool::new(false),
            sensor_activity: AtomicBool::new(false),
            out_of_memory: AtomicBool::new(false),
        }
    }

    fn flag(&self, irq: Irq) -> &AtomicBool {
        match irq {
            Irq::UserSwitch => &self.user_switch,
            Irq::SensorActivity => &self.sensor_activity,
            Irq::OutOfMemory => &self.out_of_memory,
        }
    }

    /// Set a flag.  Safe to call from ISR context.
    pub fn raise(&self, irq: Irq) {
        self.flag(irq).store(true, Ordering::Release);
    }

    /// Read and clear a single flag.
    pub fn take(&self, irq: Irq) -> bool {
        self.flag(irq).swap(false, Ordering::AcqRel)
    }

    /// Read and clear every flag at once.
    pub fn take_all(&self) -> PendingIrqs {
        PendingIrqs {
            user_switch: self.take(Irq::UserSwitch),
            sensor_activity: self.take(Irq::SensorActivity),
            out_of_memory: self.take(Irq::OutOfMemory),
        }
    }
}

/// Flags written by the board's interrupt handlers.
pub static IRQ_FLAGS: InterruptFlags = InterruptFlags::new();
