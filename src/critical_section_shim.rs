//! `critical-section` 1.x provider for the ESP-IDF build.
//!
//! The delivery acknowledgement in [`crate::telemetry`] sits behind a
//! critical-section mutex.  It is only ever signalled from task context,
//! so a process-wide std mutex held for the outermost nesting level is
//! enough.  Nested acquires on the same task just count depth.

use core::cell::RefCell;
use std::sync::{Mutex, MutexGuard};

static SECTION: Mutex<()> = Mutex::new(());

struct Nesting {
    depth: u8,
    guard: Option<MutexGuard<'static, ()>>,
}

thread_local! {
    static NESTING: RefCell<Nesting> = const {
        RefCell::new(Nesting { depth: 0, guard: None })
    };
}

#[unsafe(no_mangle)]
pub extern "C" fn _critical_section_1_0_acquire() -> u8 {
    NESTING.with(|cell| {
        let mut n = cell.borrow_mut();
        if n.depth == 0 {
            // A poisoned lock still guards nothing but `()`.
            n.guard = Some(SECTION.lock().unwrap_or_else(|p| p.into_inner()));
        }
        n.depth = n.depth.saturating_add(1);
        n.depth
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn _critical_section_1_0_release(_token: u8) {
    NESTING.with(|cell| {
        let mut n = cell.borrow_mut();
        if n.depth == 0 {
            return;
        }
        n.depth -= 1;
        if n.depth == 0 {
            n.guard = None;
        }
    })
}
