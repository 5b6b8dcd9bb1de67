//! The escape itself.
//!
//! Everything reachable from [`trigger_escape`] may run inside a signal
//! handler: no allocation, no locks, nothing but thread-local cells and
//! atomics until the native `longjmp`.
//!
//! While checks are on, every guarded call records its buffer in a small
//! per-thread stack for as long as it is armed. A trigger is only allowed to
//! resume a buffer on that stack, which catches buffers resumed twice as
//! well as handles from another thread or from a call that already returned.

use std::cell::Cell;
use std::ptr;

use otter_trap_sys as sys;

use crate::config;
use crate::slot::JumpBufferHandle;

/// Guarded calls deeper than this are not tracked individually.
const ARMED_CAPACITY: usize = 64;

struct ArmedBuffers {
    depth: Cell<usize>,
    buffers: [Cell<*const u8>; ARMED_CAPACITY],
}

impl ArmedBuffers {
    const fn new() -> Self {
        Self {
            depth: Cell::new(0),
            buffers: [const { Cell::new(ptr::null()) }; ARMED_CAPACITY],
        }
    }

    fn push(&self, buf: *const u8) {
        let depth = self.depth.get();
        if let Some(cell) = self.buffers.get(depth) {
            cell.set(buf);
        }
        self.depth.set(depth + 1);
    }

    /// Index of `buf` on the stack. `None` when it is not armed; always
    /// `Some` once the stack has overflowed, since untracked calls could
    /// hold it.
    fn position(&self, buf: *const u8) -> Option<usize> {
        let depth = self.depth.get();
        if depth > ARMED_CAPACITY {
            return Some(depth - 1);
        }
        self.buffers[..depth].iter().rposition(|cell| cell.get() == buf)
    }

    fn innermost(&self) -> Option<(usize, *const u8)> {
        let depth = self.depth.get().min(ARMED_CAPACITY);
        let index = depth.checked_sub(1)?;
        Some((index, self.buffers[index].get()))
    }
}

thread_local! {
    static ARMED: ArmedBuffers = const { ArmedBuffers::new() };
    // Contract violation carried out of a guarded operation, raised once the
    // outermost guarded call has returned.
    static PENDING_VIOLATION: Cell<Option<&'static str>> = const { Cell::new(None) };
}

/// Resume-once checks: always in debug builds, opt-in via `OTTER_TRAP_VERIFY`.
pub(crate) fn checks_enabled() -> bool {
    cfg!(debug_assertions) || config::verify_resume_if_initialized()
}

/// Number of guarded calls currently armed on this thread.
pub(crate) fn armed_depth() -> usize {
    ARMED.with(|armed| armed.depth.get())
}

/// Record the buffer a guarded call just published.
pub(crate) fn record_armed(buf: *const u8) {
    ARMED.with(|armed| armed.push(buf));
}

/// Drop every record above `depth`. Called when a guarded call returns,
/// whichever way it returns.
pub(crate) fn restore_armed(depth: usize) {
    ARMED.with(|armed| {
        if armed.depth.get() > depth {
            armed.depth.set(depth);
        }
    });
}

/// Report a broken escape contract.
///
/// Outside any guarded call this panics. Inside one a panic could not unwind
/// through the native frame, so the violation is carried to the innermost
/// armed buffer instead and re-raised as each enclosing guarded call
/// returns, until it panics in the caller of the outermost one. Without
/// checks the process aborts.
#[cold]
pub(crate) fn contract_violation(message: &'static str) -> ! {
    if !checks_enabled() {
        std::process::abort()
    }
    if let Some((index, buf)) = ARMED.with(ArmedBuffers::innermost) {
        PENDING_VIOLATION.with(|pending| pending.set(Some(message)));
        restore_armed(index);
        unsafe { sys::otter_trap_longjmp(buf) }
    }
    panic!("{}", message);
}

/// Re-raise a violation carried out of the guarded call that just returned.
pub(crate) fn raise_pending_violation() {
    if let Some(message) = PENDING_VIOLATION.with(Cell::take) {
        contract_violation(message);
    }
}

/// Transfer control back to the guarded call that captured `handle`.
///
/// The guarded call then reports an escape. Never returns.
///
/// # Panics
///
/// With checks on, a handle that is not armed on this thread (resumed
/// already, from a call that returned, or from another thread) is reported
/// as a contract violation instead of being resumed.
///
/// # Safety
///
/// `handle` must come from a guarded call that is still on this thread's
/// stack and has not been resumed yet. Every frame between here and that
/// call is discarded without running destructors.
pub unsafe fn trigger_escape(handle: JumpBufferHandle) -> ! {
    let buf = handle.as_ptr();
    if checks_enabled() {
        match ARMED.with(|armed| armed.position(buf)) {
            Some(index) => restore_armed(index),
            None => contract_violation("jump buffer resumed twice or not armed on this thread"),
        }
    }
    unsafe { sys::otter_trap_longjmp(buf) }
}
