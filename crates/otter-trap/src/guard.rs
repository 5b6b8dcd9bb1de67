//! Guarded calls: run an operation under a freshly captured jump buffer.

use otter_trap_sys::{self as sys, GuardedOperation};

use crate::config;
use crate::scope::ScopeMark;
use crate::slot::EscapeSlot;
use crate::trigger;

/// Result of a guarded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome<T> {
    /// The operation returned normally with this value.
    Completed(T),
    /// An escape resumed the guarded call's jump buffer.
    Escaped,
}

impl<T> CallOutcome<T> {
    /// Whether the call was cut short by an escape.
    pub fn is_escaped(&self) -> bool {
        matches!(self, Self::Escaped)
    }

    /// Value returned by the operation, if it completed.
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Escaped => None,
        }
    }

    /// Map the completed value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CallOutcome<U> {
        match self {
            Self::Completed(value) => CallOutcome::Completed(f(value)),
            Self::Escaped => CallOutcome::Escaped,
        }
    }
}

// Operation wrapper used while checks are on: records the freshly published
// buffer before running the real operation.
struct CheckedOperation {
    slot: *mut *const u8,
    operation: GuardedOperation,
    payload: *mut u8,
}

unsafe extern "C" fn checked_operation(payload: *mut u8, callee: *mut u8) -> bool {
    let checked = unsafe { &*payload.cast::<CheckedOperation>() };
    trigger::record_armed(unsafe { *checked.slot });
    unsafe { (checked.operation)(checked.payload, callee) }
}

/// Shared body of both entry points. `native` is handed the operation and
/// payload to pass to the helper.
///
/// An escape may skip the teardown of guarded calls and scopes nested inside
/// this one, so the per-thread state they published is restored here on both
/// paths.
unsafe fn run_guarded<R>(
    slot: &EscapeSlot,
    operation: GuardedOperation,
    payload: *mut u8,
    native: impl FnOnce(GuardedOperation, *mut u8) -> R,
) -> R {
    debug_assert!(
        !slot.is_armed(),
        "escape slot is already armed by another guarded call"
    );
    // Resolve configuration here, outside any signal context, so the
    // trigger path only ever reads an initialized value.
    let _ = config::get();

    let scopes = ScopeMark::save();
    let depth = trigger::armed_depth();
    let ret = if trigger::checks_enabled() {
        let mut checked = CheckedOperation {
            slot: slot.as_ptr(),
            operation,
            payload,
        };
        native(checked_operation, (&raw mut checked).cast())
    } else {
        native(operation, payload)
    };
    trigger::restore_armed(depth);
    scopes.restore();
    slot.clear();
    trigger::raise_pending_violation();
    ret
}

/// Run `operation(payload, callee)` under a new jump buffer published in
/// `slot`.
///
/// Returns `true` if an escape occurred **or** the operation returned
/// `false`, and `false` if the operation returned `true`. The two `true`
/// cases cannot be told apart; use [`guarded_call_outcome`] when they need
/// to be.
///
/// # Safety
///
/// `operation` must either return exactly once or escape exactly once
/// through `slot`'s buffer. Frames it leaves behind on escape must not own
/// anything that needs dropping.
pub unsafe fn guarded_call(
    slot: &EscapeSlot,
    operation: GuardedOperation,
    payload: *mut u8,
    callee: *mut u8,
) -> bool {
    unsafe {
        run_guarded(slot, operation, payload, |operation, payload| {
            sys::otter_trap_setjmp(slot.as_ptr(), operation, payload, callee)
        })
    }
}

/// Like [`guarded_call`], but keeps the operation's result apart from an
/// escape.
///
/// # Safety
///
/// Same contract as [`guarded_call`].
pub unsafe fn guarded_call_outcome(
    slot: &EscapeSlot,
    operation: GuardedOperation,
    payload: *mut u8,
    callee: *mut u8,
) -> CallOutcome<bool> {
    let status = unsafe {
        run_guarded(slot, operation, payload, |operation, payload| {
            sys::otter_trap_guarded_call(slot.as_ptr(), operation, payload, callee)
        })
    };
    match status {
        sys::OTTER_TRAP_COMPLETED_TRUE => CallOutcome::Completed(true),
        sys::OTTER_TRAP_COMPLETED_FALSE => CallOutcome::Completed(false),
        _ => CallOutcome::Escaped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe extern "C" fn return_payload_flag(payload: *mut u8, _callee: *mut u8) -> bool {
        unsafe { *payload != 0 }
    }

    #[test]
    fn outcome_helpers() {
        let done: CallOutcome<i32> = CallOutcome::Completed(3);
        assert!(!done.is_escaped());
        assert_eq!(done.map(|v| v * 2), CallOutcome::Completed(6));
        assert_eq!(done.completed(), Some(3));

        let escaped: CallOutcome<i32> = CallOutcome::Escaped;
        assert!(escaped.is_escaped());
        assert_eq!(escaped.completed(), None);
    }

    #[test]
    fn slot_is_disarmed_after_return() {
        let slot = EscapeSlot::new();
        let mut flag = 1u8;
        let ret =
            unsafe { guarded_call(&slot, return_payload_flag, &mut flag, std::ptr::null_mut()) };
        assert!(!ret);
        assert!(!slot.is_armed());
    }

    unsafe extern "C" fn report_depth(payload: *mut u8, _callee: *mut u8) -> bool {
        unsafe { *payload.cast::<usize>() = trigger::armed_depth() };
        true
    }

    #[test]
    fn armed_records_are_dropped_on_return() {
        let slot = EscapeSlot::new();
        let before = trigger::armed_depth();
        let mut seen = usize::MAX;
        let payload = (&raw mut seen).cast::<u8>();
        let outcome =
            unsafe { guarded_call_outcome(&slot, report_depth, payload, std::ptr::null_mut()) };
        assert_eq!(outcome, CallOutcome::Completed(true));
        if trigger::checks_enabled() {
            assert_eq!(seen, before + 1);
        }
        assert_eq!(trigger::armed_depth(), before);
    }

    #[test]
    fn outcome_reports_operation_result() {
        let slot = EscapeSlot::new();
        let mut flag = 0u8;
        let outcome = unsafe {
            guarded_call_outcome(&slot, return_payload_flag, &mut flag, std::ptr::null_mut())
        };
        assert_eq!(outcome, CallOutcome::Completed(false));
        flag = 1;
        let outcome = unsafe {
            guarded_call_outcome(&slot, return_payload_flag, &mut flag, std::ptr::null_mut())
        };
        assert_eq!(outcome, CallOutcome::Completed(true));
    }
}
