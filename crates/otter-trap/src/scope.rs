//! Closure-based guarded calls with a per-thread chain of escape scopes.
//!
//! Trap detectors rarely have the `EscapeSlot` of the call they interrupt at
//! hand. [`catch_escape`] therefore registers its scope in thread-local
//! storage so that [`escape_active`] can find the innermost armed one.

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use crate::config;
use crate::error::Escape;
use crate::guard::{CallOutcome, guarded_call_outcome};
use crate::slot::EscapeSlot;
use crate::trigger;

/// State for one `catch_escape` call, kept on its stack frame.
struct EscapeScope {
    slot: EscapeSlot,
    escape: Cell<Option<Escape>>,
    prev: Cell<*const EscapeScope>,
}

impl EscapeScope {
    fn new() -> Self {
        Self {
            slot: EscapeSlot::new(),
            escape: Cell::new(None),
            prev: Cell::new(ptr::null()),
        }
    }
}

mod tls {
    use super::EscapeScope;
    use std::cell::Cell;
    use std::ptr;

    thread_local! {
        static ACTIVE: Cell<*const EscapeScope> = const { Cell::new(ptr::null()) };
    }

    /// Make `scope` the innermost scope for the duration of `closure`.
    pub(super) fn set<R>(scope: &EscapeScope, closure: impl FnOnce() -> R) -> R {
        struct Reset<'a>(&'a EscapeScope);

        impl Drop for Reset<'_> {
            fn drop(&mut self) {
                let prev = self.0.prev.replace(ptr::null());
                let head = ACTIVE.with(|active| active.replace(prev));
                debug_assert!(ptr::eq(head, self.0), "escape scopes popped out of order");
            }
        }

        scope.prev.set(ACTIVE.with(|active| active.replace(scope)));
        let _reset = Reset(scope);
        closure()
    }

    pub(super) fn active() -> *const EscapeScope {
        ACTIVE.with(|active| active.get())
    }

    pub(super) fn replace(head: *const EscapeScope) {
        ACTIVE.with(|active| active.set(head));
    }
}

/// Innermost scope on this thread when a guarded call starts.
///
/// An escape to that guarded call skips the `Reset` guards of any scopes
/// opened inside it, which would leave their dead frames published. The
/// guarded call puts the saved head back once it returns.
pub(crate) struct ScopeMark(*const EscapeScope);

impl ScopeMark {
    pub(crate) fn save() -> Self {
        Self(tls::active())
    }

    pub(crate) fn restore(self) {
        tls::replace(self.0);
    }
}

struct ClosureCall<F, R> {
    f: Option<F>,
    result: Option<R>,
    panic: Option<Box<dyn Any + Send>>,
}

// Panics must not unwind through the native frame; park them and rethrow
// once it has returned.
unsafe extern "C" fn call_closure<F, R>(payload: *mut u8, _callee: *mut u8) -> bool
where
    F: FnOnce() -> R,
{
    let call = unsafe { &mut *payload.cast::<ClosureCall<F, R>>() };
    let Some(f) = call.f.take() else {
        return false;
    };
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => {
            call.result = Some(value);
            true
        }
        Err(payload) => {
            call.panic = Some(payload);
            false
        }
    }
}

/// Run `f` as a guarded call that any [`escape_active`] on this thread can
/// abort.
///
/// Returns `Ok` with `f`'s value when it completes and `Err` with the
/// recorded [`Escape`] when it was cut short. A panic in `f` propagates out
/// of this function after the guarded call has been torn down. Calls nest;
/// an escape only unwinds to the innermost one.
///
/// # Safety
///
/// An escape skips the rest of `f` and everything it called without running
/// destructors: `f` must not hold values whose `Drop` matters (locks, owned
/// buffers, `RefCell` borrows) at any point where an escape can happen.
pub unsafe fn catch_escape<F, R>(f: F) -> Result<R, Escape>
where
    F: FnOnce() -> R,
{
    let scope = EscapeScope::new();
    let mut call = ClosureCall {
        f: Some(f),
        result: None,
        panic: None,
    };
    let payload = (&raw mut call).cast::<u8>();

    let outcome = tls::set(&scope, || unsafe {
        guarded_call_outcome(&scope.slot, call_closure::<F, R>, payload, ptr::null_mut())
    });

    if let Some(panic) = call.panic.take() {
        panic::resume_unwind(panic);
    }
    if let (CallOutcome::Completed(true), Some(value)) = (outcome, call.result.take()) {
        return Ok(value);
    }

    let escape = scope.escape.take().unwrap_or_else(Escape::unknown);
    if config::get().log_escapes {
        tracing::debug!(
            target: "otter::trap",
            code = escape.code.0,
            pc = ?escape.pc,
            faulting_addr = ?escape.faulting_addr,
            "guest execution escaped"
        );
    }
    Err(escape)
}

/// Abort the innermost [`catch_escape`] on the current thread.
///
/// Records `escape` for that call to return, then resumes its jump buffer.
/// Returns normally only if no scope on this thread is armed, so a signal
/// handler can fall back to its default action. Safe to call from a signal
/// handler.
///
/// # Safety
///
/// The armed scope's closure must satisfy the contract of [`catch_escape`]
/// at the point this runs.
pub unsafe fn escape_active(escape: Escape) {
    let head = tls::active();
    if head.is_null() {
        return;
    }
    let scope = unsafe { &*head };
    let Some(handle) = scope.slot.take() else {
        return;
    };
    scope.escape.set(Some(escape));
    unsafe { trigger::trigger_escape(handle) }
}

/// Whether an escape raised on this thread right now would be caught.
pub fn is_escape_armed() -> bool {
    let head = tls::active();
    !head.is_null() && unsafe { (*head).slot.is_armed() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EscapeCode;

    #[test]
    fn completes_without_escape() {
        let result = unsafe { catch_escape(|| 40 + 2) };
        assert_eq!(result, Ok(42));
        assert!(!is_escape_armed());
    }

    #[test]
    fn escape_reports_recorded_reason() {
        let result: Result<(), Escape> = unsafe {
            catch_escape(|| {
                assert!(is_escape_armed());
                escape_active(Escape::new(EscapeCode(3)).with_pc(0x40));
                unreachable!("escape_active returned inside an armed scope");
            })
        };
        let escape = result.unwrap_err();
        assert_eq!(escape.code, EscapeCode(3));
        assert_eq!(escape.pc, Some(0x40));
        assert!(!is_escape_armed());
    }

    #[test]
    fn escape_without_scope_returns() {
        unsafe { escape_active(Escape::unknown()) };
        assert!(!is_escape_armed());
    }
}
