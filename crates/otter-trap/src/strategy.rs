//! Which jump primitive the native helper was built with.

use std::fmt;

use otter_trap_sys as sys;

/// How execution state is captured and resumed on this target.
///
/// Chosen by the C preprocessor when the helper library is compiled; this
/// type only reports the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JumpStrategy {
    /// `setjmp`/`longjmp` from the C runtime. Used on Windows, where the
    /// unwinder only tolerates jumps it recognizes.
    OsContext,
    /// `__builtin_setjmp`/`__builtin_longjmp`. Saves only the registers the
    /// host compiler treats as callee-saved.
    CompilerBuiltin,
    /// `sigsetjmp(buf, 0)`/`siglongjmp`. Leaves the signal mask alone.
    SignalMaskSkipping,
}

impl JumpStrategy {
    /// Strategy compiled into the native helper.
    pub fn current() -> Self {
        let raw = unsafe { sys::otter_trap_strategy() };
        debug_assert!(Self::from_raw(raw).is_some(), "unknown strategy code {raw}");
        Self::from_raw(raw).unwrap_or(Self::SignalMaskSkipping)
    }

    /// Decode the value reported by the native helper.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            sys::OTTER_TRAP_STRATEGY_OS_CONTEXT => Some(Self::OsContext),
            sys::OTTER_TRAP_STRATEGY_COMPILER_BUILTIN => Some(Self::CompilerBuiltin),
            sys::OTTER_TRAP_STRATEGY_SIGNAL_MASK_SKIPPING => Some(Self::SignalMaskSkipping),
            _ => None,
        }
    }

    /// Size in bytes of the jump buffer each guarded call reserves.
    pub fn buffer_size() -> usize {
        unsafe { sys::otter_trap_jmp_buf_size() }
    }

    /// Short name, as used in logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::OsContext => "os-context",
            Self::CompilerBuiltin => "compiler-builtin",
            Self::SignalMaskSkipping => "sigsetjmp-nomask",
        }
    }
}

impl fmt::Display for JumpStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
