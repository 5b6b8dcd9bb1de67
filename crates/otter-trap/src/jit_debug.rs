//! GDB JIT interface descriptor.
//!
//! Debuggers and profilers find JIT code by reading `__jit_debug_descriptor`
//! and by breaking on `__jit_debug_register_code`. Both are defined weakly by
//! the native helper, so another runtime in the process may own them; either
//! way [`descriptor`] returns the definition the linker picked.
//!
//! This module never touches the entry list. Whoever maintains it must
//! serialize updates (see the `otter-jit-debug` crate).

use std::ptr::NonNull;

use otter_trap_sys as sys;

pub use otter_trap_sys::{JitCodeEntry, JitDescriptor as JitDebugDescriptor};

/// Protocol version stored in a freshly initialized descriptor.
pub const JIT_DEBUG_VERSION: u32 = 1;

/// Value of [`JitDebugDescriptor::action_flag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum JitAction {
    /// Nothing pending.
    NoAction = 0,
    /// `relevant_entry` was just linked.
    Register = 1,
    /// `relevant_entry` is about to be unlinked.
    Unregister = 2,
}

impl JitAction {
    /// Decode a raw `action_flag`.
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::NoAction),
            1 => Some(Self::Register),
            2 => Some(Self::Unregister),
            _ => None,
        }
    }
}

/// Address of the process-wide descriptor. Identical on every call.
pub fn descriptor() -> NonNull<JitDebugDescriptor> {
    let raw = unsafe { sys::otter_trap_jit_debug_descriptor() };
    // SAFETY: the accessor returns the address of a static.
    unsafe { NonNull::new_unchecked(raw) }
}

/// Notify an attached debugger that the descriptor changed.
///
/// A no-op unless a debugger has a breakpoint on
/// `__jit_debug_register_code`.
pub fn announce() {
    unsafe { sys::__jit_debug_register_code() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    #[test]
    fn descriptor_address_is_stable() {
        let first = descriptor();
        for _ in 0..8 {
            assert_eq!(descriptor(), first);
        }
    }

    #[test]
    fn descriptor_layout_matches_gdb() {
        let ptr = size_of::<usize>();
        assert_eq!(offset_of!(JitDebugDescriptor, version), 0);
        assert_eq!(offset_of!(JitDebugDescriptor, action_flag), 4);
        assert_eq!(offset_of!(JitDebugDescriptor, relevant_entry), 8);
        assert_eq!(offset_of!(JitDebugDescriptor, first_entry), 8 + ptr);
        assert_eq!(size_of::<JitDebugDescriptor>(), 8 + 2 * ptr);

        assert_eq!(offset_of!(JitCodeEntry, symfile_addr), 2 * ptr);
    }

    #[test]
    fn descriptor_starts_at_version_one() {
        let version = unsafe { (*descriptor().as_ptr()).version };
        assert_eq!(version, JIT_DEBUG_VERSION);
    }

    #[test]
    fn announce_is_callable() {
        announce();
        announce();
    }

    #[test]
    fn action_round_trips_raw_values() {
        assert_eq!(JitAction::from_raw(JitAction::Register as u32), Some(JitAction::Register));
        assert_eq!(JitAction::from_raw(9), None);
    }
}
