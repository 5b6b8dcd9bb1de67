//! Raw FFI bindings to the otter trap helper library.
//!
//! The helper is a small C file compiled by `build.rs`. It owns everything
//! Rust cannot express: `setjmp`-style capture, weak symbols and the GDB JIT
//! interface globals. Use the `otter-trap` crate for the checked API.

#![allow(non_upper_case_globals)]

use std::os::raw::c_int;

/// Suffix appended to every exported helper symbol, e.g. `_v0_1_0`.
pub const VERSIONED_SUFFIX: &str = env!("OTTER_TRAP_VERSIONED_SUFFIX");

// Values returned by `otter_trap_strategy`.
pub const OTTER_TRAP_STRATEGY_OS_CONTEXT: c_int = 0;
pub const OTTER_TRAP_STRATEGY_COMPILER_BUILTIN: c_int = 1;
pub const OTTER_TRAP_STRATEGY_SIGNAL_MASK_SKIPPING: c_int = 2;

// Values returned by `otter_trap_guarded_call`.
pub const OTTER_TRAP_COMPLETED_FALSE: c_int = 0;
pub const OTTER_TRAP_COMPLETED_TRUE: c_int = 1;
pub const OTTER_TRAP_ESCAPED: c_int = 2;

/// Body run inside a guarded call: `(payload, callee) -> bool`.
pub type GuardedOperation = unsafe extern "C" fn(payload: *mut u8, callee: *mut u8) -> bool;

/// GDB JIT interface descriptor (`struct jit_descriptor`).
#[repr(C)]
#[derive(Debug)]
pub struct JitDescriptor {
    pub version: u32,
    pub action_flag: u32,
    pub relevant_entry: *mut JitCodeEntry,
    pub first_entry: *mut JitCodeEntry,
}

/// GDB JIT interface list node (`struct jit_code_entry`).
#[repr(C)]
#[derive(Debug)]
pub struct JitCodeEntry {
    pub next_entry: *mut JitCodeEntry,
    pub prev_entry: *mut JitCodeEntry,
    pub symfile_addr: *const u8,
    pub symfile_size: u64,
}

// Versioned helper entry points, generated by build.rs.
include!(concat!(env!("OUT_DIR"), "/bindings.rs"));

// Fixed names from the GDB JIT interface; debuggers look these up verbatim.
unsafe extern "C" {
    pub fn __jit_debug_register_code();
    pub static mut __jit_debug_descriptor: JitDescriptor;
}
