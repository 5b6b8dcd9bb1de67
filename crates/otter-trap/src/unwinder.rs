//! Which unwinder library backs this process.
//!
//! JIT code has to hand its `.eh_frame` data to the unwinder, and the two
//! common implementations disagree on what `__register_frame` takes: libgcc
//! wants the whole section, LLVM's libunwind wants one FDE per call.

use std::sync::OnceLock;

static USING_LIBUNWIND: OnceLock<bool> = OnceLock::new();

/// Unwinder implementation in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnwinderBackend {
    /// LLVM libunwind.
    LibUnwind,
    /// Whatever the platform ships (libgcc_s, the Windows unwinder, ...).
    Platform,
}

/// How JIT unwind info must be registered with the active unwinder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRegistration {
    /// Call `__register_frame` once per FDE.
    PerFde,
    /// Call `__register_frame` once with the start of `.eh_frame`.
    WholeSection,
    /// Windows function tables (`RtlAddFunctionTable`).
    FunctionTable,
}

/// Whether LLVM's libunwind is linked in, detected by probing for
/// `__unw_add_dynamic_fde`. Computed once.
pub fn using_libunwind() -> bool {
    *USING_LIBUNWIND.get_or_init(probe_libunwind)
}

#[cfg(not(windows))]
fn probe_libunwind() -> bool {
    unsafe { otter_trap_sys::otter_trap_using_libunwind() }
}

#[cfg(windows)]
fn probe_libunwind() -> bool {
    false
}

/// Active unwinder backend.
pub fn backend() -> UnwinderBackend {
    if using_libunwind() {
        UnwinderBackend::LibUnwind
    } else {
        UnwinderBackend::Platform
    }
}

/// Registration scheme for JIT unwind info on this platform.
pub fn frame_registration() -> FrameRegistration {
    if cfg!(windows) {
        FrameRegistration::FunctionTable
    } else if cfg!(any(target_os = "macos", target_os = "freebsd")) || using_libunwind() {
        FrameRegistration::PerFde
    } else {
        FrameRegistration::WholeSection
    }
}
