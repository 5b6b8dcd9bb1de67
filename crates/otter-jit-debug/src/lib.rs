//! # Otter JIT Debug
//!
//! Makes JIT-compiled code visible to GDB and LLDB through the GDB JIT
//! interface.
//!
//! The descriptor itself lives in `otter-trap`; this crate owns the list of
//! in-memory object files hanging off it. Every list update goes through one
//! process-wide lock, since debuggers may read the list at any stop.
//!
//! Registration is enabled with `OTTER_JIT_GDB=1`.

#![warn(clippy::all)]
#![warn(missing_docs)]

mod error;
mod registration;

use std::sync::OnceLock;

pub use error::{JitDebugError, JitDebugResult};
pub use registration::{GdbJitImageRegistration, live_entries, register_if_enabled};

static JIT_DEBUG_CONFIG: OnceLock<JitDebugConfig> = OnceLock::new();

/// GDB JIT interface settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JitDebugConfig {
    /// Register JIT images with attached debuggers.
    pub enabled: bool,
}

impl JitDebugConfig {
    /// Read `OTTER_JIT_GDB`.
    pub fn from_env() -> Self {
        Self {
            enabled: otter_trap::config::env_flag("OTTER_JIT_GDB"),
        }
    }
}

/// Process configuration, read from the environment on first use.
pub fn config() -> &'static JitDebugConfig {
    JIT_DEBUG_CONFIG.get_or_init(JitDebugConfig::from_env)
}
