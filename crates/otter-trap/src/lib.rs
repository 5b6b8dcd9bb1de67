//! # Otter Trap
//!
//! Non-local escapes out of JIT-compiled guest code.
//!
//! A *guarded call* captures a jump buffer on the native stack, publishes it
//! in an [`EscapeSlot`] and runs an operation. A trap detector (typically a
//! signal handler) that later decides the guest must be aborted resumes that
//! buffer with [`trigger_escape`], and the guarded call returns as if the
//! operation had been cut short.
//!
//! ```text
//! runtime                 guarded call                 trap detector
//!   │  catch_escape(f) ──▶  capture buf, arm slot
//!   │                       f() ── guest faults ──────▶ escape_active(..)
//!   │                       ◀──────────── resume buf ───┘
//!   ◀── Err(Escape)         disarm slot
//! ```
//!
//! Frames skipped by an escape do not run destructors. Anything with a
//! meaningful `Drop` must live outside the guarded call.
//!
//! The crate also exposes the process-wide GDB JIT descriptor
//! ([`jit_debug`]) and a probe for the unwinder backing the process
//! ([`unwinder`]).

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod config;
mod error;
mod guard;
pub mod jit_debug;
mod scope;
mod slot;
mod strategy;
mod trigger;
pub mod unwinder;

pub use config::TrapConfig;
pub use error::{ConfigError, Escape, EscapeCode};
pub use guard::{CallOutcome, guarded_call, guarded_call_outcome};
pub use otter_trap_sys::GuardedOperation;
pub use scope::{catch_escape, escape_active, is_escape_armed};
pub use slot::{EscapeSlot, JumpBufferHandle};
pub use strategy::JumpStrategy;
pub use trigger::trigger_escape;
