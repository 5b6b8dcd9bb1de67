//! Error types.

use std::fmt;

use thiserror::Error;

/// Opaque reason code chosen by whoever triggered an escape.
///
/// The core attaches no meaning to it; trap detectors and the runtime agree
/// on their own numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EscapeCode(pub u32);

impl EscapeCode {
    /// No reason was recorded.
    pub const UNKNOWN: Self = Self(0);
}

impl fmt::Display for EscapeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code {}", self.0)
    }
}

/// Guest execution was aborted by an escape.
///
/// Built inside trap handlers, so it is `Copy` and owns no heap data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("guest execution escaped with {code}{}", format_location(.pc, .faulting_addr))]
pub struct Escape {
    /// Reason supplied by the trap detector.
    pub code: EscapeCode,
    /// Program counter at the trap, when known.
    pub pc: Option<usize>,
    /// Inaccessible address for memory faults, when known.
    pub faulting_addr: Option<usize>,
}

impl Escape {
    /// Escape with only a reason code.
    pub const fn new(code: EscapeCode) -> Self {
        Self {
            code,
            pc: None,
            faulting_addr: None,
        }
    }

    /// Escape whose reason was never recorded.
    pub const fn unknown() -> Self {
        Self::new(EscapeCode::UNKNOWN)
    }

    /// Attach the trapping program counter.
    pub const fn with_pc(mut self, pc: usize) -> Self {
        self.pc = Some(pc);
        self
    }

    /// Attach the faulting data address.
    pub const fn with_faulting_addr(mut self, addr: usize) -> Self {
        self.faulting_addr = Some(addr);
        self
    }
}

fn format_location(pc: &Option<usize>, faulting_addr: &Option<usize>) -> String {
    let mut out = String::new();
    if let Some(pc) = pc {
        out.push_str(&format!(" at pc {:#x}", pc));
    }
    if let Some(addr) = faulting_addr {
        out.push_str(&format!(" accessing {:#x}", addr));
    }
    out
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `config::init` ran after configuration was already resolved.
    #[error("trap configuration is already initialized")]
    AlreadyInitialized,
}
