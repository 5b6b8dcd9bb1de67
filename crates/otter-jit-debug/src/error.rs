//! Registration errors.

use thiserror::Error;

/// Result alias for JIT debug registration.
pub type JitDebugResult<T> = Result<T, JitDebugError>;

/// Errors raised while registering JIT images.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JitDebugError {
    /// Debuggers cannot load a zero-length object file.
    #[error("JIT debug image is empty")]
    EmptyImage,
}
