//! Runtime configuration.
//!
//! Resolved once per process, from the environment unless the embedder calls
//! [`init`] first:
//!
//! - `OTTER_TRAP_VERIFY=1`: resume-once checks in release builds
//! - `OTTER_TRAP_LOG=1`: log every escape at `debug` level (`otter::trap`)

use std::sync::OnceLock;

use crate::error::ConfigError;

static TRAP_CONFIG: OnceLock<TrapConfig> = OnceLock::new();

/// Trap core settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrapConfig {
    /// Check that no jump buffer is resumed twice, even without
    /// `debug_assertions`.
    pub verify_resume: bool,
    /// Emit a `tracing` event for each escape caught by `catch_escape`.
    pub log_escapes: bool,
}

impl TrapConfig {
    /// Read settings from `OTTER_TRAP_*` environment variables.
    pub fn from_env() -> Self {
        Self {
            verify_resume: env_flag("OTTER_TRAP_VERIFY"),
            log_escapes: env_flag("OTTER_TRAP_LOG"),
        }
    }
}

/// Install `config` as the process configuration.
///
/// Fails if configuration was already resolved, either by an earlier `init`
/// or by the first guarded call.
pub fn init(config: TrapConfig) -> Result<(), ConfigError> {
    TRAP_CONFIG
        .set(config)
        .map_err(|_| ConfigError::AlreadyInitialized)
}

/// Process configuration, read from the environment on first use.
pub fn get() -> &'static TrapConfig {
    TRAP_CONFIG.get_or_init(TrapConfig::from_env)
}

// Signal-safe: never initializes.
pub(crate) fn verify_resume_if_initialized() -> bool {
    TRAP_CONFIG.get().is_some_and(|config| config.verify_resume)
}

/// Whether environment variable `name` is set to a truthy value.
pub fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .is_some_and(|value| parse_env_truthy(&value))
}

/// Anything but empty, `0`, `false`, `off` or `no` counts as enabled.
pub fn parse_env_truthy(value: &str) -> bool {
    let value = value.trim();
    !matches!(value, "" | "0")
        && !value.eq_ignore_ascii_case("false")
        && !value.eq_ignore_ascii_case("off")
        && !value.eq_ignore_ascii_case("no")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_values() {
        for value in ["1", "true", "yes", "on", " 2 "] {
            assert!(parse_env_truthy(value), "{value:?} should be truthy");
        }
        for value in ["", "0", "false", "FALSE", "off", "No", "  "] {
            assert!(!parse_env_truthy(value), "{value:?} should be falsy");
        }
    }

    #[test]
    fn second_init_is_rejected() {
        let _ = init(TrapConfig::default());
        assert_eq!(
            init(TrapConfig::default()),
            Err(ConfigError::AlreadyInitialized)
        );
    }

    #[test]
    fn get_is_stable() {
        assert!(std::ptr::eq(get(), get()));
    }
}
