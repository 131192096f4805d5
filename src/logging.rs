//! Tracing subscriber setup.

use tracing_subscriber::{fmt, EnvFilter};

use crate::types::{LaminaError, Result};

/// Installs a global `fmt` subscriber filtered by `filter` (`EnvFilter` syntax).
pub fn init_logging(filter: &str) -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_new(filter).map_err(|_| LaminaError::Invalid("invalid log filter"))?,
        )
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .map_err(|_| LaminaError::Invalid("logging already initialized"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_rejected() {
        let _ = init_logging("lamina=debug");
        assert!(matches!(
            init_logging("info"),
            Err(LaminaError::Invalid(_))
        ));
    }
}
