//! Runtime configuration recognized by the conversion layer.
use std::{borrow::Cow, env::var, fmt, time::Duration};

/// Options the converter and parameter-writer layers consult at runtime.
///
/// Constructed either by hand or via [`Config::from_env`], mirroring the
/// driver's own connection configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub(crate) enable_infinity_conversions: bool,
    pub(crate) default_command_timeout: Duration,
    pub(crate) max_pool_size: u32,
}

const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_POOL_SIZE: u32 = 128;

impl Default for Config {
    fn default() -> Self {
        Self {
            enable_infinity_conversions: false,
            default_command_timeout: DEFAULT_COMMAND_TIMEOUT,
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieve configuration from environment variables.
    ///
    /// It reads:
    /// - `PG_ENABLE_INFINITY_CONVERSIONS`
    /// - `PG_COMMAND_TIMEOUT_MS`
    /// - `PG_MAX_POOL_SIZE`
    ///
    /// Unset or unparsable variables fall back to the documented default.
    pub fn from_env() -> Result<Self, ParseError> {
        let mut config = Self::default();

        if let Ok(raw) = var("PG_ENABLE_INFINITY_CONVERSIONS") {
            config.enable_infinity_conversions = match raw.as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => return Err(ParseError { reason: "PG_ENABLE_INFINITY_CONVERSIONS must be a boolean".into() }),
            };
        }

        if let Ok(raw) = var("PG_COMMAND_TIMEOUT_MS") {
            let ms: u64 = raw
                .parse()
                .map_err(|_| ParseError { reason: "PG_COMMAND_TIMEOUT_MS must be an integer".into() })?;
            config.default_command_timeout = Duration::from_millis(ms);
        }

        if let Ok(raw) = var("PG_MAX_POOL_SIZE") {
            config.max_pool_size = raw
                .parse()
                .map_err(|_| ParseError { reason: "PG_MAX_POOL_SIZE must be an integer".into() })?;
        }

        Ok(config)
    }

    pub fn enable_infinity_conversions(mut self, enable: bool) -> Self {
        self.enable_infinity_conversions = enable;
        self
    }

    pub fn default_command_timeout(mut self, timeout: Duration) -> Self {
        self.default_command_timeout = timeout;
        self
    }

    pub fn max_pool_size(mut self, max: u32) -> Self {
        self.max_pool_size = max;
        self
    }

    pub fn is_infinity_conversions_enabled(&self) -> bool {
        self.enable_infinity_conversions
    }
}

/// Error parsing a configuration value.
pub struct ParseError {
    pub(crate) reason: Cow<'static, str>,
}

impl std::error::Error for ParseError {}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse configuration: {}", self.reason)
    }
}

impl fmt::Debug for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = Config::default();
        assert!(!config.enable_infinity_conversions);
        assert_eq!(config.default_command_timeout, DEFAULT_COMMAND_TIMEOUT);
        assert_eq!(config.max_pool_size, 128);
    }

    #[test]
    fn builder_overrides_fields() {
        let config = Config::new().enable_infinity_conversions(true).max_pool_size(8);
        assert!(config.enable_infinity_conversions);
        assert_eq!(config.max_pool_size, 8);
    }
}
