//! # Storage Configuration
//!
//! Loaded once at startup, usually from a TOML file:
//!
//! ```toml
//! chunk_size = 16384
//! ```

use serde::Deserialize;

use crate::error::{StorageError, StorageResult};

/// Default chunk size in bytes (16 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

/// Tunables for the chunk storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Byte size of every chunk allocated for a layout.
    pub chunk_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl StorageConfig {
    /// Creates a config with the given chunk size.
    #[must_use]
    pub const fn with_chunk_size(chunk_size: usize) -> Self {
        Self { chunk_size }
    }

    /// Parses and validates a config from TOML source.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidConfig`] on malformed TOML or
    /// out-of-range values.
    pub fn from_toml_str(source: &str) -> StorageResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| StorageError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the values can back a chunk.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidConfig`] when `chunk_size` is zero or
    /// does not fit in a `u32` offset.
    pub fn validate(&self) -> StorageResult<()> {
        if self.chunk_size == 0 {
            return Err(StorageError::InvalidConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if u32::try_from(self.chunk_size).is_err() {
            return Err(StorageError::InvalidConfig(format!(
                "chunk_size {} exceeds u32::MAX",
                self.chunk_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_chunk_size() {
        assert_eq!(StorageConfig::default().chunk_size, 16384);
    }

    #[test]
    fn test_from_toml() {
        let config = StorageConfig::from_toml_str("chunk_size = 4096").unwrap();
        assert_eq!(config.chunk_size, 4096);

        let config = StorageConfig::from_toml_str("").unwrap();
        assert_eq!(config, StorageConfig::default());
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            StorageConfig::from_toml_str("chunk_size = 0"),
            Err(StorageError::InvalidConfig(_))
        ));
        assert!(matches!(
            StorageConfig::from_toml_str("chunk_size = \"big\""),
            Err(StorageError::InvalidConfig(_))
        ));
        assert!(matches!(
            StorageConfig::from_toml_str("chunk_bytes = 10"),
            Err(StorageError::InvalidConfig(_))
        ));
    }
}
