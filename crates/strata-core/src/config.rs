//! Engine configuration and generic YAML config I/O
//!
//! The engine itself is configured with [`EngineConfig`]; applications load
//! their own settings files through the generic [`load_config`] /
//! [`save_config`] helpers.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::types::SliceId;

/// Which slices the spectral filter runs on.
///
/// Cutoff parameters are tracked for all four slices either way; `Fixed`
/// shapes a single designated slice, `PerSlice` runs the same pipeline over
/// every slice, each with its own carried analysis state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterScope {
    /// Shape a single designated slice
    Fixed(SliceId),
    /// Shape every slice with its own cutoffs
    PerSlice,
}

impl Default for FilterScope {
    fn default() -> Self {
        FilterScope::Fixed(SliceId::B)
    }
}

impl FilterScope {
    /// Whether the given slice is spectrally shaped under this scope
    #[inline]
    pub fn includes(&self, id: SliceId) -> bool {
        match self {
            FilterScope::Fixed(target) => *target == id,
            FilterScope::PerSlice => true,
        }
    }
}

/// Engine-level configuration, fixed for the lifetime of the engine
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Spectral filter scope
    #[serde(default)]
    pub filter_scope: FilterScope,
}

/// Load configuration from a YAML file
///
/// A missing or unparseable file yields the default config; a bad settings
/// file must never stop the sampler from coming up.
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::info!("no config at {:?}, using defaults", path);
        return T::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<T>(&contents) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("failed to parse config {:?}: {}, using defaults", path, e);
                T::default()
            }
        },
        Err(e) => {
            log::warn!("failed to read config {:?}: {}, using defaults", path, e);
            T::default()
        }
    }
}

/// Save configuration to a YAML file, creating parent directories as needed
pub fn save_config<T>(config: &T, path: &Path) -> Result<(), std::io::Error>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let yaml = serde_yaml::to_string(config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, yaml)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct TestConfig {
        value: i32,
        name: String,
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let config: TestConfig = load_config(Path::new("/nonexistent/path/config.yaml"));
        assert_eq!(config, TestConfig::default());
    }

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strata.yaml");

        let config = TestConfig {
            value: 42,
            name: "test".to_string(),
        };

        save_config(&config, &path).unwrap();
        let loaded: TestConfig = load_config(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_filter_scope_membership() {
        let fixed = FilterScope::default();
        assert!(fixed.includes(SliceId::B));
        assert!(!fixed.includes(SliceId::A));

        for id in SliceId::ALL {
            assert!(FilterScope::PerSlice.includes(id));
        }
    }

    #[test]
    fn test_engine_config_yaml() {
        let cfg = EngineConfig {
            filter_scope: FilterScope::PerSlice,
        };
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let back: EngineConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.filter_scope, FilterScope::PerSlice);
    }
}
