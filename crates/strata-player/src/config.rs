//! Player configuration
//!
//! Loaded from `~/.config/strata/player.yaml` (or the platform equivalent)
//! through the generic YAML helpers in strata-core. Everything is optional;
//! the defaults give a working player on the system default device.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use strata_core::audio::{AudioConfig, BufferSize};
use strata_core::config::{EngineConfig, FilterScope};

/// Persistent player settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Output device name (None = system default)
    #[serde(default)]
    pub device: Option<String>,
    /// Audio block size in frames
    #[serde(default)]
    pub buffer_frames: Option<u32>,
    /// Which slices the spectral filter shapes
    #[serde(default)]
    pub filter_scope: Option<FilterScope>,
}

impl PlayerConfig {
    /// Audio boundary configuration, preferring the source's sample rate so
    /// the recording plays at pitch
    pub fn audio_config(&self, source_rate: u32) -> AudioConfig {
        AudioConfig {
            device: self.device.clone(),
            buffer_size: match self.buffer_frames {
                Some(frames) => BufferSize::Fixed(frames),
                None => BufferSize::Default,
            },
            sample_rate: Some(source_rate),
        }
    }

    /// Engine configuration
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            filter_scope: self.filter_scope.unwrap_or_default(),
        }
    }
}

/// Default config file location
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("strata")
        .join("player.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::types::SliceId;

    #[test]
    fn test_defaults_are_usable() {
        let config = PlayerConfig::default();
        let audio = config.audio_config(44_100);

        assert!(audio.device.is_none());
        assert_eq!(audio.buffer_size, BufferSize::Default);
        assert_eq!(audio.sample_rate, Some(44_100));
        assert_eq!(
            config.engine_config().filter_scope,
            FilterScope::Fixed(SliceId::B)
        );
    }

    #[test]
    fn test_yaml_parse() {
        let yaml = "device: pipewire\nbuffer_frames: 1024\nfilter_scope: PerSlice\n";
        let config: PlayerConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.device.as_deref(), Some("pipewire"));
        assert_eq!(config.buffer_frames, Some(1024));
        assert_eq!(config.filter_scope, Some(FilterScope::PerSlice));
    }
}
