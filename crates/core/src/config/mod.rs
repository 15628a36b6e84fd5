use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration structure for the sound manager.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pool: PoolConfig,
    pub fade: FadeConfig,
    pub mixer: MixerConfig,
}

impl AppConfig {
    /// Parses a configuration document. Missing sections and fields fall back
    /// to their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

/// What the pool does when an acquire finds every emitter checked out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionPolicy {
    /// Fail the acquire with [`crate::SoundError::PoolExhausted`].
    #[default]
    Reject,
    /// Force-release the longest-active non-looping emitter and reuse it.
    ReclaimOldest,
}

/// Emitter pool sizing and safety checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of emitters created by [`crate::EmitterPool::prewarm`].
    pub default_size: usize,
    /// Upper bound on emitters owned by the pool, idle and active combined.
    pub max_size: usize,
    /// Report releases of emitters that are not checked out.
    pub collection_checks: bool,
    pub exhaustion_policy: ExhaustionPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            default_size: 8,
            max_size: 32,
            collection_checks: true,
            exhaustion_policy: ExhaustionPolicy::Reject,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FadeConfig {
    /// Seconds a full 0..1 volume ramp takes.
    pub volume_fade_time: f32,
}

impl Default for FadeConfig {
    fn default() -> Self {
        Self {
            volume_fade_time: 1.0,
        }
    }
}

/// Attenuation range and the exposed mixer parameter for each channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    pub min_db: f32,
    pub max_db: f32,
    pub master_parameter: String,
    pub bgm_parameter: String,
    pub se_parameter: String,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            min_db: -80.0,
            max_db: 0.0,
            master_parameter: "Master".to_string(),
            bgm_parameter: "Bgm".to_string(),
            se_parameter: "Se".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_documents_fall_back_to_defaults() {
        let config =
            AppConfig::from_json_str(r#"{ "pool": { "max_size": 4 }, "fade": {} }"#).unwrap();

        assert_eq!(config.pool.max_size, 4);
        assert_eq!(config.pool.default_size, 8);
        assert!(config.pool.collection_checks);
        assert_eq!(config.fade.volume_fade_time, 1.0);
        assert_eq!(config.mixer, MixerConfig::default());
    }

    #[test]
    fn parses_exhaustion_policy() {
        let config =
            AppConfig::from_json_str(r#"{ "pool": { "exhaustion_policy": "reclaim_oldest" } }"#)
                .unwrap();
        assert_eq!(
            config.pool.exhaustion_policy,
            ExhaustionPolicy::ReclaimOldest
        );
    }

    #[test]
    fn rejects_malformed_documents() {
        let err = AppConfig::from_json_str("{ pool: ").unwrap_err();
        assert!(matches!(err, crate::SoundError::Json(_)));
    }
}
