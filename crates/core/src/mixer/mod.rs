use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{MixerConfig, Result};

/// Output path with its own gain stage on the host mixer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Master,
    Bgm,
    Se,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Channel::Master => "master",
            Channel::Bgm => "bgm",
            Channel::Se => "se",
        };
        f.write_str(name)
    }
}

/// Host mixer that accepts gain values, in decibels, for exposed parameters.
pub trait MixerBackend {
    fn set_parameter(&mut self, name: &str, db: f32) -> Result<()>;
}

/// Concrete value written to a mixer parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterWrite {
    pub name: String,
    pub db: f32,
}

/// In-memory mixer that remembers every parameter write.
#[derive(Debug, Default, Clone)]
pub struct ParameterTable {
    values: HashMap<String, f32>,
    writes: Vec<ParameterWrite>,
}

impl ParameterTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<f32> {
        self.values.get(name).copied()
    }

    pub fn writes(&self) -> &[ParameterWrite] {
        &self.writes
    }
}

impl MixerBackend for ParameterTable {
    fn set_parameter(&mut self, name: &str, db: f32) -> Result<()> {
        self.values.insert(name.to_string(), db);
        self.writes.push(ParameterWrite {
            name: name.to_string(),
            db,
        });
        Ok(())
    }
}

/// Maps a linear volume in `[0, 1]` onto `[min_db, max_db]` by interpolating
/// in decibel space. Out-of-range and NaN inputs are clamped first.
pub fn linear_to_db(value: f32, min_db: f32, max_db: f32) -> f32 {
    let t = if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    };
    min_db + (max_db - min_db) * t
}

/// Channel volume controls layered over a [`MixerBackend`].
#[derive(Debug)]
pub struct Mixer<B> {
    config: MixerConfig,
    backend: B,
    levels: HashMap<Channel, f32>,
}

impl<B: MixerBackend> Mixer<B> {
    pub fn new(config: MixerConfig, backend: B) -> Self {
        Self {
            config,
            backend,
            levels: HashMap::new(),
        }
    }

    /// Name of the exposed mixer parameter that drives `channel`.
    pub fn parameter_name(&self, channel: Channel) -> &str {
        match channel {
            Channel::Master => &self.config.master_parameter,
            Channel::Bgm => &self.config.bgm_parameter,
            Channel::Se => &self.config.se_parameter,
        }
    }

    /// Clamps `value`, converts it to decibels and writes it to the channel's
    /// parameter. Returns the decibel value written.
    pub fn set_volume(&mut self, channel: Channel, value: f32) -> Result<f32> {
        let linear = if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, 1.0)
        };
        let db = linear_to_db(linear, self.config.min_db, self.config.max_db);
        let name = self.parameter_name(channel).to_string();

        self.backend.set_parameter(&name, db)?;
        self.levels.insert(channel, linear);
        tracing::info!(%channel, parameter = %name, linear, db, "channel volume set");
        Ok(db)
    }

    /// Last linear volume applied to `channel`; channels never set are at 1.0.
    pub fn volume(&self, channel: Channel) -> f32 {
        self.levels.get(&channel).copied().unwrap_or(1.0)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}
