use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Result, SoundError};

/// Identity of an audio clip. Two clips with the same id are the same asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipId(String);

impl ClipId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque handle to a decoded clip owned by the host. Only the duration is
/// ever queried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioClip {
    #[serde(rename = "name")]
    pub id: ClipId,
    /// Length in seconds.
    pub duration: f32,
}

impl AudioClip {
    pub fn new(name: impl Into<String>, duration: f32) -> Self {
        Self {
            id: ClipId::new(name),
            duration: duration.max(0.0),
        }
    }
}

/// Registry of the clips a host has made available, looked up by name.
#[derive(Debug, Default)]
pub struct ClipLibrary {
    clips: HashMap<ClipId, AudioClip>,
}

impl ClipLibrary {
    pub fn new() -> Self {
        Self {
            clips: HashMap::new(),
        }
    }

    pub fn register(&mut self, clip: AudioClip) {
        self.clips.insert(clip.id.clone(), clip);
    }

    pub fn get(&self, name: &str) -> Option<&AudioClip> {
        self.clips.get(&ClipId::new(name))
    }

    pub fn resolve(&self, name: &str) -> Result<AudioClip> {
        self.get(name)
            .cloned()
            .ok_or_else(|| SoundError::ClipNotFound(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}

impl FromIterator<AudioClip> for ClipLibrary {
    fn from_iter<I: IntoIterator<Item = AudioClip>>(iter: I) -> Self {
        let mut library = Self::new();
        for clip in iter {
            library.register(clip);
        }
        library
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_registered_clips() {
        let mut library = ClipLibrary::new();
        library.register(AudioClip::new("title", 90.0));

        let clip = library.resolve("title").unwrap();
        assert_eq!(clip.id.as_str(), "title");
        assert_eq!(clip.duration, 90.0);
    }

    #[test]
    fn errors_on_missing_clips() {
        let library: ClipLibrary = [AudioClip::new("jump", 0.4)].into_iter().collect();

        let err = library.resolve("missing").unwrap_err();
        assert!(format!("{err}").contains("missing"));
    }

    #[test]
    fn clamps_negative_durations() {
        assert_eq!(AudioClip::new("broken", -1.0).duration, 0.0);
    }
}
