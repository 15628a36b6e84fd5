use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{AudioClip, Channel, ClipLibrary, EmitterFactory, MixerBackend, Result, SoundManager};

/// Simulated time driving the update loop.
#[derive(Debug, Default, Clone)]
pub struct PlaybackClock {
    pub time_seconds: f32,
}

impl PlaybackClock {
    pub fn advance(&mut self, delta: f32) {
        self.time_seconds = (self.time_seconds + delta).max(0.0);
    }
}

/// Playback request issued at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CueAction {
    Bgm {
        clip: String,
        #[serde(rename = "loop", default)]
        looping: bool,
    },
    StopBgm,
    Effect {
        clip: String,
        #[serde(default)]
        allow_overlap: bool,
    },
    Volume {
        channel: Channel,
        value: f32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    pub time: f32,
    #[serde(flatten)]
    pub action: CueAction,
}

impl Cue {
    pub fn new(time: f32, action: CueAction) -> Self {
        Self { time, action }
    }

    /// Name of the clip the cue plays, if it plays one.
    pub fn clip_name(&self) -> Option<&str> {
        match &self.action {
            CueAction::Bgm { clip, .. } | CueAction::Effect { clip, .. } => Some(clip.as_str()),
            CueAction::StopBgm | CueAction::Volume { .. } => None,
        }
    }

    /// Issues the cue against `manager`, resolving clip names in `library`.
    pub fn apply<F: EmitterFactory, B: MixerBackend>(
        &self,
        manager: &mut SoundManager<F, B>,
        library: &ClipLibrary,
    ) -> Result<()> {
        match &self.action {
            CueAction::Bgm { clip, looping } => {
                let clip = library.resolve(clip)?;
                manager.play_background_music(&clip, *looping)
            }
            CueAction::StopBgm => {
                manager.stop_background_music();
                Ok(())
            }
            CueAction::Effect {
                clip,
                allow_overlap,
            } => {
                let clip = library.resolve(clip)?;
                manager.play_effect(&clip, *allow_overlap).map(|_| ())
            }
            CueAction::Volume { channel, value } => {
                manager.set_volume(*channel, *value).map(|_| ())
            }
        }
    }
}

/// Clip declarations plus a list of timed cues.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CueScript {
    #[serde(default)]
    pub clips: Vec<AudioClip>,
    #[serde(default)]
    pub cues: Vec<Cue>,
}

impl CueScript {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn library(&self) -> ClipLibrary {
        self.clips.iter().cloned().collect()
    }

    /// Checks that every cue names a declared clip.
    pub fn validate(&self, library: &ClipLibrary) -> Result<()> {
        for name in self.cues.iter().filter_map(Cue::clip_name) {
            library.resolve(name)?;
        }
        Ok(())
    }

    /// Time of the last cue, or zero for an empty script.
    pub fn end_time(&self) -> f32 {
        self.cues.iter().map(|cue| cue.time).fold(0.0, f32::max)
    }
}

/// Releases cues in time order as the clock passes them.
#[derive(Debug, Default)]
pub struct Scheduler {
    cues: Vec<Cue>,
    next_cue: usize,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_cues(&mut self, cues: Vec<Cue>) {
        self.cues = cues;
        self.cues.sort_by(|a, b| a.time.total_cmp(&b.time));
        self.next_cue = 0;
    }

    /// Cues whose time has been reached and that have not fired yet.
    pub fn due(&mut self, clock: &PlaybackClock) -> &[Cue] {
        let start = self.next_cue;
        while self
            .cues
            .get(self.next_cue)
            .is_some_and(|cue| cue.time <= clock.time_seconds)
        {
            self.next_cue += 1;
        }
        &self.cues[start..self.next_cue]
    }

    pub fn is_finished(&self) -> bool {
        self.next_cue >= self.cues.len()
    }
}
