use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{AudioClip, Channel};

/// Generational handle to an emitter owned by the [`crate::EmitterPool`].
///
/// The generation changes every time the emitter goes back to the pool, so a
/// handle kept after its release never resolves to whoever acquires the same
/// emitter next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmitterId {
    slot: u32,
    generation: u32,
}

impl EmitterId {
    pub(crate) fn new(slot: usize, generation: u32) -> Self {
        Self {
            slot: slot as u32,
            generation,
        }
    }

    pub(crate) fn slot(self) -> usize {
        self.slot as usize
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for EmitterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.slot, self.generation)
    }
}

/// A reusable voice that plays one clip at a time on one output channel.
///
/// The headless model tracks the playback position itself; [`Emitter::advance`]
/// is driven by the pool once per tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Emitter {
    id: EmitterId,
    clip: Option<AudioClip>,
    looping: bool,
    volume: f32,
    position: f32,
    channel: Option<Channel>,
    playing: bool,
    active: bool,
}

impl Emitter {
    pub fn new(id: EmitterId) -> Self {
        Self {
            id,
            clip: None,
            looping: false,
            volume: 1.0,
            position: 0.0,
            channel: None,
            playing: false,
            active: false,
        }
    }

    pub fn id(&self) -> EmitterId {
        self.id
    }

    pub fn clip(&self) -> Option<&AudioClip> {
        self.clip.as_ref()
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Playback position in seconds.
    pub fn position(&self) -> f32 {
        self.position
    }

    pub fn channel(&self) -> Option<Channel> {
        self.channel
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Binds a clip, stopping whatever was playing.
    pub fn set_clip(&mut self, clip: Option<AudioClip>) {
        self.clip = clip;
        self.position = 0.0;
        self.playing = false;
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub fn set_channel(&mut self, channel: Channel) {
        self.channel = Some(channel);
    }

    /// Starts the bound clip from the beginning. Restarts if already playing.
    pub fn play(&mut self) {
        self.position = 0.0;
        self.playing = self.clip.is_some();
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }

    /// True once a non-looping clip has been played through to its end.
    /// A zero-length clip counts as finished even when looping.
    pub fn is_finished(&self) -> bool {
        match &self.clip {
            Some(clip) => {
                self.position >= clip.duration && (!self.looping || clip.duration <= 0.0)
            }
            None => false,
        }
    }

    pub(crate) fn advance(&mut self, dt: f32) {
        if !self.playing {
            return;
        }
        let Some(duration) = self.clip.as_ref().map(|clip| clip.duration) else {
            return;
        };

        self.position += dt.max(0.0);
        if self.looping && duration > 0.0 {
            self.position %= duration;
        } else if self.position >= duration {
            self.position = duration.max(0.0);
            self.stop();
        }
    }

    pub(crate) fn activate(&mut self, id: EmitterId) {
        self.id = id;
        self.active = true;
    }

    pub(crate) fn reset(&mut self) {
        self.clip = None;
        self.looping = false;
        self.volume = 1.0;
        self.position = 0.0;
        self.channel = None;
        self.playing = false;
        self.active = false;
    }
}

/// Host hook for creating and destroying the resources behind emitters.
pub trait EmitterFactory {
    fn create(&mut self, id: EmitterId) -> Emitter;

    fn destroy(&mut self, emitter: Emitter);
}

/// Factory for hosts without a backing audio resource; emitters are plain
/// state.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessFactory;

impl EmitterFactory for HeadlessFactory {
    fn create(&mut self, id: EmitterId) -> Emitter {
        Emitter::new(id)
    }

    fn destroy(&mut self, emitter: Emitter) {
        drop(emitter);
    }
}
