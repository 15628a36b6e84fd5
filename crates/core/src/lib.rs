//! Core library for the soundpool sound manager.
//!
//! Background music and sound effects play through a bounded pool of reusable
//! emitters. Music changes fade the current track out and the next one in,
//! stepped once per update tick, and each output channel has a volume control
//! that writes decibel gains to the host mixer. Host integration happens
//! through two traits: [`EmitterFactory`] for emitter resources and
//! [`MixerBackend`] for mixer parameters.

pub mod assets;
pub mod audio;
pub mod config;
pub mod coordinator;
pub mod emitter;
pub mod error;
pub mod fade;
pub mod mixer;
pub mod pool;
pub mod timeline;

pub use assets::{AudioClip, ClipId, ClipLibrary};
pub use audio::SharedSoundManager;
pub use config::{AppConfig, ExhaustionPolicy, FadeConfig, MixerConfig, PoolConfig};
pub use coordinator::{BgmState, SoundManager, TickReport};
pub use emitter::{Emitter, EmitterFactory, EmitterId, HeadlessFactory};
pub use error::{Result, SoundError};
pub use fade::{FadePhase, FadeProgress, FadeTarget, FadeTransition};
pub use mixer::{linear_to_db, Channel, Mixer, MixerBackend, ParameterTable, ParameterWrite};
pub use pool::{EmitterPool, ReleasedEmitter};
pub use timeline::{Cue, CueAction, CueScript, PlaybackClock, Scheduler};
