//! Playback coordination: effects with overlap suppression, the background
//! music channel and its fade transitions, and channel volume controls.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::fade::{FadePhase, FadeProgress, FadeTarget, FadeTransition};
use crate::pool::ReleasedEmitter;
use crate::{
    AppConfig, AudioClip, Channel, ClipId, Emitter, EmitterFactory, EmitterId, EmitterPool,
    FadeConfig, HeadlessFactory, Mixer, MixerBackend, ParameterTable, Result, SoundError,
};

/// Where the background music channel is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BgmState {
    Idle,
    Playing,
    Fading,
}

/// Everything a single [`SoundManager::tick`] changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Emitters whose one-shot clip finished and went back to the pool.
    pub released: Vec<ReleasedEmitter>,
    /// Effects cut short since the previous tick because the pool reclaimed
    /// their emitter for a newer request.
    pub reclaimed: Vec<ReleasedEmitter>,
    /// Progress of the music transition, if one was running.
    pub fade: Option<FadeProgress>,
}

/// Acquires an emitter and starts `clip` on it.
pub(crate) fn start_clip<F: EmitterFactory>(
    pool: &mut EmitterPool<F>,
    clip: &AudioClip,
    channel: Channel,
    looping: bool,
    volume: f32,
) -> Result<EmitterId> {
    let id = pool.acquire()?;
    let emitter = pool.get_mut(id).ok_or(SoundError::NotActive(id))?;
    emitter.set_channel(channel);
    emitter.set_clip(Some(clip.clone()));
    emitter.set_looping(looping);
    emitter.set_volume(volume);
    emitter.play();
    Ok(id)
}

/// Plays music and effects through a shared [`EmitterPool`].
///
/// Built once by the host and passed around by reference; all calls are
/// expected from one update loop that also drives [`SoundManager::tick`].
#[derive(Debug)]
pub struct SoundManager<F, B> {
    pool: EmitterPool<F>,
    mixer: Mixer<B>,
    fade: FadeConfig,
    recent: HashMap<ClipId, EmitterId>,
    bgm: Option<EmitterId>,
    transition: Option<FadeTransition>,
    reclaimed: Vec<ReleasedEmitter>,
}

impl SoundManager<HeadlessFactory, ParameterTable> {
    /// Manager with state-only emitters and an in-memory mixer.
    pub fn headless(config: &AppConfig) -> Self {
        Self::new(config, HeadlessFactory, ParameterTable::new())
    }
}

impl<F: EmitterFactory, B: MixerBackend> SoundManager<F, B> {
    pub fn new(config: &AppConfig, factory: F, backend: B) -> Self {
        Self {
            pool: EmitterPool::new(config.pool.clone(), factory),
            mixer: Mixer::new(config.mixer.clone(), backend),
            fade: config.fade.clone(),
            recent: HashMap::new(),
            bgm: None,
            transition: None,
            reclaimed: Vec::new(),
        }
    }

    /// Creates the configured number of idle emitters up front.
    pub fn prewarm(&mut self) -> usize {
        self.pool.prewarm()
    }

    /// Plays a sound effect on the effects channel.
    ///
    /// With `allow_overlap` unset, a clip whose most recent emitter is still
    /// checked out is restarted on that emitter instead of taking a new one.
    pub fn play_effect(&mut self, clip: &AudioClip, allow_overlap: bool) -> Result<EmitterId> {
        if !allow_overlap {
            if let Some(id) = self.recent_emitter(&clip.id) {
                if let Some(emitter) = self.pool.get_mut(id) {
                    emitter.play();
                    tracing::debug!(clip = %clip.id, emitter = %id, "effect restarted");
                    return Ok(id);
                }
            }
        }

        let started = start_clip(&mut self.pool, clip, Channel::Se, false, 1.0);
        self.collect_reclaimed();
        let id = started?;
        self.recent.insert(clip.id.clone(), id);
        tracing::debug!(clip = %clip.id, emitter = %id, allow_overlap, "effect started");
        Ok(id)
    }

    /// Switches the background music to `clip`.
    ///
    /// When nothing is audible on the channel the clip starts immediately at
    /// full volume. Otherwise any running transition is dropped and a new
    /// fade from the current music to `clip` begins on the next tick.
    pub fn play_background_music(&mut self, clip: &AudioClip, looping: bool) -> Result<()> {
        let playing = self
            .bgm
            .and_then(|id| self.pool.get(id))
            .is_some_and(Emitter::is_playing);

        if !playing {
            self.cancel_transition();
            if let Some(id) = self.bgm.take() {
                if self.pool.is_active(id) {
                    self.pool.release(id)?;
                }
            }
            let started = start_clip(&mut self.pool, clip, Channel::Bgm, looping, 1.0);
            self.collect_reclaimed();
            let id = started?;
            self.pool.pin(id);
            self.bgm = Some(id);
            tracing::info!(clip = %clip.id, emitter = %id, looping, "background music started");
            return Ok(());
        }

        self.cancel_transition();
        let target = FadeTarget {
            clip: clip.clone(),
            looping,
        };
        self.transition = Some(FadeTransition::new(
            self.bgm,
            Some(target),
            self.fade.volume_fade_time,
        ));
        tracing::info!(clip = %clip.id, looping, "background music fade started");
        Ok(())
    }

    /// Fades the current background music out and leaves the channel idle.
    pub fn stop_background_music(&mut self) {
        self.cancel_transition();
        if self.bgm.is_some_and(|id| self.pool.is_active(id)) {
            self.transition = Some(FadeTransition::new(
                self.bgm,
                None,
                self.fade.volume_fade_time,
            ));
            tracing::info!("background music fading out");
        } else {
            self.bgm = None;
        }
    }

    pub fn set_bgm_volume(&mut self, value: f32) -> Result<f32> {
        self.mixer.set_volume(Channel::Bgm, value)
    }

    pub fn set_se_volume(&mut self, value: f32) -> Result<f32> {
        self.mixer.set_volume(Channel::Se, value)
    }

    pub fn set_master_volume(&mut self, value: f32) -> Result<f32> {
        self.mixer.set_volume(Channel::Master, value)
    }

    /// Applies a linear volume to any channel. Returns the decibels written.
    pub fn set_volume(&mut self, channel: Channel, value: f32) -> Result<f32> {
        self.mixer.set_volume(channel, value)
    }

    /// Advances playback by `dt` seconds: finished one-shots go back to the
    /// pool, then the music transition (if any) takes one step.
    ///
    /// An error here can only come from the transition failing to start its
    /// incoming clip. The channel is left idle and the error carries this
    /// tick's finished one-shots; reclaimed effects wait for the next report.
    pub fn tick(&mut self, dt: f32) -> Result<TickReport> {
        let released = self.pool.tick(dt);
        for emitter in &released {
            self.forget(emitter.id);
        }

        let fade = match self.transition.take() {
            Some(transition) => match self.step_transition(transition, dt) {
                Ok(progress) => Some(progress),
                Err(err) => {
                    return Err(SoundError::FadeInterrupted {
                        source: Box::new(err),
                        released,
                    })
                }
            },
            None => None,
        };

        Ok(TickReport {
            released,
            reclaimed: std::mem::take(&mut self.reclaimed),
            fade,
        })
    }

    pub fn bgm_state(&self) -> BgmState {
        if self.transition.is_some() {
            BgmState::Fading
        } else if self.bgm_emitter().is_some() {
            BgmState::Playing
        } else {
            BgmState::Idle
        }
    }

    /// Phase of the running music transition, if any.
    pub fn fade_phase(&self) -> Option<FadePhase> {
        self.transition.as_ref().map(FadeTransition::phase)
    }

    pub fn bgm_id(&self) -> Option<EmitterId> {
        self.bgm.filter(|&id| self.pool.is_active(id))
    }

    pub fn bgm_emitter(&self) -> Option<&Emitter> {
        self.bgm.and_then(|id| self.pool.get(id))
    }

    pub fn emitter(&self, id: EmitterId) -> Option<&Emitter> {
        self.pool.get(id)
    }

    /// Most recent effect emitter for `clip` that is still checked out.
    pub fn recent_emitter(&self, clip: &ClipId) -> Option<EmitterId> {
        self.recent
            .get(clip)
            .copied()
            .filter(|&id| self.pool.is_active(id))
    }

    pub fn pool(&self) -> &EmitterPool<F> {
        &self.pool
    }

    pub fn mixer(&self) -> &Mixer<B> {
        &self.mixer
    }

    fn step_transition(
        &mut self,
        mut transition: FadeTransition,
        dt: f32,
    ) -> Result<FadeProgress> {
        let stepped = transition.step(dt, &mut self.pool);
        self.collect_reclaimed();
        let progress = match stepped {
            Ok(progress) => progress,
            Err(err) => {
                self.bgm = None;
                tracing::warn!(error = %err, "background music fade could not start next clip");
                return Err(err);
            }
        };

        if let Some(id) = progress.released {
            self.forget(id);
        }
        if let Some(id) = progress.started {
            self.pool.pin(id);
            self.bgm = Some(id);
        }
        if progress.finished {
            tracing::info!(emitter = ?self.bgm, "background music fade finished");
        } else {
            self.transition = Some(transition);
        }
        Ok(progress)
    }

    /// Drops cached handles to emitters the pool reclaimed and queues them
    /// for the next [`TickReport`].
    fn collect_reclaimed(&mut self) {
        for emitter in self.pool.take_reclaimed() {
            self.forget(emitter.id);
            self.reclaimed.push(emitter);
        }
    }

    fn cancel_transition(&mut self) {
        if let Some(transition) = self.transition.take() {
            tracing::debug!(phase = ?transition.phase(), "background music fade cancelled");
        }
    }

    fn forget(&mut self, id: EmitterId) {
        self.recent.retain(|_, recent| *recent != id);
        if self.bgm == Some(id) {
            self.bgm = None;
        }
    }
}
