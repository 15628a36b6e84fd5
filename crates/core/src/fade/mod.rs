use serde::{Deserialize, Serialize};

use crate::coordinator::start_clip;
use crate::{AudioClip, Channel, EmitterFactory, EmitterId, EmitterPool, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadePhase {
    /// Ramping the outgoing emitter down to silence.
    FadingOut,
    /// Ramping the incoming emitter up to full volume.
    FadingIn,
    Finished,
}

/// Clip and loop mode the channel moves to once the outgoing music is gone.
#[derive(Debug, Clone, PartialEq)]
pub struct FadeTarget {
    pub clip: AudioClip,
    pub looping: bool,
}

/// What a single [`FadeTransition::step`] did to the pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FadeProgress {
    /// Outgoing emitter handed back to the pool this step.
    pub released: Option<EmitterId>,
    /// Incoming emitter started this step.
    pub started: Option<EmitterId>,
    pub finished: bool,
}

/// Background music transition advanced one step per tick.
///
/// Dropping the value cancels the transition. Whatever volume the emitters
/// had reached stays as it is, and a replacement transition picks the current
/// music emitter up in that state.
#[derive(Debug, Clone)]
pub struct FadeTransition {
    phase: FadePhase,
    outgoing: Option<EmitterId>,
    incoming: Option<EmitterId>,
    target: Option<FadeTarget>,
    fade_time: f32,
}

impl FadeTransition {
    /// `target` of `None` fades the outgoing music out and stops there.
    pub fn new(outgoing: Option<EmitterId>, target: Option<FadeTarget>, fade_time: f32) -> Self {
        Self {
            phase: FadePhase::FadingOut,
            outgoing,
            incoming: None,
            target,
            fade_time,
        }
    }

    pub fn phase(&self) -> FadePhase {
        self.phase
    }

    /// Advances the transition by `dt` seconds.
    ///
    /// The fade-out runs while the outgoing emitter is live, playing and
    /// audible. On the step where that stops holding, the outgoing emitter is
    /// released, the target clip starts at volume 0 on the music channel and
    /// the first fade-in increment is applied straight away.
    pub fn step<F: EmitterFactory>(
        &mut self,
        dt: f32,
        pool: &mut EmitterPool<F>,
    ) -> Result<FadeProgress> {
        let mut progress = FadeProgress::default();
        let delta = self.volume_delta(dt);

        if self.phase == FadePhase::FadingOut {
            let audible = self
                .outgoing
                .and_then(|id| pool.get_mut(id))
                .filter(|emitter| emitter.is_playing() && emitter.volume() > 0.0);
            if let Some(emitter) = audible {
                emitter.set_volume((emitter.volume() - delta).max(0.0));
                return Ok(progress);
            }

            if let Some(id) = self.outgoing.take() {
                if pool.is_active(id) {
                    pool.release(id)?;
                    progress.released = Some(id);
                }
            }

            let Some(target) = self.target.as_ref() else {
                self.phase = FadePhase::Finished;
                progress.finished = true;
                return Ok(progress);
            };
            let id = match start_clip(pool, &target.clip, Channel::Bgm, target.looping, 0.0) {
                Ok(id) => id,
                Err(err) => {
                    self.phase = FadePhase::Finished;
                    return Err(err);
                }
            };
            self.incoming = Some(id);
            self.phase = FadePhase::FadingIn;
            progress.started = Some(id);
        }

        if self.phase == FadePhase::FadingIn {
            match self.incoming.and_then(|id| pool.get_mut(id)) {
                Some(emitter) if emitter.volume() < 1.0 => {
                    emitter.set_volume((emitter.volume() + delta).min(1.0));
                    if emitter.volume() >= 1.0 {
                        self.phase = FadePhase::Finished;
                    }
                }
                _ => self.phase = FadePhase::Finished,
            }
        }

        progress.finished = self.phase == FadePhase::Finished;
        Ok(progress)
    }

    fn volume_delta(&self, dt: f32) -> f32 {
        if self.fade_time <= 0.0 {
            1.0
        } else {
            dt.max(0.0) / self.fade_time
        }
    }
}
