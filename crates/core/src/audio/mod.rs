use std::sync::{Arc, Mutex, MutexGuard};

use crate::{
    AudioClip, BgmState, EmitterFactory, EmitterId, MixerBackend, Result, SoundError,
    SoundManager, TickReport,
};

/// Shared, thread-safe view over a single [`SoundManager`].
///
/// Every call takes the one lock, so pool and recency-cache mutations stay
/// single-writer even when game threads fire effects while the update loop
/// ticks.
pub struct SharedSoundManager<F, B> {
    shared: Arc<Mutex<SoundManager<F, B>>>,
}

impl<F: EmitterFactory, B: MixerBackend> SharedSoundManager<F, B> {
    pub fn new(manager: SoundManager<F, B>) -> Self {
        Self {
            shared: Arc::new(Mutex::new(manager)),
        }
    }

    pub fn play_effect(&self, clip: &AudioClip, allow_overlap: bool) -> Result<EmitterId> {
        self.lock()?.play_effect(clip, allow_overlap)
    }

    pub fn play_background_music(&self, clip: &AudioClip, looping: bool) -> Result<()> {
        self.lock()?.play_background_music(clip, looping)
    }

    pub fn stop_background_music(&self) -> Result<()> {
        self.lock()?.stop_background_music();
        Ok(())
    }

    pub fn set_bgm_volume(&self, value: f32) -> Result<f32> {
        self.lock()?.set_bgm_volume(value)
    }

    pub fn set_se_volume(&self, value: f32) -> Result<f32> {
        self.lock()?.set_se_volume(value)
    }

    pub fn set_master_volume(&self, value: f32) -> Result<f32> {
        self.lock()?.set_master_volume(value)
    }

    pub fn tick(&self, dt: f32) -> Result<TickReport> {
        self.lock()?.tick(dt)
    }

    pub fn bgm_state(&self) -> Result<BgmState> {
        Ok(self.lock()?.bgm_state())
    }

    /// Runs `f` with exclusive access to the manager.
    pub fn with<R>(&self, f: impl FnOnce(&mut SoundManager<F, B>) -> R) -> Result<R> {
        let mut manager = self.lock()?;
        Ok(f(&mut manager))
    }

    fn lock(&self) -> Result<MutexGuard<'_, SoundManager<F, B>>> {
        self.shared
            .lock()
            .map_err(|_| SoundError::msg("sound manager has been poisoned"))
    }
}

impl<F, B> Clone for SharedSoundManager<F, B> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<F, B> std::fmt::Debug for SharedSoundManager<F, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSoundManager").finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::AppConfig;

    #[test]
    fn effects_from_other_threads_share_one_pool() {
        let shared = SharedSoundManager::new(SoundManager::headless(&AppConfig::default()));
        let jump = AudioClip::new("jump", 2.0);

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                let jump = jump.clone();
                thread::spawn(move || shared.play_effect(&jump, false).unwrap())
            })
            .collect();
        let ids: Vec<EmitterId> = workers
            .into_iter()
            .map(|worker| worker.join().unwrap())
            .collect();

        assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
        let active = shared.with(|manager| manager.pool().count_active()).unwrap();
        assert_eq!(active, 1);
    }

    #[test]
    fn poisoned_lock_surfaces_as_error() {
        let shared = SharedSoundManager::new(SoundManager::headless(&AppConfig::default()));
        let poisoner = shared.clone();
        let _ = thread::spawn(move || {
            let _guard = poisoner.shared.lock().unwrap();
            panic!("poison the manager");
        })
        .join();

        let err = shared.tick(0.1).unwrap_err();
        assert!(format!("{err}").contains("poisoned"));
    }

    #[test]
    fn drives_music_through_the_handle() {
        let shared = SharedSoundManager::new(SoundManager::headless(&AppConfig::default()));
        shared
            .play_background_music(&AudioClip::new("title", 30.0), true)
            .unwrap();
        assert_eq!(shared.bgm_state().unwrap(), BgmState::Playing);

        shared.stop_background_music().unwrap();
        for _ in 0..8 {
            shared.tick(0.25).unwrap();
        }
        assert_eq!(shared.bgm_state().unwrap(), BgmState::Idle);
    }
}
