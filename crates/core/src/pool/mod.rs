//! Bounded pool of reusable emitters.
//!
//! Emitters live in slots owned by the pool and are handed out as generational
//! [`EmitterId`] handles. A slot is either idle (ready to be acquired), active
//! (checked out), or vacant (its emitter was destroyed by [`EmitterPool::clear`]
//! and the slot may be refilled later).

use std::fmt;

use crate::{
    AudioClip, Emitter, EmitterFactory, EmitterId, ExhaustionPolicy, PoolConfig, Result,
    SoundError,
};

/// Emitter that went back to the pool, with the clip it held at the time.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleasedEmitter {
    pub id: EmitterId,
    pub clip: Option<AudioClip>,
}

struct Slot {
    generation: u32,
    emitter: Option<Emitter>,
    /// Acquisition sequence number while the slot is checked out.
    active_since: Option<u64>,
    /// Held by an owner that must not lose it to [`ExhaustionPolicy::ReclaimOldest`].
    pinned: bool,
}

/// Idle/active partitioned set of emitters with an upper bound on how many
/// exist at once.
///
/// The pool never plays or stops audio itself. Its only side effects are
/// creating and destroying emitters through the [`EmitterFactory`] and
/// resetting emitters as they come back.
pub struct EmitterPool<F> {
    config: PoolConfig,
    factory: F,
    slots: Vec<Slot>,
    idle: Vec<usize>,
    vacant: Vec<usize>,
    active_count: usize,
    acquisitions: u64,
    reclaimed: Vec<ReleasedEmitter>,
}

impl<F: EmitterFactory> EmitterPool<F> {
    /// Creates an empty pool. No emitter exists until the first acquire or an
    /// explicit [`EmitterPool::prewarm`].
    pub fn new(config: PoolConfig, factory: F) -> Self {
        let capacity = config.default_size.min(config.max_size);
        Self {
            config,
            factory,
            slots: Vec::with_capacity(capacity),
            idle: Vec::with_capacity(capacity),
            vacant: Vec::new(),
            active_count: 0,
            acquisitions: 0,
            reclaimed: Vec::new(),
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Emitters currently owned by the pool, idle and active.
    pub fn count_all(&self) -> usize {
        self.slots.len() - self.vacant.len()
    }

    pub fn count_active(&self) -> usize {
        self.active_count
    }

    pub fn count_idle(&self) -> usize {
        self.idle.len()
    }

    /// Fills the idle set up to `default_size` (never beyond `max_size`).
    /// Returns how many emitters were created.
    pub fn prewarm(&mut self) -> usize {
        let target = self.config.default_size.min(self.config.max_size);
        let mut created = 0;
        while self.count_all() < target {
            let slot = self.create_slot();
            self.idle.push(slot);
            created += 1;
        }
        tracing::debug!(created, idle = self.idle.len(), "pool prewarmed");
        created
    }

    /// Checks out an emitter, reset to its defaults and marked active.
    ///
    /// Idle emitters are reused most-recently-released first. When none is
    /// idle a new one is created as long as the pool holds fewer than
    /// `max_size` emitters; past that the [`ExhaustionPolicy`] decides.
    pub fn acquire(&mut self) -> Result<EmitterId> {
        let slot = if let Some(slot) = self.idle.pop() {
            slot
        } else if self.count_all() < self.config.max_size {
            self.create_slot()
        } else {
            match self.config.exhaustion_policy {
                ExhaustionPolicy::Reject => {
                    return Err(SoundError::PoolExhausted {
                        max: self.config.max_size,
                    })
                }
                ExhaustionPolicy::ReclaimOldest => self.reclaim_oldest()?,
            }
        };

        self.acquisitions += 1;
        let entry = &mut self.slots[slot];
        let id = EmitterId::new(slot, entry.generation);
        entry.active_since = Some(self.acquisitions);
        if let Some(emitter) = entry.emitter.as_mut() {
            emitter.reset();
            emitter.activate(id);
        }
        self.active_count += 1;

        tracing::debug!(emitter = %id, active = self.active_count, "emitter acquired");
        Ok(id)
    }

    /// Returns an active emitter to the idle set and resets it.
    ///
    /// Releasing a handle that is not checked out (already released, stale, or
    /// never issued) fails with [`SoundError::NotActive`] when collection
    /// checks are enabled and is ignored otherwise.
    pub fn release(&mut self, id: EmitterId) -> Result<()> {
        if !self.is_active(id) {
            if self.config.collection_checks {
                return Err(SoundError::NotActive(id));
            }
            tracing::debug!(emitter = %id, "ignoring release of inactive emitter");
            return Ok(());
        }

        self.release_slot(id.slot());
        self.idle.push(id.slot());
        tracing::debug!(emitter = %id, active = self.active_count, "emitter released");
        Ok(())
    }

    /// Advances every active emitter by `dt` seconds and releases those whose
    /// non-looping clip has played to its end. Each finished emitter is
    /// released exactly once; looping emitters are left alone.
    pub fn tick(&mut self, dt: f32) -> Vec<ReleasedEmitter> {
        let mut finished = Vec::new();
        for (slot, entry) in self.slots.iter_mut().enumerate() {
            if entry.active_since.is_none() {
                continue;
            }
            if let Some(emitter) = entry.emitter.as_mut() {
                emitter.advance(dt);
                if emitter.is_finished() {
                    finished.push(slot);
                }
            }
        }

        finished
            .into_iter()
            .map(|slot| {
                let released = self.release_slot(slot);
                self.idle.push(slot);
                tracing::debug!(emitter = %released.id, "emitter finished playback");
                released
            })
            .collect()
    }

    /// Destroys every idle emitter through the factory. Active emitters are
    /// untouched. Returns how many were destroyed.
    pub fn clear(&mut self) -> usize {
        let idle = std::mem::take(&mut self.idle);
        for &slot in &idle {
            if let Some(emitter) = self.slots[slot].emitter.take() {
                self.factory.destroy(emitter);
            }
            self.vacant.push(slot);
        }
        tracing::debug!(destroyed = idle.len(), "idle emitters destroyed");
        idle.len()
    }

    /// Shields a checked-out emitter from reclamation until it is released.
    /// Returns false if `id` is not active.
    pub fn pin(&mut self, id: EmitterId) -> bool {
        if !self.is_active(id) {
            return false;
        }
        self.slots[id.slot()].pinned = true;
        true
    }

    /// Emitters force-released by [`ExhaustionPolicy::ReclaimOldest`] since
    /// the last call.
    pub fn take_reclaimed(&mut self) -> Vec<ReleasedEmitter> {
        std::mem::take(&mut self.reclaimed)
    }

    /// True while `id` refers to a checked-out emitter.
    pub fn is_active(&self, id: EmitterId) -> bool {
        self.slots.get(id.slot()).is_some_and(|slot| {
            slot.generation == id.generation()
                && slot.active_since.is_some()
                && slot.emitter.is_some()
        })
    }

    pub fn get(&self, id: EmitterId) -> Option<&Emitter> {
        if !self.is_active(id) {
            return None;
        }
        self.slots[id.slot()].emitter.as_ref()
    }

    pub fn get_mut(&mut self, id: EmitterId) -> Option<&mut Emitter> {
        if !self.is_active(id) {
            return None;
        }
        self.slots[id.slot()].emitter.as_mut()
    }

    fn create_slot(&mut self) -> usize {
        let slot = match self.vacant.pop() {
            Some(slot) => slot,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    emitter: None,
                    active_since: None,
                    pinned: false,
                });
                self.slots.len() - 1
            }
        };
        let id = EmitterId::new(slot, self.slots[slot].generation);
        self.slots[slot].emitter = Some(self.factory.create(id));
        tracing::debug!(emitter = %id, total = self.count_all(), "emitter created");
        slot
    }

    /// Force-releases the longest-active emitter that is neither looping nor
    /// pinned and returns its slot, still marked as neither idle nor active.
    fn reclaim_oldest(&mut self) -> Result<usize> {
        let oldest = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let since = slot.active_since?;
                let emitter = slot.emitter.as_ref()?;
                (!slot.pinned && !emitter.looping()).then_some((since, index))
            })
            .min()
            .map(|(_, index)| index);

        let Some(slot) = oldest else {
            return Err(SoundError::PoolExhausted {
                max: self.config.max_size,
            });
        };
        let released = self.release_slot(slot);
        tracing::warn!(emitter = %released.id, "reclaimed oldest active emitter");
        self.reclaimed.push(released);
        Ok(slot)
    }

    fn release_slot(&mut self, slot: usize) -> ReleasedEmitter {
        let entry = &mut self.slots[slot];
        let id = EmitterId::new(slot, entry.generation);
        let clip = entry.emitter.as_mut().and_then(|emitter| {
            let clip = emitter.clip().cloned();
            emitter.reset();
            clip
        });
        entry.generation = entry.generation.wrapping_add(1);
        entry.active_since = None;
        entry.pinned = false;
        self.active_count -= 1;
        ReleasedEmitter { id, clip }
    }
}

impl<F> fmt::Debug for EmitterPool<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmitterPool")
            .field("config", &self.config)
            .field("slots", &self.slots.len())
            .field("idle", &self.idle.len())
            .field("vacant", &self.vacant.len())
            .field("active", &self.active_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::HeadlessFactory;

    #[derive(Debug, Default)]
    struct CountingFactory {
        created: usize,
        destroyed: usize,
    }

    impl EmitterFactory for CountingFactory {
        fn create(&mut self, id: EmitterId) -> Emitter {
            self.created += 1;
            Emitter::new(id)
        }

        fn destroy(&mut self, _emitter: Emitter) {
            self.destroyed += 1;
        }
    }

    fn config(max_size: usize) -> PoolConfig {
        PoolConfig {
            default_size: 0,
            max_size,
            collection_checks: true,
            exhaustion_policy: ExhaustionPolicy::Reject,
        }
    }

    fn play(pool: &mut EmitterPool<impl EmitterFactory>, id: EmitterId, clip: AudioClip, looping: bool) {
        let emitter = pool.get_mut(id).unwrap();
        emitter.set_clip(Some(clip));
        emitter.set_looping(looping);
        emitter.play();
    }

    #[test]
    fn rejects_acquire_past_max_until_release() {
        let mut pool = EmitterPool::new(config(2), HeadlessFactory);

        let first = pool.acquire().unwrap();
        let _second = pool.acquire().unwrap();
        let err = pool.acquire().unwrap_err();
        assert!(matches!(err, SoundError::PoolExhausted { max: 2 }));

        pool.release(first).unwrap();
        assert!(pool.acquire().is_ok());
        assert_eq!(pool.count_active(), 2);
        assert_eq!(pool.count_all(), 2);
    }

    #[test]
    fn double_release_is_reported_with_checks() {
        let mut pool = EmitterPool::new(config(4), HeadlessFactory);
        let id = pool.acquire().unwrap();

        pool.release(id).unwrap();
        let err = pool.release(id).unwrap_err();
        assert!(matches!(err, SoundError::NotActive(stale) if stale == id));
    }

    #[test]
    fn double_release_is_ignored_without_checks() {
        let mut pool = EmitterPool::new(
            PoolConfig {
                collection_checks: false,
                ..config(4)
            },
            HeadlessFactory,
        );
        let id = pool.acquire().unwrap();

        pool.release(id).unwrap();
        pool.release(id).unwrap();
        assert_eq!(pool.count_idle(), 1);
        assert_eq!(pool.count_active(), 0);
    }

    #[test]
    fn stale_handles_do_not_resolve_after_reuse() {
        let mut pool = EmitterPool::new(config(1), HeadlessFactory);
        let old = pool.acquire().unwrap();
        pool.release(old).unwrap();

        let new = pool.acquire().unwrap();
        assert_ne!(old, new);
        assert!(pool.get(old).is_none());
        assert!(pool.get(new).is_some());
        assert!(matches!(pool.release(old), Err(SoundError::NotActive(_))));
    }

    #[test]
    fn released_emitters_come_back_reset() {
        let mut pool = EmitterPool::new(config(1), HeadlessFactory);
        let id = pool.acquire().unwrap();
        play(&mut pool, id, AudioClip::new("theme", 10.0), true);
        pool.get_mut(id).unwrap().set_volume(0.2);
        pool.release(id).unwrap();

        let id = pool.acquire().unwrap();
        let emitter = pool.get(id).unwrap();
        assert!(emitter.clip().is_none());
        assert!(!emitter.looping());
        assert_eq!(emitter.volume(), 1.0);
        assert!(emitter.is_active());
        assert_eq!(emitter.id(), id);
    }

    #[test]
    fn auto_releases_finished_one_shots_exactly_once() {
        let mut pool = EmitterPool::new(config(4), HeadlessFactory);
        let id = pool.acquire().unwrap();
        play(&mut pool, id, AudioClip::new("jump", 0.25), false);

        assert!(pool.tick(0.1).is_empty());
        assert!(pool.tick(0.1).is_empty());
        let released = pool.tick(0.1);
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].id, id);
        assert_eq!(released[0].clip.as_ref().unwrap().id.as_str(), "jump");

        assert!(pool.tick(0.1).is_empty());
        assert_eq!(pool.count_active(), 0);
        assert_eq!(pool.count_idle(), 1);
    }

    #[test]
    fn looping_emitters_are_never_auto_released() {
        let mut pool = EmitterPool::new(config(4), HeadlessFactory);
        let id = pool.acquire().unwrap();
        play(&mut pool, id, AudioClip::new("theme", 0.5), true);

        for _ in 0..20 {
            assert!(pool.tick(0.1).is_empty());
        }
        assert!(pool.is_active(id));
    }

    #[test]
    fn reclaim_policy_evicts_oldest_non_looping() {
        let mut pool = EmitterPool::new(
            PoolConfig {
                exhaustion_policy: ExhaustionPolicy::ReclaimOldest,
                ..config(3)
            },
            HeadlessFactory,
        );
        let music = pool.acquire().unwrap();
        play(&mut pool, music, AudioClip::new("theme", 60.0), true);
        let oldest = pool.acquire().unwrap();
        let newer = pool.acquire().unwrap();

        let reclaimed = pool.acquire().unwrap();

        assert_eq!(reclaimed.slot(), oldest.slot());
        assert!(pool.get(oldest).is_none());
        assert!(pool.is_active(music));
        assert!(pool.is_active(newer));
        assert_eq!(pool.count_active(), 3);
    }

    #[test]
    fn reclaim_policy_skips_pinned_emitters_and_reports_evictions() {
        let mut pool = EmitterPool::new(
            PoolConfig {
                exhaustion_policy: ExhaustionPolicy::ReclaimOldest,
                ..config(2)
            },
            HeadlessFactory,
        );
        let fanfare = pool.acquire().unwrap();
        play(&mut pool, fanfare, AudioClip::new("fanfare", 30.0), false);
        assert!(pool.pin(fanfare));
        let hit = pool.acquire().unwrap();
        play(&mut pool, hit, AudioClip::new("hit", 5.0), false);

        let next = pool.acquire().unwrap();

        assert_eq!(next.slot(), hit.slot());
        assert!(pool.is_active(fanfare));
        let reclaimed = pool.take_reclaimed();
        assert_eq!(reclaimed.len(), 1);
        assert_eq!(reclaimed[0].id, hit);
        assert_eq!(reclaimed[0].clip.as_ref().unwrap().id.as_str(), "hit");
        assert!(pool.take_reclaimed().is_empty());

        // Everything left is pinned.
        assert!(pool.pin(next));
        assert!(matches!(
            pool.acquire(),
            Err(SoundError::PoolExhausted { max: 2 })
        ));
    }

    #[test]
    fn pins_are_dropped_on_release() {
        let mut pool = EmitterPool::new(
            PoolConfig {
                exhaustion_policy: ExhaustionPolicy::ReclaimOldest,
                ..config(1)
            },
            HeadlessFactory,
        );
        let first = pool.acquire().unwrap();
        assert!(pool.pin(first));
        pool.release(first).unwrap();
        assert!(!pool.pin(first));

        let _second = pool.acquire().unwrap();
        let third = pool.acquire().unwrap();
        assert_eq!(pool.take_reclaimed().len(), 1);
        assert!(pool.is_active(third));
    }

    #[test]
    fn reclaim_policy_gives_up_when_everything_loops() {
        let mut pool = EmitterPool::new(
            PoolConfig {
                exhaustion_policy: ExhaustionPolicy::ReclaimOldest,
                ..config(1)
            },
            HeadlessFactory,
        );
        let music = pool.acquire().unwrap();
        play(&mut pool, music, AudioClip::new("theme", 60.0), true);

        assert!(matches!(
            pool.acquire(),
            Err(SoundError::PoolExhausted { max: 1 })
        ));
    }

    #[test]
    fn prewarm_and_clear_go_through_the_factory() {
        let mut pool = EmitterPool::new(
            PoolConfig {
                default_size: 3,
                ..config(2)
            },
            CountingFactory::default(),
        );

        assert_eq!(pool.prewarm(), 2);
        assert_eq!(pool.count_idle(), 2);
        let id = pool.acquire().unwrap();

        assert_eq!(pool.clear(), 1);
        assert_eq!(pool.factory().destroyed, 1);
        assert_eq!(pool.count_all(), 1);
        assert!(pool.is_active(id));

        pool.acquire().unwrap();
        assert_eq!(pool.factory().created, 3);
    }

    #[test]
    fn active_count_never_exceeds_max() {
        let max = 5;
        let mut pool = EmitterPool::new(config(max), HeadlessFactory);
        let mut held: Vec<EmitterId> = Vec::new();
        let mut rng = StdRng::seed_from_u64(0x2545_f491);

        for _ in 0..500 {
            if rng.gen_bool(2.0 / 3.0) {
                match pool.acquire() {
                    Ok(id) => held.push(id),
                    Err(err) => {
                        assert!(matches!(err, SoundError::PoolExhausted { .. }));
                        assert_eq!(held.len(), max);
                    }
                }
            } else if !held.is_empty() {
                let id = held.swap_remove(rng.gen_range(0..held.len()));
                pool.release(id).unwrap();
            }
            assert!(pool.count_active() <= max);
            assert!(pool.count_all() <= max);
            assert_eq!(pool.count_active(), held.len());
        }
    }
}
