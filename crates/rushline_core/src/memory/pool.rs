//! # Object Pool
//!
//! Free-list pool for instances that are expensive to construct and cheap to
//! toggle (track segments, obstacles, coins, pickups).

use crate::error::{PoolError, PoolResult};

/// Side effects applied by the pool at lifecycle transitions.
///
/// The pool never stores its hooks; callers hand them in on every call so the
/// hooks can borrow whatever owns the real instances.
pub trait PoolHooks<T> {
    /// Constructs a fresh, inactive instance.
    fn create(&mut self) -> Option<T>;

    /// Called when an instance leaves the free list.
    fn on_acquire(&mut self, _item: &mut T) {}

    /// Called when an instance returns to the free list.
    fn on_release(&mut self, _item: &mut T) {}

    /// Called when an instance is dropped by the pool for good.
    fn on_discard(&mut self, _item: T) {}
}

/// Handle to a live instance in an [`ObjectPool`].
///
/// The generation changes on every release, so a handle kept past its
/// release is rejected instead of silently referring to the next user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolHandle {
    /// Index into the pool.
    index: u32,
    /// Slot generation at acquisition time.
    generation: u32,
}

impl PoolHandle {
    /// Slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Slot generation.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

struct Slot<T> {
    item: T,
    generation: u32,
    live: bool,
}

/// A growable pool with a hard upper bound.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. It is owned by exactly one component.
///
/// # Example
///
/// ```rust,ignore
/// let mut pool: ObjectPool<InstanceId> = ObjectPool::new(64);
///
/// // Acquire - O(1), constructs only when the free list is empty
/// let handle = pool.acquire(&mut hooks)?;
///
/// // Release - O(1), instance is deactivated and kept
/// pool.release(handle, &mut hooks)?;
/// ```
pub struct ObjectPool<T> {
    /// Every instance ever constructed.
    slots: Vec<Slot<T>>,
    /// Free list - indices of inactive slots.
    free_list: Vec<u32>,
    /// Number of live instances.
    live_count: usize,
    /// Growth limit.
    max_size: usize,
}

impl<T> ObjectPool<T> {
    /// Creates an empty pool that may grow to `max_size` instances.
    ///
    /// A limit of zero is raised to one.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            live_count: 0,
            max_size,
        }
    }

    /// Returns the growth limit.
    #[inline]
    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max_size
    }

    /// Returns the number of live instances.
    #[inline]
    #[must_use]
    pub const fn live_count(&self) -> usize {
        self.live_count
    }

    /// Returns the number of inactive instances.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free_list.len()
    }

    /// Returns the number of instances constructed so far.
    #[inline]
    #[must_use]
    pub fn constructed(&self) -> usize {
        self.slots.len()
    }

    /// Constructs inactive instances until `count` exist (bounded by
    /// `max_size`). Returns how many were created by this call.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ConstructionFailed`] if the hook cannot build an
    /// instance. Instances built before the failure are kept.
    pub fn prewarm<H: PoolHooks<T>>(&mut self, count: usize, hooks: &mut H) -> PoolResult<usize> {
        let target = count.min(self.max_size);
        let mut created = 0;
        while self.slots.len() < target {
            let item = hooks.create().ok_or(PoolError::ConstructionFailed)?;
            self.push_free(item);
            created += 1;
        }
        Ok(created)
    }

    /// Takes an instance out of the pool, constructing one if none is free.
    ///
    /// # Errors
    ///
    /// [`PoolError::Exhausted`] when every instance is live and the pool is at
    /// its limit, [`PoolError::ConstructionFailed`] when growth fails.
    pub fn acquire<H: PoolHooks<T>>(&mut self, hooks: &mut H) -> PoolResult<PoolHandle> {
        let index = match self.free_list.pop() {
            Some(index) => index,
            None => {
                if self.slots.len() >= self.max_size {
                    tracing::trace!(max_size = self.max_size, "pool exhausted");
                    return Err(PoolError::Exhausted {
                        max_size: self.max_size,
                    });
                }
                let item = hooks.create().ok_or(PoolError::ConstructionFailed)?;
                self.push_slot(item)
            }
        };

        let slot = &mut self.slots[index as usize];
        slot.live = true;
        hooks.on_acquire(&mut slot.item);
        self.live_count += 1;

        Ok(PoolHandle {
            index,
            generation: slot.generation,
        })
    }

    /// Returns a live instance to the free list.
    ///
    /// # Errors
    ///
    /// [`PoolError::StaleHandle`] if the handle was already released.
    pub fn release<H: PoolHooks<T>>(&mut self, handle: PoolHandle, hooks: &mut H) -> PoolResult<()> {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|s| s.live && s.generation == handle.generation)
            .ok_or(PoolError::StaleHandle)?;

        hooks.on_release(&mut slot.item);
        slot.live = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.index);
        self.live_count -= 1;
        Ok(())
    }

    /// Returns `true` if the handle refers to a live instance.
    #[inline]
    #[must_use]
    pub fn is_live(&self, handle: PoolHandle) -> bool {
        self.slots
            .get(handle.index as usize)
            .is_some_and(|s| s.live && s.generation == handle.generation)
    }

    /// Gets a reference to a live instance.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|s| s.live && s.generation == handle.generation)
            .map(|s| &s.item)
    }

    /// Gets a mutable reference to a live instance.
    #[inline]
    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|s| s.live && s.generation == handle.generation)
            .map(|s| &mut s.item)
    }

    /// Discards every instance, live or free. Outstanding handles go stale.
    pub fn discard_all<H: PoolHooks<T>>(&mut self, hooks: &mut H) {
        for slot in self.slots.drain(..) {
            hooks.on_discard(slot.item);
        }
        self.free_list.clear();
        self.live_count = 0;
    }

    fn push_slot(&mut self, item: T) -> u32 {
        // max_size bounds the slot count well below u32::MAX in practice
        let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
        self.slots.push(Slot {
            item,
            generation: 0,
            live: false,
        });
        index
    }

    fn push_free(&mut self, item: T) {
        let index = self.push_slot(item);
        self.free_list.push(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counting {
        next: u32,
        acquired: u32,
        released: u32,
        discarded: u32,
        fail: bool,
    }

    impl PoolHooks<u32> for Counting {
        fn create(&mut self) -> Option<u32> {
            if self.fail {
                return None;
            }
            self.next += 1;
            Some(self.next)
        }

        fn on_acquire(&mut self, _item: &mut u32) {
            self.acquired += 1;
        }

        fn on_release(&mut self, _item: &mut u32) {
            self.released += 1;
        }

        fn on_discard(&mut self, _item: u32) {
            self.discarded += 1;
        }
    }

    #[test]
    fn test_pool_acquire_release() {
        let mut hooks = Counting::default();
        let mut pool: ObjectPool<u32> = ObjectPool::new(10);

        let h1 = pool.acquire(&mut hooks).unwrap();
        assert_eq!(*pool.get(h1).unwrap(), 1);
        assert_eq!(pool.live_count(), 1);
        assert_eq!(hooks.acquired, 1);

        pool.release(h1, &mut hooks).unwrap();
        assert_eq!(pool.live_count(), 0);
        assert_eq!(pool.free_count(), 1);
        assert_eq!(hooks.released, 1);
    }

    #[test]
    fn test_pool_full() {
        let mut hooks = Counting::default();
        let mut pool: ObjectPool<u32> = ObjectPool::new(2);

        let _ = pool.acquire(&mut hooks).unwrap();
        let _ = pool.acquire(&mut hooks).unwrap();
        assert_eq!(
            pool.acquire(&mut hooks),
            Err(PoolError::Exhausted { max_size: 2 })
        );
    }

    #[test]
    fn test_pool_reuse_bumps_generation() {
        let mut hooks = Counting::default();
        let mut pool: ObjectPool<u32> = ObjectPool::new(1);

        let h1 = pool.acquire(&mut hooks).unwrap();
        pool.release(h1, &mut hooks).unwrap();

        let h2 = pool.acquire(&mut hooks).unwrap();
        assert_eq!(h1.index(), h2.index()); // Same slot reused
        assert_ne!(h1, h2);
        assert_eq!(*pool.get(h2).unwrap(), 1); // No second construction
        assert!(pool.get(h1).is_none());
        assert_eq!(pool.release(h1, &mut hooks), Err(PoolError::StaleHandle));
    }

    #[test]
    fn test_pool_double_release_rejected() {
        let mut hooks = Counting::default();
        let mut pool: ObjectPool<u32> = ObjectPool::new(4);

        let h = pool.acquire(&mut hooks).unwrap();
        pool.release(h, &mut hooks).unwrap();
        assert_eq!(pool.release(h, &mut hooks), Err(PoolError::StaleHandle));
        assert_eq!(pool.free_count(), 1);
    }

    #[test]
    fn test_prewarm_respects_limit() {
        let mut hooks = Counting::default();
        let mut pool: ObjectPool<u32> = ObjectPool::new(3);

        assert_eq!(pool.prewarm(8, &mut hooks).unwrap(), 3);
        assert_eq!(pool.prewarm(8, &mut hooks).unwrap(), 0);
        assert_eq!(pool.free_count(), 3);
        assert_eq!(hooks.acquired, 0);
    }

    #[test]
    fn test_construction_failure_surfaces() {
        let mut hooks = Counting {
            fail: true,
            ..Counting::default()
        };
        let mut pool: ObjectPool<u32> = ObjectPool::new(3);

        assert_eq!(pool.acquire(&mut hooks), Err(PoolError::ConstructionFailed));
        assert_eq!(pool.prewarm(1, &mut hooks), Err(PoolError::ConstructionFailed));
        assert_eq!(pool.live_count(), 0);
    }

    #[test]
    fn test_conservation_under_churn() {
        let mut hooks = Counting::default();
        let mut pool: ObjectPool<u32> = ObjectPool::new(5);
        let mut live = Vec::new();

        for step in 0..200u32 {
            if step % 3 == 2 && !live.is_empty() {
                let h = live.remove((step as usize) % live.len());
                pool.release(h, &mut hooks).unwrap();
            } else if let Ok(h) = pool.acquire(&mut hooks) {
                live.push(h);
            }
            assert_eq!(pool.live_count() + pool.free_count(), pool.constructed());
            assert!(pool.constructed() <= pool.max_size());
            assert_eq!(pool.live_count(), live.len());
        }
    }

    #[test]
    fn test_discard_all() {
        let mut hooks = Counting::default();
        let mut pool: ObjectPool<u32> = ObjectPool::new(4);

        pool.prewarm(2, &mut hooks).unwrap();
        let h = pool.acquire(&mut hooks).unwrap();
        pool.discard_all(&mut hooks);

        assert_eq!(hooks.discarded, 2);
        assert_eq!(pool.constructed(), 0);
        assert!(!pool.is_live(h));
    }
}
