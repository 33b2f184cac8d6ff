//! # Pool Registry
//!
//! One [`ObjectPool`] per spawnable template, created lazily on first use.

use std::collections::HashMap;
use std::fmt;

use super::pool::{ObjectPool, PoolHandle, PoolHooks};
use crate::error::{PoolError, PoolResult};

/// Identity of a spawnable template.
///
/// Derived from the template name with FNV-1a, so configuration files and
/// hosts agree on ids without sharing a table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemplateId(u64);

impl TemplateId {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    /// Hashes a template name into an id.
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = Self::FNV_OFFSET;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    /// Raw id value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TemplateId({:#018x})", self.0)
    }
}

/// A live instance together with the pool it came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Pooled {
    /// Template (and therefore pool) of the instance.
    pub template: TemplateId,
    /// Handle into that pool.
    pub handle: PoolHandle,
}

/// Pools keyed by template with a default growth limit and per-template
/// overrides.
pub struct PoolRegistry<T> {
    pools: HashMap<TemplateId, ObjectPool<T>>,
    limits: HashMap<TemplateId, usize>,
    default_max: usize,
}

impl<T> PoolRegistry<T> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(default_max: usize) -> Self {
        Self {
            pools: HashMap::new(),
            limits: HashMap::new(),
            default_max: default_max.max(1),
        }
    }

    /// Overrides the growth limit of one template. Only affects pools that
    /// have not been created yet.
    pub fn set_limit(&mut self, template: TemplateId, max_size: usize) {
        self.limits.insert(template, max_size.max(1));
    }

    /// Default growth limit.
    #[inline]
    #[must_use]
    pub const fn default_max(&self) -> usize {
        self.default_max
    }

    /// Returns the pool of `template`, if it exists.
    #[must_use]
    pub fn pool(&self, template: TemplateId) -> Option<&ObjectPool<T>> {
        self.pools.get(&template)
    }

    /// Returns the pool of `template`, creating it on first use.
    pub fn pool_mut(&mut self, template: TemplateId) -> &mut ObjectPool<T> {
        let max = self.limits.get(&template).copied().unwrap_or(self.default_max);
        self.pools
            .entry(template)
            .or_insert_with(|| ObjectPool::new(max))
    }

    /// Prewarms the pool of `template`.
    ///
    /// # Errors
    ///
    /// Propagates [`PoolError::ConstructionFailed`].
    pub fn prewarm<H: PoolHooks<T>>(
        &mut self,
        template: TemplateId,
        count: usize,
        hooks: &mut H,
    ) -> PoolResult<usize> {
        self.pool_mut(template).prewarm(count, hooks)
    }

    /// Acquires an instance of `template`.
    ///
    /// # Errors
    ///
    /// See [`ObjectPool::acquire`].
    pub fn acquire<H: PoolHooks<T>>(&mut self, template: TemplateId, hooks: &mut H) -> PoolResult<Pooled> {
        let handle = self.pool_mut(template).acquire(hooks)?;
        Ok(Pooled { template, handle })
    }

    /// Releases an instance back to its template's pool.
    ///
    /// # Errors
    ///
    /// [`PoolError::StaleHandle`] if the instance is not live.
    pub fn release<H: PoolHooks<T>>(&mut self, pooled: Pooled, hooks: &mut H) -> PoolResult<()> {
        self.pools
            .get_mut(&pooled.template)
            .ok_or(PoolError::StaleHandle)?
            .release(pooled.handle, hooks)
    }

    /// Gets a live instance.
    #[must_use]
    pub fn get(&self, pooled: Pooled) -> Option<&T> {
        self.pools.get(&pooled.template)?.get(pooled.handle)
    }

    /// Returns `true` if the instance is live.
    #[must_use]
    pub fn is_live(&self, pooled: Pooled) -> bool {
        self.pools
            .get(&pooled.template)
            .is_some_and(|p| p.is_live(pooled.handle))
    }

    /// Live instances across every pool.
    #[must_use]
    pub fn total_live(&self) -> usize {
        self.pools.values().map(ObjectPool::live_count).sum()
    }

    /// Free instances across every pool.
    #[must_use]
    pub fn total_free(&self) -> usize {
        self.pools.values().map(ObjectPool::free_count).sum()
    }

    /// Iterates over `(template, pool)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (TemplateId, &ObjectPool<T>)> {
        self.pools.iter().map(|(t, p)| (*t, p))
    }

    /// Discards every pool. Only the hooks' discard step runs, so one set of
    /// hooks serves every template.
    pub fn discard_all<H: PoolHooks<T>>(&mut self, hooks: &mut H) {
        for pool in self.pools.values_mut() {
            pool.discard_all(hooks);
        }
        self.pools.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tagged(u64);

    impl PoolHooks<u64> for Tagged {
        fn create(&mut self) -> Option<u64> {
            Some(self.0)
        }
    }

    #[test]
    fn test_template_id_is_stable() {
        assert_eq!(TemplateId::from_name("road"), TemplateId::from_name("road"));
        assert_ne!(TemplateId::from_name("road"), TemplateId::from_name("tunnel"));
        // FNV-1a of the empty string is the offset basis
        assert_eq!(TemplateId::from_name("").raw(), 0xcbf2_9ce4_8422_2325);
    }

    #[test]
    fn test_registry_limits_per_template() {
        let road = TemplateId::from_name("road");
        let coin = TemplateId::from_name("coin");

        let mut registry: PoolRegistry<u64> = PoolRegistry::new(2);
        registry.set_limit(coin, 3);

        let mut hooks = Tagged(7);
        for _ in 0..2 {
            registry.acquire(road, &mut hooks).unwrap();
        }
        assert!(matches!(
            registry.acquire(road, &mut hooks),
            Err(PoolError::Exhausted { max_size: 2 })
        ));

        for _ in 0..3 {
            registry.acquire(coin, &mut hooks).unwrap();
        }
        assert_eq!(registry.total_live(), 5);
    }

    #[test]
    fn test_registry_release_round_trip() {
        let road = TemplateId::from_name("road");
        let mut registry: PoolRegistry<u64> = PoolRegistry::new(4);
        let mut hooks = Tagged(1);

        let pooled = registry.acquire(road, &mut hooks).unwrap();
        assert!(registry.is_live(pooled));
        assert_eq!(registry.get(pooled), Some(&1));

        registry.release(pooled, &mut hooks).unwrap();
        assert!(!registry.is_live(pooled));
        assert_eq!(registry.total_free(), 1);
        assert_eq!(registry.release(pooled, &mut hooks), Err(PoolError::StaleHandle));
    }
}
