//! Host-backed instance pools.
//!
//! Bridges [`rushline_core::PoolRegistry`] to a [`TrackHost`]: construction
//! instantiates through the host, acquire/release toggle activity, discard
//! destroys.

use rushline_core::{PoolError, PoolHooks, PoolRegistry, Pooled, TemplateId};

use crate::config::PoolConfig;
use crate::host::{InstanceId, TrackHost};

/// Pool hooks that forward to the host.
pub struct FactoryHooks<'a> {
    host: &'a mut dyn TrackHost,
    template: TemplateId,
}

impl<'a> FactoryHooks<'a> {
    /// Hooks building instances of `template`.
    pub fn new(host: &'a mut dyn TrackHost, template: TemplateId) -> Self {
        Self { host, template }
    }
}

impl PoolHooks<InstanceId> for FactoryHooks<'_> {
    fn create(&mut self) -> Option<InstanceId> {
        let instance = self.host.instantiate(self.template)?;
        self.host.set_active(instance, false);
        Some(instance)
    }

    fn on_acquire(&mut self, item: &mut InstanceId) {
        self.host.set_active(*item, true);
    }

    fn on_release(&mut self, item: &mut InstanceId) {
        self.host.set_active(*item, false);
    }

    fn on_discard(&mut self, item: InstanceId) {
        self.host.destroy(item);
    }
}

/// Pools of host instances keyed by template.
pub struct InstancePools {
    registry: PoolRegistry<InstanceId>,
}

impl InstancePools {
    /// Creates empty pools with the configured limits.
    #[must_use]
    pub fn from_config(config: &PoolConfig) -> Self {
        let mut registry = PoolRegistry::new(config.default_max_size);
        for (name, max) in &config.overrides {
            registry.set_limit(TemplateId::from_name(name), *max);
        }
        Self { registry }
    }

    /// Constructs inactive instances until `count` exist.
    ///
    /// # Errors
    ///
    /// [`PoolError::ConstructionFailed`] if the host cannot build the template.
    pub fn prewarm(
        &mut self,
        host: &mut dyn TrackHost,
        template: TemplateId,
        count: usize,
    ) -> Result<usize, PoolError> {
        let mut hooks = FactoryHooks::new(host, template);
        self.registry.prewarm(template, count, &mut hooks)
    }

    /// Takes an active instance of `template`.
    ///
    /// # Errors
    ///
    /// See [`rushline_core::ObjectPool::acquire`].
    pub fn acquire(
        &mut self,
        host: &mut dyn TrackHost,
        template: TemplateId,
    ) -> Result<(Pooled, InstanceId), PoolError> {
        let mut hooks = FactoryHooks::new(host, template);
        let pooled = self.registry.acquire(template, &mut hooks)?;
        let instance = *self.registry.get(pooled).ok_or(PoolError::StaleHandle)?;
        Ok((pooled, instance))
    }

    /// Deactivates an instance and returns it to its pool.
    ///
    /// # Errors
    ///
    /// [`PoolError::StaleHandle`] if it was already released.
    pub fn release(&mut self, host: &mut dyn TrackHost, pooled: Pooled) -> Result<(), PoolError> {
        let mut hooks = FactoryHooks::new(host, pooled.template);
        self.registry.release(pooled, &mut hooks)
    }

    /// Host instance behind a live handle.
    #[must_use]
    pub fn instance(&self, pooled: Pooled) -> Option<InstanceId> {
        self.registry.get(pooled).copied()
    }

    /// Returns `true` if the handle is live.
    #[must_use]
    pub fn is_live(&self, pooled: Pooled) -> bool {
        self.registry.is_live(pooled)
    }

    /// Live instances across every template.
    #[must_use]
    pub fn total_live(&self) -> usize {
        self.registry.total_live()
    }

    /// Free instances across every template.
    #[must_use]
    pub fn total_free(&self) -> usize {
        self.registry.total_free()
    }

    /// Checks `live + free <= max` for every pool.
    #[must_use]
    pub fn is_conserved(&self) -> bool {
        self.registry
            .iter()
            .all(|(_, p)| p.live_count() + p.free_count() == p.constructed() && p.constructed() <= p.max_size())
    }

    /// Destroys every pooled instance.
    pub fn destroy_all(&mut self, host: &mut dyn TrackHost) {
        // on_discard does not depend on the template
        let mut hooks = FactoryHooks::new(host, TemplateId::from_name(""));
        self.registry.discard_all(&mut hooks);
    }
}
