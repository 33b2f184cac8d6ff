//! # Host Interfaces
//!
//! The generator never owns scene objects. Everything it spawns, moves or
//! probes goes through a [`TrackHost`] handed in on every call.
//!
//! ## Contract
//!
//! - `instantiate` returns an inactive-or-active instance; the pool
//!   deactivates it immediately
//! - inactive instances never show up in spatial queries
//! - `set_pose` takes a world pose; `parent` is informational (scene graph)

use std::ops::BitOr;

use rushline_core::TemplateId;
use rushline_shared::{Pose, Vec3};

/// Opaque identity of a host-side instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u64);

/// Collision layer bit set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct LayerMask(pub u32);

impl LayerMask {
    /// Matches nothing.
    pub const NONE: Self = Self(0);
    /// Obstacles and trains.
    pub const SOLID: Self = Self(1 << 0);
    /// Walkable track surface.
    pub const GROUND: Self = Self(1 << 1);
    /// Coins and timed pickups.
    pub const PICKUP: Self = Self(1 << 2);
    /// Every layer.
    pub const ALL: Self = Self(u32::MAX);

    /// Returns `true` if the masks share a bit.
    #[inline]
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for LayerMask {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Measured size of a template, in its local frame.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Extents {
    /// Size along local Z.
    pub length: f32,
    /// Half size along local X.
    pub half_width: f32,
    /// Size along local Y.
    pub height: f32,
}

impl Default for Extents {
    fn default() -> Self {
        Self {
            length: 2.0,
            half_width: 0.8,
            height: 1.5,
        }
    }
}

/// Per-step input.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Frame {
    /// Observer (player) position, if one is currently bound.
    pub observer: Option<Vec3>,
    /// Seconds since the run started.
    pub elapsed: f32,
    /// Step length in seconds.
    pub dt: f32,
}

impl Frame {
    /// Frame with a bound observer.
    #[must_use]
    pub const fn at(observer: Vec3, elapsed: f32, dt: f32) -> Self {
        Self {
            observer: Some(observer),
            elapsed,
            dt,
        }
    }

    /// Frame with no observer.
    #[must_use]
    pub const fn detached(elapsed: f32, dt: f32) -> Self {
        Self {
            observer: None,
            elapsed,
            dt,
        }
    }
}

/// Overlap and ground probes.
pub trait SpatialQuery {
    /// Does a sphere overlap any active collider on `mask`?
    fn sphere_overlap(&self, center: Vec3, radius: f32, mask: LayerMask) -> bool;

    /// Does a capsule from `a` to `b` overlap any active collider on `mask`?
    fn capsule_overlap(&self, a: Vec3, b: Vec3, radius: f32, mask: LayerMask) -> bool;

    /// First hit straight down from `origin`, within `max_distance`.
    fn raycast_down(&self, origin: Vec3, max_distance: f32, mask: LayerMask) -> Option<Vec3>;
}

/// Instance lifecycle owned by the host.
pub trait InstanceFactory {
    /// Creates a new instance of `template`. `None` if the template is unknown.
    fn instantiate(&mut self, template: TemplateId) -> Option<InstanceId>;

    /// Destroys an instance for good.
    fn destroy(&mut self, instance: InstanceId);

    /// Shows or hides an instance (hidden instances do not collide).
    fn set_active(&mut self, instance: InstanceId, active: bool);

    /// Places an instance in the world.
    fn set_pose(&mut self, instance: InstanceId, pose: Pose, parent: Option<InstanceId>);

    /// Marks an instance as kinematic (not driven by physics).
    fn set_kinematic(&mut self, instance: InstanceId, kinematic: bool);

    /// Size of a template, if the host can tell.
    fn measure(&self, template: TemplateId) -> Option<Extents>;
}

/// Everything the generator needs from its host.
pub trait TrackHost: SpatialQuery + InstanceFactory {}

impl<T: SpatialQuery + InstanceFactory + ?Sized> TrackHost for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_mask_union() {
        let blocking = LayerMask::SOLID | LayerMask::PICKUP;
        assert!(blocking.intersects(LayerMask::SOLID));
        assert!(blocking.intersects(LayerMask::PICKUP));
        assert!(!blocking.intersects(LayerMask::GROUND));
        assert!(LayerMask::ALL.intersects(LayerMask::GROUND));
        assert!(!LayerMask::NONE.intersects(LayerMask::ALL));
    }
}
