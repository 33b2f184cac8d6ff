//! # Track Segments
//!
//! A segment is one pooled piece of track, snapped start-to-end onto the
//! previous piece.
//!
//! ## Geometry
//!
//! ```text
//!   local start (0,0,0) ───────────── local end (0,0,length), yawed
//!        │  lane sockets at x = lanes[i].x, y = base_height
//! ```
//!
//! The world root is chosen so the local start anchor lands exactly on the
//! target pose: `root = target * inverse(local_start)`.

use std::sync::Arc;

use rushline_core::{PoolError, Pooled, TemplateId};
use rushline_shared::{Pose, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::config::PoolConfig;
use crate::host::{InstanceId, TrackHost};
use crate::pooling::InstancePools;

/// Identity of an active segment: template plus generation-checked handle.
pub type SegmentId = Pooled;

/// A lane attachment point in segment-local space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LaneSocket {
    /// Local X offset of the lane centre.
    pub x: f32,
    /// Local yaw applied to things spawned in this lane.
    #[serde(default)]
    pub yaw_degrees: f32,
}

impl LaneSocket {
    /// Straight lane at `x`.
    #[must_use]
    pub const fn at(x: f32) -> Self {
        Self { x, yaw_degrees: 0.0 }
    }
}

/// Physical shape of a segment template.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentShape {
    /// Distance from start anchor to end anchor along local Z.
    pub length: f32,
    /// Yaw of the end anchor (non-zero for curved pieces).
    pub end_yaw_degrees: f32,
    /// Local height of the walking surface.
    pub base_height: f32,
    /// Per-template lane sockets; falls back to the global lane array.
    pub lanes: Option<Vec<LaneSocket>>,
}

impl Default for SegmentShape {
    fn default() -> Self {
        Self {
            length: 30.0,
            end_yaw_degrees: 0.0,
            base_height: 0.0,
            lanes: None,
        }
    }
}

impl SegmentShape {
    /// Local start anchor.
    #[must_use]
    pub fn local_start(&self) -> Pose {
        Pose::IDENTITY
    }

    /// Local end anchor.
    #[must_use]
    pub fn local_end(&self) -> Pose {
        Pose::new(
            Vec3::new(0.0, 0.0, self.length),
            Quat::from_yaw_degrees(self.end_yaw_degrees),
        )
    }
}

/// An active piece of track.
#[derive(Clone, Debug)]
pub struct Segment {
    /// Pool identity.
    pub id: SegmentId,
    /// Index into the variant catalog.
    pub variant: usize,
    /// Host instance.
    pub instance: InstanceId,
    /// World root pose.
    pub root: Pose,
    /// World start anchor.
    pub start: Pose,
    /// World end anchor.
    pub end: Pose,
    /// Anchor-to-anchor length.
    pub length: f32,
    /// Local height of the walking surface.
    pub base_height: f32,
    /// Lane sockets (shared with the catalog).
    pub lanes: Arc<[LaneSocket]>,
    /// Global activation index since the last reset.
    pub spawn_index: u64,
    /// Running count of tunnel-like segments, for labelling only.
    pub tunnel_ordinal: Option<u32>,
}

impl Segment {
    /// Builds a segment whose local start anchor lands on `target`.
    #[must_use]
    pub fn snapped_onto(
        target: &Pose,
        shape: &SegmentShape,
        lanes: Arc<[LaneSocket]>,
        id: SegmentId,
        variant: usize,
        instance: InstanceId,
    ) -> Self {
        let root = Pose::snapped(target, &shape.local_start());
        Self {
            id,
            variant,
            instance,
            root,
            start: root.mul(&shape.local_start()),
            end: root.mul(&shape.local_end()),
            length: shape.length,
            base_height: shape.base_height,
            lanes,
            spawn_index: 0,
            tunnel_ordinal: None,
        }
    }

    /// World Z interval covered by the segment, `(min, max)`.
    #[must_use]
    pub fn z_range(&self) -> (f32, f32) {
        let a = self.start.position.z;
        let b = self.end.position.z;
        (a.min(b), a.max(b))
    }

    /// World Z of the edge closest to the start of the track.
    #[inline]
    #[must_use]
    pub fn near_edge(&self) -> f32 {
        self.z_range().0
    }

    /// Number of lanes.
    #[inline]
    #[must_use]
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Local Z whose world point has world Z `world_z`.
    #[must_use]
    pub fn local_z_at(&self, world_z: f32) -> f32 {
        let forward_z = self.root.forward().z;
        if forward_z.abs() < 1e-4 {
            return 0.0;
        }
        (world_z - self.root.position.z) / forward_z
    }

    /// World point on the walking surface of `lane` at local Z.
    #[must_use]
    pub fn lane_point_local(&self, lane: usize, local_z: f32) -> Vec3 {
        let x = self.lanes.get(lane).map_or(0.0, |s| s.x);
        self.root.transform_point(Vec3::new(x, self.base_height, local_z))
    }

    /// World point on the walking surface of `lane` at world Z.
    #[must_use]
    pub fn lane_point(&self, lane: usize, world_z: f32) -> Vec3 {
        self.lane_point_local(lane, self.local_z_at(world_z))
    }

    /// World rotation for things spawned in `lane`.
    #[must_use]
    pub fn lane_rotation(&self, lane: usize) -> Quat {
        let yaw = self.lanes.get(lane).map_or(0.0, |s| s.yaw_degrees);
        (self.root.rotation * Quat::from_yaw_degrees(yaw)).normalize()
    }

    /// Has the observer moved more than `buffer` past the end anchor?
    #[must_use]
    pub fn is_passed_by(&self, observer: Vec3, buffer: f32) -> bool {
        self.end.forward().dot(observer - self.end.position) > buffer
    }
}

/// Per-template pools of segment instances.
pub struct TrackSegmentPool {
    pools: InstancePools,
}

impl TrackSegmentPool {
    /// Creates empty pools.
    #[must_use]
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            pools: InstancePools::from_config(config),
        }
    }

    /// Ensures at least `count` instances of `template` exist.
    ///
    /// # Errors
    ///
    /// [`PoolError::ConstructionFailed`] when the host cannot build it.
    pub fn prewarm(&mut self, host: &mut dyn TrackHost, template: TemplateId, count: usize) -> Result<usize, PoolError> {
        self.pools.prewarm(host, template, count)
    }

    /// Takes an active instance.
    ///
    /// # Errors
    ///
    /// See [`InstancePools::acquire`].
    pub fn acquire(&mut self, host: &mut dyn TrackHost, template: TemplateId) -> Result<(SegmentId, InstanceId), PoolError> {
        self.pools.acquire(host, template)
    }

    /// Deactivates and returns a segment instance.
    ///
    /// # Errors
    ///
    /// [`PoolError::StaleHandle`] if it was already returned.
    pub fn release(&mut self, host: &mut dyn TrackHost, id: SegmentId) -> Result<(), PoolError> {
        self.pools.release(host, id)
    }

    /// Underlying pools.
    #[must_use]
    pub fn pools(&self) -> &InstancePools {
        &self.pools
    }

    /// Destroys every instance.
    pub fn destroy_all(&mut self, host: &mut dyn TrackHost) {
        self.pools.destroy_all(host);
    }
}
