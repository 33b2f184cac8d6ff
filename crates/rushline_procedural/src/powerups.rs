//! Timed pickup placement.
//!
//! Each eligible segment is cut into a `(lane, z)` slot grid. Slots are tried
//! in shuffled order until enough pickups landed; a slot is skipped when its
//! clearance sphere touches a hazard or a coin.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rushline_core::{Pooled, TemplateId};
use rushline_shared::{Pose, Vec3};

use crate::config::{PoolConfig, PowerupConfig, PowerupKind};
use crate::host::{Frame, LayerMask, TrackHost};
use crate::pooling::InstancePools;
use crate::segment::{Segment, SegmentId};

/// Random stream of the pickup planner.
pub const POWERUP_STREAM: u64 = 4;

/// Smallest slot step along Z.
const MIN_SLOT_STEP: f32 = 0.1;

/// Smallest clearance radius.
const MIN_CLEAR_RADIUS: f32 = 0.05;

/// Pickup counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PowerupStats {
    /// Pickups spawned.
    pub spawned: u64,
    /// Slots rejected for lack of clearance.
    pub slots_blocked: u64,
    /// Pickups collected.
    pub collected: u64,
    /// Segments skipped by the index, chance or distance gates.
    pub segments_gated: u64,
}

#[derive(Clone, Copy, Debug)]
struct Slot {
    lane: usize,
    local_z: f32,
}

#[derive(Clone, Copy, Debug)]
struct Spawned {
    pickup: Pooled,
    kind: usize,
}

/// Places and tracks timed pickups.
pub struct PowerupSlotPlanner {
    config: PowerupConfig,
    templates: Vec<TemplateId>,
    pools: InstancePools,
    rng: ChaCha8Rng,
    spawned: HashMap<SegmentId, Vec<Spawned>>,
    spare: Vec<Vec<Spawned>>,
    slots: Vec<Slot>,
    stats: PowerupStats,
}

impl PowerupSlotPlanner {
    /// Creates a planner with empty pools.
    #[must_use]
    pub fn new(config: PowerupConfig, pools: &PoolConfig, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(POWERUP_STREAM);
        if config.kinds.iter().all(|k| k.weight <= 0.0) {
            tracing::error!("No pickup kind has a positive weight; pickups are disabled");
        }
        Self {
            templates: config.kinds.iter().map(|k| TemplateId::from_name(&k.template)).collect(),
            config,
            pools: InstancePools::from_config(pools),
            rng,
            spawned: HashMap::new(),
            spare: Vec::new(),
            slots: Vec::new(),
            stats: PowerupStats::default(),
        }
    }

    /// Places pickups on a freshly activated segment. Returns how many.
    pub fn plan(&mut self, segment: &Segment, host: &mut dyn TrackHost, frame: &Frame) -> usize {
        if segment.spawn_index <= self.config.min_segment_index
            || self.rng.gen::<f32>() > self.config.chance_per_segment
            || frame
                .observer
                .is_some_and(|o| segment.near_edge() - o.z < self.config.min_ahead_distance)
        {
            self.stats.segments_gated += 1;
            return 0;
        }

        self.build_slots(segment);
        self.slots.shuffle(&mut self.rng);

        let limit = self.config.max_per_segment.max(1);
        let mut placed = 0;
        for i in 0..self.slots.len() {
            let slot = self.slots[i];
            let Some(kind) = self.pick_kind() else {
                continue;
            };
            let def = &self.config.kinds[kind];
            let point = segment.lane_point_local(slot.lane, slot.local_z) + Vec3::Y * self.config.y_offset;
            let radius = (def.clear_radius + self.config.extra_clear_radius).max(MIN_CLEAR_RADIUS);
            if host.sphere_overlap(point, radius, LayerMask::SOLID | LayerMask::PICKUP) {
                self.stats.slots_blocked += 1;
                continue;
            }

            let (pickup, instance) = match self.pools.acquire(host, self.templates[kind]) {
                Ok(acquired) => acquired,
                Err(e) => {
                    tracing::debug!("Pickup '{}' not spawned: {}", def.id, e);
                    continue;
                }
            };
            host.set_pose(
                instance,
                Pose::new(point, segment.lane_rotation(slot.lane)),
                Some(segment.instance),
            );
            let spare = &mut self.spare;
            self.spawned
                .entry(segment.id)
                .or_insert_with(|| spare.pop().unwrap_or_default())
                .push(Spawned { pickup, kind });
            self.stats.spawned += 1;

            placed += 1;
            if placed >= limit {
                break;
            }
        }

        if placed > 0 {
            tracing::debug!("Segment #{}: {} pickups", segment.spawn_index, placed);
        }
        placed
    }

    /// Returns a collected pickup to its pool and reports its kind.
    pub fn collect(&mut self, pickup: Pooled, host: &mut dyn TrackHost) -> Option<&PowerupKind> {
        let (segment, index) = self
            .spawned
            .iter()
            .find_map(|(id, list)| list.iter().position(|s| s.pickup == pickup).map(|i| (*id, i)))?;
        let spawned = self.spawned.get_mut(&segment)?.swap_remove(index);
        if let Err(e) = self.pools.release(host, pickup) {
            tracing::error!("Pickup {:?} could not be released: {}", pickup, e);
        }
        self.stats.collected += 1;
        self.config.kinds.get(spawned.kind)
    }

    /// Releases every pickup of a segment.
    pub fn clear_for(&mut self, segment: SegmentId, host: &mut dyn TrackHost) {
        let Some(mut list) = self.spawned.remove(&segment) else {
            return;
        };
        for spawned in list.drain(..) {
            if let Err(e) = self.pools.release(host, spawned.pickup) {
                tracing::error!("Pickup {:?} could not be released: {}", spawned.pickup, e);
            }
        }
        self.spare.push(list);
    }

    /// Releases every pickup for a new run.
    pub fn reset(&mut self, host: &mut dyn TrackHost) {
        let ids: Vec<SegmentId> = self.spawned.keys().copied().collect();
        for id in ids {
            self.clear_for(id, host);
        }
    }

    /// Destroys every pooled pickup.
    pub fn destroy_pools(&mut self, host: &mut dyn TrackHost) {
        self.reset(host);
        self.pools.destroy_all(host);
    }

    /// Pickups currently out on a segment.
    pub fn pickups_on(&self, segment: SegmentId) -> impl Iterator<Item = Pooled> + '_ {
        self.spawned.get(&segment).into_iter().flatten().map(|s| s.pickup)
    }

    /// Pickup pools.
    #[must_use]
    pub fn pools(&self) -> &InstancePools {
        &self.pools
    }

    /// Counters.
    #[must_use]
    pub fn stats(&self) -> &PowerupStats {
        &self.stats
    }

    fn build_slots(&mut self, segment: &Segment) {
        self.slots.clear();
        let step = self.config.slot_step.max(MIN_SLOT_STEP);
        let z_min = self.config.edge_padding;
        let z_max = segment.length - self.config.edge_padding;
        for lane in 0..segment.lane_count() {
            let mut z = z_min;
            while z <= z_max {
                self.slots.push(Slot { lane, local_z: z });
                z += step;
            }
        }
    }

    fn pick_kind(&mut self) -> Option<usize> {
        let total: f32 = self.config.kinds.iter().map(|k| k.weight.max(0.0)).sum();
        if total <= 0.0 {
            return None;
        }
        if !total.is_finite() {
            return self.config.kinds.iter().position(|k| k.weight > 0.0 && !k.weight.is_finite());
        }
        let r = self.rng.gen_range(0.0..total);
        let mut cumulative = 0.0;
        for (i, kind) in self.config.kinds.iter().enumerate() {
            if kind.weight <= 0.0 {
                continue;
            }
            cumulative += kind.weight;
            if r <= cumulative {
                return Some(i);
            }
        }
        self.config.kinds.iter().rposition(|k| k.weight > 0.0)
    }
}
