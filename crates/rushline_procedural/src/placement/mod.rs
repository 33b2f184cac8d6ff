//! # Spatial Placement Engine
//!
//! Decides which obstacles and trains go on each freshly activated segment.
//!
//! ## Per segment
//!
//! 1. **Gate** - global elapsed/distance gate, then the segment must start far
//!    enough ahead of the observer
//! 2. **Requests** - queued targets inside the segment, newest first
//! 3. **Fallback** - one random roll for an obstacle or a train
//!
//! ## Checks (`try_place`), first failure wins
//!
//! spacing → occupancy → fit → footprint overlap → hazard gap → coverage →
//! volume probe → pool
//!
//! All bookkeeping lives in a per-segment ledger that is dropped by
//! [`SpatialPlacementEngine::clear_for`] before the segment returns to its
//! pool. The lane spacing tracker is global and survives recycling.

mod footprint;
mod request;
mod spacing;

pub use footprint::{Interval, LaneFootprints};
pub use request::{PlacementRequest, RequestQueue};
pub use spacing::{LaneSpacingTracker, SpacingRules};

use std::collections::{HashMap, HashSet};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rushline_core::{PoolError, Pooled, TemplateId};
use rushline_shared::{Pose, Vec3};

use crate::config::{GateMode, HazardKind, PlacementConfig, PoolConfig};
use crate::host::{Extents, Frame, InstanceId, LayerMask, TrackHost};
use crate::pooling::InstancePools;
use crate::segment::{Segment, SegmentId};

/// Random stream of the placement engine.
pub const PLACEMENT_STREAM: u64 = 2;

/// Why a placement attempt failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// Too close to the lane's previous hazard.
    Spacing,
    /// Occupancy slot already taken.
    Occupied,
    /// Footprint longer than the padded segment.
    DoesNotFit,
    /// Footprint overlaps another in the same lane.
    FootprintOverlap,
    /// Too close to a same-lane train.
    HazardGap,
    /// Would leave no lane free of trains.
    FullCoverage,
    /// Something solid is already there.
    Blocked,
    /// Template pool at its limit.
    PoolExhausted,
    /// No template for this kind, or the host cannot build it.
    NoTemplate,
}

impl Rejection {
    /// Every reason, in check order.
    pub const ALL: [Self; 9] = [
        Self::Spacing,
        Self::Occupied,
        Self::DoesNotFit,
        Self::FootprintOverlap,
        Self::HazardGap,
        Self::FullCoverage,
        Self::Blocked,
        Self::PoolExhausted,
        Self::NoTemplate,
    ];

    /// Position in [`Self::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// A hazard that was placed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placed {
    /// Pool identity.
    pub pooled: Pooled,
    /// Host instance.
    pub instance: InstanceId,
    /// Lane index.
    pub lane: usize,
    /// Occupied Z span.
    pub footprint: Interval,
    /// Obstacle or train.
    pub kind: HazardKind,
}

/// Placement counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlacementStats {
    /// Obstacles placed.
    pub obstacles_placed: u64,
    /// Trains placed.
    pub trains_placed: u64,
    /// Rejections, indexed by [`Rejection::index`].
    pub rejections: [u64; 9],
    /// Segments skipped by the gates.
    pub segments_gated: u64,
    /// Requests queued.
    pub requests_enqueued: u64,
    /// Requests fulfilled.
    pub requests_consumed: u64,
    /// Requests dropped because the observer passed them.
    pub requests_expired: u64,
    /// Requests dropped because the queue was full.
    pub requests_overflowed: u64,
}

impl PlacementStats {
    /// Rejections for one reason.
    #[must_use]
    pub fn rejected(&self, reason: Rejection) -> u64 {
        self.rejections[reason.index()]
    }
}

#[derive(Clone, Copy, Debug)]
struct HazardEntry {
    template: TemplateId,
    kind: HazardKind,
    weight: f32,
    requires_hazard_gap: bool,
}

/// Bookkeeping of one active segment.
#[derive(Debug, Default)]
struct SegmentLedger {
    occupancy: HashSet<(usize, i32)>,
    lanes: Vec<LaneFootprints>,
    trains: Vec<(usize, Interval)>,
    spawned: Vec<Pooled>,
}

impl SegmentLedger {
    fn prepare(&mut self, lane_count: usize) {
        self.occupancy.clear();
        self.trains.clear();
        self.spawned.clear();
        for lane in &mut self.lanes {
            lane.clear();
        }
        if self.lanes.len() < lane_count {
            self.lanes.resize_with(lane_count, LaneFootprints::default);
        }
    }
}

/// Obstacle and train placement.
pub struct SpatialPlacementEngine {
    config: PlacementConfig,
    hazards: Vec<HazardEntry>,
    pools: InstancePools,
    ledgers: HashMap<SegmentId, SegmentLedger>,
    /// Cleared ledgers kept for reuse.
    spare: Vec<SegmentLedger>,
    spacing: LaneSpacingTracker,
    requests: RequestQueue,
    extents: HashMap<TemplateId, Extents>,
    rng: ChaCha8Rng,
    gate_origin_z: Option<f32>,
    stats: PlacementStats,
}

impl SpatialPlacementEngine {
    /// Creates an engine with no ledgers and an empty queue.
    #[must_use]
    pub fn new(config: PlacementConfig, pools: &PoolConfig, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(PLACEMENT_STREAM);

        let hazards = config
            .hazards
            .iter()
            .map(|h| HazardEntry {
                template: TemplateId::from_name(&h.template),
                kind: h.kind,
                weight: h.weight,
                requires_hazard_gap: h.requires_hazard_gap,
            })
            .collect();

        Self {
            requests: RequestQueue::new(config.max_pending_requests),
            config,
            hazards,
            pools: InstancePools::from_config(pools),
            ledgers: HashMap::new(),
            spare: Vec::new(),
            spacing: LaneSpacingTracker::default(),
            extents: HashMap::new(),
            rng,
            gate_origin_z: None,
            stats: PlacementStats::default(),
        }
    }

    /// Queues a targeted request, dropping the oldest if the queue is full.
    pub fn enqueue(&mut self, target_z: f32, lane: usize, kind: HazardKind) {
        let request = PlacementRequest { target_z, lane, kind };
        self.stats.requests_enqueued += 1;
        if let Some(dropped) = self.requests.push(request) {
            self.stats.requests_overflowed += 1;
            tracing::warn!("Placement queue full; dropped request at z={:.1}", dropped.target_z);
        }
    }

    /// Places hazards on a freshly activated segment. Returns how many.
    pub fn place(&mut self, segment: &Segment, host: &mut dyn TrackHost, frame: &Frame) -> usize {
        if !self.gate_open(segment, frame) {
            self.stats.segments_gated += 1;
            return 0;
        }
        self.ensure_ledger(segment);

        let observer_z = frame.observer.map(|o| o.z);
        if let Some(oz) = observer_z {
            let expired = self.requests.expire_behind(oz);
            self.stats.requests_expired += expired as u64;
        }

        let (z_min, z_max) = segment.z_range();
        let mut placed = 0;

        for i in (0..self.requests.len()).rev() {
            let Some(request) = self.requests.get(i) else {
                continue;
            };
            if request.target_z < z_min || request.target_z > z_max {
                continue;
            }
            if observer_z.is_some_and(|oz| request.target_z - oz < self.config.min_request_ahead) {
                continue;
            }
            if self
                .try_place(segment, request.lane, request.target_z, request.kind, host)
                .is_ok()
            {
                self.requests.remove(i);
                self.stats.requests_consumed += 1;
                placed += 1;
            }
        }

        if let Some(kind) = self.roll_fallback() {
            let lo = z_min + self.config.edge_padding;
            let hi = z_max - self.config.edge_padding;
            if hi > lo && segment.lane_count() > 0 {
                let lane = self.rng.gen_range(0..segment.lane_count());
                let z = self.rng.gen_range(lo..hi);
                if self.try_place(segment, lane, z, kind, host).is_ok() {
                    placed += 1;
                }
            }
        }

        tracing::trace!("Segment #{}: {} hazards placed", segment.spawn_index, placed);
        placed
    }

    /// Attempts one placement. Returns the placed hazard or why it failed.
    ///
    /// # Errors
    ///
    /// The first failing [`Rejection`], in check order.
    pub fn try_place(
        &mut self,
        segment: &Segment,
        lane: usize,
        z: f32,
        kind: HazardKind,
        host: &mut dyn TrackHost,
    ) -> Result<Placed, Rejection> {
        let lane_count = segment.lane_count();
        if lane_count == 0 {
            return Err(self.reject(Rejection::DoesNotFit, segment, lane, z));
        }
        let lane = lane.min(lane_count - 1);
        self.ensure_ledger(segment);

        let rules = SpacingRules {
            obstacle_to_obstacle: self.config.min_gap_obstacle_to_obstacle,
            train_to_obstacle: self.config.min_gap_train_to_obstacle,
        };
        if !self.spacing.allows(lane, z, kind, &rules) {
            return Err(self.reject(Rejection::Spacing, segment, lane, z));
        }

        let slot = (lane, self.z_bin(z));
        if self.ledgers.get(&segment.id).is_some_and(|l| l.occupancy.contains(&slot)) {
            return Err(self.reject(Rejection::Occupied, segment, lane, z));
        }

        let Some(entry) = self.pick_hazard(kind) else {
            return Err(self.reject(Rejection::NoTemplate, segment, lane, z));
        };
        let extents = self.extents_of(entry.template, host);

        let (z_min, z_max) = segment.z_range();
        let lo = z_min + self.config.edge_padding;
        let hi = z_max - self.config.edge_padding;
        if extents.length > hi - lo {
            return Err(self.reject(Rejection::DoesNotFit, segment, lane, z));
        }
        let half = extents.length * 0.5;
        let footprint = Interval::centered(z.clamp(lo + half, hi - half), extents.length);

        let verdict = self.ledgers.get(&segment.id).and_then(|ledger| {
            if ledger.lanes[lane].overlaps_any(&footprint) {
                return Some(Rejection::FootprintOverlap);
            }
            if kind == HazardKind::Obstacle && entry.requires_hazard_gap {
                let gap = self.config.hazard_gap;
                let too_close = ledger
                    .trains
                    .iter()
                    .any(|(l, t)| *l == lane && t.expanded(gap).overlaps(&footprint));
                if too_close {
                    return Some(Rejection::HazardGap);
                }
            }
            if kind == HazardKind::Train && self.config.forbid_full_train_coverage {
                let all_others_covered = (0..lane_count)
                    .filter(|&other| other != lane)
                    .all(|other| ledger.trains.iter().any(|(l, t)| *l == other && t.overlaps(&footprint)));
                if all_others_covered {
                    return Some(Rejection::FullCoverage);
                }
            }
            None
        });
        if let Some(reason) = verdict {
            return Err(self.reject(reason, segment, lane, z));
        }

        let anchor = self.ground_anchor(segment, lane, footprint.center(), host);
        if self.volume_blocked(segment, lane, &footprint, &extents, anchor, host) {
            return Err(self.reject(Rejection::Blocked, segment, lane, z));
        }

        let (pooled, instance) = match self.pools.acquire(host, entry.template) {
            Ok(acquired) => acquired,
            Err(PoolError::ConstructionFailed) => {
                return Err(self.reject(Rejection::NoTemplate, segment, lane, z));
            }
            Err(_) => return Err(self.reject(Rejection::PoolExhausted, segment, lane, z)),
        };

        let pose = Pose::new(anchor, segment.lane_rotation(lane));
        host.set_pose(instance, pose, Some(segment.instance));
        host.set_kinematic(instance, true);

        self.spacing.record(lane, footprint.center(), kind);
        if let Some(ledger) = self.ledgers.get_mut(&segment.id) {
            ledger.lanes[lane].insert(footprint);
            if kind == HazardKind::Train {
                ledger.trains.push((lane, footprint));
            }
            ledger.occupancy.insert(slot);
            ledger.spawned.push(pooled);
        }
        match kind {
            HazardKind::Obstacle => self.stats.obstacles_placed += 1,
            HazardKind::Train => self.stats.trains_placed += 1,
        }

        Ok(Placed {
            pooled,
            instance,
            lane,
            footprint,
            kind,
        })
    }

    /// Drops a segment's bookkeeping and releases what was spawned on it.
    /// Must run before the segment itself is released.
    pub fn clear_for(&mut self, segment: SegmentId, host: &mut dyn TrackHost) {
        let Some(mut ledger) = self.ledgers.remove(&segment) else {
            return;
        };
        for pooled in ledger.spawned.drain(..) {
            if let Err(e) = self.pools.release(host, pooled) {
                tracing::error!("Hazard {:?} could not be released: {}", pooled, e);
            }
        }
        self.spare.push(ledger);
    }

    /// Forgets everything for a new run, including spacing and requests.
    pub fn reset(&mut self, host: &mut dyn TrackHost) {
        let ids: Vec<SegmentId> = self.ledgers.keys().copied().collect();
        for id in ids {
            self.clear_for(id, host);
        }
        self.spacing.clear();
        self.requests.clear();
        self.gate_origin_z = None;
    }

    /// Destroys every pooled hazard instance.
    pub fn destroy_pools(&mut self, host: &mut dyn TrackHost) {
        self.reset(host);
        self.pools.destroy_all(host);
    }

    /// Footprints of one lane of an active segment.
    #[must_use]
    pub fn footprints(&self, segment: SegmentId, lane: usize) -> Option<&[Interval]> {
        self.ledgers
            .get(&segment)
            .and_then(|l| l.lanes.get(lane))
            .map(LaneFootprints::as_slice)
    }

    /// Checks the sorted/disjoint footprint invariant for every ledger.
    #[must_use]
    pub fn footprints_consistent(&self) -> bool {
        self.ledgers
            .values()
            .all(|l| l.lanes.iter().all(LaneFootprints::is_sorted_disjoint))
    }

    /// Train footprints of an active segment.
    #[must_use]
    pub fn train_footprints(&self, segment: SegmentId) -> &[(usize, Interval)] {
        self.ledgers.get(&segment).map_or(&[], |l| l.trains.as_slice())
    }

    /// Hazards spawned on an active segment.
    #[must_use]
    pub fn spawned_on(&self, segment: SegmentId) -> &[Pooled] {
        self.ledgers.get(&segment).map_or(&[], |l| l.spawned.as_slice())
    }

    /// Is the occupancy slot of `(lane, z)` taken on `segment`?
    #[must_use]
    pub fn is_occupied(&self, segment: SegmentId, lane: usize, z: f32) -> bool {
        let slot = (lane, self.z_bin(z));
        self.ledgers.get(&segment).is_some_and(|l| l.occupancy.contains(&slot))
    }

    /// Number of segments with a ledger.
    #[must_use]
    pub fn tracked_segments(&self) -> usize {
        self.ledgers.len()
    }

    /// Pending requests.
    #[must_use]
    pub fn requests(&self) -> &RequestQueue {
        &self.requests
    }

    /// Global lane spacing memory.
    #[must_use]
    pub fn spacing(&self) -> &LaneSpacingTracker {
        &self.spacing
    }

    /// Hazard pools.
    #[must_use]
    pub fn pools(&self) -> &InstancePools {
        &self.pools
    }

    /// Counters.
    #[must_use]
    pub fn stats(&self) -> &PlacementStats {
        &self.stats
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &PlacementConfig {
        &self.config
    }

    fn gate_open(&mut self, segment: &Segment, frame: &Frame) -> bool {
        if let (None, Some(o)) = (self.gate_origin_z, frame.observer) {
            self.gate_origin_z = Some(o.z);
        }
        let travelled = match (frame.observer, self.gate_origin_z) {
            (Some(o), Some(origin)) => o.z - origin,
            _ => 0.0,
        };
        let time_ok = frame.elapsed >= self.config.min_elapsed;
        let distance_ok = travelled >= self.config.min_distance;
        let global = match self.config.gate_mode {
            GateMode::All => time_ok && distance_ok,
            GateMode::Any => time_ok || distance_ok,
        };
        if !global {
            return false;
        }
        frame
            .observer
            .map_or(true, |o| segment.near_edge() - o.z >= self.config.min_ahead_distance)
    }

    fn ensure_ledger(&mut self, segment: &Segment) {
        if self.ledgers.contains_key(&segment.id) {
            return;
        }
        let mut ledger = self.spare.pop().unwrap_or_default();
        ledger.prepare(segment.lane_count());
        self.ledgers.insert(segment.id, ledger);
    }

    fn z_bin(&self, z: f32) -> i32 {
        (z / self.config.occupancy_bin).floor() as i32
    }

    fn roll_fallback(&mut self) -> Option<HazardKind> {
        let roll: f32 = self.rng.gen();
        if roll < self.config.obstacle_chance {
            Some(HazardKind::Obstacle)
        } else if roll < self.config.obstacle_chance + self.config.train_chance {
            Some(HazardKind::Train)
        } else {
            None
        }
    }

    fn pick_hazard(&mut self, kind: HazardKind) -> Option<HazardEntry> {
        let eligible = |h: &&HazardEntry| h.kind == kind && h.weight > 0.0;
        let total: f32 = self.hazards.iter().filter(eligible).map(|h| h.weight).sum();
        if total <= 0.0 {
            return None;
        }
        if !total.is_finite() {
            return self.hazards.iter().filter(eligible).find(|h| !h.weight.is_finite()).copied();
        }
        let r = self.rng.gen_range(0.0..total);
        let mut cumulative = 0.0;
        let mut last = None;
        for h in self.hazards.iter().filter(eligible) {
            cumulative += h.weight;
            last = Some(*h);
            if cumulative >= r {
                return last;
            }
        }
        last
    }

    fn extents_of(&mut self, template: TemplateId, host: &dyn TrackHost) -> Extents {
        let fallback = self.config.default_extents;
        *self.extents.entry(template).or_insert_with(|| {
            host.measure(template).unwrap_or_else(|| {
                tracing::debug!("Template {:?} cannot be measured; using default extents", template);
                fallback
            })
        })
    }

    fn ground_anchor(&self, segment: &Segment, lane: usize, z: f32, host: &dyn TrackHost) -> Vec3 {
        let surface = segment.lane_point(lane, z);
        let probe = self.config.ground_probe_height;
        let ground_y = host
            .raycast_down(surface + Vec3::Y * probe, probe * 2.0, LayerMask::GROUND)
            .map_or(surface.y, |hit| hit.y);
        Vec3::new(surface.x, ground_y + self.config.y_offset, surface.z)
    }

    fn volume_blocked(
        &self,
        segment: &Segment,
        lane: usize,
        footprint: &Interval,
        extents: &Extents,
        anchor: Vec3,
        host: &dyn TrackHost,
    ) -> bool {
        let radius = (extents.half_width.min(extents.height * 0.5) * self.config.volume_shrink).max(0.01);
        let lift = Vec3::Y * (anchor.y - self.config.y_offset + extents.height * 0.5);
        let flat = |z: f32| {
            let p = segment.lane_point(lane, z);
            Vec3::new(p.x, 0.0, p.z) + lift
        };
        let (a, b) = if footprint.len() > radius * 2.0 {
            (flat(footprint.start + radius), flat(footprint.end - radius))
        } else {
            let c = flat(footprint.center());
            (c, c)
        };
        host.capsule_overlap(a, b, radius, LayerMask::SOLID)
            || host.sphere_overlap(anchor, self.config.overlap_radius, LayerMask::SOLID)
    }

    fn reject(&mut self, reason: Rejection, segment: &Segment, lane: usize, z: f32) -> Rejection {
        self.stats.rejections[reason.index()] += 1;
        tracing::trace!(
            "Segment #{} lane {} z={:.1}: rejected ({:?})",
            segment.spawn_index,
            lane,
            z,
            reason
        );
        reason
    }
}
