//! # Coin Columns
//!
//! Lays straight columns of coins along a subset of lanes on each segment,
//! after hazards have been placed, so coins never sit inside a solid.
//!
//! ```text
//!  lane 0   o   o   o   o   o        phase ∈ [0, 0.8 * spacing)
//!  lane 1     o   o   o   o   o      coins every `spacing` from the padded start
//!  lane 2   ─────────────────────    no column this time
//! ```
//!
//! Collected coins stay out for `return_delay` seconds, then go back to the
//! pool on the next [`CoinColumnPlanner::tick`].

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rushline_core::{PoolError, Pooled, TemplateId};
use rushline_shared::{Pose, Quat, Vec3};

use crate::config::{CoinConfig, CoinPolicyKind, PoolConfig};
use crate::host::{LayerMask, TrackHost};
use crate::placement::SpatialPlacementEngine;
use crate::pooling::InstancePools;
use crate::segment::{Segment, SegmentId};

/// Random stream of the coin planner.
pub const COIN_STREAM: u64 = 3;

/// Floor for the weighted policy's weights.
const MIN_WEIGHT: f32 = 1e-4;

/// Coin counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CoinStats {
    /// Segments that got at least one column.
    pub segments_with_coins: u64,
    /// Columns laid.
    pub columns: u64,
    /// Coins spawned.
    pub spawned: u64,
    /// Coin points skipped because a solid was there.
    pub skipped_blocked: u64,
    /// Coin points skipped because the pool was exhausted.
    pub skipped_pool: u64,
    /// Hazard requests sent ahead of columns.
    pub hazard_requests: u64,
    /// Coins collected.
    pub collected: u64,
    /// Coins returned to the pool.
    pub returned: u64,
}

#[derive(Clone, Copy, Debug)]
struct PendingReturn {
    coin: Pooled,
    remaining: f32,
}

/// Plans and tracks coin columns.
pub struct CoinColumnPlanner {
    config: CoinConfig,
    template: TemplateId,
    pools: InstancePools,
    rng: ChaCha8Rng,
    coins: HashMap<SegmentId, Vec<Pooled>>,
    owner: HashMap<Pooled, SegmentId>,
    pending: Vec<PendingReturn>,
    spare: Vec<Vec<Pooled>>,
    lanes: Vec<usize>,
    chosen: Vec<usize>,
    stats: CoinStats,
}

impl CoinColumnPlanner {
    /// Creates a planner with empty pools.
    #[must_use]
    pub fn new(config: CoinConfig, pools: &PoolConfig, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(COIN_STREAM);
        Self {
            template: TemplateId::from_name(&config.template),
            config,
            pools: InstancePools::from_config(pools),
            rng,
            coins: HashMap::new(),
            owner: HashMap::new(),
            pending: Vec::new(),
            spare: Vec::new(),
            lanes: Vec::new(),
            chosen: Vec::new(),
            stats: CoinStats::default(),
        }
    }

    /// Builds inactive coins until `count` exist.
    ///
    /// # Errors
    ///
    /// [`PoolError::ConstructionFailed`] if the host cannot build the coin.
    pub fn prewarm(&mut self, host: &mut dyn TrackHost, count: usize) -> Result<usize, PoolError> {
        self.pools.prewarm(host, self.template, count)
    }

    /// Lays columns on a segment. Returns the number of coins spawned.
    ///
    /// Columns may ask `placement` for a hazard further down the lane.
    pub fn plan(
        &mut self,
        segment: &Segment,
        host: &mut dyn TrackHost,
        placement: &mut SpatialPlacementEngine,
    ) -> usize {
        let lane_count = segment.lane_count();
        if lane_count == 0 || self.rng.gen::<f32>() > self.config.segment_has_coins_chance {
            return 0;
        }

        let z_min = self.config.margin_start;
        let z_max = segment.length - self.config.margin_end;
        if z_max < z_min {
            return 0;
        }

        match self.config.policy {
            CoinPolicyKind::Weighted => self.pick_weighted(lane_count),
            CoinPolicyKind::Independent => self.pick_independent(segment, z_min, z_max, host),
        }
        if self.chosen.is_empty() {
            return 0;
        }

        let spacing = self.config.spacing;
        let mut spawned = 0;
        let chosen = std::mem::take(&mut self.chosen);
        for &lane in &chosen {
            let phase = self.rng.gen_range(0.0..spacing * 0.8);
            let column_start = self.coin_point(segment, lane, z_min + phase);

            let mut z = z_min + phase;
            while z <= z_max {
                let point = self.coin_point(segment, lane, z);
                z += spacing;
                if host.sphere_overlap(point, self.config.coin_radius, LayerMask::SOLID) {
                    self.stats.skipped_blocked += 1;
                    continue;
                }
                if self.spawn_coin(segment, point, host) {
                    spawned += 1;
                }
            }
            self.stats.columns += 1;

            if self.rng.gen::<f32>() < self.config.obstacle_after_column_chance {
                placement.enqueue(column_start.z + self.config.ahead_distance, lane, self.config.ahead_kind);
                self.stats.hazard_requests += 1;
            }
        }
        self.chosen = chosen;

        if spawned > 0 {
            self.stats.segments_with_coins += 1;
        }
        tracing::trace!("Segment #{}: {} coins in {} columns", segment.spawn_index, spawned, self.chosen.len());
        spawned
    }

    /// Marks a coin as collected. It returns to the pool after the delay.
    ///
    /// Returns `false` for unknown or already collected coins.
    pub fn collect(&mut self, coin: Pooled) -> bool {
        if !self.owner.contains_key(&coin) || self.pending.iter().any(|p| p.coin == coin) {
            return false;
        }
        self.pending.push(PendingReturn {
            coin,
            remaining: self.config.return_delay,
        });
        self.stats.collected += 1;
        true
    }

    /// Advances return timers. Returns how many coins went back to the pool.
    pub fn tick(&mut self, dt: f32, host: &mut dyn TrackHost) -> usize {
        let mut returned = 0;
        let mut i = 0;
        while i < self.pending.len() {
            self.pending[i].remaining -= dt;
            if self.pending[i].remaining > 0.0 {
                i += 1;
                continue;
            }
            let coin = self.pending.swap_remove(i).coin;
            if let Some(segment) = self.owner.remove(&coin) {
                if let Some(list) = self.coins.get_mut(&segment) {
                    list.retain(|c| *c != coin);
                }
            }
            self.release(coin, host);
            returned += 1;
        }
        returned
    }

    /// Returns every coin of a segment, collected or not.
    pub fn clear_for(&mut self, segment: SegmentId, host: &mut dyn TrackHost) {
        let Some(mut list) = self.coins.remove(&segment) else {
            return;
        };
        for coin in list.drain(..) {
            self.owner.remove(&coin);
            self.release(coin, host);
        }
        self.pending.retain(|p| self.owner.contains_key(&p.coin));
        self.spare.push(list);
    }

    /// Returns every coin for a new run.
    pub fn reset(&mut self, host: &mut dyn TrackHost) {
        let ids: Vec<SegmentId> = self.coins.keys().copied().collect();
        for id in ids {
            self.clear_for(id, host);
        }
        self.pending.clear();
    }

    /// Destroys every pooled coin.
    pub fn destroy_pools(&mut self, host: &mut dyn TrackHost) {
        self.reset(host);
        self.pools.destroy_all(host);
    }

    /// Coins currently out on a segment.
    #[must_use]
    pub fn coins_on(&self, segment: SegmentId) -> &[Pooled] {
        self.coins.get(&segment).map_or(&[], Vec::as_slice)
    }

    /// Collected coins waiting to return.
    #[must_use]
    pub fn pending_returns(&self) -> usize {
        self.pending.len()
    }

    /// Coin pools.
    #[must_use]
    pub fn pools(&self) -> &InstancePools {
        &self.pools
    }

    /// Counters.
    #[must_use]
    pub fn stats(&self) -> &CoinStats {
        &self.stats
    }

    fn coin_point(&self, segment: &Segment, lane: usize, local_z: f32) -> Vec3 {
        segment.lane_point_local(lane, local_z) + Vec3::Y * self.config.y_offset
    }

    fn spawn_coin(&mut self, segment: &Segment, point: Vec3, host: &mut dyn TrackHost) -> bool {
        let (coin, instance) = match self.pools.acquire(host, self.template) {
            Ok(acquired) => acquired,
            Err(e) => {
                self.stats.skipped_pool += 1;
                tracing::debug!("No coin for segment #{}: {}", segment.spawn_index, e);
                return false;
            }
        };
        host.set_pose(instance, Pose::new(point, Quat::IDENTITY), Some(segment.instance));
        host.set_kinematic(instance, true);

        let spare = &mut self.spare;
        self.coins
            .entry(segment.id)
            .or_insert_with(|| spare.pop().unwrap_or_default())
            .push(coin);
        self.owner.insert(coin, segment.id);
        self.stats.spawned += 1;
        true
    }

    fn release(&mut self, coin: Pooled, host: &mut dyn TrackHost) {
        match self.pools.release(host, coin) {
            Ok(()) => self.stats.returned += 1,
            Err(e) => tracing::error!("Coin {:?} could not be released: {}", coin, e),
        }
    }

    fn pick_weighted(&mut self, lane_count: usize) {
        self.chosen.clear();
        let w = &self.config.weighted;
        let single = w.single.max(MIN_WEIGHT);
        let double = w.double.max(MIN_WEIGHT);
        let triple = w.triple.max(MIN_WEIGHT);
        let total = single + double + triple;
        let r = if total.is_finite() {
            self.rng.gen_range(0.0..total)
        } else {
            single
        };

        if r <= single || lane_count == 1 {
            self.chosen.push(self.rng.gen_range(0..lane_count));
        } else if r <= single + double || lane_count == 2 {
            let pair = if lane_count >= 3 {
                [(0, 1), (1, 2), (0, 2)][self.rng.gen_range(0..3)]
            } else {
                (0, 1)
            };
            self.chosen.extend([pair.0, pair.1]);
        } else {
            self.chosen.extend(0..lane_count);
        }
    }

    fn pick_independent(&mut self, segment: &Segment, z_min: f32, z_max: f32, host: &dyn TrackHost) {
        self.chosen.clear();
        self.lanes.clear();
        self.lanes.extend(0..segment.lane_count());

        let policy = &self.config.independent;
        if policy.shuffle_lanes {
            self.lanes.shuffle(&mut self.rng);
        }
        if policy.skip_blocked_lanes {
            let step = policy.block_sample_step.max(0.1);
            let radius = self.config.coin_radius;
            let y_offset = self.config.y_offset;
            self.lanes.retain(|&lane| {
                let mut z = z_min;
                while z <= z_max {
                    let point = segment.lane_point_local(lane, z) + Vec3::Y * y_offset;
                    if host.sphere_overlap(point, radius, LayerMask::SOLID) {
                        return false;
                    }
                    z += step;
                }
                true
            });
        }
        if self.lanes.is_empty() {
            return;
        }

        for &lane in &self.lanes {
            if self.rng.gen::<f32>() <= policy.per_lane_chance {
                self.chosen.push(lane);
            }
        }
        for &lane in &self.lanes {
            if self.chosen.len() >= policy.min_columns {
                break;
            }
            if !self.chosen.contains(&lane) {
                self.chosen.push(lane);
            }
        }
        while self.chosen.len() > policy.max_columns {
            let i = self.rng.gen_range(0..self.chosen.len());
            self.chosen.remove(i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::InstanceFactory;
    use crate::config::{PlacementConfig, TrackConfig};
    use crate::sandbox::SandboxHost;
    use crate::segment::{LaneSocket, SegmentShape};
    use std::sync::Arc;

    fn segment(host: &mut SandboxHost, pools: &mut InstancePools) -> Segment {
        let (id, instance) = pools.acquire(host, TemplateId::from_name("road_straight")).unwrap();
        let lanes: Arc<[LaneSocket]> = vec![LaneSocket::at(-2.0), LaneSocket::at(0.0), LaneSocket::at(2.0)].into();
        let seg = Segment::snapped_onto(&Pose::IDENTITY, &SegmentShape::default(), lanes, id, 0, instance);
        host.set_pose(instance, seg.root, None);
        seg
    }

    struct Rig {
        planner: CoinColumnPlanner,
        placement: SpatialPlacementEngine,
        host: SandboxHost,
        segment: Segment,
    }

    fn rig(config: CoinConfig) -> Rig {
        let track = TrackConfig::default();
        let mut host = SandboxHost::for_config(&track);
        let mut road = InstancePools::from_config(&track.pools);
        let segment = segment(&mut host, &mut road);
        Rig {
            planner: CoinColumnPlanner::new(config, &track.pools, 11),
            placement: SpatialPlacementEngine::new(PlacementConfig::default(), &track.pools, 11),
            host,
            segment,
        }
    }

    fn always() -> CoinConfig {
        CoinConfig {
            segment_has_coins_chance: 1.0,
            obstacle_after_column_chance: 0.0,
            ..CoinConfig::default()
        }
    }

    impl Rig {
        fn plan(&mut self) -> usize {
            self.planner.plan(&self.segment, &mut self.host, &mut self.placement)
        }
    }

    #[test]
    fn test_column_fills_lane_at_spacing() {
        let mut config = always();
        config.independent.per_lane_chance = 0.0;
        config.independent.min_columns = 1;
        config.independent.max_columns = 1;
        let mut rig = rig(config);

        let spawned = rig.plan();
        // 28.4 m of usable length at 2.8 m, minus up to 0.8 * spacing of phase
        assert!((10..=11).contains(&spawned), "spawned {spawned}");
        assert_eq!(rig.planner.stats().columns, 1);
        assert_eq!(rig.host.active_of("coin"), spawned);
        assert_eq!(rig.planner.coins_on(rig.segment.id).len(), spawned);
    }

    #[test]
    fn test_blocked_lane_is_skipped() {
        let mut config = always();
        config.independent.per_lane_chance = 1.0;
        config.independent.max_columns = 3;
        let mut rig = rig(config);
        rig.host
            .spawn_static("train", Pose::from_position(Vec3::new(0.0, 0.0, 15.0)))
            .unwrap();

        rig.plan();
        let lane_one = rig
            .planner
            .coins_on(rig.segment.id)
            .iter()
            .filter_map(|c| rig.planner.pools().instance(*c))
            .filter_map(|i| rig.host.instance(i))
            .filter(|i| i.pose.position.x.abs() < 0.1)
            .count();
        assert_eq!(lane_one, 0);
        assert_eq!(rig.planner.stats().columns, 2);
    }

    #[test]
    fn test_weighted_triple_takes_every_lane() {
        let mut config = always();
        config.policy = CoinPolicyKind::Weighted;
        config.weighted.single = 0.0;
        config.weighted.double = 0.0;
        config.weighted.triple = 1.0;
        let mut rig = rig(config);

        rig.plan();
        assert_eq!(rig.planner.stats().columns, 3);
    }

    #[test]
    fn test_column_requests_hazard_ahead() {
        let mut config = always();
        config.obstacle_after_column_chance = 1.0;
        config.independent.per_lane_chance = 1.0;
        config.independent.max_columns = 3;
        let mut rig = rig(config);

        rig.plan();
        assert_eq!(rig.placement.requests().len(), 3);
        for request in rig.placement.requests().iter() {
            assert!(request.target_z >= 0.8 + 6.0 - 1e-4);
            assert!(request.target_z < 0.8 + 6.0 + 2.8 * 0.8);
        }
    }

    #[test]
    fn test_collected_coin_returns_after_delay() {
        let mut rig = rig(always());
        rig.plan();
        let coin = rig.planner.coins_on(rig.segment.id)[0];
        let before = rig.planner.coins_on(rig.segment.id).len();

        assert!(rig.planner.collect(coin));
        assert!(!rig.planner.collect(coin));
        assert_eq!(rig.planner.tick(0.2, &mut rig.host), 0);
        assert_eq!(rig.planner.tick(0.2, &mut rig.host), 1);

        assert_eq!(rig.planner.coins_on(rig.segment.id).len(), before - 1);
        assert!(!rig.planner.pools().is_live(coin));
        assert_eq!(rig.planner.pending_returns(), 0);
    }

    #[test]
    fn test_clear_returns_pending_and_live_coins() {
        let mut rig = rig(always());
        let spawned = rig.plan();
        assert!(spawned > 0);
        let coin = rig.planner.coins_on(rig.segment.id)[0];
        rig.planner.collect(coin);

        rig.planner.clear_for(rig.segment.id, &mut rig.host);
        assert_eq!(rig.planner.pending_returns(), 0);
        assert_eq!(rig.host.active_of("coin"), 0);
        assert_eq!(rig.planner.pools().total_live(), 0);
        assert!(rig.planner.pools().is_conserved());
    }

    #[test]
    fn test_no_coins_when_chance_is_zero() {
        let mut rig = rig(CoinConfig {
            segment_has_coins_chance: 0.0,
            ..always()
        });
        for _ in 0..20 {
            assert_eq!(rig.plan(), 0);
        }
        assert_eq!(rig.planner.stats().columns, 0);
    }
}
