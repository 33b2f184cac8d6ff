//! # Track Sequencer
//!
//! Owns the active segment queue: chains new segments ahead of the observer,
//! recycles passed ones behind it, and decides which variant comes next.
//!
//! ## Selection
//!
//! A weighted roulette over the catalog, run against progressively relaxed
//! rule sets until one yields a candidate:
//!
//! | Level            | streak gate | run limit | spacing | disallow |
//! |------------------|-------------|-----------|---------|----------|
//! | `Strict`         | yes         | yes       | yes     | yes      |
//! | `IgnoreDisallow` | yes         | yes       | yes     |          |
//! | `IgnoreSpacing`  | yes         | yes       |         |          |
//! | `Forced`         | yes         |           |         |          |
//!
//! Zero-weight variants never enter a candidate set. If even `Forced` is
//! empty the default variant (or any usable one) is used.

use std::collections::VecDeque;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rushline_shared::{Pose, Quat, Vec3};

use crate::catalog::TrackVariantCatalog;
use crate::config::{PoolConfig, SequencerConfig};
use crate::host::{Frame, TrackHost};
use crate::segment::{Segment, TrackSegmentPool};

/// Random stream of the sequencer.
pub const SEQUENCER_STREAM: u64 = 1;

/// Weights are floored so a forced zero-weight pick stays reachable.
const MIN_WEIGHT: f32 = 1e-4;

/// `since_last` value for variants never picked.
const NEVER_SEEN: u32 = u32::MAX / 2;

/// Which rule set produced a pick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SelectionLevel {
    /// Every rule applied.
    Strict,
    /// `disallow_next` ignored.
    IgnoreDisallow,
    /// `disallow_next` and `min_spacing` ignored.
    IgnoreSpacing,
    /// Only the streak gate applied.
    Forced,
}

/// Synchronous segment lifecycle notifications.
pub trait SegmentListener {
    /// A segment was just placed at the tail of the track.
    fn segment_activated(&mut self, segment: &Segment, host: &mut dyn TrackHost, frame: &Frame);

    /// A segment is about to return to its pool.
    fn segment_recycling(&mut self, segment: &Segment, host: &mut dyn TrackHost);
}

/// Listener that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl SegmentListener for NoopListener {
    fn segment_activated(&mut self, _segment: &Segment, _host: &mut dyn TrackHost, _frame: &Frame) {}

    fn segment_recycling(&mut self, _segment: &Segment, _host: &mut dyn TrackHost) {}
}

/// Selection history. Updated exactly once per accepted pick.
#[derive(Clone, Debug)]
pub struct SelectionState {
    /// Previously picked variant.
    pub last: Option<usize>,
    /// Length of the current run of `last`.
    pub last_run: u32,
    /// Picks since each variant was last chosen.
    pub since_last: Vec<u32>,
    /// Consecutive default-variant picks.
    pub straight_streak: u32,
}

impl SelectionState {
    fn new(variants: usize) -> Self {
        Self {
            last: None,
            last_run: 0,
            since_last: vec![NEVER_SEEN; variants],
            straight_streak: 0,
        }
    }

    fn reset(&mut self) {
        self.last = None;
        self.last_run = 0;
        self.since_last.fill(NEVER_SEEN);
        self.straight_streak = 0;
    }
}

/// The segment conveyor.
pub struct TrackSequencer {
    catalog: TrackVariantCatalog,
    pool: TrackSegmentPool,
    config: SequencerConfig,
    active: VecDeque<Segment>,
    selection: SelectionState,
    rng: ChaCha8Rng,
    /// Reused candidate buffer.
    candidates: Vec<usize>,
    spawn_index: u64,
    tunnel_counter: u32,
    last_level: Option<SelectionLevel>,
    picks_by_level: [u64; 4],
    disabled: bool,
    disabled_logged: bool,
}

impl TrackSequencer {
    /// Creates a sequencer. Nothing is spawned until [`Self::build_initial`].
    #[must_use]
    pub fn new(catalog: TrackVariantCatalog, config: SequencerConfig, pools: &PoolConfig, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(SEQUENCER_STREAM);

        let pool = TrackSegmentPool::new(pools);
        let disabled = !catalog.has_usable();
        Self {
            selection: SelectionState::new(catalog.len()),
            candidates: Vec::with_capacity(catalog.len()),
            catalog,
            pool,
            config,
            active: VecDeque::new(),
            rng,
            spawn_index: 0,
            tunnel_counter: 0,
            last_level: None,
            picks_by_level: [0; 4],
            disabled,
            disabled_logged: false,
        }
    }

    /// Recycles everything, then prewarms pools and chains `count` segments
    /// from the configured start anchor. Returns how many were activated.
    pub fn build_initial(
        &mut self,
        count: usize,
        host: &mut dyn TrackHost,
        listener: &mut dyn SegmentListener,
        frame: &Frame,
    ) -> usize {
        self.reset_road(host, listener);
        if self.check_disabled() {
            return 0;
        }

        for variant in self.catalog.variants() {
            let Some(template) = variant.template else {
                continue;
            };
            let want = variant.prewarm.max(1) as usize;
            if let Err(e) = self.pool.prewarm(host, template, want) {
                tracing::error!("Prewarm of variant '{}' failed: {}", variant.id, e);
            }
        }

        let mut built = 0;
        for _ in 0..count {
            if !self.spawn_next(host, listener, frame) {
                break;
            }
            built += 1;
        }
        tracing::info!("Built initial track: {} segments", built);
        built
    }

    /// Recycles segments the observer has passed and extends the track by
    /// the same amount. Returns the number recycled.
    pub fn tick(&mut self, host: &mut dyn TrackHost, listener: &mut dyn SegmentListener, frame: &Frame) -> usize {
        let Some(observer) = frame.observer else {
            return 0;
        };
        if self.check_disabled() {
            return 0;
        }

        let mut recycled = 0;
        while recycled < self.config.max_recycles_per_tick.max(1) {
            let passed = self
                .active
                .front()
                .is_some_and(|s| s.is_passed_by(observer, self.config.recycle_buffer));
            if !passed {
                break;
            }
            if let Some(segment) = self.active.pop_front() {
                self.recycle(segment, host, listener);
            }
            recycled += 1;
            self.spawn_next(host, listener, frame);
        }
        recycled
    }

    /// Recycles every active segment and forgets all history.
    pub fn reset_road(&mut self, host: &mut dyn TrackHost, listener: &mut dyn SegmentListener) {
        let count = self.active.len();
        while let Some(segment) = self.active.pop_front() {
            self.recycle(segment, host, listener);
        }
        self.selection.reset();
        self.spawn_index = 0;
        self.tunnel_counter = 0;
        self.last_level = None;
        if count > 0 {
            tracing::info!("Road reset: recycled {} segments", count);
        }
    }

    /// Picks the next variant and records the pick.
    ///
    /// Returns `None` only if the catalog has no usable variant.
    pub fn select_next(&mut self) -> Option<(usize, SelectionLevel)> {
        let (index, level) = self.choose()?;
        self.record_pick(index);
        self.last_level = Some(level);
        self.picks_by_level[level as usize] += 1;
        Some((index, level))
    }

    /// Destroys every pooled segment instance.
    pub fn shutdown(&mut self, host: &mut dyn TrackHost, listener: &mut dyn SegmentListener) {
        self.reset_road(host, listener);
        self.pool.destroy_all(host);
    }

    /// Active segments, oldest first.
    #[inline]
    #[must_use]
    pub fn active(&self) -> &VecDeque<Segment> {
        &self.active
    }

    /// Variant catalog.
    #[inline]
    #[must_use]
    pub fn catalog(&self) -> &TrackVariantCatalog {
        &self.catalog
    }

    /// Segment pools.
    #[inline]
    #[must_use]
    pub fn segment_pool(&self) -> &TrackSegmentPool {
        &self.pool
    }

    /// Selection history.
    #[inline]
    #[must_use]
    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    /// Level of the most recent pick.
    #[inline]
    #[must_use]
    pub const fn last_level(&self) -> Option<SelectionLevel> {
        self.last_level
    }

    /// Picks per [`SelectionLevel`], in level order. Survives resets.
    #[inline]
    #[must_use]
    pub const fn picks_by_level(&self) -> [u64; 4] {
        self.picks_by_level
    }

    /// Segments activated since the last reset.
    #[inline]
    #[must_use]
    pub const fn spawned(&self) -> u64 {
        self.spawn_index
    }

    /// `true` if the catalog has nothing to spawn.
    #[inline]
    #[must_use]
    pub const fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// First start anchor of a run.
    #[must_use]
    pub fn start_anchor(&self) -> Pose {
        let [x, y, z] = self.config.start_position;
        Pose::new(Vec3::new(x, y, z), Quat::from_yaw_degrees(self.config.start_yaw_degrees))
    }

    fn check_disabled(&mut self) -> bool {
        if self.disabled && !self.disabled_logged {
            tracing::error!("Variant catalog has no usable template; track generation disabled");
            self.disabled_logged = true;
        }
        self.disabled
    }

    fn recycle(&mut self, segment: Segment, host: &mut dyn TrackHost, listener: &mut dyn SegmentListener) {
        listener.segment_recycling(&segment, host);
        if let Err(e) = self.pool.release(host, segment.id) {
            tracing::error!("Segment {:?} could not be released: {}", segment.id, e);
        }
    }

    fn spawn_next(&mut self, host: &mut dyn TrackHost, listener: &mut dyn SegmentListener, frame: &Frame) -> bool {
        let Some((index, level)) = self.select_next() else {
            return false;
        };
        let Some(variant) = self.catalog.get(index) else {
            return false;
        };
        let Some(template) = variant.template else {
            return false;
        };

        let (id, instance) = match self.pool.acquire(host, template) {
            Ok(acquired) => acquired,
            Err(e) => {
                tracing::warn!("Could not spawn variant '{}': {}", variant.id, e);
                return false;
            }
        };

        let target = self.active.back().map_or_else(|| self.start_anchor(), |tail| tail.end);
        let mut segment = Segment::snapped_onto(&target, &variant.shape, variant.lanes.clone(), id, index, instance);
        segment.spawn_index = self.spawn_index;
        if variant.tunnel_like {
            self.tunnel_counter += 1;
            segment.tunnel_ordinal = Some(self.tunnel_counter);
        }
        self.spawn_index += 1;

        host.set_pose(instance, segment.root, None);
        tracing::debug!(
            "Segment #{} '{}' at z={:.1} ({:?})",
            segment.spawn_index,
            variant.id,
            segment.start.position.z,
            level
        );

        self.active.push_back(segment);
        if let Some(segment) = self.active.back() {
            listener.segment_activated(segment, host, frame);
        }
        true
    }

    fn choose(&mut self) -> Option<(usize, SelectionLevel)> {
        for level in [
            SelectionLevel::Strict,
            SelectionLevel::IgnoreDisallow,
            SelectionLevel::IgnoreSpacing,
            SelectionLevel::Forced,
        ] {
            self.collect_candidates(level);
            if let Some(index) = self.roulette() {
                return Some((index, level));
            }
        }

        let usable = |i: &usize| self.catalog.get(*i).is_some_and(|v| v.is_usable());
        self.catalog
            .default_index()
            .filter(usable)
            .or_else(|| (0..self.catalog.len()).find(usable))
            .map(|i| (i, SelectionLevel::Forced))
    }

    fn collect_candidates(&mut self, level: SelectionLevel) {
        self.candidates.clear();
        let state = &self.selection;
        for (i, v) in self.catalog.variants().iter().enumerate() {
            if !v.is_usable() || !(v.weight > 0.0) {
                continue;
            }
            if v.tunnel_like && state.straight_streak < self.config.streak_gate {
                continue;
            }
            if level == SelectionLevel::Forced {
                self.candidates.push(i);
                continue;
            }
            if state.last == Some(i) && state.last_run >= v.max_consecutive {
                continue;
            }
            if level < SelectionLevel::IgnoreSpacing && state.since_last[i] < v.min_spacing {
                continue;
            }
            if level < SelectionLevel::IgnoreDisallow {
                let blocked = state
                    .last
                    .and_then(|l| self.catalog.get(l))
                    .is_some_and(|prev| prev.disallow_next.contains(&i));
                if blocked {
                    continue;
                }
            }
            self.candidates.push(i);
        }
    }

    fn roulette(&mut self) -> Option<usize> {
        let weight = |i: usize| self.catalog.get(i).map_or(MIN_WEIGHT, |v| v.weight.max(MIN_WEIGHT));
        let total: f32 = self.candidates.iter().map(|&i| weight(i)).sum();
        let last = *self.candidates.last()?;
        if !total.is_finite() {
            return self.candidates.iter().copied().find(|&i| !weight(i).is_finite()).or(Some(last));
        }

        let r = self.rng.gen_range(0.0..total);
        let mut cumulative = 0.0;
        for &i in &self.candidates {
            cumulative += weight(i);
            if cumulative >= r {
                return Some(i);
            }
        }
        Some(last)
    }

    fn record_pick(&mut self, index: usize) {
        let state = &mut self.selection;
        if state.last == Some(index) {
            state.last_run += 1;
        } else {
            state.last = Some(index);
            state.last_run = 1;
        }
        for since in &mut state.since_last {
            *since = since.saturating_add(1);
        }
        state.since_last[index] = 0;

        let is_default = self.catalog.default_index() == Some(index);
        if is_default {
            state.straight_streak += 1;
        } else {
            state.straight_streak = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VariantConfig;
    use crate::segment::LaneSocket;

    fn variant(id: &str, weight: f32, max_consecutive: u32, min_spacing: u32) -> VariantConfig {
        VariantConfig {
            id: id.into(),
            template: Some(id.to_lowercase()),
            weight,
            max_consecutive,
            min_spacing,
            ..VariantConfig::default()
        }
    }

    fn sequencer(variants: &[VariantConfig], seed: u64) -> TrackSequencer {
        let catalog = TrackVariantCatalog::from_config(variants, "Default", &[LaneSocket::at(0.0)]);
        TrackSequencer::new(catalog, SequencerConfig::default(), &PoolConfig::default(), seed)
    }

    #[test]
    fn test_streak_gate_holds_back_special() {
        let mut seq = sequencer(&[variant("Default", 1.0, 2, 0), variant("Special", 1.0, 1, 3)], 9);

        let picks: Vec<_> = (0..4).map(|_| seq.select_next().unwrap()).collect();
        assert_eq!(picks[0], (0, SelectionLevel::Strict));
        assert_eq!(picks[1], (0, SelectionLevel::Strict));
        // run limit and gate both bite: only the forced level is left
        assert_eq!(picks[2], (0, SelectionLevel::Forced));
        assert_eq!(picks[3], (1, SelectionLevel::Strict));
    }

    #[test]
    fn test_disallow_relaxes_before_forcing() {
        let mut a = variant("Default", 1.0, 1, 0);
        a.disallow_next = vec!["B".into()];
        let b = variant("B", 1.0, 5, 0);
        let mut seq = sequencer(&[a, b], 3);
        seq.config.streak_gate = 0;

        // after A, only B is under its run limit but A disallows it
        seq.selection.last = Some(0);
        seq.selection.last_run = 1;
        assert_eq!(seq.select_next().unwrap(), (1, SelectionLevel::IgnoreDisallow));
    }

    #[test]
    fn test_zero_weight_default_still_forced() {
        let mut seq = sequencer(&[variant("Default", 0.0, 1, 0), variant("Tunnel", 1.0, 1, 0)], 1);
        // tunnel gated, default weightless: falls back to default
        for _ in 0..3 {
            assert_eq!(seq.select_next().unwrap(), (0, SelectionLevel::Forced));
        }
        assert_eq!(seq.select_next().unwrap(), (1, SelectionLevel::Strict));
    }

    #[test]
    fn test_unbounded_weight_wins_without_sampling() {
        let mut seq = sequencer(&[variant("Default", 1.0, 10, 0), variant("Wide", f32::INFINITY, 10, 0)], 4);
        seq.config.streak_gate = 0;
        assert_eq!(seq.select_next().unwrap(), (1, SelectionLevel::Strict));
    }

    #[test]
    fn test_no_usable_variant_disables() {
        let mut v = variant("Default", 1.0, 1, 0);
        v.template = None;
        let mut seq = sequencer(&[v], 1);
        assert!(seq.is_disabled());
        assert!(seq.select_next().is_none());
    }

    #[test]
    fn test_since_last_ages_and_resets() {
        let mut seq = sequencer(&[variant("Default", 1.0, 10, 0)], 1);
        seq.select_next().unwrap();
        seq.select_next().unwrap();
        let state = seq.selection();
        assert_eq!(state.since_last[0], 0);
        assert_eq!(state.last_run, 2);
        assert_eq!(state.straight_streak, 2);
    }
}
