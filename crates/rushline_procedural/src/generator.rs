//! # Track Generator
//!
//! Wires every component into one step function.
//!
//! ## Per step
//!
//! ```text
//! tick(host, frame)
//!   ├─ coin return timers, effect timers
//!   └─ sequencer.tick ── recycle ──> clear hazards, coins, pickups ──> release segment
//!                      └─ spawn ───> place hazards ──> lay coins ──> place pickups
//! ```
//!
//! Hazards go first so coins and pickups can avoid them.

use rushline_core::Pooled;

use crate::catalog::TrackVariantCatalog;
use crate::coins::CoinColumnPlanner;
use crate::config::{EffectKind, HazardKind, PipelineConfig, TrackConfig};
use crate::effects::PickupEffects;
use crate::error::TrackResult;
use crate::events::TrackEvent;
use crate::host::{Frame, TrackHost};
use crate::placement::SpatialPlacementEngine;
use crate::powerups::PowerupSlotPlanner;
use crate::segment::Segment;
use crate::sequencer::{SegmentListener, TrackSequencer};
use crate::stats::TrackStats;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ObserverState {
    Unknown,
    Bound,
    Lost,
}

/// Populates segments as the sequencer activates and recycles them.
struct Populator {
    config: PipelineConfig,
    placement: SpatialPlacementEngine,
    coins: CoinColumnPlanner,
    powerups: PowerupSlotPlanner,
    enabled: bool,
    events: Vec<TrackEvent>,
    activated: u64,
    recycled: u64,
}

impl Populator {
    fn reset_run(&mut self, host: &mut dyn TrackHost) {
        self.placement.reset(host);
        self.coins.reset(host);
        self.powerups.reset(host);
    }
}

impl SegmentListener for Populator {
    fn segment_activated(&mut self, segment: &Segment, host: &mut dyn TrackHost, frame: &Frame) {
        let (mut hazards, mut coins, mut pickups) = (0, 0, 0);
        if self.enabled {
            hazards = self.placement.place(segment, host, frame);
            if segment.spawn_index >= self.config.skip_coin_segments {
                coins = self.coins.plan(segment, host, &mut self.placement);
            }
            if self.config.spawn_powerups {
                pickups = self.powerups.plan(segment, host, frame);
            }
        }
        self.activated += 1;
        self.events.push(TrackEvent::SegmentActivated {
            segment: segment.id,
            variant: segment.variant,
            spawn_index: segment.spawn_index,
            hazards,
            coins,
            pickups,
        });
    }

    fn segment_recycling(&mut self, segment: &Segment, host: &mut dyn TrackHost) {
        self.placement.clear_for(segment.id, host);
        self.coins.clear_for(segment.id, host);
        self.powerups.clear_for(segment.id, host);
        self.recycled += 1;
        self.events.push(TrackEvent::SegmentRecycled {
            segment: segment.id,
            spawn_index: segment.spawn_index,
        });
    }
}

/// The endless track.
pub struct TrackGenerator {
    config: TrackConfig,
    sequencer: TrackSequencer,
    populator: Populator,
    effects: PickupEffects,
    observer: ObserverState,
    observer_lost: u64,
    effects_activated: u64,
}

impl TrackGenerator {
    /// Validates `config` and builds every component. Nothing is spawned yet.
    ///
    /// A catalog without any usable template is refused here as
    /// [`crate::TrackError::EmptyCatalog`]. Only a bare [`TrackSequencer`]
    /// accepts one, and it then stays disabled.
    ///
    /// # Errors
    ///
    /// Any [`crate::TrackError`] from [`TrackConfig::validate`].
    pub fn new(config: TrackConfig) -> TrackResult<Self> {
        config.validate()?;

        let catalog = TrackVariantCatalog::from_config(
            &config.variants,
            &config.sequencer.default_variant,
            &config.global_lanes(),
        );
        let seed = config.seed;
        let sequencer = TrackSequencer::new(catalog, config.sequencer.clone(), &config.pools, seed);
        let populator = Populator {
            config: config.pipeline.clone(),
            placement: SpatialPlacementEngine::new(config.placement.clone(), &config.pools, seed),
            coins: CoinColumnPlanner::new(config.coins.clone(), &config.pools, seed),
            powerups: PowerupSlotPlanner::new(config.powerups.clone(), &config.pools, seed),
            enabled: true,
            events: Vec::new(),
            activated: 0,
            recycled: 0,
        };

        Ok(Self {
            effects: PickupEffects::new(config.effects.clone()),
            config,
            sequencer,
            populator,
            observer: ObserverState::Unknown,
            observer_lost: 0,
            effects_activated: 0,
        })
    }

    /// Resets the run and chains the configured number of segments.
    pub fn build_initial(&mut self, host: &mut dyn TrackHost, frame: &Frame) -> usize {
        self.populator.reset_run(host);
        self.populator.enabled = true;
        let count = self.config.sequencer.initial_segments;
        self.sequencer.build_initial(count, host, &mut self.populator, frame)
    }

    /// Builds the configured number of inactive coins.
    ///
    /// # Errors
    ///
    /// [`crate::TrackError::Pool`] if the host cannot build the coin template.
    pub fn prewarm_coins(&mut self, host: &mut dyn TrackHost) -> TrackResult<usize> {
        let count = self.config.coins.prewarm;
        let built = self.populator.coins.prewarm(host, count)?;
        tracing::info!("Prewarmed {} coins", built);
        Ok(built)
    }

    /// Advances timers, then recycles and extends the track.
    /// Returns the number of segments recycled.
    pub fn tick(&mut self, host: &mut dyn TrackHost, frame: &Frame) -> usize {
        self.track_observer(frame);

        self.populator.coins.tick(frame.dt, host);
        self.effects.tick(frame.dt, &mut self.populator.events);

        self.sequencer.tick(host, &mut self.populator, frame)
    }

    /// Recycles the whole road and forgets placement history and effects.
    pub fn reset_road(&mut self, host: &mut dyn TrackHost) {
        self.sequencer.reset_road(host, &mut self.populator);
        self.populator.reset_run(host);
        self.effects.stop_all(&mut self.populator.events);
        tracing::info!("Track reset");
    }

    /// Asks for a hazard at world `target_z` in `lane`.
    pub fn enqueue(&mut self, target_z: f32, lane: usize, kind: HazardKind) {
        self.populator.placement.enqueue(target_z, lane, kind);
    }

    /// Turns segment population on or off. Off once the run has ended.
    pub fn set_placement_enabled(&mut self, enabled: bool) {
        if self.populator.enabled != enabled {
            tracing::info!("Segment population {}", if enabled { "enabled" } else { "disabled" });
        }
        self.populator.enabled = enabled;
    }

    /// Is segment population on?
    #[must_use]
    pub fn is_placement_enabled(&self) -> bool {
        self.populator.enabled
    }

    /// Collects a coin. Returns `false` if it was not out or already taken.
    pub fn collect_coin(&mut self, coin: Pooled) -> bool {
        self.populator.coins.collect(coin)
    }

    /// Collects a pickup and starts its effect. Returns the effect, if any.
    pub fn collect_powerup(&mut self, pickup: Pooled, host: &mut dyn TrackHost) -> Option<EffectKind> {
        let kind = self.populator.powerups.collect(pickup, host)?;
        let (effect, duration) = (kind.effect?, kind.duration);

        let was_active = self.effects.is_active(effect);
        self.effects.activate(effect, duration, &mut self.populator.events);
        if !was_active {
            self.effects_activated += 1;
        }
        Some(effect)
    }

    /// Takes every event queued since the last drain.
    pub fn drain_events(&mut self) -> std::vec::Drain<'_, TrackEvent> {
        self.populator.events.drain(..)
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> TrackStats {
        TrackStats {
            segments_activated: self.populator.activated,
            segments_recycled: self.populator.recycled,
            picks_by_level: self.sequencer.picks_by_level(),
            observer_lost: self.observer_lost,
            effects_activated: self.effects_activated,
            placement: *self.populator.placement.stats(),
            coins: *self.populator.coins.stats(),
            powerups: *self.populator.powerups.stats(),
        }
    }

    /// Checks every pool's bookkeeping.
    #[must_use]
    pub fn pools_conserved(&self) -> bool {
        self.sequencer.segment_pool().pools().is_conserved()
            && self.populator.placement.pools().is_conserved()
            && self.populator.coins.pools().is_conserved()
            && self.populator.powerups.pools().is_conserved()
    }

    /// Active segments, oldest first.
    pub fn active_segments(&self) -> impl Iterator<Item = &Segment> {
        self.sequencer.active().iter()
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &TrackConfig {
        &self.config
    }

    /// Segment sequencer.
    #[must_use]
    pub fn sequencer(&self) -> &TrackSequencer {
        &self.sequencer
    }

    /// Hazard placement.
    #[must_use]
    pub fn placement(&self) -> &SpatialPlacementEngine {
        &self.populator.placement
    }

    /// Coin planner.
    #[must_use]
    pub fn coins(&self) -> &CoinColumnPlanner {
        &self.populator.coins
    }

    /// Pickup planner.
    #[must_use]
    pub fn powerups(&self) -> &PowerupSlotPlanner {
        &self.populator.powerups
    }

    /// Effect timers.
    #[must_use]
    pub fn effects(&self) -> &PickupEffects {
        &self.effects
    }

    /// Recycles everything and destroys every pooled instance.
    pub fn shutdown(&mut self, host: &mut dyn TrackHost) {
        self.sequencer.shutdown(host, &mut self.populator);
        self.populator.placement.destroy_pools(host);
        self.populator.coins.destroy_pools(host);
        self.populator.powerups.destroy_pools(host);
        tracing::info!("Track generator shut down");
    }

    fn track_observer(&mut self, frame: &Frame) {
        self.observer = match (self.observer, frame.observer.is_some()) {
            (ObserverState::Bound | ObserverState::Unknown, false) => {
                if self.observer == ObserverState::Bound {
                    self.observer_lost += 1;
                }
                tracing::warn!("No observer; track generation idle");
                ObserverState::Lost
            }
            (ObserverState::Lost, true) => {
                tracing::warn!("Observer re-resolved; track generation resumed");
                ObserverState::Bound
            }
            (ObserverState::Lost, false) => ObserverState::Lost,
            (_, true) => ObserverState::Bound,
        };
    }
}
