//! # Track Configuration
//!
//! Every tuning value of the generator, loaded once at startup from TOML.
//!
//! ## Layout
//!
//! ```toml
//! seed = 42
//! lanes_local_x = [-2.0, 0.0, 2.0]
//!
//! [sequencer]
//! initial_segments = 10
//!
//! [[variants]]
//! id = "Straight"
//! template = "road_straight"
//! ```
//!
//! Every section is optional; missing values take the defaults below, which
//! mirror the tuning the game shipped with.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{TrackError, TrackResult};
use crate::host::Extents;
use crate::segment::{LaneSocket, SegmentShape};

/// Root configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackConfig {
    /// Seed for every random stream.
    pub seed: u64,
    /// Lane X offsets used by segments without their own sockets.
    pub lanes_local_x: Vec<f32>,
    /// Segment sequencing.
    pub sequencer: SequencerConfig,
    /// Segment variants, in selection order.
    pub variants: Vec<VariantConfig>,
    /// Pool growth limits.
    pub pools: PoolConfig,
    /// Which planners run per activated segment.
    pub pipeline: PipelineConfig,
    /// Obstacle and train placement.
    pub placement: PlacementConfig,
    /// Coin columns.
    pub coins: CoinConfig,
    /// Timed pickups.
    pub powerups: PowerupConfig,
    /// Pickup effect timers.
    pub effects: EffectConfig,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            seed: 0x5eed,
            lanes_local_x: vec![-2.0, 0.0, 2.0],
            sequencer: SequencerConfig::default(),
            variants: vec![
                VariantConfig {
                    id: "Straight".into(),
                    template: Some("road_straight".into()),
                    weight: 3.0,
                    ..VariantConfig::default()
                },
                VariantConfig {
                    id: "Tunnel".into(),
                    template: Some("road_tunnel".into()),
                    weight: 1.0,
                    max_consecutive: 1,
                    min_spacing: 3,
                    disallow_next: vec!["Tunnel".into()],
                    ..VariantConfig::default()
                },
            ],
            pools: PoolConfig::default(),
            pipeline: PipelineConfig::default(),
            placement: PlacementConfig::default(),
            coins: CoinConfig::default(),
            powerups: PowerupConfig::default(),
            effects: EffectConfig::default(),
        }
    }
}

impl TrackConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// [`TrackError::ConfigParse`] on malformed input.
    pub fn from_toml_str(text: &str) -> TrackResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// I/O, parse and validation errors.
    pub fn load(path: impl AsRef<Path>) -> TrackResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| TrackError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        config.validate()?;
        tracing::info!(
            "Loaded track config from {} ({} variants)",
            path.display(),
            config.variants.len()
        );
        Ok(config)
    }

    /// Global lanes as sockets.
    #[must_use]
    pub fn global_lanes(&self) -> Vec<LaneSocket> {
        self.lanes_local_x.iter().copied().map(LaneSocket::at).collect()
    }

    /// Checks ranges and cross references.
    ///
    /// # Errors
    ///
    /// [`TrackError::InvalidConfig`] for out-of-range values,
    /// [`TrackError::EmptyCatalog`] when no variant has a template,
    /// [`TrackError::UnknownVariant`] for dangling ids.
    pub fn validate(&self) -> TrackResult<()> {
        if self.lanes_local_x.is_empty() {
            return Err(invalid("lanes_local_x must not be empty"));
        }
        if !self.variants.iter().any(|v| v.template.is_some()) {
            return Err(TrackError::EmptyCatalog);
        }

        for (i, v) in self.variants.iter().enumerate() {
            if self.variants[..i].iter().any(|o| o.id.eq_ignore_ascii_case(&v.id)) {
                return Err(invalid(format!("duplicate variant id {}", v.id)));
            }
            check_weight(&format!("variant {} weight", v.id), v.weight)?;
            check_positive(&format!("variant {} length", v.id), v.shape.length)?;
            if v.shape.lanes.as_ref().is_some_and(Vec::is_empty) {
                return Err(invalid(format!("variant {} has an empty lane list", v.id)));
            }
            for next in &v.disallow_next {
                if !self.has_variant(next) {
                    return Err(TrackError::UnknownVariant(next.clone()));
                }
            }
        }
        if !self.has_variant(&self.sequencer.default_variant) {
            return Err(TrackError::UnknownVariant(self.sequencer.default_variant.clone()));
        }
        check_weight_sum("variants", self.variants.iter().map(|v| v.weight))?;

        let p = &self.placement;
        check_probability("placement.obstacle_chance", p.obstacle_chance)?;
        check_probability("placement.train_chance", p.train_chance)?;
        if p.obstacle_chance + p.train_chance > 1.0 {
            return Err(invalid("placement.obstacle_chance + train_chance exceeds 1"));
        }
        check_positive("placement.occupancy_bin", p.occupancy_bin)?;
        for h in &p.hazards {
            check_weight(&format!("placement.hazards {} weight", h.template), h.weight)?;
        }
        check_weight_sum("placement.hazards", p.hazards.iter().map(|h| h.weight))?;

        let c = &self.coins;
        check_probability("coins.segment_has_coins_chance", c.segment_has_coins_chance)?;
        check_probability("coins.obstacle_after_column_chance", c.obstacle_after_column_chance)?;
        check_probability("coins.independent.per_lane_chance", c.independent.per_lane_chance)?;
        check_positive("coins.spacing", c.spacing)?;
        let w = &c.weighted;
        check_weight("coins.weighted.single", w.single)?;
        check_weight("coins.weighted.double", w.double)?;
        check_weight("coins.weighted.triple", w.triple)?;
        check_weight_sum("coins.weighted", [w.single, w.double, w.triple])?;
        if c.independent.min_columns > c.independent.max_columns {
            return Err(invalid("coins.independent.min_columns exceeds max_columns"));
        }

        check_probability("powerups.chance_per_segment", self.powerups.chance_per_segment)?;
        for k in &self.powerups.kinds {
            check_weight(&format!("powerups.kinds {} weight", k.id), k.weight)?;
        }
        check_weight_sum("powerups.kinds", self.powerups.kinds.iter().map(|k| k.weight))?;
        Ok(())
    }

    fn has_variant(&self, id: &str) -> bool {
        self.variants.iter().any(|v| v.id.eq_ignore_ascii_case(id))
    }
}

fn invalid(msg: impl Into<String>) -> TrackError {
    TrackError::InvalidConfig(msg.into())
}

fn check_weight(name: &str, value: f32) -> TrackResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be finite and non-negative, got {value}")))
    }
}

fn check_positive(name: &str, value: f32) -> TrackResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be finite and positive, got {value}")))
    }
}

// Roulette draws sample `0..sum`, which must stay finite.
fn check_weight_sum(name: &str, weights: impl IntoIterator<Item = f32>) -> TrackResult<()> {
    let sum: f32 = weights.into_iter().sum();
    if sum.is_finite() {
        Ok(())
    } else {
        Err(invalid(format!("{name} weights overflow")))
    }
}

fn check_probability(name: &str, value: f32) -> TrackResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be within [0, 1], got {value}")))
    }
}

/// Segment sequencing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// Segments built ahead at startup.
    pub initial_segments: usize,
    /// Distance past a segment's end anchor before it is recycled.
    pub recycle_buffer: f32,
    /// Recycle iterations allowed per step.
    pub max_recycles_per_tick: usize,
    /// Default-variant picks required before a tunnel-like variant.
    pub streak_gate: u32,
    /// Id of the plain variant (case-insensitive).
    pub default_variant: String,
    /// World position of the first start anchor.
    pub start_position: [f32; 3],
    /// World yaw of the first start anchor.
    pub start_yaw_degrees: f32,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            initial_segments: 10,
            recycle_buffer: 0.25,
            max_recycles_per_tick: 4,
            streak_gate: 3,
            default_variant: "Straight".into(),
            start_position: [0.0, 0.0, 0.0],
            start_yaw_degrees: 0.0,
        }
    }
}

/// One segment variant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantConfig {
    /// Unique id.
    pub id: String,
    /// Template name; a variant without one is never selected.
    pub template: Option<String>,
    /// Selection weight.
    pub weight: f32,
    /// Longest allowed run of this variant (floored at 1).
    pub max_consecutive: u32,
    /// Other segments required between two of this variant.
    pub min_spacing: u32,
    /// Variants that may not directly follow this one.
    pub disallow_next: Vec<String>,
    /// Instances built at startup.
    pub prewarm: u32,
    /// Geometry.
    pub shape: SegmentShape,
}

impl Default for VariantConfig {
    fn default() -> Self {
        Self {
            id: "Straight".into(),
            template: None,
            weight: 1.0,
            max_consecutive: 2,
            min_spacing: 0,
            disallow_next: Vec::new(),
            prewarm: 6,
            shape: SegmentShape::default(),
        }
    }
}

/// Pool growth limits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Limit for any template without an override.
    pub default_max_size: usize,
    /// Per-template limits by template name.
    pub overrides: BTreeMap<String, usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let mut overrides = BTreeMap::new();
        overrides.insert("coin".to_string(), 256);
        Self {
            default_max_size: 64,
            overrides,
        }
    }
}

/// Planner switches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Segments at the start of a run that never get coins.
    pub skip_coin_segments: u64,
    /// Run the pickup planner.
    pub spawn_powerups: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            skip_coin_segments: 5,
            spawn_powerups: true,
        }
    }
}

/// How the global elapsed/distance gates combine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateMode {
    /// Both thresholds must be met.
    All,
    /// Either threshold suffices.
    Any,
}

/// Obstacle or train.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HazardKind {
    /// Short lane blocker.
    Obstacle,
    /// Long lane-filling hazard.
    Train,
}

/// A spawnable hazard template.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HazardTemplate {
    /// Template name.
    pub template: String,
    /// Obstacle or train.
    pub kind: HazardKind,
    /// Relative pick weight within its kind.
    #[serde(default = "default_weight")]
    pub weight: f32,
    /// Keep `hazard_gap` clear of same-lane trains.
    #[serde(default)]
    pub requires_hazard_gap: bool,
}

fn default_weight() -> f32 {
    1.0
}

/// Obstacle and train placement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Seconds into the run before anything is placed.
    pub min_elapsed: f32,
    /// Distance travelled before anything is placed.
    pub min_distance: f32,
    /// How the two gates combine.
    pub gate_mode: GateMode,
    /// A segment's near edge must be at least this far ahead of the observer.
    pub min_ahead_distance: f32,
    /// A request target must be at least this far ahead of the observer.
    pub min_request_ahead: f32,
    /// Queue bound; the oldest request is dropped first.
    pub max_pending_requests: usize,
    /// Fallback roll: chance of an obstacle.
    pub obstacle_chance: f32,
    /// Fallback roll: chance of a train.
    pub train_chance: f32,
    /// Clearance kept from both ends of a segment.
    pub edge_padding: f32,
    /// Z bin size of the occupancy grid.
    pub occupancy_bin: f32,
    /// Minimum same-lane distance between two obstacles.
    pub min_gap_obstacle_to_obstacle: f32,
    /// Minimum same-lane distance between a train and an obstacle.
    pub min_gap_train_to_obstacle: f32,
    /// Clearance around trains for gap-sensitive obstacles.
    pub hazard_gap: f32,
    /// Never let trains block every lane at once.
    pub forbid_full_train_coverage: bool,
    /// Height of the spawn anchor above the ground.
    pub y_offset: f32,
    /// Radius of the anchor overlap probe.
    pub overlap_radius: f32,
    /// Scale applied to the swept volume probe.
    pub volume_shrink: f32,
    /// Start height of the ground probe above the walking surface.
    pub ground_probe_height: f32,
    /// Size used for templates the host cannot measure.
    pub default_extents: Extents,
    /// Spawnable hazards.
    pub hazards: Vec<HazardTemplate>,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            min_elapsed: 0.0,
            min_distance: 0.0,
            gate_mode: GateMode::All,
            min_ahead_distance: 12.0,
            min_request_ahead: 4.0,
            max_pending_requests: 64,
            obstacle_chance: 0.4,
            train_chance: 0.3,
            edge_padding: 2.0,
            occupancy_bin: 2.0,
            min_gap_obstacle_to_obstacle: 6.0,
            min_gap_train_to_obstacle: 8.0,
            hazard_gap: 3.0,
            forbid_full_train_coverage: true,
            y_offset: 0.5,
            overlap_radius: 0.6,
            volume_shrink: 0.9,
            ground_probe_height: 5.0,
            default_extents: Extents::default(),
            hazards: vec![
                HazardTemplate {
                    template: "blocker_low".into(),
                    kind: HazardKind::Obstacle,
                    weight: 1.0,
                    requires_hazard_gap: true,
                },
                HazardTemplate {
                    template: "blocker_high".into(),
                    kind: HazardKind::Obstacle,
                    weight: 1.0,
                    requires_hazard_gap: false,
                },
                HazardTemplate {
                    template: "train".into(),
                    kind: HazardKind::Train,
                    weight: 1.0,
                    requires_hazard_gap: false,
                },
            ],
        }
    }
}

/// Lane subset policy of the coin planner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoinPolicyKind {
    /// Single/double/triple by weight.
    Weighted,
    /// Independent per-lane rolls clamped into a column range.
    Independent,
}

/// Weights of the `weighted` policy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightedColumns {
    /// Weight of one column.
    pub single: f32,
    /// Weight of two columns.
    pub double: f32,
    /// Weight of three columns.
    pub triple: f32,
}

impl Default for WeightedColumns {
    fn default() -> Self {
        Self {
            single: 1.0,
            double: 1.2,
            triple: 0.6,
        }
    }
}

/// Settings of the `independent` policy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndependentColumns {
    /// Chance of each lane getting a column.
    pub per_lane_chance: f32,
    /// Lower clamp on columns.
    pub min_columns: usize,
    /// Upper clamp on columns.
    pub max_columns: usize,
    /// Shuffle lane order before rolling.
    pub shuffle_lanes: bool,
    /// Leave out lanes with a solid along them.
    pub skip_blocked_lanes: bool,
    /// Probe step when looking for blocked lanes.
    pub block_sample_step: f32,
}

impl Default for IndependentColumns {
    fn default() -> Self {
        Self {
            per_lane_chance: 0.6,
            min_columns: 1,
            max_columns: 2,
            shuffle_lanes: true,
            skip_blocked_lanes: true,
            block_sample_step: 3.0,
        }
    }
}

/// Coin columns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoinConfig {
    /// Coin template name.
    pub template: String,
    /// Chance that a segment gets any coins.
    pub segment_has_coins_chance: f32,
    /// Distance between coins in a column.
    pub spacing: f32,
    /// Clearance at the start of the segment.
    pub margin_start: f32,
    /// Clearance at the end of the segment.
    pub margin_end: f32,
    /// Coin height above the walking surface.
    pub y_offset: f32,
    /// Radius of the per-coin overlap probe.
    pub coin_radius: f32,
    /// Lane subset policy.
    pub policy: CoinPolicyKind,
    /// Weighted policy settings.
    pub weighted: WeightedColumns,
    /// Independent policy settings.
    pub independent: IndependentColumns,
    /// Chance that a column asks for a hazard further ahead.
    pub obstacle_after_column_chance: f32,
    /// How far ahead of the column start that hazard goes.
    pub ahead_distance: f32,
    /// Kind of hazard requested.
    pub ahead_kind: HazardKind,
    /// Seconds a collected coin stays out before returning to the pool.
    pub return_delay: f32,
    /// Coins built before the first run.
    pub prewarm: usize,
}

impl Default for CoinConfig {
    fn default() -> Self {
        Self {
            template: "coin".into(),
            segment_has_coins_chance: 0.85,
            spacing: 2.8,
            margin_start: 0.8,
            margin_end: 0.8,
            y_offset: 0.5,
            coin_radius: 0.28,
            policy: CoinPolicyKind::Independent,
            weighted: WeightedColumns::default(),
            independent: IndependentColumns::default(),
            obstacle_after_column_chance: 0.5,
            ahead_distance: 6.0,
            ahead_kind: HazardKind::Obstacle,
            return_delay: 0.3,
            prewarm: 64,
        }
    }
}

/// Timed effect kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    /// Pulls nearby coins.
    Magnet,
    /// Higher jumps.
    JumpBoost,
}

/// One pickup kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PowerupKind {
    /// Unique id.
    pub id: String,
    /// Template name.
    pub template: String,
    /// Relative pick weight; non-positive kinds are never picked.
    #[serde(default = "default_weight")]
    pub weight: f32,
    /// Clearance required around the pickup.
    #[serde(default = "default_clear_radius")]
    pub clear_radius: f32,
    /// Effect granted on collection.
    #[serde(default)]
    pub effect: Option<EffectKind>,
    /// Effect duration; non-positive uses the effect default.
    #[serde(default)]
    pub duration: f32,
}

fn default_clear_radius() -> f32 {
    0.6
}

/// Timed pickups.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerupConfig {
    /// Chance that a segment gets pickups.
    pub chance_per_segment: f32,
    /// Most pickups on one segment (floored at 1).
    pub max_per_segment: usize,
    /// Clearance at both ends of the segment.
    pub edge_padding: f32,
    /// Slot grid step along Z (floored at 0.1).
    pub slot_step: f32,
    /// Added to each kind's clear radius.
    pub extra_clear_radius: f32,
    /// Segments up to this global index never get pickups.
    pub min_segment_index: u64,
    /// A segment's near edge must be at least this far ahead of the observer.
    pub min_ahead_distance: f32,
    /// Pickup height above the walking surface.
    pub y_offset: f32,
    /// Pickup kinds.
    pub kinds: Vec<PowerupKind>,
}

impl Default for PowerupConfig {
    fn default() -> Self {
        Self {
            chance_per_segment: 0.45,
            max_per_segment: 1,
            edge_padding: 1.0,
            slot_step: 2.8,
            extra_clear_radius: 0.1,
            min_segment_index: 4,
            min_ahead_distance: 18.0,
            y_offset: 0.5,
            kinds: vec![
                PowerupKind {
                    id: "magnet".into(),
                    template: "powerup_magnet".into(),
                    weight: 1.0,
                    clear_radius: 0.6,
                    effect: Some(EffectKind::Magnet),
                    duration: 0.0,
                },
                PowerupKind {
                    id: "jump_boost".into(),
                    template: "powerup_boots".into(),
                    weight: 1.0,
                    clear_radius: 0.6,
                    effect: Some(EffectKind::JumpBoost),
                    duration: 0.0,
                },
            ],
        }
    }
}

/// Axis used to measure lateral distance for the magnet band.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandAxis {
    /// World X.
    WorldX,
    /// Observer's right vector.
    ObserverRight,
}

/// Magnet attraction band.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MagnetBandConfig {
    /// Lateral half width.
    pub lateral_range: f32,
    /// Lateral axis.
    pub axis: BandAxis,
    /// Also limit along the observer's forward.
    pub use_z_band: bool,
    /// Forward reach when `use_z_band`.
    pub forward_range: f32,
    /// Backward reach when `use_z_band`.
    pub back_range: f32,
}

impl Default for MagnetBandConfig {
    fn default() -> Self {
        Self {
            lateral_range: 2.0,
            axis: BandAxis::WorldX,
            use_z_band: false,
            forward_range: 20.0,
            back_range: 2.0,
        }
    }
}

/// Pickup effect timers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectConfig {
    /// Magnet duration when none is given.
    pub magnet_duration: f32,
    /// Jump boost duration when none is given.
    pub jump_boost_duration: f32,
    /// Magnet band.
    pub magnet: MagnetBandConfig,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            magnet_duration: 7.0,
            jump_boost_duration: 7.0,
            magnet: MagnetBandConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        TrackConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = TrackConfig::from_toml_str(
            r#"
            seed = 7

            [placement]
            train_chance = 0.1

            [[variants]]
            id = "Straight"
            template = "road"
            "#,
        )
        .unwrap();

        assert_eq!(config.seed, 7);
        assert_eq!(config.placement.train_chance, 0.1);
        assert_eq!(config.placement.obstacle_chance, 0.4);
        assert_eq!(config.variants.len(), 1);
        assert_eq!(config.variants[0].max_consecutive, 2);
        assert_eq!(config.variants[0].shape.length, 30.0);
        assert_eq!(config.coins.policy, CoinPolicyKind::Independent);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_unknown_disallow() {
        let mut config = TrackConfig::default();
        config.variants[0].disallow_next.push("Bridge".into());
        assert!(matches!(config.validate(), Err(TrackError::UnknownVariant(id)) if id == "Bridge"));
    }

    #[test]
    fn test_validate_rejects_bad_probability() {
        let mut config = TrackConfig::default();
        config.coins.segment_has_coins_chance = 1.5;
        assert!(matches!(config.validate(), Err(TrackError::InvalidConfig(_))));

        let mut config = TrackConfig::default();
        config.placement.obstacle_chance = 0.8;
        config.placement.train_chance = 0.3;
        assert!(matches!(config.validate(), Err(TrackError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_inverted_column_range() {
        let mut config = TrackConfig::default();
        config.coins.independent.min_columns = 3;
        config.coins.independent.max_columns = 1;
        assert!(matches!(config.validate(), Err(TrackError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_templateless_catalog() {
        let mut config = TrackConfig::default();
        for v in &mut config.variants {
            v.template = None;
        }
        assert!(matches!(config.validate(), Err(TrackError::EmptyCatalog)));
    }

    #[test]
    fn test_validate_rejects_infinite_weights() {
        let config = TrackConfig::from_toml_str(
            r#"
            [[variants]]
            id = "Straight"
            template = "road"
            weight = inf
            "#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(TrackError::InvalidConfig(_))));

        let mut config = TrackConfig::default();
        config.placement.hazards[0].weight = f32::INFINITY;
        assert!(matches!(config.validate(), Err(TrackError::InvalidConfig(_))));

        let mut config = TrackConfig::default();
        config.powerups.kinds[0].weight = f32::NAN;
        assert!(matches!(config.validate(), Err(TrackError::InvalidConfig(_))));

        let mut config = TrackConfig::default();
        config.coins.weighted.triple = f32::INFINITY;
        assert!(matches!(config.validate(), Err(TrackError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_overflowing_weight_sum() {
        let mut config = TrackConfig::default();
        for v in &mut config.variants {
            v.weight = f32::MAX;
        }
        assert!(matches!(config.validate(), Err(TrackError::InvalidConfig(_))));

        let mut config = TrackConfig::default();
        config.variants[0].shape.length = f32::INFINITY;
        assert!(matches!(config.validate(), Err(TrackError::InvalidConfig(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let err = TrackConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, TrackError::ConfigIo { .. }));
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            TrackConfig::from_toml_str("seed = \"nope\""),
            Err(TrackError::ConfigParse(_))
        ));
    }
}
