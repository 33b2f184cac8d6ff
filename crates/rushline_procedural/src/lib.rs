//! # RUSHLINE Procedural Track Generation
//!
//! Deterministic endless-runner track built from pooled segments.
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: same seed and same observer path, same track
//! 2. **Pooled**: segments, hazards, coins and pickups are recycled, never
//!    destroyed during a run
//! 3. **Host-agnostic**: every scene operation goes through [`TrackHost`]
//! 4. **Rule-driven**: adjacency, spacing and coverage rules are checked, not
//!    hoped for
//!
//! ## Core Components
//!
//! - `TrackSequencer`: picks and chains segment variants, recycles passed ones
//! - `SpatialPlacementEngine`: lane obstacles and trains
//! - `CoinColumnPlanner`: coin columns
//! - `PowerupSlotPlanner`: timed pickups
//! - `PickupEffects`: magnet and jump boost timers
//! - `TrackGenerator`: all of the above behind one step function
//!
//! ## Example
//!
//! ```rust,ignore
//! use rushline_procedural::{Frame, SandboxHost, TrackConfig, TrackGenerator};
//!
//! let config = TrackConfig::load("data/track.toml")?;
//! let mut host = SandboxHost::for_config(&config);
//! let mut track = TrackGenerator::new(config)?;
//!
//! track.build_initial(&mut host, &Frame::at(Vec3::ZERO, 0.0, 0.0));
//! track.tick(&mut host, &Frame::at(player, elapsed, dt));
//! for event in track.drain_events() { /* ... */ }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod catalog;
pub mod coins;
pub mod config;
pub mod effects;
pub mod error;
pub mod events;
pub mod generator;
pub mod host;
pub mod placement;
pub mod pooling;
pub mod powerups;
pub mod sandbox;
pub mod segment;
pub mod sequencer;
pub mod stats;

pub use catalog::{TrackVariantCatalog, Variant};
pub use coins::{CoinColumnPlanner, CoinStats};
pub use config::{
    CoinConfig, CoinPolicyKind, EffectKind, GateMode, HazardKind, PlacementConfig, PowerupConfig, SequencerConfig,
    TrackConfig, VariantConfig,
};
pub use effects::{MagnetBand, PickupEffects};
pub use error::{TrackError, TrackResult};
pub use events::TrackEvent;
pub use generator::TrackGenerator;
pub use host::{Extents, Frame, InstanceFactory, InstanceId, LayerMask, SpatialQuery, TrackHost};
pub use placement::{Interval, Placed, PlacementStats, Rejection, SpatialPlacementEngine};
pub use pooling::InstancePools;
pub use powerups::{PowerupSlotPlanner, PowerupStats};
pub use sandbox::{SandboxHost, TemplateShape};
pub use segment::{LaneSocket, Segment, SegmentId, SegmentShape, TrackSegmentPool};
pub use sequencer::{NoopListener, SegmentListener, SelectionLevel, TrackSequencer};
pub use stats::TrackStats;
