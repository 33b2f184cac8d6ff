//! # Track Events
//!
//! Notifications queued during a step and drained once by the caller.
//!
//! ```text
//! ┌────────────┐  segment_activated  ┌──────────┐
//! │ Sequencer  │────────────────────>│ Pipeline │──┐
//! └────────────┘  segment_recycling  └──────────┘  │   ┌──────────────┐
//!                                                  ├──>│ Vec<Event>   │──> drain_events()
//! ┌────────────┐  activate / tick                  │   └──────────────┘
//! │  Effects   │───────────────────────────────────┘
//! └────────────┘
//! ```

use crate::config::EffectKind;
use crate::segment::SegmentId;

/// Something that happened on the track this step.
#[derive(Clone, Debug, PartialEq)]
pub enum TrackEvent {
    // =========================================================================
    // Segment Events
    // =========================================================================
    /// A segment was chained onto the tail and populated.
    SegmentActivated {
        /// Segment identity.
        segment: SegmentId,
        /// Catalog index of its variant.
        variant: usize,
        /// Global activation index.
        spawn_index: u64,
        /// Hazards placed on it.
        hazards: usize,
        /// Coins placed on it.
        coins: usize,
        /// Pickups placed on it.
        pickups: usize,
    },

    /// A segment was cleared and returned to its pool.
    SegmentRecycled {
        /// Segment identity (stale after this event).
        segment: SegmentId,
        /// Global activation index.
        spawn_index: u64,
    },

    // =========================================================================
    // Effect Events
    // =========================================================================
    /// An effect went from inactive to active.
    EffectActivated {
        /// Which effect.
        kind: EffectKind,
        /// Seconds on the clock after activation.
        remaining: f32,
    },

    /// An effect ran out or was stopped.
    EffectExpired {
        /// Which effect.
        kind: EffectKind,
        /// `true` if stopped by [`crate::effects::PickupEffects::force_stop`].
        forced: bool,
    },
}
