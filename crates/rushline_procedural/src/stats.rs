//! Aggregated generator counters.

use std::fmt;

use crate::coins::CoinStats;
use crate::placement::{PlacementStats, Rejection};
use crate::powerups::PowerupStats;
use crate::sequencer::SelectionLevel;

/// Snapshot of every component's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackStats {
    /// Segments activated, across resets.
    pub segments_activated: u64,
    /// Segments recycled, across resets.
    pub segments_recycled: u64,
    /// Variant picks per [`SelectionLevel`].
    pub picks_by_level: [u64; 4],
    /// Times the observer went missing.
    pub observer_lost: u64,
    /// Effects activated.
    pub effects_activated: u64,
    /// Hazard placement.
    pub placement: PlacementStats,
    /// Coin columns.
    pub coins: CoinStats,
    /// Timed pickups.
    pub powerups: PowerupStats,
}

impl TrackStats {
    /// Picks made at `level`.
    #[must_use]
    pub fn picks_at(&self, level: SelectionLevel) -> u64 {
        self.picks_by_level[level as usize]
    }

    /// Every rejected placement attempt.
    #[must_use]
    pub fn total_rejections(&self) -> u64 {
        self.placement.rejections.iter().sum()
    }
}

impl fmt::Display for TrackStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "segments: {} activated, {} recycled",
            self.segments_activated, self.segments_recycled
        )?;
        writeln!(
            f,
            "picks: strict {} / no-disallow {} / no-spacing {} / forced {}",
            self.picks_by_level[0], self.picks_by_level[1], self.picks_by_level[2], self.picks_by_level[3]
        )?;
        writeln!(
            f,
            "hazards: {} obstacles, {} trains, {} rejected",
            self.placement.obstacles_placed,
            self.placement.trains_placed,
            self.total_rejections()
        )?;
        for reason in Rejection::ALL {
            let count = self.placement.rejected(reason);
            if count > 0 {
                writeln!(f, "  {reason:?}: {count}")?;
            }
        }
        writeln!(
            f,
            "requests: {} queued, {} consumed, {} expired, {} overflowed",
            self.placement.requests_enqueued,
            self.placement.requests_consumed,
            self.placement.requests_expired,
            self.placement.requests_overflowed
        )?;
        writeln!(
            f,
            "coins: {} spawned in {} columns, {} collected",
            self.coins.spawned, self.coins.columns, self.coins.collected
        )?;
        write!(
            f,
            "pickups: {} spawned, {} collected, {} effects",
            self.powerups.spawned, self.powerups.collected, self.effects_activated
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_total_and_display() {
        let mut stats = TrackStats::default();
        stats.placement.rejections[Rejection::Spacing.index()] = 3;
        stats.placement.rejections[Rejection::Blocked.index()] = 2;
        stats.picks_by_level = [5, 0, 0, 1];

        assert_eq!(stats.total_rejections(), 5);
        assert_eq!(stats.picks_at(SelectionLevel::Forced), 1);
        let text = stats.to_string();
        assert!(text.contains("Spacing: 3"));
        assert!(!text.contains("Occupied"));
    }
}
