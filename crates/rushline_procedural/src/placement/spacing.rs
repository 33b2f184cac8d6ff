//! Per-lane memory of the last hazards placed, across segments.

use crate::config::HazardKind;

/// Minimum same-lane distances.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpacingRules {
    /// Between two obstacles.
    pub obstacle_to_obstacle: f32,
    /// Between a train and an obstacle, either way round.
    pub train_to_obstacle: f32,
}

/// Last non-train and last train Z per lane.
///
/// Survives segment recycling; only a full reset clears it.
#[derive(Clone, Debug, Default)]
pub struct LaneSpacingTracker {
    last_obstacle: Vec<Option<f32>>,
    last_train: Vec<Option<f32>>,
}

impl LaneSpacingTracker {
    /// Would a `kind` hazard at `z` in `lane` respect the rules?
    #[must_use]
    pub fn allows(&self, lane: usize, z: f32, kind: HazardKind, rules: &SpacingRules) -> bool {
        let far_enough = |last: Option<f32>, gap: f32| last.map_or(true, |last| (z - last).abs() >= gap);
        let last_obstacle = self.last_obstacle.get(lane).copied().flatten();
        let last_train = self.last_train.get(lane).copied().flatten();

        match kind {
            HazardKind::Obstacle => {
                far_enough(last_obstacle, rules.obstacle_to_obstacle)
                    && far_enough(last_train, rules.train_to_obstacle)
            }
            // trains may sit flush against trains
            HazardKind::Train => far_enough(last_obstacle, rules.train_to_obstacle),
        }
    }

    /// Remembers a placed hazard.
    pub fn record(&mut self, lane: usize, z: f32, kind: HazardKind) {
        let slots = match kind {
            HazardKind::Obstacle => &mut self.last_obstacle,
            HazardKind::Train => &mut self.last_train,
        };
        if slots.len() <= lane {
            slots.resize(lane + 1, None);
        }
        slots[lane] = Some(z);
    }

    /// Last non-train Z in `lane`.
    #[must_use]
    pub fn last_obstacle(&self, lane: usize) -> Option<f32> {
        self.last_obstacle.get(lane).copied().flatten()
    }

    /// Last train Z in `lane`.
    #[must_use]
    pub fn last_train(&self, lane: usize) -> Option<f32> {
        self.last_train.get(lane).copied().flatten()
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.last_obstacle.clear();
        self.last_train.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: SpacingRules = SpacingRules {
        obstacle_to_obstacle: 10.0,
        train_to_obstacle: 8.0,
    };

    #[test]
    fn test_obstacle_gap() {
        let mut tracker = LaneSpacingTracker::default();
        tracker.record(1, 40.0, HazardKind::Obstacle);

        assert!(!tracker.allows(1, 45.0, HazardKind::Obstacle, &RULES));
        assert!(tracker.allows(1, 50.0, HazardKind::Obstacle, &RULES));
        assert!(tracker.allows(0, 45.0, HazardKind::Obstacle, &RULES));
    }

    #[test]
    fn test_train_rules() {
        let mut tracker = LaneSpacingTracker::default();
        tracker.record(0, 20.0, HazardKind::Train);

        assert!(tracker.allows(0, 20.5, HazardKind::Train, &RULES));
        assert!(!tracker.allows(0, 25.0, HazardKind::Obstacle, &RULES));

        tracker.record(0, 40.0, HazardKind::Obstacle);
        assert!(!tracker.allows(0, 45.0, HazardKind::Train, &RULES));

        tracker.clear();
        assert!(tracker.allows(0, 45.0, HazardKind::Train, &RULES));
    }
}
