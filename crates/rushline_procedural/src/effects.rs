//! Timed pickup effects.
//!
//! Magnet and jump boost run on countdown timers advanced by
//! [`PickupEffects::tick`]. Activation and expiry are reported as
//! [`TrackEvent`]s.

use rushline_shared::Vec3;

use crate::config::{BandAxis, EffectConfig, EffectKind, MagnetBandConfig};
use crate::events::TrackEvent;

impl EffectKind {
    /// Every effect kind.
    pub const ALL: [Self; 2] = [Self::Magnet, Self::JumpBoost];

    const fn slot(self) -> usize {
        match self {
            Self::Magnet => 0,
            Self::JumpBoost => 1,
        }
    }
}

/// Lateral attraction band of the magnet.
#[derive(Clone, Debug, PartialEq)]
pub struct MagnetBand {
    config: MagnetBandConfig,
}

impl MagnetBand {
    /// Band from configuration.
    #[must_use]
    pub fn new(config: MagnetBandConfig) -> Self {
        Self { config }
    }

    /// Is `coin` inside the band around `aim`?
    ///
    /// `forward` and `right` are the observer's axes.
    #[must_use]
    pub fn should_attract(&self, coin: Vec3, aim: Vec3, forward: Vec3, right: Vec3) -> bool {
        let to_coin = coin - aim;
        let lateral = match self.config.axis {
            BandAxis::WorldX => to_coin.x.abs(),
            BandAxis::ObserverRight => to_coin.dot(right).abs(),
        };
        if lateral > self.config.lateral_range {
            return false;
        }
        if !self.config.use_z_band {
            return true;
        }
        let along = to_coin.dot(forward);
        along > -self.config.back_range && along <= self.config.forward_range
    }
}

/// Countdown timers for every effect.
#[derive(Clone, Debug)]
pub struct PickupEffects {
    config: EffectConfig,
    band: MagnetBand,
    remaining: [f32; 2],
}

impl PickupEffects {
    /// All effects inactive.
    #[must_use]
    pub fn new(config: EffectConfig) -> Self {
        Self {
            band: MagnetBand::new(config.magnet.clone()),
            config,
            remaining: [0.0; 2],
        }
    }

    /// Starts or extends an effect. Non-positive `seconds` uses the default.
    ///
    /// The magnet refreshes to the longer of the two durations; the jump
    /// boost adds up.
    pub fn activate(&mut self, kind: EffectKind, seconds: f32, events: &mut Vec<TrackEvent>) {
        let duration = if seconds > 0.0 {
            seconds
        } else {
            self.default_duration(kind)
        };
        let was_active = self.is_active(kind);
        let timer = &mut self.remaining[kind.slot()];
        *timer = match kind {
            EffectKind::Magnet => timer.max(duration),
            EffectKind::JumpBoost => timer.max(0.0) + duration,
        };

        if !was_active && *timer > 0.0 {
            tracing::debug!("{:?} active for {:.1}s", kind, *timer);
            events.push(TrackEvent::EffectActivated {
                kind,
                remaining: *timer,
            });
        }
    }

    /// Advances every timer by `dt`.
    pub fn tick(&mut self, dt: f32, events: &mut Vec<TrackEvent>) {
        for kind in EffectKind::ALL {
            let timer = &mut self.remaining[kind.slot()];
            if *timer <= 0.0 {
                continue;
            }
            *timer -= dt;
            if *timer <= 0.0 {
                *timer = 0.0;
                events.push(TrackEvent::EffectExpired { kind, forced: false });
            }
        }
    }

    /// Ends an effect immediately.
    pub fn force_stop(&mut self, kind: EffectKind, events: &mut Vec<TrackEvent>) {
        if self.is_active(kind) {
            self.remaining[kind.slot()] = 0.0;
            events.push(TrackEvent::EffectExpired { kind, forced: true });
        }
    }

    /// Ends every effect.
    pub fn stop_all(&mut self, events: &mut Vec<TrackEvent>) {
        for kind in EffectKind::ALL {
            self.force_stop(kind, events);
        }
    }

    /// Is the effect running?
    #[must_use]
    pub fn is_active(&self, kind: EffectKind) -> bool {
        self.remaining[kind.slot()] > 0.0
    }

    /// Seconds left, zero when inactive.
    #[must_use]
    pub fn remaining(&self, kind: EffectKind) -> f32 {
        self.remaining[kind.slot()]
    }

    /// Should the active magnet pull `coin`? Always `false` when inactive.
    #[must_use]
    pub fn magnet_pulls(&self, coin: Vec3, aim: Vec3, forward: Vec3, right: Vec3) -> bool {
        self.is_active(EffectKind::Magnet) && self.band.should_attract(coin, aim, forward, right)
    }

    /// The magnet band.
    #[must_use]
    pub fn band(&self) -> &MagnetBand {
        &self.band
    }

    fn default_duration(&self, kind: EffectKind) -> f32 {
        match kind {
            EffectKind::Magnet => self.config.magnet_duration,
            EffectKind::JumpBoost => self.config.jump_boost_duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magnet_refreshes_to_longer() {
        let mut effects = PickupEffects::new(EffectConfig::default());
        let mut events = Vec::new();

        effects.activate(EffectKind::Magnet, 5.0, &mut events);
        effects.activate(EffectKind::Magnet, 3.0, &mut events);
        assert_eq!(effects.remaining(EffectKind::Magnet), 5.0);
        effects.activate(EffectKind::Magnet, 9.0, &mut events);
        assert_eq!(effects.remaining(EffectKind::Magnet), 9.0);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_jump_boost_accumulates() {
        let mut effects = PickupEffects::new(EffectConfig::default());
        let mut events = Vec::new();

        effects.activate(EffectKind::JumpBoost, 2.0, &mut events);
        effects.activate(EffectKind::JumpBoost, 3.0, &mut events);
        assert_eq!(effects.remaining(EffectKind::JumpBoost), 5.0);
        // non-positive falls back to the default 7 s
        effects.activate(EffectKind::JumpBoost, 0.0, &mut events);
        assert_eq!(effects.remaining(EffectKind::JumpBoost), 12.0);
    }

    #[test]
    fn test_expiry_and_force_stop_emit_once() {
        let mut effects = PickupEffects::new(EffectConfig::default());
        let mut events = Vec::new();
        effects.activate(EffectKind::Magnet, 1.0, &mut events);
        effects.activate(EffectKind::JumpBoost, 10.0, &mut events);
        events.clear();

        effects.tick(0.6, &mut events);
        effects.tick(0.6, &mut events);
        effects.tick(0.6, &mut events);
        assert_eq!(
            events,
            vec![TrackEvent::EffectExpired {
                kind: EffectKind::Magnet,
                forced: false
            }]
        );
        assert!(!effects.is_active(EffectKind::Magnet));

        events.clear();
        effects.force_stop(EffectKind::JumpBoost, &mut events);
        effects.force_stop(EffectKind::JumpBoost, &mut events);
        assert_eq!(events.len(), 1);
        assert_eq!(effects.remaining(EffectKind::JumpBoost), 0.0);
    }

    #[test]
    fn test_band_world_x() {
        let band = MagnetBand::new(MagnetBandConfig::default());
        let aim = Vec3::new(0.0, 1.0, 10.0);
        assert!(band.should_attract(Vec3::new(1.9, 0.5, 40.0), aim, Vec3::Z, Vec3::X));
        assert!(!band.should_attract(Vec3::new(2.1, 0.5, 12.0), aim, Vec3::Z, Vec3::X));
    }

    #[test]
    fn test_band_observer_axes_with_window() {
        let band = MagnetBand::new(MagnetBandConfig {
            axis: BandAxis::ObserverRight,
            use_z_band: true,
            ..MagnetBandConfig::default()
        });
        // observer facing +X: right is -Z
        let (forward, right) = (Vec3::X, -Vec3::Z);
        let aim = Vec3::ZERO;
        assert!(band.should_attract(Vec3::new(5.0, 0.0, 1.5), aim, forward, right));
        assert!(!band.should_attract(Vec3::new(5.0, 0.0, 2.5), aim, forward, right));
        assert!(!band.should_attract(Vec3::new(25.0, 0.0, 0.0), aim, forward, right));
        assert!(!band.should_attract(Vec3::new(-2.0, 0.0, 0.0), aim, forward, right));
        assert!(band.should_attract(Vec3::new(-1.9, 0.0, 0.0), aim, forward, right));
    }

    #[test]
    fn test_inactive_magnet_pulls_nothing() {
        let mut effects = PickupEffects::new(EffectConfig::default());
        let coin = Vec3::new(0.0, 0.0, 5.0);
        assert!(!effects.magnet_pulls(coin, Vec3::ZERO, Vec3::Z, Vec3::X));
        effects.activate(EffectKind::Magnet, 0.0, &mut Vec::new());
        assert!(effects.magnet_pulls(coin, Vec3::ZERO, Vec3::Z, Vec3::X));
    }
}
