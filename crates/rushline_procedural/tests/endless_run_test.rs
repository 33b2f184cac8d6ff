//! # Endless Run Integration Test
//!
//! A scripted runner holds the middle lane for several kilometres, picking
//! up every coin and pickup it passes. Verifies:
//! - the active window never grows or shrinks
//! - every pool stays balanced and nothing leaks into the scene
//! - the same seed replays the same run
//! - shutdown destroys every instance ever built

use rushline_core::Pooled;
use rushline_procedural::{EffectKind, Frame, InstanceId, SandboxHost, TrackConfig, TrackEvent, TrackGenerator};
use rushline_shared::Vec3;

const SPEED: f32 = 24.0;
const DT: f32 = 1.0 / 60.0;
const REACH: f32 = 1.0;

struct Run {
    host: SandboxHost,
    track: TrackGenerator,
    observer: Vec3,
    elapsed: f32,
    activated: u64,
    recycled: u64,
    effects_started: u64,
    effects_expired: u64,
    variants: Vec<usize>,
}

impl Run {
    fn new(seed: u64) -> Self {
        let mut config = TrackConfig::default();
        config.seed = seed;
        let mut host = SandboxHost::for_config(&config);
        let mut track = TrackGenerator::new(config).unwrap();
        track.prewarm_coins(&mut host).unwrap();
        track.build_initial(&mut host, &Frame::at(Vec3::ZERO, 0.0, 0.0));

        let mut run = Self {
            host,
            track,
            observer: Vec3::ZERO,
            elapsed: 0.0,
            activated: 0,
            recycled: 0,
            effects_started: 0,
            effects_expired: 0,
            variants: Vec::new(),
        };
        run.drain();
        run
    }

    fn step(&mut self, collect: bool) {
        self.elapsed += DT;
        self.observer.z += SPEED * DT;
        self.track.tick(&mut self.host, &Frame::at(self.observer, self.elapsed, DT));
        if collect {
            self.collect_nearby();
        }
        self.drain();
    }

    fn near(&self, instance: Option<InstanceId>) -> bool {
        instance.and_then(|id| self.host.instance(id)).is_some_and(|i| {
            let offset = i.pose.position - self.observer;
            offset.x.abs() < REACH && offset.z.abs() < REACH
        })
    }

    fn collect_nearby(&mut self) {
        let segments: Vec<_> = self.track.active_segments().map(|s| s.id).collect();

        let mut coins: Vec<Pooled> = Vec::new();
        let mut pickups: Vec<Pooled> = Vec::new();
        for id in &segments {
            for coin in self.track.coins().coins_on(*id) {
                if self.near(self.track.coins().pools().instance(*coin)) {
                    coins.push(*coin);
                }
            }
            for pickup in self.track.powerups().pickups_on(*id) {
                if self.near(self.track.powerups().pools().instance(pickup)) {
                    pickups.push(pickup);
                }
            }
        }

        for coin in coins {
            self.track.collect_coin(coin);
        }
        for pickup in pickups {
            self.track.collect_powerup(pickup, &mut self.host);
        }
    }

    fn drain(&mut self) {
        for event in self.track.drain_events() {
            match event {
                TrackEvent::SegmentActivated { variant, .. } => {
                    self.activated += 1;
                    self.variants.push(variant);
                }
                TrackEvent::SegmentRecycled { .. } => self.recycled += 1,
                TrackEvent::EffectActivated { .. } => self.effects_started += 1,
                TrackEvent::EffectExpired { .. } => self.effects_expired += 1,
            }
        }
    }

    fn live_instances(&self) -> usize {
        self.track.sequencer().segment_pool().pools().total_live()
            + self.track.placement().pools().total_live()
            + self.track.coins().pools().total_live()
            + self.track.powerups().pools().total_live()
    }
}

/// Test: five minutes of running keeps the window and the pools balanced.
#[test]
fn test_five_minute_run_stays_balanced() {
    let mut run = Run::new(0x5eed);
    let window = run.track.config().sequencer.initial_segments;

    for frame in 0..(300.0 / DT) as usize {
        run.step(true);

        assert_eq!(run.track.active_segments().count(), window, "frame {frame}");
        assert_eq!(run.activated - run.recycled, window as u64);
        if frame % 600 == 0 {
            assert!(run.track.pools_conserved());
            assert_eq!(run.host.active_count(), run.live_instances());
        }
    }

    let stats = run.track.stats();
    println!("=== Endless Run ({:.0} m) ===", run.observer.z);
    println!("{stats}");
    println!("Effects: {} started, {} expired", run.effects_started, run.effects_expired);

    assert_eq!(stats.segments_activated, run.activated);
    assert_eq!(stats.segments_recycled, run.recycled);
    assert!(stats.coins.collected > 0, "the runner never touched a coin");
    assert!(stats.coins.returned > 0);
    assert_eq!(stats.observer_lost, 0);
    assert!(run.effects_expired <= run.effects_started);
    assert!(run.track.pools_conserved());
}

/// Test: instance count plateaus once the pools are warm.
#[test]
fn test_instances_plateau() {
    let mut run = Run::new(21);
    for _ in 0..(60.0 / DT) as usize {
        run.step(false);
    }
    let warm = run.host.instance_count();

    for _ in 0..(240.0 / DT) as usize {
        run.step(false);
    }
    let later = run.host.instance_count();
    println!("Instances: {warm} after 1 min, {later} after 5 min");

    // late peaks are fine, steady growth is not
    assert!(later < warm * 2, "{warm} -> {later}");
}

/// Test: the same seed and the same path replay the same track.
#[test]
fn test_replay_is_deterministic() {
    let play = |seed| {
        let mut run = Run::new(seed);
        for _ in 0..(90.0 / DT) as usize {
            run.step(false);
        }
        (run.track.stats(), run.variants)
    };

    let (stats_a, variants_a) = play(77);
    let (stats_b, variants_b) = play(77);
    assert_eq!(stats_a, stats_b);
    assert_eq!(variants_a, variants_b);

    let (_, variants_c) = play(78);
    assert_ne!(variants_a, variants_c);
}

/// Test: a reset in the middle of a run starts a clean track.
#[test]
fn test_reset_mid_run() {
    let mut run = Run::new(9);
    for _ in 0..(20.0 / DT) as usize {
        run.step(true);
    }
    run.track.reset_road(&mut run.host);
    run.drain();
    assert_eq!(run.track.active_segments().count(), 0);
    assert_eq!(run.host.active_count(), 0);
    for kind in EffectKind::ALL {
        assert!(!run.track.effects().is_active(kind));
    }

    run.observer = Vec3::ZERO;
    run.track.build_initial(&mut run.host, &Frame::at(Vec3::ZERO, run.elapsed, 0.0));
    let first = run.track.active_segments().next().unwrap();
    assert_eq!(first.spawn_index, 0);
    assert!(first.start.position.distance(Vec3::ZERO) < 1e-4);
}

/// Test: shutdown destroys every instance the run ever built.
#[test]
fn test_shutdown_destroys_everything() {
    let mut run = Run::new(4);
    for _ in 0..(45.0 / DT) as usize {
        run.step(true);
    }
    run.track.shutdown(&mut run.host);

    assert_eq!(run.host.instance_count(), 0);
    assert_eq!(run.host.instantiated(), run.host.destroyed());
    println!("Built and destroyed {} instances", run.host.destroyed());
}
