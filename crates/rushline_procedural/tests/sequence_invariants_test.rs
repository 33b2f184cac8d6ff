//! # Sequence Invariants
//!
//! Long selection runs checked against the adjacency, spacing and streak
//! rules, plus a streamed run against the sandbox host.

use rushline_procedural::{
    Frame, LaneSocket, NoopListener, SandboxHost, SelectionLevel, SequencerConfig, TrackConfig, TrackSequencer,
    TrackVariantCatalog, VariantConfig,
};
use rushline_procedural::config::PoolConfig;
use rushline_shared::Vec3;

fn variant(id: &str, weight: f32, max_consecutive: u32, min_spacing: u32, disallow: &[&str]) -> VariantConfig {
    VariantConfig {
        id: id.into(),
        template: Some(format!("road_{}", id.to_lowercase())),
        weight,
        max_consecutive,
        min_spacing,
        disallow_next: disallow.iter().map(|s| (*s).to_string()).collect(),
        ..VariantConfig::default()
    }
}

fn catalog() -> Vec<VariantConfig> {
    vec![
        variant("Straight", 3.0, 2, 0, &[]),
        variant("Tunnel", 1.0, 1, 3, &["Tunnel"]),
        variant("Bridge", 2.0, 1, 1, &["Tunnel"]),
    ]
}

fn sequencer(seed: u64) -> TrackSequencer {
    let catalog = TrackVariantCatalog::from_config(&catalog(), "Straight", &[LaneSocket::at(0.0)]);
    TrackSequencer::new(catalog, SequencerConfig::default(), &PoolConfig::default(), seed)
}

/// Test: runs never exceed `max_consecutive` unless the pick was forced.
#[test]
fn test_run_limit_holds_outside_forced_picks() {
    let mut seq = sequencer(42);
    let mut last = None;
    let mut run = 0u32;
    let mut forced_overruns = 0;

    for _ in 0..5_000 {
        let (index, level) = seq.select_next().unwrap();
        run = if last == Some(index) { run + 1 } else { 1 };
        last = Some(index);

        let limit = seq.catalog().get(index).unwrap().max_consecutive;
        if run > limit {
            assert_eq!(level, SelectionLevel::Forced, "run of {run} for variant {index} at {level:?}");
            forced_overruns += 1;
        }
    }
    println!("Forced overruns: {forced_overruns}");
}

/// Test: repeated ids are separated by `min_spacing` unless spacing was relaxed.
#[test]
fn test_min_spacing_holds_below_ignore_spacing() {
    let mut seq = sequencer(7);
    let mut last_seen: Vec<Option<usize>> = vec![None; 3];

    for pick in 0..5_000 {
        let (index, level) = seq.select_next().unwrap();
        if let Some(previous) = last_seen[index] {
            let between = (pick - previous - 1) as u32;
            let min_spacing = seq.catalog().get(index).unwrap().min_spacing;
            if between < min_spacing {
                assert!(level >= SelectionLevel::IgnoreSpacing, "spacing {between} at {level:?}");
            }
        }
        last_seen[index] = Some(pick);
    }
}

/// Test: no non-default variant before the default streak reaches the gate.
#[test]
fn test_streak_gate_holds_at_every_level() {
    let mut seq = sequencer(3);
    let gate = SequencerConfig::default().streak_gate;

    for _ in 0..5_000 {
        let streak_before = seq.selection().straight_streak;
        let (index, _) = seq.select_next().unwrap();
        if index != 0 {
            assert!(streak_before >= gate, "variant {index} after a streak of {streak_before}");
        }
    }
}

/// Test: disallowed successors only appear once the rule was relaxed.
#[test]
fn test_disallow_next_holds_at_strict() {
    let mut seq = sequencer(11);
    let mut previous: Option<usize> = None;

    for _ in 0..5_000 {
        let (index, level) = seq.select_next().unwrap();
        if let Some(prev) = previous {
            let banned = seq.catalog().get(prev).unwrap().disallow_next.contains(&index);
            if banned {
                assert!(level >= SelectionLevel::IgnoreDisallow);
            }
        }
        previous = Some(index);
    }
}

/// Test: the same seed replays the same sequence.
#[test]
fn test_selection_is_deterministic() {
    let picks = |seed| {
        let mut seq = sequencer(seed);
        (0..500).map(|_| seq.select_next().unwrap().0).collect::<Vec<_>>()
    };
    assert_eq!(picks(99), picks(99));
    assert_ne!(picks(99), picks(100));
}

/// Test: streaming 3 km keeps a constant, gapless chain and balanced pools.
#[test]
fn test_streamed_chain_stays_gapless() {
    let config = TrackConfig::default();
    let mut host = SandboxHost::for_config(&config);
    let catalog = TrackVariantCatalog::from_config(
        &config.variants,
        &config.sequencer.default_variant,
        &config.global_lanes(),
    );
    let mut seq = TrackSequencer::new(catalog, config.sequencer.clone(), &config.pools, config.seed);
    let mut listener = NoopListener;

    let built = seq.build_initial(10, &mut host, &mut listener, &Frame::at(Vec3::ZERO, 0.0, 0.0));
    assert_eq!(built, 10);

    let mut recycled = 0;
    for step in 1..=3_000 {
        let observer = Vec3::new(0.0, 0.0, step as f32);
        recycled += seq.tick(&mut host, &mut listener, &Frame::at(observer, step as f32 * 0.05, 0.05));

        assert_eq!(seq.active().len(), 10);
        for pair in seq.active().iter().collect::<Vec<_>>().windows(2) {
            let gap = pair[0].end.position.distance(pair[1].start.position);
            assert!(gap < 1e-3, "gap of {gap} at step {step}");
        }
        let head = seq.active().front().unwrap();
        assert!(!head.is_passed_by(observer, config.sequencer.recycle_buffer));
    }

    assert!(recycled >= 95, "only {recycled} recycled");
    assert_eq!(seq.spawned(), 10 + recycled as u64);
    let pools = seq.segment_pool().pools();
    assert!(pools.is_conserved());
    assert_eq!(pools.total_live(), 10);
    assert_eq!(host.active_count(), 10);
}

/// Test: a reset returns every segment and restarts the numbering.
#[test]
fn test_reset_road_recycles_all() {
    let config = TrackConfig::default();
    let mut host = SandboxHost::for_config(&config);
    let catalog = TrackVariantCatalog::from_config(
        &config.variants,
        &config.sequencer.default_variant,
        &config.global_lanes(),
    );
    let mut seq = TrackSequencer::new(catalog, config.sequencer.clone(), &config.pools, 1);
    let mut listener = NoopListener;
    seq.build_initial(10, &mut host, &mut listener, &Frame::detached(0.0, 0.0));

    seq.reset_road(&mut host, &mut listener);
    assert!(seq.active().is_empty());
    assert_eq!(seq.spawned(), 0);
    assert_eq!(host.active_count(), 0);

    seq.build_initial(4, &mut host, &mut listener, &Frame::detached(0.0, 0.0));
    let first = seq.active().front().unwrap();
    assert_eq!(first.spawn_index, 0);
    assert!(first.start.position.distance(seq.start_anchor().position) < 1e-4);
}

/// Test: a teleport far ahead is absorbed a few segments per tick.
#[test]
fn test_teleport_is_capped_per_tick() {
    let config = TrackConfig::default();
    let cap = config.sequencer.max_recycles_per_tick;
    let mut host = SandboxHost::for_config(&config);
    let catalog = TrackVariantCatalog::from_config(
        &config.variants,
        &config.sequencer.default_variant,
        &config.global_lanes(),
    );
    let mut seq = TrackSequencer::new(catalog, config.sequencer.clone(), &config.pools, 5);
    let mut listener = NoopListener;
    seq.build_initial(10, &mut host, &mut listener, &Frame::at(Vec3::ZERO, 0.0, 0.0));

    let observer = Vec3::new(0.0, 0.0, 600.0);
    let mut ticks = 0;
    let mut total = 0;
    loop {
        let recycled = seq.tick(&mut host, &mut listener, &Frame::at(observer, 1.0, 0.05));
        ticks += 1;
        assert!(recycled <= cap, "{recycled} recycled in one tick");
        if ticks == 1 {
            assert_eq!(recycled, cap);
        }

        assert_eq!(seq.active().len(), 10);
        for pair in seq.active().iter().collect::<Vec<_>>().windows(2) {
            assert!(pair[0].end.position.distance(pair[1].start.position) < 1e-3);
        }

        total += recycled;
        if recycled == 0 {
            break;
        }
        assert!(ticks < 50, "teleport never caught up");
    }

    assert!(ticks > 2, "caught up in {ticks} ticks");
    assert!(!seq.active().front().unwrap().is_passed_by(observer, config.sequencer.recycle_buffer));
    assert_eq!(seq.spawned(), 10 + total as u64);
    assert!(seq.segment_pool().pools().is_conserved());
}
