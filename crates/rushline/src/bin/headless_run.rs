//! # RUSHLINE Headless Run
//!
//! Soak runner: drives the track generator for a fixed amount of simulated
//! time against the in-memory scene and prints what happened.
//!
//! ```bash
//! headless_run --config data/track.toml --seconds 600 --seed 7
//! RUST_LOG=rushline_procedural=debug headless_run
//! ```
//!
//! Every `--restart-every` seconds the run is ended and restarted, which
//! exercises the full reset path.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use rushline::procedural::TrackConfig;
use rushline::{RunLoop, RunLoopConfig};
use tracing_subscriber::EnvFilter;

/// Parsed command line.
struct Args {
    config: Option<PathBuf>,
    seconds: f32,
    seed: Option<u64>,
    restart_every: Option<f32>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        config: None,
        seconds: 300.0,
        seed: None,
        restart_every: None,
    };

    let mut it = std::env::args().skip(1);
    while let Some(flag) = it.next() {
        let mut value = || it.next().ok_or_else(|| format!("{flag} needs a value"));
        match flag.as_str() {
            "--config" => args.config = Some(PathBuf::from(value()?)),
            "--seconds" => args.seconds = value()?.parse().map_err(|e| format!("--seconds: {e}"))?,
            "--seed" => args.seed = Some(value()?.parse().map_err(|e| format!("--seed: {e}"))?),
            "--restart-every" => {
                args.restart_every = Some(value()?.parse().map_err(|e| format!("--restart-every: {e}"))?);
            }
            other => return Err(format!("unknown argument {other}")),
        }
    }
    Ok(args)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("✗ {e}");
            eprintln!("  usage: headless_run [--config PATH] [--seconds N] [--seed N] [--restart-every N]");
            return ExitCode::FAILURE;
        }
    };

    let mut config = match &args.config {
        Some(path) => match TrackConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("✗ FATAL: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => TrackConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    println!("═══════════════════════════════════════════════════════════════════");
    println!("                    RUSHLINE HEADLESS RUN");
    println!("═══════════════════════════════════════════════════════════════════");
    println!();
    println!("  Seed:       {}", config.seed);
    println!("  Variants:   {}", config.variants.len());
    println!("  Lanes:      {:?}", config.lanes_local_x);
    println!("  Simulated:  {:.0}s", args.seconds);
    println!();

    let mut run = match RunLoop::new(config, RunLoopConfig::default()) {
        Ok(run) => run,
        Err(e) => {
            eprintln!("✗ FATAL: {e}");
            return ExitCode::FAILURE;
        }
    };

    let started = Instant::now();
    let mut simulated = 0.0f32;
    let mut since_restart = 0.0f32;
    while simulated < args.seconds {
        let slice = (args.seconds - simulated).min(1.0);
        run.run_for(slice);
        simulated += slice;
        since_restart += slice;

        if args.restart_every.is_some_and(|every| since_restart >= every) {
            run.end_run();
            run.run_for(2.0);
            run.restart();
            since_restart = 0.0;
        }
    }
    let wall = started.elapsed();

    let stats = run.track().stats();
    let summary = *run.summary();
    let timing = *run.timing();
    let distance = run.runner().position().z;
    let conserved = run.track().pools_conserved();

    println!("┌─ TRACK ───────────────────────────────────────────────────────────┐");
    for line in stats.to_string().lines() {
        println!("│ {line}");
    }
    println!("└───────────────────────────────────────────────────────────────────┘");
    println!();
    println!("┌─ RUNNER ──────────────────────────────────────────────────────────┐");
    println!("│ Distance:           {distance:.0} m (this run)");
    println!("│ Coins:              {} ({} by magnet)", summary.coins, summary.magnet_coins);
    println!("│ Pickups:            {}", summary.pickups);
    println!("│ Effects:            {} started, {} expired", summary.effects_started, summary.effects_expired);
    println!("│ Restarts:           {}", summary.restarts);
    println!("└───────────────────────────────────────────────────────────────────┘");
    println!();
    println!("┌─ TIMING ──────────────────────────────────────────────────────────┐");
    println!("│ Steps:              {}", timing.total_steps);
    println!("│ Average step:       {} µs", timing.avg_step_us);
    println!("│ Min / max step:     {} / {} µs", timing.min_step_us, timing.max_step_us);
    println!("│ Late steps:         {}", timing.late_steps);
    println!("│ Wall time:          {:.2}s", wall.as_secs_f64());
    println!("└───────────────────────────────────────────────────────────────────┘");

    let host = run.shutdown();
    let leaked = host.instantiated() - host.destroyed();
    println!();
    if conserved && leaked == 0 {
        println!("✓ Pools balanced, {} instances built and destroyed", host.destroyed());
        ExitCode::SUCCESS
    } else {
        println!("✗ Pools unbalanced (conserved={conserved}, leaked={leaked})");
        ExitCode::FAILURE
    }
}
