//! # Run Loop
//!
//! Fixed-timestep driver for the track generator.
//!
//! ```text
//! advance(real_dt)
//!   └─ while accumulator >= step:
//!        ├─ runner.step(step)           scripted observer moves
//!        ├─ track.tick(host, frame)     recycle, extend, populate
//!        ├─ collect()                   coins and pickups in reach
//!        └─ drain events ──> RunSummary
//! ```
//!
//! The loop owns a [`SandboxHost`] so it can read instance poses back for
//! pickup collection.

use std::time::Instant;

use rushline_core::Pooled;
use rushline_procedural::{
    EffectKind, Frame, InstanceId, SandboxHost, TrackConfig, TrackEvent, TrackGenerator, TrackResult,
};
use rushline_shared::Vec3;

/// Longest real-time slice accepted by [`RunLoop::advance`], in seconds.
pub const MAX_FRAME_SECONDS: f32 = 0.25;

/// Scripted observer tuning.
#[derive(Clone, Debug, PartialEq)]
pub struct RunnerConfig {
    /// Speed at the start of a run, m/s.
    pub start_speed: f32,
    /// Speed cap, m/s.
    pub max_speed: f32,
    /// Speed gained per second.
    pub acceleration: f32,
    /// Seconds between lane changes; zero keeps the start lane.
    pub lane_change_interval: f32,
    /// Half size of the collection box around the runner.
    pub pickup_reach: f32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            start_speed: 12.0,
            max_speed: 28.0,
            acceleration: 0.4,
            lane_change_interval: 1.5,
            pickup_reach: 1.0,
        }
    }
}

/// Run loop tuning.
#[derive(Clone, Debug, PartialEq)]
pub struct RunLoopConfig {
    /// Fixed steps per second.
    pub tick_rate: u32,
    /// Scripted observer.
    pub runner: RunnerConfig,
}

impl Default for RunLoopConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            runner: RunnerConfig::default(),
        }
    }
}

/// An observer that runs straight down the track, sweeping across lanes.
#[derive(Clone, Debug)]
pub struct ScriptedRunner {
    config: RunnerConfig,
    lanes: Vec<f32>,
    start: Vec3,
    position: Vec3,
    speed: f32,
    lane: usize,
    heading_right: bool,
    lane_timer: f32,
    running: bool,
}

impl ScriptedRunner {
    /// Runner at `start`, in the middle lane.
    #[must_use]
    pub fn new(config: RunnerConfig, lanes: Vec<f32>, start: Vec3) -> Self {
        let lane = lanes.len() / 2;
        let mut runner = Self {
            speed: config.start_speed,
            config,
            lanes,
            start,
            position: start,
            lane,
            heading_right: true,
            lane_timer: 0.0,
            running: true,
        };
        runner.position.x = runner.lane_x();
        runner
    }

    /// Moves forward one step and switches lanes when due.
    pub fn step(&mut self, dt: f32) {
        if !self.running {
            return;
        }
        self.speed = (self.speed + self.config.acceleration * dt).min(self.config.max_speed);
        self.position.z += self.speed * dt;

        if self.config.lane_change_interval > 0.0 && self.lanes.len() > 1 {
            self.lane_timer += dt;
            if self.lane_timer >= self.config.lane_change_interval {
                self.lane_timer = 0.0;
                self.change_lane();
            }
        }
        self.position.x = self.lane_x();
    }

    /// Stops in place.
    pub fn stop(&mut self) {
        self.running = false;
        self.speed = 0.0;
    }

    /// Back to the start, at start speed.
    pub fn restart(&mut self) {
        *self = Self::new(self.config.clone(), std::mem::take(&mut self.lanes), self.start);
    }

    /// Current position.
    #[must_use]
    pub const fn position(&self) -> Vec3 {
        self.position
    }

    /// Current speed, m/s.
    #[must_use]
    pub const fn speed(&self) -> f32 {
        self.speed
    }

    /// Current lane index.
    #[must_use]
    pub const fn lane(&self) -> usize {
        self.lane
    }

    /// Is the runner still moving?
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Is `point` inside the collection box?
    #[must_use]
    pub fn reaches(&self, point: Vec3) -> bool {
        let offset = point - self.position;
        offset.x.abs() < self.config.pickup_reach && offset.z.abs() < self.config.pickup_reach
    }

    fn lane_x(&self) -> f32 {
        self.lanes.get(self.lane).copied().unwrap_or(0.0)
    }

    fn change_lane(&mut self) {
        let last = self.lanes.len() - 1;
        if self.heading_right && self.lane == last {
            self.heading_right = false;
        } else if !self.heading_right && self.lane == 0 {
            self.heading_right = true;
        }
        self.lane = if self.heading_right { self.lane + 1 } else { self.lane - 1 };
    }
}

/// Step timing statistics.
#[derive(Clone, Copy, Debug)]
pub struct StepTiming {
    /// Fastest step, in microseconds.
    pub min_step_us: u64,
    /// Slowest step, in microseconds.
    pub max_step_us: u64,
    /// Rolling average, in microseconds.
    pub avg_step_us: u64,
    /// Steps that took longer than the step itself.
    pub late_steps: u64,
    /// Steps measured.
    pub total_steps: u64,
}

impl Default for StepTiming {
    fn default() -> Self {
        Self {
            min_step_us: u64::MAX,
            max_step_us: 0,
            avg_step_us: 0,
            late_steps: 0,
            total_steps: 0,
        }
    }
}

impl StepTiming {
    fn record(&mut self, duration_us: u64, budget_us: u64) {
        self.total_steps += 1;
        self.min_step_us = self.min_step_us.min(duration_us);
        self.max_step_us = self.max_step_us.max(duration_us);
        self.avg_step_us = if self.total_steps == 1 {
            duration_us
        } else {
            (self.avg_step_us * 15 + duration_us) / 16
        };
        if duration_us > budget_us {
            self.late_steps += 1;
        }
    }
}

/// What the runner experienced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Coins collected.
    pub coins: u64,
    /// Pickups collected.
    pub pickups: u64,
    /// Coins collected through the magnet band.
    pub magnet_coins: u64,
    /// `SegmentActivated` events seen.
    pub segments_activated: u64,
    /// `SegmentRecycled` events seen.
    pub segments_recycled: u64,
    /// `EffectActivated` events seen.
    pub effects_started: u64,
    /// `EffectExpired` events seen.
    pub effects_expired: u64,
    /// Runs restarted.
    pub restarts: u64,
}

/// Fixed-step driver owning the generator, the host and the runner.
pub struct RunLoop {
    host: SandboxHost,
    track: TrackGenerator,
    runner: ScriptedRunner,
    step_seconds: f32,
    accumulator: f32,
    elapsed: f32,
    tick_count: u64,
    observer_attached: bool,
    timing: StepTiming,
    summary: RunSummary,
    coins: Vec<(Pooled, bool)>,
    pickups: Vec<Pooled>,
}

impl RunLoop {
    /// Builds the generator against a sandbox scene and lays the first
    /// stretch of track.
    ///
    /// # Errors
    ///
    /// Configuration and coin prewarm errors from the generator.
    pub fn new(config: TrackConfig, loop_config: RunLoopConfig) -> TrackResult<Self> {
        let mut host = SandboxHost::for_config(&config);
        let [x, y, z] = config.sequencer.start_position;
        let runner = ScriptedRunner::new(loop_config.runner, config.lanes_local_x.clone(), Vec3::new(x, y, z));

        let mut track = TrackGenerator::new(config)?;
        track.prewarm_coins(&mut host)?;
        track.build_initial(&mut host, &Frame::at(runner.position(), 0.0, 0.0));

        let mut run = Self {
            host,
            track,
            runner,
            step_seconds: 1.0 / loop_config.tick_rate.max(1) as f32,
            accumulator: 0.0,
            elapsed: 0.0,
            tick_count: 0,
            observer_attached: true,
            timing: StepTiming::default(),
            summary: RunSummary::default(),
            coins: Vec::new(),
            pickups: Vec::new(),
        };
        run.drain_events();
        Ok(run)
    }

    /// Feeds real time into the accumulator and runs every step that is due.
    /// Returns the number of steps run.
    pub fn advance(&mut self, real_seconds: f32) -> usize {
        self.accumulator += real_seconds.clamp(0.0, MAX_FRAME_SECONDS);
        let mut steps = 0;
        while self.accumulator >= self.step_seconds {
            self.accumulator -= self.step_seconds;
            self.step();
            steps += 1;
        }
        steps
    }

    /// Runs `seconds` of simulated time as fast as possible.
    pub fn run_for(&mut self, seconds: f32) -> u64 {
        let steps = (seconds / self.step_seconds).round() as u64;
        for _ in 0..steps {
            self.step();
        }
        steps
    }

    /// Runs exactly one fixed step.
    pub fn step(&mut self) {
        let started = Instant::now();
        let dt = self.step_seconds;
        self.elapsed += dt;
        self.tick_count += 1;

        self.runner.step(dt);
        let frame = if self.observer_attached {
            Frame::at(self.runner.position(), self.elapsed, dt)
        } else {
            Frame::detached(self.elapsed, dt)
        };
        self.track.tick(&mut self.host, &frame);
        if self.observer_attached && self.runner.is_running() {
            self.collect();
        }
        self.drain_events();

        let budget_us = (f64::from(dt) * 1_000_000.0) as u64;
        self.timing.record(started.elapsed().as_micros() as u64, budget_us);
    }

    /// Ends the run: the runner stops and new segments stay empty.
    pub fn end_run(&mut self) {
        self.runner.stop();
        self.track.set_placement_enabled(false);
        tracing::info!(
            "Run ended at z={:.0} after {:.1}s",
            self.runner.position().z,
            self.elapsed
        );
    }

    /// Resets the road and starts a fresh run from the start anchor.
    pub fn restart(&mut self) {
        self.track.reset_road(&mut self.host);
        self.runner.restart();
        self.elapsed = 0.0;
        self.accumulator = 0.0;
        self.track
            .build_initial(&mut self.host, &Frame::at(self.runner.position(), 0.0, 0.0));
        self.summary.restarts += 1;
        self.drain_events();
    }

    /// Hides or shows the observer to the generator.
    pub fn set_observer_attached(&mut self, attached: bool) {
        self.observer_attached = attached;
    }

    /// Destroys every pooled instance and hands back the scene.
    #[must_use]
    pub fn shutdown(mut self) -> SandboxHost {
        self.track.shutdown(&mut self.host);
        self.drain_events();
        self.host
    }

    /// The generator.
    #[must_use]
    pub fn track(&self) -> &TrackGenerator {
        &self.track
    }

    /// The scene.
    #[must_use]
    pub fn host(&self) -> &SandboxHost {
        &self.host
    }

    /// The scripted observer.
    #[must_use]
    pub fn runner(&self) -> &ScriptedRunner {
        &self.runner
    }

    /// Step timing.
    #[must_use]
    pub fn timing(&self) -> &StepTiming {
        &self.timing
    }

    /// Collection and event counters.
    #[must_use]
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Simulated seconds since the run started.
    #[must_use]
    pub const fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Steps run since construction.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    fn position_of(&self, instance: Option<InstanceId>) -> Option<Vec3> {
        instance
            .and_then(|id| self.host.instance(id))
            .filter(|i| i.active)
            .map(|i| i.pose.position)
    }

    fn collect(&mut self) {
        let at = self.runner.position();
        self.coins.clear();
        self.pickups.clear();

        for segment in self.track.active_segments() {
            for &coin in self.track.coins().coins_on(segment.id) {
                let Some(p) = self.position_of(self.track.coins().pools().instance(coin)) else {
                    continue;
                };
                if self.runner.reaches(p) {
                    self.coins.push((coin, false));
                } else if self.track.effects().magnet_pulls(p, at, Vec3::Z, Vec3::X) {
                    self.coins.push((coin, true));
                }
            }
            for pickup in self.track.powerups().pickups_on(segment.id) {
                let hit = self
                    .position_of(self.track.powerups().pools().instance(pickup))
                    .is_some_and(|p| self.runner.reaches(p));
                if hit {
                    self.pickups.push(pickup);
                }
            }
        }

        for &(coin, pulled) in &self.coins {
            if self.track.collect_coin(coin) {
                self.summary.coins += 1;
                self.summary.magnet_coins += u64::from(pulled);
            }
        }
        for &pickup in &self.pickups {
            if let Some(effect) = self.track.collect_powerup(pickup, &mut self.host) {
                tracing::debug!("Picked up {:?} at z={:.0}", effect, at.z);
            }
            self.summary.pickups += 1;
        }
    }

    fn drain_events(&mut self) {
        for event in self.track.drain_events() {
            match event {
                TrackEvent::SegmentActivated { .. } => self.summary.segments_activated += 1,
                TrackEvent::SegmentRecycled { .. } => self.summary.segments_recycled += 1,
                TrackEvent::EffectActivated { .. } => self.summary.effects_started += 1,
                TrackEvent::EffectExpired { kind, forced } => {
                    self.summary.effects_expired += 1;
                    if kind == EffectKind::Magnet && !forced {
                        tracing::trace!("Magnet wore off");
                    }
                }
            }
        }
    }
}
