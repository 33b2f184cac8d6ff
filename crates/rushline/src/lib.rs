//! # RUSHLINE
//!
//! Drives the procedural track with a fixed-step loop.
//!
//! ```text
//! ┌──────────────┐  Frame   ┌──────────────────┐  &mut dyn TrackHost  ┌─────────────┐
//! │ RunLoop      │─────────>│ TrackGenerator   │─────────────────────>│ SandboxHost │
//! │  └ Scripted  │<─────────│  (procedural)    │                      │             │
//! │    Runner    │  events  └──────────────────┘                      └─────────────┘
//! └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - `run_loop`: fixed-step orchestration, scripted observer, timing

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod run_loop;

pub use rushline_procedural as procedural;

pub use run_loop::{RunLoop, RunLoopConfig, RunSummary, RunnerConfig, ScriptedRunner, StepTiming};
