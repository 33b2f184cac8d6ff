//! # RUSHLINE Shared
//!
//! Math types used by the pool, the track generator and the host adapters.
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER depend on a host engine, a renderer or a random
//! source. Track space is right-handed with +Y up and +Z as the default
//! forward direction of travel.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod math;

pub use math::{Pose, Quat, Vec3};
