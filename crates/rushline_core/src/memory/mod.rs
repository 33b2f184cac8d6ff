//! # Memory Management
//!
//! Object pools for zero-churn spawning.
//!
//! ## Design Philosophy
//!
//! Instances are constructed once and recycled. During a run:
//! - No instance destruction
//! - No construction after the pool has grown to its working set
//! - Predictable, flat latency

mod pool;
mod registry;

pub use pool::{ObjectPool, PoolHandle, PoolHooks};
pub use registry::{PoolRegistry, Pooled, TemplateId};
