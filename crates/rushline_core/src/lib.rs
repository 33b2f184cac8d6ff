//! # RUSHLINE Core
//!
//! Object pooling for spawnable track content designed for:
//! - Steady-state steps with zero allocations
//! - Bounded growth per template
//! - Handles that can never alias a recycled slot
//!
//! ## Architecture Rules
//!
//! 1. **Construct once, reuse forever** - instances are created on prewarm or
//!    on demand and only destroyed on explicit shutdown
//! 2. **Hooks, not callbacks** - activation side effects are supplied by the
//!    caller per call, so the pool never owns the host
//! 3. **Generations** - every release bumps the slot's generation
//!
//! ## Example
//!
//! ```rust,ignore
//! use rushline_core::{ObjectPool, PoolHooks};
//!
//! let mut pool: ObjectPool<u64> = ObjectPool::new(32);
//! pool.prewarm(8, &mut hooks)?;
//! let handle = pool.acquire(&mut hooks)?;
//! pool.release(handle, &mut hooks)?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod memory;

pub use error::PoolError;
pub use memory::{ObjectPool, PoolHandle, PoolHooks, PoolRegistry, Pooled, TemplateId};
