//! Background Tasks Module
//!
//! Contains background tasks that run for the lifetime of a cache instance.
//!
//! # Tasks
//! - TTL Sweep: Removes expired fast-tier entries at the configured interval

mod sweep;

pub use sweep::spawn_sweep_task;
