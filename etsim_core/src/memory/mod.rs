//! # Local memory accounting for ETSIM
//!
//! Tensor reads and writes are attributed to the interval of the node that
//! performed them. After the run the tracker sweeps allocation and free
//! points to rebuild a usage timeline, from which peak and average usage are
//! taken.
//!
//! A read of a tensor that was never written is treated as if the tensor
//! existed from tick 0. The synthesized write carries no node
//! ([`MemActivity::is_synthesized`]) so it can be told apart from real ones.

pub mod usage_tracker;

pub use usage_tracker::{MemActivity, MemorySample, MemoryTimeline, MemoryUsageTracker};
