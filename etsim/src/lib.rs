//! # ETSIM - Execution Trace SIMulation
//!
//! Replays per-device execution traces of distributed training jobs against
//! a discrete-event simulation kernel and reports where the time went.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use etsim::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let config = EngineConfig::from_file("engine.yaml")?;
//!     let graph = TraceGraph::load_for_system("traces/llm", config.sys_id)?;
//!     let mut workload = Workload::new(config, graph)?;
//!     let mut kernel = AnalyticalKernel::new(AnalyticalConfig::default())?;
//!     run_to_completion(&mut workload, &mut kernel)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Dependency-driven issue** with per-class resource admission
//! - **Replay or roofline** compute costing
//! - **Collective and point-to-point** communication requests
//! - **Busy time, utilization and memory liveness** statistics

// Re-export core components
pub use etsim_core::{self, *};

/// The ETSIM prelude - everything you need to replay a trace
pub mod prelude {
    pub use etsim_core::prelude::*;

    pub type Result<T> = EtsimResult<T>;

    // Common traits
    pub use serde::{Deserialize, Serialize};
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get ETSIM version
pub fn version() -> &'static str {
    VERSION
}
