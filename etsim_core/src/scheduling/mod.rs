//! # ETSIM Scheduling
//!
//! Everything between "a node became ready" and "its statistics are final":
//!
//! - **ResourceTracker**: per-class in-flight counters gating issuance
//! - **Validation**: per-node attribute checks producing a `DispatchPlan`
//! - **Workload**: the drain loop, dispatch and completion handling
//! - **Statistics**: per-node timing records and end-of-run aggregation
//! - **Roofline**: compute cost model derived from operation intensity
//!
//! ## Usage
//!
//! ```rust,ignore
//! use etsim_core::scheduling::Workload;
//!
//! let mut workload = Workload::new(config, graph)?;
//! workload.fire(&mut kernel)?;             // first drain
//! workload.call(event, &mut kernel)?;      // for every completion
//! if workload.is_finished() {
//!     let report = workload.report();
//! }
//! ```
//!
//! ## Resource Classes
//!
//! - **cpu_comp_ops**: CPU compute
//! - **gpu_comp_ops**: GPU compute
//! - **comm_ops**: collectives and sends
//! - **mem_ops**: remote memory loads and stores
//!
//! Receives and invalid nodes never occupy a slot.

pub mod completion;
pub mod resources;
pub mod roofline;
pub mod statistics;
pub mod validation;
pub mod workload;

pub use completion::{CollectiveCompletionMap, InFlightArena};
pub use resources::{ResourceCapacity, ResourceClass, ResourceTracker};
pub use roofline::{RooflineConfig, RooflineEstimate};
pub use statistics::{
    calculate_total_runtime, MemoryReport, OperatorStatistics, OperatorType, Statistics,
    StatisticsReport, Utilizations,
};
pub use validation::{find_invalid_nodes, plan_dispatch, validate_node, DispatchPlan};
pub use workload::Workload;
