//! # ETSIM Core
//!
//! Execution-trace replay engine for distributed training simulation.
//!
//! A per-device dependency trace is replayed against a discrete-event
//! simulation kernel. The engine decides what runs when; the kernel decides
//! how long it takes. This crate provides:
//!
//! - **Core**: trace nodes and the dependency-graph adapter
//! - **Communication**: point-to-point and collective requests
//! - **Scheduling**: resource admission, dispatch, completion handling and
//!   statistics
//! - **Memory**: tensor liveness and local memory usage over time
//! - **Sim**: a reference analytical kernel to drive the engine
//!
//! ## Quick Start
//!
//! ```rust
//! use etsim_core::prelude::*;
//!
//! let graph = TraceGraph::from_json_str(
//!     r#"[{"id": 0, "type": "COMP_NODE", "runtime": 4},
//!         {"id": 1, "type": "COMP_NODE", "runtime": 2, "data_deps": [0]}]"#,
//! )
//! .unwrap();
//! let mut workload = Workload::new(EngineConfig::standard(), graph).unwrap();
//! let mut kernel = AnalyticalKernel::new(AnalyticalConfig::default()).unwrap();
//!
//! let cycles = run_to_completion(&mut workload, &mut kernel).unwrap();
//! assert_eq!(cycles, 6000);
//! ```

pub mod backend;
pub mod communication;
pub mod config;
pub mod core;
pub mod error;
pub mod memory;
pub mod scheduling;
pub mod sim;

// Re-export commonly used types for easy access
pub use backend::{CollectiveHandle, CompletionEvent, CompletionToken, SimKernel, Tick};
pub use config::{EngineConfig, ValidationMode};
pub use crate::core::{DependencyGraph, NodeClass, NodeId, NodeType, TraceGraph, TraceNode};
pub use error::{EtsimError, EtsimResult};
pub use scheduling::{Statistics, StatisticsReport, Workload};

/// Everything needed to load a trace and replay it
pub mod prelude {
    pub use crate::backend::{CompletionEvent, SimKernel, Tick};
    pub use crate::communication::{CollectiveKind, CommunicatorGroup};
    pub use crate::config::{EngineConfig, ValidationMode};
    pub use crate::core::{DependencyGraph, NodeAttrs, NodeType, TraceGraph, TraceNode};
    pub use crate::error::{EtsimError, EtsimResult};
    pub use crate::scheduling::{
        OperatorType, ResourceCapacity, RooflineConfig, StatisticsReport, Workload,
    };
    pub use crate::sim::{run_to_completion, AnalyticalConfig, AnalyticalKernel};
}
