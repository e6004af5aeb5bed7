//! # Core trace types for ETSIM
//!
//! - **TraceNode**: one operation of a per-device execution trace
//! - **NodeClass**: the classification every other module consumes
//! - **DependencyGraph**: the adapter the engine pulls ready nodes from
//! - **TraceGraph**: in-memory adapter loaded from a JSON trace
//!
//! ## Node Lifecycle
//!
//! 1. **Pending** - waiting on parents
//! 2. **Ready** - reported by `next_ready_node()`
//! 3. **Blocked** - ready but its resource is busy; pushed back
//! 4. **InFlight** - resource occupied, completion registered with the kernel
//! 5. **Completed** - resource released, dependents freed, node removed

pub mod graph;
pub mod node;

pub use graph::{DependencyGraph, TraceGraph};
pub use node::{parse_tensor_list, NodeAttrs, NodeClass, NodeId, NodeType, TensorIo, TraceNode};
