//! Per-node validation
//!
//! Every node is checked for the attributes its class needs under the active
//! cost model, and turned into a [`DispatchPlan`] in the same pass. The
//! engine acts on the plan only; it never re-reads raw attributes.

use crate::backend::Tick;
use crate::communication::{CollectiveKind, CommRequest};
use crate::config::EngineConfig;
use crate::core::{DependencyGraph, NodeClass, NodeId, TraceNode};
use crate::error::{EtsimError, EtsimResult};

/// What issuing a node amounts to
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchPlan {
    /// Advance by the recorded duration
    Replay { duration: Tick },
    /// Roofline-costed CPU compute over `io_size` touched bytes
    Roofline { num_ops: u64, io_size: u64 },
    RemoteMem { size: u64 },
    Collective {
        kind: CollectiveKind,
        size: u64,
        involved_dims: Vec<bool>,
        priority: u32,
    },
    /// Collective with no primitive; replays its recorded duration
    TimedCollective { duration: Tick },
    Send(CommRequest),
    Recv(CommRequest),
    /// Nothing to simulate
    Skip,
}

fn require<T: Copy>(node: &TraceNode, value: Option<T>, attribute: &'static str) -> EtsimResult<T> {
    value.ok_or(EtsimError::MissingAttribute {
        node: node.id,
        attribute,
    })
}

fn require_nonzero(node: &TraceNode, value: Option<u64>, attribute: &'static str) -> EtsimResult<u64> {
    match require(node, value, attribute)? {
        0 => Err(EtsimError::validation(
            node.id,
            format!("'{}' must be non-zero", attribute),
        )),
        v => Ok(v),
    }
}

fn replay(node: &TraceNode, config: &EngineConfig) -> EtsimResult<DispatchPlan> {
    let runtime = require(node, node.attrs.runtime, "runtime")?;
    Ok(DispatchPlan::Replay {
        duration: config.replay_ticks(runtime),
    })
}

/// Bytes a compute node touches: its own tensor plus every data parent's
fn io_size<G: DependencyGraph>(node: &TraceNode, graph: &G) -> EtsimResult<u64> {
    let mut total = node.tensor_size();
    for parent in &node.data_deps {
        total += graph
            .tensor_size_of(*parent)
            .ok_or(EtsimError::UnknownNode(*parent))?;
    }
    Ok(total)
}

/// Validate `node` and derive its dispatch plan
pub fn plan_dispatch<G: DependencyGraph>(
    node: &TraceNode,
    class: NodeClass,
    graph: &G,
    config: &EngineConfig,
) -> EtsimResult<DispatchPlan> {
    if class == NodeClass::Invalid {
        return Ok(DispatchPlan::Skip);
    }
    if config.replay_only {
        return replay(node, config);
    }

    match class {
        NodeClass::MemLoad | NodeClass::MemStore => {
            if node.attrs.tensor_loc.is_none() {
                return Err(EtsimError::MissingAttribute {
                    node: node.id,
                    attribute: "tensor_loc",
                });
            }
            let size = require_nonzero(node, node.attrs.tensor_size, "tensor_size")?;
            Ok(DispatchPlan::RemoteMem { size })
        }
        NodeClass::CpuCompute if config.roofline_enabled() => {
            let num_ops = require_nonzero(node, node.attrs.num_ops, "num_ops")?;
            require(node, node.attrs.tensor_size, "tensor_size")?;
            let io_size = io_size(node, graph)?;
            if io_size == 0 {
                return Err(EtsimError::validation(
                    node.id,
                    "roofline needs a non-zero touched tensor size",
                ));
            }
            Ok(DispatchPlan::Roofline { num_ops, io_size })
        }
        NodeClass::GpuCompute if config.roofline_enabled() => Err(EtsimError::Unsupported(
            format!(
                "node {}: roofline model for gpu is not implemented, change type to cpu",
                node.id
            ),
        )),
        NodeClass::CpuCompute | NodeClass::GpuCompute => replay(node, config),
        NodeClass::Collective => {
            let kind = require(node, node.attrs.comm_type, "comm_type")?;
            let size = require(node, node.attrs.comm_size, "comm_size")?;
            if !kind.is_supported() {
                return Err(EtsimError::UnsupportedCollective {
                    node: node.id,
                    kind: kind.to_string(),
                });
            }
            if kind.has_primitive() {
                let involved_dims = node
                    .attrs
                    .involved_dim
                    .clone()
                    .unwrap_or_else(|| vec![true; config.network_dims]);
                Ok(DispatchPlan::Collective {
                    kind,
                    size,
                    involved_dims,
                    priority: node.attrs.comm_priority.unwrap_or(0),
                })
            } else {
                Ok(DispatchPlan::TimedCollective {
                    duration: config.replay_ticks(node.attrs.runtime.unwrap_or(0)),
                })
            }
        }
        NodeClass::Send => {
            let dst = require(node, node.attrs.comm_dst, "comm_dst")?;
            let size = require(node, node.attrs.comm_size, "comm_size")?;
            let src = node.attrs.comm_src.unwrap_or(config.sys_id);
            let tag = node.attrs.comm_tag.unwrap_or(0);
            Ok(DispatchPlan::Send(CommRequest::new(node.id, src, dst, size, tag)))
        }
        NodeClass::Recv => {
            let src = require(node, node.attrs.comm_src, "comm_src")?;
            let size = require(node, node.attrs.comm_size, "comm_size")?;
            let dst = node.attrs.comm_dst.unwrap_or(config.sys_id);
            let tag = node.attrs.comm_tag.unwrap_or(0);
            Ok(DispatchPlan::Recv(CommRequest::new(node.id, src, dst, size, tag)))
        }
        NodeClass::Invalid => Ok(DispatchPlan::Skip),
    }
}

/// Shorthand used by callers that only care whether a node is well formed
pub fn validate_node<G: DependencyGraph>(
    node: &TraceNode,
    graph: &G,
    config: &EngineConfig,
) -> EtsimResult<()> {
    plan_dispatch(node, node.class(), graph, config).map(|_| ())
}

/// Ids of nodes that fail validation, with the reason, in iteration order
///
/// Embedders can run this over a freshly loaded trace to report every bad
/// node up front instead of stopping at the first one during replay.
pub fn find_invalid_nodes<'a, G, I>(nodes: I, graph: &G, config: &EngineConfig) -> Vec<(NodeId, String)>
where
    G: DependencyGraph,
    I: IntoIterator<Item = &'a TraceNode>,
{
    nodes
        .into_iter()
        .filter_map(|node| {
            validate_node(node, graph, config)
                .err()
                .map(|e| (node.id, e.to_string()))
        })
        .collect()
}
