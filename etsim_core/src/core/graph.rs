use super::node::{NodeId, TraceNode};
use crate::error::{EtsimError, EtsimResult};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::Path;

/// Dependency-graph adapter consumed by the engine
///
/// The engine never owns nodes. It pulls ready ids, looks nodes up, and asks
/// the adapter to release dependents and prune finished nodes.
pub trait DependencyGraph {
    /// Next node whose dependencies are all satisfied
    fn next_ready_node(&mut self) -> Option<NodeId>;

    /// Return a ready node that could not be issued; it is offered again later
    fn push_back_ready(&mut self, id: NodeId);

    fn lookup(&self, id: NodeId) -> Option<&TraceNode>;

    /// Tensor size of `id`, still answered after the node was removed
    ///
    /// Compute nodes cost their data parents' tensors, and a parent may
    /// already be gone when a blocked child is finally issued.
    fn tensor_size_of(&self, id: NodeId) -> Option<u64> {
        self.lookup(id).map(TraceNode::tensor_size)
    }

    /// Mark `id` as done for each of its dependents, readying those whose
    /// last dependency this was
    fn free_dependents(&mut self, id: NodeId);

    /// Drop a finished node from the graph
    fn remove(&mut self, id: NodeId);

    /// Whether any node is still ready, waiting on dependencies, or in flight
    fn has_remaining_work(&self) -> bool;

    /// Number of nodes not yet removed
    fn remaining(&self) -> usize;
}

/// In-memory dependency graph built from a trace file
///
/// Ready nodes are kept in FIFO order. Initially ready nodes and freed
/// children are enqueued in ascending id order so replays are deterministic.
#[derive(Debug, Clone, Default)]
pub struct TraceGraph {
    nodes: BTreeMap<NodeId, TraceNode>,
    children: BTreeMap<NodeId, Vec<NodeId>>,
    unresolved: BTreeMap<NodeId, usize>,
    ready: VecDeque<NodeId>,
    freed: HashSet<NodeId>,
    retired_tensor_size: HashMap<NodeId, u64>,
}

impl TraceGraph {
    /// Build a graph, rejecting duplicate ids and dangling dependencies
    pub fn new(nodes: Vec<TraceNode>) -> EtsimResult<Self> {
        let mut graph = TraceGraph::default();

        for node in nodes {
            let id = node.id;
            if graph.nodes.insert(id, node).is_some() {
                return Err(EtsimError::TraceLoad(format!("duplicate node id {}", id)));
            }
        }

        for (id, node) in &graph.nodes {
            let mut parents: Vec<NodeId> = node.parents().collect();
            parents.sort_unstable();
            parents.dedup();

            for parent in &parents {
                if !graph.nodes.contains_key(parent) {
                    return Err(EtsimError::TraceLoad(format!(
                        "node {} depends on unknown node {}",
                        id, parent
                    )));
                }
                graph.children.entry(*parent).or_default().push(*id);
            }

            if parents.is_empty() {
                graph.ready.push_back(*id);
            } else {
                graph.unresolved.insert(*id, parents.len());
            }
        }

        Ok(graph)
    }

    pub fn from_json_str(json: &str) -> EtsimResult<Self> {
        let nodes: Vec<TraceNode> = serde_json::from_str(json)?;
        Self::new(nodes)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> EtsimResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => EtsimError::TraceLoad(format!(
                "workload file: {} does not exist",
                path.display()
            )),
            std::io::ErrorKind::PermissionDenied => EtsimError::TraceLoad(format!(
                "workload file: {} exists but is not readable",
                path.display()
            )),
            _ => EtsimError::TraceLoad(format!(
                "workload file: {} access error: {}",
                path.display(),
                e
            )),
        })?;
        Self::from_json_str(&content)
    }

    /// Open the trace of one system: `{prefix}.{sys_id}.json`
    pub fn load_for_system(prefix: &str, sys_id: u64) -> EtsimResult<Self> {
        Self::from_json_file(format!("{}.{}.json", prefix, sys_id))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Nodes not yet removed, in id order
    pub fn nodes(&self) -> impl Iterator<Item = &TraceNode> + '_ {
        self.nodes.values()
    }

    /// Ids currently queued as ready, front first
    pub fn ready_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.ready.iter().copied()
    }
}

impl DependencyGraph for TraceGraph {
    fn next_ready_node(&mut self) -> Option<NodeId> {
        self.ready.pop_front()
    }

    fn push_back_ready(&mut self, id: NodeId) {
        self.ready.push_back(id);
    }

    fn lookup(&self, id: NodeId) -> Option<&TraceNode> {
        self.nodes.get(&id)
    }

    fn free_dependents(&mut self, id: NodeId) {
        assert!(
            self.freed.insert(id),
            "dependents of node {} freed twice",
            id
        );

        let Some(children) = self.children.get(&id) else {
            return;
        };

        for child in children {
            if let Some(count) = self.unresolved.get_mut(child) {
                *count -= 1;
                if *count == 0 {
                    self.unresolved.remove(child);
                    self.ready.push_back(*child);
                }
            }
        }
    }

    fn tensor_size_of(&self, id: NodeId) -> Option<u64> {
        self.nodes
            .get(&id)
            .map(TraceNode::tensor_size)
            .or_else(|| self.retired_tensor_size.get(&id).copied())
    }

    fn remove(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.remove(&id) {
            self.retired_tensor_size.insert(id, node.tensor_size());
        }
    }

    fn has_remaining_work(&self) -> bool {
        !self.nodes.is_empty() || !self.ready.is_empty()
    }

    fn remaining(&self) -> usize {
        self.nodes.len()
    }
}
