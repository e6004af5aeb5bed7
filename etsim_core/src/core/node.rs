use crate::communication::CollectiveKind;
use crate::error::{EtsimError, EtsimResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a node in a per-device trace
pub type NodeId = u64;

/// Node type as written in the trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    CompNode,
    MemLoadNode,
    MemStoreNode,
    CommCollNode,
    CommSendNode,
    CommRecvNode,
    InvalidNode,
}

/// Classification of a node, derived once from its type and CPU/GPU flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeClass {
    CpuCompute,
    GpuCompute,
    MemLoad,
    MemStore,
    Collective,
    Send,
    Recv,
    Invalid,
}

impl NodeClass {
    pub fn is_compute(&self) -> bool {
        matches!(self, NodeClass::CpuCompute | NodeClass::GpuCompute)
    }

    pub fn is_remote_mem(&self) -> bool {
        matches!(self, NodeClass::MemLoad | NodeClass::MemStore)
    }

    pub fn is_comm(&self) -> bool {
        matches!(
            self,
            NodeClass::Collective | NodeClass::Send | NodeClass::Recv
        )
    }

    /// Numeric code used in trace log lines
    pub fn code(&self) -> u8 {
        match self {
            NodeClass::Invalid => 0,
            NodeClass::MemLoad => 1,
            NodeClass::MemStore => 2,
            NodeClass::CpuCompute | NodeClass::GpuCompute => 3,
            NodeClass::Send => 4,
            NodeClass::Recv => 5,
            NodeClass::Collective => 6,
        }
    }
}

impl fmt::Display for NodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeClass::CpuCompute => "cpu_compute",
            NodeClass::GpuCompute => "gpu_compute",
            NodeClass::MemLoad => "mem_load",
            NodeClass::MemStore => "mem_store",
            NodeClass::Collective => "collective",
            NodeClass::Send => "send",
            NodeClass::Recv => "recv",
            NodeClass::Invalid => "invalid",
        };
        write!(f, "{}", s)
    }
}

/// Per-node attributes carried by the trace
///
/// Every field is optional; which ones a node must carry depends on its class
/// and on the active cost model (see `scheduling::validation`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeAttrs {
    /// Compute nodes run on the CPU unless this is `Some(false)`
    pub is_cpu_op: Option<bool>,
    /// Recorded wall duration in microseconds
    pub runtime: Option<u64>,
    pub num_ops: Option<u64>,
    pub tensor_size: Option<u64>,
    /// Where a remote-memory tensor lives
    pub tensor_loc: Option<String>,
    pub comm_type: Option<CollectiveKind>,
    pub comm_size: Option<u64>,
    pub comm_src: Option<u64>,
    pub comm_dst: Option<u64>,
    pub comm_tag: Option<u64>,
    pub comm_priority: Option<u32>,
    pub involved_dim: Option<Vec<bool>>,
    /// Flat list of alternating tensor name and byte size
    pub inputs: Option<Vec<String>>,
    pub outputs: Option<Vec<String>>,
}

/// A tensor touched by a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorIo {
    pub name: String,
    pub size: u64,
}

/// One operation in a per-device dependency trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceNode {
    pub id: NodeId,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Parents whose output this node consumes
    #[serde(default)]
    pub data_deps: Vec<NodeId>,
    /// Parents that must finish first without passing data
    #[serde(default)]
    pub ctrl_deps: Vec<NodeId>,
    #[serde(flatten)]
    pub attrs: NodeAttrs,
}

impl TraceNode {
    pub fn new(id: NodeId, node_type: NodeType) -> Self {
        Self {
            id,
            name: format!("node_{}", id),
            node_type,
            data_deps: Vec::new(),
            ctrl_deps: Vec::new(),
            attrs: NodeAttrs::default(),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_data_deps(mut self, deps: &[NodeId]) -> Self {
        self.data_deps = deps.to_vec();
        self
    }

    pub fn with_ctrl_deps(mut self, deps: &[NodeId]) -> Self {
        self.ctrl_deps = deps.to_vec();
        self
    }

    pub fn with_attrs(mut self, attrs: NodeAttrs) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn is_cpu_op(&self) -> bool {
        self.attrs.is_cpu_op.unwrap_or(true)
    }

    pub fn class(&self) -> NodeClass {
        match self.node_type {
            NodeType::CompNode if self.is_cpu_op() => NodeClass::CpuCompute,
            NodeType::CompNode => NodeClass::GpuCompute,
            NodeType::MemLoadNode => NodeClass::MemLoad,
            NodeType::MemStoreNode => NodeClass::MemStore,
            NodeType::CommCollNode => NodeClass::Collective,
            NodeType::CommSendNode => NodeClass::Send,
            NodeType::CommRecvNode => NodeClass::Recv,
            NodeType::InvalidNode => NodeClass::Invalid,
        }
    }

    /// All parents, data first, in trace order
    pub fn parents(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.data_deps.iter().chain(self.ctrl_deps.iter()).copied()
    }

    pub fn tensor_size(&self) -> u64 {
        self.attrs.tensor_size.unwrap_or(0)
    }

    pub fn input_tensors(&self) -> EtsimResult<Vec<TensorIo>> {
        let values = self
            .attrs
            .inputs
            .as_ref()
            .ok_or(EtsimError::MissingAttribute {
                node: self.id,
                attribute: "inputs",
            })?;
        parse_tensor_list(self.id, values)
    }

    pub fn output_tensors(&self) -> EtsimResult<Vec<TensorIo>> {
        let values = self
            .attrs
            .outputs
            .as_ref()
            .ok_or(EtsimError::MissingAttribute {
                node: self.id,
                attribute: "outputs",
            })?;
        parse_tensor_list(self.id, values)
    }
}

/// Parse a flat `[name, size, name, size, ...]` list
pub fn parse_tensor_list(node: NodeId, values: &[String]) -> EtsimResult<Vec<TensorIo>> {
    if values.len() % 2 != 0 {
        return Err(EtsimError::MalformedTensorList {
            node,
            reason: format!("expected name/size pairs, got {} entries", values.len()),
        });
    }

    values
        .chunks(2)
        .map(|pair| {
            let size = pair[1]
                .trim()
                .parse::<u64>()
                .map_err(|e| EtsimError::MalformedTensorList {
                    node,
                    reason: format!("size '{}' of tensor '{}': {}", pair[1], pair[0], e),
                })?;
            Ok(TensorIo {
                name: pair[0].clone(),
                size,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_class_derivation() {
        let mut node = TraceNode::new(1, NodeType::CompNode);
        assert_eq!(node.class(), NodeClass::CpuCompute);

        node.attrs.is_cpu_op = Some(false);
        assert_eq!(node.class(), NodeClass::GpuCompute);

        assert_eq!(
            TraceNode::new(2, NodeType::CommRecvNode).class(),
            NodeClass::Recv
        );
        assert_eq!(
            TraceNode::new(3, NodeType::MemStoreNode).class(),
            NodeClass::MemStore
        );
        assert!(NodeClass::MemLoad.is_remote_mem());
        assert!(NodeClass::Send.is_comm());
        assert!(!NodeClass::Invalid.is_compute());
    }

    #[test]
    fn test_parse_tensor_list() {
        let parsed = parse_tensor_list(1, &strings(&["a", "100", "b", " 8 "])).unwrap();
        assert_eq!(
            parsed,
            vec![
                TensorIo {
                    name: "a".into(),
                    size: 100
                },
                TensorIo {
                    name: "b".into(),
                    size: 8
                },
            ]
        );

        assert!(parse_tensor_list(1, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_parse_tensor_list_rejects_odd_length() {
        let err = parse_tensor_list(4, &strings(&["a", "1", "b"])).unwrap_err();
        assert!(matches!(err, EtsimError::MalformedTensorList { node: 4, .. }));
    }

    #[test]
    fn test_parse_tensor_list_rejects_bad_size() {
        let err = parse_tensor_list(4, &strings(&["a", "lots"])).unwrap_err();
        assert!(err.to_string().contains("lots"));
    }

    #[test]
    fn test_missing_io_attribute() {
        let node = TraceNode::new(9, NodeType::CompNode);
        assert!(matches!(
            node.input_tensors(),
            Err(EtsimError::MissingAttribute {
                node: 9,
                attribute: "inputs"
            })
        ));
    }

    #[test]
    fn test_trace_json_shape() {
        let json = r#"{
            "id": 5,
            "name": "allreduce_grad",
            "type": "COMM_COLL_NODE",
            "data_deps": [1, 2],
            "comm_type": "all_reduce",
            "comm_size": 4096
        }"#;
        let node: TraceNode = serde_json::from_str(json).unwrap();
        assert_eq!(node.class(), NodeClass::Collective);
        assert_eq!(node.attrs.comm_type, Some(CollectiveKind::AllReduce));
        assert_eq!(node.attrs.comm_size, Some(4096));
        assert_eq!(node.parents().collect::<Vec<_>>(), vec![1, 2]);
    }
}
