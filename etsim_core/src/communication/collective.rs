use crate::error::{EtsimError, EtsimResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Collective operation kinds understood by the trace format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectiveKind {
    AllReduce,
    AllToAll,
    AllGather,
    ReduceScatter,
    Broadcast,
    Reduce,
    Gather,
    Barrier,
}

impl CollectiveKind {
    /// Kinds the kernel provides a primitive for
    pub fn has_primitive(&self) -> bool {
        matches!(
            self,
            CollectiveKind::AllReduce
                | CollectiveKind::AllToAll
                | CollectiveKind::AllGather
                | CollectiveKind::ReduceScatter
        )
    }

    /// Kinds the engine can simulate at all (primitive or replayed)
    pub fn is_supported(&self) -> bool {
        self.has_primitive() || *self == CollectiveKind::Broadcast
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CollectiveKind::AllReduce => "all_reduce",
            CollectiveKind::AllToAll => "all_to_all",
            CollectiveKind::AllGather => "all_gather",
            CollectiveKind::ReduceScatter => "reduce_scatter",
            CollectiveKind::Broadcast => "broadcast",
            CollectiveKind::Reduce => "reduce",
            CollectiveKind::Gather => "gather",
            CollectiveKind::Barrier => "barrier",
        }
    }
}

impl fmt::Display for CollectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// NPUs participating in a collective together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunicatorGroup {
    pub id: u64,
    pub npus: Vec<u64>,
}

impl CommunicatorGroup {
    pub fn new(id: u64, npus: Vec<u64>) -> Self {
        Self { id, npus }
    }

    pub fn size(&self) -> usize {
        self.npus.len()
    }

    /// Pick the group containing `sys_id` out of a `{"id": [npu, ...]}` map
    ///
    /// When several groups contain the system the last one in lexicographic
    /// key order wins, so `"10"` is visited before `"2"`.
    pub fn from_json_str(json: &str, sys_id: u64) -> EtsimResult<Option<Self>> {
        let groups: BTreeMap<String, Vec<u64>> = serde_json::from_str(json)?;
        let mut selected = None;

        for (key, npus) in groups {
            if !npus.contains(&sys_id) {
                continue;
            }
            let id = key.parse::<u64>().map_err(|e| {
                EtsimError::config(format!("communicator group id '{}': {}", key, e))
            })?;
            selected = Some(CommunicatorGroup::new(id, npus));
        }

        Ok(selected)
    }

    /// Load the group file; a path containing `empty` means no group
    pub fn from_json_file<P: AsRef<Path>>(path: P, sys_id: u64) -> EtsimResult<Option<Self>> {
        let path = path.as_ref();
        if path.to_string_lossy().contains("empty") {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content, sys_id)
    }
}

/// A collective handed to the kernel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectiveRequest {
    pub kind: CollectiveKind,
    pub size: u64,
    /// One flag per network dimension
    pub involved_dims: Vec<bool>,
    pub group: Option<CommunicatorGroup>,
    pub priority: u32,
}
