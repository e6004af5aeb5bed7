use crate::core::{NodeClass, NodeId};
use crate::error::{EtsimError, EtsimResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Execution resource a node occupies while in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceClass {
    CpuCompute,
    GpuCompute,
    Communication,
    RemoteMemory,
}

impl ResourceClass {
    pub const ALL: [ResourceClass; 4] = [
        ResourceClass::CpuCompute,
        ResourceClass::GpuCompute,
        ResourceClass::Communication,
        ResourceClass::RemoteMemory,
    ];

    /// Resource used by a node class; receives and invalid nodes use none
    pub fn for_node(class: NodeClass) -> Option<Self> {
        match class {
            NodeClass::CpuCompute => Some(ResourceClass::CpuCompute),
            NodeClass::GpuCompute => Some(ResourceClass::GpuCompute),
            NodeClass::Collective | NodeClass::Send => Some(ResourceClass::Communication),
            NodeClass::MemLoad | NodeClass::MemStore => Some(ResourceClass::RemoteMemory),
            NodeClass::Recv | NodeClass::Invalid => None,
        }
    }

    fn index(&self) -> usize {
        match self {
            ResourceClass::CpuCompute => 0,
            ResourceClass::GpuCompute => 1,
            ResourceClass::Communication => 2,
            ResourceClass::RemoteMemory => 3,
        }
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceClass::CpuCompute => "cpu_comp_ops",
            ResourceClass::GpuCompute => "gpu_comp_ops",
            ResourceClass::Communication => "comm_ops",
            ResourceClass::RemoteMemory => "mem_ops",
        };
        write!(f, "{}", s)
    }
}

/// Slots per resource class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceCapacity {
    pub cpu_compute: u32,
    pub gpu_compute: u32,
    pub communication: u32,
    pub remote_memory: u32,
}

impl Default for ResourceCapacity {
    fn default() -> Self {
        Self::uniform(1)
    }
}

impl ResourceCapacity {
    pub fn uniform(slots: u32) -> Self {
        Self {
            cpu_compute: slots,
            gpu_compute: slots,
            communication: slots,
            remote_memory: slots,
        }
    }

    pub fn get(&self, class: ResourceClass) -> u32 {
        match class {
            ResourceClass::CpuCompute => self.cpu_compute,
            ResourceClass::GpuCompute => self.gpu_compute,
            ResourceClass::Communication => self.communication,
            ResourceClass::RemoteMemory => self.remote_memory,
        }
    }

    pub fn validate(&self) -> EtsimResult<()> {
        for class in ResourceClass::ALL {
            if self.get(class) == 0 {
                return Err(EtsimError::config(format!(
                    "resource capacity for {} must be positive",
                    class
                )));
            }
        }
        Ok(())
    }
}

/// In-flight counters per resource class
///
/// Callers must check [`is_available`](Self::is_available) before
/// [`occupy`](Self::occupy); occupying a full class or releasing an empty
/// one is a programming error and panics.
#[derive(Debug, Clone)]
pub struct ResourceTracker {
    capacity: ResourceCapacity,
    in_flight: [u32; 4],
}

impl ResourceTracker {
    pub fn new(capacity: ResourceCapacity) -> Self {
        Self {
            capacity,
            in_flight: [0; 4],
        }
    }

    pub fn occupy(&mut self, node: NodeId, class: NodeClass) {
        let Some(resource) = ResourceClass::for_node(class) else {
            return;
        };
        let slot = &mut self.in_flight[resource.index()];
        assert!(
            *slot < self.capacity.get(resource),
            "node {} occupies {} beyond capacity {}",
            node,
            resource,
            self.capacity.get(resource)
        );
        *slot += 1;
        log::trace!("Node.id={} occupy {}", node, resource);
    }

    pub fn release(&mut self, node: NodeId, class: NodeClass) {
        let Some(resource) = ResourceClass::for_node(class) else {
            return;
        };
        let slot = &mut self.in_flight[resource.index()];
        assert!(*slot > 0, "node {} releases idle resource {}", node, resource);
        *slot -= 1;
        log::trace!("Node.id={} release {}", node, resource);
    }

    pub fn is_available(&self, class: NodeClass) -> bool {
        log::trace!(
            "Current hw resources: cpu_comp_ops={}, gpu_comp_ops={}, comm_ops={}, mem_ops={}",
            self.in_flight[0],
            self.in_flight[1],
            self.in_flight[2],
            self.in_flight[3]
        );
        match ResourceClass::for_node(class) {
            Some(resource) => self.in_flight[resource.index()] < self.capacity.get(resource),
            None => true,
        }
    }

    pub fn in_flight(&self, resource: ResourceClass) -> u32 {
        self.in_flight[resource.index()]
    }

    pub fn all_resources_released(&self) -> bool {
        self.in_flight.iter().all(|&n| n == 0)
    }
}
