use crate::core::NodeId;
use serde::{Deserialize, Serialize};

/// Element type of a point-to-point payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    #[default]
    Uint8,
    Float16,
    Float32,
}

impl DataType {
    pub fn width(&self) -> u64 {
        match self {
            DataType::Uint8 => 1,
            DataType::Float16 => 2,
            DataType::Float32 => 4,
        }
    }
}

/// A send or receive handed to the kernel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommRequest {
    pub src: u64,
    pub dst: u64,
    /// Payload element count
    pub size: u64,
    pub tag: u64,
    pub datatype: DataType,
    /// Node that issued the request
    pub node: NodeId,
}

impl CommRequest {
    pub fn new(node: NodeId, src: u64, dst: u64, size: u64, tag: u64) -> Self {
        Self {
            src,
            dst,
            size,
            tag,
            datatype: DataType::Uint8,
            node,
        }
    }

    pub fn bytes(&self) -> u64 {
        self.size * self.datatype.width()
    }

    /// Key the kernel can use to match a send against its receive
    pub fn match_key(&self) -> (u64, u64, u64, u64) {
        (self.src, self.dst, self.tag, self.size)
    }
}
