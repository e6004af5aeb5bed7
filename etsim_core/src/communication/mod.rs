//! # Communication requests for ETSIM
//!
//! Plain data handed to the simulation kernel:
//!
//! - **CommRequest**: point-to-point send/receive
//! - **CollectiveRequest**: collective primitive with involvement mask,
//!   communicator group and priority
//! - **CommunicatorGroup**: NPUs loaded from a communicator-group file
//!
//! Transport itself is the kernel's job.

pub mod collective;
pub mod p2p;

pub use collective::{CollectiveKind, CollectiveRequest, CommunicatorGroup};
pub use p2p::{CommRequest, DataType};
