//! Simulation kernel seam for ETSIM
//!
//! The engine never advances time or moves bytes itself. Everything that
//! takes simulated time is handed to a [`SimKernel`], which later delivers a
//! [`CompletionEvent`] back to the engine. The kernel owns the clock; the
//! engine only reads it.
//!
//! Two identifiers cross this boundary:
//! - [`CompletionToken`]: minted by the engine for every non-collective
//!   operation. The kernel hands it back untouched on completion.
//! - [`CollectiveHandle`]: minted by the kernel for every collective (and for
//!   the timed stand-in used by broadcast). It yields exactly one
//!   `CollectiveFinished` event.

use crate::communication::{CollectiveRequest, CommRequest};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discrete simulation time unit
pub type Tick = u64;

/// Engine-side identifier of one in-flight, non-collective operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompletionToken(pub u64);

/// Kernel-side identifier of one collective operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectiveHandle(pub u64);

impl fmt::Display for CompletionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "token#{}", self.0)
    }
}

impl fmt::Display for CollectiveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "collective#{}", self.0)
    }
}

/// Notification delivered by the kernel into the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompletionEvent {
    /// No payload: just run another drain
    Wake,
    /// A collective (or broadcast stand-in) finished
    CollectiveFinished(CollectiveHandle),
    /// A timed completion or remote-memory request finished
    NodeFinished(CompletionToken),
    /// The sender side of a point-to-point transfer finished
    PacketSent(CompletionToken),
    /// The payload of a point-to-point transfer was delivered
    PacketReceived(CompletionToken),
}

impl CompletionEvent {
    pub fn token(&self) -> Option<CompletionToken> {
        match self {
            CompletionEvent::NodeFinished(t)
            | CompletionEvent::PacketSent(t)
            | CompletionEvent::PacketReceived(t) => Some(*t),
            CompletionEvent::Wake | CompletionEvent::CollectiveFinished(_) => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionEvent::Wake => "wake",
            CompletionEvent::CollectiveFinished(_) => "collective_finished",
            CompletionEvent::NodeFinished(_) => "node_finished",
            CompletionEvent::PacketSent(_) => "packet_sent",
            CompletionEvent::PacketReceived(_) => "packet_received",
        }
    }
}

/// Discrete-event simulation kernel consumed by the engine
///
/// Implementations must deliver every registered completion exactly once and
/// must never call back into the engine from inside one of these methods;
/// completions are returned later through the embedding's event loop.
pub trait SimKernel {
    /// Current virtual time
    fn current_tick(&self) -> Tick;

    /// Deliver `NodeFinished(token)` after `duration` ticks
    fn register_timed_completion(&mut self, token: CompletionToken, duration: Tick);

    /// Allocate a collective handle that finishes after `duration` ticks
    ///
    /// Used for collectives that have no modelled primitive and replay their
    /// recorded duration instead.
    fn register_timed_collective(&mut self, duration: Tick) -> CollectiveHandle;

    /// Issue a sized request to the remote-memory subsystem
    fn issue_remote_mem(&mut self, size: u64, token: CompletionToken);

    /// Start the sending side of a transfer; completes with `PacketSent`
    fn send(&mut self, request: CommRequest, token: CompletionToken);

    /// Post a receive; completes with `PacketReceived`
    fn recv(&mut self, request: CommRequest, token: CompletionToken);

    /// Request a collective primitive
    fn generate_collective(&mut self, request: CollectiveRequest) -> CollectiveHandle;
}
