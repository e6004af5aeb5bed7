//! In-flight operation bookkeeping
//!
//! Every non-collective operation gets a [`CompletionToken`] whose context
//! lives in [`InFlightArena`] until the kernel hands the token back. Each
//! collective handle is tracked in [`CollectiveCompletionMap`], which allows
//! several handles per node and reports the node only after its last handle
//! finishes.

use crate::backend::{CollectiveHandle, CompletionEvent, CompletionToken};
use crate::core::{NodeClass, NodeId};
use std::collections::HashMap;

/// Which completion event a token is allowed to come back with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedEvent {
    NodeFinished,
    PacketSent,
    PacketReceived,
}

impl ExpectedEvent {
    pub fn matches(&self, event: &CompletionEvent) -> bool {
        matches!(
            (self, event),
            (ExpectedEvent::NodeFinished, CompletionEvent::NodeFinished(_))
                | (ExpectedEvent::PacketSent, CompletionEvent::PacketSent(_))
                | (ExpectedEvent::PacketReceived, CompletionEvent::PacketReceived(_))
        )
    }
}

/// Context carried from issue to completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlightContext {
    pub node: NodeId,
    pub class: NodeClass,
    pub expected: ExpectedEvent,
}

/// Single-owner store of in-flight contexts keyed by generated tokens
#[derive(Debug, Default)]
pub struct InFlightArena {
    next_token: u64,
    contexts: HashMap<CompletionToken, InFlightContext>,
}

impl InFlightArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `context` and return the token that will reclaim it
    pub fn insert(&mut self, context: InFlightContext) -> CompletionToken {
        let token = CompletionToken(self.next_token);
        self.next_token += 1;
        self.contexts.insert(token, context);
        token
    }

    /// Consume the context for `event`
    ///
    /// Panics when the token is unknown (double completion) or the event
    /// kind does not match what the operation was issued with.
    pub fn take(&mut self, token: CompletionToken, event: &CompletionEvent) -> InFlightContext {
        let context = self
            .contexts
            .remove(&token)
            .unwrap_or_else(|| panic!("{} completed twice or never issued", token));
        assert!(
            context.expected.matches(event),
            "node {} expected {:?} but got {}",
            context.node,
            context.expected,
            event.as_str()
        );
        context
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

/// Collective handles to originating nodes, N handles per node allowed
#[derive(Debug, Default)]
pub struct CollectiveCompletionMap {
    handles: HashMap<CollectiveHandle, NodeId>,
    outstanding: HashMap<NodeId, (NodeClass, usize)>,
}

impl CollectiveCompletionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: CollectiveHandle, node: NodeId, class: NodeClass) {
        let previous = self.handles.insert(handle, node);
        assert!(
            previous.is_none(),
            "{} registered twice (node {})",
            handle,
            node
        );
        self.outstanding.entry(node).or_insert((class, 0)).1 += 1;
    }

    /// Remove `handle`; returns the node once its last handle is done
    pub fn complete(&mut self, handle: CollectiveHandle) -> Option<(NodeId, NodeClass)> {
        let node = self
            .handles
            .remove(&handle)
            .unwrap_or_else(|| panic!("{} finished but was never registered", handle));
        let (class, remaining) = match self.outstanding.get_mut(&node) {
            Some(entry) => {
                entry.1 -= 1;
                *entry
            }
            None => panic!("node {} has no outstanding collective handles", node),
        };
        if remaining == 0 {
            self.outstanding.remove(&node);
            Some((node, class))
        } else {
            log::trace!(
                "Node.id={} collective {} done, {} handle(s) outstanding",
                node,
                handle,
                remaining
            );
            None
        }
    }

    pub fn contains(&self, handle: CollectiveHandle) -> bool {
        self.handles.contains_key(&handle)
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Nodes with at least one handle still outstanding
    pub fn pending_nodes(&self) -> usize {
        self.outstanding.len()
    }
}
