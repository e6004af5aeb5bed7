use crate::backend::{CollectiveHandle, CompletionEvent, CompletionToken, SimKernel, Tick};
use crate::communication::{CollectiveKind, CollectiveRequest, CommRequest};
use crate::error::{EtsimError, EtsimResult};
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Cost parameters of the analytical kernel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticalConfig {
    pub remote_mem_latency: Tick,
    /// Bytes per tick
    pub remote_mem_bandwidth: f64,
    /// Per-hop latency of the network
    pub link_latency: Tick,
    /// Bytes per tick per link
    pub link_bandwidth: f64,
    /// Collective participants when a request carries no communicator group
    pub npus: usize,
}

impl Default for AnalyticalConfig {
    fn default() -> Self {
        Self {
            remote_mem_latency: 100,
            remote_mem_bandwidth: 50.0,
            link_latency: 500,
            link_bandwidth: 25.0,
            npus: 8,
        }
    }
}

impl AnalyticalConfig {
    pub fn validate(&self) -> EtsimResult<()> {
        if !(self.remote_mem_bandwidth > 0.0) || !(self.link_bandwidth > 0.0) {
            return Err(EtsimError::config("kernel bandwidths must be positive"));
        }
        if self.npus == 0 {
            return Err(EtsimError::config("kernel needs at least one npu"));
        }
        Ok(())
    }

    fn transfer(&self, latency: Tick, bytes: f64, bandwidth: f64) -> Tick {
        latency.saturating_add((bytes / bandwidth).ceil() as Tick)
    }

    /// Cost of a collective over `npus` participants
    ///
    /// Ring schedules: all-reduce moves `2(n-1)/n` of the payload in
    /// `2(n-1)` steps, the other kinds `(n-1)/n` in `n-1` steps. Every
    /// involved network dimension adds one more link latency.
    pub fn collective_cost(&self, request: &CollectiveRequest, npus: usize) -> Tick {
        let n = npus.max(1) as f64;
        let (volume, steps) = match request.kind {
            CollectiveKind::AllReduce => (2.0 * (n - 1.0) / n, 2.0 * (n - 1.0)),
            _ => ((n - 1.0) / n, n - 1.0),
        };
        let dims = request.involved_dims.iter().filter(|d| **d).count() as Tick;
        let latency = steps as Tick * self.link_latency + dims * self.link_latency;
        self.transfer(latency, request.size as f64 * volume, self.link_bandwidth)
    }
}

#[derive(Debug)]
struct ScheduledEvent {
    tick: Tick,
    seq: u64,
    event: CompletionEvent,
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.tick, self.seq).cmp(&(other.tick, other.seq))
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScheduledEvent {}

/// Single-system discrete-event kernel with analytical costs
///
/// Events are delivered in `(tick, insertion order)` order, so runs with the
/// same inputs are reproducible. Point-to-point transfers assume the peer is
/// always ready: a send completes once its bytes leave, a receive once they
/// would have arrived.
#[derive(Debug)]
pub struct AnalyticalKernel {
    config: AnalyticalConfig,
    now: Tick,
    seq: u64,
    next_handle: u64,
    queue: BinaryHeap<Reverse<ScheduledEvent>>,
    delivered: u64,
}

impl AnalyticalKernel {
    /// Build a kernel, rejecting cost parameters it cannot evaluate
    pub fn new(config: AnalyticalConfig) -> EtsimResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            now: 0,
            seq: 0,
            next_handle: 0,
            queue: BinaryHeap::new(),
            delivered: 0,
        })
    }

    pub fn config(&self) -> &AnalyticalConfig {
        &self.config
    }

    fn schedule(&mut self, delay: Tick, event: CompletionEvent) {
        let scheduled = ScheduledEvent {
            tick: self.now.saturating_add(delay),
            seq: self.seq,
            event,
        };
        self.seq += 1;
        self.queue.push(Reverse(scheduled));
    }

    fn handle(&mut self) -> CollectiveHandle {
        let handle = CollectiveHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    /// Pop the earliest event and advance the clock to it
    pub fn next_event(&mut self) -> Option<CompletionEvent> {
        let Reverse(next) = self.queue.pop()?;
        self.now = next.tick;
        self.delivered += 1;
        Some(next.event)
    }

    /// Events scheduled but not yet delivered
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}

impl SimKernel for AnalyticalKernel {
    fn current_tick(&self) -> Tick {
        self.now
    }

    fn register_timed_completion(&mut self, token: CompletionToken, duration: Tick) {
        self.schedule(duration, CompletionEvent::NodeFinished(token));
    }

    fn register_timed_collective(&mut self, duration: Tick) -> CollectiveHandle {
        let handle = self.handle();
        self.schedule(duration, CompletionEvent::CollectiveFinished(handle));
        handle
    }

    fn issue_remote_mem(&mut self, size: u64, token: CompletionToken) {
        let cost = self.config.transfer(
            self.config.remote_mem_latency,
            size as f64,
            self.config.remote_mem_bandwidth,
        );
        self.schedule(cost, CompletionEvent::NodeFinished(token));
    }

    fn send(&mut self, request: CommRequest, token: CompletionToken) {
        let bytes = request.bytes() as f64;
        let cost = self.config.transfer(0, bytes, self.config.link_bandwidth);
        log::trace!("send {:?} completes in {} ticks", request.match_key(), cost);
        self.schedule(cost, CompletionEvent::PacketSent(token));
    }

    fn recv(&mut self, request: CommRequest, token: CompletionToken) {
        let bytes = request.bytes() as f64;
        let cost = self
            .config
            .transfer(self.config.link_latency, bytes, self.config.link_bandwidth);
        log::trace!("recv {:?} completes in {} ticks", request.match_key(), cost);
        self.schedule(cost, CompletionEvent::PacketReceived(token));
    }

    fn generate_collective(&mut self, request: CollectiveRequest) -> CollectiveHandle {
        let npus = request
            .group
            .as_ref()
            .map(|g| g.size())
            .unwrap_or(self.config.npus);
        let cost = self.config.collective_cost(&request, npus);
        let handle = self.handle();
        log::trace!(
            "{} of {} bytes over {} npus: {} ticks ({})",
            request.kind,
            request.size,
            npus,
            cost,
            handle
        );
        self.schedule(cost, CompletionEvent::CollectiveFinished(handle));
        handle
    }
}
