use crate::backend::Tick;
use crate::core::{NodeId, TensorIo, TraceNode};
use crate::error::{EtsimError, EtsimResult};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One read or write of a tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemActivity {
    pub start: Tick,
    pub end: Tick,
    /// Node that touched the tensor; `None` marks a synthesized initial write
    pub node: Option<NodeId>,
}

impl MemActivity {
    pub fn new(node: NodeId, start: Tick, end: Tick) -> Self {
        Self {
            start,
            end,
            node: Some(node),
        }
    }

    /// Write standing in for a tensor that existed before the trace began
    pub fn synthesized() -> Self {
        Self {
            start: 0,
            end: 0,
            node: None,
        }
    }

    pub fn is_synthesized(&self) -> bool {
        self.node.is_none()
    }
}

/// Memory usage at one tick of the timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemorySample {
    pub tick: Tick,
    pub bytes: u64,
}

/// Instantaneous local memory usage over time
///
/// Usage at a sample holds until the next sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemoryTimeline {
    pub samples: Vec<MemorySample>,
    /// Tensor name to its `[alloc, free)` interval
    #[serde(skip)]
    lifetimes: BTreeMap<String, (Tick, Tick)>,
}

impl MemoryTimeline {
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn peak(&self) -> u64 {
        self.samples.iter().map(|s| s.bytes).max().unwrap_or(0)
    }

    /// Time-weighted mean between the first and the last sample
    pub fn average(&self) -> f64 {
        match self.samples.as_slice() {
            [] => 0.0,
            [only] => only.bytes as f64,
            samples => {
                let span = samples[samples.len() - 1].tick - samples[0].tick;
                if span == 0 {
                    return samples[samples.len() - 1].bytes as f64;
                }
                let weighted: f64 = samples
                    .windows(2)
                    .map(|w| w[0].bytes as f64 * (w[1].tick - w[0].tick) as f64)
                    .sum();
                weighted / span as f64
            }
        }
    }

    /// Bytes live at `tick`
    pub fn usage_at(&self, tick: Tick) -> u64 {
        match self.samples.partition_point(|s| s.tick <= tick) {
            0 => 0,
            n => self.samples[n - 1].bytes,
        }
    }

    /// Names of tensors live at `tick`, sorted
    pub fn live_tensors_at(&self, tick: Tick) -> Vec<&str> {
        self.lifetimes
            .iter()
            .filter(|(_, (alloc, free))| *alloc <= tick && tick < *free)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn lifetime(&self, tensor: &str) -> Option<(Tick, Tick)> {
        self.lifetimes.get(tensor).copied()
    }
}

/// Records tensor reads and writes per node and rebuilds liveness
///
/// Each node's interval is opened with [`record_start`](Self::record_start)
/// and closed with [`record_end`](Self::record_end), which attributes the
/// node's declared inputs as reads and outputs as writes over that interval.
#[derive(Debug, Default)]
pub struct MemoryUsageTracker {
    sys_id: u64,
    activity_start: HashMap<NodeId, Tick>,
    tensor_size: BTreeMap<String, u64>,
    writes: BTreeMap<String, MemActivity>,
    reads: BTreeMap<String, Vec<MemActivity>>,
    timeline: MemoryTimeline,
}

impl MemoryUsageTracker {
    pub fn new(sys_id: u64) -> Self {
        Self {
            sys_id,
            ..Default::default()
        }
    }

    pub fn record_start(&mut self, node: NodeId, tick: Tick) {
        self.activity_start.insert(node, tick);
    }

    /// Close the node's interval and record its tensor traffic
    ///
    /// Both tensor lists are parsed before anything is recorded, so a node
    /// with a missing or malformed list leaves the tracker untouched.
    pub fn record_end(&mut self, node: &TraceNode, tick: Tick) -> EtsimResult<()> {
        let start = self
            .activity_start
            .remove(&node.id)
            .unwrap_or_else(|| panic!("node {} ended without a recorded start", node.id));
        let inputs = node.input_tensors()?;
        let outputs = node.output_tensors()?;
        self.record_reads(node.id, &inputs, start, tick)?;
        self.record_writes(node.id, &outputs, start, tick)
    }

    fn check_size(&self, tensor: &TensorIo) -> EtsimResult<bool> {
        match self.tensor_size.get(&tensor.name) {
            Some(&recorded) if recorded != tensor.size => Err(EtsimError::TensorSizeMismatch {
                tensor: tensor.name.clone(),
                recorded,
                observed: tensor.size,
            }),
            Some(_) => Ok(true),
            None => Ok(false),
        }
    }

    fn record_reads(
        &mut self,
        node: NodeId,
        inputs: &[TensorIo],
        start: Tick,
        end: Tick,
    ) -> EtsimResult<()> {
        for tensor in inputs {
            if !self.check_size(tensor)? {
                log::warn!(
                    "sys[{}] node {} reads tensor '{}' before any write; assuming it exists from tick 0",
                    self.sys_id,
                    node,
                    tensor.name
                );
                self.tensor_size.insert(tensor.name.clone(), tensor.size);
                self.writes
                    .insert(tensor.name.clone(), MemActivity::synthesized());
            }
            self.reads
                .entry(tensor.name.clone())
                .or_default()
                .push(MemActivity::new(node, start, end));
        }
        Ok(())
    }

    fn record_writes(
        &mut self,
        node: NodeId,
        outputs: &[TensorIo],
        start: Tick,
        end: Tick,
    ) -> EtsimResult<()> {
        for tensor in outputs {
            if self.check_size(tensor)? {
                return Err(EtsimError::TensorRewritten {
                    tensor: tensor.name.clone(),
                    node,
                });
            }
            self.tensor_size.insert(tensor.name.clone(), tensor.size);
            self.writes
                .insert(tensor.name.clone(), MemActivity::new(node, start, end));
        }
        Ok(())
    }

    pub fn write_of(&self, tensor: &str) -> Option<&MemActivity> {
        self.writes.get(tensor)
    }

    pub fn reads_of(&self, tensor: &str) -> &[MemActivity] {
        self.reads.get(tensor).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn tensor_size(&self, tensor: &str) -> Option<u64> {
        self.tensor_size.get(tensor).copied()
    }

    /// Sweep allocation and free ticks to rebuild usage over time
    ///
    /// A tensor is allocated when its write starts and freed when its last
    /// read ends, or when its write ends if it is never read. Allocations at
    /// a tick are applied before frees at the same tick.
    pub fn build_memory_timeline(&mut self) -> &MemoryTimeline {
        let mut allocs: BTreeMap<Tick, Vec<&str>> = BTreeMap::new();
        let mut frees: BTreeMap<Tick, Vec<&str>> = BTreeMap::new();
        let mut lifetimes = BTreeMap::new();

        for (name, write) in &self.writes {
            let last_read = self
                .reads
                .get(name)
                .and_then(|reads| reads.iter().map(|r| r.end).max());
            let free = last_read.unwrap_or(write.end).max(write.end);
            allocs.entry(write.start).or_default().push(name);
            frees.entry(free).or_default().push(name);
            lifetimes.insert(name.clone(), (write.start, free));
        }

        let ticks: BTreeSet<Tick> = allocs.keys().chain(frees.keys()).copied().collect();
        let mut live: BTreeSet<&str> = BTreeSet::new();
        let mut samples = Vec::with_capacity(ticks.len());

        for tick in ticks {
            if let Some(names) = allocs.get(&tick) {
                live.extend(names.iter().copied());
            }
            if let Some(names) = frees.get(&tick) {
                for name in names {
                    live.remove(name);
                }
            }
            let bytes = live
                .iter()
                .map(|name| self.tensor_size.get(*name).copied().unwrap_or(0))
                .sum();
            samples.push(MemorySample { tick, bytes });
        }

        self.timeline = MemoryTimeline { samples, lifetimes };
        &self.timeline
    }

    pub fn timeline(&self) -> &MemoryTimeline {
        &self.timeline
    }

    pub fn peak_memory_usage(&self) -> u64 {
        self.timeline.peak()
    }

    pub fn average_memory_usage(&self) -> f64 {
        self.timeline.average()
    }
}
