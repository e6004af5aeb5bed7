use crate::backend::Tick;
use crate::core::{NodeClass, NodeId, TraceNode};
use crate::error::{EtsimError, EtsimResult};
use crate::memory::{MemoryTimeline, MemoryUsageTracker};
use crate::scheduling::roofline::RooflineEstimate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Operator category used for busy-time and utilization accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorType {
    Cpu,
    Gpu,
    Comm,
    RemoteMem,
    Invalid,
}

impl OperatorType {
    pub fn is_compute(&self) -> bool {
        matches!(self, OperatorType::Cpu | OperatorType::Gpu)
    }

    /// Metric name used in the report
    pub fn metric_name(&self) -> &'static str {
        match self {
            OperatorType::Cpu => "CPU time",
            OperatorType::Gpu => "GPU time",
            OperatorType::Comm => "Comm time",
            OperatorType::RemoteMem => "Remote mem time",
            OperatorType::Invalid => "Invalid time",
        }
    }
}

impl From<NodeClass> for OperatorType {
    fn from(class: NodeClass) -> Self {
        match class {
            NodeClass::CpuCompute => OperatorType::Cpu,
            NodeClass::GpuCompute => OperatorType::Gpu,
            NodeClass::MemLoad | NodeClass::MemStore => OperatorType::RemoteMem,
            NodeClass::Collective | NodeClass::Send | NodeClass::Recv => OperatorType::Comm,
            NodeClass::Invalid => OperatorType::Invalid,
        }
    }
}

impl fmt::Display for OperatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.metric_name())
    }
}

/// Timing and derived metrics of one node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperatorStatistics {
    pub node_id: NodeId,
    pub op_type: OperatorType,
    pub start: Tick,
    /// `None` until the node completes
    pub end: Option<Tick>,
    pub is_memory_bound: Option<bool>,
    pub compute_utilization: Option<f64>,
    pub memory_utilization: Option<f64>,
    pub operation_intensity: Option<f64>,
}

impl OperatorStatistics {
    pub fn new(node_id: NodeId, op_type: OperatorType, start: Tick) -> Self {
        Self {
            node_id,
            op_type,
            start,
            end: None,
            is_memory_bound: None,
            compute_utilization: None,
            memory_utilization: None,
            operation_intensity: None,
        }
    }

    pub fn duration(&self) -> Option<Tick> {
        self.end.map(|end| end - self.start)
    }
}

/// Duration-weighted compute summaries
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Utilizations {
    pub compute_bound_percentage: f64,
    pub average_compute_utilization: f64,
    pub average_memory_utilization: f64,
    pub average_operation_intensity: f64,
}

/// Local memory summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryReport {
    pub timeline: MemoryTimeline,
    pub peak: u64,
    pub average: f64,
}

/// Everything an external reporter needs once the run has terminated
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsReport {
    pub sys_id: u64,
    pub wall_time: Tick,
    /// Non-overlapping busy time per operator type
    pub type_time: BTreeMap<OperatorType, Tick>,
    pub utilizations: Utilizations,
    pub memory: Option<MemoryReport>,
}

/// Total length covered by `intervals`, counting overlaps once
pub fn calculate_total_runtime(intervals: &[(Tick, Tick)]) -> Tick {
    let mut sorted = intervals.to_vec();
    sorted.sort_unstable();

    let mut iter = sorted.into_iter();
    let Some((mut merged_start, mut merged_end)) = iter.next() else {
        return 0;
    };

    let mut total = 0;
    for (start, end) in iter {
        if start <= merged_end {
            merged_end = merged_end.max(end);
        } else {
            total += merged_end - merged_start;
            merged_start = start;
            merged_end = end;
        }
    }
    total + (merged_end - merged_start)
}

/// Per-node timing records and end-of-run aggregation
#[derive(Debug)]
pub struct Statistics {
    sys_id: u64,
    records: BTreeMap<NodeId, OperatorStatistics>,
    memory: Option<MemoryUsageTracker>,
    report: Option<StatisticsReport>,
}

impl Statistics {
    pub fn new(sys_id: u64, track_memory: bool) -> Self {
        Self {
            sys_id,
            records: BTreeMap::new(),
            memory: track_memory.then(|| MemoryUsageTracker::new(sys_id)),
            report: None,
        }
    }

    pub fn record_start(&mut self, node_id: NodeId, op_type: OperatorType, tick: Tick) {
        self.records
            .insert(node_id, OperatorStatistics::new(node_id, op_type, tick));
        if op_type != OperatorType::Invalid {
            if let Some(memory) = &mut self.memory {
                memory.record_start(node_id, tick);
            }
        }
    }

    /// Attach roofline-derived metrics to a started record
    pub fn record_roofline(&mut self, node_id: NodeId, estimate: &RooflineEstimate) {
        let record = self.record_mut(node_id);
        record.is_memory_bound = Some(estimate.is_memory_bound);
        record.compute_utilization = Some(estimate.compute_utilization);
        record.memory_utilization = Some(estimate.memory_utilization);
        record.operation_intensity = Some(estimate.operation_intensity);
    }

    /// Finalize the node's end tick and attribute its tensor traffic
    ///
    /// The end tick is always recorded; an error only concerns the memory
    /// activity of this node.
    pub fn record_end(&mut self, node: &TraceNode, tick: Tick) -> EtsimResult<()> {
        let record = self.record_mut(node.id);
        debug_assert!(
            tick >= record.start,
            "node {} ends at {} before its start {}",
            node.id,
            tick,
            record.start
        );
        record.end = Some(tick);
        let op_type = record.op_type;

        match &mut self.memory {
            Some(memory) if op_type != OperatorType::Invalid => memory.record_end(node, tick),
            _ => Ok(()),
        }
    }

    fn record_mut(&mut self, node_id: NodeId) -> &mut OperatorStatistics {
        self.records
            .get_mut(&node_id)
            .unwrap_or_else(|| panic!("node {} has no statistics record", node_id))
    }

    pub fn get(&self, node_id: NodeId) -> Option<&OperatorStatistics> {
        self.records.get(&node_id)
    }

    /// All records in node id order
    pub fn records(&self) -> impl Iterator<Item = &OperatorStatistics> {
        self.records.values()
    }

    pub fn memory_tracker(&self) -> Option<&MemoryUsageTracker> {
        self.memory.as_ref()
    }

    pub fn extract_type_time(&self) -> BTreeMap<OperatorType, Tick> {
        let mut intervals: BTreeMap<OperatorType, Vec<(Tick, Tick)>> = BTreeMap::new();
        for record in self.records.values() {
            if let Some(end) = record.end {
                intervals
                    .entry(record.op_type)
                    .or_default()
                    .push((record.start, end));
            }
        }
        intervals
            .into_iter()
            .map(|(op_type, spans)| (op_type, calculate_total_runtime(&spans)))
            .collect()
    }

    pub fn extract_utilizations(&self) -> Utilizations {
        let mut compute_bound_time: Tick = 0;
        let mut compute_utilization = 0.0;
        let mut memory_utilization = 0.0;
        let mut operation_intensity = 0.0;
        // floor of one tick keeps an empty run finite
        let mut compute_time: Tick = 1;

        for record in self.records.values() {
            if !record.op_type.is_compute() {
                continue;
            }
            let Some(duration) = record.duration() else {
                continue;
            };
            let weight = duration as f64;

            if record.is_memory_bound == Some(false) {
                compute_bound_time += duration;
            }
            compute_utilization += record.compute_utilization.unwrap_or(0.0) * weight;
            memory_utilization += record.memory_utilization.unwrap_or(0.0) * weight;
            operation_intensity += record.operation_intensity.unwrap_or(0.0) * weight;
            compute_time += duration;
        }

        let total = compute_time as f64;
        Utilizations {
            compute_bound_percentage: compute_bound_time as f64 / total,
            average_compute_utilization: compute_utilization / total,
            average_memory_utilization: memory_utilization / total,
            average_operation_intensity: operation_intensity / total,
        }
    }

    /// Aggregate every record once the run is over
    ///
    /// Fails with [`EtsimError::UnfinishedOperator`] if any node never
    /// completed.
    pub fn post_processing(&mut self) -> EtsimResult<&StatisticsReport> {
        log::info!("sys[{}]. Post statistics processing start.", self.sys_id);

        let mut wall_time = 0;
        for record in self.records.values() {
            match record.end {
                Some(end) => wall_time = wall_time.max(end),
                None => {
                    return Err(EtsimError::UnfinishedOperator {
                        node: record.node_id,
                        start: record.start,
                    })
                }
            }
        }

        let type_time = self.extract_type_time();
        let utilizations = self.extract_utilizations();
        let memory = self.memory.as_mut().map(|tracker| {
            let timeline = tracker.build_memory_timeline().clone();
            MemoryReport {
                peak: timeline.peak(),
                average: timeline.average(),
                timeline,
            }
        });

        log::info!("sys[{}]. Post statistics processing end.", self.sys_id);
        Ok(self.report.insert(StatisticsReport {
            sys_id: self.sys_id,
            wall_time,
            type_time,
            utilizations,
            memory,
        }))
    }

    /// Result of [`post_processing`](Self::post_processing), if it ran
    pub fn summary(&self) -> Option<&StatisticsReport> {
        self.report.as_ref()
    }

    /// Log every metric at info level
    pub fn report(&self) {
        let Some(report) = &self.report else {
            log::warn!("sys[{}] statistics requested before post-processing", self.sys_id);
            return;
        };
        let metric = |name: &str, value: &dyn fmt::Display| {
            log::info!("sys[{}], {}={}", self.sys_id, name, value);
        };

        metric("Wall time", &report.wall_time);
        for (op_type, time) in &report.type_time {
            metric(op_type.metric_name(), time);
        }
        let u = &report.utilizations;
        metric("Compute bound percentage", &u.compute_bound_percentage);
        metric("Average compute utilization", &u.average_compute_utilization);
        metric("Average memory utilization", &u.average_memory_utilization);
        metric("Average operation intensity", &u.average_operation_intensity);
        if let Some(memory) = &report.memory {
            metric("Average memory usage", &memory.average);
            metric("Peak memory usage", &memory.peak);
        }
    }
}
