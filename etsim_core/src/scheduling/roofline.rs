use crate::error::{EtsimError, EtsimResult};
use serde::{Deserialize, Serialize};

/// Roofline parameters: compute ceiling and memory bandwidth
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RooflineConfig {
    /// Peak compute throughput in operations per tick
    pub peak_perf: f64,
    /// Memory bandwidth in bytes per tick
    pub bandwidth: f64,
}

/// Cost of one compute node under the roofline model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RooflineEstimate {
    /// Operations per byte touched
    pub operation_intensity: f64,
    /// Achieved operations per tick
    pub perf: f64,
    pub elapsed: u64,
    pub is_memory_bound: bool,
    pub compute_utilization: f64,
    pub memory_utilization: f64,
}

impl RooflineConfig {
    pub fn new(peak_perf: f64, bandwidth: f64) -> Self {
        Self {
            peak_perf,
            bandwidth,
        }
    }

    pub fn validate(&self) -> EtsimResult<()> {
        if !(self.peak_perf > 0.0 && self.peak_perf.is_finite()) {
            return Err(EtsimError::config("roofline peak_perf must be positive"));
        }
        if !(self.bandwidth > 0.0 && self.bandwidth.is_finite()) {
            return Err(EtsimError::config("roofline bandwidth must be positive"));
        }
        Ok(())
    }

    /// Attainable performance at the given operation intensity
    pub fn get_perf(&self, operation_intensity: f64) -> f64 {
        (self.bandwidth * operation_intensity).min(self.peak_perf)
    }

    /// Estimate a node that performs `num_ops` over `io_size` bytes
    ///
    /// Both inputs must be non-zero; validation guarantees that before
    /// dispatch.
    pub fn estimate(&self, num_ops: u64, io_size: u64) -> RooflineEstimate {
        debug_assert!(num_ops > 0 && io_size > 0);
        let operation_intensity = num_ops as f64 / io_size as f64;
        let perf = self.get_perf(operation_intensity);
        let elapsed = (num_ops as f64 / perf) as u64;
        let achieved_bandwidth = perf / operation_intensity;

        RooflineEstimate {
            operation_intensity,
            perf,
            elapsed,
            is_memory_bound: self.bandwidth * operation_intensity < self.peak_perf,
            compute_utilization: perf / self.peak_perf,
            memory_utilization: (achieved_bandwidth / self.bandwidth).min(1.0),
        }
    }
}
