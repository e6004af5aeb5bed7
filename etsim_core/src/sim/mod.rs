//! # Reference simulation kernel
//!
//! [`AnalyticalKernel`] is a small discrete-event kernel that costs every
//! request with closed-form formulas. It is enough to replay a single
//! system's trace end to end and is what the integration tests and
//! benchmarks drive the engine with.
//!
//! ```rust,ignore
//! use etsim_core::sim::{run_to_completion, AnalyticalConfig, AnalyticalKernel};
//!
//! let mut kernel = AnalyticalKernel::new(AnalyticalConfig::default())?;
//! let cycles = run_to_completion(&mut workload, &mut kernel)?;
//! ```

pub mod kernel;

pub use kernel::{AnalyticalConfig, AnalyticalKernel};

use crate::backend::{SimKernel, Tick};
use crate::core::DependencyGraph;
use crate::error::{EtsimError, EtsimResult};
use crate::scheduling::Workload;

/// Fire the workload and pump kernel events until it finishes
///
/// Returns the tick at which the workload terminated, or
/// [`EtsimError::Stalled`] if the kernel runs dry first.
pub fn run_to_completion<G: DependencyGraph>(
    workload: &mut Workload<G>,
    kernel: &mut AnalyticalKernel,
) -> EtsimResult<Tick> {
    workload.fire(kernel)?;

    while !workload.is_finished() {
        let Some(event) = kernel.next_event() else {
            return Err(EtsimError::Stalled {
                remaining: workload.graph().remaining(),
            });
        };
        workload.call(event, kernel)?;
    }

    Ok(workload.finish_tick().unwrap_or_else(|| kernel.current_tick()))
}
