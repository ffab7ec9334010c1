pub mod compare;
pub mod core;
pub mod energy;
pub mod metrics;
pub mod sched;

pub use compare::{CompareEntry, compare_all};
pub use crate::core::{
    GanttLabel, GanttSegment, ProcessSpec, SimError, TaskClass, Ticks, TimelineEvent,
};
pub use energy::{DvfsConfig, EnergyResult, HysteresisGovernor, PowerState, estimate_energy};
pub use metrics::{AdvancedMetrics, advanced_metrics, jain_fairness};
pub use sched::{
    AlgorithmId, CoreReport, Metrics, MulticoreResult, Policy, ProcessResult, RunRequest,
    SimResult, simulate, simulate_multicore,
};
