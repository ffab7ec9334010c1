use serde::Serialize;
use std::collections::BTreeMap;

use crate::core::{ProcessSpec, SimError, Ticks};
use crate::energy::{DvfsConfig, estimate_energy};
use crate::sched::{Policy, simulate};

/// One policy's row in a comparison run.
#[derive(Debug, Clone, Serialize)]
pub struct CompareEntry {
    pub algorithm: String,
    pub avg_turnaround: f64,
    pub avg_waiting: f64,
    pub context_switches: u32,
    pub total_energy: f64,
    pub completion_time: Ticks,
}

/// Runs all six policies on one process set, with the default-config energy
/// estimate for each, keyed by the policy's request name. Validation is
/// shared, so one invalid input fails the whole comparison up front.
pub fn compare_all(
    specs: &[ProcessSpec],
    quantum: Ticks,
) -> Result<BTreeMap<&'static str, CompareEntry>, SimError> {
    let policies = [
        Policy::Fcfs,
        Policy::SjfNonPreemptive,
        Policy::Srtf,
        Policy::RoundRobin { quantum },
        Policy::Priority { preemptive: false },
        Policy::EnergyAwareHybrid { threshold: None },
    ];
    let config = DvfsConfig::default();

    let mut results = BTreeMap::new();
    for policy in policies {
        let result = simulate(policy, specs)?;
        let energy = estimate_energy(&result.gantt, result.context_switches, &config);
        results.insert(
            policy.key(),
            CompareEntry {
                algorithm: result.algorithm,
                avg_turnaround: result.metrics.avg_turnaround,
                avg_waiting: result.metrics.avg_waiting,
                context_switches: result.context_switches,
                total_energy: energy.total_energy,
                completion_time: result.metrics.total_completion,
            },
        );
    }
    Ok(results)
}
