use serde::Serialize;

use crate::sched::SimResult;

/// Fixed-decimal rounding so golden-output comparisons stay exact: 2 places
/// for time/energy values, 4 for throughput and fairness.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[derive(Debug, Clone, Serialize)]
pub struct AdvancedMetrics {
    pub cpu_utilization: f64,
    pub throughput: f64,
    pub avg_response_time: f64,
    pub fairness_index: f64,
}

/// Derives utilization, throughput, response time, and fairness from a
/// completed run. Response time is measured from each process's recorded
/// first-execution tick, not from its arrival.
pub fn advanced_metrics(result: &SimResult) -> AdvancedMetrics {
    let makespan = result.makespan();
    if makespan == 0 || result.processes.is_empty() {
        return AdvancedMetrics {
            cpu_utilization: 0.0,
            throughput: 0.0,
            avg_response_time: 0.0,
            fairness_index: 1.0,
        };
    }

    let n = result.processes.len() as f64;
    let total_burst: u64 = result.processes.iter().map(|p| p.burst).sum();
    let total_response: u64 = result
        .processes
        .iter()
        .map(|p| p.start_time - p.arrival)
        .sum();
    let turnarounds: Vec<f64> = result
        .processes
        .iter()
        .map(|p| p.turnaround as f64)
        .collect();

    AdvancedMetrics {
        cpu_utilization: round_to(total_burst as f64 / makespan as f64 * 100.0, 2),
        throughput: round_to(n / makespan as f64, 4),
        avg_response_time: round_to(total_response as f64 / n, 2),
        fairness_index: round_to(jain_fairness(&turnarounds), 4),
    }
}

/// Jain's Fairness Index: `(Σx)² / (n·Σx²)`, in (0, 1], 1 meaning perfectly
/// equal values. Defined as 1.0 for the degenerate all-zero case.
pub fn jain_fairness(values: &[f64]) -> f64 {
    let sum: f64 = values.iter().sum();
    let sum_squares: f64 = values.iter().map(|x| x * x).sum();
    if sum_squares == 0.0 {
        return 1.0;
    }
    sum * sum / (values.len() as f64 * sum_squares)
}
