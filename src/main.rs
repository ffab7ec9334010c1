use average::{Estimate, Mean};
use rand::prelude::*;
use schedsim::{Policy, ProcessSpec, compare_all, simulate_multicore};

fn main() {
    env_logger::init();

    let specs = bernoulli_processes(60, 0.25, 0.4, 2, 9, 0);
    println!("workload: {} processes\n", specs.len());

    let results = compare_all(&specs, 2).expect("generated workload is valid");
    println!(
        "{:<36} {:>10} {:>8} {:>8} {:>8} {:>8}",
        "algorithm", "turnaround", "waiting", "switches", "energy", "makespan"
    );
    for entry in results.values() {
        println!(
            "{:<36} {:>10.2} {:>8.2} {:>8} {:>8.2} {:>8}",
            entry.algorithm,
            entry.avg_turnaround,
            entry.avg_waiting,
            entry.context_switches,
            entry.total_energy,
            entry.completion_time
        );
    }

    let multicore = simulate_multicore(Policy::Fcfs, &specs, 4).expect("generated workload is valid");
    let mean_util: Mean = multicore
        .core_utilizations
        .iter()
        .map(|core| core.utilization)
        .collect();
    println!(
        "\n4-core FCFS: makespan {}, speedup {:.2}, load balance {:.2}, mean core utilization {:.2}%",
        multicore.metrics.total_completion,
        multicore.speedup,
        multicore.load_balance_score,
        mean_util.estimate()
    );
}

fn bernoulli_processes(
    ticks: u64,
    p_arrival: f64,
    p_short: f64,
    short_burst: u64,
    long_burst: u64,
    seed: u64,
) -> Vec<ProcessSpec> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut specs = Vec::new();

    for t in 0..ticks {
        if rng.random::<f64>() < p_arrival {
            let burst = if rng.random::<f64>() < p_short {
                short_burst
            } else {
                long_burst
            };

            specs.push(ProcessSpec {
                pid: specs.len() as u32 + 1,
                arrival: t,
                burst,
                priority: (specs.len() % 5) as i32 + 1,
            });
        }
    }

    // An unlucky seed may produce no arrivals at all.
    if specs.is_empty() {
        specs.push(ProcessSpec {
            pid: 1,
            arrival: 0,
            burst: long_burst,
            priority: 1,
        });
    }

    specs
}
