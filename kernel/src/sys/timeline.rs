//! Schedule Timelines
//!
//! Non-preemptive what-if timelines computed from declared burst and
//! arrival times. Independent of the live scheduler queues.

use super::process::{Pid, Process};
use super::scheduler::Policy;
use serde::{Deserialize, Serialize};

/// One row of a timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub pid: Pid,
    pub arrival: u64,
    pub burst: u64,
    pub priority: u8,
    pub start: u64,
    pub finish: u64,
    pub wait: u64,
    pub turnaround: u64,
}

/// Complete timeline with averages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleReport {
    /// Policy used to order the processes
    pub policy: Policy,
    /// Rows in execution order
    pub entries: Vec<TimelineEntry>,
    /// Mean wait time
    pub avg_wait: f64,
    /// Mean turnaround time
    pub avg_turnaround: f64,
}

/// Compute a timeline over `processes`
///
/// FCFS orders by arrival, priority by (priority, arrival). Both sorts are
/// stable, so equal keys keep their table order.
pub fn simulate(policy: Policy, processes: &[Process]) -> ScheduleReport {
    let mut order: Vec<&Process> = processes.iter().collect();
    match policy {
        Policy::Fcfs => order.sort_by_key(|p| p.arrival),
        Policy::Priority => order.sort_by_key(|p| (p.priority, p.arrival)),
    }

    let mut clock = 0u64;
    let mut entries = Vec::with_capacity(order.len());

    for p in order {
        let arrival = u64::from(p.arrival);
        let burst = u64::from(p.burst);
        let start = clock.max(arrival);
        let finish = start + burst;

        entries.push(TimelineEntry {
            pid: p.pid.clone(),
            arrival,
            burst,
            priority: p.priority,
            start,
            finish,
            wait: start - arrival,
            turnaround: finish - arrival,
        });

        clock = finish;
    }

    let (avg_wait, avg_turnaround) = if entries.is_empty() {
        (0.0, 0.0)
    } else {
        let n = entries.len() as f64;
        (
            entries.iter().map(|e| e.wait as f64).sum::<f64>() / n,
            entries.iter().map(|e| e.turnaround as f64).sum::<f64>() / n,
        )
    };

    ScheduleReport {
        policy,
        entries,
        avg_wait,
        avg_turnaround,
    }
}
