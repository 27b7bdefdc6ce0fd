//! μKernel Simulator CLI
//!
//! Talks to a running `simkd`, or runs the standalone simulations
//! locally.
//!
//! # Usage
//!
//! ```bash
//! # Remote
//! simk create shell --priority 1 --burst 4 --arrival 0
//! simk list
//! simk dispatch --policy priority
//! simk pcb 3fa1c09e
//! simk destroy 3fa1c09e
//!
//! # Local
//! simk lru --capacity 4 7 0 1 2 0 3 0 4 2 3 0 3
//! simk timeline --policy fcfs a:2:5:0 b:1:3:1 c:0:2:6
//! ```

use clap::{Parser, Subcommand};
use simkernel::{Kernel, Pid, Policy, ProcessSpec, SimConfig};
use simremote::server::DEFAULT_ADDR;
use simremote::Client;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// simk - μKernel simulator CLI
#[derive(Parser)]
#[command(name = "simk")]
#[command(author = "μOS Project")]
#[command(version)]
#[command(about = "μKernel simulator client", long_about = None)]
struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Server address
    #[arg(short, long, global = true, env = "SIMK_ADDR", default_value = DEFAULT_ADDR)]
    addr: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a process on the server
    Create {
        /// Process name
        name: String,
        /// Priority (0 = most urgent, 10 = least)
        #[arg(long, default_value = "5")]
        priority: i64,
        /// Burst time
        #[arg(long, default_value = "1")]
        burst: i64,
        /// Arrival time
        #[arg(long, default_value = "0")]
        arrival: i64,
    },

    /// List processes on the server
    List,

    /// Destroy a process on the server
    Destroy {
        /// Process ID
        pid: String,
    },

    /// Dispatch the next process on the server
    Dispatch {
        /// Scheduling policy (fcfs, priority)
        #[arg(long, default_value = "fcfs")]
        policy: Policy,
    },

    /// Show the PCB of a process on the server
    Pcb {
        /// Process ID
        pid: String,
    },

    /// Replay a page reference string under LRU (local)
    Lru {
        /// Number of frames
        #[arg(short, long, default_value = "4")]
        capacity: usize,
        /// Page references
        #[arg(required = true)]
        pages: Vec<u32>,
    },

    /// Compute a non-preemptive schedule (local)
    Timeline {
        /// Scheduling policy (fcfs, priority)
        #[arg(long, default_value = "fcfs")]
        policy: Policy,
        /// Processes as name:priority:burst:arrival
        #[arg(required = true)]
        processes: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();

    let client = Client::new(cli.addr);

    match cli.command {
        Commands::Create { name, priority, burst, arrival } => {
            let pid = client.create_process(&name, priority, burst, arrival).await?;
            println!("Created process {}", pid);
        }
        Commands::List => {
            let processes = client.list_processes().await?;
            if processes.is_empty() {
                println!("No processes");
            }
            for p in processes {
                println!("{} - {} ({})", p.pid, p.name, p.state);
            }
        }
        Commands::Destroy { pid } => {
            let pid = Pid::from(pid);
            if client.destroy_process(&pid).await? {
                println!("Destroyed {}", pid);
            } else {
                println!("No process {}", pid);
            }
        }
        Commands::Dispatch { policy } => match client.dispatch(policy).await? {
            Some(pid) => println!("Dispatched {} ({})", pid, policy),
            None => println!("Ready queue is empty"),
        },
        Commands::Pcb { pid } => {
            let pcb = client.pcb_info(&Pid::from(pid)).await?;
            println!("{}", serde_json::to_string_pretty(&pcb)?);
        }
        Commands::Lru { capacity, pages } => run_lru(&pages, capacity)?,
        Commands::Timeline { policy, processes } => run_timeline(policy, &processes)?,
    }

    Ok(())
}

/// Print an LRU replay, one row per reference
fn run_lru(pages: &[u32], capacity: usize) -> Result<(), Box<dyn std::error::Error>> {
    let kernel = Kernel::new(SimConfig::default())?;
    let trace = kernel.simulate_reference_string(pages, capacity)?;

    for (i, step) in trace.steps.iter().enumerate() {
        let slots: Vec<String> = step
            .slots
            .iter()
            .map(|s| s.map_or_else(|| "-".to_string(), |p| p.to_string()))
            .collect();
        println!(
            "{:>3}  page {:>3}  [{}]  {}",
            i + 1,
            step.page,
            slots.join(" "),
            if step.fault { "fault" } else { "hit" }
        );
    }

    println!("Total page faults: {}", trace.total_faults);
    Ok(())
}

/// Print a schedule for processes given as name:priority:burst:arrival
fn run_timeline(policy: Policy, specs: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let kernel = Kernel::new(SimConfig::default())?;

    for raw in specs {
        let spec = parse_spec(raw)?;
        // only the schedule matters here
        kernel.spawn(spec.with_memory(0))?;
    }

    let report = kernel.schedule_report(policy);
    let names: std::collections::HashMap<Pid, String> = kernel
        .list_all_processes()
        .into_iter()
        .map(|p| (p.pid, p.name))
        .collect();

    println!(
        "{:<12} {:>4} {:>7} {:>5} {:>6} {:>6} {:>5} {:>10}",
        "name", "prio", "arrival", "burst", "start", "finish", "wait", "turnaround"
    );
    for e in &report.entries {
        let name = names.get(&e.pid).map_or("?", String::as_str);
        println!(
            "{:<12} {:>4} {:>7} {:>5} {:>6} {:>6} {:>5} {:>10}",
            name, e.priority, e.arrival, e.burst, e.start, e.finish, e.wait, e.turnaround
        );
    }

    println!("Average wait: {:.2}", report.avg_wait);
    println!("Average turnaround: {:.2}", report.avg_turnaround);
    Ok(())
}

fn parse_spec(raw: &str) -> Result<ProcessSpec, String> {
    let fields: Vec<&str> = raw.split(':').collect();
    let [name, priority, burst, arrival] = fields.as_slice() else {
        return Err(format!("expected name:priority:burst:arrival, got '{}'", raw));
    };

    let number = |field: &str, what: &str| {
        field
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("invalid {} '{}' in '{}'", what, field, raw))
    };

    Ok(ProcessSpec::new(
        name,
        number(*priority, "priority")?,
        number(*burst, "burst")?,
        number(*arrival, "arrival")?,
    ))
}
