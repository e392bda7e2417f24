use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use ogl_executor::{
    BackendKind, DeviceAssignment, ExecutionContext, ExecutorError, ExecutorHandler,
    ExecutorRuntime, ObjectRegistry, ProcessGroup, SerialGroup, SolverControls, StaticGroup,
    StaticRuntime,
};

#[derive(Parser)]
#[command(
    name = "ogl-cli",
    about = "Inspect executor selection for accelerated solvers",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show compiled backends and visible devices
    Backends {
        /// Device count override, e.g. cuda=4 (repeatable)
        #[arg(long = "devices", value_parser = parse_devices)]
        devices: Vec<(BackendKind, usize)>,
    },
    /// Build the executor handler for a field and report the selection
    Select {
        /// Solver dictionary as a JSON object
        #[arg(long)]
        config: Option<PathBuf>,
        /// Backend name, overrides the dictionary entry
        #[arg(long)]
        executor: Option<String>,
        /// Field the solver works on
        #[arg(long, default_value = "p")]
        field: String,
        /// Rank of this process
        #[arg(long, default_value_t = 0)]
        rank: usize,
        /// Number of processes; more than one makes the run distributed
        #[arg(long, default_value_t = 1)]
        size: usize,
        /// Treat the run as distributed even with a single process
        #[arg(long)]
        parallel: bool,
        /// Device count override, e.g. cuda=4 (repeatable)
        #[arg(long = "devices", value_parser = parse_devices)]
        devices: Vec<(BackendKind, usize)>,
    },
    /// Print the rank to device table of a distributed run
    Plan {
        /// Number of processes
        #[arg(long)]
        ranks: usize,
        /// Ranks sharing one device index
        #[arg(long, default_value = "1")]
        ranks_per_gpu: NonZeroUsize,
        /// Devices visible on each node
        #[arg(long)]
        devices: usize,
    },
}

fn parse_devices(arg: &str) -> Result<(BackendKind, usize), String> {
    let (name, count) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected <backend>=<count>, got '{arg}'"))?;
    let kind: BackendKind = name.parse().map_err(|err: ExecutorError| err.to_string())?;
    if !kind.is_device() {
        return Err(format!("{kind} is a host backend and has no devices"));
    }
    let count = count
        .parse::<usize>()
        .map_err(|err| format!("invalid device count '{count}': {err}"))?;
    Ok((kind, count))
}

fn build_runtime(devices: &[(BackendKind, usize)]) -> StaticRuntime {
    devices
        .iter()
        .fold(StaticRuntime::from_build(), |rt, (kind, count)| {
            rt.with_devices(*kind, *count)
        })
}

fn print_backends(runtime: &StaticRuntime) {
    let info = runtime.version_info();
    for kind in BackendKind::ALL {
        let version = info
            .module(kind)
            .map(|v| v.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        if kind.is_device() && info.is_compiled(kind) {
            println!("{:<10} {} devices={}", kind.name(), version, runtime.num_devices(kind));
        } else {
            println!("{:<10} {}", kind.name(), version);
        }
    }
}

fn select(
    config: Option<PathBuf>,
    executor: Option<String>,
    field: &str,
    rank: usize,
    size: usize,
    parallel: bool,
    devices: &[(BackendKind, usize)],
) -> Result<()> {
    let mut controls = match &config {
        Some(path) => SolverControls::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => SolverControls::new(),
    };
    if let Some(name) = executor {
        controls.insert("executor", name);
    }

    let group: Arc<dyn ProcessGroup> = if parallel || size > 1 {
        Arc::new(
            StaticGroup::new(rank, size)
                .ok_or_else(|| anyhow!("rank {rank} is outside a group of {size}"))?,
        )
    } else if rank != 0 {
        return Err(anyhow!("rank {rank} given for a serial run; pass --parallel or --size"));
    } else {
        Arc::new(SerialGroup)
    };
    let ctx = ExecutionContext::new(group, Arc::new(build_runtime(devices)));
    let registry = Arc::new(ObjectRegistry::new());

    let handler = ExecutorHandler::new(&registry, &controls, field, &ctx)?;
    debug!(key = handler.key(), rank, size, "built executor handler");
    let exec = handler.device_executor()?;
    let host = handler.host_executor()?;

    println!("key: {}", handler.key());
    println!("backend: {}", handler.backend_name());
    println!("executor: {exec}");
    println!("host_executor: {host}");
    println!("device_index: {}", handler.device_assignment().device_index);
    println!("force_host_buffer: {}", handler.force_host_buffer());
    match handler.device_communicator() {
        Some(comm) => println!("device_communicator: {comm}"),
        None => println!("device_communicator: none"),
    }
    Ok(())
}

fn print_plan(ranks: usize, ranks_per_gpu: NonZeroUsize, devices: usize) -> Result<()> {
    let distributed = ranks > 1;
    for rank in 0..ranks {
        let assignment = DeviceAssignment::new(rank, ranks_per_gpu, distributed);
        match assignment.wrap(devices) {
            Some(device) => println!("rank {rank:>4} -> device {device}"),
            None => println!("rank {rank:>4} -> no device"),
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Backends { devices } => {
            print_backends(&build_runtime(&devices));
            Ok(())
        }
        Commands::Select {
            config,
            executor,
            field,
            rank,
            size,
            parallel,
            devices,
        } => select(config, executor, &field, rank, size, parallel, &devices),
        Commands::Plan {
            ranks,
            ranks_per_gpu,
            devices,
        } => print_plan(ranks, ranks_per_gpu, devices),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(1)
        }
    }
}
