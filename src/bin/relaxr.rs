//! relaxr demo - solve the canonical tridiagonal system twice
//!
//! Runs the parallel solver on the chosen backend and prints its solution,
//! then re-initializes the system, runs the sequential Gauss-Seidel
//! reference and prints that solution for comparison.
//!
//! Any failure is reported once and the process exits with status 1.

use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};
use relaxr::algorithm;
use relaxr::prelude::*;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Parallel relaxation solver demo
#[derive(Parser, Debug)]
#[command(name = "relaxr")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Number of unknowns
    #[arg(short, long, default_value_t = 128)]
    n: usize,

    /// Convergence tolerance on the summed update magnitude
    #[arg(short, long, default_value_t = relaxr::solver::DEFAULT_TOLERANCE)]
    tol: f64,

    /// Relaxation factor
    #[arg(short, long, default_value_t = relaxr::solver::DEFAULT_OMEGA)]
    omega: f64,

    /// Workers per group for the relaxation routine
    #[arg(long, default_value_t = relaxr::solver::DEFAULT_GROUP_SIZE)]
    relax_group: usize,

    /// Workers per group for the reduction routine
    #[arg(long, default_value_t = relaxr::solver::DEFAULT_GROUP_SIZE)]
    reduce_group: usize,

    /// Stage-1 reduction blocks (default: ceil(n / reduce-group))
    #[arg(long)]
    blocks: Option<usize>,

    /// Device to run the parallel solve on
    #[arg(short, long, value_enum, default_value_t = BackendKind::Cpu)]
    backend: BackendKind,

    /// WGSL file replacing the built-in routines (wgpu backend only)
    #[arg(short, long)]
    kernels: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum BackendKind {
    /// Host-emulated device in f64
    Cpu,
    /// WebGPU device in f32
    Wgpu,
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(e) = run(&cli) {
        error!("{:#}", e);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut options = SolverOptions::default()
        .with_tolerance(cli.tol)
        .with_omega(cli.omega)
        .with_relax_group_size(cli.relax_group)
        .with_reduce_group_size(cli.reduce_group);
    if let Some(blocks) = cli.blocks {
        options = options.with_num_blocks(blocks);
    }

    match cli.backend {
        BackendKind::Cpu => {
            if cli.kernels.is_some() {
                anyhow::bail!("--kernels only applies to the wgpu backend");
            }
            let system = LinearSystem::<f64>::canonical(cli.n);
            let session = DeviceSession::new(CpuClient::default(), &system, options)?;
            report(&session, system, cli.tol)
        }
        BackendKind::Wgpu => run_wgpu(cli, options),
    }
}

#[cfg(feature = "wgpu")]
fn run_wgpu(cli: &Cli, options: SolverOptions) -> anyhow::Result<()> {
    let source = match &cli.kernels {
        Some(path) => KernelSource::from_path(path)?,
        None => KernelSource::builtin(),
    };
    let backend = WgpuClient::new(WgpuDevice::new(0), &source)?;
    let system = LinearSystem::<f32>::canonical(cli.n);
    let session = DeviceSession::new(backend, &system, options)?;
    report(&session, system, cli.tol)
}

#[cfg(not(feature = "wgpu"))]
fn run_wgpu(_cli: &Cli, _options: SolverOptions) -> anyhow::Result<()> {
    anyhow::bail!("relaxr was built without the `wgpu` feature")
}

/// Solve on the device, print, reset, solve with the reference, print.
fn report<B: ComputeBackend>(
    session: &DeviceSession<B>,
    mut system: LinearSystem<B::Elem>,
    tol: f64,
) -> anyhow::Result<()> {
    let solution = session.solve()?;
    println!(
        "parallel ({}): {} sweeps, residual {}",
        session.backend().name(),
        solution.sweeps,
        solution.residual
    );
    print_vector(&solution.x);

    system.reset_canonical();
    let reference = algorithm::solve(&mut system, B::Elem::cast_f64(tol));
    println!(
        "reference: {} sweeps, residual {}",
        reference.sweeps, reference.residual
    );
    print_vector(system.x());

    let max_diff = algorithm::max_abs_diff(&solution.x, system.x());
    info!(max_diff, "max elementwise difference");
    Ok(())
}

fn print_vector<T: Real>(x: &[T]) {
    for (i, v) in x.iter().enumerate() {
        println!("x[{:>4}] = {:>12.6}", i, v);
    }
}
