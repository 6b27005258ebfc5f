//! End-to-end tests of the parallel solver on the CPU device

mod common;

use common::{assert_allclose_f32, assert_allclose_f64, create_cpu_client};
use relaxr::algorithm;
use relaxr::prelude::*;

fn reference_solution(n: usize, tol: f64) -> Vec<f64> {
    let mut system = LinearSystem::<f64>::canonical(n);
    algorithm::solve(&mut system, tol);
    system.x().to_vec()
}

#[test]
fn test_matches_reference_n128() {
    let system = LinearSystem::<f64>::canonical(128);
    let session =
        DeviceSession::new(create_cpu_client(), &system, SolverOptions::default()).unwrap();
    let solution = session.solve().unwrap();

    assert!(solution.residual <= 1e-4);
    assert_allclose_f64(
        &solution.x,
        &reference_solution(128, 1e-4),
        0.0,
        1e-3,
        "parallel vs reference",
    );
}

#[test]
fn test_matches_reference_across_geometries() {
    let system = LinearSystem::<f64>::canonical(100);
    let expected = reference_solution(100, 1e-6);
    for (relax, reduce, blocks) in [(1, 1, 100), (8, 4, 3), (32, 64, 1), (128, 16, 7)] {
        let options = SolverOptions::default()
            .with_tolerance(1e-6)
            .with_relax_group_size(relax)
            .with_reduce_group_size(reduce)
            .with_num_blocks(blocks);
        let session = DeviceSession::new(create_cpu_client(), &system, options).unwrap();
        let solution = session.solve().unwrap();
        assert_allclose_f64(
            &solution.x,
            &expected,
            0.0,
            1e-4,
            &format!("relax={relax} reduce={reduce} blocks={blocks}"),
        );
    }
}

/// One host-side Jacobi sweep with relaxation factor `omega`.
fn jacobi_sweep(system: &LinearSystem<f64>, x: &mut [f64], omega: f64) -> f64 {
    let n = system.n();
    let old = x.to_vec();
    let mut resid = 0.0;
    for i in 0..n {
        let mut off_diag = 0.0;
        for (j, &xj) in old.iter().enumerate() {
            if j != i {
                off_diag += system.a(i, j) * xj;
            }
        }
        let temp = (system.b()[i] - off_diag) / system.a(i, i);
        let x_new = old[i] + omega * (temp - old[i]);
        resid += (x_new - old[i]).abs();
        x[i] = x_new;
    }
    resid
}

#[test]
fn test_single_worker_groups_follow_jacobi_iterates() {
    let n = 128;
    let system = LinearSystem::<f64>::canonical(n);
    let options = SolverOptions::default().with_relax_group_size(1);
    let session = DeviceSession::new(create_cpu_client(), &system, options).unwrap();
    let mut lp = ConvergenceLoop::new(&session, 1e-4);

    let mut x = system.x().to_vec();
    for sweep in 1..=10 {
        jacobi_sweep(&system, &mut x, 1.0);
        lp.step().unwrap();
        assert_eq!(session.read_x().unwrap(), x, "sweep {sweep}");
    }
}

#[test]
fn test_single_worker_groups_take_jacobi_sweep_count() {
    let n = 128;
    let system = LinearSystem::<f64>::canonical(n);

    let mut x = system.x().to_vec();
    let mut jacobi_sweeps = 0;
    loop {
        jacobi_sweeps += 1;
        if jacobi_sweep(&system, &mut x, 1.0) <= 1e-4 {
            break;
        }
    }
    let mut gs = system.clone();
    let gauss_seidel = algorithm::solve(&mut gs, 1e-4);

    let options = SolverOptions::default().with_relax_group_size(1);
    let session = DeviceSession::new(create_cpu_client(), &system, options).unwrap();
    let solution = session.solve().unwrap();

    assert_eq!(solution.sweeps, jacobi_sweeps);
    assert!(
        solution.sweeps > gauss_seidel.sweeps,
        "parallel sweep behaved like Gauss-Seidel ({} sweeps)",
        solution.sweeps
    );
}

#[test]
fn test_solution_satisfies_system() {
    let system = LinearSystem::<f64>::canonical(50);
    let options = SolverOptions::default().with_tolerance(1e-10);
    let session = DeviceSession::new(create_cpu_client(), &system, options).unwrap();
    let x = session.solve().unwrap().x;
    for i in 0..50 {
        let ax: f64 = (0..50).map(|j| system.a(i, j) * x[j]).sum();
        assert!((ax - system.b()[i]).abs() < 1e-7, "row {i}");
    }
}

#[test]
fn test_over_relaxation_converges() {
    let system = LinearSystem::<f64>::canonical(64);
    let options = SolverOptions::default().with_omega(0.8);
    let session = DeviceSession::new(create_cpu_client(), &system, options).unwrap();
    let solution = session.solve().unwrap();
    assert_allclose_f64(
        &solution.x,
        &reference_solution(64, 1e-4),
        0.0,
        1e-3,
        "omega = 0.8",
    );
}

#[test]
fn test_f32_session() {
    let system = LinearSystem::<f32>::canonical(16);
    let options = SolverOptions::default().with_tolerance(1e-2);
    let session = DeviceSession::new(CpuClient::<f32>::default(), &system, options).unwrap();
    let solution = session.solve().unwrap();

    let expected: Vec<f32> = reference_solution(16, 1e-8)
        .into_iter()
        .map(|v| v as f32)
        .collect();
    assert_allclose_f32(&solution.x, &expected, 0.0, 5e-2, "f32 parallel");
}

#[test]
fn test_divergent_omega_never_converges() {
    let system = LinearSystem::<f64>::canonical(128);
    let options = SolverOptions::default().with_omega(2.5);
    let session = DeviceSession::new(create_cpu_client(), &system, options).unwrap();
    let mut lp = ConvergenceLoop::new(&session, 1e-4);

    lp.step().unwrap();
    let first = lp.residual();
    for _ in 1..50 {
        assert_eq!(lp.step().unwrap(), LoopState::Iterating);
    }
    assert_eq!(lp.sweeps(), 50);
    assert!(lp.residual() > first * 1e6, "residual {} did not grow", lp.residual());
}

#[test]
fn test_reset_then_resolve_is_reproducible() {
    // every worker reads the pre-sweep x, so thread scheduling cannot change
    // the sequence of sweeps
    let mut system = LinearSystem::<f64>::canonical(32);
    let options = SolverOptions::default().with_relax_group_size(4);
    let session = DeviceSession::new(create_cpu_client(), &system, options).unwrap();
    let first = session.solve().unwrap();

    system.reset_canonical();
    session.load(&system).unwrap();
    let second = session.solve().unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_scalar_view_aliases_partials() {
    let system = LinearSystem::<f64>::canonical(200);
    let options = SolverOptions::default().with_num_blocks(5);
    let session = DeviceSession::new(create_cpu_client(), &system, options).unwrap();
    let backend = session.backend();

    let mut lp = ConvergenceLoop::new(&session, 1e-4);
    lp.step().unwrap();

    let layout = session.partials_layout();
    let parent = backend.to_vec(session.partials()).unwrap();
    let slot = (layout.scalar_offset / 8) as usize;
    assert_eq!(parent[slot], lp.residual());

    let blocks: f64 = parent[..layout.num_blocks].iter().sum();
    assert!((blocks - lp.residual()).abs() <= 1e-12 * blocks);

    // a write through the view shows up in the parent's byte range
    let scalar = session.reduction().scalar();
    backend.write(scalar, &[-3.25]).unwrap();
    let parent = backend.to_vec(session.partials()).unwrap();
    assert_eq!(parent[slot], -3.25);
    assert_eq!(scalar.byte_offset(), layout.scalar_offset);
}
