//! Parallel solver on a WebGPU device
//!
//! Each test prints and returns when no adapter is available.
#![cfg(feature = "wgpu")]

mod common;

use common::{assert_allclose_f32, create_wgpu_client};
use relaxr::algorithm;
use relaxr::prelude::*;
use relaxr::solver::ResidualReduction;

#[test]
fn test_wgpu_matches_reference() {
    let Some(backend) = create_wgpu_client() else {
        println!("No GPU available, skipping test");
        return;
    };
    // f32 rounding keeps Σ|Δx| from settling far below 1e-3 at this size
    let system = LinearSystem::<f32>::canonical(32);
    let options = SolverOptions::default().with_tolerance(1e-2);
    let session = DeviceSession::new(backend, &system, options).unwrap();
    let solution = session.solve().unwrap();

    let mut reference = LinearSystem::<f64>::canonical(32);
    algorithm::solve(&mut reference, 1e-8);
    let expected: Vec<f32> = reference.x().iter().map(|&v| v as f32).collect();
    assert_allclose_f32(&solution.x, &expected, 0.0, 5e-2, "wgpu vs reference");
}

#[test]
fn test_wgpu_two_stage_reduction() {
    let Some(backend) = create_wgpu_client() else {
        println!("No GPU available, skipping test");
        return;
    };
    let data: Vec<f32> = (0..5000).map(|i| (i % 13) as f32 * 0.25).collect();
    let expected: f32 = data.iter().sum();

    let input = backend.upload("input", &data, Access::ReadOnly).unwrap();
    let (partials, layout) = ResidualReduction::alloc_partials(&backend, 37).unwrap();
    let reduction =
        ResidualReduction::bind(&backend, &input, data.len(), &partials, layout, 64).unwrap();

    let first = reduction.reduce(&backend).unwrap();
    let second = reduction.reduce(&backend).unwrap();
    assert!((first - expected).abs() <= 1e-5 * expected);
    assert_eq!(first.to_bits(), second.to_bits());

    // the scalar landed in the padded slot of the parent buffer
    let parent = backend.to_vec(&partials).unwrap();
    assert_eq!(parent[(layout.scalar_offset / 4) as usize], first);
}

#[test]
fn test_wgpu_custom_kernel_source() {
    if !relaxr::runtime::wgpu::is_wgpu_available() {
        println!("No GPU available, skipping test");
        return;
    }
    let builtin = KernelSource::builtin();
    let copy = KernelSource::from_text(builtin.text().to_string(), "copy").unwrap();
    let backend = WgpuClient::new(WgpuDevice::new(0), &copy).unwrap();

    let system = LinearSystem::<f32>::canonical(8);
    let options = SolverOptions::default().with_tolerance(1e-2);
    let session = DeviceSession::new(backend, &system, options).unwrap();
    assert!(session.solve().unwrap().residual <= 1e-2);
}

#[test]
fn test_wgpu_invalid_kernel_source_is_error() {
    if !relaxr::runtime::wgpu::is_wgpu_available() {
        println!("No GPU available, skipping test");
        return;
    }
    let broken = KernelSource::from_text(
        "fn relax_sweep() { not wgsl } fn block_sum() {}",
        "broken",
    )
    .unwrap();
    assert!(WgpuClient::new(WgpuDevice::new(0), &broken).is_err());
}

#[test]
fn test_wgpu_finish_waits_for_queued_sweeps() {
    let Some(backend) = create_wgpu_client() else {
        println!("No GPU available, skipping test");
        return;
    };
    let system = LinearSystem::<f32>::canonical(256);
    let session = DeviceSession::new(backend, &system, SolverOptions::default()).unwrap();
    for _ in 0..200 {
        session.relaxation().launch(session.backend()).unwrap();
    }
    session.backend().finish().unwrap();
    assert!(session.read_x().unwrap().iter().all(|v| v.is_finite()));
}

#[test]
fn test_wgpu_rejects_block_count_over_group_limit() {
    let Some(backend) = create_wgpu_client() else {
        println!("No GPU available, skipping test");
        return;
    };
    let too_many = backend.limits().max_groups + 1;
    let system = LinearSystem::<f32>::canonical(16);
    let options = SolverOptions::default().with_num_blocks(too_many);
    let err = DeviceSession::new(backend, &system, options).unwrap_err();
    assert!(matches!(err, Error::BackendLimitation { .. }));
}
