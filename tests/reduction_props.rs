//! Property tests of the two-stage residual reduction

mod common;

use common::create_cpu_client;
use proptest::prelude::*;
use relaxr::prelude::*;
use relaxr::solver::ResidualReduction;

fn two_stage_sum(data: &[f64], num_blocks: usize, group_size: usize) -> (f64, f64) {
    let backend = create_cpu_client();
    let input = backend.upload("input", data, Access::ReadOnly).unwrap();
    let (partials, layout) = ResidualReduction::alloc_partials(&backend, num_blocks).unwrap();
    let reduction =
        ResidualReduction::bind(&backend, &input, data.len(), &partials, layout, group_size)
            .unwrap();
    let first = reduction.reduce(&backend).unwrap();
    let second = reduction.reduce(&backend).unwrap();
    (first, second)
}

// Residual magnitudes are non-negative
fn residual_strategy() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0f64..1000.0f64, 1..2000)
}

fn group_size_strategy() -> impl Strategy<Value = usize> {
    (0u32..9).prop_map(|p| 1usize << p)
}

proptest! {
    // Property: the two-stage result equals the plain sum within rounding
    #[test]
    fn test_reduction_equals_sum(
        data in residual_strategy(),
        num_blocks in 1usize..300,
        group_size in group_size_strategy()
    ) {
        let expected: f64 = data.iter().sum();
        let (got, _) = two_stage_sum(&data, num_blocks, group_size);
        let tol = 1e-5 * expected.max(f64::MIN_POSITIVE);
        prop_assert!((got - expected).abs() <= tol, "got {}, expected {}", got, expected);
    }

    // Property: re-running on an unchanged input yields the same scalar
    #[test]
    fn test_reduction_idempotent(
        data in residual_strategy(),
        num_blocks in 1usize..64,
        group_size in group_size_strategy()
    ) {
        let (first, second) = two_stage_sum(&data, num_blocks, group_size);
        prop_assert_eq!(first.to_bits(), second.to_bits());
    }
}

#[test]
fn test_more_blocks_than_elements() {
    // 3 elements over 8 blocks: chunk 1, blocks 3..8 are empty
    let (sum, _) = two_stage_sum(&[1.5, 2.5, 4.0], 8, 4);
    assert_eq!(sum, 8.0);
}

#[test]
fn test_single_element() {
    let (sum, _) = two_stage_sum(&[42.0], 1, 64);
    assert_eq!(sum, 42.0);
}

#[test]
fn test_session_reduction_idempotent() {
    let system = LinearSystem::<f64>::canonical(96);
    let session =
        DeviceSession::new(create_cpu_client(), &system, SolverOptions::default()).unwrap();
    session.relaxation().launch(session.backend()).unwrap();

    let reduction = session.reduction();
    let first = reduction.reduce(session.backend()).unwrap();
    let second = reduction.reduce(session.backend()).unwrap();
    assert_eq!(first, second);

    let resid = session.backend().to_vec(session.residuals()).unwrap();
    let expected: f64 = resid.iter().sum();
    assert!((first - expected).abs() <= 1e-12 * expected);
}
