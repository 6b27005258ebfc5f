//! Common test utilities
#![allow(dead_code)]

use relaxr::runtime::cpu::{CpuClient, CpuDevice};
#[cfg(feature = "wgpu")]
use relaxr::runtime::source::KernelSource;
#[cfg(feature = "wgpu")]
use relaxr::runtime::wgpu::{WgpuClient, WgpuDevice};

/// Create a CPU client for testing
pub fn create_cpu_client() -> CpuClient<f64> {
    CpuClient::new(CpuDevice::new())
}

/// Create a WebGPU client with the built-in kernels, returning None if
/// WebGPU is unavailable
#[cfg(feature = "wgpu")]
pub fn create_wgpu_client() -> Option<WgpuClient> {
    if !relaxr::runtime::wgpu::is_wgpu_available() {
        return None;
    }
    WgpuClient::new(WgpuDevice::new(0), &KernelSource::builtin()).ok()
}

/// Assert two f64 slices are close within tolerance
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_allclose_f64(a: &[f64], b: &[f64], rtol: f64, atol: f64, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}

/// Assert two f32 slices are close within tolerance
pub fn assert_allclose_f32(a: &[f32], b: &[f32], rtol: f32, atol: f32, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}
