//! GPU selection for the wgpu backend
//!
//! A [`WgpuDevice`] is only an adapter index until [`WgpuClient::new`] opens
//! it. After that it carries the adapter's name, API and limits, which the
//! client turns into the solver's [`DeviceLimits`].
//!
//! [`WgpuClient::new`]: super::WgpuClient::new
//! [`DeviceLimits`]: crate::runtime::DeviceLimits

use std::fmt;
use std::sync::Arc;
use wgpu::{Adapter, Backend, Limits};

use crate::error::{Error, Result};

/// What the solver keeps about an opened adapter.
#[derive(Clone, Debug)]
pub(crate) struct AdapterInfo {
    name: String,
    backend: Backend,
    limits: Limits,
}

/// A GPU the relaxation routines can run on, named by adapter index.
///
/// ```ignore
/// let client = WgpuClient::new(WgpuDevice::new(0), &KernelSource::builtin())?;
/// println!("solving on {}", client.device().adapter_name());
/// ```
#[derive(Clone)]
pub struct WgpuDevice {
    pub(crate) index: usize,
    info: Option<Arc<AdapterInfo>>,
}

impl WgpuDevice {
    /// Refer to the adapter at `index` without opening it.
    pub fn new(index: usize) -> Self {
        Self { index, info: None }
    }

    pub(crate) fn with_info(index: usize, info: Arc<AdapterInfo>) -> Self {
        Self {
            index,
            info: Some(info),
        }
    }

    /// Adapter name as reported by the driver, `"unknown"` before opening.
    pub fn adapter_name(&self) -> String {
        self.info
            .as_ref()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Graphics API the adapter runs on
    pub fn backend(&self) -> Option<Backend> {
        self.info.as_ref().map(|i| i.backend)
    }

    /// Adapter limits. An unopened device reports the WebGPU defaults.
    pub fn limits(&self) -> Limits {
        self.info
            .as_ref()
            .map(|i| i.limits.clone())
            .unwrap_or_default()
    }

    /// Widest workgroup a relaxation or reduction launch may request
    pub fn max_workgroup_size(&self) -> u32 {
        let limits = self.limits();
        limits
            .max_compute_workgroup_size_x
            .min(limits.max_compute_invocations_per_workgroup)
    }
}

impl crate::runtime::Device for WgpuDevice {
    fn id(&self) -> usize {
        self.index
    }

    fn name(&self) -> String {
        format!("wgpu:{}", self.index)
    }
}

impl fmt::Debug for WgpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WgpuDevice")
            .field("index", &self.index)
            .field("adapter", &self.adapter_name())
            .field("backend", &self.backend())
            .finish()
    }
}

// ============================================================================
// Adapter Discovery
// ============================================================================

/// Open the adapter at `index`.
///
/// An index past the end of the enumeration picks the high-performance
/// adapter instead.
pub(crate) async fn query_adapter_info(index: usize) -> Result<(Adapter, Arc<AdapterInfo>)> {
    let instance = wgpu::Instance::default();
    let mut adapters: Vec<_> = instance.enumerate_adapters(wgpu::Backends::all()).await;

    if adapters.is_empty() {
        return Err(Error::device("enumerate_adapters", "no GPU adapter to solve on"));
    }

    let adapter = if index < adapters.len() {
        adapters.swap_remove(index)
    } else {
        instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| Error::device("request_adapter", e.to_string()))?
    };

    let raw = adapter.get_info();
    let info = Arc::new(AdapterInfo {
        name: raw.name,
        backend: raw.backend,
        limits: adapter.limits(),
    });

    Ok((adapter, info))
}

pub(crate) fn query_adapter_info_blocking(index: usize) -> Result<(Adapter, Arc<AdapterInfo>)> {
    pollster::block_on(query_adapter_info(index))
}
