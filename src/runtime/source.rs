//! Kernel source loading
//!
//! Compiled backends receive the text of the `relax_sweep` and `block_sum`
//! routines as an opaque artifact. The text is either the WGSL shipped with
//! the crate or a file supplied at run time. A file that is missing, too
//! large or does not declare both entry points is a fatal error; compilation
//! problems are reported later by the backend that builds it.

use std::borrow::Cow;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::kernel::{BLOCK_SUM_ENTRY, RELAX_ENTRY};
use crate::error::{Error, Result};

/// Largest kernel source file accepted, in bytes
pub const MAX_SOURCE_SIZE: u64 = 0x10_0000;

/// Text of the solver's parallel routines
#[derive(Clone)]
pub struct KernelSource {
    text: Cow<'static, str>,
    origin: String,
}

impl KernelSource {
    /// The WGSL routines bundled with the crate
    pub fn builtin() -> Self {
        Self {
            text: Cow::Borrowed(BUILTIN_WGSL),
            origin: "builtin".to_string(),
        }
    }

    /// Wrap source text held in memory
    pub fn from_text(text: impl Into<String>, origin: impl Into<String>) -> Result<Self> {
        let source = Self {
            text: Cow::Owned(text.into()),
            origin: origin.into(),
        };
        source.check_entry_points()?;
        Ok(source)
    }

    /// Read source text from a file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let missing = |source| Error::MissingSource {
            path: display.clone(),
            source,
        };

        let file = File::open(path).map_err(missing)?;
        let mut text = String::new();
        // one extra byte tells an exactly-full file from a truncated one
        file.take(MAX_SOURCE_SIZE + 1)
            .read_to_string(&mut text)
            .map_err(missing)?;
        if text.len() as u64 > MAX_SOURCE_SIZE {
            return Err(Error::KernelSource {
                origin: display,
                reason: format!("larger than {} bytes", MAX_SOURCE_SIZE),
            });
        }
        Self::from_text(text, display)
    }

    /// Source text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Where the text came from (`builtin` or a path)
    pub fn origin(&self) -> &str {
        &self.origin
    }

    fn check_entry_points(&self) -> Result<()> {
        for entry in [RELAX_ENTRY, BLOCK_SUM_ENTRY] {
            if !declares_fn(&self.text, entry) {
                return Err(Error::KernelSource {
                    origin: self.origin.clone(),
                    reason: format!("no entry point named '{}'", entry),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for KernelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelSource")
            .field("origin", &self.origin)
            .field("bytes", &self.text.len())
            .finish()
    }
}

fn declares_fn(text: &str, name: &str) -> bool {
    text.match_indices("fn ").any(|(at, _)| {
        let rest = text[at + 3..].trim_start();
        rest.strip_prefix(name)
            .is_some_and(|tail| tail.trim_start().starts_with('('))
    })
}

// ============================================================================
// Built-in WGSL
// ============================================================================

/// WGSL for both routines.
///
/// `GROUP_SIZE` and `SCRATCH_LEN` are pipeline-overridable constants, set
/// per launch by the WebGPU backend. Every barrier sits in uniform control
/// flow: out-of-range workers skip work but still reach each barrier.
const BUILTIN_WGSL: &str = r#"
override GROUP_SIZE: u32 = 64u;
override SCRATCH_LEN: u32 = 64u;

var<workgroup> scratch: array<f32, SCRATCH_LEN>;

// ============================================================================
// relax_sweep
// ============================================================================

struct RelaxParams {
    n: u32,
    omega: f32,
    _pad0: u32,
    _pad1: u32,
}

@group(0) @binding(0) var<storage, read_write> relax_x: array<f32>;
@group(0) @binding(1) var<storage, read_write> relax_a: array<f32>;
@group(0) @binding(2) var<storage, read_write> relax_b: array<f32>;
@group(0) @binding(3) var<storage, read_write> relax_resid: array<f32>;
@group(0) @binding(4) var<uniform> relax_params: RelaxParams;

@compute @workgroup_size(GROUP_SIZE)
fn relax_sweep(@builtin(global_invocation_id) global_id: vec3<u32>,
               @builtin(local_invocation_id) local_id: vec3<u32>) {
    let n = relax_params.n;
    let i = global_id.x;

    var k: u32 = local_id.x;
    while (k < n) {
        scratch[k] = relax_x[k];
        k = k + GROUP_SIZE;
    }
    workgroupBarrier();

    if (i < n) {
        var off_diag: f32 = 0.0;
        for (var j: u32 = 0u; j < n; j = j + 1u) {
            if (j != i) {
                off_diag = off_diag + relax_a[i + j * n] * scratch[j];
            }
        }
        let temp = (relax_b[i] - off_diag) / relax_a[i + i * n];
        let x_old = scratch[i];
        let x_new = x_old + relax_params.omega * (temp - x_old);
        relax_resid[i] = abs(x_new - x_old);
        relax_x[i] = x_new;
    }
}

// ============================================================================
// block_sum
// ============================================================================

struct BlockSumParams {
    count: u32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
}

@group(0) @binding(0) var<storage, read_write> sum_input: array<f32>;
@group(0) @binding(1) var<storage, read_write> sum_output: array<f32>;
@group(0) @binding(2) var<uniform> sum_params: BlockSumParams;

@compute @workgroup_size(GROUP_SIZE)
fn block_sum(@builtin(local_invocation_id) local_id: vec3<u32>,
             @builtin(workgroup_id) group_id: vec3<u32>,
             @builtin(num_workgroups) num_groups: vec3<u32>) {
    let tid = local_id.x;
    let count = sum_params.count;
    let chunk = (count + num_groups.x - 1u) / num_groups.x;
    let start = group_id.x * chunk;
    let end = min(start + chunk, count);

    var acc: f32 = 0.0;
    var k: u32 = start + tid;
    while (k < end) {
        acc = acc + sum_input[k];
        k = k + GROUP_SIZE;
    }
    scratch[tid] = acc;
    workgroupBarrier();

    for (var s: u32 = GROUP_SIZE / 2u; s > 0u; s = s >> 1u) {
        if (tid < s) {
            scratch[tid] = scratch[tid] + scratch[tid + s];
        }
        workgroupBarrier();
    }

    if (tid == 0u) {
        sum_output[group_id.x] = scratch[0];
    }
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_declares_both_entry_points() {
        let source = KernelSource::builtin();
        assert!(source.check_entry_points().is_ok());
        assert_eq!(source.origin(), "builtin");
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let err = KernelSource::from_path("/nonexistent/relaxr/kernels.wgsl").unwrap_err();
        assert!(matches!(err, Error::MissingSource { .. }));
    }

    #[test]
    fn test_rejects_text_without_entry_points() {
        let err = KernelSource::from_text("fn relax_sweep() {}", "inline").unwrap_err();
        match err {
            Error::KernelSource { reason, .. } => assert!(reason.contains("block_sum")),
            other => panic!("unexpected error: {other:?}"),
        }
        // a name that only prefixes the entry point does not count
        assert!(!declares_fn("fn block_sum_f32(x: u32) {}", "block_sum"));
        assert!(declares_fn("fn  block_sum (x: u32) {}", "block_sum"));
    }

    #[test]
    fn test_reads_file() {
        let path = std::env::temp_dir().join(format!("relaxr-src-{}.wgsl", std::process::id()));
        let mut file = File::create(&path).unwrap();
        file.write_all(BUILTIN_WGSL.as_bytes()).unwrap();
        drop(file);

        let source = KernelSource::from_path(&path).unwrap();
        assert_eq!(source.text(), BUILTIN_WGSL);
        std::fs::remove_file(&path).unwrap();
    }
}
