//! Host side of the `aplusb` OpenCL exercise: `c[i] = a[i] + b[i]` on a
//! compute device, timed and checked against the CPU.
//!
//! The flow lives in [`run::run`]; the other modules are the individual
//! steps, split out so they can be tested on their own.

// ─── Modules ─────────────────────────────────────────────────────────
pub mod buffer;
pub mod config;
pub mod data;
pub mod device;
pub mod kernel;
pub mod metrics;
pub mod run;
pub mod timer;
pub mod verify;

pub use buffer::{Access, GpuBuffer, GpuEventGuard, InFlight, Queued, Ready, State};
pub use config::{RunConfig, RunConfigBuilder};
pub use device::{DeviceInfo, DeviceKind, DevicePreference};
pub use kernel::KernelSource;
pub use run::{run, Report};
pub use timer::{Laps, Stopwatch};

use std::path::PathBuf;

// ─── Error type ─────────────────────────────────────────────────────
#[derive(thiserror::Error, Debug)]
pub enum ClError {
    #[error("OpenCL API error: {0}")]
    Api(i32),
    #[error("OpenCL error code {code} encountered while {what}")]
    Call { what: &'static str, code: i32 },
    #[error("no OpenCL platform found")]
    NoPlatform,
    #[error("no OpenCL device matches preference `{0}`")]
    NoDevice(String),
    #[error("can't read kernel source {path}: {source}")]
    KernelSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "empty kernel source {0}! may be you forgot to configure working directory properly?"
    )]
    EmptyKernelSource(PathBuf),
    #[error("can't build program (OpenCL error code {code}), build log:\n{log}")]
    Build { code: i32, log: String },
    #[error("invalid buffer size: {0}")]
    InvalidSize(usize),
    #[error("host slice holds {host} elements but the device buffer holds {device}")]
    LengthMismatch { host: usize, device: usize },
    #[error("CPU and GPU results differ at index {index}: expected {expected}, got {actual}")]
    Mismatch {
        index: usize,
        expected: f32,
        actual: f32,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ClError>;

impl From<opencl3::error_codes::ClError> for ClError {
    #[inline]
    fn from(err: opencl3::error_codes::ClError) -> Self {
        ClError::Api(err.0)
    }
}

impl From<i32> for ClError {
    #[inline]
    fn from(code: i32) -> Self {
        ClError::Api(code)
    }
}

/// Attaches the failing step to a raw OpenCL status.
pub(crate) trait During<T> {
    fn during(self, what: &'static str) -> Result<T>;
}

impl<T> During<T> for std::result::Result<T, opencl3::error_codes::ClError> {
    #[inline]
    fn during(self, what: &'static str) -> Result<T> {
        self.map_err(|e| ClError::Call { what, code: e.0 })
    }
}
