//! Kernel source loading, program build and dispatch of `aplusb`.

use crate::{
    buffer::{GpuBuffer, InFlight, Ready},
    ClError, During, Result,
};

use opencl3::{
    command_queue::CommandQueue,
    context::Context,
    event::Event,
    kernel::{ExecuteKernel, Kernel},
    program::Program,
    types::{cl_device_id, cl_uint},
};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

/// Entry point inside the program.
pub const KERNEL_NAME: &str = "aplusb";

/// Looked up relative to the working directory.
pub const DEFAULT_KERNEL_PATH: &str = "src/cl/aplusb.cl";

const EMBEDDED_SOURCE: &str = include_str!("cl/aplusb.cl");

/// Where the OpenCL C source comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelSource {
    File(PathBuf),
    /// The copy compiled into the binary.
    Embedded,
}

impl Default for KernelSource {
    fn default() -> Self {
        KernelSource::File(PathBuf::from(DEFAULT_KERNEL_PATH))
    }
}

impl fmt::Display for KernelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelSource::File(p) => write!(f, "{}", p.display()),
            KernelSource::Embedded => f.write_str("<embedded>"),
        }
    }
}

impl KernelSource {
    pub fn load(&self) -> Result<String> {
        match self {
            KernelSource::File(path) => load_file(path),
            KernelSource::Embedded => Ok(EMBEDDED_SOURCE.to_string()),
        }
    }
}

fn load_file(path: &Path) -> Result<String> {
    let src = fs::read_to_string(path).map_err(|source| ClError::KernelSource {
        path: path.to_path_buf(),
        source,
    })?;
    if src.trim().is_empty() {
        return Err(ClError::EmptyKernelSource(path.to_path_buf()));
    }
    debug!(path = %path.display(), bytes = src.len(), "loaded kernel source");
    Ok(src)
}

/// Smallest multiple of `work_group` that is not below `n`.
#[inline]
pub fn round_up(n: usize, work_group: usize) -> usize {
    n.div_ceil(work_group) * work_group
}

/// Builds `src` for `device`.
///
/// Returns the program and its build log. The log is fetched even if the
/// build fails and ends up in [`ClError::Build`].
pub fn build_program(
    context: &Context,
    device: cl_device_id,
    src: &str,
) -> Result<(Program, String)> {
    let mut program =
        Program::create_from_source(context, src).during("creating program from source")?;
    let built = program.build(&[device], "");
    let log = program
        .get_build_log(device)
        .during("querying program build log")?;
    let log = log.trim_end_matches('\0').trim().to_string();

    if let Err(e) = built {
        warn!(code = e.0, "program build failed");
        return Err(ClError::Build { code: e.0, log });
    }
    if log.is_empty() {
        debug!("program built, empty build log");
    } else {
        info!("program build log:\n{log}");
    }
    Ok((program, log))
}

/// The compiled `aplusb` kernel.
pub struct Aplusb {
    kernel: Kernel,
}

impl Aplusb {
    pub fn create(program: &Program) -> Result<Self> {
        let kernel = Kernel::create(program, KERNEL_NAME).during("creating kernel")?;
        Ok(Self { kernel })
    }

    /// Enqueues `c = a + b` over `n` elements with work groups of
    /// `work_group` items. The global size is `n` rounded up to a whole
    /// number of groups; the kernel ignores the tail.
    pub fn dispatch(
        &self,
        queue: &CommandQueue,
        a: &GpuBuffer<f32, Ready>,
        b: &GpuBuffer<f32, Ready>,
        c: &GpuBuffer<f32, InFlight>,
        n: cl_uint,
        work_group: usize,
    ) -> Result<Event> {
        let len = n as usize;
        for (host, device) in [(len, a.len()), (len, b.len()), (len, c.len())] {
            if host != device {
                return Err(ClError::LengthMismatch { host, device });
            }
        }
        if work_group == 0 {
            return Err(ClError::InvalidSize(work_group));
        }
        let global = round_up(len, work_group);

        // argument order matches (float*, float*, float*, uint)
        let evt = ExecuteKernel::new(&self.kernel)
            .set_arg(a.raw())
            .set_arg(b.raw())
            .set_arg(c.raw())
            .set_arg(&n)
            .set_global_work_size(global)
            .set_local_work_size(work_group)
            .enqueue_nd_range(queue)
            .during("enqueueing kernel")?;
        Ok(evt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn round_up_to_work_group() {
        assert_eq!(round_up(1, 128), 128);
        assert_eq!(round_up(128, 128), 128);
        assert_eq!(round_up(129, 128), 256);
        assert_eq!(round_up(100_000_000, 128), 100_000_000);
        assert_eq!(round_up(1_000_001, 128), 1_000_064);
        assert_eq!(round_up(0, 128), 0);
    }

    #[test]
    fn embedded_source_defines_the_kernel() {
        let src = KernelSource::Embedded.load().unwrap();
        assert!(src.contains("__kernel void aplusb"));
        assert!(src.contains("unsigned int n"));
    }

    #[test]
    fn loads_source_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{EMBEDDED_SOURCE}").unwrap();
        let src = KernelSource::File(file.path().to_path_buf()).load().unwrap();
        assert_eq!(src, EMBEDDED_SOURCE);
    }

    #[test]
    fn missing_file_is_reported_with_path() {
        let err = KernelSource::File("does/not/exist.cl".into())
            .load()
            .unwrap_err();
        match err {
            ClError::KernelSource { path, .. } => assert_eq!(path, Path::new("does/not/exist.cl")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_file_hints_at_working_directory() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = KernelSource::File(file.path().to_path_buf())
            .load()
            .unwrap_err();
        assert!(matches!(err, ClError::EmptyKernelSource(_)));
        assert!(err.to_string().contains("working directory"));
    }

    #[test]
    fn default_source_is_the_fixed_path() {
        assert_eq!(
            KernelSource::default(),
            KernelSource::File(PathBuf::from("src/cl/aplusb.cl"))
        );
        // tests run from the package root, where the fixed path resolves
        let src = KernelSource::default().load().unwrap();
        assert_eq!(src, EMBEDDED_SOURCE);
    }
}
