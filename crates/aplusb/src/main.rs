use anyhow::{Context, Result};
use aplusb::{device, DevicePreference, KernelSource, RunConfig};
use clap::Parser;
use std::path::PathBuf;
use tracing::error;

/// Adds two random float arrays on an OpenCL device, times the kernel and
/// the read-back, and checks the sum on the CPU.
#[derive(Parser, Debug)]
#[command(name = "aplusb", version)]
struct Cli {
    /// Elements per array
    #[arg(short, long, default_value_t = 100_000_000)]
    n: usize,

    /// Local work size; the global size is n rounded up to a multiple of it
    #[arg(short, long, default_value_t = 128)]
    work_group_size: usize,

    /// Timed repetitions of kernel and read-back
    #[arg(short, long, default_value_t = 20)]
    iterations: usize,

    /// OpenCL C source, relative to the working directory
    #[arg(short, long, value_name = "PATH", default_value = aplusb::kernel::DEFAULT_KERNEL_PATH)]
    kernel: PathBuf,

    /// Use the kernel compiled into the binary instead of --kernel
    #[arg(long, conflicts_with = "kernel")]
    embedded_kernel: bool,

    /// auto, gpu, cpu or an index from --list-devices
    #[arg(short, long, default_value = "auto")]
    device: DevicePreference,

    /// Seed for the input data (defaults to n)
    #[arg(long)]
    seed: Option<u64>,

    /// Print all platforms and devices, then exit
    #[arg(long)]
    list_devices: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG wins if set
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

impl Cli {
    fn config(&self) -> Result<RunConfig> {
        let kernel = if self.embedded_kernel {
            KernelSource::Embedded
        } else {
            KernelSource::File(self.kernel.clone())
        };
        let mut builder = RunConfig::builder()
            .n(self.n)
            .work_group_size(self.work_group_size)
            .iterations(self.iterations)
            .kernel(kernel)
            .device(self.device);
        if let Some(seed) = self.seed {
            builder = builder.seed(seed);
        }
        builder.build().context("invalid arguments")
    }
}

fn setup_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn list_devices() -> Result<()> {
    let devices = device::enumerate().context("can't enumerate OpenCL devices")?;
    let mut platform = None;
    for (i, d) in devices.iter().enumerate() {
        if platform != Some(&d.platform) {
            println!("Platform: {}", d.platform);
            platform = Some(&d.platform);
        }
        println!(
            "  [{i}] {} ({}, {}), max work-group {}, {} MiB global memory",
            d.name,
            d.kind,
            d.vendor,
            d.max_work_group_size,
            d.global_mem_size / 1024 / 1024
        );
    }
    Ok(())
}

fn execute(cli: &Cli) -> Result<()> {
    if cli.list_devices {
        return list_devices();
    }
    let cfg = cli.config()?;
    let report = aplusb::run(&cfg).context("aplusb run failed")?;
    println!("{report}");
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    if let Err(e) = execute(&cli) {
        error!("{e}");
        for cause in e.chain().skip(1) {
            error!("  caused by: {cause}");
        }
        std::process::exit(1);
    }
}
