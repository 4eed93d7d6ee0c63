//! The exercise end to end: pick a device, upload, compile, dispatch,
//! time, read back, verify, release.

use crate::{
    buffer::{Access, GpuBuffer, GpuEventGuard, Queued},
    config::RunConfig,
    data, device,
    kernel::{self, Aplusb},
    metrics::{self, LapSummary},
    timer::{self, Laps, Stopwatch},
    verify, ClError, During, Result,
};

use opencl3::{
    command_queue::{CommandQueue, CL_QUEUE_PROFILING_ENABLE},
    context::Context,
    device::Device,
    types::cl_uint,
};
use std::fmt;
use tracing::{debug, info};

/// What one run measured.
#[derive(Debug, Clone)]
pub struct Report {
    pub device_name: String,
    pub n: usize,
    pub build_log: String,
    pub kernel: LapSummary,
    /// From event profiling, filtered the same way as the wall-clock laps.
    pub kernel_device: Option<LapSummary>,
    pub gflops: f64,
    pub vram_bandwidth_gib: f64,
    pub transfer: LapSummary,
    pub transfer_bandwidth_gib: f64,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Device name: {}", self.device_name)?;
        writeln!(f, "Data generated for n={}!", self.n)?;
        if !self.build_log.is_empty() {
            writeln!(f, "Log:")?;
            writeln!(f, "{}", self.build_log)?;
        }
        writeln!(f, "Kernel average time: {}", self.kernel)?;
        if let Some(dev) = &self.kernel_device {
            writeln!(f, "Kernel device time: {dev}")?;
        }
        writeln!(f, "GFlops: {}", self.gflops)?;
        writeln!(f, "VRAM bandwidth: {} GB/s", self.vram_bandwidth_gib)?;
        writeln!(f, "Result data transfer time: {}", self.transfer)?;
        write!(f, "VRAM -> RAM bandwidth: {} GB/s", self.transfer_bandwidth_gib)
    }
}

pub fn run(cfg: &RunConfig) -> Result<Report> {
    cfg.validate()?;
    let n = cfg.n;
    let n_arg = cl_uint::try_from(n).map_err(|_| ClError::InvalidSize(n))?;

    // 1. device, context, in-order queue
    let chosen = device::select(cfg.device)?;
    device::check_work_group(&chosen, cfg.work_group_size)?;
    let dev = Device::new(chosen.id);
    let context = Context::from_device(&dev).during("creating context")?;
    debug!("context created");
    let queue = CommandQueue::create(&context, dev.id(), CL_QUEUE_PROFILING_ENABLE)
        .during("creating command queue")?;
    debug!("in-order command queue created");

    // 2. host data
    let (as_host, bs_host) = data::generate(n, cfg.seed());
    let mut cs_host = vec![0.0_f32; n];
    info!(n, "data generated");

    // 3. device buffers: as/bs read-only, cs write-only
    let as_dev =
        GpuBuffer::<f32, Queued>::from_slice(&context, &queue, Access::ReadOnly, &as_host)?;
    let bs_dev =
        GpuBuffer::<f32, Queued>::from_slice(&context, &queue, Access::ReadOnly, &bs_host)?;
    let cs_dev = GpuBuffer::<f32, Queued>::new(&context, Access::WriteOnly, n)?;
    debug!(bytes = 3 * as_dev.size_bytes(), "device buffers ready");

    // 4. kernel source and build
    let src = cfg.kernel.load()?;
    let (program, build_log) = kernel::build_program(&context, chosen.id, &src)?;
    let aplusb = Aplusb::create(&program)?;

    // 5. dispatch and time
    let cs_in_flight = cs_dev.launch();
    let mut sw = Stopwatch::start();
    let mut device_laps = Laps::default();
    let mut last = None;
    for i in 0..cfg.iterations {
        let evt = aplusb.dispatch(
            &queue,
            &as_dev,
            &bs_dev,
            &cs_in_flight,
            n_arg,
            cfg.work_group_size,
        )?;
        evt.wait().during("waiting for kernel")?;
        let lap = sw.next_lap();
        if let Some(secs) = timer::event_seconds(&evt) {
            device_laps.push(secs);
        }
        debug!(iteration = i, lap_s = lap.as_secs_f64(), "kernel lap");
        last = Some(evt);
    }
    let kernel_laps = sw.into_laps();
    let kernel_stats = LapSummary::of(&kernel_laps);
    let kernel_device = (!device_laps.is_empty()).then(|| LapSummary::of(&device_laps));
    let gflops = metrics::gflops(n, kernel_stats.avg);
    let vram_bandwidth_gib = metrics::kernel_bandwidth_gib(n, kernel_stats.avg);
    info!(avg_s = kernel_stats.avg, std_s = kernel_stats.std, gflops, "kernel timed");

    // iterations > 0, so there is always a last event
    let Some(last) = last else {
        return Err(ClError::Config("iterations must be > 0".into()));
    };
    let mut cs_ready = cs_in_flight.into_ready(GpuEventGuard::from_event(last))?;

    // 6. read back and time
    let mut sw = Stopwatch::start();
    for i in 0..cfg.iterations {
        cs_ready.enqueue_read(&queue, &mut cs_host)?.wait()?;
        let lap = sw.next_lap();
        debug!(iteration = i, lap_s = lap.as_secs_f64(), "read-back lap");
    }
    let transfer = LapSummary::of(sw.laps());
    let transfer_bandwidth_gib =
        metrics::transfer_bandwidth_gib(cs_ready.size_bytes(), transfer.avg);
    info!(avg_s = transfer.avg, gib_s = transfer_bandwidth_gib, "read-back timed");

    // 7. verify
    verify::verify(&as_host, &bs_host, &cs_host)?;
    info!(n, "CPU and GPU results match");

    // 8. release in reverse acquisition order
    drop(aplusb);
    drop(program);
    drop(cs_ready);
    drop(bs_dev);
    drop(as_dev);
    drop(queue);
    drop(context);
    debug!("released kernel, program, buffers, queue and context");

    Ok(Report {
        device_name: chosen.name,
        n,
        build_log,
        kernel: kernel_stats,
        kernel_device,
        gflops,
        vram_bandwidth_gib,
        transfer,
        transfer_bandwidth_gib,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_prints_the_classic_lines() {
        let report = Report {
            device_name: "dev".into(),
            n: 4,
            build_log: String::new(),
            kernel: LapSummary { avg: 0.5, std: 0.25 },
            kernel_device: None,
            gflops: 8.0,
            vram_bandwidth_gib: 2.0,
            transfer: LapSummary { avg: 1.0, std: 0.0 },
            transfer_bandwidth_gib: 4.0,
        };
        let text = report.to_string();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines,
            [
                "Device name: dev",
                "Data generated for n=4!",
                "Kernel average time: 0.5+-0.25 s",
                "GFlops: 8",
                "VRAM bandwidth: 2 GB/s",
                "Result data transfer time: 1+-0 s",
                "VRAM -> RAM bandwidth: 4 GB/s",
            ]
        );
    }

    #[test]
    fn build_log_is_printed_when_present() {
        let report = Report {
            device_name: "dev".into(),
            n: 4,
            build_log: "warning: unused variable 'x'".into(),
            kernel: LapSummary { avg: 0.5, std: 0.25 },
            kernel_device: Some(LapSummary { avg: 0.25, std: 0.0 }),
            gflops: 8.0,
            vram_bandwidth_gib: 2.0,
            transfer: LapSummary { avg: 1.0, std: 0.0 },
            transfer_bandwidth_gib: 4.0,
        };
        let text = report.to_string();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[2], "Log:");
        assert_eq!(lines[3], "warning: unused variable 'x'");
        assert_eq!(lines[4], "Kernel average time: 0.5+-0.25 s");
        assert_eq!(lines[5], "Kernel device time: 0.25+-0 s");
    }

    #[test]
    fn invalid_config_fails_before_touching_opencl() {
        let cfg = RunConfig {
            n: 0,
            ..RunConfig::default()
        };
        assert!(matches!(run(&cfg), Err(ClError::Config(_))));
    }
}
