//! Throughput figures derived from lap times.

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// One float add per element.
pub fn gflops(n: usize, secs: f64) -> f64 {
    n as f64 / 1e9 / secs
}

/// `a + b` reads two arrays and writes one: `3 * n * 4` bytes of device memory traffic.
pub fn kernel_bandwidth_gib(n: usize, secs: f64) -> f64 {
    transfer_bandwidth_gib(3 * n * std::mem::size_of::<f32>(), secs)
}

/// GiB/s for `bytes` moved in `secs`.
pub fn transfer_bandwidth_gib(bytes: usize, secs: f64) -> f64 {
    bytes as f64 / GIB / secs
}

/// Mean and spread of a series of laps, printed as `avg+-std s`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LapSummary {
    pub avg: f64,
    pub std: f64,
}

impl LapSummary {
    pub fn of(laps: &crate::timer::Laps) -> Self {
        Self {
            avg: laps.avg(),
            std: laps.std(),
        }
    }
}

impl std::fmt::Display for LapSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}+-{} s", self.avg, self.std)
    }
}
