use crate::{device::DevicePreference, kernel::KernelSource, ClError, Result};

/// Everything one run of the exercise needs.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Elements per array.
    pub n: usize,
    /// Local work size; the global size is `n` rounded up to a multiple of it.
    pub work_group_size: usize,
    /// Timed repetitions of the kernel and of the read-back.
    pub iterations: usize,
    pub kernel: KernelSource,
    pub device: DevicePreference,
    /// PRNG seed for the inputs; `None` seeds with `n`.
    pub seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            n: 100 * 1000 * 1000,
            work_group_size: 128,
            iterations: 20,
            kernel: KernelSource::default(),
            device: DevicePreference::Auto,
            seed: None,
        }
    }
}

impl RunConfig {
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if self.n == 0 {
            return Err(ClError::Config("n must be > 0".into()));
        }
        // the kernel takes the length as `unsigned int`
        if u32::try_from(self.n).is_err() {
            return Err(ClError::Config(format!(
                "n = {} does not fit the kernel's 32-bit length",
                self.n
            )));
        }
        if self.work_group_size == 0 {
            return Err(ClError::Config("work_group_size must be > 0".into()));
        }
        if self.iterations == 0 {
            return Err(ClError::Config("iterations must be > 0".into()));
        }
        Ok(())
    }

    pub fn seed(&self) -> u64 {
        self.seed.unwrap_or(self.n as u64)
    }
}

#[derive(Debug, Default)]
pub struct RunConfigBuilder {
    config: RunConfig,
}

impl RunConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RunConfig::default(),
        }
    }

    pub fn n(mut self, n: usize) -> Self {
        self.config.n = n;
        self
    }

    pub fn work_group_size(mut self, size: usize) -> Self {
        self.config.work_group_size = size;
        self
    }

    pub fn iterations(mut self, iterations: usize) -> Self {
        self.config.iterations = iterations;
        self
    }

    pub fn kernel(mut self, kernel: KernelSource) -> Self {
        self.config.kernel = kernel;
        self
    }

    pub fn device(mut self, device: DevicePreference) -> Self {
        self.config.device = device;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<RunConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_exercise() {
        let cfg = RunConfig::builder().build().unwrap();
        assert_eq!(cfg.n, 100_000_000);
        assert_eq!(cfg.work_group_size, 128);
        assert_eq!(cfg.iterations, 20);
        assert_eq!(cfg.kernel, KernelSource::default());
        assert_eq!(cfg.device, DevicePreference::Auto);
        assert_eq!(cfg.seed(), 100_000_000);
    }

    #[test]
    fn explicit_seed_wins() {
        let cfg = RunConfig::builder().n(10).seed(3).build().unwrap();
        assert_eq!(cfg.seed(), 3);
    }

    #[test]
    fn rejects_zero_sizes() {
        assert!(RunConfig::builder().n(0).build().is_err());
        assert!(RunConfig::builder().work_group_size(0).build().is_err());
        assert!(RunConfig::builder().iterations(0).build().is_err());
    }

    #[test]
    fn rejects_n_beyond_uint() {
        let err = RunConfig::builder()
            .n(u32::MAX as usize + 1)
            .build()
            .unwrap_err();
        assert!(matches!(err, ClError::Config(_)));
        assert!(RunConfig::builder().n(u32::MAX as usize).build().is_ok());
    }
}
