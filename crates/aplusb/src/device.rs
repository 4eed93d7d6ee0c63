//! Platform and device discovery.

use crate::{ClError, During, Result};

use opencl3::{
    device::{Device, CL_DEVICE_TYPE_ALL, CL_DEVICE_TYPE_CPU, CL_DEVICE_TYPE_GPU},
    error_codes::CL_DEVICE_NOT_FOUND,
    platform::get_platforms,
    types::{cl_device_id, cl_device_type},
};
use std::{fmt, str::FromStr};
use tracing::{debug, info};

/// ICD loader status when no vendor driver is installed.
const CL_PLATFORM_NOT_FOUND_KHR: i32 = -1001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Gpu,
    Cpu,
    Other,
}

impl DeviceKind {
    pub fn from_type(dev_type: cl_device_type) -> Self {
        if dev_type & CL_DEVICE_TYPE_GPU != 0 {
            DeviceKind::Gpu
        } else if dev_type & CL_DEVICE_TYPE_CPU != 0 {
            DeviceKind::Cpu
        } else {
            DeviceKind::Other
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeviceKind::Gpu => "GPU",
            DeviceKind::Cpu => "CPU",
            DeviceKind::Other => "other",
        })
    }
}

/// One device as seen during enumeration.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub id: cl_device_id,
    pub platform: String,
    pub name: String,
    pub vendor: String,
    pub kind: DeviceKind,
    pub max_work_group_size: usize,
    pub global_mem_size: u64,
}

impl DeviceInfo {
    fn query(platform: &str, id: cl_device_id) -> Result<Self> {
        let dev = Device::new(id);
        Ok(Self {
            id,
            platform: platform.to_string(),
            name: dev.name().during("querying device name")?.trim().to_string(),
            vendor: dev.vendor().during("querying device vendor")?.trim().to_string(),
            kind: DeviceKind::from_type(dev.dev_type().during("querying device type")?),
            max_work_group_size: dev
                .max_work_group_size()
                .during("querying max work-group size")?,
            global_mem_size: dev.global_mem_size().during("querying global memory size")?,
        })
    }
}

/// Which device to run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    /// First GPU, else first CPU, else whatever comes first.
    #[default]
    Auto,
    Gpu,
    Cpu,
    /// Position in the flattened platform/device list.
    Index(usize),
}

impl fmt::Display for DevicePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DevicePreference::Auto => f.write_str("auto"),
            DevicePreference::Gpu => f.write_str("gpu"),
            DevicePreference::Cpu => f.write_str("cpu"),
            DevicePreference::Index(i) => write!(f, "{i}"),
        }
    }
}

impl FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(DevicePreference::Auto),
            "gpu" => Ok(DevicePreference::Gpu),
            "cpu" => Ok(DevicePreference::Cpu),
            other => other
                .parse::<usize>()
                .map(DevicePreference::Index)
                .map_err(|_| format!("expected auto, gpu, cpu or a device index, got `{s}`")),
        }
    }
}

/// Lists every device of every platform, in platform order.
///
/// A platform without devices is skipped; no platform at all is an error.
pub fn enumerate() -> Result<Vec<DeviceInfo>> {
    let platforms = match get_platforms() {
        Ok(p) if !p.is_empty() => p,
        Ok(_) => return Err(ClError::NoPlatform),
        Err(e) if e.0 == CL_PLATFORM_NOT_FOUND_KHR => return Err(ClError::NoPlatform),
        Err(e) => return Err(ClError::Call { what: "enumerating platforms", code: e.0 }),
    };
    debug!(count = platforms.len(), "found OpenCL platforms");

    let mut devices = Vec::new();
    for platform in &platforms {
        let platform_name = platform.name().during("querying platform name")?;
        let ids = match platform.get_devices(CL_DEVICE_TYPE_ALL) {
            Ok(ids) => ids,
            Err(e) if e.0 == CL_DEVICE_NOT_FOUND => Vec::new(),
            Err(e) => return Err(ClError::Call { what: "enumerating devices", code: e.0 }),
        };
        debug!(platform = %platform_name.trim(), count = ids.len(), "found devices");
        for id in ids {
            devices.push(DeviceInfo::query(platform_name.trim(), id)?);
        }
    }
    Ok(devices)
}

/// Index of the device `pref` asks for, if present.
pub fn pick(devices: &[DeviceInfo], pref: DevicePreference) -> Option<usize> {
    let first_of = |kind: DeviceKind| devices.iter().position(|d| d.kind == kind);
    match pref {
        DevicePreference::Auto => first_of(DeviceKind::Gpu)
            .or_else(|| first_of(DeviceKind::Cpu))
            .or_else(|| (!devices.is_empty()).then_some(0)),
        DevicePreference::Gpu => first_of(DeviceKind::Gpu),
        DevicePreference::Cpu => first_of(DeviceKind::Cpu),
        DevicePreference::Index(i) => (i < devices.len()).then_some(i),
    }
}

/// Enumerates and picks in one go.
pub fn select(pref: DevicePreference) -> Result<DeviceInfo> {
    let mut devices = enumerate()?;
    let idx = pick(&devices, pref).ok_or_else(|| ClError::NoDevice(pref.to_string()))?;
    let chosen = devices.swap_remove(idx);
    info!(
        device = %chosen.name,
        platform = %chosen.platform,
        kind = %chosen.kind,
        "selected compute device"
    );
    Ok(chosen)
}

/// Rejects a local work size the device can't schedule as one group.
pub fn check_work_group(device: &DeviceInfo, work_group_size: usize) -> Result<()> {
    if work_group_size > device.max_work_group_size {
        return Err(ClError::Config(format!(
            "work-group size {work_group_size} exceeds the limit of {} on {}",
            device.max_work_group_size, device.name
        )));
    }
    Ok(())
}
