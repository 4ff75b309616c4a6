//! Component A — Device Inspector.
//!
//! The selection algorithm and build-log plumbing in [`crate::diagnostics`] are written
//! against the [`ClBackend`]/[`ClDevice`] traits rather than the `opencl3` crate
//! directly, so they can be exercised in tests without a real ICD loader or GPU present.

use crate::error::Result;

/// A single enumerated OpenCL device, abstracted over the underlying driver handle.
pub trait ClDevice: Send {
    fn vendor(&self) -> Result<String>;
    fn name(&self) -> Result<String>;
    fn driver_version(&self) -> Result<String>;
    fn max_compute_units(&self) -> Result<u32>;
    fn max_clock_frequency(&self) -> Result<u32>;

    /// Build `source` on this device with the given option string and return the raw
    /// build log. Compile errors surface as `Ok(log)`, not `Err` — only
    /// failures to even attempt the build (bad context, driver error) are `Err`.
    fn build_program(&self, source: &str, options: &str) -> Result<String>;
}

/// Enumerates the platforms/devices visible to this process.
pub trait ClBackend: Send {
    fn enumerate_devices(&self) -> Result<Vec<Box<dyn ClDevice>>>;
}

/// `describe`: vendor + name + driver version, for human display.
pub fn describe(device: &dyn ClDevice) -> Result<String> {
    Ok(format!(
        "{} {} {}",
        device.vendor()?,
        device.name()?,
        device.driver_version()?
    ))
}

/// `stable_id`: a 32-bit hash of vendor/name/driver version.
pub fn stable_id(device: &dyn ClDevice) -> Result<u32> {
    let key = format!(
        "{}\u{0}{}\u{0}{}",
        device.vendor()?,
        device.name()?,
        device.driver_version()?
    );
    Ok(fnv1a_32(key.as_bytes()))
}

/// `power_index`: `max_compute_units * max_clock_frequency`.
pub fn power_index(device: &dyn ClDevice) -> Result<u64> {
    Ok(device.max_compute_units()? as u64 * device.max_clock_frequency()? as u64)
}

/// FNV-1a, truncated to 32 bits. Deterministic and dependency-free; good enough for a
/// display-only "pin a device across runs" id, not a cryptographic one.
fn fnv1a_32(bytes: &[u8]) -> u32 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    (hash & 0xFFFF_FFFF) as u32
}

/// A snapshot of one enumerated device.
pub struct DeviceRecord {
    pub handle: Box<dyn ClDevice>,
    pub stable_id: u32,
    pub description: String,
    pub power_index: u64,
}

impl DeviceRecord {
    pub fn from_handle(handle: Box<dyn ClDevice>) -> Result<Self> {
        let stable_id = stable_id(handle.as_ref())?;
        let description = describe(handle.as_ref())?;
        let power_index = power_index(handle.as_ref())?;
        Ok(DeviceRecord {
            handle,
            stable_id,
            description,
            power_index,
        })
    }
}

/// Enumerate every device across every platform. A device whose info query fails is
/// skipped (and logged) rather than failing the whole enumeration.
pub fn enumerate_all(backend: &dyn ClBackend) -> Result<Vec<DeviceRecord>> {
    let devices = backend.enumerate_devices()?;
    let mut records = Vec::with_capacity(devices.len());
    for handle in devices {
        match DeviceRecord::from_handle(handle) {
            Ok(record) => records.push(record),
            Err(err) => log::warn!("skipping OpenCL device with unreadable info: {err}"),
        }
    }
    Ok(records)
}

/// Production backend, backed by the `opencl3` crate.
pub mod opencl3_backend {
    use super::{ClBackend, ClDevice};
    use crate::error::{Error, Result};
    use opencl3::context::Context;
    use opencl3::device::{Device, CL_DEVICE_TYPE_ALL};
    use opencl3::platform::get_platforms;
    use opencl3::program::Program;

    pub struct Opencl3Backend;

    impl ClBackend for Opencl3Backend {
        fn enumerate_devices(&self) -> Result<Vec<Box<dyn ClDevice>>> {
            let platforms = get_platforms()
                .map_err(|err| Error::CompilerUnavailable(format!("{err}")))?;

            let mut devices: Vec<Box<dyn ClDevice>> = Vec::new();
            for platform in platforms {
                let device_ids = match platform.get_devices(CL_DEVICE_TYPE_ALL) {
                    Ok(ids) => ids,
                    Err(err) => {
                        log::warn!("failed to enumerate devices on a platform: {err}");
                        continue;
                    }
                };
                for id in device_ids {
                    devices.push(Box::new(Opencl3Device {
                        device: Device::new(id),
                    }));
                }
            }
            Ok(devices)
        }
    }

    struct Opencl3Device {
        device: Device,
    }

    impl ClDevice for Opencl3Device {
        fn vendor(&self) -> Result<String> {
            self.device
                .vendor()
                .map_err(|err| Error::InfoUnavailable(format!("{err}")))
        }

        fn name(&self) -> Result<String> {
            self.device
                .name()
                .map_err(|err| Error::InfoUnavailable(format!("{err}")))
        }

        fn driver_version(&self) -> Result<String> {
            self.device
                .driver_version()
                .map_err(|err| Error::InfoUnavailable(format!("{err}")))
        }

        fn max_compute_units(&self) -> Result<u32> {
            self.device
                .max_compute_units()
                .map_err(|err| Error::InfoUnavailable(format!("{err}")))
        }

        fn max_clock_frequency(&self) -> Result<u32> {
            self.device
                .max_clock_frequency()
                .map_err(|err| Error::InfoUnavailable(format!("{err}")))
        }

        fn build_program(&self, source: &str, options: &str) -> Result<String> {
            let context = Context::from_device(&self.device)
                .map_err(|err| Error::CompilerUnavailable(format!("{err}")))?;

            match Program::create_and_build_from_source(&context, source, options) {
                Ok(program) => match program.get_build_log(self.device.id()) {
                    Ok(log) => Ok(log),
                    Err(err) => {
                        log::error!("failed to fetch OpenCL build log: {err}");
                        Ok(String::new())
                    }
                },
                // A failed build is an expected outcome (the source has errors), not an
                // internal failure: opencl3 hands the build log back as the Err payload.
                Err(build_log) => Ok(build_log),
            }
        }
    }
}

pub use opencl3_backend::Opencl3Backend;

#[cfg(test)]
pub mod testing {
    use super::{ClBackend, ClDevice};
    use crate::error::Result;

    #[derive(Clone)]
    pub struct FakeDevice {
        pub vendor: String,
        pub name: String,
        pub driver_version: String,
        pub max_compute_units: u32,
        pub max_clock_frequency: u32,
        pub build_log: String,
    }

    impl ClDevice for FakeDevice {
        fn vendor(&self) -> Result<String> {
            Ok(self.vendor.clone())
        }
        fn name(&self) -> Result<String> {
            Ok(self.name.clone())
        }
        fn driver_version(&self) -> Result<String> {
            Ok(self.driver_version.clone())
        }
        fn max_compute_units(&self) -> Result<u32> {
            Ok(self.max_compute_units)
        }
        fn max_clock_frequency(&self) -> Result<u32> {
            Ok(self.max_clock_frequency)
        }
        fn build_program(&self, _source: &str, _options: &str) -> Result<String> {
            Ok(self.build_log.clone())
        }
    }

    pub struct FakeBackend {
        pub devices: Vec<FakeDevice>,
    }

    impl ClBackend for FakeBackend {
        fn enumerate_devices(&self) -> Result<Vec<Box<dyn ClDevice>>> {
            Ok(self
                .devices
                .iter()
                .cloned()
                .map(|device| Box::new(device) as Box<dyn ClDevice>)
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FakeBackend, FakeDevice};
    use super::*;

    fn device(vendor: &str, name: &str, compute_units: u32, clock: u32) -> FakeDevice {
        FakeDevice {
            vendor: vendor.into(),
            name: name.into(),
            driver_version: "1.0".into(),
            max_compute_units: compute_units,
            max_clock_frequency: clock,
            build_log: String::new(),
        }
    }

    #[test]
    fn stable_id_is_deterministic() {
        let a = device("Acme", "GPU", 8, 1000);
        let b = device("Acme", "GPU", 8, 1000);
        assert_eq!(stable_id(&a).unwrap(), stable_id(&b).unwrap());
    }

    #[test]
    fn stable_id_differs_across_devices() {
        let a = device("Acme", "GPU", 8, 1000);
        let b = device("Acme", "CPU", 8, 1000);
        assert_ne!(stable_id(&a).unwrap(), stable_id(&b).unwrap());
    }

    #[test]
    fn power_index_is_product_of_units_and_clock() {
        let d = device("Acme", "GPU", 16, 1200);
        assert_eq!(power_index(&d).unwrap(), 16 * 1200);
    }

    #[test]
    fn enumerate_all_skips_unreadable_devices() {
        let backend = FakeBackend {
            devices: vec![device("Acme", "GPU", 8, 900), device("Acme", "CPU", 4, 500)],
        };
        let records = enumerate_all(&backend).unwrap();
        assert_eq!(records.len(), 2);
    }
}
