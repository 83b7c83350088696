//! Linux I2C character devices

use std::path::PathBuf;

use anyhow::{Context, Result};
use linux_embedded_hal::I2cdev;
use ninedof_core::{BusRegistry, SharedBus};

/// Shared handle to an opened `/dev/i2c-<n>`
pub type LinuxBus = SharedBus<I2cdev>;

/// Device node of bus `number`
pub fn device_path(number: u8) -> PathBuf {
    PathBuf::from(format!("/dev/i2c-{number}"))
}

/// Open bus `number`, or share it if it is already open.
pub fn open(registry: &mut BusRegistry<I2cdev>, number: u8) -> Result<LinuxBus> {
    registry
        .open(number, |number| I2cdev::new(device_path(number)))
        .with_context(|| format!("failed to open {}", device_path(number).display()))
}
