//! Supported sensor boards

use embedded_hal::i2c::{ErrorType, I2c};
use log::warn;
use ninedof_core::sensors::{
    Adxl345, Bma180, Bmp085, Bno055, Hmc58x3, Hmc58x3Variant, Itg320x, Itg320xVariant, Lifecycle,
};
use ninedof_core::{CalibrationSource, Sensor, SensorError, SharedBus};

/// Boxed driver of any chip on a bus with transport `I`
pub type DynSensor<I> = Box<dyn Sensor<Error = SensorError<<I as ErrorType>::Error>>>;

/// Board preset, selecting the chips that are polled together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Board {
    /// HMC5843, ADXL345 and ITG3200
    NineDof,
    /// HMC5883, BMA180, ITG3205 and BMP085
    TenDof,
    /// BNO055 running its own fusion
    Orientation,
}

fn boxed<I, S>(sensor: S) -> DynSensor<I>
where
    I: I2c,
    S: Sensor<Error = SensorError<I::Error>> + 'static,
{
    Box::new(sensor)
}

impl Board {
    /// Drivers for every chip of the board, sharing `bus`.
    pub fn sensors<I: I2c + 'static>(self, bus: &SharedBus<I>) -> Vec<DynSensor<I>> {
        match self {
            Self::NineDof => vec![
                boxed::<I, _>(Hmc58x3::new(bus.clone(), Hmc58x3Variant::Hmc5843)),
                boxed::<I, _>(Adxl345::new(bus.clone())),
                boxed::<I, _>(Itg320x::new(bus.clone(), Itg320xVariant::Itg3200)),
            ],
            Self::TenDof => vec![
                boxed::<I, _>(Hmc58x3::new(bus.clone(), Hmc58x3Variant::Hmc5883)),
                boxed::<I, _>(Bma180::new(bus.clone())),
                boxed::<I, _>(Itg320x::new(bus.clone(), Itg320xVariant::Itg3205)),
                boxed::<I, _>(Bmp085::new(bus.clone())),
            ],
            Self::Orientation => vec![boxed::<I, _>(Bno055::new(bus.clone()))],
        }
    }
}

/// Initialise `sensors` in order, stopping at the first failure.
pub fn initialize_all<I: I2c>(
    sensors: &mut [DynSensor<I>],
    source: &dyn CalibrationSource,
) -> Result<(), SensorError<I::Error>> {
    sensors
        .iter_mut()
        .try_for_each(|sensor| sensor.initialize(source))
}

/// Power down every sensor that completed initialisation. Failures are
/// logged and do not stop the remaining sensors.
pub fn finalize_ready<I: I2c>(sensors: &mut [DynSensor<I>]) {
    for sensor in sensors.iter_mut() {
        if sensor.state().lifecycle() != Lifecycle::Ready {
            continue;
        }
        if let Err(e) = sensor.finalize() {
            warn!("{}: finalize failed: {e}", sensor.name());
        }
    }
}

/// Chip usually found at `address` on the supported boards
pub fn known_chip(address: u8) -> Option<&'static str> {
    match address {
        0x1E => Some("HMC5843/HMC5883 magnetometer"),
        0x28 => Some("BNO055 orientation sensor"),
        0x40 => Some("BMA180 accelerometer"),
        0x53 => Some("ADXL345 accelerometer"),
        0x68 => Some("ITG3200 gyroscope"),
        0x69 => Some("ITG3205 gyroscope"),
        0x77 => Some("BMP085/BMP180 barometer"),
        _ => None,
    }
}
