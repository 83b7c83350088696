//! ADXL345 three-axis accelerometer

use embedded_hal::i2c::I2c;
use log::{debug, info};

use super::{PollOutcome, Sensor, SensorError, SensorState, bus_failure};
use crate::bus::{ByteOrder, RegisterDevice, SharedBus};
use crate::calibration::CalibrationSource;
use crate::sample::{Quantities, Quantity, Scalar, Vector};

const NAME: &str = "ADXL345";

/// Default address with SDO/ALT ADDRESS pulled low
pub const DEFAULT_ADDRESS: u8 = 0x53;

/// Default profile section
pub const SECTION: &str = "accelerometer";

const POWER_CTL: u8 = 0x2D;
const DATA_FORMAT: u8 = 0x31;
const DATAX0: u8 = 0x32;

const POWER_CTL_MEASURE: u8 = 0x08;
const POWER_CTL_SLEEP: u8 = 0x07;
/// FULL_RES with the ±16 g range
const DATA_FORMAT_FULL_RES_16G: u8 = 0x0B;

/// 3.9 mg per LSB in full-resolution mode, in m/s²
const MS2_PER_LSB: Scalar = 0.0039 * 9.806_65;

pub struct Adxl345<I> {
    device: RegisterDevice<I>,
    state: SensorState,
}

impl<I: I2c> Adxl345<I> {
    /// Accelerometer at the default address, calibrated from `[accelerometer]`.
    pub fn new(bus: SharedBus<I>) -> Self {
        Self::with_address(bus, DEFAULT_ADDRESS, SensorState::new(SECTION))
    }

    pub fn with_address(bus: SharedBus<I>, address: u8, state: SensorState) -> Self {
        Self {
            device: RegisterDevice::new(bus, address, ByteOrder::Little),
            state,
        }
    }
}

impl<I: I2c> Sensor for Adxl345<I> {
    type Error = SensorError<I::Error>;

    fn name(&self) -> &'static str {
        NAME
    }

    fn state(&self) -> &SensorState {
        &self.state
    }

    fn initialize(&mut self, source: &dyn CalibrationSource) -> Result<(), Self::Error> {
        self.state.begin(NAME, source)?;

        // Wake from sleep first, then enter measurement mode
        self.device
            .write_byte(POWER_CTL, 0x00)
            .and_then(|_| self.device.write_byte(POWER_CTL, POWER_CTL_MEASURE))
            .and_then(|_| self.device.write_byte(DATA_FORMAT, DATA_FORMAT_FULL_RES_16G))
            .map_err(bus_failure(NAME, "configure"))?;

        self.state.ready();
        info!("{NAME}: measuring at ±16 g full resolution");
        Ok(())
    }

    fn poll(&mut self) -> Result<PollOutcome, Self::Error> {
        self.state.ensure_ready(NAME)?;

        let words = self
            .device
            .read_words::<3>(DATAX0)
            .map_err(bus_failure(NAME, "read acceleration"))?;

        let raw = Vector::new(
            words[0] as i16 as Scalar,
            words[1] as i16 as Scalar,
            words[2] as i16 as Scalar,
        ) * MS2_PER_LSB;

        let sample = self.state.record(raw, 0.0);
        debug!("{NAME}: {sample}");
        Ok(PollOutcome::Sampled)
    }

    fn finalize(&mut self) -> Result<(), Self::Error> {
        self.device
            .write_byte(POWER_CTL, 0x00)
            .and_then(|_| self.device.write_byte(POWER_CTL, POWER_CTL_SLEEP))
            .map_err(bus_failure(NAME, "power down"))?;

        self.state.finalized();
        info!("{NAME}: asleep");
        Ok(())
    }

    fn quantities(&self) -> Quantities {
        let mut quantities = Quantities::new();
        let _ = quantities.push(Quantity::Acceleration(self.data().vector));
        quantities
    }
}
