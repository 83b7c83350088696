//! BMA180 14-bit three-axis accelerometer
//!
//! Runs in ultra-low-noise mode. Each axis word carries a new-data flag in
//! its least-significant bit; a reading where any axis lacks the flag is
//! discarded and the previous sample stays current.

use embedded_hal::i2c::I2c;
use log::{debug, info, warn};

use super::{ChipInfo, PollOutcome, Sensor, SensorError, SensorState, bus_failure};
use crate::bus::{ByteOrder, RegisterDevice, SharedBus};
use crate::calibration::CalibrationSource;
use crate::sample::{Quantities, Quantity, Scalar, Vector};

const NAME: &str = "BMA180";

/// Default address with SDO pulled low
pub const DEFAULT_ADDRESS: u8 = 0x40;

/// Default profile section
pub const SECTION: &str = "accelerometer";

const CHIP_ID: u8 = 0x00;
const ACC_X_LSB: u8 = 0x02;
const STATUS_REG1: u8 = 0x09;
const CTRL_REG0: u8 = 0x0D;
const BW_TCS: u8 = 0x20;
const TCO_Z: u8 = 0x30;
const OFFSET_LSB1: u8 = 0x35;

const EXPECTED_CHIP_ID: u8 = 0x03;

const CTRL_REG0_EE_W: u8 = 1 << 4;
const CTRL_REG0_SLEEP: u8 = 1 << 1;

/// bw bits 7:4, 10 Hz
const BW_MASK: u8 = 0xF0;
const BW_10HZ: u8 = 0x00;
/// mode_config bits 1:0, ultra low noise
const MODE_MASK: u8 = 0x03;
const MODE_ULTRA_LOW_NOISE: u8 = 0x01;
/// range bits 3:1, ±2 g
const RANGE_MASK: u8 = 0x0E;
const RANGE_2G: u8 = 0x02 << 1;

const NEW_DATA: u16 = 0x0001;

/// 0.25 mg per LSB at ±2 g, in m/s²
const MS2_PER_LSB: Scalar = 0.000_25 * 9.806_65;

const DEGREES_PER_LSB: Scalar = 0.5;
const TEMPERATURE_AT_ZERO: Scalar = 24.0;

pub struct Bma180<I> {
    device: RegisterDevice<I>,
    state: SensorState,
}

impl<I: I2c> Bma180<I> {
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

/// Split the data block (three axis words plus temperature) into 14-bit
/// axis values and the temperature byte, or `None` if any axis is stale.
fn decode(order: ByteOrder, block: [u8; 7]) -> Option<([i16; 3], i8)> {
    let mut axes = [0i16; 3];
    for (axis, pair) in axes.iter_mut().zip(block.chunks_exact(2)) {
        let word = order.decode([pair[0], pair[1]]);
        if word & NEW_DATA == 0 {
            return None;
        }
        *axis = (word as i16) >> 2;
    }
    Some((axes, block[6] as i8))
}

impl<I: I2c> Sensor for Bma180<I> {
    type Error = SensorError<I::Error>;

    fn name(&self) -> &'static str {
        NAME
    }

    fn state(&self) -> &SensorState {
        &self.state
    }

    fn initialize(&mut self, source: &dyn CalibrationSource) -> Result<(), Self::Error> {
        self.state.begin(NAME, source)?;

        let [id, version] = self
            .device
            .read_bytes::<2>(CHIP_ID)
            .map_err(bus_failure(NAME, "read chip id"))?;
        if id != EXPECTED_CHIP_ID {
            warn!("{NAME}: unexpected chip id {id:#04x}");
        }

        // Image registers are only writable with ee_w set
        self.device
            .modify_byte(CTRL_REG0, CTRL_REG0_EE_W, CTRL_REG0_EE_W)
            .and_then(|_| self.device.modify_byte(BW_TCS, BW_MASK, BW_10HZ))
            .and_then(|_| self.device.modify_byte(OFFSET_LSB1, RANGE_MASK, RANGE_2G))
            .and_then(|_| self.device.modify_byte(TCO_Z, MODE_MASK, MODE_ULTRA_LOW_NOISE))
            .map_err(bus_failure(NAME, "configure"))?;

        let status = self
            .device
            .read_byte(STATUS_REG1)
            .map_err(bus_failure(NAME, "read status"))?;

        self.state.set_chip(ChipInfo {
            id: id as u32,
            version: version as u16,
            status,
        });
        self.state.ready();
        info!("{NAME}: chip {id:#04x} version {version:#04x}, ±2 g ultra low noise");
        Ok(())
    }

    fn poll(&mut self) -> Result<PollOutcome, Self::Error> {
        self.state.ensure_ready(NAME)?;

        let block = self
            .device
            .read_bytes::<7>(ACC_X_LSB)
            .map_err(bus_failure(NAME, "read acceleration"))?;

        let Some(([x, y, z], temp)) = decode(self.device.byte_order(), block) else {
            debug!("{NAME}: stale axis data, keeping previous sample");
            return Ok(PollOutcome::Discarded);
        };

        let raw = Vector::new(x as Scalar, y as Scalar, z as Scalar) * MS2_PER_LSB;
        let temperature = TEMPERATURE_AT_ZERO + temp as Scalar * DEGREES_PER_LSB;

        let sample = self.state.record(raw, temperature);
        debug!("{NAME}: {sample}");
        Ok(PollOutcome::Sampled)
    }

    fn finalize(&mut self) -> Result<(), Self::Error> {
        self.device
            .modify_byte(CTRL_REG0, CTRL_REG0_SLEEP, CTRL_REG0_SLEEP)
            .map_err(bus_failure(NAME, "power down"))?;

        self.state.finalized();
        info!("{NAME}: asleep");
        Ok(())
    }

    fn quantities(&self) -> Quantities {
        let data = self.data();
        let mut quantities = Quantities::new();
        let _ = quantities.push(Quantity::Acceleration(data.vector));
        let _ = quantities.push(Quantity::Temperature(data.value));
        quantities
    }
}
