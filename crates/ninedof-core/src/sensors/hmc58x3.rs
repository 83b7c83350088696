//! HMC5843 / HMC5883 three-axis magnetometers
//!
//! Both chips share the register map. They differ in the order of the axis
//! output registers and in the gain of the configured ±1 Ga-class range.

use embedded_hal::i2c::I2c;
use log::{debug, info, warn};

use super::{ChipInfo, PollOutcome, Sensor, SensorError, SensorState, bus_failure};
use crate::bus::{ByteOrder, RegisterDevice, SharedBus};
use crate::calibration::CalibrationSource;
use crate::sample::{Quantities, Quantity, Scalar, Vector};

/// Fixed address of both variants
pub const DEFAULT_ADDRESS: u8 = 0x1E;

/// Default profile section
pub const SECTION: &str = "compass";

const CONFIG_A: u8 = 0x00;
const CONFIG_B: u8 = 0x01;
const MODE: u8 = 0x02;
const DATA_OUT: u8 = 0x03;
const STATUS: u8 = 0x09;
const IDENT_A: u8 = 0x0A;

/// 20 Hz output (HMC5843) / 30 Hz (HMC5883), normal measurement
const CONFIG_A_RATE: u8 = 0x14;
/// Gain setting 1
const CONFIG_B_GAIN: u8 = 0x20;
const MODE_CONTINUOUS: u8 = 0x00;
const MODE_SLEEP: u8 = 0x03;
const STATUS_READY: u8 = 0x01;

/// Identification registers read "H43"
const EXPECTED_ID: u32 = 0x48_34_33;

/// µT per gauss
const MICROTESLA_PER_GAUSS: Scalar = 100.0;

/// Chip variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hmc58x3Variant {
    /// Output registers X, Y, Z; 1300 LSB/Ga at gain 1
    Hmc5843,
    /// Output registers X, Z, Y; 1090 LSB/Ga at gain 1
    Hmc5883,
}

impl Hmc58x3Variant {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Hmc5843 => "HMC5843",
            Self::Hmc5883 => "HMC5883",
        }
    }

    const fn lsb_per_gauss(self) -> Scalar {
        match self {
            Self::Hmc5843 => 1300.0,
            Self::Hmc5883 => 1090.0,
        }
    }

    /// Reorder the three output words into X, Y, Z.
    fn axes(self, words: [u16; 3]) -> [i16; 3] {
        let [a, b, c] = words.map(|w| w as i16);
        match self {
            Self::Hmc5843 => [a, b, c],
            Self::Hmc5883 => [a, c, b],
        }
    }
}

pub struct Hmc58x3<I> {
    device: RegisterDevice<I>,
    variant: Hmc58x3Variant,
    state: SensorState,
}

impl<I: I2c> Hmc58x3<I> {
    /// Magnetometer of `variant` at its fixed address, calibrated from
    /// `[compass]`.
    pub fn new(bus: SharedBus<I>, variant: Hmc58x3Variant) -> Self {
        Self::with_address(bus, variant, DEFAULT_ADDRESS, SensorState::new(SECTION))
    }

    pub fn with_address(
        bus: SharedBus<I>,
        variant: Hmc58x3Variant,
        address: u8,
        state: SensorState,
    ) -> Self {
        Self {
            device: RegisterDevice::new(bus, address, ByteOrder::Big),
            variant,
            state,
        }
    }

    pub fn variant(&self) -> Hmc58x3Variant {
        self.variant
    }
}

impl<I: I2c> Sensor for Hmc58x3<I> {
    type Error = SensorError<I::Error>;

    fn name(&self) -> &'static str {
        self.variant.name()
    }

    fn state(&self) -> &SensorState {
        &self.state
    }

    fn initialize(&mut self, source: &dyn CalibrationSource) -> Result<(), Self::Error> {
        let name = self.name();
        self.state.begin(name, source)?;

        let ident = self
            .device
            .read_bytes::<3>(IDENT_A)
            .map_err(bus_failure(name, "read identification"))?;
        let id = u32::from_be_bytes([0, ident[0], ident[1], ident[2]]);
        if id != EXPECTED_ID {
            warn!("{name}: unexpected identification {id:#08x}");
        }

        self.device
            .write_byte(CONFIG_A, CONFIG_A_RATE)
            .and_then(|_| self.device.write_byte(CONFIG_B, CONFIG_B_GAIN))
            .and_then(|_| self.device.write_byte(MODE, MODE_CONTINUOUS))
            .map_err(bus_failure(name, "configure"))?;

        let status = self
            .device
            .read_byte(STATUS)
            .map_err(bus_failure(name, "read status"))?;

        self.state.set_chip(ChipInfo {
            id,
            version: 0,
            status,
        });
        self.state.ready();
        info!("{name}: continuous measurement started");
        Ok(())
    }

    fn poll(&mut self) -> Result<PollOutcome, Self::Error> {
        let name = self.name();
        self.state.ensure_ready(name)?;

        let status = self
            .device
            .read_byte(STATUS)
            .map_err(bus_failure(name, "read status"))?;
        if status & STATUS_READY == 0 {
            debug!("{name}: no new data, keeping previous sample");
            return Ok(PollOutcome::Discarded);
        }

        let words = self
            .device
            .read_words::<3>(DATA_OUT)
            .map_err(bus_failure(name, "read magnetic field"))?;

        let [x, y, z] = self.variant.axes(words);
        let scale = MICROTESLA_PER_GAUSS / self.variant.lsb_per_gauss();
        let raw = Vector::new(x as Scalar, y as Scalar, z as Scalar) * scale;

        let sample = self.state.record(raw, 0.0);
        debug!("{name}: {sample}");
        Ok(PollOutcome::Sampled)
    }

    fn finalize(&mut self) -> Result<(), Self::Error> {
        let name = self.name();
        self.device
            .write_byte(MODE, MODE_SLEEP)
            .map_err(bus_failure(name, "power down"))?;

        self.state.finalized();
        info!("{name}: asleep");
        Ok(())
    }

    fn quantities(&self) -> Quantities {
        let mut quantities = Quantities::new();
        let _ = quantities.push(Quantity::MagneticFlux(self.data().vector));
        quantities
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::mock::MockI2c;
    use crate::calibration::Calibration;
    use crate::sensors::testing::mock_bus;

    fn ready_sensor(variant: Hmc58x3Variant) -> (MockI2c, Hmc58x3<MockI2c>) {
        let (mock, bus) = mock_bus();
        mock.set_registers(DEFAULT_ADDRESS, IDENT_A, b"H43");
        let mut sensor = Hmc58x3::new(bus, variant);
        sensor.initialize(&Calibration::identity()).unwrap();
        mock.clear_ops();
        (mock, sensor)
    }

    #[test]
    fn test_initialize_reads_identification() {
        let (mock, sensor) = ready_sensor(Hmc58x3Variant::Hmc5843);

        assert_eq!(sensor.id(), EXPECTED_ID);
        assert_eq!(sensor.name(), "HMC5843");
        assert_eq!(
            mock.registers(DEFAULT_ADDRESS, CONFIG_A, 3),
            vec![0x14, 0x20, 0x00]
        );
    }

    #[test]
    fn test_poll_without_ready_flag_discards() {
        let (mock, mut sensor) = ready_sensor(Hmc58x3Variant::Hmc5843);
        mock.set_registers(DEFAULT_ADDRESS, STATUS, &[0x00]);

        assert_eq!(sensor.poll().unwrap(), PollOutcome::Discarded);
        assert!(sensor.history().is_empty());
        assert_eq!(mock.ops().len(), 2);
    }

    #[test]
    fn test_axis_order_per_variant() {
        // Output registers hold 1300, 2600, -1300 in wire order
        let wire = [0x05, 0x14, 0x0A, 0x28, 0xFA, 0xEC];

        let (mock, mut hmc5843) = ready_sensor(Hmc58x3Variant::Hmc5843);
        mock.set_registers(DEFAULT_ADDRESS, DATA_OUT, &wire);
        mock.set_registers(DEFAULT_ADDRESS, STATUS, &[STATUS_READY]);
        assert_eq!(hmc5843.poll().unwrap(), PollOutcome::Sampled);
        let v = hmc5843.data().vector;
        assert!((v - Vector::new(100.0, 200.0, -100.0)).norm() < 1e-3);

        let (mock, mut hmc5883) = ready_sensor(Hmc58x3Variant::Hmc5883);
        mock.set_registers(DEFAULT_ADDRESS, DATA_OUT, &wire);
        mock.set_registers(DEFAULT_ADDRESS, STATUS, &[STATUS_READY]);
        hmc5883.poll().unwrap();
        let v = hmc5883.data().vector;
        let lsb = 100.0 / 1090.0;
        assert!((v.x - 1300.0 * lsb).abs() < 1e-3);
        assert!((v.y + 1300.0 * lsb).abs() < 1e-3);
        assert!((v.z - 2600.0 * lsb).abs() < 1e-3);
    }

    #[test]
    fn test_finalize_sleeps() {
        let (mock, mut sensor) = ready_sensor(Hmc58x3Variant::Hmc5883);
        sensor.finalize().unwrap();
        assert_eq!(mock.writes(DEFAULT_ADDRESS), vec![(MODE, vec![MODE_SLEEP])]);
    }
}
