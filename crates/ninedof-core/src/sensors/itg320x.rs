//! ITG3200 / ITG3205 three-axis gyroscopes
//!
//! Register-compatible chips. The variant only selects the default address:
//! the ITG3205 on the 10DOF stick has its AD0 pin pulled high.

use core::f32::consts::PI;

use embedded_hal::i2c::I2c;
use log::{debug, info, warn};

use super::{ChipInfo, PollOutcome, Sensor, SensorError, SensorState, bus_failure};
use crate::bus::{ByteOrder, RegisterDevice, SharedBus};
use crate::calibration::CalibrationSource;
use crate::sample::{Quantities, Quantity, Scalar, Vector};

/// Default profile section
pub const SECTION: &str = "gyroscope";

const WHO_AM_I: u8 = 0x00;
const SMPLRT_DIV: u8 = 0x15;
const DLPF_FS: u8 = 0x16;
const INT_STATUS: u8 = 0x1A;
const TEMP_OUT_H: u8 = 0x1B;
const PWR_MGM: u8 = 0x3E;

/// 1 kHz internal rate / (9 + 1) = 100 Hz
const SMPLRT_DIV_100HZ: u8 = 0x0A;
/// ±2000 °/s full scale with the 10 Hz low-pass filter
const DLPF_FS_2000DPS_10HZ: u8 = 0x1D;
/// PLL with the X gyro as clock reference
const PWR_MGM_PLL_X: u8 = 0x01;
/// Sleep, internal oscillator
const PWR_MGM_SLEEP: u8 = 0x40;

/// WHO_AM_I bits 6:1 hold the upper address bits
const WHO_AM_I_MASK: u8 = 0x7E;
const WHO_AM_I_EXPECTED: u8 = 0x68;

const LSB_PER_DEGREE_PER_SECOND: Scalar = 14.375;
const RAD_PER_S_PER_LSB: Scalar = PI / 180.0 / LSB_PER_DEGREE_PER_SECOND;

const TEMPERATURE_OFFSET_LSB: Scalar = 13_200.0;
const LSB_PER_DEGREE_CELSIUS: Scalar = 280.0;
const TEMPERATURE_AT_OFFSET: Scalar = 35.0;

/// Chip variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Itg320xVariant {
    /// AD0 low
    Itg3200,
    /// AD0 high
    Itg3205,
}

impl Itg320xVariant {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Itg3200 => "ITG3200",
            Self::Itg3205 => "ITG3205",
        }
    }

    pub const fn default_address(self) -> u8 {
        match self {
            Self::Itg3200 => 0x68,
            Self::Itg3205 => 0x69,
        }
    }
}

pub struct Itg320x<I> {
    device: RegisterDevice<I>,
    variant: Itg320xVariant,
    state: SensorState,
}

impl<I: I2c> Itg320x<I> {
    /// Gyroscope of `variant` at its default address, calibrated from
    /// `[gyroscope]`.
    pub fn new(bus: SharedBus<I>, variant: Itg320xVariant) -> Self {
        let address = variant.default_address();
        Self::with_address(bus, variant, address, SensorState::new(SECTION))
    }

    pub fn with_address(
        bus: SharedBus<I>,
        variant: Itg320xVariant,
        address: u8,
        state: SensorState,
    ) -> Self {
        Self {
            device: RegisterDevice::new(bus, address, ByteOrder::Big),
            variant,
            state,
        }
    }
}

/// Die temperature in °C from the raw TEMP_OUT word
fn temperature(raw: i16) -> Scalar {
    TEMPERATURE_AT_OFFSET + (raw as Scalar + TEMPERATURE_OFFSET_LSB) / LSB_PER_DEGREE_CELSIUS
}

impl<I: I2c> Sensor for Itg320x<I> {
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

        let who_am_i = self
            .device
            .read_byte(WHO_AM_I)
            .map_err(bus_failure(name, "read WHO_AM_I"))?;
        if who_am_i & WHO_AM_I_MASK != WHO_AM_I_EXPECTED {
            warn!("{name}: unexpected WHO_AM_I {who_am_i:#04x}");
        }

        self.device
            .write_byte(SMPLRT_DIV, SMPLRT_DIV_100HZ)
            .and_then(|_| self.device.write_byte(DLPF_FS, DLPF_FS_2000DPS_10HZ))
            .and_then(|_| self.device.write_byte(PWR_MGM, PWR_MGM_PLL_X))
            .map_err(bus_failure(name, "configure"))?;

        let status = self
            .device
            .read_byte(INT_STATUS)
            .map_err(bus_failure(name, "read status"))?;

        self.state.set_chip(ChipInfo {
            id: who_am_i as u32,
            version: 0,
            status,
        });
        self.state.ready();
        info!("{name}: sampling at 100 Hz, ±2000 °/s");
        Ok(())
    }

    fn poll(&mut self) -> Result<PollOutcome, Self::Error> {
        let name = self.name();
        self.state.ensure_ready(name)?;

        let [temp, x, y, z] = self
            .device
            .read_words::<4>(TEMP_OUT_H)
            .map_err(bus_failure(name, "read rates"))?
            .map(|w| w as i16);

        let raw = Vector::new(x as Scalar, y as Scalar, z as Scalar) * RAD_PER_S_PER_LSB;

        let sample = self.state.record(raw, temperature(temp));
        debug!("{name}: {sample}");
        Ok(PollOutcome::Sampled)
    }

    fn finalize(&mut self) -> Result<(), Self::Error> {
        let name = self.name();
        self.device
            .write_byte(PWR_MGM, PWR_MGM_SLEEP)
            .map_err(bus_failure(name, "power down"))?;

        self.state.finalized();
        info!("{name}: asleep");
        Ok(())
    }

    fn quantities(&self) -> Quantities {
        let data = self.data();
        let mut quantities = Quantities::new();
        let _ = quantities.push(Quantity::AngularVelocity(data.vector));
        let _ = quantities.push(Quantity::Temperature(data.value));
        quantities
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::mock::MockI2c;
    use crate::profile::Profile;
    use crate::sensors::testing::mock_bus;

    fn ready_sensor(variant: Itg320xVariant) -> (MockI2c, Itg320x<MockI2c>) {
        let (mock, bus) = mock_bus();
        mock.set_registers(variant.default_address(), WHO_AM_I, &[0x69]);
        let mut sensor = Itg320x::new(bus, variant);
        sensor.initialize(&Profile::new()).unwrap();
        mock.clear_ops();
        (mock, sensor)
    }

    #[test]
    fn test_variant_addresses() {
        assert_eq!(Itg320xVariant::Itg3200.default_address(), 0x68);
        assert_eq!(Itg320xVariant::Itg3205.default_address(), 0x69);
    }

    #[test]
    fn test_initialize_configures_and_identifies() {
        let (mock, sensor) = ready_sensor(Itg320xVariant::Itg3205);

        assert_eq!(sensor.id(), 0x69);
        assert_eq!(mock.registers(0x69, SMPLRT_DIV, 2), vec![0x0A, 0x1D]);
        assert_eq!(mock.registers(0x69, PWR_MGM, 1), vec![0x01]);
    }

    #[test]
    fn test_poll_reads_temperature_and_rates() {
        let (mock, mut sensor) = ready_sensor(Itg320xVariant::Itg3200);
        // temp -13200 -> 35 °C, x = 1438, y = -1438, z = 0
        mock.set_registers(
            0x68,
            TEMP_OUT_H,
            &[0xCC, 0x70, 0x05, 0x9E, 0xFA, 0x62, 0x00, 0x00],
        );

        assert_eq!(sensor.poll().unwrap(), PollOutcome::Sampled);

        let data = sensor.data();
        assert!((data.value - 35.0).abs() < 1e-4);
        // 1438 LSB is just over 100 °/s
        assert!((data.vector.x - 100.034_78_f32.to_radians()).abs() < 1e-4);
        assert!((data.vector.y + 100.034_78_f32.to_radians()).abs() < 1e-4);
        assert_eq!(data.vector.z, 0.0);

        let quantities = sensor.quantities();
        assert_eq!(quantities.len(), 2);
        assert_eq!(quantities[1].scalar(), Some(data.value));
    }

    #[test]
    fn test_profile_bias_is_applied() {
        let (mock, bus) = mock_bus();
        mock.add_device(0x68);
        let profile = Profile::new()
            .with_entry(SECTION, "z_offset", "-0.5")
            .with_entry(SECTION, "v_offset", "1");
        let mut sensor = Itg320x::new(bus, Itg320xVariant::Itg3200);
        sensor.initialize(&profile).unwrap();
        mock.set_registers(0x68, TEMP_OUT_H, &[0xCC, 0x70]);

        sensor.poll().unwrap();

        assert_eq!(sensor.data().vector.z, -0.5);
        assert!((sensor.data().value - 36.0).abs() < 1e-4);
    }

    #[test]
    fn test_finalize_sleeps() {
        let (mock, mut sensor) = ready_sensor(Itg320xVariant::Itg3200);
        sensor.finalize().unwrap();
        assert_eq!(mock.writes(0x68), vec![(PWR_MGM, vec![0x40])]);
    }
}
