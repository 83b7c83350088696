//! BMP085 / BMP180 barometric pressure sensor
//!
//! Conversions are started by one `poll` and collected by the next, so a
//! complete measurement spans several calls. The driver walks an explicit
//! [`Phase`] cycle: the temperature is refreshed at the start of every
//! [`CYCLE_LENGTH`]-call cycle, pressure conversions repeat in between.
//!
//! The caller's tick interval must cover the conversion time (4.5 ms at
//! oversampling 0, 25.5 ms at 3); results are collected on the next call
//! whatever the elapsed time.
//!
//! Compensation uses the vendor's fixed-point integer arithmetic with the
//! eleven factory coefficients read during `initialize`.
//!
//! Samples carry the pressure in Pa as the scalar value and the temperature
//! in °C as the z component of the vector (x and y stay zero). In the
//! `[barometer]` profile section `v_factor`/`v_offset` therefore correct the
//! pressure and `z_factor`/`z_offset` correct the temperature.

use embedded_hal::i2c::I2c;
use log::{debug, info, warn};

use super::{ChipInfo, PollOutcome, Sensor, SensorError, SensorState, bus_failure};
use crate::bus::{ByteOrder, RegisterDevice, SharedBus};
use crate::calibration::CalibrationSource;
use crate::sample::{Quantities, Quantity, Scalar, Vector};

const NAME: &str = "BMP085";

/// Fixed address of the BMP085 and BMP180
pub const DEFAULT_ADDRESS: u8 = 0x77;

/// Default profile section
pub const SECTION: &str = "barometer";

/// Number of calls after which the temperature is refreshed
pub const CYCLE_LENGTH: u32 = 120;

/// Highest supported oversampling setting
pub const MAX_OVERSAMPLING: u8 = 3;

const CALIBRATION_START: u8 = 0xAA;
const CHIP_ID: u8 = 0xD0;
const CTRL_MEAS: u8 = 0xF4;
const OUT_MSB: u8 = 0xF6;

const EXPECTED_CHIP_ID: u8 = 0x55;

const MEASURE_TEMPERATURE: u8 = 0x2E;
const MEASURE_PRESSURE: u8 = 0x34;

/// Factory calibration coefficients from the chip's EEPROM
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Coefficients {
    pub ac1: i16,
    pub ac2: i16,
    pub ac3: i16,
    pub ac4: u16,
    pub ac5: u16,
    pub ac6: u16,
    pub b1: i16,
    pub b2: i16,
    pub mb: i16,
    pub mc: i16,
    pub md: i16,
}

impl Coefficients {
    /// Coefficients in EEPROM order, AC1 first.
    pub fn from_words(words: [u16; 11]) -> Self {
        Self {
            ac1: words[0] as i16,
            ac2: words[1] as i16,
            ac3: words[2] as i16,
            ac4: words[3],
            ac5: words[4],
            ac6: words[5],
            b1: words[6] as i16,
            b2: words[7] as i16,
            mb: words[8] as i16,
            mc: words[9] as i16,
            md: words[10] as i16,
        }
    }

    /// Temperature in 0.1 °C and the intermediate B5 term the pressure
    /// compensation needs.
    pub fn compensate_temperature(&self, ut: i32) -> (i32, i32) {
        let ut = ut as i64;
        let x1 = ((ut - self.ac6 as i64) * self.ac5 as i64) >> 15;
        let x2 = ((self.mc as i64) << 11)
            .checked_div(x1 + self.md as i64)
            .unwrap_or(0);
        let b5 = x1 + x2;
        (((b5 + 8) >> 4) as i32, b5 as i32)
    }

    /// Pressure in Pa from raw pressure `up` measured at oversampling `oss`.
    pub fn compensate_pressure(&self, up: i32, b5: i32, oss: u8) -> i32 {
        let oss = oss.min(MAX_OVERSAMPLING);

        let b6 = b5 as i64 - 4000;
        let b6_squared = (b6 * b6) >> 12;

        let x1 = (self.b2 as i64 * b6_squared) >> 11;
        let x2 = (self.ac2 as i64 * b6) >> 11;
        let x3 = x1 + x2;
        let b3 = ((((self.ac1 as i64) * 4 + x3) << oss) + 2) / 4;

        let x1 = (self.ac3 as i64 * b6) >> 13;
        let x2 = (self.b1 as i64 * b6_squared) >> 16;
        let x3 = (x1 + x2 + 2) >> 2;
        let b4 = (self.ac4 as u32).wrapping_mul((x3 + 32768) as u32) >> 15;
        let b7 = (up as u32)
            .wrapping_sub(b3 as u32)
            .wrapping_mul(50_000 >> oss);

        let p = (if b7 < 0x8000_0000 {
            b7.wrapping_mul(2).checked_div(b4).unwrap_or(0)
        } else {
            b7.checked_div(b4).unwrap_or(0).wrapping_mul(2)
        }) as i64;

        let x1 = (p >> 8) * (p >> 8);
        let x1 = (x1 * 3038) >> 16;
        let x2 = (-7357 * p) >> 16;
        (p + ((x1 + x2 + 3791) >> 4)) as i32
    }
}

/// Step of the measurement cycle performed by the next `poll`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    TriggerTemperature,
    ReadTemperature,
    TriggerPressure,
    ReadPressure,
}

impl Phase {
    /// Phase following `self`, given how many calls the current cycle has
    /// taken including this one.
    pub const fn next(self, cycle_calls: u32) -> Self {
        match self {
            Self::TriggerTemperature => Self::ReadTemperature,
            Self::ReadTemperature => Self::TriggerPressure,
            Self::TriggerPressure => Self::ReadPressure,
            Self::ReadPressure if cycle_calls >= CYCLE_LENGTH => Self::TriggerTemperature,
            Self::ReadPressure => Self::TriggerPressure,
        }
    }
}

pub struct Bmp085<I> {
    device: RegisterDevice<I>,
    state: SensorState,
    coefficients: Coefficients,
    oversampling: u8,
    phase: Phase,
    cycle_calls: u32,
    /// Temperature in °C and B5 from the last temperature conversion
    temperature: Option<(Scalar, i32)>,
}

impl<I: I2c> Bmp085<I> {
    /// Barometer at the fixed address, calibrated from `[barometer]`,
    /// ultra-low-power oversampling.
    pub fn new(bus: SharedBus<I>) -> Self {
        Self::with_address(bus, DEFAULT_ADDRESS, SensorState::new(SECTION))
    }

    pub fn with_address(bus: SharedBus<I>, address: u8, state: SensorState) -> Self {
        Self {
            device: RegisterDevice::new(bus, address, ByteOrder::Big),
            state,
            coefficients: Coefficients::default(),
            oversampling: 0,
            phase: Phase::TriggerTemperature,
            cycle_calls: 0,
            temperature: None,
        }
    }

    /// Use oversampling setting `oss` (0..=3) for pressure conversions.
    pub fn with_oversampling(mut self, oss: u8) -> Self {
        self.oversampling = oss.min(MAX_OVERSAMPLING);
        self
    }

    pub fn coefficients(&self) -> &Coefficients {
        &self.coefficients
    }

    /// Phase the next `poll` performs
    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn step(&mut self) -> Result<PollOutcome, SensorError<I::Error>> {
        match self.phase {
            Phase::TriggerTemperature => {
                self.device
                    .write_byte(CTRL_MEAS, MEASURE_TEMPERATURE)
                    .map_err(bus_failure(NAME, "start temperature conversion"))?;
                Ok(PollOutcome::Pending)
            }
            Phase::ReadTemperature => {
                let ut = self
                    .device
                    .read_word(OUT_MSB)
                    .map_err(bus_failure(NAME, "read temperature"))?;
                let (t, b5) = self.coefficients.compensate_temperature(ut as i32);
                self.temperature = Some((t as Scalar / 10.0, b5));
                debug!("{NAME}: UT {ut} -> {t} x0.1 °C");
                Ok(PollOutcome::Pending)
            }
            Phase::TriggerPressure => {
                self.device
                    .write_byte(CTRL_MEAS, MEASURE_PRESSURE + (self.oversampling << 6))
                    .map_err(bus_failure(NAME, "start pressure conversion"))?;
                Ok(PollOutcome::Pending)
            }
            Phase::ReadPressure => {
                let [msb, lsb, xlsb] = self
                    .device
                    .read_bytes::<3>(OUT_MSB)
                    .map_err(bus_failure(NAME, "read pressure"))?;
                let up = (((msb as i32) << 16) | ((lsb as i32) << 8) | xlsb as i32)
                    >> (8 - self.oversampling);

                let Some((celsius, b5)) = self.temperature else {
                    return Ok(PollOutcome::Pending);
                };
                let pascal = self
                    .coefficients
                    .compensate_pressure(up, b5, self.oversampling);

                let sample = self
                    .state
                    .record(Vector::new(0.0, 0.0, celsius), pascal as Scalar);
                debug!("{NAME}: {sample}");
                Ok(PollOutcome::Sampled)
            }
        }
    }
}

impl<I: I2c> Sensor for Bmp085<I> {
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

        let words = self
            .device
            .read_words::<11>(CALIBRATION_START)
            .map_err(bus_failure(NAME, "read calibration coefficients"))?;
        if words.iter().any(|&w| w == 0x0000 || w == 0xFFFF) {
            warn!("{NAME}: calibration EEPROM looks blank");
        }
        self.coefficients = Coefficients::from_words(words);

        let status = self
            .device
            .read_byte(CTRL_MEAS)
            .map_err(bus_failure(NAME, "read status"))?;

        self.state.set_chip(ChipInfo {
            id: id as u32,
            version: version as u16,
            status,
        });
        self.phase = Phase::TriggerTemperature;
        self.cycle_calls = 0;
        self.temperature = None;
        self.state.ready();
        info!(
            "{NAME}: chip {id:#04x} version {version:#04x}, oversampling {}",
            self.oversampling
        );
        Ok(())
    }

    fn poll(&mut self) -> Result<PollOutcome, Self::Error> {
        self.state.ensure_ready(NAME)?;

        if self.phase == Phase::TriggerTemperature {
            self.cycle_calls = 0;
        }

        let outcome = self.step()?;

        self.cycle_calls += 1;
        self.phase = self.phase.next(self.cycle_calls);
        Ok(outcome)
    }

    /// The chip idles between conversions; nothing to power down.
    fn finalize(&mut self) -> Result<(), Self::Error> {
        self.state.finalized();
        info!("{NAME}: finalized");
        Ok(())
    }

    fn quantities(&self) -> Quantities {
        let data = self.data();
        let mut quantities = Quantities::new();
        let _ = quantities.push(Quantity::Pressure(data.value));
        let _ = quantities.push(Quantity::Temperature(data.vector.z));
        quantities
    }
}
