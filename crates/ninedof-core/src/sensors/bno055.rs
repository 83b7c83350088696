//! BNO055 absolute orientation sensor
//!
//! Runs the on-chip NDOF fusion and reports Euler angles plus the unit
//! quaternion. The sample vector holds heading, pitch and roll in radians.
//!
//! The chip's Euler registers follow its own convention: the register it
//! calls roll (0x1C) spans ±90° and the one it calls pitch (0x1E) spans
//! ±180°. The driver reports the ±90° axis as [`Pitch`] and the ±180° axis
//! as [`Roll`], so neither is folded by the bounded range.

use embedded_hal::i2c::I2c;
use log::{debug, info, warn};
use nalgebra::{Quaternion, UnitQuaternion};

use super::{ChipInfo, PollOutcome, Sensor, SensorError, SensorState, bus_failure};
use crate::angle::{Heading, Pitch, Roll};
use crate::bus::{ByteOrder, RegisterDevice, SharedBus};
use crate::calibration::CalibrationSource;
use crate::sample::{Quantities, Quantity, Scalar, Vector};

const NAME: &str = "BNO055";

/// Default address with COM3 pulled low
pub const DEFAULT_ADDRESS: u8 = 0x28;

/// Default profile section
pub const SECTION: &str = "orientation";

const CHIP_ID: u8 = 0x00;
const SW_REV_ID_LSB: u8 = 0x04;
const EUL_HEADING_LSB: u8 = 0x1A;
const SYS_STATUS: u8 = 0x39;
const UNIT_SEL: u8 = 0x3B;
const OPR_MODE: u8 = 0x3D;
const PWR_MODE: u8 = 0x3E;

const EXPECTED_CHIP_ID: u8 = 0xA0;

const OPR_MODE_CONFIG: u8 = 0x00;
const OPR_MODE_NDOF: u8 = 0x0C;
const PWR_MODE_NORMAL: u8 = 0x00;
const PWR_MODE_SUSPEND: u8 = 0x02;
/// Angular rate in rad/s, Euler angles in radians
const UNIT_SEL_RADIANS: u8 = 0x06;

const LSB_PER_RADIAN: Scalar = 900.0;
const LSB_PER_UNIT_QUATERNION: Scalar = (1 << 14) as Scalar;

pub struct Bno055<I> {
    device: RegisterDevice<I>,
    state: SensorState,
    rotation: UnitQuaternion<Scalar>,
}

impl<I: I2c> Bno055<I> {
    /// Orientation sensor at the default address, calibrated from
    /// `[orientation]`.
    pub fn new(bus: SharedBus<I>) -> Self {
        Self::with_address(bus, DEFAULT_ADDRESS, SensorState::new(SECTION))
    }

    pub fn with_address(bus: SharedBus<I>, address: u8, state: SensorState) -> Self {
        Self {
            device: RegisterDevice::new(bus, address, ByteOrder::Little),
            state,
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Orientation from the most recent poll
    pub fn rotation(&self) -> &UnitQuaternion<Scalar> {
        &self.rotation
    }
}

impl<I: I2c> Sensor for Bno055<I> {
    type Error = SensorError<I::Error>;

    fn name(&self) -> &'static str {
        NAME
    }

    fn state(&self) -> &SensorState {
        &self.state
    }

    fn initialize(&mut self, source: &dyn CalibrationSource) -> Result<(), Self::Error> {
        self.state.begin(NAME, source)?;

        let id = self
            .device
            .read_byte(CHIP_ID)
            .map_err(bus_failure(NAME, "read chip id"))?;
        if id != EXPECTED_CHIP_ID {
            warn!("{NAME}: unexpected chip id {id:#04x}");
        }
        let version = self
            .device
            .read_word(SW_REV_ID_LSB)
            .map_err(bus_failure(NAME, "read software revision"))?;

        // Unit selection is only accepted in config mode
        self.device
            .write_byte(OPR_MODE, OPR_MODE_CONFIG)
            .and_then(|_| self.device.write_byte(PWR_MODE, PWR_MODE_NORMAL))
            .and_then(|_| self.device.write_byte(UNIT_SEL, UNIT_SEL_RADIANS))
            .and_then(|_| self.device.write_byte(OPR_MODE, OPR_MODE_NDOF))
            .map_err(bus_failure(NAME, "configure"))?;

        let status = self
            .device
            .read_byte(SYS_STATUS)
            .map_err(bus_failure(NAME, "read system status"))?;

        self.state.set_chip(ChipInfo {
            id: id as u32,
            version,
            status,
        });
        self.state.ready();
        info!("{NAME}: chip {id:#04x} software {version:#06x}, NDOF fusion running");
        Ok(())
    }

    fn poll(&mut self) -> Result<PollOutcome, Self::Error> {
        self.state.ensure_ready(NAME)?;

        // Register order: heading, ±90° tilt, ±180° tilt, quaternion
        let [heading, pitch, roll, w, x, y, z] = self
            .device
            .read_words::<7>(EUL_HEADING_LSB)
            .map_err(bus_failure(NAME, "read orientation"))?
            .map(|word| word as i16 as Scalar);

        let angles = Vector::new(heading, pitch, roll) / LSB_PER_RADIAN;
        let quaternion = Quaternion::new(w, x, y, z) / LSB_PER_UNIT_QUATERNION;
        self.rotation = UnitQuaternion::try_new(quaternion, Scalar::EPSILON)
            .unwrap_or_else(UnitQuaternion::identity);

        let sample = self.state.record(angles, 0.0);
        debug!("{NAME}: {sample}");
        Ok(PollOutcome::Sampled)
    }

    fn finalize(&mut self) -> Result<(), Self::Error> {
        self.device
            .write_byte(OPR_MODE, OPR_MODE_CONFIG)
            .and_then(|_| self.device.write_byte(PWR_MODE, PWR_MODE_SUSPEND))
            .map_err(bus_failure(NAME, "suspend"))?;

        self.state.finalized();
        info!("{NAME}: suspended");
        Ok(())
    }

    fn quantities(&self) -> Quantities {
        let angles = self.data().vector;
        let mut quantities = Quantities::new();
        let _ = quantities.push(Quantity::Heading(Heading::new(angles.x)));
        let _ = quantities.push(Quantity::Pitch(Pitch::new(angles.y)));
        let _ = quantities.push(Quantity::Roll(Roll::new(angles.z)));
        let _ = quantities.push(Quantity::Rotation(self.rotation));
        quantities
    }
}
