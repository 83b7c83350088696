//! Sensor drivers
//!
//! Each supported chip implements [`Sensor`]: `initialize` writes the chip's
//! configuration and loads its calibration, `poll` performs one acquisition
//! and appends a calibrated sample to the history, `finalize` powers the chip
//! down. Sibling chips that share a register map are one driver
//! parameterised by a variant value.
//!
//! Bus failures propagate unchanged, wrapped with the sensor name and the
//! operation that failed. A failed `poll` leaves the current sample and the
//! history untouched; a sensor whose initialisation failed refuses to poll.

pub mod adxl345;
pub mod bma180;
pub mod bmp085;
pub mod bno055;
pub mod hmc58x3;
pub mod itg320x;

use alloc::string::String;
use core::fmt::Debug;

use embassy_time::Instant;
use log::error;
use thiserror_no_std::Error;

use crate::bus::BusError;
use crate::calibration::{Calibration, CalibrationSource};
use crate::error::ConfigError;
use crate::history::SampleHistory;
use crate::sample::{Quantities, Sample, Scalar, Vector};

pub use adxl345::Adxl345;
pub use bma180::Bma180;
pub use bmp085::Bmp085;
pub use bno055::Bno055;
pub use hmc58x3::{Hmc58x3, Hmc58x3Variant};
pub use itg320x::{Itg320x, Itg320xVariant};

/// Sensor failure
#[derive(Debug, Error)]
pub enum SensorError<E: Debug> {
    /// A bus transfer failed
    #[error("{sensor}: {operation} failed: {error}")]
    Bus {
        sensor: &'static str,
        operation: &'static str,
        error: BusError<E>,
    },

    /// The calibration source could not produce a calibration
    #[error("{sensor}: invalid calibration: {error}")]
    Config {
        sensor: &'static str,
        error: ConfigError,
    },

    /// `poll` was called without a successful `initialize`
    #[error("{sensor}: not initialized")]
    NotInitialized { sensor: &'static str },
}

impl<E: Debug> SensorError<E> {
    /// Name of the sensor that failed
    pub fn sensor(&self) -> &'static str {
        match self {
            Self::Bus { sensor, .. }
            | Self::Config { sensor, .. }
            | Self::NotInitialized { sensor } => *sensor,
        }
    }
}

/// Build a `map_err` adapter that logs a bus failure and tags it with the
/// sensor and operation.
pub(crate) fn bus_failure<E: Debug>(
    sensor: &'static str,
    operation: &'static str,
) -> impl FnOnce(BusError<E>) -> SensorError<E> {
    move |error| {
        error!("{sensor}: {operation} failed: {error}");
        SensorError::Bus {
            sensor,
            operation,
            error,
        }
    }
}

/// What a successful `poll` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A new sample was appended to the history
    Sampled,
    /// The chip had no fresh data; the previous sample stays current
    Discarded,
    /// A conversion was started or collected without completing a sample
    Pending,
}

/// Where a sensor is in its lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    /// Initialisation completed, polling allowed
    Ready,
    /// Initialisation did not complete
    Failed,
    /// Powered down by `finalize`
    Finalized,
}

/// Identification read from the chip during initialisation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChipInfo {
    pub id: u32,
    pub version: u16,
    pub status: u8,
}

/// State every driver keeps: calibration, current sample, history and chip
/// identification.
#[derive(Debug, Clone)]
pub struct SensorState {
    section: String,
    calibration: Calibration,
    data: Sample,
    history: SampleHistory,
    chip: ChipInfo,
    lifecycle: Lifecycle,
}

impl SensorState {
    /// State for a sensor whose calibration lives in profile `section`.
    pub fn new(section: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            calibration: Calibration::identity(),
            data: Sample::default(),
            history: SampleHistory::new(),
            chip: ChipInfo::default(),
            lifecycle: Lifecycle::Uninitialized,
        }
    }

    /// Limit the history to `capacity` samples.
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history = SampleHistory::with_capacity(capacity);
        self
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn data(&self) -> &Sample {
        &self.data
    }

    pub fn history(&self) -> &SampleHistory {
        &self.history
    }

    pub fn chip(&self) -> &ChipInfo {
        &self.chip
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Start initialisation: the sensor counts as failed until
    /// [`Self::ready`] is reached, and the calibration is (re)loaded.
    pub(crate) fn begin<E: Debug>(
        &mut self,
        sensor: &'static str,
        source: &dyn CalibrationSource,
    ) -> Result<(), SensorError<E>> {
        self.lifecycle = Lifecycle::Failed;
        self.calibration = source.calibration(&self.section).map_err(|error| {
            error!("{sensor}: calibration [{}] rejected: {error}", self.section);
            SensorError::Config { sensor, error }
        })?;
        Ok(())
    }

    pub(crate) fn ready(&mut self) {
        self.lifecycle = Lifecycle::Ready;
    }

    pub(crate) fn finalized(&mut self) {
        self.lifecycle = Lifecycle::Finalized;
    }

    pub(crate) fn set_chip(&mut self, chip: ChipInfo) {
        self.chip = chip;
    }

    pub(crate) fn ensure_ready<E: Debug>(&self, sensor: &'static str) -> Result<(), SensorError<E>> {
        match self.lifecycle {
            Lifecycle::Ready => Ok(()),
            _ => Err(SensorError::NotInitialized { sensor }),
        }
    }

    /// Calibrate a reading taken now, make it current and append it to the
    /// history.
    pub(crate) fn record(&mut self, raw: Vector, raw_value: Scalar) -> &Sample {
        let sample = self.calibration.apply(Instant::now(), raw, raw_value);
        self.data = sample;
        self.history.push(sample);
        &self.data
    }
}

/// Common surface of every supported chip
pub trait Sensor {
    type Error;

    /// Chip name used in logs and errors
    fn name(&self) -> &'static str;

    fn state(&self) -> &SensorState;

    /// Configure the chip and load its calibration from `source`.
    fn initialize(&mut self, source: &dyn CalibrationSource) -> Result<(), Self::Error>;

    /// Perform one acquisition step.
    fn poll(&mut self) -> Result<PollOutcome, Self::Error>;

    /// Power the chip down.
    fn finalize(&mut self) -> Result<(), Self::Error>;

    /// The current sample as typed quantities
    fn quantities(&self) -> Quantities;

    /// Current (newest) sample
    fn data(&self) -> &Sample {
        self.state().data()
    }

    fn history(&self) -> &SampleHistory {
        self.state().history()
    }

    fn calibration(&self) -> &Calibration {
        self.state().calibration()
    }

    fn id(&self) -> u32 {
        self.state().chip().id
    }

    fn version(&self) -> u16 {
        self.state().chip().version
    }

    fn status(&self) -> u8 {
        self.state().chip().status
    }
}
