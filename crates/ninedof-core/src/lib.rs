//! Hardware-independent core library for ninedof
//!
//! This crate contains all platform-agnostic logic for the ninedof telemetry
//! front-end: register-level drivers for the supported inertial and
//! environmental chips, the calibration transform and its profile format,
//! bounded angular scalars, the quantity-typed sample model and the bounded
//! per-sensor sample history.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets and Linux hosts (for the sampler binary and tests).

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod angle;
pub mod bus;
pub mod calibration;
pub mod error;
pub mod history;
pub mod profile;
pub mod sample;
pub mod sensors;

pub use angle::{BoundedScalar, Heading, Pitch, Roll};
pub use bus::{BusError, BusRegistry, ByteOrder, RegisterDevice, SharedBus};
pub use calibration::{Calibration, CalibrationSource};
pub use error::ConfigError;
pub use history::SampleHistory;
pub use profile::Profile;
pub use sample::{Quantity, Sample, Scalar};
pub use sensors::{PollOutcome, Sensor, SensorError};
