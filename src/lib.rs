//! Linux host glue for the ninedof sampler
//!
//! Opens `/dev/i2c-<n>` buses through the core crate's bus registry, reads
//! and writes calibration profile files, and assembles the sensor sets of
//! the supported boards.

pub mod board;
pub mod calibration_file;
pub mod linux_bus;

pub use board::{Board, DynSensor};
