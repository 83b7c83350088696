//! Calibrated samples and the quantity-typed view on them

use core::fmt::Display;

use embassy_time::Instant;
use nalgebra::{UnitQuaternion, Vector3};

use crate::angle::{Heading, Pitch, Roll};

/// Numeric type of every calibrated value
pub type Scalar = f32;

/// Three-axis vector of calibrated values
pub type Vector = Vector3<Scalar>;

/// Maximum number of quantities a single sensor reports per sample
pub const MAX_QUANTITIES: usize = 4;

/// Quantities reported by one sensor for its current sample
pub type Quantities = heapless::Vec<Quantity, MAX_QUANTITIES>;

/// One decoded, calibrated and timestamped sensor reading.
///
/// Every sample carries a 3-vector and an auxiliary scalar. Sensors that
/// only produce one of the two leave the other at its neutral default
/// (zero vector, `0.0`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Time the reading was taken
    pub timestamp: Instant,
    /// Calibrated vector part (acceleration, flux, rate, angles, ...)
    pub vector: Vector,
    /// Calibrated scalar part (temperature, pressure, ...)
    pub value: Scalar,
}

impl Sample {
    /// Creates a sample from its parts.
    pub const fn new(timestamp: Instant, vector: Vector, value: Scalar) -> Self {
        Self {
            timestamp,
            vector,
            value,
        }
    }
}

impl Default for Sample {
    fn default() -> Self {
        Self {
            timestamp: Instant::from_ticks(0),
            vector: Vector::zeros(),
            value: 0.0,
        }
    }
}

impl Display for Sample {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "[Sample] t: {} us, vector: ({:.3}, {:.3}, {:.3}), value: {:.3}",
            self.timestamp.as_micros(),
            self.vector.x,
            self.vector.y,
            self.vector.z,
            self.value
        )
    }
}

/// Physical quantity carried by a sample, tagged with its meaning
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Quantity {
    /// Static pressure in Pa
    Pressure(Scalar),
    /// Temperature in °C
    Temperature(Scalar),
    /// Linear acceleration in m/s²
    Acceleration(Vector),
    /// Angular rate in rad/s
    AngularVelocity(Vector),
    /// Magnetic flux density in µT
    MagneticFlux(Vector),
    /// Compass heading
    Heading(Heading),
    /// Pitch angle
    Pitch(Pitch),
    /// Roll angle
    Roll(Roll),
    /// Absolute orientation
    Rotation(UnitQuaternion<Scalar>),
}

/// Tag of a [`Quantity`] without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuantityKind {
    Pressure,
    Temperature,
    Acceleration,
    AngularVelocity,
    MagneticFlux,
    Heading,
    Pitch,
    Roll,
    Rotation,
}

impl QuantityKind {
    /// Get a short label for display
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pressure => "pressure",
            Self::Temperature => "temperature",
            Self::Acceleration => "acceleration",
            Self::AngularVelocity => "angular velocity",
            Self::MagneticFlux => "magnetic flux",
            Self::Heading => "heading",
            Self::Pitch => "pitch",
            Self::Roll => "roll",
            Self::Rotation => "rotation",
        }
    }

    /// Get the unit the quantity is expressed in
    pub const fn unit(self) -> &'static str {
        match self {
            Self::Pressure => "Pa",
            Self::Temperature => "°C",
            Self::Acceleration => "m/s²",
            Self::AngularVelocity => "rad/s",
            Self::MagneticFlux => "µT",
            Self::Heading | Self::Pitch | Self::Roll => "°",
            Self::Rotation => "",
        }
    }
}

impl Quantity {
    /// Tag of this quantity
    pub const fn kind(&self) -> QuantityKind {
        match self {
            Self::Pressure(_) => QuantityKind::Pressure,
            Self::Temperature(_) => QuantityKind::Temperature,
            Self::Acceleration(_) => QuantityKind::Acceleration,
            Self::AngularVelocity(_) => QuantityKind::AngularVelocity,
            Self::MagneticFlux(_) => QuantityKind::MagneticFlux,
            Self::Heading(_) => QuantityKind::Heading,
            Self::Pitch(_) => QuantityKind::Pitch,
            Self::Roll(_) => QuantityKind::Roll,
            Self::Rotation(_) => QuantityKind::Rotation,
        }
    }

    /// Scalar payload, for pressure and temperature
    pub fn scalar(&self) -> Option<Scalar> {
        match *self {
            Self::Pressure(value) | Self::Temperature(value) => Some(value),
            _ => None,
        }
    }

    /// Vector payload, for acceleration, angular velocity and flux
    pub fn vector(&self) -> Option<Vector> {
        match *self {
            Self::Acceleration(v) | Self::AngularVelocity(v) | Self::MagneticFlux(v) => Some(v),
            _ => None,
        }
    }
}

impl Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let kind = self.kind();
        match self {
            Self::Pressure(value) | Self::Temperature(value) => {
                write!(f, "{}: {:.2} {}", kind.label(), value, kind.unit())
            }
            Self::Acceleration(v) | Self::AngularVelocity(v) | Self::MagneticFlux(v) => write!(
                f,
                "{}: ({:.3}, {:.3}, {:.3}) {} |{:.3}|",
                kind.label(),
                v.x,
                v.y,
                v.z,
                kind.unit(),
                v.norm()
            ),
            Self::Heading(angle) => write!(f, "{}: {:.1}{}", kind.label(), angle.degrees(), kind.unit()),
            Self::Pitch(angle) => write!(f, "{}: {:.1}{}", kind.label(), angle.degrees(), kind.unit()),
            Self::Roll(angle) => write!(f, "{}: {:.1}{}", kind.label(), angle.degrees(), kind.unit()),
            Self::Rotation(q) => write!(
                f,
                "{}: (w {:.4}, x {:.4}, y {:.4}, z {:.4})",
                kind.label(),
                q.w,
                q.i,
                q.j,
                q.k
            ),
        }
    }
}
