//! Bounded circular scalars for angular quantities
//!
//! A [`BoundedScalar`] holds an angle in radians that always lies inside a
//! range expressed in quarter turns (multiples of π/2). Two wrap policies
//! exist, chosen by the span of the range:
//!
//! - a full turn (span 4) wraps modulo the range into `[min, max)`, the way
//!   a heading or a roll angle rolls over;
//! - a quarter or half turn (span 1 or 2) reflects like a triangle wave into
//!   `[min, max]`, the way pitch "bounces" back from the vertical.
//!
//! Every mutation goes through [`BoundedScalar::set_value`], so the range
//! invariant holds after any arithmetic.

use core::f32::consts::FRAC_PI_2;
use core::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use crate::error::ConfigError;
use crate::sample::Scalar;

/// Degrees in one quarter turn
const QUARTER_TURN_DEGREES: Scalar = 90.0;

/// Convert degrees to radians
#[inline]
pub fn degrees_to_radians(degrees: Scalar) -> Scalar {
    degrees.to_radians()
}

/// Convert radians to degrees
#[inline]
pub fn radians_to_degrees(radians: Scalar) -> Scalar {
    radians.to_degrees()
}

/// How out-of-range values are brought back into a bounded range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapPolicy {
    /// Wrap around modulo the range, result in `[min, max)`
    Modulo,
    /// Mirror back and forth between the bounds, result in `[min, max]`
    Reflect,
}

impl WrapPolicy {
    /// Policy for a range spanning `span` quarter turns, if supported
    pub const fn for_span(span: i16) -> Option<Self> {
        match span {
            4 => Some(Self::Modulo),
            1 | 2 => Some(Self::Reflect),
            _ => None,
        }
    }

    /// Bring `value` into the range `min..max` (same unit as the bounds).
    pub fn apply(self, value: Scalar, min: Scalar, max: Scalar) -> Scalar {
        if !value.is_finite() {
            return min;
        }

        let range = max - min;
        let offset = value - min;
        let cycles = libm::floorf(offset / range);
        let remainder = offset - cycles * range;

        let wrapped = match self {
            Self::Modulo => min + remainder,
            Self::Reflect if cycles % 2.0 == 0.0 => min + remainder,
            Self::Reflect => max - remainder,
        };
        self.settle(wrapped, min, max)
    }

    /// Absorb rounding at the bounds so the result honours the policy's
    /// interval exactly.
    fn settle(self, value: Scalar, min: Scalar, max: Scalar) -> Scalar {
        match self {
            Self::Modulo if value >= max || value < min => min,
            Self::Modulo => value,
            Self::Reflect => value.clamp(min, max),
        }
    }
}

/// Normalize a radian `value` into a range given in quarter turns at runtime.
///
/// Returns [`ConfigError::UnsupportedSpan`] for spans other than 1, 2 or 4.
pub fn normalize(value: Scalar, min_quarters: i8, max_quarters: i8) -> Result<Scalar, ConfigError> {
    let span = max_quarters as i16 - min_quarters as i16;
    let policy = WrapPolicy::for_span(span).ok_or(ConfigError::UnsupportedSpan {
        min_quarters,
        max_quarters,
    })?;
    Ok(policy.apply(
        value,
        min_quarters as Scalar * FRAC_PI_2,
        max_quarters as Scalar * FRAC_PI_2,
    ))
}

/// Angle confined to `[MIN_QUARTERS·π/2, MAX_QUARTERS·π/2]`.
///
/// Instantiating a span other than 1, 2 or 4 quarter turns fails to compile.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct BoundedScalar<const MIN_QUARTERS: i8, const MAX_QUARTERS: i8> {
    value: Scalar,
}

/// Compass heading, `[0, 2π)`
pub type Heading = BoundedScalar<0, 4>;
/// Pitch, `[-π/2, π/2]`, reflecting at the vertical
pub type Pitch = BoundedScalar<-1, 1>;
/// Roll, `[-π, π)`
pub type Roll = BoundedScalar<-2, 2>;

impl<const MIN_QUARTERS: i8, const MAX_QUARTERS: i8> BoundedScalar<MIN_QUARTERS, MAX_QUARTERS> {
    const POLICY: WrapPolicy =
        match WrapPolicy::for_span(MAX_QUARTERS as i16 - MIN_QUARTERS as i16) {
            Some(policy) => policy,
            None => panic!("bounded scalar span must be 1, 2 or 4 quarter turns"),
        };

    /// Lower bound in radians
    pub const MIN: Scalar = MIN_QUARTERS as Scalar * FRAC_PI_2;
    /// Upper bound in radians
    pub const MAX: Scalar = MAX_QUARTERS as Scalar * FRAC_PI_2;

    const MIN_DEGREES: Scalar = MIN_QUARTERS as Scalar * QUARTER_TURN_DEGREES;
    const MAX_DEGREES: Scalar = MAX_QUARTERS as Scalar * QUARTER_TURN_DEGREES;

    /// Create from radians, normalizing into range.
    pub fn new(radians: Scalar) -> Self {
        let mut scalar = Self { value: Self::MIN };
        scalar.set_value(radians);
        scalar
    }

    /// Create from degrees.
    ///
    /// Wrapping happens in degrees so whole-degree inputs land exactly on
    /// whole-degree results before conversion.
    pub fn from_degrees(degrees: Scalar) -> Self {
        let policy = Self::POLICY;
        let wrapped = policy.apply(degrees, Self::MIN_DEGREES, Self::MAX_DEGREES);
        Self {
            value: policy.settle(degrees_to_radians(wrapped), Self::MIN, Self::MAX),
        }
    }

    /// Wrap policy in effect for this range
    pub const fn policy() -> WrapPolicy {
        Self::POLICY
    }

    /// Current value in radians
    #[inline]
    pub const fn value(&self) -> Scalar {
        self.value
    }

    /// Current value in degrees
    #[inline]
    pub fn degrees(&self) -> Scalar {
        radians_to_degrees(self.value)
    }

    /// Replace the value, normalizing into range.
    pub fn set_value(&mut self, radians: Scalar) {
        self.value = Self::POLICY.apply(radians, Self::MIN, Self::MAX);
    }
}

impl<const MIN_QUARTERS: i8, const MAX_QUARTERS: i8> Default
    for BoundedScalar<MIN_QUARTERS, MAX_QUARTERS>
{
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl<const MIN_QUARTERS: i8, const MAX_QUARTERS: i8> From<Scalar>
    for BoundedScalar<MIN_QUARTERS, MAX_QUARTERS>
{
    fn from(radians: Scalar) -> Self {
        Self::new(radians)
    }
}

impl<const MIN_QUARTERS: i8, const MAX_QUARTERS: i8> PartialEq<Scalar>
    for BoundedScalar<MIN_QUARTERS, MAX_QUARTERS>
{
    /// Compares against the normalized form of `other`.
    fn eq(&self, other: &Scalar) -> bool {
        self.value == Self::new(*other).value
    }
}

impl<const MIN_QUARTERS: i8, const MAX_QUARTERS: i8> AddAssign<Scalar>
    for BoundedScalar<MIN_QUARTERS, MAX_QUARTERS>
{
    fn add_assign(&mut self, rhs: Scalar) {
        self.set_value(self.value + rhs);
    }
}

impl<const MIN_QUARTERS: i8, const MAX_QUARTERS: i8> SubAssign<Scalar>
    for BoundedScalar<MIN_QUARTERS, MAX_QUARTERS>
{
    fn sub_assign(&mut self, rhs: Scalar) {
        self.set_value(self.value - rhs);
    }
}

impl<const MIN_QUARTERS: i8, const MAX_QUARTERS: i8> MulAssign<Scalar>
    for BoundedScalar<MIN_QUARTERS, MAX_QUARTERS>
{
    fn mul_assign(&mut self, rhs: Scalar) {
        self.set_value(self.value * rhs);
    }
}

impl<const MIN_QUARTERS: i8, const MAX_QUARTERS: i8> AddAssign
    for BoundedScalar<MIN_QUARTERS, MAX_QUARTERS>
{
    fn add_assign(&mut self, rhs: Self) {
        *self += rhs.value;
    }
}

impl<const MIN_QUARTERS: i8, const MAX_QUARTERS: i8> SubAssign
    for BoundedScalar<MIN_QUARTERS, MAX_QUARTERS>
{
    fn sub_assign(&mut self, rhs: Self) {
        *self -= rhs.value;
    }
}

impl<const MIN_QUARTERS: i8, const MAX_QUARTERS: i8> Add<Scalar>
    for BoundedScalar<MIN_QUARTERS, MAX_QUARTERS>
{
    type Output = Self;

    fn add(mut self, rhs: Scalar) -> Self {
        self += rhs;
        self
    }
}

impl<const MIN_QUARTERS: i8, const MAX_QUARTERS: i8> Sub<Scalar>
    for BoundedScalar<MIN_QUARTERS, MAX_QUARTERS>
{
    type Output = Self;

    fn sub(mut self, rhs: Scalar) -> Self {
        self -= rhs;
        self
    }
}

impl<const MIN_QUARTERS: i8, const MAX_QUARTERS: i8> Mul<Scalar>
    for BoundedScalar<MIN_QUARTERS, MAX_QUARTERS>
{
    type Output = Self;

    fn mul(mut self, rhs: Scalar) -> Self {
        self *= rhs;
        self
    }
}

impl<const MIN_QUARTERS: i8, const MAX_QUARTERS: i8> Add
    for BoundedScalar<MIN_QUARTERS, MAX_QUARTERS>
{
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl<const MIN_QUARTERS: i8, const MAX_QUARTERS: i8> Sub
    for BoundedScalar<MIN_QUARTERS, MAX_QUARTERS>
{
    type Output = Self;

    fn sub(mut self, rhs: Self) -> Self {
        self -= rhs;
        self
    }
}

impl<const MIN_QUARTERS: i8, const MAX_QUARTERS: i8> Neg
    for BoundedScalar<MIN_QUARTERS, MAX_QUARTERS>
{
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_degrees(actual: Scalar, expected: Scalar) {
        assert!(
            (actual - expected).abs() < 1e-3,
            "expected {expected} degrees, got {actual}"
        );
    }

    #[test]
    fn test_pitch_reflects_at_vertical() {
        assert_eq!(Pitch::policy(), WrapPolicy::Reflect);
        assert_degrees(Pitch::from_degrees(100.0).degrees(), 80.0);
        assert_degrees(Pitch::from_degrees(820.0).degrees(), 80.0);
        assert_degrees(Pitch::from_degrees(-30.0).degrees(), -30.0);
        assert_degrees(Pitch::from_degrees(-460.0).degrees(), -80.0);
    }

    #[test]
    fn test_roll_wraps_modulo() {
        assert_eq!(Roll::policy(), WrapPolicy::Modulo);
        assert_degrees(Roll::from_degrees(370.0).degrees(), 10.0);
        assert_degrees(Roll::from_degrees(190.0).degrees(), -170.0);
        assert_degrees(Roll::from_degrees(-460.0).degrees(), -100.0);
    }

    #[test]
    fn test_heading_wraps_into_full_turn() {
        assert_degrees(Heading::from_degrees(-460.0).degrees(), 260.0);
        assert_degrees(Heading::from_degrees(360.0).degrees(), 0.0);
        assert_degrees(Heading::from_degrees(720.0).degrees(), 0.0);
    }

    #[test]
    fn test_radian_construction_matches_degrees() {
        let from_radians = Pitch::new(degrees_to_radians(820.0));
        assert_degrees(from_radians.degrees(), 80.0);

        let heading = Heading::new(-core::f32::consts::FRAC_PI_2);
        assert_degrees(heading.degrees(), 270.0);
    }

    #[test]
    fn test_arithmetic_stays_in_range() {
        let mut heading = Heading::from_degrees(350.0);
        heading += degrees_to_radians(20.0);
        assert_degrees(heading.degrees(), 10.0);

        let heading = heading - degrees_to_radians(30.0);
        assert_degrees(heading.degrees(), 340.0);

        let pitch = Pitch::from_degrees(60.0) * 2.0;
        assert_degrees(pitch.degrees(), 60.0);

        let roll = Roll::from_degrees(170.0) + Roll::from_degrees(20.0);
        assert_degrees(roll.degrees(), -170.0);

        let pitch = -Pitch::from_degrees(45.0);
        assert_degrees(pitch.degrees(), -45.0);
    }

    #[test]
    fn test_value_always_within_bounds() {
        let mut pitch = Pitch::default();
        let mut heading = Heading::default();
        let mut degrees = -1000.0;
        while degrees < 1000.0 {
            pitch.set_value(degrees_to_radians(degrees));
            heading.set_value(degrees_to_radians(degrees));
            assert!(pitch.value() >= Pitch::MIN && pitch.value() <= Pitch::MAX);
            assert!(heading.value() >= Heading::MIN && heading.value() < Heading::MAX);
            degrees += 7.3;
        }
    }

    #[test]
    fn test_equality_normalizes_raw_scalar() {
        assert_eq!(Heading::from_degrees(10.0), Heading::from_degrees(370.0));
        assert_eq!(Pitch::from_degrees(80.0), Pitch::from_degrees(100.0));
        assert!(Heading::default() == 0.0);
    }

    #[test]
    fn test_non_finite_input_falls_back_to_minimum() {
        assert_eq!(Pitch::new(Scalar::NAN).value(), Pitch::MIN);
        assert_eq!(Heading::new(Scalar::INFINITY).value(), Heading::MIN);
    }

    #[test]
    fn test_runtime_normalize_rejects_unsupported_span() {
        assert_eq!(
            normalize(1.0, 0, 3),
            Err(ConfigError::UnsupportedSpan {
                min_quarters: 0,
                max_quarters: 3
            })
        );
        let wrapped = normalize(degrees_to_radians(100.0), -1, 1).unwrap();
        assert_degrees(radians_to_degrees(wrapped), 80.0);
        let quarter = normalize(degrees_to_radians(100.0), 0, 1).unwrap();
        assert_degrees(radians_to_degrees(quarter), 80.0);
    }
}
