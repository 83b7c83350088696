//! Affine calibration of raw sensor readings
//!
//! Every reading is a raw 3-vector plus a raw auxiliary scalar. The vector
//! goes through a full affine map `M · v + o`, the scalar through
//! `s · factor + offset`. Most chips only need per-axis scaling; the profile
//! stores those compactly as `x_factor`, `y_factor`, `z_factor` and switches
//! to the nine `xx_factor` .. `zz_factor` keys once any cross-axis term is
//! present. Either spelling of a diagonal term is accepted on load.

use embassy_time::Instant;
use log::debug;
use nalgebra::Matrix3;

use crate::error::ConfigError;
use crate::profile::Profile;
use crate::sample::{Sample, Scalar, Vector};

const DIAGONAL_KEYS: [&str; 3] = ["x_factor", "y_factor", "z_factor"];

const OFFSET_KEYS: [&str; 3] = ["x_offset", "y_offset", "z_offset"];

const MATRIX_KEYS: [[&str; 3]; 3] = [
    ["xx_factor", "xy_factor", "xz_factor"],
    ["yx_factor", "yy_factor", "yz_factor"],
    ["zx_factor", "zy_factor", "zz_factor"],
];

const VALUE_FACTOR_KEY: &str = "v_factor";
const VALUE_OFFSET_KEY: &str = "v_offset";

/// Anything a device can pull its calibration from during initialisation
pub trait CalibrationSource {
    /// Calibration for the device whose profile section is `section`.
    fn calibration(&self, section: &str) -> Result<Calibration, ConfigError>;
}

/// Affine correction for the vector part and linear correction for the
/// scalar part of a reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    correction: Matrix3<Scalar>,
    offset: Vector,
    value_factor: Scalar,
    value_offset: Scalar,
}

impl Default for Calibration {
    fn default() -> Self {
        Self::identity()
    }
}

impl Calibration {
    /// Calibration that leaves readings unchanged
    pub fn identity() -> Self {
        Self {
            correction: Matrix3::identity(),
            offset: Vector::zeros(),
            value_factor: 1.0,
            value_offset: 0.0,
        }
    }

    pub fn new(
        correction: Matrix3<Scalar>,
        offset: Vector,
        value_factor: Scalar,
        value_offset: Scalar,
    ) -> Self {
        Self {
            correction,
            offset,
            value_factor,
            value_offset,
        }
    }

    /// Per-axis scale and offset without cross-axis terms.
    pub fn diagonal(
        factors: Vector,
        offset: Vector,
        value_factor: Scalar,
        value_offset: Scalar,
    ) -> Self {
        Self::new(
            Matrix3::from_diagonal(&factors),
            offset,
            value_factor,
            value_offset,
        )
    }

    /// Uniform scale on all three axes plus a scale on the scalar part.
    pub fn scaled(vector_factor: Scalar, value_factor: Scalar) -> Self {
        Self::diagonal(Vector::repeat(vector_factor), Vector::zeros(), value_factor, 0.0)
    }

    pub fn correction(&self) -> &Matrix3<Scalar> {
        &self.correction
    }

    pub fn offset(&self) -> &Vector {
        &self.offset
    }

    pub fn x_factor(&self) -> Scalar {
        self.correction[(0, 0)]
    }

    pub fn y_factor(&self) -> Scalar {
        self.correction[(1, 1)]
    }

    pub fn z_factor(&self) -> Scalar {
        self.correction[(2, 2)]
    }

    pub fn x_offset(&self) -> Scalar {
        self.offset.x
    }

    pub fn y_offset(&self) -> Scalar {
        self.offset.y
    }

    pub fn z_offset(&self) -> Scalar {
        self.offset.z
    }

    pub fn v_factor(&self) -> Scalar {
        self.value_factor
    }

    pub fn v_offset(&self) -> Scalar {
        self.value_offset
    }

    /// Whether all cross-axis terms are zero
    pub fn is_diagonal(&self) -> bool {
        (0..3).all(|row| (0..3).all(|col| row == col || self.correction[(row, col)] == 0.0))
    }

    /// Map a raw reading to a calibrated sample.
    pub fn apply(&self, timestamp: Instant, raw: Vector, raw_value: Scalar) -> Sample {
        Sample {
            timestamp,
            vector: self.correction * raw + self.offset,
            value: raw_value * self.value_factor + self.value_offset,
        }
    }

    /// Copy of this calibration with the vector offsets shifted so that a
    /// reading whose calibrated mean is `mean` maps to the zero vector.
    ///
    /// The scalar part is left untouched.
    pub fn zeroed_at(&self, mean: &Sample) -> Self {
        Self {
            offset: self.offset - mean.vector,
            ..*self
        }
    }

    /// Read the calibration stored in `section`.
    ///
    /// Missing keys fall back to identity. The presence of any off-diagonal
    /// key selects the full-matrix form. A diagonal term is read from its
    /// matrix key (`xx_factor`) or its compact key (`x_factor`), preferring
    /// the key of the selected form.
    pub fn from_profile(profile: &Profile, section: &str) -> Result<Self, ConfigError> {
        let number = |key: &str, default: Scalar| -> Result<Scalar, ConfigError> {
            Ok(profile.get_number(section, key)?.unwrap_or(default))
        };

        let full_matrix = (0..3).any(|row| {
            (0..3).any(|col| row != col && profile.get(section, MATRIX_KEYS[row][col]).is_some())
        });

        let mut correction = Matrix3::identity();
        for row in 0..3 {
            if full_matrix {
                for col in 0..3 {
                    let fallback = if row == col {
                        number(DIAGONAL_KEYS[row], 1.0)?
                    } else {
                        0.0
                    };
                    correction[(row, col)] = number(MATRIX_KEYS[row][col], fallback)?;
                }
            } else {
                let fallback = number(MATRIX_KEYS[row][row], 1.0)?;
                correction[(row, row)] = number(DIAGONAL_KEYS[row], fallback)?;
            }
        }

        let offset = Vector::new(
            number(OFFSET_KEYS[0], 0.0)?,
            number(OFFSET_KEYS[1], 0.0)?,
            number(OFFSET_KEYS[2], 0.0)?,
        );

        debug!(
            "[{section}] loaded {} calibration",
            if full_matrix { "full-matrix" } else { "diagonal" }
        );

        Ok(Self {
            correction,
            offset,
            value_factor: number(VALUE_FACTOR_KEY, 1.0)?,
            value_offset: number(VALUE_OFFSET_KEY, 0.0)?,
        })
    }

    /// Store this calibration into `section`, replacing only calibration
    /// keys. Other keys and sections are kept.
    pub fn write_to(&self, profile: &mut Profile, section: &str) {
        if self.is_diagonal() {
            for keys in MATRIX_KEYS {
                for key in keys {
                    profile.remove(section, key);
                }
            }
            for (axis, key) in DIAGONAL_KEYS.iter().enumerate() {
                profile.set_number(section, key, self.correction[(axis, axis)]);
            }
        } else {
            for key in DIAGONAL_KEYS {
                profile.remove(section, key);
            }
            for (row, keys) in MATRIX_KEYS.iter().enumerate() {
                for (col, key) in keys.iter().enumerate() {
                    profile.set_number(section, key, self.correction[(row, col)]);
                }
            }
        }

        for (axis, key) in OFFSET_KEYS.iter().enumerate() {
            profile.set_number(section, key, self.offset[axis]);
        }
        profile.set_number(section, VALUE_FACTOR_KEY, self.value_factor);
        profile.set_number(section, VALUE_OFFSET_KEY, self.value_offset);

        debug!("[{section}] calibration stored");
    }
}

impl CalibrationSource for Profile {
    fn calibration(&self, section: &str) -> Result<Calibration, ConfigError> {
        Calibration::from_profile(self, section)
    }
}

/// A fixed calibration serves every section.
impl CalibrationSource for Calibration {
    fn calibration(&self, _section: &str) -> Result<Calibration, ConfigError> {
        Ok(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ticks: u64) -> Instant {
        Instant::from_ticks(ticks)
    }

    #[test]
    fn test_identity_leaves_reading_unchanged() {
        let raw = Vector::new(-12.5, 0.25, 4096.0);
        let sample = Calibration::identity().apply(at(5), raw, 27.5);

        assert_eq!(sample.vector, raw);
        assert_eq!(sample.value, 27.5);
        assert_eq!(sample.timestamp, at(5));
    }

    #[test]
    fn test_apply_full_affine_map() {
        let correction = Matrix3::new(1.0, 2.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 2.0);
        let calibration = Calibration::new(correction, Vector::new(1.0, 1.0, 1.0), 2.0, -1.0);

        let sample = calibration.apply(at(0), Vector::new(1.0, 2.0, 3.0), 5.0);

        assert_eq!(sample.vector, Vector::new(6.0, 3.0, 7.0));
        assert_eq!(sample.value, 9.0);
    }

    #[test]
    fn test_missing_section_loads_identity() {
        let calibration = Calibration::from_profile(&Profile::new(), "compass").unwrap();

        assert_eq!(calibration, Calibration::identity());
        assert_eq!(calibration.x_factor(), 1.0);
    }

    #[test]
    fn test_diagonal_keys() {
        let profile = Profile::new()
            .with_entry("gyro", "x_factor", "2")
            .with_entry("gyro", "z_offset", "-3")
            .with_entry("gyro", "v_offset", "35");
        let calibration = Calibration::from_profile(&profile, "gyro").unwrap();

        assert!(calibration.is_diagonal());
        assert_eq!(calibration.x_factor(), 2.0);
        assert_eq!(calibration.y_factor(), 1.0);
        assert_eq!(calibration.z_offset(), -3.0);
        assert_eq!(calibration.v_factor(), 1.0);
        assert_eq!(calibration.v_offset(), 35.0);
    }

    #[test]
    fn test_matrix_diagonal_keys_without_cross_terms() {
        let profile = Profile::new()
            .with_entry("compass", "xx_factor", "2")
            .with_entry("compass", "yy_factor", "3")
            .with_entry("compass", "zz_factor", "4")
            .with_entry("compass", "z_factor", "5");
        let calibration = Calibration::from_profile(&profile, "compass").unwrap();

        assert!(calibration.is_diagonal());
        assert_eq!(calibration.x_factor(), 2.0);
        assert_eq!(calibration.y_factor(), 3.0);
        assert_eq!(calibration.z_factor(), 5.0);
    }

    #[test]
    fn test_off_diagonal_key_selects_full_matrix() {
        let profile = Profile::new()
            .with_entry("compass", "xy_factor", "0.5")
            .with_entry("compass", "yy_factor", "3");
        let calibration = Calibration::from_profile(&profile, "compass").unwrap();

        assert!(!calibration.is_diagonal());
        assert_eq!(calibration.correction()[(0, 1)], 0.5);
        assert_eq!(calibration.correction()[(1, 1)], 3.0);
        assert_eq!(calibration.correction()[(2, 2)], 1.0);
        assert_eq!(calibration.correction()[(1, 0)], 0.0);
    }

    #[test]
    fn test_save_then_load_is_bit_identical() {
        let diagonal = Calibration::diagonal(
            Vector::new(0.0039, 1.0 / 3.0, -0.1),
            Vector::new(0.7, -12.25, 1e-7),
            0.1,
            -273.15,
        );
        let full = Calibration::new(
            Matrix3::new(1.01, 0.02, -0.003, 0.1, 0.97, 0.0, 0.0, -0.04, 1.2),
            Vector::new(-0.5, 0.25, 3.3),
            1.0 / 7.0,
            0.0,
        );

        let mut profile = Profile::new();
        diagonal.write_to(&mut profile, "accelerometer");
        full.write_to(&mut profile, "compass");

        assert_eq!(Calibration::from_profile(&profile, "accelerometer").unwrap(), diagonal);
        assert_eq!(Calibration::from_profile(&profile, "compass").unwrap(), full);
    }

    #[test]
    fn test_save_keeps_other_sections_and_keys() {
        let mut profile = Profile::new()
            .with_entry("gyro", "x_offset", "4")
            .with_entry("gyro", "label", "stick")
            .with_entry("compass", "x_factor", "2");

        Calibration::identity().write_to(&mut profile, "gyro");

        assert_eq!(profile.get("compass", "x_factor"), Some("2"));
        assert_eq!(profile.get("gyro", "label"), Some("stick"));
        assert_eq!(profile.get_number("gyro", "x_offset").unwrap(), Some(0.0));
    }

    #[test]
    fn test_switching_to_diagonal_drops_matrix_keys() {
        let mut profile = Profile::new().with_entry("compass", "xy_factor", "0.5");

        Calibration::identity().write_to(&mut profile, "compass");

        assert_eq!(profile.get("compass", "xy_factor"), None);
        assert!(
            Calibration::from_profile(&profile, "compass")
                .unwrap()
                .is_diagonal()
        );
    }

    #[test]
    fn test_zeroed_at_nulls_resting_reading() {
        let calibration = Calibration::scaled(2.0, 1.0);
        let raw = Vector::new(1.5, -0.5, 0.25);
        let resting = calibration.apply(at(0), raw, 30.0);

        let zeroed = calibration.zeroed_at(&resting);
        let sample = zeroed.apply(at(1), raw, 30.0);

        assert_eq!(sample.vector, Vector::zeros());
        assert_eq!(sample.value, 30.0);
    }

    #[test]
    fn test_sources() {
        let fixed = Calibration::scaled(3.0, 1.0);
        assert_eq!(fixed.calibration("anything").unwrap(), fixed);

        let profile = Profile::new().with_entry("a", "v_factor", "2");
        assert_eq!(profile.calibration("a").unwrap().v_factor(), 2.0);
    }
}
