use alloc::string::String;
use thiserror_no_std::Error;

/// Configuration problems detected while building values from static
/// parameters or from a calibration profile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Bounded scalar range whose span is neither 1, 2 nor 4 quarter turns
    #[error("unsupported bounded range [{min_quarters}, {max_quarters}] quarter turns")]
    UnsupportedSpan {
        /// Lower bound in quarter turns
        min_quarters: i8,
        /// Upper bound in quarter turns
        max_quarters: i8,
    },

    /// Calibration key whose value does not parse as a number
    #[error("[{section}] {key} = `{value}` is not a number")]
    InvalidNumber {
        /// Section the key was read from
        section: String,
        /// Offending key
        key: String,
        /// Raw value text
        value: String,
    },
}
