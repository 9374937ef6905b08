//! Numeric validation utilities
//!
//! Provides safe numeric conversions and range validation for scale factors,
//! probabilities and batch-norm hyper-parameters.

use crate::error::{DeepLabError, Result};

/// Validator for numeric operations and conversions
pub struct NumericValidator;

impl NumericValidator {
    /// Validate a random rescale range, in the order the checks are documented
    pub fn validate_scale_range(min_scale: f32, max_scale: f32) -> Result<()> {
        if !(min_scale > 0.0) {
            return Err(DeepLabError::invalid_argument(
                "'min_scale' must be greater than 0.",
            ));
        }
        if !(max_scale > 0.0) {
            return Err(DeepLabError::invalid_argument(
                "'max_scale' must be greater than 0.",
            ));
        }
        if min_scale >= max_scale {
            return Err(DeepLabError::invalid_argument(
                "'max_scale' must be greater than 'min_scale'.",
            ));
        }
        if !max_scale.is_finite() {
            return Err(DeepLabError::invalid_argument(format!(
                "'max_scale' must be finite, got {}",
                max_scale
            )));
        }
        Ok(())
    }

    /// Truncate a scaled dimension to an integer size
    pub fn validate_scaled_dimension(value: f32) -> Result<usize> {
        if !value.is_finite() {
            return Err(DeepLabError::processing(format!(
                "Cannot convert non-finite dimension {} to usize",
                value
            )));
        }

        if value < 0.0 {
            return Err(DeepLabError::processing(format!(
                "Cannot convert negative dimension {} to usize",
                value
            )));
        }

        if value > u32::MAX as f32 {
            return Err(DeepLabError::processing(format!(
                "Dimension {} exceeds u32::MAX ({})",
                value,
                u32::MAX
            )));
        }

        Ok(value as usize)
    }

    /// Validate probability value (0.0 to 1.0)
    pub fn validate_probability(value: f32) -> Result<f32> {
        if !value.is_finite() {
            return Err(DeepLabError::invalid_argument(format!(
                "Probability must be finite, got {}",
                value
            )));
        }

        if !(0.0..=1.0).contains(&value) {
            return Err(DeepLabError::invalid_argument(format!(
                "Probability must be between 0.0 and 1.0, got {}",
                value
            )));
        }

        Ok(value)
    }

    /// Validate numeric range (inclusive)
    pub fn validate_range<T>(value: T, min: T, max: T, name: &str) -> Result<T>
    where
        T: PartialOrd + std::fmt::Display + Copy,
    {
        if !(value >= min && value <= max) {
            return Err(DeepLabError::invalid_config(format!(
                "{} must be between {} and {}, got {}",
                name, min, max, value
            )));
        }
        Ok(value)
    }

    /// Validate that a value is positive
    pub fn validate_positive<T>(value: T, name: &str) -> Result<T>
    where
        T: PartialOrd + std::fmt::Display + Copy + Default,
    {
        if !(value > T::default()) {
            return Err(DeepLabError::invalid_config(format!(
                "{} must be positive, got {}",
                name, value
            )));
        }
        Ok(value)
    }

    /// Validate that every per-channel mean is finite
    pub fn validate_means(means: &[f32]) -> Result<()> {
        for (i, &value) in means.iter().enumerate() {
            if !value.is_finite() {
                return Err(DeepLabError::invalid_config(format!(
                    "Mean value at index {} is not finite: {}",
                    i, value
                )));
            }
            if !(0.0..=255.0).contains(&value) {
                log::warn!(
                    "Unusual mean value at index {}: {} (typical range: 0-255)",
                    i,
                    value
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_scale_range() {
        assert!(NumericValidator::validate_scale_range(0.5, 2.0).is_ok());

        let err = NumericValidator::validate_scale_range(0.0, 2.0).unwrap_err();
        assert!(err.to_string().contains("'min_scale' must be greater than 0."));

        // min_scale is checked before max_scale
        let err = NumericValidator::validate_scale_range(0.5, 0.0).unwrap_err();
        assert!(err.to_string().contains("'max_scale' must be greater than 0."));

        let err = NumericValidator::validate_scale_range(2.0, 2.0).unwrap_err();
        assert!(err.to_string().contains("'max_scale' must be greater than 'min_scale'."));

        assert!(NumericValidator::validate_scale_range(f32::NAN, 2.0).is_err());
        assert!(NumericValidator::validate_scale_range(0.5, f32::INFINITY).is_err());
    }

    #[test]
    fn test_validate_scaled_dimension() {
        assert_eq!(NumericValidator::validate_scaled_dimension(0.0).unwrap(), 0);
        assert_eq!(NumericValidator::validate_scaled_dimension(12.9).unwrap(), 12);

        assert!(NumericValidator::validate_scaled_dimension(-1.0).is_err());
        assert!(NumericValidator::validate_scaled_dimension(f32::NAN).is_err());
    }

    #[test]
    fn test_validate_probability() {
        assert!(NumericValidator::validate_probability(0.0).is_ok());
        assert!(NumericValidator::validate_probability(0.5).is_ok());
        assert!(NumericValidator::validate_probability(1.0).is_ok());

        assert!(NumericValidator::validate_probability(-0.1).is_err());
        assert!(NumericValidator::validate_probability(1.1).is_err());
        assert!(NumericValidator::validate_probability(f32::NAN).is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(NumericValidator::validate_range(0.9997, 0.0, 1.0, "decay").is_ok());
        assert!(NumericValidator::validate_range(1.5, 0.0, 1.0, "decay").is_err());
        assert!(NumericValidator::validate_range(f64::NAN, 0.0, 1.0, "decay").is_err());
    }

    #[test]
    fn test_validate_positive() {
        assert!(NumericValidator::validate_positive(1e-3, "epsilon").is_ok());
        assert!(NumericValidator::validate_positive(0.0, "epsilon").is_err());
        assert!(NumericValidator::validate_positive(0_usize, "num_dev").is_err());
    }

    #[test]
    fn test_validate_means() {
        assert!(NumericValidator::validate_means(&[123.68, 116.78, 103.94]).is_ok());
        assert!(NumericValidator::validate_means(&[f32::NAN, 1.0, 2.0]).is_err());
    }
}
