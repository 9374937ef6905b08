//! Tensor validation utilities
//!
//! Provides centralized validation for tensor ranks, channel counts and
//! image/label shape agreement.

use crate::error::{DeepLabError, Result};

/// Validator for tensor operations and shape validation
pub struct TensorValidator;

impl TensorValidator {
    /// Validate that a shape describes a `[height, width, C>0]` image
    ///
    /// Returns `(height, width, channels)` on success.
    pub fn validate_image_rank(shape: &[usize]) -> Result<(usize, usize, usize)> {
        match shape {
            [height, width, channels] if *channels > 0 => Ok((*height, *width, *channels)),
            _ => Err(DeepLabError::invalid_argument(
                "Input must be of size [height, width, C>0]",
            )),
        }
    }

    /// Validate that the number of per-channel constants matches the channel dimension
    pub fn validate_channel_count(channels: usize, means_len: usize) -> Result<()> {
        if means_len != channels {
            return Err(DeepLabError::invalid_argument(
                "len(means) must match the number of channels",
            ));
        }
        Ok(())
    }

    /// Validate that a label tensor is `[height, width, 1]` and spatially matches its image
    pub fn validate_label_shape(image_shape: &[usize], label_shape: &[usize]) -> Result<()> {
        let (image_height, image_width) = match image_shape {
            [h, w, _] => (*h, *w),
            _ => {
                return Err(DeepLabError::invalid_argument(format!(
                    "Image must have rank 3, got shape {:?}",
                    image_shape
                )))
            },
        };

        match label_shape {
            [h, w, 1] if *h == image_height && *w == image_width => Ok(()),
            [_, _, 1] => Err(DeepLabError::invalid_argument(format!(
                "Label spatial size {:?} doesn't match image spatial size [{}, {}]",
                label_shape.get(..2).unwrap_or_default(),
                image_height,
                image_width
            ))),
            _ => Err(DeepLabError::invalid_argument(format!(
                "Label must be of size [height, width, 1], got {:?}",
                label_shape
            ))),
        }
    }

    /// Validate requested crop dimensions
    pub fn validate_crop_size(crop_height: usize, crop_width: usize) -> Result<()> {
        if crop_height == 0 || crop_width == 0 {
            return Err(DeepLabError::invalid_argument(format!(
                "Crop size must be positive, got {}x{}",
                crop_height, crop_width
            )));
        }
        Ok(())
    }

    /// Validate that a feature tensor's channel dimension matches the layer's parameters
    pub fn validate_feature_channels(expected: usize, actual: usize, scope: &str) -> Result<()> {
        if expected != actual {
            return Err(DeepLabError::variable(format!(
                "Input to '{}' has {} channels but parameters have shape [{}]",
                scope, actual, expected
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_image_rank() {
        assert_eq!(
            TensorValidator::validate_image_rank(&[4, 5, 3]).unwrap(),
            (4, 5, 3)
        );

        // Wrong rank
        assert!(TensorValidator::validate_image_rank(&[4, 5]).is_err());
        assert!(TensorValidator::validate_image_rank(&[1, 4, 5, 3]).is_err());

        // No channels
        assert!(TensorValidator::validate_image_rank(&[4, 5, 0]).is_err());
    }

    #[test]
    fn test_validate_channel_count() {
        assert!(TensorValidator::validate_channel_count(3, 3).is_ok());
        let err = TensorValidator::validate_channel_count(3, 2).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_validate_label_shape() {
        assert!(TensorValidator::validate_label_shape(&[8, 6, 3], &[8, 6, 1]).is_ok());

        // Spatial mismatch
        assert!(TensorValidator::validate_label_shape(&[8, 6, 3], &[8, 5, 1]).is_err());

        // Wrong depth
        assert!(TensorValidator::validate_label_shape(&[8, 6, 3], &[8, 6, 2]).is_err());

        // Wrong rank
        assert!(TensorValidator::validate_label_shape(&[8, 6, 3], &[8, 6]).is_err());
    }

    #[test]
    fn test_validate_crop_size() {
        assert!(TensorValidator::validate_crop_size(513, 513).is_ok());
        assert!(TensorValidator::validate_crop_size(0, 513).is_err());
        assert!(TensorValidator::validate_crop_size(513, 0).is_err());
    }

    #[test]
    fn test_validate_feature_channels() {
        assert!(TensorValidator::validate_feature_channels(16, 16, "bn").is_ok());
        let err = TensorValidator::validate_feature_channels(16, 8, "bn").unwrap_err();
        assert!(matches!(err, DeepLabError::Variable(_)));
    }
}
