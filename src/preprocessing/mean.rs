//! Per-channel mean centering

use crate::{
    error::Result,
    types::ImageTensor,
    utils::TensorValidator,
};
use ndarray::{ArrayD, ArrayView3, ArrayViewD, Axis, Ix3};

/// Red channel mean of the ImageNet training set
pub const R_MEAN: f32 = 123.68;
/// Green channel mean of the ImageNet training set
pub const G_MEAN: f32 = 116.78;
/// Blue channel mean of the ImageNet training set
pub const B_MEAN: f32 = 103.94;

/// Default centering constants in RGB order
pub const DEFAULT_MEANS: [f32; 3] = [R_MEAN, G_MEAN, B_MEAN];

#[derive(Clone, Copy)]
enum Shift {
    Add,
    Subtract,
}

/// Adds the given means to each image channel.
///
/// Inverse of [`mean_image_subtraction`] up to floating-point rounding.
///
/// # Errors
/// `InvalidArgument` if the number of channels in `image` doesn't match the
/// number of values in `means`.
pub fn mean_image_addition(image: ArrayView3<'_, f32>, means: &[f32]) -> Result<ImageTensor> {
    let shifted = shift_channels(image.into_dyn(), means, Shift::Add)?;
    Ok(shifted.into_dimensionality::<Ix3>()?)
}

/// Subtracts the given means from each image channel.
///
/// ```rust
/// use deeplab_ops::preprocessing::{mean_image_subtraction, DEFAULT_MEANS};
/// use ndarray::Array3;
///
/// let image = Array3::<f32>::from_elem((2, 2, 3), 200.0);
/// let centered = mean_image_subtraction(image.view(), &DEFAULT_MEANS)?;
/// assert!((centered[[0, 0, 0]] - (200.0 - 123.68)).abs() < 1e-4);
/// # Ok::<(), deeplab_ops::DeepLabError>(())
/// ```
///
/// # Errors
/// `InvalidArgument` if the number of channels in `image` doesn't match the
/// number of values in `means`.
pub fn mean_image_subtraction(image: ArrayView3<'_, f32>, means: &[f32]) -> Result<ImageTensor> {
    let shifted = shift_channels(image.into_dyn(), means, Shift::Subtract)?;
    Ok(shifted.into_dimensionality::<Ix3>()?)
}

/// Rank-checked variant of [`mean_image_addition`] for tensors of unknown rank.
///
/// # Errors
/// `InvalidArgument` if `image` is not rank 3 or its channel count doesn't
/// match `means`.
pub fn mean_image_addition_dyn(image: ArrayViewD<'_, f32>, means: &[f32]) -> Result<ArrayD<f32>> {
    shift_channels(image, means, Shift::Add)
}

/// Rank-checked variant of [`mean_image_subtraction`] for tensors of unknown rank.
///
/// # Errors
/// `InvalidArgument` if `image` is not rank 3 or its channel count doesn't
/// match `means`.
pub fn mean_image_subtraction_dyn(
    image: ArrayViewD<'_, f32>,
    means: &[f32],
) -> Result<ArrayD<f32>> {
    shift_channels(image, means, Shift::Subtract)
}

fn shift_channels(image: ArrayViewD<'_, f32>, means: &[f32], shift: Shift) -> Result<ArrayD<f32>> {
    let (_, _, channels) = TensorValidator::validate_image_rank(image.shape())?;
    TensorValidator::validate_channel_count(channels, means.len())?;

    let mut output = image.to_owned();
    for (mut plane, &mean) in output.axis_iter_mut(Axis(2)).zip(means) {
        match shift {
            Shift::Add => plane.mapv_inplace(|v| v + mean),
            Shift::Subtract => plane.mapv_inplace(|v| v - mean),
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, ArrayD, IxDyn};

    fn gradient_image(height: usize, width: usize) -> Array3<f32> {
        Array3::from_shape_fn((height, width, 3), |(y, x, c)| {
            (y * 10 + x * 3 + c * 50) as f32
        })
    }

    #[test]
    fn test_subtraction_per_channel() {
        let image = Array3::<f32>::from_elem((2, 3, 3), 150.0);
        let centered = mean_image_subtraction(image.view(), &DEFAULT_MEANS).unwrap();

        assert_eq!(centered.dim(), (2, 3, 3));
        for ((_, _, c), value) in centered.indexed_iter() {
            let expected = 150.0 - DEFAULT_MEANS[c];
            assert!((value - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn test_addition_then_subtraction_round_trips() {
        let image = gradient_image(5, 7);
        let added = mean_image_addition(image.view(), &DEFAULT_MEANS).unwrap();
        let restored = mean_image_subtraction(added.view(), &DEFAULT_MEANS).unwrap();

        for (a, b) in image.iter().zip(restored.iter()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_channel_count_mismatch() {
        let image = Array3::<f32>::zeros((4, 4, 3));
        let err = mean_image_subtraction(image.view(), &[1.0, 2.0]).unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(err.to_string().contains("len(means)"));

        let single = Array3::<f32>::zeros((4, 4, 1));
        assert!(mean_image_addition(single.view(), &DEFAULT_MEANS).is_err());
        assert!(mean_image_addition(single.view(), &[5.0]).is_ok());
    }

    #[test]
    fn test_dyn_rejects_wrong_rank() {
        let rank2 = ArrayD::<f32>::zeros(IxDyn(&[4, 4]));
        let err = mean_image_subtraction_dyn(rank2.view(), &DEFAULT_MEANS).unwrap_err();
        assert!(err.to_string().contains("[height, width, C>0]"));

        let rank4 = ArrayD::<f32>::zeros(IxDyn(&[1, 4, 4, 3]));
        assert!(mean_image_addition_dyn(rank4.view(), &DEFAULT_MEANS).is_err());

        let rank3 = ArrayD::<f32>::zeros(IxDyn(&[4, 4, 3]));
        let shifted = mean_image_addition_dyn(rank3.view(), &DEFAULT_MEANS).unwrap();
        assert_eq!(shifted.shape(), &[4, 4, 3]);
    }
}
