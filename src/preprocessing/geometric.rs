//! Random geometric augmentations applied jointly to an image and its label map

use super::resize::{resize_bilinear, resize_nearest};
use crate::{
    error::Result,
    types::{ImageTensor, LabelTensor},
    utils::{NumericValidator, TensorValidator},
};
use ndarray::{concatenate, s, Array3, ArrayView3, Axis};
use rand::Rng;

/// Rescales an image and label by one random factor drawn from `[min_scale, max_scale)`.
///
/// The new size is `trunc(height * scale) x trunc(width * scale)`. The image is
/// resized bilinearly; the label uses nearest-neighbour sampling so that no
/// class id is invented. Channel depth is preserved.
///
/// # Errors
/// `InvalidArgument` if `min_scale <= 0`, `max_scale <= 0` or
/// `min_scale >= max_scale` (checked in that order), or if the label is not a
/// `[height, width, 1]` map matching the image.
pub fn random_rescale_image_and_label<R>(
    image: ArrayView3<'_, f32>,
    label: ArrayView3<'_, i32>,
    min_scale: f32,
    max_scale: f32,
    rng: &mut R,
) -> Result<(ImageTensor, LabelTensor)>
where
    R: Rng + ?Sized,
{
    NumericValidator::validate_scale_range(min_scale, max_scale)?;
    TensorValidator::validate_label_shape(image.shape(), label.shape())?;

    let (height, width, _) = image.dim();
    let scale: f32 = rng.random_range(min_scale..max_scale);
    let new_height = NumericValidator::validate_scaled_dimension(height as f32 * scale)?;
    let new_width = NumericValidator::validate_scaled_dimension(width as f32 * scale)?;

    tracing::trace!(
        scale,
        height,
        width,
        new_height,
        new_width,
        "random rescale"
    );

    let image = resize_bilinear(image, new_height, new_width);
    // Since label classes are integers, nearest neighbour is used.
    let label = resize_nearest(label, new_height, new_width);

    Ok((image, label))
}

/// Crops and/or pads an image and label to exactly `crop_height x crop_width`.
///
/// Label values are offset by `-ignore_label` before the pair is zero-padded
/// (anchored at the top-left corner) up to `max(crop, current)` in each spatial
/// dimension, so padded label pixels come back as `ignore_label` once the offset
/// is removed. One random window of the crop size is then taken from the padded
/// pair.
///
/// # Errors
/// `InvalidArgument` for a zero crop size or a label that is not a
/// `[height, width, 1]` map matching the image.
pub fn random_crop_or_pad_image_and_label<R>(
    image: ArrayView3<'_, f32>,
    label: ArrayView3<'_, i32>,
    crop_height: usize,
    crop_width: usize,
    ignore_label: i32,
    rng: &mut R,
) -> Result<(ImageTensor, LabelTensor)>
where
    R: Rng + ?Sized,
{
    TensorValidator::validate_crop_size(crop_height, crop_width)?;
    TensorValidator::validate_label_shape(image.shape(), label.shape())?;

    let (height, width, channels) = image.dim();
    let offset = ignore_label as f32;

    // Subtract due to 0 padding.
    let shifted_label = label.mapv(|v| v as f32 - offset);
    let image_and_label = concatenate(Axis(2), &[image.view(), shifted_label.view()])?;

    let padded_height = crop_height.max(height);
    let padded_width = crop_width.max(width);
    let mut padded = Array3::<f32>::zeros((padded_height, padded_width, channels + 1));
    padded
        .slice_mut(s![..height, ..width, ..])
        .assign(&image_and_label);

    let top = rng.random_range(0..=padded_height - crop_height);
    let left = rng.random_range(0..=padded_width - crop_width);

    tracing::trace!(
        height,
        width,
        padded_height,
        padded_width,
        top,
        left,
        "random crop window"
    );

    let window = padded.slice(s![top..top + crop_height, left..left + crop_width, ..]);
    let image_crop = window.slice(s![.., .., ..channels]).to_owned();
    let label_crop = window
        .slice(s![.., .., channels..])
        .mapv(|v| (v + offset) as i32);

    Ok((image_crop, label_crop))
}

/// Randomly flips an image and label horizontally with probability 0.5.
///
/// One uniform draw decides for both tensors: they are flipped together or not at all.
///
/// # Errors
/// `InvalidArgument` if the label is not a `[height, width, 1]` map matching the image.
pub fn random_flip_left_right_image_and_label<R>(
    image: ArrayView3<'_, f32>,
    label: ArrayView3<'_, i32>,
    rng: &mut R,
) -> Result<(ImageTensor, LabelTensor)>
where
    R: Rng + ?Sized,
{
    random_flip_left_right_image_and_label_with_probability(image, label, 0.5, rng)
}

/// Coupled horizontal flip taken when a uniform `[0, 1)` draw falls below `probability`.
///
/// `probability = 0.0` never flips and `probability = 1.0` always flips.
///
/// # Errors
/// `InvalidArgument` if `probability` is outside `[0, 1]` or the label doesn't
/// match the image.
pub fn random_flip_left_right_image_and_label_with_probability<R>(
    image: ArrayView3<'_, f32>,
    label: ArrayView3<'_, i32>,
    probability: f32,
    rng: &mut R,
) -> Result<(ImageTensor, LabelTensor)>
where
    R: Rng + ?Sized,
{
    NumericValidator::validate_probability(probability)?;
    TensorValidator::validate_label_shape(image.shape(), label.shape())?;

    let uniform_random: f32 = rng.random();
    let mirror = uniform_random < probability;
    tracing::trace!(uniform_random, mirror, "random horizontal flip");

    if mirror {
        Ok((
            image.slice(s![.., ..;-1, ..]).to_owned(),
            label.slice(s![.., ..;-1, ..]).to_owned(),
        ))
    } else {
        Ok((image.to_owned(), label.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::SampleRng;

    fn numbered_image(height: usize, width: usize) -> Array3<f32> {
        Array3::from_shape_fn((height, width, 3), |(y, x, c)| (y * 100 + x * 3 + c) as f32)
    }

    fn numbered_label(height: usize, width: usize) -> Array3<i32> {
        Array3::from_shape_fn((height, width, 1), |(y, x, _)| ((y + x) % 5) as i32)
    }

    #[test]
    fn test_rescale_stays_within_range() {
        let image = numbered_image(40, 60);
        let label = numbered_label(40, 60);
        let mut rng = SampleRng::seeded(3);

        for _ in 0..20 {
            let (scaled_image, scaled_label) =
                random_rescale_image_and_label(image.view(), label.view(), 0.5, 2.0, &mut rng)
                    .unwrap();
            let (h, w, c) = scaled_image.dim();
            assert_eq!(c, 3);
            assert_eq!(scaled_label.dim(), (h, w, 1));
            assert!(h >= 20 && h < 80, "height {} out of range", h);
            assert!(w >= 30 && w < 120, "width {} out of range", w);
        }
    }

    #[test]
    fn test_rescale_rejects_bad_ranges() {
        let image = numbered_image(4, 4);
        let label = numbered_label(4, 4);
        let mut rng = SampleRng::seeded(0);

        for (min, max) in [(0.0, 1.0), (0.5, 0.0), (1.0, 1.0), (2.0, 1.0), (-1.0, 1.0)] {
            let err = random_rescale_image_and_label(image.view(), label.view(), min, max, &mut rng)
                .unwrap_err();
            assert!(err.is_invalid_argument(), "({}, {}) should be rejected", min, max);
        }
    }

    #[test]
    fn test_crop_pads_small_inputs_with_ignore_label() {
        let image = Array3::<f32>::from_elem((2, 3, 3), 7.0);
        let label = Array3::<i32>::from_elem((2, 3, 1), 1);
        let mut rng = SampleRng::seeded(11);

        let (image_crop, label_crop) =
            random_crop_or_pad_image_and_label(image.view(), label.view(), 5, 6, 255, &mut rng)
                .unwrap();

        assert_eq!(image_crop.dim(), (5, 6, 3));
        assert_eq!(label_crop.dim(), (5, 6, 1));

        // Padding anchored top-left, window covers the whole padded canvas.
        assert_eq!(image_crop[[0, 0, 0]], 7.0);
        assert_eq!(label_crop[[0, 0, 0]], 1);
        assert_eq!(image_crop[[4, 5, 2]], 0.0);
        assert_eq!(label_crop[[4, 5, 0]], 255);
        assert_eq!(label_crop[[1, 3, 0]], 255);

        let valid = label_crop.iter().filter(|&&v| v == 1).count();
        assert_eq!(valid, 6);
    }

    #[test]
    fn test_crop_large_inputs_keeps_pairs_aligned() {
        let image = numbered_image(30, 40);
        let label = Array3::from_shape_fn((30, 40, 1), |(y, x, _)| (y * 100 + x) as i32);
        let mut rng = SampleRng::seeded(5);

        let (image_crop, label_crop) =
            random_crop_or_pad_image_and_label(image.view(), label.view(), 10, 12, 255, &mut rng)
                .unwrap();
        assert_eq!(image_crop.dim(), (10, 12, 3));
        assert_eq!(label_crop.dim(), (10, 12, 1));

        // Recover the window origin from the label and check the image agrees.
        let origin = label_crop[[0, 0, 0]];
        let (top, left) = ((origin / 100) as usize, (origin % 100) as usize);
        assert_eq!(image_crop[[0, 0, 0]], image[[top, left, 0]]);
        assert_eq!(image_crop[[9, 11, 2]], image[[top + 9, left + 11, 2]]);
        assert!(label_crop.iter().all(|&v| v != 255));
    }

    #[test]
    fn test_crop_rejects_mismatched_label() {
        let image = numbered_image(8, 8);
        let label = numbered_label(8, 7);
        let mut rng = SampleRng::seeded(0);
        assert!(
            random_crop_or_pad_image_and_label(image.view(), label.view(), 4, 4, 255, &mut rng)
                .is_err()
        );
        assert!(
            random_crop_or_pad_image_and_label(image.view(), numbered_label(8, 8).view(), 0, 4, 255, &mut rng)
                .is_err()
        );
    }

    #[test]
    fn test_flip_always_and_never() {
        let image = numbered_image(3, 4);
        let label = numbered_label(3, 4);
        let mut rng = SampleRng::seeded(42);

        let (flipped_image, flipped_label) = random_flip_left_right_image_and_label_with_probability(
            image.view(),
            label.view(),
            1.0,
            &mut rng,
        )
        .unwrap();
        assert_eq!(flipped_image[[1, 0, 2]], image[[1, 3, 2]]);
        assert_eq!(flipped_label[[2, 0, 0]], label[[2, 3, 0]]);

        let (same_image, same_label) = random_flip_left_right_image_and_label_with_probability(
            image.view(),
            label.view(),
            0.0,
            &mut rng,
        )
        .unwrap();
        assert_eq!(same_image, image);
        assert_eq!(same_label, label);
    }

    #[test]
    fn test_flip_rejects_bad_probability() {
        let image = numbered_image(2, 2);
        let label = numbered_label(2, 2);
        let mut rng = SampleRng::seeded(0);
        assert!(random_flip_left_right_image_and_label_with_probability(
            image.view(),
            label.view(),
            1.5,
            &mut rng
        )
        .is_err());
    }
}
