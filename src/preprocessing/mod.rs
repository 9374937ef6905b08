//! Image and label preprocessing for segmentation training
//!
//! Five stateless operations over `[height, width, channels]` image tensors and
//! their `[height, width, 1]` label maps:
//!
//! - [`mean_image_addition`] / [`mean_image_subtraction`]: per-channel centering
//! - [`random_rescale_image_and_label`]: one random scale, bilinear image / nearest label
//! - [`random_crop_or_pad_image_and_label`]: fixed-size crop, padding with the ignore label
//! - [`random_flip_left_right_image_and_label`]: coupled horizontal flip
//!
//! Random operations draw from the generator passed in by the caller; see
//! [`crate::random::SampleRng`] for seeding helpers.
//!
//! ```rust
//! use deeplab_ops::preprocessing::{mean_image_subtraction, random_crop_or_pad_image_and_label, DEFAULT_MEANS};
//! use deeplab_ops::random::SampleRng;
//! use ndarray::Array3;
//!
//! let image = Array3::<f32>::from_elem((20, 30, 3), 128.0);
//! let label = Array3::<i32>::zeros((20, 30, 1));
//! let mut rng = SampleRng::seeded(0);
//!
//! let (image, label) =
//!     random_crop_or_pad_image_and_label(image.view(), label.view(), 32, 32, 255, &mut rng)?;
//! assert_eq!(image.dim(), (32, 32, 3));
//! assert_eq!(label.dim(), (32, 32, 1));
//!
//! let centered = mean_image_subtraction(image.view(), &DEFAULT_MEANS)?;
//! assert_eq!(centered.dim(), (32, 32, 3));
//! # Ok::<(), deeplab_ops::DeepLabError>(())
//! ```

mod geometric;
mod mean;
mod pipeline;
pub mod resize;

pub use geometric::{
    random_crop_or_pad_image_and_label, random_flip_left_right_image_and_label,
    random_flip_left_right_image_and_label_with_probability, random_rescale_image_and_label,
};
pub use mean::{
    mean_image_addition, mean_image_addition_dyn, mean_image_subtraction,
    mean_image_subtraction_dyn, B_MEAN, DEFAULT_MEANS, G_MEAN, R_MEAN,
};
pub use pipeline::AugmentationPipeline;
