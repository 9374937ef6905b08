//! Sequential composition of the preprocessing operations used for training

use super::{
    mean_image_subtraction, random_crop_or_pad_image_and_label,
    random_flip_left_right_image_and_label_with_probability, random_rescale_image_and_label,
};
use crate::{config::AugmentationConfig, error::Result, types::AugmentedSample};
use ndarray::ArrayView3;
use rand::Rng;

/// Applies rescale, crop/pad, flip and mean subtraction in that order.
///
/// In evaluation mode only mean subtraction runs.
#[derive(Debug, Clone)]
pub struct AugmentationPipeline {
    config: AugmentationConfig,
}

impl AugmentationPipeline {
    /// Create a pipeline from a validated configuration
    pub fn new(config: AugmentationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AugmentationConfig {
        &self.config
    }

    /// Run the pipeline on one image/label pair
    pub fn apply<R>(
        &self,
        image: ArrayView3<'_, f32>,
        label: ArrayView3<'_, i32>,
        rng: &mut R,
    ) -> Result<AugmentedSample>
    where
        R: Rng + ?Sized,
    {
        let config = &self.config;

        if !config.is_training {
            let image = mean_image_subtraction(image, &config.means)?;
            return Ok(AugmentedSample::new(image, label.to_owned()));
        }

        let (image, label) = random_rescale_image_and_label(
            image,
            label,
            config.min_scale,
            config.max_scale,
            rng,
        )?;
        let (image, label) = random_crop_or_pad_image_and_label(
            image.view(),
            label.view(),
            config.crop_height,
            config.crop_width,
            config.ignore_label,
            rng,
        )?;
        let (image, label) = random_flip_left_right_image_and_label_with_probability(
            image.view(),
            label.view(),
            config.flip_probability,
            rng,
        )?;
        let image = mean_image_subtraction(image.view(), &config.means)?;

        tracing::debug!(
            height = config.crop_height,
            width = config.crop_width,
            "augmented sample"
        );

        Ok(AugmentedSample::new(image, label))
    }
}
