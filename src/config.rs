//! Configuration types for augmentation and synchronized batch normalization

use crate::{
    error::{DeepLabError, Result},
    preprocessing::DEFAULT_MEANS,
    sync_batch_norm::{Reuse, BATCH_NORM_DECAY, BATCH_NORM_EPSILON, UPDATE_OPS},
    types::{Activation, DataFormat},
    utils::{NumericValidator, TensorValidator},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the training-time augmentation pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentationConfig {
    /// Lower bound of the random rescale factor (exclusive of zero)
    pub min_scale: f32,

    /// Upper bound of the random rescale factor (exclusive)
    pub max_scale: f32,

    /// Output crop height in pixels
    pub crop_height: usize,

    /// Output crop width in pixels
    pub crop_width: usize,

    /// Class id marking pixels excluded from the loss; also fills padded label pixels
    pub ignore_label: i32,

    /// Per-channel centering constants
    pub means: Vec<f32>,

    /// Probability of the coupled horizontal flip
    pub flip_probability: f32,

    /// Run random augmentations (false = mean subtraction only)
    pub is_training: bool,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.5,
            max_scale: 2.0,
            crop_height: 513,
            crop_width: 513,
            ignore_label: 255,
            means: DEFAULT_MEANS.to_vec(),
            flip_probability: 0.5,
            is_training: true,
        }
    }
}

impl AugmentationConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    /// ```rust
    /// use deeplab_ops::AugmentationConfig;
    ///
    /// let config = AugmentationConfig::builder()
    ///     .crop_size(321, 321)
    ///     .scale_range(0.5, 1.5)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.crop_height, 321);
    /// ```
    #[must_use]
    pub fn builder() -> AugmentationConfigBuilder {
        AugmentationConfigBuilder::default()
    }

    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = std::fs::read_to_string(path_ref)
            .map_err(|e| DeepLabError::file_io_error("read configuration", path_ref, &e))?;
        Self::from_json_str(&contents)
    }

    /// Validate all configuration parameters
    ///
    /// # Validation Rules
    ///
    /// - `0 < min_scale < max_scale`
    /// - crop height and width are positive
    /// - flip probability in `[0, 1]`
    /// - at least one finite mean
    pub fn validate(&self) -> Result<()> {
        NumericValidator::validate_scale_range(self.min_scale, self.max_scale)?;
        TensorValidator::validate_crop_size(self.crop_height, self.crop_width)?;
        NumericValidator::validate_probability(self.flip_probability)?;

        if self.means.is_empty() {
            return Err(DeepLabError::invalid_config(
                "At least one per-channel mean is required",
            ));
        }
        NumericValidator::validate_means(&self.means)?;

        Ok(())
    }
}

/// Builder for `AugmentationConfig`
#[derive(Debug, Default)]
pub struct AugmentationConfigBuilder {
    config: AugmentationConfig,
}

impl AugmentationConfigBuilder {
    /// Set the random rescale range
    #[must_use]
    pub fn scale_range(mut self, min_scale: f32, max_scale: f32) -> Self {
        self.config.min_scale = min_scale;
        self.config.max_scale = max_scale;
        self
    }

    /// Set the output crop size
    #[must_use]
    pub fn crop_size(mut self, crop_height: usize, crop_width: usize) -> Self {
        self.config.crop_height = crop_height;
        self.config.crop_width = crop_width;
        self
    }

    /// Set the ignore label
    #[must_use]
    pub fn ignore_label(mut self, ignore_label: i32) -> Self {
        self.config.ignore_label = ignore_label;
        self
    }

    /// Set the per-channel means
    #[must_use]
    pub fn means(mut self, means: Vec<f32>) -> Self {
        self.config.means = means;
        self
    }

    /// Set the flip probability
    #[must_use]
    pub fn flip_probability(mut self, probability: f32) -> Self {
        self.config.flip_probability = probability;
        self
    }

    /// Enable or disable the random augmentations
    #[must_use]
    pub fn is_training(mut self, is_training: bool) -> Self {
        self.config.is_training = is_training;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<AugmentationConfig> {
        let config = self.config;
        config.validate()?;
        Ok(config)
    }
}

/// Configuration for a synchronized batch-normalization layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchNormConfig {
    /// Use batch statistics and update moving statistics
    pub is_training: bool,

    /// Layout of the rank-4 input
    pub data_format: DataFormat,

    /// Number of devices whose statistics are aggregated
    pub num_dev: usize,

    /// Moving-average weight of the previous running value
    pub decay: f32,

    /// Added to the variance before taking the square root
    pub epsilon: f32,

    /// Optional activation applied after normalization
    pub activation: Option<Activation>,

    /// Collection receiving deferred moving-average updates (`None` = apply immediately)
    pub updates_collections: Option<String>,

    /// Whether the layer may create or must attach to existing parameters
    pub reuse: Reuse,

    /// Multiply by gamma after normalizing
    pub scale: bool,

    /// Extra collections every parameter is added to
    pub variables_collections: Vec<String>,

    /// Whether gamma/beta are trainable; false also forces inference statistics
    pub trainable: bool,
}

impl Default for BatchNormConfig {
    fn default() -> Self {
        Self {
            is_training: true,
            data_format: DataFormat::ChannelsLast,
            num_dev: 2,
            decay: BATCH_NORM_DECAY,
            epsilon: BATCH_NORM_EPSILON,
            activation: None,
            updates_collections: Some(UPDATE_OPS.to_string()),
            reuse: Reuse::No,
            scale: false,
            variables_collections: Vec::new(),
            trainable: true,
        }
    }
}

impl BatchNormConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    /// ```rust
    /// use deeplab_ops::BatchNormConfig;
    ///
    /// let config = BatchNormConfig::builder()
    ///     .num_dev(4)
    ///     .scale(true)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.num_dev, 4);
    /// ```
    #[must_use]
    pub fn builder() -> BatchNormConfigBuilder {
        BatchNormConfigBuilder::default()
    }

    /// True when batch statistics are computed and moving statistics updated
    pub fn uses_batch_statistics(&self) -> bool {
        self.is_training && self.trainable
    }

    /// Validate all configuration parameters
    ///
    /// # Validation Rules
    ///
    /// - `num_dev >= 1`
    /// - `decay` in `[0, 1]`
    /// - `epsilon` positive and finite
    pub fn validate(&self) -> Result<()> {
        NumericValidator::validate_positive(self.num_dev, "num_dev")?;

        NumericValidator::validate_range(self.decay, 0.0, 1.0, "decay")?;

        if !(self.epsilon > 0.0 && self.epsilon.is_finite()) {
            return Err(DeepLabError::config_value_error(
                "epsilon",
                self.epsilon,
                "> 0",
                Some(BATCH_NORM_EPSILON),
            ));
        }

        if let Some(collection) = &self.updates_collections {
            if collection.is_empty() {
                return Err(DeepLabError::invalid_config(
                    "updates_collections must name a collection or be None",
                ));
            }
        }

        Ok(())
    }
}

/// Builder for `BatchNormConfig`
#[derive(Debug, Clone, Default)]
pub struct BatchNormConfigBuilder {
    config: BatchNormConfig,
}

impl BatchNormConfigBuilder {
    /// Select training or inference statistics
    #[must_use]
    pub fn is_training(mut self, is_training: bool) -> Self {
        self.config.is_training = is_training;
        self
    }

    /// Set the input layout
    #[must_use]
    pub fn data_format(mut self, data_format: DataFormat) -> Self {
        self.config.data_format = data_format;
        self
    }

    /// Set the number of participating devices
    #[must_use]
    pub fn num_dev(mut self, num_dev: usize) -> Self {
        self.config.num_dev = num_dev;
        self
    }

    /// Set the moving-average decay
    #[must_use]
    pub fn decay(mut self, decay: f32) -> Self {
        self.config.decay = decay;
        self
    }

    /// Set the variance epsilon
    #[must_use]
    pub fn epsilon(mut self, epsilon: f32) -> Self {
        self.config.epsilon = epsilon;
        self
    }

    /// Set the post-normalization activation
    #[must_use]
    pub fn activation(mut self, activation: Option<Activation>) -> Self {
        self.config.activation = activation;
        self
    }

    /// Route moving-average updates to a collection, or apply them immediately with `None`
    #[must_use]
    pub fn updates_collections(mut self, collection: Option<String>) -> Self {
        self.config.updates_collections = collection;
        self
    }

    /// Set the parameter reuse mode
    #[must_use]
    pub fn reuse(mut self, reuse: Reuse) -> Self {
        self.config.reuse = reuse;
        self
    }

    /// Enable or disable the gamma multiplication
    #[must_use]
    pub fn scale(mut self, scale: bool) -> Self {
        self.config.scale = scale;
        self
    }

    /// Add every parameter to these collections as well
    #[must_use]
    pub fn variables_collections(mut self, collections: Vec<String>) -> Self {
        self.config.variables_collections = collections;
        self
    }

    /// Set whether gamma and beta are trainable
    #[must_use]
    pub fn trainable(mut self, trainable: bool) -> Self {
        self.config.trainable = trainable;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<BatchNormConfig> {
        let config = self.config;
        config.validate()?;
        Ok(config)
    }
}
