//! Core tensor and enum types shared across the crate

use ndarray::{Array3, Array4, Axis};
use serde::{Deserialize, Serialize};

/// Floating-point image tensor laid out as `[height, width, channels]`
pub type ImageTensor = Array3<f32>;

/// Integer class-id tensor laid out as `[height, width, 1]`
pub type LabelTensor = Array3<i32>;

/// Batched feature tensor fed to batch normalization
pub type FeatureTensor = Array4<f32>;

/// An image/label pair produced by the augmentation pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentedSample {
    pub image: ImageTensor,
    pub label: LabelTensor,
}

impl AugmentedSample {
    pub fn new(image: ImageTensor, label: LabelTensor) -> Self {
        Self { image, label }
    }

    /// Spatial size as `(height, width)`
    pub fn dimensions(&self) -> (usize, usize) {
        (self.image.len_of(Axis(0)), self.image.len_of(Axis(1)))
    }
}

/// Memory layout of a rank-4 feature tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataFormat {
    /// `[batch, height, width, channels]`
    #[default]
    ChannelsLast,
    /// `[batch, channels, height, width]`
    ChannelsFirst,
}

impl DataFormat {
    /// Axis holding the channels
    pub fn channel_axis(self) -> Axis {
        match self {
            Self::ChannelsLast => Axis(3),
            Self::ChannelsFirst => Axis(1),
        }
    }
}

impl std::fmt::Display for DataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ChannelsLast => write!(f, "channels_last"),
            Self::ChannelsFirst => write!(f, "channels_first"),
        }
    }
}

/// Element-wise activation applied after normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Relu,
    Relu6,
    Sigmoid,
    Tanh,
}

impl Activation {
    /// Apply the activation to a single value
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Self::Relu => x.max(0.0),
            Self::Relu6 => x.clamp(0.0, 6.0),
            Self::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Self::Tanh => x.tanh(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_values() {
        assert_eq!(Activation::Relu.apply(-2.0), 0.0);
        assert_eq!(Activation::Relu.apply(3.0), 3.0);
        assert_eq!(Activation::Relu6.apply(9.0), 6.0);
        assert!((Activation::Sigmoid.apply(0.0) - 0.5).abs() < 1e-6);
        assert!((Activation::Tanh.apply(0.0)).abs() < 1e-6);
    }

    #[test]
    fn test_data_format_axis() {
        assert_eq!(DataFormat::default(), DataFormat::ChannelsLast);
        assert_eq!(DataFormat::ChannelsLast.channel_axis(), Axis(3));
        assert_eq!(DataFormat::ChannelsFirst.channel_axis(), Axis(1));
        assert_eq!(DataFormat::ChannelsFirst.to_string(), "channels_first");
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Activation::Relu6).unwrap();
        assert_eq!(json, "\"relu6\"");
        let format: DataFormat = serde_json::from_str("\"channels_first\"").unwrap();
        assert_eq!(format, DataFormat::ChannelsFirst);
    }
}
