//! Tensor file I/O service
//!
//! Converts between image files on disk and the `[height, width, channels]`
//! tensors consumed by the preprocessing operations.

use crate::{
    error::{DeepLabError, Result},
    types::{ImageTensor, LabelTensor},
    utils::TensorValidator,
};
use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use ndarray::{Array3, ArrayView3};
use std::path::Path;

/// Service for loading and saving image and label tensors
pub struct TensorIoService;

impl TensorIoService {
    /// Load an image file from disk
    ///
    /// Extension-based detection is tried first, then content-based detection.
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(DeepLabError::file_io_error(
                "read image file",
                path_ref,
                &std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        match image::open(path_ref) {
            Ok(img) => Ok(img),
            Err(e) => {
                log::debug!(
                    "Extension-based loading failed for {}: {}. Attempting content-based detection.",
                    path_ref.display(),
                    e
                );

                let data = std::fs::read(path_ref).map_err(|io_err| {
                    DeepLabError::file_io_error("read image data", path_ref, &io_err)
                })?;

                image::load_from_memory(&data).map_err(|content_err| {
                    DeepLabError::processing_stage_error(
                        "image loading",
                        &format!(
                            "Failed to decode image. Extension error: {}. Content error: {}",
                            e, content_err
                        ),
                        Some(&format!("path: {}, size: {} bytes", path_ref.display(), data.len())),
                    )
                })
            },
        }
    }

    /// Load an RGB image as an `f32` tensor `[height, width, 3]` with values in `0..=255`
    ///
    /// # Examples
    /// ```rust,no_run
    /// use deeplab_ops::services::TensorIoService;
    ///
    /// let image = TensorIoService::load_image_tensor("frame.jpg")?;
    /// assert_eq!(image.dim().2, 3);
    /// # Ok::<(), deeplab_ops::DeepLabError>(())
    /// ```
    pub fn load_image_tensor<P: AsRef<Path>>(path: P) -> Result<ImageTensor> {
        let rgb = Self::load_image(path)?.to_rgb8();
        Ok(Self::rgb_to_tensor(&rgb))
    }

    /// Load a single-channel label map as an `i32` tensor `[height, width, 1]`
    pub fn load_label_tensor<P: AsRef<Path>>(path: P) -> Result<LabelTensor> {
        let gray = Self::load_image(path)?.to_luma8();
        Ok(Self::gray_to_tensor(&gray))
    }

    /// Convert an RGB buffer to an `f32` tensor
    pub fn rgb_to_tensor(rgb: &RgbImage) -> ImageTensor {
        let (width, height) = rgb.dimensions();
        Array3::from_shape_fn((height as usize, width as usize, 3), |(y, x, c)| {
            f32::from(rgb.get_pixel(x as u32, y as u32)[c])
        })
    }

    /// Convert a grayscale buffer to a label tensor
    pub fn gray_to_tensor(gray: &GrayImage) -> LabelTensor {
        let (width, height) = gray.dimensions();
        Array3::from_shape_fn((height as usize, width as usize, 1), |(y, x, _)| {
            i32::from(gray.get_pixel(x as u32, y as u32)[0])
        })
    }

    /// Convert an image tensor with 1 or 3 channels to a displayable image.
    ///
    /// Values are rounded and clamped to `0..=255`.
    #[allow(clippy::indexing_slicing)]
    // Safe: pixel coordinates come from an image built with the tensor's own extent
    pub fn image_tensor_to_dynamic(image: ArrayView3<'_, f32>) -> Result<DynamicImage> {
        let (height, width, channels) = TensorValidator::validate_image_rank(image.shape())?;
        let (w, h) = Self::checked_dimensions(width, height)?;
        let to_u8 = |v: f32| v.round().clamp(0.0, 255.0) as u8;

        match channels {
            3 => Ok(DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
                let (x, y) = (x as usize, y as usize);
                Rgb([
                    to_u8(image[[y, x, 0]]),
                    to_u8(image[[y, x, 1]]),
                    to_u8(image[[y, x, 2]]),
                ])
            }))),
            1 => Ok(DynamicImage::ImageLuma8(GrayImage::from_fn(w, h, |x, y| {
                Luma([to_u8(image[[y as usize, x as usize, 0]])])
            }))),
            other => Err(DeepLabError::invalid_argument(format!(
                "Cannot convert a {}-channel tensor to an image; expected 1 or 3 channels",
                other
            ))),
        }
    }

    /// Convert a `[height, width, 1]` label tensor to a grayscale image.
    ///
    /// Class ids outside `0..=255` are clamped.
    #[allow(clippy::indexing_slicing)]
    // Safe: pixel coordinates come from an image built with the tensor's own extent
    pub fn label_tensor_to_dynamic(label: ArrayView3<'_, i32>) -> Result<DynamicImage> {
        let (height, width, channels) = label.dim();
        if channels != 1 {
            return Err(DeepLabError::invalid_argument(format!(
                "Label tensor must have 1 channel, got {}",
                channels
            )));
        }
        let (w, h) = Self::checked_dimensions(width, height)?;

        Ok(DynamicImage::ImageLuma8(GrayImage::from_fn(w, h, |x, y| {
            Luma([label[[y as usize, x as usize, 0]].clamp(0, 255) as u8])
        })))
    }

    /// Save an image tensor, creating parent directories; format follows the extension
    pub fn save_image_tensor<P: AsRef<Path>>(image: ArrayView3<'_, f32>, path: P) -> Result<()> {
        let dynamic = Self::image_tensor_to_dynamic(image)?;
        Self::save(&dynamic, path.as_ref())
    }

    /// Save a label tensor as a grayscale image
    pub fn save_label_tensor<P: AsRef<Path>>(label: ArrayView3<'_, i32>, path: P) -> Result<()> {
        let dynamic = Self::label_tensor_to_dynamic(label)?;
        Self::save(&dynamic, path.as_ref())
    }

    /// Check if a file path has a supported image extension
    pub fn is_supported_format<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                matches!(
                    ext.to_lowercase().as_str(),
                    "jpg" | "jpeg" | "png" | "tiff" | "tif"
                )
            })
    }

    fn save(image: &DynamicImage, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DeepLabError::file_io_error("create output directory", parent, &e)
            })?;
        }

        let format = ImageFormat::from_path(path).unwrap_or(ImageFormat::Png);
        image.save_with_format(path, format).map_err(|e| {
            DeepLabError::processing_stage_error(
                "image saving",
                &format!("Failed to encode {:?}: {}", format, e),
                Some(&format!("path: {}", path.display())),
            )
        })
    }

    fn checked_dimensions(width: usize, height: usize) -> Result<(u32, u32)> {
        let w = u32::try_from(width).map_err(|_| {
            DeepLabError::invalid_argument(format!("Width {} exceeds image limits", width))
        })?;
        let h = u32::try_from(height).map_err(|_| {
            DeepLabError::invalid_argument(format!("Height {} exceeds image limits", height))
        })?;
        Ok((w, h))
    }
}
