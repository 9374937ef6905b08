#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # DeepLab Training Operations
//!
//! Building blocks for training semantic-segmentation networks on `ndarray`
//! tensors:
//!
//! - **Preprocessing**: per-channel mean centering, random rescaling, random
//!   crop-or-pad with ignore-label padding, and coupled horizontal flips of an
//!   image and its label map
//! - **Synchronized batch normalization**: batch statistics averaged across
//!   devices through an all-reduce, with moving statistics maintained by device 0
//! - **CLI Integration**: optional `deeplab-augment` tool (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ### Augmenting a training pair
//!
//! ```rust
//! use deeplab_ops::{AugmentationConfig, AugmentationPipeline, SampleRng};
//! use ndarray::Array3;
//!
//! let config = AugmentationConfig::builder()
//!     .crop_size(64, 64)
//!     .scale_range(0.5, 2.0)
//!     .build()?;
//! let pipeline = AugmentationPipeline::new(config)?;
//!
//! let image = Array3::<f32>::from_elem((48, 80, 3), 127.0);
//! let label = Array3::<i32>::zeros((48, 80, 1));
//! let sample = pipeline.apply(image.view(), label.view(), &mut SampleRng::seeded(7))?;
//! assert_eq!(sample.dimensions(), (64, 64));
//! # Ok::<(), deeplab_ops::DeepLabError>(())
//! ```
//!
//! ### Batch norm across device threads
//!
//! ```rust
//! use deeplab_ops::{BatchNormConfig, InProcessAllReduce, SyncBatchNorm, VariableStore};
//! use ndarray::Array4;
//! use std::sync::Arc;
//!
//! let store = VariableStore::new();
//! let collective = Arc::new(InProcessAllReduce::new());
//! let config = BatchNormConfig::builder().num_dev(2).build()?;
//! let layer = Arc::new(SyncBatchNorm::new(&store, "conv1", 8, config, Some(collective))?);
//!
//! let handles: Vec<_> = (0..2)
//!     .map(|device_id| {
//!         let layer = Arc::clone(&layer);
//!         std::thread::spawn(move || {
//!             let batch = Array4::<f32>::from_elem((2, 4, 4, 8), device_id as f32);
//!             layer.forward(batch.view(), device_id)
//!         })
//!     })
//!     .collect();
//! for handle in handles {
//!     assert_eq!(handle.join().unwrap()?.dim(), (2, 4, 4, 8));
//! }
//! # Ok::<(), deeplab_ops::DeepLabError>(())
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): `deeplab-augment` binary, progress bars and subscriber setup
//! - `tracing-json`: JSON log output for the CLI
//!
//! To use only as a library without CLI dependencies:
//!
//! ```toml
//! [dependencies]
//! deeplab-ops = { version = "0.1", default-features = false }
//! ```

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod preprocessing;
pub mod random;
pub mod services;
pub mod sync_batch_norm;
pub mod tracing_config;
pub mod types;
pub mod utils;

// Public API exports
pub use config::{AugmentationConfig, AugmentationConfigBuilder, BatchNormConfig, BatchNormConfigBuilder};
pub use error::{DeepLabError, Result};
pub use preprocessing::{
    mean_image_addition, mean_image_subtraction, random_crop_or_pad_image_and_label,
    random_flip_left_right_image_and_label, random_rescale_image_and_label, AugmentationPipeline,
    DEFAULT_MEANS,
};
pub use random::SampleRng;
pub use services::TensorIoService;
pub use sync_batch_norm::{
    batch_norm, moments, AllReduce, InProcessAllReduce, Reuse, SyncBatchNorm, UpdateOp, Variable,
    VariableStore,
};
pub use tracing_config::{events, spans, TracingConfig, TracingFormat};
#[cfg(feature = "cli")]
pub use tracing_config::init_cli_tracing;
pub use types::{Activation, AugmentedSample, DataFormat, FeatureTensor, ImageTensor, LabelTensor};
pub use utils::{NumericValidator, TensorValidator};
