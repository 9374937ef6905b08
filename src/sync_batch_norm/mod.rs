//! Batch normalization with statistics synchronized across devices
//!
//! During training with `num_dev > 1` each device computes the per-channel mean
//! and mean-of-squares of its local batch, the values are summed across devices
//! through an [`AllReduce`] implementation and averaged, so every device
//! normalizes with the statistics of the global batch. Device 0 alone maintains
//! the moving mean and variance used at inference time.
//!
//! Parameters live in a [`VariableStore`] under `{scope}/BatchNorm/...`, shared
//! by every device thread that builds the layer against the same store.

mod collective;
mod layer;
mod variables;

pub use collective::{AllReduce, InProcessAllReduce};
pub use layer::{batch_norm, moments, SyncBatchNorm};
pub use variables::{
    scoped_name, Initializer, Reuse, UpdateOp, Variable, VariableSpec, VariableStore,
    GLOBAL_VARIABLES, MODEL_VARIABLES, TRAINABLE_VARIABLES, UPDATE_OPS,
};

/// Default decay of the moving statistics
pub const BATCH_NORM_DECAY: f32 = 0.9997;

/// Default variance epsilon
pub const BATCH_NORM_EPSILON: f32 = 1e-3;
