//! The synchronized batch-normalization layer

use super::collective::AllReduce;
use super::variables::{scoped_name, Initializer, UpdateOp, Variable, VariableSpec, VariableStore};
use crate::{
    config::BatchNormConfig,
    error::{DeepLabError, Result},
    tracing_config::spans,
    types::DataFormat,
    utils::TensorValidator,
};
use ndarray::{Array1, Array4, ArrayView4, Axis};
use std::sync::Arc;

/// Per-channel mean and variance over every axis except the channel axis.
///
/// Two-pass: the variance is the mean squared deviation from the mean. A channel
/// with no elements yields `NaN` statistics.
pub fn moments(inputs: ArrayView4<'_, f32>, data_format: DataFormat) -> (Array1<f32>, Array1<f32>) {
    let axis = data_format.channel_axis();
    let channels = inputs.len_of(axis);
    let mut mean = Array1::<f32>::zeros(channels);
    let mut variance = Array1::<f32>::zeros(channels);

    for ((plane, m), v) in inputs
        .axis_iter(axis)
        .zip(mean.iter_mut())
        .zip(variance.iter_mut())
    {
        let count = plane.len() as f64;
        let channel_mean = plane.iter().map(|&x| f64::from(x)).sum::<f64>() / count;
        let channel_variance = plane
            .iter()
            .map(|&x| {
                let d = f64::from(x) - channel_mean;
                d * d
            })
            .sum::<f64>()
            / count;
        *m = channel_mean as f32;
        *v = channel_variance as f32;
    }

    (mean, variance)
}

/// Per-channel `E[x]` and `E[x^2]` of the local batch
fn local_mean_and_square(
    inputs: ArrayView4<'_, f32>,
    data_format: DataFormat,
) -> (Array1<f32>, Array1<f32>) {
    let axis = data_format.channel_axis();
    let channels = inputs.len_of(axis);
    let mut mean = Array1::<f32>::zeros(channels);
    let mut mean_square = Array1::<f32>::zeros(channels);

    for ((plane, m), sq) in inputs
        .axis_iter(axis)
        .zip(mean.iter_mut())
        .zip(mean_square.iter_mut())
    {
        let count = plane.len() as f64;
        let (sum, sum_sq) = plane.iter().fold((0.0_f64, 0.0_f64), |(s, s2), &x| {
            let x = f64::from(x);
            (s + x, s2 + x * x)
        });
        *m = (sum / count) as f32;
        *sq = (sum_sq / count) as f32;
    }

    (mean, mean_square)
}

/// `(x - mean) / sqrt(variance + epsilon) * gamma + beta`, per channel
fn normalize(
    inputs: ArrayView4<'_, f32>,
    data_format: DataFormat,
    mean: &Array1<f32>,
    variance: &Array1<f32>,
    gamma: &Array1<f32>,
    beta: &Array1<f32>,
    epsilon: f32,
) -> Array4<f32> {
    let mut outputs = inputs.to_owned();

    for ((((mut plane, &m), &v), &g), &b) in outputs
        .axis_iter_mut(data_format.channel_axis())
        .zip(mean.iter())
        .zip(variance.iter())
        .zip(gamma.iter())
        .zip(beta.iter())
    {
        let scale = g / (v + epsilon).sqrt();
        let shift = b - m * scale;
        plane.mapv_inplace(|x| x * scale + shift);
    }

    outputs
}

/// Batch normalization whose training statistics are averaged across devices.
///
/// One instance per device thread; instances built against the same store and
/// scope share parameters (set `reuse` accordingly).
pub struct SyncBatchNorm {
    scope: String,
    num_channels: usize,
    config: BatchNormConfig,
    store: VariableStore,
    collective: Option<Arc<dyn AllReduce>>,
    gamma: Variable,
    beta: Variable,
    moving_mean: Variable,
    moving_variance: Variable,
}

impl std::fmt::Debug for SyncBatchNorm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncBatchNorm")
            .field("scope", &self.scope)
            .field("num_channels", &self.num_channels)
            .field("config", &self.config)
            .field("synchronized", &self.collective.is_some())
            .finish()
    }
}

impl SyncBatchNorm {
    /// Create or look up the layer's parameters under `{scope}/BatchNorm`.
    ///
    /// # Errors
    /// - `InvalidConfig` if the configuration is invalid, or if training with
    ///   `num_dev > 1` and no collective is supplied
    /// - `Variable` if the reuse mode forbids the lookup or an existing
    ///   parameter has a different channel count
    pub fn new(
        store: &VariableStore,
        scope: &str,
        num_channels: usize,
        config: BatchNormConfig,
        collective: Option<Arc<dyn AllReduce>>,
    ) -> Result<Self> {
        config.validate()?;

        if config.uses_batch_statistics() && config.num_dev > 1 && collective.is_none() {
            return Err(DeepLabError::invalid_config(format!(
                "Batch norm '{}' synchronizes over {} devices but no collective was provided",
                scope, config.num_dev
            )));
        }

        let bn_scope = scoped_name(scope, "BatchNorm");
        let parameter = |name: &str, initializer: Initializer, trainable: bool| {
            store.get_variable(&VariableSpec {
                name: &scoped_name(&bn_scope, name),
                len: num_channels,
                initializer,
                trainable,
                reuse: config.reuse,
                collections: &config.variables_collections,
            })
        };

        let beta = parameter("beta", Initializer::Zeros, config.trainable)?;
        let gamma = parameter("gamma", Initializer::Ones, config.trainable)?;
        let moving_mean = parameter("moving_mean", Initializer::Zeros, false)?;
        let moving_variance = parameter("moving_variance", Initializer::Ones, false)?;

        Ok(Self {
            scope: scope.to_string(),
            num_channels,
            config,
            store: store.clone(),
            collective,
            gamma,
            beta,
            moving_mean,
            moving_variance,
        })
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    pub fn config(&self) -> &BatchNormConfig {
        &self.config
    }

    pub fn gamma(&self) -> &Variable {
        &self.gamma
    }

    pub fn beta(&self) -> &Variable {
        &self.beta
    }

    pub fn moving_mean(&self) -> &Variable {
        &self.moving_mean
    }

    pub fn moving_variance(&self) -> &Variable {
        &self.moving_variance
    }

    /// Normalize one device's batch.
    ///
    /// In training mode the batch statistics (synchronized when `num_dev > 1`)
    /// are used and, on device 0, the moving statistics are updated. In
    /// inference mode the moving statistics are used. The activation, if any, is
    /// applied last.
    pub fn forward(&self, inputs: ArrayView4<'_, f32>, device_id: usize) -> Result<Array4<f32>> {
        let config = &self.config;
        let data_format = config.data_format;
        TensorValidator::validate_feature_channels(
            self.num_channels,
            inputs.len_of(data_format.channel_axis()),
            &self.scope,
        )?;

        let training = config.uses_batch_statistics();
        let _span = spans::batch_norm(&self.scope, device_id, training).entered();

        let gamma = if config.scale {
            self.gamma.read()?
        } else {
            Array1::ones(self.num_channels)
        };
        let beta = self.beta.read()?;

        let mut outputs = if training {
            let (mean, variance) = if config.num_dev == 1 {
                moments(inputs, data_format)
            } else {
                self.synchronized_moments(inputs, device_id)?
            };

            tracing::debug!(
                scope = %self.scope,
                device_id,
                batch = inputs.len_of(Axis(0)),
                "computed batch statistics"
            );

            let outputs = normalize(
                inputs,
                data_format,
                &mean,
                &variance,
                &gamma,
                &beta,
                config.epsilon,
            );
            if device_id == 0 {
                self.update_moving_statistics(mean, variance)?;
            }
            outputs
        } else {
            let mean = self.moving_mean.read()?;
            let variance = self.moving_variance.read()?;
            normalize(
                inputs,
                data_format,
                &mean,
                &variance,
                &gamma,
                &beta,
                config.epsilon,
            )
        };

        if let Some(activation) = config.activation {
            outputs.mapv_inplace(|x| activation.apply(x));
        }

        Ok(outputs)
    }

    /// Global mean and variance across `num_dev` devices
    fn synchronized_moments(
        &self,
        inputs: ArrayView4<'_, f32>,
        device_id: usize,
    ) -> Result<(Array1<f32>, Array1<f32>)> {
        let collective = self.collective.as_ref().ok_or_else(|| {
            DeepLabError::invalid_config(format!(
                "Batch norm '{}' has no collective for {} devices",
                self.scope, self.config.num_dev
            ))
        })?;
        let num_dev = self.config.num_dev;
        let shared_prefix = scoped_name(&self.scope, "BatchNorm");

        let (local_mean, local_mean_square) = local_mean_and_square(inputs, self.config.data_format);

        let inv_num_dev = 1.0 / num_dev as f32;
        let mean = collective.all_reduce_sum(
            &format!("{}_NCCL_mean", shared_prefix),
            num_dev,
            device_id,
            &local_mean,
        )? * inv_num_dev;
        let mean_square = collective.all_reduce_sum(
            &format!("{}_NCCL_mean_square", shared_prefix),
            num_dev,
            device_id,
            &local_mean_square,
        )? * inv_num_dev;

        let variance = &mean_square - &mean.mapv(|m| m * m);
        Ok((mean, variance))
    }

    fn update_moving_statistics(&self, mean: Array1<f32>, variance: Array1<f32>) -> Result<()> {
        let decay = self.config.decay;
        let mean_update = UpdateOp::moving_average(self.moving_mean.clone(), mean, decay);
        let variance_update =
            UpdateOp::moving_average(self.moving_variance.clone(), variance, decay);

        self.store.add_model_variable(&self.moving_mean)?;
        self.store.add_model_variable(&self.moving_variance)?;

        match &self.config.updates_collections {
            None => {
                mean_update.apply()?;
                variance_update.apply()?;
                tracing::trace!(scope = %self.scope, "applied moving statistics update");
            },
            Some(collection) => {
                self.store.add_update(collection, mean_update)?;
                self.store.add_update(collection, variance_update)?;
                tracing::trace!(
                    scope = %self.scope,
                    collection = %collection,
                    "deferred moving statistics update"
                );
            },
        }
        Ok(())
    }
}

/// Build (or attach to) the layer at `scope` and run one forward pass.
///
/// The channel count is taken from `inputs`. With `Reuse::No` a second call
/// against the same store and scope fails, so repeated calls should use
/// `Reuse::Auto` or `Reuse::Yes`.
pub fn batch_norm(
    inputs: ArrayView4<'_, f32>,
    store: &VariableStore,
    scope: &str,
    config: BatchNormConfig,
    collective: Option<Arc<dyn AllReduce>>,
    device_id: usize,
) -> Result<Array4<f32>> {
    let num_channels = inputs.len_of(config.data_format.channel_axis());
    let layer = SyncBatchNorm::new(store, scope, num_channels, config, collective)?;
    layer.forward(inputs, device_id)
}
