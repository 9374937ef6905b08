//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::config::AugmentationConfig;
use anyhow::{Context, Result};

/// Convert CLI arguments to an `AugmentationConfig`
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Start from `--config` (or the defaults) and apply explicit flag overrides
    pub(crate) fn from_cli(cli: &Cli) -> Result<AugmentationConfig> {
        let mut config = match &cli.config {
            Some(path) => AugmentationConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config file: {}", path.display()))?,
            None => AugmentationConfig::default(),
        };

        if let Some(min_scale) = cli.min_scale {
            config.min_scale = min_scale;
        }
        if let Some(max_scale) = cli.max_scale {
            config.max_scale = max_scale;
        }
        if let Some(crop_height) = cli.crop_height {
            config.crop_height = crop_height;
        }
        if let Some(crop_width) = cli.crop_width {
            config.crop_width = crop_width;
        }
        if let Some(ignore_label) = cli.ignore_label {
            config.ignore_label = ignore_label;
        }
        if let Some(flip_probability) = cli.flip_probability {
            config.flip_probability = flip_probability;
        }
        if cli.eval {
            config.is_training = false;
        }

        config.validate().context("Invalid augmentation configuration")?;
        Ok(config)
    }

    /// Validate CLI arguments for consistency
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if cli.samples == 0 {
            anyhow::bail!("--samples must be at least 1");
        }
        for path in [&cli.image, &cli.label] {
            if !path.is_file() {
                anyhow::bail!("Input file does not exist: {}", path.display());
            }
        }
        if cli.output.is_file() {
            anyhow::bail!(
                "Output path exists and is a file, not a directory: {}",
                cli.output.display()
            );
        }
        Ok(())
    }
}
