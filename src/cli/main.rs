//! DeepLab augmentation CLI tool
//!
//! Runs the training augmentation pipeline on one image/label pair and writes the
//! resulting samples to disk for visual inspection.

use super::config::CliConfigBuilder;
use crate::{
    config::AugmentationConfig,
    preprocessing::{mean_image_addition, AugmentationPipeline},
    random::SampleRng,
    services::TensorIoService,
    tracing_config::{events, init_cli_tracing, spans},
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Segmentation augmentation preview tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "deeplab-augment")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Input RGB image
    #[arg(value_name = "IMAGE")]
    pub image: PathBuf,

    /// Input label map (single channel, one class id per pixel)
    #[arg(value_name = "LABEL")]
    pub label: PathBuf,

    /// Output directory for the generated samples
    #[arg(short, long, value_name = "OUT_DIR")]
    pub output: PathBuf,

    /// JSON file with an augmentation configuration; flags below override it
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Seed for reproducible samples [default: random, logged at startup]
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of samples to generate
    #[arg(short = 'n', long, default_value_t = 4)]
    pub samples: usize,

    /// Crop height
    #[arg(long)]
    pub crop_height: Option<usize>,

    /// Crop width
    #[arg(long)]
    pub crop_width: Option<usize>,

    /// Lower bound of the random scale factor
    #[arg(long)]
    pub min_scale: Option<f32>,

    /// Upper bound (exclusive) of the random scale factor
    #[arg(long)]
    pub max_scale: Option<f32>,

    /// Label value used for padded pixels
    #[arg(long)]
    pub ignore_label: Option<i32>,

    /// Probability of a horizontal flip
    #[arg(long)]
    pub flip_probability: Option<f32>,

    /// Evaluation mode: only mean subtraction is applied
    #[arg(long)]
    pub eval: bool,

    /// Write a manifest.json describing the run
    #[arg(long)]
    pub manifest: bool,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// One generated sample as recorded in the manifest
#[derive(Debug, Serialize)]
struct SampleRecord {
    index: usize,
    height: usize,
    width: usize,
    ignored_pixels: usize,
    image_path: PathBuf,
    label_path: PathBuf,
}

/// Description of a CLI run written next to the samples
#[derive(Debug, Serialize)]
struct RunManifest<'a> {
    run_id: &'a str,
    created_at: DateTime<Utc>,
    image: &'a Path,
    label: &'a Path,
    seed: u64,
    config: &'a AugmentationConfig,
    samples: Vec<SampleRecord>,
}

pub fn main() -> Result<()> {
    let cli = Cli::parse();

    let run_id = init_cli_tracing(cli.verbose).context("Failed to initialize tracing")?;

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;

    let seed = cli.seed.unwrap_or_else(rand::random);
    info!(seed, samples = cli.samples, "Starting augmentation run");

    let records = run(&cli, &config, seed)
        .inspect_err(|e| events::error_with_context(&**e, "augmentation run"))?;

    if cli.manifest {
        let manifest = RunManifest {
            run_id: &run_id,
            created_at: Utc::now(),
            image: &cli.image,
            label: &cli.label,
            seed,
            config: &config,
            samples: records,
        };
        let path = cli.output.join("manifest.json");
        let json = serde_json::to_string_pretty(&manifest).context("Failed to serialize manifest")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write manifest: {}", path.display()))?;
        info!("Wrote {}", path.display());
    }

    Ok(())
}

fn run(cli: &Cli, config: &AugmentationConfig, seed: u64) -> Result<Vec<SampleRecord>> {
    let image = {
        let _span = spans::file_processing(&cli.image, "image").entered();
        TensorIoService::load_image_tensor(&cli.image)
            .with_context(|| format!("Failed to load image: {}", cli.image.display()))?
    };
    let label = {
        let _span = spans::file_processing(&cli.label, "label").entered();
        TensorIoService::load_label_tensor(&cli.label)
            .with_context(|| format!("Failed to load label: {}", cli.label.display()))?
    };
    debug!(image = ?image.dim(), label = ?label.dim(), "Loaded inputs");

    std::fs::create_dir_all(&cli.output).with_context(|| {
        format!("Failed to create output directory: {}", cli.output.display())
    })?;

    let pipeline = AugmentationPipeline::new(config.clone()).context("Invalid configuration")?;
    let mut rng = SampleRng::seeded(seed);

    let progress = if cli.samples > 1 {
        let pb = ProgressBar::new(cli.samples as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .context("Invalid progress bar template")?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let start = Instant::now();
    let mut records = Vec::with_capacity(cli.samples);

    for index in 0..cli.samples {
        let _span = spans::augmentation(index, config.is_training).entered();
        if let Some(pb) = &progress {
            pb.set_message(format!("sample {}", index));
        }

        let sample = pipeline
            .apply(image.view(), label.view(), &mut rng)
            .with_context(|| format!("Failed to augment sample {}", index))?;

        // Undo centering so the written image is viewable
        let viewable = mean_image_addition(sample.image.view(), &config.means)
            .context("Failed to restore image means")?;

        let image_path = cli.output.join(format!("sample_{}_image.png", index));
        let label_path = cli.output.join(format!("sample_{}_label.png", index));
        TensorIoService::save_image_tensor(viewable.view(), &image_path)
            .with_context(|| format!("Failed to save {}", image_path.display()))?;
        TensorIoService::save_label_tensor(sample.label.view(), &label_path)
            .with_context(|| format!("Failed to save {}", label_path.display()))?;

        let (height, width) = sample.dimensions();
        let ignored_pixels = sample
            .label
            .iter()
            .filter(|&&v| v == config.ignore_label)
            .count();
        debug!(index, height, width, ignored_pixels, "Wrote sample");

        records.push(SampleRecord {
            index,
            height,
            width,
            ignored_pixels,
            image_path,
            label_path,
        });

        if let Some(pb) = &progress {
            pb.inc(1);
        }
    }

    if let Some(pb) = progress {
        pb.finish_with_message("done");
    }

    events::performance_metric("augmentation_run", start.elapsed().as_millis() as u64);
    info!(
        "Generated {} sample(s) in {:.2}s -> {}",
        records.len(),
        start.elapsed().as_secs_f64(),
        cli.output.display()
    );

    Ok(records)
}
