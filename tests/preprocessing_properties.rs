//! Property checks for the preprocessing operations
//!
//! Each test sweeps a set of shapes and seeds rather than a single fixture.

use deeplab_ops::{
    preprocessing::{
        mean_image_addition, mean_image_addition_dyn, mean_image_subtraction,
        mean_image_subtraction_dyn, random_crop_or_pad_image_and_label,
        random_flip_left_right_image_and_label,
        random_flip_left_right_image_and_label_with_probability, random_rescale_image_and_label,
        DEFAULT_MEANS,
    },
    AugmentationConfig, AugmentationPipeline, Result, SampleRng,
};
use ndarray::{s, Array3, ArrayD, IxDyn};
use rand::Rng;

fn random_image(rng: &mut impl Rng, height: usize, width: usize, channels: usize) -> Array3<f32> {
    Array3::from_shape_simple_fn((height, width, channels), || rng.random_range(0.0..255.0))
}

fn coordinate_label(height: usize, width: usize) -> Array3<i32> {
    Array3::from_shape_fn((height, width, 1), |(y, x, _)| (y * 1000 + x) as i32)
}

#[test]
fn mean_addition_and_subtraction_are_inverse() -> Result<()> {
    let mut rng = SampleRng::seeded(1);
    for (height, width, channels) in [(1, 1, 1), (5, 7, 3), (16, 9, 4)] {
        let image = random_image(&mut rng, height, width, channels);
        let means: Vec<f32> = (0..channels).map(|c| 100.0 + c as f32 * 7.5).collect();

        let there_and_back = mean_image_subtraction(
            mean_image_addition(image.view(), &means)?.view(),
            &means,
        )?;
        let back_and_there = mean_image_addition(
            mean_image_subtraction(image.view(), &means)?.view(),
            &means,
        )?;

        for ((a, b), c) in image.iter().zip(there_and_back.iter()).zip(back_and_there.iter()) {
            assert!((a - b).abs() < 1e-3, "{} vs {}", a, b);
            assert!((a - c).abs() < 1e-3, "{} vs {}", a, c);
        }
    }
    Ok(())
}

#[test]
fn mean_operations_reject_every_malformed_input() {
    let image = Array3::<f32>::zeros((4, 4, 3));
    for means in [&[][..], &[1.0][..], &[1.0, 2.0][..], &[1.0, 2.0, 3.0, 4.0][..]] {
        assert!(mean_image_addition(image.view(), means)
            .unwrap_err()
            .is_invalid_argument());
        assert!(mean_image_subtraction(image.view(), means)
            .unwrap_err()
            .is_invalid_argument());
    }

    for shape in [vec![4, 4], vec![1, 4, 4, 3], vec![12], vec![4, 4, 0]] {
        let tensor = ArrayD::<f32>::zeros(IxDyn(&shape));
        assert!(
            mean_image_addition_dyn(tensor.view(), &DEFAULT_MEANS)
                .unwrap_err()
                .is_invalid_argument(),
            "shape {:?} should be rejected",
            shape
        );
        assert!(mean_image_subtraction_dyn(tensor.view(), &DEFAULT_MEANS)
            .unwrap_err()
            .is_invalid_argument());
    }
}

#[test]
fn crop_or_pad_always_yields_crop_shape() -> Result<()> {
    let mut rng = SampleRng::seeded(2);
    let crops = [(1, 1), (8, 8), (13, 5), (32, 40)];
    let inputs = [(1, 1), (4, 30), (8, 8), (25, 3), (50, 60)];

    for &(crop_height, crop_width) in &crops {
        for &(height, width) in &inputs {
            let image = random_image(&mut rng, height, width, 3);
            let label = coordinate_label(height, width);
            let (image_crop, label_crop) = random_crop_or_pad_image_and_label(
                image.view(),
                label.view(),
                crop_height,
                crop_width,
                255,
                &mut rng,
            )?;
            assert_eq!(image_crop.dim(), (crop_height, crop_width, 3));
            assert_eq!(label_crop.dim(), (crop_height, crop_width, 1));
        }
    }
    Ok(())
}

#[test]
fn crop_or_pad_marks_padding_with_ignore_label() -> Result<()> {
    let mut rng = SampleRng::seeded(3);
    for ignore_label in [255, 0, -1] {
        let image = Array3::<f32>::from_elem((3, 4, 3), 9.0);
        let label = Array3::<i32>::from_elem((3, 4, 1), 7);
        let (image_crop, label_crop) = random_crop_or_pad_image_and_label(
            image.view(),
            label.view(),
            6,
            6,
            ignore_label,
            &mut rng,
        )?;

        assert!(label_crop.slice(s![..3, ..4, ..]).iter().all(|&v| v == 7));
        assert!(label_crop.slice(s![3.., .., ..]).iter().all(|&v| v == ignore_label));
        assert!(label_crop.slice(s![.., 4.., ..]).iter().all(|&v| v == ignore_label));
        assert!(image_crop.slice(s![3.., .., ..]).iter().all(|&v| v == 0.0));
    }
    Ok(())
}

#[test]
fn flip_is_coupled_for_every_seed() -> Result<()> {
    let image = Array3::from_shape_fn((4, 6, 3), |(y, x, c)| (y * 100 + x * 10 + c) as f32);
    let label = coordinate_label(4, 6);
    let mirrored_image = image.slice(s![.., ..;-1, ..]).to_owned();
    let mirrored_label = label.slice(s![.., ..;-1, ..]).to_owned();

    let mut flips = 0;
    for seed in 0..64 {
        let mut rng = SampleRng::seeded(seed);
        let (out_image, out_label) =
            random_flip_left_right_image_and_label(image.view(), label.view(), &mut rng)?;

        let image_flipped = out_image == mirrored_image;
        let label_flipped = out_label == mirrored_label;
        assert_eq!(image_flipped, label_flipped, "seed {} flipped independently", seed);
        if image_flipped {
            flips += 1;
        } else {
            assert_eq!(out_image, image);
            assert_eq!(out_label, label);
        }
    }
    // Both branches are exercised at probability 0.5
    assert!(flips > 0 && flips < 64);

    let mut rng = SampleRng::seeded(0);
    let (never_image, never_label) = random_flip_left_right_image_and_label_with_probability(
        image.view(),
        label.view(),
        0.0,
        &mut rng,
    )?;
    assert_eq!((never_image, never_label), (image.clone(), label.clone()));

    let (always_image, always_label) = random_flip_left_right_image_and_label_with_probability(
        image.view(),
        label.view(),
        1.0,
        &mut rng,
    )?;
    assert_eq!((always_image, always_label), (mirrored_image, mirrored_label));
    Ok(())
}

#[test]
fn rescale_rejects_invalid_scale_ranges() {
    let image = Array3::<f32>::zeros((10, 10, 3));
    let label = Array3::<i32>::zeros((10, 10, 1));
    let mut rng = SampleRng::seeded(4);

    let cases = [
        (0.0, 1.0, "'min_scale' must be greater than 0."),
        (0.5, 0.0, "'max_scale' must be greater than 0."),
        (1.0, 1.0, "'max_scale' must be greater than 'min_scale'."),
        (1.5, 1.0, "'max_scale' must be greater than 'min_scale'."),
    ];
    for (min_scale, max_scale, message) in cases {
        let err = random_rescale_image_and_label(image.view(), label.view(), min_scale, max_scale, &mut rng)
            .unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(err.to_string().contains(message), "{}", err);
    }
}

#[test]
fn rescale_ratio_stays_in_range() -> Result<()> {
    let mut rng = SampleRng::seeded(5);
    for (min_scale, max_scale) in [(0.5, 2.0), (0.25, 0.75), (1.0, 1.01)] {
        for (height, width) in [(40, 40), (33, 57), (100, 20)] {
            let image = random_image(&mut rng, height, width, 3);
            let label = Array3::<i32>::zeros((height, width, 1));
            let (scaled, scaled_label) = random_rescale_image_and_label(
                image.view(),
                label.view(),
                min_scale,
                max_scale,
                &mut rng,
            )?;
            let (new_height, new_width, channels) = scaled.dim();
            assert_eq!(channels, 3);
            assert_eq!(scaled_label.dim(), (new_height, new_width, 1));

            for (new, old) in [(new_height, height), (new_width, width)] {
                let lower = (old as f32 * min_scale).floor() as usize;
                let upper = (old as f32 * max_scale).ceil() as usize;
                assert!(
                    new >= lower && new <= upper,
                    "{} -> {} outside [{}, {}]",
                    old,
                    new,
                    lower,
                    upper
                );
            }
        }
    }
    Ok(())
}

#[test]
fn rescale_never_invents_label_values() -> Result<()> {
    let mut rng = SampleRng::seeded(6);
    let image = Array3::<f32>::zeros((17, 23, 3));
    let label = Array3::from_shape_fn((17, 23, 1), |(y, x, _)| [0, 3, 255][(y + x) % 3]);
    for _ in 0..10 {
        let (_, scaled_label) =
            random_rescale_image_and_label(image.view(), label.view(), 0.3, 3.0, &mut rng)?;
        assert!(scaled_label.iter().all(|v| [0, 3, 255].contains(v)));
    }
    Ok(())
}

#[test]
fn pipeline_output_matches_crop_for_each_worker() -> Result<()> {
    let config = AugmentationConfig::builder()
        .crop_size(33, 47)
        .scale_range(0.5, 2.0)
        .build()?;
    let pipeline = AugmentationPipeline::new(config)?;

    let image = Array3::<f32>::from_elem((40, 30, 3), 128.0);
    let label = Array3::<i32>::from_elem((40, 30, 1), 1);

    for worker_id in 0..4 {
        let mut rng = SampleRng::for_worker(1234, 1, worker_id);
        let sample = pipeline.apply(image.view(), label.view(), &mut rng)?;
        assert_eq!(sample.image.dim(), (33, 47, 3));
        assert_eq!(sample.label.dim(), (33, 47, 1));
        assert!(sample.label.iter().all(|&v| v == 1 || v == 255));
    }
    Ok(())
}
