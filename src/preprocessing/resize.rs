//! Spatial resizing of `[height, width, channels]` tensors
//!
//! Both samplers use the legacy corner-aligned-at-origin convention: output
//! pixel `i` maps to input coordinate `i * in_size / out_size`, with no
//! half-pixel offset.

use ndarray::{Array3, ArrayView3};

#[derive(Debug, Clone, Copy)]
struct LinearTap {
    lower: usize,
    upper: usize,
    frac: f32,
}

fn linear_taps(in_size: usize, out_size: usize) -> Vec<LinearTap> {
    let scale = in_size as f32 / out_size as f32;
    let last = in_size.saturating_sub(1);
    (0..out_size)
        .map(|i| {
            let source = i as f32 * scale;
            let lower = (source.floor() as usize).min(last);
            LinearTap {
                lower,
                upper: (lower + 1).min(last),
                frac: source - lower as f32,
            }
        })
        .collect()
}

fn nearest_taps(in_size: usize, out_size: usize) -> Vec<usize> {
    let scale = in_size as f32 / out_size as f32;
    let last = in_size.saturating_sub(1);
    (0..out_size)
        .map(|i| ((i as f32 * scale).floor() as usize).min(last))
        .collect()
}

/// Bilinear resize of a floating-point tensor.
///
/// An empty input yields a zero-filled output of the requested size.
#[allow(clippy::indexing_slicing)]
// Safe: taps are clamped to the input extent and built with one entry per output index
pub fn resize_bilinear(image: ArrayView3<'_, f32>, new_height: usize, new_width: usize) -> Array3<f32> {
    let (height, width, channels) = image.dim();
    if height == 0 || width == 0 {
        return Array3::zeros((new_height, new_width, channels));
    }

    let rows = linear_taps(height, new_height);
    let cols = linear_taps(width, new_width);

    Array3::from_shape_fn((new_height, new_width, channels), |(y, x, c)| {
        let row = rows[y];
        let col = cols[x];

        let top_left = image[[row.lower, col.lower, c]];
        let top_right = image[[row.lower, col.upper, c]];
        let bottom_left = image[[row.upper, col.lower, c]];
        let bottom_right = image[[row.upper, col.upper, c]];

        let top = top_left + (top_right - top_left) * col.frac;
        let bottom = bottom_left + (bottom_right - bottom_left) * col.frac;
        top + (bottom - top) * row.frac
    })
}

/// Nearest-neighbour resize; never produces values absent from the input.
#[allow(clippy::indexing_slicing)]
// Safe: taps are clamped to the input extent and built with one entry per output index
pub fn resize_nearest<T>(tensor: ArrayView3<'_, T>, new_height: usize, new_width: usize) -> Array3<T>
where
    T: Copy + Default,
{
    let (height, width, channels) = tensor.dim();
    if height == 0 || width == 0 {
        return Array3::from_elem((new_height, new_width, channels), T::default());
    }

    let rows = nearest_taps(height, new_height);
    let cols = nearest_taps(width, new_width);

    Array3::from_shape_fn((new_height, new_width, channels), |(y, x, c)| {
        tensor[[rows[y], cols[x], c]]
    })
}
