// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stage library: the six pure page transforms of the enhancement pipeline.
//
// Every function takes a borrowed 8-bit grayscale buffer and returns a new
// one of the same dimensions. Parameters are assumed valid; range checks
// live in the config blocks and run once when a pipeline is built.

use image::{DynamicImage, GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;

// -- Grayscale ----------------------------------------------------------------

/// Collapse any channel layout to 8-bit luminance. An 8-bit single-channel
/// buffer is returned untouched.
pub fn to_grayscale(image: DynamicImage) -> GrayImage {
    match image {
        DynamicImage::ImageLuma8(gray) => gray,
        other => other.to_luma8(),
    }
}

// -- Denoising ----------------------------------------------------------------

/// Non-local means denoising.
///
/// Each output pixel is a weighted average of the pixels in its
/// `search × search` neighbourhood. A candidate's weight is
/// `exp(-d / h²)`, where `d` is the mean squared difference between the
/// `template × template` patches around the two pixels. Borders are
/// replicated.
///
/// For each search offset the patch distances are computed with sliding
/// column and window sums of the squared differences, in exact integer
/// arithmetic. Memory beyond the padded input is two `f32` accumulators per
/// pixel plus one row of column sums.
///
/// `stop` is polled once per search offset and every [`STOP_CHECK_ROWS`]
/// rows; returns `None` as soon as it reports `true`.
pub fn denoise_nl_means(
    gray: &GrayImage,
    h: f32,
    template: u32,
    search: u32,
    stop: &dyn Fn() -> bool,
) -> Option<GrayImage> {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return Some(gray.clone());
    }

    let t_half = (template / 2) as i64;
    let s_half = (search / 2) as i64;
    let pad = s_half + t_half;
    let padded = Padded::replicate(gray, pad);

    let w = width as usize;
    let h_px = height as usize;
    let patch_side = 2 * t_half as usize + 1;
    // Columns covering every patch centred on an image pixel.
    let region_w = w + patch_side - 1;
    let patch_area = (patch_side * patch_side) as f64;
    let h2 = f64::from(h) * f64::from(h);

    let mut weighted = vec![0f32; w * h_px];
    let mut weights = vec![0f32; w * h_px];
    let mut columns = vec![0u64; region_w];

    for dy in -s_half..=s_half {
        for dx in -s_half..=s_half {
            if stop() {
                return None;
            }
            // Squared difference between the patch region at (rx, ry) and its
            // copy shifted by (dx, dy).
            let squared = |rx: usize, ry: usize| -> u64 {
                let px = rx as i64 + pad - t_half;
                let py = ry as i64 + pad - t_half;
                let diff = i64::from(padded.get(px, py)) - i64::from(padded.get(px + dx, py + dy));
                (diff * diff) as u64
            };

            columns.fill(0);
            for ry in 0..patch_side {
                for (rx, column) in columns.iter_mut().enumerate() {
                    *column += squared(rx, ry);
                }
            }

            for y in 0..h_px {
                if y > 0 {
                    if y % STOP_CHECK_ROWS == 0 && stop() {
                        return None;
                    }
                    for (rx, column) in columns.iter_mut().enumerate() {
                        *column = *column + squared(rx, y + patch_side - 1) - squared(rx, y - 1);
                    }
                }

                let mut window: u64 = columns[..patch_side].iter().sum();
                for x in 0..w {
                    if x > 0 {
                        window = window + columns[x + patch_side - 1] - columns[x - 1];
                    }
                    let distance = window as f64 / patch_area;
                    let weight = (-distance / h2).exp() as f32;
                    let candidate = f32::from(padded.get(x as i64 + pad + dx, y as i64 + pad + dy));
                    let idx = y * w + x;
                    weighted[idx] += weight * candidate;
                    weights[idx] += weight;
                }
            }
        }
    }

    Some(GrayImage::from_fn(width, height, |x, y| {
        let idx = y as usize * w + x as usize;
        // The zero offset always contributes weight 1, so the sum is positive.
        Luma([clamp_u8(f64::from(weighted[idx] / weights[idx]))])
    }))
}

// -- CLAHE --------------------------------------------------------------------

/// Contrast-limited adaptive histogram equalization.
///
/// The image is split into `grid[0] × grid[1]` tiles. Each tile gets its own
/// equalization lookup table built from a histogram clipped at
/// `max(clip_limit · tile_area / 256, 1)` with the excess spread evenly over
/// all bins; a `clip_limit` of 0 disables clipping. Pixels are mapped by
/// bilinear interpolation between the tables of the four nearest tile
/// centres. A grid finer than the image is capped at one pixel per tile.
pub fn clahe(gray: &GrayImage, clip_limit: f64, grid: [u32; 2]) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }

    let tiles_x = grid[0].clamp(1, width) as usize;
    let tiles_y = grid[1].clamp(1, height) as usize;
    let x_bounds = tile_bounds(width as usize, tiles_x);
    let y_bounds = tile_bounds(height as usize, tiles_y);

    let mut luts = Vec::with_capacity(tiles_x * tiles_y);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            luts.push(tile_lut(
                gray,
                x_bounds[tx]..x_bounds[tx + 1],
                y_bounds[ty]..y_bounds[ty + 1],
                clip_limit,
            ));
        }
    }

    let columns = interpolation_axis(&x_bounds);
    let rows = interpolation_axis(&y_bounds);

    GrayImage::from_fn(width, height, |x, y| {
        let value = gray.get_pixel(x, y).0[0] as usize;
        let (x0, x1, fx) = columns[x as usize];
        let (y0, y1, fy) = rows[y as usize];
        let at = |tx: usize, ty: usize| f64::from(luts[ty * tiles_x + tx][value]);
        let top = at(x0, y0) * (1.0 - fx) + at(x1, y0) * fx;
        let bottom = at(x0, y1) * (1.0 - fx) + at(x1, y1) * fx;
        Luma([clamp_u8(top * (1.0 - fy) + bottom * fy)])
    })
}

/// `tiles + 1` boundaries splitting `len` pixels into near-equal tiles.
fn tile_bounds(len: usize, tiles: usize) -> Vec<usize> {
    (0..=tiles).map(|i| i * len / tiles).collect()
}

fn tile_lut(
    gray: &GrayImage,
    xs: std::ops::Range<usize>,
    ys: std::ops::Range<usize>,
    clip_limit: f64,
) -> [u8; 256] {
    let mut histogram = [0u32; 256];
    for y in ys.clone() {
        for x in xs.clone() {
            histogram[gray.get_pixel(x as u32, y as u32).0[0] as usize] += 1;
        }
    }
    let area = (xs.len() * ys.len()) as u32;

    if clip_limit > 0.0 {
        let limit = ((clip_limit * f64::from(area) / 256.0) as u32).max(1);
        let mut excess = 0u32;
        for bin in histogram.iter_mut() {
            if *bin > limit {
                excess += *bin - limit;
                *bin = limit;
            }
        }
        let per_bin = excess / 256;
        let remainder = (excess % 256) as usize;
        for bin in histogram.iter_mut() {
            *bin += per_bin;
        }
        if remainder > 0 {
            let step = 256 / remainder;
            for bin in histogram.iter_mut().step_by(step).take(remainder) {
                *bin += 1;
            }
        }
    }

    let scale = 255.0 / f64::from(area);
    let mut lut = [0u8; 256];
    let mut cumulative = 0u32;
    for (value, count) in histogram.iter().enumerate() {
        cumulative += count;
        lut[value] = clamp_u8(f64::from(cumulative) * scale);
    }
    lut
}

/// For every pixel along one axis: the two neighbouring tile indices and the
/// blend factor towards the second.
fn interpolation_axis(bounds: &[usize]) -> Vec<(usize, usize, f64)> {
    let tiles = bounds.len() - 1;
    let centres: Vec<f64> = bounds
        .windows(2)
        .map(|pair| (pair[0] + pair[1]) as f64 / 2.0 - 0.5)
        .collect();
    let len = bounds[tiles];

    (0..len)
        .map(|pos| {
            let pos = pos as f64;
            if pos <= centres[0] {
                return (0, 0, 0.0);
            }
            if pos >= centres[tiles - 1] {
                return (tiles - 1, tiles - 1, 0.0);
            }
            let upper = centres.partition_point(|&centre| centre <= pos);
            let lower = upper - 1;
            let span = centres[upper] - centres[lower];
            (lower, upper, (pos - centres[lower]) / span)
        })
        .collect()
}

// -- Contrast -----------------------------------------------------------------

/// Global affine remap: `clip(round(alpha · x + beta), 0, 255)`.
pub fn scale_contrast(gray: &GrayImage, alpha: f64, beta: f64) -> GrayImage {
    let mut lut = [0u8; 256];
    for (value, out) in lut.iter_mut().enumerate() {
        *out = clamp_u8(alpha * value as f64 + beta);
    }
    map_pixels(gray, &lut)
}

// -- Sharpening ---------------------------------------------------------------

/// Unsharp masking: `clip(round(amount · x + weight · blur(x)), 0, 255)`,
/// where `blur` is a Gaussian of the given sigma.
pub fn unsharp_mask(gray: &GrayImage, sigma: f32, amount: f64, weight: f64) -> GrayImage {
    let blurred = gaussian_blur_f32(gray, sigma);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let original = f64::from(gray.get_pixel(x, y).0[0]);
        let blur = f64::from(blurred.get_pixel(x, y).0[0]);
        Luma([clamp_u8(amount * original + weight * blur)])
    })
}

// -- Binarization -------------------------------------------------------------

/// Adaptive Gaussian thresholding.
///
/// The local mean is a Gaussian-weighted average over a
/// `block_size × block_size` neighbourhood with replicated borders, rounded
/// to an integer sample. Blocks of 3, 5 and 7 use the fixed binomial kernels
/// (`[1 2 1] / 4` and its wider relatives); larger blocks use
/// `sigma = 0.3 · ((block_size - 1) · 0.5 - 1) + 0.8`. A pixel becomes 255
/// when it is brighter than `mean - c`, otherwise 0.
///
/// `stop` is polled every [`STOP_CHECK_ROWS`] rows of each pass; returns
/// `None` as soon as it reports `true`.
pub fn adaptive_threshold(
    gray: &GrayImage,
    block_size: u32,
    c: f64,
    stop: &dyn Fn() -> bool,
) -> Option<GrayImage> {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return Some(gray.clone());
    }

    let kernel = gaussian_kernel(block_size);
    let radius = (block_size / 2) as i64;
    let w = width as usize;
    let h = height as usize;

    // Horizontal pass.
    let mut horizontal = vec![0f64; w * h];
    for y in 0..h {
        if y % STOP_CHECK_ROWS == 0 && stop() {
            return None;
        }
        for x in 0..w {
            let mut acc = 0f64;
            for (k, coeff) in kernel.iter().enumerate() {
                let sx = (x as i64 + k as i64 - radius).clamp(0, w as i64 - 1) as u32;
                acc += coeff * f64::from(gray.get_pixel(sx, y as u32).0[0]);
            }
            horizontal[y * w + x] = acc;
        }
    }

    // Vertical pass and threshold.
    let mut out = GrayImage::new(width, height);
    for y in 0..h {
        if y % STOP_CHECK_ROWS == 0 && stop() {
            return None;
        }
        for x in 0..w {
            let mut acc = 0f64;
            for (k, coeff) in kernel.iter().enumerate() {
                let sy = (y as i64 + k as i64 - radius).clamp(0, h as i64 - 1) as usize;
                acc += coeff * horizontal[sy * w + x];
            }
            let mean = acc.round();
            let value = f64::from(gray.get_pixel(x as u32, y as u32).0[0]);
            out.put_pixel(x as u32, y as u32, Luma([if value > mean - c { 255 } else { 0 }]));
        }
    }
    Some(out)
}

/// Fixed kernels for the small odd sizes, indexed by `size / 2`.
const SMALL_GAUSSIAN_KERNELS: [&[f64]; 4] = [
    &[1.0],
    &[0.25, 0.5, 0.25],
    &[0.0625, 0.25, 0.375, 0.25, 0.0625],
    &[0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125],
];

/// Normalised 1-D Gaussian kernel of odd length `size`. Sizes up to 7 use the
/// fixed binomial tables; larger sizes derive sigma from the size.
fn gaussian_kernel(size: u32) -> Vec<f64> {
    if size % 2 == 1 && size <= 7 {
        return SMALL_GAUSSIAN_KERNELS[(size / 2) as usize].to_vec();
    }
    let sigma = 0.3 * ((f64::from(size) - 1.0) * 0.5 - 1.0) + 0.8;
    let radius = f64::from(size / 2);
    let two_sigma_sq = 2.0 * sigma * sigma;
    let raw: Vec<f64> = (0..size)
        .map(|i| {
            let offset = f64::from(i) - radius;
            (-(offset * offset) / two_sigma_sq).exp()
        })
        .collect();
    let total: f64 = raw.iter().sum();
    raw.into_iter().map(|v| v / total).collect()
}

// -- Helpers ------------------------------------------------------------------

/// Rows processed between polls of a stage's stop check.
pub const STOP_CHECK_ROWS: usize = 32;

fn clamp_u8(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

fn map_pixels(gray: &GrayImage, lut: &[u8; 256]) -> GrayImage {
    let mut out = gray.clone();
    for pixel in out.pixels_mut() {
        pixel.0[0] = lut[pixel.0[0] as usize];
    }
    out
}

/// Read-only view of a grayscale image with replicated borders.
struct Padded {
    data: Vec<u8>,
    stride: usize,
    rows: usize,
}

impl Padded {
    fn replicate(gray: &GrayImage, pad: i64) -> Self {
        let (width, height) = gray.dimensions();
        let stride = width as usize + 2 * pad as usize;
        let rows = height as usize + 2 * pad as usize;
        let mut data = Vec::with_capacity(stride * rows);
        for py in 0..rows as i64 {
            let y = (py - pad).clamp(0, i64::from(height) - 1) as u32;
            for px in 0..stride as i64 {
                let x = (px - pad).clamp(0, i64::from(width) - 1) as u32;
                data.push(gray.get_pixel(x, y).0[0]);
            }
        }
        Self { data, stride, rows }
    }

    /// Sample at padded coordinates; callers stay inside the padding.
    fn get(&self, px: i64, py: i64) -> u8 {
        debug_assert!(px >= 0 && (px as usize) < self.stride);
        debug_assert!(py >= 0 && (py as usize) < self.rows);
        self.data[py as usize * self.stride + px as usize]
    }
}

// -- Tests --------------------------------------------------------------------
