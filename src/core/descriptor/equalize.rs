//! Global histogram equalization of a grayscale image.
//!
//! The equalized intensities are kept as `f64` rather than rounded back
//! to `u8`, so the zone histograms see exactly the remapped values.

use image::GrayImage;

/// Number of intensity levels in an 8-bit image
pub const INTENSITY_LEVELS: usize = 256;

/// Count how many pixels take each intensity value
pub fn intensity_histogram(pixels: &[u8]) -> [u64; INTENSITY_LEVELS] {
    let mut histogram = [0u64; INTENSITY_LEVELS];
    for &pixel in pixels {
        histogram[pixel as usize] += 1;
    }
    histogram
}

/// Running sum of a histogram
pub fn cumulative(histogram: &[u64; INTENSITY_LEVELS]) -> [u64; INTENSITY_LEVELS] {
    let mut cdf = [0u64; INTENSITY_LEVELS];
    let mut total = 0u64;
    for (level, &count) in histogram.iter().enumerate() {
        total += count;
        cdf[level] = total;
    }
    cdf
}

/// Build the lookup table that maps each raw intensity to its equalized value.
///
/// `lut[v] = (cdf[v] - cdf_min) * 255 / (cdf_max - cdf_min)` where the min and
/// max are taken over the whole CDF. Returns `None` when the CDF has zero
/// range (all pixels are 0, or there are no pixels).
pub fn equalization_lut(cdf: &[u64; INTENSITY_LEVELS]) -> Option<[f64; INTENSITY_LEVELS]> {
    let cdf_min = cdf.iter().copied().min().unwrap_or(0);
    let cdf_max = cdf.iter().copied().max().unwrap_or(0);
    let range = cdf_max - cdf_min;
    if range == 0 {
        return None;
    }

    let mut lut = [0f64; INTENSITY_LEVELS];
    for (level, &value) in cdf.iter().enumerate() {
        lut[level] = ((value - cdf_min) * 255) as f64 / range as f64;
    }
    Some(lut)
}

/// Equalize an image, returning the remapped intensities in row-major order.
///
/// A zero-range CDF skips equalization and the raw intensities are returned.
pub fn equalize(gray: &GrayImage) -> Vec<f64> {
    let pixels = gray.as_raw();
    let cdf = cumulative(&intensity_histogram(pixels));

    match equalization_lut(&cdf) {
        Some(lut) => pixels.iter().map(|&p| lut[p as usize]).collect(),
        None => pixels.iter().map(|&p| p as f64).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};

    #[test]
    fn histogram_counts_each_level() {
        let histogram = intensity_histogram(&[0, 0, 7, 255]);
        assert_eq!(histogram[0], 2);
        assert_eq!(histogram[7], 1);
        assert_eq!(histogram[255], 1);
        assert_eq!(histogram.iter().sum::<u64>(), 4);
    }

    #[test]
    fn cumulative_ends_at_pixel_count() {
        let cdf = cumulative(&intensity_histogram(&[3, 3, 9, 200, 200]));
        assert_eq!(cdf[2], 0);
        assert_eq!(cdf[3], 2);
        assert_eq!(cdf[9], 3);
        assert_eq!(cdf[255], 5);
    }

    #[test]
    fn lut_stretches_between_min_and_max() {
        // cdf[0] = 2 is the minimum, the pixel count 4 is the maximum
        let cdf = cumulative(&intensity_histogram(&[0, 0, 128, 255]));
        let lut = equalization_lut(&cdf).unwrap();

        assert_eq!(lut[0], 0.0);
        assert_eq!(lut[128], 127.5);
        assert_eq!(lut[255], 255.0);
    }

    #[test]
    fn all_black_image_has_no_lut() {
        let cdf = cumulative(&intensity_histogram(&[0, 0, 0]));
        assert!(equalization_lut(&cdf).is_none());
    }

    #[test]
    fn uniform_gray_maps_to_white() {
        // No pixel sits at 0, so cdf_min is 0 and every pixel reaches the maximum
        let gray: GrayImage = ImageBuffer::from_pixel(3, 3, Luma([100]));
        let equalized = equalize(&gray);
        assert!(equalized.iter().all(|&v| v == 255.0));
    }

    #[test]
    fn degenerate_image_keeps_raw_values() {
        let gray: GrayImage = ImageBuffer::from_pixel(2, 2, Luma([0]));
        assert_eq!(equalize(&gray), vec![0.0; 4]);
    }
}
