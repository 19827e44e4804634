//! Zoned local histograms over an equalized image.

use super::{BINS_PER_ZONE, ZONES_X, ZONES_Y};

/// Width of one histogram bin over the [0, 256) intensity range
const BIN_WIDTH: f64 = 256.0 / BINS_PER_ZONE as f64;

/// Map an equalized intensity to its bin.
///
/// The last bin is closed on the right so 255.0 (and anything above)
/// lands in bin 7.
pub fn bin_index(value: f64) -> usize {
    let bin = (value / BIN_WIDTH).floor();
    if bin <= 0.0 {
        0
    } else {
        (bin as usize).min(BINS_PER_ZONE - 1)
    }
}

/// Compute the normalized 8-bin histogram of every zone, in row-major order.
///
/// `values` holds `width * height` equalized intensities in row-major order.
/// Zones are `height / 4` by `width / 4` pixels; remainder rows and columns
/// at the bottom and right edges are not part of any zone. An empty zone
/// yields a zero histogram.
pub fn zoned_histograms(values: &[f64], width: usize, height: usize) -> Vec<f64> {
    let zone_height = height / ZONES_Y;
    let zone_width = width / ZONES_X;
    let mut descriptor = Vec::with_capacity(ZONES_X * ZONES_Y * BINS_PER_ZONE);

    for zone_y in 0..ZONES_Y {
        for zone_x in 0..ZONES_X {
            let mut counts = [0u64; BINS_PER_ZONE];

            for y in zone_y * zone_height..(zone_y + 1) * zone_height {
                let row = &values[y * width..(y + 1) * width];
                for &value in &row[zone_x * zone_width..(zone_x + 1) * zone_width] {
                    counts[bin_index(value)] += 1;
                }
            }

            let total: u64 = counts.iter().sum();
            if total == 0 {
                descriptor.extend(std::iter::repeat(0.0).take(BINS_PER_ZONE));
            } else {
                descriptor.extend(counts.iter().map(|&c| c as f64 / total as f64));
            }
        }
    }

    descriptor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::descriptor::DESCRIPTOR_LEN;

    #[test]
    fn bin_edges_are_multiples_of_32() {
        assert_eq!(bin_index(0.0), 0);
        assert_eq!(bin_index(31.99), 0);
        assert_eq!(bin_index(32.0), 1);
        assert_eq!(bin_index(127.5), 3);
        assert_eq!(bin_index(224.0), 7);
        assert_eq!(bin_index(255.0), 7);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        assert_eq!(bin_index(256.0), 7);
        assert_eq!(bin_index(-1.0), 0);
    }

    #[test]
    fn zones_are_row_major() {
        // 4x4 image, one pixel per zone, value rises with zone index
        let values: Vec<f64> = (0..16).map(|i| (i * 16) as f64).collect();
        let descriptor = zoned_histograms(&values, 4, 4);

        assert_eq!(descriptor.len(), DESCRIPTOR_LEN);
        for (zone, chunk) in descriptor.chunks(BINS_PER_ZONE).enumerate() {
            let expected_bin = bin_index((zone * 16) as f64);
            assert_eq!(chunk[expected_bin], 1.0, "zone {zone}");
        }
    }

    #[test]
    fn tiny_image_has_empty_zones() {
        let descriptor = zoned_histograms(&[10.0, 20.0, 30.0], 3, 1);
        assert_eq!(descriptor.len(), DESCRIPTOR_LEN);
        assert!(descriptor.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn remainder_pixels_are_excluded() {
        // 5x5 image: zones are 1x1, the last row and column are ignored
        let mut values = vec![0.0; 25];
        for i in 0..5 {
            values[4 * 5 + i] = 255.0;
            values[i * 5 + 4] = 255.0;
        }
        let descriptor = zoned_histograms(&values, 5, 5);

        for chunk in descriptor.chunks(BINS_PER_ZONE) {
            assert_eq!(chunk[0], 1.0);
            assert_eq!(chunk[7], 0.0);
        }
    }
}
