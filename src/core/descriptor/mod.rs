//! # Descriptor Module
//!
//! Computes the zoned histogram descriptor of an artifact image.
//!
//! ## How It Works
//! 1. Decode the image and convert it to 8-bit grayscale
//! 2. Equalize its global intensity histogram
//! 3. Split the equalized image into a 4x4 grid of zones
//! 4. Take a normalized 8-bin histogram of every zone
//! 5. Concatenate the 16 zone histograms (128 values)
//!
//! ## Failure Policy
//! An image that cannot be read or decoded yields an empty descriptor
//! from the `describe_*` functions. Empty descriptors are never compared.
//! The `try_describe_*` variants return the reason instead.
//!
//! ## Example
//! ```rust,ignore
//! use artifact_dedup::core::descriptor::{describe_file, DESCRIPTOR_LEN};
//!
//! let descriptor = describe_file(Path::new("upload/123_thumbnail.jpg"));
//! assert_eq!(descriptor.len(), DESCRIPTOR_LEN);
//! ```

pub mod decode;
pub mod equalize;
mod source;
pub mod zones;

pub use decode::FastDecoder;
pub use source::{ImageSource, SourceBytes, SourceFingerprint};

use crate::core::matcher::distance::manhattan;
use crate::error::DescribeError;
use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Zones along the horizontal axis
pub const ZONES_X: usize = 4;
/// Zones along the vertical axis
pub const ZONES_Y: usize = 4;
/// Histogram bins per zone
pub const BINS_PER_ZONE: usize = 8;
/// Length of every comparable descriptor
pub const DESCRIPTOR_LEN: usize = ZONES_X * ZONES_Y * BINS_PER_ZONE;
/// Bumped whenever the descriptor layout or algorithm changes, so cached
/// descriptors from an older layout are recomputed.
pub const DESCRIPTOR_VERSION: u32 = 1;

/// A zoned histogram fingerprint of one image
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Descriptor {
    values: Vec<f64>,
}

impl Descriptor {
    /// Wrap raw descriptor values (e.g. loaded from storage)
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// The "no comparable data" descriptor
    pub fn empty() -> Self {
        Self { values: Vec::new() }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether this descriptor can take part in matching.
    ///
    /// Only full-length descriptors with finite values are compared.
    pub fn is_comparable(&self) -> bool {
        self.values.len() == DESCRIPTOR_LEN && self.values.iter().all(|v| v.is_finite())
    }

    /// The 8-bin histogram of one zone, indexed in row-major order
    pub fn zone(&self, index: usize) -> Option<&[f64]> {
        self.values
            .chunks_exact(BINS_PER_ZONE)
            .nth(index)
    }

    /// Iterate over the zone histograms in row-major order
    pub fn zones(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks_exact(BINS_PER_ZONE)
    }

    /// Manhattan (L1) distance to another descriptor
    pub fn distance(&self, other: &Descriptor) -> f64 {
        manhattan(&self.values, &other.values)
    }

    /// Serialize as little-endian `f64` bytes for storage
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    /// Restore from little-endian `f64` bytes.
    ///
    /// Returns `None` if the byte length is not a multiple of 8.
    pub fn from_le_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() % 8 != 0 {
            return None;
        }
        let values = bytes
            .chunks_exact(8)
            .map(|chunk| {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(chunk);
                f64::from_le_bytes(raw)
            })
            .collect();
        Some(Self { values })
    }
}

impl From<Vec<f64>> for Descriptor {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}

/// Options applied while describing untrusted images
#[derive(Debug, Clone, Copy, Default)]
pub struct DescribeOptions {
    /// Skip images with more pixels than this (None = unlimited)
    pub max_pixels: Option<u64>,
}

/// Compute the descriptor of a grayscale image.
///
/// This is the pure core of the algorithm: equalize, then zone.
pub fn describe_gray(gray: &GrayImage) -> Descriptor {
    let equalized = equalize::equalize(gray);
    let values = zones::zoned_histograms(
        &equalized,
        gray.width() as usize,
        gray.height() as usize,
    );
    Descriptor::new(values)
}

/// Compute the descriptor of an already-decoded image
pub fn describe_image(image: &DynamicImage) -> Descriptor {
    describe_gray(&decode::to_gray(image))
}

/// Reject encoded image data whose header declares too many pixels.
///
/// Data without readable header dimensions passes; decoding reports it.
pub fn check_pixel_limit(bytes: &[u8], label: &str, options: &DescribeOptions) -> Result<(), DescribeError> {
    let Some(limit) = options.max_pixels else {
        return Ok(());
    };

    if let Some((width, height)) = decode::probe_dimensions(bytes) {
        let pixels = width as u64 * height as u64;
        if pixels > limit {
            return Err(DescribeError::TooLarge {
                source_label: label.to_string(),
                pixels,
                limit,
            });
        }
    }
    Ok(())
}

/// Decode and describe encoded image data, reporting failures
pub fn try_describe_bytes(
    bytes: &[u8],
    label: &str,
    options: &DescribeOptions,
) -> Result<Descriptor, DescribeError> {
    check_pixel_limit(bytes, label, options)?;

    let image = FastDecoder::decode_bytes(bytes, label)?;
    Ok(describe_image(&image))
}

/// Decode and describe encoded image data; empty descriptor on failure
pub fn describe_bytes(bytes: &[u8], label: &str) -> Descriptor {
    try_describe_bytes(bytes, label, &DescribeOptions::default()).unwrap_or_default()
}

/// Load and describe an image source, reporting failures
pub fn try_describe_source(
    source: &ImageSource,
    options: &DescribeOptions,
) -> Result<Descriptor, DescribeError> {
    let bytes = source.load()?;
    try_describe_bytes(&bytes, &source.label(), options)
}

/// Read and describe an image file; empty descriptor on failure
pub fn describe_file(path: &Path) -> Descriptor {
    try_describe_source(&ImageSource::from(path), &DescribeOptions::default()).unwrap_or_default()
}
