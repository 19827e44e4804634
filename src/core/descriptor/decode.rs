//! Image decoding with format-specific fast paths.
//!
//! Uses zune-jpeg for JPEG data (1.5-2x faster than image crate),
//! falls back to image crate for other formats. Large files are
//! read through a memory map.

use crate::error::DescribeError;
use image::{DynamicImage, GrayImage, ImageBuffer, ImageReader, Luma, Rgb, Rgba};
use memmap2::Mmap;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_jpeg::JpegDecoder;

/// Minimum file size to use memory-mapped I/O (1MB)
const MMAP_THRESHOLD: u64 = 1024 * 1024;

/// Image formats recognised from their leading bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SniffedFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
    Bmp,
    Tiff,
    Unknown,
}

impl SniffedFormat {
    /// Detect the format from magic bytes
    pub fn from_bytes(bytes: &[u8]) -> Self {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Self::Jpeg
        } else if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            Self::Png
        } else if bytes.starts_with(b"GIF8") {
            Self::Gif
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Self::WebP
        } else if bytes.starts_with(b"BM") {
            Self::Bmp
        } else if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
            Self::Tiff
        } else {
            Self::Unknown
        }
    }
}

/// Fast image decoder that uses optimized decoders per format
pub struct FastDecoder;

impl FastDecoder {
    /// Decode in-memory image data.
    ///
    /// - JPEG: zune-jpeg, falling back to the image crate
    /// - Other formats: image crate
    pub fn decode_bytes(bytes: &[u8], label: &str) -> Result<DynamicImage, DescribeError> {
        if bytes.is_empty() {
            return Err(DescribeError::EmptyImage {
                source_label: label.to_string(),
            });
        }

        match SniffedFormat::from_bytes(bytes) {
            SniffedFormat::Jpeg => {
                Self::decode_jpeg(bytes, label).or_else(|_| Self::decode_fallback(bytes, label))
            }
            SniffedFormat::Unknown => Err(DescribeError::UnsupportedFormat {
                source_label: label.to_string(),
            }),
            _ => Self::decode_fallback(bytes, label),
        }
    }

    /// Read and decode an image file
    pub fn decode_file(path: &Path) -> Result<DynamicImage, DescribeError> {
        let bytes = read_file_bytes(path)?;
        Self::decode_bytes(&bytes, &path.display().to_string())
    }

    /// Fast JPEG decoding using zune-jpeg
    fn decode_jpeg(bytes: &[u8], label: &str) -> Result<DynamicImage, DescribeError> {
        let options = DecoderOptions::new_fast().jpeg_set_out_colorspace(ColorSpace::RGB);
        let mut decoder = JpegDecoder::new_with_options(bytes, options);

        let pixels = decoder.decode().map_err(|e| DescribeError::DecodeError {
            source_label: label.to_string(),
            reason: format!("zune-jpeg decode failed: {:?}", e),
        })?;

        let info = decoder.info().ok_or_else(|| DescribeError::DecodeError {
            source_label: label.to_string(),
            reason: "Failed to get image info".to_string(),
        })?;

        let width = info.width as u32;
        let height = info.height as u32;
        let buffer_error = |kind: &str| DescribeError::DecodeError {
            source_label: label.to_string(),
            reason: format!("Failed to create {} buffer", kind),
        };

        // Grayscale JPEGs may come back as Luma despite the RGB request
        let out_colorspace = decoder.get_output_colorspace().unwrap_or(ColorSpace::RGB);

        match out_colorspace {
            ColorSpace::RGB => {
                let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> =
                    ImageBuffer::from_raw(width, height, pixels).ok_or_else(|| buffer_error("RGB"))?;
                Ok(DynamicImage::ImageRgb8(buffer))
            }
            ColorSpace::RGBA => {
                let buffer: ImageBuffer<Rgba<u8>, Vec<u8>> =
                    ImageBuffer::from_raw(width, height, pixels).ok_or_else(|| buffer_error("RGBA"))?;
                Ok(DynamicImage::ImageRgba8(buffer))
            }
            ColorSpace::Luma => {
                let buffer: ImageBuffer<Luma<u8>, Vec<u8>> =
                    ImageBuffer::from_raw(width, height, pixels).ok_or_else(|| buffer_error("Luma"))?;
                Ok(DynamicImage::ImageLuma8(buffer))
            }
            _ => Self::decode_fallback(bytes, label),
        }
    }

    /// Fallback to image crate for non-JPEG formats
    fn decode_fallback(bytes: &[u8], label: &str) -> Result<DynamicImage, DescribeError> {
        image::load_from_memory(bytes).map_err(|e| DescribeError::DecodeError {
            source_label: label.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Read the width and height from the image header without decoding pixels
pub fn probe_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// Convert any decoded image to 8-bit luma.
///
/// 8-bit grayscale inputs are used untouched. Everything else goes through
/// RGB8 and the ITU-R 601-2 integer transform, ignoring alpha:
/// `L = (R*19595 + G*38470 + B*7471 + 0x8000) >> 16`.
pub fn to_gray(image: &DynamicImage) -> GrayImage {
    match image {
        DynamicImage::ImageLuma8(gray) => gray.clone(),
        DynamicImage::ImageLumaA8(gray_alpha) => {
            ImageBuffer::from_fn(gray_alpha.width(), gray_alpha.height(), |x, y| {
                Luma([gray_alpha.get_pixel(x, y)[0]])
            })
        }
        other => {
            let rgb = other.to_rgb8();
            ImageBuffer::from_fn(rgb.width(), rgb.height(), |x, y| {
                let [r, g, b] = rgb.get_pixel(x, y).0;
                Luma([rec601_luma(r, g, b)])
            })
        }
    }
}

fn rec601_luma(r: u8, g: u8, b: u8) -> u8 {
    let weighted = r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000;
    (weighted >> 16) as u8
}

/// Read file bytes using memory-mapped I/O for large files.
///
/// For files >= 1MB, uses memory mapping which avoids copying
/// data from kernel to user space. For smaller files, uses
/// standard fs::read() which is faster due to lower overhead.
pub fn read_file_bytes(path: &Path) -> Result<FileBytes, DescribeError> {
    let io_error = |source: std::io::Error| DescribeError::IoError {
        path: path.to_path_buf(),
        source,
    };

    let metadata = std::fs::metadata(path).map_err(io_error)?;

    if metadata.len() >= MMAP_THRESHOLD {
        let file = File::open(path).map_err(io_error)?;
        // SAFETY: read-only mapping; callers keep upload files unchanged while matching.
        let mmap = unsafe { Mmap::map(&file) }.map_err(io_error)?;
        Ok(FileBytes::Mmap(mmap))
    } else {
        let bytes = std::fs::read(path).map_err(io_error)?;
        Ok(FileBytes::Vec(bytes))
    }
}

/// File bytes that may be either owned or memory-mapped.
pub enum FileBytes {
    /// Standard heap-allocated bytes
    Vec(Vec<u8>),
    /// Memory-mapped bytes (zero-copy from disk)
    Mmap(Mmap),
}

impl AsRef<[u8]> for FileBytes {
    fn as_ref(&self) -> &[u8] {
        match self {
            FileBytes::Vec(v) => v,
            FileBytes::Mmap(m) => m,
        }
    }
}

impl std::ops::Deref for FileBytes {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;
    use std::io::Write;
    use tempfile::TempDir;

    fn encode_png(image: &DynamicImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn sniff_recognises_common_formats() {
        assert_eq!(SniffedFormat::from_bytes(&[0xFF, 0xD8, 0xFF, 0xE0]), SniffedFormat::Jpeg);
        assert_eq!(
            SniffedFormat::from_bytes(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
            SniffedFormat::Png
        );
        assert_eq!(SniffedFormat::from_bytes(b"GIF89a"), SniffedFormat::Gif);
        assert_eq!(SniffedFormat::from_bytes(b"not an image"), SniffedFormat::Unknown);
    }

    #[test]
    fn decode_rejects_garbage() {
        let result = FastDecoder::decode_bytes(b"this is not a valid image file", "garbage.jpg");
        assert!(matches!(result, Err(DescribeError::UnsupportedFormat { .. })));
    }

    #[test]
    fn decode_rejects_empty_input() {
        let result = FastDecoder::decode_bytes(&[], "empty.png");
        assert!(matches!(result, Err(DescribeError::EmptyImage { .. })));
    }

    #[test]
    fn decode_png_round_trips_dimensions() {
        let image = DynamicImage::ImageLuma8(ImageBuffer::from_pixel(7, 5, Luma([42])));
        let bytes = encode_png(&image);

        let decoded = FastDecoder::decode_bytes(&bytes, "gray.png").unwrap();
        assert_eq!((decoded.width(), decoded.height()), (7, 5));
        assert_eq!(probe_dimensions(&bytes), Some((7, 5)));
    }

    #[test]
    fn decode_file_reports_missing_path() {
        let result = FastDecoder::decode_file(Path::new("/nonexistent/123_thumbnail.jpg"));
        assert!(matches!(result, Err(DescribeError::IoError { .. })));
    }

    #[test]
    fn read_file_bytes_returns_contents() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("small.bin");
        File::create(&path).unwrap().write_all(b"abc").unwrap();

        let bytes = read_file_bytes(&path).unwrap();
        assert_eq!(&*bytes, b"abc");
        assert!(matches!(bytes, FileBytes::Vec(_)));
    }

    #[test]
    fn rgb_conversion_uses_rec601_weights() {
        assert_eq!(rec601_luma(255, 255, 255), 255);
        assert_eq!(rec601_luma(0, 0, 0), 0);
        assert_eq!(rec601_luma(255, 0, 0), 76);
        assert_eq!(rec601_luma(0, 255, 0), 150);
        assert_eq!(rec601_luma(0, 0, 255), 29);
    }

    #[test]
    fn luma_input_is_untouched() {
        let gray: GrayImage = ImageBuffer::from_fn(3, 2, |x, y| Luma([(x * 10 + y) as u8]));
        let converted = to_gray(&DynamicImage::ImageLuma8(gray.clone()));
        assert_eq!(converted, gray);
    }
}
