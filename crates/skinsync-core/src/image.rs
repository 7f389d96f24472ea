//! Image decoding seam: raw bytes in, 8-bit pixel buffer out.

use std::path::Path;

/// Pixel layout of a decoded image (8 bits per channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Grayscale,
    GrayscaleAlpha,
    Rgb,
    Rgba,
}

impl ImageFormat {
    pub fn channels(self) -> usize {
        match self {
            ImageFormat::Grayscale => 1,
            ImageFormat::GrayscaleAlpha => 2,
            ImageFormat::Rgb => 3,
            ImageFormat::Rgba => 4,
        }
    }
}

/// Decoded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub data: Vec<u8>,
}

impl ImageInfo {
    /// Build an RGBA image from raw pixels; `None` if the buffer length doesn't match.
    pub fn rgba(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != width as usize * height as usize * 4 {
            return None;
        }
        Some(Self {
            width,
            height,
            format: ImageFormat::Rgba,
            data,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("cannot read image: {0}")]
    Io(#[from] std::io::Error),
    #[error("png decode failed: {0}")]
    Png(#[from] png::DecodingError),
    #[error("unsupported image: {0}")]
    Unsupported(String),
}

/// Turns encoded image bytes into pixels.
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, data: &[u8]) -> Result<ImageInfo, ImageError>;

    fn decode_file(&self, path: &Path) -> Result<ImageInfo, ImageError> {
        let data = std::fs::read(path)?;
        self.decode(&data)
    }
}

/// PNG decoder; palettes, low bit depths and tRNS are expanded, 16-bit is stripped to 8.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngDecoder;

impl ImageDecoder for PngDecoder {
    fn decode(&self, data: &[u8]) -> Result<ImageInfo, ImageError> {
        let mut decoder = png::Decoder::new(std::io::Cursor::new(data));
        decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
        let mut reader = decoder.read_info()?;
        let mut buf = vec![0u8; reader.output_buffer_size()];
        let frame = reader.next_frame(&mut buf)?;
        buf.truncate(frame.buffer_size());

        let format = match frame.color_type {
            png::ColorType::Grayscale => ImageFormat::Grayscale,
            png::ColorType::GrayscaleAlpha => ImageFormat::GrayscaleAlpha,
            png::ColorType::Rgb => ImageFormat::Rgb,
            png::ColorType::Rgba => ImageFormat::Rgba,
            png::ColorType::Indexed => {
                return Err(ImageError::Unsupported("indexed color after expansion".into()))
            }
        };
        if frame.bit_depth != png::BitDepth::Eight {
            return Err(ImageError::Unsupported(format!(
                "bit depth {:?}",
                frame.bit_depth
            )));
        }
        Ok(ImageInfo {
            width: frame.width,
            height: frame.height,
            format,
            data: buf,
        })
    }
}

/// Encode RGBA pixels as PNG. Used for the placeholder skin and tests.
pub fn encode_png_rgba(width: u32, height: u32, data: &[u8]) -> Result<Vec<u8>, png::EncodingError> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(data)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_roundtrip_rgba() {
        let pixels: Vec<u8> = (0..4 * 4 * 4).map(|i| i as u8).collect();
        let encoded = encode_png_rgba(4, 4, &pixels).unwrap();
        let img = PngDecoder.decode(&encoded).unwrap();
        assert_eq!((img.width, img.height), (4, 4));
        assert_eq!(img.format, ImageFormat::Rgba);
        assert_eq!(img.data, pixels);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            PngDecoder.decode(b"definitely not a png"),
            Err(ImageError::Png(_))
        ));
    }

    #[test]
    fn rgba_constructor_checks_length() {
        assert!(ImageInfo::rgba(2, 2, vec![0; 16]).is_some());
        assert!(ImageInfo::rgba(2, 2, vec![0; 15]).is_none());
        assert_eq!(ImageFormat::Rgb.channels(), 3);
    }
}
