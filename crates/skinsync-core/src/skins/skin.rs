//! A loaded skin: validated texture plus the color data the renderer needs.

use std::path::PathBuf;

use crate::image::{ImageError, ImageFormat, ImageInfo};

/// Longest skin name in bytes.
pub const MAX_SKIN_NAME_LEN: usize = 23;
/// Sprite grid of a skin texture (columns x rows).
pub const GRID_X: u32 = 8;
pub const GRID_Y: u32 = 4;
/// Body sprite size in grid cells, anchored at the top-left.
const BODY_CELLS_X: u32 = 3;
const BODY_CELLS_Y: u32 = 3;
/// Gray value the dominant body shade is mapped to in the colorable texture.
const COLORABLE_WEIGHT: i32 = 192;

#[derive(Debug, thiserror::Error)]
pub enum SkinError {
    #[error("invalid skin name {0:?}")]
    InvalidName(String),
    #[error("skin needs to be RGBA, got {0:?}")]
    NotRgba(ImageFormat),
    #[error("invalid skin dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("pixel buffer is {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
    #[error(transparent)]
    Image(#[from] ImageError),
}

/// Where a skin was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkinSource {
    Local(PathBuf),
    Downloaded(PathBuf),
    Builtin,
}

#[derive(Debug, Clone)]
pub struct Skin {
    name: String,
    texture: ImageInfo,
    colorable: Vec<u8>,
    blood_color: [f32; 3],
    source: SkinSource,
}

/// Non-empty, at most `MAX_SKIN_NAME_LEN` bytes, no control characters.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= MAX_SKIN_NAME_LEN && !name.chars().any(char::is_control)
}

impl Skin {
    /// Validate `image` and derive blood color and the colorable texture.
    pub fn from_image(name: &str, image: ImageInfo, source: SkinSource) -> Result<Self, SkinError> {
        if !is_valid_name(name) {
            return Err(SkinError::InvalidName(name.to_string()));
        }
        if image.format != ImageFormat::Rgba {
            return Err(SkinError::NotRgba(image.format));
        }
        let (width, height) = (image.width, image.height);
        if width == 0
            || height == 0
            || width % GRID_X != 0
            || height % GRID_Y != 0
            || width != 2 * height
        {
            return Err(SkinError::InvalidDimensions { width, height });
        }
        let expected = width as usize * height as usize * 4;
        if image.data.len() != expected {
            return Err(SkinError::BufferSize {
                expected,
                actual: image.data.len(),
            });
        }

        let blood_color = blood_color(&image);
        let colorable = colorable(&image);
        Ok(Self {
            name: name.to_string(),
            texture: image,
            colorable,
            blood_color,
            source,
        })
    }

    /// Flat gray stand-in used when no skin could be loaded at all.
    pub fn placeholder() -> Self {
        let (width, height) = (256u32, 128u32);
        let data = [128u8, 128, 128, 255].repeat(width as usize * height as usize);
        let texture = ImageInfo {
            width,
            height,
            format: ImageFormat::Rgba,
            data,
        };
        let colorable = colorable(&texture);
        Self {
            name: "default".to_string(),
            blood_color: blood_color(&texture),
            texture,
            colorable,
            source: SkinSource::Builtin,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.texture.width
    }

    pub fn height(&self) -> u32 {
        self.texture.height
    }

    /// Original RGBA texture.
    pub fn texture(&self) -> &ImageInfo {
        &self.texture
    }

    /// Grayscale RGBA texture for team/custom coloring.
    pub fn colorable(&self) -> &[u8] {
        &self.colorable
    }

    /// Normalized average body color, black when the body has no color.
    pub fn blood_color(&self) -> [f32; 3] {
        self.blood_color
    }

    pub fn source(&self) -> &SkinSource {
        &self.source
    }
}

fn body_size(image: &ImageInfo) -> (usize, usize) {
    (
        (BODY_CELLS_X * image.width / GRID_X) as usize,
        (BODY_CELLS_Y * image.height / GRID_Y) as usize,
    )
}

/// Byte offsets of opaque body pixels (alpha > 128).
fn opaque_body_pixels(image: &ImageInfo, data: &[u8]) -> Vec<usize> {
    let (body_w, body_h) = body_size(image);
    let pitch = image.width as usize * 4;
    let mut out = Vec::new();
    for y in 0..body_h {
        for x in 0..body_w {
            let i = y * pitch + x * 4;
            if data[i + 3] > 128 {
                out.push(i);
            }
        }
    }
    out
}

fn blood_color(image: &ImageInfo) -> [f32; 3] {
    let mut sum = [0u64; 3];
    for i in opaque_body_pixels(image, &image.data) {
        for (c, s) in sum.iter_mut().enumerate() {
            *s += u64::from(image.data[i + c]);
        }
    }
    if sum.iter().any(|&s| s == 0) {
        return [0.0, 0.0, 0.0];
    }
    let v = sum.map(|s| s as f64);
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    v.map(|c| (c / len) as f32)
}

/// Grayscale the whole texture, then stretch the body so its most common
/// shade lands on `COLORABLE_WEIGHT`.
fn colorable(image: &ImageInfo) -> Vec<u8> {
    let mut d = image.data.clone();
    for px in d.chunks_exact_mut(4) {
        let v = ((u16::from(px[0]) + u16::from(px[1]) + u16::from(px[2])) / 3) as u8;
        px[0] = v;
        px[1] = v;
        px[2] = v;
    }

    let body = opaque_body_pixels(image, &d);
    let mut freq = [0u32; 256];
    for &i in &body {
        freq[d[i] as usize] += 1;
    }
    let mut org_weight = 0usize;
    for i in 1..256 {
        if freq[org_weight] < freq[i] {
            org_weight = i;
        }
    }

    let org = org_weight as i32;
    let inv_org = 255 - org;
    let inv_new = 255 - COLORABLE_WEIGHT;
    let (body_w, body_h) = body_size(image);
    let pitch = image.width as usize * 4;
    for y in 0..body_h {
        for x in 0..body_w {
            let i = y * pitch + x * 4;
            let v = i32::from(d[i]);
            let v = if v <= org && org == 0 {
                0
            } else if v <= org {
                ((v as f32 / org as f32) * COLORABLE_WEIGHT as f32) as i32
            } else if inv_org == 0 {
                COLORABLE_WEIGHT
            } else {
                (((v - org) as f32 / inv_org as f32) * inv_new as f32 + COLORABLE_WEIGHT as f32)
                    as i32
            };
            let v = v.clamp(0, 255) as u8;
            d[i] = v;
            d[i + 1] = v;
            d[i + 2] = v;
        }
    }
    d
}
