use std::io::Cursor;

use base64::Engine as _;
use image::{ImageFormat, RgbaImage};
use thiserror::Error;

pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";
/// Largest width or height, in pixels, of a tiled raster.
pub const MAX_TILED_TEXTURE_SIDE: u32 = 8192;

#[derive(Debug, Error)]
pub enum TilingError {
    #[error("tiled texture size must be non-zero, got {width}x{height}")]
    EmptyTarget { width: u32, height: u32 },
    #[error("tiled texture {width}x{height} exceeds {max} pixels per side", max = MAX_TILED_TEXTURE_SIDE)]
    TooLarge { width: u32, height: u32 },
    #[error("source texture has no pixels")]
    EmptySource,
    #[error("failed to encode tiled texture as png: {0}")]
    Encode(#[from] image::ImageError),
}

/// Fills a `width` x `height` raster by repeating `source` from the top-left corner.
pub fn tile_image(source: &RgbaImage, width: u32, height: u32) -> Result<RgbaImage, TilingError> {
    if width == 0 || height == 0 {
        return Err(TilingError::EmptyTarget { width, height });
    }
    if width > MAX_TILED_TEXTURE_SIDE || height > MAX_TILED_TEXTURE_SIDE {
        return Err(TilingError::TooLarge { width, height });
    }
    let (tile_width, tile_height) = source.dimensions();
    if tile_width == 0 || tile_height == 0 {
        return Err(TilingError::EmptySource);
    }
    Ok(RgbaImage::from_fn(width, height, |x, y| {
        *source.get_pixel(x % tile_width, y % tile_height)
    }))
}

pub fn encode_png_data_url(image: &RgbaImage) -> Result<String, TilingError> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
    Ok(format!("{PNG_DATA_URL_PREFIX}{encoded}"))
}
