mod cache;
mod decoder;
mod tiling;

use image::RgbaImage;

pub use cache::{TextureBatchError, TextureCache, TextureLoad, TextureLoadError};
pub use decoder::{DecodeError, DecodeFuture, FileImageDecoder, ImageDecoder};
pub use tiling::{
    encode_png_data_url, tile_image, TilingError, MAX_TILED_TEXTURE_SIDE, PNG_DATA_URL_PREFIX,
};

/// Decoded RGBA raster.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    image: RgbaImage,
}

impl Texture {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    /// `None` when `rgba` is not exactly `width * height * 4` bytes.
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Option<Self> {
        RgbaImage::from_raw(width, height, rgba).map(Self::new)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

/// Per-axis factors mapping a texture's native pixel size onto a target size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureScale {
    pub x_scale: f32,
    pub y_scale: f32,
}

impl TextureScale {
    pub fn fit(texture: &Texture, target_width: f32, target_height: f32) -> Self {
        Self {
            x_scale: target_width / texture.width() as f32,
            y_scale: target_height / texture.height() as f32,
        }
    }
}
