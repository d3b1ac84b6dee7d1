use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use futures::future::{FutureExt, LocalBoxFuture};
use thiserror::Error;

use super::Texture;
use crate::asset_urls::{resolve_asset_path, AssetUrlError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error(transparent)]
    InvalidUrl(#[from] AssetUrlError),
    #[error("malformed data url: {0}")]
    InvalidDataUrl(String),
    #[error("failed to read {}: {message}", path.display())]
    Read { path: PathBuf, message: String },
    #[error("failed to decode image: {0}")]
    Decode(String),
}

pub type DecodeFuture = LocalBoxFuture<'static, Result<Texture, DecodeError>>;

/// Turns a url into a decoded texture. Implementations should start their work when
/// `decode` is called and resolve the returned future once the image is ready.
pub trait ImageDecoder {
    fn decode(&self, url: &str) -> DecodeFuture;
}

/// Decodes relative asset urls from disk under `asset_root`, plus inline
/// `data:image/...;base64,` urls.
#[derive(Debug, Clone)]
pub struct FileImageDecoder {
    asset_root: PathBuf,
}

impl FileImageDecoder {
    pub fn new(asset_root: impl Into<PathBuf>) -> Self {
        Self {
            asset_root: asset_root.into(),
        }
    }

    pub fn asset_root(&self) -> &Path {
        &self.asset_root
    }
}

enum ImageSource {
    Inline(Vec<u8>),
    File(PathBuf),
}

impl ImageDecoder for FileImageDecoder {
    fn decode(&self, url: &str) -> DecodeFuture {
        let source = resolve_image_source(&self.asset_root, url);
        async move {
            let bytes = match source? {
                ImageSource::Inline(bytes) => bytes,
                ImageSource::File(path) => fs::read(&path).map_err(|error| DecodeError::Read {
                    message: error.to_string(),
                    path,
                })?,
            };
            decode_texture_bytes(&bytes)
        }
        .boxed_local()
    }
}

fn resolve_image_source(asset_root: &Path, url: &str) -> Result<ImageSource, DecodeError> {
    let Some(rest) = url.strip_prefix("data:") else {
        return Ok(ImageSource::File(resolve_asset_path(asset_root, url)?));
    };
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| DecodeError::InvalidDataUrl("missing payload".to_string()))?;
    if !header.starts_with("image/") || !header.ends_with(";base64") {
        return Err(DecodeError::InvalidDataUrl(format!(
            "unsupported header '{header}'"
        )));
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|error| DecodeError::InvalidDataUrl(error.to_string()))?;
    Ok(ImageSource::Inline(bytes))
}

fn decode_texture_bytes(bytes: &[u8]) -> Result<Texture, DecodeError> {
    let decoded =
        image::load_from_memory(bytes).map_err(|error| DecodeError::Decode(error.to_string()))?;
    Ok(Texture::new(decoded.to_rgba8()))
}
