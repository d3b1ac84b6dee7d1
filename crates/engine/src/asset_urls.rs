use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetUrlError {
    #[error("asset url is empty")]
    Empty,
    #[error("asset url '{url}' is not relative to the asset root")]
    NotRelative { url: String },
    #[error("asset url '{url}' climbs out of the asset root")]
    EscapesRoot { url: String },
    #[error("asset url '{url}' contains unsupported character {character:?}")]
    UnsupportedCharacter { url: String, character: char },
}

/// Joins a relative asset url onto `asset_root`, refusing anything that would
/// resolve outside of it.
pub(crate) fn resolve_asset_path(asset_root: &Path, url: &str) -> Result<PathBuf, AssetUrlError> {
    if let Some(character) = url.chars().find(|c| *c == '\\' || c.is_control()) {
        return Err(AssetUrlError::UnsupportedCharacter {
            url: url.to_string(),
            character,
        });
    }

    let mut path = asset_root.to_path_buf();
    let mut segments = 0usize;
    for component in Path::new(url).components() {
        match component {
            Component::Normal(segment) => {
                path.push(segment);
                segments += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(AssetUrlError::EscapesRoot {
                    url: url.to_string(),
                })
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(AssetUrlError::NotRelative {
                    url: url.to_string(),
                })
            }
        }
    }

    if segments == 0 {
        return Err(AssetUrlError::Empty);
    }
    Ok(path)
}
