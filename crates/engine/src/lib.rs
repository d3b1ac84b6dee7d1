use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

mod asset_urls;
pub mod sim;
pub mod texture;

pub use asset_urls::AssetUrlError;
pub use sim::{
    degrees_to_radians, radians_to_degrees, BodyShape, Entity, EntityConfig, EntityError,
    EntityId, PhysicsConfig, PhysicsWorld, ShapeError, Simulation, TextureRef, Vec2,
};
pub use texture::{
    DecodeError, FileImageDecoder, ImageDecoder, Texture, TextureBatchError, TextureCache,
    TextureLoad, TextureLoadError, TextureScale, TilingError, MAX_TILED_TEXTURE_SIDE,
};

pub const ASSET_ROOT_ENV_VAR: &str = "STEERDEMO_ASSET_ROOT";

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error("{var} is set but is not a directory: {path}")]
    InvalidEnvRoot { var: &'static str, path: PathBuf },
    #[error(
        "Could not find an assets directory by walking upward from {start_dir}\n\
Expected a directory containing Cargo.toml and assets/.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/assets\""
    )]
    AssetRootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

/// Directory that relative texture urls resolve against.
pub fn resolve_asset_root() -> Result<PathBuf, StartupError> {
    match env::var(ASSET_ROOT_ENV_VAR) {
        Ok(value) => {
            let normalized = normalize_path(Path::new(&value));
            if normalized.is_dir() {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot {
                    var: ASSET_ROOT_ENV_VAR,
                    path: normalized,
                })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            exe_dir
                .ancestors()
                .find(|candidate| is_repo_marker(candidate))
                .map(|root| normalize_path(&root.join("assets")))
                .ok_or_else(|| StartupError::AssetRootNotFound {
                    start_dir: normalize_path(&exe_dir),
                    env_var: ASSET_ROOT_ENV_VAR,
                })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ASSET_ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_repo_marker(path: &Path) -> bool {
    path.join("Cargo.toml").is_file() && path.join("assets").is_dir()
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn repo_marker_requires_cargo_toml_and_assets() {
        let temp = TempDir::new().expect("tempdir");
        assert!(!is_repo_marker(temp.path()));
        fs::create_dir(temp.path().join("assets")).expect("assets");
        assert!(!is_repo_marker(temp.path()));
        fs::write(temp.path().join("Cargo.toml"), "[workspace]\n").expect("cargo toml");
        assert!(is_repo_marker(temp.path()));
    }
}
