use std::path::PathBuf;

use engine::{resolve_asset_root, TextureCache};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::config::{load_scene_config, SceneConfig, SceneConfigError};
use super::scene::SceneBuildError;

const FALLBACK_ASSET_ROOT: &str = "assets";

#[derive(Debug, Error)]
pub(crate) enum DemoError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Config(#[from] SceneConfigError),
    #[error(transparent)]
    Scene(#[from] SceneBuildError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CliOptions {
    pub scene: Option<PathBuf>,
    pub ticks: Option<u64>,
    pub help: bool,
}

pub(crate) struct AppWiring {
    pub(crate) config: SceneConfig,
    pub(crate) textures: TextureCache,
}

pub(crate) fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

pub(crate) fn parse_args(args: &[String]) -> Result<CliOptions, DemoError> {
    let mut options = CliOptions::default();
    let mut index = 0usize;
    while index < args.len() {
        match args[index].as_str() {
            "-h" | "--help" => {
                options.help = true;
                index += 1;
            }
            "--scene" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| DemoError::Usage("missing value for --scene".to_string()))?;
                options.scene = Some(PathBuf::from(value));
                index += 2;
            }
            "--ticks" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| DemoError::Usage("missing value for --ticks".to_string()))?;
                let ticks = value.parse::<u64>().map_err(|_| {
                    DemoError::Usage(format!("invalid --ticks value '{value}' (expected u64)"))
                })?;
                options.ticks = Some(ticks);
                index += 2;
            }
            other => {
                return Err(DemoError::Usage(format!("unknown argument '{other}'")));
            }
        }
    }
    Ok(options)
}

pub(crate) fn usage_text() -> String {
    [
        "usage: demo [--scene <path>] [--ticks <n>]",
        "",
        "  --scene <path>  scene json to simulate (defaults to the builtin scene)",
        "  --ticks <n>     number of fixed steps to run, overriding the scene",
        "  -h, --help      print this message",
    ]
    .join("\n")
}

pub(crate) fn build_app(options: &CliOptions) -> Result<AppWiring, DemoError> {
    info!("=== Steering Demo Startup ===");

    let mut config = load_scene_config(options.scene.as_deref())?;
    if let Some(ticks) = options.ticks {
        config.ticks = ticks;
    }

    let asset_root = match resolve_asset_root() {
        Ok(root) => root,
        Err(err) => {
            warn!(error = %err, fallback = FALLBACK_ASSET_ROOT, "asset_root_unresolved");
            PathBuf::from(FALLBACK_ASSET_ROOT)
        }
    };
    info!(asset_root = %asset_root.display(), "asset_root_resolved");

    Ok(AppWiring {
        config,
        textures: TextureCache::with_asset_root(asset_root),
    })
}
