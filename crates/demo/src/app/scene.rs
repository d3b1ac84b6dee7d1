use engine::{
    EntityConfig, EntityError, EntityId, Simulation, Texture, TextureCache, TextureLoadError,
    TextureRef, TilingError,
};
use thiserror::Error;
use tracing::{info, warn};

use super::config::{Behavior, EntitySpec, SceneConfig, ShapeSpec};

pub(crate) const PIXELS_PER_WORLD: f32 = 32.0;
pub(crate) const BUILTIN_CHECKER_TEXTURE: &str = "checker";
const BUILTIN_CHECKER_URL: &str = "builtin:checker";

#[derive(Debug, Error)]
pub(crate) enum SceneBuildError {
    #[error("failed to create entity '{name}': {source}")]
    Entity {
        name: String,
        #[source]
        source: EntityError,
    },
    #[error("failed to tile texture '{texture}' for entity '{name}': {source}")]
    Tiling {
        name: String,
        texture: String,
        #[source]
        source: TilingError,
    },
    #[error("tiled texture for entity '{name}' did not load: {source}")]
    TiledLoad {
        name: String,
        #[source]
        source: TextureLoadError,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct SceneEntity {
    pub name: String,
    pub id: EntityId,
    pub behavior: Option<Behavior>,
}

pub(crate) struct LoadedScene {
    pub simulation: Simulation,
    pub textures: TextureCache,
    pub entities: Vec<SceneEntity>,
}

impl LoadedScene {
    #[cfg(test)]
    pub(crate) fn find(&self, name: &str) -> Option<&SceneEntity> {
        self.entities.iter().find(|entity| entity.name == name)
    }
}

pub(crate) fn build_scene(
    config: &SceneConfig,
    textures: TextureCache,
) -> Result<LoadedScene, SceneBuildError> {
    if let Some(checker) = checker_texture() {
        textures.insert(BUILTIN_CHECKER_TEXTURE, BUILTIN_CHECKER_URL, checker);
    }
    if let Err(error) = pollster::block_on(textures.load(&config.textures)) {
        warn!(
            failed = error.failures.len(),
            total = error.total,
            "scene_textures_partially_loaded"
        );
        for failure in &error.failures {
            warn!(error = %failure, "scene_texture_failed");
        }
    }

    let mut simulation = Simulation::new(config.physics);
    let mut entities = Vec::with_capacity(config.entities.len());
    for spec in &config.entities {
        let id = spawn(&mut simulation, spec).map_err(|source| SceneBuildError::Entity {
            name: spec.name.clone(),
            source,
        })?;
        if let Some(texture) = resolve_entity_texture(spec, &textures)? {
            if let Some(entity) = simulation.entity_mut(id) {
                entity.set_texture(texture);
            }
        }
        entities.push(SceneEntity {
            name: spec.name.clone(),
            id,
            behavior: spec.behavior,
        });
    }

    info!(
        entities = entities.len(),
        textures = textures.len(),
        "scene_loaded"
    );
    Ok(LoadedScene {
        simulation,
        textures,
        entities,
    })
}

fn spawn(simulation: &mut Simulation, spec: &EntitySpec) -> Result<EntityId, EntityError> {
    let options: &EntityConfig = &spec.options;
    match &spec.shape {
        ShapeSpec::Rectangle { width, height } => {
            simulation.create_rectangle(spec.position, *width, *height, options)
        }
        ShapeSpec::Circle { radius } => simulation.create_circle(spec.position, *radius, options),
        ShapeSpec::Polygon { sides, radius } => {
            simulation.create_polygon(spec.position, *sides, *radius, options)
        }
        ShapeSpec::Triangle { vertices } => {
            simulation.create_triangle(spec.position, vertices, options)
        }
        ShapeSpec::Slope {
            height,
            angle_degrees,
        } => simulation.create_slope(spec.position, *height, *angle_degrees, options),
    }
}

fn resolve_entity_texture(
    spec: &EntitySpec,
    textures: &TextureCache,
) -> Result<Option<TextureRef>, SceneBuildError> {
    let size_px = spec.shape.bounds_size() * PIXELS_PER_WORLD;

    if let Some(tile_name) = &spec.tile_texture {
        let width = size_px.x.round().max(1.0) as u32;
        let height = size_px.y.round().max(1.0) as u32;
        let tiled_url = textures
            .create_tiled_texture(tile_name, width, height)
            .map_err(|source| SceneBuildError::Tiling {
                name: spec.name.clone(),
                texture: tile_name.clone(),
                source,
            })?;
        let Some(tiled_url) = tiled_url else {
            warn!(
                entity = spec.name.as_str(),
                texture = tile_name.as_str(),
                "entity_tile_texture_missing"
            );
            return Ok(None);
        };
        let tiled_name = format!("{}@tiled", spec.name);
        pollster::block_on(textures.load_single(&tiled_name, &tiled_url)).map_err(|source| {
            SceneBuildError::TiledLoad {
                name: spec.name.clone(),
                source,
            }
        })?;
        return Ok(Some(TextureRef::new(tiled_name)));
    }

    let Some(sprite_name) = &spec.options.sprite_name else {
        return Ok(None);
    };
    match textures.get_scale(sprite_name, size_px.x, size_px.y) {
        Some(scale) => Ok(Some(
            TextureRef::new(sprite_name.as_str()).with_scale(scale.x_scale, scale.y_scale),
        )),
        None => {
            warn!(
                entity = spec.name.as_str(),
                texture = sprite_name.as_str(),
                "entity_texture_missing"
            );
            Ok(None)
        }
    }
}

pub(crate) fn apply_behaviors(scene: &mut LoadedScene) {
    for scene_entity in &scene.entities {
        let Some(behavior) = scene_entity.behavior else {
            continue;
        };
        let Some(entity) = scene.simulation.entity_mut(scene_entity.id) else {
            continue;
        };
        match behavior {
            Behavior::Seek { target } => entity.seek(target),
            Behavior::Flee { target } => entity.flee(target),
        }
    }
}

const CHECKER_SIZE: u32 = 8;
const CHECKER_CELL: u32 = 4;
const CHECKER_LIGHT: [u8; 4] = [189, 195, 199, 255];
const CHECKER_DARK: [u8; 4] = [52, 73, 94, 255];

fn checker_texture() -> Option<Texture> {
    let mut rgba = Vec::with_capacity((CHECKER_SIZE * CHECKER_SIZE * 4) as usize);
    for y in 0..CHECKER_SIZE {
        for x in 0..CHECKER_SIZE {
            let light = (x / CHECKER_CELL + y / CHECKER_CELL) % 2 == 0;
            rgba.extend_from_slice(if light { &CHECKER_LIGHT } else { &CHECKER_DARK });
        }
    }
    Texture::from_rgba(CHECKER_SIZE, CHECKER_SIZE, rgba)
}
