use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use engine::{EntityConfig, PhysicsConfig, Vec2};
use serde::Deserialize;
use thiserror::Error;

pub(crate) const DEFAULT_SCENE_JSON: &str = include_str!("../../scenes/default.json");
pub(crate) const DEFAULT_TICKS: u64 = 600;
pub(crate) const DEFAULT_LOG_INTERVAL_TICKS: u64 = 60;

#[derive(Debug, Error)]
pub(crate) enum SceneConfigError {
    #[error("failed to read scene file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse scene {origin}: {message}")]
    Parse { origin: String, message: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SceneConfig {
    #[serde(default)]
    pub physics: PhysicsConfig,
    #[serde(default = "default_ticks")]
    pub ticks: u64,
    #[serde(default = "default_log_interval_ticks")]
    pub log_interval_ticks: u64,
    #[serde(default)]
    pub textures: BTreeMap<String, String>,
    #[serde(default)]
    pub entities: Vec<EntitySpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct EntitySpec {
    pub name: String,
    pub position: Vec2,
    pub shape: ShapeSpec,
    #[serde(default)]
    pub options: EntityConfig,
    #[serde(default)]
    pub behavior: Option<Behavior>,
    /// Loaded texture repeated over the shape's bounds instead of stretched.
    #[serde(default)]
    pub tile_texture: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum ShapeSpec {
    Rectangle { width: f32, height: f32 },
    Circle { radius: f32 },
    Polygon { sides: u32, radius: f32 },
    Triangle { vertices: Vec<Vec2> },
    Slope { height: f32, angle_degrees: f32 },
}

impl ShapeSpec {
    /// Axis-aligned size in world units, used to fit textures onto the shape.
    pub(crate) fn bounds_size(&self) -> Vec2 {
        match self {
            ShapeSpec::Rectangle { width, height } => Vec2::new(*width, *height),
            ShapeSpec::Circle { radius } | ShapeSpec::Polygon { radius, .. } => {
                Vec2::new(radius * 2.0, radius * 2.0)
            }
            ShapeSpec::Triangle { vertices } => {
                let (min, max) = vertices.iter().fold(
                    (
                        Vec2::new(f32::INFINITY, f32::INFINITY),
                        Vec2::new(f32::NEG_INFINITY, f32::NEG_INFINITY),
                    ),
                    |(min, max), v| {
                        (
                            Vec2::new(min.x.min(v.x), min.y.min(v.y)),
                            Vec2::new(max.x.max(v.x), max.y.max(v.y)),
                        )
                    },
                );
                if vertices.is_empty() {
                    Vec2::ZERO
                } else {
                    max - min
                }
            }
            ShapeSpec::Slope {
                height,
                angle_degrees,
            } => Vec2::new(height / angle_degrees.to_radians().tan(), *height),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum Behavior {
    Seek { target: Vec2 },
    Flee { target: Vec2 },
}

fn default_ticks() -> u64 {
    DEFAULT_TICKS
}

fn default_log_interval_ticks() -> u64 {
    DEFAULT_LOG_INTERVAL_TICKS
}

pub(crate) fn load_scene_config(path: Option<&Path>) -> Result<SceneConfig, SceneConfigError> {
    match path {
        Some(path) => {
            let raw = fs::read_to_string(path).map_err(|source| SceneConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            parse_scene_config(&raw, &path.display().to_string())
        }
        None => parse_scene_config(DEFAULT_SCENE_JSON, "<builtin default>"),
    }
}

pub(crate) fn parse_scene_config(raw: &str, origin: &str) -> Result<SceneConfig, SceneConfigError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, SceneConfig>(&mut deserializer).map_err(|error| {
        let path = error.path().to_string();
        let source = error.into_inner();
        let message = if path.is_empty() || path == "." {
            source.to_string()
        } else {
            format!("at {path}: {source}")
        };
        SceneConfigError::Parse {
            origin: origin.to_string(),
            message,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn builtin_scene_parses() {
        let config = load_scene_config(None).expect("default scene");
        assert!(!config.entities.is_empty());
        assert!(config
            .entities
            .iter()
            .any(|spec| matches!(spec.behavior, Some(Behavior::Seek { .. }))));
        assert!(config.ticks > 0);
    }

    #[test]
    fn minimal_scene_uses_defaults() {
        let config = parse_scene_config("{}", "test").expect("empty scene");
        assert_eq!(config.ticks, DEFAULT_TICKS);
        assert_eq!(config.log_interval_ticks, DEFAULT_LOG_INTERVAL_TICKS);
        assert_eq!(config.physics, PhysicsConfig::default());
        assert!(config.textures.is_empty());
    }

    #[test]
    fn unknown_entity_option_reports_json_path() {
        let raw = r#"{
            "entities": [
                {
                    "name": "box",
                    "position": {"x": 0.0, "y": 0.0},
                    "shape": {"kind": "circle", "radius": 1.0},
                    "options": {"mass": 1.0, "maxSpeed": 3.0}
                }
            ]
        }"#;
        let err = parse_scene_config(raw, "test").expect_err("unknown option");
        let message = err.to_string();
        assert!(message.contains("entities[0].options"), "{message}");
        assert!(message.contains("maxSpeed"), "{message}");
    }

    #[test]
    fn shape_and_behavior_are_tagged_by_kind() {
        let raw = r#"{
            "entities": [
                {
                    "name": "ramp",
                    "position": {"x": 1.0, "y": 2.0},
                    "shape": {"kind": "slope", "height": 2.0, "angle_degrees": 45.0},
                    "behavior": {"kind": "flee", "target": {"x": 5.0, "y": 0.0}}
                }
            ]
        }"#;
        let config = parse_scene_config(raw, "test").expect("scene");
        let spec = &config.entities[0];
        assert_eq!(
            spec.shape,
            ShapeSpec::Slope {
                height: 2.0,
                angle_degrees: 45.0
            }
        );
        assert_eq!(
            spec.behavior,
            Some(Behavior::Flee {
                target: Vec2::new(5.0, 0.0)
            })
        );
        let size = spec.shape.bounds_size();
        assert!((size.x - 2.0).abs() < 1e-4);
    }

    #[test]
    fn triangle_bounds_cover_all_vertices() {
        let shape = ShapeSpec::Triangle {
            vertices: vec![Vec2::new(-1.0, 0.0), Vec2::new(2.0, 0.0), Vec2::new(0.0, 3.0)],
        };
        assert_eq!(shape.bounds_size(), Vec2::new(3.0, 3.0));
    }

    #[test]
    fn missing_scene_file_is_a_read_error() {
        let temp = TempDir::new().expect("tempdir");
        let err = load_scene_config(Some(&temp.path().join("absent.json"))).expect_err("missing");
        assert!(matches!(err, SceneConfigError::Read { .. }));
    }
}
