use std::f32::consts::TAU;

use rapier2d::prelude::*;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::Vec2;

pub const DEFAULT_GRAVITY: Vec2 = Vec2 { x: 0.0, y: -9.81 };
pub const DEFAULT_TIMESTEP_SECONDS: f32 = 1.0 / 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhysicsConfig {
    pub gravity: Vec2,
    pub timestep_seconds: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: DEFAULT_GRAVITY,
            timestep_seconds: DEFAULT_TIMESTEP_SECONDS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BodyShape {
    Rectangle { width: f32, height: f32 },
    Circle { radius: f32 },
    /// Regular polygon inscribed in a circle of `radius`.
    Polygon { sides: u32, radius: f32 },
    /// Arbitrary vertex set relative to the body position; the collider is its convex hull.
    Vertices(Vec<Vec2>),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShapeError {
    #[error("{kind} {dimension} must be finite and positive, got {value}")]
    NonPositiveSize {
        kind: &'static str,
        dimension: &'static str,
        value: f32,
    },
    #[error("polygon needs at least 3 sides, got {sides}")]
    TooFewSides { sides: u32 },
    #[error("vertex set of {count} points does not enclose an area")]
    DegenerateVertices { count: usize },
}

impl BodyShape {
    pub fn kind_name(&self) -> &'static str {
        match self {
            BodyShape::Rectangle { .. } => "rectangle",
            BodyShape::Circle { .. } => "circle",
            BodyShape::Polygon { .. } => "polygon",
            BodyShape::Vertices(_) => "vertices",
        }
    }

    pub fn validate(&self) -> Result<(), ShapeError> {
        let kind = self.kind_name();
        match self {
            BodyShape::Rectangle { width, height } => {
                ensure_positive(kind, "width", *width)?;
                ensure_positive(kind, "height", *height)
            }
            BodyShape::Circle { radius } => ensure_positive(kind, "radius", *radius),
            BodyShape::Polygon { sides, radius } => {
                if *sides < 3 {
                    return Err(ShapeError::TooFewSides { sides: *sides });
                }
                ensure_positive(kind, "radius", *radius)
            }
            BodyShape::Vertices(vertices) => {
                if vertices.len() < 3 || vertices.iter().any(|v| !v.is_finite()) {
                    return Err(ShapeError::DegenerateVertices {
                        count: vertices.len(),
                    });
                }
                Ok(())
            }
        }
    }

    fn collider_builder(&self) -> Result<ColliderBuilder, ShapeError> {
        self.validate()?;
        match self {
            BodyShape::Rectangle { width, height } => {
                Ok(ColliderBuilder::cuboid(width * 0.5, height * 0.5))
            }
            BodyShape::Circle { radius } => Ok(ColliderBuilder::ball(*radius)),
            BodyShape::Polygon { sides, radius } => {
                let points = regular_polygon_vertices(*sides, *radius)
                    .into_iter()
                    .map(|v| point![v.x, v.y])
                    .collect::<Vec<_>>();
                ColliderBuilder::convex_hull(&points).ok_or(ShapeError::DegenerateVertices {
                    count: points.len(),
                })
            }
            BodyShape::Vertices(vertices) => {
                let points = vertices
                    .iter()
                    .map(|v| point![v.x, v.y])
                    .collect::<Vec<_>>();
                ColliderBuilder::convex_hull(&points).ok_or(ShapeError::DegenerateVertices {
                    count: points.len(),
                })
            }
        }
    }
}

fn ensure_positive(kind: &'static str, dimension: &'static str, value: f32) -> Result<(), ShapeError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ShapeError::NonPositiveSize {
            kind,
            dimension,
            value,
        })
    }
}

pub fn regular_polygon_vertices(sides: u32, radius: f32) -> Vec<Vec2> {
    let theta = TAU / sides as f32;
    let offset = theta * 0.5;
    (0..sides)
        .map(|index| {
            let angle = offset + index as f32 * theta;
            Vec2::new(radius * angle.cos(), radius * angle.sin())
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyParams {
    pub is_static: bool,
    pub mass: f32,
    pub angle: f32,
    pub friction: f32,
    pub restitution: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    pub position: Vec2,
    pub velocity: Vec2,
    pub angle: f32,
}

pub struct PhysicsWorld {
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(PhysicsConfig::default())
    }
}

impl PhysicsWorld {
    pub fn new(config: PhysicsConfig) -> Self {
        let integration_parameters = IntegrationParameters {
            dt: sanitize_timestep(config.timestep_seconds),
            ..IntegrationParameters::default()
        };
        Self {
            gravity: vector![config.gravity.x, config.gravity.y],
            integration_parameters,
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
        }
    }

    pub fn gravity(&self) -> Vec2 {
        Vec2::new(self.gravity.x, self.gravity.y)
    }

    pub fn timestep_seconds(&self) -> f32 {
        self.integration_parameters.dt
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn contains_body(&self, handle: RigidBodyHandle) -> bool {
        self.bodies.contains(handle)
    }

    /// Builds the body and its collider and registers both in one call.
    pub fn create_body(
        &mut self,
        position: Vec2,
        shape: &BodyShape,
        params: &BodyParams,
    ) -> Result<RigidBodyHandle, ShapeError> {
        let collider = shape
            .collider_builder()?
            .friction(params.friction)
            .restitution(params.restitution)
            .mass(params.mass)
            .build();
        let builder = if params.is_static {
            RigidBodyBuilder::fixed()
        } else {
            RigidBodyBuilder::dynamic()
        };
        let body = builder
            .translation(vector![position.x, position.y])
            .rotation(params.angle)
            .build();
        let handle = self.bodies.insert(body);
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        debug!(
            handle = ?handle,
            shape = shape.kind_name(),
            is_static = params.is_static,
            "physics_body_created"
        );
        Ok(handle)
    }

    pub fn remove_body(&mut self, handle: RigidBodyHandle) -> bool {
        let removed = self
            .bodies
            .remove(
                handle,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            )
            .is_some();
        if removed {
            debug!(handle = ?handle, "physics_body_removed");
        }
        removed
    }

    pub fn body_state(&self, handle: RigidBodyHandle) -> Option<BodyState> {
        self.bodies.get(handle).map(|body| {
            let translation = body.translation();
            let linvel = body.linvel();
            BodyState {
                position: Vec2::new(translation.x, translation.y),
                velocity: Vec2::new(linvel.x, linvel.y),
                angle: body.rotation().angle(),
            }
        })
    }

    pub fn set_body_position(&mut self, handle: RigidBodyHandle, position: Vec2) -> bool {
        match self.bodies.get_mut(handle) {
            Some(body) => {
                body.set_translation(vector![position.x, position.y], true);
                true
            }
            None => false,
        }
    }

    pub fn set_body_velocity(&mut self, handle: RigidBodyHandle, velocity: Vec2) -> bool {
        match self.bodies.get_mut(handle) {
            Some(body) => {
                body.set_linvel(vector![velocity.x, velocity.y], true);
                true
            }
            None => false,
        }
    }

    pub fn set_body_angle(&mut self, handle: RigidBodyHandle, angle: f32) -> bool {
        match self.bodies.get_mut(handle) {
            Some(body) => {
                body.set_rotation(Rotation::new(angle), true);
                true
            }
            None => false,
        }
    }

    pub fn step(&mut self) {
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
    }

    pub fn clear(&mut self) {
        let handles = self
            .bodies
            .iter()
            .map(|(handle, _)| handle)
            .collect::<Vec<_>>();
        for handle in handles {
            self.remove_body(handle);
        }
    }
}

fn sanitize_timestep(timestep_seconds: f32) -> f32 {
    if timestep_seconds.is_finite() && timestep_seconds > 0.0 {
        timestep_seconds
    } else {
        DEFAULT_TIMESTEP_SECONDS
    }
}
