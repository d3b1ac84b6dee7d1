use rapier2d::prelude::RigidBodyHandle;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, trace};

use super::physics::{BodyParams, BodyShape, PhysicsWorld, ShapeError};
use super::Vec2;

pub const DEFAULT_FRICTION: f32 = 0.1;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EntityConfig {
    pub is_static: bool,
    pub mass: f32,
    /// `None` leaves speed unbounded.
    pub max_speed: Option<f32>,
    /// `None` leaves steering force unbounded.
    pub max_force: Option<f32>,
    pub angle: f32,
    pub sprite_name: Option<String>,
    pub friction: f32,
    pub restitution: f32,
}

impl Default for EntityConfig {
    fn default() -> Self {
        Self {
            is_static: false,
            mass: 1.0,
            max_speed: None,
            max_force: None,
            angle: 0.0,
            sprite_name: None,
            friction: DEFAULT_FRICTION,
            restitution: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EntityError {
    #[error("{parameter} must be positive, got {value}")]
    InvalidParameter {
        parameter: &'static str,
        value: f32,
    },
    #[error("invalid body shape: {0}")]
    Shape(#[from] ShapeError),
}

impl EntityConfig {
    pub fn validate(&self) -> Result<(), EntityError> {
        if !(self.mass.is_finite() && self.mass > 0.0) {
            return Err(EntityError::InvalidParameter {
                parameter: "mass",
                value: self.mass,
            });
        }
        for (parameter, limit) in [("max_speed", self.max_speed), ("max_force", self.max_force)] {
            if let Some(value) = limit {
                if value.is_nan() || value <= 0.0 {
                    return Err(EntityError::InvalidParameter { parameter, value });
                }
            }
        }
        if !self.angle.is_finite() {
            return Err(EntityError::InvalidParameter {
                parameter: "angle",
                value: self.angle,
            });
        }
        Ok(())
    }

    fn body_params(&self) -> BodyParams {
        BodyParams {
            is_static: self.is_static,
            mass: self.mass,
            angle: self.angle,
            friction: self.friction,
            restitution: self.restitution,
        }
    }
}

/// Texture attached to an entity, with the per-axis scale used to fit it onto the shape.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureRef {
    pub name: String,
    pub x_scale: f32,
    pub y_scale: f32,
}

impl TextureRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            x_scale: 1.0,
            y_scale: 1.0,
        }
    }

    pub fn with_scale(mut self, x_scale: f32, y_scale: f32) -> Self {
        self.x_scale = x_scale;
        self.y_scale = y_scale;
        self
    }
}

/// One physics body plus a force-accumulation model layered on top of it.
///
/// Position, velocity and angle mirror the body and are refreshed from it on every
/// [`Entity::update`]. Acceleration lives only here and is cleared after each update.
#[derive(Debug)]
pub struct Entity {
    shape: BodyShape,
    is_static: bool,
    position: Vec2,
    velocity: Vec2,
    acceleration: Vec2,
    angle: f32,
    mass: f32,
    max_speed: f32,
    max_force: f32,
    texture: Option<TextureRef>,
    body: Option<RigidBodyHandle>,
}

impl Entity {
    pub fn rectangle(
        physics: &mut PhysicsWorld,
        position: Vec2,
        width: f32,
        height: f32,
        config: &EntityConfig,
    ) -> Result<Self, EntityError> {
        Self::spawn(physics, position, BodyShape::Rectangle { width, height }, config)
    }

    pub fn circle(
        physics: &mut PhysicsWorld,
        position: Vec2,
        radius: f32,
        config: &EntityConfig,
    ) -> Result<Self, EntityError> {
        Self::spawn(physics, position, BodyShape::Circle { radius }, config)
    }

    pub fn polygon(
        physics: &mut PhysicsWorld,
        position: Vec2,
        sides: u32,
        radius: f32,
        config: &EntityConfig,
    ) -> Result<Self, EntityError> {
        Self::spawn(physics, position, BodyShape::Polygon { sides, radius }, config)
    }

    pub fn triangle(
        physics: &mut PhysicsWorld,
        position: Vec2,
        vertices: &[Vec2],
        config: &EntityConfig,
    ) -> Result<Self, EntityError> {
        Self::spawn(
            physics,
            position,
            BodyShape::Vertices(vertices.to_vec()),
            config,
        )
    }

    fn spawn(
        physics: &mut PhysicsWorld,
        position: Vec2,
        shape: BodyShape,
        config: &EntityConfig,
    ) -> Result<Self, EntityError> {
        config.validate()?;
        let handle = physics.create_body(position, &shape, &config.body_params())?;
        Ok(Self {
            shape,
            is_static: config.is_static,
            position,
            velocity: Vec2::ZERO,
            acceleration: Vec2::ZERO,
            angle: config.angle,
            mass: config.mass,
            max_speed: config.max_speed.unwrap_or(f32::INFINITY),
            max_force: config.max_force.unwrap_or(f32::INFINITY),
            texture: config.sprite_name.clone().map(TextureRef::new),
            body: Some(handle),
        })
    }

    /// Pulls the authoritative state from the body, integrates the accumulated
    /// acceleration, clamps to `max_speed` and writes the velocity back. Static
    /// entities only mirror their body and drop the accumulated acceleration.
    pub fn update(&mut self, physics: &mut PhysicsWorld) {
        let Some(handle) = self.body else {
            return;
        };
        let Some(state) = physics.body_state(handle) else {
            return;
        };
        self.position = state.position;
        self.velocity = state.velocity;
        self.angle = state.angle;

        if !self.is_static {
            self.velocity = (self.velocity + self.acceleration).limited(self.max_speed);
            physics.set_body_velocity(handle, self.velocity);
        }

        self.acceleration = Vec2::ZERO;
    }

    pub fn apply_force(&mut self, force: Vec2) {
        self.acceleration += force / self.mass;
    }

    pub fn seek(&mut self, target: Vec2) {
        let desired = self.seek_velocity(target);
        self.apply_force(self.steering_force(desired));
    }

    pub fn flee(&mut self, target: Vec2) {
        let desired = self.flee_velocity(target);
        self.apply_force(self.steering_force(desired));
    }

    /// Velocity pointing from the entity toward `target`, of magnitude `max_speed`.
    /// Without a speed cap the magnitude is the distance to `target`.
    pub fn seek_velocity(&self, target: Vec2) -> Vec2 {
        self.desired_velocity(target - self.position)
    }

    /// Velocity pointing from `target` toward the entity, sized as in [`Entity::seek_velocity`].
    pub fn flee_velocity(&self, target: Vec2) -> Vec2 {
        self.desired_velocity(self.position - target)
    }

    fn desired_velocity(&self, offset: Vec2) -> Vec2 {
        if self.max_speed.is_finite() {
            offset.normalized() * self.max_speed
        } else {
            offset
        }
    }

    fn steering_force(&self, desired: Vec2) -> Vec2 {
        (desired - self.velocity).limited(self.max_force)
    }

    pub fn set_position(&mut self, physics: &mut PhysicsWorld, position: Vec2) {
        self.position = position;
        if let Some(handle) = self.body {
            physics.set_body_position(handle, position);
        }
    }

    pub fn set_velocity(&mut self, physics: &mut PhysicsWorld, velocity: Vec2) {
        self.velocity = velocity;
        if let Some(handle) = self.body {
            physics.set_body_velocity(handle, velocity);
        }
    }

    pub fn set_angle(&mut self, physics: &mut PhysicsWorld, angle: f32) {
        self.angle = angle;
        if let Some(handle) = self.body {
            physics.set_body_angle(handle, angle);
        }
    }

    pub fn set_acceleration(&mut self, acceleration: Vec2) {
        self.acceleration = acceleration;
    }

    pub fn set_texture(&mut self, texture: TextureRef) {
        self.texture = Some(texture);
    }

    pub fn clear_texture(&mut self) {
        self.texture = None;
    }

    pub fn destroy(&mut self, physics: &mut PhysicsWorld) {
        match self.body.take() {
            Some(handle) => {
                physics.remove_body(handle);
                debug!(
                    handle = ?handle,
                    shape = self.shape.kind_name(),
                    "entity_destroyed"
                );
            }
            None => trace!("entity_destroy_ignored_already_destroyed"),
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.body.is_none()
    }

    pub fn body_handle(&self) -> Option<RigidBodyHandle> {
        self.body
    }

    pub fn shape(&self) -> &BodyShape {
        &self.shape
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn acceleration(&self) -> Vec2 {
        self.acceleration
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn max_speed(&self) -> f32 {
        self.max_speed
    }

    pub fn max_force(&self) -> f32 {
        self.max_force
    }

    pub fn texture(&self) -> Option<&TextureRef> {
        self.texture.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::PhysicsConfig;

    fn weightless_world() -> PhysicsWorld {
        PhysicsWorld::new(PhysicsConfig {
            gravity: Vec2::ZERO,
            ..PhysicsConfig::default()
        })
    }

    fn steering_config(max_speed: f32, max_force: f32) -> EntityConfig {
        EntityConfig {
            max_speed: Some(max_speed),
            max_force: Some(max_force),
            ..EntityConfig::default()
        }
    }

    fn cosine(a: Vec2, b: Vec2) -> f32 {
        let denom = a.length() * b.length();
        if denom == 0.0 {
            0.0
        } else {
            a.dot(b) / denom
        }
    }

    #[test]
    fn apply_force_then_update_adds_force_over_mass_and_resets_acceleration() {
        let mut physics = weightless_world();
        let config = EntityConfig {
            mass: 2.0,
            ..EntityConfig::default()
        };
        let mut entity =
            Entity::circle(&mut physics, Vec2::ZERO, 1.0, &config).expect("entity");
        entity.set_velocity(&mut physics, Vec2::new(1.0, 0.0));

        entity.apply_force(Vec2::new(4.0, -2.0));
        assert_eq!(entity.acceleration(), Vec2::new(2.0, -1.0));
        entity.update(&mut physics);
        assert_eq!(entity.velocity(), Vec2::new(3.0, -1.0));
        assert_eq!(entity.acceleration(), Vec2::ZERO);

        entity.update(&mut physics);
        assert_eq!(entity.velocity(), Vec2::new(3.0, -1.0));
    }

    #[test]
    fn update_writes_integrated_velocity_into_body() {
        let mut physics = weightless_world();
        let mut entity = Entity::rectangle(
            &mut physics,
            Vec2::ZERO,
            1.0,
            1.0,
            &EntityConfig::default(),
        )
        .expect("entity");
        entity.apply_force(Vec2::new(0.0, 3.0));
        entity.update(&mut physics);
        let handle = entity.body_handle().expect("handle");
        let state = physics.body_state(handle).expect("state");
        assert_eq!(state.velocity, Vec2::new(0.0, 3.0));
    }

    #[test]
    fn update_mirrors_state_changed_inside_physics() {
        let mut physics = weightless_world();
        let mut entity = Entity::circle(&mut physics, Vec2::ZERO, 1.0, &EntityConfig::default())
            .expect("entity");
        let handle = entity.body_handle().expect("handle");
        physics.set_body_position(handle, Vec2::new(7.0, 8.0));
        physics.set_body_velocity(handle, Vec2::new(-2.0, 0.5));
        physics.set_body_angle(handle, 1.0);

        entity.update(&mut physics);
        assert_eq!(entity.position(), Vec2::new(7.0, 8.0));
        assert_eq!(entity.velocity(), Vec2::new(-2.0, 0.5));
        assert!((entity.angle() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn speed_never_exceeds_max_speed_after_update() {
        let mut physics = weightless_world();
        let mut entity =
            Entity::circle(&mut physics, Vec2::ZERO, 0.5, &steering_config(5.0, 100.0))
                .expect("entity");
        let forces = [
            Vec2::new(40.0, 0.0),
            Vec2::new(-3.0, 90.0),
            Vec2::new(0.5, 0.5),
            Vec2::new(-200.0, -200.0),
            Vec2::ZERO,
        ];
        for tick in 0..50 {
            entity.apply_force(forces[tick % forces.len()]);
            entity.update(&mut physics);
            physics.step();
            assert!(
                entity.velocity().length() <= 5.0 + 1e-4,
                "tick={tick} speed={}",
                entity.velocity().length()
            );
        }
    }

    #[test]
    fn zero_velocity_is_not_clamped() {
        let mut physics = weightless_world();
        let mut entity =
            Entity::circle(&mut physics, Vec2::ZERO, 0.5, &steering_config(5.0, 1.0))
                .expect("entity");
        entity.update(&mut physics);
        assert_eq!(entity.velocity(), Vec2::ZERO);
    }

    #[test]
    fn seek_turns_velocity_toward_target() {
        let mut physics = weightless_world();
        let mut entity =
            Entity::circle(&mut physics, Vec2::ZERO, 0.5, &steering_config(5.0, 1.0))
                .expect("entity");
        entity.set_velocity(&mut physics, Vec2::new(0.0, 3.0));
        let target = Vec2::new(10.0, 0.0);
        let before = cosine(entity.velocity(), target - entity.position());

        entity.seek(target);
        entity.update(&mut physics);

        let after = cosine(entity.velocity(), target - entity.position());
        assert!(after > before, "before={before} after={after}");
    }

    #[test]
    fn steering_force_is_limited_by_max_force() {
        let mut physics = weightless_world();
        let mut entity =
            Entity::circle(&mut physics, Vec2::ZERO, 0.5, &steering_config(5.0, 0.25))
                .expect("entity");
        entity.seek(Vec2::new(0.0, 50.0));
        assert!((entity.acceleration().length() - 0.25).abs() < 1e-5);
    }

    #[test]
    fn flee_desired_velocity_negates_seek() {
        let mut physics = weightless_world();
        let entity = Entity::circle(
            &mut physics,
            Vec2::new(2.0, -1.0),
            0.5,
            &steering_config(3.0, 1.0),
        )
        .expect("entity");
        let target = Vec2::new(-4.0, 6.0);
        assert_eq!(entity.flee_velocity(target), -entity.seek_velocity(target));
    }

    #[test]
    fn flee_pushes_away_from_target() {
        let mut physics = weightless_world();
        let mut entity =
            Entity::circle(&mut physics, Vec2::ZERO, 0.5, &steering_config(5.0, 1.0))
                .expect("entity");
        entity.flee(Vec2::new(10.0, 0.0));
        entity.update(&mut physics);
        assert!(entity.velocity().x < 0.0);
    }

    #[test]
    fn seek_from_rest_moves_toward_target_within_speed_limit() {
        let mut physics = weightless_world();
        let config = EntityConfig {
            mass: 1.0,
            max_speed: Some(5.0),
            ..EntityConfig::default()
        };
        let mut entity = Entity::circle(&mut physics, Vec2::ZERO, 0.5, &config).expect("entity");
        entity.seek(Vec2::new(100.0, 0.0));
        entity.update(&mut physics);
        assert!(entity.velocity().x > 0.0);
        assert!(entity.velocity().length() <= 5.0 + 1e-5);
    }

    #[test]
    fn unbounded_entity_steers_with_finite_state() {
        let mut physics = PhysicsWorld::default();
        let mut entity = Entity::circle(&mut physics, Vec2::ZERO, 0.5, &EntityConfig::default())
            .expect("entity");
        let handle = entity.body_handle().expect("handle");
        for target in [Vec2::new(100.0, 0.0), Vec2::new(0.0, -30.0), Vec2::new(-4.0, 9.0)] {
            entity.seek(target);
            assert!(entity.acceleration().is_finite(), "{:?}", entity.acceleration());
            entity.update(&mut physics);
            physics.step();
            entity.flee(target);
            entity.update(&mut physics);
            physics.step();

            let state = physics.body_state(handle).expect("state");
            assert!(state.position.is_finite(), "{state:?}");
            assert!(state.velocity.is_finite(), "{state:?}");
        }
        assert!(entity.position().is_finite());
        assert!(entity.velocity().is_finite());
    }

    #[test]
    fn unbounded_seek_desires_the_full_offset() {
        let mut physics = weightless_world();
        let entity = Entity::circle(
            &mut physics,
            Vec2::new(1.0, 1.0),
            0.5,
            &EntityConfig::default(),
        )
        .expect("entity");
        assert_eq!(entity.seek_velocity(Vec2::new(4.0, 1.0)), Vec2::new(3.0, 0.0));
        assert_eq!(entity.flee_velocity(Vec2::new(4.0, 1.0)), Vec2::new(-3.0, 0.0));
        assert_eq!(entity.seek_velocity(Vec2::new(1.0, 1.0)), Vec2::ZERO);
    }

    #[test]
    fn static_entity_mirrors_its_body_and_drops_acceleration() {
        let mut physics = weightless_world();
        let config = EntityConfig {
            is_static: true,
            ..EntityConfig::default()
        };
        let mut entity =
            Entity::rectangle(&mut physics, Vec2::ZERO, 4.0, 1.0, &config).expect("entity");
        entity.apply_force(Vec2::new(5.0, 2.0));
        entity.update(&mut physics);

        let state = physics
            .body_state(entity.body_handle().expect("handle"))
            .expect("state");
        assert_eq!(entity.velocity(), state.velocity);
        assert_eq!(entity.velocity(), Vec2::ZERO);
        assert_eq!(entity.acceleration(), Vec2::ZERO);
    }

    #[test]
    fn destroy_is_idempotent_and_freezes_update() {
        let mut physics = weightless_world();
        let mut entity = Entity::polygon(&mut physics, Vec2::ZERO, 5, 1.0, &EntityConfig::default())
            .expect("entity");
        assert_eq!(physics.body_count(), 1);

        entity.destroy(&mut physics);
        entity.destroy(&mut physics);
        assert!(entity.is_destroyed());
        assert_eq!(physics.body_count(), 0);

        entity.apply_force(Vec2::new(1.0, 0.0));
        entity.update(&mut physics);
        assert_eq!(entity.velocity(), Vec2::ZERO);
    }

    #[test]
    fn setters_without_body_only_touch_mirrored_fields() {
        let mut physics = weightless_world();
        let mut entity = Entity::circle(&mut physics, Vec2::ZERO, 1.0, &EntityConfig::default())
            .expect("entity");
        entity.destroy(&mut physics);
        entity.set_position(&mut physics, Vec2::new(1.0, 2.0));
        entity.set_angle(&mut physics, 0.3);
        assert_eq!(entity.position(), Vec2::new(1.0, 2.0));
        assert_eq!(entity.angle(), 0.3);
    }

    #[test]
    fn invalid_config_creates_no_body() {
        let mut physics = weightless_world();
        let config = EntityConfig {
            mass: 0.0,
            ..EntityConfig::default()
        };
        let err = Entity::circle(&mut physics, Vec2::ZERO, 1.0, &config).expect_err("zero mass");
        assert_eq!(
            err,
            EntityError::InvalidParameter {
                parameter: "mass",
                value: 0.0
            }
        );

        let config = EntityConfig {
            max_speed: Some(-1.0),
            ..EntityConfig::default()
        };
        assert!(Entity::circle(&mut physics, Vec2::ZERO, 1.0, &config).is_err());
        assert!(Entity::rectangle(&mut physics, Vec2::ZERO, 0.0, 1.0, &EntityConfig::default()).is_err());
        assert_eq!(physics.body_count(), 0);
    }

    #[test]
    fn triangle_from_vertices_creates_body() {
        let mut physics = weightless_world();
        let vertices = [Vec2::new(0.0, 0.0), Vec2::new(2.0, 0.0), Vec2::new(0.0, 1.0)];
        let entity = Entity::triangle(&mut physics, Vec2::new(1.0, 1.0), &vertices, &EntityConfig::default())
            .expect("triangle");
        assert_eq!(entity.shape(), &BodyShape::Vertices(vertices.to_vec()));
        assert_eq!(physics.body_count(), 1);
    }

    #[test]
    fn sprite_name_becomes_unit_scale_texture() {
        let mut physics = weightless_world();
        let config = EntityConfig {
            sprite_name: Some("crate".to_string()),
            ..EntityConfig::default()
        };
        let mut entity = Entity::circle(&mut physics, Vec2::ZERO, 1.0, &config).expect("entity");
        assert_eq!(entity.texture(), Some(&TextureRef::new("crate")));

        entity.set_texture(TextureRef::new("ball").with_scale(2.0, 0.5));
        assert_eq!(entity.texture().map(|t| t.x_scale), Some(2.0));
        entity.clear_texture();
        assert!(entity.texture().is_none());
    }

    #[test]
    fn config_rejects_unknown_keys() {
        let err = serde_json::from_str::<EntityConfig>(r#"{"mass": 2.0, "maxSpeed": 4.0}"#)
            .expect_err("unknown key");
        assert!(err.to_string().contains("maxSpeed"), "{err}");

        let parsed = serde_json::from_str::<EntityConfig>(
            r#"{"is_static": true, "max_speed": 4.0, "sprite_name": "box"}"#,
        )
        .expect("config");
        assert!(parsed.is_static);
        assert_eq!(parsed.max_speed, Some(4.0));
        assert_eq!(parsed.mass, 1.0);
        assert_eq!(parsed.max_force, None);
    }
}
