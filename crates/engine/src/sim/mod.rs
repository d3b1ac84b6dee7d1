mod entity;
mod physics;
mod vec2;
mod world;

pub use entity::{Entity, EntityConfig, EntityError, TextureRef, DEFAULT_FRICTION};
pub use physics::{
    regular_polygon_vertices, BodyParams, BodyShape, BodyState, PhysicsConfig, PhysicsWorld,
    ShapeError, DEFAULT_GRAVITY, DEFAULT_TIMESTEP_SECONDS,
};
pub use vec2::{degrees_to_radians, radians_to_degrees, Vec2};
pub use world::{EntityId, EntityIdAllocator, Simulation};
