use tracing::{debug, info};

use super::entity::{Entity, EntityConfig, EntityError};
use super::physics::{PhysicsConfig, PhysicsWorld};
use super::vec2::degrees_to_radians;
use super::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// Live entities over one physics context, updated in creation order each tick.
pub struct Simulation {
    physics: PhysicsWorld,
    allocator: EntityIdAllocator,
    entities: Vec<(EntityId, Entity)>,
    paused: bool,
    tick_count: u64,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(PhysicsConfig::default())
    }
}

impl Simulation {
    pub fn new(config: PhysicsConfig) -> Self {
        Self {
            physics: PhysicsWorld::new(config),
            allocator: EntityIdAllocator::default(),
            entities: Vec::new(),
            paused: false,
            tick_count: 0,
        }
    }

    pub fn create_rectangle(
        &mut self,
        position: Vec2,
        width: f32,
        height: f32,
        config: &EntityConfig,
    ) -> Result<EntityId, EntityError> {
        let entity = Entity::rectangle(&mut self.physics, position, width, height, config)?;
        Ok(self.register(entity))
    }

    pub fn create_circle(
        &mut self,
        position: Vec2,
        radius: f32,
        config: &EntityConfig,
    ) -> Result<EntityId, EntityError> {
        let entity = Entity::circle(&mut self.physics, position, radius, config)?;
        Ok(self.register(entity))
    }

    pub fn create_polygon(
        &mut self,
        position: Vec2,
        sides: u32,
        radius: f32,
        config: &EntityConfig,
    ) -> Result<EntityId, EntityError> {
        let entity = Entity::polygon(&mut self.physics, position, sides, radius, config)?;
        Ok(self.register(entity))
    }

    pub fn create_triangle(
        &mut self,
        position: Vec2,
        vertices: &[Vec2],
        config: &EntityConfig,
    ) -> Result<EntityId, EntityError> {
        let entity = Entity::triangle(&mut self.physics, position, vertices, config)?;
        Ok(self.register(entity))
    }

    /// Right triangle with its right angle at `position`, rising `height` units with
    /// the hypotenuse inclined `angle_degrees` from the ground.
    pub fn create_slope(
        &mut self,
        position: Vec2,
        height: f32,
        angle_degrees: f32,
        config: &EntityConfig,
    ) -> Result<EntityId, EntityError> {
        let run = height / degrees_to_radians(angle_degrees).tan();
        let vertices = [Vec2::ZERO, Vec2::new(0.0, height), Vec2::new(run, 0.0)];
        self.create_triangle(position, &vertices, config)
    }

    fn register(&mut self, entity: Entity) -> EntityId {
        let id = self.allocator.allocate();
        debug!(
            entity_id = id.0,
            shape = entity.shape().kind_name(),
            "entity_created"
        );
        self.entities.push((id, entity));
        id
    }

    pub fn remove(&mut self, id: EntityId) -> bool {
        let Some(index) = self.entities.iter().position(|(entity_id, _)| *entity_id == id) else {
            return false;
        };
        let (_, mut entity) = self.entities.remove(index);
        entity.destroy(&mut self.physics);
        true
    }

    pub fn clear(&mut self) {
        let removed = self.entities.len();
        for (_, entity) in &mut self.entities {
            entity.destroy(&mut self.physics);
        }
        self.entities.clear();
        self.physics.clear();
        info!(removed, "simulation_cleared");
    }

    /// Runs entity updates before the physics step, so each update sees the
    /// previous step's collision response.
    pub fn tick(&mut self) {
        if self.paused {
            return;
        }
        for (_, entity) in &mut self.entities {
            entity.update(&mut self.physics);
        }
        self.physics.step();
        self.tick_count = self.tick_count.saturating_add(1);
    }

    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            info!(tick = self.tick_count, "simulation_paused");
        }
    }

    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            info!(tick = self.tick_count, "simulation_resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter().map(|(id, entity)| (*id, entity))
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities
            .iter()
            .find(|(entity_id, _)| *entity_id == id)
            .map(|(_, entity)| entity)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities
            .iter_mut()
            .find(|(entity_id, _)| *entity_id == id)
            .map(|(_, entity)| entity)
    }

    /// Entity together with the physics context, for the setters that write through.
    pub fn entity_with_physics_mut(
        &mut self,
        id: EntityId,
    ) -> Option<(&mut Entity, &mut PhysicsWorld)> {
        let physics = &mut self.physics;
        self.entities
            .iter_mut()
            .find(|(entity_id, _)| *entity_id == id)
            .map(|(_, entity)| (entity, physics))
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }
}
