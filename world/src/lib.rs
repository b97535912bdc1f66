#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Reconflow.
//!
//! The world owns the level terrain and a small deterministic entity
//! simulation standing in for the game engine. The [`RegionIndex`] is the
//! immutable region and chokepoint store built once per level.

mod records;
mod regions;
mod terrain;

use reconflow_core::{
    Allegiance, Command, EntityId, EntitySnapshot, EntitySpec, Event, Tile, UnitTypeId,
    UnitTypeTable, Vector2,
};

pub use records::{ChokepointRecord, LevelRecords, RecordError, RegionRecord};
pub use regions::{
    Chokepoint, Region, RegionError, RegionIndex, RegionLookupError, REGION_SEARCH_RADIUS,
};
pub use terrain::{Terrain, TerrainParseError};

const DEFAULT_SPEED: f64 = 0.25;
const DEFAULT_RADIUS: f64 = 0.5;

/// Represents the authoritative Reconflow world state.
#[derive(Debug)]
pub struct World {
    terrain: Terrain,
    unit_types: UnitTypeTable,
    entities: Vec<Entity>,
    next_entity: u32,
    frame: u64,
}

impl World {
    /// Creates a world over the provided terrain with no entities.
    #[must_use]
    pub fn new(terrain: Terrain, unit_types: UnitTypeTable) -> Self {
        Self {
            terrain,
            unit_types,
            entities: Vec::new(),
            next_entity: 1,
            frame: 0,
        }
    }

    fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id == id)
    }

    fn spawn(&mut self, spec: EntitySpec) -> EntityId {
        let id = EntityId::new(self.next_entity);
        self.next_entity = self.next_entity.saturating_add(1);
        let (speed, radius) = self
            .unit_types
            .traits(spec.unit_type)
            .map_or((DEFAULT_SPEED, DEFAULT_RADIUS), |traits| {
                (traits.speed, traits.radius)
            });
        self.entities.push(Entity {
            id,
            unit_type: spec.unit_type,
            allegiance: spec.allegiance,
            position: spec.position,
            target: spec.target,
            is_flying: spec.is_flying,
            is_burrowed: spec.is_burrowed,
            under_construction: spec.under_construction,
            speed,
            radius,
            destination: None,
        });
        id
    }

    fn advance_entities(&mut self, out_events: &mut Vec<Event>) {
        let view = self.terrain.view();
        for entity in &mut self.entities {
            let Some(destination) = entity.destination else {
                continue;
            };

            let offset = destination - entity.position;
            let distance = offset.length();
            let next = match offset.normalized() {
                Some(direction) if distance > entity.speed => {
                    entity.position + direction * entity.speed
                }
                _ => destination,
            };

            if !entity.is_flying && !view.is_walkable(Tile::from_position(next)) {
                entity.destination = None;
                out_events.push(Event::MoveBlocked {
                    entity: entity.id,
                    position: next,
                });
                continue;
            }

            let from = entity.position;
            entity.position = next;
            if next == destination {
                entity.destination = None;
            }
            if from != next {
                out_events.push(Event::EntityMoved {
                    entity: entity.id,
                    from,
                    to: next,
                });
            }
        }
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Tick => {
            world.frame = world.frame.saturating_add(1);
            out_events.push(Event::TimeAdvanced { frame: world.frame });
            world.advance_entities(out_events);
        }
        Command::SpawnEntity { spec } => {
            let position = spec.position;
            let entity = world.spawn(spec);
            out_events.push(Event::EntitySpawned { entity, position });
        }
        Command::MoveAgent { agent, position } => match world.entity_mut(agent) {
            Some(entity) => {
                entity.destination = Some(position);
                out_events.push(Event::DestinationAssigned {
                    entity: agent,
                    position,
                });
            }
            None => out_events.push(Event::UnknownEntity { entity: agent }),
        },
        Command::HoldPosition { agent } => match world.entity_mut(agent) {
            Some(entity) => {
                entity.destination = None;
                out_events.push(Event::EntityHeld { entity: agent });
            }
            None => out_events.push(Event::UnknownEntity { entity: agent }),
        },
        Command::RemoveEntity { entity } => {
            match world.entities.iter().position(|candidate| candidate.id == entity) {
                Some(index) => {
                    let _ = world.entities.remove(index);
                    out_events.push(Event::EntityRemoved { entity });
                }
                None => out_events.push(Event::UnknownEntity { entity }),
            }
        }
    }
}

#[derive(Clone, Debug)]
struct Entity {
    id: EntityId,
    unit_type: UnitTypeId,
    allegiance: Allegiance,
    position: Vector2,
    target: Option<EntityId>,
    is_flying: bool,
    is_burrowed: bool,
    under_construction: bool,
    speed: f64,
    radius: f64,
    destination: Option<Vector2>,
}

impl Entity {
    fn snapshot(&self) -> EntitySnapshot {
        EntitySnapshot {
            id: self.id,
            unit_type: self.unit_type,
            allegiance: self.allegiance,
            position: self.position,
            radius: self.radius,
            target: self.target,
            is_flying: self.is_flying,
            is_burrowed: self.is_burrowed,
            under_construction: self.under_construction,
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use reconflow_core::{EntityId, EntitySnapshot, EntityView, TerrainView, UnitTypeTable, Vector2};

    use super::{Terrain, World};

    /// Provides read-only access to the level terrain.
    #[must_use]
    pub fn terrain(world: &World) -> &Terrain {
        &world.terrain
    }

    /// Captures a read-only view of the walkability grid.
    #[must_use]
    pub fn terrain_view(world: &World) -> TerrainView<'_> {
        world.terrain.view()
    }

    /// Captures a read-only view of every entity in the world.
    #[must_use]
    pub fn entity_view(world: &World) -> EntityView {
        EntityView::from_snapshots(world.entities.iter().map(super::Entity::snapshot).collect())
    }

    /// Captures the state of a single entity.
    #[must_use]
    pub fn entity(world: &World, id: EntityId) -> Option<EntitySnapshot> {
        world
            .entities
            .iter()
            .find(|entity| entity.id == id)
            .map(super::Entity::snapshot)
    }

    /// Destination the entity is currently travelling toward.
    #[must_use]
    pub fn destination(world: &World, id: EntityId) -> Option<Vector2> {
        world
            .entities
            .iter()
            .find(|entity| entity.id == id)
            .and_then(|entity| entity.destination)
    }

    /// Number of frames simulated so far.
    #[must_use]
    pub fn frame(world: &World) -> u64 {
        world.frame
    }

    /// Static unit type data the world was created with.
    #[must_use]
    pub fn unit_types(world: &World) -> &UnitTypeTable {
        &world.unit_types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconflow_core::UnitTraits;

    fn world() -> World {
        let terrain = Terrain::from_ascii(
            "\
.....
..#..
.....",
        )
        .expect("terrain parses");
        let unit_types = UnitTypeTable::new().with(
            UnitTypeId::new(1),
            UnitTraits {
                speed: 1.0,
                ..UnitTraits::default()
            },
        );
        World::new(terrain, unit_types)
    }

    fn spawn(world: &mut World, x: f64, y: f64) -> EntityId {
        let mut events = Vec::new();
        apply(
            world,
            Command::SpawnEntity {
                spec: EntitySpec::new(UnitTypeId::new(1), Allegiance::Own, Vector2::new(x, y)),
            },
            &mut events,
        );
        match events.as_slice() {
            [Event::EntitySpawned { entity, .. }] => *entity,
            other => panic!("unexpected spawn events: {other:?}"),
        }
    }

    #[test]
    fn tick_moves_entities_toward_destination_at_their_speed() {
        let mut world = world();
        let agent = spawn(&mut world, 0.0, 0.0);
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::MoveAgent {
                agent,
                position: Vector2::new(4.0, 0.0),
            },
            &mut events,
        );
        apply(&mut world, Command::Tick, &mut events);

        assert_eq!(
            events.last(),
            Some(&Event::EntityMoved {
                entity: agent,
                from: Vector2::new(0.0, 0.0),
                to: Vector2::new(1.0, 0.0),
            })
        );
        assert_eq!(query::frame(&world), 1);
    }

    #[test]
    fn blocked_tiles_stop_ground_entities() {
        let mut world = world();
        let agent = spawn(&mut world, 1.0, 1.0);
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::MoveAgent {
                agent,
                position: Vector2::new(3.0, 1.0),
            },
            &mut events,
        );
        events.clear();
        apply(&mut world, Command::Tick, &mut events);

        assert!(events.contains(&Event::MoveBlocked {
            entity: agent,
            position: Vector2::new(2.0, 1.0),
        }));
        assert_eq!(query::destination(&world, agent), None);
        let snapshot = query::entity(&world, agent).expect("agent exists");
        assert_eq!(snapshot.tile(), Tile::new(1, 1));
    }

    #[test]
    fn commands_for_unknown_entities_are_reported() {
        let mut world = world();
        let mut events = Vec::new();
        let ghost = EntityId::new(99);
        apply(&mut world, Command::HoldPosition { agent: ghost }, &mut events);
        apply(&mut world, Command::RemoveEntity { entity: ghost }, &mut events);
        assert_eq!(
            events,
            vec![
                Event::UnknownEntity { entity: ghost },
                Event::UnknownEntity { entity: ghost }
            ]
        );
    }

    #[test]
    fn entity_view_reflects_removals() {
        let mut world = world();
        let first = spawn(&mut world, 0.0, 0.0);
        let second = spawn(&mut world, 4.0, 2.0);
        let mut events = Vec::new();
        apply(&mut world, Command::RemoveEntity { entity: first }, &mut events);

        let ids: Vec<EntityId> = query::entity_view(&world).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![second]);
    }
}
