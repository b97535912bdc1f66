#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Reconflow workspace.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters submit [`Command`] values
//! describing desired mutations, the world executes those commands via its
//! `apply` entry point, and then broadcasts [`Event`] values for systems to
//! react to deterministically. Systems read immutable views such as
//! [`TerrainView`] and [`EntityView`] and respond exclusively with new command
//! batches.

use std::{
    collections::BTreeMap,
    iter::Sum,
    ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign},
};

use glam::DVec2;
use serde::{Deserialize, Serialize};

/// Number of simulation frames that elapse during one second of game time.
pub const FRAMES_PER_SECOND: u64 = 16;

/// Vectors shorter than this are treated as having no direction.
const DIRECTION_EPSILON: f64 = 1e-9;

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Advances the simulation clock by a single frame.
    Tick,
    /// Requests that a new entity be placed into the world.
    SpawnEntity {
        /// Description of the entity to create.
        spec: EntitySpec,
    },
    /// Requests that an agent travel toward the provided position.
    MoveAgent {
        /// Identifier of the agent being ordered.
        agent: EntityId,
        /// Destination expressed in tile units.
        position: Vector2,
    },
    /// Requests that an agent stop and keep its current position.
    HoldPosition {
        /// Identifier of the agent being ordered.
        agent: EntityId,
    },
    /// Requests removal of an entity from the world.
    RemoveEntity {
        /// Identifier of the entity targeted for removal.
        entity: EntityId,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Frame counter after the advance.
        frame: u64,
    },
    /// Confirms that an entity was created.
    EntitySpawned {
        /// Identifier assigned to the new entity.
        entity: EntityId,
        /// Position the entity occupies after spawning.
        position: Vector2,
    },
    /// Confirms that an agent accepted a new destination.
    DestinationAssigned {
        /// Identifier of the agent.
        entity: EntityId,
        /// Destination the agent will travel toward.
        position: Vector2,
    },
    /// Confirms that an entity moved during a tick.
    EntityMoved {
        /// Identifier of the entity that moved.
        entity: EntityId,
        /// Position before the move.
        from: Vector2,
        /// Position after the move.
        to: Vector2,
    },
    /// Confirms that an agent dropped its destination.
    EntityHeld {
        /// Identifier of the agent holding position.
        entity: EntityId,
    },
    /// Reports that an entity could not advance because the next tile is blocked.
    MoveBlocked {
        /// Identifier of the entity that stopped.
        entity: EntityId,
        /// Position the entity attempted to enter.
        position: Vector2,
    },
    /// Confirms that an entity left the world.
    EntityRemoved {
        /// Identifier of the removed entity.
        entity: EntityId,
    },
    /// Reports that a command referenced an entity the world does not know.
    UnknownEntity {
        /// Identifier supplied by the rejected command.
        entity: EntityId,
    },
}

/// Integer grid coordinate identifying a single terrain tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tile {
    x: i32,
    y: i32,
}

impl Tile {
    /// Creates a new tile coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Column of the tile.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Row of the tile.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Returns the tile displaced by the provided offsets.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }

    /// Resolves the tile that owns the provided position.
    ///
    /// Tile `(x, y)` owns the unit square centred on its integer coordinates.
    #[must_use]
    pub fn from_position(position: Vector2) -> Self {
        Self::new(position.x().round() as i32, position.y().round() as i32)
    }

    /// Position of the tile expressed in tile units.
    #[must_use]
    pub fn position(self) -> Vector2 {
        Vector2::new(f64::from(self.x), f64::from(self.y))
    }

    /// Computes the Chebyshev (king-move) distance between two tiles.
    #[must_use]
    pub fn chebyshev_distance(self, other: Tile) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    /// Computes the squared Euclidean distance between two tiles.
    #[must_use]
    pub fn square_distance(self, other: Tile) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dy = i64::from(self.y) - i64::from(other.y);
        dx * dx + dy * dy
    }

    /// Computes the Euclidean distance between two tiles.
    #[must_use]
    pub fn distance(self, other: Tile) -> f64 {
        (self.square_distance(other) as f64).sqrt()
    }

    /// Iterates the tiles lying exactly `radius` Chebyshev steps away.
    ///
    /// Offsets are yielded column by column, top to bottom, so the order is
    /// stable for every caller. A radius of zero yields the tile itself.
    pub fn ring(self, radius: u32) -> impl Iterator<Item = Tile> {
        let r = radius.min(i32::MAX as u32) as i32;
        (-r..=r).flat_map(move |dx| {
            let step = if r == 0 || dx.abs() == r { 1 } else { 2 * r };
            (-r..=r)
                .step_by(step as usize)
                .map(move |dy| self.offset(dx, dy))
        })
    }

    /// Iterates the four edge-sharing neighbours of the tile.
    pub fn neighbours4(self) -> impl Iterator<Item = Tile> {
        [(0, -1), (-1, 0), (1, 0), (0, 1)]
            .into_iter()
            .map(move |(dx, dy)| self.offset(dx, dy))
    }
}

/// Two dimensional floating point vector used for positions and field values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector2(DVec2);

impl Vector2 {
    /// Vector with both components set to zero.
    pub const ZERO: Self = Self(DVec2::ZERO);

    /// Creates a new vector from its components.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self(DVec2::new(x, y))
    }

    /// Horizontal component.
    #[must_use]
    pub fn x(&self) -> f64 {
        self.0.x
    }

    /// Vertical component.
    #[must_use]
    pub fn y(&self) -> f64 {
        self.0.y
    }

    /// Euclidean length of the vector.
    #[must_use]
    pub fn length(self) -> f64 {
        self.0.length()
    }

    /// Squared Euclidean length of the vector.
    #[must_use]
    pub fn length_squared(self) -> f64 {
        self.0.length_squared()
    }

    /// Distance between two points.
    #[must_use]
    pub fn distance(self, other: Vector2) -> f64 {
        self.0.distance(other.0)
    }

    /// Squared distance between two points.
    #[must_use]
    pub fn square_distance(self, other: Vector2) -> f64 {
        self.0.distance_squared(other.0)
    }

    /// Dot product.
    #[must_use]
    pub fn dot(self, other: Vector2) -> f64 {
        self.0.dot(other.0)
    }

    /// Scalar cross product `x1 * y2 - y1 * x2`.
    #[must_use]
    pub fn cross(self, other: Vector2) -> f64 {
        self.0.perp_dot(other.0)
    }

    /// Cosine of the angle between two vectors, zero when either has no length.
    #[must_use]
    pub fn cos(self, other: Vector2) -> f64 {
        match self.length() * other.length() {
            norm if norm > DIRECTION_EPSILON => self.dot(other) / norm,
            _ => 0.0,
        }
    }

    /// Sine of the signed angle between two vectors, zero when either has no length.
    #[must_use]
    pub fn sin(self, other: Vector2) -> f64 {
        match self.length() * other.length() {
            norm if norm > DIRECTION_EPSILON => self.cross(other) / norm,
            _ => 0.0,
        }
    }

    /// Unit vector pointing in the same direction, if the vector has a direction.
    #[must_use]
    pub fn normalized(self) -> Option<Vector2> {
        let length = self.length();
        (length > DIRECTION_EPSILON && length.is_finite()).then(|| self / length)
    }

    /// Reports whether the vector is too short to carry a direction.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.length() <= DIRECTION_EPSILON
    }

    /// Reports whether both components are finite.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }
}

impl Add for Vector2 {
    type Output = Vector2;

    fn add(self, rhs: Vector2) -> Vector2 {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Vector2 {
    fn add_assign(&mut self, rhs: Vector2) {
        self.0 += rhs.0;
    }
}

impl Sub for Vector2 {
    type Output = Vector2;

    fn sub(self, rhs: Vector2) -> Vector2 {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Vector2 {
    fn sub_assign(&mut self, rhs: Vector2) {
        self.0 -= rhs.0;
    }
}

impl Mul<f64> for Vector2 {
    type Output = Vector2;

    fn mul(self, rhs: f64) -> Vector2 {
        Self(self.0 * rhs)
    }
}

impl Div<f64> for Vector2 {
    type Output = Vector2;

    fn div(self, rhs: f64) -> Vector2 {
        Self(self.0 / rhs)
    }
}

impl Neg for Vector2 {
    type Output = Vector2;

    fn neg(self) -> Vector2 {
        Self(-self.0)
    }
}

impl Sum for Vector2 {
    fn sum<I: Iterator<Item = Vector2>>(iter: I) -> Self {
        iter.fold(Vector2::ZERO, Add::add)
    }
}

/// Unique identifier assigned to a region at level start.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionId(u32);

impl RegionId {
    /// Creates a new region identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a chokepoint at level start.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChokepointId(u32);

impl ChokepointId {
    /// Creates a new chokepoint identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to an entity by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u32);

impl EntityId {
    /// Creates a new entity identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Identifier of a static unit type described by a [`UnitTypeTable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitTypeId(u32);

impl UnitTypeId {
    /// Creates a new unit type identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Navigation target that either names a coordinate or refers to another object.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Waypoint {
    /// Fixed position expressed in tile units.
    Coordinate(Vector2),
    /// Centre of the referenced region.
    Region(RegionId),
    /// Current position of the referenced entity.
    Entity(EntityId),
}

/// Lifecycle status reported to the task scheduler after each invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    /// The task requires further steps.
    NotDone,
    /// The task completed successfully.
    Done,
    /// The task cannot continue.
    Fail,
}

/// Side an entity fights for, relative to the scouting player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Allegiance {
    /// Entities controlled by the scouting player.
    Own,
    /// Entities controlled by the opponent.
    Hostile,
    /// Entities controlled by nobody, such as resources.
    Neutral,
}

/// Static description of a unit type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitTraits {
    /// Human readable name used in logs.
    pub name: String,
    /// Whether the type is a structure.
    pub is_building: bool,
    /// Whether the type fights.
    pub is_combat_unit: bool,
    /// Whether the type gathers resources.
    pub is_worker: bool,
    /// Whether the type is an indestructible resource obstacle.
    pub is_resource: bool,
    /// Whether the type is a structure that still counts as a threat when armed.
    pub is_defensive_structure: bool,
    /// Whether the type can attack at all.
    pub can_attack: bool,
    /// Attack range in tiles.
    pub attack_range: f64,
    /// Sight range in tiles.
    pub sight_range: f64,
    /// Distance travelled per frame in tiles.
    pub speed: f64,
    /// Collision radius in tiles.
    pub radius: f64,
}

impl Default for UnitTraits {
    fn default() -> Self {
        Self {
            name: String::from("unit"),
            is_building: false,
            is_combat_unit: false,
            is_worker: false,
            is_resource: false,
            is_defensive_structure: false,
            can_attack: false,
            attack_range: 0.0,
            sight_range: 8.0,
            speed: 0.25,
            radius: 0.5,
        }
    }
}

/// Read-only table of static unit type data.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnitTypeTable {
    entries: BTreeMap<UnitTypeId, UnitTraits>,
}

impl UnitTypeTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from `(id, traits)` pairs; later duplicates win.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = (UnitTypeId, UnitTraits)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Returns the table extended with the provided entry.
    #[must_use]
    pub fn with(mut self, id: UnitTypeId, traits: UnitTraits) -> Self {
        let _ = self.entries.insert(id, traits);
        self
    }

    /// Looks up the traits registered for a unit type.
    #[must_use]
    pub fn traits(&self, id: UnitTypeId) -> Option<&UnitTraits> {
        self.entries.get(&id)
    }

    /// Iterator over all registered unit types in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (UnitTypeId, &UnitTraits)> {
        self.entries.iter().map(|(id, traits)| (*id, traits))
    }

    /// Number of registered unit types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reports whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Description of an entity requested through [`Command::SpawnEntity`].
#[derive(Clone, Debug, PartialEq)]
pub struct EntitySpec {
    /// Static type of the entity.
    pub unit_type: UnitTypeId,
    /// Side the entity belongs to.
    pub allegiance: Allegiance,
    /// Initial position in tile units.
    pub position: Vector2,
    /// Entity currently targeted by the new entity, if any.
    pub target: Option<EntityId>,
    /// Whether the entity flies over terrain.
    pub is_flying: bool,
    /// Whether the entity is burrowed.
    pub is_burrowed: bool,
    /// Whether the entity is a structure still under construction.
    pub under_construction: bool,
}

impl EntitySpec {
    /// Creates a grounded, idle entity description.
    #[must_use]
    pub const fn new(unit_type: UnitTypeId, allegiance: Allegiance, position: Vector2) -> Self {
        Self {
            unit_type,
            allegiance,
            position,
            target: None,
            is_flying: false,
            is_burrowed: false,
            under_construction: false,
        }
    }

    /// Returns the description with the provided attack target.
    #[must_use]
    pub fn targeting(mut self, target: EntityId) -> Self {
        self.target = Some(target);
        self
    }
}

/// Immutable representation of a single entity's state used for queries.
#[derive(Clone, Debug, PartialEq)]
pub struct EntitySnapshot {
    /// Unique identifier assigned to the entity.
    pub id: EntityId,
    /// Static type of the entity.
    pub unit_type: UnitTypeId,
    /// Side the entity belongs to.
    pub allegiance: Allegiance,
    /// Current position in tile units.
    pub position: Vector2,
    /// Collision radius in tiles.
    pub radius: f64,
    /// Entity currently targeted, if any.
    pub target: Option<EntityId>,
    /// Whether the entity flies over terrain.
    pub is_flying: bool,
    /// Whether the entity is burrowed.
    pub is_burrowed: bool,
    /// Whether the entity is a structure still under construction.
    pub under_construction: bool,
}

impl EntitySnapshot {
    /// Tile currently occupied by the entity.
    #[must_use]
    pub fn tile(&self) -> Tile {
        Tile::from_position(self.position)
    }
}

/// Read-only snapshot describing all entities within the world.
#[derive(Clone, Debug, Default)]
pub struct EntityView {
    snapshots: Vec<EntitySnapshot>,
}

impl EntityView {
    /// Creates a new entity view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<EntitySnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &EntitySnapshot> {
        self.snapshots.iter()
    }

    /// Looks up a single entity.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&EntitySnapshot> {
        self.snapshots
            .binary_search_by_key(&id, |snapshot| snapshot.id)
            .ok()
            .and_then(|index| self.snapshots.get(index))
    }

    /// Hostile entities whose tile lies within `radius` Chebyshev steps of `tile`.
    pub fn hostiles_near(&self, tile: Tile, radius: u32) -> impl Iterator<Item = &EntitySnapshot> {
        self.snapshots.iter().filter(move |snapshot| {
            snapshot.allegiance == Allegiance::Hostile
                && snapshot.tile().chebyshev_distance(tile) <= radius
        })
    }

    /// Entities that do not belong to any player.
    pub fn neutrals(&self) -> impl Iterator<Item = &EntitySnapshot> {
        self.snapshots
            .iter()
            .filter(|snapshot| snapshot.allegiance == Allegiance::Neutral)
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<EntitySnapshot> {
        self.snapshots
    }
}

/// Read-only view into the dense walkability grid.
#[derive(Clone, Copy, Debug)]
pub struct TerrainView<'a> {
    cells: &'a [bool],
    width: u32,
    height: u32,
}

impl<'a> TerrainView<'a> {
    /// Captures a new terrain view backed by the provided row-major cell slice.
    #[must_use]
    pub fn new(cells: &'a [bool], width: u32, height: u32) -> Self {
        Self {
            cells,
            width,
            height,
        }
    }

    /// Dimensions of the grid as `(width, height)`.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Length of the grid diagonal rounded up to whole tiles.
    #[must_use]
    pub fn diagonal(&self) -> u32 {
        let width = f64::from(self.width);
        let height = f64::from(self.height);
        (width * width + height * height).sqrt().ceil() as u32
    }

    /// Reports whether the tile lies inside the grid.
    #[must_use]
    pub fn is_valid_tile(&self, tile: Tile) -> bool {
        self.index(tile).is_some()
    }

    /// Reports whether the tile lies inside the grid and can be traversed.
    #[must_use]
    pub fn is_walkable(&self, tile: Tile) -> bool {
        self.index(tile)
            .and_then(|index| self.cells.get(index).copied())
            .unwrap_or(false)
    }

    /// Reports whether the tile lies inside the grid and cannot be traversed.
    #[must_use]
    pub fn is_blocked(&self, tile: Tile) -> bool {
        self.is_valid_tile(tile) && !self.is_walkable(tile)
    }

    /// Reports whether any of the eight surrounding tiles is blocked.
    #[must_use]
    pub fn is_wall_adjacent(&self, tile: Tile) -> bool {
        tile.ring(1).any(|neighbour| self.is_blocked(neighbour))
    }

    /// Iterates every tile of the grid in row-major order.
    pub fn tiles(&self) -> impl Iterator<Item = Tile> + 'a {
        let (width, height) = (self.width, self.height);
        (0..height).flat_map(move |y| (0..width).map(move |x| Tile::new(x as i32, y as i32)))
    }

    /// Iterates every walkable tile of the grid in row-major order.
    pub fn walkable_tiles(&self) -> impl Iterator<Item = Tile> + 'a {
        let view = *self;
        self.tiles().filter(move |tile| view.is_walkable(*tile))
    }

    fn index(&self, tile: Tile) -> Option<usize> {
        let x = u32::try_from(tile.x()).ok()?;
        let y = u32::try_from(tile.y()).ok()?;
        if x >= self.width || y >= self.height {
            return None;
        }

        let row = usize::try_from(y)
            .ok()?
            .checked_mul(usize::try_from(self.width).ok()?)?;
        let index = row.checked_add(usize::try_from(x).ok()?)?;
        (index < self.cells.len()).then_some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_of_radius_zero_is_the_tile_itself() {
        let tile = Tile::new(4, 7);
        assert_eq!(tile.ring(0).collect::<Vec<_>>(), vec![tile]);
    }

    #[test]
    fn ring_visits_every_tile_at_exact_chebyshev_distance_once() {
        let origin = Tile::new(0, 0);
        for radius in 1..5 {
            let ring: Vec<Tile> = origin.ring(radius).collect();
            assert_eq!(ring.len(), (8 * radius) as usize);
            assert!(ring
                .iter()
                .all(|tile| tile.chebyshev_distance(origin) == radius));
            let mut deduplicated = ring.clone();
            deduplicated.sort();
            deduplicated.dedup();
            assert_eq!(deduplicated.len(), ring.len(), "ring {radius} repeated a tile");
        }
    }

    #[test]
    fn ring_order_is_column_major() {
        let ring: Vec<Tile> = Tile::new(0, 0).ring(1).collect();
        assert_eq!(
            ring,
            vec![
                Tile::new(-1, -1),
                Tile::new(-1, 0),
                Tile::new(-1, 1),
                Tile::new(0, -1),
                Tile::new(0, 1),
                Tile::new(1, -1),
                Tile::new(1, 0),
                Tile::new(1, 1),
            ]
        );
    }

    #[test]
    fn from_position_rounds_to_nearest_tile() {
        assert_eq!(Tile::from_position(Vector2::new(2.4, 3.6)), Tile::new(2, 4));
        assert_eq!(Tile::from_position(Vector2::new(-0.4, 0.0)), Tile::new(0, 0));
    }

    #[test]
    fn angle_helpers_guard_zero_vectors() {
        let unit = Vector2::new(1.0, 0.0);
        assert_eq!(unit.cos(Vector2::ZERO), 0.0);
        assert_eq!(Vector2::ZERO.sin(unit), 0.0);
        assert!(Vector2::ZERO.normalized().is_none());
    }

    #[test]
    fn angle_helpers_follow_cross_product_sign() {
        let east = Vector2::new(1.0, 0.0);
        let north = Vector2::new(0.0, 1.0);
        assert!((east.cos(north)).abs() < 1e-12);
        assert!((east.sin(north) - 1.0).abs() < 1e-12);
        assert!((north.sin(east) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn terrain_view_treats_outside_tiles_as_invalid_not_blocked() {
        let cells = [true, false, true, true];
        let view = TerrainView::new(&cells, 2, 2);
        assert!(view.is_blocked(Tile::new(1, 0)));
        assert!(!view.is_blocked(Tile::new(-1, 0)));
        assert!(!view.is_walkable(Tile::new(2, 0)));
        assert!(view.is_wall_adjacent(Tile::new(0, 1)));
        assert_eq!(view.walkable_tiles().count(), 3);
    }

    #[test]
    fn entity_view_orders_snapshots_by_identifier() {
        let snapshot = |id| EntitySnapshot {
            id: EntityId::new(id),
            unit_type: UnitTypeId::new(1),
            allegiance: Allegiance::Hostile,
            position: Vector2::new(f64::from(id), 0.0),
            radius: 0.5,
            target: None,
            is_flying: false,
            is_burrowed: false,
            under_construction: false,
        };
        let view = EntityView::from_snapshots(vec![snapshot(3), snapshot(1), snapshot(2)]);
        let ids: Vec<u32> = view.iter().map(|entity| entity.id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(
            view.get(EntityId::new(2)).map(|entity| entity.position),
            Some(Vector2::new(2.0, 0.0))
        );
        assert_eq!(view.hostiles_near(Tile::new(0, 0), 2).count(), 2);
    }

    #[test]
    fn tile_and_traits_survive_bincode() {
        let tile = Tile::new(-3, 12);
        let bytes = bincode::serialize(&tile).expect("tile should serialise");
        let decoded: Tile = bincode::deserialize(&bytes).expect("tile should deserialise");
        assert_eq!(decoded, tile);

        let traits = UnitTraits {
            name: String::from("zealot"),
            is_combat_unit: true,
            can_attack: true,
            attack_range: 1.0,
            ..UnitTraits::default()
        };
        let bytes = bincode::serialize(&traits).expect("traits should serialise");
        let decoded: UnitTraits = bincode::deserialize(&bytes).expect("traits should deserialise");
        assert_eq!(decoded, traits);
    }
}
