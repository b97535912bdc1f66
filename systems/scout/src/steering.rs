use reconflow_core::{Command, EntityId, EntityView, TerrainView, Tile, Vector2, Waypoint};
use reconflow_world::RegionIndex;

/// Resolves a waypoint to a coordinate.
///
/// Regions resolve to their centre and entities to their current position;
/// unknown references yield `None`.
#[must_use]
pub fn resolve_waypoint(
    waypoint: Waypoint,
    regions: &RegionIndex,
    entities: &EntityView,
) -> Option<Vector2> {
    match waypoint {
        Waypoint::Coordinate(position) => Some(position),
        Waypoint::Region(id) => regions.region(id).map(|region| region.center()),
        Waypoint::Entity(id) => entities.get(id).map(|entity| entity.position),
    }
}

/// Limits applied when turning a field vector into a destination.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Probe {
    pub(crate) step_distance: f64,
    pub(crate) limit: u32,
}

/// Turns a field vector into the command moving `agent` from `position`.
///
/// A zero field sends the agent straight to `objective`. Otherwise the
/// destination lies `step_distance` tiles along the field; when it is not
/// walkable it is pushed further along the field one tile at a time, and the
/// agent holds position when the probe leaves the grid or runs out of steps.
pub(crate) fn field_command(
    agent: EntityId,
    position: Vector2,
    field: Vector2,
    objective: Vector2,
    terrain: TerrainView<'_>,
    probe: Probe,
) -> Command {
    let Some(direction) = field.normalized() else {
        return Command::MoveAgent {
            agent,
            position: objective,
        };
    };

    let mut candidate = position + direction * probe.step_distance;
    for _ in 0..=probe.limit {
        let tile = Tile::from_position(candidate);
        if !terrain.is_valid_tile(tile) {
            break;
        }
        if terrain.is_walkable(tile) {
            return Command::MoveAgent {
                agent,
                position: candidate,
            };
        }
        candidate += direction;
    }

    Command::HoldPosition { agent }
}
