use std::collections::BTreeMap;

use reconflow_core::{EntityId, EntitySnapshot, RegionId, Waypoint};
use reconflow_system_potential_field::Heading;

/// Mutable progress of a single scout.
#[derive(Clone, Debug, Default)]
pub struct ScoutState {
    target_region: Option<RegionId>,
    heading: Heading,
    last_reversal_frame: Option<u64>,
    attract_points: Vec<Waypoint>,
    should_switch_to_expansion: bool,
    switch_complete: bool,
    frame_since_switch: u64,
    memory: HostileMemory,
}

impl ScoutState {
    /// Region the field currently circles.
    #[must_use]
    pub const fn target_region(&self) -> Option<RegionId> {
        self.target_region
    }

    /// Current circulation direction.
    #[must_use]
    pub const fn heading(&self) -> Heading {
        self.heading
    }

    /// Frame of the most recent heading reversal.
    #[must_use]
    pub const fn last_reversal_frame(&self) -> Option<u64> {
        self.last_reversal_frame
    }

    /// Waypoints currently attracting the scout.
    #[must_use]
    pub fn attract_points(&self) -> &[Waypoint] {
        &self.attract_points
    }

    /// Whether the scout is heading for the expansion instead of the main.
    #[must_use]
    pub const fn should_switch_to_expansion(&self) -> bool {
        self.should_switch_to_expansion
    }

    /// Whether the scout reached the waypoint of its active objective.
    #[must_use]
    pub const fn switch_complete(&self) -> bool {
        self.switch_complete
    }

    /// Frame at which the active objective was last reached.
    #[must_use]
    pub const fn frame_since_switch(&self) -> u64 {
        self.frame_since_switch
    }

    /// Hostiles remembered by the scout.
    #[must_use]
    pub fn memory(&self) -> &HostileMemory {
        &self.memory
    }

    pub(crate) fn memory_mut(&mut self) -> &mut HostileMemory {
        &mut self.memory
    }

    pub(crate) fn set_target_region(&mut self, region: Option<RegionId>) {
        self.target_region = region;
    }

    pub(crate) fn add_attract_point(&mut self, waypoint: Waypoint) {
        if !self.attract_points.contains(&waypoint) {
            self.attract_points.push(waypoint);
        }
    }

    pub(crate) fn remove_attract_point(&mut self, waypoint: Waypoint) {
        self.attract_points.retain(|point| *point != waypoint);
    }

    pub(crate) fn reverse(&mut self, frame: u64) {
        self.heading = self.heading.reversed();
        self.last_reversal_frame = Some(frame);
    }

    /// Marks the active objective as reached once.
    pub(crate) fn complete_switch(&mut self, waypoint: Option<Waypoint>, frame: u64) {
        if self.switch_complete {
            return;
        }
        if let Some(waypoint) = waypoint {
            self.remove_attract_point(waypoint);
        }
        self.switch_complete = true;
        self.frame_since_switch = frame;
    }

    pub(crate) fn switch_to_expansion(&mut self, region: RegionId, waypoint: Waypoint) {
        self.should_switch_to_expansion = true;
        self.switch_complete = false;
        self.target_region = Some(region);
        self.add_attract_point(waypoint);
    }

    pub(crate) fn revert_to_main(&mut self, region: Option<RegionId>, waypoint: Option<Waypoint>) {
        self.should_switch_to_expansion = false;
        self.switch_complete = false;
        self.target_region = region;
        if let Some(waypoint) = waypoint {
            self.add_attract_point(waypoint);
        }
    }
}

/// Last sighting of a hostile.
#[derive(Clone, Debug, PartialEq)]
pub struct Sighting {
    /// Snapshot taken when the hostile was last seen.
    pub snapshot: EntitySnapshot,
    /// Frame of the last sighting.
    pub last_seen: u64,
    /// Frames after which the sighting is forgotten.
    pub fade_after: u64,
}

/// Hostiles seen recently, forgotten after their fade time.
#[derive(Clone, Debug, Default)]
pub struct HostileMemory {
    sightings: BTreeMap<EntityId, Sighting>,
}

impl HostileMemory {
    /// Records or refreshes a sighting.
    pub fn record(&mut self, snapshot: EntitySnapshot, frame: u64, fade_after: u64) {
        let _ = self.sightings.insert(
            snapshot.id,
            Sighting {
                snapshot,
                last_seen: frame,
                fade_after,
            },
        );
    }

    /// Forgets sightings older than their fade time.
    pub fn fade(&mut self, frame: u64) {
        self.sightings
            .retain(|_, sighting| frame.saturating_sub(sighting.last_seen) <= sighting.fade_after);
    }

    /// Sightings ordered by entity identifier.
    pub fn sightings(&self) -> impl Iterator<Item = &Sighting> {
        self.sightings.values()
    }

    /// Sighting of a single hostile.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Sighting> {
        self.sightings.get(&id)
    }

    /// Number of remembered hostiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sightings.len()
    }

    /// Reports whether no hostile is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sightings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconflow_core::{Allegiance, UnitTypeId, Vector2};

    fn hostile(id: u32) -> EntitySnapshot {
        EntitySnapshot {
            id: EntityId::new(id),
            unit_type: UnitTypeId::new(1),
            allegiance: Allegiance::Hostile,
            position: Vector2::new(1.0, 1.0),
            radius: 0.5,
            target: None,
            is_flying: false,
            is_burrowed: false,
            under_construction: false,
        }
    }

    #[test]
    fn sightings_fade_independently() {
        let mut memory = HostileMemory::default();
        memory.record(hostile(1), 10, 200);
        memory.record(hostile(2), 10, 600);

        memory.fade(210);
        assert_eq!(memory.len(), 2);
        memory.fade(211);
        assert!(memory.get(EntityId::new(1)).is_none());
        assert!(memory.get(EntityId::new(2)).is_some());
        memory.fade(611);
        assert!(memory.is_empty());
    }

    #[test]
    fn attract_points_are_deduplicated() {
        let mut state = ScoutState::default();
        let point = Waypoint::Coordinate(Vector2::new(3.0, 4.0));
        state.add_attract_point(point);
        state.add_attract_point(point);
        assert_eq!(state.attract_points(), &[point]);

        state.complete_switch(Some(point), 42);
        assert!(state.attract_points().is_empty());
        assert!(state.switch_complete());
        assert_eq!(state.frame_since_switch(), 42);

        state.complete_switch(None, 99);
        assert_eq!(state.frame_since_switch(), 42);
    }
}
