#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Scout navigation controller that alternates between the enemy main and expansion.
//!
//! Every step the controller decides between moving straight toward the
//! active objective and letting the potential field steer the agent. The
//! field takes over once the agent is inside an objective region, close to
//! the chokepoint guarding it, or in danger on the way there.

mod cache;
mod state;
mod steering;

use reconflow_core::{
    Command, EntityId, EntitySnapshot, EntityView, RegionId, Status, TerrainView, UnitTypeTable,
    Vector2, Waypoint, FRAMES_PER_SECOND,
};
use reconflow_system_potential_field::{
    FieldBreakdown, FieldCalculator, FieldInputs, FieldTuning,
};
use reconflow_world::RegionIndex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

pub use cache::{CacheTag, CachedValue, MemoCache, Objective};
pub use state::{HostileMemory, ScoutState, Sighting};
pub use steering::resolve_waypoint;

/// Timing, distance and memory settings of the scout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoutTuning {
    /// Field gains used while steering.
    pub field: FieldTuning,
    /// Distance to the guarding chokepoint below which the field takes over.
    pub engage_distance: f64,
    /// Seconds spent around the main before moving on to the expansion.
    pub switch_after_seconds: u64,
    /// Seconds spent around the expansion before returning to the main.
    pub revert_after_seconds: u64,
    /// Chebyshev radius inside which any hostile puts the scout in danger.
    pub danger_radius: u32,
    /// Distance of the field step in tiles.
    pub step_distance: f64,
    /// Extra single tile steps tried when the field step is not walkable.
    pub probe_limit: u32,
    /// Frames that must pass between two heading reversals.
    pub reversal_cooldown_frames: u64,
    /// Frames a memoised lookup stays valid.
    pub cache_ttl_frames: u32,
    /// Frames after which the whole memo cache is dropped.
    ///
    /// Only meaningful when longer than `cache_ttl_frames`.
    pub cache_reset_interval: u64,
    /// Frames after which an unseen hostile unit is forgotten.
    pub hostile_fade_frames: u64,
    /// Frames after which an unseen hostile building is forgotten.
    pub building_fade_frames: u64,
    /// Whether remembered but currently unseen hostiles shape the field.
    pub remember_hostiles: bool,
}

impl Default for ScoutTuning {
    fn default() -> Self {
        Self {
            field: FieldTuning::default(),
            engage_distance: 12.0,
            switch_after_seconds: 40,
            revert_after_seconds: 10,
            danger_radius: 6,
            step_distance: 3.0,
            probe_limit: 8,
            reversal_cooldown_frames: 2 * FRAMES_PER_SECOND,
            cache_ttl_frames: 200,
            cache_reset_interval: 40 * FRAMES_PER_SECOND,
            hostile_fade_frames: 200,
            building_fade_frames: 600,
            remember_hostiles: false,
        }
    }
}

/// Positions the scout tries to reach.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoutObjectives {
    /// Position of the enemy's main base.
    pub enemy_main: Vector2,
    /// Position of the enemy's expansion once known.
    #[serde(default)]
    pub enemy_expansion: Option<Vector2>,
}

/// Read-only views handed to the scout on every step.
#[derive(Clone, Copy, Debug)]
pub struct ScoutContext<'a> {
    /// Current simulation frame.
    pub frame: u64,
    /// Walkability grid of the level.
    pub terrain: TerrainView<'a>,
    /// Region store of the level.
    pub regions: &'a RegionIndex,
    /// Every entity visible this frame.
    pub entities: &'a EntityView,
    /// Positions to scout.
    pub objectives: ScoutObjectives,
}

/// Resolved data about one objective.
#[derive(Clone, Copy, Debug)]
struct Target {
    position: Vector2,
    region: Option<RegionId>,
    waypoint: Option<Vector2>,
}

/// Potential flow scout controlling a single agent.
#[derive(Debug)]
pub struct Scout {
    agent: EntityId,
    tuning: ScoutTuning,
    calculator: FieldCalculator,
    state: ScoutState,
    cache: MemoCache<CacheTag, CachedValue>,
    objectives: Option<ScoutObjectives>,
    last_breakdown: Option<FieldBreakdown>,
}

impl Scout {
    /// Creates a scout steering `agent`.
    #[must_use]
    pub fn new(agent: EntityId, tuning: ScoutTuning, unit_types: UnitTypeTable) -> Self {
        let calculator = FieldCalculator::new(tuning.field.clone(), unit_types);
        let reset = tuning.cache_reset_interval;
        if reset > 0 && reset <= u64::from(tuning.cache_ttl_frames) {
            warn!(
                ttl = tuning.cache_ttl_frames,
                reset,
                "memo cache resets before entries expire"
            );
        }
        let cache = MemoCache::new(tuning.cache_ttl_frames, tuning.cache_reset_interval);
        Self {
            agent,
            tuning,
            calculator,
            state: ScoutState::default(),
            cache,
            objectives: None,
            last_breakdown: None,
        }
    }

    /// Agent controlled by the scout.
    #[must_use]
    pub const fn agent(&self) -> EntityId {
        self.agent
    }

    /// Progress of the scout.
    #[must_use]
    pub fn state(&self) -> &ScoutState {
        &self.state
    }

    /// Field evaluated during the most recent step, if the field was used.
    #[must_use]
    pub fn last_breakdown(&self) -> Option<&FieldBreakdown> {
        self.last_breakdown.as_ref()
    }

    /// Checks whether the agent can scout.
    ///
    /// Returns [`Status::Fail`] when the agent is missing or is a structure and
    /// [`Status::Done`] otherwise.
    #[must_use]
    pub fn on_start(&self, entities: &EntityView) -> Status {
        match entities.get(self.agent) {
            Some(agent) if !self.calculator.traits_of(agent).is_building => Status::Done,
            _ => Status::Fail,
        }
    }

    /// Advances the scout by one frame, emitting at most one movement command.
    ///
    /// Returns [`Status::Fail`] once the agent no longer exists and
    /// [`Status::NotDone`] otherwise; scouting never finishes on its own.
    pub fn on_step(&mut self, context: &ScoutContext<'_>, out: &mut Vec<Command>) -> Status {
        self.cache.tick();
        self.track_objectives(context.objectives);
        self.last_breakdown = None;

        let Some(agent) = context.entities.get(self.agent).cloned() else {
            return Status::Fail;
        };

        let visible = self.observe(context, &agent);
        self.scout(context, &agent, &visible, out);
        Status::NotDone
    }

    fn observe(&mut self, context: &ScoutContext<'_>, agent: &EntitySnapshot) -> Vec<EntitySnapshot> {
        let radius = self.calculator.awareness_radius(agent);
        let visible: Vec<EntitySnapshot> = context
            .entities
            .hostiles_near(agent.tile(), radius)
            .cloned()
            .collect();

        for hostile in &visible {
            let fade = if self.calculator.traits_of(hostile).is_building {
                self.tuning.building_fade_frames
            } else {
                self.tuning.hostile_fade_frames
            };
            self.state
                .memory_mut()
                .record(hostile.clone(), context.frame, fade);
        }
        self.state.memory_mut().fade(context.frame);
        visible
    }

    /// Drops memoised lookups of objectives that moved since the last step.
    fn track_objectives(&mut self, objectives: ScoutObjectives) {
        let Some(previous) = self.objectives.replace(objectives) else {
            return;
        };
        if previous.enemy_main != objectives.enemy_main {
            self.forget(Objective::Main);
        }
        if previous.enemy_expansion != objectives.enemy_expansion {
            self.forget(Objective::Expansion);
        }
    }

    fn forget(&mut self, objective: Objective) {
        let _ = self.cache.invalidate(&CacheTag::ObjectiveRegion(objective));
        let _ = self.cache.invalidate(&CacheTag::ObjectiveWaypoint(objective));
        debug!(agent = self.agent.get(), ?objective, "objective moved, lookups dropped");
    }

    fn target(&mut self, context: &ScoutContext<'_>, objective: Objective) -> Option<Target> {
        let position = match objective {
            Objective::Main => context.objectives.enemy_main,
            Objective::Expansion => context.objectives.enemy_expansion?,
        };
        let regions = context.regions;

        let region = match self
            .cache
            .get_or_insert_with(CacheTag::ObjectiveRegion(objective), || {
                CachedValue::Region(regions.region_at(position).ok().map(|region| region.id()))
            }) {
            CachedValue::Region(region) => region,
            CachedValue::Point(_) => None,
        };
        let waypoint = match self
            .cache
            .get_or_insert_with(CacheTag::ObjectiveWaypoint(objective), || {
                CachedValue::Point(regions.closest_chokepoint(position).map(|choke| choke.center()))
            }) {
            CachedValue::Point(point) => point,
            CachedValue::Region(_) => None,
        };

        Some(Target {
            position,
            region,
            waypoint,
        })
    }

    fn scout(
        &mut self,
        context: &ScoutContext<'_>,
        agent: &EntitySnapshot,
        visible: &[EntitySnapshot],
        out: &mut Vec<Command>,
    ) {
        let Some(main) = self.target(context, Objective::Main) else {
            return;
        };
        let expansion = self.target(context, Objective::Expansion);
        let switched = self.state.should_switch_to_expansion();
        let active = match expansion {
            Some(expansion) if switched => expansion,
            _ => main,
        };

        let position = agent.position;
        let current = context.regions.region_for(agent.tile()).ok();
        let current_id = current.map(|region| region.id());
        let in_main = current_id.is_some() && current_id == main.region;
        let in_expansion =
            current_id.is_some() && current_id == expansion.and_then(|target| target.region);

        let far_from_choke = active
            .waypoint
            .map_or(true, |waypoint| waypoint.distance(position) > self.tuning.engage_distance);
        if current.is_none() || (!in_main && !in_expansion && far_from_choke) {
            self.state.set_target_region(active.region);
            out.push(Command::MoveAgent {
                agent: self.agent,
                position: active.position,
            });
            trace!(agent = self.agent.get(), "moving straight to objective");
            return;
        }

        let reach = current.map_or(0.0, |region| self.calculator.active_border_radius(region))
            + self.tuning.field.choke_margin;
        let frame = context.frame;

        if in_main {
            let linger = self.tuning.switch_after_seconds * FRAMES_PER_SECOND;
            let switch_target = expansion.and_then(|target| Some((target.region?, target.waypoint?)));
            if !switched && frame > self.state.frame_since_switch() + linger && self.state.switch_complete()
            {
                if let Some((region, waypoint)) = switch_target {
                    self.state
                        .switch_to_expansion(region, Waypoint::Coordinate(waypoint));
                    debug!(agent = self.agent.get(), frame, "switching to expansion");
                    return;
                }
            }

            if !switched {
                self.try_complete_switch(main.waypoint, position, reach, frame);
            }
            if self.state.target_region().is_none() {
                self.state.set_target_region(main.region);
            }
            self.steer(context, agent, visible, active.position, true, out);
            return;
        }

        if in_expansion {
            let linger = self.tuning.revert_after_seconds * FRAMES_PER_SECOND;
            if switched && frame > self.state.frame_since_switch() + linger && self.state.switch_complete()
            {
                self.state
                    .revert_to_main(main.region, main.waypoint.map(Waypoint::Coordinate));
                debug!(agent = self.agent.get(), frame, "returning to main");
                return;
            }

            if switched {
                let waypoint = expansion.and_then(|target| target.waypoint);
                self.try_complete_switch(waypoint, position, reach, frame);
            }
            if self.state.target_region().is_none() {
                self.state.set_target_region(active.region);
            }
            self.steer(context, agent, visible, active.position, true, out);
            return;
        }

        self.state.set_target_region(active.region);
        if let Some(waypoint) = active.waypoint {
            self.state.add_attract_point(Waypoint::Coordinate(waypoint));
        }
        if self.calculator.in_danger(agent, visible, self.tuning.danger_radius) {
            self.steer(context, agent, visible, active.position, false, out);
        } else {
            out.push(Command::MoveAgent {
                agent: self.agent,
                position: active.position,
            });
        }
    }

    fn try_complete_switch(
        &mut self,
        waypoint: Option<Vector2>,
        position: Vector2,
        reach: f64,
        frame: u64,
    ) {
        let Some(waypoint) = waypoint else {
            return;
        };
        if !self.state.switch_complete() && waypoint.distance(position) < reach {
            self.state
                .complete_switch(Some(Waypoint::Coordinate(waypoint)), frame);
            debug!(agent = self.agent.get(), frame, "objective waypoint reached");
        }
    }

    fn steer(
        &mut self,
        context: &ScoutContext<'_>,
        agent: &EntitySnapshot,
        visible: &[EntitySnapshot],
        objective: Vector2,
        use_attraction: bool,
        out: &mut Vec<Command>,
    ) {
        let Some(target_region) = self.state.target_region() else {
            warn!(agent = self.agent.get(), "no target region, holding position");
            out.push(Command::HoldPosition { agent: self.agent });
            return;
        };

        let entities = self.field_entities(context, agent, visible);
        let attract_points: Vec<Vector2> = self
            .state
            .attract_points()
            .iter()
            .filter_map(|waypoint| resolve_waypoint(*waypoint, context.regions, context.entities))
            .collect();

        let inputs = FieldInputs {
            agent,
            regions: context.regions,
            target_region,
            objective,
            heading: self.state.heading(),
            entities: &entities,
            attract_points: &attract_points,
            use_attraction,
        };

        let breakdown = match self.calculator.evaluate(&inputs) {
            Ok(breakdown) => breakdown,
            Err(error) => {
                warn!(agent = self.agent.get(), %error, "field evaluation failed, holding position");
                out.push(Command::HoldPosition { agent: self.agent });
                return;
            }
        };

        let cooled_down = self.state.last_reversal_frame().map_or(true, |last| {
            context.frame >= last + self.tuning.reversal_cooldown_frames
        });
        if breakdown.should_reverse() && cooled_down {
            self.state.reverse(context.frame);
            debug!(
                agent = self.agent.get(),
                frame = context.frame,
                heading = ?self.state.heading(),
                "threats ahead, reversing"
            );
        }

        out.push(steering::field_command(
            self.agent,
            agent.position,
            breakdown.total,
            objective,
            context.terrain,
            steering::Probe {
                step_distance: self.tuning.step_distance,
                limit: self.tuning.probe_limit,
            },
        ));
        self.last_breakdown = Some(breakdown);
    }

    fn field_entities(
        &self,
        context: &ScoutContext<'_>,
        agent: &EntitySnapshot,
        visible: &[EntitySnapshot],
    ) -> Vec<EntitySnapshot> {
        let tile = agent.tile();
        let radius = self.calculator.awareness_radius(agent);
        let mut entities: Vec<EntitySnapshot> = visible.to_vec();
        entities.extend(
            context
                .entities
                .neutrals()
                .filter(|neutral| neutral.tile().chebyshev_distance(tile) <= radius)
                .cloned(),
        );

        if self.tuning.remember_hostiles {
            entities.extend(
                self.state
                    .memory()
                    .sightings()
                    .filter(|sighting| visible.iter().all(|seen| seen.id != sighting.snapshot.id))
                    .map(|sighting| sighting.snapshot.clone()),
            );
        }
        entities
    }
}
