#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Potential flow field that steers a scouting agent through hostile territory.
//!
//! A single evaluation superposes five sub-fields at the agent's position:
//! the region field circling the current region's centre, the border field
//! following nearby region borders, round obstacles modelled with the circle
//! theorem, needle-shaped threats emitted by armed hostiles and optional
//! attraction toward waypoints. The sub-fields are reported individually in a
//! [`FieldBreakdown`] so callers can inspect or render them.

pub mod flows;

use std::f64::consts::PI;

use reconflow_core::{
    Allegiance, EntitySnapshot, RegionId, Tile, UnitTraits, UnitTypeTable, Vector2,
};
use reconflow_world::{Region, RegionIndex};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

/// Extra tiles added to the sight range before the region source flips into a sink.
const SIGHT_EXTEND: f64 = 1.0;
/// Extra tiles around the active border radius inside which a chokepoint mutes the border.
const BORDER_CHOKE_MARGIN: f64 = 4.0;
/// Extra tiles around the sight range inside which hostiles are considered.
pub const AWARENESS_MARGIN: f64 = 2.0;

/// Gains and distances shaping the field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldTuning {
    /// Strength of the vortex around the region centre.
    pub center_vortex: f64,
    /// Strength of the source (near) or sink (far) at the region centre.
    pub center_source_sink: f64,
    /// Squared distance to the objective below which obstacle sources push outward.
    pub obstacle_switch_distance: f64,
    /// Smallest radius inside which border tiles contribute.
    pub min_active_border: f64,
    /// Strength of the vortex emitted by each border tile.
    pub border_vortex: f64,
    /// Strength of the source emitted by each border tile.
    pub border_source: f64,
    /// Multiplier applied to obstacle images.
    pub obstacle_gain: f64,
    /// Strength of the needle emitted by armed hostiles.
    pub enemy_needle: f64,
    /// Extra multiplier applied to needles aimed at the agent.
    pub needle_scale: f64,
    /// Strength of every attract point; negative values attract.
    pub attraction: f64,
    /// Vortex weight used outside the target region.
    pub small: f64,
    /// Extra tiles around a hostile's attack range inside which it counts as a threat.
    pub enemy_alert_margin: f64,
    /// Extra tiles around the active border radius that count as reaching a chokepoint.
    pub choke_margin: f64,
    /// Border tile count divided by this value times pi gives the active border radius.
    pub border_divisor: f64,
}

impl Default for FieldTuning {
    fn default() -> Self {
        Self {
            center_vortex: 19.0,
            center_source_sink: 3.0,
            obstacle_switch_distance: 4.0,
            min_active_border: 3.0,
            border_vortex: -16.0,
            border_source: 9.0,
            obstacle_gain: 1.2,
            enemy_needle: 9.0,
            needle_scale: 2.5,
            attraction: -32.0,
            small: 0.01,
            enemy_alert_margin: 4.0,
            choke_margin: 4.0,
            border_divisor: 14.0,
        }
    }
}

/// Direction in which the agent circulates around region centres and borders.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Heading {
    /// Default circulation.
    #[default]
    Forward,
    /// Mirrored circulation used to escape threats ahead.
    Reverse,
}

impl Heading {
    /// Sign applied to vortex terms.
    #[must_use]
    pub const fn sign(self) -> f64 {
        match self {
            Self::Forward => 1.0,
            Self::Reverse => -1.0,
        }
    }

    /// Opposite heading.
    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            Self::Forward => Self::Reverse,
            Self::Reverse => Self::Forward,
        }
    }
}

/// Role an entity plays in the field of a given agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Influence {
    /// Round obstacle deflecting the flow.
    Obstacle,
    /// Armed hostile emitting a repulsive needle or source.
    Threat,
    /// Entity the agent can ignore.
    Ignored,
}

/// Everything a single field evaluation reads.
#[derive(Clone, Copy, Debug)]
pub struct FieldInputs<'a> {
    /// The steered agent.
    pub agent: &'a EntitySnapshot,
    /// Region store of the level.
    pub regions: &'a RegionIndex,
    /// Region the agent is currently tasked to scout.
    pub target_region: RegionId,
    /// Point the obstacle images circulate around.
    pub objective: Vector2,
    /// Current circulation direction.
    pub heading: Heading,
    /// Nearby entities; the agent itself and friendly entities are skipped.
    pub entities: &'a [EntitySnapshot],
    /// Points pulling the agent toward them.
    pub attract_points: &'a [Vector2],
    /// Whether the attract points contribute.
    pub use_attraction: bool,
}

/// Sub-fields of one evaluation and their sum.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FieldBreakdown {
    /// Vortex and source around the current region centre.
    pub region: Vector2,
    /// Flow along nearby region border tiles.
    pub border: Vector2,
    /// Average of the obstacle images.
    pub obstacles: Vector2,
    /// Sum of the threat needles.
    pub threats: Vector2,
    /// Pull of the attract points.
    pub attraction: Vector2,
    /// Sum of all sub-fields.
    pub total: Vector2,
    /// Number of entities that contributed to `threats`.
    pub threat_count: usize,
    /// Number of entities averaged into `obstacles`.
    pub obstacle_count: usize,
}

impl FieldBreakdown {
    /// Reports whether the threats oppose the region flow strongly enough to reverse.
    #[must_use]
    pub fn should_reverse(&self) -> bool {
        if self.threat_count == 0 || self.threats.is_zero() {
            return false;
        }
        let cos = self.threats.cos(self.region);
        cos < -0.85 || (cos < -0.5 && self.threat_count >= 3)
    }
}

/// Failures raised while evaluating the field.
#[derive(Debug, Error, PartialEq)]
pub enum FieldError {
    /// The agent stands on a tile no region could be resolved for.
    #[error("no region owns the agent tile {tile:?}")]
    AgentRegionUnknown {
        /// Tile occupied by the agent.
        tile: Tile,
    },
    /// The target region does not exist in the region store.
    #[error("target region {region:?} is not part of the level")]
    TargetRegionMissing {
        /// Identifier that failed to resolve.
        region: RegionId,
    },
    /// A sub-field produced a non-finite vector.
    #[error("field evaluation produced a non-finite vector ({component})")]
    NonFinite {
        /// Name of the offending sub-field.
        component: &'static str,
    },
}

/// Evaluates the potential field for agents of a fixed unit type table.
#[derive(Clone, Debug)]
pub struct FieldCalculator {
    tuning: FieldTuning,
    unit_types: UnitTypeTable,
    fallback: UnitTraits,
}

impl FieldCalculator {
    /// Creates a calculator using the provided tuning and unit data.
    #[must_use]
    pub fn new(tuning: FieldTuning, unit_types: UnitTypeTable) -> Self {
        Self {
            tuning,
            unit_types,
            fallback: UnitTraits::default(),
        }
    }

    /// Tuning the calculator was created with.
    #[must_use]
    pub fn tuning(&self) -> &FieldTuning {
        &self.tuning
    }

    /// Traits of an entity's unit type, falling back to defaults for unknown types.
    #[must_use]
    pub fn traits_of(&self, entity: &EntitySnapshot) -> &UnitTraits {
        self.unit_types
            .traits(entity.unit_type)
            .unwrap_or(&self.fallback)
    }

    /// Radius around the agent inside which border tiles of `region` contribute.
    #[must_use]
    pub fn active_border_radius(&self, region: &Region) -> f64 {
        let scaled = region.border().len() as f64 / (PI * self.tuning.border_divisor);
        scaled.max(self.tuning.min_active_border)
    }

    /// Decides how `other` shapes the field of `agent`.
    ///
    /// Rules are checked in order: resources and passive ground structures
    /// are obstacles, armed hostiles in reach are threats, harmless flying or
    /// burrowed entities are ignored and everything else is an obstacle.
    #[must_use]
    pub fn classify(&self, agent: &EntitySnapshot, other: &EntitySnapshot) -> Influence {
        let traits = self.traits_of(other);
        if traits.is_resource {
            return Influence::Obstacle;
        }
        if traits.is_building
            && !other.is_flying
            && (!traits.is_combat_unit || other.under_construction)
            && !traits.is_defensive_structure
        {
            return Influence::Obstacle;
        }
        if traits.can_attack
            && other.position.distance(agent.position) < traits.attack_range + self.tuning.enemy_alert_margin
            && (other.target == Some(agent.id) || !traits.is_worker)
        {
            return Influence::Threat;
        }
        if !traits.is_combat_unit && (other.is_flying || other.is_burrowed) {
            return Influence::Ignored;
        }
        Influence::Obstacle
    }

    /// Reports whether hostiles are close enough to abandon direct movement.
    ///
    /// Any hostile within `alert_radius` tiles (Chebyshev) is a danger, as is
    /// any hostile within the agent's sight range plus two tiles that targets
    /// the agent.
    #[must_use]
    pub fn in_danger<'a>(
        &self,
        agent: &EntitySnapshot,
        hostiles: impl IntoIterator<Item = &'a EntitySnapshot>,
        alert_radius: u32,
    ) -> bool {
        let tile = agent.tile();
        let watch = self.awareness_radius(agent);
        hostiles
            .into_iter()
            .filter(|hostile| hostile.allegiance == Allegiance::Hostile)
            .any(|hostile| {
                let steps = hostile.tile().chebyshev_distance(tile);
                steps <= alert_radius || (steps <= watch && hostile.target == Some(agent.id))
            })
    }

    /// Chebyshev radius inside which hostiles are noticed by the agent.
    #[must_use]
    pub fn awareness_radius(&self, agent: &EntitySnapshot) -> u32 {
        let sight = self.traits_of(agent).sight_range + AWARENESS_MARGIN;
        sight.max(0.0).ceil() as u32
    }

    /// Evaluates every sub-field at the agent's position.
    pub fn evaluate(&self, inputs: &FieldInputs<'_>) -> Result<FieldBreakdown, FieldError> {
        let agent = inputs.agent;
        let tile = agent.tile();
        let current = inputs
            .regions
            .region_for(tile)
            .map_err(|_| FieldError::AgentRegionUnknown { tile })?;
        let target = inputs
            .regions
            .region(inputs.target_region)
            .ok_or(FieldError::TargetRegionMissing {
                region: inputs.target_region,
            })?;
        let in_target = current.id() == target.id();

        let mut breakdown = FieldBreakdown {
            region: self.region_field(inputs, current, in_target),
            border: self.border_field(inputs, current, in_target),
            ..FieldBreakdown::default()
        };

        let mut obstacle_sum = Vector2::ZERO;
        for other in inputs.entities {
            if other.id == agent.id || other.allegiance == Allegiance::Own {
                continue;
            }
            let value = match self.classify(agent, other) {
                Influence::Ignored => continue,
                Influence::Obstacle => self.obstacle_field(inputs, other),
                Influence::Threat => self.threat_field(agent, other),
            };
            if self.groups_as_threat(agent, other) {
                breakdown.threats += value;
                breakdown.threat_count += 1;
            } else {
                obstacle_sum += value;
                breakdown.obstacle_count += 1;
            }
        }
        if breakdown.obstacle_count > 0 {
            breakdown.obstacles = obstacle_sum / breakdown.obstacle_count as f64;
        }

        if inputs.use_attraction {
            breakdown.attraction = inputs
                .attract_points
                .iter()
                .map(|point| flows::source(*point, agent.position) * self.tuning.attraction)
                .sum();
        }

        breakdown.total = breakdown.region
            + breakdown.border
            + breakdown.obstacles
            + breakdown.threats
            + breakdown.attraction;

        for (component, value) in [
            ("region", breakdown.region),
            ("border", breakdown.border),
            ("obstacles", breakdown.obstacles),
            ("threats", breakdown.threats),
            ("attraction", breakdown.attraction),
        ] {
            if !value.is_finite() {
                return Err(FieldError::NonFinite { component });
            }
        }

        trace!(
            agent = agent.id.get(),
            region = breakdown.region.length(),
            border = breakdown.border.length(),
            obstacles = breakdown.obstacles.length(),
            threats = breakdown.threats.length(),
            attraction = breakdown.attraction.length(),
            "field evaluated"
        );
        Ok(breakdown)
    }

    fn groups_as_threat(&self, agent: &EntitySnapshot, other: &EntitySnapshot) -> bool {
        let traits = self.traits_of(other);
        (traits.can_attack && !traits.is_worker) || other.target == Some(agent.id)
    }

    fn region_field(&self, inputs: &FieldInputs<'_>, current: &Region, in_target: bool) -> Vector2 {
        let position = inputs.agent.position;
        let center = current.center();
        let (vortex_gain, source_gain) = if in_target {
            (1.0, 1.0)
        } else {
            (self.tuning.small, 0.0)
        };

        let vortex = flows::vortex(center, position)
            * (self.tuning.center_vortex * inputs.heading.sign() * vortex_gain);
        let source =
            flows::source(center, position) * (self.tuning.center_source_sink * source_gain);

        let threshold = self.traits_of(inputs.agent).sight_range + SIGHT_EXTEND;
        if center.distance(position) < threshold {
            vortex + source
        } else {
            vortex - source
        }
    }

    fn border_field(&self, inputs: &FieldInputs<'_>, current: &Region, in_target: bool) -> Vector2 {
        let position = inputs.agent.position;
        let radius = self.active_border_radius(current);

        if !in_target {
            let near_choke = inputs
                .regions
                .closest_chokepoint(position)
                .is_some_and(|choke| choke.center().distance(position) < radius + BORDER_CHOKE_MARGIN);
            if near_choke {
                return Vector2::ZERO;
            }
        }

        let source_gain = if in_target { 1.0 } else { 0.0 };
        current
            .border()
            .iter()
            .map(|tile| tile.position())
            .filter(|border| border.distance(position) < radius)
            .map(|border| {
                flows::vortex(border, position) * (self.tuning.border_vortex * inputs.heading.sign())
                    + flows::source(border, position) * (self.tuning.border_source * source_gain)
            })
            .sum()
    }

    fn obstacle_field(&self, inputs: &FieldInputs<'_>, obstacle: &EntitySnapshot) -> Vector2 {
        let position = inputs.agent.position;
        let center = inputs.objective;
        let a2 = obstacle.radius * obstacle.radius;

        let side = (center - position).cross(obstacle.position - position);
        let handedness = if side < 0.0 { -1.0 } else { 1.0 };

        let vortex = flows::obstacle_vortex(obstacle.position, position, center, a2)
            * (self.tuning.center_vortex
                * self.tuning.obstacle_gain
                * inputs.heading.sign()
                * handedness);
        let source = flows::obstacle_source(obstacle.position, position, center, a2)
            * (self.tuning.center_source_sink * self.tuning.obstacle_gain);

        if center.square_distance(position) < self.tuning.obstacle_switch_distance {
            vortex + source
        } else {
            vortex - source
        }
    }

    fn threat_field(&self, agent: &EntitySnapshot, hostile: &EntitySnapshot) -> Vector2 {
        let traits = self.traits_of(hostile);
        let radius = hostile.radius.max(f64::EPSILON);

        if hostile.target == Some(agent.id) {
            let bias = (traits.attack_range + 1.0) / radius;
            flows::needle(hostile.position, agent.position, agent.position, bias)
                * (self.tuning.enemy_needle * self.tuning.needle_scale)
        } else {
            flows::source(hostile.position, agent.position)
                * (self.tuning.enemy_needle * (traits.attack_range - 0.5) / radius)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconflow_core::{EntityId, UnitTypeId};

    const SCOUT: UnitTypeId = UnitTypeId::new(1);
    const MARINE: UnitTypeId = UnitTypeId::new(2);
    const DEPOT: UnitTypeId = UnitTypeId::new(3);
    const TURRET: UnitTypeId = UnitTypeId::new(4);
    const DRONE: UnitTypeId = UnitTypeId::new(5);
    const OBSERVER: UnitTypeId = UnitTypeId::new(6);
    const MINERAL: UnitTypeId = UnitTypeId::new(7);

    fn calculator() -> FieldCalculator {
        let table = UnitTypeTable::new()
            .with(SCOUT, UnitTraits::default())
            .with(
                MARINE,
                UnitTraits {
                    is_combat_unit: true,
                    can_attack: true,
                    attack_range: 5.0,
                    ..UnitTraits::default()
                },
            )
            .with(
                DEPOT,
                UnitTraits {
                    is_building: true,
                    ..UnitTraits::default()
                },
            )
            .with(
                TURRET,
                UnitTraits {
                    is_building: true,
                    is_defensive_structure: true,
                    can_attack: true,
                    attack_range: 7.0,
                    ..UnitTraits::default()
                },
            )
            .with(
                DRONE,
                UnitTraits {
                    is_worker: true,
                    can_attack: true,
                    attack_range: 0.5,
                    ..UnitTraits::default()
                },
            )
            .with(OBSERVER, UnitTraits::default())
            .with(
                MINERAL,
                UnitTraits {
                    is_resource: true,
                    ..UnitTraits::default()
                },
            );
        FieldCalculator::new(FieldTuning::default(), table)
    }

    fn snapshot(id: u32, unit_type: UnitTypeId, allegiance: Allegiance, x: f64, y: f64) -> EntitySnapshot {
        EntitySnapshot {
            id: EntityId::new(id),
            unit_type,
            allegiance,
            position: Vector2::new(x, y),
            radius: 0.5,
            target: None,
            is_flying: false,
            is_burrowed: false,
            under_construction: false,
        }
    }

    #[test]
    fn classification_follows_rule_order() {
        let calculator = calculator();
        let agent = snapshot(1, SCOUT, Allegiance::Own, 0.0, 0.0);

        let mineral = snapshot(2, MINERAL, Allegiance::Neutral, 2.0, 0.0);
        assert_eq!(calculator.classify(&agent, &mineral), Influence::Obstacle);

        let depot = snapshot(3, DEPOT, Allegiance::Hostile, 2.0, 0.0);
        assert_eq!(calculator.classify(&agent, &depot), Influence::Obstacle);

        let turret = snapshot(4, TURRET, Allegiance::Hostile, 5.0, 0.0);
        assert_eq!(calculator.classify(&agent, &turret), Influence::Threat);

        let far_marine = snapshot(5, MARINE, Allegiance::Hostile, 20.0, 0.0);
        assert_eq!(calculator.classify(&agent, &far_marine), Influence::Obstacle);

        let idle_drone = snapshot(6, DRONE, Allegiance::Hostile, 1.0, 0.0);
        assert_eq!(calculator.classify(&agent, &idle_drone), Influence::Obstacle);

        let mut hunting_drone = idle_drone.clone();
        hunting_drone.target = Some(agent.id);
        assert_eq!(calculator.classify(&agent, &hunting_drone), Influence::Threat);

        let mut observer = snapshot(7, OBSERVER, Allegiance::Hostile, 1.0, 1.0);
        observer.is_flying = true;
        assert_eq!(calculator.classify(&agent, &observer), Influence::Ignored);
    }

    #[test]
    fn reversal_requires_opposing_threats() {
        let mut breakdown = FieldBreakdown {
            region: Vector2::new(1.0, 0.0),
            threats: Vector2::new(-1.0, 0.1),
            threat_count: 1,
            ..FieldBreakdown::default()
        };
        assert!(breakdown.should_reverse());

        breakdown.threats = Vector2::new(-1.0, 1.2);
        assert!(!breakdown.should_reverse());
        breakdown.threat_count = 3;
        assert!(breakdown.should_reverse());

        breakdown.threats = Vector2::new(1.0, 0.0);
        assert!(!breakdown.should_reverse());
    }

    #[test]
    fn danger_counts_close_hostiles_and_hunters() {
        let calculator = calculator();
        let agent = snapshot(1, SCOUT, Allegiance::Own, 10.0, 10.0);

        let near = snapshot(2, MARINE, Allegiance::Hostile, 15.0, 10.0);
        assert!(calculator.in_danger(&agent, [&near], 6));

        let far = snapshot(3, MARINE, Allegiance::Hostile, 19.0, 10.0);
        assert!(!calculator.in_danger(&agent, [&far], 6));

        let mut hunter = far.clone();
        hunter.target = Some(agent.id);
        assert!(calculator.in_danger(&agent, [&hunter], 6));

        let neutral = snapshot(4, MINERAL, Allegiance::Neutral, 11.0, 10.0);
        assert!(!calculator.in_danger(&agent, [&neutral], 6));
    }

    #[test]
    fn heading_flips_its_sign() {
        assert_eq!(Heading::Forward.sign(), 1.0);
        assert_eq!(Heading::Forward.reversed(), Heading::Reverse);
        assert_eq!(Heading::Reverse.reversed().sign(), 1.0);
    }
}
