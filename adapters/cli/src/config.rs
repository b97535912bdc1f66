use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use rand::{seq::SliceRandom, SeedableRng};
use rand_chacha::ChaCha8Rng;
use reconflow_core::{
    Allegiance, EntityId, EntitySpec, TerrainView, Tile, UnitTraits, UnitTypeId, UnitTypeTable,
    Vector2,
};
use reconflow_system_potential_field::FieldTuning;
use reconflow_system_scout::{ScoutObjectives, ScoutTuning};
use serde::Deserialize;

/// Scenario format understood by this build.
pub(crate) const SCENARIO_VERSION: u32 = 1;

/// Minimum Chebyshev distance between the agent and a scattered patrol post.
const SCATTER_CLEARANCE: u32 = 6;

/// Scouting scenario loaded from a TOML file.
#[derive(Debug, Deserialize)]
pub(crate) struct Scenario {
    version: u32,
    /// ASCII map, relative to the scenario file.
    #[serde(default)]
    map: Option<PathBuf>,
    /// Region records in JSON, relative to the scenario file.
    #[serde(default)]
    records: Option<PathBuf>,
    #[serde(default)]
    field: Option<FieldTuning>,
    #[serde(default)]
    scout: ScoutTuning,
    #[serde(default)]
    unit_types: Vec<UnitTypeEntry>,
    #[serde(default)]
    hostiles: Vec<HostileEntry>,
    #[serde(default)]
    base_locations: Vec<Vector2>,
    agent: AgentEntry,
    objectives: ScoutObjectives,
}

#[derive(Debug, Deserialize)]
struct UnitTypeEntry {
    id: u32,
    #[serde(flatten)]
    traits: UnitTraits,
}

#[derive(Debug, Deserialize)]
struct HostileEntry {
    unit_type: u32,
    position: Vector2,
    #[serde(default)]
    targets_agent: bool,
}

#[derive(Debug, Deserialize)]
struct AgentEntry {
    unit_type: u32,
    position: Vector2,
}

impl Scenario {
    /// Parses a scenario and rejects unsupported versions.
    pub(crate) fn parse(text: &str) -> Result<Self> {
        let scenario: Self = toml::from_str(text).context("scenario is not valid TOML")?;
        if scenario.version != SCENARIO_VERSION {
            bail!(
                "unsupported scenario version {} (expected {SCENARIO_VERSION})",
                scenario.version
            );
        }
        Ok(scenario)
    }

    /// Reads and parses the scenario stored at `path`.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("failed to load scenario {}", path.display()))
    }

    /// Map path resolved against the directory of the scenario file.
    pub(crate) fn map_path(&self, scenario_path: &Path) -> Option<PathBuf> {
        self.map.as_ref().map(|map| resolve(scenario_path, map))
    }

    /// Records path resolved against the directory of the scenario file.
    pub(crate) fn records_path(&self, scenario_path: &Path) -> Option<PathBuf> {
        self.records.as_ref().map(|records| resolve(scenario_path, records))
    }

    /// Scout tuning with the `[field]` section applied on top.
    pub(crate) fn scout_tuning(&self) -> ScoutTuning {
        let mut tuning = self.scout.clone();
        if let Some(field) = &self.field {
            tuning.field = field.clone();
        }
        tuning
    }

    pub(crate) fn unit_types(&self) -> UnitTypeTable {
        UnitTypeTable::from_entries(
            self.unit_types
                .iter()
                .map(|entry| (UnitTypeId::new(entry.id), entry.traits.clone())),
        )
    }

    pub(crate) fn base_locations(&self) -> &[Vector2] {
        &self.base_locations
    }

    pub(crate) const fn objectives(&self) -> ScoutObjectives {
        self.objectives
    }

    pub(crate) fn agent_spec(&self) -> EntitySpec {
        EntitySpec::new(
            UnitTypeId::new(self.agent.unit_type),
            Allegiance::Own,
            self.agent.position,
        )
    }

    /// Hostiles listed in the scenario, aimed at `agent` where requested.
    pub(crate) fn hostile_specs(&self, agent: EntityId) -> Vec<EntitySpec> {
        self.hostiles
            .iter()
            .map(|hostile| {
                let spec = EntitySpec::new(
                    UnitTypeId::new(hostile.unit_type),
                    Allegiance::Hostile,
                    hostile.position,
                );
                if hostile.targets_agent {
                    spec.targeting(agent)
                } else {
                    spec
                }
            })
            .collect()
    }

    /// Places `count` hostile patrol posts on walkable tiles away from the agent.
    ///
    /// The same seed always yields the same posts. The first armed non-building
    /// unit type of the scenario staffs every post.
    pub(crate) fn scatter_hostiles(
        &self,
        terrain: TerrainView<'_>,
        seed: u64,
        count: usize,
    ) -> Result<Vec<EntitySpec>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let Some(unit_type) = self
            .unit_types
            .iter()
            .find(|entry| entry.traits.can_attack && !entry.traits.is_building)
            .map(|entry| UnitTypeId::new(entry.id))
        else {
            bail!("scattering hostiles needs an armed unit type in the scenario");
        };

        let start = Tile::from_position(self.agent.position);
        let candidates: Vec<Tile> = terrain
            .walkable_tiles()
            .filter(|tile| tile.chebyshev_distance(start) > SCATTER_CLEARANCE)
            .collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        Ok(candidates
            .choose_multiple(&mut rng, count)
            .map(|tile| EntitySpec::new(unit_type, Allegiance::Hostile, tile.position()))
            .collect())
    }
}

fn resolve(scenario_path: &Path, relative: &Path) -> PathBuf {
    scenario_path
        .parent()
        .map_or_else(|| relative.to_path_buf(), |dir| dir.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconflow_world::Terrain;

    const SCENARIO: &str = r#"
version = 1
map = "maps/three_rooms.txt"

[field]
obstacle_gain = 2.5

[scout]
engage_distance = 8.0

[[unit_types]]
id = 1
name = "scout"
speed = 0.5

[[unit_types]]
id = 2
name = "marine"
is_combat_unit = true
can_attack = true
attack_range = 5.0

[[hostiles]]
unit_type = 2
position = [16.0, 2.0]
targets_agent = true

[agent]
unit_type = 1
position = [2.0, 4.0]

[objectives]
enemy_main = [16.0, 4.0]
"#;

    #[test]
    fn scenario_sections_are_applied() {
        let scenario = Scenario::parse(SCENARIO).expect("scenario parses");

        let tuning = scenario.scout_tuning();
        assert_eq!(tuning.engage_distance, 8.0);
        assert_eq!(tuning.field.obstacle_gain, 2.5);
        assert_eq!(tuning.danger_radius, ScoutTuning::default().danger_radius);

        let unit_types = scenario.unit_types();
        assert_eq!(unit_types.len(), 2);
        let marine = unit_types
            .traits(UnitTypeId::new(2))
            .expect("marine registered");
        assert!(marine.can_attack);
        assert_eq!(marine.sight_range, UnitTraits::default().sight_range);

        let hostiles = scenario.hostile_specs(EntityId::new(7));
        assert_eq!(hostiles.len(), 1);
        assert_eq!(hostiles[0].target, Some(EntityId::new(7)));
        assert_eq!(scenario.objectives().enemy_expansion, None);
        assert_eq!(
            scenario.map_path(Path::new("demos/scenario.toml")),
            Some(PathBuf::from("demos/maps/three_rooms.txt"))
        );
    }

    #[test]
    fn other_versions_are_rejected() {
        let text = SCENARIO.replace("version = 1", "version = 2");
        let error = Scenario::parse(&text).expect_err("version 2 is unknown");
        assert!(error.to_string().contains("unsupported scenario version"));
    }

    #[test]
    fn scattering_is_seeded_and_keeps_clear_of_the_agent() {
        let scenario = Scenario::parse(SCENARIO).expect("scenario parses");
        let terrain = Terrain::open(24, 12);

        let first = scenario
            .scatter_hostiles(terrain.view(), 11, 4)
            .expect("scatter succeeds");
        let second = scenario
            .scatter_hostiles(terrain.view(), 11, 4)
            .expect("scatter succeeds");

        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
        let start = Tile::new(2, 4);
        assert!(first
            .iter()
            .all(|spec| Tile::from_position(spec.position).chebyshev_distance(start) > SCATTER_CLEARANCE));
    }
}
