use std::{collections::BTreeSet, fmt::Write as _};

use reconflow_core::{EntityView, TerrainView, Tile, Vector2};
use reconflow_system_bottlenecks::BottleneckCorridor;
use reconflow_system_potential_field::FieldBreakdown;
use reconflow_world::RegionIndex;

const BLOCKED: char = '#';
const WALKABLE: char = '.';
const CORRIDOR: char = '*';
const UNOWNED: char = '?';

/// Draws the terrain with every corridor tile highlighted.
pub(crate) fn corridor_map(terrain: TerrainView<'_>, corridors: &[BottleneckCorridor]) -> String {
    let marked: BTreeSet<Tile> = corridors
        .iter()
        .flat_map(|corridor| corridor.tiles().iter().copied())
        .collect();
    grid(terrain, |tile| {
        if marked.contains(&tile) {
            CORRIDOR
        } else {
            WALKABLE
        }
    })
}

/// Lists the corridors in extraction order.
pub(crate) fn corridor_list(corridors: &[BottleneckCorridor]) -> String {
    let mut text = String::new();
    for (index, corridor) in corridors.iter().enumerate() {
        let tiles: Vec<String> = corridor.tiles().iter().map(|tile| coords(*tile)).collect();
        let _ = writeln!(
            text,
            "corridor {index}: {} tiles [{}]",
            corridor.len(),
            tiles.join(" ")
        );
    }
    text
}

/// Draws region membership, one base-36 digit per region, with chokepoints starred.
pub(crate) fn region_map(terrain: TerrainView<'_>, regions: &RegionIndex) -> String {
    let overlay = regions.region_overlay();
    let chokes: BTreeSet<Tile> = regions
        .chokepoints()
        .iter()
        .flat_map(|choke| choke.tiles().iter().copied())
        .collect();
    let (width, _) = terrain.dimensions();
    grid(terrain, |tile| {
        if chokes.contains(&tile) {
            return CORRIDOR;
        }
        let index = tile.y() as usize * width as usize + tile.x() as usize;
        overlay
            .get(index)
            .copied()
            .flatten()
            .and_then(|id| char::from_digit(id.get() % 36, 36))
            .unwrap_or(UNOWNED)
    })
}

/// Lists every region with its size and centre, then the chokepoints.
pub(crate) fn region_list(regions: &RegionIndex) -> String {
    let mut text = String::new();
    for region in regions.regions() {
        let _ = writeln!(
            text,
            "region {}: {} tiles, center {}, border {}",
            region.id().get(),
            region.tiles().len(),
            point(region.center()),
            region.border().len()
        );
    }
    for choke in regions.chokepoints() {
        let _ = writeln!(
            text,
            "chokepoint {}: {} tiles, center {}",
            choke.id().get(),
            choke.tiles().len(),
            point(choke.center())
        );
    }
    let _ = writeln!(text, "terrain border: {} tiles", regions.terrain_border().len());
    text
}

/// Draws the terrain with the agent as `@`, hostiles as `h` and neutrals as `n`.
pub(crate) fn scene(terrain: TerrainView<'_>, entities: &EntityView, agent: Tile) -> String {
    grid(terrain, |tile| {
        if tile == agent {
            return '@';
        }
        let here = |candidate: &&reconflow_core::EntitySnapshot| candidate.tile() == tile;
        if entities.hostiles_near(tile, 0).find(here).is_some() {
            'h'
        } else if entities.neutrals().find(here).is_some() {
            'n'
        } else {
            WALKABLE
        }
    })
}

/// One line summary of a field evaluation.
pub(crate) fn breakdown(frame: u64, breakdown: &FieldBreakdown) -> String {
    format!(
        "frame {frame}: total {} region {} border {} obstacles {} ({}) threats {} ({}) attraction {}",
        point(breakdown.total),
        point(breakdown.region),
        point(breakdown.border),
        point(breakdown.obstacles),
        breakdown.obstacle_count,
        point(breakdown.threats),
        breakdown.threat_count,
        point(breakdown.attraction),
    )
}

fn grid(terrain: TerrainView<'_>, walkable: impl Fn(Tile) -> char) -> String {
    let (width, height) = terrain.dimensions();
    let mut text = String::with_capacity(((width + 1) * height) as usize);
    for y in 0..height as i32 {
        for x in 0..width as i32 {
            let tile = Tile::new(x, y);
            text.push(if terrain.is_walkable(tile) {
                walkable(tile)
            } else {
                BLOCKED
            });
        }
        text.push('\n');
    }
    text
}

fn coords(tile: Tile) -> String {
    format!("({},{})", tile.x(), tile.y())
}

pub(crate) fn point(position: Vector2) -> String {
    format!("({:.2},{:.2})", position.x(), position.y())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconflow_core::UnitTypeTable;
    use reconflow_system_bootstrap::Bootstrap;
    use reconflow_world::{query, Terrain, World};

    const TWO_ROOMS: &str = "\
#############
#.....#.....#
#.....#.....#
#...........#
#...........#
#...........#
#.....#.....#
#.....#.....#
#############";

    fn world() -> World {
        World::new(
            Terrain::from_ascii(TWO_ROOMS).expect("layout parses"),
            UnitTypeTable::new(),
        )
    }

    #[test]
    fn corridor_map_marks_the_gap() {
        let world = world();
        let level = Bootstrap
            .prepare(&world, Tile::new(2, 4), None, &[])
            .expect("level prepares");
        let map = corridor_map(query::terrain_view(&world), level.corridors());
        let rows: Vec<&str> = map.lines().collect();

        assert_eq!(rows.len(), 9);
        assert_eq!(rows[0], "#############");
        assert_eq!(rows[3], "#.....*.....#");
        assert_eq!(rows[4], "#.....*.....#");
        assert_eq!(rows[5], "#.....*.....#");
        assert_eq!(corridor_list(level.corridors()).lines().count(), 1);
    }

    #[test]
    fn region_map_uses_one_digit_per_region() {
        let world = world();
        let level = Bootstrap
            .prepare(&world, Tile::new(2, 4), None, &[])
            .expect("level prepares");
        let map = region_map(query::terrain_view(&world), level.regions());

        let digits: BTreeSet<char> = map
            .chars()
            .filter(|symbol| symbol.is_ascii_alphanumeric())
            .collect();
        assert_eq!(digits.len(), 2);
        assert!(!map.contains(UNOWNED));
        assert_eq!(map.matches(CORRIDOR).count(), 3);
        let list = region_list(level.regions());
        assert_eq!(list.lines().count(), 4);
        assert_eq!(list.lines().last(), Some("terrain border: 36 tiles"));
    }
}
