use std::collections::{BTreeSet, HashMap, VecDeque};

use reconflow_core::{TerrainView, Tile};
use reconflow_world::{ChokepointRecord, LevelRecords, RegionRecord};

use crate::BottleneckCorridor;

/// Smallest open area that becomes a region on its own.
pub const MIN_REGION_TILES: usize = 4;

/// Partitions the walkable grid into regions separated by the corridors.
///
/// Corridor tiles cut the grid into 4-connected areas. Areas of at least
/// [`MIN_REGION_TILES`] tiles seed a region each (the largest area is used when
/// none qualifies) and every remaining walkable tile joins the seed it reaches
/// first in a breadth-first growth. Pockets no seed can reach become regions of
/// their own, so the records always cover the whole walkable grid.
#[must_use]
pub fn segment_regions(
    terrain: TerrainView<'_>,
    corridors: &[BottleneckCorridor],
) -> LevelRecords {
    let cut: BTreeSet<Tile> = corridors
        .iter()
        .flat_map(|corridor| corridor.tiles().iter().copied())
        .collect();

    let areas = flood_areas(terrain, |tile| !cut.contains(&tile));
    let mut seeds: Vec<Vec<Tile>> = areas
        .iter()
        .filter(|area| area.len() >= MIN_REGION_TILES)
        .cloned()
        .collect();
    if seeds.is_empty() {
        if let Some(largest) = areas
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| a.len().cmp(&b.len()).then(ib.cmp(ia)))
            .map(|(_, area)| area.clone())
        {
            seeds.push(largest);
        }
    }

    let mut owner: HashMap<Tile, usize> = HashMap::new();
    let mut frontier = VecDeque::new();
    for (index, seed) in seeds.iter().enumerate() {
        for tile in seed {
            let _ = owner.insert(*tile, index);
            frontier.push_back(*tile);
        }
    }
    while let Some(tile) = frontier.pop_front() {
        let Some(index) = owner.get(&tile).copied() else {
            continue;
        };
        for neighbour in tile.neighbours4() {
            if terrain.is_walkable(neighbour) && !owner.contains_key(&neighbour) {
                let _ = owner.insert(neighbour, index);
                seeds[index].push(neighbour);
                frontier.push_back(neighbour);
            }
        }
    }

    seeds.extend(flood_areas(terrain, |tile| !owner.contains_key(&tile)));

    let regions = seeds
        .into_iter()
        .filter_map(|mut tiles| {
            tiles.sort_unstable();
            let center = nearest_to_centroid(&tiles)?;
            Some(RegionRecord { tiles, center })
        })
        .collect();

    let chokepoints = corridors
        .iter()
        .map(|corridor| ChokepointRecord {
            tiles: corridor.tiles().to_vec(),
            center: nearest_to_centroid(corridor.tiles()).unwrap_or(corridor.start()),
        })
        .collect();

    LevelRecords {
        regions,
        chokepoints,
    }
}

/// 4-connected areas of walkable tiles accepted by the filter, in row-major discovery order.
fn flood_areas(terrain: TerrainView<'_>, accept: impl Fn(Tile) -> bool) -> Vec<Vec<Tile>> {
    let mut seen = BTreeSet::new();
    let mut areas = Vec::new();

    for start in terrain.walkable_tiles() {
        if !accept(start) || !seen.insert(start) {
            continue;
        }

        let mut area = Vec::new();
        let mut stack = vec![start];
        while let Some(tile) = stack.pop() {
            area.push(tile);
            for neighbour in tile.neighbours4() {
                if terrain.is_walkable(neighbour) && accept(neighbour) && seen.insert(neighbour) {
                    stack.push(neighbour);
                }
            }
        }
        areas.push(area);
    }

    areas
}

fn nearest_to_centroid(tiles: &[Tile]) -> Option<Tile> {
    let count = tiles.len() as f64;
    if tiles.is_empty() {
        return None;
    }
    let (sx, sy) = tiles.iter().fold((0.0, 0.0), |(sx, sy), tile| {
        (sx + f64::from(tile.x()), sy + f64::from(tile.y()))
    });
    let (cx, cy) = (sx / count, sy / count);

    tiles.iter().copied().min_by(|a, b| {
        let da = (f64::from(a.x()) - cx).powi(2) + (f64::from(a.y()) - cy).powi(2);
        let db = (f64::from(b.x()) - cx).powi(2) + (f64::from(b.y()) - cy).powi(2);
        da.total_cmp(&db).then(a.cmp(b))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconflow_world::Terrain;

    #[test]
    fn open_terrain_is_a_single_region() {
        let terrain = Terrain::open(5, 3);
        let records = segment_regions(terrain.view(), &[]);
        assert_eq!(records.regions.len(), 1);
        assert_eq!(records.regions[0].tiles.len(), 15);
        assert_eq!(records.regions[0].center, Tile::new(2, 1));
        assert!(records.chokepoints.is_empty());
    }

    #[test]
    fn corridor_tiles_join_a_neighbouring_region() {
        let terrain = Terrain::open(7, 2);
        let corridor = BottleneckCorridor::new(vec![Tile::new(3, 0), Tile::new(3, 1)])
            .expect("corridor has tiles");
        let records = segment_regions(terrain.view(), std::slice::from_ref(&corridor));

        assert_eq!(records.regions.len(), 2);
        let covered: usize = records.regions.iter().map(|r| r.tiles.len()).sum();
        assert_eq!(covered, 14);
        assert_eq!(records.chokepoints.len(), 1);
        assert_eq!(records.chokepoints[0].tiles, corridor.tiles());
    }

    #[test]
    fn unreachable_pockets_become_their_own_regions() {
        let terrain = Terrain::from_ascii(
            "\
......
.....#
....#.",
        )
        .expect("terrain parses");
        let records = segment_regions(terrain.view(), &[]);
        assert_eq!(records.regions.len(), 2);
        assert_eq!(records.regions[1].tiles, vec![Tile::new(5, 2)]);
    }
}
