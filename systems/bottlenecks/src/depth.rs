//! Distance-to-wall map used to drain the terrain level by level.

use std::collections::{BTreeMap, HashMap};

use reconflow_core::{TerrainView, Tile};

/// Chebyshev distance from every walkable tile to the nearest blocked tile.
///
/// Depths are grouped into "water levels" so the basin labelling can drain
/// the terrain from the deepest tiles outward.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DepthMap {
    depths: HashMap<Tile, u32>,
    levels: BTreeMap<u32, Vec<Tile>>,
}

impl DepthMap {
    /// Computes the depth of every walkable tile of the terrain.
    ///
    /// Tiles are scanned in row-major order. When the previous tile is the
    /// left neighbour, its depth minus one seeds the ring search, which stays
    /// exact because depth changes by at most one between neighbours. The
    /// search never grows past the grid diagonal; a tile that sees no blocked
    /// tile within that radius is given the diagonal as its depth.
    #[must_use]
    pub fn build(terrain: TerrainView<'_>) -> Self {
        let bound = terrain.diagonal().max(1);
        let mut map = Self::default();
        let mut previous: Option<(Tile, u32)> = None;

        for tile in terrain.walkable_tiles() {
            let seed = match previous {
                Some((last, depth)) if last == tile.offset(-1, 0) => depth.saturating_sub(1).max(1),
                _ => 1,
            };
            let depth = ring_depth(terrain, tile, seed, bound);
            let _ = map.depths.insert(tile, depth);
            map.levels.entry(depth).or_default().push(tile);
            previous = Some((tile, depth));
        }

        map
    }

    /// Depth of a walkable tile.
    #[must_use]
    pub fn depth(&self, tile: Tile) -> Option<u32> {
        self.depths.get(&tile).copied()
    }

    /// Water levels from the deepest to the shallowest, tiles in row-major order.
    pub fn levels(&self) -> impl Iterator<Item = (u32, &[Tile])> {
        self.levels
            .iter()
            .rev()
            .map(|(depth, tiles)| (*depth, tiles.as_slice()))
    }

    /// Largest depth found on the terrain.
    #[must_use]
    pub fn max_depth(&self) -> u32 {
        self.levels.keys().next_back().copied().unwrap_or(0)
    }

    /// Number of walkable tiles covered by the map.
    #[must_use]
    pub fn len(&self) -> usize {
        self.depths.len()
    }

    /// Reports whether the terrain had no walkable tiles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.depths.is_empty()
    }
}

fn ring_depth(terrain: TerrainView<'_>, tile: Tile, seed: u32, bound: u32) -> u32 {
    (seed..=bound)
        .find(|radius| tile.ring(*radius).any(|candidate| terrain.is_blocked(candidate)))
        .unwrap_or(bound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconflow_world::Terrain;

    fn brute_force_depth(terrain: TerrainView<'_>, tile: Tile) -> Option<u32> {
        terrain
            .tiles()
            .filter(|candidate| terrain.is_blocked(*candidate))
            .map(|candidate| candidate.chebyshev_distance(tile))
            .min()
    }

    #[test]
    fn depth_matches_distance_to_nearest_wall() {
        let terrain = Terrain::from_ascii(
            "\
############
#..........#
#...##.....#
#..........#
#......#...#
#..........#
#.#........#
############",
        )
        .expect("terrain parses");
        let view = terrain.view();
        let depths = DepthMap::build(view);

        for tile in view.walkable_tiles() {
            assert_eq!(
                depths.depth(tile),
                brute_force_depth(view, tile),
                "depth mismatch at {tile:?}"
            );
        }
    }

    #[test]
    fn open_terrain_is_bounded_by_the_diagonal() {
        let terrain = Terrain::open(3, 4);
        let depths = DepthMap::build(terrain.view());
        assert_eq!(depths.len(), 12);
        assert_eq!(depths.depth(Tile::new(1, 1)), Some(5));
        assert_eq!(depths.max_depth(), 5);
    }

    #[test]
    fn levels_drain_from_deepest() {
        let terrain = Terrain::from_ascii(
            "\
#####
#...#
#...#
#...#
#####",
        )
        .expect("terrain parses");
        let depths = DepthMap::build(terrain.view());
        let levels: Vec<(u32, usize)> = depths
            .levels()
            .map(|(depth, tiles)| (depth, tiles.len()))
            .collect();
        assert_eq!(levels, vec![(2, 1), (1, 8)]);
    }
}
