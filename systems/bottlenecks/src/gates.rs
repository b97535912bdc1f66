//! Basin labelling and gate clustering over a [`DepthMap`].

use std::collections::{BTreeMap, BTreeSet, HashMap};

use reconflow_core::{TerrainView, Tile};

use crate::DepthMap;

/// Wall-adjacent tiles where the same set of drained basins meet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GateCluster {
    labels: Vec<u32>,
    tiles: Vec<Tile>,
}

impl GateCluster {
    #[cfg(test)]
    pub(crate) fn from_parts(labels: Vec<u32>, tiles: Vec<Tile>) -> Self {
        Self { labels, tiles }
    }

    /// Basin labels bridged by the cluster in ascending order.
    #[must_use]
    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    /// Tiles of the cluster in ascending order.
    #[must_use]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Splits the cluster into 8-connected components.
    ///
    /// Components are ordered by their smallest tile and list their tiles in
    /// ascending order.
    #[must_use]
    pub fn components(&self) -> Vec<Vec<Tile>> {
        let members: BTreeSet<Tile> = self.tiles.iter().copied().collect();
        let mut visited = BTreeSet::new();
        let mut components = Vec::new();

        for start in &self.tiles {
            if !visited.insert(*start) {
                continue;
            }

            let mut component = Vec::new();
            let mut stack = vec![*start];
            while let Some(tile) = stack.pop() {
                component.push(tile);
                for neighbour in tile.ring(1) {
                    if members.contains(&neighbour) && visited.insert(neighbour) {
                        stack.push(neighbour);
                    }
                }
            }

            component.sort_unstable();
            components.push(component);
        }

        components
    }
}

/// Drains the depth map and returns the pruned gate clusters, ordered by labels.
pub(crate) fn gate_clusters(depths: &DepthMap, terrain: TerrainView<'_>) -> Vec<GateCluster> {
    drain(depths)
        .into_iter()
        .filter_map(|(labels, tiles)| {
            let tiles: Vec<Tile> = tiles
                .into_iter()
                .filter(|tile| terrain.is_wall_adjacent(*tile))
                .collect();
            (!tiles.is_empty()).then_some(GateCluster { labels, tiles })
        })
        .collect()
}

/// Labels every tile level by level and records the tiles where basins merge.
fn drain(depths: &DepthMap) -> BTreeMap<Vec<u32>, BTreeSet<Tile>> {
    let mut labels: HashMap<Tile, u32> = HashMap::new();
    let mut merges: BTreeMap<Vec<u32>, BTreeSet<Tile>> = BTreeMap::new();
    let mut next_label = 0_u32;

    for (_, level) in depths.levels() {
        let mut remaining: BTreeSet<Tile> = level.iter().copied().collect();
        while !remaining.is_empty() {
            let mut frontier: Vec<Tile> = remaining
                .iter()
                .copied()
                .filter(|tile| tile.ring(1).any(|neighbour| labels.contains_key(&neighbour)))
                .collect();
            if frontier.is_empty() {
                frontier.extend(remaining.first().copied());
            }

            for tile in frontier {
                let _ = remaining.remove(&tile);
                let touching: Vec<u32> = tile
                    .ring(1)
                    .filter_map(|neighbour| labels.get(&neighbour).copied())
                    .collect();

                let label = match touching.first() {
                    Some(first) => {
                        let mut distinct = touching.clone();
                        distinct.sort_unstable();
                        distinct.dedup();
                        if distinct.len() > 1 {
                            let _ = merges.entry(distinct).or_default().insert(tile);
                        }
                        *first
                    }
                    None => {
                        next_label += 1;
                        next_label
                    }
                };
                let _ = labels.insert(tile, label);
            }
        }
    }

    merges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn components_split_on_gaps() {
        let cluster = GateCluster::from_parts(
            vec![1, 2],
            vec![
                Tile::new(0, 0),
                Tile::new(1, 1),
                Tile::new(4, 0),
                Tile::new(4, 1),
            ],
        );
        assert_eq!(
            cluster.components(),
            vec![
                vec![Tile::new(0, 0), Tile::new(1, 1)],
                vec![Tile::new(4, 0), Tile::new(4, 1)],
            ]
        );
    }

    #[test]
    fn single_basin_produces_no_merges() {
        let terrain = reconflow_world::Terrain::from_ascii(
            "\
#######
#.....#
#.....#
#.....#
#######",
        )
        .expect("terrain parses");
        let depths = DepthMap::build(terrain.view());
        assert!(gate_clusters(&depths, terrain.view()).is_empty());
    }
}
