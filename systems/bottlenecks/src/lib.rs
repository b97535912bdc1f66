#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic bottleneck extraction that finds narrow passages on a terrain grid.
//!
//! The terrain is drained level by level from its deepest tiles, basins are
//! labelled as they grow, and the wall-adjacent tiles where basins meet are
//! joined by short walkable paths. Each refined path is a
//! [`BottleneckCorridor`], and [`segment_regions`] turns the corridors into
//! region and chokepoint records for the region index.

mod corridor;
mod depth;
mod gates;
mod segmentation;

use std::collections::BTreeSet;

use reconflow_core::{TerrainView, Tile};
use tracing::{info, trace};

pub use corridor::{BottleneckCorridor, MAX_CORRIDOR_LENGTH};
pub use depth::DepthMap;
pub use gates::GateCluster;
pub use segmentation::{segment_regions, MIN_REGION_TILES};

/// Farthest two lone gate endpoints may lie apart and still be paired.
pub const PAIRING_DISTANCE: f64 = 17.0;

/// Intermediate and final products of a bottleneck analysis.
#[derive(Clone, Debug)]
pub struct BottleneckAnalysis {
    depth: DepthMap,
    clusters: Vec<GateCluster>,
    corridors: Vec<BottleneckCorridor>,
}

impl BottleneckAnalysis {
    /// Depth map the analysis drained.
    #[must_use]
    pub fn depth(&self) -> &DepthMap {
        &self.depth
    }

    /// Gate clusters found where basins merged, ordered by their labels.
    #[must_use]
    pub fn clusters(&self) -> &[GateCluster] {
        &self.clusters
    }

    /// Refined corridors ordered by distance from the reference tile.
    #[must_use]
    pub fn corridors(&self) -> &[BottleneckCorridor] {
        &self.corridors
    }

    /// Consumes the analysis and returns the corridors.
    #[must_use]
    pub fn into_corridors(self) -> Vec<BottleneckCorridor> {
        self.corridors
    }
}

/// Runs the full analysis over the terrain.
///
/// Corridors are sorted by the distance of their first tile to `reference`,
/// usually the agent's starting tile. The result only depends on the terrain
/// and the reference tile.
#[must_use]
pub fn analyse(terrain: TerrainView<'_>, reference: Tile) -> BottleneckAnalysis {
    let depth = DepthMap::build(terrain);
    let clusters = gates::gate_clusters(&depth, terrain);

    let mut corridors: Vec<BottleneckCorridor> = Vec::new();
    let mut seen: BTreeSet<Vec<Tile>> = BTreeSet::new();
    for (from, to) in endpoint_pairs(terrain, &clusters) {
        let Some(path) = corridor::shortest_path(terrain, from, to) else {
            trace!(?from, ?to, "gate endpoints too far apart");
            continue;
        };
        let tiles = corridor::refine(terrain, &path);
        let mut key = tiles.clone();
        key.sort_unstable();
        if !seen.insert(key) {
            continue;
        }
        if let Some(corridor) = BottleneckCorridor::new(tiles) {
            trace!(start = ?corridor.start(), end = ?corridor.end(), len = corridor.len(), "corridor");
            corridors.push(corridor);
        }
    }

    corridors.sort_by(|a, b| {
        a.start()
            .distance(reference)
            .total_cmp(&b.start().distance(reference))
    });

    info!(
        max_depth = depth.max_depth(),
        clusters = clusters.len(),
        corridors = corridors.len(),
        "bottlenecks extracted"
    );

    BottleneckAnalysis {
        depth,
        clusters,
        corridors,
    }
}

/// Returns the refined corridors of the terrain ordered by distance from `reference`.
#[must_use]
pub fn extract_bottlenecks(terrain: TerrainView<'_>, reference: Tile) -> Vec<BottleneckCorridor> {
    analyse(terrain, reference).into_corridors()
}

fn endpoint_pairs(terrain: TerrainView<'_>, clusters: &[GateCluster]) -> Vec<(Tile, Tile)> {
    let mut pairs = Vec::new();
    let mut singles = Vec::new();

    for cluster in clusters {
        let components = cluster.components();
        match components.as_slice() {
            [] => {}
            [only] => match only.as_slice() {
                [] => {}
                [tile] if is_walled_across(terrain, *tile) => pairs.push((*tile, *tile)),
                [tile] => singles.push(*tile),
                tiles => pairs.extend(farthest_pair(tiles)),
            },
            many => pairs.extend(
                many.windows(2)
                    .filter_map(|window| closest_pair(&window[0], &window[1])),
            ),
        }
    }

    singles.sort_unstable();
    singles.dedup();
    let mut paired = vec![false; singles.len()];
    for index in 0..singles.len() {
        if paired[index] {
            continue;
        }
        let origin = singles[index];
        let partner = (index + 1..singles.len())
            .filter(|other| !paired[*other])
            .filter(|other| singles[*other].distance(origin) < PAIRING_DISTANCE)
            .min_by_key(|other| (singles[*other].square_distance(origin), *other));
        if let Some(other) = partner {
            paired[index] = true;
            paired[other] = true;
            pairs.push((origin, singles[other]));
        }
    }

    pairs
}

/// A lone gate tile pinched between two non-walkable tiles is a gap of its own.
fn is_walled_across(terrain: TerrainView<'_>, tile: Tile) -> bool {
    let closed = |dx, dy| !terrain.is_walkable(tile.offset(dx, dy));
    (closed(-1, 0) && closed(1, 0)) || (closed(0, -1) && closed(0, 1))
}

fn farthest_pair(tiles: &[Tile]) -> Option<(Tile, Tile)> {
    tiles
        .iter()
        .enumerate()
        .flat_map(|(index, a)| tiles[index + 1..].iter().map(move |b| (*a, *b)))
        .min_by_key(|(a, b)| (std::cmp::Reverse(a.square_distance(*b)), *a, *b))
}

fn closest_pair(first: &[Tile], second: &[Tile]) -> Option<(Tile, Tile)> {
    first
        .iter()
        .flat_map(|a| second.iter().map(move |b| (*a, *b)))
        .min_by_key(|(a, b)| (a.square_distance(*b), *a, *b))
}
