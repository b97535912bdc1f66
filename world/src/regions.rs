use std::{
    cmp::Ordering,
    collections::{BTreeSet, HashMap, HashSet},
    sync::OnceLock,
};

use reconflow_core::{ChokepointId, RegionId, TerrainView, Tile, Vector2};
use thiserror::Error;
use tracing::debug;

use crate::records::{ChokepointRecord, RegionRecord};

/// Largest Chebyshev radius searched when a tile has no region of its own.
pub const REGION_SEARCH_RADIUS: u32 = 6;

/// Named partition of the walkable grid.
///
/// The tile set never changes after construction. The border and centre are
/// derived on first access and cached for the lifetime of the region.
#[derive(Debug)]
pub struct Region {
    id: RegionId,
    tiles: Vec<Tile>,
    members: HashSet<Tile>,
    anchor: Tile,
    dimensions: (u32, u32),
    base_locations: Vec<Vector2>,
    border: OnceLock<Vec<Tile>>,
    center: OnceLock<Vector2>,
}

impl Region {
    /// Creates a region from its tiles inside a grid of the provided dimensions.
    #[must_use]
    pub fn new(
        id: RegionId,
        tiles: impl IntoIterator<Item = Tile>,
        anchor: Tile,
        dimensions: (u32, u32),
    ) -> Self {
        let members: HashSet<Tile> = tiles.into_iter().collect();
        let mut tiles: Vec<Tile> = members.iter().copied().collect();
        tiles.sort_unstable();
        Self {
            id,
            tiles,
            members,
            anchor,
            dimensions,
            base_locations: Vec::new(),
            border: OnceLock::new(),
            center: OnceLock::new(),
        }
    }

    /// Returns the region with the base locations that fall inside it.
    #[must_use]
    pub fn with_base_locations(mut self, base_locations: &[Vector2]) -> Self {
        let contained: Vec<Vector2> = base_locations
            .iter()
            .copied()
            .filter(|location| self.contains(Tile::from_position(*location)))
            .collect();
        self.base_locations = contained;
        self
    }

    /// Identifier assigned at level start.
    #[must_use]
    pub const fn id(&self) -> RegionId {
        self.id
    }

    /// Tiles of the region in ascending order.
    #[must_use]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Reports whether the tile belongs to the region.
    #[must_use]
    pub fn contains(&self, tile: Tile) -> bool {
        self.members.contains(&tile)
    }

    /// Representative tile supplied with the region record.
    #[must_use]
    pub const fn anchor(&self) -> Tile {
        self.anchor
    }

    /// Base locations that lie inside the region.
    #[must_use]
    pub fn base_locations(&self) -> &[Vector2] {
        &self.base_locations
    }

    /// Grid tiles outside the region that share an edge with one of its tiles.
    pub fn border(&self) -> &[Tile] {
        self.border.get_or_init(|| {
            let (width, height) = self.dimensions;
            let mut border = BTreeSet::new();
            for tile in &self.tiles {
                for neighbour in tile.neighbours4() {
                    if in_bounds(neighbour, width, height) && !self.members.contains(&neighbour) {
                        let _ = border.insert(neighbour);
                    }
                }
            }
            border.into_iter().collect()
        })
    }

    /// Representative point: the base location nearest the centroid, else the centroid.
    pub fn center(&self) -> Vector2 {
        *self.center.get_or_init(|| {
            let centroid = self.centroid();
            self.base_locations
                .iter()
                .copied()
                .min_by(|a, b| {
                    a.square_distance(centroid)
                        .total_cmp(&b.square_distance(centroid))
                })
                .unwrap_or(centroid)
        })
    }

    /// Mean position of the region's tiles.
    #[must_use]
    pub fn centroid(&self) -> Vector2 {
        centroid(&self.tiles)
    }
}

/// Narrow passage between regions.
#[derive(Clone, Debug, PartialEq)]
pub struct Chokepoint {
    id: ChokepointId,
    tiles: Vec<Tile>,
    center: Vector2,
}

impl Chokepoint {
    /// Creates a chokepoint whose centre is the centroid of its tiles.
    #[must_use]
    pub fn new(id: ChokepointId, tiles: Vec<Tile>) -> Self {
        let center = centroid(&tiles);
        Self { id, tiles, center }
    }

    /// Identifier assigned at level start.
    #[must_use]
    pub const fn id(&self) -> ChokepointId {
        self.id
    }

    /// Tiles spanning the passage.
    #[must_use]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Centroid of the passage.
    #[must_use]
    pub const fn center(&self) -> Vector2 {
        self.center
    }
}

/// Configuration defects detected while building a [`RegionIndex`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegionError {
    /// A region record listed no tiles.
    #[error("region record {index} contains no tiles")]
    EmptyRegion {
        /// Position of the record in the supplied list.
        index: usize,
    },
    /// A chokepoint record listed no tiles.
    #[error("chokepoint record {index} contains no tiles")]
    EmptyChokepoint {
        /// Position of the record in the supplied list.
        index: usize,
    },
    /// A record referenced a tile outside the terrain grid.
    #[error("tile {tile:?} lies outside the terrain grid")]
    TileOutsideGrid {
        /// Offending tile.
        tile: Tile,
    },
    /// Two regions claimed the same tile.
    #[error("tile {tile:?} is claimed by regions {first:?} and {second:?}")]
    Overlap {
        /// Tile claimed twice.
        tile: Tile,
        /// Region that claimed the tile first.
        first: RegionId,
        /// Region that claimed the tile again.
        second: RegionId,
    },
    /// A walkable tile is neither inside a region nor on any region border.
    #[error("walkable tile {tile:?} is not covered by any region")]
    Uncovered {
        /// Tile left without a region.
        tile: Tile,
    },
}

/// Recoverable failure returned by [`RegionIndex::region_for`].
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum RegionLookupError {
    /// The tile lies outside the terrain grid.
    #[error("tile {tile:?} lies outside the terrain grid")]
    OutsideGrid {
        /// Tile supplied to the lookup.
        tile: Tile,
    },
    /// No region tile exists within the search radius.
    #[error("no region within {radius} tiles of {tile:?}")]
    NoRegionFound {
        /// Tile supplied to the lookup.
        tile: Tile,
        /// Radius that was exhausted.
        radius: u32,
    },
}

/// Immutable store of all regions and chokepoints of a level.
#[derive(Debug)]
pub struct RegionIndex {
    dimensions: (u32, u32),
    regions: Vec<Region>,
    chokepoints: Vec<Chokepoint>,
    owners: HashMap<Tile, usize>,
    resolved: HashMap<Tile, usize>,
    terrain_border: BTreeSet<Tile>,
    chokepoint_centers: Vec<Vector2>,
}

impl RegionIndex {
    /// Validates the records and builds the index.
    ///
    /// Regions receive identifiers starting at one, ordered by the sum of their
    /// record centre coordinates in descending order. Chokepoints keep the order
    /// in which they were supplied.
    pub fn build(
        terrain: TerrainView<'_>,
        regions: Vec<RegionRecord>,
        chokepoints: Vec<ChokepointRecord>,
        base_locations: &[Vector2],
    ) -> Result<Self, RegionError> {
        let dimensions = terrain.dimensions();
        for (index, record) in regions.iter().enumerate() {
            if record.tiles.is_empty() {
                return Err(RegionError::EmptyRegion { index });
            }
            ensure_inside(&terrain, &record.tiles)?;
        }

        let mut ordered = regions;
        ordered.sort_by(spatial_order);

        let mut owners = HashMap::new();
        let mut built = Vec::with_capacity(ordered.len());
        for (index, record) in ordered.into_iter().enumerate() {
            let id = region_id(index);
            for tile in &record.tiles {
                match owners.insert(*tile, index) {
                    Some(previous) if previous != index => {
                        return Err(RegionError::Overlap {
                            tile: *tile,
                            first: region_id(previous),
                            second: id,
                        });
                    }
                    _ => {}
                }
            }
            built.push(
                Region::new(id, record.tiles, record.center, dimensions)
                    .with_base_locations(base_locations),
            );
        }

        let mut chokes = Vec::with_capacity(chokepoints.len());
        for (index, record) in chokepoints.into_iter().enumerate() {
            if record.tiles.is_empty() {
                return Err(RegionError::EmptyChokepoint { index });
            }
            ensure_inside(&terrain, &record.tiles)?;
            let id = ChokepointId::new(u32::try_from(index + 1).unwrap_or(u32::MAX));
            chokes.push(Chokepoint::new(id, record.tiles));
        }

        let mut index = Self {
            dimensions,
            chokepoint_centers: chokes.iter().map(Chokepoint::center).collect(),
            regions: built,
            chokepoints: chokes,
            owners,
            resolved: HashMap::new(),
            terrain_border: BTreeSet::new(),
        };

        for tile in terrain.walkable_tiles() {
            if tile.neighbours4().any(|neighbour| terrain.is_blocked(neighbour)) {
                let _ = index.terrain_border.insert(tile);
            }
            if index.owners.contains_key(&tile) {
                continue;
            }
            if !tile
                .neighbours4()
                .any(|neighbour| index.owners.contains_key(&neighbour))
            {
                return Err(RegionError::Uncovered { tile });
            }
            if let Some(owner) = index.search(tile) {
                let _ = index.resolved.insert(tile, owner);
            }
        }

        let rim: BTreeSet<Tile> = index
            .terrain_border
            .iter()
            .flat_map(|tile| tile.neighbours4())
            .filter(|tile| terrain.is_blocked(*tile))
            .collect();
        for tile in rim {
            if let Some(owner) = index.search(tile) {
                let _ = index.resolved.insert(tile, owner);
            }
        }

        debug!(
            regions = index.regions.len(),
            chokepoints = index.chokepoints.len(),
            border_tiles = index.terrain_border.len(),
            "region index built"
        );
        Ok(index)
    }

    /// Resolves the region owning a tile, searching nearby rings for unassigned tiles.
    pub fn region_for(&self, tile: Tile) -> Result<&Region, RegionLookupError> {
        let (width, height) = self.dimensions;
        if !in_bounds(tile, width, height) {
            return Err(RegionLookupError::OutsideGrid { tile });
        }

        self.owners
            .get(&tile)
            .or_else(|| self.resolved.get(&tile))
            .copied()
            .or_else(|| self.search(tile))
            .and_then(|index| self.regions.get(index))
            .ok_or(RegionLookupError::NoRegionFound {
                tile,
                radius: REGION_SEARCH_RADIUS,
            })
    }

    /// Resolves the region owning the tile under a position.
    pub fn region_at(&self, position: Vector2) -> Result<&Region, RegionLookupError> {
        self.region_for(Tile::from_position(position))
    }

    /// Looks up a region by identifier.
    #[must_use]
    pub fn region(&self, id: RegionId) -> Option<&Region> {
        let index = usize::try_from(id.get()).ok()?.checked_sub(1)?;
        self.regions.get(index)
    }

    /// All regions in identifier order.
    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// All chokepoints in identifier order.
    #[must_use]
    pub fn chokepoints(&self) -> &[Chokepoint] {
        &self.chokepoints
    }

    /// Centroids of all chokepoints in identifier order.
    #[must_use]
    pub fn chokepoint_centers(&self) -> &[Vector2] {
        &self.chokepoint_centers
    }

    /// Chokepoint whose centroid lies closest to the position.
    #[must_use]
    pub fn closest_chokepoint(&self, position: Vector2) -> Option<&Chokepoint> {
        self.chokepoints.iter().min_by(|a, b| {
            a.center()
                .square_distance(position)
                .total_cmp(&b.center().square_distance(position))
        })
    }

    /// Walkable tiles that share an edge with blocked terrain.
    ///
    /// Blocked tiles on the other side of that edge resolve their region when
    /// the index is built, so agents brushing a wall never trigger a search.
    #[must_use]
    pub fn terrain_border(&self) -> &BTreeSet<Tile> {
        &self.terrain_border
    }

    /// Dimensions of the grid the index was built for.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    /// Region identifier of every tile in row-major order.
    #[must_use]
    pub fn region_overlay(&self) -> Vec<Option<RegionId>> {
        let (width, height) = self.dimensions;
        (0..height)
            .flat_map(|y| (0..width).map(move |x| Tile::new(x as i32, y as i32)))
            .map(|tile| {
                self.owners
                    .get(&tile)
                    .or_else(|| self.resolved.get(&tile))
                    .and_then(|index| self.regions.get(*index))
                    .map(Region::id)
            })
            .collect()
    }

    fn search(&self, tile: Tile) -> Option<usize> {
        (1..=REGION_SEARCH_RADIUS).find_map(|radius| {
            tile.ring(radius)
                .find_map(|candidate| self.owners.get(&candidate).copied())
        })
    }
}

pub(crate) fn centroid(tiles: &[Tile]) -> Vector2 {
    if tiles.is_empty() {
        return Vector2::ZERO;
    }
    let sum: Vector2 = tiles.iter().map(|tile| tile.position()).sum();
    sum / tiles.len() as f64
}

fn in_bounds(tile: Tile, width: u32, height: u32) -> bool {
    u32::try_from(tile.x()).is_ok_and(|x| x < width)
        && u32::try_from(tile.y()).is_ok_and(|y| y < height)
}

fn ensure_inside(terrain: &TerrainView<'_>, tiles: &[Tile]) -> Result<(), RegionError> {
    match tiles.iter().find(|tile| !terrain.is_valid_tile(**tile)) {
        Some(tile) => Err(RegionError::TileOutsideGrid { tile: *tile }),
        None => Ok(()),
    }
}

fn spatial_order(a: &RegionRecord, b: &RegionRecord) -> Ordering {
    let key = |record: &RegionRecord| i64::from(record.center.x()) + i64::from(record.center.y());
    key(b)
        .cmp(&key(a))
        .then_with(|| a.tiles.iter().min().cmp(&b.tiles.iter().min()))
}

fn region_id(index: usize) -> RegionId {
    RegionId::new(u32::try_from(index + 1).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Terrain;

    fn rectangle(x0: i32, y0: i32, x1: i32, y1: i32) -> Vec<Tile> {
        (x0..=x1)
            .flat_map(|x| (y0..=y1).map(move |y| Tile::new(x, y)))
            .collect()
    }

    fn split_level() -> (Terrain, Vec<RegionRecord>) {
        let terrain = Terrain::open(6, 4);
        let records = vec![
            RegionRecord {
                tiles: rectangle(0, 0, 2, 3),
                center: Tile::new(1, 1),
            },
            RegionRecord {
                tiles: rectangle(3, 0, 5, 3),
                center: Tile::new(4, 2),
            },
        ];
        (terrain, records)
    }

    #[test]
    fn border_is_complement_tiles_sharing_an_edge() {
        let region = Region::new(
            RegionId::new(1),
            rectangle(1, 1, 2, 2),
            Tile::new(1, 1),
            (5, 5),
        );
        let expected = vec![
            Tile::new(0, 1),
            Tile::new(0, 2),
            Tile::new(1, 0),
            Tile::new(1, 3),
            Tile::new(2, 0),
            Tile::new(2, 3),
            Tile::new(3, 1),
            Tile::new(3, 2),
        ];
        assert_eq!(region.border(), expected.as_slice());
        assert_eq!(region.border(), region.border(), "border must be stable");
    }

    #[test]
    fn border_excludes_tiles_outside_the_grid() {
        let region = Region::new(RegionId::new(1), rectangle(0, 0, 0, 0), Tile::new(0, 0), (2, 2));
        assert_eq!(region.border(), &[Tile::new(0, 1), Tile::new(1, 0)]);
    }

    #[test]
    fn center_prefers_contained_base_location() {
        let region = Region::new(RegionId::new(1), rectangle(0, 0, 4, 4), Tile::new(2, 2), (8, 8))
            .with_base_locations(&[Vector2::new(7.0, 7.0), Vector2::new(1.0, 1.0)]);
        assert_eq!(region.base_locations(), &[Vector2::new(1.0, 1.0)]);
        assert_eq!(region.center(), Vector2::new(1.0, 1.0));
    }

    #[test]
    fn center_falls_back_to_centroid() {
        let region = Region::new(RegionId::new(1), rectangle(0, 0, 2, 2), Tile::new(0, 0), (4, 4));
        assert_eq!(region.center(), Vector2::new(1.0, 1.0));
    }

    #[test]
    fn identifiers_follow_descending_anchor_sum() {
        let (terrain, records) = split_level();
        let index = RegionIndex::build(terrain.view(), records, Vec::new(), &[])
            .expect("split level is consistent");
        let first = index.region(RegionId::new(1)).expect("region 1 exists");
        assert_eq!(first.anchor(), Tile::new(4, 2));
        assert!(index.region(RegionId::new(3)).is_none());
        assert!(index.region(RegionId::new(0)).is_none());
    }

    #[test]
    fn overlapping_regions_are_rejected() {
        let (terrain, mut records) = split_level();
        records[1].tiles.push(Tile::new(2, 0));
        let error = RegionIndex::build(terrain.view(), records, Vec::new(), &[])
            .expect_err("overlap must be fatal");
        assert!(matches!(error, RegionError::Overlap { tile, .. } if tile == Tile::new(2, 0)));
    }

    #[test]
    fn uncovered_walkable_tiles_are_rejected() {
        let terrain = Terrain::open(6, 1);
        let records = vec![RegionRecord {
            tiles: rectangle(0, 0, 1, 0),
            center: Tile::new(0, 0),
        }];
        let error = RegionIndex::build(terrain.view(), records, Vec::new(), &[])
            .expect_err("gap must be fatal");
        assert_eq!(error, RegionError::Uncovered { tile: Tile::new(3, 0) });
    }

    #[test]
    fn empty_records_are_rejected() {
        let (terrain, _) = split_level();
        let records = vec![RegionRecord {
            tiles: Vec::new(),
            center: Tile::new(0, 0),
        }];
        assert_eq!(
            RegionIndex::build(terrain.view(), records, Vec::new(), &[]).map(|_| ()),
            Err(RegionError::EmptyRegion { index: 0 })
        );
    }

    #[test]
    fn region_for_searches_rings_for_unassigned_tiles() {
        let mut terrain = Terrain::open(5, 5);
        let _ = terrain.set_walkable(Tile::new(4, 4), false);
        let records = vec![RegionRecord {
            tiles: rectangle(0, 0, 3, 3),
            center: Tile::new(1, 1),
        }];
        let index = RegionIndex::build(terrain.view(), records, Vec::new(), &[])
            .expect("border tiles cover the rest");

        let blocked = index
            .region_for(Tile::new(4, 4))
            .expect("blocked corner resolves by ring search");
        assert_eq!(blocked.id(), RegionId::new(1));
        assert!(matches!(
            index.region_for(Tile::new(9, 0)),
            Err(RegionLookupError::OutsideGrid { .. })
        ));
    }

    #[test]
    fn wall_rim_is_resolved_up_front() {
        let terrain = Terrain::from_ascii(
            "\
.....
..#..
.....",
        )
        .expect("terrain parses");
        let records = vec![RegionRecord {
            tiles: terrain.view().walkable_tiles().collect(),
            center: Tile::new(0, 0),
        }];
        let index = RegionIndex::build(terrain.view(), records, Vec::new(), &[])
            .expect("single region covers the level");

        let expected: BTreeSet<Tile> = [
            Tile::new(2, 0),
            Tile::new(1, 1),
            Tile::new(3, 1),
            Tile::new(2, 2),
        ]
        .into_iter()
        .collect();
        assert_eq!(index.terrain_border(), &expected);
        assert_eq!(index.resolved.get(&Tile::new(2, 1)), Some(&0));
        assert_eq!(
            index.region_for(Tile::new(2, 1)).map(Region::id),
            Ok(RegionId::new(1))
        );
    }

    #[test]
    fn region_for_is_idempotent() {
        let (terrain, records) = split_level();
        let index = RegionIndex::build(terrain.view(), records, Vec::new(), &[])
            .expect("split level is consistent");
        for tile in terrain.view().tiles() {
            let first = index.region_for(tile).map(Region::id);
            let second = index.region_for(tile).map(Region::id);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn chokepoints_expose_centroids() {
        let (terrain, records) = split_level();
        let chokepoints = vec![ChokepointRecord {
            tiles: vec![Tile::new(2, 1), Tile::new(3, 1)],
            center: Tile::new(2, 1),
        }];
        let index = RegionIndex::build(terrain.view(), records, chokepoints, &[])
            .expect("split level is consistent");
        assert_eq!(index.chokepoint_centers(), &[Vector2::new(2.5, 1.0)]);
        let closest = index
            .closest_chokepoint(Vector2::new(0.0, 0.0))
            .expect("one chokepoint exists");
        assert_eq!(closest.id(), ChokepointId::new(1));
    }

    #[test]
    fn overlay_reports_region_per_tile() {
        let (terrain, records) = split_level();
        let index = RegionIndex::build(terrain.view(), records, Vec::new(), &[])
            .expect("split level is consistent");
        let overlay = index.region_overlay();
        assert_eq!(overlay.len(), 24);
        assert_eq!(overlay[0], Some(RegionId::new(2)));
        assert_eq!(overlay[5], Some(RegionId::new(1)));
    }
}
