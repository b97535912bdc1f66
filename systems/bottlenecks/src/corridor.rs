use std::collections::{HashMap, VecDeque};

use reconflow_core::{TerrainView, Tile};

/// Longest tile path accepted between two gate endpoints.
pub const MAX_CORRIDOR_LENGTH: usize = 12;

/// Minimal wall-to-wall walkable path crossing a narrow passage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BottleneckCorridor {
    tiles: Vec<Tile>,
    start: Tile,
    end: Tile,
}

impl BottleneckCorridor {
    pub(crate) fn new(tiles: Vec<Tile>) -> Option<Self> {
        let start = *tiles.first()?;
        let end = *tiles.last()?;
        Some(Self { tiles, start, end })
    }

    /// Tiles of the corridor in path order.
    #[must_use]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// First tile of the corridor, touching a wall.
    #[must_use]
    pub const fn start(&self) -> Tile {
        self.start
    }

    /// Last tile of the corridor, touching a wall.
    #[must_use]
    pub const fn end(&self) -> Tile {
        self.end
    }

    /// Number of tiles in the corridor.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Corridors always hold at least one tile.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

/// Breadth-first search over walkable 8-neighbours, giving up past the corridor bound.
///
/// Edge-sharing neighbours are expanded before diagonal ones, so among paths
/// of equal length the straighter one wins.
pub(crate) fn shortest_path(terrain: TerrainView<'_>, from: Tile, to: Tile) -> Option<Vec<Tile>> {
    if !terrain.is_walkable(from) || !terrain.is_walkable(to) {
        return None;
    }

    let mut previous: HashMap<Tile, Option<Tile>> = HashMap::new();
    let mut frontier = VecDeque::new();
    let _ = previous.insert(from, None);
    frontier.push_back((from, 1_usize));

    while let Some((tile, length)) = frontier.pop_front() {
        if tile == to {
            return Some(unwind(&previous, to));
        }
        if length >= MAX_CORRIDOR_LENGTH {
            continue;
        }

        let diagonals = tile.ring(1).filter(|next| next.x() != tile.x() && next.y() != tile.y());
        for neighbour in tile.neighbours4().chain(diagonals) {
            if terrain.is_walkable(neighbour) && !previous.contains_key(&neighbour) {
                let _ = previous.insert(neighbour, Some(tile));
                frontier.push_back((neighbour, length + 1));
            }
        }
    }

    None
}

fn unwind(previous: &HashMap<Tile, Option<Tile>>, to: Tile) -> Vec<Tile> {
    let mut path = vec![to];
    let mut cursor = to;
    while let Some(Some(before)) = previous.get(&cursor) {
        path.push(*before);
        cursor = *before;
    }
    path.reverse();
    path
}

/// Trims both ends inward while the next interior tile still touches a wall.
pub(crate) fn refine(terrain: TerrainView<'_>, path: &[Tile]) -> Vec<Tile> {
    if path.len() < 3 {
        return path.to_vec();
    }

    let mut lo = 0;
    let mut hi = path.len() - 1;
    loop {
        let mut moved = false;
        if lo + 1 < hi && terrain.is_wall_adjacent(path[lo + 1]) {
            lo += 1;
            moved = true;
        }
        if hi - 1 > lo && terrain.is_wall_adjacent(path[hi - 1]) {
            hi -= 1;
            moved = true;
        }
        if !moved {
            break;
        }
    }

    path[lo..=hi].to_vec()
}
