use reconflow_core::{TerrainView, Tile};
use thiserror::Error;

const WALKABLE_GLYPH: char = '.';
const BLOCKED_GLYPH: char = '#';

/// Dense walkability grid describing the level terrain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Terrain {
    cells: Vec<bool>,
    width: u32,
    height: u32,
}

/// Reasons a terrain description could not be turned into a [`Terrain`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TerrainParseError {
    /// The description contained no rows.
    #[error("terrain description contains no rows")]
    Empty,
    /// A row had a different number of columns than the first row.
    #[error("row {row} has {found} columns, expected {expected}")]
    RaggedRow {
        /// Zero-based index of the offending row.
        row: usize,
        /// Width established by the first row.
        expected: usize,
        /// Width of the offending row.
        found: usize,
    },
    /// A glyph other than `.` or `#` appeared in the description.
    #[error("unsupported glyph {glyph:?} at column {column}, row {row}")]
    UnknownGlyph {
        /// Character that could not be interpreted.
        glyph: char,
        /// Zero-based column of the glyph.
        column: usize,
        /// Zero-based row of the glyph.
        row: usize,
    },
    /// The provided cell buffer does not match the declared dimensions.
    #[error("cell buffer holds {found} entries, expected {expected}")]
    CellCountMismatch {
        /// Number of cells implied by the dimensions.
        expected: usize,
        /// Number of cells supplied.
        found: usize,
    },
    /// The grid dimensions do not fit into tile coordinates.
    #[error("terrain of {width}x{height} tiles exceeds the supported size")]
    TooLarge {
        /// Requested width.
        width: usize,
        /// Requested height.
        height: usize,
    },
}

impl Terrain {
    /// Creates a fully walkable terrain of the provided size.
    #[must_use]
    pub fn open(width: u32, height: u32) -> Self {
        let count = usize::try_from(u64::from(width) * u64::from(height)).unwrap_or(0);
        Self {
            cells: vec![true; count],
            width,
            height,
        }
    }

    /// Creates a terrain from a row-major walkability buffer.
    pub fn from_cells(width: u32, height: u32, cells: Vec<bool>) -> Result<Self, TerrainParseError> {
        let expected = usize::try_from(u64::from(width) * u64::from(height)).map_err(|_| {
            TerrainParseError::TooLarge {
                width: width as usize,
                height: height as usize,
            }
        })?;
        if cells.len() != expected {
            return Err(TerrainParseError::CellCountMismatch {
                expected,
                found: cells.len(),
            });
        }

        Ok(Self {
            cells,
            width,
            height,
        })
    }

    /// Parses an ASCII description where `.` is walkable and `#` is blocked.
    ///
    /// Blank lines are ignored and the first line describes row zero.
    pub fn from_ascii(text: &str) -> Result<Self, TerrainParseError> {
        let rows: Vec<&str> = text
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .collect();
        let Some(first) = rows.first() else {
            return Err(TerrainParseError::Empty);
        };

        let width = first.chars().count();
        let mut cells = Vec::with_capacity(width * rows.len());
        for (row, line) in rows.iter().enumerate() {
            let found = line.chars().count();
            if found != width {
                return Err(TerrainParseError::RaggedRow {
                    row,
                    expected: width,
                    found,
                });
            }

            for (column, glyph) in line.chars().enumerate() {
                match glyph {
                    WALKABLE_GLYPH => cells.push(true),
                    BLOCKED_GLYPH => cells.push(false),
                    _ => return Err(TerrainParseError::UnknownGlyph { glyph, column, row }),
                }
            }
        }

        let too_large = || TerrainParseError::TooLarge {
            width,
            height: rows.len(),
        };
        let width = u32::try_from(width)
            .ok()
            .filter(|value| i32::try_from(*value).is_ok())
            .ok_or_else(too_large)?;
        let height = u32::try_from(rows.len())
            .ok()
            .filter(|value| i32::try_from(*value).is_ok())
            .ok_or_else(too_large)?;
        Self::from_cells(width, height, cells)
    }

    /// Marks a tile as walkable or blocked, returning whether the tile exists.
    pub fn set_walkable(&mut self, tile: Tile, walkable: bool) -> bool {
        let Some(index) = self.index(tile) else {
            return false;
        };
        match self.cells.get_mut(index) {
            Some(cell) => {
                *cell = walkable;
                true
            }
            None => false,
        }
    }

    /// Captures a read-only view of the walkability grid.
    #[must_use]
    pub fn view(&self) -> TerrainView<'_> {
        TerrainView::new(&self.cells, self.width, self.height)
    }

    /// Number of tile columns.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of tile rows.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, tile: Tile) -> Option<usize> {
        let x = u32::try_from(tile.x()).ok().filter(|x| *x < self.width)?;
        let y = u32::try_from(tile.y()).ok().filter(|y| *y < self.height)?;
        usize::try_from(u64::from(y) * u64::from(self.width) + u64::from(x)).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_rows_map_to_increasing_y() {
        let terrain = Terrain::from_ascii("#..\n...\n").expect("terrain should parse");
        let view = terrain.view();
        assert_eq!(view.dimensions(), (3, 2));
        assert!(!view.is_walkable(Tile::new(0, 0)));
        assert!(view.is_walkable(Tile::new(0, 1)));
    }

    #[test]
    fn ascii_rejects_ragged_rows() {
        let error = Terrain::from_ascii("...\n..\n").expect_err("ragged rows must fail");
        assert_eq!(
            error,
            TerrainParseError::RaggedRow {
                row: 1,
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn ascii_rejects_unknown_glyphs() {
        let error = Terrain::from_ascii(".x.\n").expect_err("unknown glyph must fail");
        assert!(matches!(
            error,
            TerrainParseError::UnknownGlyph { glyph: 'x', column: 1, row: 0 }
        ));
    }

    #[test]
    fn set_walkable_ignores_tiles_outside_grid() {
        let mut terrain = Terrain::open(2, 2);
        assert!(terrain.set_walkable(Tile::new(1, 1), false));
        assert!(!terrain.set_walkable(Tile::new(2, 0), false));
        assert!(terrain.view().is_blocked(Tile::new(1, 1)));
    }
}
