use reconflow_core::Tile;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Precomputed description of a single region.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionRecord {
    /// Tiles belonging to the region.
    pub tiles: Vec<Tile>,
    /// Representative tile used to order regions.
    pub center: Tile,
}

/// Precomputed description of a single chokepoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChokepointRecord {
    /// Tiles spanning the narrow passage.
    pub tiles: Vec<Tile>,
    /// Representative tile of the passage.
    pub center: Tile,
}

/// Region and chokepoint records describing one level.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelRecords {
    /// Region partition of the walkable grid.
    #[serde(default)]
    pub regions: Vec<RegionRecord>,
    /// Narrow passages between regions.
    #[serde(default)]
    pub chokepoints: Vec<ChokepointRecord>,
}

/// Failure raised while decoding or encoding level records.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The JSON payload could not be parsed or produced.
    #[error("malformed level records: {0}")]
    Json(#[from] serde_json::Error),
}

impl LevelRecords {
    /// Decodes records from their JSON representation.
    pub fn from_json(text: &str) -> Result<Self, RecordError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encodes the records as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, RecordError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_use_plain_coordinate_objects() {
        let json = r#"{
            "regions": [
                { "tiles": [{ "x": 1, "y": 2 }, { "x": 2, "y": 2 }], "center": { "x": 1, "y": 2 } }
            ],
            "chokepoints": []
        }"#;

        let records = LevelRecords::from_json(json).expect("records should parse");
        assert_eq!(records.regions.len(), 1);
        assert_eq!(records.regions[0].tiles[1], Tile::new(2, 2));
        assert!(records.chokepoints.is_empty());
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let records = LevelRecords::from_json("{}").expect("empty object is valid");
        assert_eq!(records, LevelRecords::default());
    }

    #[test]
    fn malformed_json_is_reported() {
        assert!(LevelRecords::from_json("{\"regions\": [1]}").is_err());
    }
}
