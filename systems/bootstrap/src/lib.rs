#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure bootstrap system that prepares the static level data once per level.
//!
//! Preparation drains the terrain for bottlenecks and builds the region
//! index, either from supplied region records or by segmenting the terrain
//! along the extracted corridors.

use reconflow_core::{Tile, Vector2};
use reconflow_system_bottlenecks::{analyse, segment_regions, BottleneckAnalysis, BottleneckCorridor};
use reconflow_world::{query, LevelRecords, RegionError, RegionIndex, World};
use thiserror::Error;
use tracing::info;

/// Failures that abort level preparation.
#[derive(Debug, Error)]
pub enum PrepareError {
    /// The terrain has no walkable tile to analyse.
    #[error("terrain has no walkable tiles")]
    NoWalkableTiles,
    /// The region records are inconsistent with the terrain.
    #[error("region data is inconsistent: {0}")]
    Regions(#[from] RegionError),
}

/// Where the regions of a prepared level came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionSource {
    /// Regions were loaded from precomputed records.
    Records,
    /// Regions were segmented along the extracted corridors.
    Segmented,
}

/// Static data of a prepared level.
#[derive(Debug)]
pub struct Level {
    analysis: BottleneckAnalysis,
    regions: RegionIndex,
    source: RegionSource,
}

impl Level {
    /// Bottleneck analysis of the terrain.
    #[must_use]
    pub fn analysis(&self) -> &BottleneckAnalysis {
        &self.analysis
    }

    /// Corridors ordered by distance from the preparation reference tile.
    #[must_use]
    pub fn corridors(&self) -> &[BottleneckCorridor] {
        self.analysis.corridors()
    }

    /// Region and chokepoint store of the level.
    #[must_use]
    pub fn regions(&self) -> &RegionIndex {
        &self.regions
    }

    /// Origin of the region data.
    #[must_use]
    pub const fn source(&self) -> RegionSource {
        self.source
    }
}

/// Prepares the static data required before any agent is stepped.
#[derive(Debug, Default)]
pub struct Bootstrap;

impl Bootstrap {
    /// Analyses the world terrain and builds the region index.
    ///
    /// `reference` orders the corridors, usually the scout's starting tile.
    /// When `records` is `None` the regions are segmented from the corridors.
    pub fn prepare(
        &self,
        world: &World,
        reference: Tile,
        records: Option<LevelRecords>,
        base_locations: &[Vector2],
    ) -> Result<Level, PrepareError> {
        let terrain = query::terrain_view(world);
        if terrain.walkable_tiles().next().is_none() {
            return Err(PrepareError::NoWalkableTiles);
        }

        let analysis = analyse(terrain, reference);
        let (records, source) = match records {
            Some(records) => (records, RegionSource::Records),
            None => (
                segment_regions(terrain, analysis.corridors()),
                RegionSource::Segmented,
            ),
        };
        let regions = RegionIndex::build(
            terrain,
            records.regions,
            records.chokepoints,
            base_locations,
        )?;

        info!(
            corridors = analysis.corridors().len(),
            regions = regions.regions().len(),
            chokepoints = regions.chokepoints().len(),
            source = ?source,
            "level prepared"
        );

        Ok(Level {
            analysis,
            regions,
            source,
        })
    }
}
