#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter for terrain analysis and scripted scouting runs.

mod config;
mod render;

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use reconflow_core::{Command, EntityId, EntitySpec, Event, Status, Tile};
use reconflow_system_bootstrap::{Bootstrap, Level};
use reconflow_system_bottlenecks::segment_regions;
use reconflow_system_scout::{Scout, ScoutContext};
use reconflow_world::{self as world, query, LevelRecords, Terrain, World};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Scenario;

/// Terrain bottleneck analysis and potential flow scouting.
#[derive(Debug, Parser)]
#[command(name = "reconflow", version)]
struct Cli {
    /// Directory that receives a copy of the log output.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Extracts bottleneck corridors from an ASCII map.
    Bottlenecks(MapArgs),
    /// Builds the region index of a map and prints its overlay.
    Regions(RegionArgs),
    /// Runs a scripted scouting simulation.
    Scout(ScoutArgs),
}

#[derive(Debug, Args)]
struct MapArgs {
    /// ASCII map where `.` is walkable and `#` is blocked.
    map: PathBuf,

    /// Tile the corridors are ordered from, written as `x,y`.
    #[arg(long, value_parser = parse_tile, default_value = "0,0")]
    reference: Tile,
}

#[derive(Debug, Args)]
struct RegionArgs {
    #[command(flatten)]
    map: MapArgs,

    /// JSON region records to load instead of segmenting the map.
    #[arg(long)]
    records: Option<PathBuf>,

    /// Writes the segmented region records to this JSON file.
    #[arg(long, conflicts_with = "records")]
    export: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ScoutArgs {
    /// TOML scenario describing the agent, hostiles and objectives.
    scenario: PathBuf,

    /// Overrides the map named by the scenario.
    #[arg(long)]
    map: Option<PathBuf>,

    /// Number of frames to simulate.
    #[arg(long, default_value_t = 1200)]
    frames: u64,

    /// Seed for scattered hostile patrol posts.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Number of hostile patrol posts to scatter over the map.
    #[arg(long, default_value_t = 0)]
    scatter: usize,

    /// Prints the field breakdown every this many frames; zero disables it.
    #[arg(long, default_value_t = 64)]
    report_every: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(cli.log_dir.as_deref())?;

    match cli.command {
        CliCommand::Bottlenecks(args) => run_bottlenecks(&args),
        CliCommand::Regions(args) => run_regions(&args),
        CliCommand::Scout(args) => run_scout(&args),
    }
}

/// Installs the stderr log layer and, when requested, a file layer.
///
/// The returned guard flushes the file writer when dropped.
fn init_logging(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("reconflow=info"));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::never(dir, "reconflow.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("failed to install the log subscriber")?;
    Ok(guard)
}

fn parse_tile(value: &str) -> Result<Tile, String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("expected `x,y`, got `{value}`"))?;
    let x = x.trim().parse().map_err(|error| format!("bad x `{x}`: {error}"))?;
    let y = y.trim().parse().map_err(|error| format!("bad y `{y}`: {error}"))?;
    Ok(Tile::new(x, y))
}

fn load_terrain(path: &Path) -> Result<Terrain> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read map {}", path.display()))?;
    Terrain::from_ascii(&text).with_context(|| format!("failed to parse map {}", path.display()))
}

fn load_records(path: &Path) -> Result<LevelRecords> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read region records {}", path.display()))?;
    LevelRecords::from_json(&text)
        .with_context(|| format!("failed to parse region records {}", path.display()))
}

fn prepare(
    world: &World,
    reference: Tile,
    records: Option<LevelRecords>,
    scenario: Option<&Scenario>,
) -> Result<Level> {
    let base_locations = scenario.map_or(&[][..], Scenario::base_locations);
    Bootstrap
        .prepare(world, reference, records, base_locations)
        .context("level preparation failed")
}

fn run_bottlenecks(args: &MapArgs) -> Result<()> {
    let world = World::new(load_terrain(&args.map)?, Default::default());
    let level = prepare(&world, args.reference, None, None)?;

    print!(
        "{}",
        render::corridor_map(query::terrain_view(&world), level.corridors())
    );
    print!("{}", render::corridor_list(level.corridors()));
    Ok(())
}

fn run_regions(args: &RegionArgs) -> Result<()> {
    let world = World::new(load_terrain(&args.map.map)?, Default::default());
    let records = args.records.as_deref().map(load_records).transpose()?;
    let level = prepare(&world, args.map.reference, records, None)?;
    let terrain = query::terrain_view(&world);

    print!("{}", render::region_map(terrain, level.regions()));
    print!("{}", render::region_list(level.regions()));

    if let Some(path) = &args.export {
        let json = segment_regions(terrain, level.corridors())
            .to_json()
            .context("failed to encode region records")?;
        fs::write(path, json)
            .with_context(|| format!("failed to write region records {}", path.display()))?;
        info!(path = %path.display(), "region records exported");
    }
    Ok(())
}

fn run_scout(args: &ScoutArgs) -> Result<()> {
    let scenario = Scenario::load(&args.scenario)?;
    let Some(map_path) = args
        .map
        .clone()
        .or_else(|| scenario.map_path(&args.scenario))
    else {
        bail!("no map given on the command line or in the scenario");
    };
    let records = scenario
        .records_path(&args.scenario)
        .as_deref()
        .map(load_records)
        .transpose()?;

    let unit_types = scenario.unit_types();
    let mut world = World::new(load_terrain(&map_path)?, unit_types.clone());

    let agent_spec = scenario.agent_spec();
    let start = Tile::from_position(agent_spec.position);
    let agent = spawn(&mut world, agent_spec)?;
    let mut hostiles = scenario.hostile_specs(agent);
    hostiles.extend(scenario.scatter_hostiles(query::terrain_view(&world), args.seed, args.scatter)?);
    for spec in hostiles {
        let _ = spawn(&mut world, spec)?;
    }

    let level = prepare(&world, start, records, Some(&scenario))?;
    let mut scout = Scout::new(agent, scenario.scout_tuning(), unit_types);
    if scout.on_start(&query::entity_view(&world)) == Status::Fail {
        bail!("entity {} cannot scout", agent.get());
    }

    info!(frames = args.frames, agent = agent.get(), "scouting started");
    for _ in 0..args.frames {
        let mut events = Vec::new();
        world::apply(&mut world, Command::Tick, &mut events);

        let frame = query::frame(&world);
        let entities = query::entity_view(&world);
        let context = ScoutContext {
            frame,
            terrain: query::terrain_view(&world),
            regions: level.regions(),
            entities: &entities,
            objectives: scenario.objectives(),
        };
        let mut commands = Vec::new();
        if scout.on_step(&context, &mut commands) == Status::Fail {
            warn!(frame, "agent lost, scouting stopped");
            break;
        }

        if args.report_every > 0 && frame % args.report_every == 0 {
            if let Some(breakdown) = scout.last_breakdown() {
                println!("{}", render::breakdown(frame, breakdown));
            }
        }

        for command in commands {
            events.clear();
            world::apply(&mut world, command, &mut events);
        }
    }

    let entities = query::entity_view(&world);
    let Some(snapshot) = entities.get(agent) else {
        return Ok(());
    };
    print!(
        "{}",
        render::scene(query::terrain_view(&world), &entities, snapshot.tile())
    );
    println!(
        "agent at {}, heading {:?}, {} hostiles remembered",
        render::point(snapshot.position),
        scout.state().heading(),
        scout.state().memory().len()
    );
    Ok(())
}

fn spawn(world: &mut World, spec: EntitySpec) -> Result<EntityId> {
    let mut events = Vec::new();
    world::apply(world, Command::SpawnEntity { spec }, &mut events);
    events
        .iter()
        .find_map(|event| match event {
            Event::EntitySpawned { entity, .. } => Some(*entity),
            _ => None,
        })
        .context("world did not confirm the spawn")
}
