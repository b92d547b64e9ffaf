//! Headless AI-vs-AI skirmish runner
//!
//! Loads a scenario (the bundled demo by default), builds one AI per side
//! and plays the scenario's turns, printing a summary per turn. With
//! `--dump-ai` the final configuration of every AI is printed as JSON.

use std::path::PathBuf;

use clap::Parser;
use rca_ai::ai::Manager;
use rca_ai::core::{EngineSettings, Result, Side};
use rca_ai::game::{GameState, GameWorld, Scenario, SimWorld, UnitTypeCatalog};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rca_sim")]
#[command(about = "Play computer-controlled sides against each other on a scenario")]
struct Args {
    /// Scenario TOML file (defaults to the bundled demo)
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Engine settings TOML file
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Unit catalog TOML file (defaults to the bundled catalog)
    #[arg(long)]
    units: Option<PathBuf>,

    /// Turns to play; the scenario's own limit when omitted
    #[arg(long)]
    turns: Option<u32>,

    /// Random seed for the AIs
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Disable evaluation-order pruning
    #[arg(long)]
    no_pruning: bool,

    /// Print every AI's configuration as JSON at the end
    #[arg(long)]
    dump_ai: bool,

    /// Debug logging for the engine
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[derive(Serialize)]
struct SideSummary {
    side: Side,
    gold: i32,
    units: usize,
    villages: usize,
}

fn summarize(state: &GameState, sides: &[Side]) -> Vec<SideSummary> {
    sides
        .iter()
        .map(|&side| SideSummary {
            side,
            gold: state.gold(side),
            units: state.units_of(side).count(),
            villages: state.map.village_count(side),
        })
        .collect()
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "rca_ai=debug" } else { "rca_ai=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    let scenario = match &args.scenario {
        Some(path) => Scenario::load(path)?,
        None => Scenario::demo()?,
    };
    let catalog = match &args.units {
        Some(path) => UnitTypeCatalog::parse_toml(&std::fs::read_to_string(path)?)?,
        None => UnitTypeCatalog::builtin(),
    };
    let mut settings = match &args.settings {
        Some(path) => EngineSettings::load(path)?,
        None => EngineSettings::default(),
    };
    settings.seed = args.seed;
    if args.no_pruning {
        settings.pruning = false;
    }

    let mut world = SimWorld::new(scenario.build(catalog)?);
    let sides = scenario.sides();
    let mut manager = Manager::new(settings)?;
    let overrides: Vec<_> = scenario.side_ai_configs();
    for &side in &sides {
        let cfg = overrides
            .iter()
            .find(|(s, _)| *s == side)
            .map(|(_, cfg)| cfg.clone())
            .unwrap_or_default();
        manager.add_ai(side, &cfg);
    }

    let turns = args.turns.unwrap_or(scenario.turns);
    tracing::info!("Playing '{}' for {} turn(s) with {} side(s)", scenario.name, turns, sides.len());

    for _ in 0..turns {
        manager.on_turn_start(world.state());
        for &side in &sides {
            world.begin_side_turn(side);
            manager.play_turn(side, &mut world)?;
        }
        let turn = world.state().turn;
        println!("Turn {} ({})", turn, world.state().time_of_day().id);
        for summary in summarize(world.state(), &sides) {
            println!(
                "  side {}: {} gold, {} unit(s), {} village(s)",
                summary.side, summary.gold, summary.units, summary.villages
            );
        }
        world.end_turn();
    }

    println!("{}", serde_json::to_string_pretty(&summarize(world.state(), &sides))?);
    if args.dump_ai {
        for &side in &sides {
            let cfg = manager.to_config(side)?;
            println!("{}", serde_json::to_string_pretty(&cfg)?);
        }
    }
    Ok(())
}
