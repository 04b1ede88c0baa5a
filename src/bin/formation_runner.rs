//! Headless Formation Runner
//!
//! Forms a group of simulated units, marches them behind an anchor to a
//! target and optionally disbands them on arrival. Prints a JSON summary.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use formation_grid::core::FormationConfig;
use formation_grid::formation::{
    AnchorAdapter, Formation, FormationEventType, FormationState, MovementMode, SharedNavigator,
    ShapeId, UnitRef,
};
use formation_grid::sim::{DirectNavigator, FlatGround, RecordingAudio, SimUnit, WaypointNavigator};
use glam::Vec3;
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Navigator {
    Direct,
    Waypoint,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Controller,
    Velocity,
}

/// Headless Formation Runner - scripted march for tuning and regression
#[derive(Parser, Debug)]
#[command(name = "formation_runner")]
#[command(about = "Run a scripted formation march and output a JSON summary")]
struct Args {
    /// Formation config (TOML). Defaults apply to missing keys.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Shape name, e.g. Box9, Wedge9, Column10
    #[arg(long)]
    shape: Option<String>,

    /// Movement integration strategy; overrides the config
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Number of units to spawn
    #[arg(long, default_value_t = 9)]
    units: usize,

    /// Target x coordinate
    #[arg(long, default_value_t = 30.0)]
    target_x: f32,

    /// Target z coordinate
    #[arg(long, default_value_t = 30.0)]
    target_z: f32,

    /// Anchor speed
    #[arg(long, default_value_t = 2.0)]
    speed: f32,

    /// Anchor navigation back-end
    #[arg(long, value_enum, default_value = "direct")]
    navigator: Navigator,

    /// Time spent forming up before the march starts
    #[arg(long, default_value_t = 2.0)]
    form_time: f32,

    /// Variable tick length
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f32,

    /// Fixed tick length
    #[arg(long, default_value_t = 0.02)]
    fixed_dt: f32,

    /// Maximum variable ticks before giving up
    #[arg(long, default_value_t = 20_000)]
    max_ticks: u64,

    /// Disband once the anchor arrives
    #[arg(long)]
    disband: bool,

    /// Random seed for jitter and disband scatter
    #[arg(long)]
    seed: Option<u64>,

    /// Output format: json or text
    #[arg(long, default_value = "json")]
    format: String,

    /// Print formation events to stderr
    #[arg(long, short = 'v')]
    verbose: bool,
}

/// JSON output structure
#[derive(Serialize)]
struct RunSummary {
    shape: String,
    movement_mode: String,
    final_state: String,
    ticks: u64,
    arrived_tick: Option<u64>,
    disbanded: bool,
    units_assigned: usize,
    mean_slot_error: f32,
    max_slot_error: f32,
    recomputes: usize,
    errors: usize,
    seed: u64,
}

fn parse_shape(name: &str) -> Option<ShapeId> {
    serde_json::from_value(serde_json::Value::String(name.to_string())).ok()
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("formation_grid=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(summary) => {
            print_summary(&summary, &args.format);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("formation_runner: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> formation_grid::core::Result<RunSummary> {
    let mut config = match &args.config {
        Some(path) => FormationConfig::load(path)?,
        None => FormationConfig::new().with_shape(ShapeId::Box9),
    };
    if let Some(name) = &args.shape {
        match parse_shape(name) {
            Some(shape) => config.shape = shape,
            None => eprintln!("Unknown shape '{}', keeping {:?}", name, config.shape),
        }
    }
    if let Some(mode) = args.mode {
        config.movement_mode = match mode {
            Mode::Controller => MovementMode::ControllerIntegration,
            Mode::Velocity => MovementMode::VelocityIntegration,
        };
    }
    let seed = args.seed.unwrap_or(config.seed);
    config.seed = seed;

    let mode = config.movement_mode;
    let audio = RecordingAudio::default();
    let mut formation =
        Formation::new(config, Box::new(FlatGround::new(0.0)))?.with_audio(Box::new(audio));

    let origin = formation.pose().position;
    let target = Vec3::new(args.target_x, 0.0, args.target_z);
    let provider: SharedNavigator;
    let stepper: Box<dyn Fn(f32)>;
    match args.navigator {
        Navigator::Direct => {
            let nav = Rc::new(RefCell::new(DirectNavigator::new(origin, args.speed)));
            let handle = nav.clone();
            provider = nav;
            stepper = Box::new(move |dt| handle.borrow_mut().step(dt));
        }
        Navigator::Waypoint => {
            let nav = Rc::new(RefCell::new(WaypointNavigator::new(origin, args.speed)));
            let handle = nav.clone();
            provider = nav;
            stepper = Box::new(move |dt| handle.borrow_mut().step(dt));
        }
    }
    formation.set_anchor(AnchorAdapter::new(provider).with_target(target));

    // Spawn units in a loose row behind the origin
    let units: Vec<Rc<RefCell<SimUnit>>> = (0..args.units)
        .map(|i| {
            let position = origin + Vec3::new(i as f32 - args.units as f32 / 2.0, 0.0, -6.0);
            let unit = match mode {
                MovementMode::ControllerIntegration => SimUnit::kinematic(position),
                MovementMode::VelocityIntegration => SimUnit::rigid_body(position),
            };
            Rc::new(RefCell::new(unit))
        })
        .collect();
    let handles: Vec<UnitRef> = units.iter().map(|u| u.clone() as UnitRef).collect();
    let assigned = formation.assign_units_detailed(handles).assigned.len();

    formation.change_state(FormationState::Forming);
    formation.schedule_state_change(FormationState::Moving, args.form_time);

    let mut fixed_accumulator = 0.0;
    let mut arrived_tick = None;
    let mut recomputes = 0;
    let mut errors = 0;

    while formation.tick_count() < args.max_ticks {
        stepper(args.dt);

        fixed_accumulator += args.dt;
        while fixed_accumulator >= args.fixed_dt {
            formation.fixed_tick(args.fixed_dt);
            if mode == MovementMode::VelocityIntegration {
                for unit in &units {
                    unit.borrow_mut().step(args.fixed_dt);
                }
            }
            fixed_accumulator -= args.fixed_dt;
        }
        if mode == MovementMode::ControllerIntegration {
            for unit in &units {
                unit.borrow_mut().step(args.dt);
            }
        }

        let report = formation.tick(args.dt);
        if report.arrived && arrived_tick.is_none() {
            arrived_tick = Some(formation.tick_count());
            if args.disband {
                formation.change_state(FormationState::Disbanding);
            }
        }

        for event in formation.drain_events() {
            match event.event_type {
                FormationEventType::PositionsRecomputed => recomputes += 1,
                FormationEventType::ErrorReported { .. } => errors += 1,
                _ => {}
            }
            if args.verbose {
                eprintln!("  [{}] {:?}: {}", event.tick, event.event_type, event.description);
            }
        }

        let finished = match formation.state() {
            FormationState::Arrived => !args.disband,
            FormationState::Disbanding => formation.is_disbanded(),
            _ => false,
        };
        if finished {
            break;
        }
    }

    let slot_errors: Vec<f32> = formation
        .slots()
        .iter()
        .filter_map(|slot| slot.distance_to_unit())
        .collect();
    let max_slot_error = slot_errors.iter().copied().fold(0.0, f32::max);
    let mean_slot_error = if slot_errors.is_empty() {
        0.0
    } else {
        slot_errors.iter().sum::<f32>() / slot_errors.len() as f32
    };

    Ok(RunSummary {
        shape: format!("{:?}", formation.shape()),
        movement_mode: format!("{:?}", formation.movement_mode()),
        final_state: format!("{:?}", formation.state()),
        ticks: formation.tick_count(),
        arrived_tick,
        disbanded: formation.is_disbanded(),
        units_assigned: assigned,
        mean_slot_error,
        max_slot_error,
        recomputes,
        errors,
        seed,
    })
}

fn print_summary(summary: &RunSummary, format: &str) {
    match format {
        "text" => {
            println!("Formation Run");
            println!("=============");
            println!("Shape: {} ({})", summary.shape, summary.movement_mode);
            println!("Final state: {}", summary.final_state);
            println!("Ticks: {}", summary.ticks);
            match summary.arrived_tick {
                Some(tick) => println!("Arrived at tick: {}", tick),
                None => println!("Arrived at tick: never"),
            }
            println!("Disbanded: {}", summary.disbanded);
            println!("Units assigned: {}", summary.units_assigned);
            println!(
                "Slot error: mean {:.3}, max {:.3}",
                summary.mean_slot_error, summary.max_slot_error
            );
            println!("Recomputes: {}, errors: {}", summary.recomputes, summary.errors);
            println!("Seed: {}", summary.seed);
        }
        other => {
            if other != "json" {
                eprintln!("Unknown format '{}', defaulting to json", other);
            }
            match serde_json::to_string_pretty(summary) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("formation_runner: {}", e),
            }
        }
    }
}
