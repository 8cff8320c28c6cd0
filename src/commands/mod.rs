use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};
use serde_json::Value;
use swarm::{
    ActionStats, Behavior, BuiltinBehavior, DEFAULT_API_URL, DEFAULT_MAX_STEPS, DecisionEngine,
    ExclusionFile, ExclusionWindow, GameClient, HttpGameClient, StrategyConfig, UnitKind,
    WorldSnapshot, load_action_stats, record_submitted_batch, reset_action_stats,
    save_action_stats,
    state::{self, STATE_DIR, Status},
    summarize,
};
use tracing::{info, warn};

const DEFAULT_STRATEGY_FILE: &str = ".swarm/strategy.json";
const DEFAULT_EXCLUSIONS_FILE: &str = ".swarm/last_direct_actions.json";

#[derive(Parser)]
#[command(
    name = "swarm",
    version,
    about = "Tick-driven colony bot (world model, pathing, phased decisions)",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialize local runtime state
    Init,
    /// Run the decision loop against the game server
    Run {
        /// Number of turns to play (omit for continuous)
        #[arg(short = 't', long)]
        turns: Option<u64>,
        /// Delay between turns in milliseconds
        #[arg(long, default_value_t = 2000)]
        tick_ms: u64,
        /// Base URL of the game API
        #[arg(long, default_value = DEFAULT_API_URL)]
        api_url: String,
        /// API key sent as X-API-Key
        #[arg(long, env = "SWARM_API_KEY")]
        api_key: String,
        /// Per-request HTTP timeout in milliseconds
        #[arg(long, default_value_t = 10_000)]
        timeout_ms: u64,
        /// Strategy JSON, re-read every turn
        #[arg(long, default_value = DEFAULT_STRATEGY_FILE)]
        strategy_file: PathBuf,
        /// Direct-command exclusions JSON, re-read every turn
        #[arg(long, default_value = DEFAULT_EXCLUSIONS_FILE)]
        exclusions_file: PathBuf,
        /// Tile budget for a single path search
        #[arg(long, default_value_t = DEFAULT_MAX_STEPS)]
        max_steps: usize,
        /// Enable a built-in behavior (repeatable): spawn_cap_guard, critical_spawn_filler
        #[arg(long = "behavior", action = ArgAction::Append)]
        behaviors: Vec<BehaviorArg>,
    },
    /// Decide one turn offline from a snapshot file and print the actions
    Think {
        /// Snapshot JSON (the `data` object of /game/state)
        snapshot: PathBuf,
        #[arg(long, default_value = DEFAULT_STRATEGY_FILE)]
        strategy_file: PathBuf,
        #[arg(long, default_value_t = DEFAULT_MAX_STEPS)]
        max_steps: usize,
        #[arg(long = "behavior", action = ArgAction::Append)]
        behaviors: Vec<BehaviorArg>,
    },
    /// Print the advisor summary of a snapshot file as TOON
    Summary {
        snapshot: PathBuf,
    },
    /// Show runtime status and submitted action totals
    Status,
    /// Ask a running loop to stop after its current turn
    Stop,
}

#[derive(Clone, Copy, Debug)]
pub struct BehaviorArg(pub BuiltinBehavior);

impl FromStr for BehaviorArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BuiltinBehavior::from_str(s).map(BehaviorArg).map_err(|_| {
            let known: Vec<_> = BuiltinBehavior::ALL.iter().map(|b| b.label()).collect();
            format!("unknown behavior `{}` (known: {})", s, known.join(", "))
        })
    }
}

pub fn run() {
    let cli = Cli::parse();
    if let Err(err) = dispatch(cli.command) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn dispatch(command: Command) -> Result<(), String> {
    match command {
        Command::Init => run_init(),
        Command::Run {
            turns,
            tick_ms,
            api_url,
            api_key,
            timeout_ms,
            strategy_file,
            exclusions_file,
            max_steps,
            behaviors,
        } => {
            let client = HttpGameClient::new(api_url, api_key, Duration::from_millis(timeout_ms))
                .map_err(|e| e.to_string())?;
            let options = LoopOptions {
                turns,
                tick: Duration::from_millis(tick_ms),
                strategy_file,
                exclusions_file,
                max_steps,
            };
            run_loop(&client, &options, build_behaviors(&behaviors))
        }
        Command::Think {
            snapshot,
            strategy_file,
            max_steps,
            behaviors,
        } => run_think(&snapshot, &strategy_file, max_steps, build_behaviors(&behaviors)),
        Command::Summary { snapshot } => run_summary(&snapshot),
        Command::Status => run_status(),
        Command::Stop => run_stop(),
    }
}

fn build_behaviors(args: &[BehaviorArg]) -> Vec<Box<dyn Behavior>> {
    let mut enabled: Vec<BuiltinBehavior> = Vec::new();
    for arg in args {
        if !enabled.contains(&arg.0) {
            enabled.push(arg.0);
        }
    }
    enabled.into_iter().map(BuiltinBehavior::build).collect()
}

fn state_dir() -> &'static Path {
    Path::new(STATE_DIR)
}

fn run_init() -> Result<(), String> {
    state::init_state(state_dir()).map_err(|e| e.to_string())?;
    reset_action_stats(state_dir()).map_err(|e| e.to_string())?;
    println!(
        "Initialized state at {}",
        state::state_file_path(state_dir()).display()
    );
    Ok(())
}

fn run_status() -> Result<(), String> {
    match state::load_state(state_dir()).map_err(|e| e.to_string())? {
        None => {
            println!("Status: not initialized. Run `swarm init`.");
        }
        Some(state) => {
            println!(
                "Status: {} | last_tick={} | message={}",
                state.status,
                state.last_tick,
                state.message.unwrap_or_else(|| "-".into())
            );
        }
    }
    print_action_summary()
}

fn run_stop() -> Result<(), String> {
    let current = state::load_state(state_dir()).map_err(|e| e.to_string())?;
    let Some(prev) = current else {
        return Err("Not initialized. Run `swarm init` first.".into());
    };
    let updated = state::set_status(
        state_dir(),
        Status::Stopped,
        prev.last_tick,
        Some("stopped by user".into()),
    )
    .map_err(|e| e.to_string())?;
    println!("Stopped. last_tick={}", updated.last_tick);
    print_action_summary()
}

struct LoopOptions {
    turns: Option<u64>,
    tick: Duration,
    strategy_file: PathBuf,
    exclusions_file: PathBuf,
    max_steps: usize,
}

fn run_loop(
    client: &dyn GameClient,
    options: &LoopOptions,
    behaviors: Vec<Box<dyn Behavior>>,
) -> Result<(), String> {
    let dir = state_dir();
    let mut last_tick = state::load_state(dir)
        .map_err(|e| e.to_string())?
        .map(|s| s.last_tick)
        .unwrap_or(0);
    state::set_status(dir, Status::Running, last_tick, Some("starting".into()))
        .map_err(|e| e.to_string())?;

    let mut stats_store = load_action_stats(dir).map_err(|e| e.to_string())?;
    let mut engine = DecisionEngine::new(options.max_steps);
    let mut exclusions = ExclusionWindow::default();
    let mut strategy_digest = String::new();
    let mut turns_played = 0u64;

    info!(
        behaviors = behaviors.len(),
        max_steps = options.max_steps,
        "decision loop started"
    );

    loop {
        if options.turns.is_some_and(|limit| turns_played >= limit) {
            break;
        }
        if state::stop_requested(dir).map_err(|e| e.to_string())? {
            info!("stop requested, leaving loop");
            break;
        }
        turns_played += 1;

        let raw = match client.fetch_state() {
            Ok(raw) => raw,
            Err(err) => {
                warn!(error = %err, "fetch failed, skipping turn");
                thread::sleep(options.tick);
                continue;
            }
        };
        let world = WorldSnapshot::from_json(&raw);

        let strategy = StrategyConfig::load_or_default(&options.strategy_file);
        let digest = strategy.digest();
        if digest != strategy_digest {
            info!(
                digest = %digest,
                mode = %strategy.priority_mode,
                worker_cap = strategy.worker_cap,
                soldier_cap = strategy.soldier_cap,
                tower_cap = strategy.tower_cap,
                "strategy changed"
            );
            strategy_digest = digest;
        }

        if let Some(file) = ExclusionFile::load(&options.exclusions_file) {
            exclusions.merge(&file);
        }
        exclusions.prune(world.tick);

        let actions = engine.decide(&world, &strategy, &exclusions, &behaviors);
        let batch = ActionStats::from_batch(&actions);
        log_turn(&world, &batch);

        match client.submit_actions(&actions) {
            Ok(()) => {
                record_submitted_batch(&mut stats_store, &batch);
                if let Err(err) = save_action_stats(dir, &stats_store) {
                    warn!(error = %err, "could not persist action stats");
                }
            }
            Err(err) => warn!(tick = world.tick, error = %err, "submit failed"),
        }

        last_tick = world.tick;
        if state::stop_requested(dir).map_err(|e| e.to_string())? {
            info!(tick = last_tick, "stop requested, leaving loop");
            break;
        }
        state::set_status(
            dir,
            Status::Running,
            last_tick,
            Some(format!("tick {} | {}", world.tick, batch)),
        )
        .map_err(|e| e.to_string())?;

        thread::sleep(options.tick);
    }

    if !state::stop_requested(dir).map_err(|e| e.to_string())? {
        state::set_status(
            dir,
            Status::Stopped,
            last_tick,
            Some(format!("finished after {} turns", turns_played)),
        )
        .map_err(|e| e.to_string())?;
    }
    print_action_summary()
}

fn log_turn(world: &WorldSnapshot, batch: &ActionStats) {
    let spawn_energy: Vec<u32> = world.spawns().iter().map(|s| s.energy).collect();
    info!(
        tick = world.tick,
        workers = world.count_units(UnitKind::Worker),
        soldiers = world.count_units(UnitKind::Soldier),
        enemies = world.enemies.len(),
        spawn_energy = ?spawn_energy,
        actions = %batch,
        "turn"
    );
}

fn read_snapshot(path: &Path) -> Result<WorldSnapshot, String> {
    let bytes = fs::read(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    let value: Value = serde_json::from_slice(&bytes).map_err(|e| e.to_string())?;
    // Accept either the bare `data` object or the full API envelope.
    let data = match value.get("data") {
        Some(inner) if value.get("success").is_some() => inner.clone(),
        _ => value,
    };
    Ok(WorldSnapshot::from_json(&data))
}

fn run_think(
    snapshot: &Path,
    strategy_file: &Path,
    max_steps: usize,
    behaviors: Vec<Box<dyn Behavior>>,
) -> Result<(), String> {
    let world = read_snapshot(snapshot)?;
    let strategy = StrategyConfig::load_or_default(strategy_file);
    let mut engine = DecisionEngine::new(max_steps);
    let actions = engine.decide(&world, &strategy, &ExclusionWindow::default(), &behaviors);

    let json = serde_json::to_string_pretty(&actions).map_err(|e| e.to_string())?;
    println!("{}", json);
    println!(
        "Tick {}: {} actions ({})",
        world.tick,
        actions.len(),
        ActionStats::from_batch(&actions)
    );
    Ok(())
}

fn run_summary(snapshot: &Path) -> Result<(), String> {
    let world = read_snapshot(snapshot)?;
    println!("{}", summarize(&world).to_toon());
    Ok(())
}

fn print_action_summary() -> Result<(), String> {
    let store = load_action_stats(state_dir()).map_err(|e| e.to_string())?;
    if store.ticks == 0 {
        println!("No action stats recorded.");
        return Ok(());
    }
    println!(
        "Submitted over {} turns: transfer={} harvest={} move={} attack={} build={} spawn={}",
        store.ticks,
        store.totals.transfer_count,
        store.totals.harvest_count,
        store.totals.move_count,
        store.totals.attack_count,
        store.totals.build_count,
        store.totals.spawn_count
    );
    Ok(())
}
