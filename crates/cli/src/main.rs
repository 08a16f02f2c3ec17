use anyhow::Context;
use clap::{Parser, Subcommand};
use glitchdice_core::{
    ComboLoop, ComboOutcome, ComboStep, Engine, Event, EventBus, HandResult, RandomBoardProvider,
    RngState, ScoringContext, Upgrade,
};
use glitchdice_data::{load_board, load_engine_config, load_loadout, Loadout};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "glitchdice", about = "Dice board scoring and glitch combo simulator")]
struct Cli {
    /// Directory holding engine.json.
    #[arg(long, default_value = "assets", global = true)]
    assets: PathBuf,

    /// Log every resolution and combo step.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve one board and print the result as JSON.
    Resolve {
        #[arg(long)]
        board: PathBuf,
        #[arg(long)]
        upgrades: Option<PathBuf>,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Overrides the loadout's global multiplier.
        #[arg(long)]
        global_mult: Option<f64>,
    },
    /// Roll random boards and run seeded combo rounds.
    Simulate {
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long, default_value_t = 10)]
        rounds: u32,
        #[arg(long)]
        upgrades: Option<PathBuf>,
        /// Chance that a rolled die is a special kind.
        #[arg(long, default_value_t = 0.2)]
        special_chance: f64,
    },
}

#[derive(Serialize)]
struct ResolveReport<'a> {
    hand: &'a HandResult,
    raw_sum: i64,
    dice: Vec<DieReport>,
    fired: Vec<&'static str>,
    consumed: &'a [u32],
    rerolls_granted: u32,
}

#[derive(Serialize)]
struct DieReport {
    slot: usize,
    kind: &'static str,
    value: u8,
    effective_value: u8,
    total: i32,
}

#[derive(Serialize)]
struct RoundReport {
    round: u32,
    combo_count: u32,
    stored_score: i32,
    settling_hand: String,
    settled_score: i32,
    round_total: i32,
    capped: bool,
}

impl RoundReport {
    fn from_outcome(round: u32, outcome: &ComboOutcome) -> Self {
        Self {
            round,
            combo_count: outcome.state.combo_count,
            stored_score: outcome.state.stored_score,
            settling_hand: outcome.resolution.hand.display_name.clone(),
            settled_score: outcome.settled_score,
            round_total: outcome.round_total,
            capped: outcome.capped,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let config = load_engine_config(&cli.assets)?;
    let engine = Engine::new(config).context("build engine")?;

    match cli.command {
        Command::Resolve {
            board,
            upgrades,
            seed,
            global_mult,
        } => run_resolve(&engine, &board, upgrades.as_deref(), seed, global_mult),
        Command::Simulate {
            seed,
            rounds,
            upgrades,
            special_chance,
        } => run_simulate(&engine, seed, rounds, upgrades.as_deref(), special_chance),
    }
}

fn init_tracing(debug: bool) {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(debug, env.as_deref()))
        .with_writer(std::io::stderr)
        .init();
}

/// `--debug` wins, then a parseable `RUST_LOG`, then `warn`.
fn log_filter(debug: bool, env: Option<&str>) -> EnvFilter {
    if debug {
        return EnvFilter::new("debug");
    }
    env.and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"))
}

fn loadout_from(path: Option<&Path>) -> anyhow::Result<Loadout> {
    match path {
        Some(path) => load_loadout(path),
        None => Ok(Loadout::default()),
    }
}

fn run_resolve(
    engine: &Engine,
    board_path: &Path,
    upgrades_path: Option<&Path>,
    seed: u64,
    global_mult: Option<f64>,
) -> anyhow::Result<()> {
    let mut board = load_board(board_path)?;
    if board.shape() != engine.config().grid {
        warn!(
            board = ?board.shape(),
            engine = ?engine.config().grid,
            "board file shape differs from the engine grid, using the board's"
        );
    }
    let mut loadout = loadout_from(upgrades_path)?;
    if let Some(mult) = global_mult {
        loadout.context.global_multiplier = mult;
    }
    let mut rng = RngState::from_seed(seed);
    let resolution = engine.resolve(&mut board, &loadout.upgrades, &loadout.context, &mut rng);

    let report = ResolveReport {
        hand: &resolution.hand,
        raw_sum: resolution.raw_sum,
        dice: board
            .dice()
            .map(|(slot, die)| DieReport {
                slot,
                kind: die.kind.id(),
                value: die.value,
                effective_value: die.effective_value(),
                total: die.total(),
            })
            .collect(),
        fired: resolution.fired.iter().map(|f| f.kind.name()).collect(),
        consumed: &resolution.consumed,
        rerolls_granted: resolution.rerolls_granted,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_simulate(
    engine: &Engine,
    seed: u64,
    rounds: u32,
    upgrades_path: Option<&Path>,
    special_chance: f64,
) -> anyhow::Result<()> {
    let Loadout {
        mut upgrades,
        mut context,
    } = loadout_from(upgrades_path)?;
    let mut provider = RandomBoardProvider::new(engine.config().grid)
        .with_special_chance(special_chance)
        .with_roll_upgrades(&upgrades);
    let mut rng = RngState::from_seed(seed);
    let mut events = EventBus::default();
    let mut combo = ComboLoop::new(engine);
    let mut best = 0;

    for round in 1..=rounds {
        combo.start_round();
        provider.start_round();
        let outcome = run_round(
            &mut combo,
            &mut provider,
            &mut upgrades,
            &mut context,
            &mut rng,
            &mut events,
        );
        for event in events.drain() {
            if let Event::GlitchChained {
                combo_count,
                contribution,
                ..
            } = event
            {
                info!(round = round, combo = combo_count, contribution = contribution, "glitch");
            }
        }
        best = best.max(outcome.round_total);
        println!(
            "{}",
            serde_json::to_string(&RoundReport::from_outcome(round, &outcome))?
        );
    }
    eprintln!("best round total: {best}");
    Ok(())
}

/// Steps one round to settlement, dropping consumables as they fire.
fn run_round(
    combo: &mut ComboLoop<'_>,
    provider: &mut RandomBoardProvider,
    upgrades: &mut Vec<Upgrade>,
    ctx: &mut ScoringContext,
    rng: &mut RngState,
    events: &mut EventBus,
) -> ComboOutcome {
    loop {
        let step = combo.step(provider, upgrades, ctx, rng, events);
        let (consumed, settled) = match step {
            ComboStep::Continue(progress) => (progress.resolution.consumed, None),
            ComboStep::Settled(outcome) => {
                (outcome.resolution.consumed.clone(), Some(outcome))
            }
        };
        upgrades.retain(|upgrade| !consumed.contains(&upgrade.acquisition_order));
        if let Some(outcome) = settled {
            return outcome;
        }
    }
}
