use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use rand::{rngs::StdRng, SeedableRng};

use expectimax_2048::config::Config;
use expectimax_2048::engine::Board;
use expectimax_2048::expectimax::Expectimax;
use expectimax_2048::rules::RuleBased;
use expectimax_2048::selfplay::{play_game, GameSummary, RunSummary};
use expectimax_2048::strategy::{RandomStrategy, Strategy};

#[derive(Parser, Debug)]
#[command(name = "expectimax-2048", about = "Expectimax move engine for 2048")]
struct Args {
    #[command(subcommand)]
    cmd: Cmd,
    /// Size of rayon's global pool
    #[arg(long, global = true)]
    threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Pick a move for one board.
    Decide {
        /// 16 face values, e.g. "0 2 2 0 / 0 0 0 0 / 0 0 0 0 / 0 0 0 0"
        #[arg(long)]
        board: String,
        /// TOML config with [search] and [rules] sections
        #[arg(long)]
        config: Option<PathBuf>,
        /// Use the rule-based policy instead of the search
        #[arg(long, default_value_t = false)]
        rules: bool,
    },
    /// Play local games and report score statistics.
    Play {
        #[arg(long, default_value_t = 1)]
        games: u32,
        #[arg(long, value_enum, default_value_t = StrategyKind::Expectimax)]
        strategy: StrategyKind,
        /// Seed for tile spawns (game i uses seed + i) and policy fallbacks
        #[arg(long)]
        seed: Option<u64>,
        /// Stop each game after this many moves
        #[arg(long)]
        max_moves: Option<u64>,
        /// Disable the status line
        #[arg(long, default_value_t = false)]
        quiet: bool,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum StrategyKind {
    Expectimax,
    Rules,
    Random,
}

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    if let Some(n) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .context("failed to size the rayon pool")?;
    }
    match args.cmd {
        Cmd::Decide { board, config, rules } => decide(&board, config.as_deref(), rules),
        Cmd::Play { games, strategy, seed, max_moves, quiet, config } => {
            let cfg = load_config(config.as_deref())?;
            play(cfg, strategy, games, seed, max_moves, quiet)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_toml(path).with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn decide(board: &str, config: Option<&Path>, rules: bool) -> Result<ExitCode> {
    let cfg = load_config(config)?;
    let board: Board = board.parse().with_context(|| format!("invalid board {board:?}"))?;
    println!("{}", board);
    let chosen = if rules {
        RuleBased::new(cfg.rules).decide(board)
    } else {
        let mut ex = Expectimax::with_config(cfg.search);
        let (chosen, branches) = ex.best_move_with_evals(board);
        for branch in branches {
            let note = if branch.legal { "" } else { " (no-op)" };
            println!("{:>5}: {:.6e}{}", branch.dir, branch.ev, note);
        }
        let stats = ex.last_stats();
        debug!("depth {} nodes {}", stats.depth, stats.nodes);
        chosen
    };
    match chosen {
        Some(dir) => {
            println!("{}", dir);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            println!("no legal move");
            Ok(ExitCode::from(2))
        }
    }
}

fn build_strategy(kind: StrategyKind, mut cfg: Config, seed: Option<u64>) -> Box<dyn Strategy> {
    if seed.is_some() {
        cfg.search.fallback_seed = cfg.search.fallback_seed.or(seed);
        cfg.rules.fallback_seed = cfg.rules.fallback_seed.or(seed);
    }
    match kind {
        StrategyKind::Expectimax => Box::new(Expectimax::with_config(cfg.search)),
        StrategyKind::Rules => Box::new(RuleBased::new(cfg.rules)),
        StrategyKind::Random => Box::new(RandomStrategy::new(seed)),
    }
}

fn play(cfg: Config, kind: StrategyKind, games: u32, seed: Option<u64>, max_moves: Option<u64>, quiet: bool) -> Result<()> {
    let mut strategy = build_strategy(kind, cfg, seed);
    let pb = if quiet { ProgressBar::hidden() } else { ProgressBar::new_spinner() };
    pb.set_style(
        ProgressStyle::with_template("{spinner} {elapsed_precise} | game {prefix} | moves: {msg}")?
            .tick_chars("⠁⠃⠇⠧⠷⠿⠻⠟⠯⠷⠧⠇⠃"),
    );
    pb.enable_steady_tick(Duration::from_millis(120));

    let start = Instant::now();
    let mut results: Vec<GameSummary> = Vec::with_capacity(games as usize);
    for game in 0..games {
        pb.set_prefix(format!("{}/{}", game + 1, games));
        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s.wrapping_add(game as u64)),
            None => StdRng::from_entropy(),
        };
        let mut moves = 0u64;
        let summary = play_game(&mut strategy, &mut rng, max_moves, |board| {
            moves += 1;
            pb.set_message(format!("{} | score: {}", moves, board.score()));
        });
        info!(
            "game {}: {} moves, score {}, highest tile {}",
            game + 1,
            summary.moves,
            summary.score,
            summary.highest_tile
        );
        if !quiet {
            pb.println(format!("{}", summary.final_board));
        }
        results.push(summary);
    }
    pb.finish_and_clear();

    let elapsed = start.elapsed().as_secs_f64().max(1e-6);
    if let Some(run) = RunSummary::from_games(&results) {
        println!(
            "{} | games: {} | highest score: {} | median: {:.1} | average: {:.1} | highest tile: {} | moves/sec: {:.1}",
            strategy.name(),
            run.games,
            run.highest_score,
            run.median_score,
            run.average_score,
            run.highest_tile,
            run.total_moves as f64 / elapsed
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threads_apply_to_every_subcommand() {
        let args = Args::try_parse_from(["expectimax-2048", "decide", "--board", "2 2 . . / . . . . / . . . . / . . . .", "--threads", "2"]).unwrap();
        assert_eq!(args.threads, Some(2));
        assert!(matches!(args.cmd, Cmd::Decide { rules: false, .. }));
        let args = Args::try_parse_from(["expectimax-2048", "--threads", "3", "play", "--games", "2"]).unwrap();
        assert_eq!(args.threads, Some(3));
        assert!(matches!(args.cmd, Cmd::Play { games: 2, strategy: StrategyKind::Expectimax, .. }));
        let args = Args::try_parse_from(["expectimax-2048", "play"]).unwrap();
        assert_eq!(args.threads, None);
    }
}
