/// 1 局面を並列最良優先探索で評価する。
///
/// 根の期待値・上下限と、各合法手の評価を表示する。`--rounds` を指定すると同じ探索木で
/// 続きを探索し、ラウンドごとに結果を出す。
///
/// # 使用例
///
/// ```shell
/// cargo run -p tools --release --bin evaluate_position -- \
///   --moves f5d6c3d3c4 --visits 5000000 --threads 8
///
/// # 乱数で 20 手進めた局面を 10 秒、JSON で出力
/// cargo run -p tools --release --bin evaluate_position -- \
///   --random-plies 20 --seed 7 --time-ms 10000 --json
///
/// # 設定ファイル（SearchConfig の TOML）を使う
/// cargo run -p tools --release --bin evaluate_position -- \
///   --moves f5 --config search.toml --rounds 5
/// ```
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser as _;
use rand::Rng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rand_xoshiro::rand_core::SeedableRng;
use serde::Serialize;

use reversi_core::bitboard::BitIter;
use reversi_core::eval::PositionalEvaluator;
use reversi_core::movegen::{get_all_moves_with_pass, get_moves};
use reversi_core::position::Board;
use reversi_core::tree::NodeSnapshot;
use reversi_core::types::Square;
use reversi_core::{Coordinator, SearchConfig, SearchLimits, SearchStatus};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(clap::Parser, Debug)]
#[command(about = "evaluate an Othello position with the best-first probabilistic search")]
struct Cli {
    /// Moves from the initial position (e.g. "f5d6c3")
    #[arg(long, default_value = "")]
    moves: String,

    /// Play this many random plies after --moves
    #[arg(long, default_value_t = 0)]
    random_plies: u32,

    /// Seed for --random-plies
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Lower bound of the window (odd)
    #[arg(long, default_value_t = -63, allow_hyphen_values = true)]
    lower: i32,

    /// Upper bound of the window (odd)
    #[arg(long, default_value_t = 63, allow_hyphen_values = true)]
    upper: i32,

    /// Maximum positions visited per round
    #[arg(long)]
    visits: Option<u64>,

    /// Maximum time per round in milliseconds
    #[arg(long)]
    time_ms: Option<u64>,

    /// Number of search threads (default: `n_threads` in the config)
    #[arg(long)]
    threads: Option<usize>,

    /// Number of rounds (evaluate, then continue)
    #[arg(long, default_value_t = 1)]
    rounds: u32,

    /// Treat the root as solved once it is very likely outside the window
    #[arg(long)]
    approx: bool,

    /// Search config file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the result as JSON lines
    #[arg(long)]
    json: bool,
}

// ---------------------------------------------------------------------------
// 出力
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct MoveReport {
    #[serde(rename = "move")]
    square: String,
    /// 手番側から見た期待値
    eval: f64,
    lower: i32,
    upper: i32,
    visited: u64,
}

#[derive(Serialize)]
struct RoundReport {
    round: u32,
    status: SearchStatus,
    eval: f64,
    lower: i32,
    upper: i32,
    visited: u64,
    tree_nodes: usize,
    elapsed_ms: u128,
    moves: Vec<MoveReport>,
    root: NodeSnapshot,
}

fn build_position(cli: &Cli) -> Result<Board> {
    let mut board =
        Board::from_sequence(&cli.moves).with_context(|| format!("invalid move sequence {:?}", cli.moves))?;
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(cli.seed);
    for ply in 0..cli.random_plies {
        let moves = get_all_moves_with_pass(board.player(), board.opponent());
        if moves.is_empty() {
            log::warn!("game over after {ply} random plies");
            break;
        }
        board = board.play_flip(moves[rng.random_range(0..moves.len())]);
    }
    Ok(board)
}

fn load_config(cli: &Cli) -> Result<SearchConfig> {
    let Some(path) = &cli.config else {
        return Ok(SearchConfig::default());
    };
    let source = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    SearchConfig::from_toml_str(&source).with_context(|| format!("invalid config {}", path.display()))
}

/// `--threads` が無ければ設定のスレッド数
fn search_threads(cli: &Cli, config: &SearchConfig) -> usize {
    cli.threads.unwrap_or(config.n_threads)
}

fn limits(cli: &Cli) -> SearchLimits {
    let mut limits = SearchLimits::infinite();
    if let Some(visits) = cli.visits {
        limits = limits.with_visits(visits);
    }
    if let Some(time_ms) = cli.time_ms {
        limits = limits.with_time(Duration::from_millis(time_ms));
    }
    limits
}

/// 根の子を合法手と対応させる（パスのときは "pass"）
fn move_reports(board: Board, children: &[NodeSnapshot]) -> Vec<MoveReport> {
    let squares: Vec<(String, Board)> = BitIter::new(get_moves(board.player(), board.opponent()))
        .filter_map(|bit| {
            let square = Square::from_bit(bit);
            board.play(square).map(|child| (square.to_string(), child))
        })
        .collect();
    let mut reports: Vec<MoveReport> = children
        .iter()
        .map(|child| {
            let square = squares
                .iter()
                .find(|(_, b)| *b == child.board())
                .map_or_else(|| "pass".to_string(), |(name, _)| name.clone());
            MoveReport {
                square,
                eval: -child.get_eval(),
                lower: -child.upper(),
                upper: -child.lower(),
                visited: child.n_visited(),
            }
        })
        .collect();
    reports.sort_by(|a, b| b.eval.total_cmp(&a.eval));
    reports
}

fn report(search: &Coordinator, board: Board, round: u32, status: SearchStatus) -> Result<RoundReport> {
    let root = search.root().context("search has no root")?;
    Ok(RoundReport {
        round,
        status,
        eval: root.get_eval(),
        lower: root.lower(),
        upper: root.upper(),
        visited: search.visited(),
        tree_nodes: search.tree_nodes(),
        elapsed_ms: search.elapsed().as_millis(),
        moves: move_reports(board, &search.root_children()),
        root,
    })
}

fn print_report(report: &RoundReport) {
    println!(
        "round {}: {} eval {:+.2} [{}, {}] visited {} nodes {} ({} ms)",
        report.round,
        report.status,
        report.eval,
        report.lower,
        report.upper,
        report.visited,
        report.tree_nodes,
        report.elapsed_ms
    );
    for m in &report.moves {
        println!("  {:>4} {:+7.2} [{:>3}, {:>3}] {:>12}", m.square, m.eval, m.lower, m.upper, m.visited);
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();
    let cli = Cli::parse();
    if cli.rounds == 0 {
        bail!("--rounds must be positive");
    }
    if cli.visits.is_none() && cli.time_ms.is_none() {
        log::warn!("no --visits or --time-ms: searching until the root is solved");
    }

    let board = build_position(&cli)?;
    let config = load_config(&cli)?;
    log::info!(
        "position ({} empties):\n{board}config: {}",
        board.n_empties(),
        config.to_toml_string().unwrap_or_default().trim_end()
    );
    let n_threads = search_threads(&cli, &config);
    log::info!("search threads: {n_threads}");
    let mut search = Coordinator::new(config, PositionalEvaluator::factory()).context("failed to create search")?;
    let limits = limits(&cli);

    let mut status = search
        .evaluate(board, cli.lower, cli.upper, limits, n_threads, cli.approx)
        .context("search failed")?;
    for round in 1..=cli.rounds {
        if round > 1 {
            if !status.can_continue() || status == SearchStatus::Solved {
                break;
            }
            status = search.continue_evaluate(limits, n_threads).context("search failed")?;
        }
        let report = report(&search, board, round, status)?;
        if cli.json {
            println!("{}", serde_json::to_string(&report)?);
        } else {
            print_report(&report);
        }
    }
    Ok(())
}
