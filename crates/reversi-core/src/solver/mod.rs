//! 固定深さの alpha-beta ソルバ
//!
//! 探索木の葉の初期評価（浅い読み）と、終盤の厳密解の両方に使う。
//!
//! - `move_iter`: 深さごとの着手順序付け
//! - `last_moves`: 残り 1〜5 マスの専用ソルバ
//! - `stats`: 種類ごとの訪問数
//!
//! 窓は fail-soft。値は 8 倍スケール（`EvalLarge`）。

pub mod last_moves;
pub mod move_iter;
pub mod stats;

use std::sync::Arc;

use crate::bitboard::{stable_disks, upper_bound_from_stable};
use crate::estimators::{byte_to_proof_number, proof_number};
use crate::eval::{EvaluatorFactory, FeatureEvaluator};
use crate::movegen::{get_flip, get_moves, new_opponent, new_player};
use crate::position::{game_over_eval, Board};
use crate::tt::TranspositionTable;
use crate::types::{
    eval_to_large, large_to_eval_lower, large_to_eval_upper, EvalLarge, Square, LESS_THAN_MIN_EVAL_LARGE,
    MAX_EVAL_LARGE, MIN_EVAL_LARGE,
};

use last_moves::{eval_five_empties, eval_last_moves};
use move_iter::{MoveIter, MoveOrdering, MIN_EMPTIES_FOR_DISPROOF_NUMBER};

pub use stats::{SolverStats, StatsKind};

// =============================================================================
// 定数
// =============================================================================

/// 深さ 1 の読みで、0 手読みの評価と 1 手読みの評価を混ぜる重み
const WEIGHT_DEPTH_ZERO: EvalLarge = 1;
const WEIGHT_DEPTH_ONE: EvalLarge = 2;

/// 厳密解で置換表を使う最小の空きマス数
const MIN_EMPTIES_FOR_TT: u32 = 10;
/// 読みで置換表を使う最小の深さ
const MIN_DEPTH_FOR_TT: u32 = 3;

/// 確定石による枝刈りを行う最小の深さ
const MIN_DEPTH_FOR_STABILITY_CUTOFF: u32 = 4;

/// 訪問数の見積もりによる打ち切りを試す最小の深さ（厳密解のみ）
const MIN_DEPTH_FOR_EARLY_FILTER: u32 = 14;

/// 着手順序付けを安い方式に落とす最大の深さ
const MAX_DEPTH_FOR_UNLIKELY_ORDERING: u32 = 13;

#[inline]
const fn use_tt(depth: u32, solve: bool) -> bool {
    (solve && depth >= MIN_EMPTIES_FOR_TT) || (!solve && depth >= MIN_DEPTH_FOR_TT)
}

#[inline]
const fn updates_evaluator(depth: u32, solve: bool) -> bool {
    !solve || depth >= MIN_EMPTIES_FOR_DISPROOF_NUMBER
}

// =============================================================================
// ソルバ
// =============================================================================

/// alpha-beta ソルバ
///
/// ワーカーごとに 1 つ持つ。評価器は差分更新の状態を持つので共有しない。
/// 置換表は全ワーカーで共有する。
pub struct AlphaBetaSolver {
    tt: Option<Arc<TranspositionTable>>,
    evaluator: Box<dyn FeatureEvaluator>,
    stats: SolverStats,
}

impl AlphaBetaSolver {
    pub fn new(tt: Option<Arc<TranspositionTable>>, factory: &EvaluatorFactory) -> Self {
        Self {
            tt,
            evaluator: factory(),
            stats: SolverStats::new(),
        }
    }

    /// 直前の呼び出しの訪問数
    #[inline]
    pub fn stats(&self) -> &SolverStats {
        &self.stats
    }

    #[inline]
    pub fn n_visited(&self) -> u64 {
        self.stats.total()
    }

    /// 深さ `depth` の読み（空きマス数以上なら厳密解）
    ///
    /// 厳密解で訪問数が `max_visited` を超えそうなら打ち切って None。
    pub fn solve(
        &mut self,
        board: Board,
        depth: u32,
        lower: EvalLarge,
        upper: EvalLarge,
        max_visited: u64,
    ) -> Option<EvalLarge> {
        let eval = self.run(board, depth, lower, upper, max_visited);
        (eval != LESS_THAN_MIN_EVAL_LARGE).then_some(eval)
    }

    /// 打ち切りなしの読み
    pub fn evaluate(&mut self, board: Board, depth: u32, lower: EvalLarge, upper: EvalLarge) -> EvalLarge {
        let eval = self.run(board, depth, lower, upper, u64::MAX);
        debug_assert!(eval != LESS_THAN_MIN_EVAL_LARGE);
        eval
    }

    fn run(&mut self, board: Board, depth: u32, lower: EvalLarge, upper: EvalLarge, max_visited: u64) -> EvalLarge {
        debug_assert!((MIN_EVAL_LARGE..MAX_EVAL_LARGE).contains(&lower));
        debug_assert!(lower < upper && upper <= MAX_EVAL_LARGE);
        self.stats.reset();
        let (player, opponent) = (board.player(), board.opponent());
        let n_empties = board.n_empties();
        let depth = depth.min(n_empties);
        // 打ち切りで途中の状態が崩れても、ここで毎回作り直す
        self.evaluator.setup(player, opponent);
        self.stats.add(1, StatsKind::Last5);
        if depth == n_empties {
            if n_empties <= 5 {
                let mut n_visited = 0;
                let eval = eval_last_moves(
                    player,
                    opponent,
                    large_to_eval_lower(lower),
                    large_to_eval_upper(upper),
                    &mut n_visited,
                );
                self.stats.add(n_visited, StatsKind::Last5);
                return eval_to_large(eval);
            }
            self.evaluate_internal::<true, false>(depth, player, opponent, lower, upper, 0, 0, max_visited)
        } else if depth == 0 {
            self.evaluator.evaluate()
        } else {
            self.evaluate_internal::<false, false>(depth, player, opponent, lower, upper, 0, 0, max_visited)
        }
    }

    /// 子を全て証明するための推定訪問数の和
    fn visited_to_disprove(&mut self, player: u64, opponent: u64, upper: EvalLarge) -> f64 {
        let mut to_be_visited = 0.0;
        let mut candidates = get_moves(player, opponent);
        while candidates != 0 {
            let square = candidates.trailing_zeros();
            candidates &= candidates - 1;
            let flip = get_flip(square, player, opponent);
            let square = 1u64 << square;
            self.evaluator.update(square, flip);
            to_be_visited += self.visited_to_prove(new_player(flip, opponent), new_opponent(flip, player), -upper);
            self.evaluator.undo_update(square, flip);
        }
        to_be_visited
    }

    /// 評価器が子の局面を持っている状態で呼ぶ
    #[inline]
    fn visited_to_prove(&self, player: u64, opponent: u64, lower: EvalLarge) -> f64 {
        byte_to_proof_number(proof_number(player, opponent, lower, self.evaluator.evaluate())) as f64
    }

    /// 本体
    ///
    /// `depth` は残り深さ（厳密解では空きマス数）。`PASSED` は直前がパス。
    /// 訪問数の超過で打ち切ったときは `LESS_THAN_MIN_EVAL_LARGE` を返す。
    #[allow(clippy::too_many_arguments)]
    fn evaluate_internal<const SOLVE: bool, const PASSED: bool>(
        &mut self,
        depth: u32,
        player: u64,
        opponent: u64,
        lower: EvalLarge,
        upper: EvalLarge,
        last_flip: u64,
        stable: u64,
        max_visited: u64,
    ) -> EvalLarge {
        debug_assert!((MIN_EVAL_LARGE..MAX_EVAL_LARGE).contains(&lower));
        debug_assert!(MIN_EVAL_LARGE < upper && upper <= MAX_EVAL_LARGE);
        debug_assert!(depth > 0);

        let mut new_stable = stable;
        let mut stability_cutoff_upper = upper;
        if depth >= MIN_DEPTH_FOR_STABILITY_CUTOFF {
            new_stable = stable_disks(opponent, player, stable);
            stability_cutoff_upper = eval_to_large(upper_bound_from_stable(new_stable, opponent));
            if stability_cutoff_upper <= lower {
                return stability_cutoff_upper;
            }
        }

        let use_tt = use_tt(depth, SOLVE);
        let entry = if use_tt {
            self.tt.as_ref().and_then(|tt| tt.get(player, opponent))
        } else {
            None
        };
        if let Some(entry) = entry.filter(|entry| entry.depth as u32 >= depth) {
            if entry.lower >= upper || entry.lower == entry.upper {
                return entry.lower;
            } else if entry.upper <= lower {
                return entry.upper;
            }
        }

        let updates_evaluator = updates_evaluator(depth, SOLVE);
        let mut depth_zero_eval = lower;
        if updates_evaluator {
            depth_zero_eval = self.evaluator.evaluate();
            self.evaluator.invert();
        }
        let unlikely = stability_cutoff_upper < lower + 120 || depth_zero_eval < lower - 40;
        let ordering = MoveOrdering::for_node(depth, SOLVE, unlikely && depth <= MAX_DEPTH_FOR_UNLIKELY_ORDERING);
        let mut moves = MoveIter::new(
            ordering,
            player,
            opponent,
            last_flip,
            upper,
            entry.and_then(|entry| entry.best_move),
            self.evaluator.as_mut(),
        );

        let try_early_filter = SOLVE && depth >= MIN_DEPTH_FOR_EARLY_FILTER && depth_zero_eval < upper - 32;
        let mut to_be_visited = 0.0;
        if try_early_filter {
            debug_assert!(updates_evaluator);
            to_be_visited = self.visited_to_disprove(player, opponent, upper);
        }
        if SOLVE && to_be_visited + self.stats.total() as f64 > max_visited as f64 {
            return LESS_THAN_MIN_EVAL_LARGE;
        }

        let mut best_eval = LESS_THAN_MIN_EVAL_LARGE;
        let mut best_move: Option<Square> = None;
        let mut second_best_eval = LESS_THAN_MIN_EVAL_LARGE;
        let mut second_best_move: Option<Square> = None;
        while let Some(flip) = moves.next_flip(&mut self.stats) {
            let square = flip & !(player | opponent);
            if updates_evaluator {
                self.evaluator.update(square, flip);
            }
            let child_player = new_player(flip, opponent);
            let child_opponent = new_opponent(flip, player);
            let current_eval = if SOLVE && depth == 6 {
                let mut n_visited = 0;
                let eval = -eval_to_large(eval_five_empties(
                    child_player,
                    child_opponent,
                    large_to_eval_lower(-upper),
                    large_to_eval_upper(-lower.max(best_eval)),
                    flip,
                    new_stable,
                    &mut n_visited,
                ));
                self.stats.add(n_visited, StatsKind::Last5);
                eval
            } else if !SOLVE && depth == 1 {
                (depth_zero_eval * WEIGHT_DEPTH_ZERO - self.evaluator.evaluate() * WEIGHT_DEPTH_ONE)
                    / (WEIGHT_DEPTH_ZERO + WEIGHT_DEPTH_ONE)
            } else {
                if try_early_filter {
                    to_be_visited -= self.visited_to_prove(child_player, child_opponent, -upper);
                }
                -self.evaluate_internal::<SOLVE, false>(
                    depth - 1,
                    child_player,
                    child_opponent,
                    -upper,
                    -lower.max(best_eval),
                    flip,
                    new_stable,
                    max_visited.saturating_sub(to_be_visited.max(0.0) as u64),
                )
            };
            if current_eval == -LESS_THAN_MIN_EVAL_LARGE {
                return LESS_THAN_MIN_EVAL_LARGE;
            }
            let square = Square::from_bit(square);
            if current_eval > best_eval {
                second_best_eval = best_eval;
                second_best_move = best_move;
                best_eval = current_eval;
                best_move = Some(square);
            } else if current_eval > second_best_eval {
                second_best_eval = current_eval;
                second_best_move = Some(square);
            }
            if updates_evaluator {
                self.evaluator.undo_update(square.bit(), flip);
            }
            if best_eval >= upper {
                break;
            }
        }

        if best_eval == LESS_THAN_MIN_EVAL_LARGE {
            if PASSED {
                best_eval = eval_to_large(game_over_eval(player, opponent));
            } else {
                self.stats.add(1, StatsKind::Pass);
                best_eval = -self.evaluate_internal::<SOLVE, true>(
                    depth,
                    opponent,
                    player,
                    -upper,
                    -lower,
                    last_flip,
                    new_stable,
                    max_visited,
                );
                if best_eval == -LESS_THAN_MIN_EVAL_LARGE {
                    return LESS_THAN_MIN_EVAL_LARGE;
                }
            }
        } else if use_tt {
            if let Some(tt) = &self.tt {
                tt.update(player, opponent, depth as u8, best_eval, lower, upper, best_move, second_best_move);
            }
        }
        if updates_evaluator {
            self.evaluator.invert();
        }
        best_eval
    }
}
