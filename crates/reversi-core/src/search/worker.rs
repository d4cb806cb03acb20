//! 探索ワーカー
//!
//! 1 スレッドに 1 つ。根から葉を選んで確保し、展開するか厳密に解いて、経路を更新する。
//! ソルバと評価器はワーカーごとに持つ。

use std::sync::Arc;
use std::time::Duration;

use crossbeam_utils::Backoff;

use super::coordinator::SearchContext;
use crate::error::ChildError;
use crate::eval::{EvaluatorFactory, FeatureEvaluator};
use crate::movegen::get_all_moves_with_pass;
use crate::solver::{AlphaBetaSolver, SolverStats, StatsKind};
use crate::tree::{Children, SearchCursor};
use crate::tt::TranspositionTable;
use crate::types::{eval_to_large, EvalLarge, LESS_THAN_MIN_EVAL, MAX_EVAL_LARGE, MIN_EVAL_LARGE};

/// 厳密解の訪問数の予算の下限
const MIN_VISITED_FOR_SOLVE: f64 = 50_000.0;

/// 子の初期評価の読みの深さ
///
/// `delta` は浅い評価と閾値の差（8 倍スケール）。残りの仕事が多いほど、閾値に近いほど深く読む。
fn seed_depth(father_depth: u32, remaining_work: f64, delta: EvalLarge) -> u32 {
    if father_depth > 0 && father_depth <= 2 && remaining_work > 1e8 {
        5
    } else if remaining_work > 2e7 || (delta < 16 * 8 && remaining_work > 1e7) || (delta < 8 * 8 && remaining_work > 2e6)
    {
        4
    } else if remaining_work > 4e6 || (delta < 16 * 8 && remaining_work > 2e6) || delta < 8 * 8 {
        3
    } else {
        2
    }
}

/// 葉の処理の失敗。それまでの訪問数を持つ
#[derive(Debug)]
pub(crate) struct LeafFailure {
    pub n_visited: u64,
    pub error: ChildError,
}

pub(crate) struct Worker {
    id: usize,
    solver: AlphaBetaSolver,
    evaluator: Box<dyn FeatureEvaluator>,
    stats: SolverStats,
    /// このワーカーが根に加えた訪問数
    n_visited: u64,
}

impl Worker {
    pub fn new(id: usize, tt: Option<Arc<TranspositionTable>>, factory: &EvaluatorFactory) -> Self {
        Self {
            id,
            solver: AlphaBetaSolver::new(tt, factory),
            evaluator: factory(),
            stats: SolverStats::new(),
            n_visited: 0,
        }
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    #[inline]
    pub fn stats(&self) -> &SolverStats {
        &self.stats
    }

    #[inline]
    pub fn n_visited(&self) -> u64 {
        self.n_visited
    }

    #[inline]
    pub fn credit(&mut self, n_visited: u64) {
        self.n_visited += n_visited;
    }

    pub fn reset(&mut self) {
        self.stats.reset();
        self.n_visited = 0;
    }

    /// 停止条件を満たすまで葉を処理する
    pub fn run(&mut self, ctx: &SearchContext<'_>) {
        let arena = ctx.arena();
        let root = ctx.root();
        let backoff = Backoff::new();
        let mut last_goal = LESS_THAN_MIN_EVAL;
        log::trace!("worker {} started", self.id);
        while !ctx.check_finished() {
            ctx.update_weak_lower_upper();
            let Some(cursor) = SearchCursor::best_descendant(arena, root, ctx.thread_multiplier(), last_goal) else {
                self.stats.add(1, StatsKind::NextPositionFail);
                ctx.on_claim_failed();
                self.wait(&backoff, ctx.claim_retry_backoff());
                continue;
            };
            backoff.reset();
            self.stats.add(1, StatsKind::NextPositionSuccess);
            ctx.on_claim_succeeded();

            let node = arena.node(cursor.leaf());
            // 根の視点の閾値
            last_goal = if node.depth() % 2 == 0 { cursor.goal() } else { -cursor.goal() };
            let n_tree_nodes = arena.len() as u32;
            let root_visited = arena.node(root).n_visited();
            let (to_be_solved, remaining_work) = node.with_stats(|stats| {
                (
                    stats.to_be_solved(cursor.alpha(), cursor.beta(), n_tree_nodes, root_visited),
                    stats.remaining_work(cursor.alpha(), cursor.beta()),
                )
            });
            let result = if to_be_solved {
                self.solve_position(ctx, &cursor, remaining_work.max(MIN_VISITED_FOR_SOLVE) as u64)
            } else {
                self.add_children(ctx, &cursor)
            };
            let n_visited = match result {
                Ok(n_visited) => n_visited,
                Err(failure) => {
                    ctx.fail(self.id, failure.error);
                    failure.n_visited
                }
            };
            self.n_visited += n_visited;
            cursor.finalize(arena, n_visited);
            ctx.mark_started();
        }
        log::trace!("worker {} finished: {} visited", self.id, self.n_visited);
    }

    fn wait(&self, backoff: &Backoff, sleep: Duration) {
        if backoff.is_completed() && !sleep.is_zero() {
            std::thread::sleep(sleep);
        } else {
            backoff.snooze();
        }
    }

    /// 葉を展開する
    ///
    /// 子を作って（既にあれば再利用して）浅い読みで初期評価し、葉に付ける。
    pub fn add_children(&mut self, ctx: &SearchContext<'_>, cursor: &SearchCursor) -> Result<u64, LeafFailure> {
        let arena = ctx.arena();
        let id = cursor.leaf();
        let node = arena.node(id);
        let board = node.board();
        let depth = node.depth();
        let mut n_visited = 1;
        self.stats.add(1, StatsKind::TreeNode);

        let moves = get_all_moves_with_pass(board.player(), board.opponent());
        if moves.is_empty() {
            let eval = eval_to_large(board.game_over_eval());
            node.set_solved(eval, eval, ctx.window());
            return Ok(n_visited);
        }

        self.evaluator.setup(board.player(), board.opponent());
        self.evaluator.invert();
        let child_goal = -eval_to_large(cursor.goal());
        let remaining_work = node.with_stats(|stats| stats.remaining_work(cursor.alpha(), cursor.beta()));
        let mut children = Children::new();

        for &flip in moves.iter() {
            let square = flip & board.empties();
            let child_board = board.play_flip(flip);
            if flip != 0 {
                self.evaluator.update(square, flip);
            }
            let Some((child_id, newly_added)) = ctx.add_node(child_board, depth + 1) else {
                if flip != 0 {
                    self.evaluator.undo_update(square, flip);
                }
                ctx.out_of_tree_nodes();
                return Ok(n_visited);
            };
            let child = arena.node(child_id);
            if newly_added || !child.has_leaf_eval() {
                let quick_eval = self.evaluator.evaluate();
                let eval_depth = seed_depth(depth, remaining_work, (quick_eval - child_goal).abs());
                let eval = self.solver.evaluate(child_board, eval_depth, MIN_EVAL_LARGE, MAX_EVAL_LARGE);
                let child_visited = self.solver.n_visited();
                self.stats.merge(self.solver.stats());
                n_visited += child_visited;
                child.set_leaf_eval(eval, eval_depth.min(4));
                child.add_descendants(child_visited);
            }
            children.push(child_id);
            if flip != 0 {
                self.evaluator.undo_update(square, flip);
            }
        }
        node.set_children(id, &children, arena, ctx.window())
            .map_err(|error| LeafFailure { n_visited, error })?;
        Ok(n_visited)
    }

    /// 葉を [alpha, beta] で厳密に解く。予算を超えたら展開に切り替える
    fn solve_position(
        &mut self,
        ctx: &SearchContext<'_>,
        cursor: &SearchCursor,
        max_visited: u64,
    ) -> Result<u64, LeafFailure> {
        let node = ctx.arena().node(cursor.leaf());
        let board = node.board();
        let alpha = eval_to_large(cursor.alpha());
        let beta = eval_to_large(cursor.beta());
        // 幅 0 の窓は 1 だけ広げる（厳密解の値は 8 の倍数）
        let (lower, upper) = if alpha < beta { (alpha, beta) } else { (alpha - 1, beta + 1) };
        let eval = self.solver.solve(board, board.n_empties(), lower, upper, max_visited);
        let seen = self.solver.n_visited() + 1;
        self.stats.merge(self.solver.stats());
        self.stats.add(1, StatsKind::TreeNode);

        let Some(eval) = eval else {
            self.stats.add(seen, StatsKind::SolvedTooEarly);
            log::warn!(
                "solve aborted after {seen} positions ({} empties, budget {max_visited}); expanding instead",
                board.n_empties()
            );
            return match self.add_children(ctx, cursor) {
                Ok(n_visited) => Ok(seen + n_visited),
                Err(failure) => Err(LeafFailure {
                    n_visited: seen + failure.n_visited,
                    error: failure.error,
                }),
            };
        };
        debug_assert!((MIN_EVAL_LARGE..=MAX_EVAL_LARGE).contains(&eval));
        node.set_solved(
            if eval > lower { eval } else { MIN_EVAL_LARGE },
            if eval < upper { eval } else { MAX_EVAL_LARGE },
            ctx.window(),
        );
        Ok(seen)
    }
}
