//! ノードの統計量（NodeStats）
//!
//! 探索木のノードが持つデータのうち、ロックやリンクを含まない部分。
//! 確定値の上下限、追跡中の閾値の窓、閾値ごとの `ScoreEstimate`、葉の初期評価を持ち、
//! 子からの集約・各種クエリを実装する。
//!
//! - 木の中では `TreeNode` がこれを Mutex で包む
//! - 木の外（スナップショット、定跡）ではそのまま値として扱う
//!
//! 閾値 g は奇数、上下限は偶数。`solved(g) == (g < lower || g > upper)`。

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::estimate::{ScoreEstimate, LOG_DERIVATIVE_MINUS_INF};
use crate::estimators::PROB_STEP;
use crate::position::Board;
use crate::types::{
    eval_to_large, large_to_eval_round, Eval, EvalLarge, LESS_THAN_MIN_EVAL,
    LESS_THAN_MIN_EVAL_LARGE, MAX_EVAL, MAX_EVAL_LARGE, MIN_EVAL, MIN_EVAL_LARGE,
};

/// これより確率の低い（高い）隣の閾値があれば、その閾値は選ばない
const MIN_PROB_EVAL_GOAL: f64 = 0.03;
/// 窓を広げる目安の確率
const ZERO_PERC_FOR_WEAK: f64 = 0.05;
/// 探索窓 [alpha, beta] を絞るパーセンタイル
pub const PROB_FOR_ENDGAME_ALPHA_BETA: f64 = 0.05;

/// 子を畳み込む順序のキー
#[inline]
pub(crate) fn board_order(board: Board) -> (u64, u64) {
    (board.player(), board.opponent())
}

/// ノードの統計量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStats {
    board: Board,
    n_empties: u32,
    depth: u32,
    evaluator: u8,
    lower: Eval,
    upper: Eval,
    weak_lower: Eval,
    weak_upper: Eval,
    min_evaluation: Eval,
    evaluations: Vec<ScoreEstimate>,
    leaf_eval: EvalLarge,
    eval_depth: u32,
    is_leaf: bool,
}

impl NodeStats {
    /// 未評価の葉
    pub fn new(board: Board, depth: u32, evaluator: u8) -> Self {
        NodeStats {
            board,
            n_empties: board.n_empties(),
            depth,
            evaluator,
            lower: MIN_EVAL,
            upper: MAX_EVAL,
            // 空の窓
            weak_lower: 1,
            weak_upper: -1,
            min_evaluation: LESS_THAN_MIN_EVAL,
            evaluations: Vec::new(),
            leaf_eval: LESS_THAN_MIN_EVAL_LARGE,
            eval_depth: 0,
            is_leaf: true,
        }
    }

    #[inline]
    pub fn board(&self) -> Board {
        self.board
    }

    #[inline]
    pub fn player(&self) -> u64 {
        self.board.player()
    }

    #[inline]
    pub fn opponent(&self) -> u64 {
        self.board.opponent()
    }

    #[inline]
    pub fn n_empties(&self) -> u32 {
        self.n_empties
    }

    #[inline]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    #[inline]
    pub fn evaluator(&self) -> u8 {
        self.evaluator
    }

    /// 確定した下限
    #[inline]
    pub fn lower(&self) -> Eval {
        self.lower
    }

    /// 確定した上限
    #[inline]
    pub fn upper(&self) -> Eval {
        self.upper
    }

    /// 追跡中で未解決の最小の閾値
    #[inline]
    pub fn weak_lower(&self) -> Eval {
        self.weak_lower.max(self.lower + 1)
    }

    /// 追跡中で未解決の最大の閾値
    #[inline]
    pub fn weak_upper(&self) -> Eval {
        self.weak_upper.min(self.upper - 1)
    }

    /// 追跡中の窓（上下限で切り詰める前）
    #[inline]
    pub fn raw_weak_lower_upper(&self) -> (Eval, Eval) {
        (self.weak_lower, self.weak_upper)
    }

    #[inline]
    pub fn leaf_eval(&self) -> EvalLarge {
        self.leaf_eval
    }

    #[inline]
    pub fn has_leaf_eval(&self) -> bool {
        self.leaf_eval != LESS_THAN_MIN_EVAL_LARGE
    }

    #[inline]
    pub fn eval_depth(&self) -> u32 {
        self.eval_depth
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.is_leaf
    }

    pub(crate) fn set_internal(&mut self) {
        self.is_leaf = false;
    }

    #[inline]
    fn index(&self, goal: Eval) -> usize {
        debug_assert!(goal % 2 != 0);
        debug_assert!(goal >= self.min_evaluation);
        ((goal - self.min_evaluation) >> 1) as usize
    }

    /// 閾値 `goal` の統計量
    #[inline]
    pub fn estimate(&self, goal: Eval) -> &ScoreEstimate {
        debug_assert!(goal >= self.weak_lower && goal <= self.weak_upper);
        &self.evaluations[self.index(goal)]
    }

    #[inline]
    fn estimate_mut(&mut self, goal: Eval) -> &mut ScoreEstimate {
        debug_assert!(goal >= self.weak_lower && goal <= self.weak_upper);
        let index = self.index(goal);
        &mut self.evaluations[index]
    }

    /// 窓内の未解決の閾値
    #[inline]
    pub fn goals(&self) -> impl DoubleEndedIterator<Item = Eval> + use<> {
        (self.weak_lower()..self.weak_upper() + 1).step_by(2)
    }

    /// 閾値 `goal` 以上になる確率
    #[inline]
    pub fn prob_greater_equal(&self, goal: Eval) -> f64 {
        self.estimate(goal).probability()
    }

    pub fn proof_number(&self, goal: Eval) -> f32 {
        if goal < self.lower {
            0.0
        } else if goal > self.upper {
            f32::MAX
        } else {
            self.estimate(goal).proof_number()
        }
    }

    pub fn disproof_number(&self, goal: Eval) -> f32 {
        if goal < self.lower {
            f32::MAX
        } else if goal > self.upper {
            0.0
        } else {
            self.estimate(goal).disproof_number()
        }
    }

    pub fn max_log_derivative(&self, goal: Eval) -> i32 {
        self.estimate(goal).max_log_derivative()
    }

    /// 期待値 `lower' - 1 + Σ 2 p(g)`
    pub fn get_eval(&self) -> f64 {
        let mut eval = (self.weak_lower() - 1) as f64;
        for goal in self.goals() {
            eval += 2.0 * self.prob_greater_equal(goal);
        }
        eval
    }

    /// 評価値の分散（石数差 / 2 単位）
    pub fn uncertainty(&self) -> f64 {
        let lower = self.weak_lower();
        let mut e_x = (lower - 1) as f64;
        let mut e_x2 = ((lower - 1) * (lower - 1)) as f64;
        for goal in self.goals() {
            let prob = self.prob_greater_equal(goal);
            e_x += 2.0 * prob;
            // (g + 1)^2 - (g - 1)^2
            e_x2 += 4.0 * goal as f64 * prob;
        }
        (e_x2 - e_x * e_x) / 4.0
    }

    /// 確率が `p` より大きい最大の閾値（無ければ窓の下端 - 2）
    pub fn percentile_upper(&self, p: f64) -> Eval {
        self.goals()
            .rev()
            .find(|&goal| self.prob_greater_equal(goal) > p)
            .unwrap_or(self.weak_lower() - 2)
    }

    /// 確率が `1 - p` より小さい最小の閾値（無ければ窓の上端 + 2）
    pub fn percentile_lower(&self, p: f64) -> Eval {
        self.goals()
            .find(|&goal| self.prob_greater_equal(goal) < 1.0 - p)
            .unwrap_or(self.weak_upper() + 2)
    }

    pub fn solve_probability_upper(&self, upper: Eval) -> f64 {
        let goal = self.percentile_lower(0.5).min(upper);
        if goal > self.upper || goal < self.lower {
            return 0.0;
        }
        // 窓の更新が追いついていない（複数スレッド時のみ）
        if goal > self.weak_upper || goal < self.weak_lower {
            return 0.5;
        }
        self.prob_greater_equal(goal)
    }

    pub fn solve_probability_lower(&self, lower: Eval) -> f64 {
        let goal = self.percentile_upper(0.5).max(lower);
        if goal < self.lower || goal > self.upper {
            return 0.0;
        }
        if goal < self.weak_lower || goal > self.weak_upper {
            return 0.5;
        }
        1.0 - self.prob_greater_equal(goal)
    }

    /// 区間 [lower, upper] の外に値があると示せる確率
    pub fn solve_probability(&self, lower: Eval, upper: Eval) -> f64 {
        self.solve_probability_upper(upper).max(self.solve_probability_lower(lower))
    }

    /// [lower, upper] に対して解けているか。`approx` なら十分確からしい場合も含む
    pub fn is_solved(&self, lower: Eval, upper: Eval, approx: bool) -> bool {
        debug_assert!(lower % 2 != 0);
        self.upper <= lower
            || self.lower >= upper
            || self.lower == self.upper
            || (approx && self.solve_probability(lower, upper) < 0.05)
    }

    /// 閾値 `goal` について解けているか
    #[inline]
    pub fn is_solved_at(&self, goal: Eval) -> bool {
        self.is_solved(goal, goal, false)
    }

    /// [lower, upper] を解くための推定訪問数
    pub fn remaining_work(&self, lower: Eval, upper: Eval) -> f64 {
        debug_assert!(lower % 2 != 0 && upper % 2 != 0);
        if self.is_solved(lower, upper, false) {
            return 0.0;
        }
        let weak_lower = self.weak_lower();
        let weak_upper = self.weak_upper();
        let lower = lower.max(weak_lower);
        let upper = upper.min(weak_upper);
        let disproof = self.percentile_lower(0.5);
        let proof = disproof - 2;
        if disproof <= lower {
            self.estimate(lower.min(weak_upper)).disproof_number() as f64
        } else if proof >= upper {
            self.estimate(upper.max(weak_lower)).proof_number() as f64
        } else {
            self.estimate(proof).proof_number() as f64 + self.estimate(disproof).disproof_number() as f64
        }
    }

    /// 展開せずに厳密に解くべきか
    pub fn to_be_solved(&self, lower: Eval, upper: Eval, num_tree_nodes: u32, total_visited: u64) -> bool {
        let remaining_work = self.remaining_work(lower, upper);
        let delta = (eval_to_large(lower) - self.leaf_eval).max(self.leaf_eval - eval_to_large(upper));
        let frac = num_tree_nodes as f64 * 2000.0 / total_visited as f64;
        let mult = if frac < 1.0 { 5.0 * (frac - 0.8) } else { 1.0 };
        remaining_work < mult * (70000.0f64).min(10000.0 + (delta.max(0) as f64) * 250.0)
    }

    /// 解決に向けた進み具合（小さいほど進んでいる）
    pub fn advancement(&self) -> f64 {
        let mut result = -f64::MAX;
        for goal in self.goals() {
            result = result.max(self.max_log_derivative(goal) as f64);
        }
        if result == LOG_DERIVATIVE_MINUS_INF as f64 {
            result += self.remaining_work(self.weak_lower(), self.weak_upper()).ln() - 1e5;
        }
        result
    }

    /// 次に調べる閾値。直前の閾値 `last_goal` は避ける
    ///
    /// 候補が無ければ `LESS_THAN_MIN_EVAL`。
    pub fn next_position_eval_goal(&self, prob_min: f64, prob_max: f64, last_goal: Eval) -> Eval {
        let mut best_goal = LESS_THAN_MIN_EVAL;
        let mut best_value = -f64::MAX;
        for goal in self.goals() {
            let estimate = self.estimate(goal);
            let prob = estimate.probability();
            if prob < prob_min
                || prob > prob_max
                || estimate.proof_number_byte() == 0
                || estimate.disproof_number_byte() == 0
                || (goal + 2 < self.upper
                    && goal < self.weak_upper
                    && self.prob_greater_equal(goal + 2) > 1.0 - MIN_PROB_EVAL_GOAL)
                || (goal - 2 > self.lower
                    && goal > self.weak_lower
                    && self.prob_greater_equal(goal - 2) < MIN_PROB_EVAL_GOAL)
            {
                continue;
            }
            let value = if goal == last_goal {
                2.0 * LOG_DERIVATIVE_MINUS_INF as f64
            } else {
                estimate.max_log_derivative() as f64
            };
            if value > best_value {
                best_value = value;
                best_goal = goal;
            }
        }
        best_goal
    }

    /// 根の統計量から見た、次に追跡すべき窓
    pub fn expected_weak_lower_upper(&self) -> (Eval, Eval) {
        let mut weak_lower = (self.upper - 1).min((self.lower + 1).max(self.weak_lower));
        let mut weak_upper = (self.lower + 1).max((self.upper - 1).min(self.weak_upper));
        debug_assert!(weak_lower <= weak_upper);

        if weak_lower - 2 > self.lower
            && weak_lower >= self.weak_lower
            && weak_lower <= self.weak_upper
            && self.prob_greater_equal(weak_lower) < 1.0 - ZERO_PERC_FOR_WEAK
        {
            weak_lower -= 2;
        } else {
            let last = (self.upper - 1).min(self.weak_upper);
            let mut goal = weak_lower + 2;
            while goal <= last {
                if self.prob_greater_equal(goal) < 0.99 {
                    weak_lower = goal - 2;
                    break;
                }
                goal += 2;
            }
        }

        if weak_upper + 2 < self.upper
            && weak_upper >= self.weak_lower
            && weak_upper <= self.weak_upper
            && self.prob_greater_equal(weak_upper) > ZERO_PERC_FOR_WEAK
        {
            weak_upper += 2;
        } else {
            let first = (self.lower + 1).max(self.weak_lower);
            let mut goal = weak_upper - 2;
            while goal >= first {
                if self.prob_greater_equal(goal) > 0.01 {
                    weak_upper = goal + 2;
                    break;
                }
                goal -= 2;
            }
        }
        (weak_lower, weak_upper)
    }

    /// 窓 [weak_lower, weak_upper] が収まるように統計量の配列を広げる
    ///
    /// 中身は呼び出し側で計算し直す。
    pub fn enlarge_evaluations(&mut self) {
        self.min_evaluation = self.weak_lower;
        let size = ((self.weak_upper - self.min_evaluation) / 2 + 1).max(0) as usize;
        self.evaluations.resize(size, ScoreEstimate::default());
    }

    fn update_leaf_evaluation(&mut self, goal: Eval) {
        debug_assert!((1..=4).contains(&self.eval_depth));
        let (player, opponent) = (self.player(), self.opponent());
        let (leaf_eval, eval_depth, n_empties) = (self.leaf_eval, self.eval_depth, self.n_empties);
        self.estimate_mut(goal)
            .set_leaf(player, opponent, eval_to_large(goal), leaf_eval, eval_depth, n_empties);
    }

    fn update_leaf_evaluations(&mut self) {
        debug_assert!(self.is_leaf);
        for goal in self.goals() {
            self.update_leaf_evaluation(goal);
        }
    }

    /// 葉の窓を設定して統計量を計算し直す
    pub fn update_leaf_weak_lower_upper(&mut self, weak_lower: Eval, weak_upper: Eval) {
        debug_assert!(self.is_leaf);
        debug_assert!(weak_lower <= weak_upper);
        self.weak_lower = weak_lower;
        self.weak_upper = weak_upper;
        self.enlarge_evaluations();
        self.update_leaf_evaluations();
    }

    /// 内部ノードの窓を設定する（統計量は `update_father` で計算し直す）
    pub(crate) fn set_weak_lower_upper(&mut self, weak_lower: Eval, weak_upper: Eval) {
        debug_assert!(weak_lower <= weak_upper);
        self.weak_lower = weak_lower;
        self.weak_upper = weak_upper;
        self.enlarge_evaluations();
    }

    /// 新たに追跡する閾値が全て決まっているなら、子を見ずに窓を [weak_lower, weak_upper] にする
    ///
    /// 決まっている閾値は、解決済みのものと、窓の端の確率が同じ側で飽和しているもの
    /// （下端の確率が 1 なら下に、上端の確率が 0 なら上に広げる分）。後者は端の統計量を
    /// 換算して埋める。既存の統計量は位置をずらして保持する。新しい閾値が無い、または
    /// 決まらない閾値を含むなら何もせず false を返す。
    pub(crate) fn widen_settled_window(&mut self, weak_lower: Eval, weak_upper: Eval) -> bool {
        debug_assert!(weak_lower <= weak_upper);
        let (old_lower, old_upper) = (self.weak_lower, self.weak_upper);
        let lower_saturated = self.estimate(old_lower).prob_greater_equal() == PROB_STEP;
        let upper_saturated = self.estimate(old_upper).prob_greater_equal() == 0;
        let is_new = |goal: Eval| goal < old_lower || goal > old_upper;
        let mut any_new = false;
        for goal in (weak_lower..weak_upper + 1).step_by(2) {
            if !is_new(goal) {
                continue;
            }
            let solved = goal < self.lower || goal > self.upper;
            let saturated = if goal < old_lower { lower_saturated } else { upper_saturated };
            if !solved && !saturated {
                return false;
            }
            any_new = true;
        }
        if !any_new {
            return false;
        }
        let lower_estimate = *self.estimate(old_lower);
        let upper_estimate = *self.estimate(old_upper);
        let evaluations: Vec<ScoreEstimate> = (weak_lower..weak_upper + 1)
            .step_by(2)
            .map(|goal| {
                if !is_new(goal) {
                    return self.evaluations[self.index(goal)];
                }
                let mut estimate = ScoreEstimate::default();
                if goal < self.lower {
                    estimate.set_proved();
                } else if goal > self.upper {
                    estimate.set_disproved();
                } else if goal < old_lower {
                    estimate.set_proving(&lower_estimate, old_lower - goal);
                } else {
                    estimate.set_disproving(&upper_estimate, goal - old_upper);
                }
                estimate
            })
            .collect();
        self.weak_lower = weak_lower;
        self.weak_upper = weak_upper;
        self.min_evaluation = weak_lower;
        self.evaluations = evaluations;
        true
    }

    /// 窓が [weak_lower, weak_upper] を含むか
    #[inline]
    pub fn weak_lower_upper_contains(&self, weak_lower: Eval, weak_upper: Eval) -> bool {
        self.weak_lower <= weak_lower && weak_upper <= self.weak_upper
    }

    /// 葉の初期評価を設定。既に評価済みなら何もしない
    pub fn set_leaf_eval(&mut self, leaf_eval: EvalLarge, eval_depth: u32) {
        if self.has_leaf_eval() {
            return;
        }
        debug_assert!(self.is_leaf);
        debug_assert!((MIN_EVAL_LARGE..=MAX_EVAL_LARGE).contains(&leaf_eval));
        debug_assert!((1..=4).contains(&eval_depth));
        self.eval_depth = eval_depth;
        self.leaf_eval = leaf_eval.clamp(eval_to_large(self.lower), eval_to_large(self.upper));
    }

    /// 厳密解の上下限（EvalLarge、16 の倍数）を反映する。統計量は更新しない
    pub fn set_solved_no_update(&mut self, lower: EvalLarge, upper: EvalLarge) {
        debug_assert!(lower % 16 == 0 && upper % 16 == 0);
        debug_assert!(self.is_leaf);
        self.leaf_eval = self.leaf_eval.max(lower).min(upper);
        self.lower = self.lower.max(large_to_eval_round(lower));
        self.upper = self.upper.min(large_to_eval_round(upper));
        debug_assert!(self.lower <= MAX_EVAL && self.upper >= MIN_EVAL);
    }

    /// 厳密解の上下限を反映し、窓 [weak_lower, weak_upper] で統計量を計算し直す
    pub fn set_solved(&mut self, lower: EvalLarge, upper: EvalLarge, weak_lower: Eval, weak_upper: Eval) {
        self.set_solved_no_update(lower, upper);
        self.update_leaf_weak_lower_upper(weak_lower, weak_upper);
    }

    /// 上限を下げる
    pub fn set_upper(&mut self, upper: Eval) {
        self.upper = self.upper.min(upper);
        self.leaf_eval = self.leaf_eval.min(eval_to_large(self.upper));
    }

    /// 下限を上げる
    pub fn set_lower(&mut self, lower: Eval) {
        self.lower = self.lower.max(lower);
        self.leaf_eval = self.leaf_eval.max(eval_to_large(self.lower));
    }

    /// 子からの集約の開始。`finish_update_father` に渡す暫定の上限を返す
    pub fn begin_update_father(&mut self) -> Eval {
        debug_assert!(!self.is_leaf);
        debug_assert!(self.weak_lower % 2 != 0 && self.weak_upper % 2 != 0);
        debug_assert!(self.lower % 2 == 0 && self.upper % 2 == 0);
        self.leaf_eval = eval_to_large(self.lower);
        for goal in self.goals() {
            self.estimate_mut(goal).initialize();
        }
        self.lower
    }

    /// 子を 1 つ畳み込む。`new_upper` は子の下限から求まる上限候補
    pub fn update_with_child(&mut self, child: &NodeStats, new_upper: &mut Eval) {
        debug_assert!(child.leaf_eval >= eval_to_large(child.lower));
        debug_assert!(child.leaf_eval <= eval_to_large(child.upper));
        self.lower = self.lower.max(-child.upper);
        self.leaf_eval = self.leaf_eval.max(-child.leaf_eval);
        self.weak_lower = self.weak_lower.max(-child.weak_upper);
        self.weak_upper = self.weak_upper.min(-child.weak_lower);
        let first = self.weak_lower();
        let last = self.weak_upper();
        let mut goal = first;
        while goal <= last {
            if -goal >= child.lower {
                let child_estimate = *child.estimate(-goal);
                self.estimate_mut(goal).update_father_with_child(&child_estimate);
            }
            goal += 2;
        }
        *new_upper = (*new_upper).max(-child.lower);
        debug_assert!(self.weak_lower <= self.weak_upper);
    }

    /// 子からの集約の仕上げ
    pub fn finish_update_father(&mut self, new_upper: Eval) {
        if new_upper < self.upper {
            self.upper = new_upper;
        }
        self.leaf_eval = self.leaf_eval.min(eval_to_large(self.upper));
        for goal in self.goals() {
            self.estimate_mut(goal).finalize();
        }
        debug_assert!(MIN_EVAL <= self.lower && self.lower <= self.upper && self.upper <= MAX_EVAL);
    }

    /// 子の集合から統計量を計算し直す
    ///
    /// 量子化した合成は結合的でないので、子は局面の順（`board_order`）に畳み込む。
    pub fn update_father<'a>(&mut self, children: impl IntoIterator<Item = &'a NodeStats>) {
        let mut children: SmallVec<[&NodeStats; 16]> = children.into_iter().collect();
        children.sort_unstable_by_key(|child| board_order(child.board()));
        let mut new_upper = self.begin_update_father();
        for child in children {
            self.update_with_child(child, &mut new_upper);
        }
        self.finish_update_father(new_upper);
    }

    /// 親 `father` の閾値 `-goal` に対する、この子（閾値 `goal`）を選ぶ価値
    pub fn child_value(&self, father: &NodeStats, goal: Eval, thread_multiplier: f64, n_threads: u32) -> f64 {
        let estimate = self.estimate(goal);
        let father_estimate = father.estimate(-goal);
        if father_estimate.probability() < 0.99 {
            return estimate.log_derivative(father_estimate)
                - self.leaf_eval as f64 / (MAX_EVAL_LARGE - MIN_EVAL_LARGE) as f64
                - thread_multiplier * n_threads as f64 * father_estimate.prob_lower_cubed();
        }
        -(estimate.disproof_number_byte() as f64) - 0.4 * self.leaf_eval as f64 / 8.0
    }

    /// 子として選べるか（閾値 `goal` が未解決かつ窓内）
    #[inline]
    pub fn is_selectable(&self, goal: Eval) -> bool {
        goal > self.lower && goal < self.upper && goal >= self.weak_lower && goal <= self.weak_upper
    }

    /// 探索窓を統計量のパーセンタイルで絞る
    pub fn narrow_alpha_beta(&self, goal: Eval, alpha: Eval, beta: Eval) -> (Eval, Eval) {
        let alpha = goal.min(alpha.max(self.percentile_lower(PROB_FOR_ENDGAME_ALPHA_BETA)));
        let beta = goal.max(beta.min(self.percentile_upper(PROB_FOR_ENDGAME_ALPHA_BETA)));
        (alpha, beta)
    }

    /// 全ての閾値 [-63, 63] に広げる
    ///
    /// 窓の外の閾値は、窓の端の証明数・反証数を換算した値で埋める。
    pub fn enlarge_to_all_evals(&self) -> NodeStats {
        let mut result = self.clone();
        result.weak_lower = MIN_EVAL + 1;
        result.weak_upper = MAX_EVAL - 1;
        result.enlarge_evaluations();
        let weak_lower = self.weak_lower();
        let weak_upper = self.weak_upper();
        for goal in result.goals() {
            let estimate = result.estimate_mut(goal);
            if goal < weak_lower {
                estimate.set_proving(self.estimate(weak_lower), weak_lower - goal);
            } else if goal > weak_upper {
                estimate.set_disproving(self.estimate(weak_upper), goal - weak_upper);
            } else {
                *estimate = *self.estimate(goal);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(board: Board, eval: EvalLarge, weak_lower: Eval, weak_upper: Eval) -> NodeStats {
        let mut stats = NodeStats::new(board, 1, 0);
        stats.set_leaf_eval(eval, 1);
        stats.update_leaf_weak_lower_upper(weak_lower, weak_upper);
        stats
    }

    #[test]
    fn test_new_node_has_empty_window() {
        let stats = NodeStats::new(Board::start(), 0, 0);
        assert_eq!(stats.goals().count(), 0);
        assert!(!stats.has_leaf_eval());
        assert!(stats.is_leaf());
        assert_eq!(stats.n_empties(), 60);
    }

    #[test]
    fn test_leaf_probabilities_decrease() {
        let stats = leaf(Board::start(), 0, -63, 63);
        let mut last = 1.0;
        for goal in stats.goals() {
            let prob = stats.prob_greater_equal(goal);
            assert!(prob <= last, "goal {goal}");
            last = prob;
        }
        // 評価値 0 なら期待値もほぼ 0
        assert!(stats.get_eval().abs() < 1.0, "eval = {}", stats.get_eval());
        assert!(stats.uncertainty() > 0.0);
        assert!(stats.percentile_upper(0.5) <= 1 && stats.percentile_lower(0.5) >= -1);
    }

    #[test]
    fn test_set_leaf_eval_is_sticky() {
        let mut stats = NodeStats::new(Board::start(), 0, 0);
        stats.set_leaf_eval(80, 2);
        stats.set_leaf_eval(-80, 4);
        assert_eq!(stats.leaf_eval(), 80);
        assert_eq!(stats.eval_depth(), 2);
    }

    #[test]
    fn test_set_solved_invariant() {
        let mut stats = leaf(Board::start(), 40, -63, 63);
        stats.set_solved(eval_to_large(2), eval_to_large(6), -63, 63);
        assert_eq!(stats.lower(), 2);
        assert_eq!(stats.upper(), 6);
        assert_eq!(stats.leaf_eval(), 40);
        assert_eq!(stats.weak_lower(), 3);
        assert_eq!(stats.weak_upper(), 5);
        for goal in (-63..=63).step_by(2) {
            let solved = goal < stats.lower() || goal > stats.upper();
            assert_eq!(stats.is_solved_at(goal), solved, "goal {goal}");
        }
        assert_eq!(stats.proof_number(1), 0.0);
        assert_eq!(stats.disproof_number(7), 0.0);
        assert!(stats.is_solved(7, 63, false));
        assert!(!stats.is_solved(1, 63, false));
        // 完全に解けた局面
        stats.set_solved(eval_to_large(4), eval_to_large(4), -63, 63);
        assert!(stats.is_solved(-63, 63, false));
        assert_eq!(stats.remaining_work(-63, 63), 0.0);
        assert_eq!(stats.next_position_eval_goal(0.0, 1.0, LESS_THAN_MIN_EVAL), LESS_THAN_MIN_EVAL);
    }

    #[test]
    fn test_update_father_from_children() {
        let board = Board::start();
        let successors = board.successors();
        let children: Vec<NodeStats> = successors
            .iter()
            .zip([-40, 0, 24, 64])
            .map(|(&b, eval)| leaf(b, eval, -63, 63))
            .collect();
        let mut father = NodeStats::new(board, 0, 0);
        father.set_leaf_eval(0, 1);
        father.update_leaf_weak_lower_upper(-63, 63);
        father.set_internal();
        father.update_father(children.iter());

        // 最善の子（子から見て最も低い評価）を反転した値が親の初期評価
        assert_eq!(father.leaf_eval(), 40);
        let mut ordered: Vec<&NodeStats> = children.iter().collect();
        ordered.sort_unstable_by_key(|child| board_order(child.board()));
        for goal in father.goals() {
            let mut expected = ScoreEstimate::default();
            for child in &ordered {
                expected.update_father_with_child(child.estimate(-goal));
            }
            expected.finalize();
            assert_eq!(*father.estimate(goal), expected, "goal {goal}");
        }

        // 再計算しても変わらない
        let before = father.clone();
        father.update_father(children.iter());
        assert_eq!(father, before);

        // 子の順序を変えても同じ
        let mut reversed = before.clone();
        reversed.update_father(children.iter().rev());
        assert_eq!(reversed, before);
        for goal in before.goals() {
            assert_eq!(reversed.max_log_derivative(goal), before.max_log_derivative(goal), "goal {goal}");
        }
    }

    #[test]
    fn test_father_bounds_from_solved_children() {
        let board = Board::start();
        let mut children: Vec<NodeStats> =
            board.successors().iter().map(|&b| leaf(b, 0, -63, 63)).collect();
        for child in children.iter_mut() {
            child.set_solved(eval_to_large(-2), eval_to_large(-2), -63, 63);
        }
        let mut father = NodeStats::new(board, 0, 0);
        father.set_leaf_eval(0, 1);
        father.update_leaf_weak_lower_upper(-63, 63);
        father.set_internal();
        father.update_father(children.iter());
        assert_eq!(father.lower(), 2);
        assert_eq!(father.upper(), 2);
        assert!(father.is_solved(-63, 63, false));
    }

    #[test]
    fn test_expected_weak_lower_upper_inside_bounds() {
        let stats = leaf(Board::start(), 0, -1, 1);
        let (weak_lower, weak_upper) = stats.expected_weak_lower_upper();
        assert!(weak_lower <= -1 && weak_upper >= 1);
        assert!(weak_lower >= MIN_EVAL + 1 && weak_upper <= MAX_EVAL - 1);
        assert!(weak_lower % 2 != 0 && weak_upper % 2 != 0);
    }

    #[test]
    fn test_next_position_eval_goal_avoids_last() {
        let stats = leaf(Board::start(), 0, -5, 5);
        let goal = stats.next_position_eval_goal(0.0, 1.0, LESS_THAN_MIN_EVAL);
        assert!(goal != LESS_THAN_MIN_EVAL);
        let other = stats.next_position_eval_goal(0.0, 1.0, goal);
        assert!(other != goal);
    }

    #[test]
    fn test_enlarge_to_all_evals() {
        let stats = leaf(Board::start(), 0, -5, 5);
        let all = stats.enlarge_to_all_evals();
        assert_eq!(all.weak_lower(), -63);
        assert_eq!(all.weak_upper(), 63);
        assert_eq!(all.estimate(-63).prob_greater_equal(), PROB_STEP);
        assert_eq!(all.estimate(63).prob_greater_equal(), 0);
        assert_eq!(all.estimate(1), stats.estimate(1));
    }

    #[test]
    fn test_widen_settled_window() {
        let mut stats = leaf(Board::start(), 40, -5, 5);
        stats.set_solved_no_update(eval_to_large(-4), eval_to_large(64));
        let before: Vec<ScoreEstimate> = stats.goals().map(|goal| *stats.estimate(goal)).collect();

        // -7 は解決済みなので広げられる
        assert!(stats.widen_settled_window(-7, 5));
        assert_eq!(stats.raw_weak_lower_upper(), (-7, 5));
        assert_eq!(stats.estimate(-7).prob_greater_equal(), PROB_STEP);
        let after: Vec<ScoreEstimate> = stats.goals().map(|goal| *stats.estimate(goal)).collect();
        assert_eq!(before, after);

        // 7 は未解決
        assert!(!stats.widen_settled_window(-7, 7));
        // 新しい閾値が無い
        assert!(!stats.widen_settled_window(-7, 5));
        assert_eq!(stats.raw_weak_lower_upper(), (-7, 5));
    }

    #[test]
    fn test_narrow_alpha_beta_keeps_goal() {
        let stats = leaf(Board::start(), 0, -63, 63);
        let (alpha, beta) = stats.narrow_alpha_beta(1, -63, 63);
        assert!(alpha <= 1 && 1 <= beta);
        assert!(alpha > -63 && beta < 63);
    }
}
