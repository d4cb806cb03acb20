//! 閾値ごとの統計量（ScoreEstimate）と合成テーブル
//!
//! ノードの各閾値 g について
//! - 真の値が g 以上になる確率（量子化済み）
//! - 証明数・反証数（量子化済み）
//! - 根の確率に対する感度の最大値（対数微分 × 100）
//!
//! を持つ。親の値は子の値を `CombineTables` で畳み込んで求める。

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use super::combiner::{combine, combine_function_derivative};
use crate::estimators::{
    byte_to_probability, byte_to_proof_number, convert_proof_number, disproof_number,
    probability_to_byte, proof_number, proof_number_to_byte, win_probability, Probability,
    ProofByte, MAX_PROOF_NUMBER, PROB_STEP, PROOF_NUMBER_STEP,
};
use crate::types::EvalLarge;

/// 感度の番兵（確率が 0 か 1 のとき）
pub const LOG_DERIVATIVE_MINUS_INF: i32 = -1_000_000;

/// 感度の倍率
pub const LOG_DERIVATIVE_MULTIPLIER: f64 = 100.0;

/// 葉の感度 `100 * ln(p(1 - p))`
#[inline]
fn leaf_log_derivative(prob: f64) -> i32 {
    (LOG_DERIVATIVE_MULTIPLIER * (prob * (1.0 - prob)).ln()).round() as i32
}

/// 確率・証明数の合成テーブル
pub struct CombineTables {
    combine_prob: Vec<[Probability; 256]>,
    log_derivative: [i32; 256],
    combine_disproof_number: Vec<[ProofByte; 256]>,
    disproof_to_proof_number: Vec<[ProofByte; 256]>,
    leaf_log_derivative: [i32; 256],
    prob_lower_cubed: [f64; 256],
}

impl CombineTables {
    fn new() -> Self {
        let mut tables = CombineTables {
            combine_prob: vec![[0; 256]; 256],
            log_derivative: [0; 256],
            combine_disproof_number: vec![[0; 256]; 256],
            disproof_to_proof_number: vec![[0; 256]; 256],
            leaf_log_derivative: [0; 256],
            prob_lower_cubed: [0.0; 256],
        };
        let max_pn = PROOF_NUMBER_STEP as usize;
        let max_prob = PROB_STEP as usize;

        for i in 0..=max_pn {
            for j in 0..=max_pn {
                tables.combine_disproof_number[i][j] = if i == max_pn || j == max_pn {
                    PROOF_NUMBER_STEP
                } else {
                    let sum = (byte_to_proof_number(i as ProofByte)
                        + byte_to_proof_number(j as ProofByte))
                    .min(MAX_PROOF_NUMBER - 1.0);
                    (i as ProofByte).max(j as ProofByte).max(proof_number_to_byte(sum))
                };
            }
            for j in 0..=max_prob {
                tables.disproof_to_proof_number[i][j] = if j == max_prob || i == max_pn {
                    PROOF_NUMBER_STEP
                } else if i == 0 {
                    0
                } else {
                    let mut pn = byte_to_proof_number(i as ProofByte) as f64;
                    let prob = byte_to_probability(j as Probability);
                    if prob > 0.5 {
                        pn *= (0.5 / (1.0 - prob)).powi(3);
                    }
                    proof_number_to_byte((pn as f32).clamp(1.0, MAX_PROOF_NUMBER))
                };
            }
        }

        for i in 0..=max_prob {
            let x1 = byte_to_probability(i as Probability);
            tables.prob_lower_cubed[i] = (1.0 - x1).powi(3);
            tables.leaf_log_derivative[i] = leaf_log_derivative(x1).max(LOG_DERIVATIVE_MINUS_INF);
            tables.log_derivative[i] = (LOG_DERIVATIVE_MULTIPLIER * combine_function_derivative(x1).ln())
                .clamp(
                    LOG_DERIVATIVE_MINUS_INF as f64,
                    -LOG_DERIVATIVE_MINUS_INF as f64,
                )
                .round() as i32;
            for j in i..=max_prob {
                let x2 = byte_to_probability(j as Probability);
                let combined = probability_to_byte(combine(x1, x2));
                tables.combine_prob[i][j] = combined;
                tables.combine_prob[j][i] = combined;
            }
        }
        tables
    }

    /// 2 つの子の確率（子から見た値）の合成
    #[inline]
    pub fn combine_prob(&self, a: Probability, b: Probability) -> Probability {
        self.combine_prob[a as usize][b as usize]
    }

    #[inline]
    pub fn log_derivative(&self, prob: Probability) -> i32 {
        self.log_derivative[prob as usize]
    }

    #[inline]
    pub fn leaf_log_derivative(&self, prob: Probability) -> i32 {
        self.leaf_log_derivative[prob as usize]
    }

    /// 反証数の和
    #[inline]
    pub fn combine_disproof_number(&self, a: ProofByte, b: ProofByte) -> ProofByte {
        self.combine_disproof_number[a as usize][b as usize]
    }

    /// 子の反証数から親の証明数への換算（子の確率が高いほど割り増す）
    #[inline]
    pub fn disproof_to_proof_number(&self, disproof: ProofByte, prob: Probability) -> ProofByte {
        self.disproof_to_proof_number[disproof as usize][prob as usize]
    }

    /// `(1 - p)^3`
    #[inline]
    pub fn prob_lower_cubed(&self, prob: Probability) -> f64 {
        self.prob_lower_cubed[prob as usize]
    }
}

/// 合成テーブル（初回アクセス時に構築）
pub static COMBINE_TABLES: LazyLock<CombineTables> = LazyLock::new(CombineTables::new);

/// ある閾値に対するノードの統計量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEstimate {
    prob_greater_equal: Probability,
    proof_number: ProofByte,
    disproof_number: ProofByte,
    max_log_derivative: i32,
}

impl Default for ScoreEstimate {
    fn default() -> Self {
        let mut estimate = ScoreEstimate {
            prob_greater_equal: 0,
            proof_number: 0,
            disproof_number: 0,
            max_log_derivative: 0,
        };
        estimate.initialize();
        estimate
    }
}

impl ScoreEstimate {
    /// 量子化済みの値から直接構築
    pub fn from_parts(
        prob_greater_equal: Probability,
        proof_number: ProofByte,
        disproof_number: ProofByte,
        max_log_derivative: i32,
    ) -> Self {
        ScoreEstimate {
            prob_greater_equal,
            proof_number,
            disproof_number,
            max_log_derivative,
        }
    }

    #[inline]
    pub fn prob_greater_equal(&self) -> Probability {
        self.prob_greater_equal
    }

    /// 真の値が閾値以上になる確率
    #[inline]
    pub fn probability(&self) -> f64 {
        byte_to_probability(self.prob_greater_equal)
    }

    #[inline]
    pub fn proof_number_byte(&self) -> ProofByte {
        self.proof_number
    }

    #[inline]
    pub fn disproof_number_byte(&self) -> ProofByte {
        self.disproof_number
    }

    #[inline]
    pub fn proof_number(&self) -> f32 {
        byte_to_proof_number(self.proof_number)
    }

    #[inline]
    pub fn disproof_number(&self) -> f32 {
        byte_to_proof_number(self.disproof_number)
    }

    #[inline]
    pub fn max_log_derivative(&self) -> i32 {
        self.max_log_derivative
    }

    /// 証明済みまたは反証済み
    #[inline]
    pub fn is_solved(&self) -> bool {
        self.proof_number == 0 || self.disproof_number == 0
    }

    /// 子を畳み込む前の初期値
    pub fn initialize(&mut self) {
        self.prob_greater_equal = PROB_STEP;
        self.proof_number = PROOF_NUMBER_STEP;
        self.disproof_number = 0;
        self.max_log_derivative = LOG_DERIVATIVE_MINUS_INF;
    }

    /// 子の統計量（子の視点で閾値 -g）を畳み込む
    pub fn update_father_with_child(&mut self, child: &ScoreEstimate) {
        let tables = &*COMBINE_TABLES;
        self.prob_greater_equal = tables.combine_prob(self.prob_greater_equal, child.prob_greater_equal);
        let current = child.max_log_derivative + tables.log_derivative(child.prob_greater_equal);
        self.max_log_derivative = self.max_log_derivative.max(current);
        self.proof_number = self
            .proof_number
            .min(tables.disproof_to_proof_number(child.disproof_number, child.prob_greater_equal));
        self.disproof_number = tables.combine_disproof_number(self.disproof_number, child.proof_number);
    }

    /// 畳み込み後の仕上げ。確率を親の視点に反転する
    pub fn finalize(&mut self) {
        let tables = &*COMBINE_TABLES;
        if self.prob_greater_equal == PROB_STEP || self.prob_greater_equal == 0 {
            self.max_log_derivative = LOG_DERIVATIVE_MINUS_INF;
        } else {
            self.max_log_derivative -= tables.log_derivative(self.prob_greater_equal);
            debug_assert!(self.max_log_derivative < 0);
        }
        self.prob_greater_equal = PROB_STEP - self.prob_greater_equal;
        if self.prob_greater_equal == PROB_STEP {
            self.disproof_number = PROOF_NUMBER_STEP;
        }
        self.check();
    }

    /// 葉の初期評価 `eval`（深さ `depth`）から閾値 `goal` の統計量を設定
    pub fn set_leaf(
        &mut self,
        player: u64,
        opponent: u64,
        goal: EvalLarge,
        eval: EvalLarge,
        depth: u32,
        n_empties: u32,
    ) {
        self.prob_greater_equal = win_probability(depth, n_empties, goal, eval);
        self.proof_number = if self.prob_greater_equal == 0 {
            PROOF_NUMBER_STEP
        } else {
            proof_number(player, opponent, goal, eval)
        };
        self.disproof_number = if self.prob_greater_equal == PROB_STEP {
            PROOF_NUMBER_STEP
        } else {
            disproof_number(player, opponent, goal, eval)
        };
        self.max_log_derivative = COMBINE_TABLES.leaf_log_derivative(self.prob_greater_equal);
        self.check();
    }

    pub fn set_proved(&mut self) {
        self.prob_greater_equal = PROB_STEP;
        self.proof_number = 0;
        self.disproof_number = PROOF_NUMBER_STEP;
        self.max_log_derivative = LOG_DERIVATIVE_MINUS_INF;
    }

    pub fn set_disproved(&mut self) {
        self.prob_greater_equal = 0;
        self.proof_number = PROOF_NUMBER_STEP;
        self.disproof_number = 0;
        self.max_log_derivative = LOG_DERIVATIVE_MINUS_INF;
    }

    /// `delta` だけ低い閾値での値。`other` の証明数から換算する
    pub fn set_proving(&mut self, other: &ScoreEstimate, delta: i32) {
        debug_assert!(delta > 0 && delta % 2 == 0);
        self.prob_greater_equal = PROB_STEP;
        self.proof_number =
            proof_number_to_byte(convert_proof_number(other.proof_number() as f64, delta) as f32);
        self.disproof_number = PROOF_NUMBER_STEP;
        self.max_log_derivative = LOG_DERIVATIVE_MINUS_INF;
    }

    /// `delta` だけ高い閾値での値。`other` の反証数から換算する
    pub fn set_disproving(&mut self, other: &ScoreEstimate, delta: i32) {
        debug_assert!(delta > 0 && delta % 2 == 0);
        self.prob_greater_equal = 0;
        self.proof_number = PROOF_NUMBER_STEP;
        self.disproof_number =
            proof_number_to_byte(convert_proof_number(other.disproof_number() as f64, delta) as f32);
        self.max_log_derivative = LOG_DERIVATIVE_MINUS_INF;
    }

    /// 親 `father` の確率に対する、この子の感度
    pub fn log_derivative(&self, father: &ScoreEstimate) -> f64 {
        if father.prob_greater_equal == 0
            || father.prob_greater_equal == PROB_STEP
            || self.prob_greater_equal == 0
            || self.prob_greater_equal == PROB_STEP
        {
            return LOG_DERIVATIVE_MINUS_INF as f64;
        }
        let tables = &*COMBINE_TABLES;
        (self.max_log_derivative + tables.log_derivative(self.prob_greater_equal)
            - tables.log_derivative(PROB_STEP - father.prob_greater_equal)) as f64
    }

    /// `(1 - p)^3`
    #[inline]
    pub fn prob_lower_cubed(&self) -> f64 {
        COMBINE_TABLES.prob_lower_cubed(self.prob_greater_equal)
    }

    #[inline]
    fn check(&self) {
        debug_assert_eq!(self.prob_greater_equal == 0, self.proof_number == PROOF_NUMBER_STEP);
        debug_assert!(self.proof_number != 0 || self.prob_greater_equal == PROB_STEP);
        debug_assert!(self.disproof_number != 0 || self.prob_greater_equal == 0);
        debug_assert_eq!(
            self.prob_greater_equal == 0 || self.prob_greater_equal == PROB_STEP,
            self.max_log_derivative == LOG_DERIVATIVE_MINUS_INF
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::eval_to_large;

    const PLAYER: u64 = 0x0000_0008_1000_0000;
    const OPPONENT: u64 = 0x0000_0010_0800_0000;

    #[test]
    fn test_combine_prob_saturation() {
        let tables = &*COMBINE_TABLES;
        for i in 0..=PROB_STEP {
            assert_eq!(tables.combine_prob(i, 0), 0);
            assert_eq!(tables.combine_prob(0, i), 0);
            assert_eq!(tables.combine_prob(i, PROB_STEP), i, "i = {i}");
            assert_eq!(tables.leaf_log_derivative(i), tables.leaf_log_derivative(PROB_STEP - i));
        }
    }

    #[test]
    fn test_combine_prob_bounded_by_arguments() {
        let tables = &*COMBINE_TABLES;
        for i in (0..=PROB_STEP).step_by(5) {
            for j in (0..=PROB_STEP).step_by(7) {
                let c = tables.combine_prob(i, j);
                assert!(c <= i && c <= j, "combine({i}, {j}) = {c}");
                assert_eq!(c, tables.combine_prob(j, i));
            }
        }
    }

    #[test]
    fn test_log_derivative_non_increasing() {
        let tables = &*COMBINE_TABLES;
        for i in 0..PROB_STEP {
            assert!(tables.log_derivative(i) >= tables.log_derivative(i + 1), "i = {i}");
            assert!(tables.log_derivative(i) > LOG_DERIVATIVE_MINUS_INF);
        }
    }

    #[test]
    fn test_disproof_tables() {
        let tables = &*COMBINE_TABLES;
        for i in 0..=PROOF_NUMBER_STEP {
            for j in [0, 1, 100, 200, 254] {
                let c = tables.combine_disproof_number(i, j);
                assert!(c >= i && c >= j);
                assert_eq!(c == PROOF_NUMBER_STEP, i == PROOF_NUMBER_STEP);
            }
            for prob in [0, 50, 128, 200, 254, 255] {
                let pn = tables.disproof_to_proof_number(i, prob);
                assert_eq!(pn == 0, i == 0 && prob != PROB_STEP);
                assert_eq!(pn == PROOF_NUMBER_STEP, i == PROOF_NUMBER_STEP || prob == PROB_STEP);
            }
        }
    }

    #[test]
    fn test_leaf_invariants() {
        let mut estimate = ScoreEstimate::default();
        for goal in (-63..=63).step_by(2) {
            estimate.set_leaf(PLAYER, OPPONENT, eval_to_large(goal), 40, 2, 60);
            let prob = estimate.prob_greater_equal();
            assert_eq!(prob == 0, estimate.proof_number_byte() == PROOF_NUMBER_STEP);
            assert_eq!(prob == PROB_STEP, estimate.disproof_number_byte() == PROOF_NUMBER_STEP);
            assert_eq!(
                prob == 0 || prob == PROB_STEP,
                estimate.max_log_derivative() == LOG_DERIVATIVE_MINUS_INF
            );
            assert!(estimate.max_log_derivative() < 0);
        }
    }

    #[test]
    fn test_single_child_fold_flips_probability() {
        let mut child = ScoreEstimate::default();
        child.set_leaf(PLAYER, OPPONENT, -8, 0, 1, 30);
        let mut father = ScoreEstimate::default();
        father.initialize();
        father.update_father_with_child(&child);
        father.finalize();
        assert_eq!(father.prob_greater_equal(), PROB_STEP - child.prob_greater_equal());
        assert!(!father.is_solved());
    }

    #[test]
    fn test_fold_solved_children() {
        // 全ての子が証明済み（子の視点で -g 以上）なら親は反証済み
        let mut proved = ScoreEstimate::default();
        proved.set_proved();
        let mut father = ScoreEstimate::default();
        father.initialize();
        father.update_father_with_child(&proved);
        father.update_father_with_child(&proved);
        father.finalize();
        assert_eq!(father.prob_greater_equal(), 0);
        assert_eq!(father.disproof_number_byte(), 0);
        assert!(father.is_solved());

        // 反証済みの子が 1 つでもあれば親は証明済み
        let mut disproved = ScoreEstimate::default();
        disproved.set_disproved();
        father.initialize();
        father.update_father_with_child(&proved);
        father.update_father_with_child(&disproved);
        father.finalize();
        assert_eq!(father.prob_greater_equal(), PROB_STEP);
        assert_eq!(father.proof_number_byte(), 0);
        assert_eq!(father.disproof_number_byte(), PROOF_NUMBER_STEP);
    }

    #[test]
    fn test_log_derivative_saturated() {
        let mut child = ScoreEstimate::default();
        child.set_leaf(PLAYER, OPPONENT, 0, 0, 1, 30);
        let mut father = ScoreEstimate::default();
        father.set_proved();
        assert_eq!(child.log_derivative(&father), LOG_DERIVATIVE_MINUS_INF as f64);
        father.initialize();
        father.update_father_with_child(&child);
        father.finalize();
        assert!(child.log_derivative(&father) > LOG_DERIVATIVE_MINUS_INF as f64);
    }

    #[test]
    fn test_set_proving_decreases_effort() {
        let mut base = ScoreEstimate::default();
        base.set_leaf(PLAYER, OPPONENT, 0, 0, 1, 30);
        let mut proving = ScoreEstimate::default();
        proving.set_proving(&base, 4);
        assert_eq!(proving.prob_greater_equal(), PROB_STEP);
        assert!(proving.proof_number_byte() <= base.proof_number_byte());
        assert!(proving.proof_number_byte() >= 1);
        let mut disproving = ScoreEstimate::default();
        disproving.set_disproving(&base, 4);
        assert_eq!(disproving.prob_greater_equal(), 0);
        assert!(disproving.disproof_number_byte() <= base.disproof_number_byte());
    }
}
