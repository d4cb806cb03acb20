//! マスの重みと着手可能数による評価器
//!
//! 序盤から中盤はマスの重みと着手可能数の差、終盤に近づくほど石数差を重視する。
//! 局面から毎回計算し直すので、差分更新は石の配置を保つだけ。

use super::{Disks, FeatureEvaluator};
use crate::bitboard::{CORNER, EDGE, X_SQUARES, XC};
use crate::movegen::n_moves;
use crate::types::{EvalLarge, MAX_EVAL_LARGE, MIN_EVAL_LARGE};

/// C 打ち
const C_SQUARES: u64 = XC & !X_SQUARES;

/// (マスク, 重み)。重みは 8 倍スケール
const SQUARE_WEIGHTS: [(u64, i32); 4] = [(CORNER, 40), (X_SQUARES, -24), (C_SQUARES, -8), (EDGE, 4)];

/// 着手可能数の差 1 あたりの重み
const MOBILITY_WEIGHT: i32 = 6;

#[derive(Debug, Clone, Default)]
pub struct PositionalEvaluator {
    disks: Disks,
}

impl PositionalEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factory() -> super::EvaluatorFactory {
        std::sync::Arc::new(|| Box::new(PositionalEvaluator::new()))
    }
}

#[inline]
fn weighted_squares(player: u64, opponent: u64) -> i32 {
    SQUARE_WEIGHTS
        .iter()
        .map(|&(mask, weight)| weight * ((player & mask).count_ones() as i32 - (opponent & mask).count_ones() as i32))
        .sum()
}

impl FeatureEvaluator for PositionalEvaluator {
    fn setup(&mut self, player: u64, opponent: u64) {
        self.disks = Disks { player, opponent };
    }

    fn update(&mut self, square: u64, flip: u64) {
        self.disks.update(square, flip);
    }

    fn undo_update(&mut self, square: u64, flip: u64) {
        self.disks.undo_update(square, flip);
    }

    fn invert(&mut self) {
        self.disks.invert();
    }

    fn evaluate(&self) -> EvalLarge {
        let Disks { player, opponent } = self.disks;
        let n_empties = 64 - (player | opponent).count_ones() as i32;
        let disk_difference = 8 * (player.count_ones() as i32 - opponent.count_ones() as i32);
        let mobility = MOBILITY_WEIGHT * (n_moves(player, opponent) as i32 - n_moves(opponent, player) as i32);
        let positional = weighted_squares(player, opponent) + mobility;
        // 空きマス 60 で位置評価のみ、0 で石数差のみ
        let eval = (positional * n_empties + disk_difference * (60 - n_empties.min(60))) / 60;
        eval.clamp(MIN_EVAL_LARGE, MAX_EVAL_LARGE)
    }
}
