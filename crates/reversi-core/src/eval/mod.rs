//! 静的評価モジュール
//!
//! 探索の葉で使う 1 手読みの評価器。差分更新できるように、局面を保持したまま
//! 着手・戻し・手番反転を受け付ける。
//!
//! - `FeatureEvaluator`: 評価器のトレイト
//! - `EvaluatorFactory`: ワーカーごとに評価器を作るファクトリ
//! - `DiskDifferenceEvaluator`: 石数差（テスト用）
//! - `PositionalEvaluator`: マスの重みと着手可能数による評価

mod positional;

use std::sync::Arc;

use crate::types::EvalLarge;

pub use positional::PositionalEvaluator;

/// 差分更新できる静的評価器
///
/// 保持している局面の手番側から見た評価値を返す。探索では `invert` してから子の着手を
/// `update` で適用し、子の局面（子の手番側から見た局面）にする。
pub trait FeatureEvaluator: Send {
    fn setup(&mut self, player: u64, opponent: u64);

    /// 相手側が `square` に打ち、`flip`（`square` を含む）を返した局面にする
    fn update(&mut self, square: u64, flip: u64);

    /// `update` を取り消す
    fn undo_update(&mut self, square: u64, flip: u64);

    /// 手番側と相手側を入れ替える
    fn invert(&mut self);

    /// 評価値（8 倍スケール、[-512, 512]）
    fn evaluate(&self) -> EvalLarge;
}

/// ワーカーごとに評価器を作るファクトリ
pub type EvaluatorFactory = Arc<dyn Fn() -> Box<dyn FeatureEvaluator> + Send + Sync>;

/// 石の配置だけを持つ評価器の共通部分
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Disks {
    player: u64,
    opponent: u64,
}

impl Disks {
    #[inline]
    fn update(&mut self, square: u64, flip: u64) {
        debug_assert!(square.count_ones() == 1 && flip & square != 0);
        self.player &= !flip;
        self.opponent |= flip;
    }

    #[inline]
    fn undo_update(&mut self, square: u64, flip: u64) {
        debug_assert!(square.count_ones() == 1);
        self.player = (self.player | flip) & !square;
        self.opponent &= !flip;
    }

    #[inline]
    fn invert(&mut self) {
        std::mem::swap(&mut self.player, &mut self.opponent);
    }
}

/// 石数差の評価器
#[derive(Debug, Clone, Default)]
pub struct DiskDifferenceEvaluator {
    disks: Disks,
}

impl DiskDifferenceEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factory() -> EvaluatorFactory {
        Arc::new(|| Box::new(DiskDifferenceEvaluator::new()))
    }
}

impl FeatureEvaluator for DiskDifferenceEvaluator {
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
        8 * (self.disks.player.count_ones() as i32 - self.disks.opponent.count_ones() as i32)
    }
}
