//! TranspositionTable本体
//!
//! - Slot: 1 エントリ + 世代
//! - TranspositionTable: テーブル本体
//! - get/update操作

use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::Mutex;

use crate::position::hash_board;
use crate::types::{EvalLarge, Square, MAX_EVAL_LARGE, MIN_EVAL_LARGE};

/// 置換表のエントリ（読み出し用のコピー）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtEntry {
    pub player: u64,
    pub opponent: u64,
    /// 真の値の下限
    pub lower: EvalLarge,
    /// 真の値の上限
    pub upper: EvalLarge,
    /// 探索深さ（残り空きマス数）
    pub depth: u8,
    pub best_move: Option<Square>,
    pub second_best_move: Option<Square>,
}

impl TtEntry {
    const fn empty() -> Self {
        TtEntry {
            player: 0,
            opponent: 0,
            lower: MIN_EVAL_LARGE,
            upper: MAX_EVAL_LARGE,
            depth: 0,
            best_move: None,
            second_best_move: None,
        }
    }
}

struct Slot {
    entry: TtEntry,
    generation: u8,
    occupied: bool,
}

impl Slot {
    const fn new() -> Self {
        Slot {
            entry: TtEntry::empty(),
            generation: 0,
            occupied: false,
        }
    }

    /// 新しい書き込みで置き換えるか
    #[inline]
    fn replaceable(&self, player: u64, opponent: u64, depth: u8, generation: u8) -> bool {
        !self.occupied
            || (self.entry.player == player && self.entry.opponent == opponent)
            || self.generation != generation
            || self.entry.depth <= depth
    }
}

/// 置換表
pub struct TranspositionTable {
    slots: Box<[Mutex<Slot>]>,
    bits: u32,
    /// 世代カウンター
    generation: AtomicU8,
}

impl TranspositionTable {
    /// 2^bits スロットの置換表を作成
    pub fn new(bits: u32) -> Self {
        debug_assert!((1..=32).contains(&bits));
        let slots = (0..1usize << bits).map(|_| Mutex::new(Slot::new())).collect();
        Self {
            slots,
            bits,
            generation: AtomicU8::new(0),
        }
    }

    /// スロット数
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// クリア
    pub fn clear(&mut self) {
        self.generation.store(0, Ordering::Relaxed);
        for slot in self.slots.iter_mut() {
            *slot.get_mut() = Slot::new();
        }
    }

    /// 新しい探索を開始（世代を進める）
    pub fn new_search(&self) {
        self.generation.fetch_add(1, Ordering::Relaxed);
    }

    /// 現在の世代を取得
    #[inline]
    pub fn generation(&self) -> u8 {
        self.generation.load(Ordering::Relaxed)
    }

    #[inline]
    fn slot(&self, player: u64, opponent: u64) -> &Mutex<Slot> {
        let index = (hash_board(player, opponent) >> (64 - self.bits)) as usize;
        &self.slots[index]
    }

    /// 局面のエントリを取得。別の局面が入っているか、使用中なら None
    pub fn get(&self, player: u64, opponent: u64) -> Option<TtEntry> {
        let slot = self.slot(player, opponent).try_lock()?;
        if !slot.occupied || slot.entry.player != player || slot.entry.opponent != opponent {
            return None;
        }
        Some(slot.entry)
    }

    /// 窓 (lower, upper) での探索結果 `eval` を書き込む
    ///
    /// fail-high なら下限のみ、fail-low なら上限のみが確定する。
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &self,
        player: u64,
        opponent: u64,
        depth: u8,
        eval: EvalLarge,
        lower: EvalLarge,
        upper: EvalLarge,
        best_move: Option<Square>,
        second_best_move: Option<Square>,
    ) {
        let Some(mut slot) = self.slot(player, opponent).try_lock() else {
            return;
        };
        let generation = self.generation();
        if !slot.replaceable(player, opponent, depth, generation) {
            return;
        }
        slot.entry = TtEntry {
            player,
            opponent,
            lower: if eval > lower { eval } else { MIN_EVAL_LARGE },
            upper: if eval < upper { eval } else { MAX_EVAL_LARGE },
            depth,
            best_move,
            second_best_move,
        };
        slot.generation = generation;
        slot.occupied = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAYER: u64 = 0x0000_0008_1000_0000;
    const OPPONENT: u64 = 0x0000_0010_0800_0000;

    #[test]
    fn test_get_after_update() {
        let tt = TranspositionTable::new(10);
        assert!(tt.get(PLAYER, OPPONENT).is_none());
        tt.update(PLAYER, OPPONENT, 12, 40, -64, 64, Some(Square::new(3)), None);
        let entry = tt.get(PLAYER, OPPONENT).unwrap();
        assert_eq!(entry.lower, 40);
        assert_eq!(entry.upper, 40);
        assert_eq!(entry.depth, 12);
        assert_eq!(entry.best_move, Some(Square::new(3)));
        assert!(tt.get(OPPONENT, PLAYER).is_none() || tt.get(OPPONENT, PLAYER).unwrap().player == OPPONENT);
    }

    #[test]
    fn test_fail_high_and_low() {
        let tt = TranspositionTable::new(10);
        tt.update(PLAYER, OPPONENT, 12, 80, -64, 64, None, None);
        let entry = tt.get(PLAYER, OPPONENT).unwrap();
        assert_eq!((entry.lower, entry.upper), (80, MAX_EVAL_LARGE));
        tt.update(PLAYER, OPPONENT, 12, -80, -64, 64, None, None);
        let entry = tt.get(PLAYER, OPPONENT).unwrap();
        assert_eq!((entry.lower, entry.upper), (MIN_EVAL_LARGE, -80));
    }

    #[test]
    fn test_deeper_entry_survives_in_same_generation() {
        // 1 スロットなので全局面が衝突する
        let tt = TranspositionTable::new(1);
        let other_player = PLAYER | 1;
        let (a, b) = (hash_board(PLAYER, OPPONENT) >> 63, hash_board(other_player, OPPONENT) >> 63);
        if a != b {
            return;
        }
        tt.update(PLAYER, OPPONENT, 20, 0, -64, 64, None, None);
        tt.update(other_player, OPPONENT, 10, 0, -64, 64, None, None);
        assert!(tt.get(PLAYER, OPPONENT).is_some());
        assert!(tt.get(other_player, OPPONENT).is_none());

        // 世代が変われば置き換わる
        tt.new_search();
        tt.update(other_player, OPPONENT, 10, 0, -64, 64, None, None);
        assert!(tt.get(other_player, OPPONENT).is_some());
    }

    #[test]
    fn test_busy_slot_is_skipped() {
        let tt = TranspositionTable::new(4);
        tt.update(PLAYER, OPPONENT, 12, 0, -64, 64, None, None);
        let _guard = tt.slot(PLAYER, OPPONENT).lock();
        assert!(tt.get(PLAYER, OPPONENT).is_none());
        tt.update(PLAYER, OPPONENT, 14, 8, -64, 64, None, None);
        drop(_guard);
        assert_eq!(tt.get(PLAYER, OPPONENT).unwrap().depth, 12);
    }

    #[test]
    fn test_clear() {
        let mut tt = TranspositionTable::new(4);
        tt.update(PLAYER, OPPONENT, 12, 0, -64, 64, None, None);
        tt.clear();
        assert!(tt.get(PLAYER, OPPONENT).is_none());
        assert_eq!(tt.len(), 16);
    }
}
