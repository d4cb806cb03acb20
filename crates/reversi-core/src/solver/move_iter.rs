//! 着手順序付け
//!
//! 残り深さと厳密解かどうかで並べ方を切り替える。
//!
//! - `VeryQuick`: 相手の石に隣接する空きマスを順に試す
//! - `Quick1` / `Quick2`: マスク（パリティ、隅、中央、辺、X 打ちの後）を段階的に試す
//! - `MinimizeOpponentMoves`: 相手の着手可能数が少なく、マスの価値が高い順
//! - `DisproofNumber`: 子を反証する推定訪問数が少ない順
//!
//! 置換表の最善手があれば、並べ替える方式では必ず先頭に来る。

use smallvec::SmallVec;

use super::stats::{SolverStats, StatsKind};
use crate::bitboard::{first_last_in_edges, neighbors, unique_in_edges, CENTRAL, CORNER, EDGE, X_SQUARES};
use crate::estimators::disproof_number_over_prob;
use crate::eval::FeatureEvaluator;
use crate::movegen::{get_flip, get_moves, new_opponent, new_player};
use crate::types::{EvalLarge, Square};

/// 静的なマスの価値（ビット位置順）
#[rustfmt::skip]
pub const SQUARE_VALUE: [i32; 64] = [
    18,  4, 16, 12, 12, 16,  4, 18,
     4,  2,  6,  8,  8,  6,  2,  4,
    16,  6, 14, 10, 10, 14,  6, 16,
    12,  8, 10,  0,  0, 10,  8, 12,
    12,  8, 10,  0,  0, 10,  8, 12,
    16,  6, 14, 10, 10, 14,  6, 16,
     4,  2,  6,  8,  8,  6,  2,  4,
    18,  4, 16, 12, 12, 16,  4, 18,
];

/// 置換表の最善手の優先度
const BEST_MOVE_VALUE: i32 = 99_999_999;

/// この空きマス数以上の厳密解では反証数で並べる
pub const MIN_EMPTIES_FOR_DISPROOF_NUMBER: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOrdering {
    VeryQuick,
    Quick1,
    Quick2,
    MinimizeOpponentMoves,
    DisproofNumber,
}

impl MoveOrdering {
    /// `unlikely` は手番側が窓に届きそうにない局面（安い並べ方で十分）
    pub const fn for_node(depth: u32, solve: bool, unlikely: bool) -> MoveOrdering {
        if unlikely {
            if depth <= 9 { MoveOrdering::VeryQuick } else { MoveOrdering::Quick1 }
        } else if (solve && depth <= 8) || (!solve && depth <= 2) {
            MoveOrdering::Quick1
        } else if (solve && depth <= 9) || (!solve && depth <= 4) {
            MoveOrdering::Quick2
        } else if !solve || depth < MIN_EMPTIES_FOR_DISPROOF_NUMBER {
            MoveOrdering::MinimizeOpponentMoves
        } else {
            MoveOrdering::DisproofNumber
        }
    }

    const fn stats_kind(self) -> StatsKind {
        match self {
            MoveOrdering::VeryQuick => StatsKind::VeryQuick,
            MoveOrdering::Quick1 => StatsKind::Quick1,
            MoveOrdering::Quick2 => StatsKind::Quick2,
            MoveOrdering::MinimizeOpponentMoves | MoveOrdering::DisproofNumber => StatsKind::MovesOrDisproof,
        }
    }
}

enum Source {
    /// 候補マスを下位ビットから
    Scan,
    /// マスクを順に試す。最後のマスクは全マス
    Masks { masks: [u64; 9], current: usize },
    /// (返る石, 優先度)
    Sorted(SmallVec<[(u64, i32); 32]>),
}

pub struct MoveIter {
    player: u64,
    opponent: u64,
    candidates: u64,
    kind: StatsKind,
    source: Source,
}

impl MoveIter {
    /// `evaluator` は `DisproofNumber` でだけ使う（手番を反転済みの状態で渡す）
    pub fn new(
        ordering: MoveOrdering,
        player: u64,
        opponent: u64,
        last_flip: u64,
        upper: EvalLarge,
        best_move: Option<Square>,
        evaluator: &mut dyn FeatureEvaluator,
    ) -> Self {
        let empties = !(player | opponent);
        let candidates = neighbors(opponent) & empties;
        let source = match ordering {
            MoveOrdering::VeryQuick => Source::Scan,
            MoveOrdering::Quick1 => {
                let mut masks = [0u64; 9];
                masks[0] = !neighbors(empties) & neighbors(player);
                masks[1] = CORNER;
                masks[2] = if last_flip & X_SQUARES != 0 { neighbors(last_flip) } else { 0 };
                masks[3] = CENTRAL;
                masks[4] = EDGE;
                masks[5] = u64::MAX;
                Source::Masks { masks, current: 0 }
            }
            MoveOrdering::Quick2 => {
                let neighbors_player = neighbors(player);
                let masks = [
                    !neighbors(empties) & neighbors_player,
                    unique_in_edges(empties) & neighbors_player,
                    neighbors(last_flip) & CORNER,
                    CORNER,
                    first_last_in_edges(empties),
                    if last_flip & X_SQUARES != 0 { neighbors(last_flip) } else { 0 },
                    CENTRAL,
                    EDGE,
                    u64::MAX,
                ];
                Source::Masks { masks, current: 0 }
            }
            MoveOrdering::MinimizeOpponentMoves | MoveOrdering::DisproofNumber => {
                let mut moves = SmallVec::new();
                let mut rest = candidates;
                while rest != 0 {
                    let square = rest.trailing_zeros();
                    rest &= rest - 1;
                    let flip = get_flip(square, player, opponent);
                    if flip == 0 {
                        continue;
                    }
                    let value = if best_move.is_some_and(|m| m.index() == square as usize) {
                        BEST_MOVE_VALUE
                    } else if ordering == MoveOrdering::MinimizeOpponentMoves {
                        minimize_opponent_moves_value(player, opponent, flip, square)
                    } else {
                        disproof_number_value(player, opponent, flip, square, upper, evaluator)
                    };
                    moves.push((flip, value));
                }
                Source::Sorted(moves)
            }
        };
        Self {
            player,
            opponent,
            candidates,
            kind: ordering.stats_kind(),
            source,
        }
    }

    /// 次の手の返る石（着手マスを含む）。手がなければ None
    pub fn next_flip(&mut self, stats: &mut SolverStats) -> Option<u64> {
        let flip = match &mut self.source {
            Source::Scan => {
                let mut flip = 0;
                while flip == 0 && self.candidates != 0 {
                    let square = self.candidates.trailing_zeros();
                    self.candidates &= self.candidates - 1;
                    flip = get_flip(square, self.player, self.opponent);
                }
                flip
            }
            Source::Masks { masks, current } => {
                let mut flip = 0;
                while flip == 0 && self.candidates != 0 {
                    while masks[*current] & self.candidates == 0 {
                        *current += 1;
                    }
                    let square = (masks[*current] & self.candidates).trailing_zeros();
                    self.candidates &= !(1u64 << square);
                    flip = get_flip(square, self.player, self.opponent);
                }
                flip
            }
            Source::Sorted(moves) => {
                if moves.is_empty() {
                    return None;
                }
                // 同点なら先に見つかった手
                let mut best = 0;
                for (i, &(_, value)) in moves.iter().enumerate() {
                    if value > moves[best].1 {
                        best = i;
                    }
                }
                moves.swap_remove(best).0
            }
        };
        if flip == 0 {
            return None;
        }
        stats.add(1, self.kind);
        Some(flip)
    }
}

#[inline]
fn minimize_opponent_moves_value(player: u64, opponent: u64, flip: u64, square: u32) -> i32 {
    let moves = get_moves(new_player(flip, opponent), new_opponent(flip, player));
    -((moves.count_ones() + (moves & CORNER).count_ones()) as i32) * 1000 + SQUARE_VALUE[square as usize]
}

#[inline]
fn disproof_number_value(
    player: u64,
    opponent: u64,
    flip: u64,
    square: u32,
    upper: EvalLarge,
    evaluator: &mut dyn FeatureEvaluator,
) -> i32 {
    let square = 1u64 << square;
    evaluator.update(square, flip);
    let eval = evaluator.evaluate();
    let value = -disproof_number_over_prob(new_player(flip, opponent), new_opponent(flip, player), -upper, eval);
    evaluator.undo_update(square, flip);
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::DiskDifferenceEvaluator;
    use crate::movegen::get_all_moves;
    use crate::position::Board;

    const ORDERINGS: [MoveOrdering; 5] = [
        MoveOrdering::VeryQuick,
        MoveOrdering::Quick1,
        MoveOrdering::Quick2,
        MoveOrdering::MinimizeOpponentMoves,
        MoveOrdering::DisproofNumber,
    ];

    fn collect(ordering: MoveOrdering, board: Board, best_move: Option<Square>) -> Vec<u64> {
        let mut evaluator = DiskDifferenceEvaluator::new();
        evaluator.setup(board.player(), board.opponent());
        evaluator.invert();
        let mut stats = SolverStats::new();
        let mut iter = MoveIter::new(ordering, board.player(), board.opponent(), 0, 64, best_move, &mut evaluator);
        let mut flips = Vec::new();
        while let Some(flip) = iter.next_flip(&mut stats) {
            flips.push(flip);
        }
        assert_eq!(stats.get(ordering.stats_kind()), flips.len() as u64);
        flips
    }

    #[test]
    fn test_every_ordering_yields_all_moves_once() {
        for sequence in ["", "f5d6c3d3c4", "f5f6e6f4e3c5c4e7"] {
            let board = Board::from_sequence(sequence).unwrap();
            let mut expected: Vec<u64> = get_all_moves(board.player(), board.opponent()).to_vec();
            expected.sort_unstable();
            for ordering in ORDERINGS {
                let mut flips = collect(ordering, board, None);
                flips.sort_unstable();
                assert_eq!(flips, expected, "{ordering:?} {sequence}");
            }
        }
    }

    #[test]
    fn test_best_move_comes_first() {
        let board = Board::from_sequence("f5d6c3d3c4").unwrap();
        let moves = get_moves(board.player(), board.opponent());
        let last = Square::new((63 - moves.leading_zeros()) as u8);
        for ordering in [MoveOrdering::MinimizeOpponentMoves, MoveOrdering::DisproofNumber] {
            let flips = collect(ordering, board, Some(last));
            assert_ne!(flips[0] & last.bit(), 0);
        }
    }

    #[test]
    fn test_ordering_for_node() {
        assert_eq!(MoveOrdering::for_node(7, true, false), MoveOrdering::Quick1);
        assert_eq!(MoveOrdering::for_node(9, true, false), MoveOrdering::Quick2);
        assert_eq!(MoveOrdering::for_node(11, true, false), MoveOrdering::MinimizeOpponentMoves);
        assert_eq!(MoveOrdering::for_node(12, true, false), MoveOrdering::DisproofNumber);
        assert_eq!(MoveOrdering::for_node(12, true, true), MoveOrdering::Quick1);
        assert_eq!(MoveOrdering::for_node(5, false, false), MoveOrdering::MinimizeOpponentMoves);
        assert_eq!(MoveOrdering::for_node(3, false, true), MoveOrdering::VeryQuick);
    }
}
