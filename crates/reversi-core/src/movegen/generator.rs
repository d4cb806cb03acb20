//! 合法手生成と返る石の計算

use smallvec::SmallVec;

use crate::bitboard::BitIter;

/// 合法手（返る石のマスク）のリスト。通常は 32 手以内に収まる
pub type FlipList = SmallVec<[u64; 32]>;

/// 8 方向のシフト量と、横方向のはみ出しを防ぐマスク
const DIRECTIONS: [(i32, u64); 8] = [
    (1, 0x7E7E_7E7E_7E7E_7E7E),
    (-1, 0x7E7E_7E7E_7E7E_7E7E),
    (8, u64::MAX),
    (-8, u64::MAX),
    (7, 0x7E7E_7E7E_7E7E_7E7E),
    (-7, 0x7E7E_7E7E_7E7E_7E7E),
    (9, 0x7E7E_7E7E_7E7E_7E7E),
    (-9, 0x7E7E_7E7E_7E7E_7E7E),
];

#[inline]
const fn shift(b: u64, amount: i32) -> u64 {
    if amount > 0 { b << amount } else { b >> -amount }
}

/// 手番側の合法手（着手可能なマス）
pub fn get_moves(player: u64, opponent: u64) -> u64 {
    let empties = !(player | opponent);
    let mut moves = 0;
    for (amount, mask) in DIRECTIONS {
        let o = opponent & mask;
        let mut t = shift(player, amount) & o;
        for _ in 0..5 {
            t |= shift(t, amount) & o;
        }
        moves |= shift(t, amount);
    }
    moves & empties
}

/// 合法手の数
#[inline]
pub fn n_moves(player: u64, opponent: u64) -> u32 {
    get_moves(player, opponent).count_ones()
}

/// `square` に打ったときに返る石。打てない場合は 0、打てる場合は着手マスも含む
pub fn get_flip(square: u32, player: u64, opponent: u64) -> u64 {
    let x = (square % 8) as i32;
    let y = (square / 8) as i32;
    let mut flip = 0u64;
    for (dx, dy) in [(1, 0), (-1, 0), (0, 1), (0, -1), (1, 1), (1, -1), (-1, 1), (-1, -1)] {
        let mut line = 0u64;
        let (mut cx, mut cy) = (x + dx, y + dy);
        while (0..8).contains(&cx) && (0..8).contains(&cy) {
            let bit = 1u64 << (cy * 8 + cx);
            if opponent & bit != 0 {
                line |= bit;
            } else {
                if player & bit != 0 {
                    flip |= line;
                }
                break;
            }
            cx += dx;
            cy += dy;
        }
    }
    if flip == 0 { 0 } else { flip | (1u64 << square) }
}

/// 打てる手が無いか
#[inline]
pub fn must_pass(player: u64, opponent: u64) -> bool {
    get_moves(player, opponent) == 0
}

/// 両者とも打てないか
#[inline]
pub fn is_game_over(player: u64, opponent: u64) -> bool {
    must_pass(player, opponent) && must_pass(opponent, player)
}

/// 全ての合法手の返る石
pub fn get_all_moves(player: u64, opponent: u64) -> FlipList {
    BitIter::new(get_moves(player, opponent))
        .map(|bit| get_flip(bit.trailing_zeros(), player, opponent))
        .collect()
}

/// パスを含む合法手
///
/// 打てる手があればその一覧、パスしかなければ `[0]`（パスは返る石 0 として扱う）、
/// 終局なら空。
pub fn get_all_moves_with_pass(player: u64, opponent: u64) -> FlipList {
    let moves = get_all_moves(player, opponent);
    if moves.is_empty() && !must_pass(opponent, player) {
        let mut pass = FlipList::new();
        pass.push(0);
        return pass;
    }
    moves
}

/// 着手後の手番側（元の相手）の石
#[inline]
pub const fn new_player(flip: u64, opponent: u64) -> u64 {
    opponent & !flip
}

/// 着手後の相手側（元の手番側）の石
#[inline]
pub const fn new_opponent(flip: u64, player: u64) -> u64 {
    player | flip
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Square;

    const BLACK: u64 = 0x0000_0008_1000_0000;
    const WHITE: u64 = 0x0000_0010_0800_0000;

    fn sq(s: &str) -> u64 {
        s.parse::<Square>().unwrap().bit()
    }

    #[test]
    fn test_initial_moves() {
        assert_eq!(get_moves(BLACK, WHITE), sq("d3") | sq("c4") | sq("f5") | sq("e6"));
        assert_eq!(n_moves(WHITE, BLACK), 4);
    }

    #[test]
    fn test_get_flip() {
        let e6 = "e6".parse::<Square>().unwrap();
        assert_eq!(get_flip(e6.index() as u32, BLACK, WHITE), sq("e6") | sq("e5"));
        let a1 = "a1".parse::<Square>().unwrap();
        assert_eq!(get_flip(a1.index() as u32, BLACK, WHITE), 0);
    }

    #[test]
    fn test_flip_consistent_with_moves() {
        let moves = get_moves(BLACK, WHITE);
        for square in 0..64u32 {
            let flip = get_flip(square, BLACK, WHITE);
            assert_eq!(flip != 0, moves & (1u64 << square) != 0, "square {square}");
        }
    }

    #[test]
    fn test_moves_with_pass() {
        // 白にしか打てる手がない局面
        let player = sq("a1");
        let opponent = sq("b1") | sq("c1");
        let moves = get_all_moves_with_pass(player, opponent);
        assert_eq!(moves.as_slice(), &[sq("d1") | sq("c1") | sq("b1")]);
        let passed = get_all_moves_with_pass(opponent, player);
        assert_eq!(passed.as_slice(), &[0]);
        assert!(get_all_moves_with_pass(u64::MAX, 0).is_empty());
    }
}
