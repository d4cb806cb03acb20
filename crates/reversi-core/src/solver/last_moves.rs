//! 残り 1〜5 マスの専用ソルバ
//!
//! 空きマスを引数で直接受け取り、合法手生成を省いて返る石だけを計算する。
//! 5 マスでは象限ごとの空きマス数（パリティ）で着手順を決める。
//! 値は石数差スケール（`Eval`）。

use crate::bitboard::{stable_disks, upper_bound_from_stable, CENTRAL, CORNER, EDGE, XC};
use crate::movegen::{get_flip, new_opponent, new_player};
use crate::position::game_over_eval;
use crate::types::{Eval, LESS_THAN_MIN_EVAL};

/// 象限（右下、左下、右上、左上）
const SPACES: [u64; 4] = [
    0x0000_0000_0F0F_0F0F,
    0x0000_0000_F0F0_F0F0,
    0x0F0F_0F0F_0000_0000,
    0xF0F0_F0F0_0000_0000,
];

/// 象限内の着手順（隅、中央、辺、C/X）
const SQUARE_ORDER: [u64; 4] = [CORNER, CENTRAL, EDGE, XC];

/// 残り 1 マス
#[inline(always)]
pub fn eval_one_empty(x: u32, player: u64, opponent: u64) -> Eval {
    let flip = get_flip(x, player, opponent);
    if flip != 0 {
        return 2 * new_opponent(flip, player).count_ones() as Eval - 64;
    }
    let flip = get_flip(x, opponent, player);
    if flip != 0 {
        return 64 - 2 * (opponent | flip).count_ones() as Eval;
    }
    let player_disks = 2 * player.count_ones() as Eval;
    player_disks - if player_disks >= 64 { 62 } else { 64 }
}

/// 手番側が打てなければ `LESS_THAN_MIN_EVAL`
#[inline(always)]
fn eval_two_empties_or_min(x1: u32, x2: u32, player: u64, opponent: u64, upper: Eval, n_visited: &mut u64) -> Eval {
    *n_visited += 1;
    let mut eval = LESS_THAN_MIN_EVAL;
    let flip = get_flip(x1, player, opponent);
    if flip != 0 {
        *n_visited += 1;
        eval = -eval_one_empty(x2, new_player(flip, opponent), new_opponent(flip, player));
        if eval >= upper {
            return eval;
        }
    }
    let flip = get_flip(x2, player, opponent);
    if flip != 0 {
        *n_visited += 1;
        return eval.max(-eval_one_empty(x1, new_player(flip, opponent), new_opponent(flip, player)));
    }
    eval
}

/// 残り 2 マス
#[inline]
pub fn eval_two_empties(
    x1: u32,
    x2: u32,
    player: u64,
    opponent: u64,
    lower: Eval,
    upper: Eval,
    n_visited: &mut u64,
) -> Eval {
    let eval = eval_two_empties_or_min(x1, x2, player, opponent, upper, n_visited);
    if eval > LESS_THAN_MIN_EVAL {
        return eval;
    }
    let eval = eval_two_empties_or_min(x1, x2, opponent, player, -lower, n_visited);
    if eval > LESS_THAN_MIN_EVAL {
        return -eval;
    }
    game_over_eval(player, opponent)
}

#[allow(clippy::too_many_arguments)]
#[inline]
fn eval_three_empties_or_min(
    x1: u32,
    x2: u32,
    x3: u32,
    player: u64,
    opponent: u64,
    lower: Eval,
    upper: Eval,
    n_visited: &mut u64,
) -> Eval {
    *n_visited += 1;
    let mut eval = LESS_THAN_MIN_EVAL;
    for (x, rest) in [(x1, (x2, x3)), (x2, (x1, x3)), (x3, (x1, x2))] {
        let flip = get_flip(x, player, opponent);
        if flip == 0 {
            continue;
        }
        eval = eval.max(-eval_two_empties(
            rest.0,
            rest.1,
            new_player(flip, opponent),
            new_opponent(flip, player),
            -upper,
            -lower.max(eval),
            n_visited,
        ));
        if eval >= upper {
            return eval;
        }
    }
    eval
}

/// 残り 3 マス
#[allow(clippy::too_many_arguments)]
pub fn eval_three_empties(
    x1: u32,
    x2: u32,
    x3: u32,
    player: u64,
    opponent: u64,
    lower: Eval,
    upper: Eval,
    n_visited: &mut u64,
) -> Eval {
    let eval = eval_three_empties_or_min(x1, x2, x3, player, opponent, lower, upper, n_visited);
    if eval > LESS_THAN_MIN_EVAL {
        return eval;
    }
    let eval = eval_three_empties_or_min(x1, x2, x3, opponent, player, -upper, -lower, n_visited);
    if eval > LESS_THAN_MIN_EVAL {
        return -eval;
    }
    game_over_eval(player, opponent)
}

/// 確定石による上界で `lower` 以下が確定すればその上界
///
/// `margin` は確定石を計算し直す前の粗い判定の余裕。
#[inline]
fn stability_cutoff(player: u64, opponent: u64, lower: Eval, stable: u64, margin: Eval) -> Option<Eval> {
    if upper_bound_from_stable(stable, opponent) - margin > lower {
        return None;
    }
    let upper = upper_bound_from_stable(stable_disks(opponent, player, stable), opponent);
    (upper <= lower).then_some(upper)
}

/// 4 マスの並び。`swap` なら後半 2 マスが同じ象限
#[derive(Debug, Clone, Copy)]
struct FourEmpties {
    x: [u32; 4],
    swap: bool,
}

impl FourEmpties {
    /// `x[i]` に打った後の残り 3 マス
    #[inline]
    fn rest(&self, i: usize) -> (u32, u32, u32) {
        let [x1, x2, x3, x4] = self.x;
        match (i, self.swap) {
            (0, _) => (x2, x3, x4),
            (1, _) => (x1, x3, x4),
            (2, true) => (x4, x1, x2),
            (2, false) => (x1, x2, x4),
            (3, true) => (x3, x1, x2),
            _ => (x1, x2, x3),
        }
    }
}

fn eval_four_empties_or_min(
    empties: FourEmpties,
    player: u64,
    opponent: u64,
    lower: Eval,
    upper: Eval,
    n_visited: &mut u64,
) -> Eval {
    *n_visited += 1;
    let mut eval = LESS_THAN_MIN_EVAL;
    for (i, &x) in empties.x.iter().enumerate() {
        let flip = get_flip(x, player, opponent);
        if flip == 0 {
            continue;
        }
        let (y1, y2, y3) = empties.rest(i);
        eval = eval.max(-eval_three_empties(
            y1,
            y2,
            y3,
            new_player(flip, opponent),
            new_opponent(flip, player),
            -upper,
            -lower.max(eval),
            n_visited,
        ));
        if eval >= upper {
            return eval;
        }
    }
    eval
}

#[allow(clippy::too_many_arguments)]
fn eval_four_empties(
    empties: FourEmpties,
    player: u64,
    opponent: u64,
    lower: Eval,
    upper: Eval,
    last_flip: u64,
    stable: u64,
    n_visited: &mut u64,
) -> Eval {
    let margin = if last_flip & CORNER == 0 { 10 } else { 20 };
    if let Some(upper) = stability_cutoff(player, opponent, lower, stable, margin) {
        return upper;
    }
    let eval = eval_four_empties_or_min(empties, player, opponent, lower, upper, n_visited);
    if eval > LESS_THAN_MIN_EVAL {
        return eval;
    }
    let eval = eval_four_empties_or_min(empties, opponent, player, -upper, -lower, n_visited);
    if eval > LESS_THAN_MIN_EVAL {
        return -eval;
    }
    game_over_eval(player, opponent)
}

#[allow(clippy::too_many_arguments)]
fn eval_five_empties_or_min(
    x: [u32; 5],
    swap: bool,
    player: u64,
    opponent: u64,
    lower: Eval,
    upper: Eval,
    stable: u64,
    n_visited: &mut u64,
) -> Eval {
    let [x1, x2, x3, x4, x5] = x;
    let mut eval = LESS_THAN_MIN_EVAL;
    for i in 0..5 {
        let flip = get_flip(x[i], player, opponent);
        if flip == 0 {
            continue;
        }
        let rest = match (i, swap) {
            (0, _) => [x2, x3, x4, x5],
            (1, _) => [x1, x3, x4, x5],
            (2, _) => [x1, x2, x4, x5],
            (3, true) => [x5, x1, x2, x3],
            (3, false) => [x1, x2, x3, x5],
            (_, true) => [x4, x1, x2, x3],
            _ => [x1, x2, x3, x4],
        };
        eval = eval.max(-eval_four_empties(
            FourEmpties { x: rest, swap },
            new_player(flip, opponent),
            new_opponent(flip, player),
            -upper,
            -lower.max(eval),
            flip,
            stable,
            n_visited,
        ));
        if eval >= upper {
            return eval;
        }
    }
    eval
}

/// 5 マスの着手順と、同じ象限に 2 マスの組があるか
///
/// 1 マスだけの象限を先、2 マスの象限を後ろに置く。3 マスの象限は
/// 2 マスの象限があれば先頭、なければ末尾。
fn order_five_empties(mut empties: u64) -> ([u32; 5], bool) {
    let mut x = [0u32; 5];
    let mut space_3 = [0u32; 3];
    let mut cont_x = 0usize;
    let mut has_space_2 = false;
    let mut has_space_3 = false;
    for space in SPACES {
        let space_size = (space & empties).count_ones();
        let new_cont_x;
        match space_size {
            0 => continue,
            1 => {
                let bit = space & empties;
                x[cont_x] = bit.trailing_zeros();
                cont_x += 1;
                empties &= !bit;
                continue;
            }
            2 => {
                new_cont_x = cont_x;
                cont_x = if has_space_2 { 1 } else { 3 };
                has_space_2 = true;
            }
            3 => {
                has_space_3 = true;
                let mut j = 0;
                for mask in SQUARE_ORDER {
                    let mut squares = mask & space & empties;
                    while squares != 0 {
                        space_3[j] = squares.trailing_zeros();
                        j += 1;
                        squares &= squares - 1;
                    }
                }
                empties &= !space;
                continue;
            }
            4 => {
                new_cont_x = 0;
                cont_x = 1;
            }
            _ => new_cont_x = cont_x,
        }
        for mask in SQUARE_ORDER {
            let mut squares = mask & space & empties;
            while squares != 0 {
                x[cont_x] = squares.trailing_zeros();
                cont_x += 1;
                squares &= squares - 1;
            }
        }
        empties &= !space;
        cont_x = new_cont_x;
    }
    if has_space_3 {
        let start = if has_space_2 { 0 } else { 2 };
        x[start..start + 3].copy_from_slice(&space_3);
    }
    (x, has_space_2)
}

/// 残り 5 マス
///
/// `stable` は親局面で求めた確定石（0 でもよい）。
pub fn eval_five_empties(
    player: u64,
    opponent: u64,
    lower: Eval,
    upper: Eval,
    last_flip: u64,
    stable: u64,
    n_visited: &mut u64,
) -> Eval {
    debug_assert_eq!((!(player | opponent)).count_ones(), 5);
    let margin = if last_flip & CORNER == 0 { 14 } else { 20 };
    if let Some(upper) = stability_cutoff(player, opponent, lower, stable, margin) {
        return upper;
    }
    let (x, swap) = order_five_empties(!(player | opponent));
    let eval = eval_five_empties_or_min(x, swap, player, opponent, lower, upper, stable, n_visited);
    if eval > LESS_THAN_MIN_EVAL {
        return eval;
    }
    let eval = eval_five_empties_or_min(x, swap, opponent, player, -upper, -lower, stable, n_visited);
    if eval > LESS_THAN_MIN_EVAL {
        return -eval;
    }
    game_over_eval(player, opponent)
}

/// 残り 5 マス以下の局面の正確な値
pub fn eval_last_moves(player: u64, opponent: u64, lower: Eval, upper: Eval, n_visited: &mut u64) -> Eval {
    let empties = !(player | opponent);
    let mut squares = [0u32; 5];
    let mut n = 0;
    let mut rest = empties;
    while rest != 0 && n < 5 {
        squares[n] = rest.trailing_zeros();
        n += 1;
        rest &= rest - 1;
    }
    debug_assert!(rest == 0, "more than 5 empties");
    match n {
        0 => game_over_eval(player, opponent),
        1 => eval_one_empty(squares[0], player, opponent),
        2 => eval_two_empties(squares[0], squares[1], player, opponent, lower, upper, n_visited),
        3 => eval_three_empties(squares[0], squares[1], squares[2], player, opponent, lower, upper, n_visited),
        4 => eval_four_empties(
            FourEmpties { x: [squares[0], squares[1], squares[2], squares[3]], swap: false },
            player,
            opponent,
            lower,
            upper,
            0,
            0,
            n_visited,
        ),
        _ => eval_five_empties(player, opponent, lower, upper, 0, 0, n_visited),
    }
}
