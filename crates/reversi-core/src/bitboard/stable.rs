//! 確定石（stable disks）
//!
//! 辺の確定石は 1 行分の全配置（3^8 通り）を後ろ向きに埋めたテーブルで引く。
//! 内部は「4 方向全てで、埋まった線か確定石に接している」石を反復的に広げる。
//! 結果は確定石の部分集合（過小評価はあっても過大評価はしない）。

use std::sync::LazyLock;

use super::{FIRST_COLUMN, FIRST_ROW, LAST_COLUMN, LAST_ROW, NON_EDGE};

const ALL_MINUS_FIRST_COLUMN: u64 = !FIRST_COLUMN;
const ALL_MINUS_FIRST_2_COLUMNS: u64 = !(FIRST_COLUMN | (FIRST_COLUMN >> 1));
const ALL_MINUS_FIRST_4_COLUMNS: u64 =
    !(FIRST_COLUMN | (FIRST_COLUMN >> 1) | (FIRST_COLUMN >> 2) | (FIRST_COLUMN >> 3));
const ALL_MINUS_LAST_COLUMN: u64 = !LAST_COLUMN;
const ALL_MINUS_LAST_2_COLUMNS: u64 = !(LAST_COLUMN | (LAST_COLUMN << 1));
const ALL_MINUS_LAST_4_COLUMNS: u64 = !ALL_MINUS_FIRST_4_COLUMNS;

/// 1 行（8 マス）の配置ごとの確定石
struct EdgeStableTable {
    entries: Vec<u8>,
}

impl EdgeStableTable {
    #[inline]
    const fn hash(player: u8, opponent: u8) -> usize {
        player as usize | ((opponent as usize) << 8)
    }

    /// 1 行の中で x に打ったときに返る石
    fn line_flip(x: u32, player: u8, opponent: u8) -> u8 {
        let mut flip = 0u8;
        for step in [1i32, -1] {
            let mut pos = x as i32 + step;
            let mut line = 0u8;
            while (0..8).contains(&pos) && opponent & (1 << pos) != 0 {
                line |= 1 << pos;
                pos += step;
            }
            if (0..8).contains(&pos) && player & (1 << pos) != 0 {
                flip |= line;
            }
        }
        flip
    }

    fn fill(&mut self, player: u8, opponent: u8) {
        let empties = !(player | opponent);
        let mut stable = !empties;

        for x in 0..8 {
            let square = 1u8 << x;
            if empties & square == 0 {
                continue;
            }
            // 空きマスが 1 つ少ない配置は既に埋まっている
            let flip = Self::line_flip(x, player, opponent) | square;
            stable &= !flip & self.entries[Self::hash(opponent & !flip, player | flip)];
            let flip = Self::line_flip(x, opponent, player) | square;
            stable &= !flip & self.entries[Self::hash(player & !flip, opponent | flip)];
        }
        self.entries[Self::hash(player, opponent)] = stable;
    }

    fn new() -> Self {
        let mut table = EdgeStableTable { entries: vec![0; 65536] };
        for empties in 0..=255u8 {
            for player in 0..=255u8 {
                if player & empties != 0 {
                    continue;
                }
                table.fill(player, !(empties | player));
            }
        }
        table
    }

    #[inline]
    fn get(&self, player: u8, opponent: u8) -> u8 {
        self.entries[Self::hash(player, opponent)]
    }
}

static EDGE_STABLE: LazyLock<EdgeStableTable> = LazyLock::new(EdgeStableTable::new);

/// 列を 1 行分のビット列に詰める（行 i を bit i に）
#[inline]
fn column_to_line(pattern: u64, column_offset: u32) -> u8 {
    let mut line = 0u8;
    for i in 0..8 {
        line |= (((pattern >> (i * 8 + column_offset)) & 1) as u8) << i;
    }
    line
}

#[inline]
fn line_to_column(line: u8, column_offset: u32) -> u64 {
    let mut pattern = 0u64;
    for i in 0..8 {
        pattern |= (((line >> i) & 1) as u64) << (i * 8 + column_offset);
    }
    pattern
}

/// 4 辺の確定石
pub fn stable_disks_edges(player: u64, opponent: u64) -> u64 {
    let table = &*EDGE_STABLE;
    let mut stable = table.get((player & LAST_ROW) as u8, (opponent & LAST_ROW) as u8) as u64;
    stable |= (table.get(
        ((player & FIRST_ROW) >> 56) as u8,
        ((opponent & FIRST_ROW) >> 56) as u8,
    ) as u64)
        << 56;
    stable |= line_to_column(
        table.get(column_to_line(player, 0), column_to_line(opponent, 0)),
        0,
    );
    stable |= line_to_column(
        table.get(column_to_line(player, 7), column_to_line(opponent, 7)),
        7,
    );
    stable
}

/// 反対角方向（a8-h1 向き）に埋まっている線上のマス
pub fn full_diags7(empty: u64) -> u64 {
    let mut empty_l = empty | ((empty >> 7) & ALL_MINUS_LAST_COLUMN);
    empty_l |= (empty_l >> 14) & ALL_MINUS_LAST_2_COLUMNS;
    empty_l |= (empty_l >> 28) & ALL_MINUS_LAST_4_COLUMNS;

    let mut empty_r = empty | ((empty << 7) & ALL_MINUS_FIRST_COLUMN);
    empty_r |= (empty_r << 14) & ALL_MINUS_FIRST_2_COLUMNS;
    empty_r |= (empty_r << 28) & ALL_MINUS_FIRST_4_COLUMNS;

    !(empty_l | empty_r)
}

/// 主対角方向（a1-h8 向き）に埋まっている線上のマス
pub fn full_diags9(empty: u64) -> u64 {
    let mut empty_l = empty | ((empty << 9) & ALL_MINUS_LAST_COLUMN);
    empty_l |= (empty_l << 18) & ALL_MINUS_LAST_2_COLUMNS;
    empty_l |= (empty_l << 36) & ALL_MINUS_LAST_4_COLUMNS;

    let mut empty_r = empty | ((empty >> 9) & ALL_MINUS_FIRST_COLUMN);
    empty_r |= (empty_r >> 18) & ALL_MINUS_FIRST_2_COLUMNS;
    empty_r |= (empty_r >> 36) & ALL_MINUS_FIRST_4_COLUMNS;

    !(empty_l | empty_r)
}

/// 埋まっている列上のマス
pub fn full_columns(empty: u64) -> u64 {
    let mut empty_l = empty | (empty >> 8);
    empty_l |= empty_l >> 16;
    empty_l |= empty_l >> 32;

    let mut empty_r = empty | (empty << 8);
    empty_r |= empty_r << 16;
    empty_r |= empty_r << 32;

    !(empty_l | empty_r)
}

/// 埋まっている行上のマス
pub fn full_rows(empty: u64) -> u64 {
    let mut empty_l = empty | ((empty << 1) & ALL_MINUS_LAST_COLUMN);
    empty_l |= (empty_l << 2) & ALL_MINUS_LAST_2_COLUMNS;
    empty_l |= (empty_l << 4) & ALL_MINUS_LAST_4_COLUMNS;

    let mut empty_r = empty | ((empty >> 1) & ALL_MINUS_FIRST_COLUMN);
    empty_r |= (empty_r >> 2) & ALL_MINUS_FIRST_2_COLUMNS;
    empty_r |= (empty_r >> 4) & ALL_MINUS_FIRST_4_COLUMNS;

    !(empty_l | empty_r)
}

/// 確定石
///
/// `stable` には既知の確定石（親局面で求めたもの）を渡せる。内部への伝播は
/// `player` の石についてのみ行う。
pub fn stable_disks(player: u64, opponent: u64, stable: u64) -> u64 {
    let mut stable = stable | stable_disks_edges(player, opponent);
    let empties = !(player | opponent);
    let rows = full_rows(empties);
    let columns = full_columns(empties);
    let diags9 = full_diags9(empties);
    let diags7 = full_diags7(empties);
    stable |= rows & columns & diags9 & diags7;

    let mut stable_player = stable & player;
    let mut new_stable = stable_player;
    while new_stable != 0 {
        new_stable = (stable_player << 1) | (stable_player >> 1) | rows;
        new_stable &= (stable_player << 8) | (stable_player >> 8) | columns;
        new_stable &= (stable_player << 7) | (stable_player >> 7) | diags7;
        new_stable &= (stable_player << 9) | (stable_player >> 9) | diags9;
        new_stable &= player & NON_EDGE & !stable_player;
        stable_player |= new_stable;
    }
    stable | stable_player
}

/// 確定石から求まる手番側の最終石差の上界
#[inline]
pub const fn upper_bound_from_stable(stable: u64, opponent: u64) -> i32 {
    64 - 2 * (stable & opponent).count_ones() as i32
}

/// 相手の確定石から求まる手番側の最終石差の上界
#[inline]
pub fn stable_disks_upper_bound(player: u64, opponent: u64) -> i32 {
    upper_bound_from_stable(stable_disks(opponent, player, 0), opponent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_table_full_line() {
        let table = &*EDGE_STABLE;
        assert_eq!(table.get(0b1010_1010, 0b0101_0101), 0xFF);
        assert_eq!(table.get(0, 0), 0);
    }

    #[test]
    fn test_edge_table_corner_run() {
        let table = &*EDGE_STABLE;
        // 隅から続く自石は確定
        assert_eq!(table.get(0b0000_0111, 0), 0b0000_0111);
        // 隅を含まない石は返される可能性がある
        assert_eq!(table.get(0b0001_1000, 0), 0);
        // 相手石に挟まれていても片側が空いていれば不確定
        assert_eq!(table.get(0b0000_0010, 0b0000_0001) & 0b10, 0);
    }

    #[test]
    fn test_stable_full_board() {
        let player = 0xFFFF_FFFF_0000_0000;
        let opponent = !player;
        assert_eq!(stable_disks(player, opponent, 0), u64::MAX);
        assert_eq!(stable_disks_upper_bound(player, opponent), 0);
    }

    #[test]
    fn test_stable_corner_propagation() {
        let a1 = 1u64 << 63;
        let b1 = 1u64 << 62;
        let c1 = 1u64 << 61;
        let a2 = 1u64 << 55;
        let b2 = 1u64 << 54;
        let a3 = 1u64 << 47;
        // b2 は c1-a3 の斜めが空いているので返される可能性がある
        let player = a1 | b1 | a2 | b2;
        assert_eq!(stable_disks(player, 0, 0) & player, a1 | b1 | a2);
        // c1, a3 も自石なら 4 方向全てが確定石に接する
        let player = player | c1 | a3;
        assert_eq!(stable_disks(player, 0, 0) & player, player);
    }

    #[test]
    fn test_column_roundtrip() {
        let pattern = LAST_COLUMN & 0x0001_0000_0100_0001;
        assert_eq!(line_to_column(column_to_line(pattern, 0), 0), pattern);
        let left = FIRST_COLUMN & 0x8000_0080_0000_8000;
        assert_eq!(line_to_column(column_to_line(left, 7), 7), left);
    }
}
