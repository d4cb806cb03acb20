//! ビットボードモジュール
//!
//! 64マスの盤面を u64 で表現する。ビット 63 が a1（左上）、ビット 0 が h8（右下）。
//!
//! - 行・列・対角のマスク
//! - 着手順序付けに使う局所パターン（隅、X打ち、中央、辺、C/X）
//! - 近傍計算と辺の空きマス集計
//! - 確定石（`stable`）

mod stable;

pub use stable::{
    full_columns, full_diags7, full_diags9, full_rows, stable_disks, stable_disks_edges,
    stable_disks_upper_bound, upper_bound_from_stable,
};

/// 最下行（8 行目）
pub const LAST_ROW: u64 = 0x0000_0000_0000_00FF;
/// 最上行（1 行目）
pub const FIRST_ROW: u64 = LAST_ROW << 56;
/// 右端列（h 列）
pub const LAST_COLUMN: u64 = 0x0101_0101_0101_0101;
/// 左端列（a 列）
pub const FIRST_COLUMN: u64 = LAST_COLUMN << 7;

/// 主対角線 a1-h8
pub const MAIN_DIAG9: u64 = 0x8040_2010_0804_0201;
/// 反対角線 h1-a8
pub const MAIN_DIAG7: u64 = 0x0102_0408_1020_4080;

/// 隅
pub const CORNER: u64 = 0x8100_0000_0000_0081;
/// X 打ち（b2, g2, b7, g7）
pub const X_SQUARES: u64 = 0x0042_0000_0000_4200;
/// 中央 4x4 と周辺（辺・隅・X/C を除いた内側）
pub const CENTRAL: u64 = 0x003C_7E7E_7E7E_3C00;
/// 隅と C 打ちを除いた辺
pub const EDGE: u64 = 0x3C00_8181_8181_003C;
/// C 打ちと X 打ち
pub const XC: u64 = 0x42C3_0000_0000_C342;
/// 全ての辺
pub const EDGES: u64 = FIRST_ROW | LAST_ROW | FIRST_COLUMN | LAST_COLUMN;
/// 辺以外
pub const NON_EDGE: u64 = !EDGES;

/// 4 分割した象限（右下、左下、右上、左上）
pub const QUADRANTS: [u64; 4] = [
    0x0000_0000_0F0F_0F0F,
    0x0000_0000_F0F0_F0F0,
    0x0F0F_0F0F_0000_0000,
    0xF0F0_F0F0_0000_0000,
];

/// 空きマス数
#[inline]
pub const fn n_empties(player: u64, opponent: u64) -> u32 {
    64 - (player | opponent).count_ones()
}

/// 隣接 8 方向のマス（盤外へのはみ出しは除く）
#[inline]
pub const fn neighbors(b: u64) -> u64 {
    (((b << 1) | (b << 9) | (b >> 7)) & !LAST_COLUMN)
        | (((b >> 1) | (b >> 9) | (b << 7)) & !FIRST_COLUMN)
        | (b >> 8)
        | (b << 8)
}

/// ちょうど 1 ビットならそのまま、それ以外は 0
#[inline]
pub const fn unique_set(b: u64) -> u64 {
    if b.count_ones() == 1 { b } else { 0 }
}

/// 最下位ビットと最上位ビット
#[inline]
pub const fn first_last_set(b: u64) -> u64 {
    if b == 0 {
        0
    } else {
        (1u64 << b.trailing_zeros()) | (1u64 << (63 - b.leading_zeros()))
    }
}

/// 各辺で唯一の空きマス
#[inline]
pub const fn unique_in_edges(empties: u64) -> u64 {
    unique_set(empties & LAST_ROW)
        | unique_set(empties & FIRST_ROW)
        | unique_set(empties & FIRST_COLUMN)
        | unique_set(empties & LAST_COLUMN)
}

/// 各辺の端にある空きマス（隅は除く）
#[inline]
pub const fn first_last_in_edges(empties: u64) -> u64 {
    (first_last_set(empties & LAST_ROW)
        | first_last_set(empties & FIRST_ROW)
        | first_last_set(empties & FIRST_COLUMN)
        | first_last_set(empties & LAST_COLUMN))
        & !CORNER
}

/// ビット列を下位から 1 ビットずつ取り出すイテレータ
#[derive(Debug, Clone, Copy)]
pub struct BitIter(u64);

impl BitIter {
    #[inline]
    pub const fn new(b: u64) -> Self {
        BitIter(b)
    }
}

impl Iterator for BitIter {
    type Item = u64;

    #[inline]
    fn next(&mut self) -> Option<u64> {
        if self.0 == 0 {
            return None;
        }
        let bit = self.0 & self.0.wrapping_neg();
        self.0 &= self.0 - 1;
        Some(bit)
    }
}

/// 盤面をデバッグ用に 8x8 の文字列へ変換
pub fn pattern_to_string(pattern: u64) -> String {
    let mut result = String::with_capacity(72);
    for i in (0..64).rev() {
        result.push(if pattern & (1u64 << i) != 0 { 'X' } else { '-' });
        if i % 8 == 0 {
            result.push('\n');
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Square;

    fn sq(s: &str) -> u64 {
        s.parse::<Square>().unwrap().bit()
    }

    #[test]
    fn test_pattern_layout() {
        assert_eq!(CORNER, sq("a1") | sq("h1") | sq("a8") | sq("h8"));
        assert_eq!(X_SQUARES, sq("b2") | sq("g2") | sq("b7") | sq("g7"));
        assert_eq!(FIRST_COLUMN & FIRST_ROW, sq("a1"));
        assert_eq!(LAST_COLUMN & LAST_ROW, sq("h8"));
        assert_eq!(CENTRAL & (EDGES | XC), 0);
        assert_eq!(EDGE & (CORNER | XC), 0);
        assert_eq!(QUADRANTS.iter().fold(0, |acc, q| acc | q), u64::MAX);
        assert!(QUADRANTS[3] & sq("a1") != 0);
        assert!(QUADRANTS[0] & sq("h8") != 0);
    }

    #[test]
    fn test_neighbors() {
        assert_eq!(neighbors(sq("a1")), sq("b1") | sq("a2") | sq("b2"));
        assert_eq!(neighbors(sq("h8")), sq("g8") | sq("h7") | sq("g7"));
        assert_eq!(neighbors(sq("d4")).count_ones(), 8);
        assert_eq!(neighbors(sq("a4")).count_ones(), 5);
    }

    #[test]
    fn test_edges_helpers() {
        let empties = sq("c1") | sq("h3") | sq("h5");
        assert_eq!(unique_in_edges(empties), sq("c1"));
        assert_eq!(first_last_in_edges(empties), empties);
        assert_eq!(first_last_in_edges(sq("a1") | sq("c1")), sq("c1"));
        assert_eq!(first_last_set(0), 0);
    }

    #[test]
    fn test_bit_iter() {
        let bits: Vec<u64> = BitIter::new(0b1010_0001).collect();
        assert_eq!(bits, vec![1, 0b10_0000, 0b1000_0000]);
    }
}
