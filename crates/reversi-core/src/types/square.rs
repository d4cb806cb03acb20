//! マス（Square）
//!
//! ビット位置 63 が a1（左上）、0 が h8（右下）。列は a-h が左から右、行は 1-8 が上から下。

use std::fmt;
use std::str::FromStr;

use crate::error::BoardError;

/// 盤上のマス（ビット位置 0..64）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Square(u8);

impl Square {
    /// ビット位置から生成
    #[inline]
    pub const fn new(index: u8) -> Square {
        debug_assert!(index < 64);
        Square(index)
    }

    /// 列（0 = a）と行（0 = 1 行目）から生成
    #[inline]
    pub const fn from_coords(column: u8, row: u8) -> Square {
        Square(63 - (row * 8 + column))
    }

    /// 単一ビットのマスクから生成
    #[inline]
    pub const fn from_bit(bit: u64) -> Square {
        Square(bit.trailing_zeros() as u8)
    }

    /// ビット位置
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// 単一ビットのマスク
    #[inline]
    pub const fn bit(self) -> u64 {
        1u64 << self.0
    }

    /// 列（0 = a）
    #[inline]
    pub const fn column(self) -> u8 {
        (63 - self.0) % 8
    }

    /// 行（0 = 1 行目）
    #[inline]
    pub const fn row(self) -> u8 {
        (63 - self.0) / 8
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'a' + self.column()) as char, self.row() + 1)
    }
}

impl FromStr for Square {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return Err(BoardError::InvalidSquare(s.to_string()));
        }
        let column = bytes[0].to_ascii_lowercase().wrapping_sub(b'a');
        let row = bytes[1].wrapping_sub(b'1');
        if column >= 8 || row >= 8 {
            return Err(BoardError::InvalidSquare(s.to_string()));
        }
        Ok(Square::from_coords(column, row))
    }
}
