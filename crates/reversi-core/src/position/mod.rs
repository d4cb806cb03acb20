//! 局面（Board）
//!
//! 手番側と相手側の石をそれぞれ u64 で持つ不変な値型。着手のたびに手番が入れ替わる。
//!
//! - `Board`: 局面
//! - `zobrist`: 局面ハッシュ

mod zobrist;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bitboard::n_empties;
use crate::error::BoardError;
use crate::movegen::{get_all_moves_with_pass, get_flip, is_game_over, must_pass, new_opponent, new_player};
use crate::types::{Eval, Square};

pub use zobrist::{hash_board, ZOBRIST};

/// 局面（手番側から見た石の配置）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Board {
    player: u64,
    opponent: u64,
}

impl Default for Board {
    fn default() -> Self {
        Self::start()
    }
}

impl Board {
    /// 黒番の初期局面
    pub const fn start() -> Board {
        Board {
            player: 0x0000_0008_1000_0000,
            opponent: 0x0000_0010_0800_0000,
        }
    }

    /// 石の配置から生成
    pub fn new(player: u64, opponent: u64) -> Result<Board, BoardError> {
        if player & opponent != 0 {
            return Err(BoardError::Overlapping(player & opponent));
        }
        Ok(Board { player, opponent })
    }

    /// 検証なしで生成（重なりが無いことは呼び出し側が保証する）
    #[inline]
    pub(crate) const fn from_masks(player: u64, opponent: u64) -> Board {
        debug_assert!(player & opponent == 0);
        Board { player, opponent }
    }

    /// 初期局面から `"e6f4c3"` 形式の手順を進めた局面
    ///
    /// 手番側が打てない場合は自動でパスする。
    pub fn from_sequence(sequence: &str) -> Result<Board, BoardError> {
        let mut board = Board::start();
        let chars: Vec<char> = sequence.chars().filter(|c| !c.is_whitespace()).collect();
        for (ply, pair) in chars.chunks(2).enumerate() {
            let text: String = pair.iter().collect();
            let square: Square = text.parse()?;
            if must_pass(board.player, board.opponent) {
                board = board.pass();
            }
            board = board
                .play(square)
                .ok_or(BoardError::IllegalMove { square: text, ply })?;
        }
        Ok(board)
    }

    #[inline]
    pub const fn player(&self) -> u64 {
        self.player
    }

    #[inline]
    pub const fn opponent(&self) -> u64 {
        self.opponent
    }

    #[inline]
    pub const fn empties(&self) -> u64 {
        !(self.player | self.opponent)
    }

    #[inline]
    pub const fn n_empties(&self) -> u32 {
        n_empties(self.player, self.opponent)
    }

    /// ハッシュ値
    #[inline]
    pub fn hash_key(&self) -> u64 {
        hash_board(self.player, self.opponent)
    }

    /// `square` に打った局面（非合法なら None）
    pub fn play(&self, square: Square) -> Option<Board> {
        let flip = get_flip(square.index() as u32, self.player, self.opponent);
        if flip == 0 {
            return None;
        }
        Some(self.play_flip(flip))
    }

    /// 返る石のマスクを適用した局面（0 ならパス）
    #[inline]
    pub const fn play_flip(&self, flip: u64) -> Board {
        Board {
            player: new_player(flip, self.opponent),
            opponent: new_opponent(flip, self.player),
        }
    }

    /// パスした局面
    #[inline]
    pub const fn pass(&self) -> Board {
        Board {
            player: self.opponent,
            opponent: self.player,
        }
    }

    /// パスを含む全ての次局面
    pub fn successors(&self) -> Vec<Board> {
        get_all_moves_with_pass(self.player, self.opponent)
            .into_iter()
            .map(|flip| self.play_flip(flip))
            .collect()
    }

    #[inline]
    pub fn is_game_over(&self) -> bool {
        is_game_over(self.player, self.opponent)
    }

    /// 終局時の石差（空きマスは勝った側に加算）
    #[inline]
    pub fn game_over_eval(&self) -> Eval {
        game_over_eval(self.player, self.opponent)
    }
}

/// 終局時の石差（空きマスは勝った側に加算、引き分けは 0）
pub fn game_over_eval(player: u64, opponent: u64) -> Eval {
    let player_disks = player.count_ones() as i32;
    let opponent_disks = opponent.count_ones() as i32;
    let diff = player_disks - opponent_disks;
    diff + diff.signum() * (64 - player_disks - opponent_disks)
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  a b c d e f g h")?;
        for row in 0..8u8 {
            write!(f, "{}", row + 1)?;
            for column in 0..8u8 {
                let bit = Square::from_coords(column, row).bit();
                let c = if self.player & bit != 0 {
                    'X'
                } else if self.opponent & bit != 0 {
                    'O'
                } else {
                    '-'
                };
                write!(f, " {c}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_sequence() {
        let board = Board::from_sequence("e6").unwrap();
        assert_eq!(board.n_empties(), 59);
        assert_eq!(board.player().count_ones(), 1);
        assert_eq!(board.opponent().count_ones(), 4);
        assert_eq!(board.successors().len(), 3);
    }

    #[test]
    fn test_from_sequence_illegal() {
        let err = Board::from_sequence("e6a1").unwrap_err();
        assert_eq!(
            err,
            BoardError::IllegalMove {
                square: "a1".to_string(),
                ply: 1
            }
        );
    }

    #[test]
    fn test_game_over_eval() {
        assert_eq!(game_over_eval(0xFF, 0xFF00), 0);
        assert_eq!(game_over_eval(0xFFF, 0xF000), 56);
        assert_eq!(game_over_eval(0xF, 0xFF00), -56);
        assert_eq!(game_over_eval(u64::MAX, 0), 64);
    }

    #[test]
    fn test_pass_swaps_sides() {
        let board = Board::start();
        assert_eq!(board.pass().pass(), board);
        assert!(Board::new(1, 1).is_err());
    }
}
