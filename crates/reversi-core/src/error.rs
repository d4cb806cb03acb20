//! エラー型
//!
//! - `BoardError`: 局面・マス表記の解析エラー
//! - `ChildError`: 子ノード集合の構造エラー（呼び出し側の契約違反）
//! - `SearchError`: 探索要求の検証エラー

use thiserror::Error;

use crate::types::Eval;

/// 局面・マス表記の解析エラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    #[error("Invalid square: {0:?}")]
    InvalidSquare(String),

    #[error("Illegal move {square} at ply {ply}")]
    IllegalMove { square: String, ply: usize },

    #[error("Overlapping player and opponent masks: {0:#018x}")]
    Overlapping(u64),
}

/// 子ノード集合の構造エラー
///
/// 子の集合が合法手（パス含む）と一致しない場合に返す。探索中に発生した場合は致命的。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChildError {
    #[error("Wrong number of children: expected {expected}, got {actual}")]
    WrongCount { expected: usize, actual: usize },

    #[error("Wrong child depth: expected {expected}, got {actual}")]
    WrongDepth { expected: u32, actual: u32 },

    #[error("Child position is not a successor: player={player:#018x} opponent={opponent:#018x}")]
    NotSuccessor { player: u64, opponent: u64 },

    #[error("Duplicate child: player={player:#018x} opponent={opponent:#018x}")]
    Duplicate { player: u64, opponent: u64 },
}

/// 探索要求のエラー
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid window [{lower}, {upper}]: bounds must be odd and ordered")]
    InvalidWindow { lower: Eval, upper: Eval },

    #[error("Number of threads must be positive")]
    NoThreads,

    #[error("No search has been started")]
    NotStarted,

    #[error("Invalid config: {0}")]
    Config(String),

    #[error(transparent)]
    Board(#[from] BoardError),

    #[error(transparent)]
    Child(#[from] ChildError),
}

/// 探索系の Result
pub type SearchResult<T> = Result<T, SearchError>;
