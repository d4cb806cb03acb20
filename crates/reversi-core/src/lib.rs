//! # reversi-core
//!
//! オセロの並列最良優先確率探索エンジン。
//!
//! ## モジュール構成
//!
//! - `types`: 基本型（Square, Eval, EvalLarge）
//! - `bitboard`: ビットボード演算と確定石
//! - `movegen`: 合法手生成
//! - `position`: 局面（`Board`）
//! - `error`: エラー型
//! - `estimators`: 勝率・証明数の推定と量子化
//! - `eval`: 葉の静的評価
//! - `tt`: 置換表（Transposition Table）
//! - `solver`: 窓付き alpha-beta 探索
//! - `tree`: 探索木（DAG）と統計量
//! - `search`: 並列最良優先探索
//! - `book`: 定跡とのインターフェース
//!

// 基本型
pub mod types;

// 盤面表現
pub mod bitboard;
pub mod movegen;
pub mod position;

pub mod error;

// 推定器と評価
pub mod estimators;
pub mod eval;

// 厳密探索
pub mod solver;
pub mod tt;

// 最良優先探索
pub mod search;
pub mod tree;

pub mod book;

pub use error::{ChildError, SearchError, SearchResult};
pub use position::Board;
pub use search::{Coordinator, SearchConfig, SearchLimits, SearchStatus, StopHandle};
