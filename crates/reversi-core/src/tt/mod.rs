//! 置換表モジュール
//!
//! 厳密探索（alpha-beta）の結果をキャッシュする置換表（Transposition Table）。
//! 全ワーカーで共有する。
//!
//! - `TtEntry`: エントリ（局面、上下限、深さ、最善手・次善手）
//! - `TranspositionTable`: テーブル本体
//! - 世代管理
//!
//! スロットごとに Mutex を持ち、`try_lock` に失敗したら読み書きとも諦める（損失を許容）。

mod table;

pub use table::{TranspositionTable, TtEntry};

/// デフォルトのテーブルサイズ（2^bits スロット）
pub const DEFAULT_TT_BITS: u32 = 20;
