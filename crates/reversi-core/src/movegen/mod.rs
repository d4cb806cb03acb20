//! 指し手生成モジュール
//!
//! - `get_moves`: 合法手のマスク
//! - `get_flip`: 1 手で返る石
//! - `get_all_moves_with_pass`: パス（返る石 0）を含む合法手一覧

mod generator;

pub use generator::*;
