//! 探索木モジュール
//!
//! 最良優先の確率探索で使う DAG。
//!
//! - `combiner`: 子の確率を親の確率に合成する関数
//! - `estimate`: 閾値ごとの統計量（`ScoreEstimate`）と量子化された合成テーブル
//! - `stats`: ノードの統計量（`NodeStats`）と子からの集約
//! - `node`: ロック付きのノード（`TreeNode`）
//! - `arena`: ノードのアリーナと転置索引（`NodeArena`）
//! - `cursor`: 根から葉までの経路（`SearchCursor`）
//! - `window`: 探索全体で追跡する閾値の窓（`TrackedWindow`）
//! - `snapshot`: ロックの外に取り出したノード（`NodeSnapshot`）

pub mod arena;
pub mod combiner;
pub mod cursor;
pub mod estimate;
pub mod node;
pub mod snapshot;
pub mod stats;
pub mod window;

pub use arena::NodeArena;
pub use cursor::SearchCursor;
pub use estimate::{ScoreEstimate, COMBINE_TABLES, LOG_DERIVATIVE_MINUS_INF};
pub use node::{Children, NodeId, Selection, TreeNode};
pub use snapshot::NodeSnapshot;
pub use stats::{NodeStats, PROB_FOR_ENDGAME_ALPHA_BETA};
pub use window::TrackedWindow;

#[cfg(test)]
mod tests;
