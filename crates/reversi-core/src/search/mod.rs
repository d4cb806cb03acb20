//! 並列最良優先探索モジュール
//!
//! 探索木（`tree`）の上で、複数のワーカーが葉を選んで展開・厳密探索する。
//!
//! - `config`: 探索の設定（TOML から読める）
//! - `limits`: 1 回の呼び出しで使える訪問数と時間
//! - `status`: 探索の状態と停止要求
//! - `worker`: 1 スレッド分の探索ループ
//! - `coordinator`: 探索全体の管理（`Coordinator`）
//!
//! ```no_run
//! use reversi_core::eval::PositionalEvaluator;
//! use reversi_core::position::Board;
//! use reversi_core::search::{Coordinator, SearchConfig, SearchLimits};
//!
//! let mut coordinator = Coordinator::new(SearchConfig::default(), PositionalEvaluator::factory()).unwrap();
//! let board = Board::from_sequence("f5d6c3").unwrap();
//! coordinator.evaluate(board, -63, 63, SearchLimits::visits(1_000_000), 4, false).unwrap();
//! println!("{:?}", coordinator.best_score());
//! ```

mod config;
mod coordinator;
mod limits;
mod status;
mod worker;

pub use config::SearchConfig;
pub use coordinator::Coordinator;
pub use limits::SearchLimits;
pub use status::{AtomicStatus, SearchStatus, StopHandle};
