//! 探索の状態
//!
//! - `SearchStatus`: 探索の状態
//! - `AtomicStatus`: ワーカー間で共有する状態
//! - `StopHandle`: 別スレッドから探索を止めるハンドル

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum SearchStatus {
    /// 探索していない
    None = 0,
    Running = 1,
    /// 時間切れ
    StoppedTime = 2,
    /// 訪問数の上限
    StoppedPositions = 3,
    /// 根が目標の窓で解けた
    Solved = 4,
    /// 停止要求を受けた（ワーカーが次に確認した時点で `Killed`）
    Killing = 5,
    Killed = 6,
    /// 子の集合の構造エラー
    Failed = 7,
    /// 探索木のノードを使い切りそう
    StoppedTreePositions = 8,
}

impl SearchStatus {
    const fn from_u8(value: u8) -> SearchStatus {
        match value {
            1 => SearchStatus::Running,
            2 => SearchStatus::StoppedTime,
            3 => SearchStatus::StoppedPositions,
            4 => SearchStatus::Solved,
            5 => SearchStatus::Killing,
            6 => SearchStatus::Killed,
            7 => SearchStatus::Failed,
            8 => SearchStatus::StoppedTreePositions,
            _ => SearchStatus::None,
        }
    }

    /// 探索が終わった状態か
    #[inline]
    pub const fn is_finished(self) -> bool {
        !matches!(self, SearchStatus::Running | SearchStatus::Killing)
    }

    /// `continue_evaluate` で続きを探索できる状態か
    #[inline]
    pub const fn can_continue(self) -> bool {
        !matches!(self, SearchStatus::None | SearchStatus::Failed | SearchStatus::Running | SearchStatus::Killing)
    }
}

impl fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SearchStatus::None => "none",
            SearchStatus::Running => "running",
            SearchStatus::StoppedTime => "stopped_time",
            SearchStatus::StoppedPositions => "stopped_positions",
            SearchStatus::Solved => "solved",
            SearchStatus::Killing => "killing",
            SearchStatus::Killed => "killed",
            SearchStatus::Failed => "failed",
            SearchStatus::StoppedTreePositions => "stopped_tree_positions",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct AtomicStatus(AtomicU8);

impl Default for AtomicStatus {
    fn default() -> Self {
        Self::new(SearchStatus::None)
    }
}

impl AtomicStatus {
    pub const fn new(status: SearchStatus) -> Self {
        AtomicStatus(AtomicU8::new(status as u8))
    }

    #[inline]
    pub fn load(&self) -> SearchStatus {
        SearchStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn store(&self, status: SearchStatus) {
        self.0.store(status as u8, Ordering::Release);
    }

    /// `current` のときだけ `new` にする
    #[inline]
    pub fn transition(&self, current: SearchStatus, new: SearchStatus) -> bool {
        self.0
            .compare_exchange(current as u8, new as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// 走っている探索を止める。止めたら true
    pub fn request_stop(&self) -> bool {
        self.transition(SearchStatus::Running, SearchStatus::Killing)
    }

    /// 走っている間だけ `status` にする（最初に確定した終了状態が残る）
    #[inline]
    pub(crate) fn finish(&self, status: SearchStatus) -> bool {
        self.transition(SearchStatus::Running, status)
    }
}

/// 探索を止めるハンドル（複製してよい）
#[derive(Debug, Clone)]
pub struct StopHandle {
    status: Arc<AtomicStatus>,
}

impl StopHandle {
    pub(crate) fn new(status: Arc<AtomicStatus>) -> Self {
        Self { status }
    }

    pub fn stop(&self) {
        if self.status.request_stop() {
            log::debug!("stop requested");
        }
    }

    pub fn status(&self) -> SearchStatus {
        self.status.load()
    }
}
