//! 探索の司令塔（Coordinator）
//!
//! ノードのアリーナ・置換表・ワーカーを持ち、根の局面を目標の窓 [lower, upper] で評価する。
//!
//! - `evaluate`: 新しい根で探索を始める（アリーナを捨てる）
//! - `continue_evaluate`: 同じ木で探索を続ける
//! - `stop` / `StopHandle`: 別スレッドからの停止
//!
//! ワーカー 0 は呼び出し元のスレッドで、残りは `prob-search-{id}` という名前のスコープ付き
//! スレッドで動く。停止条件は各ワーカーが 1 周ごとに確認する。

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::config::SearchConfig;
use super::limits::SearchLimits;
use super::status::{AtomicStatus, SearchStatus, StopHandle};
use super::worker::Worker;
use crate::error::{ChildError, SearchError, SearchResult};
use crate::eval::EvaluatorFactory;
use crate::position::Board;
use crate::solver::SolverStats;
use crate::tree::{NodeArena, NodeId, NodeSnapshot, SearchCursor, TrackedWindow};
use crate::tt::TranspositionTable;
use crate::types::{Eval, LESS_THAN_MIN_EVAL, MAX_EVAL, MIN_EVAL};

// =============================================================================
// 定数
// =============================================================================

/// スレッド数の係数の初期値（× スレッド数の 2 乗、1000 倍スケール）
const THREAD_MULTIPLIER_INITIAL: u64 = 10_000;
/// 葉の確保に失敗したときに増やす量（× スレッド数）
const THREAD_MULTIPLIER_FAIL_STEP: u64 = 4_000;
/// 葉の確保に成功したときに減らす量（× スレッド数）
const THREAD_MULTIPLIER_SUCCESS_STEP: u64 = 2_000;
/// 減らすのはこれ（× スレッド数）を超えているときだけ
const THREAD_MULTIPLIER_MIN: u64 = 40_000;
const THREAD_MULTIPLIER_MAX: u64 = 40_000_000_000;

/// 進み具合がこれまでで最もよいときに、予算の 8 割で止めてよい
const SOFT_LIMIT_RATIO: f64 = 0.8;

// =============================================================================
// 探索ごとの状態
// =============================================================================

/// `evaluate` ごとの状態。`continue_evaluate` をまたいで残る
struct RunState {
    root: NodeId,
    lower: Eval,
    upper: Eval,
    approx: bool,
    window: TrackedWindow,
    thread_multiplier: AtomicU64,
    updating_window: AtomicBool,
    best_advancement: Mutex<f64>,
    elapsed: Duration,
}

/// 1 回の実行でワーカーが共有するもの
pub(crate) struct SearchContext<'a> {
    arena: &'a NodeArena,
    run: &'a RunState,
    status: &'a AtomicStatus,
    limits: SearchLimits,
    start: Instant,
    start_visited: u64,
    just_started: AtomicBool,
    n_threads: u64,
    tree_node_limit: usize,
    evaluator_index: u8,
    use_transpositions: bool,
    claim_retry_backoff: Duration,
    failure: Mutex<Option<ChildError>>,
}

impl<'a> SearchContext<'a> {
    fn new(
        arena: &'a NodeArena,
        run: &'a RunState,
        status: &'a AtomicStatus,
        config: &SearchConfig,
        evaluator_index: u8,
        limits: SearchLimits,
        n_threads: usize,
    ) -> Self {
        let margin = config.tree_node_margin(n_threads);
        SearchContext {
            arena,
            run,
            status,
            limits,
            start: Instant::now(),
            start_visited: arena.node(run.root).n_visited(),
            just_started: AtomicBool::new(true),
            n_threads: n_threads as u64,
            tree_node_limit: arena.capacity().saturating_sub(margin),
            evaluator_index,
            use_transpositions: config.use_transpositions,
            claim_retry_backoff: Duration::from_micros(config.claim_retry_backoff_us),
            failure: Mutex::new(None),
        }
    }

    #[inline]
    pub fn arena(&self) -> &'a NodeArena {
        self.arena
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.run.root
    }

    #[inline]
    pub fn window(&self) -> &'a TrackedWindow {
        &self.run.window
    }

    #[inline]
    pub fn claim_retry_backoff(&self) -> Duration {
        self.claim_retry_backoff
    }

    /// 子ノードを取得または作る。アリーナが一杯なら None
    pub fn add_node(&self, board: Board, depth: u32) -> Option<(NodeId, bool)> {
        if self.use_transpositions {
            self.arena.add(board, depth, self.evaluator_index)
        } else {
            self.arena.push(board, depth, self.evaluator_index).map(|id| (id, true))
        }
    }

    #[inline]
    pub fn thread_multiplier(&self) -> f64 {
        self.run.thread_multiplier.load(Ordering::Relaxed) as f64 / 1000.0
    }

    pub fn on_claim_failed(&self) {
        let n = self.n_threads;
        let _ = self.run.thread_multiplier.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |m| {
            (m < THREAD_MULTIPLIER_MAX - 2 * THREAD_MULTIPLIER_MIN * n).then_some(m + THREAD_MULTIPLIER_FAIL_STEP * n)
        });
    }

    pub fn on_claim_succeeded(&self) {
        let n = self.n_threads;
        let _ = self.run.thread_multiplier.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |m| {
            (m > THREAD_MULTIPLIER_MIN * n).then_some(m - THREAD_MULTIPLIER_SUCCESS_STEP * n)
        });
    }

    #[inline]
    pub fn mark_started(&self) {
        self.just_started.store(false, Ordering::Release);
    }

    /// 子の集合の構造エラー。探索全体を止める
    pub fn fail(&self, worker: usize, error: ChildError) {
        log::error!("worker {worker}: invalid children: {error}");
        self.status.store(SearchStatus::Failed);
        let mut failure = self.failure.lock();
        if failure.is_none() {
            *failure = Some(error);
        }
    }

    pub fn out_of_tree_nodes(&self) {
        if self.status.finish(SearchStatus::StoppedTreePositions) {
            log::warn!("tree node arena is full ({} nodes)", self.arena.len());
        }
    }

    fn finish(&self, status: SearchStatus) -> bool {
        if self.status.finish(status) {
            log::debug!("search status: {status}");
        }
        true
    }

    /// 停止条件を順に確認する。止めるなら状態を確定して true
    pub fn check_finished(&self) -> bool {
        match self.status.load() {
            SearchStatus::Running => {}
            SearchStatus::Killing => {
                if self.status.transition(SearchStatus::Killing, SearchStatus::Killed) {
                    log::debug!("search status: {}", SearchStatus::Killed);
                }
                return true;
            }
            _ => return true,
        }
        let root = self.arena.node(self.run.root);
        let (lower, upper) = (self.run.lower, self.run.upper);
        if root.with_stats(|stats| stats.is_solved(lower, upper, self.run.approx)) {
            return self.finish(SearchStatus::Solved);
        }
        if self.arena.len() > self.tree_node_limit {
            if self.status.finish(SearchStatus::StoppedTreePositions) {
                log::warn!(
                    "tree node arena nearly full ({} of {} nodes)",
                    self.arena.len(),
                    self.arena.capacity()
                );
            }
            return true;
        }
        let time = self.start.elapsed().as_secs_f64();
        let max_time = self.limits.max_time.as_secs_f64();
        let visited_goal = self.limits.max_visited as f64;
        let visited = root.n_visited().saturating_sub(self.start_visited) as f64;
        let mut good_stop = false;
        if time > self.limits.soft_time() || visited > self.limits.soft_visits() {
            let advancement = root.with_stats(|stats| stats.advancement());
            let mut best = self.run.best_advancement.lock();
            *best = best.min(advancement);
            good_stop = advancement <= *best;
        }
        if time > max_time || (time > SOFT_LIMIT_RATIO * max_time && good_stop) {
            return self.finish(SearchStatus::StoppedTime);
        }
        if !self.just_started.load(Ordering::Acquire)
            && (visited > visited_goal || (visited > SOFT_LIMIT_RATIO * visited_goal && good_stop))
        {
            return self.finish(SearchStatus::StoppedPositions);
        }
        false
    }

    /// 根の統計量から追跡する窓を更新し、広げた分を木に反映する
    ///
    /// 同時に 1 つのワーカーだけが行う。他のワーカーは待たずに戻る。
    pub fn update_weak_lower_upper(&self) {
        let run = self.run;
        if run.updating_window.swap(true, Ordering::AcqRel) {
            return;
        }
        let root = self.arena.node(run.root);
        loop {
            let (new_lower, new_upper) = root.with_stats(|stats| stats.expected_weak_lower_upper());
            // 根が窓の外で解けたときは lower - 1 や upper + 1 になる
            let new_lower = new_lower.clamp(run.lower, run.upper);
            let new_upper = new_upper.clamp(run.lower, run.upper);
            debug_assert!(new_lower <= new_upper);
            let (weak_lower, weak_upper) = run.window.get();
            if new_lower < weak_lower {
                run.window.set(new_lower, weak_upper);
            } else if new_upper > weak_upper {
                run.window.set(weak_lower, new_upper);
            } else {
                run.window.set(new_lower, new_upper);
                // 窓の狭い子から計算し直すと、根の窓が追跡中の窓より狭くなることがある
                if !root.with_stats(|stats| stats.weak_lower_upper_contains(new_lower, new_upper)) {
                    log::debug!("re-extend root window to [{new_lower}, {new_upper}]");
                    root.extend_eval(new_lower, new_upper, self.arena, &run.window);
                }
                break;
            }
            let (weak_lower, weak_upper) = run.window.get();
            log::debug!("extend window to [{weak_lower}, {weak_upper}]");
            root.extend_eval(weak_lower, weak_upper, self.arena, &run.window);
        }
        run.updating_window.store(false, Ordering::Release);
    }
}

// =============================================================================
// Coordinator
// =============================================================================

pub struct Coordinator {
    config: SearchConfig,
    arena: NodeArena,
    tt: Arc<TranspositionTable>,
    factory: EvaluatorFactory,
    status: Arc<AtomicStatus>,
    workers: Vec<Worker>,
    run: Option<RunState>,
    evaluator_index: u8,
}

impl Coordinator {
    pub fn new(config: SearchConfig, factory: EvaluatorFactory) -> SearchResult<Self> {
        config.validate()?;
        let tt = Arc::new(TranspositionTable::new(config.tt_bits));
        Ok(Self::with_transposition_table(config, factory, tt))
    }

    /// 置換表を他の探索と共有する
    pub fn with_transposition_table(
        config: SearchConfig,
        factory: EvaluatorFactory,
        tt: Arc<TranspositionTable>,
    ) -> Self {
        let arena = NodeArena::new(config.tree_node_capacity);
        Self {
            config,
            arena,
            tt,
            factory,
            status: Arc::new(AtomicStatus::default()),
            workers: Vec::new(),
            run: None,
            evaluator_index: 0,
        }
    }

    /// ノードのキーに含める評価器の番号
    pub fn set_evaluator_index(&mut self, index: u8) {
        self.evaluator_index = index;
    }

    #[inline]
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    #[inline]
    pub fn transposition_table(&self) -> Arc<TranspositionTable> {
        Arc::clone(&self.tt)
    }

    /// 探索を止めるハンドル（探索中に別スレッドから使う）
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle::new(Arc::clone(&self.status))
    }

    pub fn stop(&self) {
        self.stop_handle().stop();
    }

    #[inline]
    pub fn status(&self) -> SearchStatus {
        self.status.load()
    }

    /// 根 `board` を窓 [lower, upper]（奇数）で評価する
    ///
    /// `approx` なら、窓で解ける確率が 5% を切った時点で解けたとみなす。
    pub fn evaluate(
        &mut self,
        board: Board,
        lower: Eval,
        upper: Eval,
        limits: SearchLimits,
        n_threads: usize,
        approx: bool,
    ) -> SearchResult<SearchStatus> {
        if lower % 2 == 0 || upper % 2 == 0 || lower > upper || lower < MIN_EVAL || upper > MAX_EVAL {
            return Err(SearchError::InvalidWindow { lower, upper });
        }
        if n_threads == 0 {
            return Err(SearchError::NoThreads);
        }
        log::info!("evaluate [{lower}, {upper}] threads={n_threads} approx={approx}\n{board}");

        self.arena.reset();
        self.tt.new_search();
        self.run = None;
        self.status.store(SearchStatus::None);
        self.ensure_workers(n_threads);
        for worker in &mut self.workers {
            worker.reset();
        }

        let (root, _) = self
            .arena
            .add(board, 0, self.evaluator_index)
            .ok_or_else(|| SearchError::Config("tree_node_capacity is zero".to_string()))?;
        let node = self.arena.node(root);
        node.set_leaf_eval(0, 1);
        node.update_leaf_weak_lower_upper(lower, upper);
        let n = n_threads as u64;
        self.run = Some(RunState {
            root,
            lower,
            upper,
            approx,
            window: TrackedWindow::new(lower, upper),
            thread_multiplier: AtomicU64::new(THREAD_MULTIPLIER_INITIAL * n * n),
            updating_window: AtomicBool::new(false),
            best_advancement: Mutex::new(0.0),
            elapsed: Duration::ZERO,
        });

        // 根を先に 1 度展開する
        self.status.store(SearchStatus::Running);
        let failure = {
            let Self { arena, run, status, workers, config, evaluator_index, .. } = &mut *self;
            let run = run.as_ref().ok_or(SearchError::NotStarted)?;
            let ctx = SearchContext::new(
                arena,
                run,
                status,
                config,
                *evaluator_index,
                SearchLimits::infinite(),
                n_threads,
            );
            if let Some(cursor) = SearchCursor::best_descendant(arena, root, ctx.thread_multiplier(), LESS_THAN_MIN_EVAL)
            {
                let n_visited = match workers[0].add_children(&ctx, &cursor) {
                    Ok(n_visited) => n_visited,
                    Err(failure) => {
                        ctx.fail(0, failure.error);
                        failure.n_visited
                    }
                };
                cursor.finalize(arena, n_visited);
                workers[0].credit(n_visited);
            }
            ctx.failure.lock().take()
        };
        if let Some(error) = failure {
            return Err(error.into());
        }
        self.status.store(SearchStatus::None);
        self.continue_evaluate(limits, n_threads)
    }

    /// 同じ木で探索を続ける。訪問数と時間の予算はこの呼び出しの分
    pub fn continue_evaluate(&mut self, limits: SearchLimits, n_threads: usize) -> SearchResult<SearchStatus> {
        if n_threads == 0 {
            return Err(SearchError::NoThreads);
        }
        if self.run.is_none() {
            return Err(SearchError::NotStarted);
        }
        self.ensure_workers(n_threads);
        self.status.store(SearchStatus::Running);
        let start = Instant::now();
        let failure = {
            let Self { arena, run, status, workers, config, evaluator_index, .. } = &mut *self;
            let run = run.as_ref().ok_or(SearchError::NotStarted)?;
            let ctx = SearchContext::new(arena, run, status, config, *evaluator_index, limits, n_threads);
            let (first, rest) = workers[..n_threads].split_at_mut(1);
            std::thread::scope(|scope| {
                for worker in rest.iter_mut() {
                    let ctx = &ctx;
                    let spawned = std::thread::Builder::new()
                        .name(format!("prob-search-{}", worker.id()))
                        .spawn_scoped(scope, move || worker.run(ctx));
                    if let Err(e) = spawned {
                        log::warn!("failed to spawn search thread: {e}");
                    }
                }
                first[0].run(&ctx);
            });
            ctx.update_weak_lower_upper();
            ctx.failure.lock().take()
        };
        let elapsed = start.elapsed();
        if let Some(run) = self.run.as_mut() {
            run.elapsed += elapsed;
        }
        let status = self.status();
        log::info!(
            "search finished: status={status} visited={} nodes={} eval={:.2} time={:.3}s",
            self.visited(),
            self.arena.len(),
            self.best_score().unwrap_or(0.0),
            elapsed.as_secs_f64()
        );
        match failure {
            Some(error) => Err(error.into()),
            None => Ok(status),
        }
    }

    fn ensure_workers(&mut self, n_threads: usize) {
        while self.workers.len() < n_threads {
            let id = self.workers.len();
            self.workers.push(Worker::new(id, Some(Arc::clone(&self.tt)), &self.factory));
        }
    }

    /// 根のスナップショット
    pub fn root(&self) -> Option<NodeSnapshot> {
        self.run.as_ref().map(|run| self.arena.node(run.root).snapshot())
    }

    /// 根の子のスナップショット（子の手番の視点）
    pub fn root_children(&self) -> Vec<NodeSnapshot> {
        let Some(run) = self.run.as_ref() else {
            return Vec::new();
        };
        self.arena
            .node(run.root)
            .children()
            .iter()
            .map(|&child| self.arena.node(child).snapshot())
            .collect()
    }

    /// 根の訪問数
    pub fn visited(&self) -> u64 {
        self.run.as_ref().map_or(0, |run| self.arena.node(run.root).n_visited())
    }

    /// 根の期待値（石数差）
    pub fn best_score(&self) -> Option<f64> {
        self.run.as_ref().map(|run| self.arena.node(run.root).with_stats(|stats| stats.get_eval()))
    }

    /// 全ワーカーの統計を合わせたもの
    pub fn stats(&self) -> SolverStats {
        let mut stats = SolverStats::new();
        for worker in &self.workers {
            stats.merge(worker.stats());
        }
        stats
    }

    /// ワーカーごとの、根に加えた訪問数
    pub fn worker_visits(&self) -> Vec<u64> {
        self.workers.iter().map(|worker| worker.n_visited()).collect()
    }

    /// `evaluate` 以降の探索時間の合計
    pub fn elapsed(&self) -> Duration {
        self.run.as_ref().map_or(Duration::ZERO, |run| run.elapsed)
    }

    /// 探索木のノード数
    #[inline]
    pub fn tree_nodes(&self) -> usize {
        self.arena.len()
    }

    #[inline]
    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    /// 複数の探索を比べるための指標（大きいほど先に進めるべき）
    ///
    /// 解けていれば `-f64::MAX`。`gap` は評価値の差の目安。
    pub fn progress(&self, gap: f32) -> f64 {
        if self.status() == SearchStatus::Solved {
            return -f64::MAX;
        }
        let Some(run) = self.run.as_ref() else {
            return -f64::MAX;
        };
        let root = self.arena.node(run.root);
        let eval_effect = -root.with_stats(|stats| stats.get_eval()) / f64::from(gap.max(1.0));
        eval_effect - (root.n_visited().max(1) as f64).log2()
    }
}
