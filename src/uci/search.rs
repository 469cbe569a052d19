//! Search lifecycle: go options, info records and the shared state behind
//! a running search.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};

use crate::board::{Board, Move, UciMove};
use crate::clock::UciTimeSpec;

use super::score::{BoundedScore, Score, ScoreBound};
use super::EngineError;

/// Callback receiving every parsed `info` message of a search.
pub type InfoConsumer = Arc<dyn Fn(&Info) + Send + Sync>;

/// Options for the `go` command.
#[derive(Clone, Default)]
pub struct GoOptions {
    /// Restrict the search to these moves; must be distinct and legal.
    pub search_moves: Vec<Move>,
    /// Start in ponder mode.
    pub ponder: bool,
    /// Search until `stop`.
    pub infinite: bool,
    /// Clock state (`wtime`/`btime`/`winc`/`binc`/`movestogo`).
    pub time_spec: Option<UciTimeSpec>,
    pub depth: Option<i64>,
    pub nodes: Option<i64>,
    pub mate: Option<i64>,
    pub movetime: Option<Duration>,
}

impl GoOptions {
    /// Validate against the position the search will run on.
    pub(crate) fn validate(&self, board: &Board) -> Result<(), String> {
        let mut used = HashSet::new();
        for mv in &self.search_moves {
            if !used.insert(*mv) {
                return Err(format!("move {mv} is in searchmoves twice"));
            }
            if mv.validate(board).is_err() {
                return Err(format!("bad move {mv}"));
            }
        }

        let limited = self.depth.is_some()
            || self.nodes.is_some()
            || self.mate.is_some()
            || self.movetime.is_some();
        if self.ponder && (self.infinite || limited) {
            return Err("conflicting options with ponder".to_string());
        }
        if self.infinite && (self.time_spec.is_some() || limited) {
            return Err("conflicting options with infinite".to_string());
        }

        if let Some(spec) = &self.time_spec {
            if !spec.is_valid() {
                return Err("invalid time spec".to_string());
            }
        }
        if matches!(self.depth, Some(d) if d <= 0) {
            return Err("non-positive depth".to_string());
        }
        if matches!(self.nodes, Some(n) if n <= 0) {
            return Err("non-positive nodes".to_string());
        }
        if matches!(self.mate, Some(m) if m <= 0) {
            return Err("non-positive mate".to_string());
        }
        if matches!(self.movetime, Some(t) if t.is_zero()) {
            return Err("non-positive movetime".to_string());
        }
        Ok(())
    }
}

/// A parsed `info` message; every field the protocol defines, each
/// optional.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Info {
    pub depth: Option<i64>,
    pub seldepth: Option<i64>,
    pub time: Option<Duration>,
    pub nodes: Option<i64>,
    pub pv: Option<Vec<UciMove>>,
    pub multipv: Option<i64>,
    pub score: Option<BoundedScore>,
    pub cur_move: Option<UciMove>,
    pub cur_move_number: Option<i64>,
    /// Hash table saturation in `[0, 1]`.
    pub hash_full: Option<f64>,
    pub nps: Option<i64>,
    pub tb_hits: Option<i64>,
    pub sb_hits: Option<i64>,
    /// CPU load in `[0, 1]`.
    pub cpu_load: Option<f64>,
    pub string: Option<String>,
    pub refutation: Option<Vec<UciMove>>,
    pub cur_line: Option<Vec<UciMove>>,
    pub cur_line_cpu: Option<i64>,
}

impl Info {
    /// Whether the record carries only a `string` payload.
    pub(crate) fn is_string_only(&self) -> bool {
        *self
            == Info {
                string: self.string.clone(),
                ..Info::default()
            }
    }
}

/// A snapshot of a search's aggregated progress.
#[derive(Clone, Debug, Default)]
pub struct SearchStatus {
    pub depth: i64,
    pub time: Duration,
    pub nodes: i64,
    /// The latest principal variation (main line only).
    pub pv: Vec<UciMove>,
    /// The latest exact score.
    pub score: Option<Score>,
    pub hash_full: Option<f64>,
    /// Nodes per second, derived from `nodes` and elapsed time.
    pub nps: i64,
}

/// Completion signal shared between the state machine and user handles.
pub(crate) struct DoneSignal {
    flag: Mutex<bool>,
    cond: Condvar,
}

impl DoneSignal {
    pub(crate) fn new() -> DoneSignal {
        DoneSignal {
            flag: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    pub(crate) fn set(&self) {
        let mut flag = self.flag.lock();
        *flag = true;
        self.cond.notify_all();
    }

    pub(crate) fn is_set(&self) -> bool {
        *self.flag.lock()
    }

    /// Wait until set or until the timeout elapses; returns whether the
    /// signal is set.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut flag = self.flag.lock();
        if *flag {
            return true;
        }
        let deadline = Instant::now() + timeout;
        while !*flag {
            if self.cond.wait_until(&mut flag, deadline).timed_out() {
                return *flag;
            }
        }
        true
    }
}

struct SearchInner {
    status: SearchStatus,
    ponder: bool,
    stopping: bool,
    stopped: bool,
    err: Option<EngineError>,
    /// Best move, then the ponder move if reported.
    best: Vec<Move>,
    board: Board,
}

/// The state of one search, co-owned by the engine state machine (until
/// `bestmove`) and any user [`Search`](super::Search) handles.
pub(crate) struct SearchState {
    consumer: Option<InfoConsumer>,
    start: Instant,
    inner: RwLock<SearchInner>,
    done: DoneSignal,
}

impl SearchState {
    pub(crate) fn new(
        consumer: Option<InfoConsumer>,
        board: &Board,
        ponder: bool,
    ) -> Arc<SearchState> {
        Arc::new(SearchState {
            consumer,
            start: Instant::now(),
            inner: RwLock::new(SearchInner {
                status: SearchStatus::default(),
                ponder,
                stopping: false,
                stopped: false,
                err: None,
                best: Vec::new(),
                board: board.clone(),
            }),
            done: DoneSignal::new(),
        })
    }

    /// Fold an `info` message into the aggregated status and forward it to
    /// the consumer.
    pub(crate) fn on_info(&self, info: &Info) {
        if !info.is_string_only() {
            let mut inner = self.inner.write();
            debug_assert!(!inner.stopped);
            inner.status.time = self.start.elapsed();
            if let Some(depth) = info.depth {
                inner.status.depth = depth;
            }
            if let Some(nodes) = info.nodes {
                inner.status.nodes = nodes;
                let elapsed_ns = inner.status.time.as_nanos() as i64;
                inner.status.nps = if elapsed_ns <= 0 {
                    0
                } else {
                    let nps = nodes as f64 / elapsed_ns as f64 * 1e9;
                    if nps >= i64::MAX as f64 {
                        i64::MAX
                    } else {
                        nps as i64
                    }
                };
            }
            // Only the main line is recorded; MultiPV siblings go to the
            // consumer unchanged.
            if let Some(pv) = &info.pv {
                if info.multipv.unwrap_or(1) == 1 {
                    inner.status.pv.clone_from(pv);
                }
            }
            if let Some(score) = info.score {
                if score.bound == ScoreBound::Exact {
                    inner.status.score = Some(score.score);
                }
            }
            if let Some(hash_full) = info.hash_full {
                inner.status.hash_full = Some(hash_full);
            }
        }

        if let Some(consumer) = &self.consumer {
            consumer(info);
        }
    }

    pub(crate) fn on_ponder_hit(&self) -> Result<(), EngineError> {
        let mut inner = self.inner.write();
        debug_assert!(!inner.stopped);
        if inner.stopping {
            return Err(EngineError::PonderHitAfterStop);
        }
        if !inner.ponder {
            return Err(EngineError::NotPondering);
        }
        inner.ponder = false;
        Ok(())
    }

    /// Idempotent; marks the search as stopping.
    pub(crate) fn on_stop(&self) {
        let mut inner = self.inner.write();
        debug_assert!(!inner.stopped);
        inner.stopping = true;
    }

    fn do_stop(&self, inner: &mut SearchInner, err: Option<EngineError>) {
        debug_assert!(!inner.stopped);
        inner.stopping = false;
        inner.stopped = true;
        inner.err = err;
        self.done.set();
    }

    /// Complete the search on `bestmove`, converting the moves against the
    /// recorded board. The ponder move is legal on the position after the
    /// best move.
    pub(crate) fn on_best_move(&self, best: UciMove, ponder: Option<UciMove>) {
        let mut inner = self.inner.write();

        let convert = |board: &Board, uci: UciMove| -> Result<Move, String> {
            let mv = uci.to_move(board).map_err(|e| e.to_string())?;
            mv.validate(board).map_err(|e| e.to_string())?;
            Ok(mv)
        };

        let mut err = None;
        match convert(&inner.board, best) {
            Ok(mv) => {
                inner.best.push(mv);
                if let Some(ponder) = ponder {
                    if ponder != UciMove::Null {
                        let undo = inner.board.make_legal_move(mv);
                        match convert(&inner.board, ponder) {
                            Ok(pmv) => inner.best.push(pmv),
                            Err(e) => {
                                err = Some(EngineError::BadBestMove {
                                    message: format!("convert ponder move: {e}"),
                                });
                            }
                        }
                        inner.board.unmake_move(&undo);
                    }
                }
            }
            Err(e) => {
                err = Some(EngineError::BadBestMove {
                    message: format!("convert best move: {e}"),
                });
            }
        }

        if err.is_none() && inner.ponder {
            // The engine must not end a pondered search without a
            // ponderhit or stop.
            err = Some(EngineError::BadBestMove {
                message: "search stopped by engine during ponder".to_string(),
            });
        }
        if let Some(e) = &err {
            log::warn!("process \"bestmove\": {e}");
        }
        self.do_stop(&mut inner, err);
    }

    /// Terminate the search abnormally.
    pub(crate) fn cancel(&self, err: EngineError) {
        let mut inner = self.inner.write();
        self.do_stop(&mut inner, Some(err));
    }

    pub(crate) fn done(&self) -> &DoneSignal {
        &self.done
    }

    pub(crate) fn err(&self) -> Option<EngineError> {
        if !self.done.is_set() {
            return None;
        }
        self.inner.read().err.clone()
    }

    pub(crate) fn status(&self) -> SearchStatus {
        let elapsed = self.start.elapsed();
        let mut status = self.inner.read().status.clone();
        status.time = elapsed;
        status
    }

    pub(crate) fn ponder(&self) -> bool {
        self.inner.read().ponder
    }

    pub(crate) fn stopping(&self) -> bool {
        self.inner.read().stopping
    }

    pub(crate) fn stopped(&self) -> bool {
        self.inner.read().stopped
    }

    pub(crate) fn best_move(&self) -> Result<Move, EngineError> {
        let inner = self.inner.read();
        if !inner.stopped {
            return Err(EngineError::SearchRunning);
        }
        if let Some(err) = &inner.err {
            return Err(err.clone());
        }
        inner.best.first().copied().ok_or(EngineError::NoBestMove)
    }

    /// The reported ponder move, if any.
    pub(crate) fn ponder_move(&self) -> Result<Option<Move>, EngineError> {
        let inner = self.inner.read();
        if !inner.stopped {
            return Err(EngineError::SearchRunning);
        }
        if let Some(err) = &inner.err {
            return Err(err.clone());
        }
        if inner.best.is_empty() {
            return Err(EngineError::NoBestMove);
        }
        Ok(inner.best.get(1).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_go_options_validate() {
        let board = Board::initial();
        assert!(GoOptions::default().validate(&board).is_ok());

        let e4 = Move::from_uci("e2e4", &board).unwrap();
        let opts = GoOptions {
            search_moves: vec![e4, e4],
            ..GoOptions::default()
        };
        assert!(opts.validate(&board).unwrap_err().contains("twice"));

        let opts = GoOptions {
            ponder: true,
            infinite: true,
            ..GoOptions::default()
        };
        assert!(opts.validate(&board).unwrap_err().contains("ponder"));

        let opts = GoOptions {
            infinite: true,
            depth: Some(5),
            ..GoOptions::default()
        };
        assert!(opts.validate(&board).unwrap_err().contains("infinite"));

        let opts = GoOptions {
            depth: Some(0),
            ..GoOptions::default()
        };
        assert!(opts.validate(&board).unwrap_err().contains("depth"));
    }

    #[test]
    fn test_search_moves_must_be_legal() {
        let board = Board::initial();
        let illegal = Move::new(
            crate::board::MoveKind::Simple,
            crate::board::Cell::from_parts(crate::board::Color::White, crate::board::Piece::Rook),
            "a1".parse().unwrap(),
            "a4".parse().unwrap(),
        )
        .unwrap();
        let opts = GoOptions {
            search_moves: vec![illegal],
            ..GoOptions::default()
        };
        assert!(opts.validate(&board).is_err());
    }

    #[test]
    fn test_on_info_aggregation() {
        let state = SearchState::new(None, &Board::initial(), false);
        state.on_info(&Info {
            depth: Some(10),
            nodes: Some(5000),
            pv: Some(vec!["e2e4".parse().unwrap()]),
            score: Some(BoundedScore {
                score: Score::centipawns(25),
                bound: ScoreBound::Exact,
            }),
            ..Info::default()
        });
        let status = state.status();
        assert_eq!(status.depth, 10);
        assert_eq!(status.nodes, 5000);
        assert_eq!(status.pv.len(), 1);
        assert_eq!(status.score, Some(Score::centipawns(25)));
    }

    #[test]
    fn test_on_info_skips_bounds_and_multipv() {
        let state = SearchState::new(None, &Board::initial(), false);
        state.on_info(&Info {
            pv: Some(vec!["e2e4".parse().unwrap()]),
            multipv: Some(2),
            score: Some(BoundedScore {
                score: Score::centipawns(100),
                bound: ScoreBound::Lower,
            }),
            ..Info::default()
        });
        let status = state.status();
        assert!(status.pv.is_empty());
        assert_eq!(status.score, None);
    }

    #[test]
    fn test_consumer_receives_all_infos() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);
        let state = SearchState::new(
            Some(Arc::new(move |_| {
                count2.fetch_add(1, Ordering::Relaxed);
            })),
            &Board::initial(),
            false,
        );
        state.on_info(&Info::default());
        state.on_info(&Info {
            string: Some("hello".to_string()),
            ..Info::default()
        });
        assert_eq!(count.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_best_move_flow() {
        let state = SearchState::new(None, &Board::initial(), false);
        assert!(matches!(
            state.best_move(),
            Err(EngineError::SearchRunning)
        ));
        state.on_best_move("e2e4".parse().unwrap(), Some("e7e5".parse().unwrap()));
        assert!(state.stopped());
        assert!(state.done().is_set());
        assert_eq!(state.best_move().unwrap().to_string(), "e2e4");
        assert_eq!(
            state.ponder_move().unwrap().unwrap().to_string(),
            "e7e5"
        );
    }

    #[test]
    fn test_best_move_must_be_legal() {
        let state = SearchState::new(None, &Board::initial(), false);
        state.on_best_move("e2e5".parse().unwrap(), None);
        assert!(matches!(
            state.best_move(),
            Err(EngineError::BadBestMove { .. })
        ));
    }

    #[test]
    fn test_ponder_lifecycle() {
        let state = SearchState::new(None, &Board::initial(), true);
        assert!(state.ponder());
        state.on_ponder_hit().unwrap();
        assert!(!state.ponder());
        assert!(matches!(
            state.on_ponder_hit(),
            Err(EngineError::NotPondering)
        ));
    }

    #[test]
    fn test_ponder_hit_after_stop_fails() {
        let state = SearchState::new(None, &Board::initial(), true);
        state.on_stop();
        assert!(state.stopping());
        assert!(matches!(
            state.on_ponder_hit(),
            Err(EngineError::PonderHitAfterStop)
        ));
    }

    #[test]
    fn test_engine_must_not_finish_pondering_search() {
        let state = SearchState::new(None, &Board::initial(), true);
        state.on_best_move("e2e4".parse().unwrap(), None);
        assert!(matches!(
            state.best_move(),
            Err(EngineError::BadBestMove { .. })
        ));
    }

    #[test]
    fn test_cancel() {
        let state = SearchState::new(None, &Board::initial(), false);
        state.cancel(EngineError::Terminated);
        assert!(state.done().is_set());
        assert!(matches!(state.err(), Some(EngineError::Terminated)));
        assert!(matches!(state.best_move(), Err(EngineError::Terminated)));
    }

    #[test]
    fn test_done_signal_wait() {
        let signal = Arc::new(DoneSignal::new());
        assert!(!signal.wait_timeout(Duration::from_millis(10)));
        let signal2 = Arc::clone(&signal);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            signal2.set();
        });
        assert!(signal.wait_timeout(Duration::from_secs(5)));
        assert!(signal.is_set());
    }
}
