//! Driver for external UCI engines.
//!
//! Spawns an engine subprocess, performs the `uci`/`uciok` handshake,
//! tracks the declared options, and manages the lifecycle of a single
//! in-flight search, including pondering. The driver is concurrent: user
//! calls are safe from any thread and every blocking call takes a
//! timeout.
//!
//! ```no_run
//! use std::time::Duration;
//! use castellan::game::Game;
//! use castellan::uci::{EngineBuilder, GoOptions};
//!
//! let timeout = Duration::from_secs(5);
//! let engine = EngineBuilder::new("stockfish").spawn().unwrap();
//! engine.wait_initialized(timeout).unwrap();
//!
//! let mut game = Game::new();
//! game.push_uci_list("e2e4 e7e5").unwrap();
//! engine.set_position(&game, timeout).unwrap();
//!
//! let opts = GoOptions { depth: Some(12), ..GoOptions::default() };
//! let search = engine.go(opts, None, timeout).unwrap();
//! search.wait(Duration::from_secs(60)).unwrap();
//! println!("best: {}", search.best_move().unwrap());
//! engine.quit(timeout).unwrap();
//! ```

mod command;
mod engine;
mod options;
mod parse;
mod process;
mod score;
mod search;
mod state;

use std::fmt;

pub use engine::{Engine, EngineBuilder, EngineOptions, Search};
pub use options::{EngineOption, OptValue, OptionError};
pub use process::{CmdProcess, Process, ProcessConfig, TracingProcess};
pub use score::{BoundedScore, Score, ScoreBound};
pub use search::{GoOptions, Info, InfoConsumer, SearchStatus};
pub use state::EngineInfo;

/// Error type for engine driver operations.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The engine has not completed the `uciok` handshake yet.
    NotInitialized,
    /// A `quit` is in flight; no further commands are accepted.
    Terminating,
    /// The engine process is gone; the command cannot be served.
    Terminated,
    /// The call's timeout elapsed before the engine answered.
    Timeout,
    /// `setoption` for an option the engine never declared.
    UnknownOption { name: String },
    /// `setoption` with a value rejected by the option's schema.
    SetOption { name: String, error: OptionError },
    /// The engine must not be searching for this command.
    SearchInProgress,
    /// `go` before any `position`.
    NoPosition,
    /// `go ponder` while the Ponder option is off.
    PonderNotAllowed,
    /// Invalid `go` option combination.
    BadGoOptions { message: String },
    /// The targeted search has already been replaced or finished.
    SearchStopped,
    /// `ponderhit` after `stop`.
    PonderHitAfterStop,
    /// `ponderhit` while the search is not pondering.
    NotPondering,
    /// The search has not finished yet.
    SearchRunning,
    /// The search finished without any best move.
    NoBestMove,
    /// The engine reported a best move that is not legal on the search's
    /// position.
    BadBestMove { message: String },
    /// A malformed message from the engine (normally only logged).
    BadMessage { message: String },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NotInitialized => write!(f, "engine not initialized"),
            EngineError::Terminating => write!(f, "engine terminating"),
            EngineError::Terminated => write!(f, "process terminated"),
            EngineError::Timeout => write!(f, "timed out"),
            EngineError::UnknownOption { name } => write!(f, "unknown option {name:?}"),
            EngineError::SetOption { name, error } => {
                write!(f, "set option {name:?}: {error}")
            }
            EngineError::SearchInProgress => write!(f, "engine must not be searching"),
            EngineError::NoPosition => write!(f, "no position specified"),
            EngineError::PonderNotAllowed => write!(f, "pondering is not allowed"),
            EngineError::BadGoOptions { message } => write!(f, "invalid options: {message}"),
            EngineError::SearchStopped => write!(f, "search stopped"),
            EngineError::PonderHitAfterStop => {
                write!(f, "cannot do \"ponderhit\" after \"stop\"")
            }
            EngineError::NotPondering => write!(f, "not pondering at the moment"),
            EngineError::SearchRunning => write!(f, "search still running"),
            EngineError::NoBestMove => write!(f, "no best move"),
            EngineError::BadBestMove { message } | EngineError::BadMessage { message } => {
                write!(f, "{message}")
            }
        }
    }
}

impl std::error::Error for EngineError {}
