//! Driver-to-engine commands and their wire forms.

use std::fmt::Write as _;
use std::sync::Arc;

use crate::board::{Board, Move, RawBoard};

use super::options::OptValue;
use super::search::{GoOptions, InfoConsumer, SearchState};

/// A user command heading for the engine, as accepted by the coordinator.
pub(crate) enum Command {
    Debug(bool),
    IsReady,
    SetOption {
        name: String,
        value: OptValue,
    },
    UciNewGame,
    Position {
        start: RawBoard,
        moves: Vec<Move>,
        board: Board,
    },
    Go {
        opts: GoOptions,
        consumer: Option<InfoConsumer>,
    },
    /// Stop the given search; silently dropped when it is stale.
    Stop(Arc<SearchState>),
    PonderHit(Arc<SearchState>),
    Quit,
}

/// The wire form of an accepted command, or `None` for accepted commands
/// with no wire effect (a stop aimed at a stale search).
pub(crate) fn serialize(cmd: &Command) -> Option<String> {
    match cmd {
        Command::Debug(true) => Some("debug on".to_string()),
        Command::Debug(false) => Some("debug off".to_string()),
        Command::IsReady => Some("isready".to_string()),
        Command::SetOption { name, value } => match value {
            OptValue::Button => Some(format!("setoption name {name}")),
            _ => Some(format!("setoption name {name} value {}", value.serialize())),
        },
        Command::UciNewGame => Some("ucinewgame".to_string()),
        Command::Position { start, moves, .. } => {
            let mut out = String::from("position");
            if *start == RawBoard::initial() {
                out.push_str(" startpos");
            } else {
                let _ = write!(out, " fen {}", start.fen());
            }
            out.push_str(" moves");
            for mv in moves {
                let _ = write!(out, " {mv}");
            }
            Some(out)
        }
        Command::Go { opts, .. } => {
            let mut out = String::from("go");
            if !opts.search_moves.is_empty() {
                out.push_str(" searchmoves");
                for mv in &opts.search_moves {
                    let _ = write!(out, " {mv}");
                }
            }
            if opts.ponder {
                out.push_str(" ponder");
            }
            if let Some(spec) = &opts.time_spec {
                let _ = write!(out, " wtime {}", spec.wtime.as_millis());
                let _ = write!(out, " btime {}", spec.btime.as_millis());
                if !spec.winc.is_zero() {
                    let _ = write!(out, " winc {}", spec.winc.as_millis());
                }
                if !spec.binc.is_zero() {
                    let _ = write!(out, " binc {}", spec.binc.as_millis());
                }
                if spec.moves_to_go != 0 {
                    let _ = write!(out, " movestogo {}", spec.moves_to_go);
                }
            }
            if let Some(depth) = opts.depth {
                let _ = write!(out, " depth {depth}");
            }
            if let Some(nodes) = opts.nodes {
                let _ = write!(out, " nodes {nodes}");
            }
            if let Some(mate) = opts.mate {
                let _ = write!(out, " mate {mate}");
            }
            if let Some(movetime) = opts.movetime {
                let _ = write!(out, " movetime {}", movetime.as_millis());
            }
            if opts.infinite {
                out.push_str(" infinite");
            }
            Some(out)
        }
        Command::Stop(_) => Some("stop".to_string()),
        Command::PonderHit(_) => Some("ponderhit".to_string()),
        Command::Quit => Some("quit".to_string()),
    }
}
