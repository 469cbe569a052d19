//! The protocol state machine behind the engine driver.

use std::collections::{HashMap, VecDeque};
use std::sync::mpsc::SyncSender;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::board::{Board, UciMove};

use super::command::Command;
use super::options::{case_fold, CoderOptions, EngineOption, OptPair, OptValue, PONDER_OPT_NAME};
use super::parse::{parse_bestmove, parse_info, parse_option, Tokenizer};
use super::search::{DoneSignal, Info, SearchState};
use super::EngineError;

/// Engine identity, gathered from the `id` lines of the handshake.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineInfo {
    pub name: String,
    pub author: String,
}

/// What a successfully accepted command hands back to the caller.
pub(crate) enum CommandReply {
    None,
    /// The `readyok` waiter for an `isready`.
    Pong(std::sync::mpsc::Receiver<Result<(), EngineError>>),
    /// The created search for a `go`.
    Search(Arc<SearchState>),
}

struct StateInner {
    inited: bool,
    exiting: bool,
    exited: bool,
    search: Option<Arc<SearchState>>,
    pongs: VecDeque<SyncSender<Result<(), EngineError>>>,
    board: Option<Board>,
    info: EngineInfo,
    debug: bool,
    opts: HashMap<String, OptPair>,
}

/// Shared engine protocol state: initialization, the option catalog,
/// outstanding pongs, the current position and the in-flight search.
pub(crate) struct EngineState {
    coder: CoderOptions,
    log_engine_string: bool,
    init_done: DoneSignal,
    inner: RwLock<StateInner>,
}

impl EngineState {
    pub(crate) fn new(coder: CoderOptions, log_engine_string: bool) -> EngineState {
        EngineState {
            coder,
            log_engine_string,
            init_done: DoneSignal::new(),
            inner: RwLock::new(StateInner {
                inited: false,
                exiting: false,
                exited: false,
                search: None,
                pongs: VecDeque::new(),
                board: None,
                info: EngineInfo::default(),
                debug: false,
                opts: HashMap::new(),
            }),
        }
    }

    /// Accept a user command, transforming it as needed (option values are
    /// normalized, stale stops become no-ops). Returns the possibly
    /// transformed command to serialize plus the reply for the caller.
    pub(crate) fn process_command(
        &self,
        cmd: Command,
    ) -> Result<(Option<Command>, CommandReply), EngineError> {
        let mut inner = self.inner.write();
        debug_assert!(inner.inited && !inner.exited);

        if inner.exiting {
            // A duplicate quit is accepted silently; anything else is
            // refused.
            if matches!(cmd, Command::Quit) {
                return Ok((None, CommandReply::None));
            }
            return Err(EngineError::Terminating);
        }

        match cmd {
            Command::Debug(val) => {
                inner.debug = val;
                Ok((Some(Command::Debug(val)), CommandReply::None))
            }
            Command::IsReady => {
                let (tx, rx) = std::sync::mpsc::sync_channel(1);
                inner.pongs.push_back(tx);
                Ok((Some(Command::IsReady), CommandReply::Pong(rx)))
            }
            Command::SetOption { name, value } => {
                let folded = case_fold(&name);
                let Some(pair) = inner.opts.get_mut(&folded) else {
                    return Err(EngineError::UnknownOption { name });
                };
                pair.option
                    .set_value(&value, self.coder)
                    .map_err(|error| EngineError::SetOption {
                        name: name.clone(),
                        error,
                    })?;
                // Re-serialize with the engine's canonical name casing and
                // the normalized value.
                let cmd = Command::SetOption {
                    name: pair.name.clone(),
                    value: pair.option.value(),
                };
                Ok((Some(cmd), CommandReply::None))
            }
            Command::UciNewGame => {
                if inner.search.is_some() {
                    return Err(EngineError::SearchInProgress);
                }
                inner.board = None;
                Ok((Some(Command::UciNewGame), CommandReply::None))
            }
            Command::Position { start, moves, board } => {
                if inner.search.is_some() {
                    return Err(EngineError::SearchInProgress);
                }
                inner.board = Some(board.clone());
                Ok((
                    Some(Command::Position { start, moves, board }),
                    CommandReply::None,
                ))
            }
            Command::Go { opts, consumer } => {
                if inner.search.is_some() {
                    return Err(EngineError::SearchInProgress);
                }
                let Some(board) = &inner.board else {
                    return Err(EngineError::NoPosition);
                };
                if opts.ponder && !Self::ponder_enabled(&inner) {
                    return Err(EngineError::PonderNotAllowed);
                }
                opts.validate(board)
                    .map_err(|message| EngineError::BadGoOptions { message })?;
                let search = SearchState::new(consumer, board, opts.ponder);
                inner.search = Some(Arc::clone(&search));
                Ok((
                    Some(Command::Go {
                        opts,
                        consumer: None,
                    }),
                    CommandReply::Search(search),
                ))
            }
            Command::Stop(search) => {
                let Some(cur) = &inner.search else {
                    return Ok((None, CommandReply::None));
                };
                if !Arc::ptr_eq(cur, &search) {
                    // Stop aimed at a finished search: accepted, dropped.
                    return Ok((None, CommandReply::None));
                }
                search.on_stop();
                Ok((Some(Command::Stop(search)), CommandReply::None))
            }
            Command::PonderHit(search) => {
                let Some(cur) = &inner.search else {
                    return Err(EngineError::SearchStopped);
                };
                if !Arc::ptr_eq(cur, &search) {
                    return Err(EngineError::SearchStopped);
                }
                search.on_ponder_hit()?;
                Ok((Some(Command::PonderHit(search)), CommandReply::None))
            }
            Command::Quit => {
                inner.exiting = true;
                Ok((Some(Command::Quit), CommandReply::None))
            }
        }
    }

    /// Dispatch one line from the engine. Unknown leading tokens are
    /// skipped until a recognized keyword appears.
    pub(crate) fn process_message(&self, msg: &str) -> Result<(), EngineError> {
        let Some(mut tok) = Tokenizer::new(msg, self.coder) else {
            return Err(EngineError::BadMessage {
                message: format!("tokenize {msg:?}"),
            });
        };

        loop {
            let Some(name) = tok.next() else {
                return Ok(());
            };
            return match name {
                "id" => {
                    let Some(sub) = tok.next() else {
                        return Err(EngineError::BadMessage {
                            message: "parse \"id\": incomplete message".to_string(),
                        });
                    };
                    match sub {
                        "name" => self.on_id_name(tok.next_until_end()),
                        "author" => self.on_id_author(tok.next_until_end()),
                        _ => Err(EngineError::BadMessage {
                            message: format!("parse \"id\": bad submessage {sub:?}"),
                        }),
                    }
                }
                "uciok" => {
                    if tok.more() {
                        log::warn!("parse \"uciok\": extra data");
                    }
                    self.on_uci_ok()
                }
                "readyok" => {
                    if tok.more() {
                        log::warn!("parse \"readyok\": extra data");
                    }
                    self.on_ready_ok()
                }
                "bestmove" => match parse_bestmove(&mut tok) {
                    Ok((best, ponder)) => self.on_best_move(best, ponder),
                    Err(err) => {
                        log::warn!("parse \"bestmove\": {err}");
                        self.on_search_cancel(EngineError::BadMessage {
                            message: format!("parse: {err}"),
                        })
                    }
                },
                "info" => {
                    let info = parse_info(&mut tok);
                    self.on_info(&info)
                }
                "option" => match parse_option(&mut tok) {
                    Ok(pair) => self.on_option(pair),
                    Err(err) => Err(EngineError::BadMessage {
                        message: format!("parse \"option\": {err}"),
                    }),
                },
                "copyprotection" | "registration" => Err(EngineError::BadMessage {
                    message: format!("{name:?} not implemented"),
                }),
                _ => continue,
            };
        }
    }

    /// Tear down on termination: cancel the search, error all pending
    /// pongs, drop the catalog state that is no longer meaningful.
    pub(crate) fn finish(&self) {
        let mut inner = self.inner.write();
        if let Some(search) = inner.search.take() {
            search.cancel(EngineError::Terminated);
        }
        inner.exited = true;
        inner.exiting = false;
        while let Some(pong) = inner.pongs.pop_front() {
            let _ = pong.send(Err(EngineError::Terminated));
        }
        inner.board = None;
    }

    fn on_id_name(&self, val: &str) -> Result<(), EngineError> {
        let mut inner = self.inner.write();
        if inner.inited {
            return Err(EngineError::BadMessage {
                message: "cannot process \"id name\" after initialization".to_string(),
            });
        }
        inner.info.name = val.to_string();
        Ok(())
    }

    fn on_id_author(&self, val: &str) -> Result<(), EngineError> {
        let mut inner = self.inner.write();
        if inner.inited {
            return Err(EngineError::BadMessage {
                message: "cannot process \"id author\" after initialization".to_string(),
            });
        }
        inner.info.author = val.to_string();
        Ok(())
    }

    fn on_uci_ok(&self) -> Result<(), EngineError> {
        let mut inner = self.inner.write();
        if inner.inited {
            return Err(EngineError::BadMessage {
                message: "duplicate \"uciok\"".to_string(),
            });
        }
        inner.inited = true;
        self.init_done.set();
        Ok(())
    }

    fn on_ready_ok(&self) -> Result<(), EngineError> {
        let mut inner = self.inner.write();
        if !inner.inited {
            return Err(EngineError::NotInitialized);
        }
        let Some(pong) = inner.pongs.pop_front() else {
            return Err(EngineError::BadMessage {
                message: "unmatched \"readyok\"".to_string(),
            });
        };
        let _ = pong.send(Ok(()));
        Ok(())
    }

    fn on_option(&self, pair: OptPair) -> Result<(), EngineError> {
        let mut inner = self.inner.write();
        if inner.inited {
            return Err(EngineError::BadMessage {
                message: "cannot process \"option\" after initialization".to_string(),
            });
        }
        let folded = case_fold(&pair.name);
        if inner.opts.contains_key(&folded) {
            return Err(EngineError::BadMessage {
                message: format!("duplicate option {:?}", pair.name),
            });
        }
        inner.opts.insert(folded, pair);
        Ok(())
    }

    fn on_info(&self, info: &Info) -> Result<(), EngineError> {
        let string_only = info.is_string_only();
        if let Some(string) = &info.string {
            if self.log_engine_string {
                log::info!("engine: {string}");
            }
        }

        let search = {
            let inner = self.inner.read();
            match &inner.search {
                Some(search) => Some(Arc::clone(search)),
                None if string_only => None,
                None => {
                    return Err(EngineError::BadMessage {
                        message: "no search in progress".to_string(),
                    })
                }
            }
        };

        if let Some(search) = search {
            search.on_info(info);
        }
        Ok(())
    }

    fn on_search_cancel(&self, err: EngineError) -> Result<(), EngineError> {
        let mut inner = self.inner.write();
        let Some(search) = inner.search.take() else {
            return Err(EngineError::BadMessage {
                message: "no search in progress".to_string(),
            });
        };
        search.cancel(err);
        Ok(())
    }

    fn on_best_move(
        &self,
        best: UciMove,
        ponder: Option<UciMove>,
    ) -> Result<(), EngineError> {
        let mut inner = self.inner.write();
        let Some(search) = inner.search.take() else {
            return Err(EngineError::BadMessage {
                message: "no search in progress".to_string(),
            });
        };
        search.on_best_move(best, ponder);
        Ok(())
    }

    fn ponder_enabled(inner: &StateInner) -> bool {
        if !inner.inited {
            return false;
        }
        match inner.opts.get(PONDER_OPT_NAME) {
            Some(pair) => matches!(pair.option.value(), OptValue::Bool(true)),
            None => false,
        }
    }

    pub(crate) fn init_done(&self) -> &DoneSignal {
        &self.init_done
    }

    pub(crate) fn initialized(&self) -> bool {
        self.inner.read().inited
    }

    pub(crate) fn terminating(&self) -> bool {
        self.inner.read().exiting
    }

    pub(crate) fn debug(&self) -> bool {
        self.inner.read().debug
    }

    pub(crate) fn engine_info(&self) -> Option<EngineInfo> {
        let inner = self.inner.read();
        if !inner.inited {
            return None;
        }
        Some(inner.info.clone())
    }

    /// Look up an option by name, case-insensitively.
    pub(crate) fn get_opt(&self, name: &str) -> Option<EngineOption> {
        let inner = self.inner.read();
        if !inner.inited {
            return None;
        }
        inner
            .opts
            .get(&case_fold(name))
            .map(|pair| pair.option.clone())
    }

    /// The canonical names of all declared options.
    pub(crate) fn list_opts(&self) -> Vec<String> {
        let inner = self.inner.read();
        if !inner.inited {
            return Vec::new();
        }
        inner.opts.values().map(|pair| pair.name.clone()).collect()
    }

    pub(crate) fn cur_search(&self) -> Option<Arc<SearchState>> {
        self.inner.read().search.clone()
    }

    /// Whether the engine declares a Ponder check option at all.
    pub(crate) fn ponder_supported(&self) -> bool {
        let inner = self.inner.read();
        if !inner.inited {
            return false;
        }
        matches!(
            inner.opts.get(PONDER_OPT_NAME),
            Some(OptPair {
                option: EngineOption::Check { .. },
                ..
            })
        )
    }

    /// Whether pondering is currently enabled.
    pub(crate) fn ponder(&self) -> bool {
        Self::ponder_enabled(&self.inner.read())
    }
}
