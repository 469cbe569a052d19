//! The engine driver: coordinator and reader tasks plus the public API.

use std::collections::VecDeque;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::board::Move;
use crate::game::Game;

use super::command::{serialize, Command};
use super::options::{CoderOptions, EngineOption, OptValue};
use super::process::{CmdProcess, Process, ProcessConfig, TracingProcess};
use super::search::{DoneSignal, GoOptions, InfoConsumer, SearchState, SearchStatus};
use super::state::{CommandReply, EngineInfo, EngineState};
use super::EngineError;

/// Tunables for an [`Engine`].
#[derive(Clone, Debug)]
pub struct EngineOptions {
    /// Reject all lines containing non-ASCII characters, both directions.
    pub sanitize_utf8: bool,
    /// Route `info string` payloads into the log.
    pub log_engine_string: bool,
    /// Allow `name`/`value` substrings in option string values.
    pub allow_bad_substrings_in_options: bool,
    /// How long the engine may take to answer the `uci` handshake before
    /// it is cancelled.
    pub init_timeout: Duration,
    /// How long to wait for a graceful exit before killing the process.
    pub quit_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            sanitize_utf8: false,
            log_engine_string: false,
            allow_bad_substrings_in_options: false,
            init_timeout: Duration::from_secs(5),
            quit_timeout: Duration::from_millis(500),
        }
    }
}

impl EngineOptions {
    fn coder(&self) -> CoderOptions {
        CoderOptions {
            sanitize_utf8: self.sanitize_utf8,
            allow_bad_substrings: self.allow_bad_substrings_in_options,
        }
    }
}

enum Event {
    Line(String),
    Eof,
    Command {
        cmd: Command,
        reply: SyncSender<Result<CommandReply, EngineError>>,
    },
    Shutdown,
}

struct Shared {
    state: Arc<EngineState>,
    process: Arc<dyn Process>,
    tx: Sender<Event>,
    done: DoneSignal,
}

impl Shared {
    fn send_command(
        &self,
        cmd: Command,
        timeout: Duration,
    ) -> Result<CommandReply, EngineError> {
        if self.done.is_set() {
            return Err(EngineError::Terminated);
        }
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        self.tx
            .send(Event::Command {
                cmd,
                reply: reply_tx,
            })
            .map_err(|_| EngineError::Terminated)?;
        match reply_rx.recv_timeout(timeout) {
            Ok(res) => res,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(EngineError::Timeout),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(EngineError::Terminated),
        }
    }

    fn cancel(&self) {
        self.process.kill();
        let _ = self.tx.send(Event::Shutdown);
    }
}

/// An asynchronous, concurrent-safe driver for one UCI engine process.
///
/// Dropping the engine terminates the process.
pub struct Engine {
    shared: Arc<Shared>,
    opts: EngineOptions,
}

/// A handle to one search started with [`Engine::go`].
///
/// The handle stays valid after the search completes; results can be read
/// at any point once [`Search::wait`] returns.
pub struct Search {
    state: Arc<SearchState>,
    shared: Arc<Shared>,
}

fn reader_loop(process: &Arc<dyn Process>, tx: &Sender<Event>) {
    loop {
        match process.recv() {
            Ok(line) => {
                if tx.send(Event::Line(line)).is_err() {
                    return;
                }
            }
            Err(_) => {
                let _ = tx.send(Event::Eof);
                return;
            }
        }
    }
}

type PendingCommand = (Command, SyncSender<Result<CommandReply, EngineError>>);

fn handle_command(
    state: &EngineState,
    process: &Arc<dyn Process>,
    cmd: Command,
    reply: &SyncSender<Result<CommandReply, EngineError>>,
) -> bool {
    match state.process_command(cmd) {
        Ok((wire, res)) => {
            let _ = reply.send(Ok(res));
            if let Some(wire) = wire {
                if let Some(line) = serialize(&wire) {
                    if let Err(err) = process.send(&line) {
                        log::warn!("cannot send command: {err}");
                        return false;
                    }
                }
            }
            true
        }
        Err(err) => {
            let _ = reply.send(Err(err));
            true
        }
    }
}

fn coordinator_loop(
    state: &EngineState,
    process: &Arc<dyn Process>,
    rx: &Receiver<Event>,
    quit_timeout: Duration,
) {
    let mut pending: VecDeque<PendingCommand> = VecDeque::new();

    // Handshake: the only line the driver sends before initialization.
    let started = match process.send("uci") {
        Ok(()) => true,
        Err(err) => {
            log::warn!("cannot start: {err}");
            false
        }
    };

    if started {
        'outer: loop {
            match rx.recv() {
                Ok(Event::Line(line)) => {
                    let was_inited = state.initialized();
                    if let Err(err) = state.process_message(&line) {
                        log::warn!("bad line: {err}");
                    }
                    if !was_inited && state.initialized() {
                        // The handshake completed; serve the commands that
                        // arrived early, in order.
                        while let Some((cmd, reply)) = pending.pop_front() {
                            if !handle_command(state, process, cmd, &reply) {
                                break 'outer;
                            }
                        }
                    }
                }
                Ok(Event::Command { cmd, reply }) => {
                    if state.initialized() {
                        if !handle_command(state, process, cmd, &reply) {
                            break;
                        }
                    } else {
                        pending.push_back((cmd, reply));
                    }
                }
                Ok(Event::Eof | Event::Shutdown) | Err(_) => break,
            }
        }
    }

    for (_, reply) in pending {
        let _ = reply.send(Err(EngineError::Terminated));
    }
    state.finish();

    // Give the engine a moment to exit on its own (it just got "quit", or
    // its pipes are about to close), then kill it.
    if !process.wait_timeout(quit_timeout) {
        log::warn!("killing engine");
        process.kill();
        process.wait_timeout(quit_timeout);
    }
}

impl Engine {
    /// Start driving `process`. The `uci` handshake is initiated
    /// immediately; commands sent before `uciok` are queued in order. If
    /// the handshake does not complete within the configured init
    /// timeout, the engine is cancelled.
    pub fn new<P: Process + 'static>(process: P, opts: EngineOptions) -> Engine {
        let process: Arc<dyn Process> = Arc::new(process);
        let state = Arc::new(EngineState::new(opts.coder(), opts.log_engine_string));
        let (tx, rx) = mpsc::channel();

        let shared = Arc::new(Shared {
            state: Arc::clone(&state),
            process: Arc::clone(&process),
            tx,
            done: DoneSignal::new(),
        });

        {
            let process = Arc::clone(&process);
            let tx = shared.tx.clone();
            thread::Builder::new()
                .name("uci-reader".to_string())
                .spawn(move || reader_loop(&process, &tx))
                .expect("failed to spawn reader thread");
        }

        {
            let shared = Arc::clone(&shared);
            let quit_timeout = opts.quit_timeout;
            thread::Builder::new()
                .name("uci-coordinator".to_string())
                .spawn(move || {
                    coordinator_loop(&shared.state, &shared.process, &rx, quit_timeout);
                    shared.done.set();
                })
                .expect("failed to spawn coordinator thread");
        }

        {
            // Watchdog: a silent engine must not hold the driver open.
            let shared = Arc::clone(&shared);
            let init_timeout = opts.init_timeout;
            thread::Builder::new()
                .name("uci-init-watchdog".to_string())
                .spawn(move || {
                    if !shared.state.init_done().wait_timeout(init_timeout)
                        && !shared.done.is_set()
                    {
                        log::warn!("engine failed to initialize in time");
                        shared.cancel();
                    }
                })
                .expect("failed to spawn watchdog thread");
        }

        Engine { shared, opts }
    }

    /// Block until the `uciok` handshake completes.
    pub fn wait_initialized(&self, timeout: Duration) -> Result<(), EngineError> {
        if self.shared.state.init_done().wait_timeout(timeout) {
            return Ok(());
        }
        if self.shared.done.is_set() {
            return Err(EngineError::Terminated);
        }
        Err(EngineError::Timeout)
    }

    /// Hard-terminate the engine: kill the process and fail everything
    /// pending.
    pub fn cancel(&self) {
        self.shared.cancel();
    }

    /// Whether the driver has fully shut down.
    #[must_use]
    pub fn terminated(&self) -> bool {
        self.shared.done.is_set()
    }

    /// Block until the driver shuts down; returns whether it did in time.
    pub fn wait(&self, timeout: Duration) -> bool {
        self.shared.done.wait_timeout(timeout)
    }

    /// Send `debug on`/`debug off`.
    pub fn set_debug(&self, val: bool, timeout: Duration) -> Result<(), EngineError> {
        self.shared.send_command(Command::Debug(val), timeout)?;
        Ok(())
    }

    /// Send `isready` and block until the matching `readyok`.
    pub fn ping(&self, timeout: Duration) -> Result<(), EngineError> {
        let reply = self.shared.send_command(Command::IsReady, timeout)?;
        let CommandReply::Pong(pong) = reply else {
            unreachable!("isready always replies with a pong waiter");
        };
        match pong.recv_timeout(timeout) {
            Ok(res) => res,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(EngineError::Timeout),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(EngineError::Terminated),
        }
    }

    /// Set an engine option. The value is validated against the declared
    /// schema and serialized with the engine's canonical option name.
    pub fn set_option(
        &self,
        name: &str,
        value: OptValue,
        timeout: Duration,
    ) -> Result<(), EngineError> {
        self.shared.send_command(
            Command::SetOption {
                name: name.to_string(),
                value,
            },
            timeout,
        )?;
        Ok(())
    }

    /// Toggle the engine's Ponder option.
    pub fn set_ponder(&self, val: bool, timeout: Duration) -> Result<(), EngineError> {
        self.set_option("Ponder", OptValue::Bool(val), timeout)
    }

    /// Send `ucinewgame`, optionally pinging afterwards so the engine has
    /// finished clearing its state.
    pub fn uci_new_game(&self, wait: bool, timeout: Duration) -> Result<(), EngineError> {
        self.shared.send_command(Command::UciNewGame, timeout)?;
        if wait {
            self.ping(timeout)?;
        }
        Ok(())
    }

    /// Send the game's start position and move list as a `position`
    /// command.
    pub fn set_position(&self, game: &Game, timeout: Duration) -> Result<(), EngineError> {
        let moves: Vec<Move> = (0..game.len()).map(|i| game.move_at(i)).collect();
        self.shared.send_command(
            Command::Position {
                start: game.start_pos(),
                moves,
                board: game.cur_board().clone(),
            },
            timeout,
        )?;
        Ok(())
    }

    /// Start a search. At most one search may be in flight; the returned
    /// handle tracks it until `bestmove`.
    pub fn go(
        &self,
        opts: GoOptions,
        consumer: Option<InfoConsumer>,
        timeout: Duration,
    ) -> Result<Search, EngineError> {
        let reply = self
            .shared
            .send_command(Command::Go { opts, consumer }, timeout)?;
        let CommandReply::Search(state) = reply else {
            unreachable!("go always replies with a search");
        };
        Ok(Search {
            state,
            shared: Arc::clone(&self.shared),
        })
    }

    /// Send `quit` and wait for the driver to shut down. On timeout the
    /// engine is killed.
    pub fn quit(&self, timeout: Duration) -> Result<(), EngineError> {
        match self.shared.send_command(Command::Quit, timeout) {
            Ok(_) => {}
            Err(EngineError::Terminated) if self.shared.done.is_set() => return Ok(()),
            Err(err) => return Err(err),
        }
        if self.shared.done.wait_timeout(timeout) {
            return Ok(());
        }
        self.cancel();
        Err(EngineError::Timeout)
    }

    /// Engine identity from the handshake, once initialized.
    #[must_use]
    pub fn engine_info(&self) -> Option<EngineInfo> {
        self.shared.state.engine_info()
    }

    #[must_use]
    pub fn initialized(&self) -> bool {
        self.shared.state.initialized()
    }

    #[must_use]
    pub fn terminating(&self) -> bool {
        self.shared.state.terminating()
    }

    #[must_use]
    pub fn debug(&self) -> bool {
        self.shared.state.debug()
    }

    /// Look up a declared option by name, case-insensitively.
    #[must_use]
    pub fn get_opt(&self, name: &str) -> Option<EngineOption> {
        self.shared.state.get_opt(name)
    }

    /// The canonical names of all declared options.
    #[must_use]
    pub fn list_opts(&self) -> Vec<String> {
        self.shared.state.list_opts()
    }

    /// Whether the engine declares a Ponder option.
    #[must_use]
    pub fn ponder_supported(&self) -> bool {
        self.shared.state.ponder_supported()
    }

    /// Whether pondering is currently enabled.
    #[must_use]
    pub fn ponder(&self) -> bool {
        self.shared.state.ponder()
    }

    /// The in-flight search, if any.
    #[must_use]
    pub fn cur_search(&self) -> Option<Search> {
        self.shared.state.cur_search().map(|state| Search {
            state,
            shared: Arc::clone(&self.shared),
        })
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if !self.shared.done.is_set() {
            // Best effort at a graceful exit, then the kill path.
            if self.quit(self.opts.quit_timeout).is_err() {
                self.cancel();
            }
        }
    }
}

impl Search {
    /// Block until the search completes (or the engine dies). Returns the
    /// search's terminal error, if any.
    pub fn wait(&self, timeout: Duration) -> Result<(), EngineError> {
        if !self.state.done().wait_timeout(timeout) {
            return Err(EngineError::Timeout);
        }
        match self.state.err() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Send `stop`. A stop aimed at an already-finished search is
    /// accepted and dropped. With `wait`, blocks until `bestmove`.
    pub fn stop(&self, wait: bool, timeout: Duration) -> Result<(), EngineError> {
        self.shared
            .send_command(Command::Stop(Arc::clone(&self.state)), timeout)?;
        if wait {
            self.wait(timeout)?;
        }
        Ok(())
    }

    /// Send `ponderhit`, turning the pondered search into a live one.
    pub fn ponder_hit(&self, timeout: Duration) -> Result<(), EngineError> {
        self.shared
            .send_command(Command::PonderHit(Arc::clone(&self.state)), timeout)?;
        Ok(())
    }

    /// Whether the search has completed.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state.done().is_set()
    }

    /// The search's terminal error, once completed.
    #[must_use]
    pub fn err(&self) -> Option<EngineError> {
        self.state.err()
    }

    /// A snapshot of the search progress (with a cloned PV).
    #[must_use]
    pub fn status(&self) -> SearchStatus {
        self.state.status()
    }

    #[must_use]
    pub fn ponder(&self) -> bool {
        self.state.ponder()
    }

    #[must_use]
    pub fn stopping(&self) -> bool {
        self.state.stopping()
    }

    #[must_use]
    pub fn stopped(&self) -> bool {
        self.state.stopped()
    }

    /// The best move, converted and validated against the search's
    /// position. Fails while the search is running or after an error.
    pub fn best_move(&self) -> Result<Move, EngineError> {
        self.state.best_move()
    }

    /// The engine's suggested ponder move, legal on the position after
    /// the best move.
    pub fn ponder_move(&self) -> Result<Option<Move>, EngineError> {
        self.state.ponder_move()
    }
}

/// Builder for spawning and driving an engine executable.
pub struct EngineBuilder {
    config: ProcessConfig,
    options: EngineOptions,
    tracing: bool,
}

impl EngineBuilder {
    #[must_use]
    pub fn new(program: &str) -> EngineBuilder {
        EngineBuilder {
            config: ProcessConfig {
                program: program.to_string(),
                ..ProcessConfig::default()
            },
            options: EngineOptions::default(),
            tracing: false,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: &str) -> EngineBuilder {
        self.config.args.push(arg.to_string());
        self
    }

    #[must_use]
    pub fn env(mut self, key: &str, value: &str) -> EngineBuilder {
        self.config.env.push((key.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn dir(mut self, dir: &str) -> EngineBuilder {
        self.config.dir = Some(dir.to_string());
        self
    }

    /// Log every wire line in both directions.
    #[must_use]
    pub fn tracing(mut self, enabled: bool) -> EngineBuilder {
        self.tracing = enabled;
        self
    }

    #[must_use]
    pub fn options(mut self, options: EngineOptions) -> EngineBuilder {
        self.options = options;
        self
    }

    /// Spawn the process and start the driver.
    pub fn spawn(self) -> io::Result<Engine> {
        let process = CmdProcess::spawn(&self.config)?;
        Ok(if self.tracing {
            Engine::new(TracingProcess::new(process), self.options)
        } else {
            Engine::new(process, self.options)
        })
    }
}
