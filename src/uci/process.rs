//! Line-duplex transport to the engine process.

use std::io::{self, BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// A line-duplex byte channel to an engine.
///
/// `recv` blocks until a line arrives and reports EOF (via
/// [`io::ErrorKind::UnexpectedEof`]) when the peer goes away. All methods
/// are callable from any thread.
pub trait Process: Send + Sync {
    /// Send one line (without the terminator).
    fn send(&self, line: &str) -> io::Result<()>;
    /// Receive one line, blocking. Trailing `\r`/`\n` are stripped.
    fn recv(&self) -> io::Result<String>;
    /// Whether the peer has terminated.
    fn is_done(&self) -> bool;
    /// Wait for the peer to terminate; returns whether it did in time.
    fn wait_timeout(&self, timeout: Duration) -> bool;
    /// Terminate the peer forcibly.
    fn kill(&self);
}

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A [`Process`] backed by a child OS process speaking on stdin/stdout.
pub struct CmdProcess {
    child: Mutex<Child>,
    stdin: Mutex<ChildStdin>,
    stdout: Mutex<BufReader<ChildStdout>>,
    killed: AtomicBool,
}

/// Launch descriptor for [`CmdProcess::spawn`].
#[derive(Clone, Debug, Default)]
pub struct ProcessConfig {
    /// Executable name or path.
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
    /// Working directory; inherited when empty.
    pub dir: Option<String>,
}

impl CmdProcess {
    /// Spawn a child process with piped stdin/stdout. Stderr is inherited.
    pub fn spawn(config: &ProcessConfig) -> io::Result<CmdProcess> {
        let mut command = Command::new(&config.program);
        command
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped());
        for (key, value) in &config.env {
            command.env(key, value);
        }
        if let Some(dir) = &config.dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("no stdin pipe"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("no stdout pipe"))?;

        Ok(CmdProcess {
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            stdout: Mutex::new(BufReader::new(stdout)),
            killed: AtomicBool::new(false),
        })
    }
}

impl Process for CmdProcess {
    fn send(&self, line: &str) -> io::Result<()> {
        let mut stdin = self.stdin.lock();
        let res = stdin
            .write_all(line.as_bytes())
            .and_then(|()| stdin.write_all(b"\n"))
            .and_then(|()| stdin.flush());
        if res.is_err() {
            self.kill();
        }
        res
    }

    fn recv(&self) -> io::Result<String> {
        let mut stdout = self.stdout.lock();
        let mut line = String::new();
        let n = stdout.read_line(&mut line).inspect_err(|_| self.kill())?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "engine eof"));
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }

    fn is_done(&self) -> bool {
        matches!(self.child.lock().try_wait(), Ok(Some(_)))
    }

    fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_done() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(WAIT_POLL_INTERVAL);
        }
    }

    fn kill(&self) {
        if !self.killed.swap(true, Ordering::SeqCst) {
            let _ = self.child.lock().kill();
        }
    }
}

impl Drop for CmdProcess {
    fn drop(&mut self) {
        self.kill();
        let _ = self.child.lock().wait();
    }
}

/// A [`Process`] wrapper logging both directions of the wire traffic.
pub struct TracingProcess<P> {
    inner: P,
    my_name: &'static str,
    peer_name: &'static str,
}

impl<P: Process> TracingProcess<P> {
    pub fn new(inner: P) -> TracingProcess<P> {
        TracingProcess {
            inner,
            my_name: "me",
            peer_name: "engine",
        }
    }
}

impl<P: Process> Process for TracingProcess<P> {
    fn send(&self, line: &str) -> io::Result<()> {
        log::debug!("{} -> {}: {}", self.my_name, self.peer_name, line);
        self.inner.send(line).inspect_err(|err| {
            log::warn!("{}: send failed: {}", self.peer_name, err);
        })
    }

    fn recv(&self) -> io::Result<String> {
        match self.inner.recv() {
            Ok(line) => {
                log::debug!("{} -> {}: {}", self.peer_name, self.my_name, line);
                Ok(line)
            }
            Err(err) => {
                if err.kind() != io::ErrorKind::UnexpectedEof {
                    log::warn!("{}: recv failed: {}", self.peer_name, err);
                }
                Err(err)
            }
        }
    }

    fn is_done(&self) -> bool {
        self.inner.is_done()
    }

    fn wait_timeout(&self, timeout: Duration) -> bool {
        self.inner.wait_timeout(timeout)
    }

    fn kill(&self) {
        log::debug!("{}: killing", self.peer_name);
        self.inner.kill();
    }
}
