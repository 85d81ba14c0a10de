//! Remote control via Unix socket
//!
//! One command per line, e.g. `mode rotate`, `strategy iterative_bfs`,
//! `alpha 200`, `touch 140 60`, `release`, `quit`.

use std::io::{BufRead, BufReader};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use bodyblend::{CompositeMode, Point, Result, TraversalStrategy};

pub const DEFAULT_SOCKET_PATH: &str = "/tmp/bodyblend.sock";

/// Commands that can be sent over the socket
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Mode(CompositeMode),
    Strategy(TraversalStrategy),
    Alpha(u8),
    /// Touch point in native coordinates
    Touch(Point),
    /// Forget the touch point
    Release,
    Quit,
}

/// Listens for commands on a Unix socket
pub struct Controller {
    path: PathBuf,
    receiver: Receiver<Command>,
    _listener_thread: thread::JoinHandle<()>,
}

impl Controller {
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        // stale socket from a previous run
        let _ = std::fs::remove_file(&path);

        let listener = UnixListener::bind(&path)?;
        listener.set_nonblocking(true)?;

        let (sender, receiver) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("bodyblend-control".to_string())
            .spawn(move || Self::listener_loop(listener, sender))?;

        log::info!("control socket listening on {}", path.display());
        Ok(Self {
            path,
            receiver,
            _listener_thread: handle,
        })
    }

    fn listener_loop(listener: UnixListener, sender: Sender<Command>) {
        loop {
            match listener.accept() {
                Ok((stream, _)) => {
                    let sender = sender.clone();
                    thread::spawn(move || Self::handle_client(stream, sender));
                },
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(50));
                },
                Err(e) => {
                    log::warn!("control socket closed: {}", e);
                    break;
                },
            }
        }
    }

    fn handle_client(stream: UnixStream, sender: Sender<Command>) {
        let reader = BufReader::new(stream);
        for line in reader.lines().map_while(|line| line.ok()) {
            match parse_command(&line) {
                Some(cmd) => {
                    if sender.send(cmd).is_err() {
                        break;
                    }
                },
                None => log::warn!("unknown control command: {:?}", line.trim()),
            }
        }
    }

    /// Pending commands, oldest first (non-blocking)
    pub fn poll(&self) -> Vec<Command> {
        self.receiver.try_iter().collect()
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim().to_lowercase();
    let mut words = line.split_whitespace();
    let verb = words.next()?;
    let arg = words.next();
    let cmd = match (verb, arg) {
        ("q" | "quit" | "exit", None) => Command::Quit,
        ("release", None) => Command::Release,
        ("mode", Some(name)) => Command::Mode(CompositeMode::from_name(name)?),
        ("strategy", Some(name)) => Command::Strategy(TraversalStrategy::from_name(name)?),
        ("alpha", Some(value)) => Command::Alpha(value.parse().ok()?),
        ("touch", Some(x)) => {
            let y = words.next()?;
            Command::Touch(Point::new(x.parse().ok()?, y.parse().ok()?))
        },
        _ => return None,
    };
    // trailing words
    if words.next().is_some() {
        return None;
    }
    Some(cmd)
}
