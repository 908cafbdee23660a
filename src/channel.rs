use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::sys::stat::Mode;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::unix::pipe;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::ChannelError;

const READ_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Owner of the intake FIFO.
///
/// `open` replaces whatever sits at the pipe path with a fresh FIFO readable
/// and writable only by the current user, then starts a reader task that
/// splits the byte stream on newlines and forwards each line over a bounded
/// channel. Dropping the channel stops the reader and removes the FIFO.
pub struct PipeChannel {
    lines: async_channel::Receiver<String>,
    reader: JoinHandle<()>,
    path: PathBuf,
}

impl PipeChannel {
    /// Creates the FIFO at `path` and starts reading. Must run inside a
    /// tokio runtime.
    pub fn open(path: impl Into<PathBuf>, capacity: usize) -> Result<Self, ChannelError> {
        let path = path.into();

        match fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "removed stale pipe"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(ChannelError::RemoveStale { path, source }),
        }

        nix::unistd::mkfifo(&path, Mode::S_IRUSR | Mode::S_IWUSR).map_err(|errno| {
            ChannelError::Create {
                path: path.clone(),
                source: errno.into(),
            }
        })?;

        // Read-write keeps the descriptor alive across writer disconnects,
        // so EOF never tears the channel down between senders.
        let receiver = pipe::OpenOptions::new()
            .read_write(true)
            .open_receiver(&path)
            .map_err(|source| ChannelError::Open {
                path: path.clone(),
                source,
            })?;

        let (tx, lines) = async_channel::bounded(capacity);
        let reader = tokio::spawn(read_lines(receiver, tx));
        debug!(path = %path.display(), "pipe ready");

        Ok(Self {
            lines,
            reader,
            path,
        })
    }

    /// Next intake line with its trailing newline removed. `None` once the
    /// reader task has stopped.
    pub async fn next_line(&self) -> Option<String> {
        self.lines.recv().await.ok()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PipeChannel {
    fn drop(&mut self) {
        self.reader.abort();
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(error = %err, path = %self.path.display(), "failed to remove pipe");
            }
        }
    }
}

async fn read_lines(receiver: pipe::Receiver, lines: async_channel::Sender<String>) {
    let mut reader = BufReader::new(receiver);
    loop {
        let mut buf = Vec::new();
        match reader.read_until(b'\n', &mut buf).await {
            // A read-write descriptor should never see EOF; the delay keeps
            // a misbehaving platform from spinning.
            Ok(0) => tokio::time::sleep(READ_RETRY_DELAY).await,
            Ok(_) => {
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                }
                match String::from_utf8(buf) {
                    Ok(line) => {
                        if lines.send(line).await.is_err() {
                            return;
                        }
                    }
                    Err(err) => warn!(error = %err, "skipping line with invalid utf-8"),
                }
            }
            Err(err) => {
                warn!(error = %err, "pipe read error");
                tokio::time::sleep(READ_RETRY_DELAY).await;
            }
        }
    }
}
