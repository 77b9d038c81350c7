//! Output tee for node subprocesses
//!
//! Everything a node writes to stdout or stderr is forwarded into an
//! in-memory pipe whose read end is handed out as [`NodeOutput`]. The
//! write end stays with the runner until cleanup closes it. Closing lets
//! each stream pump read on to EOF, so output a process printed just
//! before exiting still reaches the reader.

use futures_util::FutureExt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, DuplexStream, ReadBuf};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Bytes buffered in the pipe before writers wait for the reader
const PIPE_CAPACITY: usize = 64 * 1024;

/// Chunks queued between the stream pumps and the pipe writer
const CHUNK_QUEUE: usize = 64;

/// Once closing, a stream quiet for this long is treated as finished.
/// Covers grandchildren that inherited the pipe and outlive the node.
const DRAIN_IDLE: Duration = Duration::from_millis(250);

/// Max number of output lines to include in error messages.
const ERROR_TAIL_LINES: usize = 50;

/// Readable end of a node's combined output
pub struct NodeOutput {
    inner: DuplexStream,
}

impl AsyncRead for NodeOutput {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

/// Write end of the output pipe, shared by every process the runner launches
pub(crate) struct OutputTee {
    sink: Option<DuplexStream>,
    tx: Option<mpsc::Sender<Vec<u8>>>,
    forwarder: Option<JoinHandle<io::Result<()>>>,
    /// Dropped on close to switch every pump into draining
    closing: Option<watch::Sender<()>>,
}

impl OutputTee {
    /// Create a tee and the reader fed by it
    pub(crate) fn pipe() -> (Self, NodeOutput) {
        let (reader, writer) = tokio::io::duplex(PIPE_CAPACITY);
        let tee = Self {
            sink: Some(writer),
            tx: None,
            forwarder: None,
            closing: Some(watch::channel(()).0),
        };
        (tee, NodeOutput { inner: reader })
    }

    /// Forward everything read from `source` into the pipe
    ///
    /// Must be called from within a Tokio runtime.
    pub(crate) fn attach<R>(&mut self, source: R)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        if self.tx.is_none() {
            let Some(sink) = self.sink.take() else {
                return;
            };
            let (tx, rx) = mpsc::channel(CHUNK_QUEUE);
            self.forwarder = Some(tokio::spawn(forward(rx, sink)));
            self.tx = Some(tx);
        }

        if let (Some(tx), Some(closing)) = (&self.tx, &self.closing) {
            tokio::spawn(pump(source, tx.clone(), closing.subscribe()));
        }
    }

    /// Close the write end; the reader sees EOF once every stream drains
    ///
    /// Pumps keep reading until their stream ends or stays idle for
    /// `DRAIN_IDLE`. Never waits on the reader.
    pub(crate) fn close(mut self) -> io::Result<()> {
        self.closing.take();
        self.tx.take();
        self.sink.take();

        match self.forwarder.take().and_then(|f| f.now_or_never()) {
            Some(Ok(result)) => result,
            Some(Err(e)) => Err(io::Error::other(e)),
            None => Ok(()),
        }
    }
}

/// Copy one process stream into the chunk queue, draining it after the queue closes
async fn pump<R>(mut source: R, tx: mpsc::Sender<Vec<u8>>, mut closing: watch::Receiver<()>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; 8192];
    let mut forwarding = true;
    let mut draining = false;
    loop {
        let read = if draining {
            match tokio::time::timeout(DRAIN_IDLE, source.read(&mut buf)).await {
                Ok(read) => read,
                Err(_) => break,
            }
        } else {
            tokio::select! {
                read = source.read(&mut buf) => read,
                _ = closing.changed() => {
                    draining = true;
                    continue;
                }
            }
        };
        match read {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if forwarding && tx.send(buf[..n].to_vec()).await.is_err() {
                    forwarding = false;
                }
            }
        }
    }
}

/// Single writer for the pipe; ends once every sender is gone
async fn forward(mut rx: mpsc::Receiver<Vec<u8>>, mut sink: DuplexStream) -> io::Result<()> {
    let mut reader_gone = false;
    while let Some(chunk) = rx.recv().await {
        if reader_gone {
            continue;
        }
        if let Err(e) = sink.write_all(&chunk).await {
            if e.kind() != io::ErrorKind::BrokenPipe {
                return Err(e);
            }
            reader_gone = true;
        }
    }
    sink.shutdown().await
}

/// Extract the useful tail of process output for error diagnostics.
///
/// Combines stdout and stderr, then returns the last `ERROR_TAIL_LINES`
/// lines so error messages are actionable without being overwhelming.
pub(crate) fn output_tail(stdout: &str, stderr: &str) -> String {
    let lines: Vec<&str> = stdout.lines().chain(stderr.lines()).collect();
    let skip = lines.len().saturating_sub(ERROR_TAIL_LINES);
    lines[skip..].join("\n")
}
