// src/io/serial/feed.rs
//
// Fan-out of the background reader's chunks into consumption feeds.
//
// The reader publishes every chunk once into a FanOut. The FanOut replicates
// it to whichever views are attached: raw chunks, flattened bytes, and
// newline-delimited lines assembled from the byte stage. Each view is a Feed,
// a cloneable handle onto one unbounded queue, so every clone is the same
// sequence and values are never dropped for slow consumers.

use std::sync::{Arc, Mutex};

use futures::Stream;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

/// Emitted in place of a line whose bytes are not valid UTF-8
pub const INVALID_LINE_PLACEHOLDER: &str = "<serialwire: line is not valid UTF-8>";

// ============================================================================
// Feed
// ============================================================================

/// A finite-until-close sequence of values published by the background reader.
///
/// Clones share one queue: each value is delivered once, in publish order, to
/// whichever caller pulls next. `next()` returns `None` once the connection
/// that produced the feed has been closed and the queue is drained.
pub struct Feed<T> {
    receiver: Arc<tokio::sync::Mutex<UnboundedReceiver<T>>>,
}

impl<T> Clone for Feed<T> {
    fn clone(&self) -> Self {
        Feed {
            receiver: self.receiver.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Feed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feed")
            .field("id", &Arc::as_ptr(&self.receiver))
            .finish()
    }
}

impl<T: Send + 'static> Feed<T> {
    fn channel() -> (UnboundedSender<T>, Feed<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            tx,
            Feed {
                receiver: Arc::new(tokio::sync::Mutex::new(rx)),
            },
        )
    }

    /// Wait for the next value
    pub async fn next(&self) -> Option<T> {
        self.receiver.lock().await.recv().await
    }

    /// Blocking form of `next()`.
    /// Must not be called from inside an async runtime.
    pub fn blocking_next(&self) -> Option<T> {
        self.receiver.blocking_lock().blocking_recv()
    }

    /// Take a value if one is already queued.
    /// `Ok(None)` means nothing is available right now (including while
    /// another caller is waiting on the feed); `Err` means the feed has ended.
    pub fn try_next(&self) -> Result<Option<T>, TryRecvError> {
        let Ok(mut receiver) = self.receiver.try_lock() else {
            return Ok(None);
        };
        match receiver.try_recv() {
            Ok(value) => Ok(Some(value)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Whether two handles refer to the same feed
    pub fn same_feed(&self, other: &Feed<T>) -> bool {
        Arc::ptr_eq(&self.receiver, &other.receiver)
    }

    /// Consume the feed as a `futures::Stream`
    pub fn into_stream(self) -> impl Stream<Item = T> + Send {
        futures::stream::unfold(self, |feed| async move {
            let value = feed.next().await?;
            Some((value, feed))
        })
    }
}

// ============================================================================
// Line Assembly
// ============================================================================

/// Accumulates bytes until a line feed and decodes the line as UTF-8
#[derive(Debug, Default)]
pub struct LineAssembler {
    buffer: Vec<u8>,
}

impl LineAssembler {
    pub fn new() -> Self {
        LineAssembler {
            buffer: Vec::with_capacity(256),
        }
    }

    /// Feed one byte; returns a completed line (delimiter included) on `\n`
    pub fn push(&mut self, byte: u8) -> Option<String> {
        self.buffer.push(byte);
        if byte != b'\n' {
            return None;
        }
        let bytes = std::mem::take(&mut self.buffer);
        Some(String::from_utf8(bytes).unwrap_or_else(|_| INVALID_LINE_PLACEHOLDER.to_string()))
    }

    /// Bytes waiting for a line feed
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

// ============================================================================
// Fan-Out
// ============================================================================

#[derive(Default)]
struct Sinks {
    raw: Vec<UnboundedSender<Vec<u8>>>,
    bytes: Vec<UnboundedSender<u8>>,
    /// Each line view assembles on its own, from the bytes it has seen
    lines: Vec<(LineAssembler, UnboundedSender<String>)>,
    finished: bool,
}

/// Publishing side shared between the background reader and the connection.
/// Every attach creates an independent view; earlier views keep receiving.
#[derive(Default)]
pub struct FanOut {
    sinks: Mutex<Sinks>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    fn sinks(&self) -> std::sync::MutexGuard<'_, Sinks> {
        // A panic while publishing cannot leave the sinks half-updated
        self.sinks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Attach a raw-chunk view
    pub fn attach_raw(&self) -> Feed<Vec<u8>> {
        let (tx, feed) = Feed::channel();
        let mut sinks = self.sinks();
        if !sinks.finished {
            sinks.raw.push(tx);
        }
        feed
    }

    /// Attach a byte view
    pub fn attach_bytes(&self) -> Feed<u8> {
        let (tx, feed) = Feed::channel();
        let mut sinks = self.sinks();
        if !sinks.finished {
            sinks.bytes.push(tx);
        }
        feed
    }

    /// Attach a line view, fed from the byte stage
    pub fn attach_lines(&self) -> Feed<String> {
        let (tx, feed) = Feed::channel();
        let mut sinks = self.sinks();
        if !sinks.finished {
            sinks.lines.push((LineAssembler::new(), tx));
        }
        feed
    }

    /// Replicate one chunk to every attached view
    pub fn publish(&self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        let mut sinks = self.sinks();

        // Views whose every handle was dropped are forgotten
        sinks.raw.retain(|tx| tx.send(chunk.to_vec()).is_ok());
        sinks
            .bytes
            .retain(|tx| chunk.iter().all(|&byte| tx.send(byte).is_ok()));
        sinks.lines.retain_mut(|(assembler, tx)| {
            chunk.iter().all(|&byte| match assembler.push(byte) {
                Some(line) => tx.send(line).is_ok(),
                None => true,
            })
        });
    }

    /// Drop every sender so all feeds end. Views attached afterwards end immediately.
    pub fn finish(&self) {
        let mut sinks = self.sinks();
        sinks.raw.clear();
        sinks.bytes.clear();
        sinks.lines.clear();
        sinks.finished = true;
    }
}

// ============================================================================
// Tests
// ============================================================================
