//! Build log channel and the task that drains it.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::reporter::LogSink;

/// An opaque span of build output. Chunk boundaries carry no meaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogChunk(Bytes);

impl LogChunk {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn bytes(&self) -> &Bytes {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Write half of the build log.
///
/// There is exactly one `Log` per run. Adapters only ever borrow it, so the
/// channel closes when the engine drops it.
#[derive(Debug)]
pub struct Log {
    tx: mpsc::UnboundedSender<LogChunk>,
}

/// Read half of the build log.
#[derive(Debug)]
pub struct LogStream {
    rx: mpsc::UnboundedReceiver<LogChunk>,
}

impl Log {
    pub fn channel() -> (Log, LogStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Log { tx }, LogStream { rx })
    }

    /// Append raw bytes. Empty writes are dropped.
    pub fn write(&self, bytes: impl Into<Bytes>) {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return;
        }
        if self.tx.send(LogChunk(bytes)).is_err() {
            tracing::warn!("Build log reader is gone, dropping output");
        }
    }

    /// Append one line of text, adding the trailing newline.
    pub fn line(&self, text: impl AsRef<str>) {
        let mut line = text.as_ref().to_string();
        line.push('\n');
        self.write(line);
    }
}

impl LogStream {
    pub async fn recv(&mut self) -> Option<LogChunk> {
        self.rx.recv().await
    }
}

/// Forward every chunk to `sink` in arrival order until the log is closed.
///
/// Returns the number of chunks forwarded.
pub async fn drain(mut stream: LogStream, source: &str, sink: &dyn LogSink) -> usize {
    let mut forwarded = 0;
    while let Some(chunk) = stream.recv().await {
        sink.push_chunk(source, &chunk).await;
        forwarded += 1;
    }
    tracing::debug!("Log source `{}` closed after {} chunks", source, forwarded);
    forwarded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::MemoryLogSink;

    #[tokio::test]
    async fn drain_preserves_order_and_stops_on_close() {
        let (log, stream) = Log::channel();
        let sink = MemoryLogSink::default();

        log.write("one ");
        log.write("");
        log.line("two");
        log.write(Bytes::from_static(b"three"));
        drop(log);

        let forwarded = drain(stream, "console", &sink).await;

        assert_eq!(forwarded, 3);
        assert_eq!(sink.contents(), b"one two\nthree");
        assert!(sink.sources().iter().all(|s| s == "console"));
    }

    #[tokio::test]
    async fn drain_runs_concurrently_with_writer() {
        let (log, stream) = Log::channel();
        let sink = std::sync::Arc::new(MemoryLogSink::default());

        let reader = {
            let sink = sink.clone();
            tokio::spawn(async move { drain(stream, "console", sink.as_ref()).await })
        };

        for i in 0..100 {
            log.line(i.to_string());
            if i % 10 == 0 {
                tokio::task::yield_now().await;
            }
        }
        drop(log);

        assert_eq!(reader.await.unwrap(), 100);
        let expected: String = (0..100).map(|i| format!("{i}\n")).collect();
        assert_eq!(sink.contents(), expected.as_bytes());
    }
}
