use crate::format::Rendered;
use crate::level::Level;
use crate::sink::LogSink;
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing_subscriber::fmt::MakeWriter;

/// Destination for rendered records, called synchronously by the logger
/// in emission order. Implementations must not panic or block for long.
pub trait Transport: Send + Sync {
    fn log(&self, rendered: &Rendered);
}

/// Writes each record as one line on the output writer, or on the error
/// writer for the configured levels.
///
/// Writers are [`MakeWriter`]s, so the default stdout/stderr pair can be
/// swapped for anything `tracing-subscriber` accepts.
#[derive(Clone)]
pub struct ConsoleTransport<O = fn() -> io::Stdout, E = fn() -> io::Stderr> {
    stdout: O,
    stderr: E,
    stderr_levels: Vec<Level>,
}

impl ConsoleTransport {
    pub fn new(stderr_levels: Vec<Level>) -> Self {
        Self::with_writers(io::stdout, io::stderr, stderr_levels)
    }
}

impl<O, E> ConsoleTransport<O, E> {
    pub fn with_writers(stdout: O, stderr: E, stderr_levels: Vec<Level>) -> Self {
        Self {
            stdout,
            stderr,
            stderr_levels,
        }
    }
}

impl Default for ConsoleTransport {
    fn default() -> Self {
        Self::new(vec![Level::Error])
    }
}

impl<O, E> fmt::Debug for ConsoleTransport<O, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleTransport")
            .field("stderr_levels", &self.stderr_levels)
            .finish_non_exhaustive()
    }
}

impl<O, E> Transport for ConsoleTransport<O, E>
where
    O: for<'a> MakeWriter<'a> + Send + Sync,
    E: for<'a> MakeWriter<'a> + Send + Sync,
{
    fn log(&self, rendered: &Rendered) {
        // A failed console write has nowhere to be reported.
        if self.stderr_levels.contains(&rendered.level) {
            let _ = writeln!(self.stderr.make_writer(), "{}", rendered.line);
        } else {
            let _ = writeln!(self.stdout.make_writer(), "{}", rendered.line);
        }
    }
}

/// Keeps rendered records in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    records: Arc<Mutex<Vec<Rendered>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Rendered> {
        self.guard().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.guard().iter().map(|r| r.line.clone()).collect()
    }

    /// Drain everything captured so far.
    pub fn take(&self) -> Vec<Rendered> {
        std::mem::take(&mut *self.guard())
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, Vec<Rendered>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Transport for MemoryTransport {
    fn log(&self, rendered: &Rendered) {
        self.guard().push(rendered.clone());
    }
}

/// Forwards rendered records to an asynchronous [`LogSink`] through a
/// bounded channel drained by a background task.
///
/// The logging call only does a `try_send`; when the channel is full the
/// record is dropped and counted. Sink errors are reported on stderr and
/// the record is discarded.
pub struct SinkTransport {
    sender: mpsc::Sender<Rendered>,
    /// Successfully enqueued into channel.
    pub enqueued_records: Arc<AtomicU64>,
    /// Dropped because the channel was full or closed.
    pub dropped_records: Arc<AtomicU64>,
    /// Accepted by the sink.
    pub sent_records: Arc<AtomicU64>,
}

impl SinkTransport {
    /// Create the transport and spawn its forwarding task on the current
    /// Tokio runtime. The task exits, after a final flush, once every
    /// clone of the transport's sender is gone.
    ///
    /// Minimal thresholds are enforced for `buffer`, `batch_size` and
    /// `flush_interval` to avoid degenerate configurations.
    pub fn new(
        sink: Arc<dyn LogSink>,
        buffer: usize,
        batch_size: usize,
        flush_interval: Duration,
    ) -> (Self, JoinHandle<()>) {
        let buffer = buffer.max(16);
        let batch_size = batch_size.max(1);
        let flush_interval = flush_interval.max(Duration::from_millis(10));

        let (tx, mut rx) = mpsc::channel::<Rendered>(buffer);

        let enqueued_records = Arc::new(AtomicU64::new(0));
        let dropped_records = Arc::new(AtomicU64::new(0));
        let sent_records = Arc::new(AtomicU64::new(0));
        let sent_bg = Arc::clone(&sent_records);

        let handle = tokio::spawn(async move {
            let mut batch = Vec::with_capacity(batch_size);
            // Created once so incoming records never push the deadline back.
            let mut ticker = interval(flush_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    received = rx.recv() => match received {
                        Some(record) => {
                            batch.push(record);
                            if batch.len() >= batch_size {
                                send_batch(&*sink, &mut batch, &sent_bg).await;
                            }
                        }
                        None => {
                            send_batch(&*sink, &mut batch, &sent_bg).await;
                            if let Err(e) = sink.flush().await {
                                eprintln!("error flushing log sink: {}", e);
                            }
                            break;
                        }
                    },
                    _ = ticker.tick() => {
                        if !batch.is_empty() {
                            send_batch(&*sink, &mut batch, &sent_bg).await;
                        }
                    }
                }
            }
        });

        (
            Self {
                sender: tx,
                enqueued_records,
                dropped_records,
                sent_records,
            },
            handle,
        )
    }
}

async fn send_batch(sink: &dyn LogSink, batch: &mut Vec<Rendered>, sent: &AtomicU64) {
    for record in batch.drain(..) {
        match sink.send(&record).await {
            Ok(()) => {
                sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => eprintln!("log sink send failed, dropping record: {}", e),
        }
    }
}

impl Transport for SinkTransport {
    fn log(&self, rendered: &Rendered) {
        match self.sender.try_send(rendered.clone()) {
            Ok(()) => {
                self.enqueued_records.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                let dropped = self.dropped_records.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::debug!(dropped, "log channel full, dropping record");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::error::Error;

    fn rendered(line: &str) -> Rendered {
        Rendered {
            level: Level::Info,
            line: line.to_string(),
        }
    }

    #[derive(Default)]
    struct CollectingSink {
        lines: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LogSink for CollectingSink {
        async fn send(&self, record: &Rendered) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.lines.lock().unwrap().push(record.line.clone());
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl LogSink for FailingSink {
        async fn send(&self, _record: &Rendered) -> Result<(), Box<dyn Error + Send + Sync>> {
            Err("unreachable backend".into())
        }
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn console_routes_error_levels_to_the_error_writer() {
        let out = SharedBuf::default();
        let err = SharedBuf::default();
        let (out_w, err_w) = (out.clone(), err.clone());
        let console = ConsoleTransport::with_writers(
            move || out_w.clone(),
            move || err_w.clone(),
            vec![Level::Error],
        );

        console.log(&rendered("hello"));
        console.log(&Rendered {
            level: Level::Error,
            line: "boom".to_string(),
        });
        console.log(&Rendered {
            level: Level::Warn,
            line: "careful".to_string(),
        });

        assert_eq!(out.contents(), "hello\ncareful\n");
        assert_eq!(err.contents(), "boom\n");
    }

    #[test]
    fn memory_transport_shares_its_buffer() {
        let memory = MemoryTransport::new();
        let clone = memory.clone();
        clone.log(&rendered("one"));
        clone.log(&rendered("two"));
        assert_eq!(memory.lines(), vec!["one", "two"]);
        assert_eq!(memory.take().len(), 2);
        assert!(memory.records().is_empty());
    }

    #[tokio::test]
    async fn sink_transport_forwards_in_order_and_flushes_on_close() {
        let sink = Arc::new(CollectingSink::default());
        let (transport, handle) =
            SinkTransport::new(sink.clone(), 64, 4, Duration::from_secs(60));
        for i in 0..10 {
            transport.log(&rendered(&format!("line {}", i)));
        }
        assert_eq!(transport.enqueued_records.load(Ordering::Relaxed), 10);
        let sent = Arc::clone(&transport.sent_records);
        drop(transport);
        handle.await.unwrap();

        let expected: Vec<String> = (0..10).map(|i| format!("line {}", i)).collect();
        assert_eq!(*sink.lines.lock().unwrap(), expected);
        assert_eq!(sent.load(Ordering::Relaxed), 10);
    }

    #[tokio::test]
    async fn sink_failures_do_not_stop_forwarding() {
        let (transport, handle) =
            SinkTransport::new(Arc::new(FailingSink), 16, 1, Duration::from_millis(10));
        transport.log(&rendered("lost"));
        let sent = Arc::clone(&transport.sent_records);
        drop(transport);
        handle.await.unwrap();
        assert_eq!(sent.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn steady_trickle_is_flushed_on_the_interval() {
        let sink = Arc::new(CollectingSink::default());
        let (transport, _handle) =
            SinkTransport::new(sink.clone(), 64, 1_000, Duration::from_millis(50));

        // Records arrive faster than the flush interval and never fill a batch.
        for i in 0..20 {
            transport.log(&rendered(&format!("line {}", i)));
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let delivered = sink.lines.lock().unwrap().len();
        assert!(delivered > 0, "nothing delivered while records kept arriving");
        assert_eq!(transport.enqueued_records.load(Ordering::Relaxed), 20);
        drop(transport);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn full_channel_drops_records() {
        let sink = Arc::new(CollectingSink::default());
        let (transport, _handle) =
            SinkTransport::new(sink, 16, 1_000, Duration::from_secs(60));
        // The forwarding task cannot run until this test yields.
        for i in 0..20 {
            transport.log(&rendered(&format!("line {}", i)));
        }
        assert_eq!(transport.enqueued_records.load(Ordering::Relaxed), 16);
        assert_eq!(transport.dropped_records.load(Ordering::Relaxed), 4);
    }
}
