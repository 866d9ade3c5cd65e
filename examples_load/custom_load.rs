use std::sync::Arc;
use std::time::Instant;

use tracing_context_log::transport::MemoryTransport;
use tracing_context_log::{ContextLogger, Options};

/// Text rendering without any request context, captured in memory.
#[tokio::main]
async fn main() {
    let memory = MemoryTransport::new();
    let logger = ContextLogger::with_transports(
        Options::new().log_level("debug").colorize(false),
        vec![Arc::new(memory.clone())],
    )
    .expect("valid options");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        logger.debug(format!("iteration {}", i), Some("LoadTest"));
    }

    let elapsed = start.elapsed();
    println!(
        "text rendering: {} records in {:?} (~{:.0} rec/s), last: {}",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64(),
        memory.lines().last().cloned().unwrap_or_default()
    );
}
