use crate::format::Rendered;
use async_trait::async_trait;
use std::error::Error;

/// Asynchronous destination for [`Rendered`] records.
///
/// Implementations transport already formatted lines to a concrete
/// backend (a file, a socket, a log shipper). [`SinkTransport`](crate::transport::SinkTransport)
/// calls `send` from a background task and never awaits it on the
/// logging caller's path.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Send a single rendered record.
    ///
    /// **Returns**
    /// - `Ok(())` if the backend accepted the record.
    /// - `Err(..)` if the backend failed. The record is reported on stderr
    ///   and dropped; there is no retry.
    async fn send(&self, record: &Rendered) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Flush any buffered records, if the backend buffers.
    ///
    /// Default implementation is a no-op.
    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}
