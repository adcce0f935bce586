use std::io;

use bytes::Bytes;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

/// The receiving side went away. This is how a client disconnect shows up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("relay sink closed")]
pub struct SinkClosed;

#[async_trait::async_trait]
pub trait RelaySink: Send {
    async fn send(&mut self, chunk: Bytes) -> Result<(), SinkClosed>;

    /// Resolves once the receiving side is gone, without sending anything.
    /// Sinks that only learn about closure on write never resolve.
    async fn closed(&mut self) {
        std::future::pending::<()>().await
    }
}

/// Feeds an HTTP body stream; dropping the receiver closes the sink.
#[async_trait::async_trait]
impl RelaySink for mpsc::Sender<io::Result<Bytes>> {
    async fn send(&mut self, chunk: Bytes) -> Result<(), SinkClosed> {
        mpsc::Sender::send(self, Ok(chunk))
            .await
            .map_err(|_| SinkClosed)
    }

    async fn closed(&mut self) {
        mpsc::Sender::closed(self).await
    }
}

#[async_trait::async_trait]
impl RelaySink for mpsc::Sender<Bytes> {
    async fn send(&mut self, chunk: Bytes) -> Result<(), SinkClosed> {
        mpsc::Sender::send(self, chunk).await.map_err(|_| SinkClosed)
    }

    async fn closed(&mut self) {
        mpsc::Sender::closed(self).await
    }
}

#[derive(Debug)]
pub struct WriterSink<W> {
    writer: W,
}

impl<W> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait::async_trait]
impl<W> RelaySink for WriterSink<W>
where
    W: AsyncWrite + Send + Unpin,
{
    async fn send(&mut self, chunk: Bytes) -> Result<(), SinkClosed> {
        self.writer.write_all(&chunk).await.map_err(|_| SinkClosed)?;
        self.writer.flush().await.map_err(|_| SinkClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_sink_closes_with_receiver() {
        let (mut tx, rx) = mpsc::channel::<io::Result<Bytes>>(1);
        drop(rx);
        let err = RelaySink::send(&mut tx, Bytes::from_static(b"x")).await;
        assert_eq!(err, Err(SinkClosed));
    }

    #[tokio::test]
    async fn channel_sink_reports_closure_without_sending() {
        let (mut tx, rx) = mpsc::channel::<Bytes>(1);
        drop(rx);
        tokio::time::timeout(std::time::Duration::from_secs(1), RelaySink::closed(&mut tx))
            .await
            .expect("closed should resolve once the receiver is dropped");
    }

    #[tokio::test]
    async fn writer_sink_collects_bytes() {
        let mut sink = WriterSink::new(Vec::new());
        sink.send(Bytes::from_static(b"ab")).await.unwrap();
        sink.send(Bytes::from_static(b"cd")).await.unwrap();
        assert_eq!(sink.into_inner(), b"abcd");
    }
}
