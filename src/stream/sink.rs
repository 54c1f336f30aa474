//! Backpressure-aware output sinks.

use crate::{BoxStream, Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Consumer side of a live audio stream.
///
/// Producers await [`ready`](AudioSink::ready) before every
/// [`write`](AudioSink::write). Exactly one of `close` or `abort` ends the stream.
#[async_trait]
pub trait AudioSink: Send {
    /// Resolves once the consumer can accept another chunk.
    async fn ready(&mut self) -> Result<()>;

    async fn write(&mut self, chunk: Bytes) -> Result<()>;

    async fn close(&mut self);

    /// Terminate the stream after an unrecoverable error.
    async fn abort(&mut self, error: &Error);
}

/// Sink backed by a bounded channel; the receiving half is a byte stream.
pub struct ChannelSink {
    tx: Option<mpsc::Sender<Result<Bytes>>>,
    permit: Option<mpsc::OwnedPermit<Result<Bytes>>>,
}

/// Bounded sink/stream pair. `capacity` chunks may be buffered ahead of the consumer.
pub fn channel(capacity: usize) -> (ChannelSink, BoxStream<'static, Bytes>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let sink = ChannelSink {
        tx: Some(tx),
        permit: None,
    };
    (sink, Box::pin(ReceiverStream::new(rx)))
}

impl ChannelSink {
    pub fn is_closed(&self) -> bool {
        self.tx.as_ref().map_or(true, |tx| tx.is_closed())
    }
}

#[async_trait]
impl AudioSink for ChannelSink {
    async fn ready(&mut self) -> Result<()> {
        if self.permit.is_some() {
            return Ok(());
        }
        let tx = self.tx.clone().ok_or(Error::SinkClosed)?;
        let permit = tx.reserve_owned().await.map_err(|_| Error::SinkClosed)?;
        self.permit = Some(permit);
        Ok(())
    }

    async fn write(&mut self, chunk: Bytes) -> Result<()> {
        if self.is_closed() {
            self.permit = None;
            return Err(Error::SinkClosed);
        }
        if self.permit.is_none() {
            self.ready().await?;
        }
        let permit = self.permit.take().ok_or(Error::SinkClosed)?;
        permit.send(Ok(chunk));
        Ok(())
    }

    async fn close(&mut self) {
        self.permit = None;
        self.tx = None;
    }

    async fn abort(&mut self, error: &Error) {
        let failure = Err(Error::runtime(format!("audio stream aborted: {}", error)));
        if let Some(permit) = self.permit.take() {
            permit.send(failure);
        } else if let Some(tx) = self.tx.as_ref() {
            let _ = tx.try_send(failure);
        }
        self.tx = None;
    }
}
