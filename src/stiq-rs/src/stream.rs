//! Bounded file-to-request pump for streamed bodies.

use bytes::{Bytes, BytesMut};
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use stiq_core::BodyChannel;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Bytes read from the source per chunk
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Chunks buffered between the reader task and the request body
pub const CHANNEL_CAPACITY: usize = 4;

/// Spawn a task that reads `source` into a bounded channel.
///
/// The task waits whenever the channel is full, so at most
/// `CHANNEL_CAPACITY` chunks are held in memory. A read error is forwarded
/// into the channel so the consumer fails the request. The task resolves to
/// the number of bytes forwarded.
pub fn spawn_reader<R>(mut source: R) -> (BodyChannel, JoinHandle<std::io::Result<u64>>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    let handle = tokio::spawn(async move {
        let mut forwarded = 0u64;
        loop {
            let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
            match source.read_buf(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    forwarded += n as u64;
                    if tx.send(Ok(buf.freeze())).await.is_err() {
                        tracing::debug!("body receiver dropped, stopping reader");
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed reading request body source");
                    let kind = e.kind();
                    let message = e.to_string();
                    // Best effort: the receiver may already be gone
                    let _ = tx.send(Err(e)).await;
                    return Err(std::io::Error::new(kind, message));
                }
            }
        }
        Ok(forwarded)
    });

    (rx, handle)
}

/// A body channel viewed as a `Stream` of chunks.
#[derive(Debug)]
pub struct ChannelStream {
    rx: BodyChannel,
}

impl Stream for ChannelStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

pub fn channel_stream(rx: BodyChannel) -> ChannelStream {
    ChannelStream { rx }
}
