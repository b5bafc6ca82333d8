//! Stream wrapper that reports bytes received for the file in flight.

use bytes::Bytes;
use futures_util::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::time::{Duration, Instant};

/// Called with the running byte count of the current file
pub type ByteCallback = Arc<dyn Fn(u64) + Send + Sync>;

/// Tracks bytes flowing through a chunk stream and throttles callback calls
/// to a few per second. A final call is always made at end of stream.
pub struct ProgressStream<S> {
    inner: S,
    bytes_transferred: u64,
    last_update: Instant,
    update_interval: Duration,
    callback: ByteCallback,
}

impl<S> ProgressStream<S> {
    pub fn new(inner: S, callback: ByteCallback) -> Self {
        Self {
            inner,
            bytes_transferred: 0,
            last_update: Instant::now(),
            update_interval: Duration::from_millis(250),
            callback,
        }
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }
}

impl<S, E> Stream for ProgressStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<Bytes, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                self.bytes_transferred += chunk.len() as u64;

                let now = Instant::now();
                if now.duration_since(self.last_update) >= self.update_interval {
                    (self.callback)(self.bytes_transferred);
                    self.last_update = now;
                }

                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(e))),
            Poll::Ready(None) => {
                (self.callback)(self.bytes_transferred);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{stream, StreamExt};
    use std::sync::atomic::{AtomicU64, Ordering};

    #[tokio::test]
    async fn test_final_count_reported() {
        let seen = Arc::new(AtomicU64::new(0));
        let sink = seen.clone();
        let callback: ByteCallback = Arc::new(move |n| sink.store(n, Ordering::SeqCst));

        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"hello")),
            Ok(Bytes::from_static(b" world")),
        ];
        let mut wrapped = ProgressStream::new(stream::iter(chunks), callback);

        let mut collected = Vec::new();
        while let Some(chunk) = wrapped.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }

        assert_eq!(collected, b"hello world");
        assert_eq!(wrapped.bytes_transferred(), 11);
        assert_eq!(seen.load(Ordering::SeqCst), 11);
    }

    #[tokio::test]
    async fn test_errors_pass_through() {
        let callback: ByteCallback = Arc::new(|_| {});
        let chunks: Vec<Result<Bytes, String>> = vec![
            Ok(Bytes::from_static(b"abc")),
            Err("connection reset".to_string()),
        ];
        let mut wrapped = ProgressStream::new(stream::iter(chunks), callback);

        assert!(wrapped.next().await.unwrap().is_ok());
        assert_eq!(wrapped.next().await.unwrap().unwrap_err(), "connection reset");
        assert_eq!(wrapped.bytes_transferred(), 3);
    }
}
