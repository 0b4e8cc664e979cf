/// SSE Sessions
///
/// Every accepted `GET /sse` connection gets a `SessionStream`: the response
/// body that emits an immediate ping comment and then one per keep-alive
/// tick. The stream owns its timer.
///
/// actix only notices a vanished peer when a write fails, so each TCP
/// connection is also watched for EOF (`watch_peer`). The stream ends as soon
/// as that `PeerClosed` signal fires, before its next tick. `SessionTracker`
/// counts the streams currently open.

use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::{FutureExt, Stream};
use tokio::sync::watch;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// SSE comment frame; clients ignore it, proxies see traffic.
pub const KEEPALIVE_FRAME: &[u8] = b": ping\n\n";

/// Pause between peeks while the connection still holds unread bytes.
const PEEK_BACKOFF: Duration = Duration::from_millis(100);

/// Fires once the peer of a connection has closed (or reset) its side.
#[derive(Clone, Debug)]
pub struct PeerClosed(watch::Receiver<bool>);

impl PeerClosed {
    fn wait(mut self) -> BoxFuture<'static, ()> {
        async move {
            // A dropped sender means the watcher is gone; treat it as closed.
            let _ = self.0.wait_for(|closed| *closed).await;
        }
        .boxed()
    }
}

/// Watch a TCP connection for EOF without consuming any of its bytes.
///
/// Peeks on a duplicate of the socket descriptor. The watcher stops on its
/// own once every `PeerClosed` handle for the connection is dropped.
#[cfg(unix)]
pub fn watch_peer(tcp: &tokio::net::TcpStream) -> io::Result<PeerClosed> {
    use std::os::fd::AsFd;

    let fd = tcp.as_fd().try_clone_to_owned()?;
    let watched = std::net::TcpStream::from(fd);
    watched.set_nonblocking(true)?;
    let watched = tokio::net::TcpStream::from_std(watched)?;

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        let mut buf = [0u8; 1];
        loop {
            tokio::select! {
                _ = tx.closed() => return,
                peeked = watched.peek(&mut buf) => match peeked {
                    Ok(0) | Err(_) => break,
                    Ok(_) => tokio::time::sleep(PEEK_BACKOFF).await,
                },
            }
        }
        tracing::debug!("peer closed connection");
        let _ = tx.send(true);
    });
    Ok(PeerClosed(rx))
}

#[cfg(not(unix))]
pub fn watch_peer(_tcp: &tokio::net::TcpStream) -> io::Result<PeerClosed> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "peer close detection needs unix sockets",
    ))
}

#[derive(Debug, Default)]
pub struct SessionTracker {
    next_id: AtomicU64,
    active: AtomicUsize,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of SSE streams currently open.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Open a keep-alive stream ticking every `interval`, ending early when
    /// `closed` fires.
    pub fn open(self: &Arc<Self>, interval: Duration, closed: Option<PeerClosed>) -> SessionStream {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(session = id, active, "SSE stream opened");

        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        SessionStream {
            id,
            greeted: false,
            ended: false,
            ticker,
            closed: closed.map(PeerClosed::wait),
            tracker: Arc::clone(self),
        }
    }
}

pub struct SessionStream {
    id: u64,
    greeted: bool,
    ended: bool,
    ticker: Interval,
    closed: Option<BoxFuture<'static, ()>>,
    tracker: Arc<SessionTracker>,
}

impl SessionStream {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Stream for SessionStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.ended {
            return Poll::Ready(None);
        }
        if let Some(closed) = this.closed.as_mut() {
            if closed.as_mut().poll(cx).is_ready() {
                tracing::debug!(session = this.id, "peer gone, ending stream");
                this.ended = true;
                this.closed = None;
                return Poll::Ready(None);
            }
        }
        if !this.greeted {
            this.greeted = true;
            return Poll::Ready(Some(Ok(Bytes::from_static(KEEPALIVE_FRAME))));
        }
        match this.ticker.poll_tick(cx) {
            Poll::Ready(_) => {
                tracing::trace!(session = this.id, "keep-alive");
                Poll::Ready(Some(Ok(Bytes::from_static(KEEPALIVE_FRAME))))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for SessionStream {
    fn drop(&mut self) {
        let active = self.tracker.active.fetch_sub(1, Ordering::SeqCst) - 1;
        tracing::info!(session = self.id, active, "SSE stream closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test(start_paused = true)]
    async fn pings_immediately_then_on_each_tick() {
        let tracker = Arc::new(SessionTracker::new());
        let mut stream = tracker.open(Duration::from_secs(30), None);

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(&first[..], KEEPALIVE_FRAME);

        // Nothing before the interval elapses.
        let early = tokio::time::timeout(Duration::from_secs(29), stream.next()).await;
        assert!(early.is_err());

        let tick = tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .expect("tick due")
            .unwrap()
            .unwrap();
        assert_eq!(&tick[..], KEEPALIVE_FRAME);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_stream_closes_the_session() {
        let tracker = Arc::new(SessionTracker::new());
        let mut a = tracker.open(Duration::from_secs(30), None);
        let b = tracker.open(Duration::from_secs(30), None);
        assert_eq!(tracker.active(), 2);
        assert_ne!(a.id(), b.id());

        a.next().await.unwrap().unwrap();
        drop(a);
        assert_eq!(tracker.active(), 1);

        drop(b);
        assert_eq!(tracker.active(), 0);

        // Only the tracker is left holding the counters.
        assert_eq!(Arc::strong_count(&tracker), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn close_signal_ends_the_stream_before_the_next_tick() {
        let tracker = Arc::new(SessionTracker::new());
        let (tx, rx) = watch::channel(false);
        let mut stream = tracker.open(Duration::from_secs(30), Some(PeerClosed(rx)));
        stream.next().await.unwrap().unwrap();

        tx.send(true).unwrap();
        let end = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("stream must end without waiting for a tick");
        assert!(end.is_none());
        assert!(stream.next().await.is_none());

        drop(stream);
        assert_eq!(tracker.active(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn watcher_reports_client_eof() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client = tokio::net::TcpStream::connect(listener.local_addr().unwrap())
            .await
            .unwrap();
        let (server_side, _) = listener.accept().await.unwrap();

        let closed = watch_peer(&server_side).unwrap();
        drop(client);

        tokio::time::timeout(Duration::from_secs(5), closed.wait())
            .await
            .expect("close observed");
    }
}
