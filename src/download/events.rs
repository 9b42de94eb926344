//! Multicast progress-event fabric.
//!
//! Every task pushes immutable [`DownloadInfo`] snapshots into one
//! [`EventSink`]; any number of subscribers follow the feed independently.
//! The publisher never blocks: each subscriber has its own bounded buffer and
//! a subscriber that falls behind loses its *oldest* buffered events only,
//! keeping per-subscriber ordering intact with gaps.

use std::time::Duration;

use futures_util::Stream;
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, warn};

use super::info::DownloadInfo;

/// Period of the liveness heartbeat stream.
pub const HEARTBEAT_PERIOD: Duration = Duration::from_secs(25);

/// Multicast, backpressure-tolerant channel of progress snapshots.
///
/// Cloning is cheap; all clones publish into the same feed.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: broadcast::Sender<DownloadInfo>,
}

impl EventSink {
    /// Creates a sink whose subscribers each buffer up to `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Delivers a snapshot to every current subscriber.
    ///
    /// A feed without subscribers swallows the event; that is normal between
    /// UI connections, not a failure.
    pub fn publish(&self, snapshot: DownloadInfo) {
        let id = snapshot.id.clone();
        match self.tx.send(snapshot) {
            Ok(receivers) => {
                debug!(id = %id, receivers, "published progress snapshot");
            }
            Err(_) => {
                debug!(id = %id, "no subscribers for progress snapshot");
            }
        }
    }

    /// Opens an independent live feed starting from this moment (no replay).
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Number of currently attached subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// One subscriber's view of the progress feed.
pub struct Subscription {
    rx: broadcast::Receiver<DownloadInfo>,
}

impl Subscription {
    /// Waits for the next snapshot; `None` once every sink handle is dropped.
    ///
    /// When this subscriber lagged past its buffer, the dropped-event gap is
    /// logged and the feed continues from the oldest retained snapshot.
    pub async fn recv(&mut self) -> Option<DownloadInfo> {
        loop {
            match self.rx.recv().await {
                Ok(snapshot) => return Some(snapshot),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "slow subscriber dropped oldest progress events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Time-based liveness ticks, independent of any download activity.
///
/// Emits immediately, then every `period`. Idle consumers merge this with
/// their [`Subscription`] to detect a dead connection; it never perturbs
/// snapshot ordering because it is a separate stream.
pub fn heartbeats(period: Duration) -> impl Stream<Item = Instant> {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    futures_util::stream::unfold(ticker, |mut ticker| async move {
        let at = ticker.tick().await;
        Some((at, ticker))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;

    use futures_util::StreamExt;

    use super::*;

    fn snapshot(version: u64) -> DownloadInfo {
        let mut info = DownloadInfo::new(
            "id-1".to_string(),
            "http://example.com/a.bin".to_string(),
            "a.bin".to_string(),
            PathBuf::from("/tmp"),
        );
        info.version = version;
        info
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_published_snapshots_in_order() {
        let sink = EventSink::new(16);
        let mut first = sink.subscribe();
        let mut second = sink.subscribe();

        for version in 1..=3 {
            sink.publish(snapshot(version));
        }

        for subscriber in [&mut first, &mut second] {
            for expected in 1..=3 {
                let received = subscriber.recv().await.unwrap();
                assert_eq!(received.version, expected);
            }
        }
    }

    #[test]
    fn test_recv_stays_pending_until_a_snapshot_is_published() {
        let sink = EventSink::new(4);
        let mut subscription = sink.subscribe();
        let mut recv = tokio_test::task::spawn(subscription.recv());

        tokio_test::assert_pending!(recv.poll());

        sink.publish(snapshot(1));
        assert!(recv.is_woken(), "publish must wake the parked subscriber");
        let received = tokio_test::assert_ready!(recv.poll());
        assert_eq!(received.unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_does_not_panic() {
        let sink = EventSink::new(16);
        sink.publish(snapshot(1));
        assert_eq!(sink.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscription_starts_at_subscribe_time_no_replay() {
        let sink = EventSink::new(16);
        sink.publish(snapshot(1));

        let mut late = sink.subscribe();
        sink.publish(snapshot(2));

        let received = late.recv().await.unwrap();
        assert_eq!(received.version, 2, "no replay of history");
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_oldest_but_keeps_order() {
        let sink = EventSink::new(2);
        let mut slow = sink.subscribe();

        for version in 1..=5 {
            sink.publish(snapshot(version));
        }

        // Buffer holds the newest two; the gap is absorbed, order preserved.
        let first = slow.recv().await.unwrap();
        let second = slow.recv().await.unwrap();
        assert!(first.version < second.version);
        assert_eq!(second.version, 5);
    }

    #[tokio::test]
    async fn test_recv_returns_none_after_sink_dropped() {
        let sink = EventSink::new(4);
        let mut subscription = sink.subscribe();
        sink.publish(snapshot(1));
        drop(sink);

        assert_eq!(subscription.recv().await.unwrap().version, 1);
        assert!(subscription.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_heartbeats_tick_immediately_then_periodically() {
        tokio::time::pause();
        let mut beats = Box::pin(heartbeats(Duration::from_secs(25)));

        let first = beats.next().await.unwrap();
        tokio::time::advance(Duration::from_secs(25)).await;
        let second = beats.next().await.unwrap();

        assert!(second.duration_since(first) >= Duration::from_secs(25));
    }
}
