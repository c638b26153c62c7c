//! Bus feeds of a Topic Aggregator
//!
//! One task per bus source: connect with retry, confirm the subscription once
//! the publisher acknowledged it, then count every segment received until the
//! publisher goes away.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use docflow_bus::BusSubscription;
use docflow_domain::TopicAggregator;

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub handshake_timeout: Duration,
    /// First pause between connection attempts, doubled up to `max_backoff`
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(5),
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
        }
    }
}

/// Start one feed per source
pub fn spawn_feeds(
    aggregator: Arc<TopicAggregator>,
    sources: &[String],
    config: FeedConfig,
) -> Vec<JoinHandle<()>> {
    sources
        .iter()
        .map(|source| {
            tokio::spawn(feed(
                Arc::clone(&aggregator),
                source.clone(),
                config.clone(),
            ))
        })
        .collect()
}

/// Keep trying until the publisher answers the handshake
///
/// Processors may still be binding their bus when the aggregator starts; the
/// orchestrator bounds the wait with its subscription timeout and deletes the
/// aggregator if it never confirms.
async fn subscribe(topic: &str, source: &str, config: &FeedConfig) -> BusSubscription {
    let topics = [topic.to_string()];
    let mut backoff = config.initial_backoff;

    loop {
        match BusSubscription::connect(source, &topics, config.handshake_timeout).await {
            Ok(subscription) => return subscription,
            Err(e) => {
                debug!(error = %e, retry_in = ?backoff, "Bus source not ready");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(config.max_backoff);
            }
        }
    }
}

#[instrument(skip(aggregator, config), fields(topic = %aggregator.topic()))]
async fn feed(aggregator: Arc<TopicAggregator>, source: String, config: FeedConfig) {
    let mut subscription = subscribe(aggregator.topic(), &source, &config).await;

    if aggregator.confirm_subscription(&source).await {
        info!("Subscription confirmed");
    }

    loop {
        match subscription.recv().await {
            Ok(Some(message)) => match message.into_segment() {
                Ok(segment) => {
                    aggregator.record(&segment).await;
                }
                Err(e) => warn!(error = %e, "Dropping malformed message"),
            },
            Ok(None) => {
                info!("Bus source closed");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Bus feed broken");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docflow_bus::BusPublisher;

    async fn wait_until<F, Fut>(mut check: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..200 {
            if check().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_feed_confirms_and_counts() {
        let publisher = BusPublisher::bind("127.0.0.1:0").await.unwrap();
        let source = publisher.local_addr().to_string();
        let aggregator = Arc::new(TopicAggregator::new("Sport", [source.clone()]));

        let handles = spawn_feeds(Arc::clone(&aggregator), &[source], FeedConfig::default());

        let agg = Arc::clone(&aggregator);
        wait_until(move || {
            let agg = Arc::clone(&agg);
            async move { agg.is_ready().await }
        })
        .await;

        publisher.publish("Music", "# Music\nla la\n".into()).unwrap();
        publisher.publish("Sport", "# Sport\nGoal!\n".into()).unwrap();

        let agg = Arc::clone(&aggregator);
        wait_until(move || {
            let agg = Arc::clone(&agg);
            async move { agg.metrics().await.segment_count == 1 }
        })
        .await;

        let snapshot = aggregator.metrics().await;
        assert_eq!(snapshot.metrics.line_count, 2);
        assert_eq!(snapshot.metrics.word_count, 3);

        publisher.shutdown();
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_feed_waits_for_late_publisher() {
        // reserve a port, then release it so the first attempts fail
        let probe = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = probe.local_addr().unwrap();
        drop(probe);

        let source = addr.to_string();
        let aggregator = Arc::new(TopicAggregator::new("Sport", [source.clone()]));
        let _handles = spawn_feeds(Arc::clone(&aggregator), &[source], FeedConfig::default());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!aggregator.is_ready().await);

        let _publisher = BusPublisher::bind(addr).await.unwrap();

        let agg = Arc::clone(&aggregator);
        wait_until(move || {
            let agg = Arc::clone(&agg);
            async move { agg.is_ready().await }
        })
        .await;
    }
}
