//! Topic Aggregator service

use std::collections::HashSet;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{AggregatorPhase, AggregatorSnapshot};
use crate::analytics::{analyze_content, Metrics};
use crate::document::TopicSegment;

struct AggregatorState {
    phase: AggregatorPhase,
    totals: Metrics,
    segment_count: u64,
    /// Bus sources that have not acknowledged the subscription yet
    pending_sources: HashSet<String>,
}

/// Running metrics total for one topic
///
/// All mutation goes through one mutex, so the aggregator is the single
/// writer of its totals. Totals only depend on the set of segments received:
/// addition is commutative and associative, so arrival order does not matter.
/// A segment lost on the bus simply never gets counted.
pub struct TopicAggregator {
    topic: String,
    state: Mutex<AggregatorState>,
}

impl TopicAggregator {
    /// Create an aggregator waiting on the given bus sources
    pub fn new(topic: impl Into<String>, sources: impl IntoIterator<Item = String>) -> Self {
        let pending_sources: HashSet<String> = sources.into_iter().collect();
        let phase = if pending_sources.is_empty() {
            AggregatorPhase::Subscribed
        } else {
            AggregatorPhase::Subscribing
        };

        Self {
            topic: topic.into(),
            state: Mutex::new(AggregatorState {
                phase,
                totals: Metrics::zero(),
                segment_count: 0,
                pending_sources,
            }),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Record that `source` acknowledged the subscription
    ///
    /// Returns `true` once every source has acknowledged.
    pub async fn confirm_subscription(&self, source: &str) -> bool {
        let mut state = self.state.lock().await;

        if state.pending_sources.remove(source) {
            debug!(topic = %self.topic, source = source, "Subscription acknowledged");
        }

        let ready = state.pending_sources.is_empty();
        if ready && state.phase == AggregatorPhase::Subscribing {
            state.phase = AggregatorPhase::Subscribed;
            info!(topic = %self.topic, "All bus subscriptions acknowledged");
        }
        ready
    }

    /// Whether every bus source has acknowledged the subscription
    pub async fn is_ready(&self) -> bool {
        self.state.lock().await.pending_sources.is_empty()
    }

    /// Count one segment
    ///
    /// Segments for another topic are ignored and `false` is returned.
    pub async fn record(&self, segment: &TopicSegment) -> bool {
        if segment.topic != self.topic {
            debug!(
                topic = %self.topic,
                received = %segment.topic,
                "Ignoring segment for another topic"
            );
            return false;
        }

        let metrics = analyze_content(&segment.content);
        let mut state = self.state.lock().await;

        match state.phase {
            AggregatorPhase::Drained => {
                warn!(topic = %self.topic, "Segment arrived after final collection");
            }
            _ => state.phase = AggregatorPhase::Accumulating,
        }

        state.totals += metrics;
        state.segment_count += 1;

        debug!(
            topic = %self.topic,
            lines = state.totals.line_count,
            words = state.totals.word_count,
            chars = state.totals.char_count,
            segments = state.segment_count,
            "Updated topic totals"
        );
        true
    }

    /// Current totals; does not change state
    pub async fn metrics(&self) -> AggregatorSnapshot {
        let state = self.state.lock().await;
        self.snapshot(&state)
    }

    /// Final totals; moves the aggregator to `Drained`
    pub async fn drain(&self) -> AggregatorSnapshot {
        let mut state = self.state.lock().await;
        state.phase = AggregatorPhase::Drained;
        info!(
            topic = %self.topic,
            segments = state.segment_count,
            "Aggregator drained"
        );
        self.snapshot(&state)
    }

    fn snapshot(&self, state: &AggregatorState) -> AggregatorSnapshot {
        AggregatorSnapshot {
            topic: self.topic.clone(),
            metrics: state.totals,
            segment_count: state.segment_count,
            phase: state.phase,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(topic: &str, content: &str) -> TopicSegment {
        TopicSegment::new(topic, content, None)
    }

    #[tokio::test]
    async fn test_new_aggregator_starts_empty() {
        let aggregator = TopicAggregator::new("Test Topic", Vec::new());
        let snapshot = aggregator.metrics().await;

        assert_eq!(snapshot.topic, "Test Topic");
        assert_eq!(snapshot.metrics, Metrics::zero());
        assert_eq!(snapshot.segment_count, 0);
        assert_eq!(snapshot.phase, AggregatorPhase::Subscribed);
    }

    #[tokio::test]
    async fn test_record_accumulates() {
        let aggregator = TopicAggregator::new("Sport", Vec::new());

        assert!(aggregator.record(&segment("Sport", "# Sport\ngoal\n")).await);
        assert!(aggregator.record(&segment("Sport", "# Sport\none two three\n")).await);

        let snapshot = aggregator.metrics().await;
        assert_eq!(snapshot.metrics, Metrics::new(4, 8, 31));
        assert_eq!(snapshot.segment_count, 2);
        assert_eq!(snapshot.phase, AggregatorPhase::Accumulating);
    }

    #[tokio::test]
    async fn test_other_topics_are_ignored() {
        let aggregator = TopicAggregator::new("Sport", Vec::new());

        assert!(!aggregator.record(&segment("Music", "# Music\nsong\n")).await);
        // exact match only
        assert!(!aggregator.record(&segment("sport", "# sport\ngoal\n")).await);

        assert_eq!(aggregator.metrics().await.segment_count, 0);
    }

    #[tokio::test]
    async fn test_order_does_not_change_totals() {
        let segments = vec![
            segment("T", "# T\na b c\n"),
            segment("T", "# T\n\nd\n"),
            segment("T", "# T\nefgh ij\nk\n"),
        ];

        let forward = TopicAggregator::new("T", Vec::new());
        for s in &segments {
            forward.record(s).await;
        }

        let backward = TopicAggregator::new("T", Vec::new());
        for s in segments.iter().rev() {
            backward.record(s).await;
        }

        let shuffled = TopicAggregator::new("T", Vec::new());
        for index in [1, 2, 0] {
            shuffled.record(&segments[index]).await;
        }

        let expected = forward.metrics().await.metrics;
        assert_eq!(backward.metrics().await.metrics, expected);
        assert_eq!(shuffled.metrics().await.metrics, expected);
    }

    #[tokio::test]
    async fn test_readiness_waits_for_every_source() {
        let aggregator = TopicAggregator::new(
            "T",
            vec!["10.0.0.1:7000".to_string(), "10.0.0.2:7000".to_string()],
        );

        assert!(!aggregator.is_ready().await);
        assert_eq!(aggregator.metrics().await.phase, AggregatorPhase::Subscribing);

        assert!(!aggregator.confirm_subscription("10.0.0.1:7000").await);
        assert!(!aggregator.is_ready().await);

        assert!(aggregator.confirm_subscription("10.0.0.2:7000").await);
        assert!(aggregator.is_ready().await);
        assert_eq!(aggregator.metrics().await.phase, AggregatorPhase::Subscribed);
    }

    #[tokio::test]
    async fn test_metrics_does_not_reset() {
        let aggregator = TopicAggregator::new("T", Vec::new());
        aggregator.record(&segment("T", "# T\nx\n")).await;

        let first = aggregator.metrics().await;
        let second = aggregator.metrics().await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_drain_then_late_segment_still_counted() {
        let aggregator = TopicAggregator::new("T", Vec::new());
        aggregator.record(&segment("T", "# T\nx\n")).await;

        let drained = aggregator.drain().await;
        assert_eq!(drained.phase, AggregatorPhase::Drained);
        assert_eq!(drained.segment_count, 1);

        aggregator.record(&segment("T", "# T\ny\n")).await;
        let after = aggregator.metrics().await;
        assert_eq!(after.phase, AggregatorPhase::Drained);
        assert_eq!(after.segment_count, 2);
    }
}
