//! Publishing side of the bus

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use docflow_domain::document::TopicSegment;
use docflow_domain::ports::SegmentPublisher;
use docflow_domain::processor::PublishError;

use crate::error::{BusError, Result};
use crate::frame::{read_frame, write_frame, Frame};

/// Publisher tuning
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Messages buffered per subscriber before new ones are dropped (default: 1024)
    pub channel_capacity: usize,
    /// How long a new connection may take to send its SUBSCRIBE frame (default: 10s)
    pub handshake_timeout: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

struct Subscriber {
    peer: SocketAddr,
    topics: HashSet<String>,
    sender: mpsc::Sender<Bytes>,
}

struct Shared {
    subscribers: DashMap<u64, Subscriber>,
    next_id: AtomicU64,
    closed: AtomicBool,
    config: PublisherConfig,
}

/// TCP publisher
///
/// Accepts subscriber connections and forwards each published message to the
/// subscribers whose topic set contains its key. Publishing never blocks: every
/// subscriber has a bounded queue, and a message that does not fit is dropped
/// for that subscriber. Nothing is buffered for subscribers that connect later.
pub struct BusPublisher {
    shared: Arc<Shared>,
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
}

impl BusPublisher {
    /// Bind the publisher with the default configuration
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
        Self::bind_with_config(addr, PublisherConfig::default()).await
    }

    pub async fn bind_with_config(addr: impl ToSocketAddrs, config: PublisherConfig) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        let shared = Arc::new(Shared {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            config,
        });

        let accept_task = tokio::spawn(accept_loop(listener, shared.clone()));
        info!(addr = %local_addr, "Bus publisher listening");

        Ok(Self {
            shared,
            local_addr,
            accept_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of subscribers whose subscription has been acknowledged
    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.len()
    }

    /// Publish `payload` under routing key `key`
    ///
    /// Returns the number of subscribers the message was queued for. Zero is
    /// not an error.
    ///
    /// # Errors
    ///
    /// - `BusError::Closed` after `shutdown`
    /// - `BusError::FrameTooLarge` if the key or payload exceeds the part limit
    pub fn publish(&self, key: &str, payload: Bytes) -> Result<usize> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(BusError::Closed);
        }

        let frame = Frame::Message {
            key: key.to_string(),
            payload,
        }
        .encode()?;

        let mut delivered = 0;
        let mut gone = Vec::new();

        for entry in self.shared.subscribers.iter() {
            let subscriber = entry.value();
            if !subscriber.topics.contains(key) {
                continue;
            }
            match subscriber.sender.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(peer = %subscriber.peer, key = key, "Subscriber queue full, message dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => gone.push(*entry.key()),
            }
        }

        // removed after iterating; DashMap shards are locked during iteration
        for id in gone {
            self.shared.subscribers.remove(&id);
        }

        debug!(key = key, delivered = delivered, "Published message");
        Ok(delivered)
    }

    /// Stop accepting subscribers and disconnect the existing ones
    pub fn shutdown(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.accept_task.abort();
        self.shared.subscribers.clear();
        info!(addr = %self.local_addr, "Bus publisher shut down");
    }
}

impl Drop for BusPublisher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl SegmentPublisher for BusPublisher {
    fn publish(&self, segment: &TopicSegment) -> std::result::Result<usize, PublishError> {
        BusPublisher::publish(self, &segment.topic, Bytes::from(segment.content.clone())).map_err(
            |e| match e {
                BusError::Closed => PublishError::Closed,
                other => PublishError::Rejected(other.to_string()),
            },
        )
    }
}

async fn accept_loop(listener: TcpListener, shared: Arc<Shared>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tokio::spawn(serve_subscriber(stream, peer, shared.clone()));
            }
            Err(e) => {
                warn!(error = %e, "Failed to accept subscriber connection");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

/// Handshake, then forward queued messages until either side goes away
async fn serve_subscriber(stream: TcpStream, peer: SocketAddr, shared: Arc<Shared>) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(peer = %peer, error = %e, "Could not set TCP_NODELAY");
    }
    let (mut reader, mut writer) = stream.into_split();

    let topics = match tokio::time::timeout(shared.config.handshake_timeout, read_frame(&mut reader)).await {
        Ok(Ok(Some(Frame::Subscribe(topics)))) => topics,
        Ok(Ok(Some(other))) => {
            warn!(peer = %peer, tag = other.tag(), "Expected SUBSCRIBE, closing connection");
            return;
        }
        Ok(Ok(None)) => return,
        Ok(Err(e)) => {
            warn!(peer = %peer, error = %e, "Invalid subscription frame");
            return;
        }
        Err(_) => {
            warn!(peer = %peer, "Subscriber did not subscribe in time");
            return;
        }
    };

    let (sender, mut receiver) = mpsc::channel(shared.config.channel_capacity.max(1));
    let id = shared.next_id.fetch_add(1, Ordering::Relaxed);

    // registered before the ack goes out: once the subscriber reads the ack,
    // every later publish reaches it
    shared.subscribers.insert(
        id,
        Subscriber {
            peer,
            topics: topics.iter().cloned().collect(),
            sender,
        },
    );

    if let Err(e) = write_frame(&mut writer, &Frame::Ack(topics.clone())).await {
        warn!(peer = %peer, error = %e, "Failed to acknowledge subscription");
        shared.subscribers.remove(&id);
        return;
    }
    info!(peer = %peer, topics = ?topics, "Subscriber registered");

    // subscribers send nothing after SUBSCRIBE; reading only detects disconnects
    let mut closed = tokio::spawn(async move {
        loop {
            match read_frame(&mut reader).await {
                Ok(Some(_)) => continue,
                Ok(None) | Err(_) => break,
            }
        }
    });

    loop {
        tokio::select! {
            outgoing = receiver.recv() => match outgoing {
                Some(bytes) => {
                    if let Err(e) = writer.write_all(&bytes).await {
                        debug!(peer = %peer, error = %e, "Write to subscriber failed");
                        break;
                    }
                }
                None => break,
            },
            _ = &mut closed => {
                debug!(peer = %peer, "Subscriber disconnected");
                break;
            }
        }
    }

    closed.abort();
    shared.subscribers.remove(&id);
    let _ = writer.shutdown().await;
    debug!(peer = %peer, "Subscriber connection closed");
}
