//! Subscribing side of the bus

use std::collections::HashSet;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info};

use docflow_domain::document::TopicSegment;

use crate::error::{BusError, Result};
use crate::frame::{read_frame, write_frame, Frame};

/// One message received from a publisher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Routing key (the topic name)
    pub key: String,
    pub payload: Bytes,
}

impl BusMessage {
    /// Turn the message into a topic segment
    ///
    /// The source document is not carried on the wire.
    ///
    /// # Errors
    ///
    /// Returns `BusError::MalformedFrame` if the payload is not UTF-8 text.
    pub fn into_segment(self) -> Result<TopicSegment> {
        let content = String::from_utf8(self.payload.to_vec())
            .map_err(|_| BusError::malformed(format!("payload for {} is not UTF-8", self.key)))?;
        Ok(TopicSegment::new(self.key, content, None))
    }
}

/// Subscription to one publisher
///
/// Created by `connect`, which only returns once the publisher acknowledged
/// the subscription. Messages published after that point are delivered unless
/// the connection breaks or this subscriber falls too far behind.
pub struct BusSubscription {
    source: String,
    topics: HashSet<String>,
    reader: BufReader<OwnedReadHalf>,
    // dropping the write half would half-close the connection
    _writer: OwnedWriteHalf,
}

impl BusSubscription {
    /// Connect to the publisher at `addr` and subscribe to `topics`
    ///
    /// # Errors
    ///
    /// - `BusError::Io` if the publisher cannot be reached
    /// - `BusError::HandshakeTimeout` if no ack arrives within `handshake_timeout`
    /// - `BusError::HandshakeRejected` if the publisher answers with anything
    ///   other than an ack for exactly the requested topics
    pub async fn connect(addr: &str, topics: &[String], handshake_timeout: Duration) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        write_frame(&mut writer, &Frame::Subscribe(topics.to_vec())).await?;

        let answer = tokio::time::timeout(handshake_timeout, read_frame(&mut reader))
            .await
            .map_err(|_| BusError::HandshakeTimeout(handshake_timeout))??;

        let requested: HashSet<String> = topics.iter().cloned().collect();
        match answer {
            Some(Frame::Ack(acked)) => {
                let acked: HashSet<String> = acked.into_iter().collect();
                if acked != requested {
                    return Err(BusError::rejected(format!(
                        "acknowledged {:?}, requested {:?}",
                        acked, requested
                    )));
                }
            }
            Some(other) => {
                return Err(BusError::rejected(format!("unexpected frame tag {}", other.tag())));
            }
            None => return Err(BusError::rejected("connection closed before ack")),
        }

        info!(source = addr, topics = ?topics, "Subscribed to publisher");

        Ok(Self {
            source: addr.to_string(),
            topics: requested,
            reader,
            _writer: writer,
        })
    }

    /// Address of the publisher this subscription is connected to
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Wait for the next message whose key is one of the subscribed topics
    ///
    /// Returns `Ok(None)` once the publisher closes the connection.
    pub async fn recv(&mut self) -> Result<Option<BusMessage>> {
        loop {
            match read_frame(&mut self.reader).await? {
                Some(Frame::Message { key, payload }) => {
                    if self.topics.contains(&key) {
                        return Ok(Some(BusMessage { key, payload }));
                    }
                    debug!(source = %self.source, key = %key, "Ignoring message for another topic");
                }
                Some(other) => {
                    debug!(source = %self.source, tag = other.tag(), "Ignoring unexpected frame");
                }
                None => return Ok(None),
            }
        }
    }
}
