//! # docflow Broadcast Bus
//!
//! Lossy publish/subscribe transport between Document Processors (publishers)
//! and Topic Aggregators (subscribers), over plain TCP.
//!
//! - Each processor binds one `BusPublisher`.
//! - Each aggregator opens one `BusSubscription` per processor, for its topic.
//! - A subscription starts with a SUBSCRIBE/ACK handshake. The publisher
//!   registers the subscriber before it sends the ack, so anything published
//!   after `BusSubscription::connect` returns is routed to it.
//! - Delivery is at most once. Messages published before the handshake, or
//!   that overflow a slow subscriber's queue, are gone.
//!
//! ## Example
//!
//! ```rust,no_run
//! # use std::time::Duration;
//! # use docflow_bus::{BusPublisher, BusSubscription};
//! # async fn example() -> docflow_bus::Result<()> {
//! let publisher = BusPublisher::bind("127.0.0.1:0").await?;
//! let addr = publisher.local_addr().to_string();
//!
//! let mut subscription =
//!     BusSubscription::connect(&addr, &["Sport".to_string()], Duration::from_secs(5)).await?;
//!
//! publisher.publish("Sport", "# Sport\nGoal!\n".into())?;
//! let message = subscription.recv().await?;
//! # Ok(())
//! # }
//! ```

mod error;
pub mod frame;
mod publisher;
mod subscriber;

pub use error::{BusError, Result};
pub use publisher::{BusPublisher, PublisherConfig};
pub use subscriber::{BusMessage, BusSubscription};
