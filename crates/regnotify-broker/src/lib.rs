//! In-process publish/subscribe broker.
//!
//! [`Broker::new`] returns a handle and a [`BrokerLoop`]. The loop is the
//! single task that owns the set of live subscribers. Every operation
//! (subscribe, unsubscribe, publish) is a command on one bounded, ordered
//! channel, so no lock guards the subscriber set.
//!
//! Delivery is best effort: each message is offered to every subscriber
//! with a non-blocking send. A subscriber whose buffer is full misses that
//! message; nobody else is slowed down by it.
//!
//! The broker knows nothing about the messages it carries. The server uses
//! it with registry events, the tests with plain integers.

mod broker;
mod config;
mod error;
mod sink;

pub use broker::{Broker, BrokerLoop};
pub use config::BrokerConfig;
pub use error::BrokerError;
pub use sink::{Sink, SinkId};
