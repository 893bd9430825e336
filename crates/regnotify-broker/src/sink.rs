//! Subscriber delivery channels.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

static NEXT_SINK_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a subscriber, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SinkId(u64);

impl SinkId {
    fn next() -> Self {
        Self(NEXT_SINK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sink-{}", self.0)
    }
}

/// The sending half of a subscriber's channel, tagged with its identity.
///
/// A sink handed to [`Broker::subscribe`](crate::Broker::subscribe) is owned
/// by the broker from then on. Clones share the identity, so subscribing a
/// clone of an already registered sink changes nothing.
///
/// The receiving half yields `None` once the broker has dropped its copy
/// (on unsubscribe, or when the broker stops) and no clone remains.
pub struct Sink<T> {
    id: SinkId,
    tx: mpsc::Sender<T>,
}

impl<T> Sink<T> {
    /// Wraps an existing sender under a fresh identity.
    pub fn new(tx: mpsc::Sender<T>) -> Self {
        Self {
            id: SinkId::next(),
            tx,
        }
    }

    /// Creates a bounded channel and returns its sink and receiver.
    ///
    /// `capacity` is how many undelivered messages the subscriber may fall
    /// behind before it starts missing messages.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<T>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    pub fn id(&self) -> SinkId {
        self.id
    }

    pub(crate) fn into_parts(self) -> (SinkId, mpsc::Sender<T>) {
        (self.id, self.tx)
    }
}

impl<T> Clone for Sink<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            tx: self.tx.clone(),
        }
    }
}

impl<T> fmt::Debug for Sink<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink")
            .field("id", &self.id)
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}
