//! Broker control loop and handle.

use std::collections::HashMap;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, trace};

use crate::{BrokerConfig, BrokerError, Sink, SinkId};

/// Requests handled by the control loop, in arrival order.
enum Command<T> {
    Subscribe(Sink<T>),
    Unsubscribe(SinkId),
    Publish(T),
    Count(oneshot::Sender<usize>),
}

/// Handle for talking to a broker's control loop.
///
/// Created together with its [`BrokerLoop`] by [`Broker::new`]. Share the
/// handle behind an `Arc`; run the loop on a task of its own. Commands sent
/// before the loop runs wait in the command channel.
pub struct Broker<T> {
    tx: mpsc::Sender<Command<T>>,
    stop_tx: watch::Sender<bool>,
}

/// The control loop of a [`Broker`]. It owns the subscriber set.
pub struct BrokerLoop<T> {
    inbox: mpsc::Receiver<Command<T>>,
    stop_rx: watch::Receiver<bool>,
}

impl<T: Clone + Send + 'static> Broker<T> {
    pub fn new(config: BrokerConfig) -> (Self, BrokerLoop<T>) {
        let (tx, inbox) = mpsc::channel(config.command_buffer.max(1));
        let (stop_tx, stop_rx) = watch::channel(false);
        (Self { tx, stop_tx }, BrokerLoop { inbox, stop_rx })
    }

    /// Signals the control loop to exit. Safe to call more than once.
    ///
    /// Commands still queued are discarded. When the loop exits it drops
    /// every registered sink, so subscribers see their channel close.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Registers a sink for every message published after this command is
    /// handled.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Stopped`] once the broker is stopped.
    pub async fn subscribe(&self, sink: Sink<T>) -> Result<(), BrokerError> {
        self.send(Command::Subscribe(sink)).await
    }

    /// Removes a sink and closes its channel. Unknown IDs are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Stopped`] once the broker is stopped.
    pub async fn unsubscribe(&self, id: SinkId) -> Result<(), BrokerError> {
        self.send(Command::Unsubscribe(id)).await
    }

    /// Queues a message for delivery to the current subscribers.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Stopped`] once the broker is stopped.
    pub async fn publish(&self, msg: T) -> Result<(), BrokerError> {
        self.send(Command::Publish(msg)).await
    }

    /// Number of registered sinks once every earlier command is handled.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Stopped`] once the broker is stopped, or if it
    /// stops before answering.
    pub async fn subscriber_count(&self) -> Result<usize, BrokerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Count(reply_tx)).await?;
        reply_rx.await.map_err(|_| BrokerError::Stopped)
    }

    async fn send(&self, command: Command<T>) -> Result<(), BrokerError> {
        if self.is_stopped() {
            return Err(BrokerError::Stopped);
        }
        self.tx.send(command).await.map_err(|_| BrokerError::Stopped)
    }
}

impl<T: Clone + Send + 'static> BrokerLoop<T> {
    /// Runs until the broker is stopped.
    pub async fn run(mut self) {
        debug!("broker started");

        let mut sinks: HashMap<SinkId, mpsc::Sender<T>> = HashMap::new();
        loop {
            tokio::select! {
                biased;
                _ = self.stop_rx.wait_for(|stopped| *stopped) => break,
                command = self.inbox.recv() => match command {
                    Some(Command::Subscribe(sink)) => {
                        let (id, tx) = sink.into_parts();
                        trace!(sink = %id, "subscribing");
                        sinks.entry(id).or_insert(tx);
                    }
                    Some(Command::Unsubscribe(id)) => {
                        if sinks.remove(&id).is_some() {
                            trace!(sink = %id, "unsubscribed");
                        }
                    }
                    Some(Command::Publish(msg)) => fan_out(&mut sinks, msg),
                    Some(Command::Count(reply)) => {
                        let _ = reply.send(sinks.len());
                    }
                    // Every handle is gone.
                    None => break,
                },
            }
        }

        debug!(subscribers = sinks.len(), "broker stopped");
    }
}

/// Offers `msg` to every sink without waiting.
///
/// Full sinks miss the message. Sinks whose receiver is gone are dropped.
fn fan_out<T: Clone>(sinks: &mut HashMap<SinkId, mpsc::Sender<T>>, msg: T) {
    sinks.retain(|id, tx| match tx.try_send(msg.clone()) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            trace!(sink = %id, "sink buffer full, message dropped");
            true
        }
        Err(TrySendError::Closed(_)) => {
            trace!(sink = %id, "sink receiver gone, removing");
            false
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fan_out_prunes_closed_sinks() {
        let mut sinks = HashMap::new();
        let (open, mut open_rx) = Sink::<u32>::channel(4);
        let (closed, closed_rx) = Sink::<u32>::channel(4);
        drop(closed_rx);

        let (open_id, open_tx) = open.into_parts();
        let (closed_id, closed_tx) = closed.into_parts();
        sinks.insert(open_id, open_tx);
        sinks.insert(closed_id, closed_tx);

        fan_out(&mut sinks, 1);

        assert!(sinks.contains_key(&open_id));
        assert!(!sinks.contains_key(&closed_id));
        assert_eq!(open_rx.try_recv().ok(), Some(1));
    }

    #[test]
    fn fan_out_keeps_full_sinks() {
        let mut sinks = HashMap::new();
        let (sink, mut rx) = Sink::<u32>::channel(1);
        let (id, tx) = sink.into_parts();
        sinks.insert(id, tx);

        fan_out(&mut sinks, 1);
        fan_out(&mut sinks, 2);

        assert!(sinks.contains_key(&id));
        assert_eq!(rx.try_recv().ok(), Some(1));
        assert!(rx.try_recv().is_err(), "second message should have been dropped");
    }

    #[tokio::test]
    async fn stop_before_run_rejects_everything() {
        let (broker, control) = Broker::<u32>::new(BrokerConfig::default());
        broker.stop();
        broker.stop();

        // Exits at once instead of waiting for commands.
        control.run().await;
        assert_eq!(broker.publish(1).await, Err(BrokerError::Stopped));
        assert_eq!(broker.subscriber_count().await, Err(BrokerError::Stopped));
    }

    #[tokio::test]
    async fn loop_exits_when_every_handle_is_dropped() {
        let (broker, control) = Broker::<u32>::new(BrokerConfig::default());
        let task = tokio::spawn(control.run());
        drop(broker);
        tokio::time::timeout(std::time::Duration::from_secs(2), task)
            .await
            .expect("loop should exit")
            .expect("loop should not panic");
    }
}
