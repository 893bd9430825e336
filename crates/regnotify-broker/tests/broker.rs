use std::sync::Arc;
use std::time::Duration;

use regnotify_broker::{Broker, BrokerConfig, BrokerError, Sink};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);

fn spawn_broker() -> (Arc<Broker<u32>>, JoinHandle<()>) {
    let (broker, control) = Broker::new(BrokerConfig::default());
    (Arc::new(broker), tokio::spawn(control.run()))
}

async fn recv(rx: &mut mpsc::Receiver<u32>) -> Option<u32> {
    timeout(WAIT, rx.recv()).await.expect("timed out waiting for message")
}

#[tokio::test]
async fn published_messages_reach_every_subscriber() {
    let (broker, _handle) = spawn_broker();
    let (a, mut rx_a) = Sink::channel(8);
    let (b, mut rx_b) = Sink::channel(8);
    broker.subscribe(a).await.unwrap();
    broker.subscribe(b).await.unwrap();

    broker.publish(42).await.unwrap();

    assert_eq!(recv(&mut rx_a).await, Some(42));
    assert_eq!(recv(&mut rx_b).await, Some(42));
}

#[tokio::test]
async fn unsubscribe_closes_only_that_sink() {
    let (broker, _handle) = spawn_broker();
    let (a, mut rx_a) = Sink::channel(8);
    let (b, mut rx_b) = Sink::channel(8);
    let b_id = b.id();
    broker.subscribe(a).await.unwrap();
    broker.subscribe(b).await.unwrap();

    broker.unsubscribe(b_id).await.unwrap();
    broker.publish(7).await.unwrap();

    assert_eq!(recv(&mut rx_a).await, Some(7));
    assert_eq!(recv(&mut rx_b).await, None, "unsubscribed sink should be closed");
}

#[tokio::test]
async fn unknown_unsubscribe_is_ignored() {
    let (broker, _handle) = spawn_broker();
    let (a, mut rx_a) = Sink::channel(8);
    let (stranger, _rx_stranger) = Sink::<u32>::channel(8);
    broker.subscribe(a).await.unwrap();

    broker.unsubscribe(stranger.id()).await.unwrap();
    broker.publish(1).await.unwrap();

    assert_eq!(recv(&mut rx_a).await, Some(1));
}

#[tokio::test]
async fn slow_subscriber_does_not_block_others() {
    let (broker, _handle) = spawn_broker();
    let (slow, mut rx_slow) = Sink::channel(1);
    let (fast, mut rx_fast) = Sink::channel(8);
    broker.subscribe(slow).await.unwrap();
    broker.subscribe(fast).await.unwrap();

    for n in 1..=3 {
        broker.publish(n).await.unwrap();
    }

    for n in 1..=3 {
        assert_eq!(recv(&mut rx_fast).await, Some(n));
    }
    // All three publishes were handled; the slow sink kept only the first.
    assert_eq!(rx_slow.try_recv().ok(), Some(1));
    assert!(rx_slow.try_recv().is_err());
}

#[tokio::test]
async fn subscribing_twice_delivers_once() {
    let (broker, _handle) = spawn_broker();
    let (sink, mut rx) = Sink::channel(8);
    broker.subscribe(sink.clone()).await.unwrap();
    broker.subscribe(sink).await.unwrap();

    broker.publish(5).await.unwrap();
    broker.publish(6).await.unwrap();

    assert_eq!(recv(&mut rx).await, Some(5));
    assert_eq!(recv(&mut rx).await, Some(6));
    assert!(rx.try_recv().is_err(), "each message should arrive exactly once");
}

#[tokio::test]
async fn messages_arrive_in_publish_order() {
    let (broker, _handle) = spawn_broker();
    let (sink, mut rx) = Sink::channel(64);
    broker.subscribe(sink).await.unwrap();

    for n in 0..50 {
        broker.publish(n).await.unwrap();
    }
    for n in 0..50 {
        assert_eq!(recv(&mut rx).await, Some(n));
    }
}

#[tokio::test]
async fn commands_before_run_are_queued() {
    let (broker, control) = Broker::<u32>::new(BrokerConfig::default());
    let (sink, mut rx) = Sink::channel(8);
    broker.subscribe(sink).await.unwrap();
    broker.publish(9).await.unwrap();

    tokio::spawn(control.run());

    assert_eq!(recv(&mut rx).await, Some(9));
}

#[tokio::test]
async fn subscriber_only_sees_messages_after_subscribing() {
    let (broker, _handle) = spawn_broker();
    broker.publish(1).await.unwrap();

    let (sink, mut rx) = Sink::channel(8);
    broker.subscribe(sink).await.unwrap();
    broker.publish(2).await.unwrap();

    assert_eq!(recv(&mut rx).await, Some(2));
}

#[tokio::test]
async fn dropped_receiver_does_not_disturb_others() {
    let (broker, _handle) = spawn_broker();
    let (gone, rx_gone) = Sink::channel(8);
    let (kept, mut rx_kept) = Sink::channel(8);
    broker.subscribe(gone).await.unwrap();
    broker.subscribe(kept).await.unwrap();
    drop(rx_gone);

    broker.publish(1).await.unwrap();
    broker.publish(2).await.unwrap();

    assert_eq!(recv(&mut rx_kept).await, Some(1));
    assert_eq!(recv(&mut rx_kept).await, Some(2));
}

#[tokio::test]
async fn stop_ends_the_loop_and_closes_sinks() {
    let (broker, handle) = spawn_broker();
    let (sink, mut rx) = Sink::channel(8);
    broker.subscribe(sink).await.unwrap();
    broker.publish(1).await.unwrap();
    assert_eq!(recv(&mut rx).await, Some(1));

    broker.stop();
    timeout(WAIT, handle)
        .await
        .expect("loop should exit after stop")
        .expect("loop task should not panic");

    assert_eq!(recv(&mut rx).await, None, "sinks close when the loop exits");
    assert_eq!(broker.publish(2).await, Err(BrokerError::Stopped));
    let (late, _rx_late) = Sink::channel(1);
    assert_eq!(broker.subscribe(late).await, Err(BrokerError::Stopped));
    assert!(broker.is_stopped());
}

#[tokio::test]
async fn subscriber_count_follows_subscriptions() {
    let (broker, _handle) = spawn_broker();
    assert_eq!(broker.subscriber_count().await, Ok(0));

    let (a, _rx_a) = Sink::<u32>::channel(8);
    let (b, rx_b) = Sink::<u32>::channel(8);
    let a_id = a.id();
    broker.subscribe(a.clone()).await.unwrap();
    broker.subscribe(a).await.unwrap();
    broker.subscribe(b).await.unwrap();
    assert_eq!(broker.subscriber_count().await, Ok(2));

    broker.unsubscribe(a_id).await.unwrap();
    assert_eq!(broker.subscriber_count().await, Ok(1));

    // A sink whose receiver is gone is pruned on the next publish.
    drop(rx_b);
    broker.publish(1).await.unwrap();
    assert_eq!(broker.subscriber_count().await, Ok(0));

    broker.stop();
    assert_eq!(broker.subscriber_count().await, Err(BrokerError::Stopped));
}
