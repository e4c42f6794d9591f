//! Broker behaviour with many connections and concurrent callers.

use std::collections::HashSet;
use std::sync::Arc;

use courier_broker::{
    Broker, DEFAULT_OUTBOUND_CAPACITY, OutboundReceiver, outbound_channel,
};
use courier_protocol::{Command, Frame};
use courier_transport::ConnectionId;

fn cid(id: u64) -> ConnectionId {
    ConnectionId::new(id)
}

fn connect(broker: &Broker, id: u64) -> OutboundReceiver {
    connect_with_capacity(broker, id, DEFAULT_OUTBOUND_CAPACITY)
}

fn connect_with_capacity(
    broker: &Broker,
    id: u64,
    capacity: usize,
) -> OutboundReceiver {
    let (tx, rx) = outbound_channel(capacity);
    broker.register(cid(id), tx);
    rx
}

fn drain(rx: &mut OutboundReceiver) -> Vec<Frame> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(frame);
    }
    frames
}

fn message(topic: &str, body: &str) -> Frame {
    Frame::new(Command::Message)
        .with_header("destination", topic)
        .with_body(body)
}

// =========================================================================
// Fan-out
// =========================================================================

#[test]
fn test_broadcast_delivers_one_copy_per_subscriber_with_own_ids() {
    let broker = Broker::new();
    let mut receivers: Vec<_> = (1..=5).map(|i| connect(&broker, i)).collect();
    for i in 1..=5 {
        broker.subscribe("/topic/x", cid(i), &format!("sub-{i}"));
    }
    // Not subscribed: must receive nothing.
    let mut bystander = connect(&broker, 6);

    let delivered = broker.broadcast("/topic/x", &message("/topic/x", "hi"));
    assert_eq!(delivered, 5);

    let mut message_ids = HashSet::new();
    for (i, rx) in receivers.iter_mut().enumerate() {
        let frames = drain(rx);
        assert_eq!(frames.len(), 1, "subscriber {} got {:?}", i + 1, frames);
        let frame = &frames[0];
        assert_eq!(frame.command(), &Command::Message);
        assert_eq!(frame.header("destination"), Some("/topic/x"));
        let expected = format!("sub-{}", i + 1);
        assert_eq!(frame.header("subscription"), Some(expected.as_str()));
        assert_eq!(frame.body(), "hi");
        message_ids.insert(frame.header("message-id").unwrap().to_string());
    }
    assert_eq!(message_ids.len(), 5, "message ids must be unique per copy");
    assert!(drain(&mut bystander).is_empty());
}

#[test]
fn test_broadcast_skips_subscriber_whose_writer_is_gone() {
    let broker = Broker::new();
    let mut alive = connect(&broker, 1);
    let gone = connect(&broker, 2);
    broker.subscribe("/t", cid(1), "a");
    broker.subscribe("/t", cid(2), "b");
    drop(gone);

    assert_eq!(broker.broadcast("/t", &message("/t", "x")), 1);
    assert_eq!(drain(&mut alive).len(), 1);
}

#[test]
fn test_message_ids_increase_across_broadcasts() {
    let broker = Broker::new();
    let mut rx = connect(&broker, 1);
    broker.subscribe("/t", cid(1), "a");

    broker.broadcast("/t", &message("/t", "1"));
    broker.broadcast("/t", &message("/t", "2"));

    let ids: Vec<u64> = drain(&mut rx)
        .iter()
        .map(|f| f.header("message-id").unwrap().parse().unwrap())
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids[0] < ids[1]);
}

#[test]
fn test_broadcast_evicts_stalled_subscriber_and_keeps_serving_others() {
    let broker = Broker::new();
    let mut stalled = connect_with_capacity(&broker, 1, 3);
    let mut reader = connect(&broker, 2);
    broker.subscribe("/t", cid(1), "slow");
    broker.subscribe("/t", cid(2), "fast");

    let mut delivered = Vec::new();
    for i in 0..10 {
        delivered.push(broker.broadcast("/t", &message("/t", &i.to_string())));
        // Only the second subscriber keeps up.
        assert_eq!(drain(&mut reader).len(), 1);
    }

    assert_eq!(delivered[..3], [2, 2, 2]);
    assert!(delivered[3..].iter().all(|&n| n == 1), "{delivered:?}");
    assert!(!broker.is_registered(cid(1)));
    assert_eq!(broker.subscriber_count("/t"), 1);
    assert_eq!(drain(&mut stalled).len(), 3);
}

// =========================================================================
// Cleanup
// =========================================================================

#[test]
fn test_unregister_purges_connection_from_every_topic() {
    let broker = Broker::new();
    let _a = connect(&broker, 1);
    let _b = connect(&broker, 2);
    broker.subscribe("/only-a", cid(1), "1");
    broker.subscribe("/shared", cid(1), "2");
    broker.subscribe("/shared", cid(2), "1");

    broker.unregister(cid(1));

    assert!(!broker.is_registered(cid(1)));
    assert_eq!(broker.connection_count(), 1);
    assert_eq!(broker.subscriber_count("/only-a"), 0);
    assert_eq!(broker.subscriber_count("/shared"), 1);
    assert_eq!(broker.topic_count(), 1);
    assert!(broker.subscription_id("/shared", cid(1)).is_none());
}

#[test]
fn test_unregister_then_send_returns_false() {
    let broker = Broker::new();
    let _rx = connect(&broker, 1);
    broker.unregister(cid(1));

    assert!(!broker.send_to_connection(cid(1), Frame::new(Command::Receipt)));
}

// =========================================================================
// Concurrency
// =========================================================================

#[test]
fn test_concurrent_subscribe_and_unregister_leave_no_residue() {
    let broker = Arc::new(Broker::new());
    let threads: Vec<_> = (0..8u64)
        .map(|t| {
            let broker = Arc::clone(&broker);
            std::thread::spawn(move || {
                for round in 0..200u64 {
                    let id = t * 1_000 + round;
                    let (tx, _rx) = outbound_channel(DEFAULT_OUTBOUND_CAPACITY);
                    broker.register(cid(id), tx);
                    broker.subscribe("/hot", cid(id), "s");
                    broker.subscribe(&format!("/t{t}"), cid(id), "s");
                    broker.broadcast("/hot", &message("/hot", "x"));
                    if round % 2 == 0 {
                        broker.unsubscribe("/hot", cid(id));
                    }
                    broker.unregister(cid(id));
                }
            })
        })
        .collect();

    for handle in threads {
        handle.join().unwrap();
    }

    assert_eq!(broker.connection_count(), 0);
    assert_eq!(broker.topic_count(), 0);
}
