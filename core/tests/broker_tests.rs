use futures::{SinkExt, StreamExt};
use sspq::{BrokerConfig, BrokerServer, Message, MessageType, SspqCodec, UNLIMITED_RETRIES};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

type Peer = Framed<TcpStream, SspqCodec>;

const WAIT: Duration = Duration::from_secs(2);

async fn start_broker(config: BrokerConfig) -> (Arc<BrokerServer>, SocketAddr, JoinHandle<()>) {
    let server = Arc::new(BrokerServer::new(config).expect("valid config"));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = {
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            server.serve(listener).await.expect("server failed");
        })
    };
    (server, addr, handle)
}

async fn connect(addr: SocketAddr) -> Peer {
    Framed::new(TcpStream::connect(addr).await.unwrap(), SspqCodec::new())
}

async fn next_delivery(peer: &mut Peer) -> Message {
    tokio::time::timeout(WAIT, peer.next())
        .await
        .expect("no delivery")
        .expect("stream closed")
        .expect("bad frame")
}

async fn assert_no_delivery(peer: &mut Peer) {
    let result = tokio::time::timeout(Duration::from_millis(150), peer.next()).await;
    assert!(result.is_err(), "unexpected delivery: {:?}", result);
}

async fn eventually<F: Fn() -> bool>(what: &str, condition: F) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_send_receive_confirm() {
    let (server, addr, _handle) = start_broker(BrokerConfig::default()).await;
    let mut producer = connect(addr).await;
    let mut consumer = connect(addr).await;

    producer.send(Message::send("hello", 3)).await.unwrap();
    consumer.send(Message::receive()).await.unwrap();

    let delivery = next_delivery(&mut consumer).await;
    assert_eq!(delivery.message_type, MessageType::Send);
    assert_eq!(&delivery.payload[..], b"hello");
    assert_eq!(delivery.retries, 3);

    consumer.send(Message::confirm()).await.unwrap();
    eventually("confirmation", || server.metrics().snapshot().confirmed == 1).await;
    eventually("delivery task to finish", || server.in_flight() == 0).await;
    assert!(server.dead_letters().is_empty());
}

#[tokio::test]
async fn test_consumer_waiting_before_producer() {
    let (_server, addr, _handle) = start_broker(BrokerConfig::default()).await;
    let mut consumer = connect(addr).await;
    consumer.send(Message::receive()).await.unwrap();
    assert_no_delivery(&mut consumer).await;

    let mut producer = connect(addr).await;
    producer.send(Message::send("late", 0)).await.unwrap();
    assert_eq!(&next_delivery(&mut consumer).await.payload[..], b"late");
}

#[tokio::test]
async fn test_retry_then_dead_letter_scenario() {
    let (server, addr, _handle) = start_broker(BrokerConfig::default()).await;
    let mut producer = connect(addr).await;
    producer.send(Message::send("A", 1)).await.unwrap();

    let mut c1 = connect(addr).await;
    c1.send(Message::receive()).await.unwrap();
    let first = next_delivery(&mut c1).await;
    assert_eq!((&first.payload[..], first.retries), (&b"A"[..], 1));
    drop(c1);

    let mut c2 = connect(addr).await;
    c2.send(Message::receive()).await.unwrap();
    let second = next_delivery(&mut c2).await;
    assert_eq!((&second.payload[..], second.retries), (&b"A"[..], 0));
    drop(c2);

    eventually("dead letter", || server.dead_letters().len() == 1).await;
    eventually("delivery tasks to finish", || server.in_flight() == 0).await;

    let dead = server.dead_letters().drain();
    assert_eq!(dead, vec![Message::send("A", 0)]);
    assert!(server.context().ingress.is_empty());

    let metrics = server.metrics().snapshot();
    assert_eq!(metrics.retried, 1);
    assert_eq!(metrics.dead_lettered, 1);
    assert_eq!(metrics.dropped, 0);
}

#[tokio::test]
async fn test_retry_then_drop_without_dead_letter_queue() {
    let config = BrokerConfig::default().without_dead_letter_queue();
    let (server, addr, _handle) = start_broker(config).await;
    let mut producer = connect(addr).await;
    producer.send(Message::send("A", 1)).await.unwrap();

    for expected_retries in [1u8, 0] {
        let mut consumer = connect(addr).await;
        consumer.send(Message::receive()).await.unwrap();
        let delivery = next_delivery(&mut consumer).await;
        assert_eq!(delivery.retries, expected_retries);
    }

    eventually("drop", || server.metrics().snapshot().dropped == 1).await;
    assert!(server.dead_letters().is_empty());
    assert!(server.context().ingress.is_empty());
}

#[tokio::test]
async fn test_unlimited_retries_survive_many_disconnects() {
    let (server, addr, _handle) = start_broker(BrokerConfig::default()).await;
    let mut producer = connect(addr).await;
    producer
        .send(Message::send("sticky", UNLIMITED_RETRIES))
        .await
        .unwrap();

    for _ in 0..5 {
        let mut consumer = connect(addr).await;
        consumer.send(Message::receive()).await.unwrap();
        assert_eq!(next_delivery(&mut consumer).await.retries, UNLIMITED_RETRIES);
    }

    eventually("five retries", || server.metrics().snapshot().retried == 5).await;
    assert!(server.dead_letters().is_empty());
}

#[tokio::test]
async fn test_second_receive_ignored_until_confirm() {
    let (_server, addr, _handle) = start_broker(BrokerConfig::default()).await;
    let mut producer = connect(addr).await;
    let mut consumer = connect(addr).await;

    producer.send(Message::send("one", 0)).await.unwrap();
    producer.send(Message::send("two", 0)).await.unwrap();

    consumer.send(Message::receive()).await.unwrap();
    assert_eq!(&next_delivery(&mut consumer).await.payload[..], b"one");

    // Still holding "one": this request must not start a second delivery
    consumer.send(Message::receive()).await.unwrap();
    assert_no_delivery(&mut consumer).await;

    consumer.send(Message::confirm()).await.unwrap();
    consumer.send(Message::receive()).await.unwrap();
    assert_eq!(&next_delivery(&mut consumer).await.payload[..], b"two");
}

#[tokio::test]
async fn test_stray_confirm_is_ignored() {
    let (server, addr, _handle) = start_broker(BrokerConfig::default()).await;
    let mut producer = connect(addr).await;
    let mut consumer = connect(addr).await;

    consumer.send(Message::confirm()).await.unwrap();
    consumer.send(Message::receive()).await.unwrap();
    producer.send(Message::send("A", 2)).await.unwrap();
    assert_eq!(next_delivery(&mut consumer).await.retries, 2);

    // The stray CONFIRM did not pre-confirm this delivery
    drop(consumer);
    eventually("retry", || server.metrics().snapshot().retried == 1).await;
    assert_eq!(server.metrics().snapshot().confirmed, 0);
    assert_eq!(server.metrics().snapshot().protocol_violations, 1);

    let mut next = connect(addr).await;
    next.send(Message::receive()).await.unwrap();
    assert_eq!(next_delivery(&mut next).await.retries, 1);
}

#[tokio::test]
async fn test_unknown_frame_keeps_connection_open() {
    let (server, addr, _handle) = start_broker(BrokerConfig::default()).await;
    let mut consumer = connect(addr).await;
    let mut producer = connect(addr).await;

    consumer
        .send(Message::new(MessageType::Unknown(42), "???", 0))
        .await
        .unwrap();
    consumer.send(Message::receive()).await.unwrap();
    producer.send(Message::send("still here", 0)).await.unwrap();

    assert_eq!(&next_delivery(&mut consumer).await.payload[..], b"still here");
    assert_eq!(server.metrics().snapshot().unknown_frames, 1);
}

#[tokio::test]
async fn test_malformed_frame_closes_connection() {
    let (server, addr, _handle) = start_broker(BrokerConfig::default()).await;
    let mut raw = TcpStream::connect(addr).await.unwrap();
    raw.write_all(b"definitely not sspq").await.unwrap();

    let mut peer = Framed::new(raw, SspqCodec::new());
    let closed = tokio::time::timeout(WAIT, peer.next())
        .await
        .expect("server kept the connection open");
    assert!(closed.is_none() || matches!(closed, Some(Err(_))));
    eventually("connection count", || server.metrics().active_connections() == 0).await;
}

#[tokio::test]
async fn test_disconnected_consumer_is_skipped() {
    let (server, addr, _handle) = start_broker(BrokerConfig::default()).await;

    let mut gone = connect(addr).await;
    gone.send(Message::receive()).await.unwrap();
    eventually("queued consumer", || server.context().ready_consumers.len() == 1).await;
    drop(gone);
    eventually("disconnect", || server.metrics().active_connections() == 0).await;

    let mut alive = connect(addr).await;
    alive.send(Message::receive()).await.unwrap();
    let mut producer = connect(addr).await;
    producer.send(Message::send("A", 0)).await.unwrap();

    let delivery = next_delivery(&mut alive).await;
    assert_eq!(delivery.retries, 0);
    assert_eq!(server.metrics().snapshot().deliveries_started, 1);
}

#[tokio::test]
async fn test_shutdown_leaves_outstanding_delivery_running() {
    let (server, addr, handle) = start_broker(BrokerConfig::default()).await;
    let mut producer = connect(addr).await;
    let mut consumer = connect(addr).await;
    producer.send(Message::send("A", 0)).await.unwrap();
    consumer.send(Message::receive()).await.unwrap();
    next_delivery(&mut consumer).await;

    server.shutdown();
    tokio::time::timeout(WAIT, handle).await.unwrap().unwrap();
    assert_eq!(server.in_flight(), 1);

    // The existing connection still resolves its delivery
    consumer.send(Message::confirm()).await.unwrap();
    tokio::time::timeout(WAIT, server.wait_for_deliveries())
        .await
        .expect("delivery never resolved");
    assert_eq!(server.metrics().snapshot().confirmed, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_confirm_then_receive_in_one_write_never_retries() {
    const MESSAGES: usize = 1000;
    let (server, addr, _handle) = start_broker(BrokerConfig::default()).await;
    let mut producer = connect(addr).await;
    let mut consumer = connect(addr).await;

    for i in 0..MESSAGES {
        producer
            .feed(Message::send(format!("m{}", i), 3))
            .await
            .unwrap();
    }
    SinkExt::<Message>::flush(&mut producer).await.unwrap();

    consumer.send(Message::receive()).await.unwrap();
    for i in 0..MESSAGES {
        let delivery = next_delivery(&mut consumer).await;
        assert_eq!(delivery.payload, format!("m{}", i).as_bytes());
        assert_eq!(delivery.retries, 3);

        consumer.feed(Message::confirm()).await.unwrap();
        if i + 1 < MESSAGES {
            consumer.feed(Message::receive()).await.unwrap();
        }
        SinkExt::<Message>::flush(&mut consumer).await.unwrap();
    }

    eventually("every confirmation", || {
        server.metrics().snapshot().confirmed == MESSAGES as u64
    })
    .await;
    eventually("delivery tasks to finish", || server.in_flight() == 0).await;

    let snapshot = server.metrics().snapshot();
    assert_eq!(snapshot.deliveries_started, MESSAGES as u64);
    assert_eq!(snapshot.retried, 0);
    assert_eq!(snapshot.protocol_violations, 0);
    assert!(server.dead_letters().is_empty());
    assert_no_delivery(&mut consumer).await;
}
