use sgbind_protocol::{stream_channel, Payload};

fn payload(text: &str) -> Payload {
    Payload::now(text.as_bytes().to_vec())
}

#[tokio::test]
async fn messages_arrive_in_order() {
    let (sender, mut handle) = stream_channel(8);
    assert!(sender.push(payload("a")));
    assert!(sender.push(payload("b")));

    assert_eq!(handle.next().await.expect("a").bytes, b"a");
    assert_eq!(handle.next().await.expect("b").bytes, b"b");
}

#[tokio::test]
async fn full_buffer_drops_oldest_and_counts() {
    let (sender, mut handle) = stream_channel(2);
    assert!(sender.push(payload("a")));
    assert!(sender.push(payload("b")));
    assert!(sender.push(payload("c")));

    assert_eq!(handle.next().await.expect("b").bytes, b"b");
    assert_eq!(handle.next().await.expect("c").bytes, b"c");
    assert_eq!(handle.overflow_count(), 1);
}

#[tokio::test]
async fn stop_makes_push_fail() {
    let (sender, handle) = stream_channel(8);
    handle.stop();
    assert!(!sender.push(payload("late")));
    assert!(sender.is_closed());
}

#[tokio::test]
async fn sender_drop_ends_stream_after_drain() {
    let (sender, mut handle) = stream_channel(8);
    assert!(sender.push(payload("last")));
    drop(sender);

    assert_eq!(handle.next().await.expect("last").bytes, b"last");
    assert!(handle.next().await.is_none());
}

#[tokio::test]
async fn waiting_consumer_wakes_on_push() {
    let (sender, mut handle) = stream_channel(8);
    let consumer = tokio::spawn(async move { handle.next().await });

    tokio::task::yield_now().await;
    assert!(sender.push(payload("x")));

    let received = consumer.await.expect("join").expect("payload");
    assert_eq!(received.bytes, b"x");
}
