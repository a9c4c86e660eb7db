//! Delivery dispatcher behavior: pacing, flood control, caps, digests.

mod support;

use std::time::Duration;

use pumpwatch::app::Dispatcher;
use pumpwatch::config::DeliveryConfig;
use pumpwatch::domain::SubscriberId;
use pumpwatch::port::SendOutcome;

use support::{MockClock, MockMessenger};

fn dispatcher(clock: std::sync::Arc<MockClock>) -> Dispatcher {
    Dispatcher::new(DeliveryConfig::default(), clock)
}

#[tokio::test]
async fn consecutive_sends_to_one_recipient_are_paced() {
    let clock = MockClock::at("2026-08-31T12:00:00Z");
    let mut dispatcher = dispatcher(clock.clone());
    let messenger = MockMessenger::new();
    let recipient = SubscriberId::new(1);

    dispatcher.begin_cycle();
    for i in 0..5 {
        dispatcher.enqueue(recipient, format!("alert {i}"));
    }
    let stats = dispatcher.drain(&messenger).await;

    assert_eq!(stats.sent, 5);
    assert_eq!(messenger.sent_count(), 5);
    // Four gaps of at least one second between five sends.
    assert!(clock.total_slept() >= Duration::from_secs(4));
}

#[tokio::test]
async fn interleaved_recipients_do_not_wait_on_each_other() {
    let clock = MockClock::at("2026-08-31T12:00:00Z");
    let mut dispatcher = dispatcher(clock.clone());
    let messenger = MockMessenger::new();

    dispatcher.begin_cycle();
    for id in 1..=5 {
        dispatcher.enqueue(SubscriberId::new(id), "alert".into());
    }
    let stats = dispatcher.drain(&messenger).await;

    assert_eq!(stats.sent, 5);
    assert_eq!(clock.total_slept(), Duration::ZERO);
}

#[tokio::test]
async fn flood_control_defers_and_redelivers() {
    let clock = MockClock::at("2026-08-31T12:00:00Z");
    let mut dispatcher = dispatcher(clock.clone());
    let messenger = MockMessenger::new();
    let recipient = SubscriberId::new(9);

    messenger.script(recipient, vec![SendOutcome::RetryAfter(30)]);

    dispatcher.begin_cycle();
    dispatcher.enqueue(recipient, "alert".into());
    let stats = dispatcher.drain(&messenger).await;

    assert_eq!(stats.sent, 0);
    assert_eq!(stats.deferred, 1);
    assert_eq!(dispatcher.queue_len(), 1, "deferred message stays queued");

    // Next cycle arrives before the pause expires: still deferred.
    clock.advance(Duration::from_secs(10));
    dispatcher.begin_cycle();
    let stats = dispatcher.drain(&messenger).await;
    assert_eq!(stats.sent, 0);
    assert_eq!(stats.deferred, 1);

    // Once the pause expires the message goes out.
    clock.advance(Duration::from_secs(25));
    dispatcher.begin_cycle();
    let stats = dispatcher.drain(&messenger).await;
    assert_eq!(stats.sent, 1);
    assert_eq!(dispatcher.queue_len(), 0);
    assert_eq!(messenger.sent_to(recipient), vec!["alert".to_string()]);
}

#[tokio::test]
async fn per_cycle_cap_drops_surplus_messages() {
    let clock = MockClock::at("2026-08-31T12:00:00Z");
    let config = DeliveryConfig {
        recipient_messages_per_minute: 2,
        ..DeliveryConfig::default()
    };
    let mut dispatcher = Dispatcher::new(config, clock.clone());
    let messenger = MockMessenger::new();
    let recipient = SubscriberId::new(3);

    dispatcher.begin_cycle();
    for i in 0..4 {
        dispatcher.enqueue(recipient, format!("alert {i}"));
    }
    let stats = dispatcher.drain(&messenger).await;

    assert_eq!(stats.sent, 2);
    assert_eq!(stats.dropped, 2);
    assert_eq!(dispatcher.queue_len(), 0, "surplus is dropped, not requeued");

    // The cap is per cycle: the next cycle delivers again.
    dispatcher.begin_cycle();
    dispatcher.enqueue(recipient, "fresh".into());
    let stats = dispatcher.drain(&messenger).await;
    assert_eq!(stats.sent, 1);
}

#[tokio::test]
async fn blocked_recipients_are_digested_once() {
    let clock = MockClock::at("2026-08-31T12:00:00Z");
    let mut dispatcher = dispatcher(clock);
    let messenger = MockMessenger::new();
    let (a, b) = (SubscriberId::new(22), SubscriberId::new(11));

    messenger.script(a, vec![SendOutcome::Blocked]);
    messenger.script(b, vec![SendOutcome::Blocked]);

    dispatcher.begin_cycle();
    dispatcher.enqueue(a, "alert".into());
    dispatcher.enqueue(b, "alert".into());
    let stats = dispatcher.drain(&messenger).await;

    assert_eq!(stats.sent, 0);
    assert_eq!(stats.dropped, 2);

    let digests: Vec<String> = messenger
        .operator_messages()
        .into_iter()
        .filter(|m| m.contains("blocked"))
        .collect();
    assert_eq!(digests.len(), 1, "one digest for all blocked recipients");
    assert!(digests[0].contains("11") && digests[0].contains("22"));
}

#[tokio::test]
async fn failed_send_is_reported_and_dropped() {
    let clock = MockClock::at("2026-08-31T12:00:00Z");
    let mut dispatcher = dispatcher(clock);
    let messenger = MockMessenger::new();
    let recipient = SubscriberId::new(5);

    messenger.script(recipient, vec![SendOutcome::Failed("chat not found".into())]);

    dispatcher.begin_cycle();
    dispatcher.enqueue(recipient, "alert".into());
    let stats = dispatcher.drain(&messenger).await;

    assert_eq!(stats.dropped, 1);
    assert_eq!(dispatcher.queue_len(), 0);
    assert!(messenger
        .operator_messages()
        .iter()
        .any(|m| m.contains("chat not found")));
}
