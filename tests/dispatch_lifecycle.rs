use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use notifyd::dispatch::{DispatchEngine, DispatchError, DispatchQueue, DispatchQueueConfig};
use notifyd::notifications::{
    Channel, ChannelContent, NotificationRecord, NotificationRequest, NotificationStatus,
};
use notifyd::providers::{Provider, ProviderRegistry, ProviderResult, SimulatedProvider};
use notifyd::store::records::DEFAULT_RETENTION;
use notifyd::store::{MemoryStore, RecordStore, StateStore, StoreError, StoreResult};

/// Fails with a retryable error until `succeed_on` attempts have been made.
struct FlakyProvider {
    channel: Channel,
    attempts: AtomicUsize,
    succeed_on: usize,
}

#[async_trait]
impl Provider for FlakyProvider {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn attempt(&self, _recipient: &str, _content: &ChannelContent) -> ProviderResult {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt < self.succeed_on {
            ProviderResult::failed("gateway timeout", true)
        } else {
            ProviderResult::delivered()
        }
    }
}

/// Reports failure without any detail.
struct SilentFailureProvider;

#[async_trait]
impl Provider for SilentFailureProvider {
    fn channel(&self) -> Channel {
        Channel::Push
    }

    async fn attempt(&self, _recipient: &str, _content: &ChannelContent) -> ProviderResult {
        ProviderResult {
            success: false,
            detail: None,
            retryable: false,
        }
    }
}

struct PanickingProvider;

#[async_trait]
impl Provider for PanickingProvider {
    fn channel(&self) -> Channel {
        Channel::Chat
    }

    async fn attempt(&self, _recipient: &str, _content: &ChannelContent) -> ProviderResult {
        panic!("webhook client crashed")
    }
}

struct UnavailableStore;

#[async_trait]
impl StateStore for UnavailableStore {
    async fn put(&self, _key: &str, _value: String, _ttl: Duration) -> StoreResult<()> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn get(&self, _key: &str) -> StoreResult<Option<String>> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

fn build_engine(registry: ProviderRegistry, max_attempts: usize) -> DispatchEngine {
    let records = RecordStore::new(Arc::new(MemoryStore::new()), DEFAULT_RETENTION);
    let queue = DispatchQueue::new(DispatchQueueConfig {
        max_attempts,
        base_backoff: Duration::from_millis(5),
        max_backoff: Duration::from_millis(20),
    });
    DispatchEngine::new(Arc::new(registry), records, queue).with_workers(2)
}

fn content(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("content must be an object"),
    }
}

fn request(channel: &str, recipient: &str, fields: Value) -> NotificationRequest {
    NotificationRequest::new("user-1", channel, recipient, content(fields))
}

async fn wait_for_terminal(engine: &DispatchEngine, id: &str) -> NotificationRecord {
    for _ in 0..50 {
        if let Some(record) = engine.get(id).await.expect("store")
            && record.is_terminal()
        {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    engine.get(id).await.expect("store").expect("record")
}

#[tokio::test]
async fn email_is_queued_then_sent_with_default_subject() {
    let engine = build_engine(ProviderRegistry::simulated(), 1);
    let _workers = engine.spawn_workers();

    let accepted = engine
        .accept(request("email", "a@b.com", json!({ "body": "hi" })))
        .await
        .expect("accepted");
    assert_eq!(accepted.status, NotificationStatus::Queued);

    let record = wait_for_terminal(&engine, &accepted.id).await;
    assert_eq!(record.status, NotificationStatus::Sent);
    assert_eq!(record.error, None);
    assert_eq!(record.attempts, 1);
    assert_eq!(record.content.get("subject"), Some(&json!("Notification")));
    assert_eq!(record.content.get("body"), Some(&json!("hi")));
}

#[tokio::test]
async fn record_is_readable_as_soon_as_accept_returns() {
    // No workers: the record must stay queued and visible.
    let engine = build_engine(ProviderRegistry::simulated(), 1);
    let accepted = engine
        .accept(request("sms", "+15550100", json!({ "message": "hello" })))
        .await
        .expect("accepted");
    let record = engine.get(&accepted.id).await.unwrap().expect("record");
    assert_eq!(record.status, NotificationStatus::Queued);
    assert_eq!(record.timestamp, accepted.timestamp);
}

#[tokio::test]
async fn unknown_channel_fails_without_invoking_providers() {
    let email = Arc::new(SimulatedProvider::new(Channel::Email));
    let registry = ProviderRegistry::simulated().with_provider(email.clone());
    let engine = build_engine(registry, 3);
    let _workers = engine.spawn_workers();

    let accepted = engine
        .accept(request("carrier_pigeon", "coop-7", json!({ "body": "hi" })))
        .await
        .expect("accepted");
    let record = wait_for_terminal(&engine, &accepted.id).await;
    assert_eq!(record.status, NotificationStatus::Failed);
    assert_eq!(record.error.as_deref(), Some("unknown notification type"));
    assert_eq!(record.attempts, 0);
    assert_eq!(email.calls(), 0);
}

#[tokio::test]
async fn transport_failure_becomes_failed_record() {
    let sms = Arc::new(SimulatedProvider::new(Channel::Sms).failing("gateway unreachable"));
    let engine = build_engine(ProviderRegistry::simulated().with_provider(sms.clone()), 1);
    let _workers = engine.spawn_workers();

    let accepted = engine
        .accept(request("sms", "+15550100", json!({ "message": "hello" })))
        .await
        .expect("accepted");
    let record = wait_for_terminal(&engine, &accepted.id).await;
    assert_eq!(record.status, NotificationStatus::Failed);
    let error = record.error.expect("error");
    assert!(error.contains("gateway unreachable"));
    assert_eq!(sms.calls(), 1, "single attempt when retries are disabled");
}

#[tokio::test]
async fn missing_failure_detail_gets_default_message() {
    let registry = ProviderRegistry::simulated().with_provider(Arc::new(SilentFailureProvider));
    let engine = build_engine(registry, 1);
    let record = engine
        .dispatch_now(request("push", "device-token", json!({ "body": "ping" })))
        .await
        .expect("processed");
    assert_eq!(record.status, NotificationStatus::Failed);
    assert_eq!(
        record.error.as_deref(),
        Some("Provider failed to send notification")
    );
}

#[tokio::test]
async fn provider_panic_is_contained() {
    let registry = ProviderRegistry::simulated().with_provider(Arc::new(PanickingProvider));
    let engine = build_engine(registry, 1);
    let _workers = engine.spawn_workers();

    let accepted = engine
        .accept(request("chat", "#ops", json!({ "message": "deploy done" })))
        .await
        .expect("accepted");
    let record = wait_for_terminal(&engine, &accepted.id).await;
    assert_eq!(record.status, NotificationStatus::Failed);
    assert!(record.error.unwrap().contains("webhook client crashed"));

    // The worker pool keeps going after the panic.
    let next = engine
        .accept(request("sms", "+15550100", json!({ "message": "still alive" })))
        .await
        .expect("accepted");
    assert_eq!(
        wait_for_terminal(&engine, &next.id).await.status,
        NotificationStatus::Sent
    );
}

#[tokio::test]
async fn retryable_failure_is_retried_by_workers() {
    let flaky = Arc::new(FlakyProvider {
        channel: Channel::Sms,
        attempts: AtomicUsize::new(0),
        succeed_on: 2,
    });
    let engine = build_engine(ProviderRegistry::simulated().with_provider(flaky.clone()), 3);
    let _workers = engine.spawn_workers();

    let accepted = engine
        .accept(request("sms", "+15550100", json!({ "message": "retry me" })))
        .await
        .expect("accepted");
    let record = wait_for_terminal(&engine, &accepted.id).await;
    assert_eq!(record.status, NotificationStatus::Sent);
    assert_eq!(record.attempts, 2);
    assert_eq!(flaky.attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn retries_stop_at_max_attempts() {
    let flaky = Arc::new(FlakyProvider {
        channel: Channel::Email,
        attempts: AtomicUsize::new(0),
        succeed_on: usize::MAX,
    });
    let engine = build_engine(ProviderRegistry::simulated().with_provider(flaky.clone()), 3);
    let record = engine
        .dispatch_now(request("email", "a@b.com", json!({ "body": "hi" })))
        .await
        .expect("processed");
    assert_eq!(record.status, NotificationStatus::Failed);
    assert_eq!(record.attempts, 3);
    assert_eq!(record.error.as_deref(), Some("gateway timeout"));
}

#[tokio::test]
async fn terminal_record_reads_are_stable() {
    let engine = build_engine(ProviderRegistry::simulated(), 1);
    let _workers = engine.spawn_workers();
    let accepted = engine
        .accept(request("push", "device-token", json!({ "body": "b", "data": { "k": "v" } })))
        .await
        .expect("accepted");
    let first = wait_for_terminal(&engine, &accepted.id).await;
    for _ in 0..5 {
        let again = engine.get(&accepted.id).await.unwrap().expect("record");
        assert_eq!(again, first);
    }
    let reprocessed = engine.process(first.clone()).await.unwrap();
    assert_eq!(reprocessed, first);
}

#[tokio::test]
async fn store_failure_propagates_from_accept() {
    let records = RecordStore::new(Arc::new(UnavailableStore), DEFAULT_RETENTION);
    let queue = DispatchQueue::new(DispatchQueueConfig::default());
    let engine = DispatchEngine::new(Arc::new(ProviderRegistry::simulated()), records, queue);

    let err = engine
        .accept(request("email", "a@b.com", json!({ "body": "hi" })))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Store(StoreError::Unavailable(_))));
    assert!(engine.queue().is_empty().await, "nothing is scheduled");
}
