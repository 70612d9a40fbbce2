use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use treesync::{
    Document, Element, SessionKey,
    sync::{
        Client, ClientConfig, PollConfig, PollOutcome, PollStatus, SyncError,
        transports::{ScriptedTransport, SyncTransport},
    },
};

use crate::helpers::{document, fast_config, scripted_client, team};

#[tokio::test]
async fn test_connect_registers() {
    let (client, transport, _log) = scripted_client(ClientConfig::default()).await;
    assert_eq!(client.key().unwrap().as_str(), "session-1");
    assert_eq!(transport.registrations(), 1);
    assert_eq!(client.poll_interval(), Duration::from_millis(100));
}

#[tokio::test]
async fn test_registration_failure_is_fatal() {
    let transport = Arc::new(ScriptedTransport::new().with_max_registrations(0));
    let err = Client::connect(transport, ClientConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        treesync::Error::Sync(SyncError::RegistrationFailed(_))
    ));
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let config = ClientConfig {
        poll: PollConfig {
            min_ms: 10,
            max_ms: 5,
            increment_ms: 1,
        },
        ..Default::default()
    };
    let transport = Arc::new(ScriptedTransport::new());
    assert!(Client::connect(transport.clone(), config).await.is_err());
    assert_eq!(transport.registrations(), 0);
}

#[tokio::test]
async fn test_writes_push_whole_document() {
    let (client, transport, log) = scripted_client(ClientConfig::default()).await;

    client.set("Team(1).Name", Some("Tigers")).await.unwrap();
    assert_eq!(
        log.take(),
        vec![
            "add Team(1)",
            "add Team(1).Name",
            "content Team(1).Name None -> Some(\"Tigers\")",
        ]
    );

    let pushes = transport.pushes();
    assert_eq!(pushes.len(), 2);
    assert!(pushes.iter().all(|(key, _)| key.as_str() == "session-1"));
    assert_eq!(pushes[1].1, client.with_session(|s| s.snapshot()));
}

#[tokio::test]
async fn test_remove_pushes_marker() {
    let (client, transport, _log) = scripted_client(ClientConfig::default()).await;
    transport.push_outcome(PollOutcome::Updated(document([team("1", "5")])));
    client.poll_once().await.unwrap();

    assert!(client.remove("Team(1)").await.unwrap());
    let pushes = transport.pushes();
    let (_, pushed) = pushes.last().unwrap();
    assert_eq!(pushed.elements, vec![Element::new("Team").with_id("1").removed()]);
}

#[tokio::test]
async fn test_poll_once_applies_snapshot() {
    let (client, transport, log) = scripted_client(ClientConfig::default()).await;
    transport.push_outcome(PollOutcome::Updated(document([team("1", "5")])));
    transport.push_outcome(PollOutcome::Updated(document([team("1", "5")])));

    assert_eq!(client.poll_once().await.unwrap(), PollStatus::Applied(4));
    assert_eq!(log.take().last().map(String::as_str), Some("load"));

    // An identical snapshot produces no notifications at all.
    assert_eq!(client.poll_once().await.unwrap(), PollStatus::Applied(0));
    assert!(log.take().is_empty());
}

#[tokio::test]
async fn test_session_loss_resets_and_reregisters() {
    let (client, transport, log) = scripted_client(fast_config()).await;
    transport.push_outcome(PollOutcome::Updated(document([team("1", "5")])));
    transport.push_outcome(PollOutcome::NotFound);
    transport.push_outcome(PollOutcome::Updated(document([team("1", "5")])));

    let run = client.run_until(async {
        while transport.remaining() > 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        // Let the last snapshot be applied.
        tokio::time::sleep(Duration::from_millis(20)).await;
    });
    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("poll loop did not finish")
        .unwrap();

    assert_eq!(transport.registrations(), 2);
    assert_eq!(client.key().unwrap().as_str(), "session-2");

    // The same snapshot after the reset fires add again, and load again.
    let events = log.take();
    let loads = events.iter().filter(|e| *e == "load").count();
    let adds = events.iter().filter(|e| *e == "add Team(1)").count();
    assert_eq!(loads, 2);
    assert_eq!(adds, 2);
}

#[tokio::test]
async fn test_session_loss_without_reset_stops_loop() {
    let config = ClientConfig {
        reset_on_session_lost: false,
        ..fast_config()
    };
    let (client, transport, _log) = scripted_client(config).await;
    transport.push_outcome(PollOutcome::NotFound);

    let err = tokio::time::timeout(Duration::from_secs(5), client.run())
        .await
        .expect("poll loop did not stop")
        .unwrap_err();
    assert!(err.is_session_lost());
    assert_eq!(transport.registrations(), 1);
}

#[tokio::test]
async fn test_network_errors_do_not_stop_loop() {
    let (client, transport, log) = scripted_client(fast_config()).await;
    transport.push_error(SyncError::Network("connection reset".into()));
    transport.push_error(SyncError::ConnectionFailed {
        address: "http://127.0.0.1:1".into(),
        reason: "refused".into(),
    });
    transport.push_outcome(PollOutcome::Updated(document([team("2", "3")])));

    let run = client.run_until(async {
        while transport.remaining() > 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    });
    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("poll loop did not finish")
        .unwrap();

    assert!(log.take().contains(&"add Team(2)".to_string()));
    assert_eq!(transport.registrations(), 1);
}

#[tokio::test]
async fn test_server_errors_do_not_stop_loop() {
    let (client, transport, log) = scripted_client(fast_config()).await;
    transport.push_error(SyncError::UnexpectedStatus {
        endpoint: "/api/v0/poll",
        status: 500,
    });
    transport.push_error(SyncError::UnexpectedStatus {
        endpoint: "/api/v0/poll",
        status: 502,
    });
    transport.push_outcome(PollOutcome::Updated(document([team("1", "5")])));

    let run = client.run_until(async {
        while transport.remaining() > 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    });
    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("poll loop did not finish")
        .unwrap();

    let events = log.take();
    assert!(events.contains(&"add Team(1)".to_string()));
    assert!(events.contains(&"load".to_string()));
    assert_eq!(client.with_session(|s| s.get("Team(1).Score").unwrap()).as_deref(), Some("5"));
}

/// Scripted transport whose first push is slow to complete.
#[derive(Default)]
struct SlowFirstPush {
    inner: ScriptedTransport,
    started: AtomicUsize,
}

#[async_trait]
impl SyncTransport for SlowFirstPush {
    fn transport_type(&self) -> &'static str {
        "slow-first-push"
    }

    async fn register(&self) -> treesync::Result<SessionKey> {
        self.inner.register().await
    }

    async fn poll(&self, key: &SessionKey) -> treesync::Result<PollOutcome> {
        self.inner.poll(key).await
    }

    async fn push(&self, key: &SessionKey, document: &Document) -> treesync::Result<()> {
        if self.started.fetch_add(1, Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(30)).await;
        }
        self.inner.push(key, document).await
    }
}

#[tokio::test]
async fn test_concurrent_writes_push_in_order() {
    let transport = Arc::new(SlowFirstPush::default());
    let client = Client::connect(transport.clone(), ClientConfig::default())
        .await
        .unwrap();

    let (first, second) = tokio::join!(
        client.set("Score", Some("1")),
        client.set("Score", Some("2"))
    );
    first.unwrap();
    second.unwrap();

    let values: Vec<Option<String>> = transport
        .inner
        .pushes()
        .iter()
        .map(|(_, doc)| doc.elements[0].value().map(str::to_string))
        .collect();
    assert_eq!(
        values,
        vec![None, Some("1".to_string()), Some("2".to_string())]
    );
}

#[tokio::test]
async fn test_subscriptions_survive_reset() {
    let (client, transport, log) = scripted_client(ClientConfig::default()).await;
    client.set("X", Some("1")).await.unwrap();
    log.take();

    let key = client.reset().await.unwrap();
    assert_eq!(key.as_str(), "session-2");
    assert!(client.with_session(|s| s.tree().is_empty()));

    transport.push_outcome(PollOutcome::Updated(document([Element::new("X")
        .with_value(Some("2"))])));
    client.poll_once().await.unwrap();
    assert_eq!(
        log.take(),
        vec!["add X", "content X None -> Some(\"2\")", "load"]
    );
}
