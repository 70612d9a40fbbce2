use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use treesync::{
    Session, SessionKey,
    sync::{
        PollConfig, PollOutcome, PollScheduler, PollStatus, SyncError,
        transports::ScriptedTransport,
    },
};

use crate::helpers::{document, team};

fn registered_session() -> Mutex<Session> {
    let mut session = Session::new();
    session.set_key(SessionKey::new("session-1"));
    Mutex::new(session)
}

#[tokio::test]
async fn test_five_unchanged_polls_reach_150ms() {
    let scheduler = PollScheduler::new(PollConfig::default());
    let transport = ScriptedTransport::new();
    let session = registered_session();

    assert_eq!(scheduler.interval(), Duration::from_millis(100));
    for _ in 0..5 {
        let status = scheduler.poll_once(&session, &transport).await.unwrap();
        assert_eq!(status, PollStatus::Unchanged);
    }
    assert_eq!(scheduler.interval(), Duration::from_millis(150));
}

#[tokio::test]
async fn test_interval_never_exceeds_max() {
    let scheduler = PollScheduler::new(PollConfig::default());
    let transport = ScriptedTransport::new();
    let session = registered_session();

    for _ in 0..60 {
        scheduler.poll_once(&session, &transport).await.unwrap();
        assert!(scheduler.interval() <= Duration::from_millis(500));
    }
    assert_eq!(scheduler.interval(), Duration::from_millis(500));
}

#[tokio::test]
async fn test_update_resets_interval_and_applies() {
    let scheduler = PollScheduler::new(PollConfig::default());
    let transport = ScriptedTransport::new();
    let session = registered_session();

    for _ in 0..20 {
        transport.push_outcome(PollOutcome::Unchanged);
    }
    transport.push_outcome(PollOutcome::Updated(document([team("1", "5")])));
    for _ in 0..20 {
        scheduler.poll_once(&session, &transport).await.unwrap();
    }
    assert_eq!(scheduler.interval(), Duration::from_millis(300));

    let status = scheduler.poll_once(&session, &transport).await.unwrap();
    // add Team(1), add Score, content Score, load
    assert_eq!(status, PollStatus::Applied(4));
    assert_eq!(scheduler.interval(), Duration::from_millis(100));
    assert_eq!(
        session.lock().unwrap().get("Team(1).Score").unwrap().as_deref(),
        Some("5")
    );
}

#[tokio::test]
async fn test_not_found_is_session_lost() {
    let scheduler = PollScheduler::default();
    let transport = ScriptedTransport::new();
    transport.push_outcome(PollOutcome::NotFound);
    let session = registered_session();

    let err = scheduler.poll_once(&session, &transport).await.unwrap_err();
    assert!(err.is_session_lost());
    assert!(!scheduler.is_in_flight());
}

#[tokio::test]
async fn test_unregistered_session_cannot_poll() {
    let scheduler = PollScheduler::default();
    let transport = ScriptedTransport::new();
    let session = Mutex::new(Session::new());

    let err = scheduler.poll_once(&session, &transport).await.unwrap_err();
    assert!(matches!(
        err,
        treesync::Error::Sync(SyncError::NotRegistered)
    ));
    assert_eq!(transport.polls(), 0);
}

#[tokio::test]
async fn test_transport_error_keeps_interval() {
    let scheduler = PollScheduler::default();
    let transport = ScriptedTransport::new();
    transport.push_outcome(PollOutcome::Unchanged);
    transport.push_error(SyncError::Network("connection reset".into()));
    let session = registered_session();

    scheduler.poll_once(&session, &transport).await.unwrap();
    let err = scheduler.poll_once(&session, &transport).await.unwrap_err();
    assert!(err.is_network_error());
    assert_eq!(scheduler.interval(), Duration::from_millis(110));
    assert!(!scheduler.is_in_flight());
}

#[tokio::test]
async fn test_concurrent_polls_are_serialized() {
    let scheduler = Arc::new(PollScheduler::default());
    let transport = Arc::new(ScriptedTransport::new());
    let session = Arc::new(registered_session());

    let mut handles = Vec::new();
    for _ in 0..8 {
        let (scheduler, transport, session) =
            (scheduler.clone(), transport.clone(), session.clone());
        handles.push(tokio::spawn(async move {
            scheduler
                .poll_once(&session, transport.as_ref())
                .await
                .map_err(|e| e.to_string())
        }));
    }

    let mut completed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => completed += 1,
            Err(e) => assert_eq!(e, "A poll is already in flight"),
        }
    }
    assert!(completed >= 1);
    assert_eq!(transport.polls(), completed);
    assert!(!scheduler.is_in_flight());
}
