use std::sync::Arc;

use chrono::{TimeZone, Utc};
use moodtoon::{
    emotion::Emotion,
    model::{NewWebtoon, RecordId, Source},
    session::{Session, SessionManager},
    store::{
        RecordStore,
        error::StoreError,
        local::{LocalStore, MemoryLocalStore, USER_ID_KEY},
        remote::{HttpRemoteStore, RemoteStore},
    },
};
use secrecy::SecretString;

use crate::AppStateTest;

fn session(user_id: &str, token: &str) -> Session {
    Session {
        user_id: user_id.into(),
        token: SecretString::from(token.to_string()),
    }
}

fn entry(text: &str, minute: u32) -> NewWebtoon {
    NewWebtoon {
        created_at: Some(Utc.with_ymd_and_hms(2025, 6, 1, 9, minute, 0).unwrap()),
        emotion: Emotion::Joy,
        input_text: Some(text.into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn remote_store_rejects_invalid_token() {
    let test_state = AppStateTest::new(false).await;
    let address = test_state.spawn().await;
    let remote = HttpRemoteStore::new(&address);
    let session = session("user-1", "not-a-jwt");

    assert!(matches!(
        remote.list(&session).await,
        Err(StoreError::Unauthenticated)
    ));
    assert!(matches!(
        remote.create(&session, &entry("일기", 0)).await,
        Err(StoreError::Unauthenticated)
    ));
    assert!(matches!(
        remote
            .delete(&session, &RecordId::Remote("user-1_1".into()))
            .await,
        Err(StoreError::Unauthenticated)
    ));
    assert!(matches!(
        remote.clear(&session).await,
        Err(StoreError::Unauthenticated)
    ));
}

#[tokio::test]
async fn remote_store_reports_unreachable_server_as_network_error() {
    let remote = HttpRemoteStore::new("http://127.0.0.1:9");

    let result = remote.list(&session("user-1", "token")).await;

    assert!(matches!(result, Err(StoreError::Network(_))));
}

#[tokio::test]
async fn record_store_signed_out_of_server_keeps_entries_on_device() {
    let test_state = AppStateTest::new(false).await;
    let address = test_state.spawn().await;
    let local = Arc::new(MemoryLocalStore::default());
    let (_sender, receiver) = tokio::sync::watch::channel(Some(session("user-1", "expired")));
    let store = RecordStore::new(local, HttpRemoteStore::new(&address), receiver);

    let record = store.save(entry("오프라인", 0)).await;

    assert_eq!(record.source, Source::Local);
    assert!(record.needs_sync);
    assert_eq!(store.load_all().await.unwrap(), vec![record]);
}

#[tokio::test]
async fn sign_up_is_forbidden_when_registration_is_disabled() {
    let mut test_state = AppStateTest::new(false).await;
    test_state.app_state.config.application.allow_registration = false;
    let address = test_state.spawn().await;

    let local = Arc::new(MemoryLocalStore::default());
    let manager = SessionManager::new(&address, local.clone());
    let result = manager
        .sign_up("user@example.com", &SecretString::from("password"))
        .await;

    assert!(matches!(result, Err(StoreError::PermissionDenied)));
    assert!(manager.current().is_none());
    assert_eq!(local.get(USER_ID_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn sign_in_with_invalid_email_is_a_bad_request() {
    let test_state = AppStateTest::new(false).await;
    let address = test_state.spawn().await;

    let manager = SessionManager::new(&address, Arc::new(MemoryLocalStore::default()));
    let result = manager
        .sign_in("not-an-email", &SecretString::from("password"))
        .await;

    assert!(matches!(result, Err(StoreError::Remote { status: 400, .. })));
    assert!(manager.current().is_none());
}

#[tokio::test]
#[ignore = "requires a running postgres"]
async fn session_and_remote_store_round_trip() {
    let test_state = AppStateTest::new(true).await;
    let address = test_state.spawn().await;
    let local = Arc::new(MemoryLocalStore::default());
    let manager = SessionManager::new(&address, local.clone());
    let password = SecretString::from("password");

    let user = manager.sign_up("writer@example.com", &password).await.unwrap();
    assert_eq!(manager.current().unwrap().user_id, user.id);
    assert_eq!(
        local.get(USER_ID_KEY).await.unwrap().as_deref(),
        Some(user.id.as_str())
    );

    manager.sign_out().await.unwrap();
    assert!(manager.current().is_none());
    assert!(matches!(
        manager.sign_in("writer@example.com", &SecretString::from("wrong")).await,
        Err(StoreError::Unauthenticated)
    ));
    manager.sign_in("writer@example.com", &password).await.unwrap();
    let writer = manager.current().unwrap();

    let remote = HttpRemoteStore::new(&address);
    let created = remote.create(&writer, &entry("첫 기록", 0)).await.unwrap();
    assert_eq!(
        created.id,
        RecordId::Remote(format!(
            "{}_{}",
            user.id,
            Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap().timestamp_millis()
        ))
    );
    remote.create(&writer, &entry("두번째", 5)).await.unwrap();

    let listed = remote.list(&writer).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].input_text.as_deref(), Some("두번째"));

    remote.delete(&writer, &created.id).await.unwrap();
    assert!(matches!(
        remote.delete(&writer, &created.id).await,
        Err(StoreError::NotFound)
    ));

    let (other, other_token) = test_state.generate_jwt_with_user().await;
    let other_session = session(&other.id, &other_token);
    assert!(matches!(
        remote.delete(&other_session, &listed[0].id).await,
        Err(StoreError::PermissionDenied)
    ));
    assert!(remote.list(&other_session).await.unwrap().is_empty());

    assert_eq!(remote.clear(&writer).await.unwrap(), 1);
    assert!(remote.list(&writer).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires a running postgres"]
async fn record_store_syncs_device_entries_to_server() {
    let test_state = AppStateTest::new(true).await;
    let address = test_state.spawn().await;
    let local = Arc::new(MemoryLocalStore::default());
    let manager = SessionManager::new(&address, local.clone());
    let store = RecordStore::new(
        local.clone(),
        HttpRemoteStore::new(&address),
        manager.subscribe(),
    );

    let offline = store.save(entry("오프라인", 0)).await;
    assert_eq!(offline.source, Source::Local);

    manager
        .sign_up("sync@example.com", &SecretString::from("password"))
        .await
        .unwrap();
    let online = store.save(entry("온라인", 30)).await;
    assert_eq!(online.source, Source::Firebase);

    let report = store.sync().await.unwrap();
    assert_eq!(report.pushed, 1);
    assert_eq!(report.failed, 0);

    let mut records = store.load_all().await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|record| record.source == Source::Firebase));

    let id = records[1].id.clone();
    store.delete_in(&mut records, &id).await.unwrap();
    assert_eq!(store.load_all().await.unwrap().len(), 1);

    let report = store.clear_all().await.unwrap();
    assert_eq!(report.remote_deleted, 1);
    assert!(report.remote_error.is_none());
    assert!(store.load_all().await.unwrap().is_empty());
}
