// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session lifecycle tests against the scripted mock transport.

use std::sync::Arc;
use std::time::Duration;

use herald_connection::{
    ConnectionManager, ConnectionNotice, ConnectionSettings, CREDENTIALS_KEY, FatalReason,
    OWNER_KEY, PAIRING_KEY,
};
use herald_core::types::{InboundText, KeyUpdate, MessageRef};
use herald_core::{ConnectionState, KeyStore, TransportEvent};
use herald_test_utils::{MemoryKeyStore, MockTransport, close_reason, wait_for_state};

const PATIENCE: Duration = Duration::from_secs(120);

fn settings() -> ConnectionSettings {
    ConnectionSettings {
        read_receipt_probability: 0.0,
        ..ConnectionSettings::default()
    }
}

fn manager(transport: &MockTransport, keys: &MemoryKeyStore) -> ConnectionManager {
    ConnectionManager::new(
        Arc::new(transport.clone()),
        Arc::new(keys.clone()),
        settings(),
    )
}

async fn reach(manager: &ConnectionManager, target: ConnectionState) {
    let mut state = manager.watch_state();
    tokio::time::timeout(PATIENCE, wait_for_state(&mut state, target))
        .await
        .expect("state not reached in time")
        .unwrap();
}

fn inbound(remote: &str, text: &str, is_own: bool) -> TransportEvent {
    TransportEvent::Message(InboundText {
        message_ref: MessageRef {
            id: format!("msg-{remote}"),
            remote: remote.to_string(),
        },
        text: Some(text.to_string()),
        is_own,
    })
}

async fn wait_for_key(keys: &MemoryKeyStore, key: &str) -> Option<String> {
    for _ in 0..100 {
        if let Some(value) = keys.read_key(key).await.unwrap() {
            return Some(value);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    None
}

#[tokio::test(start_paused = true)]
async fn connect_writes_owner_marker_and_reports_connected() {
    let transport = MockTransport::new();
    let keys = MemoryKeyStore::new();
    let manager = manager(&transport, &keys);
    let mut notices = manager.subscribe();

    manager.connect().await.unwrap();
    reach(&manager, ConnectionState::Connected).await;

    assert_eq!(
        keys.read_key(OWNER_KEY).await.unwrap().as_deref(),
        Some(manager.instance_id())
    );
    assert!(matches!(
        notices.recv().await.unwrap(),
        ConnectionNotice::Connected
    ));
    assert!(manager.connected_session().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn concurrent_connects_open_a_single_session() {
    let transport = MockTransport::new();
    let keys = MemoryKeyStore::new();
    let manager = manager(&transport, &keys);

    let (a, b) = tokio::join!(manager.connect(), manager.connect());
    a.unwrap();
    b.unwrap();
    reach(&manager, ConnectionState::Connected).await;
    manager.connect().await.unwrap();

    assert_eq!(transport.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn stored_credentials_are_reused() {
    let transport = MockTransport::new();
    let keys = MemoryKeyStore::new();
    keys.write_key(CREDENTIALS_KEY, r#"{"token":"abc"}"#)
        .await
        .unwrap();
    let manager = manager(&transport, &keys);

    manager.connect().await.unwrap();
    reach(&manager, ConnectionState::Connected).await;

    assert_eq!(
        transport.credentials_seen().await,
        vec![serde_json::json!({ "token": "abc" })]
    );
}

#[tokio::test(start_paused = true)]
async fn unreadable_credentials_fall_back_to_fresh() {
    let transport = MockTransport::new();
    let keys = MemoryKeyStore::new();
    keys.write_key(CREDENTIALS_KEY, "not json").await.unwrap();
    let manager = manager(&transport, &keys);

    manager.connect().await.unwrap();
    reach(&manager, ConnectionState::Connected).await;

    assert_eq!(
        transport.credentials_seen().await,
        vec![serde_json::json!({ "fresh": true })]
    );
}

#[tokio::test(start_paused = true)]
async fn credential_and_key_updates_are_persisted() {
    let transport = MockTransport::new();
    let keys = MemoryKeyStore::new();
    keys.write_key("pre-key-1", "old").await.unwrap();
    let manager = manager(&transport, &keys);
    manager.connect().await.unwrap();
    reach(&manager, ConnectionState::Connected).await;

    transport
        .emit(TransportEvent::CredentialsUpdated(
            serde_json::json!({ "token": "next" }),
        ))
        .await;
    transport
        .emit(TransportEvent::KeysUpdated(vec![
            KeyUpdate {
                key: "pre-key-2".into(),
                value: Some(serde_json::json!("fresh")),
            },
            KeyUpdate {
                key: "pre-key-1".into(),
                value: None,
            },
        ]))
        .await;

    assert_eq!(
        wait_for_key(&keys, CREDENTIALS_KEY).await.as_deref(),
        Some(r#"{"token":"next"}"#)
    );
    assert_eq!(
        wait_for_key(&keys, "pre-key-2").await.as_deref(),
        Some(r#""fresh""#)
    );
    assert_eq!(keys.read_key("pre-key-1").await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn pairing_code_is_exposed_until_opened() {
    let transport = MockTransport::new();
    transport
        .push_script(vec![TransportEvent::PairingCode("2@pairing-payload".into())])
        .await;
    let keys = MemoryKeyStore::new();
    let manager = manager(&transport, &keys);

    manager.connect().await.unwrap();
    reach(&manager, ConnectionState::Pairing).await;
    let code = manager.pairing_code().expect("pairing code");
    assert_eq!(code.payload, "2@pairing-payload");
    assert_eq!(
        keys.read_key(PAIRING_KEY).await.unwrap().as_deref(),
        Some("2@pairing-payload")
    );

    transport.emit(TransportEvent::Opened).await;
    reach(&manager, ConnectionState::Connected).await;
    assert!(manager.pairing_code().is_none());
    assert_eq!(keys.read_key(PAIRING_KEY).await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn transient_close_reconnects() {
    let transport = MockTransport::new();
    let keys = MemoryKeyStore::new();
    let manager = manager(&transport, &keys);
    manager.connect().await.unwrap();
    reach(&manager, ConnectionState::Connected).await;

    transport.close_with(Some(500)).await;
    reach(&manager, ConnectionState::Disconnected).await;
    assert!(manager.connected_session().await.is_err());

    reach(&manager, ConnectionState::Connected).await;
    assert_eq!(transport.open_count(), 2);
    assert!(!manager.fatal().is_raised());
}

#[tokio::test(start_paused = true)]
async fn failed_open_is_retried() {
    let transport = MockTransport::new();
    transport.fail_next_opens(1);
    let keys = MemoryKeyStore::new();
    let manager = manager(&transport, &keys);

    assert!(manager.connect().await.is_err());
    reach(&manager, ConnectionState::Connected).await;
    assert_eq!(transport.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn logged_out_close_wipes_keys_except_owner_and_reconnects() {
    let transport = MockTransport::new();
    let keys = MemoryKeyStore::new();
    keys.write_key(CREDENTIALS_KEY, r#"{"token":"abc"}"#)
        .await
        .unwrap();
    keys.write_key("session-peer-1", "x").await.unwrap();
    let manager = manager(&transport, &keys);
    manager.connect().await.unwrap();
    reach(&manager, ConnectionState::Connected).await;

    transport.close_with(Some(401)).await;
    reach(&manager, ConnectionState::Disconnected).await;
    reach(&manager, ConnectionState::Connected).await;

    assert_eq!(keys.keys().await, vec![OWNER_KEY.to_string()]);
    let seen = transport.credentials_seen().await;
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1], serde_json::json!({ "fresh": true }));
}

#[tokio::test(start_paused = true)]
async fn logout_goes_through_the_logged_out_path() {
    let transport = MockTransport::new();
    let keys = MemoryKeyStore::new();
    keys.write_key(CREDENTIALS_KEY, "{}").await.unwrap();
    let manager = manager(&transport, &keys);
    manager.connect().await.unwrap();
    reach(&manager, ConnectionState::Connected).await;

    manager.logout().await.unwrap();
    reach(&manager, ConnectionState::Disconnected).await;

    assert_eq!(transport.logout_count(), 1);
    assert_eq!(keys.read_key(CREDENTIALS_KEY).await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn repeated_conflicts_raise_fatal_without_reconnecting() {
    let transport = MockTransport::new();
    for _ in 0..3 {
        transport
            .push_script(vec![TransportEvent::Closed(close_reason(Some(440)))])
            .await;
    }
    let keys = MemoryKeyStore::new();
    let manager = manager(&transport, &keys);

    manager.connect().await.unwrap();
    let reason = tokio::time::timeout(PATIENCE, manager.fatal().wait())
        .await
        .expect("fatal signal not raised");

    assert_eq!(reason, FatalReason::RepeatedConflict);
    assert_eq!(reason.exit_code(), 1);
    assert_eq!(manager.state(), ConnectionState::Fatal);
    assert_eq!(manager.conflict_count(), 3);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.open_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn successful_open_resets_the_conflict_counter() {
    let transport = MockTransport::new();
    transport
        .push_script(vec![TransportEvent::Closed(close_reason(Some(440)))])
        .await;
    let keys = MemoryKeyStore::new();
    let manager = manager(&transport, &keys);

    manager.connect().await.unwrap();
    reach(&manager, ConnectionState::Connected).await;

    assert_eq!(manager.conflict_count(), 0);
    assert_eq!(transport.open_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn foreign_owner_marker_raises_ownership_lost() {
    let transport = MockTransport::new();
    let keys = MemoryKeyStore::new();
    let manager = manager(&transport, &keys);
    manager.connect().await.unwrap();
    reach(&manager, ConnectionState::Connected).await;
    assert!(!manager.check_ownership().await);

    let watcher = manager.spawn_integrity_check();
    keys.write_key(OWNER_KEY, "another-instance").await.unwrap();

    let reason = tokio::time::timeout(PATIENCE, manager.fatal().wait())
        .await
        .expect("takeover not detected");
    assert_eq!(reason, FatalReason::OwnershipLost);
    assert_eq!(reason.exit_code(), 0);
    assert_eq!(manager.state(), ConnectionState::Fatal);
    assert_eq!(transport.end_count(), 1);
    watcher.await.unwrap();

    manager.connect().await.unwrap();
    assert_eq!(transport.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn inbound_messages_are_broadcast_except_own() {
    let transport = MockTransport::new();
    let keys = MemoryKeyStore::new();
    let manager = manager(&transport, &keys);
    manager.connect().await.unwrap();
    reach(&manager, ConnectionState::Connected).await;
    let mut notices = manager.subscribe();

    transport
        .emit(inbound("33600000001@s.chat", "mine", true))
        .await;
    transport
        .emit(inbound("33600000002@s.chat", "hello", false))
        .await;

    match notices.recv().await.unwrap() {
        ConnectionNotice::Inbound(message) => {
            assert_eq!(message.sender_phone(), "33600000002");
            assert_eq!(message.text.as_deref(), Some("hello"));
        }
        other => panic!("unexpected notice: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn read_receipts_follow_probability() {
    let transport = MockTransport::new();
    let keys = MemoryKeyStore::new();
    let manager = ConnectionManager::new(
        Arc::new(transport.clone()),
        Arc::new(keys.clone()),
        ConnectionSettings {
            read_receipt_probability: 1.0,
            ..ConnectionSettings::default()
        },
    );
    manager.connect().await.unwrap();
    reach(&manager, ConnectionState::Connected).await;

    transport
        .emit(inbound("33600000002@s.chat", "hello", false))
        .await;
    tokio::time::sleep(Duration::from_secs(30)).await;

    let reads = transport.reads().await;
    assert_eq!(reads.len(), 1);
    assert_eq!(reads[0].remote, "33600000002@s.chat");
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_reconnecting() {
    let transport = MockTransport::new();
    let keys = MemoryKeyStore::new();
    let manager = manager(&transport, &keys);
    manager.connect().await.unwrap();
    reach(&manager, ConnectionState::Connected).await;

    manager.shutdown().await;
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    manager.connect().await.unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(transport.open_count(), 1);
    assert_eq!(transport.end_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn reset_wipes_and_reconnects() {
    let transport = MockTransport::new();
    let keys = MemoryKeyStore::new();
    keys.write_key(CREDENTIALS_KEY, "{}").await.unwrap();
    let manager = manager(&transport, &keys);
    manager.connect().await.unwrap();
    reach(&manager, ConnectionState::Connected).await;

    manager.reset().await;
    assert_eq!(keys.keys().await, vec![OWNER_KEY.to_string()]);
    reach(&manager, ConnectionState::Connected).await;
    assert_eq!(transport.open_count(), 2);
}
