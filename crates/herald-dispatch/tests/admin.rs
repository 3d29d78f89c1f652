// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store-level control as another process would issue it, picked up by a
//! serving engine.

use std::sync::Arc;
use std::time::Duration;

use herald_core::{CampaignStatus, ConnectionState, HeraldError, KeyStore, StorageAdapter};
use herald_dispatch::{
    ColumnMapping, ImportRow, RESET_SESSION_KEY, StoreControl, TEST_MESSAGE_KEY,
};
use herald_template::watermark::strip_watermark;
use herald_test_utils::{TestHarness, wait_for_state};

fn control(h: &TestHarness) -> StoreControl {
    StoreControl::new(h.storage.clone(), h.storage.clone(), Arc::new(h.clock.clone()))
}

fn rows() -> Vec<ImportRow> {
    vec![
        [("Mobile", "+33 6 00 00 00 01"), ("Prenom", "Ana")]
            .into_iter()
            .collect(),
        [("Mobile", "+33 6 00 00 00 02"), ("Prenom", "Ben")]
            .into_iter()
            .collect(),
    ]
}

#[tokio::test(start_paused = true)]
async fn created_campaign_is_picked_up_by_the_serving_engine() {
    let h = TestHarness::new().await.unwrap();
    h.connect().await.unwrap();

    let mapping: ColumnMapping = [("Mobile", "phone"), ("Prenom", "name")]
        .into_iter()
        .collect();
    let campaign = control(&h)
        .create_campaign("imported", "Bonjour {{name}}", &rows(), Some(&mapping))
        .await
        .unwrap();
    assert_eq!(campaign.status, CampaignStatus::Running);

    h.engine.idle_check().await;
    let counts = h.wait_until_drained(&campaign.id).await.unwrap();
    assert_eq!(counts.sent, 2);
    let sent = h.transport.sent_messages().await;
    assert_eq!(strip_watermark(&sent[0].text), "Bonjour Ana");
}

#[tokio::test(start_paused = true)]
async fn pause_resume_and_toggle_act_on_the_store() {
    let h = TestHarness::new().await.unwrap();
    let control = control(&h);
    let campaign = control
        .create_campaign("c", "Hi", &rows(), None)
        .await
        .unwrap();

    assert_eq!(control.pause().await.unwrap(), 1);
    let stored = h.storage.get_campaign(&campaign.id).await.unwrap().unwrap();
    assert_eq!(stored.status, CampaignStatus::Paused);

    let resumed = control.resume().await.unwrap();
    assert_eq!(resumed.status, CampaignStatus::Running);

    let toggled = control.toggle().await.unwrap();
    assert_eq!(toggled.status, CampaignStatus::Paused);
    let toggled = control.toggle().await.unwrap();
    assert_eq!(toggled.status, CampaignStatus::Running);

    assert_eq!(control.stop().await.unwrap(), 1);
    assert!(matches!(
        control.resume().await,
        Err(HeraldError::NoActiveCampaign)
    ));
    assert!(matches!(
        control.toggle().await,
        Err(HeraldError::NoActiveCampaign)
    ));

    assert!(control.delete_campaign(&campaign.id).await.unwrap());
    assert!(h.storage.get_campaign(&campaign.id).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn blacklist_sweeps_pending_contacts() {
    let h = TestHarness::new().await.unwrap();
    let control = control(&h);
    let campaign = control
        .create_campaign("c", "Hi", &rows(), None)
        .await
        .unwrap();

    let swept = control.blacklist("+33 6 00 00 00 02", "manual").await.unwrap();
    assert_eq!(swept, 1);
    assert!(h.storage.is_blacklisted("33600000002").await.unwrap());
    let counts = h.counts(&campaign.id).await.unwrap();
    assert_eq!(counts.pending, 1);
    assert_eq!(counts.blacklisted, 1);

    assert!(control.blacklist("no digits", "manual").await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_message_request_is_sent_by_the_serving_engine() {
    let h = TestHarness::new().await.unwrap();
    h.connect().await.unwrap();

    control(&h)
        .request_test_message("+33 6 00 00 00 09", "ping")
        .await
        .unwrap();
    h.engine.idle_check().await;

    let sent = h.transport.sent_messages().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "33600000009");
    assert_eq!(strip_watermark(&sent[0].text), "ping");
    assert_eq!(h.storage.read_key(TEST_MESSAGE_KEY).await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn reset_request_reconnects_the_serving_engine() {
    let h = TestHarness::new().await.unwrap();
    h.connect().await.unwrap();
    let opens = h.transport.open_count();

    control(&h).request_reset_session().await.unwrap();
    h.engine.idle_check().await;
    assert_eq!(h.storage.read_key(RESET_SESSION_KEY).await.unwrap(), None);

    // Store I/O runs on blocking threads, so poll rather than race a
    // virtual-time deadline against it.
    while h.transport.open_count() <= opens {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    let mut state = h.connection.watch_state();
    wait_for_state(&mut state, ConnectionState::Connected)
        .await
        .unwrap();
}
