// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of `StorageAdapter` and `KeyStore`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use herald_config::model::StorageConfig;
use herald_core::types::BlacklistEntry;
use herald_core::{
    AdapterType, Campaign, CampaignStatus, Contact, ContactCounts, ContactStatus, HealthStatus,
    HeraldError, KeyStore, NewContact, PluginAdapter, StorageAdapter,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed store.
///
/// The database is opened by [`StorageAdapter::initialize`]; every other
/// call fails until then.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, HeraldError> {
        self.db.get().ok_or_else(|| HeraldError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    /// Every blacklist entry, oldest first.
    pub async fn list_blacklist(&self) -> Result<Vec<BlacklistEntry>, HeraldError> {
        queries::blacklist::list(self.db()?).await
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, HeraldError> {
        let Ok(db) = self.db() else {
            return Ok(HealthStatus::Unhealthy("not initialized".into()));
        };
        db.connection()
            .call(|conn| conn.execute_batch("SELECT 1;"))
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HeraldError> {
        if self.db.get().is_some() {
            self.close().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), HeraldError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| HeraldError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), HeraldError> {
        self.db()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    // --- Campaigns ---

    async fn create_campaign(
        &self,
        name: &str,
        template: &str,
        status: CampaignStatus,
    ) -> Result<Campaign, HeraldError> {
        let campaign = Campaign {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            template: template.to_string(),
            status,
            created_at: Utc::now(),
            completed_at: None,
        };
        queries::campaigns::insert_campaign(self.db()?, &campaign).await?;
        Ok(campaign)
    }

    async fn insert_contacts(
        &self,
        campaign_id: &str,
        contacts: &[NewContact],
    ) -> Result<u64, HeraldError> {
        queries::contacts::insert_contacts(self.db()?, campaign_id, contacts).await
    }

    async fn get_campaign(&self, id: &str) -> Result<Option<Campaign>, HeraldError> {
        queries::campaigns::get_campaign(self.db()?, id).await
    }

    async fn latest_campaign(&self) -> Result<Option<Campaign>, HeraldError> {
        queries::campaigns::latest_campaign(self.db()?, None).await
    }

    async fn latest_running_campaign(&self) -> Result<Option<Campaign>, HeraldError> {
        queries::campaigns::latest_campaign(self.db()?, Some(CampaignStatus::Running)).await
    }

    async fn list_campaigns(&self, limit: u32) -> Result<Vec<Campaign>, HeraldError> {
        queries::campaigns::list_campaigns(self.db()?, limit).await
    }

    async fn running_campaign_ids(&self) -> Result<Vec<String>, HeraldError> {
        queries::campaigns::running_campaign_ids(self.db()?).await
    }

    async fn set_campaign_status(
        &self,
        id: &str,
        status: CampaignStatus,
        at: DateTime<Utc>,
    ) -> Result<(), HeraldError> {
        queries::campaigns::set_status(self.db()?, id, status, at).await
    }

    async fn delete_campaign(&self, id: &str) -> Result<bool, HeraldError> {
        queries::campaigns::delete_campaign(self.db()?, id).await
    }

    // --- Contacts ---

    async fn next_pending_contact(
        &self,
        campaign_id: &str,
    ) -> Result<Option<Contact>, HeraldError> {
        queries::contacts::next_pending(self.db()?, campaign_id).await
    }

    async fn mark_contact_outcome(
        &self,
        contact_id: i64,
        status: ContactStatus,
        error_message: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool, HeraldError> {
        queries::contacts::mark_outcome(self.db()?, contact_id, status, error_message, at).await
    }

    async fn count_outcomes_between(
        &self,
        statuses: &[ContactStatus],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64, HeraldError> {
        queries::contacts::count_outcomes_between(self.db()?, statuses, start, end).await
    }

    async fn campaign_counts(&self, campaign_id: &str) -> Result<ContactCounts, HeraldError> {
        queries::contacts::campaign_counts(self.db()?, campaign_id).await
    }

    async fn recent_outcomes(
        &self,
        campaign_id: &str,
        limit: u32,
    ) -> Result<Vec<Contact>, HeraldError> {
        queries::contacts::recent_outcomes(self.db()?, campaign_id, limit).await
    }

    // --- Blacklist ---

    async fn is_blacklisted(&self, phone: &str) -> Result<bool, HeraldError> {
        queries::blacklist::is_blacklisted(self.db()?, phone).await
    }

    async fn add_to_blacklist(
        &self,
        phone: &str,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<(), HeraldError> {
        queries::blacklist::add(self.db()?, phone, reason, at).await
    }

    async fn blacklist_pending_contacts(&self, phone: &str) -> Result<u64, HeraldError> {
        queries::contacts::blacklist_pending(self.db()?, phone).await
    }
}

#[async_trait]
impl KeyStore for SqliteStorage {
    async fn read_key(&self, key: &str) -> Result<Option<String>, HeraldError> {
        queries::auth_keys::read(self.db()?, key).await
    }

    async fn write_key(&self, key: &str, value: &str) -> Result<(), HeraldError> {
        queries::auth_keys::write(self.db()?, key, value).await
    }

    async fn delete_key(&self, key: &str) -> Result<(), HeraldError> {
        queries::auth_keys::delete(self.db()?, key).await
    }

    async fn delete_keys_except(&self, keep: &[String]) -> Result<u64, HeraldError> {
        queries::auth_keys::delete_except(self.db()?, keep).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{Duration, TimeZone};
    use tempfile::{TempDir, tempdir};

    use super::*;

    async fn open() -> (SqliteStorage, TempDir) {
        let dir = tempdir().unwrap();
        let storage = SqliteStorage::new(StorageConfig {
            database_path: dir.path().join("test.db").display().to_string(),
            wal_mode: true,
        });
        storage.initialize().await.unwrap();
        (storage, dir)
    }

    fn contact(phone: &str, name: &str) -> NewContact {
        let mut variables = BTreeMap::new();
        variables.insert("name".to_string(), serde_json::json!(name));
        NewContact {
            phone: phone.to_string(),
            variables,
        }
    }

    #[tokio::test]
    async fn plugin_adapter_identity() {
        let storage = SqliteStorage::new(StorageConfig {
            database_path: "unused.db".into(),
            wal_mode: true,
        });
        assert_eq!(storage.name(), "sqlite");
        assert_eq!(storage.adapter_type(), AdapterType::Storage);
        assert!(matches!(
            storage.health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));
    }

    #[tokio::test]
    async fn calls_before_initialize_fail() {
        let storage = SqliteStorage::new(StorageConfig {
            database_path: "unused.db".into(),
            wal_mode: true,
        });
        assert!(storage.latest_campaign().await.is_err());
    }

    #[tokio::test]
    async fn double_initialize_is_rejected() {
        let (storage, _dir) = open().await;
        assert!(storage.initialize().await.is_err());
    }

    #[tokio::test]
    async fn campaign_round_trip_and_latest_running() {
        let (storage, _dir) = open().await;
        let first = storage.create_campaign("spring", "Hi {{name}}", CampaignStatus::Running).await.unwrap();
        let second = storage.create_campaign("summer", "Hello", CampaignStatus::Running).await.unwrap();

        let loaded = storage.get_campaign(&first.id).await.unwrap().unwrap();
        assert_eq!(loaded.template, "Hi {{name}}");
        assert_eq!(loaded.status, CampaignStatus::Running);

        let latest = storage.latest_running_campaign().await.unwrap().unwrap();
        assert_eq!(latest.id, second.id);

        storage
            .set_campaign_status(&second.id, CampaignStatus::Paused, Utc::now())
            .await
            .unwrap();
        let latest = storage.latest_running_campaign().await.unwrap().unwrap();
        assert_eq!(latest.id, first.id);
        assert_eq!(storage.latest_campaign().await.unwrap().unwrap().id, second.id);
        assert_eq!(storage.running_campaign_ids().await.unwrap(), vec![first.id]);
    }

    #[tokio::test]
    async fn finished_status_stamps_completed_at() {
        let (storage, _dir) = open().await;
        let campaign = storage.create_campaign("c", "t", CampaignStatus::Running).await.unwrap();
        let at = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        storage
            .set_campaign_status(&campaign.id, CampaignStatus::Completed, at)
            .await
            .unwrap();
        let loaded = storage.get_campaign(&campaign.id).await.unwrap().unwrap();
        assert_eq!(loaded.completed_at, Some(at));

        let err = storage
            .set_campaign_status("missing", CampaignStatus::Stopped, at)
            .await
            .unwrap_err();
        assert!(matches!(err, HeraldError::CampaignNotFound(_)));
    }

    #[tokio::test]
    async fn pending_queue_and_conditional_outcome() {
        let (storage, _dir) = open().await;
        let campaign = storage.create_campaign("c", "t", CampaignStatus::Running).await.unwrap();
        let inserted = storage
            .insert_contacts(&campaign.id, &[contact("+33 612", "Ana"), contact("33700", "Bo")])
            .await
            .unwrap();
        assert_eq!(inserted, 2);

        let next = storage.next_pending_contact(&campaign.id).await.unwrap().unwrap();
        assert_eq!(next.variables["name"], serde_json::json!("Ana"));

        let now = Utc::now();
        assert!(
            storage
                .mark_contact_outcome(next.id, ContactStatus::Sent, None, now)
                .await
                .unwrap()
        );
        // A second transition of the same contact is refused.
        assert!(
            !storage
                .mark_contact_outcome(next.id, ContactStatus::Failed, Some("late"), now)
                .await
                .unwrap()
        );

        let counts = storage.campaign_counts(&campaign.id).await.unwrap();
        assert_eq!((counts.total, counts.sent, counts.pending), (2, 1, 1));

        let next = storage.next_pending_contact(&campaign.id).await.unwrap().unwrap();
        assert_eq!(next.phone, "33700");
    }

    #[tokio::test]
    async fn pending_is_not_a_valid_outcome() {
        let (storage, _dir) = open().await;
        let err = storage
            .mark_contact_outcome(1, ContactStatus::Pending, None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, HeraldError::Internal(_)));
    }

    #[tokio::test]
    async fn outcome_counting_respects_window_and_statuses() {
        let (storage, _dir) = open().await;
        let campaign = storage.create_campaign("c", "t", CampaignStatus::Running).await.unwrap();
        let rows: Vec<_> = (0..4).map(|i| contact(&format!("100{i}"), "x")).collect();
        storage.insert_contacts(&campaign.id, &rows).await.unwrap();

        let day = Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap();
        let outcomes = [
            (ContactStatus::Sent, day + Duration::hours(1)),
            (ContactStatus::Invalid, day + Duration::hours(2)),
            (ContactStatus::Failed, day - Duration::minutes(1)),
            (ContactStatus::Blacklisted, day + Duration::hours(23)),
        ];
        for (status, at) in outcomes {
            let c = storage.next_pending_contact(&campaign.id).await.unwrap().unwrap();
            storage.mark_contact_outcome(c.id, status, None, at).await.unwrap();
        }

        let end = day + Duration::days(1);
        let all = storage
            .count_outcomes_between(&ContactStatus::TERMINAL, day, end)
            .await
            .unwrap();
        assert_eq!(all, 3);
        let volume = storage
            .count_outcomes_between(&ContactStatus::VOLUME, day - Duration::days(1), day)
            .await
            .unwrap();
        assert_eq!(volume, 1);
    }

    #[tokio::test]
    async fn large_batches_are_chunked() {
        let (storage, _dir) = open().await;
        let campaign = storage.create_campaign("bulk", "t", CampaignStatus::Running).await.unwrap();
        let rows: Vec<_> = (0..1_234).map(|i| contact(&format!("33{i:07}"), "x")).collect();
        assert_eq!(storage.insert_contacts(&campaign.id, &rows).await.unwrap(), 1_234);
        let counts = storage.campaign_counts(&campaign.id).await.unwrap();
        assert_eq!(counts.pending, 1_234);
    }

    #[tokio::test]
    async fn blacklist_matches_on_digits() {
        let (storage, _dir) = open().await;
        storage
            .add_to_blacklist("+33 6 12", "user_opt_out", Utc::now())
            .await
            .unwrap();
        assert!(storage.is_blacklisted("33612").await.unwrap());
        assert!(storage.is_blacklisted("(33) 612").await.unwrap());
        assert!(!storage.is_blacklisted("33613").await.unwrap());
        assert!(!storage.is_blacklisted("").await.unwrap());

        storage.add_to_blacklist("33612", "manual", Utc::now()).await.unwrap();
        let entries = storage.list_blacklist().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].reason, "manual");
    }

    #[tokio::test]
    async fn opt_out_sweep_only_touches_pending_rows() {
        let (storage, _dir) = open().await;
        let campaign = storage.create_campaign("c", "t", CampaignStatus::Running).await.unwrap();
        storage
            .insert_contacts(
                &campaign.id,
                &[contact("33612", "a"), contact("+33 612", "b"), contact("999", "c")],
            )
            .await
            .unwrap();
        let first = storage.next_pending_contact(&campaign.id).await.unwrap().unwrap();
        storage
            .mark_contact_outcome(first.id, ContactStatus::Sent, None, Utc::now())
            .await
            .unwrap();

        assert_eq!(storage.blacklist_pending_contacts("33612").await.unwrap(), 1);
        let counts = storage.campaign_counts(&campaign.id).await.unwrap();
        assert_eq!((counts.sent, counts.blacklisted, counts.pending), (1, 1, 1));
    }

    #[tokio::test]
    async fn recent_outcomes_newest_first() {
        let (storage, _dir) = open().await;
        let campaign = storage.create_campaign("c", "t", CampaignStatus::Running).await.unwrap();
        storage
            .insert_contacts(&campaign.id, &[contact("1", "a"), contact("2", "b"), contact("3", "c")])
            .await
            .unwrap();
        let base = Utc::now();
        for minutes in [1, 2] {
            let c = storage.next_pending_contact(&campaign.id).await.unwrap().unwrap();
            storage
                .mark_contact_outcome(
                    c.id,
                    ContactStatus::Failed,
                    Some("boom"),
                    base + Duration::minutes(minutes),
                )
                .await
                .unwrap();
        }
        let recent = storage.recent_outcomes(&campaign.id, 10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].phone, "2");
        assert_eq!(recent[0].error_message.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn delete_cascades_to_contacts() {
        let (storage, _dir) = open().await;
        let campaign = storage.create_campaign("c", "t", CampaignStatus::Running).await.unwrap();
        storage.insert_contacts(&campaign.id, &[contact("1", "a")]).await.unwrap();
        assert!(storage.delete_campaign(&campaign.id).await.unwrap());
        assert!(!storage.delete_campaign(&campaign.id).await.unwrap());
        assert_eq!(storage.campaign_counts(&campaign.id).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn keystore_wipe_honors_keep_list() {
        let (storage, _dir) = open().await;
        storage.write_key("creds", "{}").await.unwrap();
        storage.write_key("pre-key-1", "abc").await.unwrap();
        storage.write_key("active_instance_owner", "me").await.unwrap();
        storage.write_key("creds", "{\"v\":2}").await.unwrap();
        assert_eq!(storage.read_key("creds").await.unwrap().as_deref(), Some("{\"v\":2}"));

        let removed = storage
            .delete_keys_except(&["active_instance_owner".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(storage.read_key("creds").await.unwrap(), None);
        assert_eq!(
            storage.read_key("active_instance_owner").await.unwrap().as_deref(),
            Some("me")
        );

        storage.delete_key("active_instance_owner").await.unwrap();
        storage.delete_key("never-existed").await.unwrap();
        assert_eq!(storage.delete_keys_except(&[]).await.unwrap(), 0);
    }
}
