//! Debounced per-user form draft autosave

use crate::core::context::{Language, SessionContext};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Checked(bool),
    Text(String),
}

pub type FormData = BTreeMap<String, FieldValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub data: FormData,
    pub timestamp: DateTime<Utc>,
}

/// Raw string storage for serialized drafts.
#[async_trait]
pub trait DraftCollection: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn put(&self, key: &str, value: String) -> Result<()>;
    async fn remove(&self, key: &str);
    async fn keys_with_prefix(&self, prefix: &str) -> Vec<String>;
}

#[derive(Debug, Clone)]
pub struct AutosaveOptions {
    pub debounce: Duration,
    pub max_age: chrono::Duration,
    pub exclude_fields: Vec<String>,
}

impl Default for AutosaveOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            max_age: chrono::Duration::days(7),
            exclude_fields: Vec::new(),
        }
    }
}

pub struct FormAutosave {
    storage_key: String,
    collection: Arc<dyn DraftCollection>,
    options: AutosaveOptions,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl FormAutosave {
    pub fn storage_key(form_id: &str, context: &SessionContext) -> String {
        format!("autosave_{form_id}:{}", context.user_key)
    }

    pub fn new(
        form_id: &str,
        context: &SessionContext,
        collection: Arc<dyn DraftCollection>,
        options: AutosaveOptions,
    ) -> Self {
        Self {
            storage_key: Self::storage_key(form_id, context),
            collection,
            options,
            pending: Mutex::new(None),
        }
    }

    pub fn key(&self) -> &str {
        &self.storage_key
    }

    fn without_excluded(&self, data: &FormData) -> FormData {
        data.iter()
            .filter(|(name, _)| !self.options.exclude_fields.contains(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Saves immediately. Returns `false` when nothing was left to save.
    pub async fn save(&self, data: &FormData) -> Result<bool> {
        write_draft(
            self.collection.as_ref(),
            &self.storage_key,
            self.without_excluded(data),
            Utc::now(),
        )
        .await
    }

    /// Saves after the debounce delay; a newer call replaces the pending save.
    pub fn schedule_save(&self, data: FormData) {
        let data = self.without_excluded(&data);
        let collection = Arc::clone(&self.collection);
        let key = self.storage_key.clone();
        let delay = self.options.debounce;

        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = write_draft(collection.as_ref(), &key, data, Utc::now()).await {
                warn!(error = %e, key, "Failed to autosave draft");
            }
        }));
    }

    /// Waits for a pending debounced save, if any.
    pub async fn flush(&self) {
        let handle = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                debug!(error = %e, "Pending draft save did not complete");
            }
        }
    }

    pub async fn restore(&self) -> Option<Draft> {
        self.restore_at(Utc::now()).await
    }

    /// Loads the draft as of `now`. Expired or unreadable drafts are removed.
    pub async fn restore_at(&self, now: DateTime<Utc>) -> Option<Draft> {
        let raw = self.collection.get(&self.storage_key).await?;
        let draft: Draft = match serde_json::from_str(&raw) {
            Ok(draft) => draft,
            Err(e) => {
                warn!(error = %e, key = %self.storage_key, "Discarding unreadable draft");
                self.clear().await;
                return None;
            }
        };

        if now - draft.timestamp > self.options.max_age {
            debug!(key = %self.storage_key, "Discarding expired draft");
            self.clear().await;
            return None;
        }
        Some(draft)
    }

    pub async fn clear(&self) {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = pending {
            handle.abort();
        }
        self.collection.remove(&self.storage_key).await;
    }
}

async fn write_draft(
    collection: &dyn DraftCollection,
    key: &str,
    data: FormData,
    now: DateTime<Utc>,
) -> Result<bool> {
    if data.is_empty() {
        return Ok(false);
    }
    let draft = Draft {
        data,
        timestamp: now,
    };
    let raw = serde_json::to_string(&draft).context("Failed to serialize draft")?;
    collection.put(key, raw).await?;
    debug!(key, "Draft saved");
    Ok(true)
}

/// Storage keys of every draft saved by the user in `context`, across forms.
/// Form ids never contain `:`, so the user key is everything after the first.
pub async fn drafts_for_user(
    collection: &dyn DraftCollection,
    context: &SessionContext,
) -> Vec<String> {
    collection
        .keys_with_prefix("autosave_")
        .await
        .into_iter()
        .filter(|key| {
            key.strip_prefix("autosave_")
                .and_then(|rest| rest.split_once(':'))
                .is_some_and(|(_, user_key)| user_key == context.user_key)
        })
        .collect()
}

/// Human-readable age of a draft.
pub fn time_ago(timestamp: DateTime<Utc>, now: DateTime<Utc>, language: Language) -> String {
    let seconds = (now - timestamp).num_seconds().max(0);
    if seconds < 60 {
        return language.pick("just now", "justo ahora").to_string();
    }
    let (count, en, es) = if seconds < 3600 {
        (seconds / 60, "minutes", "minutos")
    } else if seconds < 86400 {
        (seconds / 3600, "hours", "horas")
    } else {
        (seconds / 86400, "days", "días")
    };
    match language {
        Language::En => format!("{count} {en} ago"),
        Language::Es => format!("hace {count} {es}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryCollection;

    fn sample_data() -> FormData {
        let mut data = FormData::new();
        data.insert("partner_name".into(), FieldValue::Text("Cafe Lenca".into()));
        data.insert("investment_l".into(), FieldValue::Text("75000".into()));
        data.insert("is_matching".into(), FieldValue::Checked(true));
        data.insert("csrf_token".into(), FieldValue::Text("secret".into()));
        data
    }

    fn autosave(collection: Arc<MemoryCollection>, debounce_ms: u64) -> FormAutosave {
        let context = SessionContext::new("ana@example.com", Language::En);
        let options = AutosaveOptions {
            debounce: Duration::from_millis(debounce_ms),
            exclude_fields: vec!["csrf_token".to_string()],
            ..AutosaveOptions::default()
        };
        FormAutosave::new("matching-form", &context, collection, options)
    }

    #[tokio::test]
    async fn test_storage_key_is_per_form_and_user() {
        let collection = Arc::new(MemoryCollection::new());
        let autosave = autosave(collection, 10);
        assert_eq!(autosave.key(), "autosave_matching-form:ana@example.com");
    }

    #[tokio::test]
    async fn test_drafts_for_user() {
        let collection = Arc::new(MemoryCollection::new());
        let ana = SessionContext::new("ana@example.com", Language::En);
        let luis = SessionContext::new("luis@example.com", Language::Es);
        for (form, context) in [
            ("profit-form", &ana),
            ("matching-form", &ana),
            ("profit-form", &luis),
        ] {
            let autosave = FormAutosave::new(
                form,
                context,
                Arc::clone(&collection) as Arc<dyn DraftCollection>,
                AutosaveOptions::default(),
            );
            autosave.save(&sample_data()).await.unwrap();
        }

        assert_eq!(
            drafts_for_user(collection.as_ref(), &ana).await,
            vec![
                "autosave_matching-form:ana@example.com".to_string(),
                "autosave_profit-form:ana@example.com".to_string()
            ]
        );
        assert_eq!(drafts_for_user(collection.as_ref(), &luis).await.len(), 1);
    }

    #[tokio::test]
    async fn test_drafts_for_user_matches_whole_user_key() {
        let collection = MemoryCollection::new();
        for key in [
            "autosave_profit-form:ana",
            "autosave_profit-form:x:ana",
            "autosave_matching-form:x:ana",
        ] {
            collection.put(key, "{}".to_string()).await.unwrap();
        }

        let ana = SessionContext::new("ana", Language::En);
        assert_eq!(
            drafts_for_user(&collection, &ana).await,
            vec!["autosave_profit-form:ana".to_string()]
        );

        let prefixed = SessionContext::new("x:ana", Language::En);
        assert_eq!(
            drafts_for_user(&collection, &prefixed).await,
            vec![
                "autosave_matching-form:x:ana".to_string(),
                "autosave_profit-form:x:ana".to_string()
            ]
        );
    }

    struct ReadOnlyCollection;

    #[async_trait]
    impl DraftCollection for ReadOnlyCollection {
        async fn get(&self, _key: &str) -> Option<String> {
            None
        }

        async fn put(&self, key: &str, _value: String) -> Result<()> {
            anyhow::bail!("Draft store is read-only: {key}")
        }

        async fn remove(&self, _key: &str) {}

        async fn keys_with_prefix(&self, _prefix: &str) -> Vec<String> {
            Vec::new()
        }
    }

    #[tokio::test]
    async fn test_failed_write_is_reported() {
        let context = SessionContext::new("ana@example.com", Language::En);
        let autosave = FormAutosave::new(
            "profit-form",
            &context,
            Arc::new(ReadOnlyCollection),
            AutosaveOptions::default(),
        );

        let err = autosave.save(&sample_data()).await.unwrap_err();
        assert!(err.to_string().contains("read-only"));
    }

    #[tokio::test]
    async fn test_save_and_restore_skips_excluded_fields() {
        let collection = Arc::new(MemoryCollection::new());
        let autosave = autosave(Arc::clone(&collection), 10);

        assert!(autosave.save(&sample_data()).await.unwrap());
        let draft = autosave.restore().await.unwrap();
        assert_eq!(draft.data.len(), 3);
        assert!(!draft.data.contains_key("csrf_token"));
        assert_eq!(
            draft.data.get("is_matching"),
            Some(&FieldValue::Checked(true))
        );
    }

    #[tokio::test]
    async fn test_nothing_saved_when_only_excluded_fields() {
        let collection = Arc::new(MemoryCollection::new());
        let autosave = autosave(Arc::clone(&collection), 10);

        let mut data = FormData::new();
        data.insert("csrf_token".into(), FieldValue::Text("secret".into()));
        assert!(!autosave.save(&data).await.unwrap());
        assert!(collection.get(autosave.key()).await.is_none());
    }

    #[tokio::test]
    async fn test_expired_draft_is_discarded() {
        let collection = Arc::new(MemoryCollection::new());
        let autosave = autosave(Arc::clone(&collection), 10);
        autosave.save(&sample_data()).await.unwrap();

        let later = Utc::now() + chrono::Duration::days(8);
        assert!(autosave.restore_at(later).await.is_none());
        assert!(collection.get(autosave.key()).await.is_none());
    }

    #[tokio::test]
    async fn test_unreadable_draft_is_discarded() {
        let collection = Arc::new(MemoryCollection::new());
        let autosave = autosave(Arc::clone(&collection), 10);
        collection
            .put(autosave.key(), "{not json".to_string())
            .await
            .unwrap();

        assert!(autosave.restore().await.is_none());
        assert!(collection.get(autosave.key()).await.is_none());
    }

    #[tokio::test]
    async fn test_debounce_keeps_only_latest_edit() {
        let collection = Arc::new(MemoryCollection::new());
        let autosave = autosave(Arc::clone(&collection), 20);

        let mut first = FormData::new();
        first.insert("investment_l".into(), FieldValue::Text("7".into()));
        autosave.schedule_save(first);

        let mut second = FormData::new();
        second.insert("investment_l".into(), FieldValue::Text("75".into()));
        autosave.schedule_save(second);

        // Nothing written before the debounce delay elapses
        assert!(collection.get(autosave.key()).await.is_none());

        autosave.flush().await;
        let draft = autosave.restore().await.unwrap();
        assert_eq!(
            draft.data.get("investment_l"),
            Some(&FieldValue::Text("75".into()))
        );
    }

    #[tokio::test]
    async fn test_clear_cancels_pending_save() {
        let collection = Arc::new(MemoryCollection::new());
        let autosave = autosave(Arc::clone(&collection), 20);
        autosave.schedule_save(sample_data());
        autosave.clear().await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(collection.get(autosave.key()).await.is_none());
    }

    #[test]
    fn test_time_ago() {
        let now = Utc::now();
        assert_eq!(time_ago(now, now, Language::En), "just now");
        assert_eq!(
            time_ago(now - chrono::Duration::minutes(5), now, Language::En),
            "5 minutes ago"
        );
        assert_eq!(
            time_ago(now - chrono::Duration::hours(3), now, Language::Es),
            "hace 3 horas"
        );
        assert_eq!(
            time_ago(now - chrono::Duration::days(2), now, Language::En),
            "2 days ago"
        );
    }
}
