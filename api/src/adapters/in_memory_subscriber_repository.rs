use crate::domain::{
    ConditionalWrite, SubscriberEmail, SubscriberRecord, SubscriberRepository, SubscriptionToken,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Process-local subscriber store, used for local runs and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemorySubscriberRepository {
    subscribers: Arc<Mutex<HashMap<SubscriberEmail, SubscriberRecord>>>,
}

impl InMemorySubscriberRepository {
    pub fn len(&self) -> Result<usize, anyhow::Error> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, anyhow::Error> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<SubscriberEmail, SubscriberRecord>>, anyhow::Error> {
        self.subscribers
            .lock()
            .map_err(|_| anyhow::anyhow!("The in-memory subscriber store is poisoned"))
    }
}

#[async_trait]
impl SubscriberRepository for InMemorySubscriberRepository {
    async fn upsert_pending(
        &self,
        record: &SubscriberRecord,
    ) -> Result<ConditionalWrite, anyhow::Error> {
        let mut subscribers = self.lock()?;

        if let Some(existing) = subscribers.get(&record.email) {
            if existing.status.is_confirmed() {
                return Ok(ConditionalWrite::ConditionFailed);
            }
        }

        subscribers.insert(record.email.clone(), record.clone());
        Ok(ConditionalWrite::Applied)
    }

    async fn get_subscriber(
        &self,
        email: &SubscriberEmail,
    ) -> Result<Option<SubscriberRecord>, anyhow::Error> {
        Ok(self.lock()?.get(email).cloned())
    }

    async fn confirm_subscriber(
        &self,
        email: &SubscriberEmail,
        expected_token: &SubscriptionToken,
        confirmed_at: DateTime<Utc>,
    ) -> Result<ConditionalWrite, anyhow::Error> {
        let mut subscribers = self.lock()?;

        let matches = subscribers.get(email).map_or(false, |existing| {
            existing.status.is_pending()
                && existing.token.as_ref() == Some(expected_token)
        });
        if !matches {
            return Ok(ConditionalWrite::ConditionFailed);
        }

        if let Some(existing) = subscribers.remove(email) {
            subscribers.insert(email.clone(), existing.confirm(confirmed_at));
        }
        Ok(ConditionalWrite::Applied)
    }
}
