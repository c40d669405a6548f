use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::subscriber_record::SubscriberRecord;
use crate::domain::subscription_token::SubscriptionToken;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Result of a write guarded by a condition on the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalWrite {
    Applied,
    ConditionFailed,
}

#[async_trait]
pub trait SubscriberRepository: Send + Sync {
    /// Stores `record` as the pending subscriber for its email, replacing any
    /// previous pending record. Fails the condition when the stored record is
    /// already confirmed.
    async fn upsert_pending(
        &self,
        record: &SubscriberRecord,
    ) -> Result<ConditionalWrite, anyhow::Error>;

    async fn get_subscriber(
        &self,
        email: &SubscriberEmail,
    ) -> Result<Option<SubscriberRecord>, anyhow::Error>;

    /// Moves a pending subscriber to confirmed, provided its stored token is
    /// still `expected_token`.
    async fn confirm_subscriber(
        &self,
        email: &SubscriberEmail,
        expected_token: &SubscriptionToken,
        confirmed_at: DateTime<Utc>,
    ) -> Result<ConditionalWrite, anyhow::Error>;
}
