use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::subscriber_status::SubscriberStatus;
use crate::domain::subscription_token::SubscriptionToken;
use chrono::{DateTime, Duration, Utc};

/// A row of the subscribers table.
///
/// `token` and `expires_at` are only present while the subscriber is pending,
/// `confirmed_at` only once confirmed.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriberRecord {
    pub email: SubscriberEmail,
    pub status: SubscriberStatus,
    pub token: Option<SubscriptionToken>,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl SubscriberRecord {
    /// Fails when `ttl` is not positive or `now + ttl` is not a representable
    /// timestamp.
    pub fn pending(
        email: SubscriberEmail,
        source: String,
        token: SubscriptionToken,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Self, String> {
        if ttl <= Duration::zero() {
            return Err(format!(
                "Token lifetime must be positive, got {}s",
                ttl.num_seconds()
            ));
        }
        let expires_at = now.checked_add_signed(ttl).ok_or_else(|| {
            format!(
                "Token lifetime of {}s overflows the expiry timestamp",
                ttl.num_seconds()
            )
        })?;

        Ok(Self {
            email,
            status: SubscriberStatus::Pending,
            token: Some(token),
            source,
            created_at: now,
            confirmed_at: None,
            expires_at: Some(expires_at),
        })
    }

    pub fn confirm(self, confirmed_at: DateTime<Utc>) -> Self {
        Self {
            status: SubscriberStatus::Confirmed,
            token: None,
            confirmed_at: Some(confirmed_at),
            expires_at: None,
            ..self
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |expires_at| now > expires_at)
    }
}
