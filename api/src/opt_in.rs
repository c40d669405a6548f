use crate::domain::{
    ConditionalWrite, EmailClient, SubscriberEmail, SubscriberRecord, SubscriberRepository,
    SubscriberStatus, SubscriptionToken,
};
use crate::utils::error_chain_fmt;
use anyhow::Context;
use chrono::Utc;
use reqwest::Url;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const CONFIRMATION_PATH: &str = "/subscriptions/confirm";

#[derive(Debug, Clone)]
pub struct OptInConfig {
    /// Public address of the service, used to build confirmation links.
    pub base_url: String,
    pub token_ttl: chrono::Duration,
    pub default_source: String,
    pub store_timeout: Duration,
    pub delivery_timeout: Duration,
}

impl Default for OptInConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            token_ttl: chrono::Duration::seconds(86_400),
            default_source: "site".to_string(),
            store_timeout: Duration::from_secs(2),
            delivery_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupOutcome {
    VerificationSent,
    AlreadyConfirmed,
}

impl SignupOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            SignupOutcome::VerificationSent => "Verification email sent",
            SignupOutcome::AlreadyConfirmed => "Already confirmed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Confirmed,
    AlreadyConfirmed,
}

impl VerifyOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            VerifyOutcome::Confirmed => "Confirmed",
            VerifyOutcome::AlreadyConfirmed => "Already confirmed",
        }
    }
}

#[derive(thiserror::Error)]
pub enum OptInError {
    #[error("{0}")]
    Validation(String),
    #[error("There is no subscriber associated with the provided email.")]
    NotFound,
    #[error("The provided token does not match the pending subscription.")]
    TokenMismatch,
    #[error("The provided token has expired.")]
    TokenExpired,
    #[error("Failed to deliver the confirmation email.")]
    Delivery(#[source] anyhow::Error),
    #[error("Failed to access the subscribers store.")]
    Store(#[source] anyhow::Error),
    #[error("{0}")]
    InvalidConfiguration(String),
}

impl std::fmt::Debug for OptInError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// Double opt-in flow: pending subscription, confirmation email, token check.
#[derive(Clone)]
pub struct OptInProtocol {
    repository: Arc<dyn SubscriberRepository>,
    email_client: Arc<dyn EmailClient>,
    config: OptInConfig,
}

impl OptInProtocol {
    pub fn new(
        repository: Arc<dyn SubscriberRepository>,
        email_client: Arc<dyn EmailClient>,
        config: OptInConfig,
    ) -> Self {
        Self {
            repository,
            email_client,
            config,
        }
    }

    #[tracing::instrument(name = "request_signup", skip(self, email, source))]
    pub async fn request_signup(
        &self,
        email: &str,
        source: Option<&str>,
    ) -> Result<SignupOutcome, OptInError> {
        let email = SubscriberEmail::parse(email.to_string()).map_err(OptInError::Validation)?;
        let source = match source.map(str::trim) {
            Some(source) if !source.is_empty() => source.to_string(),
            _ => self.config.default_source.clone(),
        };
        let token = SubscriptionToken::generate();
        let record = SubscriberRecord::pending(
            email.clone(),
            source,
            token.clone(),
            Utc::now(),
            self.config.token_ttl,
        )
        .map_err(OptInError::InvalidConfiguration)?;

        let stored = within(self.config.store_timeout, self.repository.upsert_pending(&record))
            .await
            .context("Failed to store the pending subscriber.")
            .map_err(OptInError::Store)?;

        if stored == ConditionalWrite::ConditionFailed {
            tracing::info!(subscriber_email = %email, "Subscriber is already confirmed");
            return Ok(SignupOutcome::AlreadyConfirmed);
        }

        self.send_confirmation_email(&email, &token)
            .await
            .map_err(OptInError::Delivery)?;

        Ok(SignupOutcome::VerificationSent)
    }

    #[tracing::instrument(name = "verify_token", skip(self, email, token))]
    pub async fn verify_token(&self, email: &str, token: &str) -> Result<VerifyOutcome, OptInError> {
        let email = SubscriberEmail::parse(email.to_string()).map_err(OptInError::Validation)?;
        let token = SubscriptionToken::parse(token.to_string()).map_err(OptInError::Validation)?;

        let record = within(self.config.store_timeout, self.repository.get_subscriber(&email))
            .await
            .context("Failed to retrieve the subscriber.")
            .map_err(OptInError::Store)?
            .ok_or(OptInError::NotFound)?;

        if record.status == SubscriberStatus::Confirmed {
            return Ok(VerifyOutcome::AlreadyConfirmed);
        }

        if record.token.as_ref() != Some(&token) {
            return Err(OptInError::TokenMismatch);
        }

        let now = Utc::now();
        if record.is_expired(now) {
            return Err(OptInError::TokenExpired);
        }

        let confirmed = within(
            self.config.store_timeout,
            self.repository.confirm_subscriber(&email, &token, now),
        )
        .await
        .context("Failed to confirm the subscriber.")
        .map_err(OptInError::Store)?;

        if confirmed == ConditionalWrite::Applied {
            return Ok(VerifyOutcome::Confirmed);
        }

        // The record changed since it was read: either a concurrent
        // verification confirmed it or a new signup replaced the token.
        let current = within(self.config.store_timeout, self.repository.get_subscriber(&email))
            .await
            .context("Failed to retrieve the subscriber.")
            .map_err(OptInError::Store)?;

        match current {
            Some(record) if record.status.is_confirmed() => Ok(VerifyOutcome::AlreadyConfirmed),
            _ => Err(OptInError::TokenMismatch),
        }
    }

    pub fn confirmation_link(
        &self,
        email: &SubscriberEmail,
        token: &SubscriptionToken,
    ) -> Result<Url, anyhow::Error> {
        let endpoint = format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            CONFIRMATION_PATH
        );

        Url::parse_with_params(
            &endpoint,
            &[("email", email.as_ref()), ("token", token.as_ref())],
        )
        .context("Failed to build the confirmation link.")
    }

    #[tracing::instrument(
        name = "send_confirmation_email_to_subscriber",
        skip(self, token),
        fields(subscriber_email = %email)
    )]
    async fn send_confirmation_email(
        &self,
        email: &SubscriberEmail,
        token: &SubscriptionToken,
    ) -> Result<(), anyhow::Error> {
        let confirmation_link = self.confirmation_link(email, token)?;
        let plain_body = format!(
            "Thanks for signing up!\nVisit {} to confirm your subscription.",
            confirmation_link
        );
        let html_body = format!(
            "Thanks for signing up!<br />Click <a href=\"{}\">here</a> to confirm your subscription.",
            confirmation_link
        );

        within(
            self.config.delivery_timeout,
            self.email_client.send_email_to(
                email,
                "Confirm your subscription",
                &html_body,
                &plain_body,
            ),
        )
        .await
        .context("Failed to send the confirmation email.")
    }
}

async fn within<T>(
    limit: Duration,
    operation: impl Future<Output = Result<T, anyhow::Error>>,
) -> Result<T, anyhow::Error> {
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!(
            "Operation timed out after {}ms",
            limit.as_millis()
        )),
    }
}
