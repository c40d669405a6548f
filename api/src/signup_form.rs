use crate::configuration::FormSettings;
use crate::domain::SubscriberEmail;
use crate::routes::ResponseMessage;
use anyhow::Context;
use reqwest::{Client, StatusCode};
use std::path::PathBuf;

const THANK_YOU: &str = "Thanks for joining! We'll keep you updated.";
const INVALID_EMAIL: &str = "Please enter a valid email address";
const SOMETHING_WENT_WRONG: &str = "Something went wrong. Please try again.";

/// Terminal state of a single form submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormOutcome {
    Submitted,
    StoredLocally,
    Rejected(String),
    Failed,
}

impl FormOutcome {
    pub fn message(&self) -> &str {
        match self {
            FormOutcome::Submitted | FormOutcome::StoredLocally => THANK_YOU,
            FormOutcome::Rejected(reason) => reason,
            FormOutcome::Failed => SOMETHING_WENT_WRONG,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FormOutcome::Submitted | FormOutcome::StoredLocally)
    }
}

#[derive(serde::Serialize)]
struct SignupBody<'a> {
    email: &'a str,
    source: &'a str,
}

/// Posts signups to the remote endpoint, keeping them on disk when the
/// endpoint cannot take them.
pub struct SignupForm {
    http_client: Client,
    endpoint: String,
    source: String,
    store: LocalEmailStore,
}

impl SignupForm {
    pub fn new(settings: &FormSettings) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder().timeout(settings.timeout()).build()?;

        Ok(Self {
            http_client,
            endpoint: settings.endpoint.clone(),
            source: settings.source.clone(),
            store: LocalEmailStore::new(settings.fallback_path.clone()),
        })
    }

    #[tracing::instrument(name = "Submitting the signup form", skip(self, email))]
    pub async fn submit(&self, email: &str) -> FormOutcome {
        let email = match SubscriberEmail::parse(email.to_string()) {
            Ok(email) => email,
            Err(_) => return FormOutcome::Rejected(INVALID_EMAIL.to_string()),
        };

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&SignupBody {
                email: email.as_ref(),
                source: &self.source,
            })
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => FormOutcome::Submitted,
            Ok(response) if response.status() == StatusCode::BAD_REQUEST => {
                let reason = response
                    .json::<ResponseMessage>()
                    .await
                    .map(|body| body.message)
                    .unwrap_or_else(|_| INVALID_EMAIL.to_string());
                FormOutcome::Rejected(reason)
            }
            Ok(response) => {
                tracing::warn!(status = %response.status(), "Signup endpoint refused the request");
                self.store_locally(&email).await
            }
            Err(e) => {
                tracing::warn!(error = %e, "Signup endpoint is unreachable");
                self.store_locally(&email).await
            }
        }
    }

    async fn store_locally(&self, email: &SubscriberEmail) -> FormOutcome {
        match self.store.store(email).await {
            Ok(_) => FormOutcome::StoredLocally,
            Err(e) => {
                tracing::error!(error.cause_chain = ?e, "Failed to store the email locally");
                FormOutcome::Failed
            }
        }
    }
}

/// JSON array of addresses kept on disk.
#[derive(Debug, Clone)]
pub struct LocalEmailStore {
    path: PathBuf,
}

impl LocalEmailStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Stored addresses. A missing or unreadable file reads as empty.
    pub async fn load(&self) -> Vec<String> {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(_) => return Vec::new(),
        };

        serde_json::from_slice(&contents).unwrap_or_else(|e| {
            tracing::warn!(error = %e, path = %self.path.display(), "Ignoring unreadable email store");
            Vec::new()
        })
    }

    /// Returns `false` when the address was already stored.
    pub async fn store(&self, email: &SubscriberEmail) -> Result<bool, anyhow::Error> {
        let mut emails = self.load().await;
        if emails.iter().any(|stored| stored == email.as_ref()) {
            return Ok(false);
        }
        emails.push(email.to_string());

        let contents = serde_json::to_vec(&emails).context("Failed to serialize stored emails")?;
        tokio::fs::write(&self.path, contents)
            .await
            .context(format!("Failed to write {}", self.path.display()))?;

        Ok(true)
    }
}
