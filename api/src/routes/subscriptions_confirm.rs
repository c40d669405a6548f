use crate::opt_in::{OptInError, OptInProtocol};
use crate::routes::{parse_json_body, ResponseMessage};
use crate::utils::error_chain_fmt;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};

#[derive(serde::Deserialize, Default, Debug)]
pub struct ConfirmationParameters {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

impl ConfirmationParameters {
    /// `Ok(None)` when there is no body, in which case only the query string
    /// is used.
    pub fn from_body(body: &[u8]) -> Result<Option<Self>, ConfirmationError> {
        parse_json_body::<ConfirmationParameters>(body).map_err(|e| {
            tracing::info!(error = %e, "Rejecting an unreadable confirmation body");
            ConfirmationError::ValidationError(e.to_string())
        })
    }

    /// Fields present in `self` win over the ones in `fallback`.
    pub fn or(self, fallback: ConfirmationParameters) -> ConfirmationParameters {
        ConfirmationParameters {
            email: self.email.or(fallback.email),
            token: self.token.or(fallback.token),
        }
    }
}

#[derive(thiserror::Error)]
pub enum ConfirmationError {
    #[error("{0}")]
    ValidationError(String),
    #[error("There is no subscriber associated with the provided email.")]
    UnknownSubscriber,
    #[error("The provided token does not match the pending subscription.")]
    InvalidToken,
    #[error("The provided token has expired.")]
    ExpiredToken,
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl ConfirmationError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::ValidationError(_) | Self::InvalidToken | Self::ExpiredToken => {
                StatusCode::BAD_REQUEST
            }
            Self::UnknownSubscriber => StatusCode::NOT_FOUND,
            Self::UnexpectedError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::ValidationError(_) => "Invalid request",
            Self::UnknownSubscriber => "Not found",
            Self::InvalidToken | Self::ExpiredToken => "Invalid token",
            Self::UnexpectedError(_) => "Internal server error",
        }
    }
}

impl From<OptInError> for ConfirmationError {
    fn from(e: OptInError) -> Self {
        match e {
            OptInError::Validation(reason) => Self::ValidationError(reason),
            OptInError::NotFound => Self::UnknownSubscriber,
            OptInError::TokenMismatch => Self::InvalidToken,
            OptInError::TokenExpired => Self::ExpiredToken,
            other => Self::UnexpectedError(anyhow::Error::new(other)),
        }
    }
}

impl std::fmt::Debug for ConfirmationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for ConfirmationError {
    fn status_code(&self) -> StatusCode {
        self.status()
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            Self::UnexpectedError(_) => {
                tracing::error!(error.cause_chain = ?self, "Confirmation request failed")
            }
            _ => tracing::info!(reason = %self, "Confirmation request rejected"),
        }
        HttpResponse::build(self.status_code()).json(ResponseMessage::new(self.message()))
    }
}

/// Serves both `GET /subscriptions/confirm?email=..&token=..` and a `POST`
/// carrying the same fields as JSON.
#[tracing::instrument(name = "Confirm a pending subscriber", skip(query, body, protocol))]
pub async fn confirm(
    query: Option<web::Query<ConfirmationParameters>>,
    body: web::Bytes,
    protocol: web::Data<OptInProtocol>,
) -> Result<HttpResponse, ConfirmationError> {
    let query = query.map(web::Query::into_inner).unwrap_or_default();
    let parameters = match ConfirmationParameters::from_body(&body)? {
        Some(body) => body.or(query),
        None => query,
    };

    let outcome = protocol
        .verify_token(
            parameters.email.as_deref().unwrap_or_default(),
            parameters.token.as_deref().unwrap_or_default(),
        )
        .await?;

    Ok(HttpResponse::Ok().json(ResponseMessage::new(outcome.message())))
}
