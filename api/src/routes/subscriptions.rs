use crate::opt_in::{OptInError, OptInProtocol};
use crate::routes::{parse_json_body, ResponseMessage};
use crate::utils::error_chain_fmt;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};

#[derive(serde::Deserialize, Debug)]
pub struct SignupRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl SignupRequest {
    /// An empty body is a request without an email.
    pub fn from_body(body: &[u8]) -> Result<Self, SubscribeError> {
        match parse_json_body::<SignupRequest>(body) {
            Ok(Some(request)) => Ok(request),
            Ok(None) => Err(SubscribeError::ValidationError(
                "Signup request has no body".to_string(),
            )),
            Err(e) => {
                tracing::info!(error = %e, "Rejecting an unreadable signup body");
                Err(SubscribeError::InvalidRequest)
            }
        }
    }
}

#[derive(thiserror::Error)]
pub enum SubscribeError {
    #[error("The request body could not be parsed.")]
    InvalidRequest,
    #[error("{0}")]
    ValidationError(String),
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl SubscribeError {
    pub fn status(&self) -> StatusCode {
        match self {
            SubscribeError::InvalidRequest | SubscribeError::ValidationError(_) => {
                StatusCode::BAD_REQUEST
            }
            SubscribeError::UnexpectedError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            SubscribeError::InvalidRequest => "Invalid request",
            SubscribeError::ValidationError(_) => "Invalid email",
            SubscribeError::UnexpectedError(_) => "Internal server error",
        }
    }
}

impl From<OptInError> for SubscribeError {
    fn from(e: OptInError) -> Self {
        match e {
            OptInError::Validation(reason) => SubscribeError::ValidationError(reason),
            other => SubscribeError::UnexpectedError(anyhow::Error::new(other)),
        }
    }
}

impl std::fmt::Debug for SubscribeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for SubscribeError {
    fn status_code(&self) -> StatusCode {
        self.status()
    }

    fn error_response(&self) -> HttpResponse {
        if let SubscribeError::UnexpectedError(_) = self {
            tracing::error!(error.cause_chain = ?self, "Signup request failed");
        }
        HttpResponse::build(self.status_code()).json(ResponseMessage::new(self.message()))
    }
}

#[tracing::instrument(
    name = "Adding a new subscriber",
    skip(body, protocol),
    fields(subscriber_source = tracing::field::Empty)
)]
pub async fn subscribe(
    body: web::Bytes,
    protocol: web::Data<OptInProtocol>,
) -> Result<HttpResponse, SubscribeError> {
    let SignupRequest { email, source } = SignupRequest::from_body(&body)?;
    tracing::Span::current().record(
        "subscriber_source",
        source.as_deref().unwrap_or_default(),
    );

    let outcome = protocol
        .request_signup(email.as_deref().unwrap_or_default(), source.as_deref())
        .await?;

    Ok(HttpResponse::Ok().json(ResponseMessage::new(outcome.message())))
}
