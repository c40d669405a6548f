use aws_lambda_events::apigw::{ApiGatewayProxyRequest, ApiGatewayProxyResponse};
use aws_lambda_events::encodings::Body;
use base64::Engine;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue};
use signup::opt_in::OptInProtocol;
use signup::routes::{ConfirmationError, ConfirmationParameters, SignupRequest, SubscribeError};

/// Lambda `subscribe`: same contract as `POST /subscriptions`.
#[tracing::instrument(name = "Lambda subscribe", skip(protocol, request))]
pub async fn handle_subscribe(
    protocol: &OptInProtocol,
    request: &ApiGatewayProxyRequest,
) -> ApiGatewayProxyResponse {
    let outcome = match request_body(request) {
        Ok(body) => match SignupRequest::from_body(&body) {
            Ok(SignupRequest { email, source }) => protocol
                .request_signup(email.as_deref().unwrap_or_default(), source.as_deref())
                .await
                .map_err(SubscribeError::from),
            Err(e) => Err(e),
        },
        Err(e) => {
            tracing::info!(error = %e, "Rejecting an undecodable signup body");
            Err(SubscribeError::InvalidRequest)
        }
    };

    match outcome {
        Ok(outcome) => json_response(200, outcome.message()),
        Err(e) => {
            if let SubscribeError::UnexpectedError(_) = e {
                tracing::error!(error.cause_chain = ?e, "Signup request failed");
            }
            json_response(e.status().as_u16(), e.message())
        }
    }
}

/// Lambda `verify`: same contract as `/subscriptions/confirm`. Body fields
/// win over query string parameters.
#[tracing::instrument(name = "Lambda verify", skip(protocol, request))]
pub async fn handle_verify(
    protocol: &OptInProtocol,
    request: &ApiGatewayProxyRequest,
) -> ApiGatewayProxyResponse {
    let query = ConfirmationParameters {
        email: request
            .query_string_parameters
            .first("email")
            .map(str::to_string),
        token: request
            .query_string_parameters
            .first("token")
            .map(str::to_string),
    };

    let parameters = match request_body(request) {
        Ok(body) => ConfirmationParameters::from_body(&body).map(|body| match body {
            Some(body) => body.or(query),
            None => query,
        }),
        Err(e) => Err(ConfirmationError::ValidationError(e.to_string())),
    };

    let outcome = match parameters {
        Ok(parameters) => protocol
            .verify_token(
                parameters.email.as_deref().unwrap_or_default(),
                parameters.token.as_deref().unwrap_or_default(),
            )
            .await
            .map_err(ConfirmationError::from),
        Err(e) => Err(e),
    };

    match outcome {
        Ok(outcome) => json_response(200, outcome.message()),
        Err(e) => {
            match e {
                ConfirmationError::UnexpectedError(_) => {
                    tracing::error!(error.cause_chain = ?e, "Confirmation request failed")
                }
                _ => tracing::info!(reason = %e, "Confirmation request rejected"),
            }
            json_response(e.status().as_u16(), e.message())
        }
    }
}

/// Raw body bytes, base64 decoded when API Gateway flags it. Empty when the
/// request carries no body.
fn request_body(request: &ApiGatewayProxyRequest) -> Result<Vec<u8>, base64::DecodeError> {
    match request.body.as_deref() {
        None => Ok(Vec::new()),
        Some(body) if request.is_base64_encoded => {
            base64::engine::general_purpose::STANDARD.decode(body.trim())
        }
        Some(body) => Ok(body.as_bytes().to_vec()),
    }
}

fn json_response(status_code: u16, message: &str) -> ApiGatewayProxyResponse {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let mut response = ApiGatewayProxyResponse::default();
    response.status_code = i64::from(status_code);
    response.headers = headers;
    response.body = Some(Body::Text(
        serde_json::json!({ "message": message }).to_string(),
    ));
    response
}
