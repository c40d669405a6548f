use crate::helpers::spawn_app;
use serde_json::json;
use signup::domain::SubscriberStatus;
use signup::routes::ResponseMessage;
use std::time::Duration;
use wiremock::matchers::{any, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn subscribe_returns_a_200_for_a_valid_email() {
    // Arrange
    let app = spawn_app().await;

    Mock::given(path("/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&app.email_server)
        .await;

    // Act
    let response = app
        .post_subscriptions(json!({ "email": "ursula@domain.com" }))
        .await;

    // Assert
    assert_eq!(200, response.status().as_u16());
    assert!(response.headers().contains_key("x-request-id"));
    let body: ResponseMessage = response.json().await.unwrap();
    assert_eq!(body.message, "Verification email sent");
}

#[tokio::test]
async fn subscribe_persists_a_pending_subscriber() {
    // Arrange
    let app = spawn_app().await;

    Mock::given(path("/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&app.email_server)
        .await;

    // Act
    app.post_subscriptions(json!({ "email": "Ursula@Domain.com ", "source": "footer" }))
        .await;

    // Assert
    let saved = app
        .stored_subscriber("ursula@domain.com")
        .await
        .expect("Subscriber was not saved");
    assert_eq!(saved.status, SubscriberStatus::Pending);
    assert_eq!(saved.source, "footer");
    assert!(saved.token.is_some());
    assert!(saved.confirmed_at.is_none());
}

#[tokio::test]
async fn subscribe_sends_a_confirmation_email_with_a_link() {
    // Arrange
    let app = spawn_app().await;

    Mock::given(path("/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.email_server)
        .await;

    // Act
    app.post_subscriptions(json!({ "email": "ursula@domain.com" }))
        .await;

    // Assert
    let email_request = &app.email_server.received_requests().await.unwrap()[0];
    let confirmation_links = app.get_confirmation_links(email_request);

    assert_eq!(confirmation_links.html, confirmation_links.plain_text);
    let token = app.stored_token("ursula@domain.com").await;
    let query: Vec<(String, String)> = confirmation_links
        .html
        .query_pairs()
        .into_owned()
        .collect();
    assert!(query.contains(&("email".to_string(), "ursula@domain.com".to_string())));
    assert!(query.contains(&("token".to_string(), token)));
}

#[tokio::test]
async fn subscribe_returns_a_400_when_the_email_is_invalid_or_missing() {
    // Arrange
    let app = spawn_app().await;
    let test_cases = vec![
        (json!({ "email": "" }), "empty email"),
        (json!({ "email": "definitely-not-an-email" }), "invalid email"),
        (json!({ "email": "ursula@domain" }), "domain without a dot"),
        (json!({ "source": "footer" }), "missing email"),
        (json!({}), "empty body"),
    ];

    for (invalid_body, description) in test_cases {
        // Act
        let response = app.post_subscriptions(invalid_body).await;

        // Assert
        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not return a 400 when the payload had an {}",
            description
        );
        let body: ResponseMessage = response.json().await.unwrap();
        assert_eq!(body.message, "Invalid email");
    }
    assert!(app.repository.is_empty().unwrap());
}

#[tokio::test]
async fn subscribe_returns_a_400_for_malformed_json() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app.post_raw_subscriptions("{\"email\": ").await;

    // Assert
    assert_eq!(400, response.status().as_u16());
    let body: ResponseMessage = response.json().await.unwrap();
    assert_eq!(body.message, "Invalid request");
}

#[tokio::test]
async fn subscribe_without_a_body_is_a_missing_email() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app.post_raw_subscriptions("").await;

    // Assert
    assert_eq!(400, response.status().as_u16());
    let body: ResponseMessage = response.json().await.unwrap();
    assert_eq!(body.message, "Invalid email");
    assert!(app.repository.is_empty().unwrap());
}

#[tokio::test]
async fn subscribe_for_a_confirmed_email_sends_no_new_email() {
    // Arrange
    let app = spawn_app().await;

    Mock::given(path("/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.email_server)
        .await;

    app.post_subscriptions(json!({ "email": "ursula@domain.com" }))
        .await;
    let token = app.stored_token("ursula@domain.com").await;
    app.get_confirmation(&[("email", "ursula@domain.com"), ("token", token.as_str())])
        .await;

    // Act
    let response = app
        .post_subscriptions(json!({ "email": "ursula@domain.com" }))
        .await;

    // Assert
    assert_eq!(200, response.status().as_u16());
    let body: ResponseMessage = response.json().await.unwrap();
    assert_eq!(body.message, "Already confirmed");
    let saved = app.stored_subscriber("ursula@domain.com").await.unwrap();
    assert_eq!(saved.status, SubscriberStatus::Confirmed);
}

#[tokio::test]
async fn subscribe_returns_a_500_when_the_email_api_fails() {
    // Arrange
    let app = spawn_app().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .mount(&app.email_server)
        .await;

    // Act
    let response = app
        .post_subscriptions(json!({ "email": "ursula@domain.com" }))
        .await;

    // Assert
    assert_eq!(500, response.status().as_u16());
    let body: ResponseMessage = response.json().await.unwrap();
    assert_eq!(body.message, "Internal server error");
    let saved = app.stored_subscriber("ursula@domain.com").await.unwrap();
    assert_eq!(saved.status, SubscriberStatus::Pending);
}

#[tokio::test]
async fn subscribe_returns_a_500_when_the_email_api_is_too_slow() {
    // Arrange
    let app = spawn_app().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&app.email_server)
        .await;

    // Act
    let response = app
        .post_subscriptions(json!({ "email": "ursula@domain.com" }))
        .await;

    // Assert
    assert_eq!(500, response.status().as_u16());
    assert!(app.stored_subscriber("ursula@domain.com").await.is_some());
}
