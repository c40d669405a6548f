use crate::helpers::{spawn_app, spawn_app_with};
use serde_json::json;
use signup::domain::SubscriberStatus;
use signup::routes::ResponseMessage;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

async fn message(response: reqwest::Response) -> String {
    response.json::<ResponseMessage>().await.unwrap().message
}

#[tokio::test]
async fn confirmations_without_parameters_are_rejected_with_a_400() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app.get_confirmation(&[]).await;

    // Assert
    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(message(response).await, "Invalid request");
}

#[tokio::test]
async fn confirmations_for_unknown_subscribers_are_a_404() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app
        .get_confirmation(&[("email", "ursula@domain.com"), ("token", "abc")])
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 404);
    assert_eq!(message(response).await, "Not found");
}

#[tokio::test]
async fn clicking_on_the_confirmation_link_confirms_a_subscriber() {
    // Arrange
    let app = spawn_app().await;

    Mock::given(path("/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&app.email_server)
        .await;

    app.post_subscriptions(json!({ "email": "ursula@domain.com" }))
        .await;
    let email_request = &app.email_server.received_requests().await.unwrap()[0];
    let confirmation_links = app.get_confirmation_links(email_request);

    // Act
    let response = reqwest::get(confirmation_links.html).await.unwrap();

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(message(response).await, "Confirmed");
    let saved = app.stored_subscriber("ursula@domain.com").await.unwrap();
    assert_eq!(saved.status, SubscriberStatus::Confirmed);
    assert!(saved.token.is_none());
    assert!(saved.confirmed_at.is_some());
}

#[tokio::test]
async fn confirming_twice_reports_already_confirmed() {
    // Arrange
    let app = spawn_app().await;

    Mock::given(path("/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&app.email_server)
        .await;

    app.post_subscriptions(json!({ "email": "ursula@domain.com" }))
        .await;
    let token = app.stored_token("ursula@domain.com").await;
    let query = [("email", "ursula@domain.com"), ("token", token.as_str())];
    app.get_confirmation(&query).await;
    let confirmed_at = app
        .stored_subscriber("ursula@domain.com")
        .await
        .unwrap()
        .confirmed_at;

    // Act
    let response = app.get_confirmation(&query).await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(message(response).await, "Already confirmed");
    let saved = app.stored_subscriber("ursula@domain.com").await.unwrap();
    assert_eq!(saved.confirmed_at, confirmed_at);
}

#[tokio::test]
async fn a_wrong_token_is_rejected_and_the_subscriber_stays_pending() {
    // Arrange
    let app = spawn_app().await;

    Mock::given(path("/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&app.email_server)
        .await;

    app.post_subscriptions(json!({ "email": "ursula@domain.com" }))
        .await;
    let token = app.stored_token("ursula@domain.com").await;

    // Act
    let response = app
        .post_confirmation(json!({ "email": "ursula@domain.com", "token": "wrong-token" }))
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(message(response).await, "Invalid token");
    assert_eq!(app.stored_token("ursula@domain.com").await, token);
}

#[tokio::test]
async fn a_malformed_body_is_rejected_even_with_valid_query_parameters() {
    // Arrange
    let app = spawn_app().await;

    Mock::given(path("/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&app.email_server)
        .await;

    app.post_subscriptions(json!({ "email": "ursula@domain.com" }))
        .await;
    let token = app.stored_token("ursula@domain.com").await;

    // Act
    let response = app
        .post_raw_confirmation(
            &[("email", "ursula@domain.com"), ("token", token.as_str())],
            "{\"token\": ",
        )
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(message(response).await, "Invalid request");
    let saved = app.stored_subscriber("ursula@domain.com").await.unwrap();
    assert_eq!(saved.status, SubscriberStatus::Pending);
}

#[tokio::test]
async fn confirmation_can_be_posted_as_json() {
    // Arrange
    let app = spawn_app().await;

    Mock::given(path("/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&app.email_server)
        .await;

    app.post_subscriptions(json!({ "email": "A@Example.com" }))
        .await;
    let token = app.stored_token("a@example.com").await;

    // Act
    let response = app
        .post_confirmation(json!({ "email": "a@example.com ", "token": token }))
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(message(response).await, "Confirmed");
}

#[tokio::test]
async fn expired_tokens_are_rejected() {
    // Arrange
    let app = spawn_app_with(|c| c.opt_in.token_ttl_seconds = 1).await;

    Mock::given(path("/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&app.email_server)
        .await;

    app.post_subscriptions(json!({ "email": "ursula@domain.com" }))
        .await;
    let token = app.stored_token("ursula@domain.com").await;
    tokio::time::sleep(Duration::from_secs(2)).await;

    // Act
    let response = app
        .get_confirmation(&[("email", "ursula@domain.com"), ("token", token.as_str())])
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(message(response).await, "Invalid token");
    let saved = app.stored_subscriber("ursula@domain.com").await.unwrap();
    assert_eq!(saved.status, SubscriberStatus::Pending);
}

#[tokio::test]
async fn only_the_latest_confirmation_link_works() {
    // Arrange
    let app = spawn_app().await;

    Mock::given(path("/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&app.email_server)
        .await;

    app.post_subscriptions(json!({ "email": "ursula@domain.com" }))
        .await;
    app.post_subscriptions(json!({ "email": "ursula@domain.com" }))
        .await;
    let requests = app.email_server.received_requests().await.unwrap();
    let first = app.get_confirmation_links(&requests[0]);
    let second = app.get_confirmation_links(&requests[1]);

    // Act
    let stale = reqwest::get(first.plain_text).await.unwrap();
    let fresh = reqwest::get(second.plain_text).await.unwrap();

    // Assert
    assert_eq!(stale.status().as_u16(), 400);
    assert_eq!(fresh.status().as_u16(), 200);
}
