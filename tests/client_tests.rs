use std::{collections::HashMap, time::Duration};

use anyhow::Result;
use notify_worker::{
    clients::{
        ChatClient, MailClient, TemplateStore, chat::ChatWebhookClient, mail::MailApiClient,
        template::TemplateServiceClient,
    },
    error::{ProviderErrorKind, WorkerError, is_retryable},
    models::recipient::Personalization,
};
use serde_json::json;
use tokio_test::assert_ok;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, body_partial_json, header, method, path},
};

const TIMEOUT: Duration = Duration::from_secs(5);

fn mail_client(server: &MockServer) -> Result<MailApiClient> {
    Ok(MailApiClient::new(
        &server.uri(),
        "test-api-key",
        "noreply@example.com",
        "Notifications",
        TIMEOUT,
    )?)
}

fn recipients() -> Vec<Personalization> {
    let substitutions = HashMap::from([("order".to_string(), "42".to_string())]);
    vec![Personalization::to("Ada", "ada@example.com", &substitutions)]
}

/// Test: Mail sends the templated request with bearer auth
#[tokio::test]
async fn test_mail_send_posts_templated_request() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .and(header("authorization", "Bearer test-api-key"))
        .and(body_partial_json(json!({
            "template_id": "d-order",
            "from": { "email": "noreply@example.com", "name": "Notifications" }
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let client = mail_client(&server)?;
    assert_ok!(client.send_multiple("d-order", &recipients()).await);

    Ok(())
}

/// Test: Mail 503 responses are transient, 400 responses are permanent
#[tokio::test]
async fn test_mail_status_codes_are_classified() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad template"))
        .mount(&server)
        .await;

    let client = mail_client(&server)?;

    let err = client
        .send_multiple("d-order", &recipients())
        .await
        .expect_err("503 should fail");
    assert!(matches!(
        err,
        WorkerError::Provider {
            kind: ProviderErrorKind::Unavailable,
            ..
        }
    ));
    assert!(is_retryable(&err));

    let err = client
        .send_multiple("d-order", &recipients())
        .await
        .expect_err("400 should fail");
    assert!(matches!(
        err,
        WorkerError::Provider {
            kind: ProviderErrorKind::InvalidArgument,
            ..
        }
    ));
    assert!(!is_retryable(&err));

    Ok(())
}

/// Test: Chat webhook receives the report text
#[tokio::test]
async fn test_chat_posts_text() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/hooks/reports"))
        .and(body_json(json!({ "text": "New contact received" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatWebhookClient::new(&format!("{}/hooks/reports", server.uri()), TIMEOUT)?;
    assert_ok!(client.push_message("New contact received").await);

    Ok(())
}

/// Test: Chat rate limiting is retryable
#[tokio::test]
async fn test_chat_rate_limit_is_retryable() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let client = ChatWebhookClient::new(&server.uri(), TIMEOUT)?;
    let err = client
        .push_message("hello")
        .await
        .expect_err("429 should fail");

    assert!(matches!(
        err,
        WorkerError::Provider {
            provider: "chat",
            kind: ProviderErrorKind::ResourceExhausted,
            ..
        }
    ));
    assert!(is_retryable(&err));

    Ok(())
}

/// Test: Templates are read from the service envelope
#[tokio::test]
async fn test_template_fetch_unwraps_envelope() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/templates/push/push-order"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "id": "push-order",
                "title": "Order {{order}}",
                "body": "Hi {{name}}",
                "image_url": "https://cdn.example.com/order.png"
            },
            "message": "ok"
        })))
        .mount(&server)
        .await;

    let client = TemplateServiceClient::new(&server.uri(), TIMEOUT)?;
    let template = client.push_template("push-order").await?;

    assert_eq!(template.title, "Order {{order}}");
    assert_eq!(
        template.image_url.as_deref(),
        Some("https://cdn.example.com/order.png")
    );

    Ok(())
}

/// Test: Missing templates map to not-found errors
#[tokio::test]
async fn test_missing_template_is_not_found() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/templates/report/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/templates/message/disabled"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error": "template disabled",
            "message": "failed"
        })))
        .mount(&server)
        .await;

    let client = TemplateServiceClient::new(&server.uri(), TIMEOUT)?;

    let err = client
        .report_template("gone")
        .await
        .expect_err("404 should fail");
    assert!(matches!(err, WorkerError::NotFound(_)));

    let err = client
        .message_template("disabled")
        .await
        .expect_err("unsuccessful envelope should fail");
    assert!(
        matches!(err, WorkerError::NotFound(ref message) if message.contains("template disabled"))
    );

    Ok(())
}

/// Test: Template service outages are retryable
#[tokio::test]
async fn test_template_service_error_is_retryable() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = TemplateServiceClient::new(&server.uri(), TIMEOUT)?;
    let err = client
        .message_template("any")
        .await
        .expect_err("500 should fail");

    assert!(is_retryable(&err));

    Ok(())
}
