//! tests/api/verify.rs

use crate::helpers::{assert_detail, spawn_app, spawn_app_with, TestApp, TestUser};
use miolingo::domain::UserRead;

async fn register_user(app: &TestApp) -> TestUser {
    let user = TestUser::generate();
    let response = app.post_register(&user.register_body()).await;
    assert_eq!(response.status().as_u16(), 201);
    user
}

#[tokio::test]
async fn request_verify_token_sends_one_verification_mail() {
    // Arrange
    let app = spawn_app().await;
    let user = register_user(&app).await;

    // Act
    let response = app.post_request_verify_token(&user.email).await;

    // Assert
    assert_eq!(response.status().as_u16(), 202);
    assert_eq!(response.text().await.unwrap(), "null");
    let outbox = app.outbox();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].subject, "Verify your account");
    assert_eq!(outbox[0].recipients.len(), 1);
    assert_eq!(outbox[0].recipients[0].email.to_string(), user.email);
}

#[tokio::test]
async fn verification_mail_links_to_the_frontend_with_a_token() {
    let app = spawn_app().await;
    let user = register_user(&app).await;

    app.post_request_verify_token(&user.email).await;

    let message = &app.outbox()[0];
    let links = app.get_mail_links(message);
    assert_eq!(links.html.path(), "/verify");
    assert!(!links.token().is_empty());
    // html and plain text carry the same link
    assert_eq!(Some(links.html.clone()), links.plain_text);
    let plain_text = message.alternative_body.as_deref().unwrap();
    assert!(plain_text.contains(&user.fullname()));
}

#[tokio::test]
async fn mailed_token_verifies_the_user_once() {
    // Arrange
    let app = spawn_app().await;
    let user = register_user(&app).await;
    app.post_request_verify_token(&user.email).await;
    let token = app.get_mail_links(&app.outbox()[0]).token();

    // Act - Part 1 - Verify
    let response = app.post_verify(&token).await;
    assert_eq!(response.status().as_u16(), 200);
    let body: UserRead = response.json().await.unwrap();
    assert!(body.is_verified);
    assert_eq!(body.email, user.email);

    // Act - Part 2 - Verify again
    let response = app.post_verify(&token).await;
    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_detail(&body, serde_json::json!("VERIFY_USER_ALREADY_VERIFIED"));

    // Act - Part 3 - Verified user can log in
    assert_eq!(user.login(&app).await.status().as_u16(), 200);
}

#[tokio::test]
async fn no_mail_is_sent_for_unknown_or_verified_users() {
    let app = spawn_app().await;

    let unknown = app
        .post_request_verify_token("unknown@miolingo.com")
        .await;
    let verified = app.post_request_verify_token(&app.test_user.email).await;

    assert_eq!(unknown.status().as_u16(), 202);
    assert_eq!(verified.status().as_u16(), 202);
    assert!(app.outbox().is_empty());
}

#[tokio::test]
async fn invalid_tokens_are_rejected() {
    let app = spawn_app().await;

    let response = app.post_verify("not-a-token").await;

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_detail(&body, serde_json::json!("VERIFY_USER_BAD_TOKEN"));
}

#[tokio::test]
async fn token_is_bound_to_the_email_it_was_issued_for() {
    let app = spawn_app().await;
    let user = register_user(&app).await;
    app.post_request_verify_token(&user.email).await;
    let token = app.get_mail_links(&app.outbox()[0]).token();
    sqlx::query("UPDATE users SET email = $1 WHERE email = $2")
        .bind(format!("changed-{}", user.email))
        .bind(&user.email)
        .execute(&app.db_pool)
        .await
        .unwrap();

    let response = app.post_verify(&token).await;

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_detail(&body, serde_json::json!("VERIFY_USER_BAD_TOKEN"));
}

#[tokio::test]
async fn request_verify_token_rejects_invalid_email() {
    let app = spawn_app().await;

    let response = app.post_request_verify_token("not-an-email").await;

    assert_eq!(response.status().as_u16(), 422);
}

#[tokio::test]
async fn concurrent_verifications_with_one_token_succeed_once() {
    let app = spawn_app().await;
    let user = register_user(&app).await;
    app.post_request_verify_token(&user.email).await;
    let token = app.get_mail_links(&app.outbox()[0]).token();

    let (a, b, c, d) = tokio::join!(
        app.post_verify(&token),
        app.post_verify(&token),
        app.post_verify(&token),
        app.post_verify(&token),
    );

    let statuses: Vec<u16> = [a, b, c, d].iter().map(|r| r.status().as_u16()).collect();
    assert_eq!(statuses.iter().filter(|s| **s == 200).count(), 1, "{:?}", statuses);
    assert_eq!(statuses.iter().filter(|s| **s == 400).count(), 3, "{:?}", statuses);
}

#[tokio::test]
async fn request_verify_token_fails_when_the_mail_cannot_be_sent() {
    // nothing listens on port 1
    let app = spawn_app_with(|c| {
        c.email.suppress_send = false;
        c.email.port = 1;
        c.email.timeout_seconds = 5;
    })
    .await;
    let user = register_user(&app).await;

    let response = app.post_request_verify_token(&user.email).await;

    assert_eq!(response.status().as_u16(), 500);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_detail(&body, serde_json::json!("Internal Server Error"));
}
