mod helpers;

use axum::http::StatusCode;

async fn capture(app: &helpers::TestApp, admin: &str, body: serde_json::Value) -> helpers::TestResponse {
    app.request("POST", "/admin/payments", Some(body), Some(admin))
        .await
}

#[tokio::test]
async fn test_paid_file_purchase_flow() {
    let app = helpers::TestApp::new().await;
    let admin = app.admin_token().await;
    let (_, seller) = app.signup("seller").await;
    let (buyer_id, buyer) = app.signup("buyer").await;
    let file_id = app.upload(&seller, "game.zip", b"levels", "games", "4.99").await;

    let download = app
        .request("GET", &format!("/files/{}/download", file_id), None, Some(&buyer))
        .await;
    assert_eq!(download.status, StatusCode::PAYMENT_REQUIRED);

    let unpaid = app
        .request("POST", &format!("/files/{}/purchase", file_id), None, Some(&buyer))
        .await;
    assert_eq!(unpaid.status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(unpaid.error_code(), Some("payment_required"));

    let short = capture(
        &app,
        &admin,
        serde_json::json!({
            "user_id": buyer_id,
            "amount": 1.0,
            "reference": "order-1",
            "purpose": "file",
            "file_id": file_id,
        }),
    )
    .await;
    assert_eq!(short.status, StatusCode::OK, "{:?}", short.body);

    let underpaid = app
        .request("POST", &format!("/files/{}/purchase", file_id), None, Some(&buyer))
        .await;
    assert_eq!(underpaid.status, StatusCode::PAYMENT_REQUIRED);

    let paid = capture(
        &app,
        &admin,
        serde_json::json!({
            "user_id": buyer_id,
            "amount": 4.99,
            "reference": "order-2",
            "purpose": "file",
            "file_id": file_id,
        }),
    )
    .await;
    assert_eq!(paid.status, StatusCode::OK);

    let purchase = app
        .request("POST", &format!("/files/{}/purchase", file_id), None, Some(&buyer))
        .await;
    assert_eq!(purchase.status, StatusCode::OK, "{:?}", purchase.body);
    assert_eq!(purchase.body["outcome"]["status"], "purchased");

    let again = app
        .request("POST", &format!("/files/{}/purchase", file_id), None, Some(&buyer))
        .await;
    assert_eq!(again.status, StatusCode::CONFLICT);
    assert_eq!(again.error_code(), Some("already_owned"));

    let entitlement = app
        .request("GET", &format!("/files/{}/entitlement", file_id), None, Some(&buyer))
        .await;
    assert_eq!(entitlement.body["owned"], true);

    let download = app
        .request("GET", &format!("/files/{}/download", file_id), None, Some(&buyer))
        .await;
    assert_eq!(download.status, StatusCode::OK);
    assert_eq!(download.bytes, b"levels");

    let purchases = app.request("GET", "/purchases", None, Some(&buyer)).await;
    assert_eq!(purchases.body.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_free_file_purchase_writes_nothing() {
    let app = helpers::TestApp::new().await;
    let (_, seller) = app.signup("seller").await;
    let (_, buyer) = app.signup("buyer").await;
    let file_id = app.upload(&seller, "free.txt", b"gratis", "tools", "0").await;

    let response = app
        .request("POST", &format!("/files/{}/purchase", file_id), None, Some(&buyer))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["outcome"]["status"], "free");

    let purchases = app.request("GET", "/purchases", None, Some(&buyer)).await;
    assert_eq!(purchases.body.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn test_owner_downloads_own_paid_file() {
    let app = helpers::TestApp::new().await;
    let (_, seller) = app.signup("seller").await;
    let file_id = app.upload(&seller, "album.flac", b"tracks", "music", "10").await;

    let download = app
        .request("GET", &format!("/files/{}/download", file_id), None, Some(&seller))
        .await;
    assert_eq!(download.status, StatusCode::OK);

    let purchase = app
        .request("POST", &format!("/files/{}/purchase", file_id), None, Some(&seller))
        .await;
    assert_eq!(purchase.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_payment_reference_recorded_once() {
    let app = helpers::TestApp::new().await;
    let admin = app.admin_token().await;
    let (buyer_id, _) = app.signup("buyer").await;

    let body = serde_json::json!({
        "user_id": buyer_id,
        "amount": 5.0,
        "reference": "vip-1",
        "purpose": "vip",
        "days": 30,
    });

    let first = capture(&app, &admin, body.clone()).await;
    assert_eq!(first.status, StatusCode::OK);

    let second = capture(&app, &admin, body).await;
    assert_eq!(second.status, StatusCode::CONFLICT);
    assert_eq!(second.error_code(), Some("conflict"));
}

#[tokio::test]
async fn test_vip_payment_upgrades_role_on_next_login() {
    let app = helpers::TestApp::new().await;
    let admin = app.admin_token().await;
    let (vip_id, _) = app.signup("patron").await;

    let response = capture(
        &app,
        &admin,
        serde_json::json!({
            "user_id": vip_id,
            "amount": 9.0,
            "reference": "vip-patron",
            "purpose": "vip",
            "days": 30,
        }),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);

    let token = app.login("patron@example.com", "secret123").await;
    let status = app.request("GET", "/check-vip", None, Some(&token)).await;
    assert_eq!(status.body["vip"], true);
    assert!(status.body["expiresAt"].is_string());

    let profile = app.request("GET", "/profile", None, Some(&token)).await;
    assert_eq!(profile.body["role"], "developer");
}

#[tokio::test]
async fn test_only_admin_records_payments() {
    let app = helpers::TestApp::new().await;
    let (buyer_id, buyer) = app.signup("buyer").await;

    let response = capture(
        &app,
        &buyer,
        serde_json::json!({
            "user_id": buyer_id,
            "amount": 100.0,
            "reference": "forged",
            "purpose": "vip",
            "days": 365,
        }),
    )
    .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_vip_capture_with_absurd_length_rejected() {
    let app = helpers::TestApp::new().await;
    let admin = app.admin_token().await;
    let (buyer_id, _) = app.signup("buyer").await;

    let body = |days: i64| {
        serde_json::json!({
            "user_id": buyer_id,
            "amount": 5.0,
            "reference": "vip-long",
            "purpose": "vip",
            "days": days,
        })
    };

    let rejected = capture(&app, &admin, body(100_000_000)).await;
    assert_eq!(rejected.status, StatusCode::BAD_REQUEST);
    assert_eq!(rejected.error_code(), Some("validation_error"));

    let accepted = capture(&app, &admin, body(30)).await;
    assert_eq!(accepted.status, StatusCode::OK, "{:?}", accepted.body);
}
