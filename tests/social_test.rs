mod helpers;

use axum::http::StatusCode;

#[tokio::test]
async fn test_like_toggle() {
    let app = helpers::TestApp::new().await;
    let (_, alice) = app.signup("alice").await;
    let (_, bob) = app.signup("bob").await;
    let file_id = app.upload(&alice, "pic.jpg", b"jpeg", "images", "0").await;

    let like = app
        .request("POST", &format!("/files/{}/like", file_id), None, Some(&bob))
        .await;
    assert_eq!(like.status, StatusCode::OK);
    assert_eq!(like.body["liked"], true);

    let count = app
        .request("GET", &format!("/files/{}/likes", file_id), None, None)
        .await;
    assert_eq!(count.body["total"], 1);

    let liked = app
        .request("GET", &format!("/files/{}/liked", file_id), None, Some(&bob))
        .await;
    assert_eq!(liked.body["liked"], true);

    let unlike = app
        .request("POST", &format!("/files/{}/like", file_id), None, Some(&bob))
        .await;
    assert_eq!(unlike.body["liked"], false);

    let count = app
        .request("GET", &format!("/files/{}/likes", file_id), None, None)
        .await;
    assert_eq!(count.body["total"], 0);
}

#[tokio::test]
async fn test_comments_add_list_delete() {
    let app = helpers::TestApp::new().await;
    let (_, alice) = app.signup("alice").await;
    let (_, bob) = app.signup("bob").await;
    let file_id = app.upload(&alice, "book.pdf", b"pages", "books", "0").await;

    let empty = app
        .request(
            "POST",
            &format!("/files/{}/comments", file_id),
            Some(serde_json::json!({ "content": "   " })),
            Some(&bob),
        )
        .await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    let added = app
        .request(
            "POST",
            &format!("/files/{}/comments", file_id),
            Some(serde_json::json!({ "content": "Great read" })),
            Some(&bob),
        )
        .await;
    assert_eq!(added.status, StatusCode::OK, "{:?}", added.body);
    let comment_id = added.body["comment"]["id"].as_i64().unwrap();

    let listed = app
        .request("GET", &format!("/files/{}/comments", file_id), None, None)
        .await;
    assert_eq!(listed.status, StatusCode::OK);
    assert_eq!(listed.body[0]["content"], "Great read");
    assert_eq!(listed.body[0]["username"], "bob");

    let by_other = app
        .request("DELETE", &format!("/comments/{}", comment_id), None, Some(&alice))
        .await;
    assert_eq!(by_other.status, StatusCode::FORBIDDEN);

    let by_author = app
        .request("DELETE", &format!("/comments/{}", comment_id), None, Some(&bob))
        .await;
    assert_eq!(by_author.status, StatusCode::OK);

    let listed = app
        .request("GET", &format!("/files/{}/comments", file_id), None, None)
        .await;
    assert_eq!(listed.body.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn test_global_chat() {
    let app = helpers::TestApp::new().await;
    let (_, alice) = app.signup("alice").await;
    let (_, bob) = app.signup("bob").await;

    let posted = app
        .request(
            "POST",
            "/chat/global",
            Some(serde_json::json!({ "content": "hello everyone" })),
            Some(&alice),
        )
        .await;
    assert_eq!(posted.status, StatusCode::OK, "{:?}", posted.body);

    let history = app.request("GET", "/chat/global", None, Some(&bob)).await;
    assert_eq!(history.status, StatusCode::OK);
    assert_eq!(history.body[0]["content"], "hello everyone");
    assert_eq!(history.body[0]["username"], "alice");

    let unknown = app.request("GET", "/chat/lobby", None, Some(&bob)).await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_private_chat_visible_to_participants() {
    let app = helpers::TestApp::new().await;
    let (_, alice) = app.signup("alice").await;
    let (_, bob) = app.signup("bob").await;
    let (_, carol) = app.signup("carol").await;

    let no_receiver = app
        .request(
            "POST",
            "/chat/private",
            Some(serde_json::json!({ "content": "hi" })),
            Some(&alice),
        )
        .await;
    assert_eq!(no_receiver.status, StatusCode::BAD_REQUEST);

    let posted = app
        .request(
            "POST",
            "/chat/private",
            Some(serde_json::json!({ "content": "just for you", "receiver": "bob" })),
            Some(&alice),
        )
        .await;
    assert_eq!(posted.status, StatusCode::OK, "{:?}", posted.body);

    let bob_view = app
        .request("GET", "/chat/private?with=alice", None, Some(&bob))
        .await;
    assert_eq!(bob_view.body.as_array().map(Vec::len), Some(1));

    let carol_view = app.request("GET", "/chat/private", None, Some(&carol)).await;
    assert_eq!(carol_view.body.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn test_report_message_once() {
    let app = helpers::TestApp::new().await;
    let admin = app.admin_token().await;
    let (_, alice) = app.signup("alice").await;
    let (_, bob) = app.signup("bob").await;

    let posted = app
        .request(
            "POST",
            "/chat/global",
            Some(serde_json::json!({ "content": "buy cheap stuff at my site" })),
            Some(&alice),
        )
        .await;
    let message_id = posted.body["id"].as_i64().unwrap();

    let report = app
        .request(
            "POST",
            "/report",
            Some(serde_json::json!({ "messageId": message_id })),
            Some(&bob),
        )
        .await;
    assert_eq!(report.status, StatusCode::OK, "{:?}", report.body);

    let duplicate = app
        .request(
            "POST",
            "/report",
            Some(serde_json::json!({ "messageId": message_id })),
            Some(&bob),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let not_admin = app.request("GET", "/admin/reports", None, Some(&bob)).await;
    assert_eq!(not_admin.status, StatusCode::FORBIDDEN);

    let reports = app.request("GET", "/admin/reports", None, Some(&admin)).await;
    assert_eq!(reports.status, StatusCode::OK);
    assert_eq!(reports.body["reports"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_admin_user_management() {
    let app = helpers::TestApp::new().await;
    let admin = app.admin_token().await;
    let (bob_id, bob) = app.signup("bob").await;

    let forbidden = app.request("GET", "/admin/users", None, Some(&bob)).await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

    let listed = app.request("GET", "/admin/users?q=bob", None, Some(&admin)).await;
    assert_eq!(listed.status, StatusCode::OK);
    assert_eq!(listed.body["total"], 1);
    assert_eq!(listed.body["users"][0]["username"], "bob");

    let bad_role = app
        .request(
            "POST",
            &format!("/admin/users/{}/role", bob_id),
            Some(serde_json::json!({ "role": "superuser" })),
            Some(&admin),
        )
        .await;
    assert_eq!(bad_role.status, StatusCode::BAD_REQUEST);

    let promoted = app
        .request(
            "POST",
            &format!("/admin/users/{}/role", bob_id),
            Some(serde_json::json!({ "role": "developer" })),
            Some(&admin),
        )
        .await;
    assert_eq!(promoted.status, StatusCode::OK);

    let token = app.login("bob@example.com", "secret123").await;
    let profile = app.request("GET", "/profile", None, Some(&token)).await;
    assert_eq!(profile.body["role"], "developer");

    let me = app
        .request("GET", "/profile", None, Some(&admin))
        .await;
    let admin_id = me.body["id"].as_i64().unwrap();
    let self_ban = app
        .request("POST", &format!("/admin/users/{}/ban", admin_id), None, Some(&admin))
        .await;
    assert_eq!(self_ban.status, StatusCode::BAD_REQUEST);
}
