use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tower::ServiceExt;

use hearth_db::Database;
use hearth_db::migrations::DEFAULT_SERVER_ID;

use crate::{AppState, AppStateInner, router};

fn app() -> (Router, AppState) {
    let state = AppStateInner::new(Database::open_in_memory().unwrap());
    (router(state.clone()), state)
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, HeaderMap, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, json)
}

async fn register(app: &Router, username: &str) -> i64 {
    let (status, _, body) = call(
        app,
        Method::POST,
        "/auth",
        Some(json!({
            "action": "register",
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "password123",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "register {username}: {body}");
    body["user"]["id"].as_i64().unwrap()
}

// -- Auth --

#[tokio::test]
async fn register_returns_user_and_joins_default_server() {
    let (app, state) = app();

    let (status, _, body) = call(
        &app,
        Method::POST,
        "/auth",
        Some(json!({
            "action": "register",
            "username": "alice",
            "email": "Alice@Example.com",
            "password": "password123",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Registration successful");
    let user = body["user"].as_object().unwrap();
    assert_eq!(user["username"], "alice");
    assert_eq!(user["email"], "alice@example.com");
    assert_eq!(user["status"], "offline");
    assert!(user["avatar_url"].is_null());
    assert!(!user.contains_key("password_hash"));
    assert!(!user.contains_key("password"));

    let id = user["id"].as_i64().unwrap();
    assert_eq!(state.db.get_member_server_ids(id).unwrap(), vec![DEFAULT_SERVER_ID]);
}

#[tokio::test]
async fn register_and_login_routes_work_without_action() {
    let (app, _) = app();

    let (status, _, _) = call(
        &app,
        Method::POST,
        "/auth/register",
        Some(json!({ "username": "bob", "email": "bob@example.com", "password": "password123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) = call(
        &app,
        Method::POST,
        "/auth/login",
        Some(json!({ "email": "bob@example.com", "password": "password123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "bob");
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let (app, _) = app();
    register(&app, "alice").await;

    let (status, _, body) = call(
        &app,
        Method::POST,
        "/auth",
        Some(json!({
            "action": "register",
            "username": "alice2",
            "email": "alice@example.com",
            "password": "password123",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());

    let (status, _, _) = call(
        &app,
        Method::POST,
        "/auth",
        Some(json!({
            "action": "register",
            "username": "alice",
            "email": "other@example.com",
            "password": "password123",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn register_validates_input() {
    let (app, _) = app();

    let cases = [
        json!({ "action": "register", "username": "al", "email": "al@example.com", "password": "password123" }),
        json!({ "action": "register", "username": "alice", "email": "not-an-email", "password": "password123" }),
        json!({ "action": "register", "username": "alice", "email": "alice@example.com", "password": "short" }),
        json!({ "action": "register", "username": "alice", "email": "alice@example.com" }),
    ];
    for case in cases {
        let (status, _, _) = call(&app, Method::POST, "/auth", Some(case.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{case}");
    }
}

#[tokio::test]
async fn login_accepts_only_matching_credentials() {
    let (app, _) = app();
    let id = register(&app, "alice").await;

    let (status, _, body) = call(
        &app,
        Method::POST,
        "/auth",
        Some(json!({ "action": "login", "email": "alice@example.com", "password": "password123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], id);
    assert_eq!(body["message"], "Login successful");

    for (email, password) in [
        ("alice@example.com", "wrong-password"),
        ("nobody@example.com", "password123"),
    ] {
        let (status, _, body) = call(
            &app,
            Method::POST,
            "/auth",
            Some(json!({ "action": "login", "email": email, "password": password })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "error": "Invalid credentials" }));
    }
}

#[tokio::test]
async fn legacy_sha256_login_upgrades_hash() {
    let (app, state) = app();
    let legacy = hex::encode(Sha256::digest(b"old-password"));
    let user = state
        .db
        .create_user("legacy", "legacy@example.com", &legacy, DEFAULT_SERVER_ID)
        .unwrap();

    let (status, _, body) = call(
        &app,
        Method::POST,
        "/auth",
        Some(json!({ "action": "login", "email": "legacy@example.com", "password": "old-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], user.id);

    let stored = state.db.get_user_by_id(user.id).unwrap().unwrap();
    assert!(stored.password_hash.starts_with("$argon2id$"));

    // Upgraded hash still accepts the same password
    let (status, _, _) = call(
        &app,
        Method::POST,
        "/auth",
        Some(json!({ "action": "login", "email": "legacy@example.com", "password": "old-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn legacy_login_succeeds_when_hash_upgrade_fails() {
    let (app, state) = app();
    let legacy = hex::encode(Sha256::digest(b"old-password"));
    let user = state
        .db
        .create_user("stuck", "stuck@example.com", &legacy, DEFAULT_SERVER_ID)
        .unwrap();

    state
        .db
        .with_conn_mut(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER freeze_hash BEFORE UPDATE OF password_hash ON users
                 BEGIN SELECT RAISE(ABORT, 'password hashes are frozen'); END;",
            )?;
            Ok(())
        })
        .unwrap();

    let (status, _, body) = call(
        &app,
        Method::POST,
        "/auth",
        Some(json!({ "action": "login", "email": "stuck@example.com", "password": "old-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["user"]["id"], user.id);

    let stored = state.db.get_user_by_id(user.id).unwrap().unwrap();
    assert_eq!(stored.password_hash, legacy);
}

#[tokio::test]
async fn unknown_auth_action_is_method_not_allowed() {
    let (app, _) = app();

    for body in [json!({ "action": "delete" }), json!({ "email": "a@b.c" })] {
        let (status, _, body) = call(&app, Method::POST, "/auth", Some(body)).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body, json!({ "error": "Method not allowed" }));
    }

    let (status, _, body) = call(&app, Method::GET, "/auth", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"], "Method not allowed");
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let (app, _) = app();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn auth_body_is_read_without_content_type() {
    let (app, _) = app();

    // No body at all: same as a missing action
    let (status, _, body) = call(&app, Method::POST, "/auth", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body, json!({ "error": "Method not allowed" }));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth")
        .body(Body::from("{}"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    let register = json!({
        "action": "register",
        "username": "plain",
        "email": "plain@example.com",
        "password": "password123",
    });
    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(register.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// -- Contacts --

#[tokio::test]
async fn contacts_exclude_self_and_report_friendship() {
    let (app, _) = app();
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;
    let carol = register(&app, "carol").await;

    // Bob adds Alice; Alice sees it from the other direction
    let (status, _, body) = call(
        &app,
        Method::POST,
        "/contacts",
        Some(json!({ "user_id": bob, "friend_id": alice })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "Friend added" }));

    let (status, _, body) = call(&app, Method::GET, &format!("/contacts?user_id={alice}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let contacts = body["contacts"].as_array().unwrap();
    assert_eq!(contacts.len(), 2);
    assert!(contacts.iter().all(|c| c["id"] != alice));

    assert_eq!(contacts[0]["id"], bob);
    assert_eq!(contacts[0]["friendship_status"], "accepted");
    assert_eq!(contacts[0]["email"], "bob@example.com");
    assert_eq!(contacts[1]["id"], carol);
    assert!(contacts[1]["friendship_status"].is_null());
}

#[tokio::test]
async fn add_contact_rejects_bad_pairs() {
    let (app, _) = app();
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;

    let (status, _, _) = call(
        &app,
        Method::POST,
        "/contacts",
        Some(json!({ "user_id": alice, "friend_id": alice })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = call(
        &app,
        Method::POST,
        "/contacts",
        Some(json!({ "user_id": alice, "friend_id": 9999 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let add = json!({ "user_id": alice, "friend_id": bob });
    let (status, _, _) = call(&app, Method::POST, "/contacts", Some(add.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = call(&app, Method::POST, "/contacts", Some(add)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _, _) = call(&app, Method::PUT, "/contacts", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn contacts_require_numeric_user_id() {
    let (app, _) = app();

    let (status, _, body) = call(&app, Method::GET, "/contacts?user_id=abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _, _) = call(&app, Method::GET, "/contacts", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// -- Messages --

#[tokio::test]
async fn sent_message_is_listed_first_with_author() {
    let (app, state) = app();
    let alice = register(&app, "alice").await;

    state.db.create_channel(DEFAULT_SERVER_ID, "four", "text").unwrap();
    let channel = state.db.create_channel(DEFAULT_SERVER_ID, "five", "text").unwrap();
    assert_eq!(channel, 5);

    let (status, _, _) = call(
        &app,
        Method::POST,
        "/messages",
        Some(json!({ "channel_id": 5, "user_id": alice, "content": "first" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) = call(
        &app,
        Method::POST,
        "/messages",
        Some(json!({ "channel_id": 5, "user_id": alice, "content": "hello" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let sent = &body["message"];
    assert_eq!(sent["channel_id"], 5);
    assert_eq!(sent["user_id"], alice);
    assert_eq!(sent["content"], "hello");
    assert_eq!(sent["username"], "alice");
    assert!(sent["avatar_url"].is_null());
    assert!(sent["created_at"].is_string());

    let (status, _, body) = call(&app, Method::GET, "/messages?channel_id=5", None).await;
    assert_eq!(status, StatusCode::OK);
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["id"], sent["id"]);
    assert_eq!(messages[0]["content"], "hello");
    assert_eq!(messages[0]["username"], "alice");
    assert_eq!(messages[0]["user_id"], alice);
    assert_eq!(messages[1]["content"], "first");
}

#[tokio::test]
async fn listing_returns_the_fifty_most_recent() {
    let (app, state) = app();
    let alice = register(&app, "alice").await;

    let mut last = 0;
    for i in 0..55 {
        last = state.db.insert_message(1, alice, &format!("msg {i}")).unwrap().id;
    }

    // channel_id defaults to 1
    let (status, _, body) = call(&app, Method::GET, "/messages", None).await;
    assert_eq!(status, StatusCode::OK);
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 50);
    assert_eq!(messages[0]["id"], last);
    assert_eq!(messages[0]["content"], "msg 54");
    assert_eq!(messages[49]["content"], "msg 5");
}

#[tokio::test]
async fn send_message_validates() {
    let (app, _) = app();
    let alice = register(&app, "alice").await;

    let (status, _, _) = call(
        &app,
        Method::POST,
        "/messages",
        Some(json!({ "channel_id": 1, "user_id": alice, "content": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = call(
        &app,
        Method::POST,
        "/messages",
        Some(json!({ "channel_id": 1, "user_id": alice, "content": "x".repeat(4001) })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, body) = call(
        &app,
        Method::POST,
        "/messages",
        Some(json!({ "channel_id": 42, "user_id": alice, "content": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Channel 42 not found");

    let (status, _, _) = call(
        &app,
        Method::POST,
        "/messages",
        Some(json!({ "channel_id": 1, "user_id": 9999, "content": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = call(&app, Method::DELETE, "/messages", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

// -- Servers --

#[tokio::test]
async fn servers_scope_to_membership_and_nest_channels() {
    let (app, state) = app();
    let alice = register(&app, "alice").await;

    let other = state.db.create_server("Other", Some("🌲")).unwrap();
    let second = state.db.create_channel(other, "second", "text").unwrap();
    let first = state.db.create_channel(other, "first", "voice").unwrap();

    let (status, _, body) = call(&app, Method::GET, &format!("/servers?user_id={alice}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let servers = body["servers"].as_array().unwrap();
    assert_eq!(servers.len(), 1);
    assert_eq!(servers[0]["id"], DEFAULT_SERVER_ID);
    let names: Vec<&str> = servers[0]["channels"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["general", "random", "Lounge"]);
    assert_eq!(servers[0]["channels"][2]["type"], "voice");

    let (status, _, body) = call(&app, Method::GET, "/servers", None).await;
    assert_eq!(status, StatusCode::OK);
    let servers = body["servers"].as_array().unwrap();
    assert_eq!(servers.len(), 2);
    assert_eq!(servers[1]["id"], other);
    assert_eq!(servers[1]["icon_url"], "🌲");
    assert!(servers[1]["created_at"].is_string());
    let ids: Vec<i64> = servers[1]["channels"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![second, first]);

    let (status, _, _) = call(&app, Method::POST, "/servers", Some(json!({}))).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn servers_for_user_without_membership_is_empty() {
    let (app, _) = app();

    let (status, _, body) = call(&app, Method::GET, "/servers?user_id=777", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "servers": [] }));
}

#[tokio::test]
async fn blank_server_user_id_lists_all_servers() {
    let (app, _) = app();

    let (_, _, all) = call(&app, Method::GET, "/servers", None).await;
    let (status, _, body) = call(&app, Method::GET, "/servers?user_id=", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, all);
    assert_eq!(body["servers"].as_array().unwrap().len(), 1);

    let (status, _, body) = call(&app, Method::GET, "/servers?user_id=abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

// -- Transport --

#[tokio::test]
async fn options_answers_any_path() {
    let (app, _) = app();

    for path in ["/auth", "/contacts", "/messages", "/servers", "/does/not/exist"] {
        let (status, headers, body) = call(&app, Method::OPTIONS, path, None).await;
        assert_eq!(status, StatusCode::OK, "{path}");
        assert!(body.is_null(), "{path}");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type, X-User-Id");
        assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "86400");
    }

    let (_, headers, _) = call(&app, Method::OPTIONS, "/contacts", None).await;
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "GET, POST, PUT, OPTIONS");
    let (_, headers, _) = call(&app, Method::OPTIONS, "/servers", None).await;
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "GET, POST, OPTIONS");
}

#[tokio::test]
async fn responses_carry_json_and_cors_headers() {
    let (app, _) = app();

    for (method, path) in [(Method::GET, "/servers"), (Method::PUT, "/servers"), (Method::GET, "/nope")] {
        let (_, headers, body) = call(&app, method, path, None).await;
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(body.is_object());
    }

    let (status, _, body) = call(&app, Method::GET, "/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Not found" }));

    let (status, _, body) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

// -- File-backed database --

#[tokio::test]
async fn reads_through_reader_pool_see_committed_writes() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&dir.path().join("hearth.db"), 4).unwrap();
    let app = router(AppStateInner::new(db));

    let alice = register(&app, "alice").await;

    let (status, _, _) = call(
        &app,
        Method::POST,
        "/auth",
        Some(json!({ "action": "login", "email": "alice@example.com", "password": "password123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = call(
        &app,
        Method::POST,
        "/messages",
        Some(json!({ "channel_id": 1, "user_id": alice, "content": "on disk" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Several reads so more than one pooled connection serves a request
    for _ in 0..4 {
        let (status, _, body) = call(&app, Method::GET, "/messages?channel_id=1", None).await;
        assert_eq!(status, StatusCode::OK);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["content"], "on disk");
        assert_eq!(messages[0]["username"], "alice");
    }

    let (status, _, body) = call(&app, Method::GET, &format!("/servers?user_id={alice}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["servers"][0]["channels"].as_array().unwrap().len(), 3);
}
