use axum::http::StatusCode;
use serde_json::json;

mod common;
use common::{admin_token, obtain_token, send, spawn_app};

#[tokio::test]
async fn category_permission_matrix() {
    let (app, state) = spawn_app().await;

    // Anonymous read passes.
    let (status, _) = send(&app, "GET", "/api/v1/categories/", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let payload = json!({"name": "Books", "slug": "books"});

    // Anonymous mutation: unauthenticated.
    let (status, _) = send(&app, "POST", "/api/v1/categories/", None, Some(payload.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Plain user mutation: forbidden.
    let user = obtain_token(&app, &state, "alice", "a@x.com").await;
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/categories/",
        Some(&user),
        Some(payload.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Admin mutation: created.
    let admin = admin_token(&app, &state).await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/categories/",
        Some(&admin),
        Some(payload),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["slug"], "books");
}

#[tokio::test]
async fn category_crud() {
    let (app, state) = spawn_app().await;
    let admin = admin_token(&app, &state).await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/categories/",
        Some(&admin),
        Some(json!({"name": "Films", "slug": "films"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Duplicate slug is a field error, not a crash.
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/categories/",
        Some(&admin),
        Some(json!({"name": "Films again", "slug": "films"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["slug"].is_array());

    // Bad slug charset.
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/categories/",
        Some(&admin),
        Some(json!({"name": "Bad", "slug": "no spaces"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "GET", "/api/v1/categories/films/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Films");

    let (status, body) = send(
        &app,
        "PATCH",
        "/api/v1/categories/films/",
        Some(&admin),
        Some(json!({"name": "Movies"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Movies");

    let (status, _) = send(&app, "DELETE", "/api/v1/categories/films/", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", "/api/v1/categories/films/", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn genre_crud() {
    let (app, state) = spawn_app().await;
    let admin = admin_token(&app, &state).await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/genres/",
        Some(&admin),
        Some(json!({"name": "Science Fiction", "slug": "sci-fi"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, "GET", "/api/v1/genres/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["results"][0]["slug"], "sci-fi");

    let (status, _) = send(&app, "DELETE", "/api/v1/genres/sci-fi/", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "DELETE", "/api/v1/genres/sci-fi/", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

async fn seed_title(app: &axum::Router, admin: &str) -> i64 {
    let (status, _) = send(
        app,
        "POST",
        "/api/v1/categories/",
        Some(admin),
        Some(json!({"name": "Books", "slug": "books"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    for (name, slug) in [("Fantasy", "fantasy"), ("Adventure", "adventure")] {
        let (status, _) = send(
            app,
            "POST",
            "/api/v1/genres/",
            Some(admin),
            Some(json!({"name": name, "slug": slug})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(
        app,
        "POST",
        "/api/v1/titles/",
        Some(admin),
        Some(json!({
            "name": "The Hobbit",
            "year": 1937,
            "description": "There and back again",
            "category": "books",
            "genre": ["fantasy", "adventure"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    body["data"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn title_read_expands_relations() {
    let (app, state) = spawn_app().await;
    let admin = admin_token(&app, &state).await;

    let id = seed_title(&app, &admin).await;

    let (status, body) = send(&app, "GET", &format!("/api/v1/titles/{id}/"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["category"]["slug"], "books");
    assert_eq!(body["data"]["genre"].as_array().unwrap().len(), 2);
    // No reviews yet: rating is null, not zero.
    assert!(body["data"]["rating"].is_null());
}

#[tokio::test]
async fn title_write_validation() {
    let (app, state) = spawn_app().await;
    let admin = admin_token(&app, &state).await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/categories/",
        Some(&admin),
        Some(json!({"name": "Books", "slug": "books"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Unknown category slug.
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/titles/",
        Some(&admin),
        Some(json!({"name": "X", "year": 2000, "category": "nope"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["category"].is_array());

    // Unknown genre slug.
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/titles/",
        Some(&admin),
        Some(json!({"name": "X", "year": 2000, "category": "books", "genre": ["nope"]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["genre"].is_array());

    // Future year.
    let year = chrono::Datelike::year(&chrono::Utc::now()) + 1;
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/titles/",
        Some(&admin),
        Some(json!({"name": "X", "year": year, "category": "books"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["year"].is_array());

    // Year zero.
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/titles/",
        Some(&admin),
        Some(json!({"name": "X", "year": 0, "category": "books"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn title_list_filters() {
    let (app, state) = spawn_app().await;
    let admin = admin_token(&app, &state).await;

    seed_title(&app, &admin).await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/categories/",
        Some(&admin),
        Some(json!({"name": "Music", "slug": "music"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/titles/",
        Some(&admin),
        Some(json!({"name": "Abbey Road", "year": 1969, "category": "music"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let cases = [
        ("/api/v1/titles/?category=books", 1, "The Hobbit"),
        ("/api/v1/titles/?genre=fantasy", 1, "The Hobbit"),
        ("/api/v1/titles/?name=Abbey", 1, "Abbey Road"),
        ("/api/v1/titles/?year=1937", 1, "The Hobbit"),
    ];
    for (uri, count, name) in cases {
        let (status, body) = send(&app, "GET", uri, None, None).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(body["data"]["count"], count, "{uri}");
        assert_eq!(body["data"]["results"][0]["name"], name, "{uri}");
    }

    let (_, body) = send(&app, "GET", "/api/v1/titles/?category=unknown", None, None).await;
    assert_eq!(body["data"]["count"], 0);

    let (_, body) = send(&app, "GET", "/api/v1/titles/", None, None).await;
    assert_eq!(body["data"]["count"], 2);
}

#[tokio::test]
async fn deleting_category_detaches_titles() {
    let (app, state) = spawn_app().await;
    let admin = admin_token(&app, &state).await;

    let id = seed_title(&app, &admin).await;

    let (status, _) = send(&app, "DELETE", "/api/v1/categories/books/", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    // Title survives with a null category.
    let (status, body) = send(&app, "GET", &format!("/api/v1/titles/{id}/"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["category"].is_null());
}

#[tokio::test]
async fn deleting_title_cascades_to_reviews_and_comments() {
    let (app, state) = spawn_app().await;
    let admin = admin_token(&app, &state).await;
    let alice = obtain_token(&app, &state, "alice", "a@x.com").await;

    let id = seed_title(&app, &admin).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/titles/{id}/reviews/"),
        Some(&alice),
        Some(json!({"text": "Classic", "score": 9})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let review_id = body["data"]["id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/v1/titles/{id}/reviews/{review_id}/comments/"),
        Some(&alice),
        Some(json!({"text": "Agreed"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(&app, "DELETE", &format!("/api/v1/titles/{id}/"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    // Nothing left behind.
    let review = state
        .store()
        .get_review(i32::try_from(id).unwrap(), i32::try_from(review_id).unwrap())
        .await
        .unwrap();
    assert!(review.is_none());

    let (status, _) = send(&app, "GET", &format!("/api/v1/titles/{id}/"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn user_management_is_admin_gated() {
    let (app, state) = spawn_app().await;
    let admin = admin_token(&app, &state).await;
    let alice = obtain_token(&app, &state, "alice", "a@x.com").await;

    let (status, _) = send(&app, "GET", "/api/v1/users/", Some(&alice), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "GET", "/api/v1/users/", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, "GET", "/api/v1/users/", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 2);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/users/",
        Some(&admin),
        Some(json!({"username": "carol", "email": "c@x.com", "role": "moderator"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["role"], "moderator");

    // Reserved username is rejected here too.
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/users/",
        Some(&admin),
        Some(json!({"username": "me", "email": "m@x.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "GET", "/api/v1/users/carol/", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "c@x.com");

    let (status, _) = send(&app, "DELETE", "/api/v1/users/carol/", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", "/api/v1/users/carol/", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_body_is_a_client_error() {
    let (app, state) = spawn_app().await;
    let admin = admin_token(&app, &state).await;

    // Missing required field.
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/categories/",
        Some(&admin),
        Some(json!({"name": "No slug"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
