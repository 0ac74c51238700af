use axum::http::StatusCode;
use serde_json::json;

mod common;
use common::{admin_token, obtain_token, send, set_role, spawn_app};

/// Admin seeds one categorized title; returns its id.
async fn seed_title(app: &axum::Router, admin: &str) -> i64 {
    let (status, _) = send(
        app,
        "POST",
        "/api/v1/categories/",
        Some(admin),
        Some(json!({"name": "Films", "slug": "films"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        app,
        "POST",
        "/api/v1/titles/",
        Some(admin),
        Some(json!({"name": "Alien", "year": 1979, "category": "films"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    body["data"]["id"].as_i64().unwrap()
}

async fn title_rating(app: &axum::Router, id: i64) -> serde_json::Value {
    let (status, body) = send(app, "GET", &format!("/api/v1/titles/{id}/"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    body["data"]["rating"].clone()
}

#[tokio::test]
async fn rating_is_recomputed_from_reviews() {
    let (app, state) = spawn_app().await;
    let admin = admin_token(&app, &state).await;
    let alice = obtain_token(&app, &state, "alice", "a@x.com").await;
    let bob = obtain_token(&app, &state, "bob", "b@x.com").await;

    let id = seed_title(&app, &admin).await;
    assert!(title_rating(&app, id).await.is_null());

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/titles/{id}/reviews/"),
        Some(&alice),
        Some(json!({"text": "In space no one can hear you scream", "score": 8})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["author"], "alice");
    let alice_review = body["data"]["id"].as_i64().unwrap();

    assert_eq!(title_rating(&app, id).await, json!(8.0));

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/v1/titles/{id}/reviews/"),
        Some(&bob),
        Some(json!({"text": "Good", "score": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    assert_eq!(title_rating(&app, id).await, json!(6.5));

    // Editing a score re-derives the mean with no stored intermediate.
    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/api/v1/titles/{id}/reviews/{alice_review}/"),
        Some(&alice),
        Some(json!({"score": 10})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(title_rating(&app, id).await, json!(7.5));

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/v1/titles/{id}/reviews/{alice_review}/"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(title_rating(&app, id).await, json!(5.0));
}

#[tokio::test]
async fn one_review_per_author_per_title() {
    let (app, state) = spawn_app().await;
    let admin = admin_token(&app, &state).await;
    let alice = obtain_token(&app, &state, "alice", "a@x.com").await;

    let id = seed_title(&app, &admin).await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/v1/titles/{id}/reviews/"),
        Some(&alice),
        Some(json!({"text": "First", "score": 7})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/titles/{id}/reviews/"),
        Some(&alice),
        Some(json!({"text": "Second", "score": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["title"].is_array());

    // Exactly one row survives.
    let (status, body) = send(&app, "GET", &format!("/api/v1/titles/{id}/reviews/"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["results"][0]["text"], "First");
}

#[tokio::test]
async fn review_validation() {
    let (app, state) = spawn_app().await;
    let admin = admin_token(&app, &state).await;
    let alice = obtain_token(&app, &state, "alice", "a@x.com").await;

    let id = seed_title(&app, &admin).await;
    let uri = format!("/api/v1/titles/{id}/reviews/");

    // Anonymous create.
    let (status, _) = send(&app, "POST", &uri, None, Some(json!({"text": "x", "score": 5}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Score out of range.
    for score in [0, 11] {
        let (status, body) = send(
            &app,
            "POST",
            &uri,
            Some(&alice),
            Some(json!({"text": "x", "score": score})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["fields"]["score"].is_array());
    }

    // Blank text.
    let (status, _) = send(
        &app,
        "POST",
        &uri,
        Some(&alice),
        Some(json!({"text": "   ", "score": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Unknown parent title.
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/titles/99999/reviews/",
        Some(&alice),
        Some(json!({"text": "x", "score": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn review_object_permissions() {
    let (app, state) = spawn_app().await;
    let admin = admin_token(&app, &state).await;
    let alice = obtain_token(&app, &state, "alice", "a@x.com").await;
    let bob = obtain_token(&app, &state, "bob", "b@x.com").await;
    let mod_token = obtain_token(&app, &state, "maud", "m@x.com").await;
    set_role(&state, "maud", "moderator").await;

    let id = seed_title(&app, &admin).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/titles/{id}/reviews/"),
        Some(&alice),
        Some(json!({"text": "Mine", "score": 6})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let review = body["data"]["id"].as_i64().unwrap();
    let review_uri = format!("/api/v1/titles/{id}/reviews/{review}/");

    // Another plain user may read but not edit.
    let (status, _) = send(&app, "GET", &review_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &app,
        "PATCH",
        &review_uri,
        Some(&bob),
        Some(json!({"text": "Hijacked"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, "DELETE", &review_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The author may edit.
    let (status, body) = send(
        &app,
        "PATCH",
        &review_uri,
        Some(&alice),
        Some(json!({"text": "Still mine"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["text"], "Still mine");

    // A moderator may delete someone else's review.
    let (status, _) = send(&app, "DELETE", &review_uri, Some(&mod_token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", &review_uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn comments_are_scoped_to_their_review() {
    let (app, state) = spawn_app().await;
    let admin = admin_token(&app, &state).await;
    let alice = obtain_token(&app, &state, "alice", "a@x.com").await;
    let bob = obtain_token(&app, &state, "bob", "b@x.com").await;

    let id = seed_title(&app, &admin).await;

    let (_, body) = send(
        &app,
        "POST",
        &format!("/api/v1/titles/{id}/reviews/"),
        Some(&alice),
        Some(json!({"text": "Alice's take", "score": 8})),
    )
    .await;
    let alice_review = body["data"]["id"].as_i64().unwrap();

    let (_, body) = send(
        &app,
        "POST",
        &format!("/api/v1/titles/{id}/reviews/"),
        Some(&bob),
        Some(json!({"text": "Bob's take", "score": 4})),
    )
    .await;
    let bob_review = body["data"]["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/titles/{id}/reviews/{alice_review}/comments/"),
        Some(&bob),
        Some(json!({"text": "Disagree"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["author"], "bob");
    let comment = body["data"]["id"].as_i64().unwrap();

    // Visible under its own review.
    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/v1/titles/{id}/reviews/{alice_review}/comments/"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 1);

    // Not reachable through a sibling review's path.
    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/v1/titles/{id}/reviews/{bob_review}/comments/{comment}/"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Author edits; a bystander cannot.
    let comment_uri = format!("/api/v1/titles/{id}/reviews/{alice_review}/comments/{comment}/");
    let (status, _) = send(
        &app,
        "PATCH",
        &comment_uri,
        Some(&alice),
        Some(json!({"text": "Intruding"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "PATCH",
        &comment_uri,
        Some(&bob),
        Some(json!({"text": "Strongly disagree"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["text"], "Strongly disagree");

    // Deleting the review removes its comments.
    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/v1/titles/{id}/reviews/{alice_review}/"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let stored = state
        .store()
        .get_comment(
            i32::try_from(alice_review).unwrap(),
            i32::try_from(comment).unwrap(),
        )
        .await
        .unwrap();
    assert!(stored.is_none());
}

#[tokio::test]
async fn deleting_a_user_removes_their_reviews() {
    let (app, state) = spawn_app().await;
    let admin = admin_token(&app, &state).await;
    let alice = obtain_token(&app, &state, "alice", "a@x.com").await;

    let id = seed_title(&app, &admin).await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/v1/titles/{id}/reviews/"),
        Some(&alice),
        Some(json!({"text": "Here today", "score": 9})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(&app, "DELETE", "/api/v1/users/alice/", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", &format!("/api/v1/titles/{id}/reviews/"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 0);

    // Rating reflects the cascade.
    assert!(title_rating(&app, id).await.is_null());
}
