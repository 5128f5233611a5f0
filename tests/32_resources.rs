mod common;

use anyhow::Result;
use admin_api::types::Role;
use reqwest::{Method, StatusCode};
use serde_json::json;

use common::{error_code, error_fields, TestServer};

#[tokio::test]
async fn category_crud_flow() -> Result<()> {
    let server = TestServer::spawn().await?;

    let (status, body) = server
        .post("/categories", Role::Editor, json!({"name": "Rust", "description": "Systems"}))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["success"], json!(true));
    let id = body["data"]["id"].as_i64().unwrap_or_default();
    assert!(id > 0);
    assert_eq!(body["data"]["name"], json!("Rust"));
    assert!(body["data"]["created_at"].is_string());

    let (status, body) = server.get(&format!("/categories/{}", id), Role::Viewer).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["description"], json!("Systems"));

    let (status, body) = server
        .patch(&format!("/categories/{}", id), Role::Editor, json!({"description": null}))
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["name"], json!("Rust"));
    assert_eq!(body["data"]["description"], json!(null));

    // PUT is a partial update too
    let (status, body) = server
        .send(
            Method::PUT,
            &format!("/categories/{}", id),
            Some(Role::Editor),
            Some(json!({"name": "Rust lang"})),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["name"], json!("Rust lang"));

    let (status, body) = server.delete(&format!("/categories/{}", id), Role::Admin).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], json!(id));

    let (status, body) = server.get(&format!("/categories/{}", id), Role::Admin).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn permission_is_checked_before_input() -> Result<()> {
    let server = TestServer::spawn().await?;

    // Invalid email, but a viewer may not create at all
    let (status, body) = server.post("/users", Role::Viewer, json!({"email": "nope"})).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "FORBIDDEN");

    // Editors cannot manage users
    let (status, _) = server.post("/users", Role::Editor, json!({"email": "ada@example.com"})).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = server.post("/users", Role::Admin, json!({"email": "nope"})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");
    assert_eq!(error_fields(&body), vec!["email".to_string()]);
    Ok(())
}

#[tokio::test]
async fn malformed_bodies_and_ids_are_400() -> Result<()> {
    let server = TestServer::spawn().await?;

    let (status, body) = server
        .post("/users", Role::Admin, json!({"email": "ada@example.com", "role": "superuser"}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "INVALID_JSON");

    let (status, _) = server
        .post("/users", Role::Admin, json!({"email": "ada@example.com", "password": "x"}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = server.get("/users/abc", Role::Admin).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "BAD_REQUEST");
    Ok(())
}

#[tokio::test]
async fn oversized_body_is_413() -> Result<()> {
    let server = TestServer::spawn().await?;
    let limit = admin_api::config::config().api.max_request_size_bytes;

    let (status, body) = server
        .post("/categories", Role::Admin, json!({"name": "x".repeat(limit)}))
        .await?;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(error_code(&body), "PAYLOAD_TOO_LARGE");

    // under the limit the body reaches the pipeline
    let (status, body) = server
        .post("/categories", Role::Admin, json!({"name": "x".repeat(101)}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");
    Ok(())
}

#[tokio::test]
async fn duplicate_email_is_409() -> Result<()> {
    let server = TestServer::spawn().await?;

    server.create("/users", json!({"email": "ada@example.com"})).await?;
    let (status, body) = server.post("/users", Role::Admin, json!({"email": "ada@example.com"})).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "CONFLICT");
    Ok(())
}

#[tokio::test]
async fn posts_link_categories_and_check_references() -> Result<()> {
    let server = TestServer::spawn().await?;

    let author = server.create("/users", json!({"email": "ada@example.com", "role": "editor"})).await?;
    let rust = server.create("/categories", json!({"name": "Rust"})).await?;
    let web = server.create("/categories", json!({"name": "Web"})).await?;

    let (status, body) = server
        .post("/posts", Role::Editor, json!({"title": "Hello", "author_id": 999}))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND, "{}", body);

    let (status, body) = server
        .post(
            "/posts",
            Role::Editor,
            json!({"title": "Hello", "author_id": author, "category_ids": [rust, 404]}),
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND, "{}", body);

    let (status, body) = server
        .post(
            "/posts",
            Role::Editor,
            json!({"title": "Hello", "author_id": author, "category_ids": [rust, web]}),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let post = body["data"]["id"].as_i64().unwrap_or_default();
    assert_eq!(body["data"]["category_ids"], json!([rust, web]));
    assert_eq!(body["data"]["published"], json!(false));

    let (status, body) = server
        .patch(&format!("/posts/{}", post), Role::Editor, json!({"category_ids": [web], "published": true}))
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["category_ids"], json!([web]));
    assert_eq!(body["data"]["published"], json!(true));

    // Deleting a category drops its links
    let (status, _) = server.delete(&format!("/categories/{}", web), Role::Admin).await?;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = server.get(&format!("/posts/{}", post), Role::Viewer).await?;
    assert_eq!(body["data"]["category_ids"], json!([]));
    Ok(())
}

#[tokio::test]
async fn user_with_posts_cannot_be_deleted() -> Result<()> {
    let server = TestServer::spawn().await?;

    let author = server.create("/users", json!({"email": "ada@example.com"})).await?;
    let post = server.create("/posts", json!({"title": "Hello", "author_id": author})).await?;

    let (status, body) = server.delete(&format!("/users/{}", author), Role::Admin).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "BAD_REQUEST");

    let (status, _) = server.delete(&format!("/posts/{}", post), Role::Editor).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = server.delete(&format!("/users/{}", author), Role::Admin).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn large_table_revenue_is_computed() -> Result<()> {
    let server = TestServer::spawn().await?;

    let (status, body) = server
        .post(
            "/large-table",
            Role::Editor,
            json!({
                "region": "north",
                "product": "widget",
                "category": "tools",
                "quantity": 3,
                "unit_price": 2.5,
                "status": "pending",
                "revenue": 1000.0
            }),
        )
        .await?;
    // revenue is not an input field
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);

    let (status, body) = server
        .post(
            "/large-table",
            Role::Editor,
            json!({
                "region": "north",
                "product": "widget",
                "category": "tools",
                "quantity": 3,
                "unit_price": 2.5,
                "status": "pending"
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["revenue"], json!(7.5));
    let id = body["data"]["id"].as_i64().unwrap_or_default();

    let (_, body) = server
        .patch(&format!("/large-table/{}", id), Role::Editor, json!({"quantity": 4}))
        .await?;
    assert_eq!(body["data"]["revenue"], json!(10.0));
    Ok(())
}

#[tokio::test]
async fn pokemon_uses_type_on_the_wire() -> Result<()> {
    let server = TestServer::spawn().await?;

    let (status, body) = server
        .post(
            "/pokemon",
            Role::Editor,
            json!({"name": "Bulbasaur", "type": "grass", "hp": 45, "attack": 49, "defense": 49}),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["type"], json!("grass"));

    let (status, body) = server
        .post(
            "/pokemon",
            Role::Editor,
            json!({"name": "Missingno", "type": "bird", "hp": 0, "attack": 1, "defense": 1}),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_fields(&body), vec!["type".to_string(), "hp".to_string()]);
    Ok(())
}

#[tokio::test]
async fn profile_belongs_to_one_user() -> Result<()> {
    let server = TestServer::spawn().await?;

    let user = server.create("/users", json!({"email": "ada@example.com"})).await?;
    let (status, body) = server
        .post("/profiles", Role::Editor, json!({"user_id": user, "bio": "Analyst"}))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);

    let (status, _) = server.post("/profiles", Role::Editor, json!({"user_id": user})).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = server
        .post("/profiles", Role::Editor, json!({"user_id": user + 100, "avatar_url": "ftp://x"}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_fields(&body), vec!["avatar_url".to_string()]);
    Ok(())
}
