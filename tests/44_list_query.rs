mod common;

use anyhow::Result;
use admin_api::types::Role;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

use common::{error_code, error_fields, TestServer};

async fn seed_users(server: &TestServer) -> Result<()> {
    for (email, name, role) in [
        ("ada@example.com", "Ada Lovelace", "admin"),
        ("grace@example.com", "Grace Hopper", "editor"),
        ("alan@example.com", "Alan Turing", "viewer"),
        ("linus@example.com", "Linus", "viewer"),
    ] {
        server
            .create("/users", json!({"email": email, "name": name, "role": role}))
            .await?;
    }
    Ok(())
}

fn emails(body: &Value) -> Vec<String> {
    body["data"]["items"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|u| u["email"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn list_returns_page_envelope() -> Result<()> {
    let server = TestServer::spawn().await?;
    seed_users(&server).await?;

    let (status, body) = server.get("/users?page=2&page_size=3", Role::Viewer).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["total"], json!(4));
    assert_eq!(body["data"]["page"], json!(2));
    assert_eq!(body["data"]["page_size"], json!(3));
    assert_eq!(emails(&body), vec!["linus@example.com".to_string()]);
    Ok(())
}

#[tokio::test]
async fn filter_order_and_search_query_params() -> Result<()> {
    let server = TestServer::spawn().await?;
    seed_users(&server).await?;

    let res = server
        .request(Method::GET, "/users", Some(Role::Viewer))?
        .query(&[("filter", r#"{"role": "viewer"}"#), ("order", "email desc")])
        .send()
        .await?;
    let (status, body) = common::read(res).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["total"], json!(2));
    assert_eq!(emails(&body), vec!["linus@example.com".to_string(), "alan@example.com".to_string()]);

    let (_, body) = server.get("/users?search=HOPPER", Role::Viewer).await?;
    assert_eq!(emails(&body), vec!["grace@example.com".to_string()]);
    Ok(())
}

#[tokio::test]
async fn find_accepts_where_body() -> Result<()> {
    let server = TestServer::spawn().await?;
    seed_users(&server).await?;

    let (status, body) = server
        .post(
            "/users/find",
            Role::Viewer,
            json!({
                "where": {"$or": [{"role": "admin"}, {"email": {"$like": "alan%"}}]},
                "order": ["email asc"],
                "page_size": 10
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(emails(&body), vec!["ada@example.com".to_string(), "alan@example.com".to_string()]);
    Ok(())
}

#[tokio::test]
async fn bad_list_parameters_are_400() -> Result<()> {
    let server = TestServer::spawn().await?;

    let (status, body) = server.get("/users?page=0", Role::Viewer).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_fields(&body), vec!["page".to_string()]);

    let (status, body) = server.get("/users?filter=%7Bnot-json", Role::Viewer).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");

    let (status, body) = server
        .post("/users/find", Role::Viewer, json!({"where": {"password": "x"}}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_fields(&body), vec!["where".to_string()]);

    let (status, _) = server.get("/users?order=email%20sideways", Role::Viewer).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server.get("/users?page_size=ten", Role::Viewer).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn permission_wins_over_missing_records() -> Result<()> {
    let server = TestServer::spawn().await?;

    let (status, _) = server.delete("/posts/12345", Role::Viewer).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = server.delete("/posts/12345", Role::Editor).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn search_wildcards_are_literal() -> Result<()> {
    let server = TestServer::spawn().await?;
    seed_users(&server).await?;

    for term in ["%", "_"] {
        let res = server
            .request(Method::GET, "/users", Some(Role::Viewer))?
            .query(&[("search", term)])
            .send()
            .await?;
        let (status, body) = common::read(res).await?;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["total"], json!(0), "search {:?}", term);
    }
    Ok(())
}
