mod common;

use anyhow::Result;
use admin_api::types::Role;
use reqwest::{Method, StatusCode};
use serde_json::json;

use common::{error_code, TestServer};

#[tokio::test]
async fn public_routes_need_no_token() -> Result<()> {
    let server = TestServer::spawn().await?;

    let (status, body) = server.send(Method::GET, "/", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["name"], json!("Admin API"));

    let (status, body) = server.send(Method::GET, "/health", None, None).await?;
    assert_eq!(status, StatusCode::OK, "health: {}", body);
    assert_eq!(body["data"]["status"], json!("ok"));
    Ok(())
}

#[tokio::test]
async fn missing_token_is_401() -> Result<()> {
    let server = TestServer::spawn().await?;

    for path in ["/auth/me", "/users", "/posts/1", "/analytics"] {
        let (status, body) = server.send(Method::GET, path, None, None).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{} answered {}", path, status);
        assert_eq!(body["success"], json!(false));
        assert_eq!(error_code(&body), "UNAUTHORIZED");
    }
    Ok(())
}

#[tokio::test]
async fn malformed_token_is_401() -> Result<()> {
    let server = TestServer::spawn().await?;

    let res = server
        .request(Method::GET, "/auth/me", None)?
        .bearer_auth("not.a.jwt")
        .send()
        .await?;
    let (status, body) = common::read(res).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "UNAUTHORIZED");

    let res = server
        .request(Method::GET, "/auth/me", None)?
        .header("authorization", "Basic YWRtaW46YWRtaW4=")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn me_returns_token_actor() -> Result<()> {
    let server = TestServer::spawn().await?;

    let (status, body) = server.get("/auth/me", Role::Editor).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({"id": "editor-1", "name": "Test editor", "role": "editor"}));
    Ok(())
}

#[tokio::test]
async fn unknown_route_uses_error_envelope() -> Result<()> {
    let server = TestServer::spawn().await?;

    let (status, body) = server.send(Method::GET, "/nowhere", None, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "NOT_FOUND");
    Ok(())
}
