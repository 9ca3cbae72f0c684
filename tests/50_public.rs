mod common;

use anyhow::Result;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use jobboard_api::auth::Role;
use serde_json::json;

#[tokio::test]
async fn root_and_health() -> Result<()> {
    let app = common::test_app();

    let res = app.get("/", None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.data()["entities"].as_array().is_some_and(|e| e.contains(&json!("job-skills"))));

    let res = app.get("/health", None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["status"], "ok");

    let res = app.get("/nowhere", None).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn waitlist_is_idempotent() -> Result<()> {
    let app = common::test_app();

    for email in ["Early@Example.com", "early@example.com"] {
        let res = app.post("/api/v1/waitlist", None, json!({ "email": email, "name": "Early Bird" })).await?;
        assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
        assert_eq!(res.data()["email"], "early@example.com");
    }
    assert_eq!(app.store.waitlist(), vec!["early@example.com".to_string()]);

    let res = app.post("/api/v1/waitlist", None, json!({ "email": "not-an-email" })).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.body["field_errors"].get("email").is_some());

    let res = app.post("/api/v1/waitlist", None, json!({})).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn portfolio_shows_active_profile_records() -> Result<()> {
    let app = common::test_app();

    let res = app.get("/api/v1/portfolio/nobody", None).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = app
        .post(
            "/api/auth/register",
            None,
            json!({ "email": "lin@example.com", "username": "lin", "name": "Lin", "password": "correct-horse" }),
        )
        .await?;
    let token = res.data()["token"].as_str().unwrap_or_default().to_string();

    for title in ["GitHub", "Blog"] {
        let res = app
            .post("/api/v1/links", Some(&token), json!({ "title": title, "url": format!("https://{}.example", title) }))
            .await?;
        assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    }
    let blog = app.get("/api/v1/links", Some(&token)).await?;
    let blog_id = blog
        .data()
        .as_array()
        .and_then(|links| links.iter().find(|l| l["title"] == "Blog"))
        .and_then(|l| l["id"].as_str())
        .unwrap_or_default()
        .to_string();
    app.delete(&format!("/api/v1/links/{}", blog_id), Some(&token)).await?;

    let res = app.get("/api/v1/portfolio/LIN", None).await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.data()["user"]["username"], "lin");
    assert!(res.data()["user"].get("email").is_none(), "email is private");
    assert_eq!(res.data()["links"].as_array().map(Vec::len), Some(1));
    assert_eq!(res.data()["certificates"], json!([]));
    Ok(())
}

#[tokio::test]
async fn unconfigured_integrations_are_503() -> Result<()> {
    let app = common::test_app();
    let (_, token) = common::token_for(Role::Candidate);

    let res = app.get("/api/v1/images/search?query=office", Some(&token)).await?;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.body["code"], "SERVICE_UNAVAILABLE");

    let res = app.get("/api/v1/images/search", Some(&token)).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/uploads?category=avatars&ext=png")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "image/png")
        .body(Body::from(vec![0x89, b'P', b'N', b'G']))?;
    let res = app.send(request).await?;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE, "{}", res.body);
    Ok(())
}

#[tokio::test]
async fn upload_input_is_checked_before_storage() -> Result<()> {
    let app = common::test_app();
    let (me, token) = common::token_for(Role::Candidate);

    let res = app.post("/api/v1/uploads?ext=png", Some(&token), json!({})).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.body["field_errors"].get("category").is_some());

    let res = app.post("/api/v1/uploads?category=../etc&ext=png", Some(&token), json!({})).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let other = uuid::Uuid::new_v4();
    let res = app.delete(&format!("/api/v1/uploads/{}/avatars/1-x.png", other), Some(&token)).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app.delete(&format!("/api/v1/uploads/{}/avatars/1-x.png", me), Some(&token)).await?;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    Ok(())
}
