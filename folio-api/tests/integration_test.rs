//! Integration tests for the Folio API
//!
//! The first group drives the router without a database: auth guard,
//! validation, rate limiting, security headers, tracking redirects. The
//! second group needs PostgreSQL at `DATABASE_URL` and is skipped without it.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{admin_request, body_json, json_request, json_request_from, next_peer, TestContext};
use folio_shared::models::{
    project::Project,
    subscriber::NewsletterSubscriber,
};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn test_admin_routes_require_token() {
    let ctx = TestContext::offline();

    for (method, uri) in [
        ("GET", "/api/admin/dashboard"),
        ("GET", "/api/consultations"),
        ("POST", "/api/projects"),
        ("DELETE", "/api/skills/00000000-0000-0000-0000-000000000001"),
        ("GET", "/api/analytics/summary"),
    ] {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();

        let (status, body) = body_json(ctx.send(request).await).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        assert_eq!(body["error"], "unauthorized");
    }
}

#[tokio::test]
async fn test_admin_routes_reject_forged_token() {
    let ctx = TestContext::offline();

    let request = Request::builder()
        .uri("/api/consultations")
        .header(header::AUTHORIZATION, "Bearer not.a.jwt")
        .body(Body::empty())
        .unwrap();

    let response = ctx.send(request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_consultation_missing_fields_is_422() {
    let ctx = TestContext::offline();

    let request = json_request(
        "POST",
        "/api/consultations",
        json!({ "email": "not-an-email" }),
    );

    let (status, body) = body_json(ctx.send(request).await).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_error");

    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"name"));
    assert!(fields.contains(&"message"));
    assert!(fields.contains(&"project_type"));
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let ctx = TestContext::offline();

    let request = Request::builder()
        .method("POST")
        .uri("/api/contact")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"name\": "))
        .unwrap();

    let response = ctx.send(request).await;
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_form_submissions_are_rate_limited() {
    let ctx = TestContext::offline();
    let peer = next_peer();
    let submit = || json_request_from(peer, "POST", "/api/contact", json!({}));

    for _ in 0..5 {
        let response = ctx.send(submit()).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(response.headers().contains_key("x-ratelimit-remaining"));
    }

    let response = ctx.send(submit()).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));

    // Other clients are unaffected
    let other = json_request("POST", "/api/contact", json!({}));
    assert_eq!(
        ctx.send(other).await.status(),
        StatusCode::UNPROCESSABLE_ENTITY
    );
}

#[tokio::test]
async fn test_forwarded_header_ignored_without_trusted_proxy() {
    let ctx = TestContext::offline();
    let peer = next_peer();

    let mut statuses = Vec::new();
    for i in 0..6 {
        let mut request = json_request_from(peer, "POST", "/api/contact", json!({}));
        request.headers_mut().insert(
            "x-forwarded-for",
            format!("203.0.113.{}", i + 1).parse().unwrap(),
        );
        statuses.push(ctx.send(request).await.status());
    }

    assert!(statuses[..5]
        .iter()
        .all(|s| *s == StatusCode::UNPROCESSABLE_ENTITY));
    assert_eq!(statuses[5], StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_trusted_proxy_limits_by_last_forwarded_hop() {
    let ctx = TestContext::offline_behind_proxy();
    let proxy = next_peer();

    let submit = |forwarded: &str| {
        let mut request = json_request_from(proxy, "POST", "/api/contact", json!({}));
        request
            .headers_mut()
            .insert("x-forwarded-for", forwarded.parse().unwrap());
        request
    };

    // A client-supplied first hop does not change the key the proxy appended
    for i in 0..5 {
        let forwarded = format!("192.0.2.{}, 198.51.100.77", i + 1);
        let response = ctx.send(submit(&forwarded)).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
    let response = ctx.send(submit("192.0.2.99, 198.51.100.77")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // Another client behind the same proxy has its own bucket
    let response = ctx.send(submit("198.51.100.78")).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_admin_auth_endpoints_are_rate_limited() {
    let ctx = TestContext::offline();
    let peer = next_peer();

    for _ in 0..5 {
        let request = json_request_from(
            peer,
            "POST",
            "/api/admin/refresh",
            json!({ "refresh_token": "not.a.jwt" }),
        );
        let response = ctx.send(request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key("x-ratelimit-remaining"));
    }

    // Login and refresh draw from the same bucket
    let request = json_request_from(
        peer,
        "POST",
        "/api/admin/login",
        json!({ "email": "admin@example.com", "password": "guess-number-six" }),
    );
    let response = ctx.send(request).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));

    let request = json_request("POST", "/api/admin/login", json!({ "email": "nope" }));
    assert_eq!(
        ctx.send(request).await.status(),
        StatusCode::UNPROCESSABLE_ENTITY
    );
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let ctx = TestContext::offline();

    let request = Request::builder()
        .uri("/api/consultations")
        .body(Body::empty())
        .unwrap();
    let response = ctx.send(request).await;

    let headers = response.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert!(headers.contains_key("referrer-policy"));
    assert!(headers.contains_key("content-security-policy"));
    assert!(!headers.contains_key("strict-transport-security"));
}

#[tokio::test]
async fn test_health_reports_degraded_without_database() {
    let ctx = TestContext::offline();

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = body_json(ctx.send(request).await).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["database"], "disconnected");
    assert_eq!(body["mail"], "log");
}

#[tokio::test]
async fn test_campaign_click_rejects_unsafe_target() {
    let ctx = TestContext::offline();
    let id = Uuid::new_v4();

    let request = Request::builder()
        .uri(format!("/api/campaigns/{}/click?url=javascript:alert(1)", id))
        .body(Body::empty())
        .unwrap();

    let response = ctx.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_campaign_open_always_returns_pixel() {
    let ctx = TestContext::offline();

    let request = Request::builder()
        .uri(format!("/api/campaigns/{}/open", Uuid::new_v4()))
        .body(Body::empty())
        .unwrap();

    let response = ctx.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/gif");
}

#[tokio::test]
async fn test_invalid_path_id_is_400() {
    let ctx = TestContext::offline();

    let request = Request::builder()
        .uri("/api/projects/not-a-uuid")
        .body(Body::empty())
        .unwrap();

    let response = ctx.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Database-backed flows
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_contact_submission_success() {
    let Some(ctx) = TestContext::with_database().await else {
        return;
    };

    let request = json_request(
        "POST",
        "/api/contact",
        json!({
            "name": "Ada",
            "email": "ada@example.com",
            "subject": "Hello",
            "message": "I'd like to talk about a website."
        }),
    );

    let (status, body) = body_json(ctx.send(request).await).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["id"].is_string());
    assert!(body["message"].is_string());

    let id = body["id"].as_str().unwrap().to_string();
    let response = ctx
        .send(admin_request(&ctx, "DELETE", &format!("/api/contact/{}", id), None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    ctx.cleanup().await;
}

#[tokio::test]
async fn test_login_with_wrong_password() {
    let Some(ctx) = TestContext::with_database().await else {
        return;
    };
    let email = ctx.admin.as_ref().unwrap().email.clone();

    let request = json_request(
        "POST",
        "/api/admin/login",
        json!({ "email": email, "password": "wrong-password-1" }),
    );

    let (status, body) = body_json(ctx.send(request).await).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid email or password");
    assert!(body.get("access_token").is_none());

    let request = json_request(
        "POST",
        "/api/admin/login",
        json!({ "email": email, "password": "Correct-Horse-42" }),
    );

    let (status, body) = body_json(ctx.send(request).await).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["access_token"].is_string());
    assert_eq!(body["token_type"], "Bearer");

    ctx.cleanup().await;
}

#[tokio::test]
async fn test_featured_project_is_listed_and_anonymised() {
    let Some(ctx) = TestContext::with_database().await else {
        return;
    };

    let title = format!("Featured {}", Uuid::new_v4());
    let request = admin_request(
        &ctx,
        "POST",
        "/api/projects",
        Some(json!({
            "title": title,
            "category": "Web",
            "description": "Marketing site rebuild",
            "featured": true,
            "client_name": "Acme Corp",
            "client_anonymous": true
        })),
    );

    let (status, created) = body_json(ctx.send(request).await).await;
    assert_eq!(status, StatusCode::CREATED);
    let id: Uuid = created["id"].as_str().unwrap().parse().unwrap();

    let request = Request::builder()
        .uri("/api/projects/featured?limit=24")
        .body(Body::empty())
        .unwrap();
    let (status, body) = body_json(ctx.send(request).await).await;
    assert_eq!(status, StatusCode::OK);

    let listed = body
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["title"] == title.as_str())
        .expect("featured project listed");
    assert!(listed["client_name"].is_null());

    Project::delete(&ctx.db, id).await.unwrap();
    ctx.cleanup().await;
}

#[tokio::test]
async fn test_skill_create_and_delete() {
    let Some(ctx) = TestContext::with_database().await else {
        return;
    };

    let request = admin_request(
        &ctx,
        "POST",
        "/api/skills",
        Some(json!({ "name": "Rust", "category": "Backend", "level": 90 })),
    );
    let (status, skill) = body_json(ctx.send(request).await).await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/api/skills/{}", skill["id"].as_str().unwrap());

    let response = ctx.send(admin_request(&ctx, "DELETE", &uri, None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let request = Request::builder().uri("/api/skills").body(Body::empty()).unwrap();
    let (status, skills) = body_json(ctx.send(request).await).await;
    assert_eq!(status, StatusCode::OK);
    assert!(skills
        .as_array()
        .unwrap()
        .iter()
        .all(|s| s["id"] != skill["id"]));

    let response = ctx.send(admin_request(&ctx, "DELETE", &uri, None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    ctx.cleanup().await;
}

#[tokio::test]
async fn test_duplicate_newsletter_subscription_conflicts() {
    let Some(ctx) = TestContext::with_database().await else {
        return;
    };

    let email = format!("reader-{}@example.com", Uuid::new_v4());
    let subscribe = || json_request("POST", "/api/newsletter/subscribe", json!({ "email": email }));

    let response = ctx.send(subscribe()).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let (status, body) = body_json(ctx.send(subscribe()).await).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "This email is already subscribed");

    let subscriber = NewsletterSubscriber::find_by_email(&ctx.db, &email)
        .await
        .unwrap()
        .unwrap();
    NewsletterSubscriber::delete(&ctx.db, subscriber.id)
        .await
        .unwrap();

    ctx.cleanup().await;
}
