use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use mockito::Server;
use offerscrape::{
    config::ScraperConfig,
    server::{create_router, AppState},
    ScrapeService,
};
use tower::ServiceExt;

fn app(config: ScraperConfig) -> Router {
    create_router(AppState::new(ScrapeService::new(config).unwrap()))
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_index_serves_the_form() {
    let response = app(ScraperConfig::default())
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("<form"));
    assert!(body.contains("/api/scrape-simple"));
}

#[tokio::test]
async fn test_health() {
    let response = app(ScraperConfig::default())
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ok");
}

#[tokio::test]
async fn test_rejects_url_from_other_site() {
    let response = app(ScraperConfig::default())
        .oneshot(post_json("/api/scrape-simple", r#"{"url":"https://example.com/deals"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["error"], "Please provide a valid cigarpage.com URL");
}

#[tokio::test]
async fn test_missing_url_is_rejected() {
    let response = app(ScraperConfig::default())
        .oneshot(post_json("/api/scrape", "{}"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let response = app(ScraperConfig::default())
        .oneshot(post_json("/api/scrape-simple", "not json"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_scrape_simple_downloads_csv() {
    let mut server = Server::new_async().await;
    let _home = server.mock("GET", "/").with_status(200).with_body("home").create_async().await;
    let _deals = server
        .mock("GET", "/deals")
        .with_status(200)
        .with_body(r#"<h3 class="name">Davidoff Nicaragua</h3><span class="price">$17.25</span>"#)
        .create_async()
        .await;

    let config = ScraperConfig {
        timeout_secs: 5,
        user_agents: vec!["agent-a".to_string()],
        retry_delay_min_ms: 0,
        retry_delay_max_ms: 0,
        warmup_pause_ms: 0,
        allowed_domains: Vec::new(),
        ..Default::default()
    };
    let request_body = serde_json::json!({ "url": format!("{}/deals", server.url()) }).to_string();

    let response = app(config)
        .oneshot(post_json("/api/scrape-simple", &request_body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"cigar-offers.csv\""
    );

    let body = body_string(response).await;
    assert!(body.contains(r#""Davidoff Nicaragua","Brand not available","$17.25""#));
}

#[tokio::test]
async fn test_scrape_rendered_downloads_csv() {
    let mut server = Server::new_async().await;
    let page = server
        .mock("GET", "/deals")
        .match_header("user-agent", "agent-a")
        .with_status(200)
        .with_body(
            r#"<div class="product-card">
                 <h3 class="product-name">Oliva Serie V</h3>
                 <span class="brand">Oliva</span>
                 <span class="price">$9.75</span>
                 <a href="/oliva-v.html">View</a>
               </div>"#,
        )
        .expect(1)
        .create_async()
        .await;

    let config = ScraperConfig {
        timeout_secs: 5,
        user_agents: vec!["agent-a".to_string()],
        allowed_domains: Vec::new(),
        ..Default::default()
    };
    let request_body = serde_json::json!({ "url": format!("{}/deals", server.url()) }).to_string();

    let response = app(config)
        .oneshot(post_json("/api/scrape", &request_body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"cigar-offers.csv\""
    );

    let body = body_string(response).await;
    assert!(body.contains(r#""Oliva Serie V","Oliva","$9.75""#));
    assert!(body.contains(&format!("{}/oliva-v.html", server.url())));
    page.assert_async().await;
}
