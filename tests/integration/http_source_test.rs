// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::id;
use chrono::NaiveDate;
use gridcrawl::domain::models::area::Area;
use gridcrawl::domain::models::crawl_run::TimeWindow;
use gridcrawl::domain::models::owner::OwnerId;
use gridcrawl::domain::models::search::{DetailParams, SearchParams, SearchQuery};
use gridcrawl::sources::http_source::{HttpListingSource, HttpSourceConfig};
use gridcrawl::sources::traits::{ListingSource, OwnerDirectory, SourceError};
use gridcrawl::utils::retry_policy::RetryPolicy;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn source(server: &MockServer, api_key: Option<&str>) -> HttpListingSource {
    HttpListingSource::new(HttpSourceConfig {
        base_url: server.uri(),
        timeout: Duration::from_secs(5),
        user_agent: "gridcrawl-test".to_string(),
        api_key: api_key.map(str::to_string),
        api_key_header: "X-Api-Key".to_string(),
    })
    .unwrap()
}

fn window() -> TimeWindow {
    TimeWindow::from_offset(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(), 30, 2)
}

fn query() -> SearchQuery {
    SearchQuery {
        cell: "r0c0".to_string(),
        area: Area::new(25.0, 55.0, 25.5, 55.5).unwrap(),
        window: window(),
        params: SearchParams::default(),
        cursor: None,
    }
}

#[tokio::test]
async fn test_search_sends_bounds_and_window() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("south", "25"))
        .and(query_param("east", "55.5"))
        .and(query_param("checkin", "2025-03-31"))
        .and(query_param("checkout", "2025-04-02"))
        .and(query_param("items_per_page", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": 1}, {"id": "2"}],
            "next_cursor": "p2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = source(&server, None).search(&query()).await.unwrap();

    assert_eq!(page.hits.len(), 2);
    assert_eq!(page.next_cursor.as_deref(), Some("p2"));
}

#[tokio::test]
async fn test_status_codes_map_to_error_kinds() {
    let server = MockServer::start().await;
    Mock::given(path("/listings/limited"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    Mock::given(path("/listings/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .mount(&server)
        .await;
    Mock::given(path("/listings/garbled"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let source = source(&server, None);
    let params = DetailParams::default();

    assert!(matches!(
        source.fetch_detail(&id("limited"), &params).await,
        Err(SourceError::Transient(_))
    ));
    match source.fetch_detail(&id("missing"), &params).await {
        Err(SourceError::Rejected { status, message }) => {
            assert_eq!(status, 404);
            assert_eq!(message, "not here");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert!(matches!(
        source.fetch_detail(&id("garbled"), &params).await,
        Err(SourceError::Malformed(_))
    ));
}

#[tokio::test]
async fn test_detail_carries_window_and_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/listings/42"))
        .and(header("X-Api-Key", "secret"))
        .and(query_param("checkin", "2025-03-31"))
        .and(query_param("currency", "EUR"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"listing": {"id": 42}})))
        .expect(1)
        .mount(&server)
        .await;

    let params = DetailParams {
        currency: Some("EUR".to_string()),
        locale: None,
        window: Some(window()),
    };
    let body = source(&server, Some("secret"))
        .fetch_detail(&id("42"), &params)
        .await
        .unwrap();

    assert_eq!(body["listing"]["id"], 42);
}

#[tokio::test]
async fn test_owner_endpoints() {
    let server = MockServer::start().await;
    Mock::given(path("/owners/h1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"first_name": "Ana"})))
        .mount(&server)
        .await;
    Mock::given(path("/owners/h1/listings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"listings": [1, 2, 3]})))
        .mount(&server)
        .await;

    let source = source(&server, None);
    let owner = OwnerId::parse("h1").unwrap();

    let profile = source.enrich_owner(&owner).await.unwrap();
    assert_eq!(profile["first_name"], "Ana");
    assert_eq!(source.count_owner_listings(&owner).await.unwrap(), 3);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let server = MockServer::start().await;
    Mock::given(path("/listings/7"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(path("/listings/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "ok"})))
        .mount(&server)
        .await;

    let source = source(&server, None);
    let policy = RetryPolicy::new(3, Duration::from_millis(1));
    let params = DetailParams::default();
    let listing = id("7");

    let (result, attempts) = policy
        .run_counted(|| source.fetch_detail(&listing, &params))
        .await;

    assert_eq!(result.unwrap()["name"], "ok");
    assert_eq!(attempts, 3);
}
