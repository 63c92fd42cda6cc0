//! Collector 통합 테스트
//!
//! wiremock을 사용한 HTTP 모킹 테스트

use std::time::Duration;

use prom2hny::collector::{
    protobuf, MetricFamily, MetricKind, RetryConfig, Sample, ScrapeClient, ACCEPT_HEADER,
};
use prom2hny::error::CollectorError;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const METRICS: &str = include_str!("fixtures/metrics.txt");
const PROTOBUF_CONTENT_TYPE: &str =
    "application/vnd.google.protobuf; proto=io.prometheus.client.MetricFamily; encoding=delimited";

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 2,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(20),
        multiplier: 2.0,
    }
}

#[tokio::test]
async fn test_scrape_text_format() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/metrics"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(METRICS, "text/plain; version=0.0.4; charset=utf-8"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ScrapeClient::new(&format!("{}/metrics", mock_server.uri()), 5000).unwrap();
    let families = client.scrape().await.unwrap();

    assert_eq!(families.len(), 10);
    assert_eq!(families[0].name, "kube_pod_info");
    assert_eq!(families[0].kind, MetricKind::Gauge);

    let requests = mock_server.received_requests().await.unwrap();
    let accept = requests[0]
        .headers
        .get("accept")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert_eq!(accept, ACCEPT_HEADER);
}

#[tokio::test]
async fn test_scrape_protobuf_format() {
    let mock_server = MockServer::start().await;

    let families = vec![
        MetricFamily::new("kube_node_status_ready", MetricKind::Gauge).with_sample(
            Sample::new(1.0)
                .with_label("node", "n1")
                .with_label("condition", "true"),
        ),
        MetricFamily::new("kube_node_status_capacity_pods", MetricKind::Gauge)
            .with_sample(Sample::new(110.0).with_label("node", "n1")),
    ];
    let body = protobuf::encode_delimited(&families);

    Mock::given(method("GET"))
        .and(path("/metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_vec(), PROTOBUF_CONTENT_TYPE))
        .mount(&mock_server)
        .await;

    let client = ScrapeClient::new(&format!("{}/metrics", mock_server.uri()), 5000).unwrap();
    let scraped = client.scrape().await.unwrap();

    assert_eq!(scraped, families);
}

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(header("Authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("", "text/plain"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ScrapeClient::new(&format!("{}/metrics", mock_server.uri()), 5000)
        .unwrap()
        .with_bearer_token("s3cret");
    let families = client.scrape().await.unwrap();

    assert!(families.is_empty());
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = ScrapeClient::new(&format!("{}/metrics", mock_server.uri()), 5000).unwrap();
    let result = client.scrape_with_retry(&fast_retry()).await;

    assert!(matches!(result, Err(CollectorError::HttpStatus(503))));
}

#[tokio::test]
async fn test_retry_recovers_after_transient_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(METRICS, "text/plain"))
        .mount(&mock_server)
        .await;

    let client = ScrapeClient::new(&format!("{}/metrics", mock_server.uri()), 5000).unwrap();
    let families = client.scrape_with_retry(&fast_retry()).await.unwrap();

    assert_eq!(families.len(), 10);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ScrapeClient::new(&format!("{}/metrics", mock_server.uri()), 5000).unwrap();
    let result = client.scrape_with_retry(&fast_retry()).await;

    assert_eq!(result.unwrap_err().http_status(), Some(404));
}

#[tokio::test]
async fn test_timeout_handling() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&mock_server)
        .await;

    let client = ScrapeClient::new(&format!("{}/metrics", mock_server.uri()), 100).unwrap();
    let result = client.scrape().await;

    assert!(matches!(result, Err(CollectorError::Timeout(Some(100)))));
}

#[tokio::test]
async fn test_malformed_text_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("# TYPE kube_pod_info gauge\nkube_pod_info{pod=\"p1\" 1\n", "text/plain"),
        )
        .mount(&mock_server)
        .await;

    let client = ScrapeClient::new(&format!("{}/metrics", mock_server.uri()), 5000).unwrap();
    let result = client.scrape().await;

    assert!(matches!(result, Err(CollectorError::TextParse { line: 2, .. })));
}
