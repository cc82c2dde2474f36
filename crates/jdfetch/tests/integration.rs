//! Integration tests for the jdfetch pipeline using wiremock

use async_trait::async_trait;
use jdfetch::{
    extract, parse_target, DefaultFetcher, ExtractError, FetchOptions, FetchedPage, Fetcher,
    FetcherRegistry, ParsedTarget, Pipeline, Stage, UrlGuard, WorkdayFetcher, BROWSER_ACCEPT,
    BROWSER_ACCEPT_LANGUAGE, BROWSER_USER_AGENT, MAX_TEXT_LENGTH,
};
use serde_json::json;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Admits any http(s) host so the loopback mock server can be reached
#[derive(Debug)]
struct AllowAllHosts;

impl UrlGuard for AllowAllHosts {
    fn name(&self) -> &'static str {
        "allow_all_hosts"
    }

    fn admit(&self, scheme: &str, _hostname: &str) -> Result<(), ExtractError> {
        match scheme {
            "http" | "https" => Ok(()),
            _ => Err(ExtractError::DisallowedProtocol),
        }
    }
}

/// Denies `localhost` only, to exercise redirect re-validation
#[derive(Debug)]
struct DenyLocalhostName;

impl UrlGuard for DenyLocalhostName {
    fn name(&self) -> &'static str {
        "deny_localhost_name"
    }

    fn admit(&self, _scheme: &str, hostname: &str) -> Result<(), ExtractError> {
        if hostname == "localhost" {
            Err(ExtractError::PrivateNetworkDenied)
        } else {
            Ok(())
        }
    }
}

fn test_pipeline() -> Pipeline {
    Pipeline::builder().guard(AllowAllHosts).build()
}

async fn mount_html(server: &MockServer, at: &str, html: impl Into<String>) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html.into(), "text/html"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_title_and_cleaned_body() {
    let mock_server = MockServer::start().await;

    let html = r#"<!DOCTYPE html>
<html>
<head>
    <title>Jobs at Acme</title>
    <meta property="og:site_name" content="Acme">
</head>
<body>
    <nav><a href="/">Home</a><a href="/careers">Careers</a></nav>
      Hello   World  
    <footer>Copyright 2025 Acme Inc.</footer>
</body>
</html>"#;
    mount_html(&mock_server, "/jobs/1", html).await;

    let url = format!("{}/jobs/1", mock_server.uri());
    let resp = test_pipeline().run(&url).await.unwrap();

    assert_eq!(resp.title, "Jobs at Acme");
    assert_eq!(resp.text, "Hello World");
    assert_eq!(resp.company, "Acme");
    assert_eq!(resp.url, url);
    assert!(!resp.text.contains("Careers"));
    assert!(!resp.text.contains("Copyright"));
}

#[tokio::test]
async fn test_masquerading_headers_are_sent() {
    let mock_server = MockServer::start().await;
    mount_html(&mock_server, "/", "<body>ok</body>").await;

    test_pipeline()
        .run(&format!("{}/", mock_server.uri()))
        .await
        .unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let headers = &requests[0].headers;
    assert_eq!(
        headers.get("user-agent").unwrap().to_str().unwrap(),
        BROWSER_USER_AGENT
    );
    assert_eq!(
        headers.get("accept").unwrap().to_str().unwrap(),
        BROWSER_ACCEPT
    );
    assert_eq!(
        headers.get("accept-language").unwrap().to_str().unwrap(),
        BROWSER_ACCEPT_LANGUAGE
    );
}

#[tokio::test]
async fn test_long_text_is_truncated_to_prefix() {
    let mock_server = MockServer::start().await;

    let words: Vec<String> = (0..4000).map(|i| format!("word{}", i)).collect();
    let full_text = words.join(" ");
    assert!(full_text.chars().count() > MAX_TEXT_LENGTH);
    mount_html(
        &mock_server,
        "/long",
        format!("<html><body><p>{}</p></body></html>", full_text),
    )
    .await;

    let resp = test_pipeline()
        .run(&format!("{}/long", mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(resp.text.chars().count(), MAX_TEXT_LENGTH);
    assert_eq!(resp.text, full_text[..MAX_TEXT_LENGTH]);
}

#[tokio::test]
async fn test_custom_max_text_length() {
    let mock_server = MockServer::start().await;
    mount_html(&mock_server, "/", "<body>abcdefghij</body>").await;

    let pipeline = Pipeline::builder()
        .guard(AllowAllHosts)
        .max_text_length(4)
        .build();
    let resp = pipeline
        .run(&format!("{}/", mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(resp.text, "abcd");
}

#[tokio::test]
async fn test_same_page_twice_is_identical() {
    let mock_server = MockServer::start().await;
    mount_html(
        &mock_server,
        "/",
        r#"<html><head><title>T</title><meta property="og:site_name" content="S"></head>
<body><p>Stable   content</p></body></html>"#,
    )
    .await;

    let url = format!("{}/", mock_server.uri());
    let pipeline = test_pipeline();
    let first = pipeline.run(&url).await.unwrap();
    let second = pipeline.run(&url).await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_url_round_trips_verbatim() {
    let mock_server = MockServer::start().await;
    mount_html(&mock_server, "/Path", "<body>x</body>").await;

    // Uppercase scheme and an escaped query survive untouched in the payload
    let url = format!(
        "HTTP://{}/Path?q=A%20B&ref=x",
        mock_server.address()
    );
    let resp = test_pipeline().run(&url).await.unwrap();

    assert_eq!(resp.url, url);
}

#[tokio::test]
async fn test_upstream_status_is_propagated() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .mount(&mock_server)
        .await;

    let err = test_pipeline()
        .run(&format!("{}/gone", mock_server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ExtractError::UpstreamError { status: 404, .. }
    ));
    assert_eq!(err.status_code(), 404);
    assert_eq!(err.to_string(), "Failed to fetch page: 404 Not Found");
}

#[tokio::test]
async fn test_upstream_5xx_is_propagated() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let err = test_pipeline()
        .run(&format!("{}/", mock_server.uri()))
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), 503);
    assert!(err.to_string().contains("503 Service Unavailable"));
}

#[tokio::test]
async fn test_slow_upstream_times_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<body>late</body>")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&mock_server)
        .await;

    let pipeline = Pipeline::builder()
        .guard(AllowAllHosts)
        .timeout(Duration::from_millis(200))
        .build();

    let started = std::time::Instant::now();
    let err = pipeline
        .run(&format!("{}/", mock_server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, ExtractError::FetchTimeout(_)));
    assert_eq!(err.status_code(), 500);
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    // Grab a free port, then close it so nothing is listening
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let err = test_pipeline()
        .run(&format!("http://127.0.0.1:{}/", port))
        .await
        .unwrap_err();

    assert!(matches!(err, ExtractError::FetchTransportError(_)));
    assert_eq!(err.status_code(), 500);
    assert!(err.details().is_none());
}

#[tokio::test]
async fn test_body_size_cap() {
    let mock_server = MockServer::start().await;
    mount_html(&mock_server, "/", "<body>0123456789ABCDEF</body>").await;

    let pipeline = Pipeline::builder()
        .guard(AllowAllHosts)
        .max_body_bytes(10)
        .build();
    let resp = pipeline
        .run(&format!("{}/", mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(resp.text, "0123");
}

#[tokio::test]
async fn test_invalid_utf8_is_tolerated() {
    let mock_server = MockServer::start().await;

    let mut body = b"<body>caf".to_vec();
    body.push(0xE9);
    body.extend_from_slice(b" ok</body>");

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .mount(&mock_server)
        .await;

    let resp = test_pipeline()
        .run(&format!("{}/", mock_server.uri()))
        .await
        .unwrap();

    assert!(resp.text.starts_with("caf"));
    assert!(resp.text.ends_with("ok"));
}

#[tokio::test]
async fn test_default_guard_blocks_loopback_before_fetch() {
    let mock_server = MockServer::start().await;
    mount_html(&mock_server, "/", "<body>secret</body>").await;

    let err = extract(&format!("{}/", mock_server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, ExtractError::PrivateNetworkDenied));
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_url_prefix_block_list() {
    let mock_server = MockServer::start().await;
    mount_html(&mock_server, "/", "<body>OK</body>").await;

    let pipeline = Pipeline::builder()
        .guard(AllowAllHosts)
        .block_prefix("http://127.0.0.1")
        .build();
    let result = pipeline.run(&format!("{}/", mock_server.uri())).await;

    assert!(matches!(result, Err(ExtractError::BlockedUrl)));
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_url_prefix_allow_list() {
    let mock_server = MockServer::start().await;
    mount_html(&mock_server, "/", "<body>OK</body>").await;

    let pipeline = Pipeline::builder()
        .guard(AllowAllHosts)
        .allow_prefix("https://allowed.example.com")
        .build();
    let result = pipeline.run(&format!("{}/", mock_server.uri())).await;

    assert!(result
        .unwrap_err()
        .to_string()
        .contains("prefix not allowed"));
}

#[tokio::test]
async fn test_redirects_followed_but_url_is_caller_supplied() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/final"))
        .mount(&mock_server)
        .await;
    mount_html(&mock_server, "/final", "<body>Landed</body>").await;

    let url = format!("{}/start", mock_server.uri());
    let resp = test_pipeline().run(&url).await.unwrap();

    assert_eq!(resp.text, "Landed");
    assert_eq!(resp.url, url);
}

#[tokio::test]
async fn test_redirect_revalidation_denies_private_hop() {
    let mock_server = MockServer::start().await;
    let port = mock_server.address().port();

    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", format!("http://localhost:{}/secret", port)),
        )
        .mount(&mock_server)
        .await;
    mount_html(&mock_server, "/secret", "<body>secret</body>").await;

    let pipeline = Pipeline::builder()
        .guard(DenyLocalhostName)
        .revalidate_redirects(true)
        .build();
    let err = pipeline
        .run(&format!("http://127.0.0.1:{}/start", port))
        .await
        .unwrap_err();

    assert!(matches!(err, ExtractError::PrivateNetworkDenied));
    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url.path(), "/start");
}

#[tokio::test]
async fn test_status_callback_reports_every_stage() {
    let mock_server = MockServer::start().await;
    mount_html(&mock_server, "/", "<body>ok</body>").await;

    let mut stages = Vec::new();
    test_pipeline()
        .run_with_status(&format!("{}/", mock_server.uri()), |stage| {
            stages.push(stage)
        })
        .await
        .unwrap();

    assert_eq!(
        stages,
        vec![
            Stage::Received,
            Stage::Validated,
            Stage::Fetching,
            Stage::Extracting,
            Stage::Normalizing,
            Stage::Responded,
        ]
    );
}

const WORKDAY_POSTING: &str =
    "https://acme.wd5.myworkdayjobs.com/External/job/Remote/Rust-Engineer_R1";
const WORKDAY_API_PATH: &str = "/wday/cxs/acme/External/job/Remote/Rust-Engineer_R1";
const WORKDAY_PAGE_PATH: &str = "/External/job/Remote/Rust-Engineer_R1";

/// Generic fetch of the posting path, served by the mock server
struct MockOriginFetcher {
    origin: String,
}

#[async_trait]
impl Fetcher for MockOriginFetcher {
    fn name(&self) -> &'static str {
        "mock_origin"
    }

    fn matches(&self, _url: &Url) -> bool {
        true
    }

    async fn fetch(
        &self,
        target: &ParsedTarget,
        options: &FetchOptions,
    ) -> Result<FetchedPage, ExtractError> {
        let local = parse_target(&format!("{}{}", self.origin, target.url().path()))?;
        DefaultFetcher::new().fetch(&local, options).await
    }
}

fn workday_pipeline(server: &MockServer) -> Pipeline {
    let mut registry = FetcherRegistry::new();
    registry.register(Box::new(WorkdayFetcher::with_api_base(
        Url::parse(&server.uri()).unwrap(),
    )));
    registry.register(Box::new(MockOriginFetcher {
        origin: server.uri(),
    }));
    Pipeline::builder().registry(registry).build()
}

#[tokio::test]
async fn test_workday_posting_from_api() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(WORKDAY_API_PATH))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jobPostingInfo": {
                "title": "Rust Engineer",
                "jobDescription": "<p>Build <b>fast</b> services.</p><ul><li>Tokio</li></ul>",
                "hiringOrganization": { "name": "Acme Corporation" }
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(WORKDAY_PAGE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>shell</p>", "text/html"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let resp = workday_pipeline(&mock_server)
        .run(WORKDAY_POSTING)
        .await
        .unwrap();

    assert_eq!(resp.title, "Rust Engineer");
    assert_eq!(resp.text, "Build fast services. Tokio");
    assert_eq!(resp.company, "Acme Corporation");
    assert_eq!(resp.url, WORKDAY_POSTING);
}

#[tokio::test]
async fn test_workday_description_is_truncated() {
    let mock_server = MockServer::start().await;

    let description = format!("<p>{}</p>", "w".repeat(MAX_TEXT_LENGTH + 5_000));
    Mock::given(method("GET"))
        .and(path(WORKDAY_API_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jobPostingInfo": { "title": "Long", "jobDescription": description }
        })))
        .mount(&mock_server)
        .await;

    let resp = workday_pipeline(&mock_server)
        .run(WORKDAY_POSTING)
        .await
        .unwrap();

    assert_eq!(resp.text.chars().count(), MAX_TEXT_LENGTH);
    assert!(resp.text.chars().all(|c| c == 'w'));
    assert_eq!(resp.company, "acme");
}

#[tokio::test]
async fn test_workday_api_error_falls_back_to_page() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(WORKDAY_API_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_html(
        &mock_server,
        WORKDAY_PAGE_PATH,
        "<html><head><title>Rust Engineer</title></head><body>Apply   now</body></html>",
    )
    .await;

    let resp = workday_pipeline(&mock_server)
        .run(WORKDAY_POSTING)
        .await
        .unwrap();

    assert_eq!(resp.title, "Rust Engineer");
    assert_eq!(resp.text, "Apply now");
    assert_eq!(resp.url, WORKDAY_POSTING);
}

#[tokio::test]
async fn test_workday_missing_posting_info_falls_back_to_page() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(WORKDAY_API_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "error": "gone" })))
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_html(&mock_server, WORKDAY_PAGE_PATH, "<body>Posting page</body>").await;

    let resp = workday_pipeline(&mock_server)
        .run(WORKDAY_POSTING)
        .await
        .unwrap();

    assert_eq!(resp.text, "Posting page");
    assert_eq!(resp.title, "");
}
