use property_scanner::scrapers::fetcher::{ALTERNATE_USER_AGENT, PRIMARY_USER_AGENT};
use property_scanner::scrapers::HttpFetcher;
use property_scanner::ScanError;
use reqwest::Url;
use std::time::{Duration, Instant};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn fetcher() -> HttpFetcher {
    HttpFetcher::new(Duration::from_secs(5))
        .unwrap()
        .with_delay(Duration::ZERO..=Duration::ZERO)
}

fn url(server: &MockServer, route: &str) -> Url {
    Url::parse(&format!("{}{route}", server.uri())).unwrap()
}

/// Compares the whole header value. User agents contain commas, which the
/// stock `header` matcher would split into separate values.
fn user_agent(expected: &'static str) -> impl Fn(&Request) -> bool + Send + Sync {
    move |request: &Request| {
        request
            .headers
            .get("user-agent")
            .and_then(|value| value.to_str().ok())
            == Some(expected)
    }
}

#[tokio::test]
async fn returns_body_on_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(user_agent(PRIMARY_USER_AGENT))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let target = url(&server, "/search");
    let doc = fetcher().fetch("rightmove", &target).await.unwrap();
    assert_eq!(doc.status, 200);
    assert_eq!(doc.url, target.as_str());
    assert_eq!(doc.body, "<html>ok</html>");
}

#[tokio::test]
async fn forbidden_is_retried_once_with_alternate_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(user_agent(PRIMARY_USER_AGENT))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(user_agent(ALTERNATE_USER_AGENT))
        .respond_with(ResponseTemplate::new(200).set_body_string("second try"))
        .expect(1)
        .mount(&server)
        .await;

    let doc = fetcher().fetch("zoopla", &url(&server, "/to-rent")).await.unwrap();
    assert_eq!(doc.body, "second try");
}

#[tokio::test]
async fn forbidden_twice_is_an_http_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .expect(2)
        .mount(&server)
        .await;

    let err = fetcher().fetch("zoopla", &url(&server, "/to-rent")).await.unwrap_err();
    assert!(matches!(err, ScanError::HttpStatus { status: 403, .. }));
}

#[tokio::test]
async fn server_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let err = fetcher().fetch("openrent", &url(&server, "/")).await.unwrap_err();
    match err {
        ScanError::HttpStatus { site, status } => {
            assert_eq!(site, "openrent");
            assert_eq!(status, 500);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn extra_headers_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("sec-fetch-mode", "navigate"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher().with_headers([("Sec-Fetch-Mode", "navigate")]);
    fetcher.fetch("zoopla", &url(&server, "/")).await.unwrap();
}

#[tokio::test]
async fn stalled_response_times_out_as_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(Duration::from_secs(1))
        .unwrap()
        .with_delay(Duration::ZERO..=Duration::ZERO);
    let start = Instant::now();
    let err = fetcher.fetch("spareroom", &url(&server, "/")).await.unwrap_err();

    assert!(start.elapsed() < Duration::from_secs(5));
    match err {
        ScanError::Network { site, source } => {
            assert_eq!(site, "spareroom");
            assert!(source.is_timeout());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn refused_connection_is_a_network_error() {
    // Grab a free port, then close it so nothing is listening there
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let target = Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap();

    let err = fetcher().fetch("onthemarket", &target).await.unwrap_err();
    assert!(matches!(err, ScanError::Network { ref site, .. } if site == "onthemarket"));
}

#[tokio::test]
async fn default_fetcher_waits_between_one_and_three_seconds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
    let start = Instant::now();
    fetcher.fetch("rightmove", &url(&server, "/")).await.unwrap();
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_secs(1), "waited only {elapsed:?}");
    assert!(elapsed < Duration::from_secs(4), "waited {elapsed:?}");
}
