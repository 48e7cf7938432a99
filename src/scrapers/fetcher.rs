use crate::error::{Result, ScanError};
use crate::scrapers::types::RawDocument;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION, USER_AGENT};
use reqwest::{Client, StatusCode, Url};
use std::ops::RangeInclusive;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const PRIMARY_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const ALTERNATE_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Shared page fetcher.
///
/// Waits a random 1-3 seconds before each request and presents itself as a
/// desktop Chrome. A 403 gets exactly one retry under a different user agent.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    delay_ms: RangeInclusive<u64>,
    extra_headers: HeaderMap,
}

impl HttpFetcher {
    /// Create a fetcher whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(browser_headers())
            .build()
            .map_err(|e| ScanError::Network {
                site: "http client".to_string(),
                source: e,
            })?;

        Ok(Self {
            client,
            delay_ms: 1_000..=3_000,
            extra_headers: HeaderMap::new(),
        })
    }

    /// Replace the politeness delay window
    pub fn with_delay(mut self, delay: RangeInclusive<Duration>) -> Self {
        self.delay_ms = delay.start().as_millis() as u64..=delay.end().as_millis() as u64;
        self
    }

    /// Headers sent on top of the common browser set
    pub fn with_headers<'a>(mut self, headers: impl IntoIterator<Item = (&'static str, &'a str)>) -> Self {
        for (name, value) in headers {
            if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                self.extra_headers.insert(name, value);
            }
        }
        self
    }

    async fn pause(&self) {
        let (lo, hi) = (*self.delay_ms.start(), *self.delay_ms.end());
        let millis = if hi > lo {
            rand::thread_rng().gen_range(lo..=hi)
        } else {
            lo
        };
        if millis > 0 {
            debug!("Waiting {millis}ms before request");
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
    }

    async fn get(&self, site: &str, url: &Url, user_agent: &str) -> Result<(StatusCode, String)> {
        let network = |e: reqwest::Error| ScanError::Network {
            site: site.to_string(),
            source: e,
        };
        let response = self
            .client
            .get(url.clone())
            .headers(self.extra_headers.clone())
            .header(USER_AGENT, user_agent)
            .send()
            .await
            .map_err(network)?;
        let status = response.status();
        let body = response.text().await.map_err(network)?;
        Ok((status, body))
    }

    /// Fetch `url` on behalf of `site`
    pub async fn fetch(&self, site: &str, url: &Url) -> Result<RawDocument> {
        info!("Fetching from URL: {url}");
        self.pause().await;

        let (mut status, mut body) = self.get(site, url, PRIMARY_USER_AGENT).await?;
        info!("Response status: {status}");

        if status == StatusCode::FORBIDDEN {
            warn!("Received 403 Forbidden - {site} may be blocking scrapers, retrying with another user agent");
            (status, body) = self.get(site, url, ALTERNATE_USER_AGENT).await?;
            info!("Retry response status: {status}");
        }

        if !status.is_success() {
            return Err(ScanError::HttpStatus {
                site: site.to_string(),
                status: status.as_u16(),
            });
        }

        debug!("Downloaded {} bytes of HTML", body.len());
        Ok(RawDocument {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers
}
