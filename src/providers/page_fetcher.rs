//! HTTP page fetcher for the [`ContentFetcher`] port.
//!
//! GETs the page with a browser User-Agent, rejects non-text content types,
//! extracts readable text with `html2text` (falling back to tag stripping
//! when the parser chokes), and truncates to the configured ceiling.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::FetchError;
use crate::ports::ContentFetcher;
use crate::schemas::FetchedPage;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const TEXT_WIDTH: usize = 80;

/// Fetches and extracts readable page content over HTTP.
pub struct HttpPageFetcher {
    client: Client,
    timeout: Duration,
    max_content_chars: usize,
}

/// Tag stripper used when `html2text` fails on malformed markup.
fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Pull the `<title>` text out of raw HTML, if present.
fn extract_title(html: &str) -> String {
    let lower = html.to_lowercase();
    let Some(open) = lower.find("<title") else {
        return String::new();
    };
    let Some(start) = lower[open..].find('>').map(|i| open + i + 1) else {
        return String::new();
    };
    let Some(end) = lower[start..].find("</title").map(|i| start + i) else {
        return String::new();
    };
    html[start..end].split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let cut: String = text.chars().take(limit).collect();
    format!("{cut}...")
}

impl HttpPageFetcher {
    pub fn new(timeout: Duration, max_content_chars: usize) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self { client, timeout, max_content_chars }
    }

    fn extract(&self, url: &str, html: &str) -> FetchedPage {
        let title = extract_title(html);
        let text = html2text::from_read(html.as_bytes(), TEXT_WIDTH)
            .unwrap_or_else(|_| strip_html_tags(html));
        let content = truncate_chars(text.trim(), self.max_content_chars);
        let word_count = content.split_whitespace().count();

        FetchedPage { url: url.to_string(), title, content, word_count }
    }
}

impl Default for HttpPageFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(30), 10_000)
    }
}

#[async_trait]
impl ContentFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(format!("unsupported scheme: {}", parsed.scheme())));
        }

        debug!(url = %url, "fetching page content");

        let response = self
            .client
            .get(parsed)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http { status: status.as_u16() });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        if !content_type.is_empty()
            && !content_type.contains("text/html")
            && !content_type.contains("text/plain")
        {
            return Err(FetchError::UnsupportedContentType(content_type));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Network(e.to_string())
            }
        })?;

        let page = self.extract(url, &body);
        debug!(url = %url, words = page.word_count, "page content extracted");
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SAMPLE_HTML: &str = "<html><head><title>Sample  Page</title></head>\
         <body><h1>Heading</h1><p>First paragraph of body text.</p>\
         <script>ignore();</script></body></html>";

    fn fetcher() -> HttpPageFetcher {
        HttpPageFetcher::new(Duration::from_secs(5), 10_000)
    }

    #[test]
    fn test_extract_title() {
        assert_eq!(extract_title(SAMPLE_HTML), "Sample Page");
        assert_eq!(extract_title("<html><body>no title</body></html>"), "");
        assert_eq!(extract_title("<TITLE>Upper</TITLE>"), "Upper");
    }

    #[test]
    fn test_strip_html_tags() {
        assert_eq!(strip_html_tags("<p>hello <b>world</b></p>"), "hello world");
    }

    #[test]
    fn test_extract_truncates_content() {
        let fetcher = HttpPageFetcher::new(Duration::from_secs(5), 20);
        let page = fetcher.extract("https://a.com", SAMPLE_HTML);
        assert!(page.content.chars().count() <= 23); // limit plus ellipsis
        assert!(page.content.ends_with("..."));
    }

    #[tokio::test]
    async fn test_fetch_extracts_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(SAMPLE_HTML)
                    .insert_header("content-type", "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let page = fetcher().fetch(&format!("{}/article", server.uri())).await.unwrap();

        assert_eq!(page.title, "Sample Page");
        assert!(page.content.contains("First paragraph"));
        assert!(page.word_count > 0);
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_text_content() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/binary"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![0u8; 16])
                    .insert_header("content-type", "application/octet-stream"),
            )
            .mount(&server)
            .await;

        let result = fetcher().fetch(&format!("{}/binary", server.uri())).await;
        assert!(matches!(result, Err(FetchError::UnsupportedContentType(_))));
    }

    #[tokio::test]
    async fn test_fetch_maps_http_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = fetcher().fetch(&format!("{}/gone", server.uri())).await;
        assert!(matches!(result, Err(FetchError::Http { status: 404 })));
    }

    #[tokio::test]
    async fn test_fetch_rejects_bad_urls() {
        assert!(matches!(
            fetcher().fetch("not a url").await,
            Err(FetchError::InvalidUrl(_))
        ));
        assert!(matches!(
            fetcher().fetch("file:///etc/passwd").await,
            Err(FetchError::InvalidUrl(_))
        ));
    }
}
