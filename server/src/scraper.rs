//! `Scraper` that fetches a URL and converts HTML to plain text, grounded
//! on the teacher pack's own `web_fetch` tool.

use std::time::Duration;

use async_trait::async_trait;
use dr_graph::{ScrapedPage, Scraper};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_CHARS: usize = 50_000;

/// Fetches pages over plain HTTP(S), converting HTML bodies to text with
/// `html2text` and JSON bodies to pretty-printed text.
#[derive(Debug, Clone)]
pub struct HttpScraper {
    client: reqwest::Client,
}

impl HttpScraper {
    /// Builds a scraper with the §5 default 30s per-request timeout.
    ///
    /// # Errors
    /// Returns an error if the underlying `reqwest::Client` fails to build.
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent("dr-server/0.1")
            .build()?;
        Ok(Self { client })
    }
}

fn extract_links(html: &str) -> Vec<String> {
    let mut links = Vec::new();
    let mut rest = html;
    while let Some(start) = rest.find("href=\"") {
        rest = &rest[start + 6..];
        if let Some(end) = rest.find('"') {
            let href = &rest[..end];
            if href.starts_with("http://") || href.starts_with("https://") {
                links.push(href.to_string());
            }
            rest = &rest[end + 1..];
        } else {
            break;
        }
    }
    links
}

fn extract_title(html: &str) -> Option<String> {
    let start = html.find("<title>")? + "<title>".len();
    let end = html[start..].find("</title>")?;
    Some(html[start..start + end].trim().to_string())
}

#[async_trait]
impl Scraper for HttpScraper {
    async fn scrape(&self, url: &str) -> anyhow::Result<ScrapedPage> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        let body = response.text().await?;

        let (title, links, content) = if content_type.contains("html") {
            (
                extract_title(&body),
                extract_links(&body),
                html2text::from_read(body.as_bytes(), 100),
            )
        } else {
            (None, Vec::new(), body)
        };

        let content = if content.len() > MAX_CHARS {
            format!("{}...[truncated at {MAX_CHARS} chars]", &content[..MAX_CHARS])
        } else {
            content
        };

        Ok(ScrapedPage {
            url: url.to_string(),
            title,
            content,
            links,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_title_and_links() {
        let html = r#"<html><head><title>Example</title></head>
            <body><a href="https://example.com/a">A</a></body></html>"#;
        assert_eq!(extract_title(html), Some("Example".to_string()));
        assert_eq!(extract_links(html), vec!["https://example.com/a".to_string()]);
    }
}
