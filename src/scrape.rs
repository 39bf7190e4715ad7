//! Article fetching and plain-text extraction.
//!
//! Fetches each URL with a blocking HTTP client and boils the HTML down to
//! readable text. URLs that fail to fetch or yield no text contribute no
//! article; whether a failing URL aborts the whole load is controlled by
//! `ScrapeConfig::strict_fetch`.

use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use reqwest::blocking::Client;
use scraper::{ElementRef, Html};
use std::error::Error;
use std::time::Duration;

use crate::config::ScrapeConfig;

/// One successfully fetched article, ready for chunking.
#[derive(Debug, Clone)]
pub struct Article {
    pub source_url: String,
    pub raw_text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("failed to build HTTP client: {0}")]
    ClientInit(reqwest::Error),

    #[error("failed to fetch {url}: {reason}")]
    FetchFailed { url: String, reason: String },
}

/// Elements whose text never belongs in the extracted article.
const SKIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "head", "svg", "iframe",
];

/// Elements that imply a line break around their content.
const BLOCK_TAGS: &[&str] = &[
    "p",
    "div",
    "br",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "li",
    "ul",
    "ol",
    "tr",
    "table",
    "article",
    "section",
    "main",
    "nav",
    "header",
    "footer",
    "blockquote",
    "pre",
    "figcaption",
];

/// Fetch every URL and extract article text, preserving input order.
///
/// Fetches run in parallel; the output order matches the input URL order.
/// Returns an error only for loader-level failures (client construction),
/// or for any per-URL failure when `strict_fetch` is enabled.
pub fn load_articles(urls: &[String], config: &ScrapeConfig) -> Result<Vec<Article>, ScrapeError> {
    let client = build_client(config)?;

    let fetched: Vec<Result<Option<Article>, ScrapeError>> = urls
        .par_iter()
        .map(|url| fetch_article(&client, url, config))
        .collect();

    let mut articles = Vec::new();
    for result in fetched {
        match result {
            Ok(Some(article)) => articles.push(article),
            Ok(None) => {}
            Err(err) if config.strict_fetch => return Err(err),
            Err(err) => log::warn!("{err}"),
        }
    }

    Ok(articles)
}

fn build_client(config: &ScrapeConfig) -> Result<Client, ScrapeError> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(ScrapeError::ClientInit)
}

/// Fetch one URL. `Ok(None)` means the page was fetched but had no
/// extractable text; `Err` means the fetch itself failed.
fn fetch_article(
    client: &Client,
    url: &str,
    config: &ScrapeConfig,
) -> Result<Option<Article>, ScrapeError> {
    let parsed = reqwest::Url::parse(url).map_err(|e| ScrapeError::FetchFailed {
        url: url.to_string(),
        reason: format!("invalid URL: {e}"),
    })?;

    if !config
        .allowed_schemes
        .iter()
        .any(|scheme| scheme == parsed.scheme())
    {
        return Err(ScrapeError::FetchFailed {
            url: url.to_string(),
            reason: format!("scheme '{}' not allowed", parsed.scheme()),
        });
    }

    log::debug!("{url}: requesting");

    let resp = client.get(url).send().map_err(|e| ScrapeError::FetchFailed {
        url: url.to_string(),
        reason: request_error(&e),
    })?;

    let status = resp.status();
    if !status.is_success() {
        return Err(ScrapeError::FetchFailed {
            url: url.to_string(),
            reason: format!("status {status}"),
        });
    }

    let html = resp.text().map_err(|e| ScrapeError::FetchFailed {
        url: url.to_string(),
        reason: request_error(&e),
    })?;

    let text = extract_text(&html);
    if text.is_empty() {
        log::info!("{url}: no extractable text");
        return Ok(None);
    }

    Ok(Some(Article {
        source_url: url.to_string(),
        raw_text: text,
    }))
}

/// Reduce an HTML document to readable plain text.
///
/// Script/style/head content is dropped, block elements contribute line
/// breaks, whitespace runs are collapsed and blank-line runs squeezed to
/// single paragraph breaks.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut raw = String::new();
    push_element_text(document.root_element(), &mut raw);
    normalize_text(&raw)
}

fn push_element_text(el: ElementRef<'_>, out: &mut String) {
    let name = el.value().name();
    if SKIP_TAGS.contains(&name) {
        return;
    }

    let block = BLOCK_TAGS.contains(&name);
    if block {
        out.push('\n');
    }

    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_el) = ElementRef::wrap(child) {
            push_element_text(child_el, out);
        }
    }

    if block {
        out.push('\n');
    }
}

static SPACE_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t\u{a0}]+").expect("Failed to compile whitespace regex"));

pub(crate) fn normalize_text(raw: &str) -> String {
    let collapsed = SPACE_RUNS.replace_all(raw, " ");

    let mut out = String::new();
    let mut pending_blank = false;
    for line in collapsed.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !out.is_empty() {
                pending_blank = true;
            }
            continue;
        }
        if !out.is_empty() {
            out.push_str(if pending_blank { "\n\n" } else { "\n" });
        }
        pending_blank = false;
        out.push_str(line);
    }

    out
}

fn request_error(error: &reqwest::Error) -> String {
    match error.source() {
        Some(e) => match e.source() {
            Some(e) => e.to_string(),
            None => e.to_string(),
        },
        None => error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_paragraphs() {
        let html = "<html><body><p>First paragraph.</p><p>Second paragraph.</p></body></html>";
        let text = extract_text(html);
        assert_eq!(text, "First paragraph.\n\nSecond paragraph.");
    }

    #[test]
    fn test_strips_scripts_and_styles() {
        let html = r#"<html><head><title>t</title><style>p { color: red }</style></head>
            <body><p>Visible.</p><script>var hidden = 1;</script></body></html>"#;
        let text = extract_text(html);
        assert!(text.contains("Visible."));
        assert!(!text.contains("hidden"));
        assert!(!text.contains("color"));
    }

    #[test]
    fn test_inline_markup_stays_in_line() {
        let html = "<html><body><p>Stocks <b>rallied</b> on <a href=\"#\">Tuesday</a>.</p></body></html>";
        let text = extract_text(html);
        assert_eq!(text, "Stocks rallied on Tuesday.");
    }

    #[test]
    fn test_empty_body_yields_empty_text() {
        let html = "<html><body><script>only()</script></body></html>";
        assert_eq!(extract_text(html), "");
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        let raw = "  A   line\twith   gaps  \n\n\n\nNext\u{a0}paragraph  \n";
        assert_eq!(normalize_text(raw), "A line with gaps\n\nNext paragraph");
    }

    #[test]
    fn test_normalize_keeps_single_newlines() {
        let raw = "one\ntwo\n\nthree";
        assert_eq!(normalize_text(raw), "one\ntwo\n\nthree");
    }

    #[test]
    fn test_disallowed_scheme_is_rejected() {
        let config = ScrapeConfig::default();
        let client = build_client(&config).unwrap();
        let result = fetch_article(&client, "ftp://example.com/feed", &config);
        assert!(matches!(
            result,
            Err(ScrapeError::FetchFailed { .. })
        ));
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let config = ScrapeConfig::default();
        let client = build_client(&config).unwrap();
        let result = fetch_article(&client, "not a url", &config);
        assert!(matches!(result, Err(ScrapeError::FetchFailed { .. })));
    }

    #[test]
    fn test_lenient_load_drops_bad_urls() {
        let config = ScrapeConfig::default();
        let urls = vec![
            "ftp://one.example/a".to_string(),
            "ftp://two.example/b".to_string(),
        ];
        let articles = load_articles(&urls, &config).unwrap();
        assert!(articles.is_empty());
    }

    #[test]
    fn test_strict_load_fails_on_bad_url() {
        let config = ScrapeConfig {
            strict_fetch: true,
            ..ScrapeConfig::default()
        };
        let urls = vec!["ftp://one.example/a".to_string()];
        assert!(load_articles(&urls, &config).is_err());
    }
}
