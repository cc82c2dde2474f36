//! HTML to plain-text extraction
//!
//! Parses a page with html5ever (through `scraper`), drops non-content
//! elements, and linearizes what is left of `<body>`.

use crate::error::ExtractError;
use crate::types::ExtractedContent;
use scraper::{Html, Selector};

/// Elements removed before any text is read
const NON_CONTENT_SELECTOR: &str = "script, style, noscript, iframe, svg, header, footer, nav";

/// Capability to turn raw HTML into [`ExtractedContent`]
///
/// Implementations must tolerate malformed markup. Errors are reserved for
/// anomalies that cannot be recovered from.
pub trait ContentExtractor: Send + Sync {
    /// Identifier for logging
    fn name(&self) -> &'static str;

    /// Extract text and metadata from an HTML document
    fn extract(&self, html: &str) -> Result<ExtractedContent, ExtractError>;
}

/// Default extractor built on the `scraper` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlExtractor;

impl HtmlExtractor {
    /// Create a new HTML extractor
    pub fn new() -> Self {
        Self
    }
}

impl ContentExtractor for HtmlExtractor {
    fn name(&self) -> &'static str {
        "html"
    }

    fn extract(&self, html: &str) -> Result<ExtractedContent, ExtractError> {
        let mut document = Html::parse_document(html);
        remove_non_content(&mut document)?;

        let body = selector("body")?;
        let raw_text: String = document
            .select(&body)
            .next()
            .map(|el| el.text().collect())
            .unwrap_or_default();

        let title = extract_title(&document)?;
        let company = meta_property(&document, "og:site_name")?.unwrap_or_default();

        Ok(ExtractedContent {
            text: collapse_whitespace(&raw_text),
            title,
            company,
        })
    }
}

/// Detach every non-content element from the tree
fn remove_non_content(document: &mut Html) -> Result<(), ExtractError> {
    let non_content = selector(NON_CONTENT_SELECTOR)?;
    let ids: Vec<_> = document.select(&non_content).map(|el| el.id()).collect();
    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
    Ok(())
}

/// Title from `<title>`, falling back to `og:title`
fn extract_title(document: &Html) -> Result<String, ExtractError> {
    let title_selector = selector("title")?;
    let title: String = document
        .select(&title_selector)
        .flat_map(|el| el.text())
        .collect();
    let title = title.trim();
    if !title.is_empty() {
        return Ok(title.to_string());
    }

    Ok(meta_property(document, "og:title")?.unwrap_or_default())
}

/// `content` attribute of the first `<meta property="...">` with that property
fn meta_property(document: &Html, property: &str) -> Result<Option<String>, ExtractError> {
    let meta = selector(&format!(r#"meta[property="{}"]"#, property))?;
    Ok(document
        .select(&meta)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::to_string))
}

fn selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|e| {
        ExtractError::ExtractionError(format!("invalid selector {css:?}: {e:?}"))
    })
}

/// Collapse every whitespace run into a single space and trim
///
/// A byte order mark counts as whitespace.
pub fn collapse_whitespace(s: &str) -> String {
    s.split(is_space)
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_space(c: char) -> bool {
    c.is_whitespace() || c == '\u{FEFF}'
}

/// Replace markup in an HTML fragment with spaces and collapse whitespace
///
/// Used for HTML embedded in JSON payloads, where tag boundaries should
/// separate words.
pub fn fragment_to_text(fragment: &str) -> String {
    let document = Html::parse_fragment(fragment);
    let joined = document.root_element().text().collect::<Vec<_>>().join(" ");
    collapse_whitespace(&joined)
}
