//! HTML link extraction
//!
//! The extractor is parser-agnostic: a [`LinkParser`] capability turns a
//! document body into an ordered list of raw references plus an optional
//! `<base href>`. Two implementations are provided, selected by
//! `--parser`: the html5ever tree builder (via `scraper`) and the `select`
//! crate's document model. Resolution and admission of the extracted
//! references happen elsewhere; the extractor only reads the document.

use scraper::{Html, Selector};
use select::document::Document;
use select::predicate::Any;

use crate::config::{ParserKind, TagType};

/// One raw reference as it appears in the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLink {
    /// The attribute value, untouched
    pub raw_href: String,

    /// The tag it was read from
    pub tag: TagType,
}

/// The result of scanning one document
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// The first `<base href>` value, when the document declares one
    pub base_href: Option<String>,

    /// References in document order, duplicates preserved
    pub links: Vec<RawLink>,
}

/// Parser capability: `(document, enabled tags) -> ordered references`
pub trait LinkParser: Send + Sync {
    /// Scans `body` for references carried by the enabled tags
    ///
    /// Errors become a parse diagnostic on the page; they never abort the
    /// crawl.
    fn extract(&self, body: &str, types: &[TagType]) -> Result<Extraction, String>;
}

/// Builds the parser selected by configuration
pub fn make_parser(kind: ParserKind) -> Box<dyn LinkParser> {
    match kind {
        ParserKind::Html5ever => Box::new(Html5everParser),
        ParserKind::Select => Box::new(SelectParser),
    }
}

/// Extraction through `scraper` (html5ever)
pub struct Html5everParser;

impl LinkParser for Html5everParser {
    fn extract(&self, body: &str, types: &[TagType]) -> Result<Extraction, String> {
        let document = Html::parse_document(body);

        let base_selector =
            Selector::parse("base[href]").map_err(|e| format!("selector error: {}", e))?;
        let base_href = document
            .select(&base_selector)
            .next()
            .and_then(|el| el.value().attr("href"))
            .map(str::to_string);

        // One compound selector keeps the matches in document order.
        let selector_src = types
            .iter()
            .map(|t| format!("{}[{}]", t.name(), t.source_attr()))
            .collect::<Vec<_>>()
            .join(", ");
        let selector =
            Selector::parse(&selector_src).map_err(|e| format!("selector error: {}", e))?;

        let mut links = Vec::new();
        for element in document.select(&selector) {
            let Some(tag) = tag_of(element.value().name(), types) else {
                continue;
            };
            if let Some(raw) = element.value().attr(tag.source_attr()) {
                links.push(RawLink {
                    raw_href: raw.to_string(),
                    tag,
                });
            }
        }

        Ok(Extraction { base_href, links })
    }
}

/// Extraction through the `select` crate
pub struct SelectParser;

impl LinkParser for SelectParser {
    fn extract(&self, body: &str, types: &[TagType]) -> Result<Extraction, String> {
        let document = Document::from(body);

        let base_href = document
            .find(select::predicate::Name("base"))
            .filter_map(|node| node.attr("href"))
            .next()
            .map(str::to_string);

        // A single pass over every node preserves document order across
        // the different tag types.
        let mut links = Vec::new();
        for node in document.find(Any) {
            let Some(name) = node.name() else { continue };
            let Some(tag) = tag_of(name, types) else { continue };
            if let Some(raw) = node.attr(tag.source_attr()) {
                links.push(RawLink {
                    raw_href: raw.to_string(),
                    tag,
                });
            }
        }

        Ok(Extraction { base_href, links })
    }
}

fn tag_of(name: &str, types: &[TagType]) -> Option<TagType> {
    types.iter().copied().find(|t| t.name() == name)
}

/// Returns true when a Content-Type names an HTML or XHTML document
pub fn is_html_content_type(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return false;
    };
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase();
    essence == "text/html" || essence == "application/xhtml+xml"
}
